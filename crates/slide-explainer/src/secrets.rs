//! Gemini API key lookup.
//!
//! The key can sit inline in the config (`api_key`), in a mounted file
//! (`api_key_file`) or in an environment variable (`api_key_env`, by default
//! `GEMINI_API_KEY`). The first source that is configured decides: a broken
//! key file is reported instead of silently falling back to the environment.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::config::GeminiConfig;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No Gemini API key configured (set api_key, api_key_file or api_key_env)")]
    NotConfigured,

    #[error("Cannot read API key file '{}': {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("API key file '{}' is blank", path.display())]
    BlankFile { path: PathBuf },

    #[error("API key variable '{0}' is unset or blank")]
    MissingVar(String),

    #[error("API key variable '{0}' is not valid UTF-8")]
    NonUnicodeVar(String),
}

/// One place a secret may be read from.
#[derive(Debug, Clone, Copy)]
pub enum KeySource<'a> {
    Inline(&'a str),
    File(&'a str),
    Env(&'a str),
}

impl KeySource<'_> {
    fn is_configured(&self) -> bool {
        match self {
            KeySource::Inline(s) | KeySource::File(s) | KeySource::Env(s) => !s.is_empty(),
        }
    }

    fn read(&self) -> Result<SecretString, SecretError> {
        let value = match *self {
            KeySource::Inline(value) => value.to_string(),
            KeySource::File(raw) => {
                let path = expand_home(raw);
                let content = std::fs::read_to_string(&path).map_err(|source| {
                    SecretError::Unreadable {
                        path: path.clone(),
                        source,
                    }
                })?;
                let key = content.trim();
                if key.is_empty() {
                    return Err(SecretError::BlankFile { path });
                }
                key.to_string()
            }
            KeySource::Env(name) => match std::env::var(name) {
                Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
                Ok(_) | Err(std::env::VarError::NotPresent) => {
                    return Err(SecretError::MissingVar(name.to_string()))
                }
                Err(std::env::VarError::NotUnicode(_)) => {
                    return Err(SecretError::NonUnicodeVar(name.to_string()))
                }
            },
        };
        Ok(SecretString::from(value))
    }
}

/// Reads the secret from the first configured source in `sources`.
pub fn resolve_secret(sources: &[KeySource<'_>]) -> Result<SecretString, SecretError> {
    sources
        .iter()
        .find(|s| s.is_configured())
        .ok_or(SecretError::NotConfigured)?
        .read()
}

/// Resolves the Gemini key: inline value, then key file, then env var.
pub fn resolve_api_key(config: &GeminiConfig) -> Result<SecretString, SecretError> {
    let mut sources = Vec::with_capacity(3);
    if let Some(key) = config.api_key.as_deref() {
        sources.push(KeySource::Inline(key));
    }
    if let Some(file) = config.api_key_file.as_deref() {
        sources.push(KeySource::File(file));
    }
    sources.push(KeySource::Env(&config.api_key_env));
    resolve_secret(&sources)
}

// `~user/...` is left alone.
fn expand_home(raw: &str) -> PathBuf {
    let rest = match raw.strip_prefix('~') {
        Some("") => "",
        Some(rest) if rest.starts_with('/') => &rest[1..],
        _ => return PathBuf::from(raw),
    };
    match std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        Some(home) if rest.is_empty() => PathBuf::from(home),
        Some(home) => PathBuf::from(home).join(rest),
        None => PathBuf::from(raw),
    }
}
