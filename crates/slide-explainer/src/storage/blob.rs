use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::pipeline::SlideExplanation;

/// Rename `src` to `dst`, falling back to copy + delete across devices.
fn move_file(src: &Path, dst: &Path) -> Result<(), StorageError> {
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    std::fs::copy(src, dst).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    std::fs::remove_file(src).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Deterministic locations of a job's uploaded deck and its explanations.
#[derive(Debug, Clone)]
pub struct BlobLayout {
    uploads_dir: PathBuf,
    outputs_dir: PathBuf,
}

impl BlobLayout {
    pub fn new(uploads_dir: impl Into<PathBuf>, outputs_dir: impl Into<PathBuf>) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
            outputs_dir: outputs_dir.into(),
        }
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn outputs_dir(&self) -> &Path {
        &self.outputs_dir
    }

    pub fn ensure_dirs(&self) -> Result<(), StorageError> {
        ensure_directory(&self.uploads_dir)?;
        ensure_directory(&self.outputs_dir)
    }

    /// `{uploads_dir}/{id}.pptx`
    pub fn input_path(&self, job_id: &str) -> PathBuf {
        self.uploads_dir.join(format!("{}.pptx", job_id))
    }

    /// `{outputs_dir}/{id}.json`
    pub fn output_path(&self, job_id: &str) -> PathBuf {
        self.outputs_dir.join(format!("{}.json", job_id))
    }

    /// Writes an uploaded deck to its input path. Fails if a file is
    /// already there.
    pub fn store_upload(&self, job_id: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
        ensure_directory(&self.uploads_dir)?;
        let path = self.input_path(job_id);

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| StorageError::WriteFile {
                path: path.clone(),
                source: e,
            })?;
        file.write_all(content).map_err(|e| StorageError::WriteFile {
            path: path.clone(),
            source: e,
        })?;

        Ok(path)
    }

    /// Removes an input file; missing files are ignored.
    pub fn remove_upload(&self, job_id: &str) -> Result<(), StorageError> {
        let path = self.input_path(job_id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::WriteFile { path, source: e }),
        }
    }

    /// Writes the explanation result for a job.
    ///
    /// The JSON goes to a sibling temp file first and is then renamed over
    /// the final path, so readers never see a partial document.
    pub fn write_output(
        &self,
        job_id: &str,
        explanations: &[SlideExplanation],
    ) -> Result<PathBuf, StorageError> {
        ensure_directory(&self.outputs_dir)?;
        let path = self.output_path(job_id);
        write_json_atomically(&path, explanations)?;
        Ok(path)
    }

    /// Loads a job's explanation result, or `None` when it was never written.
    pub fn read_output(&self, job_id: &str) -> Result<Option<Vec<SlideExplanation>>, StorageError> {
        let path = self.output_path(job_id);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::ReadFile { path, source: e }),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }
}

/// Pretty-printed JSON written via temp file + rename.
pub fn write_json_atomically(
    path: &Path,
    explanations: &[SlideExplanation],
) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(explanations)?;

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    std::fs::write(&tmp_path, json.as_bytes()).map_err(|e| StorageError::WriteFile {
        path: tmp_path.clone(),
        source: e,
    })?;

    if let Err(e) = move_file(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(())
}
