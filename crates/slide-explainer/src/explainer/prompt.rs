//! Prompt construction for slide explanations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How much depth an explanation should go into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Beginner,
    #[default]
    Comprehensive,
    Executive,
}

impl DetailLevel {
    pub const ALL: [DetailLevel; 3] = [
        DetailLevel::Beginner,
        DetailLevel::Comprehensive,
        DetailLevel::Executive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DetailLevel::Beginner => "beginner",
            DetailLevel::Comprehensive => "comprehensive",
            DetailLevel::Executive => "executive",
        }
    }

    /// Strict parse; surrounding whitespace and case are ignored.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "beginner" => Some(DetailLevel::Beginner),
            "comprehensive" => Some(DetailLevel::Comprehensive),
            "executive" => Some(DetailLevel::Executive),
            _ => None,
        }
    }

    /// Unknown values fall back to `comprehensive`.
    pub fn parse_or_default(value: &str) -> Self {
        Self::parse(value).unwrap_or_default()
    }
}

impl fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Language the explanation is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    He,
    Ru,
    Es,
}

impl Language {
    pub const ALL: [Language; 4] = [Language::En, Language::He, Language::Ru, Language::Es];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::He => "he",
            Language::Ru => "ru",
            Language::Es => "es",
        }
    }

    /// Strict parse; surrounding whitespace and case are ignored.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "en" => Some(Language::En),
            "he" => Some(Language::He),
            "ru" => Some(Language::Ru),
            "es" => Some(Language::Es),
            _ => None,
        }
    }

    /// Unknown values fall back to `en`.
    pub fn parse_or_default(value: &str) -> Self {
        Self::parse(value).unwrap_or_default()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instruction text for a level and language pair.
pub fn template(level: DetailLevel, language: Language) -> &'static str {
    match (level, language) {
        (DetailLevel::Beginner, Language::En) => "Explain this PowerPoint slide in simple, easy-to-understand terms. Avoid technical jargon and use everyday language that anyone can follow.",
        (DetailLevel::Beginner, Language::He) => "הסבר את שקף הPowerPoint הזה במילים פשוטות וקלות להבנה. הימנע מטרמינולוגיה טכנית והשתמש בשפה יומיומית.",
        (DetailLevel::Beginner, Language::Ru) => "Объясните этот слайд PowerPoint простыми и понятными словами. Избегайте технической терминологии и используйте повседневный язык.",
        (DetailLevel::Beginner, Language::Es) => "Explique esta diapositiva de PowerPoint con palabras simples y fáciles de entender. Evite la jerga técnica y use lenguaje cotidiano.",
        (DetailLevel::Comprehensive, Language::En) => "Provide a detailed and thorough explanation of this PowerPoint slide. Include all key concepts, important details, relevant context, and any notable implications.",
        (DetailLevel::Comprehensive, Language::He) => "תן הסבר מפורט ויסודי של שקף PowerPoint זה. כלול את כל המושגים העיקריים, פרטים חשובים, הקשר רלוונטי וכל השלכה ניכרת.",
        (DetailLevel::Comprehensive, Language::Ru) => "Предоставьте подробное и тщательное объяснение этого слайда PowerPoint. Включите все ключевые концепции, важные детали, актуальный контекст и любые значительные последствия.",
        (DetailLevel::Comprehensive, Language::Es) => "Proporcione una explicación detallada y exhaustiva de esta diapositiva de PowerPoint. Incluya todos los conceptos clave, detalles importantes, contexto relevante e implicaciones notables.",
        (DetailLevel::Executive, Language::En) => "Provide a concise executive summary of this PowerPoint slide in 2-3 sentences. Focus only on the most critical information and main takeaways.",
        (DetailLevel::Executive, Language::He) => "תן סיכום ביצועי תמציתי של שקף PowerPoint זה ב-2-3 משפטים. התמקד רק במידע הקריטי ביותר והנקודות העיקריות.",
        (DetailLevel::Executive, Language::Ru) => "Предоставьте краткий исполнительный резюме этого слайда PowerPoint в 2-3 предложениях. Сосредоточьтесь только на наиболее важной информации и основных выводах.",
        (DetailLevel::Executive, Language::Es) => "Proporcione un resumen ejecutivo conciso de esta diapositiva de PowerPoint en 2-3 oraciones. Enfóquese solo en la información más crítica y los puntos clave.",
    }
}

/// Builds the full prompt sent for one slide.
pub fn build_prompt(slide_text: &str, level: DetailLevel, language: Language) -> String {
    format!("{}\n\nSlide content: {}", template(level, language), slide_text)
}
