use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Stable identifier of a stored quote. Assigned by the store, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuoteId(pub i64);

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QuoteId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(QuoteId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Es,
    Pt,
    It,
}

impl Language {
    pub const ALL: [Language; 4] = [Language::En, Language::Es, Language::Pt, Language::It];

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Es => "es",
            Language::Pt => "pt",
            Language::It => "it",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLanguage(pub String);

impl fmt::Display for UnknownLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown language code '{}' (expected en, es, pt or it)", self.0)
    }
}

impl std::error::Error for UnknownLanguage {}

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Language::En),
            "es" => Ok(Language::Es),
            "pt" => Ok(Language::Pt),
            "it" => Ok(Language::It),
            other => Err(UnknownLanguage(other.to_string())),
        }
    }
}

/// Polarity scores from an external analyzer. Stored, never computed here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentScores {
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
    pub compound: f64,
}

/// `compound` at or beyond this magnitude counts as positive or negative.
pub const SENTIMENT_CUTOFF: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSentiment(pub String);

impl fmt::Display for UnknownSentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown sentiment '{}' (expected positive, negative or neutral)",
            self.0
        )
    }
}

impl std::error::Error for UnknownSentiment {}

impl FromStr for Sentiment {
    type Err = UnknownSentiment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            other => Err(UnknownSentiment(other.to_string())),
        }
    }
}

/// Listing criteria. Every set field must match; text filters are
/// case-insensitive substring matches.
#[derive(Debug, Clone, Default)]
pub struct QuoteFilter {
    pub language: Option<Language>,
    pub sentiment: Option<Sentiment>,
    pub author: Option<String>,
    pub verified: Option<bool>,
    /// Matched against both text and author.
    pub search: Option<String>,
    pub offset: usize,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SentimentCounts {
    pub positive: i64,
    pub negative: i64,
    pub neutral: i64,
    /// Quotes never scored.
    pub unknown: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuoteStatistics {
    pub total_quotes: i64,
    pub by_language: BTreeMap<String, i64>,
    pub by_sentiment: SentimentCounts,
    pub verified_count: i64,
}

/// A stored quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub text: String,
    pub author: String,
    pub language: Language,
    pub category: Option<String>,
    pub source: Option<String>,
    pub verified: bool,
    pub sentiment: Option<SentimentScores>,
    pub created_at: String,
}

/// Insert payload for a quote. Text is normalized by the store on insert.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewQuote {
    pub text: String,
    pub author: String,
    pub language: Language,
    pub category: Option<String>,
    pub source: Option<String>,
}

impl NewQuote {
    pub fn new(text: &str, author: &str, language: Language) -> Self {
        Self {
            text: text.to_string(),
            author: author.to_string(),
            language,
            category: None,
            source: None,
        }
    }
}

const QUOTE_MARK_PAIRS: [(char, char); 5] = [
    ('"', '"'),
    ('\'', '\''),
    ('\u{201C}', '\u{201D}'),
    ('\u{2018}', '\u{2019}'),
    ('\u{00AB}', '\u{00BB}'),
];

/// Trim and strip one level of surrounding quote marks.
pub fn normalize_text(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    if let (Some(first), Some(last)) = (chars.next(), chars.next_back()) {
        if QUOTE_MARK_PAIRS
            .iter()
            .any(|&(open, close)| first == open && last == close)
        {
            return chars.as_str().trim().to_string();
        }
    }
    trimmed.to_string()
}
