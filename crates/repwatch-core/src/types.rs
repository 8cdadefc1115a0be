//! Domain enums shared across the pipeline crates.

use serde::{Deserialize, Serialize};

/// An external content platform the pipeline collects mentions from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Forum,
    Microblog,
    Video,
    PlaceReview,
}

impl Platform {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Forum => "forum",
            Platform::Microblog => "microblog",
            Platform::Video => "video",
            Platform::PlaceReview => "place_review",
        }
    }

    /// All platforms, in collection order.
    #[must_use]
    pub fn all() -> [Platform; 4] {
        [
            Platform::Forum,
            Platform::Microblog,
            Platform::Video,
            Platform::PlaceReview,
        ]
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Platform> {
        match s.trim() {
            "forum" => Some(Platform::Forum),
            "microblog" => Some(Platform::Microblog),
            "video" => Some(Platform::Video),
            "place_review" => Some(Platform::PlaceReview),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sentiment label assigned to a mention's text.
///
/// The classifier contract guarantees exactly one of these three values;
/// there is no "unknown" variant by design of the fallback path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Sentiment> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Some(Sentiment::Positive),
            "neutral" => Some(Sentiment::Neutral),
            "negative" => Some(Sentiment::Negative),
            _ => None,
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse severity bucket derived from a crisis score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of thing a tracked subject is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectType {
    Handle,
    Keyword,
}

impl SubjectType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SubjectType::Handle => "handle",
            SubjectType::Keyword => "keyword",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<SubjectType> {
        match s.trim().to_ascii_lowercase().as_str() {
            "handle" => Some(SubjectType::Handle),
            "keyword" => Some(SubjectType::Keyword),
            _ => None,
        }
    }
}

impl std::fmt::Display for SubjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
