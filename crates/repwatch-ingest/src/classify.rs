//! Sentiment classification with a deterministic local fallback.
//!
//! The primary path is one call to an external classification service with
//! a constrained contract: exactly one of `positive`/`neutral`/`negative`.
//! The keyword fallback is documented behavior, not an accident of error
//! handling: it runs whenever the service is unreachable, times out, or
//! returns a label outside the permitted set, and it always produces a
//! legal label. `classify` never surfaces an error to the caller.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use repwatch_core::Sentiment;

use crate::error::IngestError;

/// Fixed positive-word set for the fallback heuristic.
const POSITIVE_WORDS: &[&str] = &[
    "great",
    "good",
    "excellent",
    "amazing",
    "love",
    "best",
    "fantastic",
    "wonderful",
    "awesome",
];

/// Fixed negative-word set for the fallback heuristic.
const NEGATIVE_WORDS: &[&str] = &[
    "bad",
    "poor",
    "terrible",
    "awful",
    "horrible",
    "worst",
    "disappointed",
    "disappointing",
];

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    label: String,
}

pub struct SentimentClassifier {
    http: reqwest::Client,
    service_url: Option<String>,
    timeout: Duration,
}

impl SentimentClassifier {
    /// `service_url` of `None` makes the keyword heuristic the only path.
    #[must_use]
    pub fn new(http: reqwest::Client, service_url: Option<String>, timeout_secs: u64) -> Self {
        Self {
            http,
            service_url,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Assigns a sentiment label to `text`. Always returns one of the three
    /// labels; service failures fall back to [`keyword_sentiment`].
    pub async fn classify(&self, text: &str) -> Sentiment {
        if let Some(url) = &self.service_url {
            match self.classify_remote(url, text).await {
                Ok(sentiment) => return sentiment,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "classification service unavailable, using keyword fallback"
                    );
                }
            }
        }
        keyword_sentiment(text)
    }

    async fn classify_remote(&self, url: &str, text: &str) -> Result<Sentiment, IngestError> {
        let response = self
            .http
            .post(url)
            .timeout(self.timeout)
            .json(&ClassifyRequest { text })
            .send()
            .await?
            .error_for_status()?;

        let body: ClassifyResponse = response.json().await?;
        Sentiment::parse(&body.label).ok_or_else(|| {
            IngestError::Classifier(format!("service returned unknown label '{}'", body.label))
        })
    }
}

/// Deterministic keyword scoring: counts case-insensitive substring
/// occurrences of the fixed word sets; the higher count wins, `neutral`
/// on a tie or when neither set matches.
#[must_use]
pub fn keyword_sentiment(text: &str) -> Sentiment {
    let lower = text.to_lowercase();
    let positive = POSITIVE_WORDS
        .iter()
        .filter(|w| lower.contains(*w))
        .count();
    let negative = NEGATIVE_WORDS
        .iter()
        .filter(|w| lower.contains(*w))
        .count();

    if positive > negative {
        Sentiment::Positive
    } else if negative > positive {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}
