//! Raw platform payloads to canonical mention records.
//!
//! [`normalize`] is pure; sentiment and score fields are filled in later by
//! the classifier and scorer. A malformed item is an error for that item
//! only: [`normalize_batch`] skips and counts it, never failing the run.

use chrono::{DateTime, TimeZone, Utc};

use repwatch_core::Platform;

use crate::connectors::{RawItem, SubjectQuery};
use crate::error::IngestError;

/// Body text carried over from a forum post beneath its title.
const FORUM_BODY_SNIPPET_CHARS: usize = 280;

/// A normalized mention ready for classification, scoring, and persistence.
#[derive(Debug, Clone)]
pub struct NewMention {
    pub subject: String,
    pub is_competitor: bool,
    pub source: Platform,
    /// Forum sub-community, when the source has one.
    pub community: Option<String>,
    /// Stable dedup key, unique per source.
    pub external_ref: String,
    pub text: String,
    pub author: Option<String>,
    /// Timestamp of the original post, not of ingestion.
    pub created_at: DateTime<Utc>,
    /// Raw engagement count (likes/upvotes/reposts) for the scorer.
    pub engagement_count: i64,
}

/// Maps one raw item into a [`NewMention`].
///
/// # Errors
///
/// Returns [`IngestError::Normalization`] when the item lacks the fields a
/// stable record requires (dedup key, timestamp). Optional fields (author,
/// body) default to empty instead of failing.
pub fn normalize(subject: &SubjectQuery, raw: &RawItem) -> Result<NewMention, IngestError> {
    match raw {
        RawItem::Forum(post) => {
            let permalink = post
                .permalink
                .as_deref()
                .filter(|p| !p.is_empty())
                .ok_or_else(|| IngestError::Normalization("forum post missing permalink".into()))?;
            let created_at = epoch_secs_f64(post.created_utc.ok_or_else(|| {
                IngestError::Normalization("forum post missing created_utc".into())
            })?)?;

            let title = post.title.as_deref().unwrap_or_default().trim();
            let body = post.selftext.as_deref().unwrap_or_default().trim();
            let text = if body.is_empty() {
                title.to_string()
            } else {
                let snippet: String = body.chars().take(FORUM_BODY_SNIPPET_CHARS).collect();
                format!("{title} {snippet}")
            };

            Ok(NewMention {
                subject: subject.value.clone(),
                is_competitor: subject.is_competitor,
                source: Platform::Forum,
                community: post.community.clone(),
                external_ref: permalink.to_string(),
                text,
                author: post.author.clone(),
                created_at,
                engagement_count: post.ups.unwrap_or(0),
            })
        }
        RawItem::Microblog(post) => {
            if post.id.is_empty() {
                return Err(IngestError::Normalization(
                    "microblog post missing id".into(),
                ));
            }
            let created_at = rfc3339(post.created_at.as_deref().ok_or_else(|| {
                IngestError::Normalization("microblog post missing created_at".into())
            })?)?;

            Ok(NewMention {
                subject: subject.value.clone(),
                is_competitor: subject.is_competitor,
                source: Platform::Microblog,
                community: None,
                external_ref: post.id.clone(),
                text: post.text.clone(),
                author: post.author.clone(),
                created_at,
                engagement_count: post.engagement_count,
            })
        }
        RawItem::Video(comment) => {
            if comment.comment_id.is_empty() || comment.video_id.is_empty() {
                return Err(IngestError::Normalization(
                    "video comment missing id fields".into(),
                ));
            }
            let created_at = rfc3339(comment.published_at.as_deref().ok_or_else(|| {
                IngestError::Normalization("video comment missing publishedAt".into())
            })?)?;

            Ok(NewMention {
                subject: subject.value.clone(),
                is_competitor: subject.is_competitor,
                source: Platform::Video,
                community: None,
                // Composite key: comment ids are only unique within a video.
                external_ref: format!("{}:{}", comment.video_id, comment.comment_id),
                text: comment.text.clone().unwrap_or_default(),
                author: comment.author.clone(),
                created_at,
                engagement_count: comment.like_count,
            })
        }
        RawItem::PlaceReview(review) => {
            let time = review.time.ok_or_else(|| {
                IngestError::Normalization("place review missing timestamp".into())
            })?;
            let created_at = epoch_secs(time)?;
            let author = review.author_name.clone().unwrap_or_default();

            Ok(NewMention {
                subject: subject.value.clone(),
                is_competitor: subject.is_competitor,
                source: Platform::PlaceReview,
                community: None,
                // The provider exposes no review id; author + post time is
                // the stable composite within one place.
                external_ref: format!("{}:{}:{}", review.place_id, author, time),
                text: review.text.clone().unwrap_or_default(),
                author: review.author_name.clone(),
                created_at,
                engagement_count: 0,
            })
        }
    }
}

/// Normalizes a page of raw items, skipping malformed ones.
///
/// Returns the normalized mentions and the number of items skipped.
#[must_use]
pub fn normalize_batch(subject: &SubjectQuery, items: &[RawItem]) -> (Vec<NewMention>, usize) {
    let mut mentions = Vec::with_capacity(items.len());
    let mut skipped = 0usize;
    for item in items {
        match normalize(subject, item) {
            Ok(mention) => mentions.push(mention),
            Err(e) => {
                skipped += 1;
                tracing::warn!(subject = %subject.value, error = %e, "skipping malformed item");
            }
        }
    }
    (mentions, skipped)
}

fn epoch_secs(secs: i64) -> Result<DateTime<Utc>, IngestError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| IngestError::Normalization(format!("timestamp out of range: {secs}")))
}

fn epoch_secs_f64(secs: f64) -> Result<DateTime<Utc>, IngestError> {
    if !secs.is_finite() {
        return Err(IngestError::Normalization(format!(
            "timestamp not finite: {secs}"
        )));
    }
    #[allow(clippy::cast_possible_truncation)]
    epoch_secs(secs as i64)
}

fn rfc3339(raw: &str) -> Result<DateTime<Utc>, IngestError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| IngestError::Normalization(format!("bad timestamp '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::{ForumPost, MicroblogPost, PlaceReview, VideoComment};
    use repwatch_core::SubjectType;

    fn subject() -> SubjectQuery {
        SubjectQuery {
            value: "acme".to_string(),
            subject_type: SubjectType::Keyword,
            is_competitor: false,
        }
    }

    fn forum_post() -> ForumPost {
        ForumPost {
            title: Some("Acme ruined my order".to_string()),
            selftext: Some("long story short, never again".to_string()),
            permalink: Some("/r/consumer/comments/abc/post".to_string()),
            community: Some("consumer".to_string()),
            author: Some("buyer1".to_string()),
            ups: Some(42),
            created_utc: Some(1_700_000_000.0),
        }
    }

    #[test]
    fn forum_post_normalizes_with_epoch_conversion() {
        let mention = normalize(&subject(), &RawItem::Forum(forum_post())).unwrap();
        assert_eq!(mention.source, Platform::Forum);
        assert_eq!(mention.external_ref, "/r/consumer/comments/abc/post");
        assert_eq!(mention.community.as_deref(), Some("consumer"));
        assert_eq!(mention.created_at.timestamp(), 1_700_000_000);
        assert_eq!(mention.engagement_count, 42);
        assert!(mention.text.starts_with("Acme ruined my order"));
    }

    #[test]
    fn forum_post_without_permalink_is_malformed() {
        let mut post = forum_post();
        post.permalink = None;
        let result = normalize(&subject(), &RawItem::Forum(post));
        assert!(matches!(result, Err(IngestError::Normalization(_))));
    }

    #[test]
    fn microblog_post_missing_author_defaults_to_none() {
        let post = MicroblogPost {
            id: "9001".to_string(),
            text: "acme again".to_string(),
            author: None,
            created_at: Some("2026-08-01T12:00:00Z".to_string()),
            engagement_count: 3,
        };
        let mention = normalize(&subject(), &RawItem::Microblog(post)).unwrap();
        assert_eq!(mention.external_ref, "9001");
        assert!(mention.author.is_none());
    }

    #[test]
    fn video_comment_gets_composite_external_ref() {
        let comment = VideoComment {
            comment_id: "c77".to_string(),
            video_id: "vid-9".to_string(),
            text: None,
            author: Some("viewer".to_string()),
            published_at: Some("2026-08-02T08:30:00Z".to_string()),
            like_count: 5,
        };
        let mention = normalize(&subject(), &RawItem::Video(comment)).unwrap();
        assert_eq!(mention.external_ref, "vid-9:c77");
        assert_eq!(mention.text, "", "missing body defaults to empty");
    }

    #[test]
    fn place_review_gets_composite_external_ref() {
        let review = PlaceReview {
            place_id: "place-1".to_string(),
            author_name: Some("Pat".to_string()),
            rating: Some(1),
            text: Some("cold food".to_string()),
            time: Some(1_700_000_000),
        };
        let mention = normalize(&subject(), &RawItem::PlaceReview(review)).unwrap();
        assert_eq!(mention.external_ref, "place-1:Pat:1700000000");
        assert_eq!(mention.source, Platform::PlaceReview);
    }

    #[test]
    fn batch_skips_malformed_items_and_counts_them() {
        let mut bad = forum_post();
        bad.created_utc = None;
        let items = vec![
            RawItem::Forum(forum_post()),
            RawItem::Forum(bad),
            RawItem::Forum(forum_post()),
        ];
        let (mentions, skipped) = normalize_batch(&subject(), &items);
        assert_eq!(mentions.len(), 2);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn competitor_flag_propagates() {
        let competitor = SubjectQuery {
            value: "rival".to_string(),
            subject_type: SubjectType::Keyword,
            is_competitor: true,
        };
        let mention = normalize(&competitor, &RawItem::Forum(forum_post())).unwrap();
        assert!(mention.is_competitor);
    }
}
