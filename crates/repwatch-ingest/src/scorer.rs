//! Crisis-risk scoring.
//!
//! Two scoring paths exist on purpose and must not be conflated:
//!
//! - [`score_mention`]: the full weighted model over sentiment, engagement,
//!   velocity, and per-platform aggregates.
//! - [`coarse_is_crisis`]: the per-mention fallback rule (negative
//!   sentiment plus a minimum text length) for call sites where aggregates
//!   are unavailable.

use repwatch_core::{Sentiment, Severity};

/// Alerting threshold applied to the final score; distinct from the
/// informational severity tier boundaries.
pub const DEFAULT_CRISIS_THRESHOLD: f64 = 0.7;

/// Minimum text length for the coarse fallback rule.
pub const COARSE_CRISIS_MIN_LEN: usize = 100;

const SENTIMENT_WEIGHT: f64 = 0.4;
const ENGAGEMENT_WEIGHT: f64 = 0.3;
const VELOCITY_WEIGHT: f64 = 0.3;

/// Engagement rate is capped here so viral outliers cannot contribute
/// beyond their weight.
const ENGAGEMENT_CAP: f64 = 1.0;

/// Mentions-per-window cap for the velocity signal.
const VELOCITY_CAP: f64 = 100.0;

/// A platform whose negative ratio exceeds this amplifies every new
/// mention from it.
const HOSTILE_RATIO: f64 = 0.7;
const HOSTILE_BOOST: f64 = 0.1;

/// Reference engagement count mapping raw counts onto a [0,1] rate.
const ENGAGEMENT_REFERENCE: f64 = 1_000.0;

/// Per-mention signals feeding the weighted model.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs {
    pub sentiment: Sentiment,
    /// Normalized engagement rate; capped at [`ENGAGEMENT_CAP`].
    pub engagement_rate: f64,
    /// Recent mentions per window; capped at [`VELOCITY_CAP`].
    pub mention_velocity: f64,
}

/// Aggregate mention counts for one platform over the current window.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformAggregates {
    pub negative_mentions: u64,
    pub total_mentions: u64,
}

impl PlatformAggregates {
    #[must_use]
    pub fn negative_ratio(&self) -> f64 {
        if self.total_mentions == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = self.negative_mentions as f64 / self.total_mentions as f64;
        ratio
    }
}

/// A computed crisis score with its severity tier.
#[derive(Debug, Clone, Copy)]
pub struct CrisisScore {
    pub score: f64,
    pub severity: Severity,
}

/// Maps sentiment onto the 0..1 scale the weighted model expects:
/// positive→1, neutral→0.5, negative→0. Negative sentiment therefore
/// contributes the most to the score.
#[must_use]
pub fn sentiment_unit(sentiment: Sentiment) -> f64 {
    match sentiment {
        Sentiment::Positive => 1.0,
        Sentiment::Neutral => 0.5,
        Sentiment::Negative => 0.0,
    }
}

/// Computes the weighted crisis score for one mention.
///
/// `(1 - sentiment_unit) * 0.4 + capped_engagement * 0.3 +
/// capped_velocity * 0.3`, plus `0.1` when the owning platform's aggregate
/// negative ratio exceeds `0.7`. The result is clamped to `[0, 1]`.
#[must_use]
pub fn score_mention(inputs: &ScoreInputs, platform: &PlatformAggregates) -> CrisisScore {
    let sentiment_term = (1.0 - sentiment_unit(inputs.sentiment)) * SENTIMENT_WEIGHT;
    let engagement_term =
        (inputs.engagement_rate.clamp(0.0, ENGAGEMENT_CAP) / ENGAGEMENT_CAP) * ENGAGEMENT_WEIGHT;
    let velocity_term =
        (inputs.mention_velocity.clamp(0.0, VELOCITY_CAP) / VELOCITY_CAP) * VELOCITY_WEIGHT;

    let mut score = sentiment_term + engagement_term + velocity_term;
    if platform.negative_ratio() > HOSTILE_RATIO {
        score += HOSTILE_BOOST;
    }
    let score = score.clamp(0.0, 1.0);

    CrisisScore {
        score,
        severity: severity_for(score),
    }
}

/// Informational severity tier for a score.
#[must_use]
pub fn severity_for(score: f64) -> Severity {
    if score >= 0.8 {
        Severity::Critical
    } else if score >= 0.6 {
        Severity::High
    } else if score >= 0.4 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Whether the score crosses the alerting threshold. Strictly greater:
/// a score exactly at the threshold does not alert.
#[must_use]
pub fn is_crisis(score: f64, threshold: f64) -> bool {
    score > threshold
}

/// Coarse fallback scoring path used when aggregates are unavailable:
/// negative sentiment on text longer than [`COARSE_CRISIS_MIN_LEN`].
#[must_use]
pub fn coarse_is_crisis(sentiment: Sentiment, text: &str) -> bool {
    sentiment == Sentiment::Negative && text.len() > COARSE_CRISIS_MIN_LEN
}

/// Maps a raw engagement count onto the model's rate scale.
#[must_use]
pub fn engagement_rate(count: i64) -> f64 {
    if count <= 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let rate = count as f64 / ENGAGEMENT_REFERENCE;
    rate
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_platform() -> PlatformAggregates {
        PlatformAggregates {
            negative_mentions: 1,
            total_mentions: 10,
        }
    }

    fn hostile_platform() -> PlatformAggregates {
        PlatformAggregates {
            negative_mentions: 9,
            total_mentions: 10,
        }
    }

    #[test]
    fn severity_tier_boundaries() {
        assert_eq!(severity_for(0.8), Severity::Critical);
        assert_eq!(severity_for(0.79999), Severity::High);
        assert_eq!(severity_for(0.6), Severity::High);
        assert_eq!(severity_for(0.59999), Severity::Medium);
        assert_eq!(severity_for(0.4), Severity::Medium);
        assert_eq!(severity_for(0.39999), Severity::Low);
    }

    #[test]
    fn negative_mention_on_hostile_platform_scores_half() {
        // (1-0)*0.4 + 0 + 0 + 0.1 = 0.5
        let result = score_mention(
            &ScoreInputs {
                sentiment: Sentiment::Negative,
                engagement_rate: 0.0,
                mention_velocity: 0.0,
            },
            &hostile_platform(),
        );
        assert!((result.score - 0.5).abs() < 1e-9, "got {}", result.score);
        assert_eq!(result.severity, Severity::Medium);
        assert!(!is_crisis(result.score, DEFAULT_CRISIS_THRESHOLD));
    }

    #[test]
    fn positive_mention_scores_near_zero() {
        let result = score_mention(
            &ScoreInputs {
                sentiment: Sentiment::Positive,
                engagement_rate: 0.0,
                mention_velocity: 0.0,
            },
            &quiet_platform(),
        );
        assert!((result.score - 0.0).abs() < 1e-9);
        assert_eq!(result.severity, Severity::Low);
    }

    #[test]
    fn engagement_and_velocity_are_capped() {
        // Viral outlier: engagement and velocity far beyond their caps can
        // contribute at most their full weights.
        let result = score_mention(
            &ScoreInputs {
                sentiment: Sentiment::Negative,
                engagement_rate: 50.0,
                mention_velocity: 10_000.0,
            },
            &hostile_platform(),
        );
        assert!((result.score - 1.0).abs() < 1e-9, "got {}", result.score);
        assert_eq!(result.severity, Severity::Critical);
    }

    #[test]
    fn score_is_always_within_unit_interval() {
        let sentiments = [Sentiment::Positive, Sentiment::Neutral, Sentiment::Negative];
        let rates = [0.0, 0.05, 0.5, 1.0, 3.0];
        let velocities = [0.0, 1.0, 50.0, 100.0, 100_000.0];
        for sentiment in sentiments {
            for engagement_rate in rates {
                for mention_velocity in velocities {
                    for platform in [quiet_platform(), hostile_platform()] {
                        let result = score_mention(
                            &ScoreInputs {
                                sentiment,
                                engagement_rate,
                                mention_velocity,
                            },
                            &platform,
                        );
                        assert!(
                            (0.0..=1.0).contains(&result.score),
                            "score out of range: {}",
                            result.score
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn threshold_is_strict() {
        assert!(!is_crisis(0.7, 0.7), "score at the threshold must not alert");
        assert!(is_crisis(0.700001, 0.7));
        assert!(!is_crisis(0.699999, 0.7));
    }

    #[test]
    fn hostile_platform_boost_requires_ratio_above_point_seven() {
        let exactly_at = PlatformAggregates {
            negative_mentions: 7,
            total_mentions: 10,
        };
        let inputs = ScoreInputs {
            sentiment: Sentiment::Neutral,
            engagement_rate: 0.0,
            mention_velocity: 0.0,
        };
        let at = score_mention(&inputs, &exactly_at);
        let above = score_mention(&inputs, &hostile_platform());
        assert!((at.score - 0.2).abs() < 1e-9, "ratio exactly 0.7 gets no boost");
        assert!((above.score - 0.3).abs() < 1e-9);
    }

    #[test]
    fn coarse_rule_requires_negative_and_length() {
        let long_text = "x".repeat(150);
        let short_text = "x".repeat(50);
        assert!(coarse_is_crisis(Sentiment::Negative, &long_text));
        assert!(!coarse_is_crisis(Sentiment::Negative, &short_text));
        assert!(!coarse_is_crisis(Sentiment::Neutral, &long_text));
        assert!(!coarse_is_crisis(Sentiment::Positive, &long_text));
    }

    #[test]
    fn empty_platform_aggregates_have_zero_ratio() {
        assert!((PlatformAggregates::default().negative_ratio() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn engagement_rate_maps_counts_onto_unit_scale() {
        assert!((engagement_rate(0) - 0.0).abs() < f64::EPSILON);
        assert!((engagement_rate(-5) - 0.0).abs() < f64::EPSILON);
        assert!((engagement_rate(500) - 0.5).abs() < 1e-9);
        assert!(engagement_rate(5_000) > 1.0, "capping happens in the scorer");
    }
}
