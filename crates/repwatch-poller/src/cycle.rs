use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;

use repwatch_alerts::{ChannelPreferences, CrisisAlert, Dispatcher};
use repwatch_core::{AppConfig, Platform, Sentiment, SubjectType};
use repwatch_db::{
    get_alert_settings, list_tracked_subjects, list_unprocessed_crisis_mentions, mark_alerted,
    mark_non_crisis_processed, mark_processed, upsert_mention, DbError, TrackedSubjectRow,
    UpsertMention,
};
use repwatch_ingest::scorer::{
    engagement_rate, is_crisis, score_mention, severity_for, PlatformAggregates, ScoreInputs,
};
use repwatch_ingest::{
    build_connectors, normalize_batch, Connector, IngestError, NewMention, SentimentClassifier,
    SubjectQuery,
};

/// Pages followed per platform per subject within one cycle.
const MAX_PAGES_PER_PLATFORM: usize = 2;

/// Summary of one completed (possibly partial) poll cycle.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CycleReport {
    /// Subjects polled without error.
    pub polled: u64,
    /// Failed subjects plus alert-pass failures.
    pub errors: u64,
    /// Mentions for which at least one channel delivered.
    pub alerts_sent: u64,
}

#[derive(Debug, Error)]
pub enum CycleError {
    /// A cycle is already running; overlapping runs are not permitted.
    #[error("a poll cycle is already in progress")]
    CycleInProgress,

    /// Tracked subjects could not be enumerated; fatal to the cycle.
    #[error("failed to list tracked subjects: {0}")]
    Subjects(#[source] DbError),

    /// The persistence layer is unreachable; fatal to the cycle.
    #[error("database error: {0}")]
    Db(#[source] DbError),

    #[error("poller initialization failed: {0}")]
    Init(String),
}

pub struct Poller {
    pool: PgPool,
    config: Arc<AppConfig>,
    connectors: Vec<Arc<dyn Connector>>,
    classifier: Arc<SentimentClassifier>,
    dispatcher: Arc<Dispatcher>,
    run_lock: tokio::sync::Mutex<()>,
}

impl Poller {
    #[must_use]
    pub fn new(
        pool: PgPool,
        config: Arc<AppConfig>,
        connectors: Vec<Arc<dyn Connector>>,
        classifier: Arc<SentimentClassifier>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            pool,
            config,
            connectors,
            classifier,
            dispatcher,
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Builds a poller with connectors, classifier, and dispatcher wired
    /// from configuration. Constructed once per process.
    ///
    /// # Errors
    ///
    /// Returns [`CycleError::Init`] if the HTTP client or a configured
    /// alert transport cannot be built.
    pub fn from_config(pool: PgPool, config: Arc<AppConfig>) -> Result<Self, CycleError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent(&config.fetch_user_agent)
            .build()
            .map_err(|e| CycleError::Init(e.to_string()))?;

        let (connectors, _credentials) = build_connectors(&config, &http);
        let classifier = SentimentClassifier::new(
            http.clone(),
            config.classifier_url.clone(),
            config.classifier_timeout_secs,
        );
        let dispatcher = Dispatcher::from_config(&config, http)
            .map_err(|e| CycleError::Init(e.to_string()))?;

        Ok(Self::new(
            pool,
            config,
            connectors.into_iter().map(Arc::from).collect(),
            Arc::new(classifier),
            Arc::new(dispatcher),
        ))
    }

    /// Runs one complete cycle: batched subject polling, then the alert
    /// pass. Cycles are serialized: a concurrent trigger gets
    /// [`CycleError::CycleInProgress`] instead of a duplicate-fetch race.
    ///
    /// # Errors
    ///
    /// Only two conditions are fatal: subjects cannot be listed, or the
    /// persistence layer is unreachable. Per-subject and per-channel
    /// failures are counted into the report and the cycle continues.
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            return Err(CycleError::CycleInProgress);
        };

        let started = Instant::now();
        let budget = Duration::from_secs(self.config.poll_cycle_budget_secs);
        let delay = Duration::from_millis(self.config.poll_inter_batch_delay_ms);

        let subjects = list_tracked_subjects(&self.pool)
            .await
            .map_err(CycleError::Subjects)?;
        tracing::info!(subjects = subjects.len(), "poll cycle started");

        let mut report = CycleReport::default();
        let suspended: Arc<tokio::sync::Mutex<HashSet<Platform>>> = Arc::default();

        let batches: Vec<&[TrackedSubjectRow]> =
            subjects.chunks(self.config.poll_batch_size).collect();
        let total_batches = batch_count(subjects.len(), self.config.poll_batch_size);
        tracing::debug!(
            batches = total_batches,
            delays = inter_batch_delays(total_batches),
            "cycle batch plan"
        );

        for (index, batch) in batches.into_iter().enumerate() {
            // Delay between batches only, not before the first or after
            // the last, to respect platform-wide rate limits.
            if index > 0 {
                tokio::time::sleep(delay).await;
            }
            if started.elapsed() >= budget {
                tracing::warn!(
                    completed_batches = index,
                    total_batches,
                    "cycle wall-clock budget exceeded, aborting remaining batches"
                );
                break;
            }

            let results: Vec<u64> = stream::iter(batch.to_vec())
                .map(|subject| {
                    let suspended = Arc::clone(&suspended);
                    async move { self.poll_subject(&subject, suspended).await }
                })
                .buffer_unordered(self.config.poll_max_concurrent_subjects)
                .collect()
                .await;

            for subject_errors in results {
                if subject_errors == 0 {
                    report.polled += 1;
                } else {
                    report.errors += 1;
                }
            }
        }

        let (alerts_sent, alert_errors) = self.alert_pass().await?;
        report.alerts_sent = alerts_sent;
        report.errors += alert_errors;

        tracing::info!(
            polled = report.polled,
            errors = report.errors,
            alerts_sent = report.alerts_sent,
            elapsed_secs = started.elapsed().as_secs(),
            "poll cycle finished"
        );
        Ok(report)
    }

    /// Fetch → normalize → classify → score → persist for one subject.
    /// Returns the number of errors observed (0 means a clean poll).
    async fn poll_subject(
        &self,
        row: &TrackedSubjectRow,
        suspended: Arc<tokio::sync::Mutex<HashSet<Platform>>>,
    ) -> u64 {
        let Some(subject_type) = SubjectType::parse(&row.subject_type) else {
            tracing::error!(subject = %row.value, kind = %row.subject_type, "unknown subject type");
            return 1;
        };
        let query = SubjectQuery {
            value: row.value.clone(),
            subject_type,
            is_competitor: row.is_competitor,
        };

        let mut errors = 0u64;
        let mut collected: Vec<NewMention> = Vec::new();

        for connector in &self.connectors {
            let platform = connector.platform();
            if suspended.lock().await.contains(&platform) {
                tracing::debug!(subject = %query.value, platform = %platform, "platform suspended, skipping");
                continue;
            }

            let mut cursor: Option<String> = None;
            for _ in 0..MAX_PAGES_PER_PLATFORM {
                match connector.fetch_mentions(&query, cursor.as_deref()).await {
                    Ok(page) => {
                        let (mentions, skipped) = normalize_batch(&query, &page.items);
                        if skipped > 0 {
                            tracing::warn!(
                                subject = %query.value,
                                platform = %platform,
                                skipped,
                                "skipped malformed items"
                            );
                        }
                        collected.extend(mentions);
                        cursor = page.next_cursor;
                        if cursor.is_none() {
                            break;
                        }
                    }
                    Err(IngestError::RateLimited {
                        retry_after_secs, ..
                    }) => {
                        tracing::warn!(
                            platform = %platform,
                            retry_after_secs,
                            "platform rate limited, suspending for the rest of the cycle"
                        );
                        suspended.lock().await.insert(platform);
                        errors += 1;
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(
                            subject = %query.value,
                            platform = %platform,
                            error = %e,
                            "connector fetch failed"
                        );
                        errors += 1;
                        break;
                    }
                }
            }
        }

        if collected.is_empty() {
            return errors;
        }

        let mut sentiments: Vec<Sentiment> = Vec::with_capacity(collected.len());
        for mention in &collected {
            sentiments.push(self.classifier.classify(&mention.text).await);
        }

        // Aggregate negative ratios per platform over this cycle's batch;
        // a platform already trending hostile amplifies every new mention.
        let mut aggregates: HashMap<Platform, PlatformAggregates> = HashMap::new();
        for (mention, sentiment) in collected.iter().zip(&sentiments) {
            let entry = aggregates.entry(mention.source).or_default();
            entry.total_mentions += 1;
            if *sentiment == Sentiment::Negative {
                entry.negative_mentions += 1;
            }
        }

        for (mention, sentiment) in collected.iter().zip(&sentiments) {
            let platform_aggregates = aggregates
                .get(&mention.source)
                .copied()
                .unwrap_or_default();
            #[allow(clippy::cast_precision_loss)]
            let mention_velocity = platform_aggregates.total_mentions as f64;
            let inputs = ScoreInputs {
                sentiment: *sentiment,
                engagement_rate: engagement_rate(mention.engagement_count),
                mention_velocity,
            };
            let crisis = score_mention(&inputs, &platform_aggregates);

            let record = UpsertMention {
                user_id: row.user_id,
                subject: &mention.subject,
                source: mention.source.as_str(),
                community: mention.community.as_deref(),
                external_ref: &mention.external_ref,
                text: &mention.text,
                author: mention.author.as_deref(),
                created_at: mention.created_at,
                sentiment: sentiment.as_str(),
                crisis_score: crisis.score,
                is_crisis: is_crisis(crisis.score, self.config.crisis_threshold),
                is_competitor: mention.is_competitor,
            };
            if let Err(e) = upsert_mention(&self.pool, &record).await {
                tracing::error!(
                    subject = %query.value,
                    external_ref = %mention.external_ref,
                    error = %e,
                    "mention upsert failed"
                );
                errors += 1;
            }
        }

        tracing::debug!(
            subject = %query.value,
            mentions = collected.len(),
            errors,
            "subject polled"
        );
        errors
    }

    /// Dispatches alerts for crisis mentions not yet fully attempted, then
    /// sweeps calm mentions into the processed state.
    async fn alert_pass(&self) -> Result<(u64, u64), CycleError> {
        let candidates =
            list_unprocessed_crisis_mentions(&self.pool, self.config.poll_alert_limit)
                .await
                .map_err(CycleError::Db)?;

        let mut alerts_sent = 0u64;
        let mut errors = 0u64;

        for mention in candidates {
            match get_alert_settings(&self.pool, mention.user_id).await {
                Ok(Some(settings)) => {
                    let alert = CrisisAlert {
                        subject: mention.subject.clone(),
                        platform: mention.source.clone(),
                        severity: severity_for(mention.crisis_score),
                        crisis_score: mention.crisis_score,
                        text: mention.text.clone(),
                        external_ref: mention.external_ref.clone(),
                        author: mention.author.clone(),
                        created_at: mention.created_at,
                    };
                    let prefs = ChannelPreferences {
                        email: settings.email,
                        email_enabled: settings.email_enabled,
                        webhook_url: settings.webhook_url,
                        webhook_enabled: settings.webhook_enabled,
                        sms_to: settings.sms_to,
                        sms_enabled: settings.sms_enabled,
                    };

                    let dispatch = self.dispatcher.dispatch(&alert, &prefs).await;
                    errors += dispatch.failed() as u64;
                    if dispatch.any_delivered() {
                        alerts_sent += 1;
                    }
                    // Every enabled channel has been attempted; the record
                    // transitions regardless of per-channel failures.
                    if let Err(e) = mark_alerted(&self.pool, mention.id).await {
                        tracing::error!(mention = mention.id, error = %e, "mark_alerted failed");
                        errors += 1;
                    }
                }
                Ok(None) => {
                    // Nothing configured yet; evaluated, but left in the
                    // queued-not-alerted set for when settings appear.
                    tracing::debug!(
                        mention = mention.id,
                        "no alert settings for owner, deferring dispatch"
                    );
                    if let Err(e) = mark_processed(&self.pool, mention.id).await {
                        tracing::error!(mention = mention.id, error = %e, "mark_processed failed");
                        errors += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(mention = mention.id, error = %e, "failed to load alert settings");
                    errors += 1;
                }
            }
        }

        match mark_non_crisis_processed(&self.pool).await {
            Ok(swept) if swept > 0 => {
                tracing::debug!(swept, "marked non-crisis mentions processed");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "non-crisis sweep failed");
                errors += 1;
            }
        }

        Ok((alerts_sent, errors))
    }
}

/// Number of batches a subject list splits into.
fn batch_count(total: usize, batch_size: usize) -> usize {
    total.div_ceil(batch_size)
}

/// Number of inter-batch delays observed in one cycle: between consecutive
/// batches only, never before the first or after the last.
fn inter_batch_delays(batches: usize) -> usize {
    batches.saturating_sub(1)
}
