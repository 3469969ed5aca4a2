//! Trigger service orchestrator
//!
//! Owns the active config and serializes every evaluation through one fair
//! async mutex, so concurrent trigger calls run strictly first-come
//! first-served against a consistent load-mutate-save cycle. All I/O goes
//! through the host-supplied ports.

use std::sync::Arc;

use campaign_core::error::{EngineError, Result};
use campaign_core::models::{
    Campaign, Config, DecisionTrace, Event, SkipReason, TraceResult, TriggerContext, TriggerReason,
    TriggerType,
};
use campaign_core::ports::{
    Clock, CampaignStateRepository, LifecycleStateReader, MessageScheduler,
};
use campaign_core::state::{CampaignStateSnapshot, QueuedMessage};
use campaign_core::validation::{parse_config, ValidationIssue};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::matcher;
use crate::processor::{self, Decision};

/// Outcome of one full evaluation
#[derive(Debug, Clone, serde::Serialize)]
pub struct TriggerResult {
    pub reason: TriggerReason,
    pub evaluated_at: DateTime<Utc>,
    /// One trace per campaign in the active config, plus cancellation traces
    pub traces: Vec<DecisionTrace>,
    /// Messages newly handed to the scheduler during this evaluation
    pub queued: Vec<QueuedMessage>,
}

impl TriggerResult {
    /// Campaign ids that produced a schedule call this evaluation
    pub fn applied_campaigns(&self) -> Vec<&str> {
        self.traces
            .iter()
            .filter(|t| t.result == TraceResult::Applied)
            .map(|t| t.campaign_id.as_str())
            .collect()
    }
}

struct Inner {
    config: Option<Arc<Config>>,
}

/// The campaign trigger engine
///
/// One instance per host application. Construction performs no I/O; the
/// engine is inert until `apply_config` installs a validated document.
pub struct TriggerEngine {
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn MessageScheduler>,
    repository: Arc<dyn CampaignStateRepository>,
    lifecycle: Arc<dyn LifecycleStateReader>,
    inner: Mutex<Inner>,
}

impl TriggerEngine {
    pub fn new(
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn MessageScheduler>,
        repository: Arc<dyn CampaignStateRepository>,
        lifecycle: Arc<dyn LifecycleStateReader>,
    ) -> Self {
        Self {
            clock,
            scheduler,
            repository,
            lifecycle,
            inner: Mutex::new(Inner { config: None }),
        }
    }

    /// Validate and install a config document, replacing the previous one
    /// wholesale
    ///
    /// Returns the validator's warnings on success. A rejected document
    /// leaves the previously active config untouched.
    ///
    /// # Errors
    ///
    /// `EngineError::ConfigRejected` carrying the full issue list when the
    /// document fails validation.
    pub async fn apply_config(&self, document: &serde_json::Value) -> Result<Vec<ValidationIssue>> {
        let (config, warnings) = parse_config(document)?;

        let mut inner = self.inner.lock().await;
        tracing::info!(
            config_version = %config.config_version,
            campaigns = config.campaigns.len(),
            warnings = warnings.len(),
            "Applying campaign config"
        );
        inner.config = Some(Arc::new(config));
        Ok(warnings)
    }

    /// Version string of the currently active config, if any
    pub async fn active_config_version(&self) -> Option<String> {
        let inner = self.inner.lock().await;
        inner
            .config
            .as_ref()
            .map(|config| config.config_version.clone())
    }

    /// Run one full evaluation of every campaign in the active config
    ///
    /// Evaluations are strictly serialized: a call made while another is in
    /// flight waits its turn and then observes the previous call's state.
    ///
    /// # Errors
    ///
    /// `EngineError::NotConfigured` when no config has been applied, or a
    /// storage error when the snapshot cannot be loaded or saved. Scheduler
    /// failures never fail the evaluation; they surface as
    /// `schedule_call_failed` traces for the affected campaigns.
    pub async fn trigger(&self, context: TriggerContext) -> Result<TriggerResult> {
        let inner = self.inner.lock().await;
        let config = inner
            .config
            .clone()
            .ok_or(EngineError::NotConfigured)?;

        let now = self.clock.now();
        tracing::debug!(reason = ?context.reason, now = %now, "Evaluation started");

        if context.reason == TriggerReason::AppForeground {
            self.lifecycle.set_foregrounded(true).await;
        }
        if let Some(event) = context.event.as_ref() {
            self.repository.append_event(event).await?;
        }

        let mut snapshot = self.repository.load_snapshot(now).await?;
        let mut traces = Vec::with_capacity(config.campaigns.len());
        let mut queued = Vec::new();

        // Event-tracked evaluations are latency-sensitive and skip the
        // scheduler round-trip; lifecycle evaluations reconcile first.
        if context.event.is_none() {
            self.reconcile(&config, &mut snapshot, now).await;
        }

        if let Some(event) = context.event.as_ref() {
            self.cancel_matching(&config, event, &mut snapshot, &mut traces)
                .await;
        }

        for (campaign_id, campaign) in &config.campaigns {
            let decision = processor::process_campaign(
                campaign_id,
                campaign,
                &context,
                &config.settings,
                &snapshot,
                now,
            );
            match decision {
                Decision::Trigger { message, anchor } => {
                    match self.scheduler.schedule(&message).await {
                        Ok(()) => {
                            tracing::info!(
                                campaign_id = %campaign_id,
                                message_id = %message.id,
                                execute_at = %message.execute_at,
                                "Message scheduled"
                            );
                            let detail = format!("Scheduled for {}", message.execute_at);
                            queued.push(message.clone());
                            snapshot.record_trigger(message, anchor, now);
                            traces.push(DecisionTrace::applied(campaign_id, detail));
                        }
                        Err(e) => {
                            // The campaign stays eligible for the next run
                            tracing::warn!(
                                campaign_id = %campaign_id,
                                error = %e,
                                "Schedule call failed, leaving campaign state untouched"
                            );
                            traces.push(DecisionTrace::skipped(
                                campaign_id,
                                SkipReason::ScheduleCallFailed,
                                format!("Scheduler rejected the message: {}", e),
                            ));
                        }
                    }
                }
                Decision::Skip { reason, detail } => {
                    tracing::debug!(
                        campaign_id = %campaign_id,
                        skip_reason = %reason,
                        detail = %detail,
                        "Campaign skipped"
                    );
                    traces.push(DecisionTrace::skipped(campaign_id, reason, detail));
                }
            }
        }

        snapshot.updated_at = now;
        self.repository.save_snapshot(&snapshot).await?;

        tracing::debug!(
            reason = ?context.reason,
            traces = traces.len(),
            "Evaluation finished"
        );
        Ok(TriggerResult {
            reason: context.reason,
            evaluated_at: now,
            traces,
            queued,
        })
    }

    /// Cancel everything pending and drop all persisted campaign state
    ///
    /// The active config stays installed; progress, queued messages and the
    /// frequency-cap ledger are cleared.
    pub async fn reset(&self) -> Result<()> {
        let _inner = self.inner.lock().await;
        let now = self.clock.now();

        let snapshot = self.repository.load_snapshot(now).await?;
        for message in &snapshot.queued_messages {
            if let Err(e) = self.scheduler.cancel(&message.id).await {
                tracing::warn!(
                    message_id = %message.id,
                    error = %e,
                    "Cancel during reset failed, continuing"
                );
            }
        }
        self.repository.clear_campaign_state().await?;
        tracing::info!("Campaign state reset");
        Ok(())
    }

    /// Align the local queued-message ledger with the host scheduler
    ///
    /// The scheduler listing is the source of truth: local rows the OS no
    /// longer holds are dropped (delivered or cleared externally), and live
    /// entries the ledger lost are re-adopted from the active config.
    /// Listing failures degrade to a warning; the evaluation proceeds on the
    /// local ledger alone.
    async fn reconcile(
        &self,
        config: &Config,
        snapshot: &mut CampaignStateSnapshot,
        now: DateTime<Utc>,
    ) {
        let pending = match self.scheduler.list_pending().await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::warn!(error = %e, "Pending listing failed, skipping reconciliation");
                return;
            }
        };

        let live_ids: Vec<String> = pending.iter().map(|p| p.id.clone()).collect();
        let dropped = snapshot.retain_queued(&live_ids);
        if !dropped.is_empty() {
            tracing::debug!(
                dropped = dropped.len(),
                "Dropped queued messages no longer held by the scheduler"
            );
        }

        for entry in pending {
            if snapshot.queued_messages.iter().any(|m| m.id == entry.id) {
                continue;
            }
            let Some(campaign) = config.campaigns.get(&entry.campaign_id) else {
                // Orphan from a removed campaign; clear it from the OS too
                tracing::warn!(
                    message_id = %entry.id,
                    campaign_id = %entry.campaign_id,
                    "Cancelling pending notification for unknown campaign"
                );
                if let Err(e) = self.scheduler.cancel(&entry.id).await {
                    tracing::warn!(message_id = %entry.id, error = %e, "Orphan cancel failed");
                }
                continue;
            };
            tracing::debug!(
                message_id = %entry.id,
                campaign_id = %entry.campaign_id,
                "Adopting live notification missing from the local ledger"
            );
            snapshot.upsert_queued(adopted_message(
                &entry.id,
                &entry.campaign_id,
                campaign,
                entry.execute_at,
                now,
            ));
        }
    }

    /// Cancel queued messages whose campaign's cancel condition matches the
    /// tracked event
    ///
    /// Only messages whose pending window contains the event's timestamp are
    /// affected: `created_at <= event.created_at <= execute_at`.
    async fn cancel_matching(
        &self,
        config: &Config,
        event: &Event,
        snapshot: &mut CampaignStateSnapshot,
        traces: &mut Vec<DecisionTrace>,
    ) {
        for (campaign_id, campaign) in &config.campaigns {
            // Cancellation is an event-trigger feature; an `event` branch
            // left populated on other trigger types is unreachable config
            if campaign.trigger.trigger_type != TriggerType::Event {
                continue;
            }
            let Some(cancel_condition) = campaign
                .trigger
                .event
                .as_ref()
                .and_then(|spec| spec.cancel_event.as_ref())
            else {
                continue;
            };
            if !matcher::matches_group(cancel_condition, event) {
                continue;
            }

            let in_window: Vec<String> = snapshot
                .queued_messages
                .iter()
                .filter(|m| {
                    m.campaign_id == *campaign_id
                        && m.created_at <= event.created_at
                        && event.created_at <= m.execute_at
                })
                .map(|m| m.id.clone())
                .collect();

            for message_id in in_window {
                match self.scheduler.cancel(&message_id).await {
                    Ok(()) => {
                        snapshot.remove_queued(&message_id);
                        snapshot.unlatch(campaign_id);
                        tracing::info!(
                            campaign_id = %campaign_id,
                            message_id = %message_id,
                            event_name = %event.name,
                            "Queued message cancelled by event"
                        );
                        traces.push(DecisionTrace::cancelled(
                            campaign_id,
                            format!("Cancelled by event '{}'", event.name),
                        ));
                    }
                    Err(e) => {
                        // Keep the local row so a later evaluation retries
                        tracing::warn!(
                            campaign_id = %campaign_id,
                            message_id = %message_id,
                            error = %e,
                            "Cancel call failed, keeping queued message"
                        );
                    }
                }
            }
        }
    }
}

/// Rebuild a ledger row for a live notification from its campaign's template
///
/// The original creation time is unknown, so the adoption instant stands in
/// for it; this keeps the cancellation window `[created_at, execute_at]`
/// open until the fire time.
fn adopted_message(
    id: &str,
    campaign_id: &str,
    campaign: &Campaign,
    execute_at: DateTime<Utc>,
    adopted_at: DateTime<Utc>,
) -> QueuedMessage {
    QueuedMessage {
        id: id.to_string(),
        campaign_id: campaign_id.to_string(),
        channel: campaign.message.channel,
        title: campaign.message.title.clone(),
        body: campaign.message.body.clone(),
        media_url: campaign.message.media_url.clone(),
        link_url: campaign.message.link_url.clone(),
        execute_at,
        trigger_type: campaign.trigger.trigger_type,
        event_id: None,
        created_at: adopted_at,
    }
}
