//! Per-campaign decision procedure
//!
//! Given one campaign, the firing context and the current state snapshot,
//! produces either a trigger (with a fully rendered queued message) or a
//! skip with a machine-readable reason. Checks run in a fixed order and the
//! first failing check wins. Nothing here mutates shared state; mutation
//! happens in the orchestrator after a successful schedule call.

use campaign_core::models::{
    Campaign, CampaignSettings, CampaignStatus, SkipReason, TriggerContext, TriggerType,
};
use campaign_core::state::{CampaignProgress, CampaignStateSnapshot, QueuedMessage};
use chrono::{DateTime, Duration, Utc};

use crate::matcher;
use crate::recurrence;
use crate::schedule::{self, ScheduleOutcome, ScheduleTime};
use crate::template;

/// Outcome of processing one campaign in one evaluation
#[derive(Debug, Clone)]
pub enum Decision {
    /// Schedule this message; `anchor` seeds recurring occurrence math
    Trigger {
        message: QueuedMessage,
        anchor: Option<DateTime<Utc>>,
    },
    Skip {
        reason: SkipReason,
        detail: String,
    },
}

impl Decision {
    fn skip(reason: SkipReason, detail: impl Into<String>) -> Self {
        Decision::Skip { reason, detail: detail.into() }
    }
}

/// Run the ordered decision procedure for one campaign
pub fn process_campaign(
    campaign_id: &str,
    campaign: &Campaign,
    context: &TriggerContext,
    settings: &CampaignSettings,
    snapshot: &CampaignStateSnapshot,
    now: DateTime<Utc>,
) -> Decision {
    let trigger_type = campaign.trigger.trigger_type;

    // CHECK 1: campaign must be running
    if campaign.status != CampaignStatus::Running {
        return Decision::skip(SkipReason::CampaignNotRunning, "Campaign is paused");
    }

    // CHECK 2: trigger-kind eligibility — event campaigns evaluate only on
    // event-tracked contexts, scheduled/recurring only on the others
    let event_context = context.event.is_some();
    if (trigger_type == TriggerType::Event) != event_context {
        return Decision::skip(
            SkipReason::TriggerTypeMismatch,
            format!(
                "Trigger type '{}' is not eligible for a {} context",
                trigger_type,
                if event_context { "tracked-event" } else { "lifecycle" }
            ),
        );
    }

    let progress = snapshot.progress(campaign_id);

    // CHECK 3: one-shot semantics for non-recurring campaigns
    if trigger_type != TriggerType::Recurring && progress.is_some_and(|p| p.triggered) {
        return Decision::skip(SkipReason::AlreadyTriggered, "Campaign already triggered");
    }

    // CHECK 4: rolling cross-campaign frequency cap
    if let Some(cap) = settings.frequency_cap {
        let since = now - Duration::seconds(i64::from(cap.window_seconds));
        let recent = snapshot.triggers_since(since);
        if recent >= cap.max_count as usize {
            return Decision::skip(
                SkipReason::CampaignFrequencyCapExceeded,
                format!(
                    "{} trigger(s) in the last {}s (max {})",
                    recent, cap.window_seconds, cap.max_count
                ),
            );
        }
    }

    // CHECK 5: a recurring campaign with a pending future message never
    // creates a second occurrence
    if trigger_type == TriggerType::Recurring {
        if let Some(pending) = snapshot.future_queued(campaign_id, now) {
            return Decision::skip(
                SkipReason::OccurrenceAlreadyQueued,
                format!("Occurrence already queued for {}", pending.execute_at),
            );
        }
    }

    // CHECK 6: resolve an execute time per trigger-type rules
    let (execute_at, anchor) = match resolve_trigger_time(campaign_id, campaign, context, progress, now) {
        Ok(resolved) => resolved,
        Err(decision) => return decision,
    };

    // CHECK 7: duplicate-schedule guard on the exact (campaign, fire time)
    if snapshot.queued_at(campaign_id, execute_at).is_some() {
        return Decision::skip(
            SkipReason::DuplicateSchedule,
            format!("A message is already queued for {}", execute_at),
        );
    }

    // CHECK 8: quiet-hours suppression
    let execute_at = match schedule::resolve_execute_time(
        now,
        ScheduleTime::At(execute_at),
        settings.quiet_hours,
    ) {
        ScheduleOutcome::Resolved(at) => at,
        ScheduleOutcome::SuppressedQuietHours(at) => {
            return Decision::skip(
                SkipReason::QuietHoursSuppressed,
                format!("Execute time {} falls inside quiet hours", at),
            );
        }
    };

    // CHECK 9: render and build the queued message
    let properties = context
        .event
        .as_ref()
        .and_then(|event| event.properties.as_ref());
    let message = QueuedMessage {
        id: uuid::Uuid::new_v4().to_string(),
        campaign_id: campaign_id.to_string(),
        channel: campaign.message.channel,
        title: template::render_template(&campaign.message.title, properties),
        body: template::render_template(&campaign.message.body, properties),
        media_url: campaign.message.media_url.clone(),
        link_url: campaign.message.link_url.clone(),
        execute_at,
        trigger_type,
        event_id: context.event.as_ref().map(|e| e.id.clone()),
        created_at: now,
    };

    tracing::debug!(
        campaign_id = campaign_id,
        execute_at = %execute_at,
        trigger_type = %trigger_type,
        "Campaign produced a trigger"
    );

    Decision::Trigger { message, anchor }
}

/// Trigger-type specific execute-time resolution (check 6)
fn resolve_trigger_time(
    campaign_id: &str,
    campaign: &Campaign,
    context: &TriggerContext,
    progress: Option<&CampaignProgress>,
    now: DateTime<Utc>,
) -> Result<(DateTime<Utc>, Option<DateTime<Utc>>), Decision> {
    match campaign.trigger.trigger_type {
        TriggerType::Event => {
            let Some(spec) = campaign.trigger.event.as_ref() else {
                // Unreachable for validated configs
                return Err(Decision::skip(
                    SkipReason::ConditionNotMatched,
                    "Trigger has no event configuration",
                ));
            };
            let Some(event) = context.event.as_ref() else {
                // Unreachable: eligibility already required an event context
                return Err(Decision::skip(
                    SkipReason::TriggerTypeMismatch,
                    "Event trigger evaluated without an event",
                ));
            };
            if !matcher::matches_group(&spec.condition, event) {
                return Err(Decision::skip(
                    SkipReason::ConditionNotMatched,
                    format!("Event '{}' does not satisfy the condition group", event.name),
                ));
            }
            let delay = spec.delay_seconds.unwrap_or(0);
            Ok((now + Duration::seconds(i64::from(delay)), None))
        }
        TriggerType::Scheduled => {
            let Some(spec) = campaign.trigger.scheduled.as_ref() else {
                return Err(Decision::skip(
                    SkipReason::ScheduledTimeInPast,
                    "Trigger has no scheduled configuration",
                ));
            };
            if spec.start_at <= now {
                return Err(Decision::skip(
                    SkipReason::ScheduledTimeInPast,
                    format!("Scheduled time {} is not in the future", spec.start_at),
                ));
            }
            Ok((spec.start_at, None))
        }
        TriggerType::Recurring => {
            let Some(spec) = campaign.trigger.recurring.as_ref() else {
                return Err(Decision::skip(
                    SkipReason::NoUpcomingOccurrence,
                    "Trigger has no recurring configuration",
                ));
            };
            let anchor = spec
                .start_at
                .or(progress.and_then(|p| p.anchor))
                .unwrap_or_else(|| recurrence::default_anchor(&spec.recurrence, now));
            let bound = recurrence::resume_bound(progress.and_then(|p| p.last_scheduled_at), now);

            match recurrence::next_occurrence(&spec.recurrence, anchor, bound, spec.end_at) {
                Some(next) => Ok((next, Some(anchor))),
                None => Err(Decision::skip(
                    SkipReason::NoUpcomingOccurrence,
                    format!("No occurrence before {:?} for campaign '{}'", spec.end_at, campaign_id),
                )),
            }
        }
    }
}
