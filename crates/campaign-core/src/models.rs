//! Data models for campaign configs, events and decision traces
//!
//! A `Config` is the immutable declarative document the engine evaluates
//! against; it is replaced wholesale on each successful `apply_config`, never
//! patched in place. All mutable progress lives in the state aggregate
//! (`crate::state`), not here.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The schema literal accepted by the validator
pub const SCHEMA_VERSION: &str = "2024-06-01";

/// Maximum rendered/configured message title length
pub const MAX_TITLE_LENGTH: usize = 120;

/// Maximum rendered/configured message body length
pub const MAX_BODY_LENGTH: usize = 500;

/// Versioned root config document
///
/// `campaigns` is a BTreeMap so that evaluation order is the config's own
/// key order, deterministically, regardless of insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub schema_version: String,
    /// Opaque version string, used only for observability
    pub config_version: String,
    #[serde(default)]
    pub settings: CampaignSettings,
    pub campaigns: BTreeMap<String, Campaign>,
}

/// Global engine settings shared by all campaigns
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignSettings {
    /// Rolling cross-campaign trigger limit
    pub frequency_cap: Option<FrequencyCap>,
    /// Local-time window during which scheduling is suppressed
    pub quiet_hours: Option<QuietHours>,
}

/// Rolling-window limit on total triggers across all campaigns
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FrequencyCap {
    pub max_count: u32,
    pub window_seconds: u32,
}

/// Do-not-disturb window in local wall-clock hours
///
/// Wraps around midnight when `start_hour > end_hour`
/// (e.g. 22..7 covers 22,23,0..6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuietHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

/// A named rule combining a trigger and a message template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub status: CampaignStatus,
    pub trigger: TriggerSpec,
    pub message: Message,
}

/// Campaign lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Running,
    Paused,
}

/// Trigger configuration
///
/// Only the branch named by `trigger_type` is consulted at runtime. Extra
/// populated branches are structurally unreachable; the validator surfaces
/// them as a warning rather than rejecting the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerSpec {
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    pub event: Option<EventTriggerSpec>,
    pub scheduled: Option<ScheduledTriggerSpec>,
    pub recurring: Option<RecurringTriggerSpec>,
}

/// The condition type that activates a campaign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Event,
    Scheduled,
    Recurring,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::Event => "event",
            TriggerType::Scheduled => "scheduled",
            TriggerType::Recurring => "recurring",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event-triggered campaign configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventTriggerSpec {
    /// Condition group the tracked event must satisfy
    pub condition: ConditionGroup,
    /// Delay between the triggering evaluation and the fire time
    pub delay_seconds: Option<u32>,
    /// Condition group that, when matched by a later event inside the
    /// pending window, cancels the queued message
    pub cancel_event: Option<ConditionGroup>,
}

/// One-shot scheduled campaign configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTriggerSpec {
    pub start_at: DateTime<Utc>,
}

/// Recurring campaign configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringTriggerSpec {
    pub recurrence: Recurrence,
    /// Explicit anchor for occurrence math; defaults to the persisted anchor,
    /// then to "now" on first evaluation
    pub start_at: Option<DateTime<Utc>>,
    /// No occurrence is produced at or after this instant
    pub end_at: Option<DateTime<Utc>>,
}

/// Recurrence rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recurrence {
    pub frequency: RecurrenceFrequency,
    /// Step between occurrences, in `frequency` units (>= 1)
    pub interval: u32,
    pub time_of_day: Option<TimeOfDay>,
    /// Weekly only: candidate weekdays; defaults to the anchor's weekday
    pub weekdays: Option<Vec<Weekday>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceFrequency {
    Hourly,
    Daily,
    Weekly,
}

/// Wall-clock time of day applied to daily/weekly occurrences
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

/// Day-of-week names accepted in recurrence rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    /// Offset from Monday, matching chrono's `num_days_from_monday`
    pub fn days_from_monday(&self) -> u32 {
        match self {
            Weekday::Monday => 0,
            Weekday::Tuesday => 1,
            Weekday::Wednesday => 2,
            Weekday::Thursday => 3,
            Weekday::Friday => 4,
            Weekday::Saturday => 5,
            Weekday::Sunday => 6,
        }
    }
}

/// Message template attached to a campaign
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub channel: ChannelType,
    pub title: String,
    pub body: String,
    pub media_url: Option<String>,
    pub link_url: Option<String>,
}

/// Delivery channel for a campaign message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    LocalPush,
    InApp,
}

/// A tracked application event
///
/// Events are ephemeral inputs; the core does not persist them (the
/// repository's event-log hook is a host concern).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub source_type: EventSourceType,
    /// Flat or nested property bag
    pub properties: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Build an app-originated event with a fresh id
    pub fn app(name: impl Into<String>, properties: Option<serde_json::Value>, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            source_type: EventSourceType::App,
            properties,
            created_at: now,
        }
    }
}

/// Where an event originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSourceType {
    /// Tracked by the host application
    App,
    /// Emitted by the engine itself (message lifecycle signals)
    System,
}

/// Boolean connector over an ordered list of conditions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionGroup {
    pub connector: Connector,
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connector {
    And,
    Or,
}

/// A single comparison against an event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    /// What the left-hand side is read from
    pub field: ConditionField,
    /// Property path, consulted only when `field` is `property`
    pub property_name: Option<String>,
    pub operator: ConditionOperator,
    /// Right-hand side; absent for `exists` / `not_exists`
    pub value: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionField {
    EventName,
    Property,
}

/// Supported comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Matches,
    In,
    NotIn,
    Exists,
    NotExists,
}

/// What caused an evaluation to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    EngineStart,
    AppForeground,
    EventTracked,
    ConfigUpdated,
}

/// One firing context handed to the trigger service
#[derive(Debug, Clone)]
pub struct TriggerContext {
    pub reason: TriggerReason,
    /// Present only for event-tracked contexts
    pub event: Option<Event>,
}

impl TriggerContext {
    pub fn engine_start() -> Self {
        Self { reason: TriggerReason::EngineStart, event: None }
    }

    pub fn app_foreground() -> Self {
        Self { reason: TriggerReason::AppForeground, event: None }
    }

    pub fn config_updated() -> Self {
        Self { reason: TriggerReason::ConfigUpdated, event: None }
    }

    pub fn event_tracked(event: Event) -> Self {
        Self { reason: TriggerReason::EventTracked, event: Some(event) }
    }
}

/// Machine-readable skip reasons (closed enum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    CampaignNotRunning,
    TriggerTypeMismatch,
    AlreadyTriggered,
    CampaignFrequencyCapExceeded,
    OccurrenceAlreadyQueued,
    ConditionNotMatched,
    ScheduledTimeInPast,
    NoUpcomingOccurrence,
    DuplicateSchedule,
    QuietHoursSuppressed,
    ScheduleCallFailed,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::CampaignNotRunning => "campaign_not_running",
            SkipReason::TriggerTypeMismatch => "trigger_type_mismatch",
            SkipReason::AlreadyTriggered => "already_triggered",
            SkipReason::CampaignFrequencyCapExceeded => "campaign_frequency_cap_exceeded",
            SkipReason::OccurrenceAlreadyQueued => "occurrence_already_queued",
            SkipReason::ConditionNotMatched => "condition_not_matched",
            SkipReason::ScheduledTimeInPast => "scheduled_time_in_past",
            SkipReason::NoUpcomingOccurrence => "no_upcoming_occurrence",
            SkipReason::DuplicateSchedule => "duplicate_schedule",
            SkipReason::QuietHoursSuppressed => "quiet_hours_suppressed",
            SkipReason::ScheduleCallFailed => "schedule_call_failed",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one campaign in one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceResult {
    Applied,
    Skipped,
    Cancelled,
}

/// One audit record per campaign per evaluation
///
/// Returned to the caller; never persisted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTrace {
    pub campaign_id: String,
    pub result: TraceResult,
    pub skip_reason: Option<SkipReason>,
    /// Human-readable explanation
    pub detail: String,
}

impl DecisionTrace {
    pub fn applied(campaign_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            campaign_id: campaign_id.into(),
            result: TraceResult::Applied,
            skip_reason: None,
            detail: detail.into(),
        }
    }

    pub fn skipped(
        campaign_id: impl Into<String>,
        reason: SkipReason,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            campaign_id: campaign_id.into(),
            result: TraceResult::Skipped,
            skip_reason: Some(reason),
            detail: detail.into(),
        }
    }

    pub fn cancelled(campaign_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            campaign_id: campaign_id.into(),
            result: TraceResult::Cancelled,
            skip_reason: None,
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_reason_serializes_snake_case() {
        let json = serde_json::to_string(&SkipReason::CampaignFrequencyCapExceeded).unwrap();
        assert_eq!(json, "\"campaign_frequency_cap_exceeded\"");
    }

    #[test]
    fn test_trigger_type_tag_round_trip() {
        let spec: TriggerSpec = serde_json::from_value(serde_json::json!({
            "type": "scheduled",
            "event": null,
            "scheduled": { "start_at": "2026-01-01T10:00:00Z" },
            "recurring": null
        }))
        .unwrap();
        assert_eq!(spec.trigger_type, TriggerType::Scheduled);
        assert!(spec.scheduled.is_some());
    }

    #[test]
    fn test_campaign_order_follows_key_order() {
        let config: Config = serde_json::from_value(serde_json::json!({
            "schema_version": SCHEMA_VERSION,
            "config_version": "v1",
            "settings": {},
            "campaigns": {
                "zulu-offer": {
                    "status": "paused",
                    "trigger": { "type": "scheduled", "scheduled": { "start_at": "2026-01-01T10:00:00Z" } },
                    "message": { "channel": "local_push", "title": "t", "body": "b" }
                },
                "alpha-offer": {
                    "status": "running",
                    "trigger": { "type": "scheduled", "scheduled": { "start_at": "2026-01-01T10:00:00Z" } },
                    "message": { "channel": "local_push", "title": "t", "body": "b" }
                }
            }
        }))
        .unwrap();

        let ids: Vec<&String> = config.campaigns.keys().collect();
        assert_eq!(ids, vec!["alpha-offer", "zulu-offer"]);
    }

    #[test]
    fn test_weekday_offsets() {
        assert_eq!(Weekday::Monday.days_from_monday(), 0);
        assert_eq!(Weekday::Sunday.days_from_monday(), 6);
    }
}
