//! Shared foundation for the campaign trigger engine
//!
//! This crate provides the pieces the decision logic builds on:
//! - Config, campaign, event and trace data models
//! - The persisted campaign-state aggregate and its mutation operations
//! - Collaborator ports implemented by the host (clock, scheduler, storage)
//! - Structural config validation
//! - Error handling types

pub mod error;
pub mod models;
pub mod ports;
pub mod state;
pub mod validation;

// Re-export commonly used types
pub use error::{EngineError, Result};
pub use models::{
    Campaign, CampaignSettings, CampaignStatus, ChannelType, Condition, ConditionField,
    ConditionGroup, ConditionOperator, Config, Connector, DecisionTrace, Event, EventSourceType,
    EventTriggerSpec, FrequencyCap, Message, QuietHours, Recurrence, RecurrenceFrequency,
    RecurringTriggerSpec, ScheduledTriggerSpec, SkipReason, TimeOfDay, TraceResult,
    TriggerContext, TriggerReason, TriggerSpec, TriggerType, Weekday, MAX_BODY_LENGTH,
    MAX_TITLE_LENGTH, SCHEMA_VERSION,
};
pub use ports::{
    CampaignStateRepository, Clock, LifecycleStateReader, MessageScheduler, PendingNotification,
    SystemClock,
};
pub use state::{
    CampaignProgress, CampaignStateSnapshot, QueuedMessage, TriggerHistoryEntry,
    MAX_TRIGGER_HISTORY,
};
pub use validation::{parse_config, validate_config, IssueCode, ValidationIssue, ValidationReport};

/// Initialize tracing subscriber for structured logging
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campaign_core=debug,trigger_engine=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
