//! On-device campaign trigger engine
//!
//! Evaluates declarative campaign configs against app lifecycle moments and
//! tracked events, and schedules local messages through host-supplied ports.
//!
//! The crate splits into:
//! - `matcher`: the condition-group DSL evaluated against events
//! - `template`: `{{dot.path}}` substitution for message titles and bodies
//! - `schedule`: fire-time resolution and quiet-hours suppression
//! - `recurrence`: hourly/daily/weekly occurrence math
//! - `processor`: the ordered per-campaign decision procedure
//! - `service`: the serialized orchestrator owning config and state I/O
//! - `fetcher`: remote config retrieval

pub mod fetcher;
pub mod matcher;
pub mod processor;
pub mod recurrence;
pub mod schedule;
pub mod service;
pub mod template;

pub use fetcher::ConfigFetcher;
pub use matcher::{matches_condition, matches_group};
pub use processor::{process_campaign, Decision};
pub use recurrence::{default_anchor, next_occurrence, resume_bound};
pub use schedule::{hour_in_quiet_window, resolve_execute_time, ScheduleOutcome, ScheduleTime};
pub use service::{TriggerEngine, TriggerResult};
pub use template::{extract_variables, render_template};
