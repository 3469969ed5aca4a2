//! Structural config validation
//!
//! Runs once per config load/replace, before the document becomes active.
//! The document is checked as raw JSON so every issue carries the offending
//! JSON path; only a document with zero errors is deserialized into the
//! typed `Config`. Warnings never block activation.
//!
//! Strictness: unknown properties are rejected at every level. Only the
//! trigger branch named by `type` is validated; extra populated branches are
//! structurally unreachable at runtime and surface as warnings.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::models::{Config, MAX_BODY_LENGTH, MAX_TITLE_LENGTH, SCHEMA_VERSION};

lazy_static! {
    /// Campaign ids are kebab-case
    static ref CAMPAIGN_ID_PATTERN: Regex =
        Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("Invalid regex pattern");
}

/// Machine-readable issue codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    UnknownProperty,
    MissingProperty,
    InvalidType,
    InvalidEnumValue,
    OutOfRange,
    InvalidTimestamp,
    InvalidTimeRange,
    ValueTooLong,
    InvalidUrl,
    InvalidCampaignId,
    UnsupportedSchemaVersion,
    // Warning codes
    EmptyConditions,
    IgnoredPropertyName,
    UnusedTriggerBranch,
}

/// One (path, code, message) validation finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub code: IssueCode,
    pub message: String,
}

/// Outcome of validating one config document
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, code: IssueCode, message: impl Into<String>) {
        self.errors.push(ValidationIssue {
            path: path.into(),
            code,
            message: message.into(),
        });
    }

    fn warning(&mut self, path: impl Into<String>, code: IssueCode, message: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            path: path.into(),
            code,
            message: message.into(),
        });
    }
}

/// Validate a config document and, if it has no errors, deserialize it
///
/// Returns the typed config plus any warnings. A document with errors is
/// rejected as [`EngineError::ConfigRejected`] and never partially applied.
pub fn parse_config(document: &Value) -> Result<(Config, Vec<ValidationIssue>)> {
    let report = validate_config(document);
    if !report.is_valid() {
        tracing::warn!(
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "Rejecting config document"
        );
        return Err(EngineError::ConfigRejected(report.errors));
    }
    for warning in &report.warnings {
        tracing::debug!(path = %warning.path, code = ?warning.code, "Config warning: {}", warning.message);
    }
    let config: Config = serde_json::from_value(document.clone())?;
    Ok((config, report.warnings))
}

/// Validate a config document structurally
pub fn validate_config(document: &Value) -> ValidationReport {
    let mut report = ValidationReport::default();

    let Some(root) = as_object(document, "", &mut report) else {
        return report;
    };

    check_keys(
        root,
        "",
        &["schema_version", "config_version", "settings", "campaigns"],
        &mut report,
    );

    match require_str(root, "", "schema_version", &mut report) {
        Some(version) if version != SCHEMA_VERSION => report.error(
            "schema_version",
            IssueCode::UnsupportedSchemaVersion,
            format!("Unsupported schema version '{}' (expected '{}')", version, SCHEMA_VERSION),
        ),
        _ => {}
    }
    require_str(root, "", "config_version", &mut report);

    if let Some(settings) = root.get("settings") {
        validate_settings(settings, &mut report);
    }

    match root.get("campaigns") {
        Some(campaigns) => validate_campaigns(campaigns, &mut report),
        None => report.error("campaigns", IssueCode::MissingProperty, "Missing required property 'campaigns'"),
    }

    report
}

fn validate_settings(settings: &Value, report: &mut ValidationReport) {
    let Some(obj) = as_object(settings, "settings", report) else {
        return;
    };
    check_keys(obj, "settings", &["frequency_cap", "quiet_hours"], report);

    if let Some(cap) = obj.get("frequency_cap") {
        let path = "settings.frequency_cap";
        if let Some(cap_obj) = as_object(cap, path, report) {
            check_keys(cap_obj, path, &["max_count", "window_seconds"], report);
            require_int_min(cap_obj, path, "max_count", 1, report);
            require_int_min(cap_obj, path, "window_seconds", 1, report);
        }
    }

    if let Some(quiet) = obj.get("quiet_hours") {
        let path = "settings.quiet_hours";
        if let Some(quiet_obj) = as_object(quiet, path, report) {
            check_keys(quiet_obj, path, &["start_hour", "end_hour"], report);
            require_int_range(quiet_obj, path, "start_hour", 0, 23, report);
            require_int_range(quiet_obj, path, "end_hour", 0, 23, report);
        }
    }
}

fn validate_campaigns(campaigns: &Value, report: &mut ValidationReport) {
    let Some(map) = as_object(campaigns, "campaigns", report) else {
        return;
    };

    for (campaign_id, campaign) in map {
        let path = format!("campaigns.{}", campaign_id);
        if !CAMPAIGN_ID_PATTERN.is_match(campaign_id) {
            report.error(
                &path,
                IssueCode::InvalidCampaignId,
                format!("Campaign id '{}' is not kebab-case", campaign_id),
            );
        }
        validate_campaign(campaign, &path, report);
    }
}

fn validate_campaign(campaign: &Value, path: &str, report: &mut ValidationReport) {
    let Some(obj) = as_object(campaign, path, report) else {
        return;
    };
    check_keys(obj, path, &["status", "trigger", "message"], report);

    require_enum(obj, path, "status", &["running", "paused"], report);

    match obj.get("trigger") {
        Some(trigger) => validate_trigger(trigger, &format!("{}.trigger", path), report),
        None => report.error(
            format!("{}.trigger", path),
            IssueCode::MissingProperty,
            "Missing required property 'trigger'",
        ),
    }

    match obj.get("message") {
        Some(message) => validate_message(message, &format!("{}.message", path), report),
        None => report.error(
            format!("{}.message", path),
            IssueCode::MissingProperty,
            "Missing required property 'message'",
        ),
    }
}

fn validate_trigger(trigger: &Value, path: &str, report: &mut ValidationReport) {
    let Some(obj) = as_object(trigger, path, report) else {
        return;
    };
    check_keys(obj, path, &["type", "event", "scheduled", "recurring"], report);

    let Some(trigger_type) =
        require_enum(obj, path, "type", &["event", "scheduled", "recurring"], report)
    else {
        return;
    };

    // Only the declared branch is validated; the others are unreachable at
    // runtime and cross-validating them would reject configs that work.
    for branch in ["event", "scheduled", "recurring"] {
        if branch != trigger_type && !matches!(obj.get(branch), None | Some(Value::Null)) {
            report.warning(
                format!("{}.{}", path, branch),
                IssueCode::UnusedTriggerBranch,
                format!("Trigger branch '{}' is ignored for type '{}'", branch, trigger_type),
            );
        }
    }

    let branch_path = format!("{}.{}", path, trigger_type);
    match obj.get(trigger_type.as_str()) {
        None | Some(Value::Null) => report.error(
            &branch_path,
            IssueCode::MissingProperty,
            format!("Trigger type '{}' requires a '{}' sub-object", trigger_type, trigger_type),
        ),
        Some(branch) => match trigger_type.as_str() {
            "event" => validate_event_trigger(branch, &branch_path, report),
            "scheduled" => validate_scheduled_trigger(branch, &branch_path, report),
            _ => validate_recurring_trigger(branch, &branch_path, report),
        },
    }
}

fn validate_event_trigger(branch: &Value, path: &str, report: &mut ValidationReport) {
    let Some(obj) = as_object(branch, path, report) else {
        return;
    };
    check_keys(obj, path, &["condition", "delay_seconds", "cancel_event"], report);

    match obj.get("condition") {
        Some(condition) => validate_condition_group(condition, &format!("{}.condition", path), report),
        None => report.error(
            format!("{}.condition", path),
            IssueCode::MissingProperty,
            "Missing required property 'condition'",
        ),
    }

    if obj.get("delay_seconds").is_some() {
        require_int_min(obj, path, "delay_seconds", 0, report);
    }

    if let Some(cancel) = obj.get("cancel_event") {
        if !cancel.is_null() {
            validate_condition_group(cancel, &format!("{}.cancel_event", path), report);
        }
    }
}

fn validate_scheduled_trigger(branch: &Value, path: &str, report: &mut ValidationReport) {
    let Some(obj) = as_object(branch, path, report) else {
        return;
    };
    check_keys(obj, path, &["start_at"], report);

    if obj.get("start_at").is_none() {
        report.error(
            format!("{}.start_at", path),
            IssueCode::MissingProperty,
            "Missing required property 'start_at'",
        );
    } else {
        require_timestamp(obj, path, "start_at", report);
    }
}

fn validate_recurring_trigger(branch: &Value, path: &str, report: &mut ValidationReport) {
    let Some(obj) = as_object(branch, path, report) else {
        return;
    };
    check_keys(obj, path, &["recurrence", "start_at", "end_at"], report);

    match obj.get("recurrence") {
        Some(recurrence) => validate_recurrence(recurrence, &format!("{}.recurrence", path), report),
        None => report.error(
            format!("{}.recurrence", path),
            IssueCode::MissingProperty,
            "Missing required property 'recurrence'",
        ),
    }

    let start_at = require_optional_timestamp(obj, path, "start_at", report);
    let end_at = require_optional_timestamp(obj, path, "end_at", report);
    if let (Some(start), Some(end)) = (start_at, end_at) {
        if end <= start {
            report.error(
                format!("{}.end_at", path),
                IssueCode::InvalidTimeRange,
                "'end_at' must be strictly after 'start_at'",
            );
        }
    }
}

fn validate_recurrence(recurrence: &Value, path: &str, report: &mut ValidationReport) {
    let Some(obj) = as_object(recurrence, path, report) else {
        return;
    };
    check_keys(obj, path, &["frequency", "interval", "time_of_day", "weekdays"], report);

    require_enum(obj, path, "frequency", &["hourly", "daily", "weekly"], report);
    require_int_min(obj, path, "interval", 1, report);

    if let Some(tod) = obj.get("time_of_day") {
        if !tod.is_null() {
            let tod_path = format!("{}.time_of_day", path);
            if let Some(tod_obj) = as_object(tod, &tod_path, report) {
                check_keys(tod_obj, &tod_path, &["hour", "minute"], report);
                require_int_range(tod_obj, &tod_path, "hour", 0, 23, report);
                require_int_range(tod_obj, &tod_path, "minute", 0, 59, report);
            }
        }
    }

    if let Some(weekdays) = obj.get("weekdays") {
        if !weekdays.is_null() {
            let days_path = format!("{}.weekdays", path);
            match weekdays.as_array() {
                None => report.error(&days_path, IssueCode::InvalidType, "Expected an array of weekday names"),
                Some(days) => {
                    const NAMES: &[&str] = &[
                        "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
                    ];
                    for (i, day) in days.iter().enumerate() {
                        let entry_path = format!("{}[{}]", days_path, i);
                        match day.as_str() {
                            Some(name) if NAMES.contains(&name) => {}
                            Some(name) => report.error(
                                entry_path,
                                IssueCode::InvalidEnumValue,
                                format!("Unknown weekday '{}'", name),
                            ),
                            None => report.error(entry_path, IssueCode::InvalidType, "Expected a weekday name"),
                        }
                    }
                }
            }
        }
    }
}

fn validate_message(message: &Value, path: &str, report: &mut ValidationReport) {
    let Some(obj) = as_object(message, path, report) else {
        return;
    };
    check_keys(obj, path, &["channel", "title", "body", "media_url", "link_url"], report);

    require_enum(obj, path, "channel", &["local_push", "in_app"], report);

    if let Some(title) = require_str(obj, path, "title", report) {
        if title.chars().count() > MAX_TITLE_LENGTH {
            report.error(
                format!("{}.title", path),
                IssueCode::ValueTooLong,
                format!("Title exceeds {} characters", MAX_TITLE_LENGTH),
            );
        }
    }
    if let Some(body) = require_str(obj, path, "body", report) {
        if body.chars().count() > MAX_BODY_LENGTH {
            report.error(
                format!("{}.body", path),
                IssueCode::ValueTooLong,
                format!("Body exceeds {} characters", MAX_BODY_LENGTH),
            );
        }
    }

    for field in ["media_url", "link_url"] {
        if let Some(value) = obj.get(field) {
            if value.is_null() {
                continue;
            }
            let field_path = format!("{}.{}", path, field);
            match value.as_str() {
                None => report.error(field_path, IssueCode::InvalidType, "Expected a string"),
                Some(s) if !is_valid_uri_reference(s) => report.error(
                    field_path,
                    IssueCode::InvalidUrl,
                    format!("'{}' is not a valid URI reference", s),
                ),
                Some(_) => {}
            }
        }
    }
}

fn validate_condition_group(group: &Value, path: &str, report: &mut ValidationReport) {
    let Some(obj) = as_object(group, path, report) else {
        return;
    };
    check_keys(obj, path, &["connector", "conditions"], report);

    require_enum(obj, path, "connector", &["and", "or"], report);

    match obj.get("conditions") {
        None => report.error(
            format!("{}.conditions", path),
            IssueCode::MissingProperty,
            "Missing required property 'conditions'",
        ),
        Some(conditions) => match conditions.as_array() {
            None => report.error(
                format!("{}.conditions", path),
                IssueCode::InvalidType,
                "Expected an array of conditions",
            ),
            Some(list) => {
                if list.is_empty() {
                    report.warning(
                        format!("{}.conditions", path),
                        IssueCode::EmptyConditions,
                        "Empty condition list is vacuously true under 'and' and false under 'or'",
                    );
                }
                for (i, condition) in list.iter().enumerate() {
                    validate_condition(condition, &format!("{}.conditions[{}]", path, i), report);
                }
            }
        },
    }
}

fn validate_condition(condition: &Value, path: &str, report: &mut ValidationReport) {
    let Some(obj) = as_object(condition, path, report) else {
        return;
    };
    check_keys(obj, path, &["field", "property_name", "operator", "value"], report);

    let field = require_enum(obj, path, "field", &["event_name", "property"], report);
    let operator = require_enum(
        obj,
        path,
        "operator",
        &[
            "equal", "not_equal", "greater_than", "greater_or_equal", "less_than",
            "less_or_equal", "contains", "not_contains", "starts_with", "ends_with",
            "matches", "in", "not_in", "exists", "not_exists",
        ],
        report,
    );

    match field.as_deref() {
        Some("property") => {
            if matches!(obj.get("property_name"), None | Some(Value::Null)) {
                report.error(
                    format!("{}.property_name", path),
                    IssueCode::MissingProperty,
                    "Property conditions require 'property_name'",
                );
            }
        }
        Some("event_name") => {
            if !matches!(obj.get("property_name"), None | Some(Value::Null)) {
                report.warning(
                    format!("{}.property_name", path),
                    IssueCode::IgnoredPropertyName,
                    "'property_name' is ignored when 'field' is 'event_name'",
                );
            }
        }
        _ => {}
    }

    if let Some(op) = operator.as_deref() {
        let value = obj.get("value");
        let needs_value = !matches!(op, "exists" | "not_exists");
        if needs_value && matches!(value, None | Some(Value::Null)) {
            report.error(
                format!("{}.value", path),
                IssueCode::MissingProperty,
                format!("Operator '{}' requires a 'value'", op),
            );
        }
        if matches!(op, "in" | "not_in") {
            if let Some(v) = value {
                if !v.is_null() && !v.is_array() {
                    report.error(
                        format!("{}.value", path),
                        IssueCode::InvalidType,
                        format!("Operator '{}' requires an array value", op),
                    );
                }
            }
        }
    }
}

// ---- helpers -------------------------------------------------------------

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn as_object<'a>(
    value: &'a Value,
    path: &str,
    report: &mut ValidationReport,
) -> Option<&'a serde_json::Map<String, Value>> {
    match value.as_object() {
        Some(obj) => Some(obj),
        None => {
            let shown = if path.is_empty() { "<root>" } else { path };
            report.error(path, IssueCode::InvalidType, format!("Expected '{}' to be an object", shown));
            None
        }
    }
}

/// Strict key check: anything not in `allowed` is an unknown property
fn check_keys(
    obj: &serde_json::Map<String, Value>,
    path: &str,
    allowed: &[&str],
    report: &mut ValidationReport,
) {
    for key in obj.keys() {
        if !allowed.contains(&key.as_str()) {
            report.error(
                join(path, key),
                IssueCode::UnknownProperty,
                format!("Unknown property '{}'", key),
            );
        }
    }
}

fn require_str(
    obj: &serde_json::Map<String, Value>,
    path: &str,
    key: &str,
    report: &mut ValidationReport,
) -> Option<String> {
    match obj.get(key) {
        None => {
            report.error(
                join(path, key),
                IssueCode::MissingProperty,
                format!("Missing required property '{}'", key),
            );
            None
        }
        Some(value) => match value.as_str() {
            Some(s) => Some(s.to_string()),
            None => {
                report.error(join(path, key), IssueCode::InvalidType, "Expected a string");
                None
            }
        },
    }
}

fn require_enum(
    obj: &serde_json::Map<String, Value>,
    path: &str,
    key: &str,
    allowed: &[&str],
    report: &mut ValidationReport,
) -> Option<String> {
    let value = require_str(obj, path, key, report)?;
    if allowed.contains(&value.as_str()) {
        Some(value)
    } else {
        report.error(
            join(path, key),
            IssueCode::InvalidEnumValue,
            format!("Invalid value '{}' (expected one of: {})", value, allowed.join(", ")),
        );
        None
    }
}

fn require_int_min(
    obj: &serde_json::Map<String, Value>,
    path: &str,
    key: &str,
    min: i64,
    report: &mut ValidationReport,
) -> Option<i64> {
    require_int_range(obj, path, key, min, i64::MAX, report)
}

fn require_int_range(
    obj: &serde_json::Map<String, Value>,
    path: &str,
    key: &str,
    min: i64,
    max: i64,
    report: &mut ValidationReport,
) -> Option<i64> {
    match obj.get(key) {
        None => {
            report.error(
                join(path, key),
                IssueCode::MissingProperty,
                format!("Missing required property '{}'", key),
            );
            None
        }
        Some(value) => match value.as_i64() {
            None => {
                report.error(join(path, key), IssueCode::InvalidType, "Expected an integer");
                None
            }
            Some(n) if n < min || n > max => {
                let bound = if max == i64::MAX {
                    format!(">= {}", min)
                } else {
                    format!("in {}..={}", min, max)
                };
                report.error(
                    join(path, key),
                    IssueCode::OutOfRange,
                    format!("Value {} out of range (expected {})", n, bound),
                );
                None
            }
            Some(n) => Some(n),
        },
    }
}

fn require_timestamp(
    obj: &serde_json::Map<String, Value>,
    path: &str,
    key: &str,
    report: &mut ValidationReport,
) -> Option<DateTime<Utc>> {
    let raw = require_str(obj, path, key, report)?;
    match DateTime::parse_from_rfc3339(&raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            report.error(
                join(path, key),
                IssueCode::InvalidTimestamp,
                format!("'{}' is not a valid ISO-8601 timestamp: {}", raw, e),
            );
            None
        }
    }
}

fn require_optional_timestamp(
    obj: &serde_json::Map<String, Value>,
    path: &str,
    key: &str,
    report: &mut ValidationReport,
) -> Option<DateTime<Utc>> {
    match obj.get(key) {
        None | Some(Value::Null) => None,
        Some(_) => require_timestamp(obj, path, key, report),
    }
}

/// Accept absolute http(s)/custom-scheme URLs and plain relative references
fn is_valid_uri_reference(s: &str) -> bool {
    if s.is_empty() || s.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return false;
    }
    match url::Url::parse(s) {
        Ok(_) => true,
        // Deep links and host-relative paths arrive without a base
        Err(url::ParseError::RelativeUrlWithoutBase) => true,
        Err(_) => false,
    }
}
