//! Condition matching engine
//!
//! Evaluates a boolean condition-group DSL against a tracked event.
//!
//! Semantics:
//! - `and` short-circuits on the first failing condition, `or` on the first
//!   succeeding one; evaluation order is declaration order.
//! - An empty group is vacuously true under `and` and false under `or`.
//! - A missing left-hand value satisfies `not_equal`, `not_contains`,
//!   `not_in` and `not_exists`, and fails everything else (including
//!   `exists`).
//! - A malformed regular expression in `matches` is non-matching, never an
//!   error.

use campaign_core::models::{
    Condition, ConditionField, ConditionGroup, ConditionOperator, Connector, Event,
};
use serde_json::Value;

/// Evaluate a condition group against an event
pub fn matches_group(group: &ConditionGroup, event: &Event) -> bool {
    match group.connector {
        Connector::And => group.conditions.iter().all(|c| matches_condition(c, event)),
        Connector::Or => group.conditions.iter().any(|c| matches_condition(c, event)),
    }
}

/// Evaluate a single condition against an event
pub fn matches_condition(condition: &Condition, event: &Event) -> bool {
    let lhs = resolve_lhs(condition, event);
    let result = apply_operator(condition.operator, lhs.as_ref(), condition.value.as_ref());

    if !result {
        tracing::trace!(
            operator = ?condition.operator,
            field = ?condition.field,
            "Condition did not match"
        );
    }
    result
}

/// Resolve the condition's left-hand side from the event
fn resolve_lhs(condition: &Condition, event: &Event) -> Option<Value> {
    match condition.field {
        ConditionField::EventName => Some(Value::String(event.name.clone())),
        ConditionField::Property => {
            let path = condition.property_name.as_deref()?;
            lookup_path(event.properties.as_ref()?, path).cloned()
        }
    }
}

/// Walk a dot path through a nested property bag
fn lookup_path<'a>(bag: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = bag;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn apply_operator(operator: ConditionOperator, lhs: Option<&Value>, rhs: Option<&Value>) -> bool {
    use ConditionOperator::*;

    // Missing/undefined left-hand values satisfy only the negated operators.
    let Some(lhs) = lhs.filter(|v| !v.is_null()) else {
        return matches!(operator, NotEqual | NotContains | NotIn | NotExists);
    };

    match operator {
        Equal => rhs.is_some_and(|rhs| values_equal(lhs, rhs)),
        NotEqual => !rhs.is_some_and(|rhs| values_equal(lhs, rhs)),
        GreaterThan => compare_numeric(lhs, rhs).is_some_and(|ord| ord.is_gt()),
        GreaterOrEqual => compare_numeric(lhs, rhs).is_some_and(|ord| ord.is_ge()),
        LessThan => compare_numeric(lhs, rhs).is_some_and(|ord| ord.is_lt()),
        LessOrEqual => compare_numeric(lhs, rhs).is_some_and(|ord| ord.is_le()),
        Contains => string_pair(lhs, rhs).is_some_and(|(l, r)| l.contains(r)),
        NotContains => !string_pair(lhs, rhs).is_some_and(|(l, r)| l.contains(r)),
        StartsWith => string_pair(lhs, rhs).is_some_and(|(l, r)| l.starts_with(r)),
        EndsWith => string_pair(lhs, rhs).is_some_and(|(l, r)| l.ends_with(r)),
        Matches => regex_matches(lhs, rhs),
        In => set_contains(lhs, rhs),
        NotIn => !set_contains(lhs, rhs),
        Exists => true,
        NotExists => false,
    }
}

/// Equality with numeric coercion (1 == 1.0)
fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    if let (Some(l), Some(r)) = (lhs.as_f64(), rhs.as_f64()) {
        return l == r;
    }
    lhs == rhs
}

fn compare_numeric(lhs: &Value, rhs: Option<&Value>) -> Option<std::cmp::Ordering> {
    let l = lhs.as_f64()?;
    let r = rhs?.as_f64()?;
    l.partial_cmp(&r)
}

fn string_pair<'a>(lhs: &'a Value, rhs: Option<&'a Value>) -> Option<(&'a str, &'a str)> {
    Some((lhs.as_str()?, rhs?.as_str()?))
}

fn regex_matches(lhs: &Value, rhs: Option<&Value>) -> bool {
    let Some((subject, pattern)) = string_pair(lhs, rhs) else {
        return false;
    };
    match regex::Regex::new(pattern) {
        Ok(re) => re.is_match(subject),
        Err(e) => {
            tracing::debug!(pattern = pattern, error = %e, "Malformed regex in condition, treating as non-matching");
            false
        }
    }
}

fn set_contains(lhs: &Value, rhs: Option<&Value>) -> bool {
    rhs.and_then(Value::as_array)
        .is_some_and(|set| set.iter().any(|candidate| values_equal(lhs, candidate)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_core::models::EventSourceType;
    use chrono::Utc;
    use serde_json::json;

    fn event_with(properties: Value) -> Event {
        Event {
            id: "evt-1".to_string(),
            name: "purchase_completed".to_string(),
            source_type: EventSourceType::App,
            properties: Some(properties),
            created_at: Utc::now(),
        }
    }

    fn condition(
        field: ConditionField,
        property_name: Option<&str>,
        operator: ConditionOperator,
        value: Option<Value>,
    ) -> Condition {
        Condition {
            field,
            property_name: property_name.map(str::to_string),
            operator,
            value,
        }
    }

    fn property(name: &str, operator: ConditionOperator, value: Option<Value>) -> Condition {
        condition(ConditionField::Property, Some(name), operator, value)
    }

    // ========================================================================
    // event name conditions
    // ========================================================================

    #[test]
    fn test_event_name_equal() {
        let event = event_with(json!({}));
        let c = condition(
            ConditionField::EventName,
            None,
            ConditionOperator::Equal,
            Some(json!("purchase_completed")),
        );
        assert!(matches_condition(&c, &event));
    }

    #[test]
    fn test_event_name_prefix() {
        let event = event_with(json!({}));
        let c = condition(
            ConditionField::EventName,
            None,
            ConditionOperator::StartsWith,
            Some(json!("purchase_")),
        );
        assert!(matches_condition(&c, &event));
    }

    // ========================================================================
    // property conditions
    // ========================================================================

    #[test]
    fn test_property_numeric_ordering() {
        let event = event_with(json!({ "total": 42 }));
        assert!(matches_condition(
            &property("total", ConditionOperator::GreaterThan, Some(json!(40))),
            &event
        ));
        assert!(!matches_condition(
            &property("total", ConditionOperator::LessOrEqual, Some(json!(40))),
            &event
        ));
    }

    #[test]
    fn test_property_numeric_coercion() {
        let event = event_with(json!({ "total": 42 }));
        assert!(matches_condition(
            &property("total", ConditionOperator::Equal, Some(json!(42.0))),
            &event
        ));
    }

    #[test]
    fn test_nested_property_path() {
        let event = event_with(json!({ "cart": { "items": { "count": 3 } } }));
        assert!(matches_condition(
            &property("cart.items.count", ConditionOperator::Equal, Some(json!(3))),
            &event
        ));
    }

    #[test]
    fn test_contains_and_suffix() {
        let event = event_with(json!({ "plan": "premium-annual" }));
        assert!(matches_condition(
            &property("plan", ConditionOperator::Contains, Some(json!("premium"))),
            &event
        ));
        assert!(matches_condition(
            &property("plan", ConditionOperator::EndsWith, Some(json!("annual"))),
            &event
        ));
    }

    #[test]
    fn test_set_membership() {
        let event = event_with(json!({ "tier": "gold" }));
        assert!(matches_condition(
            &property("tier", ConditionOperator::In, Some(json!(["silver", "gold"]))),
            &event
        ));
        assert!(matches_condition(
            &property("tier", ConditionOperator::NotIn, Some(json!(["bronze"]))),
            &event
        ));
    }

    #[test]
    fn test_regex_match() {
        let event = event_with(json!({ "sku": "ABC-1234" }));
        assert!(matches_condition(
            &property("sku", ConditionOperator::Matches, Some(json!(r"^[A-Z]{3}-\d{4}$"))),
            &event
        ));
    }

    #[test]
    fn test_malformed_regex_is_non_matching() {
        let event = event_with(json!({ "sku": "ABC-1234" }));
        assert!(!matches_condition(
            &property("sku", ConditionOperator::Matches, Some(json!("([unclosed"))),
            &event
        ));
    }

    // ========================================================================
    // missing left-hand values
    // ========================================================================

    #[test]
    fn test_missing_property_satisfies_negated_operators() {
        let event = event_with(json!({}));
        for (operator, value) in [
            (ConditionOperator::NotEqual, Some(json!("x"))),
            (ConditionOperator::NotContains, Some(json!("x"))),
            (ConditionOperator::NotIn, Some(json!(["x"]))),
            (ConditionOperator::NotExists, None),
        ] {
            assert!(
                matches_condition(&property("missing", operator, value), &event),
                "{:?} should match a missing value",
                operator
            );
        }
    }

    #[test]
    fn test_missing_property_fails_everything_else() {
        let event = event_with(json!({}));
        for (operator, value) in [
            (ConditionOperator::Equal, Some(json!("x"))),
            (ConditionOperator::GreaterThan, Some(json!(1))),
            (ConditionOperator::Contains, Some(json!("x"))),
            (ConditionOperator::Matches, Some(json!("x"))),
            (ConditionOperator::In, Some(json!(["x"]))),
            (ConditionOperator::Exists, None),
        ] {
            assert!(
                !matches_condition(&property("missing", operator, value), &event),
                "{:?} should fail on a missing value",
                operator
            );
        }
    }

    #[test]
    fn test_null_property_counts_as_missing() {
        let event = event_with(json!({ "coupon": null }));
        assert!(matches_condition(
            &property("coupon", ConditionOperator::NotExists, None),
            &event
        ));
        assert!(!matches_condition(
            &property("coupon", ConditionOperator::Exists, None),
            &event
        ));
    }

    // ========================================================================
    // groups
    // ========================================================================

    #[test]
    fn test_empty_group_vacuous() {
        let event = event_with(json!({}));
        let and_group = ConditionGroup { connector: Connector::And, conditions: vec![] };
        let or_group = ConditionGroup { connector: Connector::Or, conditions: vec![] };
        assert!(matches_group(&and_group, &event));
        assert!(!matches_group(&or_group, &event));
    }

    #[test]
    fn test_and_requires_all() {
        let event = event_with(json!({ "total": 42 }));
        let group = ConditionGroup {
            connector: Connector::And,
            conditions: vec![
                property("total", ConditionOperator::GreaterThan, Some(json!(40))),
                property("total", ConditionOperator::LessThan, Some(json!(41))),
            ],
        };
        assert!(!matches_group(&group, &event));
    }

    #[test]
    fn test_or_takes_first_success() {
        let event = event_with(json!({ "total": 42 }));
        let group = ConditionGroup {
            connector: Connector::Or,
            conditions: vec![
                property("total", ConditionOperator::LessThan, Some(json!(10))),
                property("total", ConditionOperator::GreaterThan, Some(json!(40))),
            ],
        };
        assert!(matches_group(&group, &event));
    }
}
