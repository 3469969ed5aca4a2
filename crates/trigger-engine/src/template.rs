//! Template rendering for campaign messages
//!
//! Supports variable substitution using {{dot.path}} syntax against the
//! triggering event's property bag. Rendering never fails and never drops
//! text: unresolved placeholders are left verbatim.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

lazy_static! {
    /// Pattern for matching template variables: {{path.to.value}}
    static ref VAR_PATTERN: Regex =
        Regex::new(r"\{\{\s*([\w.]+)\s*\}\}").expect("Invalid regex pattern");
}

/// Render a template with variable substitution
///
/// Values are looked up by dot path in the provided variable bag:
/// - strings are inserted as-is, numbers/booleans are stringified
/// - objects and arrays are JSON-serialized
/// - explicit nulls render as the empty string
/// - unresolved placeholders are kept verbatim
pub fn render_template(template: &str, variables: Option<&Value>) -> String {
    let mut result = template.to_string();

    for cap in VAR_PATTERN.captures_iter(template) {
        let full_match = &cap[0]; // e.g. "{{user.name}}"
        let path = &cap[1];

        match variables.and_then(|bag| lookup_path(bag, path)) {
            Some(value) => {
                result = result.replace(full_match, &stringify(value));
            }
            None => {
                tracing::trace!(path = path, "Template variable not found, keeping placeholder");
            }
        }
    }

    result
}

/// Walk a dot path through a nested variable bag
fn lookup_path<'a>(bag: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = bag;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Extract all variable paths referenced by a template
pub fn extract_variables(template: &str) -> Vec<String> {
    VAR_PATTERN
        .captures_iter(template)
        .map(|cap| cap[1].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_simple_template() {
        let vars = json!({ "name": "Ada", "total": 85 });
        let result = render_template("Hi {{name}}, you spent {{total}}", Some(&vars));
        assert_eq!(result, "Hi Ada, you spent 85");
    }

    #[test]
    fn test_render_nested_path() {
        let vars = json!({ "user": { "name": "Ada" } });
        let result = render_template("Welcome {{user.name}}!", Some(&vars));
        assert_eq!(result, "Welcome Ada!");
    }

    #[test]
    fn test_render_with_booleans_and_floats() {
        let vars = json!({ "renewed": true, "price": 9.99 });
        let result = render_template("{{renewed}} at {{price}}", Some(&vars));
        assert_eq!(result, "true at 9.99");
    }

    #[test]
    fn test_render_object_as_json() {
        let vars = json!({ "cart": { "items": 2 } });
        let result = render_template("Cart: {{cart}}", Some(&vars));
        assert_eq!(result, r#"Cart: {"items":2}"#);
    }

    #[test]
    fn test_render_null_as_empty() {
        let vars = json!({ "coupon": null });
        let result = render_template("Code: {{coupon}}!", Some(&vars));
        assert_eq!(result, "Code: !");
    }

    #[test]
    fn test_unresolved_placeholder_kept_verbatim() {
        let vars = json!({ "name": "Ada" });
        let result = render_template("Hi {{name}}, plan {{plan.tier}}", Some(&vars));
        assert_eq!(result, "Hi Ada, plan {{plan.tier}}");
    }

    #[test]
    fn test_no_variable_bag() {
        let result = render_template("Hi {{name}}", None);
        assert_eq!(result, "Hi {{name}}");
    }

    #[test]
    fn test_whitespace_inside_braces() {
        let vars = json!({ "name": "Ada" });
        let result = render_template("Hi {{ name }}", Some(&vars));
        assert_eq!(result, "Hi Ada");
    }

    #[test]
    fn test_repeated_variable() {
        let vars = json!({ "x": "a" });
        let result = render_template("{{x}}{{x}}{{x}}", Some(&vars));
        assert_eq!(result, "aaa");
    }

    #[test]
    fn test_extract_variables() {
        let vars = extract_variables("{{a}} and {{b.c}} and {{a}}");
        assert_eq!(vars, vec!["a", "b.c", "a"]);
    }
}
