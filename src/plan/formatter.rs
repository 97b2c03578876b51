use super::ansi::ansi_to_html;
use super::html_escape;
use super::redact::{SensitivePaths, redact_text, scrub};
use crate::terraform::version::compare_versions;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

/// Oldest JSON plan format that reports `before_sensitive`/`after_sensitive`
const SENSITIVE_FORMAT_VERSION: &str = "0.2";

/// Render a published plan as an HTML fragment
///
/// JSON documents produced by `terraform show -json` get a structured
/// summary; other JSON is pretty-printed; anything else is treated as
/// (possibly colored) plan text. Sensitive values never reach the output.
/// Text that looks like JSON but does not parse is returned unchanged.
pub fn format_plan_for_display(text: &str) -> String {
    let trimmed = text.trim();
    if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
        return render_text(text);
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(json) if is_terraform_plan(&json) => render_terraform_plan(&json),
        Ok(json) => render_json(&json),
        Err(e) => {
            debug!(error = %e, "Plan is not valid JSON, showing it as is");
            text.to_string()
        }
    }
}

fn is_terraform_plan(json: &Value) -> bool {
    json.get("format_version").is_some() && json.get("terraform_version").is_some()
}

fn render_text(text: &str) -> String {
    format!(
        "<pre class=\"tf-plan-text\">{}</pre>",
        ansi_to_html(&redact_text(text))
    )
}

/// Redacts and escapes text taken from a JSON document
struct Sanitizer {
    secrets: Vec<String>,
}

impl Sanitizer {
    fn for_document(json: &Value, paths: &SensitivePaths) -> Self {
        Self {
            secrets: paths.secrets(json),
        }
    }

    fn clean(&self, text: &str) -> String {
        html_escape(&redact_text(&scrub(text, &self.secrets)))
    }

    fn clean_json(&self, value: &Value) -> String {
        let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        self.clean(&pretty)
    }
}

fn render_json(json: &Value) -> String {
    let paths = SensitivePaths::collect(json);
    let sanitizer = Sanitizer::for_document(json, &paths);
    format!(
        "<div class=\"json-plan\"><pre>{}</pre></div>",
        sanitizer.clean_json(&paths.redact(json))
    )
}

fn field<'a>(json: &'a Value, name: &str) -> Option<&'a str> {
    json.get(name).and_then(Value::as_str)
}

fn actions_of(change: &Value) -> Vec<String> {
    change
        .pointer("/change/actions")
        .and_then(Value::as_array)
        .map(|actions| {
            actions
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn action_class(actions: &[String]) -> &'static str {
    let has = |name: &str| actions.iter().any(|a| a == name);
    if has("delete") && has("create") {
        "replace"
    } else if has("create") {
        "create"
    } else if has("delete") {
        "delete"
    } else if has("update") {
        "update"
    } else if has("read") {
        "read"
    } else {
        "no-op"
    }
}

fn has_content(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

fn render_terraform_plan(plan: &Value) -> String {
    let paths = SensitivePaths::collect(plan);
    let sanitizer = Sanitizer::for_document(plan, &paths);
    let redacted = paths.redact(plan);

    let terraform_version = field(plan, "terraform_version").unwrap_or("N/A");
    let format_version = field(plan, "format_version").unwrap_or("N/A");
    let timestamp = field(plan, "timestamp").unwrap_or("N/A");

    let mut html = String::new();
    html.push_str("<div class=\"tf-plan-summary\">\n");
    html.push_str("<h3>Terraform Plan</h3>\n");

    html.push_str("<div class=\"tf-plan-info\">\n");
    html.push_str(&format!(
        "<p><strong>Terraform Version:</strong> {}</p>\n",
        sanitizer.clean(terraform_version)
    ));
    html.push_str(&format!(
        "<p><strong>Format Version:</strong> {}</p>\n",
        sanitizer.clean(format_version)
    ));
    html.push_str(&format!(
        "<p><strong>Timestamp:</strong> {}</p>\n",
        sanitizer.clean(timestamp)
    ));
    if format_version != "N/A" && compare_versions(format_version, SENSITIVE_FORMAT_VERSION) < 0
    {
        html.push_str(&format!(
            "<p class=\"tf-plan-note\">Plan format {} does not mark sensitive values; only values with secret-like names are redacted.</p>\n",
            sanitizer.clean(format_version)
        ));
    }
    html.push_str("</div>\n");

    let changes: Vec<&Value> = redacted
        .get("resource_changes")
        .and_then(Value::as_array)
        .map(|changes| changes.iter().collect())
        .unwrap_or_default();

    let mut counts: IndexMap<String, (usize, &'static str)> = IndexMap::new();
    for change in &changes {
        let actions = actions_of(change);
        let entry = counts
            .entry(actions.join(","))
            .or_insert((0, action_class(&actions)));
        entry.0 += 1;
    }

    if !counts.is_empty() {
        html.push_str("<div class=\"tf-plan-actions\">\n");
        html.push_str("<h4>Resource Changes:</h4>\n<ul>\n");
        for (actions, (count, class)) in &counts {
            html.push_str(&format!(
                "<li class=\"tf-action-{}\">{}: {} resource(s)</li>\n",
                class,
                sanitizer.clean(actions),
                count
            ));
        }
        html.push_str("</ul>\n</div>\n");
    }

    if !paths.is_empty() {
        html.push_str(&format!(
            "<div class=\"tf-sensitive-info\"><p>Contains {} sensitive value(s)</p></div>\n",
            paths.len()
        ));
    }

    html.push_str("<details class=\"tf-plan-details\">\n");
    html.push_str("<summary>View Complete Plan</summary>\n");
    html.push_str(&format!("<pre>{}</pre>\n", sanitizer.clean_json(&redacted)));
    html.push_str("</details>\n");

    if !changes.is_empty() {
        html.push_str("<div class=\"tf-resource-changes\">\n");
        html.push_str("<h4>Resource Change Details:</h4>\n");
        for (i, change) in changes.iter().enumerate() {
            html.push_str(&render_resource_change(
                change,
                paths.any_under(&format!("resource_changes[{}]", i)),
                &sanitizer,
            ));
        }
        html.push_str("</div>\n");
    }

    html.push_str("</div>\n");
    html
}

fn render_resource_change(change: &Value, has_sensitive: bool, sanitizer: &Sanitizer) -> String {
    let actions = actions_of(change);
    let address = field(change, "address").unwrap_or("unknown");

    let mut classes = format!("tf-resource-detail tf-action-{}", action_class(&actions));
    if has_sensitive {
        classes.push_str(" has-sensitive");
    }

    let mut html = format!("<details class=\"{}\">\n<summary>", classes);
    html.push_str(&format!(
        "<span class=\"tf-resource-address\">{}</span> ",
        sanitizer.clean(address)
    ));
    html.push_str(&format!(
        "<span class=\"tf-resource-actions\">[{}]</span>",
        sanitizer.clean(&actions.join(", "))
    ));
    if has_sensitive {
        html.push_str(" <span class=\"tf-sensitive-badge\">Contains sensitive data</span>");
    }
    html.push_str("</summary>\n");

    html.push_str("<div class=\"tf-resource-content\">\n");
    for (key, label) in [("before", "Before:"), ("after", "After:")] {
        let value = change.get("change").and_then(|c| c.get(key));
        if let Some(value) = value.filter(|v| has_content(v)) {
            html.push_str(&format!(
                "<div class=\"tf-resource-{}\"><h5>{}</h5><pre>{}</pre></div>\n",
                key,
                label,
                sanitizer.clean_json(value)
            ));
        }
    }
    html.push_str("</div>\n</details>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::redact::REDACTED;
    use serde_json::json;

    fn sample_plan() -> Value {
        json!({
            "format_version": "1.2",
            "terraform_version": "1.9.5",
            "timestamp": "2026-10-19T08:00:00Z",
            "planned_values": {"root_module": {"resources": [{
                "address": "azurerm_key_vault_secret.db",
                "values": {"name": "db", "value": "Sup3rS3cret!"},
                "sensitive_values": {"value": true}
            }]}},
            "resource_changes": [
                {
                    "address": "azurerm_resource_group.rg",
                    "change": {
                        "actions": ["create"],
                        "before": null,
                        "after": {"name": "rg-demo", "location": "westeurope"},
                        "after_sensitive": {}
                    }
                },
                {
                    "address": "azurerm_key_vault_secret.db",
                    "change": {
                        "actions": ["create"],
                        "before": null,
                        "after": {"name": "db", "value": "Sup3rS3cret!"},
                        "after_sensitive": {"value": true}
                    }
                },
                {
                    "address": "azurerm_storage_account.old",
                    "change": {
                        "actions": ["delete"],
                        "before": {"name": "oldstate"},
                        "after": null
                    }
                },
                {
                    "address": "azurerm_virtual_network.vnet",
                    "change": {
                        "actions": ["delete", "create"],
                        "before": {"name": "vnet"},
                        "after": {"name": "vnet"}
                    }
                }
            ],
            "configuration": {"root_module": {"resources": [{
                "expressions": {"value": {"constant_value": "Sup3rS3cret!"}}
            }]}}
        })
    }

    #[test]
    fn test_plain_text_plan_is_colored_and_redacted() {
        let html = format_plan_for_display("\x1b[32m+\x1b[0m ip = 10.1.2.3 <new>");
        assert!(html.starts_with("<pre class=\"tf-plan-text\">"));
        assert!(html.contains("<span style=\"color:rgb(0,187,0)\">+</span>"));
        assert!(html.contains("***REDACTED-IP***"));
        assert!(html.contains("&lt;new&gt;"));
        assert!(!html.contains("10.1.2.3"));
    }

    #[test]
    fn test_invalid_json_is_returned_unchanged() {
        let text = "{ this is not json }";
        assert_eq!(format_plan_for_display(text), text);
    }

    #[test]
    fn test_generic_json_is_pretty_printed() {
        let html = format_plan_for_display(r#"{"name": "web", "password": "abc123"}"#);
        assert!(html.starts_with("<div class=\"json-plan\"><pre>"));
        assert!(html.contains("&quot;name&quot;: &quot;web&quot;"));
        assert!(!html.contains("abc123"));
    }

    #[test]
    fn test_terraform_plan_summary() {
        let html = format_plan_for_display(&sample_plan().to_string());

        assert!(html.contains("<h3>Terraform Plan</h3>"));
        assert!(html.contains("<strong>Terraform Version:</strong> 1.9.5"));
        assert!(html.contains("<strong>Format Version:</strong> 1.2"));
        assert!(html.contains("<strong>Timestamp:</strong> 2026-10-19T08:00:00Z"));
        assert!(html.contains("<li class=\"tf-action-create\">create: 2 resource(s)</li>"));
        assert!(html.contains("<li class=\"tf-action-delete\">delete: 1 resource(s)</li>"));
        assert!(html.contains("<li class=\"tf-action-replace\">delete,create: 1 resource(s)</li>"));
        assert!(html.contains("<summary>View Complete Plan</summary>"));
        assert!(!html.contains("tf-plan-note"));
    }

    #[test]
    fn test_sensitive_values_never_rendered() {
        let html = format_plan_for_display(&sample_plan().to_string());

        assert!(!html.contains("Sup3rS3cret!"));
        assert!(html.contains(REDACTED));
        assert!(html.contains("Contains 2 sensitive value(s)"));
    }

    #[test]
    fn test_short_sensitive_value_hidden_in_configuration() {
        let plan = json!({
            "format_version": "1.2",
            "terraform_version": "1.9.5",
            "resource_changes": [{
                "address": "random_string.pin",
                "change": {
                    "actions": ["create"],
                    "before": null,
                    "after": {"result": "pw1", "length": 3},
                    "after_sensitive": {"result": true}
                }
            }],
            "configuration": {"root_module": {"resources": [{
                "expressions": {"override": {"constant_value": "pw1"}}
            }]}}
        });

        let html = format_plan_for_display(&plan.to_string());

        assert!(!html.contains("&quot;pw1&quot;"));
        assert!(html.contains("&quot;constant_value&quot;: &quot;***REDACTED***&quot;"));
    }

    #[test]
    fn test_only_affected_resources_flagged_sensitive() {
        let html = format_plan_for_display(&sample_plan().to_string());

        assert!(html.contains(
            "<details class=\"tf-resource-detail tf-action-create has-sensitive\">\n<summary><span class=\"tf-resource-address\">azurerm_key_vault_secret.db</span>"
        ));
        assert!(html.contains(
            "<details class=\"tf-resource-detail tf-action-create\">\n<summary><span class=\"tf-resource-address\">azurerm_resource_group.rg</span>"
        ));
        assert_eq!(html.matches("Contains sensitive data").count(), 1);
    }

    #[test]
    fn test_before_and_after_sections() {
        let html = format_plan_for_display(&sample_plan().to_string());

        assert!(html.contains("<div class=\"tf-resource-before\"><h5>Before:</h5>"));
        assert!(html.contains("<div class=\"tf-resource-after\"><h5>After:</h5>"));
        // created resources have no before section
        let rg = html
            .split("<span class=\"tf-resource-address\">azurerm_resource_group.rg</span>")
            .nth(1)
            .and_then(|rest| rest.split("</details>").next())
            .unwrap();
        assert!(!rg.contains("Before:"));
    }

    #[test]
    fn test_old_format_version_note() {
        let plan = json!({
            "format_version": "0.1",
            "terraform_version": "0.12.31",
            "resource_changes": []
        });
        let html = format_plan_for_display(&plan.to_string());

        assert!(html.contains("tf-plan-note"));
        assert!(html.contains("<strong>Timestamp:</strong> N/A"));
        assert!(!html.contains("tf-plan-actions"));
        assert!(!html.contains("tf-resource-changes"));
    }
}
