use leadforge_db::leads::Lead;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("placeholder regex is hardcoded and valid"));

/// Subject and body after substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
}

/// Substitutes `{{name}}` placeholders. Names without a value render as "".
#[must_use]
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            vars.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Unique placeholder names in first-seen order.
#[must_use]
pub fn extract_variables(body: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    PLACEHOLDER
        .captures_iter(body)
        .map(|caps| caps[1].to_string())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

fn or_default(value: Option<&str>, default: &str) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Variables available to campaign templates, with friendly fallbacks.
#[must_use]
pub fn lead_variables(lead: &Lead) -> HashMap<String, String> {
    HashMap::from([
        (
            "first_name".to_string(),
            or_default(lead.first_name.as_deref(), "there"),
        ),
        (
            "company".to_string(),
            or_default(Some(&lead.company_name), "your company"),
        ),
        (
            "industry".to_string(),
            or_default(lead.industry.as_deref(), "your industry"),
        ),
        (
            "city".to_string(),
            or_default(lead.city.as_deref(), "your location"),
        ),
    ])
}

/// Render a template's subject and body for one lead.
#[must_use]
pub fn render_for_lead(subject: &str, body: &str, lead: &Lead) -> RenderedEmail {
    let vars = lead_variables(lead);
    RenderedEmail {
        subject: render(subject, &vars),
        body: render(body, &vars),
    }
}
