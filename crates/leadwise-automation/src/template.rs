// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `{{path}}` placeholder substitution.
//!
//! A token is `{{name}}` or `{{a.b.c}}`, optionally padded with spaces.
//! Plain names are checked against the time built-ins first. Each path
//! segment is looked up literally, then in camelCase (`first_name` ->
//! `firstName`). A token that does not resolve is left in the output
//! exactly as written.

use chrono::{DateTime, Utc};
use serde_json::Value;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Renders `template` against `context` using the current time for built-ins.
pub fn render(template: &str, context: &Value) -> String {
    render_at(template, context, Utc::now())
}

/// Renders `template` with built-ins evaluated at `now`.
pub fn render_at(template: &str, context: &Value, now: DateTime<Utc>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            out.push_str(&rest[start..]);
            return out;
        };

        let token = &rest[start..start + OPEN.len() + end + CLOSE.len()];
        let path = after_open[..end].trim();
        match resolve_token(path, context, now) {
            Some(value) => out.push_str(&value),
            None => out.push_str(token),
        }
        rest = &after_open[end + CLOSE.len()..];
    }

    out.push_str(rest);
    out
}

/// Renders string values; anything else is returned unchanged.
pub fn render_value(template: &Value, context: &Value) -> Value {
    match template {
        Value::String(s) => Value::String(render(s, context)),
        other => other.clone(),
    }
}

fn is_path(token: &str) -> bool {
    !token.is_empty()
        && token.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        })
}

fn resolve_token(path: &str, context: &Value, now: DateTime<Utc>) -> Option<String> {
    if !is_path(path) {
        return None;
    }
    if !path.contains('.')
        && let Some(value) = builtin(path, now)
    {
        return Some(value);
    }
    lookup(context, path).and_then(display_value)
}

fn builtin(name: &str, now: DateTime<Utc>) -> Option<String> {
    match name {
        "currentDate" => Some(now.format("%Y-%m-%d").to_string()),
        "currentTime" => Some(now.format("%H:%M:%S").to_string()),
        "currentDateTime" => Some(now.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
        "timestamp" => Some(now.timestamp().to_string()),
        _ => None,
    }
}

/// Walks a dotted path through objects (and array indices), trying the
/// camelCase form of each segment when the literal key is absent.
pub fn lookup<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(context, |current, segment| match current {
        Value::Object(map) => map
            .get(segment)
            .or_else(|| map.get(&to_camel_case(segment))),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// `first_name` and `first-name` become `firstName`.
pub fn to_camel_case(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut upper_next = false;
    for c in segment.chars() {
        if c == '_' || c == '-' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Null counts as unresolved so the placeholder stays visible.
fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}
