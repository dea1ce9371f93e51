//! AI recommendation formatter
//!
//! Normalizes loosely shaped AI output into `Recommendation`s. Field shapes
//! vary between providers and runs: fix steps arrive as a string, a list of
//! strings, or a list of `{command, description}` objects. Everything is
//! funnelled through `FixStep` before it reaches the typed model.

use crate::recommendation::{id_timestamp, Category, Recommendation, Severity};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Confidence assigned when the AI omits one
pub const DEFAULT_AI_CONFIDENCE: f64 = 0.7;

/// Tokens that mark a free-text step as a shell command
static COMMAND_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:sudo|systemctl|dnf|pacman|apt)\b").expect("static regex")
});

/// Fields that make an object a recommendation rather than a wrapper
const ITEM_FIELDS: &[&str] = &["title", "issue", "description", "root_cause", "fix_steps", "solution"];

/// One normalized fix step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixStep {
    Command(String),
    Note(String),
    Structured {
        command: Option<String>,
        description: Option<String>,
    },
}

impl FixStep {
    /// Classify a raw JSON step
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(Self::from_text(s)),
            Value::Object(obj) => Some(FixStep::Structured {
                command: str_field(obj, "command"),
                description: str_field(obj, "description"),
            }),
            other => Some(FixStep::Note(other.to_string())),
        }
    }

    /// Free text is a command when it carries a known command token
    pub fn from_text(text: &str) -> Self {
        if COMMAND_TOKEN.is_match(text) {
            FixStep::Command(text.to_string())
        } else {
            FixStep::Note(text.to_string())
        }
    }
}

/// Split steps into (commands, description)
pub fn normalize_steps(steps: &[FixStep]) -> (Vec<String>, String) {
    let mut commands = Vec::new();
    let mut description = String::new();

    for step in steps {
        match step {
            FixStep::Command(cmd) => commands.push(cmd.clone()),
            FixStep::Note(text) => {
                description.push_str(text);
                description.push('\n');
            }
            FixStep::Structured { command, description: desc } => {
                if let Some(cmd) = command {
                    commands.push(cmd.clone());
                }
                if let Some(d) = desc {
                    description.push_str(d);
                    description.push('\n');
                }
            }
        }
    }

    (commands, description.trim().to_string())
}

/// Format one raw AI item. Returns None when the item reports an
/// upstream error.
pub fn format_ai_recommendation(item: &Value, index: usize) -> Option<Recommendation> {
    let obj = match item {
        Value::Object(obj) => obj,
        Value::String(text) => return Some(raw_text_recommendation(text, index)),
        other => return Some(raw_text_recommendation(&other.to_string(), index)),
    };

    if obj.contains_key("error") {
        debug!("Dropping AI item {} carrying an upstream error", index);
        return None;
    }

    if let Some(raw) = str_field(obj, "raw_recommendation") {
        return Some(raw_text_recommendation(&raw, index));
    }

    if !ITEM_FIELDS.iter().any(|k| obj.contains_key(*k)) {
        debug!("AI item {} has no recognized fields, keeping it as text", index);
        return Some(raw_text_recommendation(&item.to_string(), index));
    }

    let title = first_str(obj, &["title", "issue"])
        .unwrap_or_else(|| format!("AI Recommendation {}", index + 1));
    let severity = str_field(obj, "severity")
        .map(|s| Severity::parse_lenient(&s))
        .unwrap_or(Severity::Medium);
    let category = str_field(obj, "category")
        .map(|s| Category::parse_lenient(&s))
        .unwrap_or(Category::System);

    let steps: Vec<FixStep> = first_value(obj, &["fix_steps", "solution"])
        .map(as_items)
        .unwrap_or_default()
        .iter()
        .filter_map(|v| FixStep::from_value(v))
        .collect();
    let (fix_commands, fix_description) = normalize_steps(&steps);

    let verification_commands = first_value(obj, &["verification", "verify"])
        .map(as_items)
        .unwrap_or_default()
        .iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Object(o) => str_field(o, "command"),
            _ => None,
        })
        .collect();

    let prevention_measures = first_value(obj, &["prevention", "prevent_recurrence"])
        .map(as_items)
        .unwrap_or_default()
        .iter()
        .filter_map(|v| match v {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Object(o) => str_field(o, "description").or_else(|| Some(v.to_string())),
            other => Some(other.to_string()),
        })
        .collect();

    let mut rec = Recommendation::new(
        format!("ai_{}_{}", index, id_timestamp()),
        title,
        severity,
        category,
    );
    rec.description = first_str(obj, &["description", "root_cause"]).unwrap_or_default();
    rec.impact = str_field(obj, "impact")
        .unwrap_or_else(|| "System functionality may be affected".to_string());
    rec.fix_commands = fix_commands;
    rec.fix_description = fix_description;
    rec.risk_level = first_str(obj, &["risk_assessment", "risk"]).unwrap_or_else(|| "medium".to_string());
    rec.verification_commands = verification_commands;
    rec.prevention_measures = prevention_measures;
    rec.estimated_time = str_field(obj, "estimated_time").unwrap_or_else(|| "5-10 minutes".to_string());
    rec.requires_reboot = bool_field(obj, "requires_reboot").unwrap_or(false);
    rec.backup_recommended = bool_field(obj, "backup_recommended").unwrap_or(severity.is_high_impact());
    rec.ai_confidence = obj
        .get("confidence")
        .and_then(Value::as_f64)
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or(DEFAULT_AI_CONFIDENCE);

    Some(rec)
}

/// Best-effort recommendation for output that could not be structured
fn raw_text_recommendation(text: &str, index: usize) -> Recommendation {
    let mut rec = Recommendation::new(
        format!("ai_{}_{}", index, id_timestamp()),
        format!("AI Recommendation {}", index + 1),
        Severity::Medium,
        Category::System,
    );
    rec.description = text.trim().to_string();
    rec.impact = "System functionality may be affected".to_string();
    rec.risk_level = "medium".to_string();
    rec.estimated_time = "5-10 minutes".to_string();
    rec.ai_confidence = DEFAULT_AI_CONFIDENCE;
    rec
}

/// Split a raw AI response into items.
///
/// Extracts the JSON value spanning the first opening bracket to the matching
/// last closing one; whichever of `[` or `{` appears first wins. Anything
/// else, including malformed JSON, becomes a single unstructured item.
pub fn parse_ai_response(response: &str) -> Vec<Value> {
    let array = span(response, '[', ']');
    let object = span(response, '{', '}');

    let slice = match (array, object) {
        (Some((a_start, a)), Some((o_start, o))) => {
            if a_start < o_start {
                a
            } else {
                o
            }
        }
        (Some((_, a)), None) => a,
        (None, Some((_, o))) => o,
        (None, None) => return vec![unstructured(response, false)],
    };

    match serde_json::from_str::<Value>(slice) {
        Ok(Value::Array(items)) => items,
        Ok(Value::Object(obj)) => match wrapped_items(&obj) {
            Some(items) => items,
            None => vec![Value::Object(obj)],
        },
        Ok(other) => vec![other],
        Err(e) => {
            warn!("AI response is not valid JSON: {}", e);
            vec![unstructured(response, true)]
        }
    }
}

/// Parse and format a whole AI response, dropping error items
pub fn format_ai_response(response: &str) -> Vec<Recommendation> {
    parse_ai_response(response)
        .iter()
        .enumerate()
        .filter_map(|(i, item)| format_ai_recommendation(item, i))
        .collect()
}

/// Items of a wrapper object such as `{"recommendations": [{..}, {..}]}`:
/// no recommendation fields of its own and exactly one array field, holding
/// only objects
fn wrapped_items(obj: &Map<String, Value>) -> Option<Vec<Value>> {
    if ["title", "issue", "fix_steps", "solution"].iter().any(|k| obj.contains_key(*k)) {
        return None;
    }
    let mut arrays = obj.values().filter_map(Value::as_array);
    let items = arrays.next()?;
    if arrays.next().is_some() || items.is_empty() || !items.iter().all(Value::is_object) {
        return None;
    }
    Some(items.clone())
}

fn span(text: &str, open: char, close: char) -> Option<(usize, &str)> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end < start {
        return None;
    }
    Some((start, &text[start..=end]))
}

fn unstructured(response: &str, parse_error: bool) -> Value {
    let mut obj = Map::new();
    obj.insert("raw_recommendation".into(), Value::String(response.to_string()));
    obj.insert("structured".into(), Value::Bool(false));
    if parse_error {
        obj.insert("parse_error".into(), Value::Bool(true));
    }
    Value::Object(obj)
}

fn as_items(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

fn str_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn bool_field(obj: &Map<String, Value>, key: &str) -> Option<bool> {
    obj.get(key).and_then(Value::as_bool)
}

fn first_str(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| str_field(obj, k))
}

fn first_value<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k).filter(|v| !v.is_null()))
}
