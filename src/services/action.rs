//! Action vocabulary and the parsing boundary for model output.
//!
//! DESIGN
//! ======
//! Models answer in several shapes: parameters at the root, nested under
//! "parameters", nested under "properties", or a mix. `parse_action`
//! flattens them in one step with the precedence
//! `root < properties < parameters`, folds the assorted target keys into
//! `target`, canonicalises the action name, and only then hands the value
//! to serde. Everything downstream works with the typed `Action`.
//!
//! Plans are a bare array of actions or an object with a `steps` array.
//! Steps that do not parse are dropped.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};
use tracing::warn;

use super::layout::Axis;
use super::selector::Selector;

/// Keys that carry the action name.
const ACTION_KEYS: &[&str] = &["action", "tool", "name", "command"];

/// Keys models use for the objects an action applies to.
const TARGET_ALIASES: &[&str] = &["objectId", "objectIds", "ids", "selector", "targets", "targetId", "targetIds"];

const VOCABULARY: &[&str] = &[
    "createRectangle",
    "createCircle",
    "createEllipse",
    "createText",
    "moveObject",
    "resizeObject",
    "rotateObject",
    "deleteObject",
    "arrangeHorizontal",
    "arrangeVertical",
    "arrangeGrid",
    "distributeEvenly",
    "undo",
    "help",
    "clarify",
];

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "parameters", rename_all = "camelCase")]
pub enum Action {
    CreateRectangle(CreateShape),
    CreateCircle(CreateCircle),
    CreateEllipse(CreateShape),
    CreateText(CreateText),
    MoveObject(MoveParams),
    ResizeObject(ResizeParams),
    RotateObject(RotateParams),
    DeleteObject(TargetParams),
    ArrangeHorizontal(ArrangeParams),
    ArrangeVertical(ArrangeParams),
    ArrangeGrid(GridParams),
    DistributeEvenly(DistributeParams),
    Undo(UndoParams),
    Help {},
    Clarify(ClarifyParams),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShape {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub y: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub width: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub height: Option<f64>,
    #[serde(default, alias = "color")]
    pub fill: Option<String>,
    /// Width over height; with no explicit size the height stays default.
    #[serde(default, alias = "aspect", deserialize_with = "lenient_f64")]
    pub aspect_ratio: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCircle {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub y: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub radius: Option<f64>,
    #[serde(default, alias = "color")]
    pub fill: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateText {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub y: Option<f64>,
    #[serde(default, alias = "content", alias = "label")]
    pub text: String,
    #[serde(default, alias = "size", deserialize_with = "lenient_f64")]
    pub font_size: Option<f64>,
    #[serde(default, alias = "color")]
    pub fill: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetParams {
    #[serde(default)]
    pub target: Option<Selector>,
}

/// Absolute (`x`/`y`) or relative (`dx`/`dy`) move.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveParams {
    #[serde(default)]
    pub target: Option<Selector>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub y: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub dx: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub dy: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeParams {
    #[serde(default)]
    pub target: Option<Selector>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub width: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub height: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub radius: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub font_size: Option<f64>,
    /// Multiplier applied to the current size.
    #[serde(default, alias = "factor", deserialize_with = "lenient_f64")]
    pub scale: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotateParams {
    #[serde(default)]
    pub target: Option<Selector>,
    #[serde(default, alias = "degrees", alias = "angle", deserialize_with = "lenient_f64")]
    pub rotation: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrangeParams {
    #[serde(default)]
    pub target: Option<Selector>,
    #[serde(default, alias = "gap", deserialize_with = "lenient_f64")]
    pub spacing: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridParams {
    #[serde(default)]
    pub target: Option<Selector>,
    #[serde(default, alias = "cols", deserialize_with = "lenient_usize")]
    pub columns: Option<usize>,
    #[serde(default, alias = "gap", deserialize_with = "lenient_f64")]
    pub spacing: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributeParams {
    #[serde(default)]
    pub target: Option<Selector>,
    #[serde(default, alias = "axis", alias = "orientation")]
    pub direction: Axis,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoParams {
    #[serde(default, alias = "steps", alias = "n", deserialize_with = "lenient_usize")]
    pub count: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarifyParams {
    #[serde(default, alias = "message")]
    pub question: String,
    #[serde(default)]
    pub missing: Option<Vec<String>>,
}

impl Action {
    /// Vocabulary name, as models write it.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateRectangle(_) => "createRectangle",
            Self::CreateCircle(_) => "createCircle",
            Self::CreateEllipse(_) => "createEllipse",
            Self::CreateText(_) => "createText",
            Self::MoveObject(_) => "moveObject",
            Self::ResizeObject(_) => "resizeObject",
            Self::RotateObject(_) => "rotateObject",
            Self::DeleteObject(_) => "deleteObject",
            Self::ArrangeHorizontal(_) => "arrangeHorizontal",
            Self::ArrangeVertical(_) => "arrangeVertical",
            Self::ArrangeGrid(_) => "arrangeGrid",
            Self::DistributeEvenly(_) => "distributeEvenly",
            Self::Undo(_) => "undo",
            Self::Help {} => "help",
            Self::Clarify(_) => "clarify",
        }
    }

    /// The selector for actions that operate on existing objects.
    #[must_use]
    pub fn target(&self) -> Option<&Selector> {
        match self {
            Self::MoveObject(p) => p.target.as_ref(),
            Self::ResizeObject(p) => p.target.as_ref(),
            Self::RotateObject(p) => p.target.as_ref(),
            Self::DeleteObject(p) => p.target.as_ref(),
            Self::ArrangeHorizontal(p) | Self::ArrangeVertical(p) => p.target.as_ref(),
            Self::ArrangeGrid(p) => p.target.as_ref(),
            Self::DistributeEvenly(p) => p.target.as_ref(),
            _ => None,
        }
    }
}

// =============================================================================
// LENIENT NUMBERS
// =============================================================================

fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches("px").trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|f: &f64| f.is_finite())
}

/// Accept `100`, `100.5`, `"100"` or `"100px"`.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number))
}

fn lenient_usize<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let count = value
        .as_ref()
        .and_then(number)
        .filter(|f| *f >= 0.0)
        .map(|f| f.round() as usize);
    Ok(count)
}

// =============================================================================
// PARSING
// =============================================================================

/// Canonical vocabulary name for `raw`, ignoring case, `_`, `-` and spaces.
#[must_use]
pub fn canonical_action(raw: &str) -> Option<&'static str> {
    let squash = |s: &str| -> String {
        s.chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect()
    };
    let wanted = squash(raw);
    VOCABULARY.iter().copied().find(|name| squash(name) == wanted)
}

/// Remove a surrounding Markdown code fence, with or without a language tag.
#[must_use]
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Pull the first JSON value out of a model reply.
fn extract_json(text: &str) -> Option<Value> {
    let text = strip_code_fences(text);
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }
    // Prose around the JSON: take the outermost bracketed span.
    let start = text.find(['{', '['])?;
    let close = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(close)?;
    (end > start)
        .then(|| serde_json::from_str(&text[start..=end]).ok())
        .flatten()
}

/// Flatten one raw action object into `{action, parameters}` form.
fn flatten(object: &Map<String, Value>) -> Option<Value> {
    let name = ACTION_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .and_then(canonical_action)?;

    let mut params = Map::new();
    for (key, value) in object {
        if ACTION_KEYS.contains(&key.as_str()) || key == "parameters" || key == "properties" {
            continue;
        }
        params.insert(key.clone(), value.clone());
    }
    for nested in ["properties", "parameters"] {
        if let Some(Value::Object(inner)) = object.get(nested) {
            for (key, value) in inner {
                params.insert(key.clone(), value.clone());
            }
        }
    }

    if !params.contains_key("target") {
        if let Some(value) = TARGET_ALIASES.iter().find_map(|key| params.get(*key).cloned()) {
            params.insert("target".into(), value);
        }
    }
    for alias in TARGET_ALIASES {
        params.remove(*alias);
    }
    if params.get("target").is_some_and(Value::is_null) {
        params.remove("target");
    }

    Some(json!({ "action": name, "parameters": params }))
}

fn action_from_value(value: &Value) -> Option<Action> {
    let flat = flatten(value.as_object()?)?;
    match serde_json::from_value(flat) {
        Ok(action) => Some(action),
        Err(e) => {
            warn!(error = %e, "action: model output did not match the vocabulary");
            None
        }
    }
}

/// Parse a single action from a model reply.
#[must_use]
pub fn parse_action(text: &str) -> Option<Action> {
    match extract_json(text)? {
        Value::Array(items) => items.iter().find_map(action_from_value),
        value => action_from_value(&value),
    }
}

/// Parse an ordered plan from a model reply. `None` if nothing usable.
#[must_use]
pub fn parse_plan(text: &str) -> Option<Vec<Action>> {
    let value = extract_json(text)?;
    let steps = match &value {
        Value::Array(items) => items.clone(),
        Value::Object(object) => match ["steps", "actions", "plan"]
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_array))
        {
            Some(items) => items.clone(),
            None => vec![value.clone()],
        },
        _ => return None,
    };
    let actions: Vec<Action> = steps.iter().filter_map(action_from_value).collect();
    (!actions.is_empty()).then_some(actions)
}

#[cfg(test)]
#[path = "action_test.rs"]
mod tests;
