//! Selector resolution — from "the red circles" to concrete object ids.
//!
//! DESIGN
//! ======
//! A selector is an explicit id, a free-text description, a structured
//! filter, or a list of any of those. Descriptions match on shape keywords
//! and a coarse color bucket; structured filters are turned into a
//! description and then truncated to `count`. Lists resolve element-wise
//! and union in first-seen order.
//!
//! Matching is scoped to objects intersecting the viewport unless the
//! caller opts out (the command said "anywhere"). Explicit ids skip the
//! viewport scope but must exist on the canvas.
//!
//! Colors are compared by bucket rather than exact value so "red" finds
//! `#EF4444`, `crimson` and `rgb(200, 30, 30)` alike. Every fill maps to
//! exactly one bucket, so two different bucket queries never share an id.

use std::collections::HashSet;
use std::fmt::Write;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::state::{CanvasObject, ObjectKind, Viewport};

// =============================================================================
// COLOR BUCKETS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorBucket {
    Red,
    Green,
    Blue,
    Purple,
    Black,
    White,
    Other,
}

const NAMED_COLORS: &[(&str, ColorBucket)] = &[
    ("red", ColorBucket::Red),
    ("darkred", ColorBucket::Red),
    ("crimson", ColorBucket::Red),
    ("firebrick", ColorBucket::Red),
    ("maroon", ColorBucket::Red),
    ("tomato", ColorBucket::Red),
    ("indianred", ColorBucket::Red),
    ("green", ColorBucket::Green),
    ("darkgreen", ColorBucket::Green),
    ("lime", ColorBucket::Green),
    ("limegreen", ColorBucket::Green),
    ("lightgreen", ColorBucket::Green),
    ("forestgreen", ColorBucket::Green),
    ("seagreen", ColorBucket::Green),
    ("olive", ColorBucket::Green),
    ("blue", ColorBucket::Blue),
    ("darkblue", ColorBucket::Blue),
    ("navy", ColorBucket::Blue),
    ("royalblue", ColorBucket::Blue),
    ("mediumblue", ColorBucket::Blue),
    ("dodgerblue", ColorBucket::Blue),
    ("steelblue", ColorBucket::Blue),
    ("skyblue", ColorBucket::Blue),
    ("lightblue", ColorBucket::Blue),
    ("purple", ColorBucket::Purple),
    ("violet", ColorBucket::Purple),
    ("magenta", ColorBucket::Purple),
    ("fuchsia", ColorBucket::Purple),
    ("indigo", ColorBucket::Purple),
    ("orchid", ColorBucket::Purple),
    ("plum", ColorBucket::Purple),
    ("lavender", ColorBucket::Purple),
    ("black", ColorBucket::Black),
    ("white", ColorBucket::White),
    ("orange", ColorBucket::Other),
    ("yellow", ColorBucket::Other),
    ("gold", ColorBucket::Other),
    ("pink", ColorBucket::Other),
    ("brown", ColorBucket::Other),
    ("gray", ColorBucket::Other),
    ("grey", ColorBucket::Other),
    ("silver", ColorBucket::Other),
    ("cyan", ColorBucket::Other),
    ("teal", ColorBucket::Other),
];

/// True if `word` names a color this module knows.
#[must_use]
pub fn is_color_word(word: &str) -> bool {
    let word = word.trim().to_ascii_lowercase();
    named_bucket(&word).is_some() || parse_hex(&word).is_some()
}

fn named_bucket(name: &str) -> Option<ColorBucket> {
    NAMED_COLORS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, b)| *b)
}

/// Bucket for a fill or requested color. `None` for an empty string, which
/// callers treat as "any color".
#[must_use]
pub fn bucket_for(color: &str) -> Option<ColorBucket> {
    let color = color.trim().to_ascii_lowercase();
    if color.is_empty() {
        return None;
    }
    if let Some(bucket) = named_bucket(&color) {
        return Some(bucket);
    }
    match parse_hex(&color).or_else(|| parse_rgb(&color)) {
        Some((r, g, b)) => Some(bucket_rgb(r, g, b)),
        None => Some(ColorBucket::Other),
    }
}

fn bucket_rgb(r: u8, g: u8, b: u8) -> ColorBucket {
    let (r, g, b) = (f64::from(r), f64::from(g), f64::from(b));
    let sum = r + g + b;
    if sum <= 120.0 {
        return ColorBucket::Black;
    }
    if sum >= 690.0 {
        return ColorBucket::White;
    }
    if r > g + 40.0 && b > g + 40.0 && (r - b).abs() <= 120.0 {
        return ColorBucket::Purple;
    }
    if r > g && r > b {
        // Strong green component pulls red toward orange/pink.
        return if g > r * 0.45 { ColorBucket::Other } else { ColorBucket::Red };
    }
    if g > r && g > b {
        return if r > g * 0.8 { ColorBucket::Other } else { ColorBucket::Green };
    }
    if b > r && b > g {
        return ColorBucket::Blue;
    }
    ColorBucket::Other
}

fn parse_hex(s: &str) -> Option<(u8, u8, u8)> {
    let hex = s.strip_prefix('#')?;
    let channel = |h: &str| u8::from_str_radix(h, 16).ok();
    match hex.len() {
        3 => {
            let mut it = hex.chars().map(|c| channel(&format!("{c}{c}")));
            Some((it.next()??, it.next()??, it.next()??))
        }
        6 | 8 => Some((channel(hex.get(0..2)?)?, channel(hex.get(2..4)?)?, channel(hex.get(4..6)?)?)),
        _ => None,
    }
}

fn parse_rgb(s: &str) -> Option<(u8, u8, u8)> {
    let inner = s
        .strip_prefix("rgba(")
        .or_else(|| s.strip_prefix("rgb("))?
        .strip_suffix(')')?;
    let mut parts = inner.split(',').map(|p| p.trim().parse::<f64>().ok());
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let mut next = || -> Option<u8> {
        let v = parts.next()??;
        Some(v.clamp(0.0, 255.0).round() as u8)
    };
    Some((next()?, next()?, next()?))
}

// =============================================================================
// SELECTOR
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Selector {
    Many(Vec<Selector>),
    /// An object id or a free-text description.
    Text(String),
    Structured(StructuredSelector),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredSelector {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default, rename = "type", alias = "kind", alias = "shape")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub count: Option<usize>,
}

/// Accept `2`, `2.0` or `"2"` for counts; models are not consistent.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let rounded = n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64);
                rounded
            })
            .and_then(|n| usize::try_from(n).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

impl Selector {
    #[must_use]
    pub fn ids(ids: &[Uuid]) -> Self {
        Self::Many(ids.iter().map(|id| Self::Text(id.to_string())).collect())
    }
}

// =============================================================================
// RESOLVER
// =============================================================================

const PRONOUNS: &[&str] = &["it", "them", "that", "those", "this", "these", "selected", "selection"];
const EVERYTHING: &[&str] = &["all", "everything", "objects", "shapes", "items", "elements", "canvas", "board"];

/// Resolves selectors against one snapshot of the canvas.
pub struct SelectorResolver<'a> {
    objects: Vec<&'a CanvasObject>,
    visible: HashSet<Uuid>,
    last_selection: &'a [Uuid],
}

impl<'a> SelectorResolver<'a> {
    /// `screen` is the client viewport size in pixels before zoom.
    #[must_use]
    pub fn new(
        objects: &'a [CanvasObject],
        viewport: &Viewport,
        screen: (f64, f64),
        last_selection: &'a [Uuid],
    ) -> Self {
        let (left, top, right, bottom) = viewport.world_rect(screen.0, screen.1);
        let visible = objects
            .iter()
            .filter(|o| o.intersects(left, top, right, bottom))
            .map(|o| o.id)
            .collect();
        let mut sorted: Vec<&CanvasObject> = objects.iter().collect();
        sorted.sort_by_key(|o| o.z_index);
        Self { objects: sorted, visible, last_selection }
    }

    /// Ids of objects intersecting the viewport, in z order.
    #[must_use]
    pub fn visible_ids(&self) -> Vec<Uuid> {
        self.objects
            .iter()
            .filter(|o| self.visible.contains(&o.id))
            .map(|o| o.id)
            .collect()
    }

    /// All object ids in z order, optionally restricted to the viewport.
    #[must_use]
    pub fn all_ids(&self, visible_only: bool) -> Vec<Uuid> {
        if visible_only { self.visible_ids() } else { self.objects.iter().map(|o| o.id).collect() }
    }

    /// Short human/LLM-readable summary of what is on screen.
    #[must_use]
    pub fn visible_summary(&self, limit: usize) -> String {
        let visible: Vec<&&CanvasObject> = self
            .objects
            .iter()
            .filter(|o| self.visible.contains(&o.id))
            .collect();
        if visible.is_empty() {
            return "(no objects visible)".into();
        }
        let mut out = format!("{} object(s) visible:\n", visible.len());
        for obj in visible.iter().take(limit) {
            let _ = writeln!(
                out,
                "- id={} type={} x={:.0} y={:.0} w={:.0} h={:.0} fill={}{}",
                obj.id,
                obj.kind,
                obj.x,
                obj.y,
                obj.width,
                obj.height,
                obj.fill,
                obj.text
                    .as_deref()
                    .map(|t| format!(" text={t:?}"))
                    .unwrap_or_default(),
            );
        }
        if visible.len() > limit {
            let _ = writeln!(out, "- ... and {} more", visible.len() - limit);
        }
        out
    }

    /// Resolve `selector` to ids in z order (lists keep first-seen order).
    #[must_use]
    pub fn resolve(&self, selector: &Selector, visible_only: bool) -> Vec<Uuid> {
        match selector {
            Selector::Many(items) => {
                let mut out: Vec<Uuid> = Vec::new();
                for item in items {
                    for id in self.resolve(item, visible_only) {
                        if !out.contains(&id) {
                            out.push(id);
                        }
                    }
                }
                out
            }
            Selector::Text(text) => match text.trim().parse::<Uuid>() {
                Ok(id) => self
                    .objects
                    .iter()
                    .filter(|o| o.id == id)
                    .map(|o| o.id)
                    .collect(),
                Err(_) => self.resolve_description(text, visible_only),
            },
            Selector::Structured(s) => {
                let text = match s.description.as_deref().filter(|d| !d.trim().is_empty()) {
                    Some(d) => d.to_string(),
                    None if s.color.is_none() && s.kind.is_none() => return Vec::new(),
                    None => {
                        let color = s.color.as_deref().unwrap_or("");
                        let kind = s.kind.as_deref().unwrap_or("objects");
                        format!("{color} {kind}")
                    }
                };
                let mut ids = self.resolve_description(&text, visible_only);
                // A description without a color still honours an explicit color field.
                if let Some(bucket) = s.color.as_deref().and_then(bucket_for) {
                    ids.retain(|id| self.bucket_of(*id) == Some(bucket));
                }
                if let Some(count) = s.count {
                    ids.truncate(count);
                }
                ids
            }
        }
    }

    fn bucket_of(&self, id: Uuid) -> Option<ColorBucket> {
        self.objects
            .iter()
            .find(|o| o.id == id)
            .and_then(|o| bucket_for(&o.fill))
    }

    fn resolve_description(&self, description: &str, visible_only: bool) -> Vec<Uuid> {
        let lowered = description.to_ascii_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '#'))
            .filter(|w| !w.is_empty())
            .collect();

        let kinds = kinds_in(&words);
        let bucket = words
            .iter()
            .find(|w| is_color_word(w))
            .and_then(|w| bucket_for(w));
        let explicit_all = words.iter().any(|w| matches!(*w, "all" | "everything"));
        let generic = words.iter().any(|w| EVERYTHING.contains(w));
        let pronoun = words.iter().any(|w| PRONOUNS.contains(w));

        if kinds.is_empty() && bucket.is_none() && !explicit_all {
            // "those shapes" means the last selection, not every shape.
            if pronoun {
                return self
                    .objects
                    .iter()
                    .filter(|o| self.last_selection.contains(&o.id))
                    .map(|o| o.id)
                    .collect();
            }
            if !generic {
                return Vec::new();
            }
        }

        self.objects
            .iter()
            .filter(|o| !visible_only || self.visible.contains(&o.id))
            .filter(|o| kinds.is_empty() || kinds.contains(&o.kind))
            .filter(|o| bucket.is_none() || bucket_for(&o.fill) == bucket)
            .map(|o| o.id)
            .collect()
    }
}

fn kinds_in(words: &[&str]) -> Vec<ObjectKind> {
    let mut kinds = Vec::new();
    for word in words {
        let found: &[ObjectKind] = match *word {
            "rectangle" | "rectangles" | "rect" | "rects" | "square" | "squares" | "box" | "boxes" => {
                &[ObjectKind::Rectangle]
            }
            "circle" | "circles" | "ellipse" | "ellipses" | "oval" | "ovals" => &[ObjectKind::Circle, ObjectKind::Ellipse],
            "text" | "texts" | "label" | "labels" => &[ObjectKind::Text],
            _ => &[],
        };
        for kind in found {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }
    }
    kinds
}

#[cfg(test)]
#[path = "selector_test.rs"]
mod tests;
