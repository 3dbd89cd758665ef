//! Deterministic regex parser, the last strategy before giving up.
//!
//! Recognises the common phrasings of every vocabulary action without a
//! model. Targets come back as free-text selectors for the resolver; a
//! missing target is left `None` so the caller can fall back to context.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::action::{
    Action, ArrangeParams, CreateCircle, CreateShape, CreateText, DistributeParams, GridParams, MoveParams,
    ResizeParams, RotateParams, TargetParams, UndoParams,
};
use super::layout::Axis;
use super::selector::{Selector, is_color_word};

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex")
}

static UNDO: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)^\s*(?:please\s+)?undo\b(?:\s+(?:the\s+)?(?:last\s+)?(\d+))?"));
static HELP: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)^\s*(?:help\b|what can you do|\?+\s*$)"));

/// Polite lead-ins allowed before the command verb.
const LEAD: &str = r"(?i)^\s*(?:(?:please|pls|kindly|now|then|also|ok(?:ay)?|(?:can|could|would|will)\s+you)[\s,]+)*";

fn verb(pattern: &str) -> Regex {
    re(&format!("{LEAD}{pattern}"))
}

static DELETE: LazyLock<Regex> = LazyLock::new(|| verb(r"(?:delete|remove|erase|clear)\b\s*(.*)$"));
static ROTATE: LazyLock<Regex> = LazyLock::new(|| verb(r"(?:rotate|turn|spin)\b\s*(.*)$"));
static DISTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| verb(r"(?:distribute|space\s+out|space\s+evenly|evenly\s+space)\b\s*(.*)$"));
static ARRANGE: LazyLock<Regex> =
    LazyLock::new(|| verb(r"(?:arrange|line\s+up|align|lay\s+out|organi[sz]e|stack)\b\s*(.*)$"));
static RESIZE: LazyLock<Regex> = LazyLock::new(|| verb(r"(?:resize|scale|grow|shrink)\b\s*(.*)$"));
static MAKE_BIGGER: LazyLock<Regex> = LazyLock::new(|| {
    verb(r"make\b\s*(.*?)\s*\b(bigger|larger|smaller|twice as (?:big|large)|half (?:the )?size|double(?: the)? size)\b")
});
static MOVE: LazyLock<Regex> = LazyLock::new(|| verb(r"(?:move|shift|drag)\b\s*(.*)$"));
static CREATE: LazyLock<Regex> = LazyLock::new(|| {
    verb(r"(?:create|add|draw|make|place|insert|new)\b.*?\b(rectangles?|rects?|squares?|box(?:es)?|circles?|ellipses?|ovals?|text|label|note)\b")
});
/// Words that open a new object rather than name an existing one.
static INDEFINITE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)^(?:a|an|another|new|one more)\b"));

static SIZE_PAIR: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)(\d+(?:\.\d+)?)\s*(?:x|×|by)\s*(\d+(?:\.\d+)?)"));
static X_COORD: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\bx\s*[:=]?\s*(-?\d+(?:\.\d+)?)"));
static Y_COORD: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\by\s*[:=]?\s*(-?\d+(?:\.\d+)?)"));
static AT_POINT: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\b(?:at|to)\s*\(?\s*(-?\d+(?:\.\d+)?)\s*[, ]\s*(-?\d+(?:\.\d+)?)\s*\)?"));
static WIDTH: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\b(?:width|w)\s*[:=]?\s*(?:of\s+|to\s+)?(\d+(?:\.\d+)?)"));
static HEIGHT: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\b(?:height|h)\s*[:=]?\s*(?:of\s+|to\s+)?(\d+(?:\.\d+)?)"));
static RADIUS: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\bradius\s*[:=]?\s*(?:of\s+|to\s+)?(\d+(?:\.\d+)?)"));
static DIAMETER: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\bdiameter\s*[:=]?\s*(?:of\s+|to\s+)?(\d+(?:\.\d+)?)"));
static FONT_SIZE: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\b(?:font\s*size|size)\s*[:=]?\s*(?:of\s+|to\s+)?(\d+(?:\.\d+)?)"));
static ASPECT: LazyLock<Regex> = LazyLock::new(|| re(r"(\d+(?:\.\d+)?)\s*:\s*(\d+(?:\.\d+)?)"));
static QUOTED: LazyLock<Regex> = LazyLock::new(|| re(r#"["“']([^"”']+)["”']"#));
static SAYING: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\b(?:saying|that says|with text|reading)\s+(.+)$"));
static DEGREES: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)(-?\d+(?:\.\d+)?)\s*(?:°|deg(?:rees?)?)?"));
static DIRECTION: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\b(left|right|up|down)\b(?:\s+(?:by\s+)?(\d+(?:\.\d+)?))?"));
static COLUMNS: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)(\d+)\s*(?:columns?|cols?)\b"));
static SPACING: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)(?:(?:spacing|gap)\s*(?:of\s+)?(\d+(?:\.\d+)?))|(?:(\d+(?:\.\d+)?)\s*(?:px\s*)?(?:apart|spacing|gap))")
});
static BY_FACTOR: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\bby\s+(\d+(?:\.\d+)?)\s*(?:x|times)\b"));
static HEX: LazyLock<Regex> = LazyLock::new(|| re(r"#[0-9a-fA-F]{3,8}\b"));
/// Where a target phrase ends and the parameters begin.
static TARGET_END: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)\s*\b(?:to|by|at|into|in a|in|with|left|right|up|down|horizontally|vertically|clockwise|counterclockwise|anticlockwise|\d)\b.*$|\s+-?\d.*$")
});

/// Default distance for "move it left" without a number.
const DEFAULT_NUDGE: f64 = 100.0;

/// Parse `text` into one action, or `None` if no phrasing matches.
///
/// Verbs only count at the start of the command, and quoted text or a
/// trailing "saying ..." is payload, never a verb.
#[must_use]
pub fn parse(text: &str) -> Option<Action> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Some(caps) = UNDO.captures(text) {
        let count = caps.get(1).and_then(|m| m.as_str().parse().ok());
        return Some(Action::Undo(UndoParams { count }));
    }
    if HELP.is_match(text) {
        return Some(Action::Help {});
    }

    let unquoted = QUOTED.replace_all(text, "\"\"");
    let scan = SAYING.replace(&unquoted, "");
    let scan = scan.trim();
    if let Some(caps) = DISTRIBUTE.captures(scan) {
        return Some(distribute(scan, &caps));
    }
    if let Some(caps) = ARRANGE.captures(scan) {
        return Some(arrange(scan, &caps));
    }
    if let Some(caps) = ROTATE.captures(scan) {
        return rotate(scan, &caps);
    }
    if let Some(caps) = DELETE.captures(scan) {
        return Some(Action::DeleteObject(TargetParams { target: target_of(rest(&caps)) }));
    }
    if let Some(caps) = MAKE_BIGGER.captures(scan).filter(|c| !INDEFINITE.is_match(rest(c))) {
        return Some(relative_resize(&caps));
    }
    if let Some(caps) = RESIZE.captures(scan) {
        return resize(scan, &caps);
    }
    if let Some(caps) = CREATE.captures(scan) {
        return create(text, scan, &caps);
    }
    if let Some(caps) = MOVE.captures(scan) {
        return move_to(scan, &caps);
    }
    None
}

fn rest<'t>(caps: &Captures<'t>) -> &'t str {
    caps.get(1).map_or("", |m| m.as_str())
}

fn group(caps: &Captures<'_>, index: usize) -> Option<f64> {
    caps.get(index)?.as_str().parse().ok()
}

fn num(caps: Option<Captures<'_>>, index: usize) -> Option<f64> {
    group(&caps?, index)
}

/// The target phrase at the start of `phrase`, if it names anything.
fn target_of(phrase: &str) -> Option<Selector> {
    let head = TARGET_END.replace(phrase, "");
    let head = head.trim().trim_end_matches(['.', ',', '!', '?']).trim();
    let meaningful = head
        .split_whitespace()
        .any(|w| !matches!(w.to_ascii_lowercase().as_str(), "the" | "a" | "an" | "please" | "all" | "of"))
        || head.eq_ignore_ascii_case("all");
    meaningful.then(|| Selector::Text(head.to_string()))
}

fn color_in(text: &str) -> Option<String> {
    if let Some(hex) = HEX.find(text) {
        return Some(hex.as_str().to_string());
    }
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .find(|w| !w.is_empty() && is_color_word(w))
        .map(str::to_ascii_lowercase)
}

fn spacing_in(text: &str) -> Option<f64> {
    let caps = SPACING.captures(text)?;
    caps.get(1).or_else(|| caps.get(2))?.as_str().parse().ok()
}

// =============================================================================
// CREATE
// =============================================================================

/// Parameters come from `scan`; only a text body is read from `text`.
fn create(text: &str, scan: &str, caps: &Captures<'_>) -> Option<Action> {
    let noun = caps.get(1)?.as_str().to_ascii_lowercase();
    let fill = color_in(scan);

    // Pull "120x60" out first so its "x" is not read as a coordinate.
    let (pair_w, pair_h, remainder) = match SIZE_PAIR.captures(scan) {
        Some(pair) => (
            group(&pair, 1),
            group(&pair, 2),
            scan.replacen(pair.get(0).map_or("", |m| m.as_str()), " ", 1),
        ),
        None => (None, None, scan.to_string()),
    };

    let at = AT_POINT.captures(&remainder);
    let x = num(X_COORD.captures(&remainder), 1).or_else(|| at.as_ref().and_then(|c| group(c, 1)));
    let y = num(Y_COORD.captures(&remainder), 1).or_else(|| at.as_ref().and_then(|c| group(c, 2)));
    let width = num(WIDTH.captures(&remainder), 1).or(pair_w);
    let height = num(HEIGHT.captures(&remainder), 1).or(pair_h);

    if noun.starts_with("circle") {
        let radius = num(RADIUS.captures(&remainder), 1)
            .or_else(|| num(DIAMETER.captures(&remainder), 1).map(|d| d / 2.0))
            .or_else(|| width.map(|w| w / 2.0));
        return Some(Action::CreateCircle(CreateCircle { x, y, radius, fill }));
    }

    if matches!(noun.as_str(), "text" | "label" | "note") {
        let body = QUOTED
            .captures(text)
            .or_else(|| SAYING.captures(text))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())?;
        let font_size = num(FONT_SIZE.captures(&remainder), 1);
        return Some(Action::CreateText(CreateText { x, y, text: body, font_size, fill }));
    }

    let aspect_ratio = ASPECT.captures(&remainder).and_then(|c| {
        let w: f64 = c.get(1)?.as_str().parse().ok()?;
        let h: f64 = c.get(2)?.as_str().parse().ok()?;
        (h > 0.0).then_some(w / h)
    });
    let (width, height) = if noun.starts_with("square") {
        let side = width.or(height);
        (side, side)
    } else {
        (width, height)
    };
    let shape = CreateShape { x, y, width, height, fill, aspect_ratio };
    if noun.starts_with("ellipse") || noun.starts_with("oval") {
        Some(Action::CreateEllipse(shape))
    } else {
        Some(Action::CreateRectangle(shape))
    }
}

// =============================================================================
// EDIT
// =============================================================================

fn move_to(text: &str, caps: &Captures<'_>) -> Option<Action> {
    let phrase = rest(caps);
    let target = target_of(phrase);
    let at = AT_POINT.captures(phrase);
    let x = num(X_COORD.captures(phrase), 1).or_else(|| at.as_ref().and_then(|c| group(c, 1)));
    let y = num(Y_COORD.captures(phrase), 1).or_else(|| at.as_ref().and_then(|c| group(c, 2)));

    let (mut dx, mut dy) = (None, None);
    for dir in DIRECTION.captures_iter(text) {
        let amount = dir
            .get(2)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(DEFAULT_NUDGE);
        match dir.get(1).map(|m| m.as_str().to_ascii_lowercase()).as_deref() {
            Some("left") => dx = Some(-amount),
            Some("right") => dx = Some(amount),
            Some("up") => dy = Some(-amount),
            Some("down") => dy = Some(amount),
            _ => {}
        }
    }

    if x.is_none() && y.is_none() && dx.is_none() && dy.is_none() {
        return None;
    }
    Some(Action::MoveObject(MoveParams { target, x, y, dx, dy }))
}

fn resize(text: &str, caps: &Captures<'_>) -> Option<Action> {
    let phrase = rest(caps);
    let target = target_of(phrase);
    let pair = SIZE_PAIR.captures(phrase);
    let width = num(WIDTH.captures(phrase), 1).or_else(|| pair.as_ref().and_then(|c| group(c, 1)));
    let height = num(HEIGHT.captures(phrase), 1).or_else(|| pair.as_ref().and_then(|c| group(c, 2)));
    let radius = num(RADIUS.captures(phrase), 1);
    let font_size = num(FONT_SIZE.captures(phrase), 1).filter(|_| width.is_none() && height.is_none());
    let scale = scale_word(text).or_else(|| num(BY_FACTOR.captures(phrase), 1));
    if width.is_none() && height.is_none() && radius.is_none() && font_size.is_none() && scale.is_none() {
        return None;
    }
    Some(Action::ResizeObject(ResizeParams { target, width, height, radius, font_size, scale }))
}

fn scale_word(text: &str) -> Option<f64> {
    let lowered = text.to_ascii_lowercase();
    if lowered.contains("twice") || lowered.contains("double") {
        Some(2.0)
    } else if lowered.contains("half") {
        Some(0.5)
    } else if lowered.contains("bigger") || lowered.contains("larger") || lowered.contains("grow") {
        Some(1.5)
    } else if lowered.contains("smaller") || lowered.contains("shrink") {
        Some(0.75)
    } else {
        None
    }
}

fn relative_resize(caps: &Captures<'_>) -> Action {
    let target = target_of(rest(caps));
    let scale = caps.get(2).and_then(|m| scale_word(m.as_str()));
    Action::ResizeObject(ResizeParams { target, scale, ..ResizeParams::default() })
}

fn rotate(text: &str, caps: &Captures<'_>) -> Option<Action> {
    let phrase = rest(caps);
    let target = target_of(phrase);
    let degrees: f64 = DEGREES.captures(phrase)?.get(1)?.as_str().parse().ok()?;
    let lowered = text.to_ascii_lowercase();
    let rotation = if lowered.contains("counterclockwise") || lowered.contains("anticlockwise") {
        -degrees
    } else {
        degrees
    };
    Some(Action::RotateObject(RotateParams { target, rotation: Some(rotation) }))
}

// =============================================================================
// LAYOUT
// =============================================================================

fn arrange(text: &str, caps: &Captures<'_>) -> Action {
    let lowered = text.to_ascii_lowercase();
    let phrase = rest(caps);
    let target = target_of(phrase);
    let spacing = spacing_in(text);
    if lowered.contains("grid") {
        let columns = COLUMNS
            .captures(text)
            .and_then(|c| c.get(1)?.as_str().parse().ok());
        return Action::ArrangeGrid(GridParams { target, columns, spacing });
    }
    let vertical = ["vertical", "column", "stack", "top to bottom"]
        .iter()
        .any(|w| lowered.contains(w));
    let params = ArrangeParams { target, spacing };
    if vertical { Action::ArrangeVertical(params) } else { Action::ArrangeHorizontal(params) }
}

fn distribute(text: &str, caps: &Captures<'_>) -> Action {
    let lowered = text.to_ascii_lowercase();
    let direction = if lowered.contains("vertical") { Axis::Vertical } else { Axis::Horizontal };
    Action::DistributeEvenly(DistributeParams { target: target_of(rest(caps)), direction })
}

#[cfg(test)]
#[path = "fallback_test.rs"]
mod tests;
