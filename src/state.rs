//! Shared domain types.
//!
//! DESIGN
//! ======
//! `CanvasObject` is the unit the agent reads and writes. The canvas itself
//! belongs to an external store; the agent only relies on the geometry,
//! fill, z-order, text and bookkeeping fields declared here. Positions are
//! the top-left corner of the unrotated bounding box, so every kind shares
//! one bounds check.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// CANVAS OBJECT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Rectangle,
    Circle,
    Ellipse,
    Text,
}

impl ObjectKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rectangle => "rectangle",
            Self::Circle => "circle",
            Self::Ellipse => "ellipse",
            Self::Text => "text",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A positioned shape on the shared canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasObject {
    pub id: Uuid,
    pub kind: ObjectKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Degrees, kept in `[0, 360)` by the executor.
    pub rotation: f64,
    pub fill: String,
    pub z_index: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default)]
    pub last_modified_by: Option<Uuid>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl CanvasObject {
    #[must_use]
    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    #[must_use]
    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// True if the bounding box overlaps the rectangle `[left, right] × [top, bottom]`.
    #[must_use]
    pub fn intersects(&self, left: f64, top: f64, right: f64, bottom: f64) -> bool {
        self.x <= right && self.x + self.width >= left && self.y <= bottom && self.y + self.height >= top
    }
}

/// Partial update for a single object. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectPatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub rotation: Option<f64>,
    pub fill: Option<String>,
    pub z_index: Option<i32>,
    pub text: Option<String>,
    pub font_size: Option<f64>,
    pub last_modified_by: Option<Uuid>,
    pub updated_at: Option<i64>,
}

impl ObjectPatch {
    pub fn apply(&self, obj: &mut CanvasObject) {
        if let Some(x) = self.x {
            obj.x = x;
        }
        if let Some(y) = self.y {
            obj.y = y;
        }
        if let Some(w) = self.width {
            obj.width = w;
        }
        if let Some(h) = self.height {
            obj.height = h;
        }
        if let Some(r) = self.rotation {
            obj.rotation = r;
        }
        if let Some(fill) = &self.fill {
            obj.fill.clone_from(fill);
        }
        if let Some(z) = self.z_index {
            obj.z_index = z;
        }
        if let Some(text) = &self.text {
            obj.text = Some(text.clone());
        }
        if let Some(size) = self.font_size {
            obj.font_size = Some(size);
        }
        if let Some(by) = self.last_modified_by {
            obj.last_modified_by = Some(by);
        }
        if let Some(ts) = self.updated_at {
            obj.updated_at = ts;
        }
    }
}

// =============================================================================
// VIEWPORT
// =============================================================================

/// The part of world space a client is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub center_x: f64,
    pub center_y: f64,
    pub zoom: f64,
}

impl Viewport {
    /// Visible world rectangle as `(left, top, right, bottom)` for a screen of
    /// `screen_w × screen_h` pixels. Non-positive zoom is treated as 1.
    #[must_use]
    pub fn world_rect(&self, screen_w: f64, screen_h: f64) -> (f64, f64, f64, f64) {
        let zoom = if self.zoom > 0.0 { self.zoom } else { 1.0 };
        let half_w = screen_w / zoom / 2.0;
        let half_h = screen_h / zoom / 2.0;
        (self.center_x - half_w, self.center_y - half_h, self.center_x + half_w, self.center_y + half_h)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            center_x: crate::config::DEFAULT_VIEWPORT_WIDTH / 2.0,
            center_y: crate::config::DEFAULT_VIEWPORT_HEIGHT / 2.0,
            zoom: 1.0,
        }
    }
}

/// Current time as milliseconds since Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
