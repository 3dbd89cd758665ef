//! Tool executor — validated canvas primitives with undo logging.
//!
//! DESIGN
//! ======
//! Each primitive validates its inputs first and rejects anything out of
//! range instead of clamping. A valid call re-reads the canvas, applies the
//! change, writes the whole object list back and appends exactly one
//! history entry holding snapshots of everything it touched. Rejections are
//! logged as error entries, which undo never selects.
//!
//! Validation problems come back as `ToolResult` values. Only store
//! failures escape as `Err`.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::StoreError;
use super::canvas::CanvasStore;
use super::history::{CommandLogEntry, EntryStatus, HistoryStore, PreviousState, UndoLedger};
use super::layout::{self, Axis};
use crate::config::AgentConfig;
use crate::state::{CanvasObject, ObjectKind, now_ms};

/// Approximate glyph advance as a fraction of the font size.
pub const TEXT_CHAR_WIDTH: f64 = 0.6;
/// Approximate line height as a fraction of the font size.
pub const TEXT_LINE_HEIGHT: f64 = 1.2;
/// Smallest font size accepted for text objects.
pub const MIN_FONT_SIZE: f64 = 6.0;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
    #[error("{field} must be positive")]
    NotPositive { field: &'static str },
    #[error("{field} must be at least {min}px")]
    TooSmall { field: &'static str, min: f64 },
    #[error("font size must be at least {0}")]
    FontTooSmall(f64),
    #[error("object would be outside canvas bounds (0,0)-({width},{height})")]
    OutOfBounds { width: f64, height: f64 },
    #[error("text must not be empty")]
    EmptyText,
    #[error("object not found: {0}")]
    NotFound(Uuid),
    #[error("no objects to arrange")]
    NoTargets,
}

impl crate::error::ErrorCode for ToolError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFinite { .. } => "E_NOT_FINITE",
            Self::NotPositive { .. } => "E_NOT_POSITIVE",
            Self::TooSmall { .. } | Self::FontTooSmall(_) => "E_TOO_SMALL",
            Self::OutOfBounds { .. } => "E_OUT_OF_BOUNDS",
            Self::EmptyText => "E_EMPTY_TEXT",
            Self::NotFound(_) => "E_OBJECT_NOT_FOUND",
            Self::NoTargets => "E_NO_TARGETS",
        }
    }
}

/// Outcome of one primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub success: bool,
    pub object_id: Option<Uuid>,
    pub error: Option<String>,
}

impl ToolResult {
    #[must_use]
    pub fn ok(object_id: Option<Uuid>) -> Self {
        Self { success: true, object_id, error: None }
    }

    #[must_use]
    pub fn failed(error: &ToolError) -> Self {
        Self { success: false, object_id: None, error: Some(error.to_string()) }
    }
}

/// Who is mutating which canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    pub canvas_id: Uuid,
    pub actor: Uuid,
}

/// Approximate bounding box of a single line of text.
#[must_use]
pub fn text_box(text: &str, font_size: f64) -> (f64, f64) {
    #[allow(clippy::cast_precision_loss)]
    let chars = text.chars().count().max(1) as f64;
    (chars * font_size * TEXT_CHAR_WIDTH, font_size * TEXT_LINE_HEIGHT)
}

// =============================================================================
// EXECUTOR
// =============================================================================

#[derive(Clone)]
pub struct ToolExecutor {
    canvas: Arc<dyn CanvasStore>,
    ledger: UndoLedger,
    config: AgentConfig,
}

/// A validated change ready to be written and logged.
struct Change {
    command_type: &'static str,
    parameters: serde_json::Value,
    objects: Vec<CanvasObject>,
    created: Vec<Uuid>,
    modified: Vec<Uuid>,
    deleted: Vec<Uuid>,
    previous: Vec<CanvasObject>,
    object_id: Option<Uuid>,
}

impl Change {
    fn new(command_type: &'static str, parameters: serde_json::Value, objects: Vec<CanvasObject>) -> Self {
        Self {
            command_type,
            parameters,
            objects,
            created: Vec::new(),
            modified: Vec::new(),
            deleted: Vec::new(),
            previous: Vec::new(),
            object_id: None,
        }
    }
}

impl ToolExecutor {
    #[must_use]
    pub fn new(canvas: Arc<dyn CanvasStore>, history: Arc<dyn HistoryStore>, config: AgentConfig) -> Self {
        let ledger = UndoLedger::new(history, canvas.clone());
        Self { canvas, ledger, config }
    }

    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // create
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// Store failures only; validation problems are in the `ToolResult`.
    pub async fn create_rectangle(
        &self,
        scope: Scope,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        fill: &str,
    ) -> Result<ToolResult, StoreError> {
        let parameters = json!({ "x": x, "y": y, "width": width, "height": height, "fill": fill });
        self.create(scope, "createRectangle", parameters, ObjectKind::Rectangle, (x, y, width, height), fill, None)
            .await
    }

    /// `x`/`y` is the top-left of the circle's bounding box.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub async fn create_circle(
        &self,
        scope: Scope,
        x: f64,
        y: f64,
        radius: f64,
        fill: &str,
    ) -> Result<ToolResult, StoreError> {
        let parameters = json!({ "x": x, "y": y, "radius": radius, "fill": fill });
        let diameter = radius * 2.0;
        self.create(scope, "createCircle", parameters, ObjectKind::Circle, (x, y, diameter, diameter), fill, None)
            .await
    }

    /// # Errors
    ///
    /// Store failures only.
    pub async fn create_ellipse(
        &self,
        scope: Scope,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        fill: &str,
    ) -> Result<ToolResult, StoreError> {
        let parameters = json!({ "x": x, "y": y, "width": width, "height": height, "fill": fill });
        self.create(scope, "createEllipse", parameters, ObjectKind::Ellipse, (x, y, width, height), fill, None)
            .await
    }

    /// # Errors
    ///
    /// Store failures only.
    pub async fn create_text(
        &self,
        scope: Scope,
        x: f64,
        y: f64,
        text: &str,
        font_size: f64,
        fill: &str,
    ) -> Result<ToolResult, StoreError> {
        let parameters = json!({ "x": x, "y": y, "text": text, "fontSize": font_size, "fill": fill });
        if text.trim().is_empty() {
            return self.reject(scope, "createText", parameters, &ToolError::EmptyText).await;
        }
        if let Err(e) = check_font(font_size) {
            return self.reject(scope, "createText", parameters, &e).await;
        }
        let (width, height) = text_box(text, font_size);
        self.create(
            scope,
            "createText",
            parameters,
            ObjectKind::Text,
            (x, y, width, height),
            fill,
            Some((text, font_size)),
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn create(
        &self,
        scope: Scope,
        command_type: &'static str,
        parameters: serde_json::Value,
        kind: ObjectKind,
        (x, y, width, height): (f64, f64, f64, f64),
        fill: &str,
        text: Option<(&str, f64)>,
    ) -> Result<ToolResult, StoreError> {
        let checked = if text.is_some() {
            self.check_position(x, y, width, height)
        } else {
            self.check_geometry(x, y, width, height)
        };
        if let Err(e) = checked {
            return self.reject(scope, command_type, parameters, &e).await;
        }

        let mut objects = self.canvas.load(scope.canvas_id).await?;
        let z_index = objects.iter().map(|o| o.z_index).max().unwrap_or(0).saturating_add(1);
        let now = now_ms();
        let obj = CanvasObject {
            id: Uuid::new_v4(),
            kind,
            x,
            y,
            width,
            height,
            rotation: 0.0,
            fill: fill.to_string(),
            z_index,
            text: text.map(|(t, _)| t.to_string()),
            font_size: text.map(|(_, size)| size),
            last_modified_by: Some(scope.actor),
            created_at: now,
            updated_at: now,
        };
        let id = obj.id;
        objects.push(obj);

        let mut change = Change::new(command_type, parameters, objects);
        change.created.push(id);
        change.object_id = Some(id);
        self.commit(scope, change).await
    }

    // -------------------------------------------------------------------------
    // single-object edits
    // -------------------------------------------------------------------------

    /// Move the object's top-left corner to `(x, y)`.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub async fn move_object(&self, scope: Scope, id: Uuid, x: f64, y: f64) -> Result<ToolResult, StoreError> {
        let parameters = json!({ "objectId": id, "x": x, "y": y });
        self.edit(scope, "moveObject", parameters, id, |obj, executor| {
            executor.check_position(x, y, obj.width, obj.height)?;
            obj.x = x;
            obj.y = y;
            Ok(())
        })
        .await
    }

    /// Set width and height. Circles stay circular: both sides take the
    /// larger requested value.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub async fn resize_object(
        &self,
        scope: Scope,
        id: Uuid,
        width: f64,
        height: f64,
    ) -> Result<ToolResult, StoreError> {
        let parameters = json!({ "objectId": id, "width": width, "height": height });
        self.edit(scope, "resizeObject", parameters, id, |obj, executor| {
            let (width, height) = if obj.kind == ObjectKind::Circle {
                let side = width.max(height);
                (side, side)
            } else {
                (width, height)
            };
            executor.check_geometry(obj.x, obj.y, width, height)?;
            obj.width = width;
            obj.height = height;
            Ok(())
        })
        .await
    }

    /// Resize a circle by radius, keeping its top-left corner.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub async fn resize_circle(&self, scope: Scope, id: Uuid, radius: f64) -> Result<ToolResult, StoreError> {
        let parameters = json!({ "objectId": id, "radius": radius });
        self.edit(scope, "resizeCircle", parameters, id, |obj, executor| {
            let diameter = radius * 2.0;
            executor.check_geometry(obj.x, obj.y, diameter, diameter)?;
            obj.width = diameter;
            obj.height = diameter;
            Ok(())
        })
        .await
    }

    /// Change a text object's font size, scaling its bounding box by the
    /// same ratio.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub async fn resize_text(&self, scope: Scope, id: Uuid, font_size: f64) -> Result<ToolResult, StoreError> {
        let parameters = json!({ "objectId": id, "fontSize": font_size });
        self.edit(scope, "resizeText", parameters, id, |obj, executor| {
            check_font(font_size)?;
            let current = obj.font_size.filter(|s| *s > 0.0);
            let (width, height) = match current {
                Some(current) => {
                    let ratio = font_size / current;
                    (obj.width * ratio, obj.height * ratio)
                }
                None => text_box(obj.text.as_deref().unwrap_or_default(), font_size),
            };
            executor.check_position(obj.x, obj.y, width, height)?;
            obj.width = width;
            obj.height = height;
            obj.font_size = Some(font_size);
            Ok(())
        })
        .await
    }

    /// Rotate to `degrees`, normalised into `[0, 360)`.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub async fn rotate_object(&self, scope: Scope, id: Uuid, degrees: f64) -> Result<ToolResult, StoreError> {
        let parameters = json!({ "objectId": id, "rotation": degrees });
        self.edit(scope, "rotateObject", parameters, id, |obj, _| {
            check_finite("rotation", degrees)?;
            obj.rotation = degrees.rem_euclid(360.0);
            Ok(())
        })
        .await
    }

    /// # Errors
    ///
    /// Store failures only.
    pub async fn delete_object(&self, scope: Scope, id: Uuid) -> Result<ToolResult, StoreError> {
        let parameters = json!({ "objectId": id });
        let mut objects = self.canvas.load(scope.canvas_id).await?;
        let Some(index) = objects.iter().position(|o| o.id == id) else {
            return self.reject(scope, "deleteObject", parameters, &ToolError::NotFound(id)).await;
        };
        let snapshot = objects.remove(index);

        let mut change = Change::new("deleteObject", parameters, objects);
        change.deleted.push(id);
        change.previous.push(snapshot);
        change.object_id = Some(id);
        self.commit(scope, change).await
    }

    async fn edit<F>(
        &self,
        scope: Scope,
        command_type: &'static str,
        parameters: serde_json::Value,
        id: Uuid,
        apply: F,
    ) -> Result<ToolResult, StoreError>
    where
        F: FnOnce(&mut CanvasObject, &Self) -> Result<(), ToolError>,
    {
        let mut objects = self.canvas.load(scope.canvas_id).await?;
        let Some(obj) = objects.iter_mut().find(|o| o.id == id) else {
            return self.reject(scope, command_type, parameters, &ToolError::NotFound(id)).await;
        };
        let snapshot = obj.clone();
        if let Err(e) = apply(obj, self) {
            return self.reject(scope, command_type, parameters, &e).await;
        }
        obj.last_modified_by = Some(scope.actor);
        obj.updated_at = now_ms();

        let mut change = Change::new(command_type, parameters, objects);
        change.modified.push(id);
        change.previous.push(snapshot);
        change.object_id = Some(id);
        self.commit(scope, change).await
    }

    // -------------------------------------------------------------------------
    // arrangement
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// Store failures only.
    pub async fn arrange_horizontal(&self, scope: Scope, ids: &[Uuid], spacing: f64) -> Result<ToolResult, StoreError> {
        let parameters = json!({ "objectIds": ids, "spacing": spacing });
        self.arrange(scope, "arrangeHorizontal", parameters, ids, |objects| {
            layout::arrange_linear(objects, ids, Axis::Horizontal, spacing)
        })
        .await
    }

    /// # Errors
    ///
    /// Store failures only.
    pub async fn arrange_vertical(&self, scope: Scope, ids: &[Uuid], spacing: f64) -> Result<ToolResult, StoreError> {
        let parameters = json!({ "objectIds": ids, "spacing": spacing });
        self.arrange(scope, "arrangeVertical", parameters, ids, |objects| {
            layout::arrange_linear(objects, ids, Axis::Vertical, spacing)
        })
        .await
    }

    /// Without `columns`, rows wrap at the viewport width.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub async fn arrange_grid(
        &self,
        scope: Scope,
        ids: &[Uuid],
        columns: Option<usize>,
        spacing: f64,
    ) -> Result<ToolResult, StoreError> {
        let parameters = json!({ "objectIds": ids, "columns": columns, "spacing": spacing });
        let max_row_width = self.config.viewport_width;
        self.arrange(scope, "arrangeGrid", parameters, ids, |objects| {
            layout::arrange_grid(objects, ids, columns, spacing, max_row_width)
        })
        .await
    }

    /// # Errors
    ///
    /// Store failures only.
    pub async fn distribute_evenly(&self, scope: Scope, ids: &[Uuid], axis: Axis) -> Result<ToolResult, StoreError> {
        let parameters = json!({ "objectIds": ids, "direction": axis });
        self.arrange(scope, "distributeEvenly", parameters, ids, |objects| {
            layout::distribute_evenly(objects, ids, axis)
        })
        .await
    }

    async fn arrange<F>(
        &self,
        scope: Scope,
        command_type: &'static str,
        parameters: serde_json::Value,
        ids: &[Uuid],
        place: F,
    ) -> Result<ToolResult, StoreError>
    where
        F: FnOnce(&[CanvasObject]) -> Vec<CanvasObject>,
    {
        let before = self.canvas.load(scope.canvas_id).await?;
        if !before.iter().any(|o| ids.contains(&o.id)) {
            return self.reject(scope, command_type, parameters, &ToolError::NoTargets).await;
        }

        let mut after = place(&before);
        let now = now_ms();
        let mut change_ids = Vec::new();
        let mut previous = Vec::new();
        for (old, new) in before.iter().zip(after.iter_mut()) {
            if old == new {
                continue;
            }
            if let Err(e) = self.check_position(new.x, new.y, new.width, new.height) {
                return self.reject(scope, command_type, parameters, &e).await;
            }
            new.last_modified_by = Some(scope.actor);
            new.updated_at = now;
            change_ids.push(new.id);
            previous.push(old.clone());
        }

        let mut change = Change::new(command_type, parameters, after);
        change.modified = change_ids;
        change.previous = previous;
        self.commit(scope, change).await
    }

    // -------------------------------------------------------------------------
    // validation
    // -------------------------------------------------------------------------

    fn check_geometry(&self, x: f64, y: f64, width: f64, height: f64) -> Result<(), ToolError> {
        for (field, value) in [("width", width), ("height", height)] {
            check_finite(field, value)?;
            if value <= 0.0 {
                return Err(ToolError::NotPositive { field });
            }
            if value < self.config.min_object_size {
                return Err(ToolError::TooSmall { field, min: self.config.min_object_size });
            }
        }
        self.check_position(x, y, width, height)
    }

    fn check_position(&self, x: f64, y: f64, width: f64, height: f64) -> Result<(), ToolError> {
        check_finite("x", x)?;
        check_finite("y", y)?;
        let (world_w, world_h) = (self.config.world_width, self.config.world_height);
        if x < 0.0 || y < 0.0 || x + width > world_w || y + height > world_h {
            return Err(ToolError::OutOfBounds { width: world_w, height: world_h });
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // write + log
    // -------------------------------------------------------------------------

    async fn commit(&self, scope: Scope, change: Change) -> Result<ToolResult, StoreError> {
        self.canvas.replace_all(scope.canvas_id, &change.objects).await?;

        let mut entry = CommandLogEntry::new(scope.canvas_id, change.command_type, change.parameters);
        entry.objects_created = change.created;
        entry.objects_modified = change.modified;
        entry.objects_deleted = change.deleted;
        entry.previous_states = change
            .previous
            .into_iter()
            .map(|state| PreviousState { id: state.id, state })
            .collect();
        self.ledger.log_command(&entry).await?;

        info!(
            canvas_id = %scope.canvas_id,
            command_type = change.command_type,
            created = entry.objects_created.len(),
            modified = entry.objects_modified.len(),
            deleted = entry.objects_deleted.len(),
            "executor: primitive applied"
        );
        Ok(ToolResult::ok(change.object_id))
    }

    async fn reject(
        &self,
        scope: Scope,
        command_type: &'static str,
        parameters: serde_json::Value,
        error: &ToolError,
    ) -> Result<ToolResult, StoreError> {
        warn!(canvas_id = %scope.canvas_id, command_type, error = %error, "executor: primitive rejected");
        let mut entry = CommandLogEntry::new(scope.canvas_id, command_type, parameters);
        entry.status = EntryStatus::Error;
        entry.error_message = Some(error.to_string());
        self.ledger.log_command(&entry).await?;
        Ok(ToolResult::failed(error))
    }
}

fn check_finite(field: &'static str, value: f64) -> Result<(), ToolError> {
    if value.is_finite() { Ok(()) } else { Err(ToolError::NotFinite { field }) }
}

fn check_font(font_size: f64) -> Result<(), ToolError> {
    check_finite("font size", font_size)?;
    if font_size < MIN_FONT_SIZE {
        return Err(ToolError::FontTooSmall(MIN_FONT_SIZE));
    }
    Ok(())
}

#[cfg(test)]
#[path = "executor_test.rs"]
mod tests;
