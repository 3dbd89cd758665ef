//! Canvas store — the whole-document object list for each canvas.
//!
//! Every operation is last-write-wins at document granularity. The executor
//! uses `load` + `replace_all`; undo uses the per-object calls.

use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use super::StoreError;
use crate::state::{CanvasObject, ObjectPatch};

#[async_trait::async_trait]
pub trait CanvasStore: Send + Sync {
    /// Current objects on the canvas. An unknown canvas is empty.
    async fn load(&self, canvas_id: Uuid) -> Result<Vec<CanvasObject>, StoreError>;

    async fn add_object(&self, canvas_id: Uuid, object: CanvasObject) -> Result<(), StoreError>;

    /// Apply `patch` to one object.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the object is not on the canvas.
    async fn update_object(&self, canvas_id: Uuid, object_id: Uuid, patch: &ObjectPatch) -> Result<(), StoreError>;

    /// Replace one object wholesale, keeping its position in the list.
    /// A missing object is appended.
    async fn put_object(&self, canvas_id: Uuid, object: CanvasObject) -> Result<(), StoreError>;

    /// Remove one object. Removing a missing object is not an error.
    async fn delete_object(&self, canvas_id: Uuid, object_id: Uuid) -> Result<(), StoreError>;

    /// Overwrite the canvas with exactly `objects`.
    async fn replace_all(&self, canvas_id: Uuid, objects: &[CanvasObject]) -> Result<(), StoreError>;
}

/// Process-local canvas store.
#[derive(Default)]
pub struct MemoryCanvasStore {
    canvases: RwLock<HashMap<Uuid, Vec<CanvasObject>>>,
}

impl MemoryCanvasStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CanvasStore for MemoryCanvasStore {
    async fn load(&self, canvas_id: Uuid) -> Result<Vec<CanvasObject>, StoreError> {
        let canvases = self.canvases.read().await;
        Ok(canvases.get(&canvas_id).cloned().unwrap_or_default())
    }

    async fn add_object(&self, canvas_id: Uuid, object: CanvasObject) -> Result<(), StoreError> {
        let mut canvases = self.canvases.write().await;
        let objects = canvases.entry(canvas_id).or_default();
        objects.retain(|o| o.id != object.id);
        objects.push(object);
        Ok(())
    }

    async fn update_object(&self, canvas_id: Uuid, object_id: Uuid, patch: &ObjectPatch) -> Result<(), StoreError> {
        let mut canvases = self.canvases.write().await;
        let obj = canvases
            .get_mut(&canvas_id)
            .and_then(|objects| objects.iter_mut().find(|o| o.id == object_id))
            .ok_or(StoreError::NotFound(object_id))?;
        patch.apply(obj);
        Ok(())
    }

    async fn put_object(&self, canvas_id: Uuid, object: CanvasObject) -> Result<(), StoreError> {
        let mut canvases = self.canvases.write().await;
        put(canvases.entry(canvas_id).or_default(), object);
        Ok(())
    }

    async fn delete_object(&self, canvas_id: Uuid, object_id: Uuid) -> Result<(), StoreError> {
        let mut canvases = self.canvases.write().await;
        if let Some(objects) = canvases.get_mut(&canvas_id) {
            objects.retain(|o| o.id != object_id);
        }
        Ok(())
    }

    async fn replace_all(&self, canvas_id: Uuid, objects: &[CanvasObject]) -> Result<(), StoreError> {
        let mut canvases = self.canvases.write().await;
        canvases.insert(canvas_id, objects.to_vec());
        Ok(())
    }
}

/// Swap `object` in at the index of its id, or append it.
pub(crate) fn put(objects: &mut Vec<CanvasObject>, object: CanvasObject) {
    match objects.iter_mut().find(|o| o.id == object.id) {
        Some(slot) => *slot = object,
        None => objects.push(object),
    }
}

#[cfg(test)]
#[path = "canvas_test.rs"]
mod tests;
