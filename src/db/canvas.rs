//! Postgres canvas store. Each canvas is one JSONB document; per-object
//! edits lock the row, rewrite the list and commit.

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::services::StoreError;
use crate::services::canvas::{CanvasStore, put};
use crate::state::{CanvasObject, ObjectPatch, now_ms};

pub struct PgCanvasStore {
    pool: PgPool,
}

impl PgCanvasStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Read-modify-write one canvas under a row lock.
    async fn modify<F>(&self, canvas_id: Uuid, edit: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Vec<CanvasObject>) -> Result<(), StoreError> + Send,
    {
        let mut tx = self.pool.begin().await?;
        let current: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT objects FROM canvases WHERE id = $1 FOR UPDATE")
                .bind(canvas_id)
                .fetch_optional(tx.as_mut())
                .await?;
        let mut objects: Vec<CanvasObject> = match current {
            Some(value) => serde_json::from_value(value)?,
            None => Vec::new(),
        };
        edit(&mut objects)?;
        write(&mut tx, canvas_id, &objects).await?;
        tx.commit().await?;
        Ok(())
    }
}

async fn write(tx: &mut Transaction<'_, Postgres>, canvas_id: Uuid, objects: &[CanvasObject]) -> Result<(), StoreError> {
    let body = serde_json::to_value(objects)?;
    sqlx::query(
        "INSERT INTO canvases (id, objects, updated_at) VALUES ($1, $2, $3) \
         ON CONFLICT (id) DO UPDATE SET objects = EXCLUDED.objects, updated_at = EXCLUDED.updated_at",
    )
    .bind(canvas_id)
    .bind(body)
    .bind(now_ms())
    .execute(tx.as_mut())
    .await?;
    Ok(())
}

#[async_trait::async_trait]
impl CanvasStore for PgCanvasStore {
    async fn load(&self, canvas_id: Uuid) -> Result<Vec<CanvasObject>, StoreError> {
        let current: Option<serde_json::Value> = sqlx::query_scalar("SELECT objects FROM canvases WHERE id = $1")
            .bind(canvas_id)
            .fetch_optional(&self.pool)
            .await?;
        match current {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    async fn add_object(&self, canvas_id: Uuid, object: CanvasObject) -> Result<(), StoreError> {
        self.modify(canvas_id, move |objects| {
            objects.retain(|o| o.id != object.id);
            objects.push(object);
            Ok(())
        })
        .await
    }

    async fn update_object(&self, canvas_id: Uuid, object_id: Uuid, patch: &ObjectPatch) -> Result<(), StoreError> {
        self.modify(canvas_id, |objects| {
            let obj = objects
                .iter_mut()
                .find(|o| o.id == object_id)
                .ok_or(StoreError::NotFound(object_id))?;
            patch.apply(obj);
            Ok(())
        })
        .await
    }

    async fn put_object(&self, canvas_id: Uuid, object: CanvasObject) -> Result<(), StoreError> {
        self.modify(canvas_id, move |objects| {
            put(objects, object);
            Ok(())
        })
        .await
    }

    async fn delete_object(&self, canvas_id: Uuid, object_id: Uuid) -> Result<(), StoreError> {
        self.modify(canvas_id, |objects| {
            objects.retain(|o| o.id != object_id);
            Ok(())
        })
        .await
    }

    async fn replace_all(&self, canvas_id: Uuid, objects: &[CanvasObject]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        write(&mut tx, canvas_id, objects).await?;
        tx.commit().await?;
        Ok(())
    }
}
