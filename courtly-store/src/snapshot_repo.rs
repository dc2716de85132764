use async_trait::async_trait;
use courtly_core::SnapshotStore;
use sqlx::PgPool;

/// Stores the serialized engine state as a single JSONB row. Writes are
/// full replacements; there is no row history.
pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn save(&self, snapshot: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query(
            r#"
            INSERT INTO app_state (id, state, updated_at)
            VALUES (1, $1::jsonb, NOW())
            ON CONFLICT (id) DO UPDATE SET state = EXCLUDED.state, updated_at = NOW()
            "#,
        )
        .bind(snapshot)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load(&self) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
        // Cast to text so the driver hands back the raw document.
        let row: Option<(String,)> =
            sqlx::query_as("SELECT state::text FROM app_state WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(state,)| state))
    }
}
