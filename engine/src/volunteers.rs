//! Volunteer registration records.

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::EngineError;
use crate::reservations::store::u64_to_i64;

#[derive(Debug, Clone)]
pub struct VolunteerRequest {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    /// Days or shifts the volunteer offered, e.g. `["monday", "weekends"]`.
    pub availability: Vec<String>,
    /// Areas of interest, e.g. `["kitchen", "intake"]`.
    pub interests: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VolunteerRecord {
    pub volunteer_id: String,
    pub name: String,
}

pub struct VolunteerRegistry {
    pool: SqlitePool,
}

impl VolunteerRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, req), target = "volunteers")]
    pub async fn register(
        &self,
        req: &VolunteerRequest,
        now_ms: u64,
    ) -> Result<VolunteerRecord, EngineError> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(EngineError::validation("name must not be empty"));
        }
        let phone = req.phone.trim();
        if phone.is_empty() {
            return Err(EngineError::validation("phone must not be empty"));
        }

        let volunteer_id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
INSERT INTO volunteers (
  volunteer_id, name, phone, email, availability_json, interests_json, created_at_ms
)
VALUES (?, ?, ?, ?, ?, ?, ?);
"#,
        )
        .bind(&volunteer_id)
        .bind(name)
        .bind(phone)
        .bind(req.email.as_deref().map(str::trim))
        .bind(serde_json::to_string(&req.availability).map_err(|e| EngineError::internal(e.to_string()))?)
        .bind(serde_json::to_string(&req.interests).map_err(|e| EngineError::internal(e.to_string()))?)
        .bind(u64_to_i64(now_ms)?)
        .execute(&self.pool)
        .await?;

        info!(volunteer_id = %volunteer_id, "volunteer registered");

        Ok(VolunteerRecord {
            volunteer_id,
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup() -> (VolunteerRegistry, SqlitePool) {
        let conn = format!("sqlite:file:{}?mode=memory&cache=shared", Uuid::new_v4());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&conn)
            .await
            .expect("connect sqlite memory db");
        crate::db::schema::migrate(&pool).await.expect("migrate");
        (VolunteerRegistry::new(pool.clone()), pool)
    }

    #[tokio::test]
    async fn registers_and_persists_sets_as_json() {
        let (registry, pool) = setup().await;

        let record = registry
            .register(
                &VolunteerRequest {
                    name: "  Maria Lopez ".into(),
                    phone: "555-0100".into(),
                    email: Some("maria@example.org".into()),
                    availability: vec!["monday".into(), "weekends".into()],
                    interests: vec!["kitchen".into()],
                },
                1_000,
            )
            .await
            .unwrap();
        assert_eq!(record.name, "Maria Lopez");

        let row = sqlx::query("SELECT availability_json FROM volunteers WHERE volunteer_id = ?")
            .bind(&record.volunteer_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        let availability: Vec<String> =
            serde_json::from_str(&row.get::<String, _>("availability_json")).unwrap();
        assert_eq!(availability, vec!["monday", "weekends"]);
    }

    #[tokio::test]
    async fn rejects_blank_required_fields() {
        let (registry, _pool) = setup().await;

        let mut req = VolunteerRequest {
            name: "   ".into(),
            phone: "555-0100".into(),
            email: None,
            availability: vec![],
            interests: vec![],
        };
        assert!(matches!(
            registry.register(&req, 1_000).await.unwrap_err(),
            EngineError::Validation(_)
        ));

        req.name = "Sam".into();
        req.phone = String::new();
        assert!(matches!(
            registry.register(&req, 1_000).await.unwrap_err(),
            EngineError::Validation(_)
        ));
    }
}
