//! Application repository backed by the `applications` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::{debug, info};
use tracker_core::auth::generate_api_key;
use tracker_core::{Application, ApplicationStore, KeyRotation, Result};

use crate::client::StoreClient;
use crate::error::db_error;

const APPLICATION_COLUMNS: &str =
    "app_id, api_key, name, description, domain, active, created_at, updated_at";

#[derive(FromRow)]
struct ApplicationRow {
    app_id: String,
    api_key: String,
    name: String,
    description: Option<String>,
    domain: String,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ApplicationRow> for Application {
    fn from(row: ApplicationRow) -> Self {
        Self {
            app_id: row.app_id,
            api_key: row.api_key,
            name: row.name,
            description: row.description,
            domain: row.domain,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub struct PgApplicationStore {
    client: StoreClient,
}

impl PgApplicationStore {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ApplicationStore for PgApplicationStore {
    async fn create(&self, mut app: Application) -> Result<Application> {
        app.assign_identity();

        let sql = format!(
            "INSERT INTO applications ({cols}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {cols}",
            cols = APPLICATION_COLUMNS
        );
        let row: ApplicationRow = sqlx::query_as(&sql)
            .bind(&app.app_id)
            .bind(&app.api_key)
            .bind(&app.name)
            .bind(&app.description)
            .bind(&app.domain)
            .bind(app.active)
            .bind(app.created_at)
            .bind(app.updated_at)
            .fetch_one(self.client.pool())
            .await
            .map_err(|e| db_error(e, "application"))?;

        info!(app_id = %row.app_id, domain = %row.domain, "Created application");
        Ok(row.into())
    }

    async fn get_by_id(&self, app_id: &str) -> Result<Application> {
        let sql = format!(
            "SELECT {} FROM applications WHERE app_id = $1",
            APPLICATION_COLUMNS
        );
        let row: ApplicationRow = sqlx::query_as(&sql)
            .bind(app_id)
            .fetch_one(self.client.pool())
            .await
            .map_err(|e| db_error(e, "application"))?;
        Ok(row.into())
    }

    async fn get_by_api_key(&self, api_key: &str) -> Result<Application> {
        let sql = format!(
            "SELECT {} FROM applications WHERE api_key = $1",
            APPLICATION_COLUMNS
        );
        let row: ApplicationRow = sqlx::query_as(&sql)
            .bind(api_key)
            .fetch_one(self.client.pool())
            .await
            .map_err(|e| db_error(e, "application"))?;
        Ok(row.into())
    }

    async fn update(&self, app: &Application) -> Result<Application> {
        let sql = format!(
            "UPDATE applications SET name = $2, description = $3, domain = $4, active = $5, \
             updated_at = NOW() WHERE app_id = $1 RETURNING {}",
            APPLICATION_COLUMNS
        );
        let row: ApplicationRow = sqlx::query_as(&sql)
            .bind(&app.app_id)
            .bind(&app.name)
            .bind(&app.description)
            .bind(&app.domain)
            .bind(app.active)
            .fetch_one(self.client.pool())
            .await
            .map_err(|e| db_error(e, "application"))?;

        debug!(app_id = %row.app_id, active = row.active, "Updated application");
        Ok(row.into())
    }

    async fn delete(&self, app_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM applications WHERE app_id = $1")
            .bind(app_id)
            .execute(self.client.pool())
            .await
            .map_err(|e| db_error(e, "application"))?;

        if result.rows_affected() == 0 {
            return Err(tracker_core::Error::not_found("application"));
        }
        info!(app_id = %app_id, "Deleted application");
        Ok(())
    }

    async fn regenerate_api_key(&self, app_id: &str) -> Result<KeyRotation> {
        let mut tx = self
            .client
            .pool()
            .begin()
            .await
            .map_err(|e| db_error(e, "application"))?;

        let old_api_key: String =
            sqlx::query_scalar("SELECT api_key FROM applications WHERE app_id = $1 FOR UPDATE")
                .bind(app_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| db_error(e, "application"))?;

        let new_api_key = generate_api_key().into_inner();
        let updated_at: DateTime<Utc> = sqlx::query_scalar(
            "UPDATE applications SET api_key = $2, updated_at = NOW() WHERE app_id = $1 RETURNING updated_at",
        )
        .bind(app_id)
        .bind(&new_api_key)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error(e, "api key"))?;

        tx.commit()
            .await
            .map_err(|e| db_error(e, "application"))?;

        info!(app_id = %app_id, "Regenerated API key");
        Ok(KeyRotation {
            app_id: app_id.to_string(),
            old_api_key,
            new_api_key,
            updated_at,
        })
    }

    async fn list(&self, limit: u32, offset: u64) -> Result<Vec<Application>> {
        let sql = format!(
            "SELECT {} FROM applications ORDER BY created_at DESC, app_id ASC LIMIT $1 OFFSET $2",
            APPLICATION_COLUMNS
        );
        let rows: Vec<ApplicationRow> = sqlx::query_as(&sql)
            .bind(i64::from(limit))
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .fetch_all(self.client.pool())
            .await
            .map_err(|e| db_error(e, "application"))?;
        Ok(rows.into_iter().map(Application::from).collect())
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM applications")
            .fetch_one(self.client.pool())
            .await
            .map_err(|e| db_error(e, "application"))?;
        Ok(count.max(0) as u64)
    }

    async fn ping(&self) -> Result<()> {
        self.client.ping().await
    }
}
