//! Read access to the three type catalog tables.
//!
//! Catalog rows are seeded by migrations; the API only reads them.

use sqlx::PgPool;
use triggerflow_core::types::DbId;

use crate::models::catalog::{CatalogKind, CatalogType};

const COLUMNS: &str = "id, name, description, config, created_at";

pub struct CatalogRepo;

impl CatalogRepo {
    pub async fn list(pool: &PgPool, kind: CatalogKind) -> Result<Vec<CatalogType>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM {} ORDER BY name", kind.table());
        sqlx::query_as::<_, CatalogType>(&query).fetch_all(pool).await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        kind: CatalogKind,
        id: DbId,
    ) -> Result<Option<CatalogType>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM {} WHERE id = $1", kind.table());
        sqlx::query_as::<_, CatalogType>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_name(
        pool: &PgPool,
        kind: CatalogKind,
        name: &str,
    ) -> Result<Option<CatalogType>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM {} WHERE name = $1", kind.table());
        sqlx::query_as::<_, CatalogType>(&query)
            .bind(name)
            .fetch_optional(pool)
            .await
    }
}
