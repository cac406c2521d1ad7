use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use futures::{stream::BoxStream, StreamExt};
use sqlx::{postgres::PgPoolOptions, Connection, PgPool};

use crate::error::ExtractError;
use crate::types::DisciplineEvent;

/// Timestamp format the legacy store compares registration dates against.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const DISCIPLINES_QUERY: &str = r#"
SELECT T_PD_CMS.ID AS id, TPR_COLL.PREDMET AS name FROM T_PD_CMS
INNER JOIN TPR_COLL ON T_PD_CMS.PREDM_ID = TPR_COLL.ID
WHERE T_PD_CMS.REGDATE BETWEEN CAST($1 AS TIMESTAMP) AND CAST($2 AS TIMESTAMP)
"#;

/// A discipline row exactly as the legacy store returns it.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RawDiscipline {
    pub id: i32,
    pub name: String,
}

impl RawDiscipline {
    pub fn into_event(self, year: i32) -> DisciplineEvent {
        DisciplineEvent {
            id: self.id,
            name: self.name.trim_matches(' ').to_string(),
            year,
        }
    }
}

/// Read access to disciplines registered in the legacy store.
#[async_trait]
pub trait DisciplineSource: Send + Sync {
    /// Check the store answers before any query is issued.
    async fn ping(&self) -> Result<(), ExtractError>;

    /// Disciplines registered within `[start, end]`, one row at a time. The
    /// stream is single-pass; a new extraction needs a new call.
    fn disciplines<'a>(
        &'a self,
        start: &NaiveDateTime,
        end: &NaiveDateTime,
    ) -> BoxStream<'a, Result<RawDiscipline, ExtractError>>;
}

#[async_trait]
impl<T: DisciplineSource + ?Sized> DisciplineSource for Arc<T> {
    async fn ping(&self) -> Result<(), ExtractError> {
        (**self).ping().await
    }

    fn disciplines<'a>(
        &'a self,
        start: &NaiveDateTime,
        end: &NaiveDateTime,
    ) -> BoxStream<'a, Result<RawDiscipline, ExtractError>> {
        (**self).disciplines(start, end)
    }
}

pub struct PgDisciplineSource {
    pool: PgPool,
}

impl PgDisciplineSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a pool that opens connections on first use, so a store that is
    /// down at startup surfaces as a failed import rather than a crash.
    pub fn connect_lazy(dsn: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(dsn)?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl DisciplineSource for PgDisciplineSource {
    async fn ping(&self) -> Result<(), ExtractError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(ExtractError::Connectivity)?;
        conn.ping().await.map_err(ExtractError::Connectivity)
    }

    fn disciplines<'a>(
        &'a self,
        start: &NaiveDateTime,
        end: &NaiveDateTime,
    ) -> BoxStream<'a, Result<RawDiscipline, ExtractError>> {
        sqlx::query_as::<_, RawDiscipline>(DISCIPLINES_QUERY)
            .bind(start.format(DATE_FORMAT).to_string())
            .bind(end.format(DATE_FORMAT).to_string())
            .fetch(&self.pool)
            .map(|row| row.map_err(ExtractError::from))
            .boxed()
    }
}
