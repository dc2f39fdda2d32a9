//! SQLite table store: each load drops and recreates its table inside one transaction.

use crate::adapters::tables::{
    Column, CONDITIONS_TABLE, ENRICHED_CONDITION_COLUMNS, RESULTS_TABLE, RESULT_COLUMNS,
};
use crate::domain::model::{EnrichedCondition, ResultRecord};
use crate::domain::ports::TableStore;
use crate::utils::error::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::path::Path;

pub struct SqliteStore {
    pool: SqlitePool,
    location: String,
}

impl SqliteStore {
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        tracing::info!("🗄️ Opened database {}", path.display());
        Ok(Self {
            pool,
            location: path.display().to_string(),
        })
    }

    /// In-memory database (for tests); one connection so every query sees the same data.
    pub async fn open_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new().filename(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self {
            pool,
            location: ":memory:".to_string(),
        })
    }

    pub async fn count_rows(&self, table: &str) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM \"{}\"", table))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn column_names(&self, table: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as(&format!("SELECT name FROM pragma_table_info('{}')", table))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn recreate_table(
    tx: &mut Transaction<'_, Sqlite>,
    table: &str,
    columns: &[Column],
) -> Result<()> {
    sqlx::query(&format!("DROP TABLE IF EXISTS \"{}\"", table))
        .execute(&mut **tx)
        .await?;

    let definitions = columns
        .iter()
        .map(|(name, sql_type)| format!("\"{}\" {}", name, sql_type))
        .collect::<Vec<_>>()
        .join(", ");
    sqlx::query(&format!("CREATE TABLE \"{}\" ({})", table, definitions))
        .execute(&mut **tx)
        .await?;
    Ok(())
}

fn insert_statement(table: &str, columns: &[Column]) -> String {
    let names = columns
        .iter()
        .map(|(name, _)| format!("\"{}\"", name))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO \"{}\" ({}) VALUES ({})",
        table, names, placeholders
    )
}

#[async_trait]
impl TableStore for SqliteStore {
    async fn replace_results(&self, rows: &[ResultRecord]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        recreate_table(&mut tx, RESULTS_TABLE, RESULT_COLUMNS).await?;

        let insert = insert_statement(RESULTS_TABLE, RESULT_COLUMNS);
        for row in rows {
            sqlx::query(&insert)
                .bind(&row.competition_id)
                .bind(&row.stadium)
                .bind(&row.date)
                .bind(&row.event)
                .bind(&row.race)
                .bind(row.schedule_number)
                .bind(row.distance)
                .bind(row.rank)
                .bind(&row.number)
                .bind(&row.name)
                .bind(&row.country)
                .bind(row.pair)
                .bind(&row.lane)
                .bind(&row.time)
                .bind(&row.behind)
                .bind(&row.gender)
                .bind(row.estimated_tfm)
                .bind(row.estimated_tfm_buffer)
                .bind(row.seasonal_best)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::info!("💾 Replaced table '{}' with {} rows", RESULTS_TABLE, rows.len());
        Ok(rows.len() as u64)
    }

    async fn replace_conditions(&self, rows: &[EnrichedCondition]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        recreate_table(&mut tx, CONDITIONS_TABLE, ENRICHED_CONDITION_COLUMNS).await?;

        let insert = insert_statement(CONDITIONS_TABLE, ENRICHED_CONDITION_COLUMNS);
        for row in rows {
            let weather = row.weather();
            sqlx::query(&insert)
                .bind(&row.competition_id)
                .bind(&row.stadium)
                .bind(&row.date)
                .bind(&row.event)
                .bind(&row.race)
                .bind(row.schedule_number)
                .bind(&row.country)
                .bind(row.distance)
                .bind(&row.occasion)
                .bind(&row.time)
                .bind(row.temp_indoors)
                .bind(row.ice_temperature)
                .bind(row.humidity)
                .bind(weather.map(|w| w.temperature))
                .bind(weather.map(|w| w.surface_pressure))
                .bind(weather.map(|w| w.sealevel_pressure))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::info!(
            "💾 Replaced table '{}' with {} rows",
            CONDITIONS_TABLE,
            rows.len()
        );
        Ok(rows.len() as u64)
    }

    fn describe(&self) -> String {
        self.location.clone()
    }
}
