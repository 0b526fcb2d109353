use std::env;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::config::ScheduleConfig;

#[derive(Clone)]
pub struct AppState {
    pool: PgPool,
    schedule: ScheduleConfig,
}

impl AppState {
    pub async fn new() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL env var is missing")?;

        let schedule = ScheduleConfig::from_env().context("invalid schedule configuration")?;

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&database_url)
            .await
            .context("failed to connect to Postgres")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run database migrations")?;

        Ok(Self { pool, schedule })
    }

    pub fn pool_ref(&self) -> &PgPool {
        &self.pool
    }

    pub fn schedule(&self) -> &ScheduleConfig {
        &self.schedule
    }

    /// Today's date in the configured trigger timezone.
    pub fn today(&self) -> NaiveDate {
        self.schedule.today()
    }
}
