//! Runtime configuration, read from `config.toml` and the environment.
//!
//! ```toml
//! [chamada]
//! database_url = "chamada.db"
//! user_id = "prof-ana"
//! inactivity_minutes = 30
//! ```
//!
//! `CHAMADA_DATABASE_URL` and `CHAMADA_USER_ID` override the file, and `DATABASE_URL` is used when
//! no database is configured at all.

use crate::error::Result;
use config::Config;
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    /// The user stamped on attendance records written from this machine.
    pub user_id: Option<String>,
    pub inactivity_minutes: i64,
}

impl Settings {
    /// Loads settings from `config.toml` (optional), `.env`, and the environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = Config::builder()
            .set_default("chamada.database_url", env::var("DATABASE_URL").unwrap_or_else(|_| "chamada.db".to_string()))?
            .set_default("chamada.inactivity_minutes", 30)?
            .add_source(config::File::with_name("config").required(false))
            .set_override_option("chamada.database_url", env::var("CHAMADA_DATABASE_URL").ok())?
            .set_override_option("chamada.user_id", env::var("CHAMADA_USER_ID").ok())?
            .build()?;

        Ok(settings.get::<Settings>("chamada")?)
    }
}
