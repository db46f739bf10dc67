use anyhow::{Context, Result};
use chrono::TimeDelta;

pub mod calendar;
pub mod cli;
pub mod clock;
pub mod display;
pub mod error;
pub mod identity;
pub mod lock;
pub mod manager;
pub mod models;
pub mod reports;
pub mod schema;
pub mod session;
pub mod settings;

pub use crate::error::Error;
pub use crate::manager::AttendanceManager;
pub use crate::session::{AttendanceSession, SessionKind, SessionSlot};

use crate::settings::Settings;

/// Creates a manager from `config.toml` and the environment, signing in the configured user.
pub fn create_default_manager() -> Result<AttendanceManager> {
    let settings = Settings::load().context("failed to load settings")?;

    let mut manager = AttendanceManager::connect(&settings.database_url)
        .with_context(|| format!("failed to open database {}", settings.database_url))?
        .with_inactivity_timeout(TimeDelta::minutes(settings.inactivity_minutes));

    if let Some(user_id) = settings.user_id {
        manager.sign_in(user_id);
    }

    Ok(manager)
}
