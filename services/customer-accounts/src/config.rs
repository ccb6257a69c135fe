use anyhow::{anyhow, Context, Result};

use crate::db::DbConfig;
use crate::domain::values::ConfirmationSecret;

const CONFIRMATION_SECRET_VAR: &str = "ACCOUNTS_CONFIRMATION_SECRET";

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub dev_mode: bool,
    /// Only commands that derive confirmation hashes need it.
    pub confirmation_secret: Option<ConfirmationSecret>,
    pub database: DbConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let log_level =
            std::env::var("ACCOUNTS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let dev_mode = std::env::var("ACCOUNTS_DEV")
            .map(|v| is_truthy(&v))
            .unwrap_or(false);

        let confirmation_secret =
            parse_confirmation_secret(std::env::var(CONFIRMATION_SECRET_VAR).ok())?;

        let database = DbConfig::from_env();

        Ok(Self {
            log_level,
            dev_mode,
            confirmation_secret,
            database,
        })
    }

    /// The confirmation secret, failing if it was not configured.
    pub fn require_confirmation_secret(&self) -> Result<&ConfirmationSecret> {
        self.confirmation_secret
            .as_ref()
            .ok_or_else(|| anyhow!("{CONFIRMATION_SECRET_VAR} must be set for this command"))
    }
}

/// An unset secret is allowed; a set but blank one is not.
fn parse_confirmation_secret(raw: Option<String>) -> Result<Option<ConfirmationSecret>> {
    raw.map(|raw| {
        ConfirmationSecret::build(raw).with_context(|| format!("{CONFIRMATION_SECRET_VAR} is invalid"))
    })
    .transpose()
}

fn is_truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
