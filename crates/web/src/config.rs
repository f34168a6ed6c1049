use anyhow::{Context, Result};
use rust_decimal::Decimal;
use storage::services::RegistrationSettings;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub api_keys: String,
    pub cc_processing_percent: Decimal,
    pub validation_fail_open: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = RegistrationSettings::default();

        Ok(Self {
            host: std::env::var("HOST").context("Cannot load HOST env variable")?,
            port: std::env::var("PORT")
                .context("PORT must be a number")?
                .parse()?,
            database_url: std::env::var("DATABASE_URL")
                .context("Cannot load DATABASE_URL env variable")?,
            api_keys: std::env::var("API_KEYS").unwrap_or_default(),
            cc_processing_percent: match std::env::var("CC_PROCESSING_PERCENT") {
                Ok(value) => value
                    .trim()
                    .parse()
                    .context("CC_PROCESSING_PERCENT must be a decimal percentage")?,
                Err(_) => defaults.cc_percent,
            },
            validation_fail_open: match std::env::var("VALIDATION_FAIL_OPEN") {
                Ok(value) => parse_flag(&value)
                    .context("VALIDATION_FAIL_OPEN must be true or false")?,
                Err(_) => defaults.validation_fail_open,
            },
        })
    }

    pub fn registration_settings(&self) -> RegistrationSettings {
        RegistrationSettings {
            cc_percent: self.cc_processing_percent,
            validation_fail_open: self.validation_fail_open,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
