//! Configuration management for the Contoso registrar

use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;
use std::env;

use crate::error::{AppError, Result};
use crate::pagination::PageSize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub paging: PagingConfig,
    pub display: DisplayConfig,
    pub seed_demo_data: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Page sizes are fixed by configuration, never by the requester
#[derive(Debug, Clone, Deserialize)]
pub struct PagingConfig {
    pub students_page_size: PageSize,
    pub departments_page_size: PageSize,
}

/// Display conventions used when rendering current values in conflict reports
#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// `strftime` pattern for calendar dates
    pub date_format: String,
    pub currency_symbol: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            date_format: "%Y-%m-%d".to_string(),
            currency_symbol: "$".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: DatabaseConfig {
                url: "sqlite:./contoso.db".to_string(),
                max_connections: 5,
            },
            paging: PagingConfig {
                students_page_size: PageSize::DEFAULT,
                departments_page_size: PageSize::new(10).unwrap_or(PageSize::DEFAULT),
            },
            display: DisplayConfig::default(),
            seed_demo_data: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        Ok(Config {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or(defaults.database.url),
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS")?
                    .unwrap_or(defaults.database.max_connections),
            },
            paging: PagingConfig {
                students_page_size: page_size_var("STUDENTS_PAGE_SIZE")?
                    .unwrap_or(defaults.paging.students_page_size),
                departments_page_size: page_size_var("DEPARTMENTS_PAGE_SIZE")?
                    .unwrap_or(defaults.paging.departments_page_size),
            },
            display: DisplayConfig {
                date_format: match env::var("DISPLAY_DATE_FORMAT") {
                    Ok(pattern) => date_format(&pattern)?,
                    Err(_) => defaults.display.date_format,
                },
                currency_symbol: env::var("CURRENCY_SYMBOL")
                    .unwrap_or(defaults.display.currency_symbol),
            },
            seed_demo_data: parse_var("SEED_DEMO_DATA")?.unwrap_or(defaults.seed_demo_data),
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AppError::Config(format!("{} has an invalid value: {:?}", key, raw))),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(AppError::Config(format!("{}: {}", key, e))),
    }
}

/// Reject `strftime` patterns chrono cannot render
fn date_format(pattern: &str) -> Result<String> {
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err(AppError::Config(format!(
            "DISPLAY_DATE_FORMAT is not a valid date pattern: {:?}",
            pattern
        )));
    }
    Ok(pattern.to_string())
}

fn page_size_var(key: &str) -> Result<Option<PageSize>> {
    match parse_var::<u32>(key)? {
        Some(n) => PageSize::new(n)
            .map(Some)
            .ok_or_else(|| AppError::Config(format!("{} must be at least 1", key))),
        None => Ok(None),
    }
}
