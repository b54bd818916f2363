use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub nats_url: String,
    pub port: u16,
    /// Subject receiving submit, update and cancel events (keyed by job id)
    pub job_events_subject: String,
    /// Subject receiving scan fan-out events (keyed by scan id)
    pub scan_events_subject: String,
    /// Delivery attempts per event before the relay gives up on it
    pub event_relay_max_attempts: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("DB_MAX_CONNECTIONS must be a valid number")?,
            nats_url: env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            job_events_subject: env::var("JOB_EVENTS_SUBJECT")
                .unwrap_or_else(|_| "jobs.events".to_string()),
            scan_events_subject: env::var("SCAN_EVENTS_SUBJECT")
                .unwrap_or_else(|_| "scans.events".to_string()),
            event_relay_max_attempts: env::var("EVENT_RELAY_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("EVENT_RELAY_MAX_ATTEMPTS must be a valid number")?,
        })
    }
}
