//! Configuration management

use anyhow::{Context, Result};

use crate::services::maps::GoogleMapsConfig;
use crate::services::payments::StripeConfig;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Google Maps API key (optional, falls back to the mock provider)
    pub google_maps_api_key: Option<String>,

    /// Stripe secret key (optional, falls back to the mock gateway)
    pub stripe_secret_key: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let nats_url =
            std::env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string());

        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let google_maps_api_key = std::env::var("GOOGLE_MAPS_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());
        let stripe_secret_key = std::env::var("STRIPE_SECRET_KEY")
            .ok()
            .filter(|k| !k.is_empty());

        Ok(Self {
            nats_url,
            database_url,
            google_maps_api_key,
            stripe_secret_key,
        })
    }

    pub fn google_maps(&self) -> Option<GoogleMapsConfig> {
        self.google_maps_api_key
            .as_ref()
            .map(|key| GoogleMapsConfig::new(key.clone()))
    }

    pub fn stripe(&self) -> Option<StripeConfig> {
        self.stripe_secret_key
            .as_ref()
            .map(|key| StripeConfig::new(key.clone()))
    }
}
