// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::path::Path;

use config::{Config, ConfigError};
use serde::{Deserialize, Serialize};

use crate::types::ShopVariantId;

pub const DEFAULT_CONFIG_FILE: &str = "kiosk.toml";
pub const ENV_PREFIX: &str = "KIOSK";

/// Top level settings; every section is optional in the source file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub kiosk: KioskSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KioskSettings {
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
    /// End the session once a purchase has been settled and persisted.
    #[serde(default = "default_close_after_purchase")]
    pub close_after_purchase: bool,
    #[serde(default)]
    pub pricing: PricingPolicy,
    /// Variant every actor may place without unlocking it.
    #[serde(default)]
    pub default_variant: ShopVariantId,
}

impl Default for KioskSettings {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            close_after_purchase: default_close_after_purchase(),
            pricing: PricingPolicy::default(),
            default_variant: 0,
        }
    }
}

fn default_state_dir() -> String {
    "kiosk.state".to_string()
}

fn default_close_after_purchase() -> bool {
    true
}

/// How a purchase spanning several same-kind slots is charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PricingPolicy {
    /// Every unit costs the price of the first matching slot in forward order.
    #[default]
    FirstListed,
    /// Each drained slot charges its own price for the units taken from it.
    PerSlot,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Reads `path` if it exists, then overlays `KIOSK_*` environment variables
    /// (`KIOSK_KIOSK__STATE_DIR`, `KIOSK_KIOSK__PRICING`, ...).
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kiosk.state_dir.trim().is_empty() {
            return Err(ConfigError::Message(
                "kiosk.state_dir must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
