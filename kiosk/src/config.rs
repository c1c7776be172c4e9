// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::{
    fs,
    path::{Path, PathBuf},
};

use core_types::{KioskSettings, PricingPolicy, ShopVariantId};

use crate::error::{Result, StoreError};

pub const DEFAULT_STATE_DIR: &str = "kiosk.state";

#[derive(Clone, Debug)]
pub struct KioskConfig {
    pub state_dir: PathBuf,
    pub close_after_purchase: bool,
    pub pricing: PricingPolicy,
    /// Placeable without an unlock.
    pub default_variant: ShopVariantId,
}

impl KioskConfig {
    pub fn new(state_dir: PathBuf) -> Self {
        Self {
            state_dir,
            close_after_purchase: true,
            pricing: PricingPolicy::default(),
            default_variant: 0,
        }
    }

    pub fn from_settings(settings: &KioskSettings) -> Self {
        Self {
            state_dir: PathBuf::from(&settings.state_dir),
            close_after_purchase: settings.close_after_purchase,
            pricing: settings.pricing,
            default_variant: settings.default_variant,
        }
    }

    pub fn with_pricing(mut self, pricing: PricingPolicy) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_default_variant(mut self, variant: ShopVariantId) -> Self {
        self.default_variant = variant;
        self
    }

    pub fn with_close_after_purchase(mut self, close: bool) -> Self {
        self.close_after_purchase = close;
        self
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn kiosks_dir(&self) -> PathBuf {
        self.state_dir.join("kiosks")
    }

    pub fn counters_path(&self) -> PathBuf {
        self.state_dir.join("counters.json")
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        let kiosks = self.kiosks_dir();
        if !kiosks.exists() {
            fs::create_dir_all(&kiosks).map_err(StoreError::from)?;
        }
        Ok(())
    }
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self::new(PathBuf::from(DEFAULT_STATE_DIR))
    }
}
