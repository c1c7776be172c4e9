// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Shared identifiers, configuration, and status types for the kiosk engine.

pub mod config;
pub mod status;
pub mod types;

pub use config::{AppConfig, KioskSettings, PricingPolicy};
pub use types::{ActorId, KioskId, ShopVariantId};
