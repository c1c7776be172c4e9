// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::{env, process};

use config::ConfigError;
use core_types::{config::DEFAULT_CONFIG_FILE, AppConfig, KioskId};
use kiosk::{
    CounterStore, JsonCounterStore, JsonKioskStore, KioskConfig, KioskRecord, KioskStore,
    StoreError,
};

fn main() {
    if let Err(err) = run() {
        eprintln!("kiosk_diag failed: {err}");
        process::exit(1);
    }
}

fn run() -> Result<(), DiagError> {
    let args = CliArgs::parse()?;
    let app = AppConfig::load_from(&args.config_path)?;
    let config = KioskConfig::from_settings(&app.kiosk);
    let store = JsonKioskStore::new(config.kiosks_dir());
    let counters = JsonCounterStore::open(config.counters_path())?;

    let ids = match args.kiosk {
        Some(id) => vec![id],
        None => store.list()?,
    };
    if ids.is_empty() {
        println!(
            "No kiosks found under {}.",
            config.kiosks_dir().display()
        );
        return Ok(());
    }

    println!(
        "Kiosk diagnostics (state_dir={}, pricing={:?}):",
        config.state_dir().display(),
        config.pricing
    );
    for id in ids {
        let record = store.load(id)?;
        let owned = counters.owned_count(record.owner)?;
        print_record(&record, owned);
    }
    Ok(())
}

fn print_record(record: &KioskRecord, owned: u32) {
    let stocked = record.slots.iter().flatten().count();
    let units: u64 = record
        .slots
        .iter()
        .flatten()
        .map(|stack| stack.quantity as u64)
        .sum();
    println!(
        "  {} owner={} (owns {}) variant={} stocked={}/{} units={} updated={}",
        record.id,
        record.owner,
        owned,
        record.variant,
        stocked,
        record.slots.len(),
        units,
        record
            .updated_at
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| "-".to_string())
    );
    for (slot, stack) in record.slots.iter().enumerate() {
        let Some(stack) = stack else { continue };
        let price = record.price(slot);
        let label = if price.is_zero() {
            "unpriced".to_string()
        } else {
            format!("{price:.2}")
        };
        println!(
            "    [{slot:>2}] {:<24} x{:<4} {label}",
            stack.label(),
            stack.quantity
        );
    }
}

struct CliArgs {
    config_path: String,
    kiosk: Option<KioskId>,
}

impl CliArgs {
    fn parse() -> Result<Self, DiagError> {
        let mut config_path = DEFAULT_CONFIG_FILE.to_string();
        let mut kiosk = None;
        for arg in env::args().skip(1) {
            if let Some(value) = arg.strip_prefix("--kiosk=") {
                kiosk = Some(value.parse::<KioskId>()?);
            } else if let Some(value) = arg.strip_prefix("--config=") {
                config_path = value.to_string();
            } else {
                return Err(DiagError::UnknownArg(arg));
            }
        }
        Ok(Self { config_path, kiosk })
    }
}

#[derive(thiserror::Error, Debug)]
enum DiagError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid kiosk id: {0}")]
    KioskId(#[from] uuid::Error),
    #[error("unknown argument: {0}")]
    UnknownArg(String),
}
