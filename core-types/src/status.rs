// Copyright (c) James Kassemi, SC, US. All rights reserved.

use serde::{Deserialize, Serialize};

/// Discrete health level exposed by a running component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OverallStatus {
    #[default]
    Ok,
    Warn,
    Crit,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusGauge {
    pub label: String,
    pub value: f64,
    pub max: Option<f64>,
    pub unit: Option<String>,
}

impl StatusGauge {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
            max: None,
            unit: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// Immutable snapshot handed to whoever renders health.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatusSnapshot {
    pub name: String,
    pub overall: OverallStatus,
    pub warnings: Vec<String>,
    pub gauges: Vec<StatusGauge>,
}

impl ServiceStatusSnapshot {
    pub fn gauge(&self, label: &str) -> Option<f64> {
        self.gauges
            .iter()
            .find(|gauge| gauge.label == label)
            .map(|gauge| gauge.value)
    }
}

pub trait ServiceStatusReporter: Send + Sync {
    fn service_name(&self) -> &'static str;
    fn status(&self) -> ServiceStatusSnapshot;
}
