use thiserror::Error;

use crate::{element::InflowError, performance::PerformanceError};

/// Invalid rotor, flow or discretisation settings, detected before any solve.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("at least one blade element is required")]
    NoElements,
    #[error("hub radius {hub} m must be smaller than tip radius {tip} m")]
    HubOutsideTip { hub: f64, tip: f64 },
    #[error("{name} must be positive and finite, got {value}")]
    NotPositive { name: &'static str, value: f64 },
    #[error("{name} must be finite, got {value}")]
    NotFinite { name: &'static str, value: f64 },
    #[error("blade element {index} has invalid {name} {value}")]
    InvalidElement {
        index: usize,
        name: &'static str,
        value: f64,
    },
}

impl ConfigError {
    pub(crate) fn check_positive(name: &'static str, value: f64) -> Result<f64, ConfigError> {
        if value.is_finite() && value > 0.0 {
            Ok(value)
        } else {
            Err(ConfigError::NotPositive { name, value })
        }
    }

    pub(crate) fn check_finite(name: &'static str, value: f64) -> Result<f64, ConfigError> {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ConfigError::NotFinite { name, value })
        }
    }
}

/// A failed rotor evaluation. There is no partial result: a single failing
/// element fails the whole rotor.
#[derive(Debug, Error)]
pub enum RotorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("blade element {index} failed: {source}")]
    Element {
        index: usize,
        #[source]
        source: InflowError,
    },
    #[error(transparent)]
    Performance(#[from] PerformanceError),
}
