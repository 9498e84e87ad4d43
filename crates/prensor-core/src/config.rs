//! Calculation options that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How much value-level checking a calculation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationLevel {
    /// Every shape and monotonicity check.
    Full,
    /// Structural checks only (paths, duplicates, node kinds, declared types).
    Minimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalcOptions {
    /// Check parent indices of every evaluated node (ordering, extent) and of
    /// every ragged partition built from a prensor.
    pub ragged_checks: bool,

    /// Check that sibling inputs agree in shape (filter masks, multi-source
    /// maps) and that mapped subtree results match their batch size.
    pub sparse_checks: bool,
}

impl Default for CalcOptions {
    fn default() -> Self {
        Self {
            ragged_checks: true,
            sparse_checks: true,
        }
    }
}

impl CalcOptions {
    /// Options with every value-level check disabled.
    ///
    /// Results on malformed input are then logically wrong, never memory-unsafe.
    pub fn minimal() -> Self {
        Self {
            ragged_checks: false,
            sparse_checks: false,
        }
    }

    pub fn with_level(level: ValidationLevel) -> Self {
        match level {
            ValidationLevel::Full => Self::default(),
            ValidationLevel::Minimal => Self::minimal(),
        }
    }

    pub fn level(&self) -> ValidationLevel {
        if self.ragged_checks || self.sparse_checks {
            ValidationLevel::Full
        } else {
            ValidationLevel::Minimal
        }
    }

    /// Parse options from JSON, e.g. `{"ragged_checks":true,"sparse_checks":false}`.
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Create options from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `PRENSOR_CALC_OPTIONS`: JSON options used as the base
    /// - `PRENSOR_VALIDATION`: `full` or `minimal`
    /// - `PRENSOR_RAGGED_CHECKS`: overrides `ragged_checks` (`true`/`false`/`1`/`0`)
    /// - `PRENSOR_SPARSE_CHECKS`: overrides `sparse_checks`
    pub fn from_env() -> Self {
        Self::try_from_env().unwrap_or_default()
    }

    /// Like [`CalcOptions::from_env`], but malformed values are an error.
    pub fn try_from_env() -> Result<Self> {
        let mut cfg = match std::env::var("PRENSOR_CALC_OPTIONS") {
            Ok(s) => Self::from_json(&s)?,
            Err(_) => Self::default(),
        };

        if let Ok(s) = std::env::var("PRENSOR_VALIDATION") {
            cfg = match s.trim().to_ascii_lowercase().as_str() {
                "full" => Self::with_level(ValidationLevel::Full),
                "minimal" => Self::with_level(ValidationLevel::Minimal),
                other => {
                    return Err(Error::Config(format!(
                        "PRENSOR_VALIDATION must be full or minimal, got \"{other}\""
                    )))
                }
            };
        }

        cfg.ragged_checks = env_flag("PRENSOR_RAGGED_CHECKS")?.unwrap_or(cfg.ragged_checks);
        cfg.sparse_checks = env_flag("PRENSOR_SPARSE_CHECKS")?.unwrap_or(cfg.sparse_checks);
        Ok(cfg)
    }
}

fn env_flag(name: &str) -> Result<Option<bool>> {
    match std::env::var(name) {
        Ok(s) => parse_flag(&s)
            .map(Some)
            .ok_or_else(|| Error::Config(format!("{name} is not a boolean: \"{s}\""))),
        Err(_) => Ok(None),
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
