//! Kernel configuration
//!
//! A YAML document with `${VAR}` environment expansion for anything secret.
//! Secrets themselves (database credentials, token-signing keys) belong to
//! the authentication collaborator; the kernel config is plain numbers.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("reading config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parsing config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("config validation failed: {0}")]
    Validation(String),
}

/// Top-level kernel configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelConfig {
    pub instrument: InstrumentConfig,
    pub liquidation: LiquidationConfig,
    pub trader_defaults: TraderDefaults,
}

/// R.index instrument settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Mark price before the first trade
    pub starting_price: Decimal,
    pub tick_size: Decimal,
    pub min_order_size: Decimal,
    pub max_leverage: u32,
}

/// Liquidation monitor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationConfig {
    pub check_interval_ms: u64,
    pub insurance_fund_initial: Decimal,
    pub maintenance_margins: MaintenanceMargins,
}

/// Maintenance margin by leverage tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceMargins {
    /// 1-10x
    pub conservative: Decimal,
    /// 11-50x
    pub moderate: Decimal,
    /// 51-100x
    pub aggressive: Decimal,
    /// 101x and up
    pub degen: Decimal,
}

impl MaintenanceMargins {
    /// Maintenance margin for a given leverage
    pub fn margin_for_leverage(&self, leverage: u32) -> Decimal {
        match leverage {
            0..=10 => self.conservative,
            11..=50 => self.moderate,
            51..=100 => self.aggressive,
            _ => self.degen,
        }
    }
}

/// Defaults applied to newly registered traders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderDefaults {
    pub starting_balance: Decimal,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            instrument: InstrumentConfig {
                starting_price: Decimal::from(1000),
                tick_size: Decimal::new(1, 2),       // 0.01
                min_order_size: Decimal::new(1, 3),  // 0.001
                max_leverage: 150,
            },
            liquidation: LiquidationConfig {
                check_interval_ms: 100,
                insurance_fund_initial: Decimal::from(1_000_000),
                maintenance_margins: MaintenanceMargins {
                    conservative: Decimal::new(5, 3), // 0.5%
                    moderate: Decimal::new(1, 2),     // 1%
                    aggressive: Decimal::new(2, 2),   // 2%
                    degen: Decimal::new(5, 2),        // 5%
                },
            },
            trader_defaults: TraderDefaults {
                starting_balance: Decimal::from(10_000),
            },
        }
    }
}

impl KernelConfig {
    /// Read configuration from a YAML file, expanding `${VAR}` references
    /// from the environment before parsing.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let expanded = expand_env(&raw);
        let cfg: KernelConfig = serde_yaml::from_str(&expanded)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from path, falling back to defaults if the file is missing or
    /// invalid.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Check configuration for required fields
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errs = Vec::new();

        if self.instrument.max_leverage < 1 || self.instrument.max_leverage > 150 {
            errs.push("instrument.max_leverage must be 1-150");
        }
        if self.instrument.starting_price <= Decimal::ZERO {
            errs.push("instrument.starting_price must be positive");
        }
        if self.instrument.min_order_size <= Decimal::ZERO {
            errs.push("instrument.min_order_size must be positive");
        }
        if self.liquidation.check_interval_ms == 0 {
            errs.push("liquidation.check_interval_ms must be positive");
        }
        if self.liquidation.insurance_fund_initial < Decimal::ZERO {
            errs.push("liquidation.insurance_fund_initial cannot be negative");
        }

        if errs.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errs.join("; ")))
        }
    }
}

/// Expand `${VAR}` references from the environment. Unset variables expand
/// to the empty string, matching shell behavior.
fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c == '$' && matches!(chars.peek(), Some((_, '{'))) {
            if let Some(end) = input[i..].find('}') {
                let name = &input[i + 2..i + end];
                if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    out.push_str(&std::env::var(name).unwrap_or_default());
                    // Skip past "{NAME}"
                    for _ in 0..end {
                        chars.next();
                    }
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let cfg = KernelConfig::default();
        assert_eq!(cfg.instrument.starting_price, dec!(1000));
        assert_eq!(cfg.instrument.max_leverage, 150);
        assert_eq!(cfg.liquidation.check_interval_ms, 100);
        assert_eq!(cfg.liquidation.insurance_fund_initial, dec!(1000000));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_margin_for_leverage() {
        let margins = KernelConfig::default().liquidation.maintenance_margins;
        assert_eq!(margins.margin_for_leverage(10), dec!(0.005));
        assert_eq!(margins.margin_for_leverage(50), dec!(0.01));
        assert_eq!(margins.margin_for_leverage(100), dec!(0.02));
        assert_eq!(margins.margin_for_leverage(150), dec!(0.05));
    }

    #[test]
    fn test_validation_rejects_bad_leverage() {
        let mut cfg = KernelConfig::default();
        cfg.instrument.max_leverage = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_yaml_parse() {
        let yaml = r#"
instrument:
  starting_price: "1000"
  tick_size: "0.01"
  min_order_size: "0.001"
  max_leverage: 150
liquidation:
  check_interval_ms: 100
  insurance_fund_initial: "1000000"
  maintenance_margins:
    conservative: "0.005"
    moderate: "0.01"
    aggressive: "0.02"
    degen: "0.05"
trader_defaults:
  starting_balance: "10000"
"#;
        let cfg: KernelConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg, KernelConfig::default());
    }

    #[test]
    fn test_expand_env() {
        std::env::set_var("KERNEL_TEST_PRICE", "2000");
        let expanded = expand_env("price: ${KERNEL_TEST_PRICE}\nplain: $HOME_NOT_EXPANDED");
        assert_eq!(expanded, "price: 2000\nplain: $HOME_NOT_EXPANDED");
    }

    #[test]
    fn test_expand_env_unset_is_empty() {
        std::env::remove_var("KERNEL_TEST_UNSET");
        assert_eq!(expand_env("x: ${KERNEL_TEST_UNSET}!"), "x: !");
    }
}
