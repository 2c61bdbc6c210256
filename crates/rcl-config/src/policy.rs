use serde::{Deserialize, Serialize};

use crate::error::{check_range, ConfigError};

/// Sections of a [`RiskPolicy`] that accept parameter edits.
pub const POLICY_SECTIONS: &[&str] = &["risk", "limits", "protection"];

/// Per-strategy risk parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiskPolicy {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub locked: bool,
    pub risk: RiskSection,
    pub limits: LimitsSection,
    pub protection: ProtectionSection,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiskSection {
    /// Fraction of balance risked per trade (0.01 == 1%).
    pub max_risk_per_trade: f64,
    /// Minimum reward:risk ratio.
    pub min_risk_reward: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsSection {
    pub max_concurrent_positions: u32,
    pub max_trades_per_day: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtectionSection {
    /// Profit fraction at which the stop moves to entry.
    pub breakeven_threshold: f64,
    /// Profit fraction at which trailing starts.
    pub trail_activation: f64,
    /// Trail distance as a fraction of the peak favorable price.
    pub trail_distance: f64,
}

fn default_true() -> bool {
    true
}

impl RiskPolicy {
    /// Range checks. `name` only prefixes field paths in the error.
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        let f = |s: &str| format!("policies.{name}.{s}");

        check_range(
            &f("risk.max_risk_per_trade"),
            self.risk.max_risk_per_trade,
            0.0,
            0.10,
            false,
            "0 < x <= 0.10",
        )?;
        check_range(
            &f("risk.min_risk_reward"),
            self.risk.min_risk_reward,
            0.0,
            20.0,
            true,
            "0 <= x <= 20",
        )?;

        if self.limits.max_concurrent_positions == 0 || self.limits.max_concurrent_positions > 100 {
            return Err(ConfigError::out_of_range(
                f("limits.max_concurrent_positions"),
                self.limits.max_concurrent_positions,
                "1..=100",
            ));
        }
        if self.limits.max_trades_per_day == 0 || self.limits.max_trades_per_day > 1000 {
            return Err(ConfigError::out_of_range(
                f("limits.max_trades_per_day"),
                self.limits.max_trades_per_day,
                "1..=1000",
            ));
        }

        let p = &self.protection;
        check_range(
            &f("protection.breakeven_threshold"),
            p.breakeven_threshold,
            0.0,
            0.5,
            false,
            "0 < x <= 0.5",
        )?;
        check_range(
            &f("protection.trail_activation"),
            p.trail_activation,
            0.0,
            0.5,
            false,
            "0 < x <= 0.5",
        )?;
        check_range(
            &f("protection.trail_distance"),
            p.trail_distance,
            0.0,
            0.5,
            false,
            "0 < x <= 0.5",
        )?;
        if p.trail_activation < p.breakeven_threshold {
            return Err(ConfigError::out_of_range(
                f("protection.trail_activation"),
                p.trail_activation,
                ">= protection.breakeven_threshold",
            ));
        }
        Ok(())
    }

    /// True if the risk-bearing content matches, ignoring the `locked` and
    /// `enabled` flags.
    pub fn same_parameters(&self, other: &RiskPolicy) -> bool {
        self.risk == other.risk && self.limits == other.limits && self.protection == other.protection
    }
}
