//! rcl-quality
//!
//! Signal quality filter. Eight independent checks; a signal passes when at
//! least `min_passing_checks` of them pass, whatever its score.

use chrono::{DateTime, Utc};
use rcl_config::QualityConfig;
use rcl_schemas::{Direction, TradeCandidate};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityCheck {
    Momentum,
    AverageAlignment,
    TrendStrength,
    Volatility,
    Session,
    Spread,
    Extension,
    MomentumDirection,
}

impl QualityCheck {
    /// Evaluation order.
    pub const ALL: [QualityCheck; 8] = [
        QualityCheck::Momentum,
        QualityCheck::AverageAlignment,
        QualityCheck::TrendStrength,
        QualityCheck::Volatility,
        QualityCheck::Session,
        QualityCheck::Spread,
        QualityCheck::Extension,
        QualityCheck::MomentumDirection,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QualityCheck::Momentum => "momentum",
            QualityCheck::AverageAlignment => "average_alignment",
            QualityCheck::TrendStrength => "trend_strength",
            QualityCheck::Volatility => "volatility",
            QualityCheck::Session => "session",
            QualityCheck::Spread => "spread",
            QualityCheck::Extension => "extension",
            QualityCheck::MomentumDirection => "momentum_direction",
        }
    }
}

impl fmt::Display for QualityCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FailedCheck {
    pub check: QualityCheck,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterResult {
    pub passes: bool,
    pub score: u8,
    pub passed: Vec<QualityCheck>,
    pub failed: Vec<FailedCheck>,
}

impl FilterResult {
    pub fn passed_count(&self) -> usize {
        self.passed.len()
    }

    /// Failure reasons joined for a denial message.
    pub fn failure_summary(&self) -> String {
        self.failed
            .iter()
            .map(|f| format!("{}: {}", f.check, f.reason))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Everything the filter looks at for one signal.
#[derive(Clone, Debug, PartialEq)]
pub struct QualityInput {
    pub instrument: String,
    pub direction: Direction,
    pub momentum: f64,
    pub trend_strength: f64,
    pub volatility: f64,
    pub spread: f64,
    pub price: f64,
    pub fast_avg: f64,
    pub mid_avg: f64,
    pub slow_avg: f64,
    pub timestamp: DateTime<Utc>,
}

impl QualityInput {
    pub fn from_candidate(c: &TradeCandidate) -> Self {
        let ind = &c.indicators;
        Self {
            instrument: c.instrument.clone(),
            direction: c.direction,
            momentum: ind.momentum,
            trend_strength: ind.trend_strength,
            volatility: ind.volatility,
            spread: ind.spread,
            price: c.entry_price,
            fast_avg: ind.fast_avg,
            mid_avg: ind.mid_avg,
            slow_avg: ind.slow_avg,
            timestamp: c.generated_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct QualityScorer {
    cfg: QualityConfig,
}

impl QualityScorer {
    pub fn new(cfg: QualityConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.cfg
    }

    pub fn filter_trade(&self, input: &QualityInput) -> FilterResult {
        let mut passed = Vec::new();
        let mut failed = Vec::new();
        let mut score: u32 = 0;

        for check in QualityCheck::ALL {
            match self.evaluate(check, input) {
                Ok(()) => {
                    score += self.weight(check);
                    passed.push(check);
                }
                Err(reason) => failed.push(FailedCheck { check, reason }),
            }
        }

        let passes = passed.len() >= self.cfg.min_passing_checks;
        tracing::debug!(
            instrument = %input.instrument,
            passed = passed.len(),
            score,
            passes,
            "quality filter evaluated"
        );
        FilterResult {
            passes,
            score: score.min(100) as u8,
            passed,
            failed,
        }
    }

    fn weight(&self, check: QualityCheck) -> u32 {
        let w = &self.cfg.weights;
        match check {
            QualityCheck::Momentum => w.momentum,
            QualityCheck::AverageAlignment => w.average_alignment,
            QualityCheck::TrendStrength => w.trend_strength,
            QualityCheck::Volatility => w.volatility,
            QualityCheck::Session => w.session,
            QualityCheck::Spread => w.spread,
            QualityCheck::Extension => w.extension,
            QualityCheck::MomentumDirection => w.momentum_direction,
        }
    }

    fn evaluate(&self, check: QualityCheck, i: &QualityInput) -> Result<(), String> {
        let cfg = &self.cfg;
        match check {
            QualityCheck::Momentum => {
                if i.momentum.abs() >= cfg.min_momentum {
                    Ok(())
                } else {
                    Err(format!(
                        "momentum {:.5} below minimum {:.5}",
                        i.momentum.abs(),
                        cfg.min_momentum
                    ))
                }
            }
            QualityCheck::AverageAlignment => {
                let aligned = match i.direction {
                    Direction::Long => i.fast_avg > i.mid_avg && i.mid_avg > i.slow_avg,
                    Direction::Short => i.fast_avg < i.mid_avg && i.mid_avg < i.slow_avg,
                };
                if aligned {
                    Ok(())
                } else {
                    Err(format!(
                        "averages not stacked for {} (fast {}, mid {}, slow {})",
                        i.direction, i.fast_avg, i.mid_avg, i.slow_avg
                    ))
                }
            }
            QualityCheck::TrendStrength => {
                if i.trend_strength >= cfg.min_trend_strength {
                    Ok(())
                } else {
                    Err(format!(
                        "trend strength {:.1} below minimum {:.1}",
                        i.trend_strength, cfg.min_trend_strength
                    ))
                }
            }
            QualityCheck::Volatility => {
                let floor = cfg.min_volatility_for(&i.instrument);
                if i.volatility >= floor {
                    Ok(())
                } else {
                    Err(format!("volatility {} below {} floor {}", i.volatility, i.instrument, floor))
                }
            }
            QualityCheck::Session => {
                if cfg.sessions.is_empty() || cfg.sessions.iter().any(|s| s.contains(i.timestamp)) {
                    Ok(())
                } else {
                    Err(format!(
                        "{} UTC outside configured sessions",
                        i.timestamp.format("%H:%M")
                    ))
                }
            }
            QualityCheck::Spread => {
                let ceiling = cfg.max_spread_for(&i.instrument);
                if i.spread <= ceiling {
                    Ok(())
                } else {
                    Err(format!("spread {} above {} ceiling {}", i.spread, i.instrument, ceiling))
                }
            }
            QualityCheck::Extension => {
                let allowed = cfg.max_extension * (i.fast_avg - i.slow_avg).abs();
                let distance = (i.price - i.fast_avg).abs();
                if distance <= allowed {
                    Ok(())
                } else {
                    Err(format!(
                        "price {} extended {} from fast average (allowed {})",
                        i.price, distance, allowed
                    ))
                }
            }
            QualityCheck::MomentumDirection => {
                let agrees = match i.direction {
                    Direction::Long => i.momentum > 0.0,
                    Direction::Short => i.momentum < 0.0,
                };
                if agrees {
                    Ok(())
                } else {
                    Err(format!("momentum {} against {} direction", i.momentum, i.direction))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_order_is_fixed() {
        let names: Vec<&str> = QualityCheck::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "momentum",
                "average_alignment",
                "trend_strength",
                "volatility",
                "session",
                "spread",
                "extension",
                "momentum_direction"
            ]
        );
    }

    #[test]
    fn default_weights_sum_to_one_hundred() {
        let s = QualityScorer::new(QualityConfig::default());
        let total: u32 = QualityCheck::ALL.iter().map(|c| s.weight(*c)).sum();
        assert_eq!(total, 100);
    }
}
