use serde::{Deserialize, Serialize};

/// Instrument class. Determines pip size, per-unit point value and the
/// minimum tradable lot and lot step used by position sizing and the
/// mandate validator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentClass {
    /// USD-quoted currency pairs (EUR_USD, GBP_USD, ...).
    Forex,
    /// JPY-quoted currency pairs (USD_JPY, ...).
    ForexJpy,
    /// Spot metals (XAU_USD, XAG_USD).
    Metal,
    /// Cash indices (US30, NAS100, ...).
    Index,
    Crypto,
}

/// Contract parameters of an instrument class.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContractSpec {
    /// Size of one pip in price units.
    pub pip_size: f64,
    /// Account-currency P/L of one unit for a 1.0 price move.
    pub point_value: f64,
    /// Smallest order size accepted for this class.
    pub min_units: u64,
    /// Sizes are whole multiples of this.
    pub lot_step: u64,
}

impl InstrumentClass {
    pub fn contract(self) -> ContractSpec {
        match self {
            InstrumentClass::Forex => ContractSpec {
                pip_size: 0.0001,
                point_value: 1.0,
                min_units: 1_000,
                lot_step: 1_000,
            },
            // Yen P/L converted at a nominal 150 USD_JPY; accounts trading
            // JPY crosses override `point_value` in their config.
            InstrumentClass::ForexJpy => ContractSpec {
                pip_size: 0.01,
                point_value: 1.0 / 150.0,
                min_units: 1_000,
                lot_step: 1_000,
            },
            InstrumentClass::Metal => ContractSpec {
                pip_size: 0.01,
                point_value: 1.0,
                min_units: 1,
                lot_step: 1,
            },
            InstrumentClass::Index => ContractSpec {
                pip_size: 1.0,
                point_value: 1.0,
                min_units: 1,
                lot_step: 1,
            },
            InstrumentClass::Crypto => ContractSpec {
                pip_size: 0.01,
                point_value: 1.0,
                min_units: 1,
                lot_step: 1,
            },
        }
    }

    pub fn pip_size(self) -> f64 {
        self.contract().pip_size
    }
}
