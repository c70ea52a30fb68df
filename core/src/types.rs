//! Shared primitive types used across the forecasting engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A simulation period. One period = one round of decisions and results.
pub type Period = u32;

/// The canonical forecast run identifier.
pub type RunId = String;

/// Composite key scoping every elasticity and prediction.
/// Ordered by product first, then market.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProductMarket {
    pub product: String,
    pub market:  String,
}

impl ProductMarket {
    pub fn new(product: impl Into<String>, market: impl Into<String>) -> Self {
        Self {
            product: product.into(),
            market:  market.into(),
        }
    }
}

impl fmt::Display for ProductMarket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.product, self.market)
    }
}

/// A decision variable whose effect on demand is estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Driver {
    Price,
    Advertising,
}

impl Driver {
    pub const ALL: [Driver; 2] = [Driver::Price, Driver::Advertising];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Price       => "price",
            Self::Advertising => "advertising",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "price"       => Some(Self::Price),
            "advertising" => Some(Self::Advertising),
            _             => None,
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
