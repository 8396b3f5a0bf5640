//! Tiered-rate pricing schemes.
//!
//! Google prices some resources in usage brackets: the first N units at one
//! rate, the next M at another, and so on. How those brackets apply to a
//! single workflow depends on what else the billing account consumed that
//! month, which an estimate cannot know, so the scheme is chosen per run.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::catalog::PriceTier;
use crate::error::CostError;

/// How tiered rates are applied to a usage amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TierScheme {
    /// Slice the usage across every tier, as for a fresh project
    #[default]
    All,
    /// Like `All`, but a free lowest tier is charged at the next tier's rate
    NoFree,
    /// Whole usage at the rate of the highest-threshold tier
    TopTier,
    /// Whole usage at the highest unit price of any tier
    MaxPrice,
}

impl TierScheme {
    pub const ALL: [TierScheme; 4] = [TierScheme::All, TierScheme::NoFree, TierScheme::TopTier, TierScheme::MaxPrice];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::NoFree => "no-free",
            Self::TopTier => "top-tier",
            Self::MaxPrice => "max-price",
        }
    }

    /// Price `usage` against `tiers`, in nano-dollars.
    ///
    /// `tiers` may come in any order. An empty tier list prices to zero.
    pub fn price(&self, usage: f64, tiers: &[PriceTier]) -> f64 {
        if tiers.is_empty() || usage <= 0.0 {
            return 0.0;
        }

        let mut sorted = tiers.to_vec();
        sorted.sort_by(|a, b| a.start_usage_amount.total_cmp(&b.start_usage_amount));

        match self {
            Self::All => sliced(usage, &sorted),
            Self::NoFree => {
                if sorted.len() > 1 && sorted[0].unit_price_nanos == 0.0 {
                    sorted[0].unit_price_nanos = sorted[1].unit_price_nanos;
                }
                sliced(usage, &sorted)
            }
            Self::TopTier => {
                let top = sorted[sorted.len() - 1];
                usage * top.unit_price_nanos
            }
            Self::MaxPrice => {
                let max = sorted
                    .iter()
                    .map(|t| t.unit_price_nanos)
                    .fold(f64::NEG_INFINITY, f64::max);
                usage * max
            }
        }
    }
}

/// Walk the tiers below `usage` from the highest threshold down, charging
/// each slice at its own rate. `tiers` must be sorted ascending.
fn sliced(usage: f64, tiers: &[PriceTier]) -> f64 {
    let mut remaining = usage;
    let mut cost = 0.0;
    for tier in tiers.iter().rev().filter(|t| t.start_usage_amount < usage) {
        cost += (remaining - tier.start_usage_amount) * tier.unit_price_nanos;
        remaining = tier.start_usage_amount;
    }
    cost
}

impl FromStr for TierScheme {
    type Err = CostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "no-free" => Ok(Self::NoFree),
            "top-tier" => Ok(Self::TopTier),
            "max-price" => Ok(Self::MaxPrice),
            other => Err(CostError::UnknownTierScheme(other.to_string())),
        }
    }
}

impl fmt::Display for TierScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
