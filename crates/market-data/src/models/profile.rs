use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::quote::DailyQuote;

/// Market capitalisation bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapCategory {
    Mega,
    Large,
    Mid,
    Small,
    Micro,
    Nano,
}

impl CapCategory {
    /// Bucket a market capitalisation expressed in the listing currency.
    pub fn from_market_cap(market_cap: Decimal) -> Self {
        const BILLION: i64 = 1_000_000_000;
        const MILLION: i64 = 1_000_000;

        if market_cap >= Decimal::from(200 * BILLION) {
            CapCategory::Mega
        } else if market_cap >= Decimal::from(10 * BILLION) {
            CapCategory::Large
        } else if market_cap >= Decimal::from(2 * BILLION) {
            CapCategory::Mid
        } else if market_cap >= Decimal::from(300 * MILLION) {
            CapCategory::Small
        } else if market_cap >= Decimal::from(50 * MILLION) {
            CapCategory::Micro
        } else {
            CapCategory::Nano
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CapCategory::Mega => "Mega-Cap",
            CapCategory::Large => "Large-Cap",
            CapCategory::Mid => "Mid-Cap",
            CapCategory::Small => "Small-Cap",
            CapCategory::Micro => "Micro-Cap",
            CapCategory::Nano => "Nano-Cap",
        }
    }
}

/// Identity and daily history returned for a metadata fetch.
///
/// Identity fields are optional: providers expose different subsets and the
/// repository keeps whatever was stored before when a field is missing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolProfile {
    /// Listing exchange (e.g., "NasdaqGS", "NYSE")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,

    /// Instrument classification (e.g., "EQUITY", "Common Stock")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cap_category: Option<CapCategory>,

    /// Daily bars, oldest first
    #[serde(default)]
    pub history: Vec<DailyQuote>,
}
