//! Market data models
//!
//! This module contains the data types exchanged with providers:
//! - `quote` - What is requested (FetchKind) and what comes back (QuoteData)
//! - `profile` - Symbol identity and history returned for metadata fetches

mod profile;
mod quote;

pub use profile::{CapCategory, SymbolProfile};
pub use quote::{
    ClosingQuote, DailyQuote, FetchKind, IntradayQuote, OpeningQuote, QuoteData, QuotePayload,
};
