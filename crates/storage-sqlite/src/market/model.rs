//! Database models for symbols, daily bars and intraday snapshots.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;

use crate::errors::StorageError;
use marketfeed_core::quotes::{
    DailyBar, IntradaySnapshot, RollingStats, SymbolIdentity, SymbolMetadata,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn format_decimal(value: Option<Decimal>) -> Option<String> {
    value.map(|d| d.normalize().to_string())
}

fn parse_date(value: &str) -> Result<NaiveDate, StorageError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| StorageError::CorruptValue(format!("date '{}': {}", value, e)))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::CorruptValue(format!("timestamp '{}': {}", value, e)))
}

fn parse_decimal(value: Option<&str>) -> Result<Option<Decimal>, StorageError> {
    value
        .map(|s| {
            Decimal::from_str(s)
                .map_err(|e| StorageError::CorruptValue(format!("decimal '{}': {}", s, e)))
        })
        .transpose()
}

// =============================================================================
// Symbols
// =============================================================================

/// Database model for symbol metadata
#[derive(Queryable, Identifiable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::symbols)]
#[diesel(primary_key(symbol))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SymbolDB {
    pub symbol: String,
    pub exchange: Option<String>,
    pub security_type: Option<String>,
    pub cap_category: Option<String>,
    pub avg_daily_volume: Option<i64>,
    pub avg_daily_low: Option<String>,
    pub avg_daily_high: Option<String>,
    pub year_start_price: Option<String>,
    pub previous_day_open: Option<String>,
    pub previous_day_close: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl SymbolDB {
    pub fn first_sighting(identity: &SymbolIdentity, now: DateTime<Utc>) -> Self {
        let now = format_timestamp(now);
        Self {
            symbol: identity.symbol.clone(),
            exchange: identity.exchange.clone(),
            security_type: identity.security_type.clone(),
            cap_category: identity.cap_category.clone(),
            avg_daily_volume: None,
            avg_daily_low: None,
            avg_daily_high: None,
            year_start_price: None,
            previous_day_open: None,
            previous_day_close: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Identity update; `None` fields are left untouched.
#[derive(AsChangeset, Debug, Clone)]
#[diesel(table_name = crate::schema::symbols)]
pub struct SymbolIdentityUpdateDB {
    pub exchange: Option<String>,
    pub security_type: Option<String>,
    pub cap_category: Option<String>,
    pub updated_at: String,
}

impl SymbolIdentityUpdateDB {
    pub fn new(identity: &SymbolIdentity, now: DateTime<Utc>) -> Self {
        Self {
            exchange: identity.exchange.clone(),
            security_type: identity.security_type.clone(),
            cap_category: identity.cap_category.clone(),
            updated_at: format_timestamp(now),
        }
    }
}

/// Rolling statistics update; every column is overwritten, `None` included.
#[derive(AsChangeset, Debug, Clone)]
#[diesel(table_name = crate::schema::symbols)]
#[diesel(treat_none_as_null = true)]
pub struct RollingStatsDB {
    pub avg_daily_volume: Option<i64>,
    pub avg_daily_low: Option<String>,
    pub avg_daily_high: Option<String>,
    pub year_start_price: Option<String>,
    pub previous_day_open: Option<String>,
    pub previous_day_close: Option<String>,
}

impl From<&RollingStats> for RollingStatsDB {
    fn from(stats: &RollingStats) -> Self {
        Self {
            avg_daily_volume: stats.avg_daily_volume,
            avg_daily_low: format_decimal(stats.avg_daily_low),
            avg_daily_high: format_decimal(stats.avg_daily_high),
            year_start_price: format_decimal(stats.year_start_price),
            previous_day_open: format_decimal(stats.previous_day_open),
            previous_day_close: format_decimal(stats.previous_day_close),
        }
    }
}

impl TryFrom<SymbolDB> for SymbolMetadata {
    type Error = StorageError;

    fn try_from(db: SymbolDB) -> Result<Self, Self::Error> {
        Ok(SymbolMetadata {
            stats: RollingStats {
                avg_daily_volume: db.avg_daily_volume,
                avg_daily_low: parse_decimal(db.avg_daily_low.as_deref())?,
                avg_daily_high: parse_decimal(db.avg_daily_high.as_deref())?,
                year_start_price: parse_decimal(db.year_start_price.as_deref())?,
                previous_day_open: parse_decimal(db.previous_day_open.as_deref())?,
                previous_day_close: parse_decimal(db.previous_day_close.as_deref())?,
            },
            created_at: parse_timestamp(&db.created_at)?,
            updated_at: parse_timestamp(&db.updated_at)?,
            symbol: db.symbol,
            exchange: db.exchange,
            security_type: db.security_type,
            cap_category: db.cap_category,
        })
    }
}

// =============================================================================
// Daily Bars
// =============================================================================

/// Database model for daily bars
#[derive(Queryable, Identifiable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::daily_bars)]
#[diesel(primary_key(symbol, date))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DailyBarDB {
    pub symbol: String,
    pub date: String,
    pub open: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    pub close: Option<String>,
    pub volume: Option<i64>,
    pub updated_at: String,
}

impl From<&DailyBar> for DailyBarDB {
    fn from(bar: &DailyBar) -> Self {
        Self {
            symbol: bar.symbol.clone(),
            date: format_date(bar.date),
            open: format_decimal(bar.open),
            high: format_decimal(bar.high),
            low: format_decimal(bar.low),
            close: format_decimal(bar.close),
            volume: bar.volume,
            updated_at: format_timestamp(bar.updated_at),
        }
    }
}

impl TryFrom<DailyBarDB> for DailyBar {
    type Error = StorageError;

    fn try_from(db: DailyBarDB) -> Result<Self, Self::Error> {
        Ok(DailyBar {
            date: parse_date(&db.date)?,
            open: parse_decimal(db.open.as_deref())?,
            high: parse_decimal(db.high.as_deref())?,
            low: parse_decimal(db.low.as_deref())?,
            close: parse_decimal(db.close.as_deref())?,
            volume: db.volume,
            updated_at: parse_timestamp(&db.updated_at)?,
            symbol: db.symbol,
        })
    }
}

// =============================================================================
// Intraday Snapshots
// =============================================================================

/// Database model for intraday snapshots
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::intraday_snapshots)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct IntradaySnapshotDB {
    pub symbol: String,
    pub captured_at: String,
    pub price: String,
    pub source: String,
}

impl From<&IntradaySnapshot> for IntradaySnapshotDB {
    fn from(snapshot: &IntradaySnapshot) -> Self {
        Self {
            symbol: snapshot.symbol.clone(),
            captured_at: format_timestamp(snapshot.captured_at),
            price: snapshot.price.normalize().to_string(),
            source: snapshot.source.clone(),
        }
    }
}

impl TryFrom<IntradaySnapshotDB> for IntradaySnapshot {
    type Error = StorageError;

    fn try_from(db: IntradaySnapshotDB) -> Result<Self, Self::Error> {
        Ok(IntradaySnapshot {
            captured_at: parse_timestamp(&db.captured_at)?,
            price: Decimal::from_str(&db.price)
                .map_err(|e| StorageError::CorruptValue(format!("price '{}': {}", db.price, e)))?,
            symbol: db.symbol,
            source: db.source,
        })
    }
}
