// sqlx error mapping and column codecs

use chrono::{DateTime, Utc};
use netbill_core::error::AppError;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Unique violations become `Conflict`; everything else is a storage failure
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    let sqlx::Error::Database(db_err) = &err else {
        return AppError::Database(err.to_string());
    };
    // https://www.sqlite.org/rescode.html
    let kind = match db_err.code().as_deref() {
        Some("2067") | Some("1555") => return AppError::Conflict(db_err.message().to_string()),
        Some("787") | Some("3850") => "foreign key violation",
        Some("275") | Some("531") => "check constraint violation",
        Some("5") => "database busy",
        Some("13") => "database full",
        _ => "sqlite",
    };
    AppError::Database(format!("{}: {}", kind, db_err.message()))
}

/// Money column (TEXT) to Decimal
pub(crate) fn parse_money(column: &str, raw: &str) -> Result<Decimal, AppError> {
    Decimal::from_str(raw)
        .map_err(|e| AppError::Database(format!("invalid decimal in {}: {} ({})", column, raw, e)))
}

pub(crate) fn parse_optional_money(
    column: &str,
    raw: Option<String>,
) -> Result<Option<Decimal>, AppError> {
    raw.filter(|s| !s.trim().is_empty())
        .map(|s| parse_money(column, &s))
        .transpose()
}

/// Decimal to its stored form, 2 fractional digits
pub(crate) fn money(value: Decimal) -> String {
    value.round_dp(2).to_string()
}

pub(crate) fn from_millis(column: &str, millis: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        AppError::Database(format!("timestamp out of range in {}: {}", column, millis))
    })
}

/// Non-negative INTEGER column to u32
pub(crate) fn to_u32(column: &str, value: i64) -> Result<u32, AppError> {
    u32::try_from(value)
        .map_err(|_| AppError::Database(format!("value out of range in {}: {}", column, value)))
}
