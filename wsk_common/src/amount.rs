//! Parsing helpers for the decimal-string amounts the indexer emits.

use crate::Error;

/// Parse a decimal-string token amount.
///
/// The indexer serializes every amount as a base-10 string to avoid JSON
/// number precision loss; 38 digits (u128) cover every supply on this chain.
pub fn parse_units(s: &str) -> Result<u128, Error> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidAmount(s.to_string()));
    }
    trimmed
        .parse::<u128>()
        .map_err(|_| Error::InvalidAmount(s.to_string()))
}

/// Parse a decimal-string satoshi amount.
pub fn parse_sats(s: &str) -> Result<u64, Error> {
    let trimmed = s.trim();
    trimmed
        .parse::<u64>()
        .map_err(|_| Error::InvalidAmount(s.to_string()))
}

/// Render satoshis as a BTC decimal string, trimming trailing zeros.
pub fn format_btc(sats: u64) -> String {
    let whole = sats / 100_000_000;
    let frac = sats % 100_000_000;
    if frac == 0 {
        return format!("{whole} BTC");
    }
    let frac = format!("{frac:08}");
    format!("{whole}.{} BTC", frac.trim_end_matches('0'))
}
