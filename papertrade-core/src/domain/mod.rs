//! Domain types: bars, orders, trade ledger rows, risk events, hashes.

pub mod bar;
pub mod ids;
pub mod order;
pub mod risk;
pub mod trade;

pub use bar::{clean_bars, Bar};
pub use ids::{ConfigHash, DatasetHash};
pub use order::{OrderSide, OrderType};
pub use risk::{EntryBlockReason, RiskControls, RiskEvent};
pub use trade::{Trade, TradeReason};

/// Round half away from zero to `places` decimal places.
///
/// Non-finite values pass through unchanged.
pub fn round_to(value: f64, places: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(places);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_to_places() {
        assert_eq!(round_to(1.234_567_89, 4), 1.2346);
        assert_eq!(round_to(-0.5, 0), -1.0);
        assert!(round_to(f64::INFINITY, 6).is_infinite());
        assert!(round_to(f64::NAN, 6).is_nan());
    }
}
