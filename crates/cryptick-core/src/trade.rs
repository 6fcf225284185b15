//! Executed trade representation.
//!
//! The exchange delivers trades as positional JSON arrays
//! `[ID, MTS, AMOUNT, PRICE]` where MTS is a millisecond timestamp and
//! AMOUNT is signed (negative for sells).

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// A single executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeTick {
    /// Exchange-assigned trade id.
    pub id: i64,
    /// Execution timestamp in milliseconds.
    pub timestamp: i64,
    /// Signed trade amount (negative for sells).
    pub amount: f64,
    /// Execution price.
    pub price: f64,
}

impl TradeTick {
    /// Parse a trade from the positional wire fields `[ID, MTS, AMOUNT, PRICE]`.
    pub fn from_fields(fields: &[serde_json::Value]) -> Result<Self> {
        if fields.len() < 4 {
            return Err(CoreError::MalformedTrade(format!(
                "expected 4 fields, got {}",
                fields.len()
            )));
        }

        let id = fields[0]
            .as_i64()
            .ok_or_else(|| CoreError::MalformedTrade(format!("bad trade id: {}", fields[0])))?;
        let timestamp = fields[1]
            .as_i64()
            .ok_or_else(|| CoreError::MalformedTrade(format!("bad timestamp: {}", fields[1])))?;
        let amount = fields[2]
            .as_f64()
            .ok_or_else(|| CoreError::MalformedTrade(format!("bad amount: {}", fields[2])))?;
        let price = fields[3]
            .as_f64()
            .ok_or_else(|| CoreError::MalformedTrade(format!("bad price: {}", fields[3])))?;

        Ok(Self {
            id,
            timestamp,
            amount,
            price,
        })
    }

    /// Format as a `id,price,amount,time` record line.
    pub fn to_record(&self) -> String {
        format!("{},{},{},{}", self.id, self.price, self.amount, self.timestamp)
    }

    /// Check if this trade is a buy (positive amount).
    pub fn is_buy(&self) -> bool {
        self.amount > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_fields() {
        let fields = vec![json!(401597393), json!(1574694475039_i64), json!(0.005), json!(7244.9)];
        let tick = TradeTick::from_fields(&fields).unwrap();

        assert_eq!(tick.id, 401597393);
        assert_eq!(tick.timestamp, 1574694475039);
        assert_eq!(tick.amount, 0.005);
        assert_eq!(tick.price, 7244.9);
        assert!(tick.is_buy());
    }

    #[test]
    fn test_from_fields_sell_side() {
        let fields = vec![json!(1), json!(1574694475000_i64), json!(-0.25), json!(7250.0)];
        let tick = TradeTick::from_fields(&fields).unwrap();

        assert!(!tick.is_buy());
        assert_eq!(tick.amount, -0.25);
    }

    #[test]
    fn test_from_fields_too_short() {
        let fields = vec![json!(1), json!(2)];
        let err = TradeTick::from_fields(&fields).unwrap_err();
        assert!(matches!(err, CoreError::MalformedTrade(_)));
    }

    #[test]
    fn test_from_fields_wrong_type() {
        let fields = vec![json!("id"), json!(2), json!(0.1), json!(100.0)];
        let err = TradeTick::from_fields(&fields).unwrap_err();
        assert!(matches!(err, CoreError::MalformedTrade(_)));
    }

    #[test]
    fn test_to_record() {
        let tick = TradeTick {
            id: 41,
            timestamp: 1574694475039,
            amount: 0.01,
            price: 9000.5,
        };
        assert_eq!(tick.to_record(), "41,9000.5,0.01,1574694475039");
    }
}
