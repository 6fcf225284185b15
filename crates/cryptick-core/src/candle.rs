//! Tick-to-candle aggregation.
//!
//! Converts a series of executed trades into fixed-period OHLCV candles.
//! Intended for offline batch conversion, not the live feed path.

use crate::error::{CoreError, Result};
use crate::trade::TradeTick;
use serde::{Deserialize, Serialize};

/// OHLCV summary of one time bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    /// Total traded volume (sum of absolute amounts).
    pub volume: f64,
    /// Bucket start timestamp, in the same unit as the input ticks.
    pub timestamp: i64,
}

fn round_down_nearest(n: i64, precision: i64) -> i64 {
    n.div_euclid(precision) * precision
}

/// Aggregate ticks into candles of `period` width.
///
/// `period` is expressed in the same unit as the tick timestamps. Ticks are
/// bucketed by rounding their timestamp down to the nearest period boundary;
/// one candle is emitted per bucket from the first tick's bucket to the
/// last's, with no gaps. A bucket containing no trades produces a candle
/// whose open/close/high/low all equal the previous candle's close and whose
/// volume is zero.
pub fn tick_to_candles(ticks: &[TradeTick], period: i64) -> Result<Vec<Candle>> {
    if period <= 0 {
        return Err(CoreError::InvalidPeriod(period));
    }
    if ticks.is_empty() {
        return Ok(Vec::new());
    }

    let mut sorted: Vec<TradeTick> = ticks.to_vec();
    sorted.sort_by_key(|t| t.timestamp);

    let start = round_down_nearest(sorted[0].timestamp, period);
    let end = round_down_nearest(sorted[sorted.len() - 1].timestamp, period) + period;

    let mut candles = Vec::with_capacity(((end - start) / period) as usize);
    let mut next = 0usize;

    let mut bucket_start = start;
    while bucket_start < end {
        let bucket_end = bucket_start + period;

        let first = next;
        while next < sorted.len() && sorted[next].timestamp < bucket_end {
            next += 1;
        }
        let bucket = &sorted[first..next];

        let candle = if bucket.is_empty() {
            // The first bucket always holds the first tick, so there is
            // always a previous candle to carry forward.
            let prev_close = candles
                .last()
                .map(|c: &Candle| c.close)
                .unwrap_or_default();
            Candle {
                open: prev_close,
                close: prev_close,
                high: prev_close,
                low: prev_close,
                volume: 0.0,
                timestamp: bucket_start,
            }
        } else {
            let open = bucket[0].price;
            let close = bucket[bucket.len() - 1].price;
            let mut high = f64::MIN;
            let mut low = f64::MAX;
            let mut volume = 0.0;
            for tick in bucket {
                high = high.max(tick.price);
                low = low.min(tick.price);
                volume += tick.amount.abs();
            }
            Candle {
                open,
                close,
                high,
                low,
                volume,
                timestamp: bucket_start,
            }
        };

        candles.push(candle);
        bucket_start = bucket_end;
    }

    Ok(candles)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(id: i64, timestamp: i64, amount: f64, price: f64) -> TradeTick {
        TradeTick {
            id,
            timestamp,
            amount,
            price,
        }
    }

    #[test]
    fn test_single_bucket() {
        let ticks = vec![
            tick(1, 60, 0.5, 100.0),
            tick(2, 75, 0.2, 105.0),
            tick(3, 119, 0.3, 95.0),
        ];

        let candles = tick_to_candles(&ticks, 60).unwrap();
        assert_eq!(candles.len(), 1);

        let c = candles[0];
        assert_eq!(c.open, 100.0);
        assert_eq!(c.close, 95.0);
        assert_eq!(c.high, 105.0);
        assert_eq!(c.low, 95.0);
        assert_eq!(c.volume, 1.0);
        assert_eq!(c.timestamp, 60);
    }

    #[test]
    fn test_multiple_buckets() {
        let ticks = vec![
            tick(1, 0, 1.0, 10.0),
            tick(2, 59, 1.0, 12.0),
            tick(3, 60, 1.0, 11.0),
            tick(4, 130, 1.0, 9.0),
        ];

        let candles = tick_to_candles(&ticks, 60).unwrap();
        assert_eq!(candles.len(), 3);

        assert_eq!(candles[0].timestamp, 0);
        assert_eq!(candles[0].open, 10.0);
        assert_eq!(candles[0].close, 12.0);

        assert_eq!(candles[1].timestamp, 60);
        assert_eq!(candles[1].open, 11.0);
        assert_eq!(candles[1].close, 11.0);

        assert_eq!(candles[2].timestamp, 120);
        assert_eq!(candles[2].open, 9.0);
    }

    #[test]
    fn test_empty_bucket_carries_previous_close() {
        let ticks = vec![tick(1, 0, 1.0, 10.0), tick(2, 125, 1.0, 20.0)];

        let candles = tick_to_candles(&ticks, 60).unwrap();
        assert_eq!(candles.len(), 3);

        // Middle bucket [60, 120) had no trades.
        let gap = candles[1];
        assert_eq!(gap.open, 10.0);
        assert_eq!(gap.close, 10.0);
        assert_eq!(gap.high, 10.0);
        assert_eq!(gap.low, 10.0);
        assert_eq!(gap.volume, 0.0);
        assert_eq!(gap.timestamp, 60);
    }

    #[test]
    fn test_unsorted_input() {
        let ticks = vec![tick(2, 70, 1.0, 20.0), tick(1, 10, 1.0, 10.0)];

        let candles = tick_to_candles(&ticks, 60).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].close, 10.0);
        assert_eq!(candles[1].open, 20.0);
    }

    #[test]
    fn test_volume_uses_absolute_amounts() {
        let ticks = vec![tick(1, 0, 0.5, 10.0), tick(2, 1, -0.5, 10.0)];

        let candles = tick_to_candles(&ticks, 60).unwrap();
        assert_eq!(candles[0].volume, 1.0);
    }

    #[test]
    fn test_empty_input() {
        let candles = tick_to_candles(&[], 60).unwrap();
        assert!(candles.is_empty());
    }

    #[test]
    fn test_invalid_period() {
        let ticks = vec![tick(1, 0, 1.0, 10.0)];
        assert!(matches!(
            tick_to_candles(&ticks, 0),
            Err(CoreError::InvalidPeriod(0))
        ));
    }

    #[test]
    fn test_timestamps_round_down_to_boundary() {
        let ticks = vec![tick(1, 61, 1.0, 10.0)];

        let candles = tick_to_candles(&ticks, 60).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].timestamp, 60);
    }
}
