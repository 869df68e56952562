//! Rolling candle window

use super::{Candle, CandleError};
use std::collections::VecDeque;

/// Fixed-capacity window of closed candles, oldest first
#[derive(Debug, Clone)]
pub struct CandleStore {
    capacity: usize,
    candles: VecDeque<Candle>,
}

impl CandleStore {
    /// Create a store retaining at most `capacity` candles
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            candles: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Append the newest closed bar, evicting the oldest past capacity
    pub fn append(&mut self, candle: Candle) {
        self.candles.push_back(candle);

        while self.candles.len() > self.capacity {
            self.candles.pop_front();
        }
    }

    /// Append only bars newer than the latest retained one
    ///
    /// Feeds return overlapping history on every poll; anything at or before
    /// the current tail is skipped. Returns how many bars were added.
    pub fn extend_closed(&mut self, candles: impl IntoIterator<Item = Candle>) -> usize {
        let mut added = 0;
        for candle in candles {
            let is_newer = self
                .candles
                .back()
                .map_or(true, |last| candle.open_time > last.open_time);
            if is_newer {
                self.append(candle);
                added += 1;
            }
        }
        added
    }

    /// All retained candles, oldest to newest
    pub fn window(&self) -> Vec<Candle> {
        self.candles.iter().cloned().collect()
    }

    /// The newest `n` candles, oldest to newest
    pub fn recent(&self, n: usize) -> Result<Vec<Candle>, CandleError> {
        if self.candles.len() < n {
            return Err(CandleError::InsufficientData {
                required: n,
                available: self.candles.len(),
            });
        }
        Ok(self.candles.iter().skip(self.candles.len() - n).cloned().collect())
    }

    /// Most recent closed bar
    pub fn latest(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Whether the window has reached capacity
    pub fn is_full(&self) -> bool {
        self.candles.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    fn candle_at(index: i64, volume: i64) -> Candle {
        let open_time = Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::minutes(15 * index);
        Candle {
            open_time,
            close_time: open_time + Duration::minutes(15),
            open: Decimal::from(10),
            high: Decimal::from(11),
            low: Decimal::from(9),
            close: Decimal::from(10),
            volume: Decimal::from(volume),
            taker_buy_volume: None,
        }
    }

    #[test]
    fn test_store_creation() {
        let store = CandleStore::new(20);
        assert!(store.is_empty());
        assert_eq!(store.capacity(), 20);
        assert!(store.latest().is_none());
    }

    #[test]
    fn test_append_keeps_order() {
        let mut store = CandleStore::new(5);
        for i in 0..3 {
            store.append(candle_at(i, 100 + i));
        }
        let window = store.window();
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].volume, Decimal::from(100));
        assert_eq!(window[2].volume, Decimal::from(102));
    }

    #[test]
    fn test_append_evicts_oldest() {
        let mut store = CandleStore::new(3);
        for i in 0..5 {
            store.append(candle_at(i, i));
        }
        let window = store.window();
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].volume, Decimal::from(2));
        assert_eq!(store.latest().unwrap().volume, Decimal::from(4));
        assert!(store.is_full());
    }

    #[test]
    fn test_recent_insufficient_data() {
        let mut store = CandleStore::new(20);
        for i in 0..7 {
            store.append(candle_at(i, 100));
        }
        let err = store.recent(20).unwrap_err();
        assert_eq!(
            err,
            CandleError::InsufficientData {
                required: 20,
                available: 7
            }
        );
    }

    #[test]
    fn test_recent_returns_newest() {
        let mut store = CandleStore::new(10);
        for i in 0..10 {
            store.append(candle_at(i, i));
        }
        let recent = store.recent(3).unwrap();
        let volumes: Vec<_> = recent.iter().map(|c| c.volume).collect();
        assert_eq!(
            volumes,
            vec![Decimal::from(7), Decimal::from(8), Decimal::from(9)]
        );
    }

    #[test]
    fn test_extend_closed_skips_overlap() {
        let mut store = CandleStore::new(10);
        assert_eq!(store.extend_closed((0..4).map(|i| candle_at(i, i))), 4);

        // Second poll overlaps the first two bars and adds two new ones
        let added = store.extend_closed((2..6).map(|i| candle_at(i, i)));
        assert_eq!(added, 2);
        assert_eq!(store.len(), 6);
        assert_eq!(store.latest().unwrap().volume, Decimal::from(5));
    }

    #[test]
    fn test_extend_closed_ignores_stale_bar() {
        let mut store = CandleStore::new(10);
        store.append(candle_at(5, 5));
        assert_eq!(store.extend_closed(vec![candle_at(3, 3)]), 0);
        assert_eq!(store.len(), 1);
    }
}
