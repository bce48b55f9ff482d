use std::collections::VecDeque;

use chrono::{DateTime, Utc};

/// Fixed-capacity FIFO sequence of timestamped values.
///
/// Insertion is append-only at the newest end; once the capacity is
/// exceeded the oldest entries are discarded first. Observations arrive in
/// the order they occur, so insertion order is also timestamp order.
#[derive(Debug, Clone)]
pub struct BoundedSeries<V> {
    entries: VecDeque<(DateTime<Utc>, V)>,
    capacity: usize,
}

impl<V: Clone> BoundedSeries<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    pub fn push(&mut self, at: DateTime<Utc>, value: V) {
        self.entries.push_back((at, value));
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clone the entries with `timestamp >= cutoff`, oldest first.
    pub fn since(&self, cutoff: DateTime<Utc>) -> Vec<(DateTime<Utc>, V)> {
        self.entries
            .iter()
            .filter(|(at, _)| *at >= cutoff)
            .cloned()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(DateTime<Utc>, V)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn base() -> DateTime<Utc> {
        "2026-01-01T00:00:00Z".parse().expect("valid timestamp")
    }

    #[test]
    fn push_keeps_only_the_most_recent_entries() {
        let mut series = BoundedSeries::new(1000);
        let t0 = base();
        for i in 0..1500i64 {
            series.push(t0 + Duration::seconds(i), i);
        }

        assert_eq!(series.len(), 1000);
        let values: Vec<i64> = series.iter().map(|(_, v)| *v).collect();
        assert_eq!(values.first(), Some(&500));
        assert_eq!(values.last(), Some(&1499));
        // still in insertion order
        assert!(values.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn since_filters_with_an_inclusive_cutoff() {
        let mut series = BoundedSeries::new(10);
        let t0 = base();
        series.push(t0, "a");
        series.push(t0 + Duration::seconds(10), "b");
        series.push(t0 + Duration::seconds(20), "c");

        let window = series.since(t0 + Duration::seconds(10));
        let values: Vec<&str> = window.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec!["b", "c"]);
    }

    #[test]
    fn since_on_empty_series_is_empty() {
        let series: BoundedSeries<f64> = BoundedSeries::new(10);
        assert!(series.since(base()).is_empty());
        assert!(series.is_empty());
    }
}
