//! Rolling telemetry buffer for live display
//!
//! Fixed capacity, oldest evicted first. Insertion order is display order.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::config::defaults::{
    DISPLAY_RANGE_MIN_SPAN_BPM, DISPLAY_RANGE_PADDING_BPM, DISPLAY_RANGE_WIDENED_HALF_BPM,
};
use crate::types::TelemetryRecord;

#[derive(Debug, Clone)]
pub struct RollingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
    visible_window: usize,
}

impl<T> RollingBuffer<T> {
    /// A zero capacity is raised to 1; the window is clamped to the capacity.
    pub fn new(capacity: usize, visible_window: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            visible_window: visible_window.clamp(1, capacity),
        }
    }

    /// Append, returning the evicted oldest item when full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn visible_window(&self) -> usize {
        self.visible_window
    }

    /// Set the display window, clamped to `1..=capacity`. Returns the applied value.
    pub fn set_visible_window(&mut self, window: usize) -> usize {
        self.visible_window = window.clamp(1, self.capacity);
        self.visible_window
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    /// The most recent `visible_window` items, oldest first.
    pub fn visible_iter(&self) -> impl Iterator<Item = &T> {
        let skip = self.items.len().saturating_sub(self.visible_window);
        self.items.iter().skip(skip)
    }
}

impl<T: Clone> RollingBuffer<T> {
    pub fn snapshot(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }

    pub fn visible(&self) -> Vec<T> {
        self.visible_iter().cloned().collect()
    }
}

/// Y-axis range for the heart-rate trace
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DisplayRange {
    pub min: f64,
    pub max: f64,
}

impl RollingBuffer<TelemetryRecord> {
    /// Range over the visible window: `(min - 5, max + 5)`, or a 30 bpm span
    /// around the midpoint when the readings span less than 20 bpm.
    pub fn heart_rate_display_range(&self) -> Option<DisplayRange> {
        let mut rates = self.visible_iter().map(|r| f64::from(r.reading.heart_rate_bpm));
        let first = rates.next()?;
        let (lo, hi) = rates.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));

        if hi - lo < DISPLAY_RANGE_MIN_SPAN_BPM {
            let mid = (lo + hi) / 2.0;
            Some(DisplayRange {
                min: mid - DISPLAY_RANGE_WIDENED_HALF_BPM,
                max: mid + DISPLAY_RANGE_WIDENED_HALF_BPM,
            })
        } else {
            Some(DisplayRange {
                min: lo - DISPLAY_RANGE_PADDING_BPM,
                max: hi + DISPLAY_RANGE_PADDING_BPM,
            })
        }
    }
}

/// Rolling buffer shared between the ingestion task (sole writer) and readers.
///
/// Every operation holds the lock only for the copy or mutation itself.
#[derive(Debug)]
pub struct SharedBuffer<T> {
    inner: Arc<Mutex<RollingBuffer<T>>>,
}

impl<T> Clone for SharedBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> SharedBuffer<T> {
    pub fn new(capacity: usize, visible_window: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RollingBuffer::new(capacity, visible_window))),
        }
    }

    /// Lock, recovering the buffer if a previous holder panicked
    pub fn lock(&self) -> MutexGuard<'_, RollingBuffer<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, item: T) -> Option<T> {
        self.lock().push(item)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn set_visible_window(&self, window: usize) -> usize {
        self.lock().set_visible_window(window)
    }
}

impl<T: Clone> SharedBuffer<T> {
    pub fn snapshot(&self) -> Vec<T> {
        self.lock().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClassifiedStatus, Reading, Severity, StatusLabel, ValidationTags};
    use chrono::Local;

    fn record(hr: u32) -> TelemetryRecord {
        let reading = Reading {
            heart_rate_bpm: hr,
            spo2_percent: 98.0,
            hrv_ms: 50.0,
            accel_g: 1.0,
            class_id: 0,
            label: "Normal".to_string(),
            captured_at: Local::now(),
            tags: ValidationTags::default(),
        };
        let status = ClassifiedStatus {
            label: StatusLabel::Normal,
            text: "Normal".to_string(),
            severity: Severity::Safe,
            high_bpm_override: false,
        };
        TelemetryRecord::new(reading, status)
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let mut buf = RollingBuffer::new(3, 3);
        assert_eq!(buf.push(1), None);
        buf.push(2);
        buf.push(3);
        assert_eq!(buf.push(4), Some(1));
        assert_eq!(buf.snapshot(), vec![2, 3, 4]);
    }

    #[test]
    fn test_clear_then_push() {
        let mut buf = RollingBuffer::new(2, 2);
        buf.push('a');
        buf.push('b');
        buf.clear();
        assert!(buf.is_empty());
        buf.push('c');
        assert_eq!(buf.snapshot(), vec!['c']);
    }

    #[test]
    fn test_visible_window_clamped_to_capacity() {
        let mut buf: RollingBuffer<u8> = RollingBuffer::new(10, 50);
        assert_eq!(buf.visible_window(), 10);
        assert_eq!(buf.set_visible_window(0), 1);
        assert_eq!(buf.set_visible_window(4), 4);
        for i in 0..8 {
            buf.push(i);
        }
        assert_eq!(buf.visible(), vec![4, 5, 6, 7]);
    }

    #[test]
    fn test_zero_capacity_raised() {
        let mut buf = RollingBuffer::new(0, 0);
        buf.push(1);
        buf.push(2);
        assert_eq!(buf.snapshot(), vec![2]);
    }

    #[test]
    fn test_display_range_padded() {
        let mut buf = RollingBuffer::new(10, 10);
        assert_eq!(buf.heart_rate_display_range(), None);
        for hr in [60, 90, 75] {
            buf.push(record(hr));
        }
        assert_eq!(
            buf.heart_rate_display_range(),
            Some(DisplayRange { min: 55.0, max: 95.0 })
        );
    }

    #[test]
    fn test_display_range_widened_when_narrow() {
        let mut buf = RollingBuffer::new(10, 10);
        for hr in [70, 74] {
            buf.push(record(hr));
        }
        assert_eq!(
            buf.heart_rate_display_range(),
            Some(DisplayRange { min: 57.0, max: 87.0 })
        );
    }

    #[test]
    fn test_display_range_uses_visible_window_only() {
        let mut buf = RollingBuffer::new(10, 2);
        for hr in [200, 70, 100] {
            buf.push(record(hr));
        }
        assert_eq!(
            buf.heart_rate_display_range(),
            Some(DisplayRange { min: 65.0, max: 105.0 })
        );
    }

    #[test]
    fn test_shared_buffer_clones_share_state() {
        let shared = SharedBuffer::new(5, 5);
        let reader = shared.clone();
        shared.push(1u32);
        shared.push(2u32);
        assert_eq!(reader.snapshot(), vec![1, 2]);
        reader.clear();
        assert!(shared.is_empty());
    }
}
