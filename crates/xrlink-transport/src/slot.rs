//! Single-slot mailbox
//!
//! Holds at most one value. A write always replaces whatever is there and
//! never blocks the producer; the displaced value is handed back so the
//! caller can count it.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Overwrite-on-write, depth-one buffer
#[derive(Debug)]
pub struct LatestSlot<T> {
    value: Mutex<Option<T>>,
    notify: Notify,
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            value: Mutex::new(None),
            notify: Notify::new(),
        }
    }

    /// Store `value`, returning the one it displaced
    pub fn put(&self, value: T) -> Option<T> {
        let displaced = self.value.lock().replace(value);
        self.notify.notify_one();
        displaced
    }

    pub fn take(&self) -> Option<T> {
        self.value.lock().take()
    }

    pub fn is_empty(&self) -> bool {
        self.value.lock().is_none()
    }

    pub fn clear(&self) {
        self.value.lock().take();
    }

    /// Take the value, waiting up to `timeout` for one to arrive
    pub async fn wait_take(&self, timeout: Duration) -> Option<T> {
        if let Some(v) = self.take() {
            return Some(v);
        }
        // a put racing this point leaves a permit, so the wait returns at once
        let _ = tokio::time::timeout(timeout, self.notify.notified()).await;
        self.take()
    }
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> LatestSlot<T> {
    /// Copy of the current value, leaving it in place
    pub fn latest(&self) -> Option<T> {
        self.value.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_put_replaces() {
        let slot = LatestSlot::new();
        assert_eq!(slot.put(1), None);
        assert_eq!(slot.put(2), Some(1));
        assert_eq!(slot.put(3), Some(2));
        assert_eq!(slot.take(), Some(3));
        assert!(slot.is_empty());
    }

    #[test]
    fn test_latest_does_not_consume() {
        let slot = LatestSlot::new();
        slot.put("a");
        assert_eq!(slot.latest(), Some("a"));
        assert_eq!(slot.latest(), Some("a"));
        slot.clear();
        assert_eq!(slot.latest(), None);
    }

    #[tokio::test]
    async fn test_wait_take_times_out_empty() {
        let slot: LatestSlot<u8> = LatestSlot::new();
        assert_eq!(slot.wait_take(Duration::from_millis(10)).await, None);
    }

    #[tokio::test]
    async fn test_wait_take_wakes_on_put() {
        let slot = Arc::new(LatestSlot::new());
        let producer = Arc::clone(&slot);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.put(7u32);
        });
        assert_eq!(slot.wait_take(Duration::from_secs(5)).await, Some(7));
    }
}
