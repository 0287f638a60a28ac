use crate::detect::Detection;
use crate::frame::Frame;

/// A frame that produced at least one allowed detection.
#[derive(Debug)]
pub struct CachedHit {
    pub frame: Frame,
    pub detections: Vec<Detection>,
}

impl CachedHit {
    pub fn timestamp_ms(&self) -> u64 {
        self.frame.timestamp_ms
    }
}

/// Mutable state owned by one admission controller.
///
/// Only `last_save_ms` is durable; the controller mirrors it into the
/// counter store after every save.
#[derive(Debug, Default)]
pub struct CaptureState {
    last_save_ms: u64,
    last_processed_ms: Option<u64>,
    cached_hit: Option<CachedHit>,
}

impl CaptureState {
    pub fn new(last_save_ms: u64) -> Self {
        Self {
            last_save_ms,
            last_processed_ms: None,
            cached_hit: None,
        }
    }

    pub fn cached_hit(&self) -> Option<&CachedHit> {
        self.cached_hit.as_ref()
    }

    /// Replace whatever is cached. The newest hit always wins.
    pub fn cache_hit(&mut self, frame: Frame, detections: Vec<Detection>) -> Option<CachedHit> {
        self.cached_hit.replace(CachedHit { frame, detections })
    }

    pub fn take_hit(&mut self) -> Option<CachedHit> {
        self.cached_hit.take()
    }

    pub fn last_save_ms(&self) -> u64 {
        self.last_save_ms
    }

    pub fn last_processed_ms(&self) -> Option<u64> {
        self.last_processed_ms
    }

    /// Move the quota clock. Callers must have made the write durable first.
    pub(crate) fn record_save(&mut self, timestamp_ms: u64) {
        self.last_save_ms = timestamp_ms;
    }

    /// Admit or drop a frame at `timestamp_ms`.
    ///
    /// The first frame is always admitted. A timestamp earlier than the last
    /// admitted one is treated as zero elapsed time.
    pub fn admit(&mut self, timestamp_ms: u64, frame_interval_ms: u64) -> bool {
        if let Some(last) = self.last_processed_ms {
            if timestamp_ms.saturating_sub(last) < frame_interval_ms {
                return false;
            }
        }
        self.last_processed_ms = Some(timestamp_ms);
        true
    }

    pub fn save_due(&self, timestamp_ms: u64, save_interval_ms: u64) -> bool {
        timestamp_ms.saturating_sub(self.last_save_ms) >= save_interval_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_gate_admits_first_frame_then_spaces() {
        let mut state = CaptureState::default();
        let admitted: Vec<u64> = [0u64, 50, 100, 150, 200]
            .into_iter()
            .filter(|t| state.admit(*t, 100))
            .collect();
        assert_eq!(admitted, vec![0, 100, 200]);
        assert_eq!(state.last_processed_ms(), Some(200));
    }

    #[test]
    fn backwards_clock_does_not_admit() {
        let mut state = CaptureState::default();
        assert!(state.admit(10_000, 100));
        assert!(!state.admit(9_000, 100));
        assert_eq!(state.last_processed_ms(), Some(10_000));
    }

    #[test]
    fn latest_hit_wins() {
        let mut state = CaptureState::new(0);
        let det = Detection::from_center(0.5, 0.5, 0.1, 0.1, 0.9, 0, "person");
        assert!(state.cache_hit(Frame::filled(2, 2, [0, 0, 0], 1), vec![det.clone()]).is_none());
        let previous = state.cache_hit(Frame::filled(2, 2, [0, 0, 0], 2), vec![det]);
        assert_eq!(previous.map(|h| h.timestamp_ms()), Some(1));
        assert_eq!(state.cached_hit().map(CachedHit::timestamp_ms), Some(2));
        assert_eq!(state.take_hit().map(|h| h.timestamp_ms()), Some(2));
        assert!(state.take_hit().is_none());
    }

    #[test]
    fn save_due_uses_elapsed_since_last_save() {
        let state = CaptureState::new(1_000);
        assert!(!state.save_due(1_999, 1_000));
        assert!(state.save_due(2_000, 1_000));
        assert!(!state.save_due(500, 1_000));
    }

    #[test]
    fn record_save_moves_quota_clock() {
        let mut state = CaptureState::new(1_000);
        state.record_save(5_000);
        assert_eq!(state.last_save_ms(), 5_000);
        assert!(!state.save_due(5_999, 1_000));
    }
}
