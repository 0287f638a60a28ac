use anyhow::{anyhow, Result};

use crate::archive::{PersistenceSink, SavedArtifact};
use crate::capture::policy::CapturePolicy;
use crate::capture::state::{CachedHit, CaptureState};
use crate::detect::Detect;
use crate::error::SentinelError;
use crate::frame::Frame;
use crate::storage::CounterStore;

/// What happened to one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Rejected by the rate gate.
    Dropped,
    /// Rejected because the controller is paused.
    Paused,
    /// The detector failed on this frame; nothing else changed.
    InferenceFailed,
    /// Processed, but no allowed class was detected.
    NoHit,
    /// A hit replaced the cached one; the save quota is not yet due.
    Cached,
    Saved(SavedArtifact),
}

/// Running counters, reported by the health log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControllerStats {
    pub frames_seen: u64,
    pub frames_dropped: u64,
    pub frames_processed: u64,
    pub hits: u64,
    pub saves: u64,
    pub inference_failures: u64,
}

/// Rate gate, latest-hit cache and save quota in front of a detector.
///
/// Frames are handled strictly one at a time. A persistence failure halts the
/// controller: every later call to [`AdmissionController::on_frame`] fails.
pub struct AdmissionController<D, S, C> {
    detector: D,
    sink: S,
    store: C,
    policy: CapturePolicy,
    state: CaptureState,
    stats: ControllerStats,
    paused: bool,
    halted: bool,
}

impl<D, S, C> AdmissionController<D, S, C>
where
    D: Detect,
    S: PersistenceSink,
    C: CounterStore,
{
    /// Load the durable last-save timestamp and build the controller.
    pub fn open(detector: D, sink: S, mut store: C, policy: CapturePolicy) -> Result<Self> {
        let last_save_ms = store
            .load_last_save()
            .map_err(|e| SentinelError::persistence(format!("failed to load last save: {:#}", e)))?;
        log::info!(
            "admission controller ready: frame_interval={}ms save_interval={}ms last_save={} allow={:?}",
            policy.frame_interval_ms,
            policy.save_interval_ms,
            last_save_ms,
            policy.allow_list.names()
        );
        Ok(Self {
            detector,
            sink,
            store,
            policy,
            state: CaptureState::new(last_save_ms),
            stats: ControllerStats::default(),
            paused: false,
            halted: false,
        })
    }

    /// Run one frame through gate, detector, cache and quota.
    ///
    /// Returns an error only for fatal conditions: persistence failures and
    /// detector errors that are not classified as transient.
    pub fn on_frame(&mut self, frame: Frame) -> Result<FrameOutcome> {
        if self.halted {
            return Err(SentinelError::persistence(
                "controller halted after an earlier persistence failure",
            ));
        }
        self.stats.frames_seen += 1;

        if self.paused {
            self.stats.frames_dropped += 1;
            return Ok(FrameOutcome::Paused);
        }

        let t = frame.timestamp_ms;
        if !self.state.admit(t, self.policy.frame_interval_ms) {
            self.stats.frames_dropped += 1;
            return Ok(FrameOutcome::Dropped);
        }
        self.stats.frames_processed += 1;

        let detections = match self.detector.detect(&frame) {
            Ok(detections) => detections,
            Err(e) if !SentinelError::error_is_fatal(&e) => {
                self.stats.inference_failures += 1;
                log::warn!("frame {} skipped: {:#}", t, e);
                return Ok(FrameOutcome::InferenceFailed);
            }
            Err(e) => return Err(e),
        };

        let hits = self.policy.allow_list.filter(detections);
        let is_hit = !hits.is_empty();
        if is_hit {
            self.stats.hits += 1;
            log::info!(
                "hit at {}: {}",
                t,
                hits.iter()
                    .map(|d| format!("{}({:.2})", d.class_name(), d.confidence()))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            self.state.cache_hit(frame, hits);
        }

        // The quota runs on every processed frame, hit or not.
        if self.state.save_due(t, self.policy.save_interval_ms) {
            if let Some(hit) = self.state.take_hit() {
                return self.persist(hit, t).map(FrameOutcome::Saved);
            }
        }
        Ok(if is_hit {
            FrameOutcome::Cached
        } else {
            FrameOutcome::NoHit
        })
    }

    fn persist(&mut self, hit: CachedHit, t: u64) -> Result<SavedArtifact> {
        let artifact = match self.sink.save(&hit.frame, &hit.detections) {
            Ok(artifact) => artifact,
            Err(e) => {
                self.halted = true;
                log::error!("failed to save capture from frame {}: {:#}", t, e);
                return Err(SentinelError::persistence(format!(
                    "failed to save capture: {:#}",
                    e
                )));
            }
        };
        if let Err(e) = self.store.store_last_save(t) {
            self.halted = true;
            log::error!("failed to record last save {}: {:#}", t, e);
            return Err(SentinelError::persistence(format!(
                "failed to record last save: {:#}",
                e
            )));
        }
        self.state.record_save(t);
        self.stats.saves += 1;
        log::info!(
            "saved {} ({} detections)",
            artifact.image_path.display(),
            artifact.detections
        );
        Ok(artifact)
    }

    /// Forget the cached hit. Counters and the last-save time are kept.
    pub fn reset(&mut self) {
        if self.state.take_hit().is_some() {
            log::info!("cached hit cleared");
        }
    }

    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            log::info!("admission controller paused");
        }
    }

    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            log::info!("admission controller resumed");
        }
    }

    /// Swap the policy. Only allowed while paused.
    pub fn reload_policy(&mut self, policy: CapturePolicy) -> Result<()> {
        if !self.paused {
            return Err(anyhow!("policy reload requires a paused controller"));
        }
        log::info!(
            "policy reloaded: frame_interval={}ms save_interval={}ms allow={:?}",
            policy.frame_interval_ms,
            policy.save_interval_ms,
            policy.allow_list.names()
        );
        self.policy = policy;
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn policy(&self) -> &CapturePolicy {
        &self.policy
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn stats(&self) -> ControllerStats {
        self.stats
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn store(&self) -> &C {
        &self.store
    }

    /// Tear down, handing back the collaborators.
    pub fn into_parts(self) -> (D, S, C) {
        (self.detector, self.sink, self.store)
    }
}
