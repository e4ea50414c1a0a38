//! The shared, versioned, lock-free(-in-the-sense-that-matters) latest-value registry that every
//! worker publishes to and reads from.
//!
//! A [`Slot<T>`] holds the current snapshot behind a [`parking_lot::RwLock`] and a monotonically
//! increasing [`AtomicU64`] version counter that readers poll without ever taking the lock. The
//! lock itself is only ever held for the duration of a pointer swap or an `Arc` clone — there is
//! no allocation, I/O, or blocking syscall under it, so in practice a reader never waits behind a
//! writer for longer than a few instructions. This is the same "shared-pointer + atomic-load"
//! shape as a hand-rolled `AtomicPtr` swap, built from a primitive already in the stack instead of
//! a hazard-pointer reclamation scheme written from scratch.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// A single published value together with the version it was published at.
///
/// Version lives inside the same `Arc` as the value so a reader can never observe a mismatched
/// (value, version) pair — only the fast-path [`Slot::version`] poll is a separate atomic, and it
/// is always a lower (or equal) bound on the version actually visible in `handle`.
#[derive(Debug)]
pub struct Snapshot<T> {
    pub value: Arc<T>,
    pub version: u64,
}

/// One named output slot: "the latest `T`, plus how many times it has changed".
pub struct Slot<T> {
    handle: RwLock<Option<Snapshot<T>>>,
    version: AtomicU64,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Slot {
            handle: RwLock::new(None),
            version: AtomicU64::new(0),
        }
    }
}

impl<T> Slot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the slot's value and increment its version. Never blocks for longer than a pointer
    /// swap; there is exactly one producer per slot, so this never contends with another writer.
    pub fn publish(&self, value: T) -> u64 {
        let version = self.version.load(Ordering::Relaxed) + 1;
        *self.handle.write() = Some(Snapshot {
            value: Arc::new(value),
            version,
        });
        self.version.store(version, Ordering::Release);
        version
    }

    /// Current version, readable without ever touching the value lock. The handle for this
    /// version (or a later one) is guaranteed to already be visible via [`Slot::snapshot`], since
    /// the handle is written before the version counter advances.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// The current snapshot (value + the version it was published at), if anything has been
    /// published yet. `snapshot.version` and `snapshot.value` always correspond to the same
    /// publish call.
    pub fn snapshot(&self) -> Option<Snapshot<T>> {
        self.handle.read().clone()
    }
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Snapshot {
            value: self.value.clone(),
            version: self.version,
        }
    }
}

/// Identifies one of the five pipeline stage outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Camera,
    Imu,
    Detection,
    Pf,
    Prediction,
}

/// The process-wide singleton registry: one [`Slot`] per stage output.
///
/// Cloning a `SharedLatest` clones the `Arc` handles inside, so every worker thread can hold its
/// own cheap clone of the same underlying slots.
#[derive(Clone)]
pub struct SharedLatest {
    camera: Arc<Slot<gimbal_types::CameraFrame>>,
    imu: Arc<Slot<gimbal_types::ImuState>>,
    detection: Arc<Slot<gimbal_types::RobotState>>,
    pf: Arc<Slot<gimbal_types::RobotState>>,
    prediction: Arc<Slot<gimbal_types::PredictionOut>>,
}

impl Default for SharedLatest {
    fn default() -> Self {
        SharedLatest {
            camera: Arc::new(Slot::new()),
            imu: Arc::new(Slot::new()),
            detection: Arc::new(Slot::new()),
            pf: Arc::new(Slot::new()),
            prediction: Arc::new(Slot::new()),
        }
    }
}

impl SharedLatest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn camera(&self) -> &Slot<gimbal_types::CameraFrame> {
        &self.camera
    }

    pub fn imu(&self) -> &Slot<gimbal_types::ImuState> {
        &self.imu
    }

    pub fn detection(&self) -> &Slot<gimbal_types::RobotState> {
        &self.detection
    }

    pub fn pf(&self) -> &Slot<gimbal_types::RobotState> {
        &self.pf
    }

    pub fn prediction(&self) -> &Slot<gimbal_types::PredictionOut> {
        &self.prediction
    }
}

/// Atomic scalars updated out-of-band (currently just `bullet_speed`, fed by USB RX).
///
/// Values are stored as bit-patterns of `f64` in an `AtomicU64` so reads/writes stay wait-free;
/// relaxed ordering is adequate per SPEC_FULL.md §5 ("approximate freshness is fine").
#[derive(Default)]
pub struct SharedScalars {
    bullet_speed_bits: AtomicU64,
}

impl SharedScalars {
    pub fn new(initial_bullet_speed: f64) -> Self {
        let s = SharedScalars::default();
        s.set_bullet_speed(initial_bullet_speed);
        s
    }

    pub fn bullet_speed(&self) -> f64 {
        f64::from_bits(self.bullet_speed_bits.load(Ordering::Relaxed))
    }

    pub fn set_bullet_speed(&self, v: f64) {
        self.bullet_speed_bits.store(v.to_bits(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn version_is_monotone_across_publishes() {
        let slot: Slot<u32> = Slot::new();
        assert_eq!(slot.version(), 0);
        assert_eq!(slot.publish(1), 1);
        assert_eq!(slot.publish(2), 2);
        assert_eq!(slot.version(), 2);
    }

    #[test]
    fn snapshot_reflects_latest_published_value() {
        let slot: Slot<&'static str> = Slot::new();
        assert!(slot.snapshot().is_none());
        slot.publish("first");
        let snap = slot.snapshot().unwrap();
        assert_eq!(*snap.value, "first");
        assert_eq!(snap.version, 1);
        slot.publish("second");
        let snap = slot.snapshot().unwrap();
        assert_eq!(*snap.value, "second");
        assert_eq!(snap.version, 2);
    }

    #[test]
    fn version_seen_by_concurrent_reader_never_decreases() {
        let slot: Arc<Slot<u64>> = Arc::new(Slot::new());
        let writer = {
            let slot = slot.clone();
            thread::spawn(move || {
                for i in 0..1000u64 {
                    slot.publish(i);
                }
            })
        };
        let reader = {
            let slot = slot.clone();
            thread::spawn(move || {
                let mut last = 0u64;
                for _ in 0..1000 {
                    let v = slot.version();
                    assert!(v >= last, "version went backwards: {v} < {last}");
                    last = v;
                }
            })
        };
        writer.join().unwrap();
        reader.join().unwrap();
    }

    #[test]
    fn shared_scalars_round_trip() {
        let scalars = SharedScalars::new(25.0);
        assert_eq!(scalars.bullet_speed(), 25.0);
        scalars.set_bullet_speed(28.5);
        assert_eq!(scalars.bullet_speed(), 28.5);
    }
}
