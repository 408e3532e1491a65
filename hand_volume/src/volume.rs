//! System volume behind the [`VolumeEndpoint`] seam.
//!
//! An endpoint exposes the mixer's dB range and a get/set pair for the
//! current level. The default build ships [`SimEndpoint`], an in-memory
//! mixer that only logs what it would do; the `alsa` feature swaps in
//! [`AlsaEndpoint`] driving the real Master control.
//!
//! [`VolumeControl`] layers policy on top: it snapshots the level at
//! startup, converts pinch distances to dB through a [`LevelMap`] spanning
//! the endpoint's own range, and can put the snapshot back exactly once at
//! shutdown.

use pinch_scale::{CalibrationBounds, LevelMap};

use crate::error::{Result, VolumeError};

// ════════════════════════════════════════════════════════════════════════════
// VolumeEndpoint trait
// ════════════════════════════════════════════════════════════════════════════

pub trait VolumeEndpoint {
    /// Inclusive (min, max) dB the device accepts.
    fn db_range(&self) -> (f32, f32);

    fn level_db(&self) -> std::result::Result<f32, VolumeError>;

    fn set_level_db(&mut self, db: f32) -> std::result::Result<(), VolumeError>;
}

/// Open the configured endpoint: the ALSA Master control with the `alsa`
/// feature, the logging simulation otherwise.
pub fn open_endpoint() -> std::result::Result<Box<dyn VolumeEndpoint>, VolumeError> {
    #[cfg(feature = "alsa")]
    {
        Ok(Box::new(AlsaEndpoint::open()?))
    }
    #[cfg(not(feature = "alsa"))]
    {
        log::info!("no alsa feature compiled in; volume changes are simulated");
        Ok(Box::new(SimEndpoint::new()))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SimEndpoint — in-memory mixer (default build)
// ════════════════════════════════════════════════════════════════════════════

/// Pretends to be a mixer with the usual endpoint span. Sets are clamped
/// to the range and logged so a default build still shows what it would
/// have done to the real device.
pub struct SimEndpoint {
    range: (f32, f32),
    db:    f32,
}

impl SimEndpoint {
    pub fn new() -> Self {
        SimEndpoint { range: (-65.25, 0.0), db: -20.0 }
    }
}

impl Default for SimEndpoint {
    fn default() -> Self {
        SimEndpoint::new()
    }
}

impl VolumeEndpoint for SimEndpoint {
    fn db_range(&self) -> (f32, f32) {
        self.range
    }

    fn level_db(&self) -> std::result::Result<f32, VolumeError> {
        Ok(self.db)
    }

    fn set_level_db(&mut self, db: f32) -> std::result::Result<(), VolumeError> {
        self.db = db.clamp(self.range.0, self.range.1);
        log::debug!("sim mixer set to {:.2} dB", self.db);
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// AlsaEndpoint — Master control (feature = "alsa")
// ════════════════════════════════════════════════════════════════════════════

/// Drives the `Master` simple element of the default ALSA card. `Selem`
/// borrows the mixer, so the element is looked up per call rather than
/// stored.
#[cfg(feature = "alsa")]
pub struct AlsaEndpoint {
    mixer:    alsa::mixer::Mixer,
    selem_id: alsa::mixer::SelemId,
    range:    (f32, f32),
}

#[cfg(feature = "alsa")]
impl AlsaEndpoint {
    pub fn open() -> std::result::Result<Self, VolumeError> {
        use alsa::mixer::{Mixer, SelemId};

        let mixer = Mixer::new("default", false)
            .map_err(|e| VolumeError::NoEndpoint(format!("mixer open: {}", e)))?;
        let selem_id = SelemId::new("Master", 0);

        let range = {
            let selem = mixer
                .find_selem(&selem_id)
                .ok_or_else(|| VolumeError::NoEndpoint("no Master control".into()))?;
            let (min, max) = selem.get_playback_db_range();
            (min.0 as f32 / 100.0, max.0 as f32 / 100.0)
        };
        log::info!("alsa Master range {:.2} dB to {:.2} dB", range.0, range.1);

        Ok(AlsaEndpoint { mixer, selem_id, range })
    }

    fn selem(&self) -> std::result::Result<alsa::mixer::Selem<'_>, VolumeError> {
        self.mixer
            .find_selem(&self.selem_id)
            .ok_or_else(|| VolumeError::NoEndpoint("Master control vanished".into()))
    }
}

#[cfg(feature = "alsa")]
impl VolumeEndpoint for AlsaEndpoint {
    fn db_range(&self) -> (f32, f32) {
        self.range
    }

    fn level_db(&self) -> std::result::Result<f32, VolumeError> {
        use alsa::mixer::SelemChannelId;

        let selem = self.selem()?;
        let mb = selem
            .get_playback_vol_db(SelemChannelId::FrontLeft)
            .map_err(|e| VolumeError::Read(e.to_string()))?;
        Ok(mb.0 as f32 / 100.0)
    }

    fn set_level_db(&mut self, db: f32) -> std::result::Result<(), VolumeError> {
        use alsa::mixer::MilliBel;
        use alsa::Round;

        let clamped = db.clamp(self.range.0, self.range.1);
        let selem = self.selem()?;
        selem
            .set_playback_db_all(MilliBel((clamped * 100.0).round() as i64), Round::Floor)
            .map_err(|e| VolumeError::Write(e.to_string()))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// VolumeControl — distance→dB policy plus baseline restore
// ════════════════════════════════════════════════════════════════════════════

pub struct VolumeControl {
    endpoint:    Box<dyn VolumeEndpoint>,
    map:         LevelMap,
    baseline_db: f32,
    restored:    bool,
}

impl VolumeControl {
    /// Snapshot the current level and build the distance→dB map over the
    /// endpoint's own range. Nothing is written to the device here.
    pub fn new(endpoint: Box<dyn VolumeEndpoint>, min_distance: f32, max_distance: f32) -> Result<Self> {
        let (db_min, db_max) = endpoint.db_range();
        let bounds = CalibrationBounds::new(min_distance, max_distance, db_min, db_max)?;
        let baseline_db = endpoint.level_db()?;
        log::info!(
            "volume baseline {:.2} dB; pinch {:.0}px..{:.0}px spans {:.2} dB..{:.2} dB",
            baseline_db, min_distance, max_distance, db_min, db_max
        );
        Ok(VolumeControl {
            endpoint,
            map: LevelMap::new(bounds),
            baseline_db,
            restored: false,
        })
    }

    /// Level the device held before we started steering it.
    pub fn baseline_db(&self) -> f32 {
        self.baseline_db
    }

    pub fn db_range(&self) -> (f32, f32) {
        self.endpoint.db_range()
    }

    /// dB that `distance` maps to, without touching the device.
    pub fn scaled_db(&self, distance: f32) -> f32 {
        self.map.level_for(distance)
    }

    /// Map a pinch distance to dB and apply it. Returns the dB written so
    /// the caller can show it.
    pub fn set_from_distance(&mut self, distance: f32) -> std::result::Result<f32, VolumeError> {
        let db = self.scaled_db(distance);
        self.endpoint.set_level_db(db)?;
        Ok(db)
    }

    /// Put the startup snapshot back. Later calls are no-ops, so shutdown
    /// paths can all call this without double-writing the device.
    pub fn restore_baseline(&mut self) -> std::result::Result<(), VolumeError> {
        if self.restored {
            return Ok(());
        }
        self.endpoint.set_level_db(self.baseline_db)?;
        self.restored = true;
        log::info!("volume restored to {:.2} dB", self.baseline_db);
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Endpoint double that records every write.
    struct RecordingEndpoint {
        range: (f32, f32),
        db:    f32,
        sets:  Rc<RefCell<Vec<f32>>>,
    }

    impl RecordingEndpoint {
        fn new(db: f32, sets: Rc<RefCell<Vec<f32>>>) -> Self {
            RecordingEndpoint { range: (-65.25, 0.0), db, sets }
        }
    }

    impl VolumeEndpoint for RecordingEndpoint {
        fn db_range(&self) -> (f32, f32) {
            self.range
        }

        fn level_db(&self) -> std::result::Result<f32, VolumeError> {
            Ok(self.db)
        }

        fn set_level_db(&mut self, db: f32) -> std::result::Result<(), VolumeError> {
            self.db = db;
            self.sets.borrow_mut().push(db);
            Ok(())
        }
    }

    fn control(baseline: f32) -> (VolumeControl, Rc<RefCell<Vec<f32>>>) {
        let sets = Rc::new(RefCell::new(Vec::new()));
        let endpoint = RecordingEndpoint::new(baseline, Rc::clone(&sets));
        let control = VolumeControl::new(Box::new(endpoint), 20.0, 200.0).unwrap();
        (control, sets)
    }

    #[test]
    fn construction_snapshots_baseline_without_writing() {
        let (control, sets) = control(-17.5);
        assert_eq!(control.baseline_db(), -17.5);
        assert!(sets.borrow().is_empty());
    }

    #[test]
    fn distance_extremes_hit_the_range_ends() {
        let (mut control, _sets) = control(-20.0);
        assert_eq!(control.set_from_distance(20.0).unwrap(), -65.25);
        assert_eq!(control.set_from_distance(200.0).unwrap(), 0.0);
    }

    #[test]
    fn distance_midpoint_lands_mid_range() {
        let (mut control, _sets) = control(-20.0);
        let db = control.set_from_distance(110.0).unwrap();
        assert!((db - (-32.625)).abs() < 1e-4);
    }

    #[test]
    fn out_of_band_distances_clamp() {
        let (mut control, _sets) = control(-20.0);
        assert_eq!(control.set_from_distance(5.0).unwrap(), -65.25);
        assert_eq!(control.set_from_distance(500.0).unwrap(), 0.0);
    }

    #[test]
    fn scaled_db_computes_without_writing() {
        let (control, sets) = control(-20.0);
        assert_eq!(control.scaled_db(200.0), 0.0);
        assert_eq!(control.scaled_db(20.0), -65.25);
        assert!(sets.borrow().is_empty());
    }

    #[test]
    fn restore_writes_baseline_exactly_once() {
        let (mut control, sets) = control(-12.0);
        control.set_from_distance(110.0).unwrap();
        control.restore_baseline().unwrap();
        control.restore_baseline().unwrap();
        control.restore_baseline().unwrap();

        let written = sets.borrow();
        assert_eq!(written.len(), 2);
        assert_eq!(*written.last().unwrap(), -12.0);
    }

    #[test]
    fn bad_distance_bounds_are_rejected() {
        let sets = Rc::new(RefCell::new(Vec::new()));
        let endpoint = RecordingEndpoint::new(-20.0, sets);
        assert!(VolumeControl::new(Box::new(endpoint), 200.0, 20.0).is_err());
    }

    #[test]
    fn sim_endpoint_clamps_to_its_range() {
        let mut sim = SimEndpoint::new();
        sim.set_level_db(10.0).unwrap();
        assert_eq!(sim.level_db().unwrap(), 0.0);
        sim.set_level_db(-100.0).unwrap();
        assert_eq!(sim.level_db().unwrap(), -65.25);
    }
}
