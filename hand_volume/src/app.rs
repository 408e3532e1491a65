//! Per-frame pipeline and application loop.
//!
//! `App` owns the frame source, the hand tracker, and the volume control,
//! and advances capture → detect → map → apply one frame at a time. The OS
//! window stays outside `App`, so the whole pipeline runs under tests with
//! scripted parts; `run()` is the thin layer that wires `App` to a real
//! `Visualizer` and keeps stepping until the user quits.

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;

use crate::capture::{self, FrameSource};
use crate::detector::{self, HandBackend, HandTracker, PointerSample, SharedPointer};
use crate::error::{CaptureError, DetectError, Result, VolumeError};
use crate::frame::Frame;
use crate::visualizer::Visualizer;
use crate::volume::{self, VolumeControl, VolumeEndpoint};

// ════════════════════════════════════════════════════════════════════════════
// Overlay constants
// ════════════════════════════════════════════════════════════════════════════

const MARKER_COLOR:   u32 = 0xFFFF00FF;  // magenta
const HUD_COLOR:      u32 = 0xFF00FF00;
const LEGEND_COLOR:   u32 = 0xFF888888;
const MARKER_RADIUS:  i32 = 10;
const LINE_THICKNESS: i32 = 2;
const HUD_SCALE:    usize = 2;

#[cfg(feature = "mediapipe")]
const LEGEND: &str = "Pinch thumb+index=volume  Q/Esc=quit";
#[cfg(not(feature = "mediapipe"))]
const LEGEND: &str = "Mouse=pinch  H=hide hand  Q/Esc=quit";

// ════════════════════════════════════════════════════════════════════════════
// AppConfig
// ════════════════════════════════════════════════════════════════════════════

/// Configuration for the full application.
pub struct AppConfig {
    pub device:       u32,
    pub width:        usize,
    pub height:       usize,
    /// Pinch distance (px) that maps to the bottom of the mixer's range.
    pub min_distance: f32,
    /// Pinch distance (px) that maps to the top of the mixer's range.
    pub max_distance: f32,
    /// Put the mixer back to its startup level when the run ends.
    pub reset_volume: bool,
    /// Hand-landmark worker script (used by the `mediapipe` build).
    pub worker:       PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            device:       0,
            width:        640,
            height:       480,
            min_distance: 20.0,
            max_distance: 200.0,
            reset_volume: false,
            worker:       PathBuf::from("scripts/hands_worker.py"),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Run state
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState { Starting, Running, Stopping, Stopped }

// ════════════════════════════════════════════════════════════════════════════
// FpsCounter
// ════════════════════════════════════════════════════════════════════════════

/// Instantaneous frame rate from the gap between consecutive ticks.
pub struct FpsCounter {
    last: Option<Instant>,
    fps:  u32,
}

impl FpsCounter {
    pub fn new() -> Self {
        FpsCounter { last: None, fps: 0 }
    }

    /// A zero gap (duplicate timestamp) keeps the previous reading rather
    /// than dividing by it.
    pub fn tick(&mut self, now: Instant) -> u32 {
        if let Some(prev) = self.last {
            let dt = now.duration_since(prev).as_secs_f32();
            if dt > 0.0 {
                self.fps = (1.0 / dt).round() as u32;
            }
        }
        self.last = Some(now);
        self.fps
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        FpsCounter::new()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// App
// ════════════════════════════════════════════════════════════════════════════

pub struct App {
    // ── pipeline stages ──────────────────────────────────────────────────
    source:  Box<dyn FrameSource>,
    tracker: HandTracker,
    volume:  VolumeControl,

    // ── loop state ───────────────────────────────────────────────────────
    state:    RunState,
    fps:      FpsCounter,
    /// Last dB written, or the baseline while nothing is steering. This is
    /// what the HUD shows, so it never goes stale between hands.
    shown_db: f32,
}

impl App {
    /// Open every backend named in `cfg`. Failures here abort before the
    /// mixer has been written to.
    pub fn start(cfg: &AppConfig, pointer: SharedPointer) -> Result<Self> {
        App::assemble(
            || capture::open_source(cfg.device, cfg.width, cfg.height),
            || detector::open_backend(pointer, &cfg.worker),
            volume::open_endpoint,
            cfg.min_distance,
            cfg.max_distance,
        )
    }

    /// Stage the pipeline in capture → detect → apply order. The stages
    /// arrive as openers rather than values, so an early failure returns
    /// before any later device is touched.
    fn assemble(
        open_source: impl FnOnce() -> std::result::Result<Box<dyn FrameSource>, CaptureError>,
        open_backend: impl FnOnce() -> std::result::Result<Box<dyn HandBackend>, DetectError>,
        open_endpoint: impl FnOnce() -> std::result::Result<Box<dyn VolumeEndpoint>, VolumeError>,
        min_distance: f32,
        max_distance: f32,
    ) -> Result<Self> {
        let source   = open_source()?;
        let backend  = open_backend()?;
        let endpoint = open_endpoint()?;
        let volume   = VolumeControl::new(endpoint, min_distance, max_distance)?;
        Ok(App::with_parts(source, HandTracker::new(backend), volume))
    }

    /// Assemble from already-built parts. Tests use this with scripted
    /// sources and endpoints.
    pub fn with_parts(
        source:  Box<dyn FrameSource>,
        tracker: HandTracker,
        volume:  VolumeControl,
    ) -> Self {
        let shown_db = volume.baseline_db();
        App {
            source,
            tracker,
            volume,
            state: RunState::Starting,
            fps:   FpsCounter::new(),
            shown_db,
        }
    }

    /// Advance the pipeline one frame. `Ok(None)` means the frame read
    /// failed and was skipped; the caller simply tries again next cycle.
    pub fn step_frame(&mut self, now: Instant) -> Result<Option<Frame>> {
        if self.state == RunState::Starting {
            self.state = RunState::Running;
            log::debug!("first frame requested; pipeline running");
        }

        // 1. Acquire. A failed read is the one recoverable error.
        let mut frame = match self.source.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("frame skipped: {}", e);
                return Ok(None);
            }
        };

        // 2. Detect and overlay the skeleton.
        self.tracker.draw_hands(&mut frame)?;

        // 3. Map the pinch to dB and steer the mixer.
        if let Some(set) = self.tracker.positions() {
            let thumb = set.thumb_tip();
            let index = set.index_tip();
            frame.circle_filled(thumb, MARKER_RADIUS, MARKER_COLOR);
            frame.circle_filled(index, MARKER_RADIUS, MARKER_COLOR);
            frame.line(thumb, index, LINE_THICKNESS, MARKER_COLOR);
            self.shown_db = self.volume.set_from_distance(thumb.distance_to(index))?;
        }

        // 4. HUD.
        let fps = self.fps.tick(now);
        self.draw_hud(&mut frame, fps);

        Ok(Some(frame))
    }

    fn draw_hud(&self, frame: &mut Frame, fps: u32) {
        frame.draw_label(&format!("FPS: {}", fps), 10, 30, HUD_SCALE, HUD_COLOR);
        frame.draw_label(&format!("VOL: {:.1} DB", self.shown_db), 10, 60, HUD_SCALE, HUD_COLOR);
        let legend_y = frame.height.saturating_sub(16);
        frame.draw_label(LEGEND, 10, legend_y, 1, LEGEND_COLOR);
    }

    pub fn request_stop(&mut self) {
        if matches!(self.state, RunState::Starting | RunState::Running) {
            self.state = RunState::Stopping;
        }
    }

    /// Release the capture device and, when asked, put the mixer back to
    /// its startup level. Later calls are no-ops, so every exit path can
    /// run this unconditionally.
    pub fn shutdown(&mut self, reset_volume: bool) {
        if self.state == RunState::Stopped {
            return;
        }
        self.source.release();
        if reset_volume {
            if let Err(e) = self.volume.restore_baseline() {
                log::error!("volume restore failed: {}", e);
            }
        }
        self.state = RunState::Stopped;
        log::info!("pipeline stopped");
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn state(&self)    -> RunState { self.state }
    pub fn shown_db(&self) -> f32      { self.shown_db }

    /// (width, height) of the frames the source actually produces, which
    /// under a real camera can differ from the requested size.
    pub fn frame_dimensions(&self) -> (usize, usize) {
        self.source.dimensions()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// run() — the main application loop
// ════════════════════════════════════════════════════════════════════════════

/// Run the full application.
///
/// This is the entry point called from `main.rs`. It creates the window,
/// opens the configured backends (simulations by default, hardware with the
/// `camera`/`mediapipe`/`alsa` features), and drives the frame loop until
/// the user quits or a fatal error lands. Teardown runs on every way out.
pub fn run(cfg: AppConfig) -> Result<()> {
    let pointer: SharedPointer = Rc::new(Cell::new(PointerSample::default()));

    // Window first: a display failure aborts before any device is opened.
    let mut vis = Visualizer::new(cfg.width, cfg.height, Rc::clone(&pointer))?;
    let mut app = App::start(&cfg, pointer)?;

    // The source may have negotiated a different format than requested;
    // mouse samples must land in frame coordinates, not window pixels.
    vis.set_frame_size(app.frame_dimensions());

    let outcome = frame_loop(&mut vis, &mut app);
    app.shutdown(cfg.reset_volume);
    outcome
}

fn frame_loop(vis: &mut Visualizer, app: &mut App) -> Result<()> {
    while vis.is_open() && app.state() != RunState::Stopping {
        // 1. Inputs. Q, Escape, or closing the window end the run.
        if !vis.poll_input() {
            app.request_stop();
            break;
        }

        // 2. Advance the pipeline; 3. present. A skipped frame still pumps
        //    the window so input keeps flowing.
        match app.step_frame(Instant::now())? {
            Some(frame) => vis.present(&frame)?,
            None        => vis.pump(),
        }
    }
    app.request_stop();
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::time::Duration;

    use pinch_scale::Point;

    use crate::detector::{landmarks, LandmarkSet};
    use crate::error::AppError;

    // ── scripted doubles ──────────────────────────────────────────────────

    struct ScriptedSource {
        w:         usize,
        h:         usize,
        fail_next: bool,
        releases:  Rc<Cell<usize>>,
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self) -> std::result::Result<Frame, CaptureError> {
            if self.fail_next {
                self.fail_next = false;
                return Err(CaptureError::Read("scripted failure".into()));
            }
            Ok(Frame::filled(self.w, self.h, 0xFF101010))
        }

        fn dimensions(&self) -> (usize, usize) {
            (self.w, self.h)
        }

        fn release(&mut self) {
            self.releases.set(self.releases.get() + 1);
        }
    }

    /// One pinch distance per frame; `None` entries (and exhaustion) mean
    /// no hand that frame.
    struct ScriptedBackend {
        script: Vec<Option<f32>>,
        at:     usize,
        fail:   bool,
    }

    impl HandBackend for ScriptedBackend {
        fn detect(
            &mut self,
            frame: &Frame,
        ) -> std::result::Result<Option<LandmarkSet>, DetectError> {
            if self.fail {
                return Err(DetectError::Inference("scripted failure".into()));
            }
            let entry = self.script.get(self.at).copied().flatten();
            self.at += 1;
            Ok(entry.map(|d| hand_with_pinch(frame, d)))
        }
    }

    fn hand_with_pinch(frame: &Frame, distance: f32) -> LandmarkSet {
        let cx = frame.width as f32 / 2.0;
        let cy = frame.height as f32 / 2.0;
        let mut pts = [Point::new(cx, cy); 21];
        pts[landmarks::INDEX_FINGER_TIP] = Point::new(cx + distance, cy);
        LandmarkSet::new(pts)
    }

    struct RecordingEndpoint {
        db:   f32,
        sets: Rc<RefCell<Vec<f32>>>,
    }

    impl VolumeEndpoint for RecordingEndpoint {
        fn db_range(&self) -> (f32, f32) {
            (-65.25, 0.0)
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

    struct Harness {
        app:      App,
        sets:     Rc<RefCell<Vec<f32>>>,
        releases: Rc<Cell<usize>>,
    }

    fn make_app(script: Vec<Option<f32>>) -> Harness {
        make_app_with(script, false, false)
    }

    fn make_app_with(script: Vec<Option<f32>>, fail_first_read: bool, fail_detect: bool) -> Harness {
        let sets = Rc::new(RefCell::new(Vec::new()));
        let releases = Rc::new(Cell::new(0));
        let source = ScriptedSource {
            w: 640,
            h: 480,
            fail_next: fail_first_read,
            releases: Rc::clone(&releases),
        };
        let backend = ScriptedBackend { script, at: 0, fail: fail_detect };
        let endpoint = RecordingEndpoint { db: -12.0, sets: Rc::clone(&sets) };
        let volume = VolumeControl::new(Box::new(endpoint), 20.0, 200.0).unwrap();
        let app = App::with_parts(Box::new(source), HandTracker::new(Box::new(backend)), volume);
        Harness { app, sets, releases }
    }

    // ── tests ─────────────────────────────────────────────────────────────

    #[test]
    fn first_step_moves_starting_to_running() {
        let mut h = make_app(vec![Some(110.0)]);
        assert_eq!(h.app.state(), RunState::Starting);
        h.app.step_frame(Instant::now()).unwrap();
        assert_eq!(h.app.state(), RunState::Running);
    }

    #[test]
    fn failed_camera_open_aborts_before_the_mixer_is_touched() {
        let endpoint_opened = Rc::new(Cell::new(false));
        let opened = Rc::clone(&endpoint_opened);

        let result = App::assemble(
            || Err(CaptureError::Open { index: 0, reason: "no such device".into() }),
            || Ok(Box::new(ScriptedBackend { script: Vec::new(), at: 0, fail: false })),
            move || {
                opened.set(true);
                let sets = Rc::new(RefCell::new(Vec::new()));
                Ok(Box::new(RecordingEndpoint { db: -12.0, sets }))
            },
            20.0,
            200.0,
        );

        assert!(matches!(result, Err(AppError::Capture(_))));
        assert!(!endpoint_opened.get());
    }

    #[test]
    fn frame_dimensions_come_from_the_source() {
        let h = make_app(Vec::new());
        assert_eq!(h.app.frame_dimensions(), (640, 480));
    }

    #[test]
    fn pinch_distance_drives_the_mixer() {
        let mut h = make_app(vec![Some(20.0), Some(200.0), Some(110.0)]);
        for _ in 0..3 {
            h.app.step_frame(Instant::now()).unwrap();
        }
        let sets = h.sets.borrow();
        assert_eq!(sets[0], -65.25);
        assert_eq!(sets[1], 0.0);
        assert!((sets[2] - (-32.625)).abs() < 1e-4);
    }

    #[test]
    fn no_hand_leaves_the_mixer_alone() {
        let mut h = make_app(vec![None, None]);
        h.app.step_frame(Instant::now()).unwrap();
        h.app.step_frame(Instant::now()).unwrap();
        assert!(h.sets.borrow().is_empty());
        assert_eq!(h.app.shown_db(), -12.0);
    }

    #[test]
    fn hud_retains_last_level_after_hand_leaves() {
        let mut h = make_app(vec![Some(200.0), None]);
        h.app.step_frame(Instant::now()).unwrap();
        assert_eq!(h.app.shown_db(), 0.0);
        h.app.step_frame(Instant::now()).unwrap();
        assert_eq!(h.app.shown_db(), 0.0);
        assert_eq!(h.sets.borrow().len(), 1);
    }

    #[test]
    fn failed_read_skips_the_frame() {
        let mut h = make_app_with(vec![Some(110.0)], true, false);
        assert!(h.app.step_frame(Instant::now()).unwrap().is_none());
        assert!(h.app.step_frame(Instant::now()).unwrap().is_some());
    }

    #[test]
    fn detect_failure_is_fatal_but_shutdown_still_restores() {
        let mut h = make_app_with(vec![Some(110.0)], false, true);
        assert!(h.app.step_frame(Instant::now()).is_err());
        h.app.shutdown(true);
        assert_eq!(h.releases.get(), 1);
        assert_eq!(*h.sets.borrow().last().unwrap(), -12.0);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut h = make_app(vec![Some(20.0)]);
        h.app.step_frame(Instant::now()).unwrap();
        h.app.shutdown(true);
        h.app.shutdown(true);
        h.app.shutdown(true);
        assert_eq!(h.releases.get(), 1);
        // One steering write plus exactly one restore.
        assert_eq!(h.sets.borrow().len(), 2);
        assert_eq!(*h.sets.borrow().last().unwrap(), -12.0);
        assert_eq!(h.app.state(), RunState::Stopped);
    }

    #[test]
    fn shutdown_without_reset_keeps_the_level() {
        let mut h = make_app(vec![Some(200.0)]);
        h.app.step_frame(Instant::now()).unwrap();
        h.app.shutdown(false);
        assert_eq!(h.sets.borrow().len(), 1);
        assert_eq!(h.releases.get(), 1);
    }

    #[test]
    fn request_stop_moves_running_to_stopping() {
        let mut h = make_app(vec![Some(110.0)]);
        h.app.step_frame(Instant::now()).unwrap();
        h.app.request_stop();
        assert_eq!(h.app.state(), RunState::Stopping);
    }

    #[test]
    fn markers_paint_the_frame_when_a_hand_is_seen() {
        let mut h = make_app(vec![Some(110.0), None]);
        let with_hand = h.app.step_frame(Instant::now()).unwrap().unwrap();
        assert!(with_hand.pixels.contains(&MARKER_COLOR));
        let without = h.app.step_frame(Instant::now()).unwrap().unwrap();
        assert!(!without.pixels.contains(&MARKER_COLOR));
    }

    #[test]
    fn fps_counter_reports_inverse_gap_and_guards_zero() {
        let mut fps = FpsCounter::new();
        let t0 = Instant::now();
        assert_eq!(fps.tick(t0), 0);
        let t1 = t0 + Duration::from_millis(100);
        assert_eq!(fps.tick(t1), 10);
        // A repeated timestamp keeps the previous reading.
        assert_eq!(fps.tick(t1), 10);
    }
}
