//! Hand-landmark acquisition behind the [`HandBackend`] seam.
//!
//! A backend looks at one frame and reports at most one hand as 21 pixel-
//! space landmarks. "No hand visible" is an ordinary `Ok(None)`, never an
//! error. The default build ships [`SimBackend`], which synthesizes a hand
//! from the window's mouse pointer; the `mediapipe` feature swaps in
//! [`MediaPipeBackend`], which runs real inference in a worker process.
//!
//! [`HandTracker`] wraps a backend with the draw-then-read surface the loop
//! uses: `draw_hands` runs inference once per frame and paints the skeleton,
//! `positions` reads that frame's cached result.

use std::cell::Cell;
use std::rc::Rc;

use pinch_scale::Point;

use crate::error::DetectError;
use crate::frame::Frame;

/// Landmark indices (MediaPipe hand model convention).
#[allow(dead_code)]
pub mod landmarks {
    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_FINGER_MCP: usize = 5;
    pub const INDEX_FINGER_PIP: usize = 6;
    pub const INDEX_FINGER_DIP: usize = 7;
    pub const INDEX_FINGER_TIP: usize = 8;
    pub const MIDDLE_FINGER_MCP: usize = 9;
    pub const MIDDLE_FINGER_PIP: usize = 10;
    pub const MIDDLE_FINGER_DIP: usize = 11;
    pub const MIDDLE_FINGER_TIP: usize = 12;
    pub const RING_FINGER_MCP: usize = 13;
    pub const RING_FINGER_PIP: usize = 14;
    pub const RING_FINGER_DIP: usize = 15;
    pub const RING_FINGER_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_DIP: usize = 19;
    pub const PINKY_TIP: usize = 20;
}

/// Bone list for the skeleton overlay.
const CONNECTIONS: &[(usize, usize)] = &[
    (0, 1), (1, 2), (2, 3), (3, 4),             // thumb
    (0, 5), (5, 6), (6, 7), (7, 8),             // index
    (5, 9), (9, 10), (10, 11), (11, 12),        // middle
    (9, 13), (13, 14), (14, 15), (15, 16),      // ring
    (13, 17), (17, 18), (18, 19), (19, 20),     // pinky
    (0, 17),                                    // palm edge
];

const BONE_COLOR: u32 = 0xFF888888;
const JOINT_COLOR: u32 = 0xFFAADDFF;

// ════════════════════════════════════════════════════════════════════════════
// LandmarkSet
// ════════════════════════════════════════════════════════════════════════════

/// All 21 landmarks of one detected hand, in frame pixel coordinates.
#[derive(Clone, Debug)]
pub struct LandmarkSet {
    points: [Point; 21],
}

impl LandmarkSet {
    pub fn new(points: [Point; 21]) -> Self {
        LandmarkSet { points }
    }

    pub fn point(&self, index: usize) -> Option<Point> {
        self.points.get(index).copied()
    }

    pub fn thumb_tip(&self) -> Point {
        self.points[landmarks::THUMB_TIP]
    }

    pub fn index_tip(&self) -> Point {
        self.points[landmarks::INDEX_FINGER_TIP]
    }

    pub fn iter(&self) -> impl Iterator<Item = Point> + '_ {
        self.points.iter().copied()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HandBackend trait
// ════════════════════════════════════════════════════════════════════════════

/// One inference per call. `Ok(None)` means no hand this frame.
pub trait HandBackend {
    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>, DetectError>;
}

/// Mouse state the visualizer shares with [`SimBackend`]: pointer position
/// in frame coordinates plus whether the simulated hand is shown at all.
#[derive(Clone, Copy, Debug)]
pub struct PointerSample {
    pub x: f32,
    pub y: f32,
    pub hand_visible: bool,
}

impl Default for PointerSample {
    fn default() -> Self {
        PointerSample { x: 0.0, y: 0.0, hand_visible: true }
    }
}

/// Single-threaded share between the window (writer) and the sim backend
/// (reader).
pub type SharedPointer = Rc<Cell<PointerSample>>;

/// Open the configured backend: the MediaPipe worker with the `mediapipe`
/// feature, the pointer-driven simulation otherwise.
pub fn open_backend(
    pointer: SharedPointer,
    worker: &std::path::Path,
) -> Result<Box<dyn HandBackend>, DetectError> {
    #[cfg(feature = "mediapipe")]
    {
        let _ = pointer;
        let backend = MediaPipeBackend::spawn(worker)?;
        Ok(Box::new(backend))
    }
    #[cfg(not(feature = "mediapipe"))]
    {
        let _ = worker;
        log::info!("no mediapipe feature compiled in; hand follows the mouse (H hides it)");
        Ok(Box::new(SimBackend::new(pointer)))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HandTracker — draw-then-read wrapper over a backend
// ════════════════════════════════════════════════════════════════════════════

pub struct HandTracker {
    backend: Box<dyn HandBackend>,
    current: Option<LandmarkSet>,
}

impl HandTracker {
    pub fn new(backend: Box<dyn HandBackend>) -> Self {
        HandTracker { backend, current: None }
    }

    /// Run inference on `frame` and paint the skeleton overlay. The result
    /// is cached; [`HandTracker::positions`] reads it without re-running
    /// the model.
    pub fn draw_hands(&mut self, frame: &mut Frame) -> Result<(), DetectError> {
        self.current = self.backend.detect(frame)?;
        if let Some(set) = &self.current {
            draw_skeleton(frame, set);
        }
        Ok(())
    }

    /// Landmarks from the most recent `draw_hands` call, if a hand was seen.
    pub fn positions(&self) -> Option<&LandmarkSet> {
        self.current.as_ref()
    }
}

fn draw_skeleton(frame: &mut Frame, set: &LandmarkSet) {
    for &(a, b) in CONNECTIONS {
        if let (Some(pa), Some(pb)) = (set.point(a), set.point(b)) {
            frame.line(pa, pb, 1, BONE_COLOR);
        }
    }
    for p in set.iter() {
        frame.circle_filled(p, 3, JOINT_COLOR);
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SimBackend — pointer-driven hand (default build)
// ════════════════════════════════════════════════════════════════════════════

/// Synthesizes a hand whose thumb tip sits at frame centre and whose index
/// fingertip follows the mouse, so moving the pointer away from centre
/// spreads the pinch. The other landmarks are laid out along plausible
/// finger chains purely so the skeleton overlay has something to show.
pub struct SimBackend {
    pointer: SharedPointer,
}

impl SimBackend {
    pub fn new(pointer: SharedPointer) -> Self {
        SimBackend { pointer }
    }
}

impl HandBackend for SimBackend {
    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>, DetectError> {
        let p = self.pointer.get();
        if !p.hand_visible {
            return Ok(None);
        }
        let thumb = Point::new(frame.width as f32 / 2.0, frame.height as f32 / 2.0);
        let index = Point::new(p.x, p.y);
        Ok(Some(synth_hand(thumb, index)))
    }
}

fn lerp(a: Point, b: Point, t: f32) -> Point {
    Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
}

fn rotate(v: (f32, f32), radians: f32) -> (f32, f32) {
    let (s, c) = radians.sin_cos();
    (v.0 * c - v.1 * s, v.0 * s + v.1 * c)
}

/// Build all 21 landmarks from the two tips that matter. Thumb and index
/// chains run wrist→tip; the remaining fingers fan away from the thumb
/// side with slightly shorter reach each.
fn synth_hand(thumb: Point, index: Point) -> LandmarkSet {
    let span = thumb.distance_to(index).max(40.0);
    let mid = lerp(thumb, index, 0.5);
    let wrist = Point::new(mid.x, mid.y + span * 0.9);

    let mut pts = [Point::default(); 21];
    pts[landmarks::WRIST] = wrist;

    // Tips carry the actual pinch, so they are assigned exactly rather
    // than re-derived through the chain interpolation.
    for (i, t) in [(1usize, 0.3f32), (2, 0.55), (3, 0.8)] {
        pts[i] = lerp(wrist, thumb, t);
    }
    pts[landmarks::THUMB_TIP] = thumb;
    for (i, t) in [(5usize, 0.4f32), (6, 0.65), (7, 0.85)] {
        pts[i] = lerp(wrist, index, t);
    }
    pts[landmarks::INDEX_FINGER_TIP] = index;

    let dir = (index.x - wrist.x, index.y - wrist.y);
    let tdir = (thumb.x - wrist.x, thumb.y - wrist.y);
    // Fan middle/ring/pinky toward the side opposite the thumb.
    let side = if dir.0 * tdir.1 - dir.1 * tdir.0 >= 0.0 { -1.0 } else { 1.0 };
    for finger in 0..3usize {
        let swing = side * 0.35 * (finger + 1) as f32;
        let reach = 1.0 - 0.12 * (finger + 1) as f32;
        let (rx, ry) = rotate(dir, swing);
        let tip = Point::new(wrist.x + rx * reach, wrist.y + ry * reach);
        let base = landmarks::MIDDLE_FINGER_MCP + finger * 4;
        for (k, t) in [(0usize, 0.4f32), (1, 0.65), (2, 0.85), (3, 1.0)] {
            pts[base + k] = lerp(wrist, tip, t);
        }
    }

    LandmarkSet::new(pts)
}

// ════════════════════════════════════════════════════════════════════════════
// MediaPipeBackend — worker-process inference (feature = "mediapipe")
// ════════════════════════════════════════════════════════════════════════════

/// Runs MediaPipe hands in a Python worker (`scripts/hands_worker.py`).
///
/// Wire format, per frame: a 12-byte little-endian header (width, height,
/// channels) followed by the raw RGB bytes on the worker's stdin; one JSON
/// line `{"hands":[{"score":…,"landmarks":[{"x":…,"y":…,"z":…}×21]}]}` back
/// on its stdout. The worker prints `READY` once its model is loaded.
#[cfg(feature = "mediapipe")]
pub struct MediaPipeBackend {
    child:     std::process::Child,
    replies:   std::io::BufReader<std::process::ChildStdout>,
    min_score: f32,
}

#[cfg(feature = "mediapipe")]
impl MediaPipeBackend {
    pub fn spawn(worker: &std::path::Path) -> Result<Self, DetectError> {
        use std::io::BufRead;
        use std::process::{Command, Stdio};

        log::info!("starting hand-landmark worker {}", worker.display());

        let mut child = Command::new("python3")
            .arg(worker)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| DetectError::Spawn(format!("{}: {}", worker.display(), e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DetectError::Spawn("worker stdout unavailable".into()))?;
        let mut replies = std::io::BufReader::new(stdout);

        let mut ready = String::new();
        replies
            .read_line(&mut ready)
            .map_err(|e| DetectError::Handshake(e.to_string()))?;
        if ready.trim() != "READY" {
            let _ = child.kill();
            return Err(DetectError::Handshake(format!(
                "expected READY, got {:?}",
                ready.trim()
            )));
        }

        log::info!("hand-landmark worker ready");
        Ok(MediaPipeBackend { child, replies, min_score: 0.5 })
    }
}

#[cfg(feature = "mediapipe")]
#[derive(serde::Deserialize)]
struct LandmarkJson {
    x: f32,
    y: f32,
    #[allow(dead_code)]
    z: f32,
}

#[cfg(feature = "mediapipe")]
#[derive(serde::Deserialize)]
struct HandJson {
    score: f32,
    landmarks: Vec<LandmarkJson>,
}

#[cfg(feature = "mediapipe")]
#[derive(serde::Deserialize)]
struct DetectionReply {
    hands: Vec<HandJson>,
    #[serde(default)]
    error: Option<String>,
}

#[cfg(feature = "mediapipe")]
impl HandBackend for MediaPipeBackend {
    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>, DetectError> {
        use std::io::{BufRead, Write};

        let stdin = self
            .child
            .stdin
            .as_mut()
            .ok_or_else(|| DetectError::Inference("worker stdin closed".into()))?;

        let io_err = |e: std::io::Error| DetectError::Inference(e.to_string());

        stdin.write_all(&(frame.width as u32).to_le_bytes()).map_err(io_err)?;
        stdin.write_all(&(frame.height as u32).to_le_bytes()).map_err(io_err)?;
        stdin.write_all(&3u32.to_le_bytes()).map_err(io_err)?;

        let mut bytes = Vec::with_capacity(frame.pixels.len() * 3);
        for &px in &frame.pixels {
            bytes.push((px >> 16) as u8);
            bytes.push((px >> 8) as u8);
            bytes.push(px as u8);
        }
        stdin.write_all(&bytes).map_err(io_err)?;
        stdin.flush().map_err(io_err)?;

        let mut line = String::new();
        self.replies.read_line(&mut line).map_err(io_err)?;
        if line.is_empty() {
            return Err(DetectError::Inference("worker exited".into()));
        }

        let reply: DetectionReply = serde_json::from_str(&line)
            .map_err(|e| DetectError::Protocol(e.to_string()))?;
        if let Some(message) = reply.error {
            return Err(DetectError::Inference(message));
        }

        for hand in reply.hands {
            if hand.score < self.min_score {
                continue;
            }
            if hand.landmarks.len() != 21 {
                return Err(DetectError::Protocol(format!(
                    "expected 21 landmarks, got {}",
                    hand.landmarks.len()
                )));
            }
            let mut pts = [Point::default(); 21];
            for (i, lm) in hand.landmarks.iter().enumerate() {
                // Worker coordinates are normalized 0–1.
                pts[i] = Point::new(lm.x * frame.width as f32, lm.y * frame.height as f32);
            }
            log::debug!("hand detected (score {:.2})", hand.score);
            return Ok(Some(LandmarkSet::new(pts)));
        }

        Ok(None)
    }
}

#[cfg(feature = "mediapipe")]
impl Drop for MediaPipeBackend {
    fn drop(&mut self) {
        let _ = self.child.kill();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn shared(x: f32, y: f32, hand_visible: bool) -> SharedPointer {
        Rc::new(Cell::new(PointerSample { x, y, hand_visible }))
    }

    #[test]
    fn sim_hand_pins_thumb_at_centre_and_index_at_pointer() {
        let mut backend = SimBackend::new(shared(100.0, 40.0, true));
        let frame = Frame::filled(640, 480, 0);
        let set = backend.detect(&frame).unwrap().unwrap();
        assert_eq!(set.thumb_tip(), Point::new(320.0, 240.0));
        assert_eq!(set.index_tip(), Point::new(100.0, 40.0));
    }

    #[test]
    fn sim_hand_hidden_reports_no_hand() {
        let pointer = shared(100.0, 40.0, false);
        let mut backend = SimBackend::new(Rc::clone(&pointer));
        let frame = Frame::filled(640, 480, 0);
        assert!(backend.detect(&frame).unwrap().is_none());

        let mut sample = pointer.get();
        sample.hand_visible = true;
        pointer.set(sample);
        assert!(backend.detect(&frame).unwrap().is_some());
    }

    #[test]
    fn synth_hand_produces_finite_landmarks() {
        let set = synth_hand(Point::new(300.0, 200.0), Point::new(420.0, 120.0));
        for p in set.iter() {
            assert!(p.x.is_finite() && p.y.is_finite());
        }
    }

    #[test]
    fn landmark_lookup_out_of_range_is_none() {
        let set = synth_hand(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        assert!(set.point(20).is_some());
        assert!(set.point(21).is_none());
    }

    struct CountingBackend {
        calls: Rc<Cell<usize>>,
    }

    impl HandBackend for CountingBackend {
        fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>, DetectError> {
            self.calls.set(self.calls.get() + 1);
            Ok(Some(synth_hand(
                Point::new(frame.width as f32 / 2.0, frame.height as f32 / 2.0),
                Point::new(10.0, 10.0),
            )))
        }
    }

    #[test]
    fn tracker_runs_inference_once_per_frame() {
        let calls = Rc::new(Cell::new(0));
        let mut tracker = HandTracker::new(Box::new(CountingBackend { calls: Rc::clone(&calls) }));
        let mut frame = Frame::filled(64, 64, 0);

        tracker.draw_hands(&mut frame).unwrap();
        assert!(tracker.positions().is_some());
        assert!(tracker.positions().is_some());

        // Only draw_hands touches the backend.
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn tracker_draws_skeleton_over_backdrop() {
        let calls = Rc::new(Cell::new(0));
        let mut tracker = HandTracker::new(Box::new(CountingBackend { calls }));
        let mut frame = Frame::filled(64, 64, 0xFF000000);
        tracker.draw_hands(&mut frame).unwrap();
        assert!(frame.pixels.iter().any(|&p| p != 0xFF000000));
    }
}
