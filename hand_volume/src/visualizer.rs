//! OS window shell over `minifb`.
//!
//! All drawing happens on a [`Frame`] inside the loop; this module owns the
//! window itself, samples keyboard and mouse once per frame into the shared
//! pointer cell, and blits finished frames. Keeping the window out of the
//! loop type leaves the rest of the pipeline testable without a display.

use std::time::Duration;

use minifb::{Key, KeyRepeat, MouseMode, Window, WindowOptions};

use crate::detector::{PointerSample, SharedPointer};
use crate::error::DisplayError;
use crate::frame::Frame;

pub const TITLE: &str = "Volume Hand Controller";

pub struct Visualizer {
    window:     Window,
    pointer:    SharedPointer,
    frame_size: (usize, usize),
}

impl Visualizer {
    pub fn new(width: usize, height: usize, pointer: SharedPointer) -> Result<Self, DisplayError> {
        let mut window = Window::new(
            TITLE,
            width, height,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        ).map_err(|e| DisplayError::Window(e.to_string()))?;

        window.limit_update_rate(Some(Duration::from_millis(16))); // ~60fps

        // Start the pointer at centre so the simulated pinch opens at zero
        // until the mouse moves.
        pointer.set(PointerSample {
            x: width as f32 / 2.0,
            y: height as f32 / 2.0,
            hand_visible: true,
        });

        Ok(Visualizer { window, pointer, frame_size: (width, height) })
    }

    /// Use `dims` as the coordinate space for mouse samples. A camera may
    /// negotiate a different format than the window was sized for; the
    /// window scales the buffer on present, and this keeps the pointer in
    /// frame coordinates. The pointer re-centres in the new space.
    pub fn set_frame_size(&mut self, dims: (usize, usize)) {
        self.frame_size = dims;
        let mut sample = self.pointer.get();
        sample.x = dims.0 as f32 / 2.0;
        sample.y = dims.1 as f32 / 2.0;
        self.pointer.set(sample);
    }

    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    /// Sample inputs once per frame and refresh the shared pointer cell.
    /// Returns false when the user asked to quit (Q, Escape, or closing
    /// the window).
    pub fn poll_input(&mut self) -> bool {
        if !self.window.is_open() {
            return false;
        }

        // Keys that trigger on first press only
        let one_shot = |k: Key| self.window.is_key_pressed(k, KeyRepeat::No);

        if one_shot(Key::Q) || one_shot(Key::Escape) {
            return false;
        }

        let mut sample = self.pointer.get();
        if one_shot(Key::H) {
            sample.hand_visible = !sample.hand_visible;
        }
        if let Some(pos) = self.window.get_mouse_pos(MouseMode::Clamp) {
            let (x, y) = map_to_frame(pos, self.window.get_size(), self.frame_size);
            sample.x = x;
            sample.y = y;
        }
        self.pointer.set(sample);

        true
    }

    /// Blit a finished frame to the window.
    pub fn present(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        self.window
            .update_with_buffer(&frame.pixels, frame.width, frame.height)
            .map_err(|e| DisplayError::Present(e.to_string()))
    }

    /// Keep the event queue moving on cycles with nothing to show, so key
    /// and close events still arrive while frames are being skipped.
    pub fn pump(&mut self) {
        self.window.update();
    }
}

/// Window-pixel position scaled into frame coordinates. The two spaces only
/// coincide when the source delivers exactly the size the window was opened
/// at.
fn map_to_frame(pos: (f32, f32), window: (usize, usize), frame: (usize, usize)) -> (f32, f32) {
    (
        pos.0 * frame.0 as f32 / window.0 as f32,
        pos.1 * frame.1 as f32 / window.1 as f32,
    )
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mouse_samples_scale_into_frame_space() {
        let scaled = map_to_frame((320.0, 240.0), (640, 480), (1280, 720));
        assert_eq!(scaled, (640.0, 360.0));
    }

    #[test]
    fn matching_sizes_leave_samples_unchanged() {
        let scaled = map_to_frame((101.0, 53.0), (640, 480), (640, 480));
        assert_eq!(scaled, (101.0, 53.0));
    }
}
