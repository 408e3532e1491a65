//! Frame acquisition behind the [`FrameSource`] seam.
//!
//! The default build uses [`SyntheticSource`], an animated backdrop that
//! needs no hardware; the `camera` feature swaps in [`CameraSource`], which
//! streams a real webcam via `nokhwa`. The loop only ever sees the trait.

use crate::error::CaptureError;
use crate::frame::{blend, Frame};

// ════════════════════════════════════════════════════════════════════════════
// FrameSource trait
// ════════════════════════════════════════════════════════════════════════════

/// One frame per call, blocking until the source has one.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Frame, CaptureError>;

    /// (width, height) of the frames this source produces.
    fn dimensions(&self) -> (usize, usize);

    /// Stop the underlying device. Called exactly once during teardown.
    fn release(&mut self) {}
}

/// Open the configured source: a webcam with the `camera` feature, the
/// synthetic backdrop otherwise. Open failure is fatal to startup.
pub fn open_source(
    device: u32,
    width: usize,
    height: usize,
) -> Result<Box<dyn FrameSource>, CaptureError> {
    #[cfg(feature = "camera")]
    {
        let source = CameraSource::open(device, width, height)?;
        Ok(Box::new(source))
    }
    #[cfg(not(feature = "camera"))]
    {
        let _ = device;
        log::info!("no camera feature compiled in; using synthetic {}x{} backdrop", width, height);
        Ok(Box::new(SyntheticSource::new(width, height)))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SyntheticSource — hardware-free backdrop (default build)
// ════════════════════════════════════════════════════════════════════════════

const BACKDROP_TOP:    u32 = 0xFF1A1A2E;
const BACKDROP_BOTTOM: u32 = 0xFF0F3460;
const SWEEP_TINT:      u32 = 0xFFAADDFF;

/// Gradient backdrop with a slow light sweep, so the window shows motion
/// and the overlay remains legible without a webcam.
pub struct SyntheticSource {
    width:  usize,
    height: usize,
    tick:   u64,
}

impl SyntheticSource {
    pub fn new(width: usize, height: usize) -> Self {
        SyntheticSource { width, height, tick: 0 }
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        let mut frame = Frame::filled(self.width, self.height, BACKDROP_TOP);
        for row in 0..self.height {
            let t = row as f32 / self.height.max(1) as f32;
            frame.fill_rect(0, row, self.width, 1, blend(BACKDROP_TOP, BACKDROP_BOTTOM, t));
        }

        // Sweep band drifts one row every other frame.
        let band = ((self.tick / 2) as usize) % self.height.max(1);
        for offset in 0..12usize {
            let row = band + offset;
            if row >= self.height { break; }
            let strength = 0.12 * (1.0 - offset as f32 / 12.0);
            let base = blend(BACKDROP_TOP, BACKDROP_BOTTOM, row as f32 / self.height as f32);
            frame.fill_rect(0, row, self.width, 1, blend(base, SWEEP_TINT, strength));
        }

        self.tick += 1;
        Ok(frame)
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// CameraSource — real webcam (feature = "camera")
// ════════════════════════════════════════════════════════════════════════════

/// Webcam frames via `nokhwa`, decoded to RGB and packed for the window.
#[cfg(feature = "camera")]
pub struct CameraSource {
    cam:    nokhwa::Camera,
    width:  usize,
    height: usize,
}

#[cfg(feature = "camera")]
impl CameraSource {
    /// Open device `index`, requesting the closest stream to
    /// (width, height) YUYV at 30 fps. The driver may pick a neighbouring
    /// resolution; `dimensions()` reports what it actually delivers.
    pub fn open(index: u32, width: usize, height: usize) -> Result<Self, CaptureError> {
        use nokhwa::pixel_format::RgbFormat;
        use nokhwa::utils::{
            CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
            Resolution,
        };

        let wanted = CameraFormat::new(
            Resolution::new(width as u32, height as u32),
            FrameFormat::YUYV,
            30,
        );
        let request = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(wanted));

        let mut cam = nokhwa::Camera::new(CameraIndex::Index(index), request)
            .map_err(|e| CaptureError::Open { index, reason: e.to_string() })?;
        cam.open_stream()
            .map_err(|e| CaptureError::Open { index, reason: e.to_string() })?;

        let actual = cam.resolution();
        log::info!(
            "camera {} open at {}x{}",
            index,
            actual.width(),
            actual.height()
        );

        Ok(CameraSource {
            cam,
            width:  actual.width() as usize,
            height: actual.height() as usize,
        })
    }
}

#[cfg(feature = "camera")]
impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        use nokhwa::pixel_format::RgbFormat;

        let raw = self.cam.frame().map_err(|e| CaptureError::Read(e.to_string()))?;
        let rgb = raw
            .decode_image::<RgbFormat>()
            .map_err(|e| CaptureError::Decode(e.to_string()))?;

        let (w, h) = rgb.dimensions();
        let bytes = rgb.into_raw();
        let mut pixels = Vec::with_capacity(w as usize * h as usize);
        for px in bytes.chunks_exact(3) {
            pixels.push(
                0xFF000000 | ((px[0] as u32) << 16) | ((px[1] as u32) << 8) | px[2] as u32,
            );
        }

        Ok(Frame::from_pixels(pixels, w as usize, h as usize))
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn release(&mut self) {
        if let Err(e) = self.cam.stop_stream() {
            log::warn!("camera stream did not stop cleanly: {}", e);
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_frames_match_dimensions() {
        let mut src = SyntheticSource::new(320, 240);
        let frame = src.next_frame().unwrap();
        assert_eq!((frame.width, frame.height), src.dimensions());
        assert_eq!(frame.pixels.len(), 320 * 240);
    }

    #[test]
    fn synthetic_backdrop_is_a_gradient() {
        let mut src = SyntheticSource::new(64, 64);
        let frame = src.next_frame().unwrap();
        assert_ne!(frame.pixels[0], frame.pixels[63 * 64]);
    }

    #[test]
    fn synthetic_backdrop_animates() {
        let mut src = SyntheticSource::new(64, 64);
        let first = src.next_frame().unwrap();
        src.next_frame().unwrap();
        let third = src.next_frame().unwrap();
        assert_ne!(first.pixels, third.pixels);
    }

    #[test]
    fn synthetic_never_fails() {
        let mut src = SyntheticSource::new(16, 16);
        for _ in 0..100 {
            assert!(src.next_frame().is_ok());
        }
    }
}
