//! Error taxonomy for the controller.
//!
//! Startup failures (`CaptureError::Open`, `DetectError::Spawn`/`Handshake`,
//! `VolumeError::NoEndpoint`, `DisplayError::Window`) abort before any mixer
//! state is touched. Mid-run, a failed frame read is the one recoverable
//! case: the loop reports it and moves on to the next frame. Everything else
//! ends the run, with teardown and any requested volume restoration still
//! executing on the way out.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, AppError>;

// ════════════════════════════════════════════════════════════════════════════
// Per-collaborator errors
// ════════════════════════════════════════════════════════════════════════════

/// Capture device failures.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The device could not be opened. Fatal at startup.
    #[error("capture device {index} could not be opened: {reason}")]
    Open { index: u32, reason: String },

    /// A single frame read failed. Recoverable; the next frame retries.
    #[error("frame read failed: {0}")]
    Read(String),

    /// A frame arrived but could not be decoded to pixels. Recoverable.
    #[error("frame decode failed: {0}")]
    Decode(String),
}

/// Hand-landmark detector failures.
#[derive(Debug, Error)]
pub enum DetectError {
    /// The detector process/model could not be started. Fatal at startup.
    #[error("detector could not be started: {0}")]
    Spawn(String),

    /// The detector started but never signalled readiness. Fatal at startup.
    #[error("detector handshake failed: {0}")]
    Handshake(String),

    /// The model failed mid-run. Fatal. "No hand visible" is not this;
    /// that is an ordinary empty result.
    #[error("hand inference failed: {0}")]
    Inference(String),

    /// The detector replied with something unparseable. Fatal.
    #[error("detector protocol violation: {0}")]
    Protocol(String),
}

/// OS volume endpoint failures.
#[derive(Debug, Error)]
pub enum VolumeError {
    /// No addressable mixer/endpoint. Fatal at startup.
    #[error("no volume endpoint: {0}")]
    NoEndpoint(String),

    #[error("volume read failed: {0}")]
    Read(String),

    #[error("volume write failed: {0}")]
    Write(String),
}

/// Display sink failures.
#[derive(Debug, Error)]
pub enum DisplayError {
    /// The window could not be created. Fatal at startup.
    #[error("window could not be created: {0}")]
    Window(String),

    #[error("frame could not be presented: {0}")]
    Present(String),
}

// ════════════════════════════════════════════════════════════════════════════
// AppError — what `run()` and `main()` see
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Detect(#[from] DetectError),

    #[error(transparent)]
    Volume(#[from] VolumeError),

    #[error(transparent)]
    Display(#[from] DisplayError),

    #[error("invalid calibration: {0}")]
    Calibration(#[from] pinch_scale::BoundsError),
}
