//! # hand_volume
//!
//! Webcam hand-gesture volume controller: the distance between the thumb
//! tip and the index fingertip steers the system output level live, with a
//! software-rendered preview window showing the feed, the pinch markers,
//! and a frame-rate/volume HUD.
//!
//! ## Pipeline
//!
//! | Stage | Seam | Default build | Feature build |
//! |---|---|---|---|
//! | Capture | `FrameSource` | animated synthetic scene | `camera`: webcam via `nokhwa` |
//! | Detect | `HandBackend` | mouse-driven simulated hand | `mediapipe`: landmark worker process |
//! | Apply | `VolumeEndpoint` | logging in-memory mixer | `alsa`: ALSA `Master` control |
//!
//! Every seam defaults to a simulation, so the full loop runs on a bare
//! machine: move the mouse away from the window centre to spread the pinch
//! and raise the volume, toward it to lower. The mixer level found at
//! startup is remembered and, with `--reset-volume`, put back on exit.
//!
//! ## Simulation keys
//!
//! | Key | Action |
//! |---|---|
//! | mouse | position the simulated index fingertip |
//! | `H` | hide/show the simulated hand |
//! | `Q` / `Escape` | quit |

pub mod error;
pub mod frame;
pub mod capture;
pub mod detector;
pub mod volume;
pub mod visualizer;
pub mod app;
