//! Interactive line-art session controller.
//!
//! A [`Session`] drives a remote [`artservice::RenderService`]: it fills a
//! gallery from concurrent artifact requests, keeps one selection, maps
//! joystick pointer input to a gyro vector, streams preview frames one request
//! at a time at a bounded cadence, and runs full-length video renders.

mod clock;
mod error;
mod gallery;
mod input;
mod selection;
mod session;
mod streamer;
mod surface;
mod video;

#[cfg(test)]
mod testing;

pub use clock::{phase_at, PreviewClock};
pub use error::SessionError;
pub use gallery::{Gallery, GalleryGenerator, GalleryItem, GalleryReport};
pub use input::{GyroVector, HandleOffset, InputMapper, JoystickGeometry, PointerEvent};
pub use selection::{Selection, SelectionState};
pub use session::{Session, SessionOptions};
pub use streamer::{FrameStreamer, StreamInputs, StreamOutcome, StreamSettings};
pub use surface::{decode_frame, DecodingSurface, FrameSurface, PresentedFrame, PreviewFrame};
pub use video::{VideoJob, VideoJobController};
