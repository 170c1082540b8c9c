//! facecam-hw — camera capture and device access.
//!
//! Provides V4L2-based continuous capture into grayscale frames and an
//! up-front access check for camera device nodes.

pub mod access;
pub mod camera;
pub mod frame;

pub use access::{check_access, Access};
pub use camera::{Camera, CameraError, DeviceInfo, FrameStream, PixelFormat};
pub use frame::Frame;
