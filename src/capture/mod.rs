//! Screen capture of emulator windows (Windows only).
//!
//! This module provides:
//! - A persistent Windows Graphics Capture session per window (`WindowCapture`)
//! - Client-area cropping information (`client_area_info`)

pub mod screenshot;
pub mod window;

pub use screenshot::WindowCapture;
pub use window::client_area_info;
