//! Discovery and transport backends.
//!
//! # Feature flags
//! - **`hidapi-backend`**: direct HID enumeration and report reading via hidapi.
//! - **`udev-backend`**: input-subsystem enumeration and hot-plug events via
//!   libudev (Linux only).

#[cfg(feature = "hidapi-backend")]
pub mod hid;

#[cfg(all(feature = "udev-backend", target_os = "linux"))]
pub mod udev;
