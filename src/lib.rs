//! Library exports for Spotlight Dimmer's overlay engine. Exporting every
//! module (rather than only the platform-specific ones) lets the pure
//! components — primitives, the monitor inventory, the overlay calculator,
//! the focus-change decider — be unit tested without a Windows target.

pub mod config;
pub mod display_monitor;
pub mod error;
pub mod focus_decider;
pub mod interfaces;
pub mod monitor;
pub mod overlay_calculator;
pub mod overlay_renderer;
pub mod platform;
pub mod primitives;
pub mod window_inspector;

#[cfg(windows)]
pub mod engine;
#[cfg(windows)]
pub mod focus_tracker;
#[cfg(windows)]
pub mod message_window;
