//! # reelforge-core
//!
//! Core types and primitives for the Reelforge editing engine.
//! This crate contains foundational types shared across all Reelforge crates:
//! frame math, duration parsing, configuration, and error types.

pub mod config;
pub mod duration;
pub mod error;
pub mod frames;

pub use config::*;

pub use duration::parse_duration_frames;
pub use error::{ForgeError, ForgeResult};
pub use frames::{frames_to_seconds, seconds_to_frames, PROJECT_FPS};
