//! Frame arithmetic at the fixed project frame rate.
//!
//! Every duration in the engine is an integer number of frames. Seconds only
//! exist at the edges: user-facing text ("5 seconds") and display formatting.

/// The fixed project frame rate. All second↔frame conversion uses this value.
pub const PROJECT_FPS: u32 = 30;

/// Minimum legal scene duration.
pub const MIN_SCENE_FRAMES: u32 = 1;

/// Frames the exit animation should leave free at the end of a scene when a
/// duration is forced by the user, so cuts do not clip motion mid-flight.
pub const EXIT_HEADROOM_FRAMES: u32 = 10;

/// Convert fractional seconds to whole frames, rounding to nearest.
pub fn seconds_to_frames(seconds: f64) -> u32 {
    let frames = (seconds * PROJECT_FPS as f64).round();
    if frames < MIN_SCENE_FRAMES as f64 {
        MIN_SCENE_FRAMES
    } else {
        frames as u32
    }
}

/// Convert frames back to seconds for display.
pub fn frames_to_seconds(frames: u32) -> f64 {
    frames as f64 / PROJECT_FPS as f64
}

/// Human-readable duration label, e.g. `"150 frames (5.0s)"`.
pub fn format_frames(frames: u32) -> String {
    format!("{} frames ({:.1}s)", frames, frames_to_seconds(frames))
}
