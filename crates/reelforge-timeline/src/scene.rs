use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a scene.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SceneId(pub String);

impl SceneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id for a newly created scene.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for SceneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A scene on the timeline — one ordered, time-bounded unit of the video,
/// backed by a generated source module.
///
/// The compiled artifact is derived and cache-like, never primary truth;
/// a present `compilation_error` means any artifact still attached is stale
/// and only usable as a fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    /// Unique scene identifier within the project.
    pub id: SceneId,
    /// Display label.
    pub name: String,
    /// Dense 0-based position on the timeline.
    pub order: u32,
    /// Stored duration in frames (timeline bookkeeping truth, ≥ 1).
    pub duration_frames: u32,
    /// The generated scene-module source.
    pub source_code: String,
    /// Derived executable form of `source_code`, if compilation succeeded
    /// at least once.
    pub compiled_artifact: Option<String>,
    /// When the artifact was last produced.
    pub compiled_at: Option<DateTime<Utc>>,
    /// Last compile failure for the current `source_code`, if any.
    pub compilation_error: Option<String>,
}

impl Scene {
    /// Create a new uncompiled scene. `order` is assigned by the timeline.
    pub fn new(name: impl Into<String>, duration_frames: u32, source_code: impl Into<String>) -> Self {
        Self {
            id: SceneId::generate(),
            name: name.into(),
            order: 0,
            duration_frames: duration_frames.max(1),
            source_code: source_code.into(),
            compiled_artifact: None,
            compiled_at: None,
            compilation_error: None,
        }
    }

    /// Replace the source module. Any prior compile state for the old source
    /// no longer applies: the error is cleared and the artifact, if present,
    /// becomes a stale fallback until the next compile pass.
    pub fn replace_source(&mut self, source_code: impl Into<String>) {
        self.source_code = source_code.into();
        self.compilation_error = None;
    }

    /// Record a successful compile.
    pub fn mark_compiled(&mut self, artifact: String, at: DateTime<Utc>) {
        self.compiled_artifact = Some(artifact);
        self.compiled_at = Some(at);
        self.compilation_error = None;
    }

    /// Record a compile failure. A pre-existing artifact is kept as a
    /// stale-but-renderable fallback; if none exists the renderer's
    /// placeholder path has everything it needs (error set, artifact empty).
    pub fn mark_compile_failed(&mut self, error: impl Into<String>) {
        self.compilation_error = Some(error.into());
    }

    /// True when the attached artifact matches the current source.
    pub fn is_compiled(&self) -> bool {
        self.compiled_artifact.is_some() && self.compilation_error.is_none()
    }
}
