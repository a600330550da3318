//! Scene source generation — constraint assembly around the model call.
//!
//! The generator never sees ambient globals: everything it may use (target
//! format, duration constraint, the closed media-URL list, reference scene
//! sources) arrives in the [`GenerationRequest`].

use async_trait::async_trait;

use reelforge_core::{frames::EXIT_HEADROOM_FRAMES, ForgeError, ForgeResult, FormatConfig};

use crate::client::{strip_code_fence, ChatModel};

/// Everything the generator is allowed to work from.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub format: FormatConfig,
    /// When present, the module must declare exactly this duration.
    pub requested_duration_frames: Option<u32>,
    /// Closed list of permitted media URLs. Empty means none at all.
    pub media_urls: Vec<String>,
    /// Source of scenes named as style references.
    pub reference_sources: Vec<String>,
    /// Present in edit mode: the module being changed.
    pub current_source: Option<String>,
    /// Appended constraints, e.g. validation failures from a prior attempt.
    pub extra_constraints: Vec<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, format: FormatConfig) -> Self {
        Self {
            prompt: prompt.into(),
            format,
            requested_duration_frames: None,
            media_urls: Vec::new(),
            reference_sources: Vec::new(),
            current_source: None,
            extra_constraints: Vec::new(),
        }
    }

    pub fn is_edit(&self) -> bool {
        self.current_source.is_some()
    }
}

/// Source synthesis seam. The HTTP implementation is the production path;
/// tests script this trait directly.
#[async_trait]
pub trait SceneGenerator: Send + Sync {
    /// Produce a complete scene module for the request.
    async fn generate(&self, request: &GenerationRequest) -> ForgeResult<String>;
}

const GENERATOR_SYSTEM_PROMPT: &str = r#"You write scene modules for a frame-driven short-form video engine.

A module is exactly one scene declaration:

scene("Name", <duration>) {
    layer("id") {
        <one content item: text(...) | image("url") | video("url") | solid(#RRGGBB) | shape(kind)>
        <optional properties: position(x, y) scale(n) rotation(deg) opacity(n) fit(contain|cover|fill)>
        <optional: animate(opacity|scale|rotation|x|y, from: n, to: n, start: Nf, end: Nf, easing: linear|ease_in|ease_out|ease_in_out)>
    }
}

Durations are frame literals like 150f (30fps) or second literals like 5s.
Every layer has exactly one content item. Layer names are unique.
Reply with the module source only — no explanations, no markdown fence."#;

/// HTTP-backed generator: builds the constrained instruction set, calls the
/// model, extracts the module source from the reply.
pub struct HttpSceneGenerator<M: ChatModel> {
    model: M,
}

impl<M: ChatModel> HttpSceneGenerator<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }
}

#[async_trait]
impl<M: ChatModel> SceneGenerator for HttpSceneGenerator<M> {
    async fn generate(&self, request: &GenerationRequest) -> ForgeResult<String> {
        let user = build_instructions(request);
        let reply = self.model.complete(GENERATOR_SYSTEM_PROMPT, &user).await?;
        extract_scene_source(&reply)
    }
}

/// Assemble the user-side instruction set for one generation call.
pub fn build_instructions(request: &GenerationRequest) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Target format: {} ({}x{}) at {}fps.\n",
        request.format.aspect_label(),
        request.format.width,
        request.format.height,
        request.format.fps
    ));

    match request.requested_duration_frames {
        Some(frames) => {
            let settle = frames.saturating_sub(EXIT_HEADROOM_FRAMES);
            out.push_str(&format!(
                "Duration constraint: the scene MUST declare exactly {frames}f, and all exit \
                 animation must be finished by frame {settle} so the cut does not clip motion.\n"
            ));
        }
        None => {
            out.push_str(
                "Duration: choose one to fit the content — around 60-90f for a simple logo or \
                 text reveal, up to 240f for a multi-element showcase — and declare it in the \
                 scene header.\n",
            );
        }
    }

    if request.media_urls.is_empty() {
        out.push_str("Media: no uploaded media is available. Do not reference any image or video URL.\n");
    } else {
        out.push_str("Media: use ONLY these uploaded URLs, never any other URL:\n");
        for url in &request.media_urls {
            out.push_str(&format!("  {url}\n"));
        }
    }

    for source in &request.reference_sources {
        out.push_str(&format!(
            "\nMatch the visual style of this existing scene:\n{source}\n"
        ));
    }

    if let Some(current) = &request.current_source {
        out.push_str(&format!(
            "\nEdit the following module. Keep everything the user did not ask to change:\n{current}\n"
        ));
    }

    for constraint in &request.extra_constraints {
        out.push_str(&format!("\nAdditional constraint: {constraint}\n"));
    }

    out.push_str(&format!("\nRequest: {}\n", request.prompt));
    out
}

/// Pull the module source out of a model reply: strip any markdown fence,
/// then cut from the `scene(` header to the last closing brace.
pub fn extract_scene_source(reply: &str) -> ForgeResult<String> {
    let body = strip_code_fence(reply);
    let start = body.find("scene(").or_else(|| body.find("scene (")).ok_or_else(|| {
        ForgeError::Generation("model reply contained no scene declaration".to_string())
    })?;
    let end = body.rfind('}').ok_or_else(|| {
        ForgeError::Generation("model reply contained no closing brace".to_string())
    })?;
    if end < start {
        return Err(ForgeError::Generation(
            "malformed model reply: closing brace before scene header".to_string(),
        ));
    }
    let mut source = body[start..=end].to_string();
    source.push('\n');
    Ok(source)
}
