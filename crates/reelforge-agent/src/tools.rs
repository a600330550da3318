//! Operation executors — the four structural tools.
//!
//! Executors are pure transforms: `(ToolInput) → ToolOutput`. They never
//! touch persistence; the pipeline applies the returned delta to the
//! timeline and writes it back. Inputs and outputs are tagged per tool so
//! an unexpected payload shape cannot slip through as a stray field on some
//! catch-all map.

use tracing::info;

use reelforge_core::{frames::format_frames, ForgeError, ForgeResult, FormatConfig};
use reelforge_timeline::{ResolvedMedia, SceneId};
use reelforge_lang::parser::Parser;

use crate::generator::{GenerationRequest, SceneGenerator};

/// Fields shared by every tool input.
#[derive(Debug, Clone)]
pub struct BaseInput {
    pub user_prompt: String,
    pub project_id: String,
    pub requested_duration_frames: Option<u32>,
}

/// Per-tool input variants.
#[derive(Debug, Clone)]
pub enum ToolInput {
    Add {
        base: BaseInput,
        format: FormatConfig,
        resolved_media: Vec<ResolvedMedia>,
        reference_sources: Vec<String>,
    },
    Edit {
        base: BaseInput,
        target: SceneId,
        current_source: String,
        format: FormatConfig,
        resolved_media: Vec<ResolvedMedia>,
        reference_sources: Vec<String>,
    },
    Delete {
        base: BaseInput,
        target: SceneId,
    },
    Retime {
        base: BaseInput,
        target: SceneId,
        current_duration_frames: u32,
        /// An exact duration the decision already carries.
        explicit_frames: Option<u32>,
        /// A relative change parsed from the prompt, in frames.
        delta_frames: Option<i64>,
    },
}

/// Result payload, tagged per tool.
#[derive(Debug, Clone)]
pub enum ToolPayload {
    /// Add: all three fields are non-optional on success.
    Created {
        source_code: String,
        name: String,
        duration_frames: u32,
    },
    /// Edit: duration only when the edit changed it.
    Edited {
        target: SceneId,
        source_code: String,
        duration_frames: Option<u32>,
    },
    Deleted {
        target: SceneId,
    },
    Retimed {
        target: SceneId,
        duration_frames: u32,
    },
}

#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub success: bool,
    pub reasoning: String,
    /// Human-readable sentence for the chat transcript.
    pub chat_response: String,
    pub payload: ToolPayload,
}

/// Run one executor. Only Add and Edit consult the generator; Delete and
/// Retime are metadata-only and return in microseconds.
pub async fn execute(input: ToolInput, generator: &dyn SceneGenerator) -> ForgeResult<ToolOutput> {
    match input {
        ToolInput::Add {
            base,
            format,
            resolved_media,
            reference_sources,
        } => execute_add(base, format, resolved_media, reference_sources, generator).await,
        ToolInput::Edit {
            base,
            target,
            current_source,
            format,
            resolved_media,
            reference_sources,
        } => {
            execute_edit(
                base,
                target,
                current_source,
                format,
                resolved_media,
                reference_sources,
                generator,
            )
            .await
        }
        ToolInput::Delete { base: _, target } => Ok(execute_delete(target)),
        ToolInput::Retime {
            base,
            target,
            current_duration_frames,
            explicit_frames,
            delta_frames,
        } => execute_retime(base, target, current_duration_frames, explicit_frames, delta_frames),
    }
}

async fn execute_add(
    base: BaseInput,
    format: FormatConfig,
    resolved_media: Vec<ResolvedMedia>,
    reference_sources: Vec<String>,
    generator: &dyn SceneGenerator,
) -> ForgeResult<ToolOutput> {
    let mut request = GenerationRequest::new(base.user_prompt.clone(), format);
    request.requested_duration_frames = base.requested_duration_frames;
    request.media_urls = resolved_media.iter().map(|m| m.asset.url.clone()).collect();
    request.reference_sources = reference_sources;

    let source_code = generator.generate(&request).await?;
    let (name, duration_frames) = declared_identity(&source_code, base.requested_duration_frames);

    info!(%name, frames = duration_frames, "generated new scene");
    Ok(ToolOutput {
        success: true,
        reasoning: format!("created scene '{name}' from the request"),
        chat_response: format!(
            "Added \"{name}\" to the end of the timeline ({}).",
            format_frames(duration_frames)
        ),
        payload: ToolPayload::Created {
            source_code,
            name,
            duration_frames,
        },
    })
}

#[allow(clippy::too_many_arguments)]
async fn execute_edit(
    base: BaseInput,
    target: SceneId,
    current_source: String,
    format: FormatConfig,
    resolved_media: Vec<ResolvedMedia>,
    reference_sources: Vec<String>,
    generator: &dyn SceneGenerator,
) -> ForgeResult<ToolOutput> {
    let old_duration = Parser::parse_source(&current_source)
        .ok()
        .map(|s| s.duration.frames());

    let mut request = GenerationRequest::new(base.user_prompt.clone(), format);
    request.requested_duration_frames = base.requested_duration_frames;
    request.media_urls = resolved_media.iter().map(|m| m.asset.url.clone()).collect();
    request.reference_sources = reference_sources;
    request.current_source = Some(current_source);

    let source_code = generator.generate(&request).await?;
    let (name, new_duration) = declared_identity(&source_code, base.requested_duration_frames);

    // Edit only reports a duration when the edit actually changed it.
    let duration_frames = match old_duration {
        Some(old) if old == new_duration => None,
        _ => Some(new_duration),
    };

    info!(%target, changed_duration = ?duration_frames, "edited scene");
    Ok(ToolOutput {
        success: true,
        reasoning: format!("rewrote scene '{name}' per the request"),
        chat_response: format!("Updated \"{name}\"."),
        payload: ToolPayload::Edited {
            target,
            source_code,
            duration_frames,
        },
    })
}

fn execute_delete(target: SceneId) -> ToolOutput {
    info!(%target, "deleting scene");
    ToolOutput {
        success: true,
        reasoning: "request asked for removal, no generation needed".to_string(),
        chat_response: "Deleted the scene; later scenes moved up.".to_string(),
        payload: ToolPayload::Deleted { target },
    }
}

/// Resolve the new duration in priority order: explicit value, relative
/// delta, parsed natural-language duration.
fn execute_retime(
    base: BaseInput,
    target: SceneId,
    current_duration_frames: u32,
    explicit_frames: Option<u32>,
    delta_frames: Option<i64>,
) -> ForgeResult<ToolOutput> {
    let duration_frames = if let Some(frames) = explicit_frames {
        frames.max(1)
    } else if let Some(delta) = delta_frames {
        (current_duration_frames as i64 + delta).max(1) as u32
    } else if let Some(frames) = base.requested_duration_frames {
        frames.max(1)
    } else {
        return Err(ForgeError::InvalidArgument(format!(
            "retime of scene {target} without any target duration in: \"{}\"",
            base.user_prompt
        )));
    };

    info!(%target, from = current_duration_frames, to = duration_frames, "retiming scene");
    Ok(ToolOutput {
        success: true,
        reasoning: format!(
            "duration change {current_duration_frames} → {duration_frames} frames, metadata only"
        ),
        chat_response: format!("Scene duration is now {}.", format_frames(duration_frames)),
        payload: ToolPayload::Retimed {
            target,
            duration_frames,
        },
    })
}

/// Name and declared duration from generated source. Falls back to a
/// placeholder name and the requested duration when the source does not
/// parse — the compile stage will record the real failure on the scene.
fn declared_identity(source: &str, requested: Option<u32>) -> (String, u32) {
    match Parser::parse_source(source) {
        Ok(scene) => (scene.name, scene.duration.frames()),
        Err(_) => ("Untitled scene".to_string(), requested.unwrap_or(90)),
    }
}
