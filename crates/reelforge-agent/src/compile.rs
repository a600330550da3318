//! Compile stage: turn scene source into stored artifacts.
//!
//! Each scene compiles on its own; a malformed module marks that one scene
//! with a `compilation_error` and never blocks its siblings or the request.
//! A stale artifact from a previous successful compile is kept so playback
//! can fall back to the last good frame data.

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, warn};

use reelforge_core::{ForgeError, ForgeResult};
use reelforge_lang::{compile_scene, validate_source};
use reelforge_timeline::{AssetCatalog, MediaResolver, Scene, Timeline};

use crate::generator::{GenerationRequest, SceneGenerator};

/// Stored duration disagrees with what the module declares. Informational:
/// the module is the source of truth for rendering, the stored value for
/// timeline math.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationMismatch {
    pub stored_frames: u32,
    pub declared_frames: u32,
}

/// What happened when one scene was compiled.
#[derive(Debug, Clone)]
pub struct CompileReport {
    pub scene_id: String,
    pub success: bool,
    pub warnings: Vec<String>,
    pub duration_mismatch: Option<DurationMismatch>,
}

/// Compile a scene's source and record the result on the scene itself.
pub fn compile_into_scene(scene: &mut Scene) -> CompileReport {
    match compile_scene(&scene.source_code) {
        Ok(output) => {
            let warnings: Vec<String> =
                output.warnings.iter().map(|w| w.to_string()).collect();
            for w in &warnings {
                warn!(scene = %scene.id, "{w}");
            }

            let duration_mismatch = if output.declared_duration_frames != scene.duration_frames {
                warn!(
                    scene = %scene.id,
                    stored = scene.duration_frames,
                    declared = output.declared_duration_frames,
                    "module duration disagrees with stored duration"
                );
                Some(DurationMismatch {
                    stored_frames: scene.duration_frames,
                    declared_frames: output.declared_duration_frames,
                })
            } else {
                None
            };

            scene.mark_compiled(output.artifact, Utc::now());
            debug!(scene = %scene.id, "compiled");
            CompileReport {
                scene_id: scene.id.to_string(),
                success: true,
                warnings,
                duration_mismatch,
            }
        }
        Err(err) => {
            warn!(scene = %scene.id, error = %err, "compile failed");
            scene.mark_compile_failed(err.to_string());
            CompileReport {
                scene_id: scene.id.to_string(),
                success: false,
                warnings: Vec::new(),
                duration_mismatch: None,
            }
        }
    }
}

/// Compile every scene in the timeline, each on a blocking worker. Failures
/// stay local to their scene.
pub async fn compile_timeline(timeline: &mut Timeline) -> Vec<CompileReport> {
    let jobs: Vec<_> = timeline
        .scenes()
        .iter()
        .cloned()
        .map(|mut scene| {
            tokio::task::spawn_blocking(move || {
                let report = compile_into_scene(&mut scene);
                (scene, report)
            })
        })
        .collect();

    let mut reports = Vec::with_capacity(timeline.len());
    for result in join_all(jobs).await {
        match result {
            Ok((scene, report)) => {
                if let Some(slot) = timeline.get_mut(&scene.id) {
                    *slot = scene;
                }
                reports.push(report);
            }
            Err(join_err) => {
                warn!(error = %join_err, "compile worker panicked");
            }
        }
    }
    reports
}

/// Generate scene source and statically validate it, with at most one
/// retry. Foreign media URLs are rewritten against the project catalog and
/// the request's own media set before validation so a hallucinated URL
/// never reaches the compiler. URLs the request carries itself, such as a
/// fresh user upload or a page screenshot, are permitted even though no
/// catalog asset exists for them yet.
///
/// Returns the best source obtained plus any validation failures still
/// outstanding. A second validation failure does not abort: the source is
/// handed to the compile stage, which records the concrete error on the
/// scene.
pub async fn generate_validated(
    generator: &dyn SceneGenerator,
    catalog: &AssetCatalog,
    request: &GenerationRequest,
) -> ForgeResult<(String, Vec<String>)> {
    let resolver = MediaResolver::new(catalog);

    let first = generator.generate(request).await?;
    let first = resolver.rewrite_foreign_urls(&first, &request.media_urls);
    let failures = match validate_source(&first) {
        Ok(()) => return Ok((first, Vec::new())),
        Err(failures) => failures,
    };
    warn!(count = failures.len(), "generated source failed validation, retrying once");

    let mut retry_request = request.clone();
    retry_request.extra_constraints.extend(
        failures
            .iter()
            .map(|f| format!("Previous attempt was rejected: {f}. Fix this.")),
    );

    let second = match generator.generate(&retry_request).await {
        Ok(source) => resolver.rewrite_foreign_urls(&source, &request.media_urls),
        // A transport error on the retry falls back to the first attempt.
        Err(ForgeError::Timeout(_)) | Err(ForgeError::Cancelled) => {
            return Ok((first, failures));
        }
        Err(err) => return Err(err),
    };

    match validate_source(&second) {
        Ok(()) => Ok((second, Vec::new())),
        Err(second_failures) => {
            warn!(
                count = second_failures.len(),
                "retry still invalid, passing through to compile"
            );
            Ok((second, second_failures))
        }
    }
}
