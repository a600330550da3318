//! The edit-request pipeline.
//!
//! One request in, exactly one structural operation out. Requests for the
//! same project run strictly one at a time; the timeline is loaded once,
//! mutated in memory, and written back in a single store call, so a timeout
//! or cancellation mid-request never leaves a half-applied operation behind.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex as TokioMutex;
use tracing::{info, warn};

use reelforge_core::duration::parse_duration_delta_frames;
use reelforge_core::{ForgeConfig, ForgeError, ForgeResult};
use reelforge_timeline::{
    AssetCatalog, MediaAsset, MediaKind, MediaResolver, ResolvedMedia, Scene, SceneId, Timeline,
};

use crate::client::ChatModel;
use crate::compile::{compile_into_scene, generate_validated};
use crate::context::{AssetSource, ChatHistory, ContextBuilder, SceneStore, WebAnalyzer};
use crate::generator::{GenerationRequest, SceneGenerator};
use crate::router::{IntentRouter, ToolDecision, ToolName};
use crate::tools::{self, BaseInput, ToolInput, ToolPayload};

/// Pipeline stages, in order, for progress reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ContextBuilt,
    ToolRouted,
    CodeGenerated,
    Validated,
    Compiled,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::ContextBuilt => "context_built",
            Stage::ToolRouted => "tool_routed",
            Stage::CodeGenerated => "code_generated",
            Stage::Validated => "validated",
            Stage::Compiled => "compiled",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One user edit request.
#[derive(Debug, Clone)]
pub struct EditRequest {
    pub prompt: String,
    pub project_id: String,
    /// Images attached to this request.
    pub image_urls: Vec<String>,
}

impl EditRequest {
    pub fn new(prompt: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            project_id: project_id.into(),
            image_urls: Vec::new(),
        }
    }
}

/// What one request did to the timeline.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    pub tool_used: ToolName,
    pub reasoning: String,
    pub chat_response: String,
    /// The scene created or changed, in its post-compile state.
    pub scene_delta: Option<Scene>,
    pub deleted_scene_id: Option<SceneId>,
    /// A scene-local failure (compile error). The request itself succeeded.
    pub error: Option<String>,
    pub warnings: Vec<String>,
}

/// One async mutex per project id, so concurrent requests for the same
/// project serialize while distinct projects proceed in parallel.
#[derive(Default)]
struct ProjectLocks {
    inner: StdMutex<HashMap<String, Arc<TokioMutex<()>>>>,
}

impl ProjectLocks {
    fn lock_for(&self, project_id: &str) -> Arc<TokioMutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        // Entries nobody holds anymore (strong count 1: the map's own Arc)
        // are dead; evicting them here keeps the map bounded by the number
        // of in-flight projects.
        map.retain(|_, lock| Arc::strong_count(lock) > 1);
        map.entry(project_id.to_string()).or_default().clone()
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Wraps the raw generator with URL rewriting and validate-with-one-retry.
/// Outstanding validation failures are stashed for the caller to surface as
/// warnings; the source still flows on to the compiler.
struct ValidatingGenerator<'a> {
    inner: &'a dyn SceneGenerator,
    catalog: &'a AssetCatalog,
    outstanding: StdMutex<Vec<String>>,
}

impl<'a> ValidatingGenerator<'a> {
    fn new(inner: &'a dyn SceneGenerator, catalog: &'a AssetCatalog) -> Self {
        Self {
            inner,
            catalog,
            outstanding: StdMutex::new(Vec::new()),
        }
    }

    fn take_failures(&self) -> Vec<String> {
        std::mem::take(&mut self.outstanding.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

#[async_trait]
impl SceneGenerator for ValidatingGenerator<'_> {
    async fn generate(&self, request: &GenerationRequest) -> ForgeResult<String> {
        let (source, failures) = generate_validated(self.inner, self.catalog, request).await?;
        *self.outstanding.lock().unwrap_or_else(|e| e.into_inner()) = failures;
        Ok(source)
    }
}

/// The request pipeline and its collaborators.
pub struct Pipeline {
    config: ForgeConfig,
    store: Arc<dyn SceneStore>,
    chat: Arc<dyn ChatHistory>,
    assets: Arc<dyn AssetSource>,
    web: Option<Arc<dyn WebAnalyzer>>,
    model: Arc<dyn ChatModel>,
    generator: Arc<dyn SceneGenerator>,
    locks: ProjectLocks,
}

impl Pipeline {
    pub fn new(
        config: ForgeConfig,
        store: Arc<dyn SceneStore>,
        chat: Arc<dyn ChatHistory>,
        assets: Arc<dyn AssetSource>,
        model: Arc<dyn ChatModel>,
        generator: Arc<dyn SceneGenerator>,
    ) -> Self {
        Self {
            config,
            store,
            chat,
            assets,
            web: None,
            model,
            generator,
            locks: ProjectLocks::default(),
        }
    }

    pub fn with_web_analyzer(mut self, web: Arc<dyn WebAnalyzer>) -> Self {
        self.web = Some(web);
        self
    }

    pub async fn handle_request(&self, request: EditRequest) -> ForgeResult<RequestOutcome> {
        self.handle_request_with_progress(request, |_| {}).await
    }

    /// Run one request end to end, reporting each stage as it completes.
    pub async fn handle_request_with_progress<F>(
        &self,
        request: EditRequest,
        on_stage: F,
    ) -> ForgeResult<RequestOutcome>
    where
        F: Fn(Stage),
    {
        let lock = self.locks.lock_for(&request.project_id);
        let _guard = lock.lock().await;

        let mut timeline = self.store.load_timeline(&request.project_id).await?;

        let web = self.web.as_deref();
        let builder = ContextBuilder::new(
            self.chat.as_ref(),
            web,
            self.config.limits.context_message_window,
        );
        let packet = builder
            .build(
                &request.project_id,
                &request.prompt,
                &request.image_urls,
                &timeline,
            )
            .await?;
        let catalog = self.assets.catalog(&request.project_id).await?;
        on_stage(Stage::ContextBuilt);

        let router = IntentRouter::new(self.model.as_ref());
        let decision = self
            .with_deadline(router.route(&request.prompt, &packet, &timeline))
            .await?;
        on_stage(Stage::ToolRouted);

        let validating = ValidatingGenerator::new(self.generator.as_ref(), &catalog);
        let input = self.build_tool_input(&request, &packet, &decision, &timeline, &catalog)?;
        let needs_generation = matches!(input, ToolInput::Add { .. } | ToolInput::Edit { .. });

        let output = match self
            .with_deadline(tools::execute(input, &validating))
            .await
        {
            Ok(output) => output,
            Err(err) if err.is_request_fatal() => return Err(err),
            Err(err) => {
                // Generation-level failure: the request completes with no
                // timeline change and the failure surfaces in the outcome.
                warn!(error = %err, "operation failed without touching the timeline");
                return Ok(RequestOutcome {
                    tool_used: decision.tool,
                    reasoning: decision.reasoning,
                    chat_response: "I couldn't complete that edit. Nothing was changed."
                        .to_string(),
                    scene_delta: None,
                    deleted_scene_id: None,
                    error: Some(err.to_string()),
                    warnings: Vec::new(),
                });
            }
        };
        if needs_generation {
            on_stage(Stage::CodeGenerated);
            on_stage(Stage::Validated);
        }

        let mut warnings: Vec<String> = validating.take_failures();
        let mut scene_delta = None;
        let mut deleted_scene_id = None;
        let mut error = None;

        match output.payload {
            ToolPayload::Created {
                source_code,
                name,
                duration_frames,
            } => {
                let scene = Scene::new(name, duration_frames, source_code);
                let id = timeline.append(scene);
                if let Some(scene) = timeline.get_mut(&id) {
                    let report = compile_into_scene(scene);
                    warnings.extend(report.warnings);
                    error = scene.compilation_error.clone();
                    scene_delta = Some(scene.clone());
                }
            }
            ToolPayload::Edited {
                target,
                source_code,
                duration_frames,
            } => {
                if let Some(frames) = duration_frames {
                    timeline.retime(&target, frames)?;
                }
                let scene = timeline.get_mut(&target).ok_or_else(|| {
                    ForgeError::InvalidArgument(format!("no scene with id {target}"))
                })?;
                scene.replace_source(source_code);
                let report = compile_into_scene(scene);
                warnings.extend(report.warnings);
                if let Some(mismatch) = report.duration_mismatch {
                    warnings.push(format!(
                        "scene duration is stored as {} frames but the module declares {}",
                        mismatch.stored_frames, mismatch.declared_frames
                    ));
                }
                error = scene.compilation_error.clone();
                scene_delta = Some(scene.clone());
            }
            ToolPayload::Deleted { target } => {
                let removed = timeline.remove(&target)?;
                deleted_scene_id = Some(removed.id);
            }
            ToolPayload::Retimed {
                target,
                duration_frames,
            } => {
                timeline.retime(&target, duration_frames)?;
                scene_delta = timeline.get(&target).cloned();
            }
        }
        on_stage(Stage::Compiled);

        // Single write; everything above mutated only the in-memory copy.
        self.store
            .store_timeline(&request.project_id, &timeline)
            .await?;

        let mut chat_response = output.chat_response;
        if !decision.user_feedback.is_empty() {
            chat_response.push(' ');
            chat_response.push_str(&decision.user_feedback);
        }

        info!(
            tool = %decision.tool,
            scenes = timeline.len(),
            warnings = warnings.len(),
            "request complete"
        );
        Ok(RequestOutcome {
            tool_used: decision.tool,
            reasoning: if output.reasoning.is_empty() {
                decision.reasoning
            } else {
                output.reasoning
            },
            chat_response,
            scene_delta,
            deleted_scene_id,
            error,
            warnings,
        })
    }

    fn build_tool_input(
        &self,
        request: &EditRequest,
        packet: &crate::context::ContextPacket,
        decision: &ToolDecision,
        timeline: &Timeline,
        catalog: &AssetCatalog,
    ) -> ForgeResult<ToolInput> {
        let base = BaseInput {
            user_prompt: prompt_with_web_context(request, packet),
            project_id: request.project_id.clone(),
            requested_duration_frames: decision.requested_duration_frames,
        };

        let reference_sources: Vec<String> = decision
            .referenced_scene_ids
            .iter()
            .filter_map(|id| timeline.get(id))
            .map(|s| s.source_code.clone())
            .collect();

        let target = |id: &Option<SceneId>| -> ForgeResult<SceneId> {
            id.clone().ok_or_else(|| {
                ForgeError::ToolSelection(format!("{} routed without a target", decision.tool))
            })
        };

        Ok(match decision.tool {
            ToolName::AddScene => ToolInput::Add {
                base,
                format: self.config.format.clone(),
                resolved_media: resolve_request_media(request, packet, catalog),
                reference_sources,
            },
            ToolName::EditScene => {
                let id = target(&decision.target_scene_id)?;
                let current_source = timeline
                    .get(&id)
                    .map(|s| s.source_code.clone())
                    .ok_or_else(|| {
                        ForgeError::InvalidArgument(format!("no scene with id {id}"))
                    })?;
                ToolInput::Edit {
                    base,
                    target: id,
                    current_source,
                    format: self.config.format.clone(),
                    resolved_media: resolve_request_media(request, packet, catalog),
                    reference_sources,
                }
            }
            ToolName::DeleteScene => ToolInput::Delete {
                base,
                target: target(&decision.target_scene_id)?,
            },
            ToolName::RetimeScene => {
                let id = target(&decision.target_scene_id)?;
                let current_duration_frames = timeline
                    .get(&id)
                    .map(|s| s.duration_frames)
                    .ok_or_else(|| {
                        ForgeError::InvalidArgument(format!("no scene with id {id}"))
                    })?;
                ToolInput::Retime {
                    base,
                    target: id,
                    current_duration_frames,
                    explicit_frames: decision.explicit_duration_frames,
                    delta_frames: parse_duration_delta_frames(&request.prompt),
                }
            }
        })
    }

    async fn with_deadline<T>(
        &self,
        fut: impl Future<Output = ForgeResult<T>>,
    ) -> ForgeResult<T> {
        let ms = self.config.limits.call_timeout_ms;
        match tokio::time::timeout(Duration::from_millis(ms), fut).await {
            Ok(result) => result,
            Err(_) => Err(ForgeError::Timeout(ms)),
        }
    }
}

/// Media the generator may reference: catalog assets matched from the
/// prompt, plus this request's uploads and any screenshots from web
/// analysis (both trusted at full confidence).
fn resolve_request_media(
    request: &EditRequest,
    packet: &crate::context::ContextPacket,
    catalog: &AssetCatalog,
) -> Vec<ResolvedMedia> {
    let resolver = MediaResolver::new(catalog);
    let mut media = resolver.resolve_all(&request.prompt);

    let extra_urls = request.image_urls.iter().chain(
        packet
            .web_context
            .iter()
            .flat_map(|w| w.screenshot_urls.iter()),
    );
    for (i, url) in extra_urls.enumerate() {
        if media.iter().any(|m| &m.asset.url == url) {
            continue;
        }
        media.push(ResolvedMedia {
            asset: MediaAsset::new(format!("request-{i}"), url.clone(), MediaKind::Image),
            confidence: 1.0,
        });
    }
    media
}

/// Fold web-analysis findings into the prompt handed to the executors.
fn prompt_with_web_context(
    request: &EditRequest,
    packet: &crate::context::ContextPacket,
) -> String {
    match &packet.web_context {
        None => request.prompt.clone(),
        Some(web) => {
            let mut prompt = request.prompt.clone();
            prompt.push_str(&format!(
                "\n\nContent extracted from {}:\ntitle: {}\ndescription: {}\n",
                web.original_url, web.title, web.description
            ));
            for heading in &web.headings {
                prompt.push_str(&format!("heading: {heading}\n"));
            }
            prompt
        }
    }
}
