//! Per-request context assembly.
//!
//! The [`ContextPacket`] is an ephemeral, read-only snapshot handed to the
//! intent router and the code generator. It is rebuilt for every request and
//! never persisted.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use reelforge_core::ForgeResult;
use reelforge_timeline::{AssetCatalog, SceneId, Timeline};

static PROMPT_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^\s]+").unwrap());

/// One scene's identity and source, for cross-scene style reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSummary {
    pub id: SceneId,
    pub name: String,
    pub order: u32,
    pub source_code: String,
}

/// A chat turn as the external transcript stores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageContext {
    /// Images attached to the current request.
    pub current_images: Vec<String>,
    /// Images seen in recent chat turns.
    pub recent_images_from_chat: Vec<String>,
}

impl ImageContext {
    pub fn has_current_upload(&self) -> bool {
        !self.current_images.is_empty()
    }
}

/// Extracted page/video analysis for a URL mentioned in the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebContext {
    pub original_url: String,
    pub title: String,
    pub description: String,
    pub headings: Vec<String>,
    pub screenshot_urls: Vec<String>,
}

/// Read-only snapshot assembled per request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextPacket {
    pub scene_history: Vec<SceneSummary>,
    pub conversation_summary: String,
    pub recent_messages: Vec<ChatMessage>,
    pub image_context: ImageContext,
    pub web_context: Option<WebContext>,
}

/// Scene persistence collaborator. The pipeline reads the full timeline,
/// mutates a copy, and writes it back in one call — the store never sees a
/// half-applied operation.
#[async_trait]
pub trait SceneStore: Send + Sync {
    async fn load_timeline(&self, project_id: &str) -> ForgeResult<Timeline>;
    async fn store_timeline(&self, project_id: &str, timeline: &Timeline) -> ForgeResult<()>;
}

/// Chat transcript collaborator, read-only.
#[async_trait]
pub trait ChatHistory: Send + Sync {
    async fn recent_messages(&self, project_id: &str, limit: usize)
        -> ForgeResult<Vec<ChatMessage>>;
    async fn conversation_summary(&self, project_id: &str) -> ForgeResult<String>;
}

/// Uploaded-asset registry collaborator, read-only.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn catalog(&self, project_id: &str) -> ForgeResult<AssetCatalog>;
}

/// External page/video analysis collaborator. Optional — `None` simply
/// leaves `web_context` empty.
#[async_trait]
pub trait WebAnalyzer: Send + Sync {
    async fn analyze(&self, url: &str) -> ForgeResult<Option<WebContext>>;
}

/// Assembles a [`ContextPacket`] from the collaborators.
pub struct ContextBuilder<'a> {
    chat: &'a dyn ChatHistory,
    web: Option<&'a dyn WebAnalyzer>,
    message_window: usize,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(
        chat: &'a dyn ChatHistory,
        web: Option<&'a dyn WebAnalyzer>,
        message_window: usize,
    ) -> Self {
        Self {
            chat,
            web,
            message_window,
        }
    }

    pub async fn build(
        &self,
        project_id: &str,
        prompt: &str,
        current_images: &[String],
        timeline: &Timeline,
    ) -> ForgeResult<ContextPacket> {
        let scene_history = timeline
            .scenes()
            .iter()
            .map(|s| SceneSummary {
                id: s.id.clone(),
                name: s.name.clone(),
                order: s.order,
                source_code: s.source_code.clone(),
            })
            .collect();

        let recent_messages = self
            .chat
            .recent_messages(project_id, self.message_window)
            .await?;
        let conversation_summary = self.chat.conversation_summary(project_id).await?;

        let recent_images_from_chat = recent_messages
            .iter()
            .flat_map(|m| m.image_urls.iter().cloned())
            .collect();

        let web_context = match (self.web, detect_url(prompt)) {
            (Some(analyzer), Some(url)) => {
                debug!(%url, "analyzing URL found in prompt");
                analyzer.analyze(&url).await?
            }
            _ => None,
        };

        Ok(ContextPacket {
            scene_history,
            conversation_summary,
            recent_messages,
            image_context: ImageContext {
                current_images: current_images.to_vec(),
                recent_images_from_chat,
            },
            web_context,
        })
    }
}

/// First URL in a prompt, with trailing punctuation trimmed.
pub fn detect_url(prompt: &str) -> Option<String> {
    PROMPT_URL_RE
        .find(prompt)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ')', '!', '?']).to_string())
}
