//! Intent routing — the single decision point ("brain") of the pipeline.
//!
//! One model call per request, one [`ToolDecision`] out. Multi-operation
//! prompts ("delete scenes 3 and 4") are deliberately not decomposed: the
//! router picks one operation and the chat reply tells the user to ask
//! again for the rest. A decision that names anything outside the closed
//! tool enumeration is a fatal `ToolSelection` error, never a silent
//! default.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use reelforge_core::{parse_duration_frames, ForgeError, ForgeResult};
use reelforge_timeline::{SceneId, Timeline};

use crate::client::{strip_code_fence, ChatModel};
use crate::context::ContextPacket;

static SCENE_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bscenes?\s+(\d+)").unwrap());

static BACK_REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:same\s+as|like|match(?:ing)?|similar\s+to)\s+scene\s+(\d+)").unwrap()
});

/// The closed set of structural operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    AddScene,
    EditScene,
    DeleteScene,
    RetimeScene,
}

impl ToolName {
    /// Parse a model-emitted tool name. Anything outside the enumeration is
    /// a routing failure, by contract.
    pub fn parse(raw: &str) -> ForgeResult<Self> {
        match raw.trim().to_lowercase().as_str() {
            "add_scene" | "addscene" | "add" => Ok(ToolName::AddScene),
            "edit_scene" | "editscene" | "edit" => Ok(ToolName::EditScene),
            "delete_scene" | "deletescene" | "delete" => Ok(ToolName::DeleteScene),
            "retime_scene" | "retimescene" | "retime" | "change_duration" => {
                Ok(ToolName::RetimeScene)
            }
            other => Err(ForgeError::ToolSelection(format!(
                "model selected unknown tool '{other}'"
            ))),
        }
    }

    pub fn requires_target(&self) -> bool {
        !matches!(self, ToolName::AddScene)
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolName::AddScene => write!(f, "add_scene"),
            ToolName::EditScene => write!(f, "edit_scene"),
            ToolName::DeleteScene => write!(f, "delete_scene"),
            ToolName::RetimeScene => write!(f, "retime_scene"),
        }
    }
}

/// The routed operation: which tool, on which scene, with what constraints.
#[derive(Debug, Clone)]
pub struct ToolDecision {
    pub tool: ToolName,
    pub target_scene_id: Option<SceneId>,
    pub requested_duration_frames: Option<u32>,
    /// Exact frame count the routing model extracted, e.g. for "make it
    /// exactly 4 seconds". Preferred over the parsed prompt duration when
    /// retiming.
    pub explicit_duration_frames: Option<u32>,
    /// Scenes named as style references ("same as scene 2"). Never changes
    /// the target.
    pub referenced_scene_ids: Vec<SceneId>,
    pub reasoning: String,
    /// Short note surfaced to the user alongside the result.
    pub user_feedback: String,
}

/// Wire shape the routing model replies with.
#[derive(Debug, Deserialize)]
struct RawDecision {
    tool: String,
    #[serde(default)]
    target_scene_id: Option<String>,
    #[serde(default)]
    duration_frames: Option<u32>,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    user_feedback: String,
}

const ROUTER_SYSTEM_PROMPT: &str = r#"You route a video-editing request to exactly one structural operation.

Available tools (choose exactly one):
- add_scene: create a new scene at the end of the timeline
- edit_scene: change the content/animation of one existing scene
- delete_scene: remove one existing scene
- retime_scene: change only the duration of one existing scene

Rules:
- Pick exactly ONE tool and at most ONE target scene. If the request names
  several operations or several scenes, handle only the first and say so in
  user_feedback.
- References like "same as scene 2" are style references, not targets.
- edit_scene/delete_scene/retime_scene require target_scene_id from the
  scene list you are given.
- When the request names a concrete duration, set duration_frames to that
  value in frames at 30fps; otherwise leave it null.

Reply with JSON only:
{"tool": "...", "target_scene_id": "... or null", "duration_frames": <frames or null>, "reasoning": "...", "user_feedback": "..."}"#;

/// Model-backed intent router.
pub struct IntentRouter<'a> {
    model: &'a dyn ChatModel,
}

impl<'a> IntentRouter<'a> {
    pub fn new(model: &'a dyn ChatModel) -> Self {
        Self { model }
    }

    /// Route one request. Exactly one decision comes back; failure to name
    /// a valid tool or a required target is request-fatal.
    pub async fn route(
        &self,
        prompt: &str,
        packet: &ContextPacket,
        timeline: &Timeline,
    ) -> ForgeResult<ToolDecision> {
        let requested_duration_frames = parse_duration_frames(prompt);
        let referenced_scene_ids = back_referenced_scenes(prompt, timeline);

        // An empty project has exactly one sensible operation. No model
        // call, no chance of a fabricated target.
        if timeline.is_empty() {
            info!("empty timeline, routing to add_scene without a model call");
            return Ok(ToolDecision {
                tool: ToolName::AddScene,
                target_scene_id: None,
                requested_duration_frames,
                explicit_duration_frames: None,
                referenced_scene_ids,
                reasoning: "project has no scenes yet, so the request creates the first one"
                    .to_string(),
                user_feedback: String::new(),
            });
        }

        let user = build_routing_input(prompt, packet, timeline);
        let reply = self.model.complete(ROUTER_SYSTEM_PROMPT, &user).await?;
        let raw = parse_decision_json(&reply)?;

        let mut tool = ToolName::parse(&raw.tool)?;
        let mut target_scene_id = raw
            .target_scene_id
            .filter(|s| !s.is_empty() && s != "null")
            .map(SceneId::new);

        // Validate the model's target against the actual timeline; fall back
        // to an explicit "scene N" in the prompt before giving up.
        if let Some(id) = &target_scene_id {
            if timeline.get(id).is_none() {
                debug!(%id, "model named a target not on the timeline");
                target_scene_id = None;
            }
        }
        if target_scene_id.is_none() {
            target_scene_id = explicit_scene_target(prompt, timeline);
        }

        // Uploaded image + an explicit scene reference means the user wants
        // that scene changed, even when the prompt reads like new content.
        if packet.image_context.has_current_upload()
            && tool == ToolName::AddScene
            && target_scene_id.is_some()
        {
            debug!("image upload with explicit scene reference, rerouting add to edit");
            tool = ToolName::EditScene;
        }

        if tool.requires_target() && target_scene_id.is_none() {
            return Err(ForgeError::ToolSelection(format!(
                "{tool} requires a target scene but none could be identified"
            )));
        }
        if tool == ToolName::AddScene {
            target_scene_id = None;
        }

        info!(%tool, target = ?target_scene_id, "routed request");
        Ok(ToolDecision {
            tool,
            target_scene_id,
            requested_duration_frames,
            explicit_duration_frames: raw.duration_frames.filter(|f| *f > 0),
            referenced_scene_ids,
            reasoning: raw.reasoning,
            user_feedback: raw.user_feedback,
        })
    }
}

fn build_routing_input(prompt: &str, packet: &ContextPacket, timeline: &Timeline) -> String {
    let mut input = String::new();

    input.push_str("Scenes on the timeline (1-based position, id, name, frames):\n");
    for scene in timeline.scenes() {
        input.push_str(&format!(
            "{}. id={} name=\"{}\" duration={}f\n",
            scene.order + 1,
            scene.id,
            scene.name,
            scene.duration_frames
        ));
    }

    if !packet.conversation_summary.is_empty() {
        input.push_str(&format!(
            "\nConversation so far: {}\n",
            packet.conversation_summary
        ));
    }
    if packet.image_context.has_current_upload() {
        input.push_str(&format!(
            "\nThe user attached {} image(s) to this request.\n",
            packet.image_context.current_images.len()
        ));
    }

    input.push_str(&format!("\nRequest: {prompt}\n"));
    input
}

fn parse_decision_json(reply: &str) -> ForgeResult<RawDecision> {
    let body = strip_code_fence(reply);
    // Some models wrap JSON in prose; take the outermost object.
    let start = body.find('{');
    let end = body.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if e > s => &body[s..=e],
        _ => {
            return Err(ForgeError::ToolSelection(format!(
                "router reply contained no JSON object: {body}"
            )))
        }
    };
    serde_json::from_str(json)
        .map_err(|e| ForgeError::ToolSelection(format!("router reply was not valid JSON: {e}")))
}

/// Resolve an explicit "scene N" mention to a scene id. Back-references
/// ("same as scene N") are excluded: they are style references.
fn explicit_scene_target(prompt: &str, timeline: &Timeline) -> Option<SceneId> {
    let back_positions: Vec<u32> = BACK_REF_RE
        .captures_iter(prompt)
        .filter_map(|c| c[1].parse().ok())
        .collect();

    SCENE_REF_RE
        .captures_iter(prompt)
        .filter_map(|c| c[1].parse::<u32>().ok())
        .find(|pos| !back_positions.contains(pos))
        .and_then(|pos| timeline.get_by_position(pos))
        .map(|s| s.id.clone())
}

/// Scenes named as style references in the prompt.
fn back_referenced_scenes(prompt: &str, timeline: &Timeline) -> Vec<SceneId> {
    BACK_REF_RE
        .captures_iter(prompt)
        .filter_map(|c| c[1].parse::<u32>().ok())
        .filter_map(|pos| timeline.get_by_position(pos))
        .map(|s| s.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelforge_timeline::Scene;

    fn timeline(n: usize) -> Timeline {
        let mut t = Timeline::new();
        for i in 0..n {
            t.append(Scene::new(format!("s{i}"), 90, "scene(\"s\", 90f) {}"));
        }
        t
    }

    #[test]
    fn test_tool_name_parse_closed_set() {
        assert_eq!(ToolName::parse("add_scene").unwrap(), ToolName::AddScene);
        assert_eq!(ToolName::parse("Edit").unwrap(), ToolName::EditScene);
        assert!(matches!(
            ToolName::parse("merge_scenes"),
            Err(ForgeError::ToolSelection(_))
        ));
        assert!(ToolName::parse("").is_err());
    }

    #[test]
    fn test_requires_target() {
        assert!(!ToolName::AddScene.requires_target());
        assert!(ToolName::DeleteScene.requires_target());
        assert!(ToolName::RetimeScene.requires_target());
    }

    #[test]
    fn test_parse_decision_json_with_fence_and_prose() {
        let raw = parse_decision_json(
            "Sure!\n```json\n{\"tool\": \"delete_scene\", \"target_scene_id\": \"abc\"}\n```",
        )
        .unwrap();
        assert_eq!(raw.tool, "delete_scene");
        assert_eq!(raw.target_scene_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_parse_decision_json_rejects_prose_only() {
        assert!(matches!(
            parse_decision_json("I think you should delete it"),
            Err(ForgeError::ToolSelection(_))
        ));
    }

    #[test]
    fn test_explicit_scene_target_one_based() {
        let t = timeline(3);
        let id = explicit_scene_target("delete scene 2", &t).unwrap();
        assert_eq!(&id, &t.scenes()[1].id);
        assert!(explicit_scene_target("delete scene 9", &t).is_none());
    }

    #[test]
    fn test_back_reference_is_not_a_target() {
        let t = timeline(3);
        // "same as scene 2" is a style reference; the real target is scene 3.
        let prompt = "make scene 3 look the same as scene 2";
        let refs = back_referenced_scenes(prompt, &t);
        assert_eq!(refs, vec![t.scenes()[1].id.clone()]);
        let target = explicit_scene_target(prompt, &t).unwrap();
        assert_eq!(&target, &t.scenes()[2].id);
    }

    #[test]
    fn test_multi_scene_prompt_takes_first_target() {
        let t = timeline(4);
        // Plural and singular phrasing both resolve to the first scene named.
        let target = explicit_scene_target("delete scenes 3 and 4", &t).unwrap();
        let target2 = explicit_scene_target("delete scene 3 and scene 4", &t).unwrap();
        assert_eq!(&target, &t.scenes()[2].id);
        assert_eq!(&target2, &t.scenes()[2].id);
    }

    struct CannedModel(String);

    #[async_trait::async_trait]
    impl ChatModel for CannedModel {
        async fn complete(&self, _system: &str, _user: &str) -> ForgeResult<String> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_plural_scene_reference_rescues_null_target() {
        let t = timeline(4);
        let model = CannedModel(
            r#"{"tool": "delete_scene", "target_scene_id": null,
                "user_feedback": "Deleted scene 3; ask again for scene 4."}"#
                .to_string(),
        );
        let router = IntentRouter::new(&model);
        let decision = router
            .route("delete scenes 3 and 4", &ContextPacket::default(), &t)
            .await
            .unwrap();
        assert_eq!(decision.tool, ToolName::DeleteScene);
        assert_eq!(decision.target_scene_id, Some(t.scenes()[2].id.clone()));
    }

    #[tokio::test]
    async fn test_model_duration_carried_on_decision() {
        let t = timeline(2);
        let model = CannedModel(
            r#"{"tool": "retime_scene", "target_scene_id": null, "duration_frames": 45}"#
                .to_string(),
        );
        let router = IntentRouter::new(&model);
        let decision = router
            .route("make scene 1 snappier", &ContextPacket::default(), &t)
            .await
            .unwrap();
        assert_eq!(decision.tool, ToolName::RetimeScene);
        assert_eq!(decision.explicit_duration_frames, Some(45));
    }
}
