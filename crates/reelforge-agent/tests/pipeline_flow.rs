//! End-to-end pipeline tests with scripted model replies and in-memory
//! collaborators. No network, no real model.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use reelforge_agent::context::{AssetSource, ChatHistory, ChatMessage, SceneStore};
use reelforge_agent::{
    ChatModel, EditRequest, GenerationRequest, Pipeline, SceneGenerator, Stage, ToolName,
};
use reelforge_core::{ForgeConfig, ForgeError, ForgeResult};
use reelforge_timeline::{AssetCatalog, MediaAsset, MediaKind, Scene, Timeline};

struct MemoryStore {
    timelines: Mutex<HashMap<String, Timeline>>,
    writes: Mutex<u32>,
}

impl MemoryStore {
    fn new() -> Self {
        Self {
            timelines: Mutex::new(HashMap::new()),
            writes: Mutex::new(0),
        }
    }

    fn seed(&self, project_id: &str, timeline: Timeline) {
        self.timelines
            .lock()
            .unwrap()
            .insert(project_id.to_string(), timeline);
    }

    fn current(&self, project_id: &str) -> Timeline {
        self.timelines
            .lock()
            .unwrap()
            .get(project_id)
            .cloned()
            .unwrap_or_default()
    }

    fn write_count(&self) -> u32 {
        *self.writes.lock().unwrap()
    }
}

#[async_trait]
impl SceneStore for MemoryStore {
    async fn load_timeline(&self, project_id: &str) -> ForgeResult<Timeline> {
        Ok(self.current(project_id))
    }

    async fn store_timeline(&self, project_id: &str, timeline: &Timeline) -> ForgeResult<()> {
        assert!(
            timeline.orders_are_dense(),
            "a non-dense timeline must never reach the store"
        );
        *self.writes.lock().unwrap() += 1;
        self.seed(project_id, timeline.clone());
        Ok(())
    }
}

struct EmptyChat;

#[async_trait]
impl ChatHistory for EmptyChat {
    async fn recent_messages(
        &self,
        _project_id: &str,
        _limit: usize,
    ) -> ForgeResult<Vec<ChatMessage>> {
        Ok(Vec::new())
    }

    async fn conversation_summary(&self, _project_id: &str) -> ForgeResult<String> {
        Ok(String::new())
    }
}

struct FixedAssets(AssetCatalog);

#[async_trait]
impl AssetSource for FixedAssets {
    async fn catalog(&self, _project_id: &str) -> ForgeResult<AssetCatalog> {
        Ok(self.0.clone())
    }
}

/// Router model that replies from a script, in order.
struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedModel {
    fn new<I: IntoIterator<Item = &'static str>>(replies: I) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(String::from).collect()),
        }
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, _system: &str, _user: &str) -> ForgeResult<String> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ForgeError::Other("scripted model ran out of replies".to_string()))
    }
}

/// A router model that must never be consulted.
struct UnreachableModel;

#[async_trait]
impl ChatModel for UnreachableModel {
    async fn complete(&self, _system: &str, _user: &str) -> ForgeResult<String> {
        panic!("router model must not be called for this request");
    }
}

struct ScriptedGenerator {
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<u32>,
}

impl ScriptedGenerator {
    fn new<I: IntoIterator<Item = &'static str>>(replies: I) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(String::from).collect()),
            calls: Mutex::new(0),
        }
    }

    fn call_count(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl SceneGenerator for ScriptedGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> ForgeResult<String> {
        *self.calls.lock().unwrap() += 1;
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ForgeError::Generation("scripted generator exhausted".to_string()))
    }
}

const INTRO_150F: &str = concat!(
    "scene(\"Intro\", 150f) {\n",
    "    layer(\"bg\") { solid(#101020) }\n",
    "    layer(\"title\") {\n",
    "        text(\"Welcome\", size: 72, color: #ffffff)\n",
    "        animate(opacity, from: 0, to: 1, start: 0f, end: 20f)\n",
    "    }\n",
    "}\n"
);

// Unbalanced brace: fails static validation and compilation.
const BROKEN_MODULE: &str = "scene(\"Broken\", 90f) {\n    layer(\"bg\") { solid(#101020)\n";

fn pipeline(
    store: Arc<MemoryStore>,
    model: Arc<dyn ChatModel>,
    generator: Arc<ScriptedGenerator>,
    catalog: AssetCatalog,
) -> Pipeline {
    Pipeline::new(
        ForgeConfig::default(),
        store,
        Arc::new(EmptyChat),
        Arc::new(FixedAssets(catalog)),
        model,
        generator,
    )
}

fn seeded_store(project: &str, scene_count: usize) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let mut timeline = Timeline::new();
    for i in 0..scene_count {
        timeline.append(Scene::new(
            format!("Scene {}", i + 1),
            90,
            format!("scene(\"Scene {}\", 90f) {{\n    layer(\"bg\") {{ solid(#000000) }}\n}}\n", i + 1),
        ));
    }
    store.seed(project, timeline);
    store
}

#[tokio::test]
async fn first_request_on_empty_project_adds_without_routing_call() {
    let store = Arc::new(MemoryStore::new());
    let generator = Arc::new(ScriptedGenerator::new([INTRO_150F]));
    let pipeline = pipeline(
        store.clone(),
        Arc::new(UnreachableModel),
        generator.clone(),
        AssetCatalog::default(),
    );

    let outcome = pipeline
        .handle_request(EditRequest::new("create a 5 second intro", "p1"))
        .await
        .unwrap();

    assert_eq!(outcome.tool_used, ToolName::AddScene);
    assert!(outcome.error.is_none());
    let scene = outcome.scene_delta.expect("add must return the new scene");
    assert_eq!(scene.duration_frames, 150);
    assert_eq!(scene.order, 0);
    assert!(scene.is_compiled());

    let stored = store.current("p1");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored.total_frames(), 150);
    assert_eq!(store.write_count(), 1);
}

#[tokio::test]
async fn delete_renumbers_and_stays_single_operation() {
    let store = seeded_store("p1", 3);
    let model = Arc::new(ScriptedModel::new([
        r#"{"tool":"delete_scene","target_scene_id":null,"reasoning":"user asked to remove","user_feedback":"I removed scene 1; ask again to delete scene 2."}"#,
    ]));
    let generator = Arc::new(ScriptedGenerator::new([]));
    let pipeline = pipeline(store.clone(), model, generator.clone(), AssetCatalog::default());

    let outcome = pipeline
        .handle_request(EditRequest::new("delete scene 1 and scene 2", "p1"))
        .await
        .unwrap();

    assert_eq!(outcome.tool_used, ToolName::DeleteScene);
    assert!(outcome.deleted_scene_id.is_some());
    assert!(outcome.chat_response.contains("ask again"));
    // Exactly one scene removed, the generator never consulted.
    let stored = store.current("p1");
    assert_eq!(stored.len(), 2);
    assert!(stored.orders_are_dense());
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn retime_from_relative_phrase_applies_delta() {
    let store = seeded_store("p1", 1);
    let model = Arc::new(ScriptedModel::new([
        r#"{"tool":"retime_scene","target_scene_id":null,"reasoning":"duration-only change","user_feedback":""}"#,
    ]));
    let generator = Arc::new(ScriptedGenerator::new([]));
    let pipeline = pipeline(store.clone(), model, generator.clone(), AssetCatalog::default());

    let outcome = pipeline
        .handle_request(EditRequest::new("make scene 1 2 seconds longer", "p1"))
        .await
        .unwrap();

    assert_eq!(outcome.tool_used, ToolName::RetimeScene);
    // 90 stored + 60 frame delta.
    assert_eq!(outcome.scene_delta.unwrap().duration_frames, 150);
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn malformed_generation_degrades_to_scene_error() {
    let store = Arc::new(MemoryStore::new());
    let generator = Arc::new(ScriptedGenerator::new([BROKEN_MODULE, BROKEN_MODULE]));
    let pipeline = pipeline(
        store.clone(),
        Arc::new(UnreachableModel),
        generator.clone(),
        AssetCatalog::default(),
    );

    let outcome = pipeline
        .handle_request(EditRequest::new("create an intro", "p1"))
        .await
        .unwrap();

    // The request succeeds; the failure lives on the scene.
    assert!(outcome.error.is_some());
    assert!(!outcome.warnings.is_empty());
    let stored = store.current("p1");
    assert_eq!(stored.len(), 1);
    assert!(stored.scenes()[0].compilation_error.is_some());
    assert!(stored.scenes()[0].compiled_artifact.is_none());
    // One validation retry, no more.
    assert_eq!(generator.call_count(), 2);
}

#[tokio::test]
async fn broken_edit_leaves_sibling_scenes_untouched() {
    let store = seeded_store("p1", 2);
    let model = Arc::new(ScriptedModel::new([
        r#"{"tool":"edit_scene","target_scene_id":null,"reasoning":"content change","user_feedback":""}"#,
    ]));
    let generator = Arc::new(ScriptedGenerator::new([BROKEN_MODULE, BROKEN_MODULE]));
    let pipeline = pipeline(store.clone(), model, generator, AssetCatalog::default());

    let outcome = pipeline
        .handle_request(EditRequest::new("rework scene 2 completely", "p1"))
        .await
        .unwrap();

    assert!(outcome.error.is_some());
    let stored = store.current("p1");
    assert!(stored.scenes()[1].compilation_error.is_some());
    // The sibling keeps its clean state.
    assert!(stored.scenes()[0].compilation_error.is_none());
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn unknown_tool_from_model_is_request_fatal() {
    let store = seeded_store("p1", 1);
    let model = Arc::new(ScriptedModel::new([
        r#"{"tool":"merge_scenes","target_scene_id":null,"reasoning":"","user_feedback":""}"#,
    ]));
    let generator = Arc::new(ScriptedGenerator::new([]));
    let pipeline = pipeline(store.clone(), model, generator, AssetCatalog::default());

    let err = pipeline
        .handle_request(EditRequest::new("combine everything", "p1"))
        .await
        .unwrap_err();

    assert!(matches!(err, ForgeError::ToolSelection(_)));
    // Nothing was written.
    assert_eq!(store.write_count(), 0);
    assert_eq!(store.current("p1").len(), 1);
}

#[tokio::test]
async fn hallucinated_media_url_is_rewritten_to_catalog() {
    let store = Arc::new(MemoryStore::new());
    let catalog = AssetCatalog::new(vec![MediaAsset::new(
        "a1",
        "https://cdn.example.com/uploads/product.jpg",
        MediaKind::Image,
    )
    .with_reference_names(["product shot"])]);

    let fabricated = concat!(
        "scene(\"Promo\", 120f) {\n",
        "    layer(\"hero\") { image(\"https://images.example.net/made-up.jpg\") }\n",
        "}\n"
    );
    let generator = Arc::new(ScriptedGenerator::new([fabricated]));
    let pipeline = pipeline(store.clone(), Arc::new(UnreachableModel), generator, catalog);

    let outcome = pipeline
        .handle_request(EditRequest::new("a promo with the product shot", "p1"))
        .await
        .unwrap();

    assert!(outcome.error.is_none());
    let stored = store.current("p1");
    let source = &stored.scenes()[0].source_code;
    assert!(!source.contains("images.example.net"));
    assert!(source.contains("https://cdn.example.com/uploads/product.jpg"));
}

#[tokio::test]
async fn uploaded_image_survives_media_rewrite() {
    // The upload is attached to the request only; the project catalog is
    // empty. The generated layer that uses it must reach the store intact.
    let upload = "https://uploads.example.com/user-photo.png";
    let store = Arc::new(MemoryStore::new());
    let with_upload = concat!(
        "scene(\"Photo\", 120f) {\n",
        "    layer(\"pic\") { image(\"https://uploads.example.com/user-photo.png\") }\n",
        "}\n"
    );
    let generator = Arc::new(ScriptedGenerator::new([with_upload]));
    let pipeline = pipeline(
        store.clone(),
        Arc::new(UnreachableModel),
        generator.clone(),
        AssetCatalog::default(),
    );

    let mut request = EditRequest::new("add my photo as a scene", "p1");
    request.image_urls = vec![upload.to_string()];
    let outcome = pipeline.handle_request(request).await.unwrap();

    assert!(outcome.error.is_none());
    assert!(outcome.warnings.is_empty());
    let stored = store.current("p1");
    let source = &stored.scenes()[0].source_code;
    assert!(source.contains(upload));
    assert!(source.contains("layer(\"pic\")"));
    assert!(stored.scenes()[0].is_compiled());
    // No validation retry was needed.
    assert_eq!(generator.call_count(), 1);
}

#[tokio::test]
async fn plural_scene_prompt_deletes_exactly_one_scene() {
    let store = seeded_store("p1", 4);
    let model = Arc::new(ScriptedModel::new([
        r#"{"tool":"delete_scene","target_scene_id":null,"reasoning":"one operation at a time","user_feedback":"Removed scene 3; ask again for scene 4."}"#,
    ]));
    let generator = Arc::new(ScriptedGenerator::new([]));
    let pipeline = pipeline(store.clone(), model, generator, AssetCatalog::default());

    let outcome = pipeline
        .handle_request(EditRequest::new("delete scenes 3 and 4", "p1"))
        .await
        .unwrap();

    assert_eq!(outcome.tool_used, ToolName::DeleteScene);
    let stored = store.current("p1");
    assert_eq!(stored.len(), 3);
    assert!(stored.orders_are_dense());
    // Scene 3 went; scene 4 is still there for the follow-up request.
    assert!(stored.scenes().iter().all(|s| s.name != "Scene 3"));
    assert!(stored.scenes().iter().any(|s| s.name == "Scene 4"));
}

#[tokio::test]
async fn retime_uses_model_extracted_duration() {
    let store = seeded_store("p1", 1);
    let model = Arc::new(ScriptedModel::new([
        r#"{"tool":"retime_scene","target_scene_id":null,"duration_frames":45,"reasoning":"duration-only change","user_feedback":""}"#,
    ]));
    let generator = Arc::new(ScriptedGenerator::new([]));
    let pipeline = pipeline(store.clone(), model, generator.clone(), AssetCatalog::default());

    let outcome = pipeline
        .handle_request(EditRequest::new("make scene 1 snappier", "p1"))
        .await
        .unwrap();

    assert_eq!(outcome.tool_used, ToolName::RetimeScene);
    assert_eq!(outcome.scene_delta.unwrap().duration_frames, 45);
    assert_eq!(store.current("p1").scenes()[0].duration_frames, 45);
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn progress_stages_arrive_in_order() {
    let store = Arc::new(MemoryStore::new());
    let generator = Arc::new(ScriptedGenerator::new([INTRO_150F]));
    let pipeline = pipeline(
        store,
        Arc::new(UnreachableModel),
        generator,
        AssetCatalog::default(),
    );

    let stages: Mutex<Vec<Stage>> = Mutex::new(Vec::new());
    pipeline
        .handle_request_with_progress(EditRequest::new("create an intro", "p1"), |stage| {
            stages.lock().unwrap().push(stage);
        })
        .await
        .unwrap();

    assert_eq!(
        *stages.lock().unwrap(),
        vec![
            Stage::ContextBuilt,
            Stage::ToolRouted,
            Stage::CodeGenerated,
            Stage::Validated,
            Stage::Compiled,
        ]
    );
}

#[tokio::test]
async fn identical_requests_produce_identical_artifacts() {
    let mut artifacts = Vec::new();
    for _ in 0..2 {
        let store = Arc::new(MemoryStore::new());
        let generator = Arc::new(ScriptedGenerator::new([INTRO_150F]));
        let pipeline = pipeline(
            store.clone(),
            Arc::new(UnreachableModel),
            generator,
            AssetCatalog::default(),
        );
        pipeline
            .handle_request(EditRequest::new("create a 5 second intro", "p1"))
            .await
            .unwrap();
        artifacts.push(store.current("p1").scenes()[0].compiled_artifact.clone());
    }
    assert!(artifacts[0].is_some());
    assert_eq!(artifacts[0], artifacts[1]);
}
