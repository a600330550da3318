//! # reelforge-agent
//!
//! The edit-request pipeline: a user prompt plus project context goes in,
//! exactly one structural timeline operation comes out. Flow per request:
//! context assembly → intent routing → operation execution (with model-backed
//! scene generation where needed) → static validation → per-scene compile →
//! timeline update.
//!
//! Failures local to one scene degrade to that scene's `compilation_error`;
//! only router-level and persistence-level failures fail the whole request.

pub mod client;
pub mod compile;
pub mod context;
pub mod generator;
pub mod pipeline;
pub mod router;
pub mod tools;

pub use client::{ChatModel, HttpChatModel};
pub use compile::{compile_into_scene, compile_timeline, CompileReport};
pub use context::{ContextBuilder, ContextPacket};
pub use generator::{GenerationRequest, HttpSceneGenerator, SceneGenerator};
pub use pipeline::{EditRequest, Pipeline, RequestOutcome, Stage};
pub use router::{IntentRouter, ToolDecision, ToolName};
pub use tools::{BaseInput, ToolInput, ToolOutput, ToolPayload};
