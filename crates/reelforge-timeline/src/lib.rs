//! # reelforge-timeline
//!
//! The project timeline — ordered scene records with a dense 0-based `order`,
//! derived start offsets, the media asset catalog, and natural-language
//! media resolution.

pub mod asset;
pub mod resolver;
pub mod scene;
pub mod timeline;

pub use asset::{AssetCatalog, MediaAsset, MediaAssetId, MediaKind};
pub use resolver::{MediaResolver, ResolvedMedia};
pub use scene::{Scene, SceneId};
pub use timeline::Timeline;
