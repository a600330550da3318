use serde::{Deserialize, Serialize};

use reelforge_core::{ForgeError, ForgeResult};

use crate::scene::{Scene, SceneId};

/// The ordered, gap-free sequence of a project's scenes.
///
/// Invariant: after every mutation the set of `order` values is exactly
/// `{0..n-1}`. Start offsets are always derived from `order` +
/// `duration_frames`, never stored, so they cannot drift.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timeline {
    scenes: Vec<Scene>,
}

impl Timeline {
    pub fn new() -> Self {
        Self { scenes: Vec::new() }
    }

    /// Rebuild from stored records in any order. Scenes are sorted by their
    /// stored `order` and renumbered densely, so duplicate or gapped orders
    /// from a corrupted store are repaired on load rather than trusted.
    pub fn from_scenes(mut scenes: Vec<Scene>) -> Self {
        scenes.sort_by_key(|s| s.order);
        let mut timeline = Self { scenes };
        timeline.renumber();
        timeline
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    /// Scenes in timeline order.
    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn get(&self, id: &SceneId) -> Option<&Scene> {
        self.scenes.iter().find(|s| &s.id == id)
    }

    pub fn get_mut(&mut self, id: &SceneId) -> Option<&mut Scene> {
        self.scenes.iter_mut().find(|s| &s.id == id)
    }

    /// Resolve a 1-based position as users phrase it ("scene 2").
    pub fn get_by_position(&self, position: u32) -> Option<&Scene> {
        if position == 0 {
            return None;
        }
        self.scenes.get(position as usize - 1)
    }

    /// Append a scene at `order = n`.
    pub fn append(&mut self, mut scene: Scene) -> SceneId {
        scene.order = self.scenes.len() as u32;
        let id = scene.id.clone();
        self.scenes.push(scene);
        id
    }

    /// Remove a scene and decrement the order of every later scene.
    pub fn remove(&mut self, id: &SceneId) -> ForgeResult<Scene> {
        let idx = self
            .scenes
            .iter()
            .position(|s| &s.id == id)
            .ok_or_else(|| ForgeError::InvalidArgument(format!("no scene with id {id}")))?;
        let removed = self.scenes.remove(idx);
        self.renumber();
        Ok(removed)
    }

    /// Change a scene's stored duration. The source module is untouched;
    /// any disagreement with its self-declared duration surfaces later as a
    /// compile-time mismatch warning.
    pub fn retime(&mut self, id: &SceneId, duration_frames: u32) -> ForgeResult<()> {
        let scene = self
            .get_mut(id)
            .ok_or_else(|| ForgeError::InvalidArgument(format!("no scene with id {id}")))?;
        scene.duration_frames = duration_frames.max(1);
        Ok(())
    }

    /// Start offset of a scene: sum of durations of all scenes before it.
    pub fn start_offset(&self, id: &SceneId) -> Option<u32> {
        let target = self.get(id)?;
        Some(
            self.scenes
                .iter()
                .filter(|s| s.order < target.order)
                .map(|s| s.duration_frames)
                .sum(),
        )
    }

    /// Total project length in frames.
    pub fn total_frames(&self) -> u32 {
        self.scenes.iter().map(|s| s.duration_frames).sum()
    }

    /// Check the dense-order invariant. Holds after every mutation; exposed
    /// so persistence layers can assert it before writing back.
    pub fn orders_are_dense(&self) -> bool {
        self.scenes
            .iter()
            .enumerate()
            .all(|(i, s)| s.order == i as u32)
    }

    fn renumber(&mut self) {
        for (i, scene) in self.scenes.iter_mut().enumerate() {
            scene.order = i as u32;
        }
    }
}
