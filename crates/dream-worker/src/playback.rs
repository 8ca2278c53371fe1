//! Looping playback over the playable scenes of a batch.

use std::path::PathBuf;
use std::sync::Arc;

use dream_models::{Scene, SceneId};

use crate::session::Batch;

/// One entry of the playback list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackItem {
    pub scene_id: SceneId,
    /// Position of the scene in its batch
    pub scene_index: usize,
    /// Position within the playable list
    pub position: usize,
    pub detail: String,
    pub path: PathBuf,
}

impl PlaybackItem {
    fn from_scene(position: usize, scene: &Scene) -> Option<Self> {
        let path = scene.local_media()?.path()?;
        Some(Self {
            scene_id: scene.id().clone(),
            scene_index: scene.index(),
            position,
            detail: scene.detail().to_string(),
            path,
        })
    }
}

/// Cursor over the playable scenes of a batch, wrapping at both ends.
///
/// The list is re-read on every call, so scenes completing during playback
/// join it in batch order. The cursor stays on the scene it points at while
/// that scene remains playable, otherwise it resets to the first item.
#[derive(Debug)]
pub struct PlaybackFeed {
    batch: Arc<Batch>,
    position: usize,
    current: Option<SceneId>,
}

impl PlaybackFeed {
    /// Start a feed at the first playable scene of `batch`.
    pub fn new(batch: Arc<Batch>) -> Self {
        Self {
            batch,
            position: 0,
            current: None,
        }
    }

    /// The batch this feed plays.
    pub fn batch(&self) -> &Arc<Batch> {
        &self.batch
    }

    /// Position of the current item in the playable list.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of scenes playable right now.
    pub async fn len(&self) -> usize {
        self.items().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items().await.is_empty()
    }

    /// Every playable item, in batch order.
    pub async fn items(&self) -> Vec<PlaybackItem> {
        self.batch
            .playable()
            .await
            .iter()
            .enumerate()
            .filter_map(|(position, scene)| PlaybackItem::from_scene(position, scene))
            .collect()
    }

    /// The item under the cursor, or `None` while nothing is playable.
    pub async fn current(&mut self) -> Option<PlaybackItem> {
        let items = self.sync().await;
        items.get(self.position).cloned()
    }

    /// Move to the next item, wrapping to the first after the last.
    pub async fn advance(&mut self) -> Option<PlaybackItem> {
        let items = self.sync().await;
        if items.is_empty() {
            return None;
        }
        self.seek(&items, (self.position + 1) % items.len())
    }

    /// Move to the previous item, wrapping to the last before the first.
    pub async fn back(&mut self) -> Option<PlaybackItem> {
        let items = self.sync().await;
        if items.is_empty() {
            return None;
        }
        self.seek(&items, (self.position + items.len() - 1) % items.len())
    }

    /// Called when the current item finished playing.
    pub async fn on_item_ended(&mut self) -> Option<PlaybackItem> {
        self.advance().await
    }

    fn seek(&mut self, items: &[PlaybackItem], position: usize) -> Option<PlaybackItem> {
        let item = items.get(position)?.clone();
        self.position = position;
        self.current = Some(item.scene_id.clone());
        Some(item)
    }

    /// Re-read the list and re-anchor the cursor on the current scene.
    async fn sync(&mut self) -> Vec<PlaybackItem> {
        let items = self.items().await;

        let anchored = self
            .current
            .as_ref()
            .and_then(|id| items.iter().position(|item| &item.scene_id == id));

        match anchored {
            Some(position) => self.position = position,
            None => {
                self.position = 0;
                self.current = items.first().map(|item| item.scene_id.clone());
            }
        }

        items
    }
}
