use bevy::log::{debug, warn};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};

use crate::assets::resolve_asset_url;
use crate::backend::types::{AnimationInfo, SpecItem, SpecKind};
use crate::backend::ResourceBackend;

/// A character or scene whose final variant is confirmed and fetchable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadyAsset {
    pub id: String,
    pub name: String,
    pub image_url: String,
    #[serde(default)]
    pub animation: Option<AnimationInfo>,
}

impl ReadyAsset {
    pub fn has_visual(&self) -> bool {
        !self.image_url.is_empty() || self.animation.as_ref().is_some_and(AnimationInfo::usable)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadyAssets {
    pub characters: Vec<ReadyAsset>,
    pub scenes: Vec<ReadyAsset>,
}

impl ReadyAssets {
    /// Nothing at all is ready; the preview cannot be offered.
    pub fn is_insufficient(&self) -> bool {
        self.characters.is_empty() && self.scenes.is_empty()
    }

    /// At least one character and one scene are ready.
    pub fn can_preview(&self) -> bool {
        !self.characters.is_empty() && !self.scenes.is_empty()
    }
}

/// Outcome of a project readiness check.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RosterOutcome {
    /// The project has no character or scene spec yet.
    NoSpecs,
    Checked {
        assets: ReadyAssets,
        spec_characters: usize,
        spec_scenes: usize,
    },
}

/// Fetches both spec lists, then checks every item for a selected variant.
/// Spec fetch failures count as empty lists.
pub async fn check_project<B: ResourceBackend>(
    backend: &B,
    base_url: &str,
    project_id: &str,
) -> RosterOutcome {
    let (characters, scenes) = futures_util::join!(
        backend.fetch_spec(project_id, SpecKind::Character),
        backend.fetch_spec(project_id, SpecKind::Scene),
    );
    let characters = characters.unwrap_or_else(|e| {
        warn!("[Preview roster] character spec unavailable: {e}");
        Vec::new()
    });
    let scenes = scenes.unwrap_or_else(|e| {
        warn!("[Preview roster] scene spec unavailable: {e}");
        Vec::new()
    });
    if characters.is_empty() && scenes.is_empty() {
        return RosterOutcome::NoSpecs;
    }
    let assets = aggregate(backend, base_url, project_id, &characters, &scenes).await;
    RosterOutcome::Checked {
        assets,
        spec_characters: characters.len(),
        spec_scenes: scenes.len(),
    }
}

/// Issues one variant lookup per item, all concurrently, and keeps the items
/// with a resolvable selected variant in their input order. A failed lookup
/// only excludes its own item.
pub async fn aggregate<B: ResourceBackend>(
    backend: &B,
    base_url: &str,
    project_id: &str,
    characters: &[SpecItem],
    scenes: &[SpecItem],
) -> ReadyAssets {
    let character_lookups = characters
        .iter()
        .map(|item| resolve_item(backend, base_url, project_id, SpecKind::Character, item));
    let scene_lookups = scenes
        .iter()
        .map(|item| resolve_item(backend, base_url, project_id, SpecKind::Scene, item));
    let (characters, scenes) =
        futures_util::join!(join_all(character_lookups), join_all(scene_lookups));
    ReadyAssets {
        characters: characters.into_iter().flatten().collect(),
        scenes: scenes.into_iter().flatten().collect(),
    }
}

async fn resolve_item<B: ResourceBackend>(
    backend: &B,
    base_url: &str,
    project_id: &str,
    kind: SpecKind,
    item: &SpecItem,
) -> Option<ReadyAsset> {
    let status = match backend.fetch_variants(project_id, kind, &item.id).await {
        Ok(status) => status,
        Err(e) => {
            debug!("[Preview roster] {} '{}' skipped: {e}", kind.as_str(), item.id);
            return None;
        }
    };
    let selected = status.selected()?;
    let image_url = resolve_asset_url(
        base_url,
        project_id,
        kind.asset_folder(),
        &item.id,
        selected.file_path.as_deref(),
    );
    let animation = match kind {
        SpecKind::Character => status.animation.clone().filter(|a| a.exists),
        SpecKind::Scene => None,
    };
    let asset = ReadyAsset {
        id: item.id.clone(),
        name: item.display_name().to_string(),
        image_url,
        animation,
    };
    asset.has_visual().then_some(asset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::FakeBackend;
    use crate::backend::types::{Variant, VariantStatus};

    const BASE: &str = "http://localhost:8000";

    fn item(id: &str) -> SpecItem {
        SpecItem {
            id: id.to_string(),
            name: Some(id.to_uppercase()),
        }
    }

    fn status(item_id: &str, selected: Option<&str>) -> VariantStatus {
        let variants = ["v1", "v2"]
            .iter()
            .map(|v| Variant {
                variant_id: v.to_string(),
                file_path: Some(format!("/srv/projects/p1/temp/characters/{item_id}/{v}.png")),
                exists: true,
                selected: Some(*v) == selected,
                seed: None,
                error: None,
            })
            .collect();
        VariantStatus {
            variants,
            total: 2,
            animation: None,
        }
    }

    fn backend_with(characters: &[&str], scenes: &[&str]) -> FakeBackend {
        FakeBackend {
            characters: characters.iter().map(|c| item(c)).collect(),
            scenes: scenes.iter().map(|s| item(s)).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn keeps_only_selected_items_and_swallows_failures() {
        let mut backend = backend_with(&["wukong", "bajie", "wujing"], &[]);
        backend.failing = vec!["wukong".to_string(), "wujing".to_string()];
        backend
            .statuses
            .lock()
            .unwrap()
            .insert((SpecKind::Character, "bajie".to_string()), status("bajie", Some("v2")));

        let characters = backend.characters.clone();
        let ready = aggregate(&backend, BASE, "p1", &characters, &[]).await;
        assert_eq!(ready.characters.len(), 1);
        assert_eq!(ready.characters[0].id, "bajie");
        assert_eq!(ready.characters[0].name, "BAJIE");
        assert_eq!(
            ready.characters[0].image_url,
            "http://localhost:8000/assets/p1/temp/characters/bajie/v2.png"
        );
        assert!(ready.scenes.is_empty());
        assert!(!ready.can_preview());
    }

    #[tokio::test]
    async fn preserves_input_order_and_is_repeatable() {
        let backend = backend_with(&["c", "a", "b"], &["s2", "s1"]);
        {
            let mut statuses = backend.statuses.lock().unwrap();
            for id in ["c", "a", "b"] {
                statuses.insert((SpecKind::Character, id.to_string()), status(id, Some("v1")));
            }
            for id in ["s2", "s1"] {
                statuses.insert((SpecKind::Scene, id.to_string()), status(id, Some("v1")));
            }
        }
        let characters = backend.characters.clone();
        let scenes = backend.scenes.clone();
        let first = aggregate(&backend, BASE, "p1", &characters, &scenes).await;
        let ids: Vec<_> = first.characters.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
        let scene_ids: Vec<_> = first.scenes.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(scene_ids, ["s2", "s1"]);

        let second = aggregate(&backend, BASE, "p1", &characters, &scenes).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn empty_results_are_reported_as_insufficient() {
        let backend = backend_with(&["a"], &["s"]);
        let outcome = check_project(&backend, BASE, "p1").await;
        match outcome {
            RosterOutcome::Checked { assets, spec_characters, spec_scenes } => {
                assert!(assets.is_insufficient());
                assert_eq!(spec_characters, 1);
                assert_eq!(spec_scenes, 1);
            }
            RosterOutcome::NoSpecs => panic!("specs exist"),
        }

        let empty = backend_with(&[], &[]);
        assert_eq!(check_project(&empty, BASE, "p1").await, RosterOutcome::NoSpecs);
    }

    #[tokio::test]
    async fn selecting_a_variant_is_reflected_on_refetch() {
        let backend = backend_with(&["bajie"], &[]);
        backend
            .statuses
            .lock()
            .unwrap()
            .insert((SpecKind::Character, "bajie".to_string()), status("bajie", None));
        let characters = backend.characters.clone();
        assert!(aggregate(&backend, BASE, "p1", &characters, &[])
            .await
            .characters
            .is_empty());

        let chosen = backend
            .statuses
            .lock()
            .unwrap()
            .get(&(SpecKind::Character, "bajie".to_string()))
            .and_then(|s| s.variants.iter().find(|v| v.variant_id == "v1").cloned())
            .expect("variant v1");
        let expected_url = resolve_asset_url(
            BASE,
            "p1",
            "characters",
            "bajie",
            chosen.file_path.as_deref(),
        );

        backend
            .select_variant("p1", SpecKind::Character, "bajie", "v1")
            .await
            .expect("select");
        // Selecting again is a no-op.
        backend
            .select_variant("p1", SpecKind::Character, "bajie", "v1")
            .await
            .expect("reselect");

        let status = backend
            .fetch_variants("p1", SpecKind::Character, "bajie")
            .await
            .expect("status");
        assert_eq!(status.selected().map(|v| v.variant_id.as_str()), Some("v1"));
        assert_eq!(status.variants.iter().filter(|v| v.selected).count(), 1);

        let ready = aggregate(&backend, BASE, "p1", &characters, &[]).await;
        assert_eq!(ready.characters[0].image_url, expected_url);
    }
}
