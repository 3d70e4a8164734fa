use std::sync::Arc;

use bevy::prelude::*;
use crossbeam_channel::{Receiver, Sender};
use futures_util::future::join_all;
use serde::Serialize;

use crate::assets::{absolute_url, cache_busted, unix_millis};
use crate::backend::BackendClient;
use crate::components::{HeadlessMode, SessionId};
use crate::events::GameEventBus;
use crate::readiness::ReadyAsset;
use crate::session::{PreviewSession, PreviewSet, SessionPhase, SessionRequest};
use crate::sprites::AnimAction;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Protagonist,
    Antagonist,
}

impl ActorRole {
    /// Actions a role ever plays. The antagonist never attacks on its own.
    pub fn actions(self) -> &'static [AnimAction] {
        match self {
            Self::Protagonist => &[AnimAction::Idle, AnimAction::Walk, AnimAction::Attack],
            Self::Antagonist => &[AnimAction::Idle, AnimAction::Walk],
        }
    }
}

/// What a fetched image is used for.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AssetSlot {
    Backdrop,
    Static(ActorRole),
    Action(ActorRole, AnimAction),
    Fallback(ActorRole),
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlannedAsset {
    pub slot: AssetSlot,
    pub url: String,
}

/// Lists the images a session needs, with absolute cache-busted URLs.
///
/// An actor with usable animation data gets its declared per-action sheets
/// plus the shared fallback sheet; any other actor gets its static image.
pub fn plan_assets(base_url: &str, request: &SessionRequest, millis: u128) -> Vec<PlannedAsset> {
    let mut plan = Vec::new();
    let mut push = |slot, url: &str| {
        if !url.is_empty() {
            plan.push(PlannedAsset {
                slot,
                url: cache_busted(&absolute_url(base_url, url), millis),
            });
        }
    };

    push(AssetSlot::Backdrop, &request.scene.image_url);
    let actors = std::iter::once((ActorRole::Protagonist, &request.protagonist))
        .chain(request.antagonist.iter().map(|a| (ActorRole::Antagonist, a)));
    for (role, asset) in actors {
        match asset.animation.as_ref().filter(|a| a.usable()) {
            Some(animation) => {
                for &action in role.actions() {
                    if let Some(sheet) = action.sheet(&animation.types) {
                        push(AssetSlot::Action(role, action), &sheet.url);
                    }
                }
                push(
                    AssetSlot::Fallback(role),
                    animation.spritesheet_url.as_deref().unwrap_or_default(),
                );
            }
            None => push(AssetSlot::Static(role), &asset.image_url),
        }
    }
    plan
}

#[derive(Clone, Debug)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl DecodedImage {
    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }
}

pub type LoadedImages = Vec<(AssetSlot, Result<DecodedImage, String>)>;

/// Everything fetched for one session.
pub struct LoadedBatch {
    pub session: SessionId,
    pub images: LoadedImages,
}

/// Background runtime and backend handle shared by asset loads and roster
/// checks. Absent in tests and whenever the preview runs offline.
#[derive(Resource, Clone)]
pub struct PreviewRuntime {
    pub runtime: Arc<tokio::runtime::Runtime>,
    pub client: BackendClient,
    pub project_id: String,
}

impl PreviewRuntime {
    pub fn new(client: BackendClient, project_id: impl Into<String>) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("preview-io")
            .enable_all()
            .build()?;
        Ok(Self {
            runtime: Arc::new(runtime),
            client,
            project_id: project_id.into(),
        })
    }
}

#[derive(Resource)]
pub struct LoadChannel {
    tx: Sender<LoadedBatch>,
    rx: Receiver<LoadedBatch>,
}

impl Default for LoadChannel {
    fn default() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }
}

pub struct LoadingPlugin;

impl Plugin for LoadingPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<LoadChannel>()
            .add_systems(Update, finish_loads.in_set(PreviewSet::Control));
    }
}

/// Starts fetching the assets of `request` for session `id`.
///
/// Without a runtime or in headless mode nothing is downloaded and the
/// batch completes empty, so the session builds with stand-in visuals.
pub fn begin_load(world: &mut World, id: SessionId, request: &SessionRequest) {
    let tx = world.get_resource_or_insert_with(LoadChannel::default).tx.clone();
    let headless = world.get_resource::<HeadlessMode>().is_some_and(|h| h.0);
    let runtime = world.get_resource::<PreviewRuntime>().cloned();

    let Some(runtime) = runtime.filter(|_| !headless) else {
        let _ = tx.send(LoadedBatch {
            session: id,
            images: Vec::new(),
        });
        return;
    };

    let plan = plan_assets(runtime.client.base_url(), request, unix_millis());
    info!("[Preview load] #{} fetching {} assets", id.0, plan.len());
    let client = runtime.client.clone();
    runtime.runtime.spawn(async move {
        let images = fetch_all(&client, plan).await;
        if tx.send(LoadedBatch { session: id, images }).is_err() {
            debug!("[Preview load] #{} finished after shutdown", id.0);
        }
    });
}

async fn fetch_all(client: &BackendClient, plan: Vec<PlannedAsset>) -> LoadedImages {
    let fetches = plan.into_iter().map(|planned| async move {
        let result = fetch_image(client, &planned.url).await;
        (planned.slot, result)
    });
    join_all(fetches).await
}

async fn fetch_image(client: &BackendClient, url: &str) -> Result<DecodedImage, String> {
    let bytes = client.fetch_bytes(url).await.map_err(|e| e.to_string())?;
    decode_image(&bytes).map_err(|e| format!("{url}: {e}"))
}

pub fn decode_image(bytes: &[u8]) -> Result<DecodedImage, image::ImageError> {
    let rgba = image::load_from_memory(bytes)?.to_rgba8();
    Ok(DecodedImage {
        width: rgba.width(),
        height: rgba.height(),
        rgba: rgba.into_raw(),
    })
}

/// Builds the world for completed loads. Batches of sessions that were
/// stopped or replaced meanwhile are dropped.
pub(crate) fn finish_loads(world: &mut World) {
    let batches: Vec<LoadedBatch> = match world.get_resource::<LoadChannel>() {
        Some(channel) => channel.rx.try_iter().collect(),
        None => return,
    };
    for batch in batches {
        let (current, phase, request) = {
            let session = world.resource::<PreviewSession>();
            (
                session.is_current(batch.session),
                session.phase(),
                session.request().cloned(),
            )
        };
        let Some(request) = request.filter(|_| current && phase == SessionPhase::Loading) else {
            debug!("[Preview load] discarding stale batch for #{}", batch.session.0);
            continue;
        };

        let failed = batch.images.iter().filter(|(_, r)| r.is_err()).count();
        crate::spawn::build_session(world, batch.session, &request, batch.images);
        world.resource_mut::<PreviewSession>().mark_running(batch.session);
        info!("[Preview session] #{} running", batch.session.0);
        if let Some(mut bus) = world.get_resource_mut::<GameEventBus>() {
            bus.emit(
                "session_running",
                serde_json::json!({
                    "protagonist": request.protagonist.id,
                    "antagonist": request.antagonist.as_ref().map(|a: &ReadyAsset| a.id.clone()),
                    "scene": request.scene.id,
                    "failed_assets": failed,
                }),
                Some(batch.session),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::types::{ActionSheet, AnimationInfo, AnimationTypes};
    use crate::components::{Actor, SessionEntity};
    use crate::session::{start_session, stop_session};

    const BASE: &str = "http://localhost:8000";

    fn still(id: &str) -> ReadyAsset {
        ReadyAsset {
            id: id.into(),
            name: id.to_uppercase(),
            image_url: format!("{BASE}/assets/p/assets/characters/{id}/final.png"),
            animation: None,
        }
    }

    fn animated(id: &str) -> ReadyAsset {
        let sheet = |action: &str| ActionSheet {
            url: format!("/assets/p/assets/characters/{id}/animations/{action}.png"),
            frames: Some(6),
            frame_size: Some(96),
            content_bbox: None,
        };
        ReadyAsset {
            animation: Some(AnimationInfo {
                exists: true,
                spritesheet_url: Some(format!("/assets/p/assets/characters/{id}/animations/spritesheet.png")),
                types: AnimationTypes {
                    idle: Some(sheet("idle")),
                    walk: None,
                    attack: Some(sheet("attack")),
                },
            }),
            ..still(id)
        }
    }

    fn request(antagonist: Option<ReadyAsset>) -> SessionRequest {
        SessionRequest {
            protagonist: animated("wukong"),
            antagonist,
            scene: ReadyAsset {
                id: "mountain".into(),
                name: "Mountain".into(),
                image_url: format!("{BASE}/assets/p/assets/scenes/mountain/final.png"),
                animation: None,
            },
        }
    }

    #[test]
    fn plan_covers_sheets_fallback_and_static_images() {
        let plan = plan_assets(BASE, &request(Some(still("bajie"))), 42);
        let slots: Vec<AssetSlot> = plan.iter().map(|p| p.slot).collect();
        assert_eq!(
            slots,
            vec![
                AssetSlot::Backdrop,
                AssetSlot::Action(ActorRole::Protagonist, AnimAction::Idle),
                AssetSlot::Action(ActorRole::Protagonist, AnimAction::Attack),
                AssetSlot::Fallback(ActorRole::Protagonist),
                AssetSlot::Static(ActorRole::Antagonist),
            ]
        );
        assert_eq!(
            plan[1].url,
            "http://localhost:8000/assets/p/assets/characters/wukong/animations/idle.png?t=42"
        );
        assert!(plan.iter().all(|p| p.url.ends_with("t=42")));
    }

    #[test]
    fn antagonist_never_loads_an_attack_sheet() {
        let plan = plan_assets(BASE, &request(Some(animated("bajie"))), 1);
        assert!(!plan
            .iter()
            .any(|p| p.slot == AssetSlot::Action(ActorRole::Antagonist, AnimAction::Attack)));
        assert!(plan
            .iter()
            .any(|p| p.slot == AssetSlot::Fallback(ActorRole::Antagonist)));
    }

    fn headless_world() -> World {
        let mut world = World::new();
        world.insert_resource(HeadlessMode(true));
        world.insert_resource(PreviewSession::default());
        world.insert_resource(GameEventBus::default());
        world.insert_resource(crate::config::CombatTuning::default());
        world.init_resource::<LoadChannel>();
        world
    }

    fn actor_count(world: &mut World) -> usize {
        world.query::<&Actor>().iter(world).count()
    }

    #[test]
    fn restart_before_completion_builds_exactly_one_session() {
        let mut world = headless_world();
        let first = start_session(&mut world, request(Some(still("bajie"))));
        let second = start_session(&mut world, request(None));
        assert_ne!(first, second);

        finish_loads(&mut world);
        assert_eq!(world.resource::<PreviewSession>().phase(), SessionPhase::Running);
        assert_eq!(world.resource::<PreviewSession>().current(), Some(second));
        // The replaced request had an antagonist; the live one does not.
        assert_eq!(actor_count(&mut world), 1);
        let mut owners = world.query::<&SessionEntity>();
        assert!(owners.iter(&world).all(|o| o.0 == second));
    }

    #[test]
    fn load_completing_after_stop_is_ignored() {
        let mut world = headless_world();
        start_session(&mut world, request(Some(still("bajie"))));
        stop_session(&mut world);
        finish_loads(&mut world);
        assert_eq!(world.resource::<PreviewSession>().phase(), SessionPhase::Idle);
        assert_eq!(actor_count(&mut world), 0);
        assert_eq!(world.resource::<GameEventBus>().count("session_running"), 0);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_image(b"not an image").is_err());
    }
}
