use bevy::prelude::*;
use serde::Serialize;

use crate::camera::CameraShakeState;
use crate::components::{SessionEntity, SessionId};
use crate::events::GameEventBus;
use crate::readiness::ReadyAsset;
use crate::scheduler::StepScheduler;
use crate::ultimate::{UltimateState, UltimateStep};

/// Frame ordering for preview systems.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum PreviewSet {
    /// Selection changes, start/stop, load completions.
    Control,
    Input,
    /// Player, AI, combat, ultimate steps.
    Simulation,
    /// Velocity integration.
    Motion,
    /// Tweens, trails, flashes, animation frames.
    Effects,
    /// ECS state to sprites, overlays and cameras.
    Render,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Loading,
    Running,
}

/// The concrete (protagonist, antagonist?, scene) triple a session runs.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionRequest {
    pub protagonist: ReadyAsset,
    pub antagonist: Option<ReadyAsset>,
    pub scene: ReadyAsset,
}

/// Owned session handle, `Idle -> Loading -> Running -> Idle`.
///
/// Late completions compare their [`SessionId`] against [`Self::current`]
/// and are dropped when stale.
#[derive(Resource, Default)]
pub struct PreviewSession {
    phase: SessionPhase,
    current: Option<SessionId>,
    request: Option<SessionRequest>,
    last_id: u64,
}

impl PreviewSession {
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn current(&self) -> Option<SessionId> {
        self.current
    }

    pub fn request(&self) -> Option<&SessionRequest> {
        self.request.as_ref()
    }

    pub fn is_current(&self, id: SessionId) -> bool {
        self.current == Some(id)
    }

    pub fn is_running(&self) -> bool {
        self.phase == SessionPhase::Running
    }

    pub(crate) fn begin(&mut self, request: SessionRequest) -> SessionId {
        self.last_id += 1;
        let id = SessionId(self.last_id);
        self.phase = SessionPhase::Loading;
        self.current = Some(id);
        self.request = Some(request);
        id
    }

    /// `Loading -> Running` for the given session only.
    pub(crate) fn mark_running(&mut self, id: SessionId) -> bool {
        if self.current != Some(id) || self.phase != SessionPhase::Loading {
            return false;
        }
        self.phase = SessionPhase::Running;
        true
    }

    fn end(&mut self) -> Option<SessionId> {
        self.phase = SessionPhase::Idle;
        self.request = None;
        self.current.take()
    }
}

pub fn session_running(session: Res<PreviewSession>) -> bool {
    session.is_running()
}

pub struct SessionPlugin;

impl Plugin for SessionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PreviewSession>()
            .configure_sets(
                Update,
                (
                    PreviewSet::Control,
                    PreviewSet::Input,
                    PreviewSet::Simulation,
                    PreviewSet::Motion,
                    PreviewSet::Effects,
                    PreviewSet::Render,
                )
                    .chain(),
            )
            .configure_sets(
                Update,
                (
                    PreviewSet::Input,
                    PreviewSet::Simulation,
                    PreviewSet::Motion,
                )
                    .run_if(session_running),
            );
    }
}

/// Tears down any running session, then begins loading `request`.
pub fn start_session(world: &mut World, request: SessionRequest) -> SessionId {
    stop_session(world);
    let summary = serde_json::json!({
        "protagonist": request.protagonist.id,
        "antagonist": request.antagonist.as_ref().map(|a| a.id.clone()),
        "scene": request.scene.id,
    });
    let id = world
        .resource_mut::<PreviewSession>()
        .begin(request.clone());
    info!(
        "[Preview session] #{} loading {} vs {} in {}",
        id.0,
        request.protagonist.name,
        request
            .antagonist
            .as_ref()
            .map_or("nobody", |a| a.name.as_str()),
        request.scene.name
    );
    if let Some(mut bus) = world.get_resource_mut::<GameEventBus>() {
        bus.emit("session_loading", summary, Some(id));
    }
    crate::loading::begin_load(world, id, &request);
    id
}

/// Destroys every session entity and cancels pending steps. No-op when idle.
pub fn stop_session(world: &mut World) -> Option<SessionId> {
    let id = world.resource_mut::<PreviewSession>().end()?;

    let mut query = world.query_filtered::<Entity, With<SessionEntity>>();
    let entities: Vec<Entity> = query.iter(world).collect();
    let despawned = entities.len();
    for entity in entities {
        world.despawn(entity);
    }
    if let Some(mut scheduler) = world.get_resource_mut::<StepScheduler<UltimateStep>>() {
        scheduler.clear();
    }
    if let Some(mut ultimate) = world.get_resource_mut::<UltimateState>() {
        *ultimate = UltimateState::default();
    }
    if let Some(mut shake) = world.get_resource_mut::<CameraShakeState>() {
        *shake = CameraShakeState::default();
    }
    info!(
        "[Preview session] #{} stopped ({} entities released)",
        id.0, despawned
    );
    if let Some(mut bus) = world.get_resource_mut::<GameEventBus>() {
        bus.emit(
            "session_stopped",
            serde_json::json!({ "entities": despawned }),
            Some(id),
        );
    }
    Some(id)
}
