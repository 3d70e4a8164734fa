use bevy::prelude::*;
use bevy::render::view::RenderLayers;
use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::camera::OVERLAY_LAYER;
use crate::components::{Depth, GamePosition, HeadlessMode, SessionId, VIEWPORT_HEIGHT, VIEWPORT_WIDTH};
use crate::events::GameEventBus;
use crate::input::{action, VirtualInput};
use crate::loading::PreviewRuntime;
use crate::readiness::{check_project, ReadyAsset, ReadyAssets, RosterOutcome};
use crate::session::{
    start_session, stop_session, PreviewSession, PreviewSet, SessionPhase, SessionRequest,
};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSlot {
    Protagonist,
    Antagonist,
    Scene,
}

impl SelectionSlot {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Protagonist => "protagonist",
            Self::Antagonist => "antagonist",
            Self::Scene => "scene",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterStatus {
    #[default]
    Unchecked,
    Checking,
    /// The project has no character or scene documents yet.
    NoSpecs,
    /// Specs exist but nothing has a selected asset.
    Insufficient,
    /// Something is ready, but not both a character and a scene.
    Incomplete,
    Ready,
}

impl RosterStatus {
    /// What the user should do next, if anything.
    pub fn guidance(self) -> Option<&'static str> {
        match self {
            Self::Unchecked => Some("Press F5 to check which assets are ready."),
            Self::Checking => Some("Checking project assets..."),
            Self::NoSpecs => Some(
                "Generate the design documents (characters and scenes) before preparing preview assets.",
            ),
            Self::Insufficient | Self::Incomplete => Some(
                "Cannot start the preview: select a final variant for at least one scene and one character.",
            ),
            Self::Ready => None,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum StartError {
    #[error("choose a protagonist first")]
    MissingProtagonist,
    #[error("choose a scene first")]
    MissingScene,
    #[error("{slot} '{id}' is no longer ready")]
    NotReady { slot: &'static str, id: String },
}

#[derive(Debug, Error, PartialEq)]
pub enum ControlError {
    #[error("no ready {slot} with id '{id}'")]
    UnknownItem { slot: &'static str, id: String },
    #[error(transparent)]
    Start(#[from] StartError),
    #[error("the preview has no backend connection")]
    Offline,
}

/// Current choice per slot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub protagonist: Option<String>,
    pub antagonist: Option<String>,
    pub scene: Option<String>,
}

impl Selection {
    fn slot_mut(&mut self, slot: SelectionSlot) -> &mut Option<String> {
        match slot {
            SelectionSlot::Protagonist => &mut self.protagonist,
            SelectionSlot::Antagonist => &mut self.antagonist,
            SelectionSlot::Scene => &mut self.scene,
        }
    }

    pub fn get(&self, slot: SelectionSlot) -> Option<&str> {
        match slot {
            SelectionSlot::Protagonist => self.protagonist.as_deref(),
            SelectionSlot::Antagonist => self.antagonist.as_deref(),
            SelectionSlot::Scene => self.scene.as_deref(),
        }
    }
}

/// Ready roster plus the chosen protagonist, antagonist and scene.
#[derive(Resource, Default, Debug)]
pub struct PreviewControls {
    roster: ReadyAssets,
    status: RosterStatus,
    selection: Selection,
    /// Selections requested before the roster was known (config, CLI).
    preferred: Selection,
    auto_start: bool,
    last_error: Option<String>,
}

impl PreviewControls {
    pub fn new(preferred: Selection, auto_start: bool) -> Self {
        Self {
            preferred,
            auto_start,
            ..Default::default()
        }
    }

    pub fn roster(&self) -> &ReadyAssets {
        &self.roster
    }

    pub fn status(&self) -> RosterStatus {
        self.status
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Protagonist and antagonist share the character roster.
    fn candidates(&self, slot: SelectionSlot) -> &[ReadyAsset] {
        match slot {
            SelectionSlot::Protagonist | SelectionSlot::Antagonist => &self.roster.characters,
            SelectionSlot::Scene => &self.roster.scenes,
        }
    }

    fn find(&self, slot: SelectionSlot, id: &str) -> Option<&ReadyAsset> {
        self.candidates(slot).iter().find(|a| a.id == id)
    }

    /// Installs a fresh roster. Selections that are still ready are kept,
    /// others are cleared; empty slots take the preferred ids when ready.
    pub fn apply_roster(&mut self, outcome: RosterOutcome) {
        let (roster, status) = match outcome {
            RosterOutcome::NoSpecs => (ReadyAssets::default(), RosterStatus::NoSpecs),
            RosterOutcome::Checked { assets, .. } => {
                let status = if assets.is_insufficient() {
                    RosterStatus::Insufficient
                } else if !assets.can_preview() {
                    RosterStatus::Incomplete
                } else {
                    RosterStatus::Ready
                };
                (assets, status)
            }
        };
        self.roster = roster;
        self.status = status;

        for slot in [
            SelectionSlot::Protagonist,
            SelectionSlot::Antagonist,
            SelectionSlot::Scene,
        ] {
            let keep = self
                .selection
                .get(slot)
                .filter(|id| self.find(slot, id).is_some())
                .map(str::to_string);
            let fallback = || {
                self.preferred
                    .get(slot)
                    .filter(|id| self.find(slot, id).is_some())
                    .map(str::to_string)
            };
            let chosen = keep.or_else(fallback);
            *self.selection.slot_mut(slot) = chosen;
        }
    }

    /// Sets or clears a slot. Returns whether the selection changed.
    pub fn select(&mut self, slot: SelectionSlot, id: Option<&str>) -> Result<bool, ControlError> {
        let id = id.map(str::trim).filter(|id| !id.is_empty());
        if let Some(id) = id {
            if self.find(slot, id).is_none() {
                return Err(ControlError::UnknownItem {
                    slot: slot.as_str(),
                    id: id.to_string(),
                });
            }
        }
        let next = id.map(str::to_string);
        let current = self.selection.slot_mut(slot);
        if *current == next {
            return Ok(false);
        }
        *current = next;
        self.last_error = None;
        Ok(true)
    }

    /// Steps a slot to the next ready entry. The antagonist passes through
    /// "none" once per cycle.
    pub fn cycle(&mut self, slot: SelectionSlot) -> bool {
        let ids: Vec<Option<String>> = {
            let listed = self.candidates(slot).iter().map(|a| Some(a.id.clone()));
            match slot {
                SelectionSlot::Antagonist => std::iter::once(None).chain(listed).collect(),
                _ => listed.collect(),
            }
        };
        if ids.is_empty() {
            return false;
        }
        let current = self.selection.get(slot).map(str::to_string);
        let next = match ids.iter().position(|id| *id == current) {
            Some(i) => ids[(i + 1) % ids.len()].clone(),
            None => ids[0].clone(),
        };
        let changed = next != current;
        *self.selection.slot_mut(slot) = next;
        changed
    }

    pub fn can_start(&self) -> bool {
        self.start_request().is_ok()
    }

    /// Resolves the current selection into a session request.
    pub fn start_request(&self) -> Result<SessionRequest, StartError> {
        let resolve = |slot: SelectionSlot, id: &str| {
            self.find(slot, id).cloned().ok_or_else(|| StartError::NotReady {
                slot: slot.as_str(),
                id: id.to_string(),
            })
        };
        let protagonist = self
            .selection
            .protagonist
            .as_deref()
            .ok_or(StartError::MissingProtagonist)?;
        let scene = self
            .selection
            .scene
            .as_deref()
            .ok_or(StartError::MissingScene)?;
        let antagonist = match self.selection.antagonist.as_deref() {
            Some(id) => Some(resolve(SelectionSlot::Antagonist, id)?),
            None => None,
        };
        Ok(SessionRequest {
            protagonist: resolve(SelectionSlot::Protagonist, protagonist)?,
            antagonist,
            scene: resolve(SelectionSlot::Scene, scene)?,
        })
    }

    /// Text shown while no session exists.
    pub fn placeholder_text(&self) -> String {
        let name = |slot: SelectionSlot| {
            self.selection
                .get(slot)
                .and_then(|id| self.find(slot, id))
                .map_or_else(|| "-".to_string(), |a| a.name.clone())
        };
        let mut text = format!(
            "Awaiting selection\n\n[1] Protagonist: {}\n[2] Monster (optional): {}\n[3] Scene: {}\n\n",
            name(SelectionSlot::Protagonist),
            self.selection
                .antagonist
                .as_ref()
                .map_or_else(|| "none".to_string(), |_| name(SelectionSlot::Antagonist)),
            name(SelectionSlot::Scene),
        );
        text.push_str(if self.can_start() {
            "Enter: start  |  F5: refresh"
        } else {
            "F5: refresh"
        });
        if let Some(hint) = self.last_error.as_deref().or(self.status.guidance()) {
            text.push_str("\n\n");
            text.push_str(hint);
        }
        text
    }
}

/// Readiness results tagged with the refresh that produced them. Only a
/// result newer than the last applied one may replace the roster.
#[derive(Resource)]
pub struct RosterChannel {
    tx: Sender<(u64, RosterOutcome)>,
    rx: Receiver<(u64, RosterOutcome)>,
    issued: u64,
    applied: u64,
}

impl Default for RosterChannel {
    fn default() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            tx,
            rx,
            issued: 0,
            applied: 0,
        }
    }
}

impl RosterChannel {
    /// Reserves the next generation for a refresh about to start.
    fn issue(&mut self) -> (u64, Sender<(u64, RosterOutcome)>) {
        self.issued += 1;
        (self.issued, self.tx.clone())
    }

    /// Pending results, oldest-first, minus any superseded by one already applied.
    fn take_fresh(&mut self) -> Vec<(u64, RosterOutcome)> {
        let mut fresh = Vec::new();
        for (generation, outcome) in self.rx.try_iter() {
            if generation <= self.applied {
                debug!("[Preview roster] dropping stale check #{generation}");
                continue;
            }
            self.applied = generation;
            fresh.push((generation, outcome));
        }
        fresh
    }
}

/// Marker for the text shown while idle.
#[derive(Component)]
pub struct AwaitingSelection;

pub struct ControlsPlugin;

impl Plugin for ControlsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PreviewControls>()
            .init_resource::<RosterChannel>()
            .add_systems(Startup, check_roster_on_startup)
            .add_systems(
                Update,
                (apply_roster_updates, keyboard_controls)
                    .chain()
                    .in_set(PreviewSet::Control),
            )
            .add_systems(Update, sync_placeholder.in_set(PreviewSet::Render));
    }
}

/// Starts a session from the current selection. Nothing changes on error.
pub fn request_start(world: &mut World) -> Result<SessionId, StartError> {
    let request = world.resource::<PreviewControls>().start_request();
    match request {
        Ok(request) => {
            world.resource_mut::<PreviewControls>().last_error = None;
            Ok(start_session(world, request))
        }
        Err(e) => {
            warn!("[Preview] cannot start: {e}");
            world.resource_mut::<PreviewControls>().last_error = Some(e.to_string());
            Err(e)
        }
    }
}

pub fn request_stop(world: &mut World) -> Option<SessionId> {
    stop_session(world)
}

/// Changes a slot; a live session restarts with the new triple.
/// Returns the id of the replacement session, if one was started.
pub fn change_selection(
    world: &mut World,
    slot: SelectionSlot,
    id: Option<&str>,
) -> Result<Option<SessionId>, ControlError> {
    let changed = world.resource_mut::<PreviewControls>().select(slot, id)?;
    Ok(if changed { hot_swap(world) } else { None })
}

fn hot_swap(world: &mut World) -> Option<SessionId> {
    if world.resource::<PreviewSession>().phase() == SessionPhase::Idle {
        return None;
    }
    let request = world.resource::<PreviewControls>().start_request().ok()?;
    info!("[Preview] selection changed, restarting session");
    Some(start_session(world, request))
}

/// Re-runs the readiness check in the background. The result is applied
/// by [`apply_roster_updates`].
pub fn refresh_roster(world: &mut World) -> Result<(), ControlError> {
    let Some(runtime) = world.get_resource::<PreviewRuntime>().cloned() else {
        return Err(ControlError::Offline);
    };
    let (generation, tx) = world.get_resource_or_insert_with(RosterChannel::default).issue();
    world.resource_mut::<PreviewControls>().status = RosterStatus::Checking;
    info!(
        "[Preview roster] check #{} of project '{}'",
        generation, runtime.project_id
    );
    let client = runtime.client.clone();
    let project_id = runtime.project_id.clone();
    runtime.runtime.spawn(async move {
        let outcome = check_project(&client, client.base_url(), &project_id).await;
        let _ = tx.send((generation, outcome));
    });
    Ok(())
}

fn check_roster_on_startup(world: &mut World) {
    if let Err(e) = refresh_roster(world) {
        warn!("[Preview roster] {e}; roster stays empty until a backend is configured");
    }
}

pub(crate) fn apply_roster_updates(world: &mut World) {
    let outcomes = match world.get_resource_mut::<RosterChannel>() {
        Some(mut channel) => channel.take_fresh(),
        None => return,
    };
    for (_, outcome) in outcomes {
        let (characters, scenes, status, auto_start) = {
            let mut controls = world.resource_mut::<PreviewControls>();
            controls.apply_roster(outcome);
            let auto_start = controls.auto_start && controls.can_start();
            if auto_start {
                controls.auto_start = false;
            }
            (
                controls.roster.characters.len(),
                controls.roster.scenes.len(),
                controls.status,
                auto_start,
            )
        };
        info!(
            "[Preview roster] {:?}: {} characters, {} scenes ready",
            status, characters, scenes
        );
        if let Some(mut bus) = world.get_resource_mut::<GameEventBus>() {
            bus.emit(
                "roster_updated",
                serde_json::json!({ "status": status, "characters": characters, "scenes": scenes }),
                None,
            );
        }
        if auto_start {
            let _ = request_start(world);
        }
    }
}

pub(crate) fn keyboard_controls(world: &mut World) {
    let pressed = |name: &str| {
        world
            .get_resource::<VirtualInput>()
            .is_some_and(|input| input.just_pressed(name))
    };
    let cycles: Vec<SelectionSlot> = [
        (action::CYCLE_PROTAGONIST, SelectionSlot::Protagonist),
        (action::CYCLE_ANTAGONIST, SelectionSlot::Antagonist),
        (action::CYCLE_SCENE, SelectionSlot::Scene),
    ]
    .into_iter()
    .filter(|(name, _)| pressed(*name))
    .map(|(_, slot)| slot)
    .collect();
    let (start, stop, refresh) = (
        pressed(action::START),
        pressed(action::STOP),
        pressed(action::REFRESH),
    );

    let mut changed = false;
    for slot in cycles {
        changed |= world.resource_mut::<PreviewControls>().cycle(slot);
    }
    if changed {
        hot_swap(world);
    }
    if stop {
        request_stop(world);
    }
    if start {
        let _ = request_start(world);
    }
    if refresh {
        if let Err(e) = refresh_roster(world) {
            warn!("[Preview roster] refresh unavailable: {e}");
        }
    }
}

fn sync_placeholder(
    mut commands: Commands,
    session: Res<PreviewSession>,
    controls: Res<PreviewControls>,
    headless: Option<Res<HeadlessMode>>,
    mut placeholder: Query<(Entity, Option<&mut Text2d>), With<AwaitingSelection>>,
) {
    if session.phase() != SessionPhase::Idle {
        for (entity, _) in placeholder.iter() {
            commands.entity(entity).despawn();
        }
        return;
    }
    let text = controls.placeholder_text();
    if placeholder.is_empty() {
        let mut entity = commands.spawn((
            AwaitingSelection,
            GamePosition::new(VIEWPORT_WIDTH / 2.0, VIEWPORT_HEIGHT / 2.0),
            Depth(10.0),
            Transform::default(),
            RenderLayers::layer(OVERLAY_LAYER),
        ));
        if !headless.is_some_and(|h| h.0) {
            entity.insert((
                Text2d::new(text),
                TextFont {
                    font_size: 20.0,
                    ..default()
                },
                TextColor(Color::srgb(0.85, 0.85, 0.85)),
                TextLayout::new_with_justify(JustifyText::Center),
            ));
        }
        return;
    }
    for (_, current) in placeholder.iter_mut() {
        if let Some(mut current) = current {
            if current.0 != text {
                current.0 = text.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Actor;
    use bevy::ecs::system::RunSystemOnce;

    fn ready(id: &str) -> ReadyAsset {
        ReadyAsset {
            id: id.into(),
            name: id.to_uppercase(),
            image_url: format!("http://h/{id}.png"),
            animation: None,
        }
    }

    fn checked(characters: &[&str], scenes: &[&str]) -> RosterOutcome {
        RosterOutcome::Checked {
            assets: ReadyAssets {
                characters: characters.iter().map(|c| ready(c)).collect(),
                scenes: scenes.iter().map(|s| ready(s)).collect(),
            },
            spec_characters: characters.len(),
            spec_scenes: scenes.len(),
        }
    }

    fn world_with(outcome: RosterOutcome) -> World {
        let mut world = World::new();
        world.insert_resource(HeadlessMode(true));
        world.insert_resource(PreviewSession::default());
        world.insert_resource(GameEventBus::default());
        world.insert_resource(crate::config::CombatTuning::default());
        world.init_resource::<crate::loading::LoadChannel>();
        let mut controls = PreviewControls::default();
        controls.apply_roster(outcome);
        world.insert_resource(controls);
        world
    }

    #[test]
    fn roster_status_reflects_readiness() {
        let mut controls = PreviewControls::default();
        controls.apply_roster(checked(&[], &[]));
        assert_eq!(controls.status(), RosterStatus::Insufficient);
        assert!(controls.status().guidance().is_some());
        controls.apply_roster(checked(&["wukong"], &[]));
        assert_eq!(controls.status(), RosterStatus::Incomplete);
        controls.apply_roster(checked(&["wukong"], &["mountain"]));
        assert_eq!(controls.status(), RosterStatus::Ready);
        controls.apply_roster(RosterOutcome::NoSpecs);
        assert_eq!(controls.status(), RosterStatus::NoSpecs);
    }

    #[test]
    fn start_needs_protagonist_and_scene() {
        let mut controls = PreviewControls::default();
        controls.apply_roster(checked(&["wukong", "bajie"], &["mountain"]));
        assert_eq!(controls.start_request(), Err(StartError::MissingProtagonist));
        controls.select(SelectionSlot::Protagonist, Some("wukong")).unwrap();
        assert_eq!(controls.start_request(), Err(StartError::MissingScene));
        controls.select(SelectionSlot::Scene, Some("mountain")).unwrap();
        let request = controls.start_request().unwrap();
        assert_eq!(request.protagonist.id, "wukong");
        assert!(request.antagonist.is_none());

        // The antagonist reuses the character roster.
        controls.select(SelectionSlot::Antagonist, Some("wukong")).unwrap();
        assert_eq!(controls.start_request().unwrap().antagonist.unwrap().id, "wukong");
    }

    #[test]
    fn unknown_ids_are_rejected_without_change() {
        let mut controls = PreviewControls::default();
        controls.apply_roster(checked(&["wukong"], &["mountain"]));
        let err = controls.select(SelectionSlot::Scene, Some("wukong")).unwrap_err();
        assert_eq!(
            err,
            ControlError::UnknownItem {
                slot: "scene",
                id: "wukong".into()
            }
        );
        assert_eq!(controls.selection().scene, None);
        assert_eq!(controls.select(SelectionSlot::Scene, Some("mountain")), Ok(true));
        assert_eq!(controls.select(SelectionSlot::Scene, Some("mountain")), Ok(false));
    }

    #[test]
    fn refresh_keeps_ready_selections_and_applies_preferences() {
        let preferred = Selection {
            protagonist: Some("bajie".into()),
            antagonist: None,
            scene: Some("cave".into()),
        };
        let mut controls = PreviewControls::new(preferred, false);
        controls.apply_roster(checked(&["wukong", "bajie"], &["mountain"]));
        assert_eq!(controls.selection().protagonist.as_deref(), Some("bajie"));
        assert_eq!(controls.selection().scene, None);

        controls.select(SelectionSlot::Scene, Some("mountain")).unwrap();
        controls.apply_roster(checked(&["wukong"], &["mountain", "cave"]));
        // bajie lost its selected variant; the scene choice survives.
        assert_eq!(controls.selection().protagonist, None);
        assert_eq!(controls.selection().scene.as_deref(), Some("mountain"));
    }

    #[test]
    fn antagonist_cycle_passes_through_none() {
        let mut controls = PreviewControls::default();
        controls.apply_roster(checked(&["wukong", "bajie"], &["mountain"]));
        let mut seen = Vec::new();
        for _ in 0..4 {
            controls.cycle(SelectionSlot::Antagonist);
            seen.push(controls.selection().antagonist.clone());
        }
        assert_eq!(
            seen,
            vec![
                Some("wukong".to_string()),
                Some("bajie".to_string()),
                None,
                Some("wukong".to_string())
            ]
        );
        assert!(!PreviewControls::default().cycle(SelectionSlot::Scene));
    }

    #[test]
    fn failed_start_leaves_engine_idle() {
        let mut world = world_with(checked(&["wukong"], &["mountain"]));
        world
            .resource_mut::<PreviewControls>()
            .select(SelectionSlot::Protagonist, Some("wukong"))
            .unwrap();
        assert_eq!(request_start(&mut world), Err(StartError::MissingScene));
        assert_eq!(world.resource::<PreviewSession>().phase(), SessionPhase::Idle);
        assert!(world
            .resource::<PreviewControls>()
            .placeholder_text()
            .contains("choose a scene first"));
    }

    #[test]
    fn selection_change_while_running_hot_swaps() {
        let mut world = world_with(checked(&["wukong", "bajie"], &["mountain"]));
        for (slot, id) in [
            (SelectionSlot::Protagonist, "wukong"),
            (SelectionSlot::Scene, "mountain"),
        ] {
            // Nothing runs yet, so no restart happens.
            assert_eq!(change_selection(&mut world, slot, Some(id)), Ok(None));
        }
        let first = request_start(&mut world).unwrap();
        crate::loading::finish_loads(&mut world);

        let second = change_selection(&mut world, SelectionSlot::Antagonist, Some("bajie"))
            .unwrap()
            .expect("restarted");
        assert_ne!(first, second);
        crate::loading::finish_loads(&mut world);
        assert!(world.resource::<PreviewSession>().is_current(second));
        assert_eq!(world.query::<&Actor>().iter(&world).count(), 2);

        // Re-selecting the same value is not a change.
        assert_eq!(
            change_selection(&mut world, SelectionSlot::Antagonist, Some("bajie")),
            Ok(None)
        );
    }

    #[test]
    fn keyboard_start_and_stop() {
        let mut world = world_with(checked(&["wukong"], &["mountain"]));
        world.insert_resource(VirtualInput::default());
        world.resource_mut::<VirtualInput>().press(action::CYCLE_PROTAGONIST);
        world.resource_mut::<VirtualInput>().press(action::CYCLE_SCENE);
        world.resource_mut::<VirtualInput>().press(action::START);
        world.run_system_once(keyboard_controls).unwrap();
        assert_eq!(world.resource::<PreviewSession>().phase(), SessionPhase::Loading);

        *world.resource_mut::<VirtualInput>() = VirtualInput::default();
        world.resource_mut::<VirtualInput>().press(action::STOP);
        world.run_system_once(keyboard_controls).unwrap();
        assert_eq!(world.resource::<PreviewSession>().phase(), SessionPhase::Idle);
    }

    #[test]
    fn auto_start_fires_once_roster_allows_it() {
        let mut world = world_with(RosterOutcome::NoSpecs);
        let preferred = Selection {
            protagonist: Some("wukong".into()),
            antagonist: None,
            scene: Some("mountain".into()),
        };
        world.insert_resource(PreviewControls::new(preferred, true));
        world.init_resource::<RosterChannel>();
        let (generation, tx) = world.resource_mut::<RosterChannel>().issue();
        tx.send((generation, checked(&["wukong"], &["mountain"]))).unwrap();
        world.run_system_once(apply_roster_updates).unwrap();
        assert_eq!(world.resource::<PreviewSession>().phase(), SessionPhase::Loading);
        assert_eq!(world.resource::<GameEventBus>().count("roster_updated"), 1);
    }

    #[test]
    fn older_check_finishing_last_does_not_overwrite_newer() {
        let mut world = world_with(RosterOutcome::NoSpecs);
        world.init_resource::<RosterChannel>();
        let (first, first_tx) = world.resource_mut::<RosterChannel>().issue();
        let (second, second_tx) = world.resource_mut::<RosterChannel>().issue();

        second_tx
            .send((second, checked(&["wukong", "bajie"], &["mountain"])))
            .unwrap();
        world.run_system_once(apply_roster_updates).unwrap();
        first_tx.send((first, checked(&["wukong"], &[]))).unwrap();
        world.run_system_once(apply_roster_updates).unwrap();

        let controls = world.resource::<PreviewControls>();
        assert_eq!(controls.roster().characters.len(), 2);
        assert_eq!(controls.status(), RosterStatus::Ready);
        assert_eq!(world.resource::<GameEventBus>().count("roster_updated"), 1);
    }

    #[test]
    fn placeholder_exists_only_while_idle() {
        let mut world = world_with(checked(&["wukong"], &["mountain"]));
        world.run_system_once(sync_placeholder).unwrap();
        assert_eq!(world.query::<&AwaitingSelection>().iter(&world).count(), 1);

        world
            .resource_mut::<PreviewControls>()
            .select(SelectionSlot::Protagonist, Some("wukong"))
            .unwrap();
        world
            .resource_mut::<PreviewControls>()
            .select(SelectionSlot::Scene, Some("mountain"))
            .unwrap();
        request_start(&mut world).unwrap();
        world.run_system_once(sync_placeholder).unwrap();
        assert_eq!(world.query::<&AwaitingSelection>().iter(&world).count(), 0);

        request_stop(&mut world);
        world.run_system_once(sync_placeholder).unwrap();
        assert_eq!(world.query::<&AwaitingSelection>().iter(&world).count(), 1);
    }
}
