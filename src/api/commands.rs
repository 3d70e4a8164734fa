use super::*;

/// Commands sent from API -> Bevy
pub enum ApiCommand {
    GetState(tokio::sync::oneshot::Sender<PreviewState>),
    GetRoster(tokio::sync::oneshot::Sender<RosterView>),
    RefreshRoster(tokio::sync::oneshot::Sender<Result<(), String>>),
    Select(
        SelectRequest,
        tokio::sync::oneshot::Sender<Result<SelectResult, String>>,
    ),
    Start(tokio::sync::oneshot::Sender<Result<SessionResult, String>>),
    Stop(tokio::sync::oneshot::Sender<SessionResult>),
    GetEvents(Option<u64>, tokio::sync::oneshot::Sender<Vec<PreviewEvent>>),
}

#[derive(Resource)]
pub struct ApiChannels {
    pub receiver: Receiver<ApiCommand>,
}

/// Drains pending API commands against the world.
pub(super) fn process_api_commands(world: &mut World) {
    let pending: Vec<ApiCommand> = match world.get_resource::<ApiChannels>() {
        Some(channels) => channels.receiver.try_iter().collect(),
        None => return,
    };
    for cmd in pending {
        handle_command(world, cmd);
    }
}

pub(super) fn handle_command(world: &mut World, cmd: ApiCommand) {
    match cmd {
        ApiCommand::GetState(tx) => {
            let _ = tx.send(preview_state(world));
        }
        ApiCommand::GetRoster(tx) => {
            let _ = tx.send(roster_view(world));
        }
        ApiCommand::RefreshRoster(tx) => {
            let _ = tx.send(refresh_roster(world).map_err(|e| e.to_string()));
        }
        ApiCommand::Select(req, tx) => {
            let result = change_selection(world, req.slot, req.id.as_deref())
                .map(|restarted| SelectResult {
                    selection: world.resource::<PreviewControls>().selection().clone(),
                    restarted: restarted.map(|id| id.0),
                })
                .map_err(|e| e.to_string());
            let _ = tx.send(result);
        }
        ApiCommand::Start(tx) => {
            let result = request_start(world)
                .map(|id| SessionResult {
                    session: Some(id.0),
                })
                .map_err(|e| e.to_string());
            let _ = tx.send(result);
        }
        ApiCommand::Stop(tx) => {
            let stopped = request_stop(world);
            let _ = tx.send(SessionResult {
                session: stopped.map(|id| id.0),
            });
        }
        ApiCommand::GetEvents(since, tx) => {
            let events = world
                .get_resource::<GameEventBus>()
                .map(|bus| bus.since(since))
                .unwrap_or_default();
            let _ = tx.send(events);
        }
    }
}

fn preview_state(world: &mut World) -> PreviewState {
    let mut query = world.query::<(
        &Actor,
        &GamePosition,
        Option<&Health>,
        Option<&Facing>,
        Option<&AnimationPlayer>,
    )>();
    let actors = query
        .iter(world)
        .map(|(actor, pos, health, facing, anim)| ActorSnapshot {
            name: actor.name.clone(),
            controller: actor.controller,
            x: pos.x,
            y: pos.y,
            health: health.map_or(0.0, |h| h.current),
            facing_left: facing.is_some_and(|f| f.left),
            animation: anim.map(|a| a.state).unwrap_or_default(),
        })
        .collect();
    let session = world.resource::<PreviewSession>();
    PreviewState {
        phase: session.phase(),
        session: session.current().map(|id| id.0),
        request: session.request().cloned(),
        ultimate_active: world
            .get_resource::<UltimateState>()
            .is_some_and(|u| u.active),
        actors,
    }
}

fn roster_view(world: &World) -> RosterView {
    let controls = world.resource::<PreviewControls>();
    RosterView {
        status: controls.status(),
        guidance: controls.status().guidance().map(str::to_string),
        characters: controls.roster().characters.clone(),
        scenes: controls.roster().scenes.clone(),
        selection: controls.selection().clone(),
        can_start: controls.can_start(),
        last_error: controls.last_error().map(str::to_string),
    }
}
