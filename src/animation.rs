use bevy::prelude::*;
use serde::Serialize;

use crate::components::{Actor, Velocity};
use crate::sprites::{ActorSheets, AnimAction};

/// Per-actor animation state.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimState {
    #[default]
    Idle,
    Walk,
    Attack,
    /// Held during the ultimate; shows the idle clip.
    Channeling,
}

impl AnimState {
    pub fn clip(self) -> AnimAction {
        match self {
            Self::Idle | Self::Channeling => AnimAction::Idle,
            Self::Walk => AnimAction::Walk,
            Self::Attack => AnimAction::Attack,
        }
    }
}

/// Inputs to the transition function, gathered once per frame.
#[derive(Clone, Copy, Default, Debug)]
pub struct AnimDrive {
    pub moving: bool,
    pub attack_playing: bool,
    pub channeling: bool,
}

/// Channeling beats an attack in progress, which beats movement.
pub fn next_state(drive: AnimDrive) -> AnimState {
    if drive.channeling {
        AnimState::Channeling
    } else if drive.attack_playing {
        AnimState::Attack
    } else if drive.moving {
        AnimState::Walk
    } else {
        AnimState::Idle
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ClipRates {
    pub idle: f32,
    pub walk: f32,
    pub attack: f32,
}

impl ClipRates {
    pub const PROTAGONIST: ClipRates = ClipRates {
        idle: 8.0,
        walk: 10.0,
        attack: 15.0,
    };
    pub const ANTAGONIST: ClipRates = ClipRates {
        idle: 8.0,
        walk: 8.0,
        attack: 8.0,
    };

    pub fn fps(&self, action: AnimAction) -> f32 {
        match action {
            AnimAction::Idle => self.idle,
            AnimAction::Walk => self.walk,
            AnimAction::Attack => self.attack,
        }
    }
}

/// Marks an actor as channeling the ultimate; input is ignored meanwhile.
#[derive(Component)]
pub struct Channeling;

#[derive(Component, Clone, Debug)]
pub struct AnimationPlayer {
    pub state: AnimState,
    pub frame: usize,
    pub timer: f32,
    /// A one-shot attack clip is running.
    pub attack_playing: bool,
    pub rates: ClipRates,
}

impl AnimationPlayer {
    pub fn new(rates: ClipRates) -> Self {
        Self {
            state: AnimState::Idle,
            frame: 0,
            timer: 0.0,
            attack_playing: false,
            rates,
        }
    }

    fn enter(&mut self, state: AnimState) {
        if self.state != state {
            self.state = state;
            self.frame = 0;
            self.timer = 0.0;
        }
    }
}

pub struct AnimationPlugin;

impl Plugin for AnimationPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (drive_animation_state, advance_animation_frames)
                .chain()
                .in_set(crate::session::PreviewSet::Effects),
        )
        .add_systems(
            Update,
            apply_animation_frame.in_set(crate::session::PreviewSet::Render),
        );
    }
}

pub(crate) fn drive_animation_state(
    mut query: Query<(&mut AnimationPlayer, &Velocity, Has<Channeling>), With<Actor>>,
) {
    for (mut player, velocity, channeling) in query.iter_mut() {
        if channeling {
            player.attack_playing = false;
        }
        let state = next_state(AnimDrive {
            moving: velocity.is_moving(),
            attack_playing: player.attack_playing,
            channeling,
        });
        player.enter(state);
    }
}

pub(crate) fn advance_animation_frames(
    time: Res<Time>,
    mut query: Query<(&mut AnimationPlayer, Option<&ActorSheets>)>,
) {
    let dt = time.delta_secs();
    for (mut player, sheets) in query.iter_mut() {
        let action = player.state.clip();
        let frame_count = sheets.map_or(1, |s| s.frame_count(action));
        let fps = player.rates.fps(action).max(0.01);
        player.timer += dt;
        let frame_time = 1.0 / fps;
        while player.timer >= frame_time {
            player.timer -= frame_time;
            if player.frame + 1 < frame_count {
                player.frame += 1;
            } else if player.state == AnimState::Attack {
                // One-shot: hold the last frame and hand control back.
                player.attack_playing = false;
                player.timer = 0.0;
                break;
            } else {
                player.frame = 0;
            }
        }
    }
}

fn apply_animation_frame(mut query: Query<(&AnimationPlayer, &ActorSheets, &mut Sprite)>) {
    for (player, sheets, mut sprite) in query.iter_mut() {
        if let Some(clip) = sheets.clip(player.state.clip()) {
            let index = clip.frames[player.frame.min(clip.frames.len().saturating_sub(1))];
            if sprite.image != clip.image {
                sprite.image = clip.image.clone();
            }
            match sprite.texture_atlas.as_mut() {
                Some(atlas) if atlas.layout == clip.layout => atlas.index = index,
                _ => {
                    sprite.texture_atlas = Some(TextureAtlas {
                        layout: clip.layout.clone(),
                        index,
                    });
                }
            }
        } else if let Some((image, _)) = &sheets.static_image {
            if sprite.image != *image {
                sprite.image = image.clone();
            }
            sprite.texture_atlas = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::RunSystemOnce;
    use std::time::Duration;

    use crate::components::ActorController;

    #[test]
    fn transition_priorities() {
        let d = |moving, attack_playing, channeling| AnimDrive {
            moving,
            attack_playing,
            channeling,
        };
        assert_eq!(next_state(d(false, false, false)), AnimState::Idle);
        assert_eq!(next_state(d(true, false, false)), AnimState::Walk);
        // Movement never interrupts an attack in progress.
        assert_eq!(next_state(d(true, true, false)), AnimState::Attack);
        assert_eq!(next_state(d(true, true, true)), AnimState::Channeling);
        assert_eq!(AnimState::Channeling.clip(), AnimAction::Idle);
    }

    #[test]
    fn attack_clip_plays_once_then_releases() {
        let mut world = World::new();
        world.insert_resource(Time::<()>::default());
        let mut player = AnimationPlayer::new(ClipRates::PROTAGONIST);
        player.attack_playing = true;
        let e = world
            .spawn((
                Actor {
                    name: "hero".into(),
                    controller: ActorController::PlayerInput,
                },
                Velocity { x: 250.0, y: 0.0 },
                player,
            ))
            .id();

        world.run_system_once(drive_animation_state).unwrap();
        assert_eq!(world.get::<AnimationPlayer>(e).unwrap().state, AnimState::Attack);

        // No sheets: a single frame, so one frame period ends the clip.
        world
            .resource_mut::<Time>()
            .advance_by(Duration::from_secs_f32(1.0 / 15.0 + 0.001));
        world.run_system_once(advance_animation_frames).unwrap();
        world.run_system_once(drive_animation_state).unwrap();
        let anim = world.get::<AnimationPlayer>(e).unwrap();
        assert!(!anim.attack_playing);
        assert_eq!(anim.state, AnimState::Walk);
        assert_eq!(anim.frame, 0);
    }

    #[test]
    fn channeling_cancels_attack() {
        let mut world = World::new();
        let mut player = AnimationPlayer::new(ClipRates::PROTAGONIST);
        player.attack_playing = true;
        let e = world
            .spawn((
                Actor {
                    name: "hero".into(),
                    controller: ActorController::PlayerInput,
                },
                Velocity::default(),
                Channeling,
                player,
            ))
            .id();
        world.run_system_once(drive_animation_state).unwrap();
        let anim = world.get::<AnimationPlayer>(e).unwrap();
        assert_eq!(anim.state, AnimState::Channeling);
        assert!(!anim.attack_playing);
    }
}
