use bevy::prelude::*;

use crate::animation::{AnimationPlayer, Channeling};
use crate::combat::{damage_or_respawn, PreviewRng, HIT_FLASH, HIT_FLASH_SECS};
use crate::components::{
    Actor, ActorController, CollideWorldBounds, Facing, GamePosition, Health, Protagonist,
    SpriteTint, Velocity, VIEWPORT_HEIGHT, VIEWPORT_WIDTH,
};
use crate::config::CombatTuning;
use crate::events::GameEventBus;
use crate::input::{action, VirtualInput};
use crate::session::{PreviewSession, PreviewSet};
use crate::sprites::{ActorSheets, AnimAction};
use crate::trail::TrailEffect;
use crate::tween::TweenSet;
use crate::ultimate::UltimateState;

pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (player_movement, basic_attack)
                .chain()
                .in_set(PreviewSet::Simulation),
        )
        .add_systems(Update, integrate_velocity.in_set(PreviewSet::Motion));
    }
}

/// Strict: a target exactly at `range` is missed.
pub fn attack_hits(distance: f32, range: f32) -> bool {
    distance < range
}

pub(crate) fn player_movement(
    input: Res<VirtualInput>,
    tuning: Res<CombatTuning>,
    ultimate: Res<UltimateState>,
    mut query: Query<(
        &Actor,
        &mut Velocity,
        &mut Facing,
        &AnimationPlayer,
        Has<Channeling>,
        Option<&mut TrailEffect>,
    )>,
) {
    for (actor, mut velocity, mut facing, anim, channeling, trail) in query.iter_mut() {
        if actor.controller != ActorController::PlayerInput {
            continue;
        }
        let locked = channeling || ultimate.active || anim.attack_playing;
        let dir = if locked { Vec2::ZERO } else { input.direction() };
        // Per-axis speed; diagonals are intentionally faster.
        velocity.x = dir.x * tuning.player_speed;
        velocity.y = dir.y * tuning.player_speed;
        if velocity.x != 0.0 {
            facing.left = velocity.x < 0.0;
        }
        if let Some(mut trail) = trail {
            trail.emitting = velocity.is_moving() || anim.attack_playing;
        }
    }
}

#[allow(clippy::type_complexity)]
pub(crate) fn basic_attack(
    input: Res<VirtualInput>,
    tuning: Res<CombatTuning>,
    ultimate: Res<UltimateState>,
    session: Res<PreviewSession>,
    mut rng: ResMut<PreviewRng>,
    mut bus: ResMut<GameEventBus>,
    mut attackers: Query<
        (
            &Actor,
            &GamePosition,
            &mut AnimationPlayer,
            Option<&ActorSheets>,
            Has<Channeling>,
        ),
        With<Protagonist>,
    >,
    mut targets: Query<
        (&Actor, &mut GamePosition, &mut Health, &mut SpriteTint),
        Without<Protagonist>,
    >,
) {
    if !input.just_pressed(action::ATTACK) || ultimate.active {
        return;
    }
    for (attacker, origin, mut anim, sheets, channeling) in attackers.iter_mut() {
        if attacker.controller != ActorController::PlayerInput || channeling || anim.attack_playing {
            continue;
        }
        if sheets.is_some_and(|s| s.has_clip(AnimAction::Attack)) {
            anim.attack_playing = true;
        }
        // The hit check does not depend on the clip being available.
        for (target, mut pos, mut health, mut tint) in targets.iter_mut() {
            if target.controller != ActorController::PursuitAi {
                continue;
            }
            let distance = origin.distance(*pos);
            if !attack_hits(distance, tuning.attack_range) {
                continue;
            }
            tint.flash(HIT_FLASH, HIT_FLASH_SECS);
            let respawned =
                damage_or_respawn(&mut health, &mut pos, tuning.attack_damage, &mut rng);
            bus.emit(
                "basic_attack_hit",
                serde_json::json!({
                    "attacker": attacker.name,
                    "target": target.name,
                    "distance": distance,
                    "health": health.current,
                    "respawned": respawned,
                }),
                session.current(),
            );
        }
    }
}

/// Moves every entity by its velocity unless a position tween owns it.
pub(crate) fn integrate_velocity(
    time: Res<Time>,
    mut query: Query<(
        &mut GamePosition,
        &Velocity,
        Has<CollideWorldBounds>,
        Option<&TweenSet>,
    )>,
) {
    let dt = time.delta_secs();
    for (mut pos, velocity, bounded, tweens) in query.iter_mut() {
        if tweens.is_some_and(TweenSet::drives_position) {
            continue;
        }
        pos.x += velocity.x * dt;
        pos.y += velocity.y * dt;
        if bounded {
            pos.x = pos.x.clamp(0.0, VIEWPORT_WIDTH);
            pos.y = pos.y.clamp(0.0, VIEWPORT_HEIGHT);
        }
    }
}
