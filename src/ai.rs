use bevy::prelude::*;

use crate::combat::{damage_or_respawn, PreviewRng, DAMAGE_FLASH, DAMAGE_FLASH_SECS};
use crate::components::{Actor, ActorController, Facing, GamePosition, Health, SpriteTint, Velocity};
use crate::config::CombatTuning;
use crate::events::GameEventBus;
use crate::session::{PreviewSession, PreviewSet};

pub struct AiPlugin;

impl Plugin for AiPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            pursue_target
                .in_set(PreviewSet::Simulation)
                .after(crate::player::basic_attack),
        );
    }
}

/// What a pursuing actor does this frame given its distance to the target.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PursuitDecision {
    /// Out of aggro range: stand still.
    Idle,
    Chase,
    /// Within contact range: stand still and deal contact damage.
    Contact,
}

/// `(contact, aggro)` is the chase band; contact is inclusive, aggro exclusive.
pub fn pursuit_decision(distance: f32, tuning: &CombatTuning) -> PursuitDecision {
    if distance <= tuning.contact_range {
        PursuitDecision::Contact
    } else if distance < tuning.aggro_range {
        PursuitDecision::Chase
    } else {
        PursuitDecision::Idle
    }
}

type ActorQuery<'w, 's> = Query<
    'w,
    's,
    (
        Entity,
        &'static Actor,
        &'static mut GamePosition,
        &'static mut Velocity,
        &'static mut Facing,
        Option<&'static mut Health>,
        Option<&'static mut SpriteTint>,
    ),
>;

pub(crate) fn pursue_target(
    tuning: Res<CombatTuning>,
    session: Res<PreviewSession>,
    mut rng: ResMut<PreviewRng>,
    mut bus: ResMut<GameEventBus>,
    mut actors: ActorQuery,
) {
    let Some((target, target_pos)) = actors
        .iter()
        .find(|(_, actor, ..)| actor.controller == ActorController::PlayerInput)
        .map(|(entity, _, pos, ..)| (entity, *pos))
    else {
        return;
    };

    let mut contact_damage = 0.0;
    for (_, actor, pos, mut velocity, mut facing, _, _) in actors.iter_mut() {
        if actor.controller != ActorController::PursuitAi {
            continue;
        }
        let offset = target_pos.as_vec2() - pos.as_vec2();
        match pursuit_decision(offset.length(), &tuning) {
            PursuitDecision::Chase => {
                let step = offset.normalize_or_zero() * tuning.monster_speed;
                velocity.x = step.x;
                velocity.y = step.y;
                if step.x != 0.0 {
                    facing.left = step.x < 0.0;
                }
            }
            PursuitDecision::Contact => {
                velocity.x = 0.0;
                velocity.y = 0.0;
                contact_damage += tuning.contact_damage_per_frame;
            }
            PursuitDecision::Idle => {
                velocity.x = 0.0;
                velocity.y = 0.0;
            }
        }
    }

    if contact_damage <= 0.0 {
        return;
    }
    let Ok((_, actor, mut pos, _, _, health, tint)) = actors.get_mut(target) else {
        return;
    };
    if let Some(mut tint) = tint {
        tint.flash(DAMAGE_FLASH, DAMAGE_FLASH_SECS);
    }
    if let Some(mut health) = health {
        if damage_or_respawn(&mut health, &mut pos, contact_damage, &mut rng) {
            bus.emit(
                "actor_respawned",
                serde_json::json!({ "actor": actor.name, "cause": "contact" }),
                session.current(),
            );
        }
    }
}
