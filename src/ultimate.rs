use std::f32::consts::TAU;

use bevy::prelude::*;

use crate::animation::Channeling;
use crate::camera::CameraShakeState;
use crate::combat::{
    apply_damage, respawn, PreviewRng, ANTAGONIST_TINT, FINISHER_TINT, HIT_FLASH,
    PROTAGONIST_TINT,
};
use crate::components::{
    Antagonist, Depth, GamePosition, Health, Protagonist, SessionEntity, SessionId, SpriteTint,
};
use crate::config::CombatTuning;
use crate::events::GameEventBus;
use crate::input::{action, VirtualInput};
use crate::scheduler::StepScheduler;
use crate::session::{PreviewSession, PreviewSet};
use crate::trail::TrailEffect;
use crate::tween::{add_tween, EasingFunction, TweenInstance, TweenProperty, TweenSet};

pub const CHANNEL_TINT: Color = Color::srgb(0.0, 1.0, 1.0);
pub const CHANNEL_ALPHA: f32 = 0.6;
pub const CLONE_ALPHA: f32 = 0.8;
pub const CLONE_COLORS: [Color; 6] = [
    Color::srgb(0.0, 1.0, 1.0),
    Color::srgb(1.0, 0.0, 1.0),
    Color::srgb(1.0, 1.0, 0.0),
    Color::srgb(0.0, 1.0, 0.0),
    Color::srgb(1.0, 0.0, 0.0),
    Color::srgb(1.0, 1.0, 1.0),
];

const STEP_SHAKE: (f32, f32) = (0.12, 0.008);
const FINAL_SHAKE: (f32, f32) = (0.6, 0.035);
const STEP_FLASH_SECS: f32 = 0.08;
const BOUNCE: Vec2 = Vec2::new(20.0, -12.0);
const BOUNCE_SECS: f32 = 0.08;

/// Whether an ultimate is in flight. At most one at a time.
#[derive(Resource, Default, Debug)]
pub struct UltimateState {
    pub active: bool,
}

/// Delayed part of the sequence, queued on the session's scheduler.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UltimateStep {
    /// Clone `i` charges at the antagonist's current position.
    Charge(usize),
    /// Clone `i` arrives.
    Impact(usize),
    /// Knockback finished: straighten up and respawn if depleted.
    Recover,
}

/// Transient copy of the protagonist taking part in the sequence.
#[derive(Component)]
pub struct UltimateClone {
    pub index: usize,
}

pub struct UltimatePlugin;

impl Plugin for UltimatePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<UltimateState>()
            .init_resource::<StepScheduler<UltimateStep>>()
            .add_systems(
                Update,
                (trigger_ultimate, run_ultimate_steps)
                    .chain()
                    .in_set(PreviewSet::Simulation)
                    .after(crate::player::basic_attack),
            );
    }
}

/// Which way knockback pushes: away from the protagonist.
fn push_direction(antagonist: &GamePosition, protagonist: &GamePosition) -> f32 {
    if antagonist.x > protagonist.x {
        1.0
    } else {
        -1.0
    }
}

#[allow(clippy::type_complexity)]
pub(crate) fn trigger_ultimate(
    mut commands: Commands,
    input: Res<VirtualInput>,
    tuning: Res<CombatTuning>,
    session: Res<PreviewSession>,
    mut state: ResMut<UltimateState>,
    mut scheduler: ResMut<StepScheduler<UltimateStep>>,
    mut bus: ResMut<GameEventBus>,
    mut protagonist: Query<
        (Entity, &GamePosition, &Transform, &mut SpriteTint, Option<&Sprite>),
        With<Protagonist>,
    >,
    antagonist: Query<(), With<Antagonist>>,
) {
    if !input.just_pressed(action::ULTIMATE) || state.active || antagonist.is_empty() {
        return;
    }
    let Some(id) = session.current() else {
        return;
    };
    let Ok((entity, origin, transform, mut tint, sprite)) = protagonist.get_single_mut() else {
        return;
    };

    state.active = true;
    tint.base = CHANNEL_TINT;
    tint.alpha = CHANNEL_ALPHA;
    commands.entity(entity).insert(Channeling);

    let count = tuning.ultimate_clone_count.max(1);
    for i in 0..count {
        let angle = (i as f32 / count as f32) * TAU;
        let target = origin.as_vec2() + Vec2::new(angle.cos(), angle.sin()) * tuning.ultimate_spread;
        let mut clone_tint = SpriteTint::new(CLONE_COLORS[i % CLONE_COLORS.len()]);
        clone_tint.alpha = 0.0;
        let disperse = tuning.ultimate_disperse_secs;
        let mut clone = commands.spawn((
            UltimateClone { index: i },
            SessionEntity(id),
            *origin,
            Depth(3.0),
            Transform {
                translation: transform.translation,
                scale: transform.scale,
                ..default()
            },
            clone_tint,
            TweenSet::single(TweenInstance::to(
                TweenProperty::X,
                target.x,
                disperse,
                EasingFunction::BackOut,
            ))
            .with(TweenInstance::to(
                TweenProperty::Y,
                target.y,
                disperse,
                EasingFunction::BackOut,
            ))
            .with(
                TweenInstance::to(TweenProperty::Alpha, CLONE_ALPHA, disperse, EasingFunction::BackOut)
                    .from(0.0),
            ),
        ));
        if let Some(sprite) = sprite {
            clone.insert(Sprite {
                image: sprite.image.clone(),
                texture_atlas: sprite.texture_atlas.clone(),
                flip_x: sprite.flip_x,
                anchor: sprite.anchor,
                color: clone_tint.effective(),
                ..default()
            });
        }
        let delay = disperse
            + tuning.ultimate_charge_base_delay_secs
            + i as f32 * tuning.ultimate_charge_stagger_secs;
        scheduler.schedule(id, delay, UltimateStep::Charge(i));
    }
    info!("[Preview] Ultimate started with {} clones", count);
    bus.emit(
        "ultimate_started",
        serde_json::json!({ "clones": count }),
        Some(id),
    );
}

/// Fires due steps. Steps left over from a replaced session are dropped.
pub(crate) fn run_ultimate_steps(world: &mut World) {
    let dt = world.resource::<Time>().delta_secs();
    let due = world
        .resource_mut::<StepScheduler<UltimateStep>>()
        .advance(dt);
    for (session, step) in due {
        if !world.resource::<PreviewSession>().is_current(session) {
            debug!("[Preview] Dropping {:?} from stale session #{}", step, session.0);
            continue;
        }
        match step {
            UltimateStep::Charge(index) => charge(world, session, index),
            UltimateStep::Impact(index) => impact(world, session, index),
            UltimateStep::Recover => recover(world),
        }
    }
}

fn first_with<M: Component>(world: &mut World) -> Option<Entity> {
    let mut query = world.query_filtered::<Entity, With<M>>();
    query.iter(world).next()
}

fn find_clone(world: &mut World, index: usize) -> Option<Entity> {
    let mut query = world.query::<(Entity, &UltimateClone)>();
    query
        .iter(world)
        .find(|(_, clone)| clone.index == index)
        .map(|(entity, _)| entity)
}

fn is_last(world: &World, index: usize) -> bool {
    index + 1 >= world.resource::<CombatTuning>().ultimate_clone_count.max(1)
}

fn charge(world: &mut World, session: SessionId, index: usize) {
    let clone = find_clone(world, index);
    let target = first_with::<Antagonist>(world)
        .and_then(|e| world.get::<GamePosition>(e).copied());
    let (Some(clone), Some(target)) = (clone, target) else {
        if let Some(clone) = clone {
            world.despawn(clone);
        }
        // Nothing left to hit: close the sequence so the protagonist recovers.
        if is_last(world, index) {
            finish(world, session);
        }
        return;
    };
    let secs = world.resource::<CombatTuning>().ultimate_charge_secs;
    world.entity_mut(clone).insert(TrailEffect::streak());
    add_tween(
        world,
        clone,
        TweenInstance::to(TweenProperty::X, target.x, secs, EasingFunction::CubicIn),
    );
    add_tween(
        world,
        clone,
        TweenInstance::to(TweenProperty::Y, target.y, secs, EasingFunction::CubicIn),
    );
    world
        .resource_mut::<StepScheduler<UltimateStep>>()
        .schedule(session, secs, UltimateStep::Impact(index));
}

fn impact(world: &mut World, session: SessionId, index: usize) {
    if let Some(clone) = find_clone(world, index) {
        world.despawn(clone);
    }
    world
        .resource_mut::<CameraShakeState>()
        .start(STEP_SHAKE.0, STEP_SHAKE.1);

    let protagonist = first_with::<Protagonist>(world)
        .and_then(|e| world.get::<GamePosition>(e).copied())
        .unwrap_or_default();
    if let Some(antagonist) = first_with::<Antagonist>(world) {
        let pos = world.get::<GamePosition>(antagonist).copied().unwrap_or_default();
        let dir = push_direction(&pos, &protagonist);
        if let Some(mut tint) = world.get_mut::<SpriteTint>(antagonist) {
            tint.flash(HIT_FLASH, STEP_FLASH_SECS);
        }
        add_tween(
            world,
            antagonist,
            TweenInstance::to(
                TweenProperty::X,
                pos.x + BOUNCE.x * dir,
                BOUNCE_SECS,
                EasingFunction::BackOut,
            )
            .yoyo(),
        );
        add_tween(
            world,
            antagonist,
            TweenInstance::to(
                TweenProperty::Y,
                pos.y + BOUNCE.y,
                BOUNCE_SECS,
                EasingFunction::BackOut,
            )
            .yoyo(),
        );
    }

    if is_last(world, index) {
        finish(world, session);
    }
}

/// Finishing blow; also releases the protagonist from channeling.
fn finish(world: &mut World, session: SessionId) {
    world.resource_mut::<UltimateState>().active = false;
    world
        .resource_mut::<CameraShakeState>()
        .start(FINAL_SHAKE.0, FINAL_SHAKE.1);

    let protagonist = first_with::<Protagonist>(world);
    let mut origin = GamePosition::default();
    if let Some(entity) = protagonist {
        origin = world.get::<GamePosition>(entity).copied().unwrap_or_default();
        let mut entity_mut = world.entity_mut(entity);
        entity_mut.remove::<Channeling>();
        if let Some(mut tint) = entity_mut.get_mut::<SpriteTint>() {
            tint.base = PROTAGONIST_TINT;
            tint.alpha = 1.0;
        }
    }

    let Some(antagonist) = first_with::<Antagonist>(world) else {
        return;
    };
    let tuning = world.resource::<CombatTuning>().clone();
    let pos = world.get::<GamePosition>(antagonist).copied().unwrap_or_default();
    let dir = push_direction(&pos, &origin);
    let mut health_left = 0.0;
    if let Some(mut health) = world.get_mut::<Health>(antagonist) {
        apply_damage(&mut health, tuning.ultimate_final_damage);
        health_left = health.current;
    }
    if let Some(mut tint) = world.get_mut::<SpriteTint>(antagonist) {
        tint.base = FINISHER_TINT;
    }
    let secs = tuning.ultimate_knockback_secs;
    let [push_x, lift_y] = tuning.ultimate_knockback;
    add_tween(
        world,
        antagonist,
        TweenInstance::to(TweenProperty::X, pos.x + push_x * dir, secs, EasingFunction::ExpoOut),
    );
    add_tween(
        world,
        antagonist,
        TweenInstance::to(TweenProperty::Y, pos.y - lift_y, secs, EasingFunction::ExpoOut),
    );
    add_tween(
        world,
        antagonist,
        TweenInstance::to(
            TweenProperty::Rotation,
            tuning.ultimate_spin_degrees * dir,
            secs,
            EasingFunction::ExpoOut,
        )
        .from(0.0),
    );
    world
        .resource_mut::<StepScheduler<UltimateStep>>()
        .schedule(session, secs, UltimateStep::Recover);

    info!("[Preview] Ultimate landed, antagonist at {:.0} hp", health_left);
    world.resource_mut::<GameEventBus>().emit(
        "ultimate_finished",
        serde_json::json!({ "damage": tuning.ultimate_final_damage, "health": health_left }),
        Some(session),
    );
}

fn recover(world: &mut World) {
    let Some(antagonist) = first_with::<Antagonist>(world) else {
        return;
    };
    if let Some(mut tweens) = world.get_mut::<TweenSet>(antagonist) {
        tweens.0.retain(|t| t.property != TweenProperty::Rotation);
    }
    if let Some(mut transform) = world.get_mut::<Transform>(antagonist) {
        transform.rotation = Quat::IDENTITY;
    }
    if let Some(mut tint) = world.get_mut::<SpriteTint>(antagonist) {
        tint.base = ANTAGONIST_TINT;
    }
    let depleted = world
        .get::<Health>(antagonist)
        .is_some_and(|h| h.current <= 0.0);
    if !depleted {
        return;
    }
    world.resource_scope(|world, mut rng: Mut<PreviewRng>| {
        let mut entity_mut = world.entity_mut(antagonist);
        let Some(mut health) = entity_mut.get::<Health>().copied() else {
            return;
        };
        let Some(mut pos) = entity_mut.get::<GamePosition>().copied() else {
            return;
        };
        respawn(&mut health, &mut pos, &mut rng);
        entity_mut.insert((health, pos));
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Actor, ActorController, Velocity};
    use crate::readiness::ReadyAsset;
    use crate::session::SessionRequest;
    use bevy::ecs::system::RunSystemOnce;
    use std::time::Duration;

    fn asset(id: &str) -> ReadyAsset {
        ReadyAsset {
            id: id.into(),
            name: id.into(),
            image_url: format!("http://h/{id}.png"),
            animation: None,
        }
    }

    fn setup() -> (World, Entity, Entity) {
        let mut world = World::new();
        world.insert_resource(Time::<()>::default());
        world.insert_resource(CombatTuning::default());
        world.insert_resource(UltimateState::default());
        world.insert_resource(StepScheduler::<UltimateStep>::default());
        world.insert_resource(CameraShakeState::default());
        world.insert_resource(GameEventBus::default());
        world.insert_resource(PreviewRng::seeded(11));
        world.insert_resource(VirtualInput::default());
        let mut session = PreviewSession::default();
        let id = session.begin(SessionRequest {
            protagonist: asset("hero"),
            antagonist: Some(asset("foe")),
            scene: asset("scene"),
        });
        session.mark_running(id);
        world.insert_resource(session);

        let hero = world
            .spawn((
                Actor {
                    name: "hero".into(),
                    controller: ActorController::PlayerInput,
                },
                Protagonist,
                GamePosition::new(200.0, 270.0),
                Velocity::default(),
                Transform::default(),
                SpriteTint::new(PROTAGONIST_TINT),
            ))
            .id();
        let foe = world
            .spawn((
                Actor {
                    name: "foe".into(),
                    controller: ActorController::PursuitAi,
                },
                Antagonist,
                GamePosition::new(500.0, 270.0),
                Velocity::default(),
                Transform::default(),
                Health::default(),
                SpriteTint::new(ANTAGONIST_TINT),
            ))
            .id();
        (world, hero, foe)
    }

    fn press_r(world: &mut World) {
        world.resource_mut::<VirtualInput>().press(action::ULTIMATE);
        world.run_system_once(trigger_ultimate).unwrap();
        *world.resource_mut::<VirtualInput>() = VirtualInput::default();
    }

    fn step(world: &mut World, secs: f32) {
        world
            .resource_mut::<Time>()
            .advance_by(Duration::from_secs_f32(secs));
        world.run_system_once(run_ultimate_steps).unwrap();
        world.run_system_once(crate::tween::tick_tweens).unwrap();
    }

    fn clone_count(world: &mut World) -> usize {
        let mut query = world.query::<&UltimateClone>();
        query.iter(world).count()
    }

    #[test]
    fn sequence_runs_to_completion_once() {
        let (mut world, hero, foe) = setup();
        press_r(&mut world);
        assert!(world.resource::<UltimateState>().active);
        assert!(world.get::<Channeling>(hero).is_some());
        assert_eq!(world.get::<SpriteTint>(hero).unwrap().alpha, CHANNEL_ALPHA);
        assert_eq!(clone_count(&mut world), 6);
        assert_eq!(world.resource::<StepScheduler<UltimateStep>>().len(), 6);

        // Re-pressing mid-sequence is a no-op.
        press_r(&mut world);
        assert_eq!(clone_count(&mut world), 6);

        // disperse 0.4 + base 0.3 + 5 * 0.18 + charge 0.18 = 1.78 s
        for _ in 0..115 {
            step(&mut world, 1.0 / 60.0);
        }
        assert!(!world.resource::<UltimateState>().active);
        assert!(world.get::<Channeling>(hero).is_none());
        let tint = world.get::<SpriteTint>(hero).unwrap();
        assert_eq!((tint.base, tint.alpha), (PROTAGONIST_TINT, 1.0));
        assert_eq!(clone_count(&mut world), 0);
        assert_eq!(world.get::<Health>(foe).unwrap().current, 35.0);
        assert_eq!(world.resource::<GameEventBus>().count("ultimate_finished"), 1);

        for _ in 0..80 {
            step(&mut world, 1.0 / 60.0);
        }
        assert_eq!(world.get::<Transform>(foe).unwrap().rotation, Quat::IDENTITY);
        assert_eq!(world.get::<SpriteTint>(foe).unwrap().base, ANTAGONIST_TINT);
        assert!(world.resource::<StepScheduler<UltimateStep>>().is_empty());
        // Knocked to the right, away from the protagonist.
        assert!(world.get::<GamePosition>(foe).unwrap().x > 700.0);
    }

    #[test]
    fn finisher_respawns_depleted_antagonist_after_knockback() {
        let (mut world, _, foe) = setup();
        world.get_mut::<Health>(foe).unwrap().current = 40.0;
        press_r(&mut world);
        for _ in 0..200 {
            step(&mut world, 1.0 / 60.0);
        }
        assert_eq!(world.get::<Health>(foe).unwrap().current, 100.0);
        let pos = *world.get::<GamePosition>(foe).unwrap();
        assert!((100.0..=860.0).contains(&pos.x) && (100.0..=440.0).contains(&pos.y));
    }

    #[test]
    fn requires_an_antagonist() {
        let (mut world, hero, foe) = setup();
        world.despawn(foe);
        press_r(&mut world);
        assert!(!world.resource::<UltimateState>().active);
        assert!(world.get::<Channeling>(hero).is_none());
    }

    #[test]
    fn steps_from_a_replaced_session_are_dropped() {
        let (mut world, hero, _) = setup();
        press_r(&mut world);
        // Replace the session without clearing the scheduler.
        {
            let mut session = world.resource_mut::<PreviewSession>();
            let id = session.begin(SessionRequest {
                protagonist: asset("hero"),
                antagonist: None,
                scene: asset("scene"),
            });
            session.mark_running(id);
        }
        for _ in 0..200 {
            step(&mut world, 1.0 / 60.0);
        }
        assert!(world.resource::<StepScheduler<UltimateStep>>().is_empty());
        // The stale finisher never ran.
        assert!(world.get::<Channeling>(hero).is_some());
        assert_eq!(world.resource::<GameEventBus>().count("ultimate_finished"), 0);
    }

    #[test]
    fn stopping_mid_sequence_cancels_everything() {
        let (mut world, hero, foe) = setup();
        let id = world.resource::<PreviewSession>().current().unwrap();
        world.entity_mut(hero).insert(SessionEntity(id));
        world.entity_mut(foe).insert(SessionEntity(id));
        press_r(&mut world);
        // Past the disperse, with charges still pending.
        for _ in 0..30 {
            step(&mut world, 1.0 / 60.0);
        }
        assert!(world.resource::<UltimateState>().active);
        assert!(!world.resource::<StepScheduler<UltimateStep>>().is_empty());
        world.resource_mut::<CameraShakeState>().start(FINAL_SHAKE.0, FINAL_SHAKE.1);

        assert_eq!(crate::session::stop_session(&mut world), Some(id));
        assert!(world.resource::<StepScheduler<UltimateStep>>().is_empty());
        assert!(!world.resource::<UltimateState>().active);
        assert!(!world.resource::<CameraShakeState>().is_active());
        assert_eq!(clone_count(&mut world), 0);
        let mut leftovers = world.query::<&SessionEntity>();
        assert_eq!(leftovers.iter(&world).count(), 0);

        for _ in 0..200 {
            step(&mut world, 1.0 / 60.0);
        }
        assert!(world.resource::<StepScheduler<UltimateStep>>().is_empty());
        assert_eq!(world.resource::<GameEventBus>().count("ultimate_finished"), 0);
    }
}
