use bevy::prelude::*;

use crate::components::{GamePosition, SpriteTint};

pub struct TweenPlugin;

impl Plugin for TweenPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, tick_tweens.in_set(crate::session::PreviewSet::Effects));
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TweenProperty {
    X,
    Y,
    /// Uniform scale (both axes).
    Scale,
    Alpha,
    /// Degrees, counter-clockwise on screen.
    Rotation,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EasingFunction {
    Linear,
    /// Quadratic ease-out.
    Power2Out,
    CubicIn,
    BackOut,
    ExpoOut,
}

impl EasingFunction {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::Power2Out => 1.0 - (1.0 - t) * (1.0 - t),
            Self::CubicIn => t * t * t,
            Self::BackOut => {
                let s = 1.70158;
                let u = t - 1.0;
                u * u * ((s + 1.0) * u + s) + 1.0
            }
            Self::ExpoOut => {
                if t >= 1.0 {
                    1.0
                } else {
                    1.0 - (2.0f32).powf(-10.0 * t)
                }
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct TweenInstance {
    pub property: TweenProperty,
    /// Resolved from the current value on the first tick when `None`.
    pub from: Option<f32>,
    pub to: f32,
    pub duration: f32,
    pub elapsed: f32,
    pub easing: EasingFunction,
    /// Play forward then back to `from`, taking `2 * duration`.
    pub yoyo: bool,
}

impl TweenInstance {
    pub fn to(property: TweenProperty, to: f32, duration: f32, easing: EasingFunction) -> Self {
        Self {
            property,
            from: None,
            to,
            duration: duration.max(0.001),
            elapsed: 0.0,
            easing,
            yoyo: false,
        }
    }

    pub fn from(mut self, from: f32) -> Self {
        self.from = Some(from);
        self
    }

    pub fn yoyo(mut self) -> Self {
        self.yoyo = true;
        self
    }

    fn total_duration(&self) -> f32 {
        if self.yoyo {
            self.duration * 2.0
        } else {
            self.duration
        }
    }

    fn finished(&self) -> bool {
        self.elapsed >= self.total_duration()
    }

    /// Value at the current elapsed time.
    pub fn sample(&self, from: f32) -> f32 {
        let mut t = (self.elapsed / self.duration).clamp(0.0, if self.yoyo { 2.0 } else { 1.0 });
        if t > 1.0 {
            t = 2.0 - t;
        }
        let eased = self.easing.apply(t);
        from + (self.to - from) * eased
    }
}

/// Active tweens on one entity; at most one per property.
#[derive(Component, Clone, Default)]
pub struct TweenSet(pub Vec<TweenInstance>);

impl TweenSet {
    pub fn single(tween: TweenInstance) -> Self {
        Self(vec![tween])
    }

    pub fn with(mut self, tween: TweenInstance) -> Self {
        self.push(tween);
        self
    }

    /// Adds a tween, replacing any running tween on the same property.
    pub fn push(&mut self, tween: TweenInstance) {
        self.0.retain(|t| t.property != tween.property);
        self.0.push(tween);
    }

    /// Whether a position tween currently owns the entity's placement.
    pub fn drives_position(&self) -> bool {
        self.0
            .iter()
            .any(|t| matches!(t.property, TweenProperty::X | TweenProperty::Y))
    }
}

/// Despawn the entity once its last tween completes.
#[derive(Component)]
pub struct DespawnWhenTweensDone;

fn current_value(
    property: TweenProperty,
    pos: Option<&GamePosition>,
    transform: Option<&Transform>,
    tint: Option<&SpriteTint>,
) -> f32 {
    match property {
        TweenProperty::X => pos.map_or(0.0, |p| p.x),
        TweenProperty::Y => pos.map_or(0.0, |p| p.y),
        TweenProperty::Scale => transform.map_or(1.0, |t| t.scale.x),
        TweenProperty::Alpha => tint.map_or(1.0, |t| t.alpha),
        TweenProperty::Rotation => transform.map_or(0.0, |t| {
            let (_, angle) = t.rotation.to_axis_angle();
            angle.to_degrees()
        }),
    }
}

/// Adds `tween` to an entity, merging into an existing [`TweenSet`].
pub fn add_tween(world: &mut World, entity: Entity, tween: TweenInstance) {
    let Ok(mut entity_mut) = world.get_entity_mut(entity) else {
        return;
    };
    if let Some(mut set) = entity_mut.get_mut::<TweenSet>() {
        set.push(tween);
    } else {
        entity_mut.insert(TweenSet::single(tween));
    }
}

pub(crate) fn tick_tweens(
    mut commands: Commands,
    time: Res<Time>,
    mut query: Query<(
        Entity,
        &mut TweenSet,
        Option<&mut GamePosition>,
        Option<&mut Transform>,
        Option<&mut SpriteTint>,
        Has<DespawnWhenTweensDone>,
    )>,
) {
    let dt = time.delta_secs();
    for (entity, mut tween_set, mut pos, mut transform, mut tint, despawn_when_done) in
        query.iter_mut()
    {
        for tween in tween_set.0.iter_mut() {
            let from = *tween.from.get_or_insert_with(|| {
                current_value(
                    tween.property,
                    pos.as_deref(),
                    transform.as_deref(),
                    tint.as_deref(),
                )
            });
            tween.elapsed += dt;
            let value = tween.sample(from);

            match tween.property {
                TweenProperty::X => {
                    if let Some(ref mut pos) = pos {
                        pos.x = value;
                    }
                }
                TweenProperty::Y => {
                    if let Some(ref mut pos) = pos {
                        pos.y = value;
                    }
                }
                TweenProperty::Scale => {
                    if let Some(ref mut transform) = transform {
                        let sign_x = transform.scale.x.signum();
                        transform.scale.x = value.abs() * sign_x;
                        transform.scale.y = value.abs();
                    }
                }
                TweenProperty::Alpha => {
                    if let Some(ref mut tint) = tint {
                        tint.alpha = value.clamp(0.0, 1.0);
                    }
                }
                TweenProperty::Rotation => {
                    if let Some(ref mut transform) = transform {
                        transform.rotation = Quat::from_rotation_z(value.to_radians());
                    }
                }
            }
        }
        tween_set.0.retain(|t| !t.finished());
        if tween_set.0.is_empty() {
            if despawn_when_done {
                commands.entity(entity).despawn_recursive();
            } else {
                commands.entity(entity).remove::<TweenSet>();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::RunSystemOnce;
    use std::time::Duration;

    fn step(world: &mut World, secs: f32) {
        world
            .resource_mut::<Time>()
            .advance_by(Duration::from_secs_f32(secs));
        world.run_system_once(tick_tweens).expect("tick tweens");
    }

    #[test]
    fn easing_endpoints_are_exact() {
        for easing in [
            EasingFunction::Linear,
            EasingFunction::Power2Out,
            EasingFunction::CubicIn,
            EasingFunction::BackOut,
            EasingFunction::ExpoOut,
        ] {
            assert!(easing.apply(0.0).abs() < 1e-4, "{easing:?}");
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-4, "{easing:?}");
        }
        // Back-out overshoots before settling.
        assert!(EasingFunction::BackOut.apply(0.7) > 1.0);
    }

    #[test]
    fn yoyo_returns_to_start() {
        let mut world = World::new();
        world.insert_resource(Time::<()>::default());
        let e = world
            .spawn((
                GamePosition::new(100.0, 50.0),
                TweenSet::single(
                    TweenInstance::to(TweenProperty::X, 120.0, 0.08, EasingFunction::Linear).yoyo(),
                ),
            ))
            .id();
        step(&mut world, 0.08);
        assert!((world.get::<GamePosition>(e).unwrap().x - 120.0).abs() < 0.01);
        step(&mut world, 0.08);
        assert!((world.get::<GamePosition>(e).unwrap().x - 100.0).abs() < 0.01);
        world.flush();
        assert!(world.get::<TweenSet>(e).is_none());
    }

    #[test]
    fn finished_effect_is_despawned() {
        let mut world = World::new();
        world.insert_resource(Time::<()>::default());
        let e = world
            .spawn((
                SpriteTint::default(),
                Transform::default(),
                DespawnWhenTweensDone,
                TweenSet::single(TweenInstance::to(
                    TweenProperty::Alpha,
                    0.0,
                    0.3,
                    EasingFunction::Power2Out,
                )),
            ))
            .id();
        step(&mut world, 0.15);
        let alpha = world.get::<SpriteTint>(e).unwrap().alpha;
        assert!(alpha > 0.0 && alpha < 1.0);
        step(&mut world, 0.2);
        world.flush();
        assert!(world.get_entity(e).is_err());
    }

    #[test]
    fn pushing_same_property_replaces_running_tween() {
        let mut set = TweenSet::single(TweenInstance::to(
            TweenProperty::X,
            10.0,
            1.0,
            EasingFunction::Linear,
        ));
        set.push(TweenInstance::to(TweenProperty::Y, 5.0, 1.0, EasingFunction::Linear));
        set.push(TweenInstance::to(TweenProperty::X, 99.0, 1.0, EasingFunction::Linear));
        assert_eq!(set.0.len(), 2);
        assert!(set.0.iter().any(|t| t.property == TweenProperty::X && t.to == 99.0));
        assert!(set.drives_position());
    }
}
