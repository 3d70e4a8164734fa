use bevy::prelude::*;

use crate::components::{Depth, GamePosition, SessionEntity, SpriteTint};
use crate::tween::{DespawnWhenTweensDone, EasingFunction, TweenInstance, TweenProperty, TweenSet};

pub struct TrailPlugin;

impl Plugin for TrailPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            spawn_trail_ghosts
                .in_set(crate::session::PreviewSet::Effects)
                .before(crate::tween::tick_tweens),
        );
    }
}

/// How a ghost's scale evolves over its lifetime.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GhostScale {
    /// Multiply the source scale by this factor.
    Relative(f32),
    /// Shrink to this absolute scale.
    Absolute(f32),
}

/// Attached to an entity to produce afterimage/trail effects.
#[derive(Component, Clone, Debug)]
pub struct TrailEffect {
    /// Frames between ghost spawns.
    pub interval: u32,
    /// Ghost lifetime in seconds.
    pub duration: f32,
    /// Starting alpha of the ghost; it always fades to zero.
    pub alpha_start: f32,
    pub scale_end: GhostScale,
    pub easing: EasingFunction,
    /// Ghost color; `None` copies the source tint.
    pub tint: Option<Color>,
    pub depth: f32,
    /// Ghosts are only produced while set.
    pub emitting: bool,
    /// Internal frame counter.
    pub frame_counter: u32,
}

impl TrailEffect {
    /// Movement afterimage: every other frame, 300 ms, alpha 0.8 -> 0, scale x0.9.
    pub fn movement(interval: u32, duration: f32) -> Self {
        Self {
            interval: interval.max(1),
            duration,
            alpha_start: 0.8,
            scale_end: GhostScale::Relative(0.9),
            easing: EasingFunction::Power2Out,
            tint: Some(Color::srgb(0.0, 0.8, 1.0)),
            depth: 1.0,
            emitting: false,
            frame_counter: 0,
        }
    }

    /// Streak behind a charging ultimate clone: every frame, 150 ms, alpha 0.4 -> 0, scale -> 0.3.
    pub fn streak() -> Self {
        Self {
            interval: 1,
            duration: 0.15,
            alpha_start: 0.4,
            scale_end: GhostScale::Absolute(0.3),
            easing: EasingFunction::Linear,
            tint: None,
            depth: 2.0,
            emitting: true,
            frame_counter: 0,
        }
    }

    /// Advances the frame counter; true when a ghost is due this frame.
    pub fn tick(&mut self) -> bool {
        if !self.emitting {
            self.frame_counter = 0;
            return false;
        }
        self.frame_counter += 1;
        if self.frame_counter < self.interval {
            return false;
        }
        self.frame_counter = 0;
        true
    }
}

/// Cosmetic copy of a sprite; never takes part in game logic.
#[derive(Component)]
pub struct TrailGhost;

fn spawn_trail_ghosts(
    mut commands: Commands,
    mut query: Query<(
        &GamePosition,
        &Transform,
        &mut TrailEffect,
        &SpriteTint,
        Option<&Sprite>,
        Option<&SessionEntity>,
    )>,
) {
    for (pos, transform, mut trail, source_tint, sprite, session) in query.iter_mut() {
        if !trail.tick() {
            continue;
        }
        // Nothing to copy without a rendered sprite (headless).
        let Some(sprite) = sprite else {
            continue;
        };

        let scale = transform.scale.y.abs();
        let scale_end = match trail.scale_end {
            GhostScale::Relative(f) => scale * f,
            GhostScale::Absolute(s) => s,
        };
        let mut tint = SpriteTint::new(trail.tint.unwrap_or_else(|| source_tint.effective()));
        tint.alpha = trail.alpha_start;

        let mut ghost = commands.spawn((
            TrailGhost,
            *pos,
            Depth(trail.depth),
            Sprite {
                image: sprite.image.clone(),
                texture_atlas: sprite.texture_atlas.clone(),
                flip_x: sprite.flip_x,
                anchor: sprite.anchor,
                custom_size: sprite.custom_size,
                color: tint.effective(),
                ..default()
            },
            Transform {
                translation: transform.translation,
                rotation: transform.rotation,
                scale: transform.scale,
            },
            tint,
            TweenSet::single(
                TweenInstance::to(TweenProperty::Alpha, 0.0, trail.duration, trail.easing)
                    .from(trail.alpha_start),
            )
            .with(
                TweenInstance::to(TweenProperty::Scale, scale_end, trail.duration, trail.easing)
                    .from(scale),
            ),
            DespawnWhenTweensDone,
        ));
        if let Some(session) = session {
            ghost.insert(*session);
        }
    }
}
