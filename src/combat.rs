use bevy::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng as _, SeedableRng};

use crate::components::{GamePosition, Health, SpriteTint};

/// Respawn rectangle, viewport space.
pub const RESPAWN_MIN: Vec2 = Vec2::new(100.0, 100.0);
pub const RESPAWN_MAX: Vec2 = Vec2::new(860.0, 440.0);

pub const PROTAGONIST_TINT: Color = Color::WHITE;
pub const ANTAGONIST_TINT: Color = Color::srgb(1.0, 0.8, 0.8);
pub const DAMAGE_FLASH: Color = Color::srgb(1.0, 0.0, 0.0);
pub const HIT_FLASH: Color = Color::WHITE;
pub const FINISHER_TINT: Color = Color::srgb(1.0, 0.0, 0.0);

pub const DAMAGE_FLASH_SECS: f32 = 0.05;
pub const HIT_FLASH_SECS: f32 = 0.1;

/// Seedable randomness for respawn placement.
#[derive(Resource)]
pub struct PreviewRng(pub SmallRng);

impl Default for PreviewRng {
    fn default() -> Self {
        Self(SmallRng::from_entropy())
    }
}

impl PreviewRng {
    pub fn seeded(seed: u64) -> Self {
        Self(SmallRng::seed_from_u64(seed))
    }
}

pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PreviewRng>().add_systems(
            Update,
            tick_tint_flashes.in_set(crate::session::PreviewSet::Effects),
        );
    }
}

/// Subtracts `amount` and clamps to `[0, max]`. Returns true when depleted.
pub fn apply_damage(health: &mut Health, amount: f32) -> bool {
    health.current = (health.current - amount).clamp(0.0, health.max);
    health.current <= 0.0
}

/// Restores full health at a random point inside the respawn rectangle.
pub fn respawn(health: &mut Health, pos: &mut GamePosition, rng: &mut PreviewRng) {
    health.current = health.max;
    pos.x = rng.0.gen_range(RESPAWN_MIN.x..=RESPAWN_MAX.x);
    pos.y = rng.0.gen_range(RESPAWN_MIN.y..=RESPAWN_MAX.y);
}

/// Damage followed by respawn when depleted. Returns true if a respawn happened.
pub fn damage_or_respawn(
    health: &mut Health,
    pos: &mut GamePosition,
    amount: f32,
    rng: &mut PreviewRng,
) -> bool {
    if apply_damage(health, amount) {
        respawn(health, pos, rng);
        return true;
    }
    false
}

fn tick_tint_flashes(time: Res<Time>, mut query: Query<&mut SpriteTint>) {
    let dt = time.delta_secs();
    for mut tint in query.iter_mut() {
        let Some(flash) = tint.flash.as_mut() else {
            continue;
        };
        flash.remaining -= dt;
        if flash.remaining <= 0.0 {
            tint.flash = None;
        }
    }
}
