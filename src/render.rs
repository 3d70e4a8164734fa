use crate::components::*;
use crate::session::PreviewSet;
use bevy::prelude::*;

pub struct RenderPlugin;

impl Plugin for RenderPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (sync_game_position_to_transform, sync_sprite_appearance).in_set(PreviewSet::Render),
        );
    }
}

/// Viewport space (top-left origin, y down) to world space (centered, y up).
pub fn to_world(pos: GamePosition, depth: f32) -> Vec3 {
    Vec3::new(
        pos.x - VIEWPORT_WIDTH / 2.0,
        VIEWPORT_HEIGHT / 2.0 - pos.y,
        depth,
    )
}

/// Sync GamePosition → Transform for all entities that have both
fn sync_game_position_to_transform(
    mut query: Query<
        (&GamePosition, Option<&Depth>, &mut Transform),
        Or<(Changed<GamePosition>, Changed<Depth>)>,
    >,
) {
    for (pos, depth, mut transform) in query.iter_mut() {
        transform.translation = to_world(*pos, depth.map_or(0.0, |d| d.0));
    }
}

/// Sync facing and tint onto the sprite.
fn sync_sprite_appearance(
    mut query: Query<(&mut Sprite, Option<&SpriteTint>, Option<&Facing>)>,
) {
    for (mut sprite, tint, facing) in query.iter_mut() {
        if let Some(tint) = tint {
            let color = tint.effective();
            if sprite.color != color {
                sprite.color = color;
            }
        }
        if let Some(facing) = facing {
            if sprite.flip_x != facing.left {
                sprite.flip_x = facing.left;
            }
        }
    }
}
