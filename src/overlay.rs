use bevy::prelude::*;
use bevy::render::view::RenderLayers;
use bevy::sprite::Anchor;

use crate::animation::AnimationPlayer;
use crate::camera::OVERLAY_LAYER;
use crate::components::{ActorVisual, Depth, GamePosition, Health, SessionEntity, SessionId};
use crate::session::PreviewSet;
use crate::sprites::ActorSheets;

pub const LABEL_OFFSET: f32 = 25.0;
pub const BAR_OFFSET: f32 = 10.0;
pub const BAR_SIZE: Vec2 = Vec2::new(50.0, 5.0);
pub const OVERLAY_DEPTH: f32 = 5.0;

pub const PROTAGONIST_BAR: Color = Color::srgb(0.0, 1.0, 0.0);
pub const ANTAGONIST_BAR: Color = Color::srgb(1.0, 0.0, 0.0);

/// Top edge of an actor's visual, in viewport space.
///
/// The pivot sits near the feet, so the top is `y - display_height * origin_y`,
/// not a fixed offset from the anchor.
pub fn overlay_top(y: f32, display_height: f32, origin_y: f32) -> f32 {
    y - display_height * origin_y
}

/// Entities of an actor's name label and health bar.
#[derive(Component, Clone, Copy, Debug)]
pub struct ActorOverlay {
    pub label: Entity,
    pub bar_background: Entity,
    pub bar_fill: Entity,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OverlayPart {
    Label,
    BarBackground,
    BarFill,
}

/// Back-reference from an overlay part to its actor.
#[derive(Component, Clone, Copy, Debug)]
pub struct OverlayOf {
    pub actor: Entity,
    pub part: OverlayPart,
}

/// Current width of a health bar fill.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct BarFill {
    pub width: f32,
}

#[derive(Component)]
pub struct HelpText;

pub struct OverlayPlugin;

impl Plugin for OverlayPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (sweep_orphan_overlays, sync_overlays)
                .chain()
                .in_set(PreviewSet::Effects)
                .after(crate::tween::tick_tweens),
        );
    }
}

/// Spawns label and bar entities for `actor` and links them to it.
pub fn attach_overlay(
    world: &mut World,
    actor: Entity,
    session: SessionId,
    name: &str,
    bar_color: Color,
    with_visuals: bool,
) -> ActorOverlay {
    let base = (
        SessionEntity(session),
        GamePosition::default(),
        Depth(OVERLAY_DEPTH),
        Transform::default(),
        RenderLayers::layer(OVERLAY_LAYER),
    );
    let mut label = world.spawn((
        base.clone(),
        OverlayOf {
            actor,
            part: OverlayPart::Label,
        },
    ));
    if with_visuals {
        label.insert((
            Text2d::new(name.to_string()),
            TextFont {
                font_size: 14.0,
                ..default()
            },
            TextColor(Color::WHITE),
        ));
    }
    let label = label.id();

    let mut bar_background = world.spawn((
        base.clone(),
        OverlayOf {
            actor,
            part: OverlayPart::BarBackground,
        },
    ));
    if with_visuals {
        bar_background.insert(Sprite::from_color(Color::BLACK, BAR_SIZE));
    }
    let bar_background = bar_background.id();

    let mut bar_fill = world.spawn((
        base,
        OverlayOf {
            actor,
            part: OverlayPart::BarFill,
        },
        BarFill { width: BAR_SIZE.x },
    ));
    if with_visuals {
        bar_fill.insert(Sprite {
            color: bar_color,
            custom_size: Some(BAR_SIZE),
            anchor: Anchor::CenterLeft,
            ..default()
        });
    }
    let bar_fill = bar_fill.id();

    let overlay = ActorOverlay {
        label,
        bar_background,
        bar_fill,
    };
    world.entity_mut(actor).insert(overlay);
    overlay
}

/// Control hint in the top-left corner of the viewport.
pub fn spawn_help_text(world: &mut World, session: SessionId, with_visuals: bool) -> Entity {
    let mut help = world.spawn((
        HelpText,
        SessionEntity(session),
        GamePosition::new(15.0, 15.0),
        Depth(10.0),
        Transform::default(),
        RenderLayers::layer(OVERLAY_LAYER),
    ));
    if with_visuals {
        help.insert((
            Text2d::new("WASD / Arrows move | Space attack | R ultimate"),
            TextFont {
                font_size: 18.0,
                ..default()
            },
            TextColor(Color::WHITE),
            Anchor::TopLeft,
        ));
    }
    help.id()
}

/// Height of the frame currently on screen. Clips may differ in frame size,
/// so the active clip wins over the size recorded at spawn.
fn shown_height(
    visual: &ActorVisual,
    transform: &Transform,
    anim: Option<(&AnimationPlayer, &ActorSheets)>,
) -> f32 {
    anim.and_then(|(player, sheets)| sheets.frame_size(player.state.clip()))
        .map_or_else(
            || visual.display_height(transform),
            |frame| frame.y * transform.scale.y.abs(),
        )
}

pub(crate) fn sync_overlays(
    actors: Query<(
        &ActorOverlay,
        &GamePosition,
        &ActorVisual,
        &Transform,
        &Health,
        Option<(&AnimationPlayer, &ActorSheets)>,
    )>,
    mut parts: Query<
        (&mut GamePosition, Option<&mut BarFill>, Option<&mut Sprite>),
        (With<OverlayOf>, Without<ActorOverlay>),
    >,
) {
    for (overlay, pos, visual, transform, health, anim) in actors.iter() {
        let top = overlay_top(pos.y, shown_height(visual, transform, anim), visual.origin.y);
        if let Ok((mut label_pos, _, _)) = parts.get_mut(overlay.label) {
            *label_pos = GamePosition::new(pos.x, top - LABEL_OFFSET);
        }
        if let Ok((mut bg_pos, _, _)) = parts.get_mut(overlay.bar_background) {
            *bg_pos = GamePosition::new(pos.x, top - BAR_OFFSET);
        }
        if let Ok((mut fill_pos, fill, sprite)) = parts.get_mut(overlay.bar_fill) {
            *fill_pos = GamePosition::new(pos.x - BAR_SIZE.x / 2.0, top - BAR_OFFSET);
            let width = BAR_SIZE.x * health.fraction();
            if let Some(mut fill) = fill {
                fill.width = width;
            }
            if let Some(mut sprite) = sprite {
                sprite.custom_size = Some(Vec2::new(width, BAR_SIZE.y));
            }
        }
    }
}

/// Overlay parts never outlive their actor.
pub(crate) fn sweep_orphan_overlays(
    mut commands: Commands,
    parts: Query<(Entity, &OverlayOf)>,
    actors: Query<(), With<ActorOverlay>>,
) {
    for (entity, part) in parts.iter() {
        if actors.get(part.actor).is_err() {
            commands.entity(entity).despawn();
        }
    }
}
