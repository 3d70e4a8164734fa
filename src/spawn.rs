use std::collections::HashMap;

use bevy::prelude::*;
use bevy::render::view::RenderLayers;
use bevy::sprite::Anchor;

use crate::animation::{AnimationPlayer, ClipRates};
use crate::camera::{minimap_bundle, WORLD_LAYER};
use crate::combat::{ANTAGONIST_TINT, PROTAGONIST_TINT};
use crate::components::*;
use crate::config::CombatTuning;
use crate::loading::{ActorRole, AssetSlot, DecodedImage, LoadedImages};
use crate::overlay::{attach_overlay, spawn_help_text, ANTAGONIST_BAR, PROTAGONIST_BAR};
use crate::readiness::ReadyAsset;
use crate::session::SessionRequest;
use crate::sprites::*;
use crate::trail::TrailEffect;

pub const PROTAGONIST_SPAWN: GamePosition = GamePosition { x: 200.0, y: 270.0 };
pub const ANTAGONIST_SPAWN: GamePosition = GamePosition { x: 700.0, y: 270.0 };
pub const BACKDROP_DEPTH: f32 = -10.0;
pub const PROTAGONIST_DEPTH: f32 = 2.0;
pub const ANTAGONIST_DEPTH: f32 = 1.5;

/// Sprite pivot matching [`ACTOR_ORIGIN`]: 80% down from the top edge.
const ACTOR_ANCHOR: Vec2 = Vec2::new(0.0, 0.5 - ACTOR_ORIGIN.y);

#[derive(Component)]
pub struct Backdrop;

/// Spawns the scene of a loaded session: backdrop, actors with their
/// overlays, help text and the minimap camera.
///
/// Headless worlds (or worlds without image storage) get the full entity
/// set without sprites.
pub fn build_session(
    world: &mut World,
    session: SessionId,
    request: &SessionRequest,
    images: LoadedImages,
) {
    let headless = world.get_resource::<HeadlessMode>().is_some_and(|h| h.0);
    let visual = !headless
        && world.contains_resource::<Assets<Image>>()
        && world.contains_resource::<Assets<TextureAtlasLayout>>();

    let mut decoded: HashMap<AssetSlot, DecodedImage> = HashMap::new();
    for (slot, result) in images {
        match result {
            Ok(image) => {
                decoded.insert(slot, image);
            }
            Err(e) => warn!("[Preview load] #{} {:?} unavailable: {}", session.0, slot, e),
        }
    }
    let tuning = world
        .get_resource::<CombatTuning>()
        .cloned()
        .unwrap_or_default();

    spawn_backdrop(world, session, decoded.remove(&AssetSlot::Backdrop), visual);

    let hero = spawn_actor(
        world,
        session,
        ActorRole::Protagonist,
        &request.protagonist,
        &mut decoded,
        visual,
    );
    world.entity_mut(hero).insert((
        Protagonist,
        TrailEffect::movement(tuning.player_trail_interval, tuning.player_trail_secs),
    ));
    attach_overlay(
        world,
        hero,
        session,
        &request.protagonist.name,
        PROTAGONIST_BAR,
        visual,
    );

    if let Some(antagonist) = &request.antagonist {
        let foe = spawn_actor(
            world,
            session,
            ActorRole::Antagonist,
            antagonist,
            &mut decoded,
            visual,
        );
        world.entity_mut(foe).insert(Antagonist);
        attach_overlay(
            world,
            foe,
            session,
            &format!("{} (Monster)", antagonist.name),
            ANTAGONIST_BAR,
            visual,
        );
    }

    spawn_help_text(world, session, visual);
    if visual {
        world.spawn((minimap_bundle(), SessionEntity(session)));
    }
}

fn add_image(world: &mut World, image: Image) -> Handle<Image> {
    world.resource_mut::<Assets<Image>>().add(image)
}

fn spawn_backdrop(
    world: &mut World,
    session: SessionId,
    image: Option<DecodedImage>,
    visual: bool,
) -> Entity {
    let size = image
        .as_ref()
        .map_or(Vec2::new(VIEWPORT_WIDTH, VIEWPORT_HEIGHT), |i| i.size().as_vec2());
    let scale = match &image {
        Some(_) => cover_scale(size.x, size.y),
        // The generated backdrop is an eighth of the viewport.
        None => 8.0,
    };
    let entity = world
        .spawn((
            Backdrop,
            SessionEntity(session),
            GamePosition::new(VIEWPORT_WIDTH / 2.0, VIEWPORT_HEIGHT / 2.0),
            Depth(BACKDROP_DEPTH),
            Transform::from_scale(Vec3::new(scale, scale, 1.0)),
            RenderLayers::layer(WORLD_LAYER),
        ))
        .id();
    if visual {
        let image = match image {
            Some(i) => make_image(i.width, i.height, i.rgba),
            None => placeholder_backdrop(),
        };
        let handle = add_image(world, image);
        world.entity_mut(entity).insert(Sprite::from_image(handle));
    }
    entity
}

/// Turns an actor's decoded images into clips. Per-action sheets win over
/// fallback rows; an actor with neither shows its static image or a
/// generated silhouette.
fn build_sheets(
    world: &mut World,
    role: ActorRole,
    asset: &ReadyAsset,
    decoded: &mut HashMap<AssetSlot, DecodedImage>,
) -> ActorSheets {
    let mut sheets = ActorSheets::default();
    let types = asset
        .animation
        .as_ref()
        .map(|a| a.types.clone())
        .unwrap_or_default();

    for &action in role.actions() {
        let (Some(image), Some(sheet)) = (
            decoded.remove(&AssetSlot::Action(role, action)),
            action.sheet(&types),
        ) else {
            continue;
        };
        let size = image.size();
        let handle = add_image(world, make_image(image.width, image.height, image.rgba));
        let clip = world.resource_scope(|_, mut layouts: Mut<Assets<TextureAtlasLayout>>| {
            action_clip(handle, size, sheet, &mut layouts)
        });
        sheets.clips.insert(action, clip);
    }

    if let Some(image) = decoded.remove(&AssetSlot::Fallback(role)) {
        let grid = grid_for(image.size(), FALLBACK_FRAME_SIZE);
        let cells = (grid.x * grid.y) as usize;
        let handle = add_image(world, make_image(image.width, image.height, image.rgba));
        let layout = world
            .resource_mut::<Assets<TextureAtlasLayout>>()
            .add(TextureAtlasLayout::from_grid(
                UVec2::splat(FALLBACK_FRAME_SIZE),
                grid.x,
                grid.y,
                None,
                None,
            ));
        for &action in role.actions() {
            if sheets.has_clip(action) {
                continue;
            }
            let clip = fallback_clip(handle.clone(), layout.clone(), action);
            if clip.frames.iter().all(|&f| f < cells) {
                sheets.clips.insert(action, clip);
            }
        }
    }

    if sheets.clips.is_empty() {
        let image = match decoded.remove(&AssetSlot::Static(role)) {
            Some(i) => make_image(i.width, i.height, i.rgba),
            None => {
                let color = match role {
                    ActorRole::Protagonist => [90, 160, 255],
                    ActorRole::Antagonist => [230, 110, 100],
                };
                placeholder_actor(FALLBACK_FRAME_SIZE, color)
            }
        };
        let size = image.size().as_vec2();
        sheets.static_image = Some((add_image(world, image), size));
    }
    sheets
}

fn spawn_actor(
    world: &mut World,
    session: SessionId,
    role: ActorRole,
    asset: &ReadyAsset,
    decoded: &mut HashMap<AssetSlot, DecodedImage>,
    visual: bool,
) -> Entity {
    let idle = asset
        .animation
        .as_ref()
        .and_then(|a| a.types.idle.clone());
    let declared_frame = idle
        .as_ref()
        .and_then(|s| s.frame_size)
        .unwrap_or(FALLBACK_FRAME_SIZE) as f32;
    let scale = display_scale(declared_frame, idle.as_ref().and_then(|s| s.content_bbox));

    let sheets = if visual {
        build_sheets(world, role, asset, decoded)
    } else {
        ActorSheets::default()
    };
    let frame_size = sheets
        .clip(AnimAction::Idle)
        .map(|c| c.frame_size)
        .or(sheets.static_image.as_ref().map(|(_, size)| *size))
        .unwrap_or(Vec2::splat(declared_frame));

    let (controller, spawn, rates, tint, depth) = match role {
        ActorRole::Protagonist => (
            ActorController::PlayerInput,
            PROTAGONIST_SPAWN,
            ClipRates::PROTAGONIST,
            PROTAGONIST_TINT,
            PROTAGONIST_DEPTH,
        ),
        ActorRole::Antagonist => (
            ActorController::PursuitAi,
            ANTAGONIST_SPAWN,
            ClipRates::ANTAGONIST,
            ANTAGONIST_TINT,
            ANTAGONIST_DEPTH,
        ),
    };

    let sprite = visual.then(|| {
        let mut sprite = match sheets.clip(AnimAction::Idle) {
            Some(clip) => Sprite::from_atlas_image(
                clip.image.clone(),
                TextureAtlas {
                    layout: clip.layout.clone(),
                    index: clip.frames.first().copied().unwrap_or_default(),
                },
            ),
            None => sheets
                .static_image
                .as_ref()
                .map(|(image, _)| Sprite::from_image(image.clone()))
                .unwrap_or_default(),
        };
        sprite.anchor = Anchor::Custom(ACTOR_ANCHOR);
        sprite.color = tint;
        sprite
    });

    let mut actor = world.spawn((
        Actor {
            name: asset.name.clone(),
            controller,
        },
        SessionEntity(session),
        Health::default(),
        spawn,
        Velocity::default(),
        Facing::default(),
        CollideWorldBounds,
        ActorVisual {
            frame_size,
            origin: ACTOR_ORIGIN,
        },
        AnimationPlayer::new(rates),
        SpriteTint::new(tint),
        Depth(depth),
        Transform::from_scale(Vec3::new(scale, scale, 1.0)),
        RenderLayers::layer(WORLD_LAYER),
    ));
    actor.insert(sheets);
    if let Some(sprite) = sprite {
        actor.insert(sprite);
    }
    let entity = actor.id();
    info!(
        "[Preview session] #{} spawned {:?} '{}' (scale {:.2})",
        session.0, role, asset.name, scale
    );
    entity
}
