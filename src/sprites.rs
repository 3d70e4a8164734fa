use std::collections::HashMap;

use bevy::prelude::*;
use bevy::render::render_asset::RenderAssetUsages;
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat};
use serde::Serialize;

use crate::backend::types::{ActionSheet, AnimationTypes};
use crate::components::{VIEWPORT_HEIGHT, VIEWPORT_WIDTH};

/// Frame size of the shared fallback sheet.
pub const FALLBACK_FRAME_SIZE: u32 = 64;
/// Frames per action row in the fallback sheet.
pub const FALLBACK_FRAMES_PER_ROW: usize = 4;
/// Reference frame size the display scale is normalised against.
pub const REFERENCE_FRAME_SIZE: f32 = 64.0;
pub const BASE_DISPLAY_SCALE: f32 = 1.2;
/// Desired vertical fill of the visible content.
pub const TARGET_FILL: f32 = 0.85;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimAction {
    Idle,
    Walk,
    Attack,
}

impl AnimAction {
    pub const ALL: [AnimAction; 3] = [AnimAction::Idle, AnimAction::Walk, AnimAction::Attack];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Walk => "walk",
            Self::Attack => "attack",
        }
    }

    /// Row of this action inside the fallback sheet.
    pub fn fallback_row(self) -> usize {
        match self {
            Self::Idle => 0,
            Self::Walk => 1,
            Self::Attack => 2,
        }
    }

    pub fn sheet(self, types: &AnimationTypes) -> Option<&ActionSheet> {
        match self {
            Self::Idle => types.idle.as_ref(),
            Self::Walk => types.walk.as_ref(),
            Self::Attack => types.attack.as_ref(),
        }
    }
}

/// A playable clip: texture, grid layout and the atlas indices to cycle.
#[derive(Clone, Debug)]
pub struct ClipSource {
    pub image: Handle<Image>,
    pub layout: Handle<TextureAtlasLayout>,
    pub frames: Vec<usize>,
    pub frame_size: Vec2,
}

/// Everything an actor can display. Missing clips fall back to idle, then
/// to the static image.
#[derive(Component, Clone, Default, Debug)]
pub struct ActorSheets {
    pub clips: HashMap<AnimAction, ClipSource>,
    pub static_image: Option<(Handle<Image>, Vec2)>,
}

impl ActorSheets {
    pub fn has_clip(&self, action: AnimAction) -> bool {
        self.clips.contains_key(&action)
    }

    pub fn clip(&self, action: AnimAction) -> Option<&ClipSource> {
        self.clips
            .get(&action)
            .or_else(|| self.clips.get(&AnimAction::Idle))
    }

    /// Source frame size of whatever is shown for `action`.
    pub fn frame_size(&self, action: AnimAction) -> Option<Vec2> {
        self.clip(action)
            .map(|c| c.frame_size)
            .or_else(|| self.static_image.as_ref().map(|(_, size)| *size))
    }

    pub fn frame_count(&self, action: AnimAction) -> usize {
        self.clip(action).map_or(1, |c| c.frames.len().max(1))
    }
}

/// Render scale of an actor from its idle frame size and content box.
///
/// `(64 / frame_size) * 1.2`, then multiplied by `0.85 / fill` when the
/// content's vertical fill ratio lies strictly between 0.1 and 0.8.
pub fn display_scale(frame_size: f32, content_bbox: Option<[f32; 4]>) -> f32 {
    let frame_size = if frame_size > 0.0 {
        frame_size
    } else {
        REFERENCE_FRAME_SIZE
    };
    let mut scale = (REFERENCE_FRAME_SIZE / frame_size) * BASE_DISPLAY_SCALE;
    if let Some([_, top, _, bottom]) = content_bbox {
        let fill = (bottom - top) / frame_size;
        if fill > 0.1 && fill < 0.8 {
            scale *= TARGET_FILL / fill;
        }
    }
    scale
}

/// Scale that makes a backdrop cover the whole viewport (cropping allowed).
pub fn cover_scale(width: f32, height: f32) -> f32 {
    if width <= 0.0 || height <= 0.0 {
        return 1.0;
    }
    (VIEWPORT_WIDTH / width).max(VIEWPORT_HEIGHT / height)
}

/// Atlas indices for an action inside the fallback sheet.
///
/// Indices run in fixed blocks of four (idle 0-3, walk 4-7, attack 8-11)
/// whatever the sheet width; atlas indices are row-major over the real grid.
pub fn fallback_frames(action: AnimAction) -> Vec<usize> {
    let start = action.fallback_row() * FALLBACK_FRAMES_PER_ROW;
    (start..start + FALLBACK_FRAMES_PER_ROW).collect()
}

/// Grid dimensions for a sheet of square frames.
pub fn grid_for(texture_size: UVec2, frame_size: u32) -> UVec2 {
    let frame_size = frame_size.max(1);
    UVec2::new(
        (texture_size.x / frame_size).max(1),
        (texture_size.y / frame_size).max(1),
    )
}

/// Builds a clip from a per-action sheet. Plays the declared frame count
/// (4 when undeclared), never more than the grid holds.
pub fn action_clip(
    image: Handle<Image>,
    texture_size: UVec2,
    sheet: &ActionSheet,
    layouts: &mut Assets<TextureAtlasLayout>,
) -> ClipSource {
    let frame_size = sheet.frame_size.unwrap_or(FALLBACK_FRAME_SIZE).max(1);
    let grid = grid_for(texture_size, frame_size);
    let cells = (grid.x * grid.y) as usize;
    let frames = sheet
        .frames
        .map_or(FALLBACK_FRAMES_PER_ROW, |f| f as usize)
        .clamp(1, cells.max(1));
    let layout = TextureAtlasLayout::from_grid(UVec2::splat(frame_size), grid.x, grid.y, None, None);
    ClipSource {
        image,
        layout: layouts.add(layout),
        frames: (0..frames).collect(),
        frame_size: Vec2::splat(frame_size as f32),
    }
}

/// Builds the clip for `action` out of the fallback sheet.
pub fn fallback_clip(
    image: Handle<Image>,
    layout: Handle<TextureAtlasLayout>,
    action: AnimAction,
) -> ClipSource {
    ClipSource {
        image,
        layout,
        frames: fallback_frames(action),
        frame_size: Vec2::splat(FALLBACK_FRAME_SIZE as f32),
    }
}

pub fn make_image(width: u32, height: u32, data: Vec<u8>) -> Image {
    Image::new(
        Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        data,
        TextureFormat::Rgba8UnormSrgb,
        RenderAssetUsages::default(),
    )
}

/// Generated stand-in for an actor whose art failed to load: a rounded
/// silhouette on transparent ground.
pub fn placeholder_actor(size: u32, color: [u8; 3]) -> Image {
    let mut data = vec![0u8; (size * size * 4) as usize];
    let c = size as f32 / 2.0;
    for y in 0..size {
        for x in 0..size {
            let dx = (x as f32 + 0.5 - c) / (size as f32 * 0.28);
            let dy = (y as f32 + 0.5 - c * 1.1) / (size as f32 * 0.4);
            if dx * dx + dy * dy <= 1.0 {
                let idx = ((y * size + x) * 4) as usize;
                data[idx] = color[0];
                data[idx + 1] = color[1];
                data[idx + 2] = color[2];
                data[idx + 3] = 255;
            }
        }
    }
    make_image(size, size, data)
}

/// Generated backdrop used when the scene image is unavailable.
pub fn placeholder_backdrop() -> Image {
    let (w, h) = (VIEWPORT_WIDTH as u32 / 8, VIEWPORT_HEIGHT as u32 / 8);
    let mut data = vec![0u8; (w * h * 4) as usize];
    for y in 0..h {
        for x in 0..w {
            let idx = ((y * w + x) * 4) as usize;
            let shade = if (x / 6 + y / 6) % 2 == 0 { 48 } else { 40 };
            data[idx] = shade;
            data[idx + 1] = shade;
            data[idx + 2] = shade + 12;
            data[idx + 3] = 255;
        }
    }
    make_image(w, h, data)
}
