use bevy::prelude::*;
use bevy::render::camera::{ScalingMode, Viewport};
use bevy::render::view::RenderLayers;
use bevy::window::PrimaryWindow;

use crate::components::{HeadlessMode, VIEWPORT_HEIGHT, VIEWPORT_WIDTH};
use crate::session::PreviewSet;

/// Render layer carrying world sprites; seen by both cameras.
pub const WORLD_LAYER: usize = 0;
/// Render layer for name labels, health bars and help text; main camera only.
pub const OVERLAY_LAYER: usize = 1;

pub const MINIMAP_POSITION: UVec2 = UVec2::new(780, 20);
pub const MINIMAP_SIZE: UVec2 = UVec2::new(160, 100);
pub const MINIMAP_ZOOM: f32 = 0.18;

/// Shake of the main camera. Intensity is a fraction of the viewport size.
#[derive(Resource, Clone, Default, Debug)]
pub struct CameraShakeState {
    pub intensity: f32,
    pub remaining: f32,
    pub duration: f32,
}

impl CameraShakeState {
    pub fn is_active(&self) -> bool {
        self.remaining > 0.0 && self.intensity > 0.0
    }

    /// Starts a shake; a running stronger shake is left alone.
    pub fn start(&mut self, duration: f32, intensity: f32) {
        if self.is_active() && self.intensity > intensity {
            return;
        }
        self.intensity = intensity.max(0.0);
        self.duration = duration.max(0.0);
        self.remaining = self.duration;
    }
}

#[derive(Component)]
pub struct MainCamera;

/// Corner camera showing the whole scene without overlays.
#[derive(Component)]
pub struct MinimapCamera;

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(CameraShakeState::default())
            .add_systems(Startup, spawn_camera)
            .add_systems(
                Update,
                (camera_shake, fit_minimap_viewport).in_set(PreviewSet::Render),
            );
    }
}

fn spawn_camera(mut commands: Commands, headless: Res<HeadlessMode>) {
    if headless.0 {
        return;
    }
    commands.spawn((
        MainCamera,
        Camera2d,
        OrthographicProjection {
            scaling_mode: ScalingMode::Fixed {
                width: VIEWPORT_WIDTH,
                height: VIEWPORT_HEIGHT,
            },
            ..OrthographicProjection::default_2d()
        },
        RenderLayers::from_layers(&[WORLD_LAYER, OVERLAY_LAYER]),
        Transform::from_xyz(0.0, 0.0, 100.0),
    ));
}

/// Components of the minimap camera; spawned with the session's world.
pub fn minimap_bundle() -> impl Bundle {
    (
        MinimapCamera,
        Camera2d,
        Camera {
            order: 1,
            viewport: Some(Viewport {
                physical_position: MINIMAP_POSITION,
                physical_size: MINIMAP_SIZE,
                ..default()
            }),
            clear_color: ClearColorConfig::Custom(Color::BLACK),
            ..default()
        },
        OrthographicProjection {
            scale: 1.0 / MINIMAP_ZOOM,
            ..OrthographicProjection::default_2d()
        },
        RenderLayers::layer(WORLD_LAYER),
        Transform::from_xyz(0.0, 0.0, 100.0),
    )
}

/// Keeps the minimap in the same corner when the window is resized or scaled.
fn fit_minimap_viewport(
    windows: Query<&Window, With<PrimaryWindow>>,
    mut cameras: Query<&mut Camera, With<MinimapCamera>>,
) {
    let Ok(window) = windows.get_single() else {
        return;
    };
    let ratio = window.physical_width() as f32 / VIEWPORT_WIDTH;
    if ratio <= 0.0 {
        return;
    }
    let scaled = |v: UVec2| UVec2::new((v.x as f32 * ratio) as u32, (v.y as f32 * ratio) as u32);
    for mut camera in cameras.iter_mut() {
        let position = scaled(MINIMAP_POSITION);
        let size = scaled(MINIMAP_SIZE).max(UVec2::ONE);
        let unchanged = camera
            .viewport
            .as_ref()
            .is_some_and(|v| v.physical_position == position && v.physical_size == size);
        if !unchanged {
            camera.viewport = Some(Viewport {
                physical_position: position,
                physical_size: size,
                ..default()
            });
        }
    }
}

pub(crate) fn camera_shake(
    time: Res<Time>,
    mut shake: ResMut<CameraShakeState>,
    mut camera_query: Query<&mut Transform, With<MainCamera>>,
) {
    let mut offset = Vec2::ZERO;
    if shake.is_active() {
        shake.remaining = (shake.remaining - time.delta_secs()).max(0.0);
        let t = time.elapsed_secs();
        let life = if shake.duration > 0.0 {
            (shake.remaining / shake.duration).clamp(0.0, 1.0)
        } else {
            0.0
        };
        offset.x = (t * 31.0).sin() * shake.intensity * VIEWPORT_WIDTH * life;
        offset.y = (t * 43.0).cos() * shake.intensity * VIEWPORT_HEIGHT * life;
    }

    for mut cam_transform in camera_query.iter_mut() {
        cam_transform.translation.x = offset.x;
        cam_transform.translation.y = offset.y;
    }
}
