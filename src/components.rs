use bevy::prelude::*;

/// Preview viewport width in game units.
pub const VIEWPORT_WIDTH: f32 = 960.0;
/// Preview viewport height in game units.
pub const VIEWPORT_HEIGHT: f32 = 540.0;
pub const MAX_HEALTH: f32 = 100.0;

/// Actor pivot, expressed top-left relative (x right, y down).
pub const ACTOR_ORIGIN: Vec2 = Vec2::new(0.5, 0.8);

/// Running without a window (CI, scripted checks).
#[derive(Resource, Clone, Copy, Default)]
pub struct HeadlessMode(pub bool);

/// Monotonic id of a preview session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct SessionId(pub u64);

/// Tags every entity a session spawns; stopping a session despawns all of them.
#[derive(Component, Clone, Copy)]
pub struct SessionEntity(pub SessionId);

#[derive(Component)]
pub struct Protagonist;

#[derive(Component)]
pub struct Antagonist;

/// Viewport-space position: origin top-left, y grows downward.
#[derive(Component, Clone, Copy, Default, Debug, PartialEq)]
pub struct GamePosition {
    pub x: f32,
    pub y: f32,
}

impl GamePosition {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn as_vec2(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn distance(self, other: GamePosition) -> f32 {
        self.as_vec2().distance(other.as_vec2())
    }
}

/// Velocity in game units per second.
#[derive(Component, Clone, Copy, Default, Debug)]
pub struct Velocity {
    pub x: f32,
    pub y: f32,
}

impl Velocity {
    pub fn is_moving(self) -> bool {
        self.x != 0.0 || self.y != 0.0
    }
}

/// Position is clamped to the viewport after velocity integration.
#[derive(Component)]
pub struct CollideWorldBounds;

/// Which behaviour drives an actor, chosen when it is spawned.
#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorController {
    PlayerInput,
    PursuitAi,
}

#[derive(Component, Clone)]
pub struct Actor {
    pub name: String,
    pub controller: ActorController,
}

#[derive(Component, Clone, Copy, Debug)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Default for Health {
    fn default() -> Self {
        Self {
            current: MAX_HEALTH,
            max: MAX_HEALTH,
        }
    }
}

impl Health {
    pub fn fraction(&self) -> f32 {
        (self.current / self.max.max(0.001)).clamp(0.0, 1.0)
    }
}

/// Horizontal facing; `left` mirrors the sprite.
#[derive(Component, Clone, Copy, Default, Debug)]
pub struct Facing {
    pub left: bool,
}

/// Frame geometry needed to place overlays relative to the sprite.
#[derive(Component, Clone, Copy, Debug)]
pub struct ActorVisual {
    /// Source frame size in texture pixels.
    pub frame_size: Vec2,
    pub origin: Vec2,
}

impl ActorVisual {
    pub fn display_height(&self, transform: &Transform) -> f32 {
        self.frame_size.y * transform.scale.y.abs()
    }
}

/// Color state of a sprite. Render sync composes `flash` (if any) or `base` with `alpha`.
#[derive(Component, Clone, Copy, Debug)]
pub struct SpriteTint {
    pub base: Color,
    pub alpha: f32,
    pub flash: Option<TintFlash>,
}

#[derive(Clone, Copy, Debug)]
pub struct TintFlash {
    pub color: Color,
    pub remaining: f32,
}

impl Default for SpriteTint {
    fn default() -> Self {
        Self::new(Color::WHITE)
    }
}

impl SpriteTint {
    pub fn new(base: Color) -> Self {
        Self {
            base,
            alpha: 1.0,
            flash: None,
        }
    }

    pub fn flash(&mut self, color: Color, seconds: f32) {
        self.flash = Some(TintFlash {
            color,
            remaining: seconds.max(0.0),
        });
    }

    pub fn effective(&self) -> Color {
        let color = self.flash.map_or(self.base, |f| f.color);
        color.with_alpha(self.alpha.clamp(0.0, 1.0))
    }
}

/// Draw order inside the preview; larger is closer to the viewer.
#[derive(Component, Clone, Copy, Default)]
pub struct Depth(pub f32);
