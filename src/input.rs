use bevy::prelude::*;
use std::collections::HashSet;

/// Action names, shared by keyboard mapping and tests.
pub mod action {
    pub const LEFT: &str = "left";
    pub const RIGHT: &str = "right";
    pub const UP: &str = "up";
    pub const DOWN: &str = "down";
    pub const ATTACK: &str = "attack";
    pub const ULTIMATE: &str = "ultimate";
    pub const CYCLE_PROTAGONIST: &str = "cycle_protagonist";
    pub const CYCLE_ANTAGONIST: &str = "cycle_antagonist";
    pub const CYCLE_SCENE: &str = "cycle_scene";
    pub const START: &str = "start";
    pub const STOP: &str = "stop";
    pub const REFRESH: &str = "refresh";
}

/// Abstraction layer between raw input and preview systems.
/// The keyboard writes to it when a window exists; tests write to it directly.
#[derive(Resource, Default, Clone)]
pub struct VirtualInput {
    pub active: HashSet<String>,
    pub just_pressed: HashSet<String>,
}

impl VirtualInput {
    pub fn pressed(&self, action: &str) -> bool {
        self.active.contains(action)
    }

    pub fn just_pressed(&self, action: &str) -> bool {
        self.just_pressed.contains(action)
    }

    /// Presses `action` for this frame.
    pub fn press(&mut self, action: &str) {
        self.active.insert(action.to_string());
        self.just_pressed.insert(action.to_string());
    }

    /// Horizontal and vertical direction in `{-1, 0, 1}`, y down.
    pub fn direction(&self) -> Vec2 {
        let mut dir = Vec2::ZERO;
        if self.pressed(action::LEFT) {
            dir.x -= 1.0;
        }
        if self.pressed(action::RIGHT) {
            dir.x += 1.0;
        }
        if self.pressed(action::UP) {
            dir.y -= 1.0;
        }
        if self.pressed(action::DOWN) {
            dir.y += 1.0;
        }
        dir
    }
}

pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(VirtualInput::default())
            .add_systems(
                PreUpdate,
                keyboard_to_virtual.run_if(resource_exists::<ButtonInput<KeyCode>>),
            )
            .add_systems(Last, clear_virtual_input);
    }
}

const BINDINGS: &[(&str, &[KeyCode])] = &[
    (action::LEFT, &[KeyCode::KeyA, KeyCode::ArrowLeft]),
    (action::RIGHT, &[KeyCode::KeyD, KeyCode::ArrowRight]),
    (action::UP, &[KeyCode::KeyW, KeyCode::ArrowUp]),
    (action::DOWN, &[KeyCode::KeyS, KeyCode::ArrowDown]),
    (action::ATTACK, &[KeyCode::Space]),
    (action::ULTIMATE, &[KeyCode::KeyR]),
    (action::CYCLE_PROTAGONIST, &[KeyCode::Digit1]),
    (action::CYCLE_ANTAGONIST, &[KeyCode::Digit2]),
    (action::CYCLE_SCENE, &[KeyCode::Digit3]),
    (action::START, &[KeyCode::Enter]),
    (action::STOP, &[KeyCode::Escape]),
    (action::REFRESH, &[KeyCode::F5]),
];

/// Translate keyboard input to VirtualInput action names
fn keyboard_to_virtual(keyboard: Res<ButtonInput<KeyCode>>, mut vinput: ResMut<VirtualInput>) {
    vinput.active.clear();
    vinput.just_pressed.clear();

    for (name, keys) in BINDINGS {
        if keyboard.any_pressed(keys.iter().copied()) {
            vinput.active.insert((*name).to_string());
        }
        if keyboard.any_just_pressed(keys.iter().copied()) {
            vinput.just_pressed.insert((*name).to_string());
        }
    }
}

fn clear_virtual_input(mut vinput: ResMut<VirtualInput>) {
    vinput.just_pressed.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::RunSystemOnce;

    #[test]
    fn opposing_keys_cancel_and_diagonals_are_not_normalized() {
        let mut input = VirtualInput::default();
        input.press(action::LEFT);
        input.press(action::RIGHT);
        input.press(action::DOWN);
        assert_eq!(input.direction(), Vec2::new(0.0, 1.0));

        let mut diagonal = VirtualInput::default();
        diagonal.press(action::RIGHT);
        diagonal.press(action::UP);
        assert_eq!(diagonal.direction(), Vec2::new(1.0, -1.0));
    }

    #[test]
    fn keyboard_maps_to_actions() {
        let mut app = App::new();
        app.add_plugins(InputPlugin)
            .insert_resource(ButtonInput::<KeyCode>::default());
        app.world_mut()
            .resource_mut::<ButtonInput<KeyCode>>()
            .press(KeyCode::ArrowLeft);
        app.world_mut()
            .resource_mut::<ButtonInput<KeyCode>>()
            .press(KeyCode::KeyR);
        app.world_mut()
            .run_system_once(keyboard_to_virtual)
            .expect("map keys");
        let input = app.world().resource::<VirtualInput>();
        assert!(input.pressed(action::LEFT));
        assert!(input.just_pressed(action::ULTIMATE));
        assert!(!input.pressed(action::ATTACK));
    }
}
