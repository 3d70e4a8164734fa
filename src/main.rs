mod ai;
mod animation;
mod api;
mod assets;
mod backend;
mod camera;
mod combat;
mod components;
mod config;
mod controls;
mod events;
mod input;
mod loading;
mod overlay;
mod player;
mod readiness;
mod render;
mod scheduler;
mod session;
mod spawn;
mod sprites;
mod trail;
mod tween;
mod ultimate;

use bevy::prelude::*;
use backend::BackendClient;
use components::HeadlessMode;
use config::PreviewConfig;
use controls::{PreviewControls, Selection};
use loading::PreviewRuntime;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let headless = args.iter().any(|a| a == "--headless");

    let mut config = PreviewConfig::load();
    config.apply_args(&args);

    let mut app = App::new();
    app.insert_resource(HeadlessMode(headless));

    if headless {
        // No window and no renderer: the session still runs for the API.
        app.add_plugins(MinimalPlugins);
        app.add_plugins(bevy::log::LogPlugin::default());
        println!("[Preview] Starting in HEADLESS mode");
    } else {
        let window_title = config
            .window_title
            .clone()
            .unwrap_or_else(|| "Studio Preview".to_string());
        let window_width = config.window_width.unwrap_or(960.0);
        let window_height = config.window_height.unwrap_or(540.0);

        app.add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: window_title,
                resolution: (window_width, window_height).into(),
                present_mode: bevy::window::PresentMode::AutoVsync,
                ..default()
            }),
            ..default()
        }));
        app.insert_resource(ClearColor(Color::srgb(0.08, 0.08, 0.1)));
        println!("[Preview] Starting in WINDOWED mode");
    }

    let backend_url = config.backend_url();
    let client = BackendClient::new(backend_url.clone());
    match config.project_id.as_deref() {
        Some(project) => match PreviewRuntime::new(client.clone(), project) {
            Ok(runtime) => {
                println!("[Preview] Project '{project}' on {backend_url}");
                app.insert_resource(runtime);
            }
            Err(e) => eprintln!("[Preview] Failed to start I/O runtime: {e}"),
        },
        None => println!("[Preview] No project configured; set PREVIEW_PROJECT or pass --project"),
    }

    let preferred = Selection {
        protagonist: config.protagonist.clone(),
        antagonist: config.antagonist.clone(),
        scene: config.scene.clone(),
    };

    app.insert_resource(config.tuning.clone())
        .insert_resource(PreviewControls::new(preferred, config.auto_start))
        .add_plugins(session::SessionPlugin)
        .add_plugins(events::GameEventsPlugin)
        .add_plugins(input::InputPlugin)
        .add_plugins(loading::LoadingPlugin)
        .add_plugins(controls::ControlsPlugin)
        .add_plugins(player::PlayerPlugin)
        .add_plugins(ai::AiPlugin)
        .add_plugins(combat::CombatPlugin)
        .add_plugins(ultimate::UltimatePlugin)
        .add_plugins(tween::TweenPlugin)
        .add_plugins(trail::TrailPlugin)
        .add_plugins(animation::AnimationPlugin)
        .add_plugins(overlay::OverlayPlugin)
        .add_plugins(render::RenderPlugin)
        .add_plugins(camera::CameraPlugin);

    if config.api_enabled {
        app.add_plugins(api::ApiPlugin {
            port: config.api_port(),
            backend: client,
            project_id: config.project_id.clone(),
        });
    }

    app.run();
}
