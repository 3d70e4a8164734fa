use bevy::prelude::*;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_API_PORT: u16 = 3000;

/// Startup configuration, read from `preview.json` (or `PREVIEW_CONFIG`).
/// Environment variables override file values.
#[derive(Deserialize, Serialize, Clone, Default)]
pub struct PreviewConfig {
    pub project_id: Option<String>,
    pub backend_url: Option<String>,
    pub window_title: Option<String>,
    pub window_width: Option<f32>,
    pub window_height: Option<f32>,
    pub api_port: Option<u16>,
    #[serde(default = "default_true")]
    pub api_enabled: bool,
    pub protagonist: Option<String>,
    pub antagonist: Option<String>,
    pub scene: Option<String>,
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default)]
    pub tuning: CombatTuning,
}

fn default_true() -> bool {
    true
}

impl PreviewConfig {
    pub fn load() -> Self {
        let path = std::env::var("PREVIEW_CONFIG")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "preview.json".to_string());
        let mut cfg = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<PreviewConfig>(&contents) {
                Ok(cfg) => {
                    println!("[Preview] Loaded startup config from {}", path);
                    cfg
                }
                Err(e) => {
                    eprintln!("[Preview] Failed to parse {}: {}", path, e);
                    PreviewConfig::with_defaults()
                }
            },
            Err(_) => PreviewConfig::with_defaults(),
        };
        cfg.apply_env();
        cfg
    }

    fn with_defaults() -> Self {
        Self {
            api_enabled: true,
            ..Default::default()
        }
    }

    fn apply_env(&mut self) {
        if let Some(project) = env_non_empty("PREVIEW_PROJECT") {
            self.project_id = Some(project);
        }
        if let Some(url) = env_non_empty("PREVIEW_BACKEND_URL") {
            self.backend_url = Some(url);
        }
        if let Some(port) = env_non_empty("PREVIEW_API_PORT").and_then(|v| v.parse().ok()) {
            self.api_port = Some(port);
        }
    }

    /// Applies `--project <id>`, `--backend <url>` and `--no-api`.
    pub fn apply_args(&mut self, args: &[String]) {
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--project" => {
                    if let Some(v) = iter.next() {
                        self.project_id = Some(v.clone());
                    }
                }
                "--backend" => {
                    if let Some(v) = iter.next() {
                        self.backend_url = Some(v.clone());
                    }
                }
                "--no-api" => self.api_enabled = false,
                _ => {}
            }
        }
    }

    pub fn backend_url(&self) -> String {
        self.backend_url
            .as_deref()
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
    }

    pub fn api_port(&self) -> u16 {
        self.api_port.unwrap_or(DEFAULT_API_PORT)
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Gameplay balance values. Tunable through `preview.json`.
#[derive(Resource, Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatTuning {
    pub player_speed: f32,
    pub monster_speed: f32,
    pub aggro_range: f32,
    pub contact_range: f32,
    pub contact_damage_per_frame: f32,
    pub attack_range: f32,
    pub attack_damage: f32,
    pub ultimate_clone_count: usize,
    pub ultimate_spread: f32,
    pub ultimate_disperse_secs: f32,
    pub ultimate_charge_base_delay_secs: f32,
    pub ultimate_charge_stagger_secs: f32,
    pub ultimate_charge_secs: f32,
    pub ultimate_final_damage: f32,
    pub ultimate_knockback: [f32; 2],
    pub ultimate_spin_degrees: f32,
    pub ultimate_knockback_secs: f32,
    pub player_trail_interval: u32,
    pub player_trail_secs: f32,
}

impl Default for CombatTuning {
    fn default() -> Self {
        Self {
            player_speed: 250.0,
            monster_speed: 120.0,
            aggro_range: 300.0,
            contact_range: 45.0,
            contact_damage_per_frame: 0.15,
            attack_range: 80.0,
            attack_damage: 20.0,
            ultimate_clone_count: 6,
            ultimate_spread: 120.0,
            ultimate_disperse_secs: 0.4,
            ultimate_charge_base_delay_secs: 0.3,
            ultimate_charge_stagger_secs: 0.18,
            ultimate_charge_secs: 0.18,
            ultimate_final_damage: 65.0,
            ultimate_knockback: [300.0, 250.0],
            ultimate_spin_degrees: 1440.0,
            ultimate_knockback_secs: 1.2,
            player_trail_interval: 2,
            player_trail_secs: 0.3,
        }
    }
}
