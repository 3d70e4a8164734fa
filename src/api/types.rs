use serde::{Deserialize, Serialize};

use crate::animation::AnimState;
use crate::components::ActorController;
use crate::controls::{RosterStatus, Selection, SelectionSlot};
use crate::readiness::ReadyAsset;
use crate::session::{SessionPhase, SessionRequest};

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<String> {
    pub fn ok() -> Self {
        Self::success("ok".to_string())
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[derive(Serialize, Clone, Debug)]
pub struct ActorSnapshot {
    pub name: String,
    pub controller: ActorController,
    pub x: f32,
    pub y: f32,
    pub health: f32,
    pub facing_left: bool,
    pub animation: AnimState,
}

#[derive(Serialize, Clone, Debug)]
pub struct PreviewState {
    pub phase: SessionPhase,
    pub session: Option<u64>,
    pub request: Option<SessionRequest>,
    pub ultimate_active: bool,
    pub actors: Vec<ActorSnapshot>,
}

#[derive(Serialize, Clone, Debug)]
pub struct RosterView {
    pub status: RosterStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
    pub characters: Vec<ReadyAsset>,
    pub scenes: Vec<ReadyAsset>,
    pub selection: Selection,
    pub can_start: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct SelectRequest {
    pub slot: SelectionSlot,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Serialize, Clone, Debug)]
pub struct SelectResult {
    pub selection: Selection,
    /// Session started by a hot-swap, if the change restarted the preview.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restarted: Option<u64>,
}

#[derive(Serialize, Clone, Debug)]
pub struct SessionResult {
    pub session: Option<u64>,
}

#[derive(Deserialize, Default, Debug)]
pub struct EventsQuery {
    /// Only events with a larger sequence number.
    #[serde(default)]
    pub since: Option<u64>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct UploadAnimationRequest {
    pub item_id: String,
    /// `full`, `idle`, `walk` or `attack`.
    pub anim_type: String,
    /// Local PNG to upload.
    pub path: String,
}

pub const ANIMATION_UPLOAD_TYPES: [&str; 4] = ["full", "idle", "walk", "attack"];
