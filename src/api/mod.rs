mod commands;
mod router;
mod routes;
mod security;
mod state;
pub mod types;

use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use bevy::prelude::*;
use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::animation::AnimationPlayer;
use crate::backend::types::{SelectOutcome, SpecKind, UnknownSpecKind};
use crate::backend::{BackendClient, BackendError, ResourceBackend};
use crate::components::{Actor, Facing, GamePosition, Health};
use crate::controls::{change_selection, refresh_roster, request_start, request_stop, PreviewControls};
use crate::events::{GameEventBus, PreviewEvent};
use crate::session::{PreviewSession, PreviewSet};
use crate::ultimate::UltimateState;
pub use commands::{ApiChannels, ApiCommand};
use commands::*;
use router::build_router;
use routes::*;
use security::*;
use state::*;
use types::*;

/// Local HTTP control surface plus proxies for backend actions.
pub struct ApiPlugin {
    pub port: u16,
    pub backend: BackendClient,
    pub project_id: Option<String>,
}

impl Plugin for ApiPlugin {
    fn build(&self, app: &mut App) {
        let (tx, rx) = crossbeam_channel::unbounded::<ApiCommand>();

        app.insert_resource(ApiChannels { receiver: rx })
            .add_systems(Update, process_api_commands.in_set(PreviewSet::Control));

        let state = AppState {
            sender: tx,
            backend: self.backend.clone(),
            project_id: self.project_id.clone(),
        };
        let security = ApiSecurity::from_env();
        let port = self.port;
        std::thread::spawn(move || {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    error!("[Preview API] could not start runtime: {e}");
                    return;
                }
            };
            rt.block_on(async {
                let app = build_router(state, security);
                let addr = format!("127.0.0.1:{port}");
                let listener = match tokio::net::TcpListener::bind(&addr).await {
                    Ok(listener) => listener,
                    Err(e) => {
                        error!("[Preview API] failed to bind {addr}: {e}");
                        return;
                    }
                };

                println!("[Preview API] Listening on http://{addr}");

                if let Err(e) = axum::serve(listener, app).await {
                    error!("[Preview API] server stopped: {e}");
                }
            });
        });
    }
}
