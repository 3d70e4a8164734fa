use super::*;

async fn ask<T>(
    state: &AppState,
    build: impl FnOnce(tokio::sync::oneshot::Sender<T>) -> ApiCommand,
) -> Result<T, String> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    state
        .sender
        .send(build(tx))
        .map_err(|_| "Channel closed".to_string())?;
    rx.await.map_err(|_| "Channel closed".to_string())
}

fn respond<T: Serialize>(result: Result<T, String>) -> Json<ApiResponse<T>> {
    match result {
        Ok(data) => Json(ApiResponse::success(data)),
        Err(e) => Json(ApiResponse {
            ok: false,
            data: None,
            error: Some(e),
        }),
    }
}

pub(super) async fn get_state(State(state): State<AppState>) -> Json<ApiResponse<PreviewState>> {
    respond(ask(&state, ApiCommand::GetState).await)
}

pub(super) async fn get_roster(State(state): State<AppState>) -> Json<ApiResponse<RosterView>> {
    respond(ask(&state, ApiCommand::GetRoster).await)
}

pub(super) async fn post_roster_refresh(State(state): State<AppState>) -> Json<ApiResponse<String>> {
    match ask(&state, ApiCommand::RefreshRoster).await {
        Ok(Ok(())) => Json(ApiResponse::ok()),
        Ok(Err(e)) | Err(e) => Json(ApiResponse::err(e)),
    }
}

pub(super) async fn post_select(
    State(state): State<AppState>,
    Json(req): Json<SelectRequest>,
) -> Json<ApiResponse<SelectResult>> {
    respond(ask(&state, |tx| ApiCommand::Select(req, tx)).await.and_then(|r| r))
}

pub(super) async fn post_start(State(state): State<AppState>) -> Json<ApiResponse<SessionResult>> {
    respond(ask(&state, ApiCommand::Start).await.and_then(|r| r))
}

pub(super) async fn post_stop(State(state): State<AppState>) -> Json<ApiResponse<SessionResult>> {
    respond(ask(&state, ApiCommand::Stop).await)
}

pub(super) async fn get_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Json<ApiResponse<Vec<PreviewEvent>>> {
    respond(ask(&state, |tx| ApiCommand::GetEvents(query.since, tx)).await)
}

/// Marks a variant as final on the backend, then re-checks the roster so
/// the new asset becomes selectable.
pub(super) async fn post_select_variant(
    State(state): State<AppState>,
    Path((kind, item_id, variant_id)): Path<(String, String, String)>,
) -> Json<ApiResponse<SelectOutcome>> {
    respond(select_variant(&state, &kind, &item_id, &variant_id).await)
}

async fn select_variant(
    state: &AppState,
    kind: &str,
    item_id: &str,
    variant_id: &str,
) -> Result<SelectOutcome, String> {
    let project = state.project()?;
    let kind: SpecKind = kind.parse().map_err(|e: UnknownSpecKind| e.to_string())?;
    let outcome = state
        .backend
        .select_variant(project, kind, item_id, variant_id)
        .await
        .map_err(|e| e.to_string())?;
    info!(
        "[Preview API] selected {} variant {} for '{}'",
        kind.as_str(),
        variant_id,
        item_id
    );
    refresh_after_change(state).await;
    Ok(outcome)
}

pub(super) async fn post_upload_animation(
    State(state): State<AppState>,
    Json(req): Json<UploadAnimationRequest>,
) -> Json<ApiResponse<serde_json::Value>> {
    respond(upload_animation(&state, &req).await)
}

async fn upload_animation(
    state: &AppState,
    req: &UploadAnimationRequest,
) -> Result<serde_json::Value, String> {
    let project = state.project()?;
    if !ANIMATION_UPLOAD_TYPES.contains(&req.anim_type.as_str()) {
        return Err(format!(
            "anim_type must be one of {}",
            ANIMATION_UPLOAD_TYPES.join(", ")
        ));
    }
    let bytes = tokio::fs::read(&req.path).await.map_err(|source| {
        BackendError::LocalFile {
            path: req.path.clone(),
            source,
        }
        .to_string()
    })?;
    let file_name = std::path::Path::new(&req.path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("spritesheet.png")
        .to_string();
    let uploaded = state
        .backend
        .upload_animation(project, &req.item_id, &req.anim_type, &file_name, bytes)
        .await
        .map_err(|e| e.to_string())?;
    refresh_after_change(state).await;
    Ok(uploaded)
}

async fn refresh_after_change(state: &AppState) {
    if let Ok(Err(e)) = ask(state, ApiCommand::RefreshRoster).await {
        warn!("[Preview API] roster refresh failed: {e}");
    }
}
