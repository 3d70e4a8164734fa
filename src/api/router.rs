use super::*;

pub(super) fn build_router(state: AppState, security: ApiSecurity) -> Router {
    Router::new()
        .route("/preview/state", get(get_state))
        .route("/preview/roster", get(get_roster))
        .route("/preview/roster/refresh", post(post_roster_refresh))
        .route("/preview/select", post(post_select))
        .route("/preview/start", post(post_start))
        .route("/preview/stop", post(post_stop))
        .route("/events", get(get_events))
        .route(
            "/resources/{kind}/{item}/select/{variant}",
            post(post_select_variant),
        )
        .route("/resources/animations/upload", post(post_upload_animation))
        .with_state(state)
        .layer(middleware::from_fn_with_state(security, api_guard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::HeadlessMode;
    use crate::config::CombatTuning;
    use crate::controls::PreviewControls;
    use crate::readiness::{ReadyAsset, ReadyAssets, RosterOutcome};
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use tower::util::ServiceExt;

    fn ready(id: &str) -> ReadyAsset {
        ReadyAsset {
            id: id.into(),
            name: id.to_uppercase(),
            image_url: format!("http://h/{id}.png"),
            animation: None,
        }
    }

    /// Router wired to a world served on its own thread.
    fn app(project_id: Option<&str>) -> Router {
        let (tx, rx) = crossbeam_channel::unbounded::<ApiCommand>();
        std::thread::spawn(move || {
            let mut world = World::new();
            world.insert_resource(HeadlessMode(true));
            world.insert_resource(PreviewSession::default());
            world.insert_resource(GameEventBus::default());
            world.insert_resource(CombatTuning::default());
            world.init_resource::<crate::loading::LoadChannel>();
            let mut controls = PreviewControls::default();
            controls.apply_roster(RosterOutcome::Checked {
                assets: ReadyAssets {
                    characters: vec![ready("wukong"), ready("bajie")],
                    scenes: vec![ready("mountain")],
                },
                spec_characters: 2,
                spec_scenes: 1,
            });
            world.insert_resource(controls);
            while let Ok(cmd) = rx.recv() {
                handle_command(&mut world, cmd);
                crate::loading::finish_loads(&mut world);
            }
        });
        let state = AppState {
            sender: tx,
            backend: BackendClient::new("http://127.0.0.1:9"),
            project_id: project_id.map(str::to_string),
        };
        let security = ApiSecurity {
            required_token: None,
            rate_limit_per_sec: 1000,
            buckets: Arc::new(Mutex::new(HashMap::new())),
        };
        build_router(state, security)
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> serde_json::Value {
        let mut req = HttpRequest::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                req = req.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let res = app
            .clone()
            .oneshot(req.body(body).expect("request"))
            .await
            .expect("response");
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn select_then_start_runs_a_session() {
        let app = app(None);
        let roster = call(&app, "GET", "/preview/roster", None).await;
        assert_eq!(roster["data"]["status"], "ready");
        assert_eq!(roster["data"]["can_start"], false);

        let refused = call(&app, "POST", "/preview/start", None).await;
        assert_eq!(refused["ok"], false);
        assert_eq!(refused["error"], "choose a protagonist first");

        for (slot, id) in [("protagonist", "wukong"), ("antagonist", "bajie"), ("scene", "mountain")] {
            let res = call(
                &app,
                "POST",
                "/preview/select",
                Some(serde_json::json!({ "slot": slot, "id": id })),
            )
            .await;
            assert_eq!(res["ok"], true);
        }
        let started = call(&app, "POST", "/preview/start", None).await;
        assert_eq!(started["ok"], true);

        let state = call(&app, "GET", "/preview/state", None).await;
        assert_eq!(state["data"]["phase"], "running");
        assert_eq!(state["data"]["actors"].as_array().map(Vec::len), Some(2));

        // Clearing the antagonist restarts the running session without it.
        let swapped = call(
            &app,
            "POST",
            "/preview/select",
            Some(serde_json::json!({ "slot": "antagonist", "id": null })),
        )
        .await;
        assert!(swapped["data"]["restarted"].is_u64());
        let state = call(&app, "GET", "/preview/state", None).await;
        assert_eq!(state["data"]["actors"].as_array().map(Vec::len), Some(1));

        let stopped = call(&app, "POST", "/preview/stop", None).await;
        assert!(stopped["data"]["session"].is_u64());
        let events = call(&app, "GET", "/events", None).await;
        let names: Vec<&str> = events["data"]
            .as_array()
            .expect("events")
            .iter()
            .filter_map(|e| e["name"].as_str())
            .collect();
        assert!(names.contains(&"session_running"));
        assert_eq!(names.last(), Some(&"session_stopped"));

        let last_seq = events["data"]
            .as_array()
            .and_then(|all| all.last())
            .and_then(|e| e["seq"].as_u64())
            .expect("seq");
        let newer = call(&app, "GET", &format!("/events?since={last_seq}"), None).await;
        assert_eq!(newer["data"].as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn unknown_selection_is_an_error() {
        let app = app(None);
        let res = call(
            &app,
            "POST",
            "/preview/select",
            Some(serde_json::json!({ "slot": "scene", "id": "atlantis" })),
        )
        .await;
        assert_eq!(res["ok"], false);
        assert_eq!(res["error"], "no ready scene with id 'atlantis'");
    }

    #[tokio::test]
    async fn refresh_without_backend_runtime_reports_offline() {
        let app = app(Some("p1"));
        let res = call(&app, "POST", "/preview/roster/refresh", None).await;
        assert_eq!(res["ok"], false);
    }

    #[tokio::test]
    async fn backend_proxies_validate_before_calling_out() {
        let unconfigured = app(None);
        let res = call(&unconfigured, "POST", "/resources/character/wukong/select/v2", None).await;
        assert_eq!(res["ok"], false);
        assert!(res["error"].as_str().is_some_and(|e| e.contains("no project")));

        let app = app(Some("p1"));
        let res = call(&app, "POST", "/resources/weapon/sword/select/v1", None).await;
        assert_eq!(res["error"], "unknown resource type 'weapon'");

        let res = call(
            &app,
            "POST",
            "/resources/animations/upload",
            Some(serde_json::json!({ "item_id": "wukong", "anim_type": "dance", "path": "/tmp/x.png" })),
        )
        .await;
        assert_eq!(res["error"], "anim_type must be one of full, idle, walk, attack");
    }
}
