use super::*;

#[derive(Clone)]
pub(super) struct AppState {
    pub(super) sender: Sender<ApiCommand>,
    pub(super) backend: BackendClient,
    pub(super) project_id: Option<String>,
}

impl AppState {
    pub(super) fn project(&self) -> Result<&str, String> {
        self.project_id
            .as_deref()
            .ok_or_else(|| "no project configured (set PREVIEW_PROJECT or --project)".to_string())
    }
}
