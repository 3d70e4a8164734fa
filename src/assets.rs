use bevy::log::debug;

/// Path segment that precedes the public part of a stored asset path.
const STORAGE_MARKER: &str = "projects";

/// Resolves a backend-reported `file_path` to the public static-asset URL.
///
/// The backend stores files under `<root>/projects/<project>/...`; everything
/// after the `projects` segment is served at `{base}/assets/...`. Returns an
/// empty string when the path is absent or carries no marker; callers treat
/// empty as "no asset".
pub fn resolve_asset_url(
    base_url: &str,
    project_id: &str,
    folder: &str,
    item_id: &str,
    file_path: Option<&str>,
) -> String {
    let Some(path) = file_path.filter(|p| !p.is_empty()) else {
        return String::new();
    };
    let rest = match after_marker(path) {
        Some(rest) if !rest.is_empty() => rest,
        _ => {
            debug!("[Preview assets] {project_id}/{folder}/{item_id}: no public path in '{path}'");
            return String::new();
        }
    };
    format!(
        "{}/assets/{}",
        base_url.trim_end_matches('/'),
        rest.replace('\\', "/")
    )
}

/// Finds the first `projects/` or `projects\` segment and returns what follows.
fn after_marker(path: &str) -> Option<&str> {
    let mut search_from = 0;
    while let Some(found) = path[search_from..].find(STORAGE_MARKER) {
        let start = search_from + found;
        let end = start + STORAGE_MARKER.len();
        match path.as_bytes().get(end) {
            Some(b'/') | Some(b'\\') => return Some(&path[end + 1..]),
            _ => search_from = end,
        }
    }
    None
}

/// Prefixes server-relative URLs (`/assets/...`) with the backend origin.
pub fn absolute_url(base_url: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else if url.starts_with('/') {
        format!("{}{}", base_url.trim_end_matches('/'), url)
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), url)
    }
}

/// Appends a time-based `t` query parameter so regenerated art is never served stale.
pub fn cache_busted(url: &str, unix_millis: u128) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}t={unix_millis}")
}

pub fn unix_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
