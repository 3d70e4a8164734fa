use super::*;

pub(super) const DEFAULT_API_RATE_LIMIT_PER_SEC: u32 = 60;

#[derive(Clone)]
pub(super) struct ApiSecurity {
    pub required_token: Option<String>,
    pub rate_limit_per_sec: u32,
    pub buckets: Arc<Mutex<HashMap<String, RateBucket>>>,
}

#[derive(Clone)]
pub(super) struct RateBucket {
    pub window_start: std::time::Instant,
    pub count: u32,
}

impl ApiSecurity {
    pub(super) fn from_env() -> Self {
        let required_token = std::env::var("PREVIEW_API_TOKEN")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let rate_limit_per_sec = std::env::var("PREVIEW_API_RATE_LIMIT_PER_SEC")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_API_RATE_LIMIT_PER_SEC)
            .max(1);
        Self {
            required_token,
            rate_limit_per_sec,
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

fn header<'a>(req: &'a Request, name: &str) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
}

/// Accepts `Authorization: Bearer <token>` or `X-Api-Key: <token>`.
fn presents_token(req: &Request, expected: &str) -> bool {
    let bearer = header(req, "authorization").map(|auth| {
        auth.strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .unwrap_or(auth)
    });
    bearer == Some(expected) || header(req, "x-api-key") == Some(expected)
}

impl ApiSecurity {
    /// Counts a request for `client`; false once the one-second window is full.
    fn admit(&self, client: String) -> bool {
        let mut buckets = match self.buckets.lock() {
            Ok(buckets) => buckets,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = std::time::Instant::now();
        let bucket = buckets.entry(client).or_insert(RateBucket {
            window_start: now,
            count: 0,
        });
        if now.duration_since(bucket.window_start).as_secs_f32() >= 1.0 {
            bucket.window_start = now;
            bucket.count = 0;
        }
        bucket.count = bucket.count.saturating_add(1);
        let admitted = bucket.count <= self.rate_limit_per_sec;
        if buckets.len() > 1024 {
            buckets.retain(|_, b| now.duration_since(b.window_start).as_secs_f32() < 10.0);
        }
        admitted
    }
}

pub(super) async fn api_guard(
    State(security): State<ApiSecurity>,
    req: Request,
    next: Next,
) -> axum::response::Response {
    if let Some(expected) = security.required_token.as_deref() {
        if !presents_token(&req, expected) {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::err(
                    "Unauthorized: send Authorization: Bearer <PREVIEW_API_TOKEN> or X-Api-Key",
                )),
            )
                .into_response();
        }
    }

    let client = header(&req, "x-forwarded-for")
        .or_else(|| header(&req, "x-real-ip"))
        .unwrap_or("local")
        .to_string();
    if !security.admit(client) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiResponse::err("Rate limit exceeded")),
        )
            .into_response();
    }

    next.run(req).await
}
