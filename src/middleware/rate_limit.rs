use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

const WINDOW: Duration = Duration::from_secs(1);

/// Windows are pruned once the map grows past this many keys.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug)]
struct Window {
    opened_at: Instant,
    admitted: u32,
}

/// Fixed one-second windows, one per session. Requests on
/// `/api/sessions/:id/...` count against that session's budget, so a single
/// chatty client cannot turn its bursts into bursts of model calls or starve
/// other candidates. Session creation shares one budget of its own.
#[derive(Clone, Debug)]
pub struct RequestBudget {
    per_second: u32,
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl RequestBudget {
    pub fn new(per_second: u32) -> Self {
        Self {
            per_second: per_second.max(1),
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn try_acquire(&self, key: &str) -> bool {
        self.try_acquire_at(key, Instant::now())
    }

    fn try_acquire_at(&self, key: &str, now: Instant) -> bool {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if windows.len() > PRUNE_THRESHOLD {
            windows.retain(|_, w| now.saturating_duration_since(w.opened_at) < WINDOW);
        }

        let window = windows.entry(key.to_string()).or_insert(Window {
            opened_at: now,
            admitted: 0,
        });
        if now.saturating_duration_since(window.opened_at) >= WINDOW {
            window.opened_at = now;
            window.admitted = 0;
        }
        if window.admitted < self.per_second {
            window.admitted += 1;
            true
        } else {
            false
        }
    }

    fn tracked_keys(&self) -> usize {
        match self.windows.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

/// The session id for `/api/sessions/:id[/...]`, otherwise the path itself.
fn budget_key(path: &str) -> &str {
    path.strip_prefix("/api/sessions/")
        .and_then(|rest| rest.split('/').next())
        .filter(|id| !id.is_empty())
        .unwrap_or(path)
}

pub async fn budget_middleware(
    State(budget): State<RequestBudget>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let key = budget_key(req.uri().path());
    if !budget.try_acquire(key) {
        tracing::warn!(
            key = %key,
            tracked = budget.tracked_keys(),
            "Request budget exhausted"
        );
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "Too many requests, please slow down" })),
        )
            .into_response();
    }
    next.run(req).await
}
