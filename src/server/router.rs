use crate::db::DbActorHandle;
use crate::server::routes::{
    ai_models_handler, block_templates_handler, categories_handler, languages_handler,
    version_handler, wrappers_handler,
};

use axum::{
    Router,
    extract::Request,
    http::{StatusCode, Version, header::USER_AGENT},
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use std::time::Instant;
use tracing::{error, info, warn};

fn format_http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/?",
    }
}

#[derive(Clone)]
pub struct MirrorState {
    pub db: DbActorHandle,
}

impl MirrorState {
    pub fn new(db: DbActorHandle) -> Self {
        Self { db }
    }
}

async fn not_found_handler() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn access_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let version = req.version();

    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let start = Instant::now();
    let resp = next.run(req).await;

    let status = resp.status();
    let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    let path = uri.path();
    let protocol = format_http_version(version);

    if status.is_server_error() {
        error!(
            "| {:>3} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    } else if status.is_client_error() {
        warn!(
            "| {:>3} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    } else {
        info!(
            "| {:>3} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    }

    resp
}

pub fn mirror_router(state: MirrorState) -> Router {
    let api = Router::new()
        .route("/api/categories", get(categories_handler))
        .route("/api/languages", get(languages_handler))
        .route("/api/ai-models", get(ai_models_handler))
        .route("/api/block-templates", get(block_templates_handler))
        .route("/api/wrappers", get(wrappers_handler))
        .route("/api/version", get(version_handler));

    Router::new()
        .merge(api)
        .fallback(not_found_handler)
        .with_state(state)
        .layer(middleware::from_fn(access_log))
}
