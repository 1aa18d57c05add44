// Library exports for the server binary, maintenance tools and tests
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use db::{encoding::legacy_encoding, CsvTable};
use models::{announcement::Announcement, question::Question};
use services::{
    access::{AccessGate, AllowList},
    announcements::AnnouncementService,
    questions::QuestionService,
    sessions::SessionStore,
    uploads::UploadArea,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gate: Arc<AccessGate>,
    pub sessions: Arc<SessionStore>,
    pub uploads: Arc<UploadArea>,
    pub questions: Arc<QuestionService>,
    pub announcements: Arc<AnnouncementService>,
}

impl AppState {
    /// Wire the flat-file collections, upload area and session store for
    /// `config`, with `allow_list` as the login source.
    pub fn new(config: Config, allow_list: AllowList) -> Self {
        let legacy = legacy_encoding(&config.legacy_encoding);
        let uploads = Arc::new(UploadArea::new(config.upload_dir.clone()));
        let questions = Arc::new(CsvTable::<Question>::new(config.questions_path(), legacy));
        let announcements =
            Arc::new(CsvTable::<Announcement>::new(config.announcements_path(), legacy));

        Self {
            gate: Arc::new(AccessGate::new(allow_list)),
            sessions: Arc::new(SessionStore::new(config.session_ttl_seconds)),
            questions: Arc::new(QuestionService::new(questions, uploads.clone())),
            announcements: Arc::new(AnnouncementService::new(announcements)),
            uploads,
            config: Arc::new(config),
        }
    }

    /// Like `new`, reading the allow-list from `config.allowed_emails_path`.
    pub async fn load(config: Config) -> Self {
        let legacy = legacy_encoding(&config.legacy_encoding);
        let allow_list = AllowList::load(&config.allowed_emails_path, legacy).await;
        Self::new(config, allow_list)
    }
}

/// Host part of a URL or origin, without scheme, path or port.
fn host_of(url: &str) -> &str {
    let after_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = after_scheme.split('/').next().unwrap_or(after_scheme);
    authority.split(':').next().unwrap_or(authority)
}

/// Local development origins, the exact base URL, and subdomains of its host.
fn origin_allowed(origin: &str, base_url: &str) -> bool {
    if origin.starts_with("http://") && matches!(host_of(origin), "localhost" | "127.0.0.1") {
        return true;
    }
    if origin == base_url.trim_end_matches('/') {
        return true;
    }
    let host = host_of(base_url);
    !host.is_empty() && origin.ends_with(&format!(".{host}"))
}

fn cors_layer(base_url: &str) -> CorsLayer {
    let base = base_url.to_string();
    let origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        origin
            .to_str()
            .is_ok_and(|origin| origin_allowed(origin, &base))
    });

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
        ]))
        .allow_credentials(true)
        .allow_origin(origin)
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    let cors = cors_layer(&state.config.app_base_url);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::metrics::export_metrics))
        // Auth
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/me", get(routes::auth::me))
        // Question board
        .route("/questions", get(routes::questions::list_questions).post(routes::questions::create_question))
        .route("/questions/{id}", put(routes::questions::update_question).delete(routes::questions::delete_question))
        .route("/attachments/{name}", get(routes::attachments::serve_attachment))
        // Announcements
        .route("/announcements", get(routes::announcements::list_announcements).post(routes::announcements::create_announcement))
        .route("/announcements/popup", get(routes::announcements::get_popup))
        .route("/announcements/{id}", put(routes::announcements::update_announcement).delete(routes::announcements::delete_announcement))
        .route("/announcements/{id}/confirm", post(routes::announcements::confirm_announcement))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
