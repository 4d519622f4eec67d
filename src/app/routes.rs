use crate::app::handlers;
use crate::app::state::SharedState;
use crate::core::correlation::{correlation_layer, request_span};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::Level;

/// Upload routes accept a full batch of images in one form.
pub const UPLOAD_BODY_LIMIT: usize = 40 * 1024 * 1024;

pub fn router(state: SharedState) -> Router {
    let uploads = Router::new()
        .route("/vision/analyze", post(handlers::analyze_images))
        .route("/documents/analyze", post(handlers::analyze_document_form))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/frontend_settings", get(handlers::frontend_settings))
        .route("/moderation/text", post(handlers::moderate_text))
        .route("/groundedness", post(handlers::groundedness))
        .route("/language/analyze", post(handlers::analyze_language))
        .route("/conversation", post(handlers::conversation))
        .route("/video/index", post(handlers::index_video))
        .route("/reports/{batch_id}", get(handlers::download_report))
        .merge(uploads)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                ),
        )
        // 最外層：先指定 correlation id，trace span 才拿得到
        .layer(middleware::from_fn(correlation_layer))
        .with_state(state)
}
