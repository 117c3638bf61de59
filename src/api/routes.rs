use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;

use crate::api::handlers::AppState;
use crate::api::{feedback_handlers, handlers};
use crate::store::Store;

pub const API_PREFIX: &str = "/api/v1";

pub fn create_router<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .nest(API_PREFIX, api_routes::<S>())
        .layer(CorsLayer::permissive())
}

fn api_routes<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new()
        .route("/auth/me", get(handlers::current_user))
        // Datasets
        .route(
            "/dataset",
            get(handlers::list_datasets::<S>).post(handlers::create_dataset::<S>),
        )
        .route("/dataset/:id", get(handlers::get_dataset::<S>))
        // Models
        .route(
            "/model",
            get(handlers::list_models::<S>).post(handlers::create_model::<S>),
        )
        .route("/model/:id", get(handlers::get_model::<S>))
        // Trainings
        .route(
            "/training",
            get(handlers::list_trainings::<S>).post(handlers::create_training::<S>),
        )
        .route("/training/:id", get(handlers::get_training::<S>))
        // Feedback
        .route(
            "/feedback",
            get(feedback_handlers::list_feedback::<S>)
                .post(feedback_handlers::create_feedback::<S>),
        )
        .route("/feedback/:id", get(feedback_handlers::get_feedback::<S>))
        // Feedback AOIs, also reachable without the hyphen
        .route(
            "/feedback-aoi",
            get(feedback_handlers::list_feedback_aois::<S>)
                .post(feedback_handlers::create_feedback_aoi::<S>),
        )
        .route(
            "/feedbackaoi",
            get(feedback_handlers::list_feedback_aois::<S>)
                .post(feedback_handlers::create_feedback_aoi::<S>),
        )
        .route("/feedback-aoi/:id", get(feedback_handlers::get_feedback_aoi::<S>))
        .route("/feedbackaoi/:id", get(feedback_handlers::get_feedback_aoi::<S>))
        // Feedback labels
        .route(
            "/feedback-label",
            get(feedback_handlers::list_feedback_labels::<S>)
                .post(feedback_handlers::create_feedback_label::<S>),
        )
        .route(
            "/feedbacklabel",
            get(feedback_handlers::list_feedback_labels::<S>)
                .post(feedback_handlers::create_feedback_label::<S>),
        )
        .route(
            "/feedback-label/:id",
            get(feedback_handlers::get_feedback_label::<S>),
        )
        .route(
            "/feedbacklabel/:id",
            get(feedback_handlers::get_feedback_label::<S>),
        )
}
