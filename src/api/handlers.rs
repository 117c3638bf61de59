use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::extract::{ApiQuery, Payload, RecordId};
use crate::api::user_extractor::AuthenticatedUser;
use crate::auth::TokenValidator;
use crate::model::{
    Dataset, DatasetFilter, Model, ModelFilter, NewDataset, NewModel, NewTraining, OsmUser,
    Training, TrainingFilter,
};
use crate::store::Store;

/// Shared by every handler: the record store and the token validator
pub struct AppContext<S> {
    pub store: S,
    pub validator: Arc<dyn TokenValidator>,
}

pub type AppState<S> = Arc<AppContext<S>>;

impl<S: Store> AppContext<S> {
    pub fn new(store: S, validator: Arc<dyn TokenValidator>) -> AppState<S> {
        Arc::new(Self { store, validator })
    }
}

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// The user behind the presented token
pub async fn current_user(AuthenticatedUser(user): AuthenticatedUser) -> Json<OsmUser> {
    Json(user)
}

// Datasets

pub async fn list_datasets<S: Store>(
    State(ctx): State<AppState<S>>,
    ApiQuery(filter): ApiQuery<DatasetFilter>,
) -> Result<Json<Vec<Dataset>>, ApiError> {
    Ok(Json(ctx.store.list_datasets(&filter).await?))
}

pub async fn get_dataset<S: Store>(
    State(ctx): State<AppState<S>>,
    RecordId(id): RecordId,
) -> Result<Json<Dataset>, ApiError> {
    ctx.store
        .get_dataset(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Dataset", id))
}

pub async fn create_dataset<S: Store>(
    State(ctx): State<AppState<S>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Payload(new_dataset): Payload<NewDataset>,
) -> Result<(StatusCode, Json<Dataset>), ApiError> {
    let create = new_dataset.into_create(user.osm_id)?;
    let dataset = ctx.store.create_dataset(create).await?;
    log::info!(
        "Dataset {} '{}' created by {}",
        dataset.id,
        dataset.name,
        user.username
    );
    Ok((StatusCode::CREATED, Json(dataset)))
}

// Models

pub async fn list_models<S: Store>(
    State(ctx): State<AppState<S>>,
    ApiQuery(filter): ApiQuery<ModelFilter>,
) -> Result<Json<Vec<Model>>, ApiError> {
    Ok(Json(ctx.store.list_models(&filter).await?))
}

pub async fn get_model<S: Store>(
    State(ctx): State<AppState<S>>,
    RecordId(id): RecordId,
) -> Result<Json<Model>, ApiError> {
    ctx.store
        .get_model(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Model", id))
}

pub async fn create_model<S: Store>(
    State(ctx): State<AppState<S>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Payload(new_model): Payload<NewModel>,
) -> Result<(StatusCode, Json<Model>), ApiError> {
    let create = new_model.into_create(user.osm_id)?;
    let model = ctx.store.create_model(create).await?;
    log::info!(
        "Model {} '{}' created on dataset {} by {}",
        model.id,
        model.name,
        model.dataset,
        user.username
    );
    Ok((StatusCode::CREATED, Json(model)))
}

// Trainings

pub async fn list_trainings<S: Store>(
    State(ctx): State<AppState<S>>,
    ApiQuery(filter): ApiQuery<TrainingFilter>,
) -> Result<Json<Vec<Training>>, ApiError> {
    Ok(Json(ctx.store.list_trainings(&filter).await?))
}

pub async fn get_training<S: Store>(
    State(ctx): State<AppState<S>>,
    RecordId(id): RecordId,
) -> Result<Json<Training>, ApiError> {
    ctx.store
        .get_training(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Training", id))
}

/// Submits a training run. A model runs at most one training at a time.
pub async fn create_training<S: Store>(
    State(ctx): State<AppState<S>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Payload(new_training): Payload<NewTraining>,
) -> Result<(StatusCode, Json<Training>), ApiError> {
    let create = new_training.into_create(user.osm_id)?;
    let training = ctx.store.create_training(create).await?;
    log::info!(
        "Training {} submitted for model {} by {} (zoom {:?}, {} epochs)",
        training.id,
        training.model,
        user.username,
        training.zoom_level,
        training.epochs
    );
    Ok((StatusCode::CREATED, Json(training)))
}
