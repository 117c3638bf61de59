use axum::{extract::State, http::StatusCode, response::Json};

use crate::api::error::ApiError;
use crate::api::extract::{ApiQuery, Payload, RecordId};
use crate::api::handlers::AppState;
use crate::api::user_extractor::AuthenticatedUser;
use crate::model::{
    Feedback, FeedbackAoi, FeedbackAoiFilter, FeedbackFilter, FeedbackLabel,
    FeedbackLabelFilter, NewFeedback, NewFeedbackAoi, NewFeedbackLabel,
};
use crate::store::Store;

pub async fn list_feedback<S: Store>(
    State(ctx): State<AppState<S>>,
    ApiQuery(filter): ApiQuery<FeedbackFilter>,
) -> Result<Json<Vec<Feedback>>, ApiError> {
    Ok(Json(ctx.store.list_feedback(&filter).await?))
}

pub async fn get_feedback<S: Store>(
    State(ctx): State<AppState<S>>,
    RecordId(id): RecordId,
) -> Result<Json<Feedback>, ApiError> {
    ctx.store
        .get_feedback(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Feedback", id))
}

/// Records a judgement on a prediction. The author is always the caller.
pub async fn create_feedback<S: Store>(
    State(ctx): State<AppState<S>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Payload(new_feedback): Payload<NewFeedback>,
) -> Result<(StatusCode, Json<Feedback>), ApiError> {
    let create = new_feedback.into_create(user.osm_id)?;
    let feedback = ctx.store.create_feedback(create).await?;
    log::info!(
        "Feedback {} ({}) on training {} by {}",
        feedback.id,
        feedback.feedback_type.as_str(),
        feedback.training,
        user.username
    );
    Ok((StatusCode::CREATED, Json(feedback)))
}

// Feedback areas of interest

pub async fn list_feedback_aois<S: Store>(
    State(ctx): State<AppState<S>>,
    ApiQuery(filter): ApiQuery<FeedbackAoiFilter>,
) -> Result<Json<Vec<FeedbackAoi>>, ApiError> {
    Ok(Json(ctx.store.list_feedback_aois(&filter).await?))
}

pub async fn get_feedback_aoi<S: Store>(
    State(ctx): State<AppState<S>>,
    RecordId(id): RecordId,
) -> Result<Json<FeedbackAoi>, ApiError> {
    ctx.store
        .get_feedback_aoi(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Feedback AOI", id))
}

pub async fn create_feedback_aoi<S: Store>(
    State(ctx): State<AppState<S>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Payload(new_aoi): Payload<NewFeedbackAoi>,
) -> Result<(StatusCode, Json<FeedbackAoi>), ApiError> {
    let create = new_aoi.into_create(user.osm_id)?;
    let aoi = ctx.store.create_feedback_aoi(create).await?;
    log::info!(
        "Feedback AOI {} on training {} by {}",
        aoi.id,
        aoi.training,
        user.username
    );
    Ok((StatusCode::CREATED, Json(aoi)))
}

// Feedback labels

pub async fn list_feedback_labels<S: Store>(
    State(ctx): State<AppState<S>>,
    ApiQuery(filter): ApiQuery<FeedbackLabelFilter>,
) -> Result<Json<Vec<FeedbackLabel>>, ApiError> {
    Ok(Json(ctx.store.list_feedback_labels(&filter).await?))
}

pub async fn get_feedback_label<S: Store>(
    State(ctx): State<AppState<S>>,
    RecordId(id): RecordId,
) -> Result<Json<FeedbackLabel>, ApiError> {
    ctx.store
        .get_feedback_label(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Feedback label", id))
}

pub async fn create_feedback_label<S: Store>(
    State(ctx): State<AppState<S>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Payload(new_label): Payload<NewFeedbackLabel>,
) -> Result<(StatusCode, Json<FeedbackLabel>), ApiError> {
    let create = new_label.into_create()?;
    let label = ctx.store.create_feedback_label(create).await?;
    log::info!(
        "Feedback label {} on AOI {} by {}",
        label.id,
        label.feedback_aoi,
        user.username
    );
    Ok((StatusCode::CREATED, Json(label)))
}
