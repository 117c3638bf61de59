use crate::model::{
    Dataset, DatasetStatus, Feedback, FeedbackAoi, FeedbackLabel, Model, ModelStatus,
    NewDataset, NewFeedback, NewFeedbackAoi, NewFeedbackLabel, NewModel, NewTraining,
    OsmIdentity, OsmUser, Training,
};
use crate::store::Store;
use anyhow::Result;
use serde_json::json;

pub const SEED_OSM_ID: i64 = 111;
pub const SEED_USERNAME: &str = "UserOne";

const SEED_IMAGERY: &str = "https://tiles.openaerialmap.org/seed/{z}/{x}/{y}";
const SEED_AREA: &str =
    "POLYGON((85.3169 27.7055, 85.3169 27.7105, 85.3219 27.7105, 85.3219 27.7055, 85.3169 27.7055))";

/// Everything `load_seed_data` created, one record of each kind
#[derive(Debug, Clone)]
pub struct SeedData {
    pub user: OsmUser,
    pub dataset: Dataset,
    pub model: Model,
    pub training: Training,
    pub feedback_aoi: FeedbackAoi,
    pub feedback_label: FeedbackLabel,
    pub feedback: Feedback,
}

/// Load a small fixture hierarchy through the regular create paths, so it is
/// validated exactly like API input.
pub async fn load_seed_data<S: Store>(store: &S) -> Result<SeedData> {
    let user = store
        .upsert_user(&OsmIdentity::new(SEED_OSM_ID, SEED_USERNAME))
        .await?;

    let dataset = store
        .create_dataset(
            NewDataset {
                name: Some("Dataset one".to_string()),
                source_imagery: Some(SEED_IMAGERY.to_string()),
                status: Some(DatasetStatus::Active),
            }
            .into_create(user.osm_id)?,
        )
        .await?;

    let model = store
        .create_model(
            NewModel {
                dataset: Some(dataset.id),
                name: Some("Model one".to_string()),
                description: Some("Building footprints".to_string()),
                status: Some(ModelStatus::Draft),
            }
            .into_create(user.osm_id)?,
        )
        .await?;

    let training = store
        .create_training(
            NewTraining {
                model: Some(model.id),
                zoom_level: Some(vec![19, 20, 21, 22]),
                epochs: Some(10),
                batch_size: Some(32),
                source_imagery: Some(SEED_IMAGERY.to_string()),
                description: Some("Initial run".to_string()),
                freeze_layers: Some(false),
            }
            .into_create(user.osm_id)?,
        )
        .await?;

    let feedback_aoi = store
        .create_feedback_aoi(
            NewFeedbackAoi {
                training: Some(training.id),
                geom: Some(json!(SEED_AREA)),
                source_imagery: Some(SEED_IMAGERY.to_string()),
            }
            .into_create(user.osm_id)?,
        )
        .await?;

    let feedback_label = store
        .create_feedback_label(
            NewFeedbackLabel {
                feedback_aoi: Some(feedback_aoi.id),
                geom: Some(json!(SEED_AREA)),
                osm_id: Some(1_234_567),
                tags: Some(json!({"building": "yes"})),
            }
            .into_create()?,
        )
        .await?;

    let feedback = store
        .create_feedback(
            NewFeedback {
                training: Some(training.id),
                geom: Some(json!(SEED_AREA)),
                zoom_level: Some(20),
                feedback_type: Some("TP".to_string()),
                source_imagery: Some(SEED_IMAGERY.to_string()),
                comments: None,
            }
            .into_create(user.osm_id)?,
        )
        .await?;

    Ok(SeedData {
        user,
        dataset,
        model,
        training,
        feedback_aoi,
        feedback_label,
        feedback,
    })
}
