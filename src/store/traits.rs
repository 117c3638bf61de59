use crate::model::{
    CreateDataset, CreateFeedback, CreateFeedbackAoi, CreateFeedbackLabel, CreateModel,
    CreateTraining, Dataset, DatasetFilter, Feedback, FeedbackAoi, FeedbackAoiFilter,
    FeedbackFilter, FeedbackLabel, FeedbackLabelFilter, Id, Model, ModelFilter, OsmIdentity,
    OsmUser, Training, TrainingFilter,
};
use anyhow::Result;

/// Errors from create operations. Nothing is persisted when one is returned.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} {id} does not exist")]
    MissingReference {
        field: &'static str,
        entity: &'static str,
        id: Id,
    },
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, osm_id: Id) -> Result<Option<OsmUser>>;
    /// Create the user on first login, refresh the username afterwards
    async fn upsert_user(&self, identity: &OsmIdentity) -> Result<OsmUser>;
}

#[async_trait::async_trait]
pub trait DatasetStore: Send + Sync {
    async fn get_dataset(&self, id: Id) -> Result<Option<Dataset>>;
    async fn list_datasets(&self, filter: &DatasetFilter) -> Result<Vec<Dataset>>;
    async fn create_dataset(&self, dataset: CreateDataset) -> StoreResult<Dataset>;
}

#[async_trait::async_trait]
pub trait ModelStore: Send + Sync {
    async fn get_model(&self, id: Id) -> Result<Option<Model>>;
    async fn list_models(&self, filter: &ModelFilter) -> Result<Vec<Model>>;
    /// Fails with `MissingReference` when the dataset does not exist
    async fn create_model(&self, model: CreateModel) -> StoreResult<Model>;
}

#[async_trait::async_trait]
pub trait TrainingStore: Send + Sync {
    async fn get_training(&self, id: Id) -> Result<Option<Training>>;
    async fn list_trainings(&self, filter: &TrainingFilter) -> Result<Vec<Training>>;
    /// Fails with `MissingReference` for an unknown model and `Conflict` when the
    /// model already has a submitted or running training
    async fn create_training(&self, training: CreateTraining) -> StoreResult<Training>;
}

#[async_trait::async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn get_feedback(&self, id: Id) -> Result<Option<Feedback>>;
    async fn list_feedback(&self, filter: &FeedbackFilter) -> Result<Vec<Feedback>>;
    async fn create_feedback(&self, feedback: CreateFeedback) -> StoreResult<Feedback>;

    async fn get_feedback_aoi(&self, id: Id) -> Result<Option<FeedbackAoi>>;
    async fn list_feedback_aois(&self, filter: &FeedbackAoiFilter) -> Result<Vec<FeedbackAoi>>;
    async fn create_feedback_aoi(&self, aoi: CreateFeedbackAoi) -> StoreResult<FeedbackAoi>;

    async fn get_feedback_label(&self, id: Id) -> Result<Option<FeedbackLabel>>;
    async fn list_feedback_labels(
        &self,
        filter: &FeedbackLabelFilter,
    ) -> Result<Vec<FeedbackLabel>>;
    async fn create_feedback_label(
        &self,
        label: CreateFeedbackLabel,
    ) -> StoreResult<FeedbackLabel>;
}

/// Everything the API needs. List results are ordered by id ascending.
pub trait Store: UserStore + DatasetStore + ModelStore + TrainingStore + FeedbackStore + Send + Sync {}
impl<T: UserStore + DatasetStore + ModelStore + TrainingStore + FeedbackStore + Send + Sync> Store
    for T
{
}
