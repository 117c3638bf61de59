use crate::model::{
    CreateDataset, CreateFeedback, CreateFeedbackAoi, CreateFeedbackLabel, CreateModel,
    CreateTraining, Dataset, DatasetFilter, Feedback, FeedbackAoi, FeedbackAoiFilter,
    FeedbackFilter, FeedbackLabel, FeedbackLabelFilter, Id, Model, ModelFilter, OsmIdentity,
    OsmUser, Training, TrainingFilter,
};
use crate::store::traits::{
    DatasetStore, FeedbackStore, ModelStore, StoreError, StoreResult, TrainingStore, UserStore,
};
use anyhow::Result;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

pub(crate) const ACTIVE_TRAINING_CONFLICT: &str =
    "Another training is already submitted or running for this model.";

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<Id, OsmUser>,
    datasets: BTreeMap<Id, Dataset>,
    models: BTreeMap<Id, Model>,
    trainings: BTreeMap<Id, Training>,
    feedback: BTreeMap<Id, Feedback>,
    feedback_aois: BTreeMap<Id, FeedbackAoi>,
    feedback_labels: BTreeMap<Id, FeedbackLabel>,
}

/// Records are never deleted, so the next id is one past the largest.
fn next_id<T>(table: &BTreeMap<Id, T>) -> Id {
    table.keys().next_back().map_or(1, |id| id + 1)
}

fn ensure_exists<T>(
    table: &BTreeMap<Id, T>,
    field: &'static str,
    entity: &'static str,
    id: Id,
) -> StoreResult<()> {
    if table.contains_key(&id) {
        Ok(())
    } else {
        Err(StoreError::MissingReference { field, entity, id })
    }
}

/// In-process store for tests and local runs. Each create checks references and
/// inserts under a single write lock.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl UserStore for MemoryStore {
    async fn get_user(&self, osm_id: Id) -> Result<Option<OsmUser>> {
        Ok(self.tables.read().users.get(&osm_id).cloned())
    }

    async fn upsert_user(&self, identity: &OsmIdentity) -> Result<OsmUser> {
        let mut tables = self.tables.write();
        let user = identity.apply_to(tables.users.remove(&identity.osm_id));
        tables.users.insert(user.osm_id, user.clone());
        Ok(user)
    }
}

#[async_trait::async_trait]
impl DatasetStore for MemoryStore {
    async fn get_dataset(&self, id: Id) -> Result<Option<Dataset>> {
        Ok(self.tables.read().datasets.get(&id).cloned())
    }

    async fn list_datasets(&self, filter: &DatasetFilter) -> Result<Vec<Dataset>> {
        Ok(self
            .tables
            .read()
            .datasets
            .values()
            .filter(|dataset| filter.matches(dataset))
            .cloned()
            .collect())
    }

    async fn create_dataset(&self, dataset: CreateDataset) -> StoreResult<Dataset> {
        let mut tables = self.tables.write();
        let dataset = dataset.into_dataset(next_id(&tables.datasets));
        tables.datasets.insert(dataset.id, dataset.clone());
        Ok(dataset)
    }
}

#[async_trait::async_trait]
impl ModelStore for MemoryStore {
    async fn get_model(&self, id: Id) -> Result<Option<Model>> {
        Ok(self.tables.read().models.get(&id).cloned())
    }

    async fn list_models(&self, filter: &ModelFilter) -> Result<Vec<Model>> {
        Ok(self
            .tables
            .read()
            .models
            .values()
            .filter(|model| filter.matches(model))
            .cloned()
            .collect())
    }

    async fn create_model(&self, model: CreateModel) -> StoreResult<Model> {
        let mut tables = self.tables.write();
        ensure_exists(&tables.datasets, "dataset", "Dataset", model.dataset)?;
        let model = model.into_model(next_id(&tables.models));
        tables.models.insert(model.id, model.clone());
        Ok(model)
    }
}

#[async_trait::async_trait]
impl TrainingStore for MemoryStore {
    async fn get_training(&self, id: Id) -> Result<Option<Training>> {
        Ok(self.tables.read().trainings.get(&id).cloned())
    }

    async fn list_trainings(&self, filter: &TrainingFilter) -> Result<Vec<Training>> {
        Ok(self
            .tables
            .read()
            .trainings
            .values()
            .filter(|training| filter.matches(training))
            .cloned()
            .collect())
    }

    async fn create_training(&self, training: CreateTraining) -> StoreResult<Training> {
        let mut tables = self.tables.write();
        ensure_exists(&tables.models, "model", "Model", training.model)?;
        if tables
            .trainings
            .values()
            .any(|existing| existing.model == training.model && existing.status.is_active())
        {
            return Err(StoreError::Conflict(ACTIVE_TRAINING_CONFLICT.to_string()));
        }
        let training = training.into_training(next_id(&tables.trainings));
        tables.trainings.insert(training.id, training.clone());
        Ok(training)
    }
}

#[async_trait::async_trait]
impl FeedbackStore for MemoryStore {
    async fn get_feedback(&self, id: Id) -> Result<Option<Feedback>> {
        Ok(self.tables.read().feedback.get(&id).cloned())
    }

    async fn list_feedback(&self, filter: &FeedbackFilter) -> Result<Vec<Feedback>> {
        Ok(self
            .tables
            .read()
            .feedback
            .values()
            .filter(|feedback| filter.matches(feedback))
            .cloned()
            .collect())
    }

    async fn create_feedback(&self, feedback: CreateFeedback) -> StoreResult<Feedback> {
        let mut tables = self.tables.write();
        ensure_exists(&tables.trainings, "training", "Training", feedback.training)?;
        let feedback = feedback.into_feedback(next_id(&tables.feedback));
        tables.feedback.insert(feedback.id, feedback.clone());
        Ok(feedback)
    }

    async fn get_feedback_aoi(&self, id: Id) -> Result<Option<FeedbackAoi>> {
        Ok(self.tables.read().feedback_aois.get(&id).cloned())
    }

    async fn list_feedback_aois(&self, filter: &FeedbackAoiFilter) -> Result<Vec<FeedbackAoi>> {
        Ok(self
            .tables
            .read()
            .feedback_aois
            .values()
            .filter(|aoi| filter.matches(aoi))
            .cloned()
            .collect())
    }

    async fn create_feedback_aoi(&self, aoi: CreateFeedbackAoi) -> StoreResult<FeedbackAoi> {
        let mut tables = self.tables.write();
        ensure_exists(&tables.trainings, "training", "Training", aoi.training)?;
        let aoi = aoi.into_feedback_aoi(next_id(&tables.feedback_aois));
        tables.feedback_aois.insert(aoi.id, aoi.clone());
        Ok(aoi)
    }

    async fn get_feedback_label(&self, id: Id) -> Result<Option<FeedbackLabel>> {
        Ok(self.tables.read().feedback_labels.get(&id).cloned())
    }

    async fn list_feedback_labels(
        &self,
        filter: &FeedbackLabelFilter,
    ) -> Result<Vec<FeedbackLabel>> {
        let tables = self.tables.read();
        Ok(tables
            .feedback_labels
            .values()
            .filter(|label| {
                let aoi_training = tables
                    .feedback_aois
                    .get(&label.feedback_aoi)
                    .map(|aoi| aoi.training);
                filter.matches(label, aoi_training)
            })
            .cloned()
            .collect())
    }

    async fn create_feedback_label(
        &self,
        label: CreateFeedbackLabel,
    ) -> StoreResult<FeedbackLabel> {
        let mut tables = self.tables.write();
        ensure_exists(
            &tables.feedback_aois,
            "feedback_aoi",
            "FeedbackAOI",
            label.feedback_aoi,
        )?;
        let label = label.into_feedback_label(next_id(&tables.feedback_labels));
        tables.feedback_labels.insert(label.id, label.clone());
        Ok(label)
    }
}
