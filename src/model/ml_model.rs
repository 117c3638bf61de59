use crate::model::common::{required, validate_name};
use crate::model::{FieldErrors, Id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum ModelStatus {
    Published,
    Archived,
    #[default]
    Draft,
}

impl From<ModelStatus> for i16 {
    fn from(status: ModelStatus) -> Self {
        match status {
            ModelStatus::Published => 0,
            ModelStatus::Archived => 1,
            ModelStatus::Draft => -1,
        }
    }
}

impl TryFrom<i16> for ModelStatus {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ModelStatus::Published),
            1 => Ok(ModelStatus::Archived),
            -1 => Ok(ModelStatus::Draft),
            other => Err(format!("\"{}\" is not a valid model status", other)),
        }
    }
}

/// A model trained from one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: Id,
    pub dataset: Id,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub description: Option<String>,
    pub created_by: Id,
    pub published_training: Option<Id>,
    pub status: ModelStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NewModel {
    pub dataset: Option<Id>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ModelStatus>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateModel {
    pub dataset: Id,
    pub name: String,
    pub description: Option<String>,
    pub status: ModelStatus,
    pub created_by: Id,
}

impl NewModel {
    pub fn into_create(self, created_by: Id) -> Result<CreateModel, FieldErrors> {
        let mut errors = FieldErrors::new();
        let dataset = required(&mut errors, "dataset", self.dataset);
        let name = validate_name(&mut errors, "name", self.name);

        errors.finish(CreateModel {
            dataset: dataset.unwrap_or_default(),
            name,
            description: self.description,
            status: self.status.unwrap_or_default(),
            created_by,
        })
    }
}

impl CreateModel {
    pub fn into_model(self, id: Id) -> Model {
        let now = Utc::now();
        Model {
            id,
            dataset: self.dataset,
            name: self.name,
            created_at: now,
            last_modified: now,
            description: self.description,
            created_by: self.created_by,
            published_training: None,
            status: self.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_model_requires_dataset_and_name() {
        let errors = NewModel::default().into_create(1).unwrap_err();
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["dataset", "name"]);
    }

    #[test]
    fn test_into_model_starts_unpublished() {
        let new_model: NewModel =
            serde_json::from_value(json!({"dataset": 4, "name": "Model one", "status": 0}))
                .unwrap();
        let model = new_model.into_create(111).unwrap().into_model(9);
        assert_eq!(model.id, 9);
        assert_eq!(model.dataset, 4);
        assert_eq!(model.status, ModelStatus::Published);
        assert_eq!(model.published_training, None);
        assert_eq!(model.created_at, model.last_modified);
    }
}
