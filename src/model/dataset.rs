use crate::model::common::{validate_name, validate_source_imagery};
use crate::model::{FieldErrors, Id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum DatasetStatus {
    Active,
    Archived,
    #[default]
    Draft,
}

impl From<DatasetStatus> for i16 {
    fn from(status: DatasetStatus) -> Self {
        match status {
            DatasetStatus::Active => 0,
            DatasetStatus::Archived => 1,
            DatasetStatus::Draft => -1,
        }
    }
}

impl TryFrom<i16> for DatasetStatus {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DatasetStatus::Active),
            1 => Ok(DatasetStatus::Archived),
            -1 => Ok(DatasetStatus::Draft),
            other => Err(format!("\"{}\" is not a valid dataset status", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: Id,
    pub name: String,
    pub created_by: Id,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub source_imagery: Option<String>,
    pub status: DatasetStatus,
}

/// Request body for creating a dataset. The owner comes from the credential,
/// so a `user` field in the body is ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NewDataset {
    pub name: Option<String>,
    pub source_imagery: Option<String>,
    pub status: Option<DatasetStatus>,
}

/// Validated dataset ready to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct CreateDataset {
    pub name: String,
    pub source_imagery: Option<String>,
    pub status: DatasetStatus,
    pub created_by: Id,
}

impl NewDataset {
    pub fn into_create(self, created_by: Id) -> Result<CreateDataset, FieldErrors> {
        let mut errors = FieldErrors::new();
        let name = validate_name(&mut errors, "name", self.name);
        if let Some(source_imagery) = &self.source_imagery {
            validate_source_imagery(&mut errors, "source_imagery", source_imagery);
        }

        errors.finish(CreateDataset {
            name,
            source_imagery: self.source_imagery,
            status: self.status.unwrap_or_default(),
            created_by,
        })
    }
}

impl CreateDataset {
    pub fn into_dataset(self, id: Id) -> Dataset {
        let now = Utc::now();
        Dataset {
            id,
            name: self.name,
            created_by: self.created_by,
            created_at: now,
            last_modified: now,
            source_imagery: self.source_imagery,
            status: self.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_serializes_as_integer() {
        assert_eq!(serde_json::to_value(DatasetStatus::Active).unwrap(), json!(0));
        assert_eq!(serde_json::to_value(DatasetStatus::Draft).unwrap(), json!(-1));
        assert_eq!(
            serde_json::from_value::<DatasetStatus>(json!(1)).unwrap(),
            DatasetStatus::Archived
        );
        assert!(serde_json::from_value::<DatasetStatus>(json!(7)).is_err());
    }

    #[test]
    fn test_new_dataset_defaults_to_draft() {
        let new_dataset: NewDataset =
            serde_json::from_value(json!({"name": "Dataset two", "user": "111"})).unwrap();
        let create = new_dataset.into_create(111).unwrap();
        assert_eq!(create.name, "Dataset two");
        assert_eq!(create.status, DatasetStatus::Draft);
        assert_eq!(create.created_by, 111);
    }

    #[test]
    fn test_new_dataset_requires_name() {
        let errors = NewDataset::default().into_create(111).unwrap_err();
        assert_eq!(
            errors.get("name"),
            Some(&["This field is required.".to_string()][..])
        );
    }

    #[test]
    fn test_new_dataset_rejects_bad_imagery_url() {
        let new_dataset = NewDataset {
            name: Some("Dataset".to_string()),
            source_imagery: Some("not-a-url".to_string()),
            status: None,
        };
        let errors = new_dataset.into_create(1).unwrap_err();
        assert!(errors.get("source_imagery").is_some());
    }
}
