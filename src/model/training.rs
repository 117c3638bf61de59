use crate::model::common::{required, validate_source_imagery, validate_zoom_level};
use crate::model::{FieldErrors, Id};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrainingStatus {
    Submitted,
    Running,
    Finished,
    Failed,
}

impl TrainingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingStatus::Submitted => "SUBMITTED",
            TrainingStatus::Running => "RUNNING",
            TrainingStatus::Finished => "FINISHED",
            TrainingStatus::Failed => "FAILED",
        }
    }

    /// Submitted and running trainings hold the model's training slot.
    pub fn is_active(&self) -> bool {
        matches!(self, TrainingStatus::Submitted | TrainingStatus::Running)
    }
}

impl FromStr for TrainingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUBMITTED" => Ok(TrainingStatus::Submitted),
            "RUNNING" => Ok(TrainingStatus::Running),
            "FINISHED" => Ok(TrainingStatus::Finished),
            "FAILED" => Ok(TrainingStatus::Failed),
            other => Err(format!("\"{}\" is not a valid training status", other)),
        }
    }
}

/// A training run of a model with its hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Training {
    pub id: Id,
    pub source_imagery: Option<String>,
    pub model: Id,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: TrainingStatus,
    pub zoom_level: Vec<i32>,
    pub created_by: Id,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub accuracy: Option<f64>,
    pub epochs: i32,
    pub batch_size: i32,
    pub freeze_layers: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NewTraining {
    pub model: Option<Id>,
    pub zoom_level: Option<Vec<i32>>,
    pub epochs: Option<i32>,
    pub batch_size: Option<i32>,
    pub source_imagery: Option<String>,
    pub description: Option<String>,
    pub freeze_layers: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTraining {
    pub model: Id,
    pub zoom_level: Vec<i32>,
    pub epochs: i32,
    pub batch_size: i32,
    pub source_imagery: Option<String>,
    pub description: Option<String>,
    pub freeze_layers: bool,
    pub created_by: Id,
}

fn positive(errors: &mut FieldErrors, field: &str, value: Option<i32>) -> i32 {
    match required(errors, field, value) {
        Some(value) if value > 0 => value,
        Some(_) => {
            errors.add(field, "Ensure this value is greater than or equal to 1.");
            0
        }
        None => 0,
    }
}

impl NewTraining {
    pub fn into_create(self, created_by: Id) -> Result<CreateTraining, FieldErrors> {
        let mut errors = FieldErrors::new();
        let model = required(&mut errors, "model", self.model);

        let zoom_level = match required(&mut errors, "zoom_level", self.zoom_level) {
            Some(levels) if levels.is_empty() => {
                errors.add("zoom_level", "At least one zoom level is required.");
                Vec::new()
            }
            Some(levels) => {
                for zoom in &levels {
                    validate_zoom_level(&mut errors, "zoom_level", *zoom);
                }
                levels.into_iter().sorted().dedup().collect()
            }
            None => Vec::new(),
        };

        let epochs = positive(&mut errors, "epochs", self.epochs);
        let batch_size = positive(&mut errors, "batch_size", self.batch_size);
        if let Some(source_imagery) = &self.source_imagery {
            validate_source_imagery(&mut errors, "source_imagery", source_imagery);
        }

        errors.finish(CreateTraining {
            model: model.unwrap_or_default(),
            zoom_level,
            epochs,
            batch_size,
            source_imagery: self.source_imagery,
            description: self.description,
            freeze_layers: self.freeze_layers.unwrap_or(false),
            created_by,
        })
    }
}

impl CreateTraining {
    pub fn into_training(self, id: Id) -> Training {
        Training {
            id,
            source_imagery: self.source_imagery,
            model: self.model,
            description: self.description,
            created_at: Utc::now(),
            status: TrainingStatus::Submitted,
            zoom_level: self.zoom_level,
            created_by: self.created_by,
            started_at: None,
            finished_at: None,
            accuracy: None,
            epochs: self.epochs,
            batch_size: self.batch_size,
            freeze_layers: self.freeze_layers,
        }
    }
}
