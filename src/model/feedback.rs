use crate::model::common::{required, validate_source_imagery, validate_zoom_level};
use crate::model::{FieldErrors, Id, Polygon};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackType {
    #[serde(rename = "TP")]
    TruePositive,
    #[serde(rename = "TN")]
    TrueNegative,
    #[serde(rename = "FP")]
    FalsePositive,
    #[serde(rename = "FN")]
    FalseNegative,
}

impl FeedbackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::TruePositive => "TP",
            FeedbackType::TrueNegative => "TN",
            FeedbackType::FalsePositive => "FP",
            FeedbackType::FalseNegative => "FN",
        }
    }
}

impl FromStr for FeedbackType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TP" => Ok(FeedbackType::TruePositive),
            "TN" => Ok(FeedbackType::TrueNegative),
            "FP" => Ok(FeedbackType::FalsePositive),
            "FN" => Ok(FeedbackType::FalseNegative),
            other => Err(format!("\"{}\" is not a valid choice.", other)),
        }
    }
}

/// Whether the OSM labels inside an AOI have been fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum LabelStatus {
    #[default]
    NotDownloaded,
    Downloading,
    Downloaded,
}

impl From<LabelStatus> for i16 {
    fn from(status: LabelStatus) -> Self {
        match status {
            LabelStatus::NotDownloaded => -1,
            LabelStatus::Downloading => 1,
            LabelStatus::Downloaded => 0,
        }
    }
}

impl TryFrom<i16> for LabelStatus {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(LabelStatus::NotDownloaded),
            1 => Ok(LabelStatus::Downloading),
            0 => Ok(LabelStatus::Downloaded),
            other => Err(format!("\"{}\" is not a valid label status", other)),
        }
    }
}

/// A user's judgement on a prediction of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: Id,
    pub geom: Polygon,
    pub training: Id,
    pub zoom_level: i32,
    pub feedback_type: FeedbackType,
    pub comments: Option<String>,
    pub user: Id,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub source_imagery: String,
    pub validated: bool,
}

/// An area a user marked for re-labelling against a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackAoi {
    pub id: Id,
    pub training: Id,
    pub geom: Polygon,
    pub label_status: LabelStatus,
    pub label_fetched: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub user: Id,
    pub source_imagery: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackLabel {
    pub id: Id,
    pub osm_id: Option<i64>,
    pub feedback_aoi: Id,
    pub tags: serde_json::Value,
    pub geom: Polygon,
    pub created_at: DateTime<Utc>,
}

fn validate_geom(errors: &mut FieldErrors, value: Option<serde_json::Value>) -> Option<Polygon> {
    let value = required(errors, "geom", value)?;
    match Polygon::from_input(&value) {
        Ok(polygon) => Some(polygon),
        Err(e) => {
            errors.add("geom", e.to_string());
            None
        }
    }
}

fn required_imagery(errors: &mut FieldErrors, value: Option<String>) -> String {
    let Some(value) = required(errors, "source_imagery", value) else {
        return String::new();
    };
    validate_source_imagery(errors, "source_imagery", &value);
    value
}

/// Request body for a feedback entry. `geom` may be WKT or GeoJSON.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NewFeedback {
    pub training: Option<Id>,
    pub geom: Option<serde_json::Value>,
    pub zoom_level: Option<i32>,
    pub feedback_type: Option<String>,
    pub source_imagery: Option<String>,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateFeedback {
    pub training: Id,
    pub geom: Polygon,
    pub zoom_level: i32,
    pub feedback_type: FeedbackType,
    pub source_imagery: String,
    pub comments: Option<String>,
    pub user: Id,
}

impl NewFeedback {
    pub fn into_create(self, user: Id) -> Result<CreateFeedback, FieldErrors> {
        let mut errors = FieldErrors::new();
        let training = required(&mut errors, "training", self.training);
        let geom = validate_geom(&mut errors, self.geom);

        let zoom_level = required(&mut errors, "zoom_level", self.zoom_level);
        if let Some(zoom) = zoom_level {
            validate_zoom_level(&mut errors, "zoom_level", zoom);
        }

        let feedback_type = required(&mut errors, "feedback_type", self.feedback_type)
            .and_then(|raw| match raw.parse::<FeedbackType>() {
                Ok(feedback_type) => Some(feedback_type),
                Err(message) => {
                    errors.add("feedback_type", message);
                    None
                }
            });

        let source_imagery = required_imagery(&mut errors, self.source_imagery);

        match (training, geom, zoom_level, feedback_type) {
            (Some(training), Some(geom), Some(zoom_level), Some(feedback_type)) => {
                errors.finish(CreateFeedback {
                    training,
                    geom,
                    zoom_level,
                    feedback_type,
                    source_imagery,
                    comments: self.comments,
                    user,
                })
            }
            _ => Err(errors),
        }
    }
}

impl CreateFeedback {
    pub fn into_feedback(self, id: Id) -> Feedback {
        let now = Utc::now();
        Feedback {
            id,
            geom: self.geom,
            training: self.training,
            zoom_level: self.zoom_level,
            feedback_type: self.feedback_type,
            comments: self.comments,
            user: self.user,
            created_at: now,
            last_modified: now,
            source_imagery: self.source_imagery,
            validated: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NewFeedbackAoi {
    pub training: Option<Id>,
    pub geom: Option<serde_json::Value>,
    pub source_imagery: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateFeedbackAoi {
    pub training: Id,
    pub geom: Polygon,
    pub source_imagery: String,
    pub user: Id,
}

impl NewFeedbackAoi {
    pub fn into_create(self, user: Id) -> Result<CreateFeedbackAoi, FieldErrors> {
        let mut errors = FieldErrors::new();
        let training = required(&mut errors, "training", self.training);
        let geom = validate_geom(&mut errors, self.geom);
        let source_imagery = required_imagery(&mut errors, self.source_imagery);

        match (training, geom) {
            (Some(training), Some(geom)) => errors.finish(CreateFeedbackAoi {
                training,
                geom,
                source_imagery,
                user,
            }),
            _ => Err(errors),
        }
    }
}

impl CreateFeedbackAoi {
    pub fn into_feedback_aoi(self, id: Id) -> FeedbackAoi {
        let now = Utc::now();
        FeedbackAoi {
            id,
            training: self.training,
            geom: self.geom,
            label_status: LabelStatus::NotDownloaded,
            label_fetched: None,
            created_at: now,
            last_modified: now,
            user: self.user,
            source_imagery: self.source_imagery,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NewFeedbackLabel {
    pub feedback_aoi: Option<Id>,
    pub geom: Option<serde_json::Value>,
    pub osm_id: Option<i64>,
    pub tags: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateFeedbackLabel {
    pub feedback_aoi: Id,
    pub geom: Polygon,
    pub osm_id: Option<i64>,
    pub tags: serde_json::Value,
}

impl NewFeedbackLabel {
    pub fn into_create(self) -> Result<CreateFeedbackLabel, FieldErrors> {
        let mut errors = FieldErrors::new();
        let feedback_aoi = required(&mut errors, "feedback_aoi", self.feedback_aoi);
        let geom = validate_geom(&mut errors, self.geom);

        let tags = match self.tags {
            None | Some(serde_json::Value::Null) => serde_json::json!({}),
            Some(tags @ serde_json::Value::Object(_)) => tags,
            Some(_) => {
                errors.add("tags", "Expected a JSON object.");
                serde_json::Value::Null
            }
        };

        match (feedback_aoi, geom) {
            (Some(feedback_aoi), Some(geom)) => errors.finish(CreateFeedbackLabel {
                feedback_aoi,
                geom,
                osm_id: self.osm_id,
                tags,
            }),
            _ => Err(errors),
        }
    }
}

impl CreateFeedbackLabel {
    pub fn into_feedback_label(self, id: Id) -> FeedbackLabel {
        FeedbackLabel {
            id,
            osm_id: self.osm_id,
            feedback_aoi: self.feedback_aoi,
            tags: self.tags,
            geom: self.geom,
            created_at: Utc::now(),
        }
    }
}
