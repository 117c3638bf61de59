use crate::model::{
    Dataset, DatasetStatus, Feedback, FeedbackAoi, FeedbackLabel, FeedbackType, Id, Model,
    ModelStatus, Training, TrainingStatus,
};
use serde::Deserialize;

// List filters, deserialized from the query string. An absent field matches everything.

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DatasetFilter {
    pub status: Option<DatasetStatus>,
    pub created_by: Option<Id>,
}

impl DatasetFilter {
    pub fn matches(&self, dataset: &Dataset) -> bool {
        self.status.map_or(true, |s| dataset.status == s)
            && self.created_by.map_or(true, |u| dataset.created_by == u)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ModelFilter {
    pub dataset: Option<Id>,
    pub status: Option<ModelStatus>,
    pub created_by: Option<Id>,
}

impl ModelFilter {
    pub fn matches(&self, model: &Model) -> bool {
        self.dataset.map_or(true, |d| model.dataset == d)
            && self.status.map_or(true, |s| model.status == s)
            && self.created_by.map_or(true, |u| model.created_by == u)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TrainingFilter {
    pub model: Option<Id>,
    pub status: Option<TrainingStatus>,
    pub created_by: Option<Id>,
}

impl TrainingFilter {
    pub fn matches(&self, training: &Training) -> bool {
        self.model.map_or(true, |m| training.model == m)
            && self.status.map_or(true, |s| training.status == s)
            && self.created_by.map_or(true, |u| training.created_by == u)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FeedbackFilter {
    pub training: Option<Id>,
    pub user: Option<Id>,
    pub feedback_type: Option<FeedbackType>,
}

impl FeedbackFilter {
    pub fn matches(&self, feedback: &Feedback) -> bool {
        self.training.map_or(true, |t| feedback.training == t)
            && self.user.map_or(true, |u| feedback.user == u)
            && self.feedback_type.map_or(true, |f| feedback.feedback_type == f)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FeedbackAoiFilter {
    pub training: Option<Id>,
    pub user: Option<Id>,
}

impl FeedbackAoiFilter {
    pub fn matches(&self, aoi: &FeedbackAoi) -> bool {
        self.training.map_or(true, |t| aoi.training == t)
            && self.user.map_or(true, |u| aoi.user == u)
    }
}

/// `training` is matched through the label's AOI.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FeedbackLabelFilter {
    pub feedback_aoi: Option<Id>,
    pub training: Option<Id>,
}

impl FeedbackLabelFilter {
    pub fn matches(&self, label: &FeedbackLabel, aoi_training: Option<Id>) -> bool {
        self.feedback_aoi.map_or(true, |a| label.feedback_aoi == a)
            && self.training.map_or(true, |t| aoi_training == Some(t))
    }
}
