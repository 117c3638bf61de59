use crate::model::Id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user known to the directory, keyed by their OpenStreetMap id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsmUser {
    pub osm_id: Id,
    pub username: String,
    pub date_joined: DateTime<Utc>,
}

impl OsmUser {
    pub fn new(osm_id: Id, username: String) -> Self {
        Self {
            osm_id,
            username,
            date_joined: Utc::now(),
        }
    }
}

/// Identity resolved from an access token by a token validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsmIdentity {
    pub osm_id: Id,
    pub username: String,
}

impl OsmIdentity {
    pub fn new(osm_id: Id, username: impl Into<String>) -> Self {
        Self {
            osm_id,
            username: username.into(),
        }
    }

    /// Merge a fresh login into an existing record: the id never changes, the
    /// username follows the provider.
    pub fn apply_to(&self, existing: Option<OsmUser>) -> OsmUser {
        match existing {
            Some(mut user) => {
                user.username = self.username.clone();
                user
            }
            None => OsmUser::new(self.osm_id, self.username.clone()),
        }
    }
}
