use anyhow::{Context, Result};
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    PgPool, Postgres, Row, Transaction,
};

use crate::model::{
    CreateDataset, CreateFeedback, CreateFeedbackAoi, CreateFeedbackLabel, CreateModel,
    CreateTraining, Dataset, DatasetFilter, DatasetStatus, Feedback, FeedbackAoi,
    FeedbackAoiFilter, FeedbackFilter, FeedbackLabel, FeedbackLabelFilter, FeedbackType, Id,
    LabelStatus, Model, ModelFilter, ModelStatus, OsmIdentity, OsmUser, Polygon, Training,
    TrainingFilter, TrainingStatus,
};
use crate::store::memory::ACTIVE_TRAINING_CONFLICT;
use crate::store::traits::{
    DatasetStore, FeedbackStore, ModelStore, StoreError, StoreResult, TrainingStore, UserStore,
};

const DATASET_COLUMNS: &str =
    "id, name, created_by, created_at, last_modified, source_imagery, status";
const MODEL_COLUMNS: &str = "id, dataset, name, created_at, last_modified, description, \
     created_by, published_training, status";
const TRAINING_COLUMNS: &str = "id, source_imagery, model, description, created_at, status, \
     zoom_level, created_by, started_at, finished_at, accuracy, epochs, batch_size, freeze_layers";
const FEEDBACK_COLUMNS: &str = "id, geom, training, zoom_level, feedback_type, comments, \
     user_id, created_at, last_modified, source_imagery, validated";
const FEEDBACK_AOI_COLUMNS: &str = "id, training, geom, label_status, label_fetched, \
     created_at, last_modified, user_id, source_imagery";
const FEEDBACK_LABEL_COLUMNS: &str = "id, osm_id, feedback_aoi, tags, geom, created_at";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Run the embedded migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .context("Failed to begin transaction")
    }
}

/// Lock the referenced row for the rest of the transaction, or report it missing.
async fn lock_reference(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    lock: &str,
    field: &'static str,
    entity: &'static str,
    id: Id,
) -> StoreResult<()> {
    let sql = format!("SELECT id FROM {} WHERE id = $1 {}", table, lock);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .with_context(|| format!("Failed to look up {} {}", entity, id))?;

    match row {
        Some(_) => Ok(()),
        None => Err(StoreError::MissingReference { field, entity, id }),
    }
}

fn read_geom(row: &PgRow) -> Result<Polygon> {
    let wkt: String = row.try_get("geom")?;
    Polygon::from_wkt(&wkt).with_context(|| format!("Stored geometry is invalid: {}", wkt))
}

fn dataset_from_row(row: &PgRow) -> Result<Dataset> {
    Ok(Dataset {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        last_modified: row.try_get("last_modified")?,
        source_imagery: row.try_get("source_imagery")?,
        status: DatasetStatus::try_from(row.try_get::<i16, _>("status")?)
            .map_err(anyhow::Error::msg)?,
    })
}

fn model_from_row(row: &PgRow) -> Result<Model> {
    Ok(Model {
        id: row.try_get("id")?,
        dataset: row.try_get("dataset")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
        last_modified: row.try_get("last_modified")?,
        description: row.try_get("description")?,
        created_by: row.try_get("created_by")?,
        published_training: row.try_get("published_training")?,
        status: ModelStatus::try_from(row.try_get::<i16, _>("status")?)
            .map_err(anyhow::Error::msg)?,
    })
}

fn training_from_row(row: &PgRow) -> Result<Training> {
    Ok(Training {
        id: row.try_get("id")?,
        source_imagery: row.try_get("source_imagery")?,
        model: row.try_get("model")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        status: row
            .try_get::<String, _>("status")?
            .parse::<TrainingStatus>()
            .map_err(anyhow::Error::msg)?,
        zoom_level: row.try_get("zoom_level")?,
        created_by: row.try_get("created_by")?,
        started_at: row.try_get("started_at")?,
        finished_at: row.try_get("finished_at")?,
        accuracy: row.try_get("accuracy")?,
        epochs: row.try_get("epochs")?,
        batch_size: row.try_get("batch_size")?,
        freeze_layers: row.try_get("freeze_layers")?,
    })
}

fn feedback_from_row(row: &PgRow) -> Result<Feedback> {
    Ok(Feedback {
        id: row.try_get("id")?,
        geom: read_geom(row)?,
        training: row.try_get("training")?,
        zoom_level: row.try_get("zoom_level")?,
        feedback_type: row
            .try_get::<String, _>("feedback_type")?
            .parse::<FeedbackType>()
            .map_err(anyhow::Error::msg)?,
        comments: row.try_get("comments")?,
        user: row.try_get("user_id")?,
        created_at: row.try_get("created_at")?,
        last_modified: row.try_get("last_modified")?,
        source_imagery: row.try_get("source_imagery")?,
        validated: row.try_get("validated")?,
    })
}

fn feedback_aoi_from_row(row: &PgRow) -> Result<FeedbackAoi> {
    Ok(FeedbackAoi {
        id: row.try_get("id")?,
        training: row.try_get("training")?,
        geom: read_geom(row)?,
        label_status: LabelStatus::try_from(row.try_get::<i16, _>("label_status")?)
            .map_err(anyhow::Error::msg)?,
        label_fetched: row.try_get("label_fetched")?,
        created_at: row.try_get("created_at")?,
        last_modified: row.try_get("last_modified")?,
        user: row.try_get("user_id")?,
        source_imagery: row.try_get("source_imagery")?,
    })
}

fn feedback_label_from_row(row: &PgRow) -> Result<FeedbackLabel> {
    Ok(FeedbackLabel {
        id: row.try_get("id")?,
        osm_id: row.try_get("osm_id")?,
        feedback_aoi: row.try_get("feedback_aoi")?,
        tags: row.try_get("tags")?,
        geom: read_geom(row)?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait::async_trait]
impl UserStore for PostgresStore {
    async fn get_user(&self, osm_id: Id) -> Result<Option<OsmUser>> {
        let row = sqlx::query("SELECT osm_id, username, date_joined FROM users WHERE osm_id = $1")
            .bind(osm_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user")?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(OsmUser {
            osm_id: row.try_get("osm_id")?,
            username: row.try_get("username")?,
            date_joined: row.try_get("date_joined")?,
        }))
    }

    async fn upsert_user(&self, identity: &OsmIdentity) -> Result<OsmUser> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (osm_id, username)
            VALUES ($1, $2)
            ON CONFLICT (osm_id) DO UPDATE SET username = EXCLUDED.username
            RETURNING osm_id, username, date_joined
            "#,
        )
        .bind(identity.osm_id)
        .bind(&identity.username)
        .fetch_one(&self.pool)
        .await
        .context("Failed to upsert user")?;

        Ok(OsmUser {
            osm_id: row.try_get("osm_id")?,
            username: row.try_get("username")?,
            date_joined: row.try_get("date_joined")?,
        })
    }
}

#[async_trait::async_trait]
impl DatasetStore for PostgresStore {
    async fn get_dataset(&self, id: Id) -> Result<Option<Dataset>> {
        let sql = format!("SELECT {} FROM datasets WHERE id = $1", DATASET_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch dataset")?;

        row.as_ref().map(dataset_from_row).transpose()
    }

    async fn list_datasets(&self, filter: &DatasetFilter) -> Result<Vec<Dataset>> {
        let sql = format!(
            "SELECT {} FROM datasets \
             WHERE ($1::smallint IS NULL OR status = $1) \
               AND ($2::bigint IS NULL OR created_by = $2) \
             ORDER BY id",
            DATASET_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(filter.status.map(i16::from))
            .bind(filter.created_by)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list datasets")?;

        rows.iter().map(dataset_from_row).collect()
    }

    async fn create_dataset(&self, dataset: CreateDataset) -> StoreResult<Dataset> {
        let sql = format!(
            "INSERT INTO datasets (name, created_by, source_imagery, status) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            DATASET_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(&dataset.name)
            .bind(dataset.created_by)
            .bind(&dataset.source_imagery)
            .bind(i16::from(dataset.status))
            .fetch_one(&self.pool)
            .await
            .context("Failed to insert dataset")?;

        Ok(dataset_from_row(&row)?)
    }
}

#[async_trait::async_trait]
impl ModelStore for PostgresStore {
    async fn get_model(&self, id: Id) -> Result<Option<Model>> {
        let sql = format!("SELECT {} FROM models WHERE id = $1", MODEL_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch model")?;

        row.as_ref().map(model_from_row).transpose()
    }

    async fn list_models(&self, filter: &ModelFilter) -> Result<Vec<Model>> {
        let sql = format!(
            "SELECT {} FROM models \
             WHERE ($1::bigint IS NULL OR dataset = $1) \
               AND ($2::smallint IS NULL OR status = $2) \
               AND ($3::bigint IS NULL OR created_by = $3) \
             ORDER BY id",
            MODEL_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(filter.dataset)
            .bind(filter.status.map(i16::from))
            .bind(filter.created_by)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list models")?;

        rows.iter().map(model_from_row).collect()
    }

    async fn create_model(&self, model: CreateModel) -> StoreResult<Model> {
        let mut tx = self.begin().await?;
        lock_reference(&mut tx, "datasets", "FOR SHARE", "dataset", "Dataset", model.dataset)
            .await?;

        let sql = format!(
            "INSERT INTO models (dataset, name, description, created_by, status) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            MODEL_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(model.dataset)
            .bind(&model.name)
            .bind(&model.description)
            .bind(model.created_by)
            .bind(i16::from(model.status))
            .fetch_one(&mut *tx)
            .await
            .context("Failed to insert model")?;
        let model = model_from_row(&row)?;

        tx.commit().await.context("Failed to commit model")?;
        Ok(model)
    }
}

#[async_trait::async_trait]
impl TrainingStore for PostgresStore {
    async fn get_training(&self, id: Id) -> Result<Option<Training>> {
        let sql = format!("SELECT {} FROM trainings WHERE id = $1", TRAINING_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch training")?;

        row.as_ref().map(training_from_row).transpose()
    }

    async fn list_trainings(&self, filter: &TrainingFilter) -> Result<Vec<Training>> {
        let sql = format!(
            "SELECT {} FROM trainings \
             WHERE ($1::bigint IS NULL OR model = $1) \
               AND ($2::text IS NULL OR status = $2) \
               AND ($3::bigint IS NULL OR created_by = $3) \
             ORDER BY id",
            TRAINING_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(filter.model)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.created_by)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list trainings")?;

        rows.iter().map(training_from_row).collect()
    }

    async fn create_training(&self, training: CreateTraining) -> StoreResult<Training> {
        let mut tx = self.begin().await?;
        // FOR UPDATE serializes concurrent submissions for the same model.
        lock_reference(&mut tx, "models", "FOR UPDATE", "model", "Model", training.model).await?;

        let active: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM trainings \
             WHERE model = $1 AND status IN ('SUBMITTED', 'RUNNING'))",
        )
        .bind(training.model)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to check active trainings")?;
        if active {
            return Err(StoreError::Conflict(ACTIVE_TRAINING_CONFLICT.to_string()));
        }

        let sql = format!(
            "INSERT INTO trainings \
             (source_imagery, model, description, status, zoom_level, created_by, \
              epochs, batch_size, freeze_layers) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
            TRAINING_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(&training.source_imagery)
            .bind(training.model)
            .bind(&training.description)
            .bind(TrainingStatus::Submitted.as_str())
            .bind(&training.zoom_level)
            .bind(training.created_by)
            .bind(training.epochs)
            .bind(training.batch_size)
            .bind(training.freeze_layers)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to insert training")?;
        let training = training_from_row(&row)?;

        tx.commit().await.context("Failed to commit training")?;
        Ok(training)
    }
}

#[async_trait::async_trait]
impl FeedbackStore for PostgresStore {
    async fn get_feedback(&self, id: Id) -> Result<Option<Feedback>> {
        let sql = format!("SELECT {} FROM feedback WHERE id = $1", FEEDBACK_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch feedback")?;

        row.as_ref().map(feedback_from_row).transpose()
    }

    async fn list_feedback(&self, filter: &FeedbackFilter) -> Result<Vec<Feedback>> {
        let sql = format!(
            "SELECT {} FROM feedback \
             WHERE ($1::bigint IS NULL OR training = $1) \
               AND ($2::bigint IS NULL OR user_id = $2) \
               AND ($3::text IS NULL OR feedback_type = $3) \
             ORDER BY id",
            FEEDBACK_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(filter.training)
            .bind(filter.user)
            .bind(filter.feedback_type.map(|f| f.as_str()))
            .fetch_all(&self.pool)
            .await
            .context("Failed to list feedback")?;

        rows.iter().map(feedback_from_row).collect()
    }

    async fn create_feedback(&self, feedback: CreateFeedback) -> StoreResult<Feedback> {
        let mut tx = self.begin().await?;
        lock_reference(
            &mut tx,
            "trainings",
            "FOR SHARE",
            "training",
            "Training",
            feedback.training,
        )
        .await?;

        let sql = format!(
            "INSERT INTO feedback \
             (geom, training, zoom_level, feedback_type, comments, user_id, source_imagery) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            FEEDBACK_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(feedback.geom.to_wkt())
            .bind(feedback.training)
            .bind(feedback.zoom_level)
            .bind(feedback.feedback_type.as_str())
            .bind(&feedback.comments)
            .bind(feedback.user)
            .bind(&feedback.source_imagery)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to insert feedback")?;
        let feedback = feedback_from_row(&row)?;

        tx.commit().await.context("Failed to commit feedback")?;
        Ok(feedback)
    }

    async fn get_feedback_aoi(&self, id: Id) -> Result<Option<FeedbackAoi>> {
        let sql = format!(
            "SELECT {} FROM feedback_aois WHERE id = $1",
            FEEDBACK_AOI_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch feedback AOI")?;

        row.as_ref().map(feedback_aoi_from_row).transpose()
    }

    async fn list_feedback_aois(&self, filter: &FeedbackAoiFilter) -> Result<Vec<FeedbackAoi>> {
        let sql = format!(
            "SELECT {} FROM feedback_aois \
             WHERE ($1::bigint IS NULL OR training = $1) \
               AND ($2::bigint IS NULL OR user_id = $2) \
             ORDER BY id",
            FEEDBACK_AOI_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(filter.training)
            .bind(filter.user)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list feedback AOIs")?;

        rows.iter().map(feedback_aoi_from_row).collect()
    }

    async fn create_feedback_aoi(&self, aoi: CreateFeedbackAoi) -> StoreResult<FeedbackAoi> {
        let mut tx = self.begin().await?;
        lock_reference(
            &mut tx,
            "trainings",
            "FOR SHARE",
            "training",
            "Training",
            aoi.training,
        )
        .await?;

        let sql = format!(
            "INSERT INTO feedback_aois (training, geom, label_status, user_id, source_imagery) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            FEEDBACK_AOI_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(aoi.training)
            .bind(aoi.geom.to_wkt())
            .bind(i16::from(LabelStatus::NotDownloaded))
            .bind(aoi.user)
            .bind(&aoi.source_imagery)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to insert feedback AOI")?;
        let aoi = feedback_aoi_from_row(&row)?;

        tx.commit().await.context("Failed to commit feedback AOI")?;
        Ok(aoi)
    }

    async fn get_feedback_label(&self, id: Id) -> Result<Option<FeedbackLabel>> {
        let sql = format!(
            "SELECT {} FROM feedback_labels WHERE id = $1",
            FEEDBACK_LABEL_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch feedback label")?;

        row.as_ref().map(feedback_label_from_row).transpose()
    }

    async fn list_feedback_labels(
        &self,
        filter: &FeedbackLabelFilter,
    ) -> Result<Vec<FeedbackLabel>> {
        let rows = sqlx::query(
            r#"
            SELECT l.id, l.osm_id, l.feedback_aoi, l.tags, l.geom, l.created_at
            FROM feedback_labels l
            JOIN feedback_aois a ON a.id = l.feedback_aoi
            WHERE ($1::bigint IS NULL OR l.feedback_aoi = $1)
              AND ($2::bigint IS NULL OR a.training = $2)
            ORDER BY l.id
            "#,
        )
        .bind(filter.feedback_aoi)
        .bind(filter.training)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list feedback labels")?;

        rows.iter().map(feedback_label_from_row).collect()
    }

    async fn create_feedback_label(
        &self,
        label: CreateFeedbackLabel,
    ) -> StoreResult<FeedbackLabel> {
        let mut tx = self.begin().await?;
        lock_reference(
            &mut tx,
            "feedback_aois",
            "FOR SHARE",
            "feedback_aoi",
            "FeedbackAOI",
            label.feedback_aoi,
        )
        .await?;

        let sql = format!(
            "INSERT INTO feedback_labels (osm_id, feedback_aoi, tags, geom) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            FEEDBACK_LABEL_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(label.osm_id)
            .bind(label.feedback_aoi)
            .bind(&label.tags)
            .bind(label.geom.to_wkt())
            .fetch_one(&mut *tx)
            .await
            .context("Failed to insert feedback label")?;
        let label = feedback_label_from_row(&row)?;

        tx.commit().await.context("Failed to commit feedback label")?;
        Ok(label)
    }
}
