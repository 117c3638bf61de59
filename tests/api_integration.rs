use std::sync::Arc;

use geoml_backend::auth::{StaticTokenValidator, ACCESS_TOKEN_HEADER};
use geoml_backend::model::{
    DatasetFilter, FeedbackAoiFilter, FeedbackFilter, FeedbackLabelFilter, OsmIdentity,
    TrainingFilter,
};
use geoml_backend::seed::{load_seed_data, SeedData, SEED_OSM_ID};
use geoml_backend::store::{DatasetStore, FeedbackStore, MemoryStore, TrainingStore};
use geoml_backend::AppContext;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;

const TOKEN: &str = "test-access-token";
const SQUARE: &str = "POLYGON((0 0, 0 1, 1 1, 1 0, 0 0))";
const IMAGERY: &str = "https://tiles.example.org/{z}/{x}/{y}";

// Test client wrapper for making API calls
struct TestClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl TestClient {
    fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            token: None,
        }
    }

    fn with_token(&self, token: &str) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token.to_string()),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}/api/v1{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.header(ACCESS_TOKEN_HEADER, token),
            None => builder,
        }
    }

    async fn post(&self, path: &str, json: Value) -> reqwest::Result<reqwest::Response> {
        self.request(reqwest::Method::POST, path)
            .json(&json)
            .send()
            .await
    }

    async fn post_form(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> reqwest::Result<reqwest::Response> {
        self.request(reqwest::Method::POST, path)
            .form(form)
            .send()
            .await
    }

    async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.request(reqwest::Method::GET, path).send().await
    }
}

struct TestApp {
    anonymous: TestClient,
    authenticated: TestClient,
    store: MemoryStore,
    seeded: SeedData,
}

async fn spawn_app() -> TestApp {
    let store = MemoryStore::new();
    let seeded = load_seed_data(&store).await.unwrap();

    let validator = StaticTokenValidator::new([(
        TOKEN.to_string(),
        OsmIdentity::new(SEED_OSM_ID, "UserOne"),
    )]);
    let state = AppContext::new(store.clone(), Arc::new(validator));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        geoml_backend::serve(listener, state).await.unwrap();
    });

    let anonymous = TestClient::new(format!("http://{}", addr));
    let authenticated = anonymous.with_token(TOKEN);
    TestApp {
        anonymous,
        authenticated,
        store,
        seeded,
    }
}

async fn dataset_count(store: &MemoryStore) -> usize {
    store
        .list_datasets(&DatasetFilter::default())
        .await
        .unwrap()
        .len()
}

async fn feedback_count(store: &MemoryStore) -> usize {
    store
        .list_feedback(&FeedbackFilter::default())
        .await
        .unwrap()
        .len()
}

async fn aoi_count(store: &MemoryStore) -> usize {
    store
        .list_feedback_aois(&FeedbackAoiFilter::default())
        .await
        .unwrap()
        .len()
}

#[tokio::test]
async fn test_health() {
    let app = spawn_app().await;
    let response = app
        .anonymous
        .client
        .get(format!("{}/health", app.anonymous.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_dataset_list_matches_store() {
    let app = spawn_app().await;

    let response = app.anonymous.get("/dataset/").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();

    let stored = app
        .store
        .list_datasets(&DatasetFilter::default())
        .await
        .unwrap();
    assert_eq!(body, serde_json::to_value(&stored).unwrap());
}

#[tokio::test]
async fn test_dataset_retrieve_and_missing() {
    let app = spawn_app().await;
    let id = app.seeded.dataset.id;

    let response = app.anonymous.get(&format!("/dataset/{}/", id)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::to_value(&app.seeded.dataset).unwrap());

    let response = app.anonymous.get("/dataset/30/").await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.anonymous.get("/dataset/not-a-number/").await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_dataset_requires_token() {
    let app = spawn_app().await;
    let before = dataset_count(&app.store).await;
    let payload = json!({"name": "Dataset two", "user": 999});

    let response = app.anonymous.post("/dataset/", payload.clone()).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(dataset_count(&app.store).await, before);

    let response = app
        .anonymous
        .with_token("not-a-real-token")
        .post("/dataset/", payload.clone())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(dataset_count(&app.store).await, before);

    let response = app.authenticated.post("/dataset/", payload).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(dataset_count(&app.store).await, before + 1);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["name"], "Dataset two");
    assert_eq!(body["created_by"], SEED_OSM_ID);
    assert_eq!(body["status"], -1);
}

#[tokio::test]
async fn test_create_dataset_rejects_blank_name() {
    let app = spawn_app().await;
    let before = dataset_count(&app.store).await;

    let response = app
        .authenticated
        .post("/dataset/", json!({"name": "   "}))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["fields"]["name"].is_array());
    assert_eq!(dataset_count(&app.store).await, before);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = spawn_app().await;
    let response = app
        .authenticated
        .request(reqwest::Method::POST, "/dataset/")
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unauthenticated_malformed_body_is_forbidden() {
    let app = spawn_app().await;
    let datasets_before = dataset_count(&app.store).await;
    let feedback_before = feedback_count(&app.store).await;

    for path in ["/dataset/", "/feedback/"] {
        let response = app
            .anonymous
            .request(reqwest::Method::POST, path)
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", path);
    }

    assert_eq!(dataset_count(&app.store).await, datasets_before);
    assert_eq!(feedback_count(&app.store).await, feedback_before);
}

#[tokio::test]
async fn test_feedback_lists_match_store() {
    let app = spawn_app().await;

    let response = app.anonymous.get("/feedback/").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    let stored = app
        .store
        .list_feedback(&FeedbackFilter::default())
        .await
        .unwrap();
    assert_eq!(body, serde_json::to_value(&stored).unwrap());

    let response = app.anonymous.get("/feedbackaoi/").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    let stored = app
        .store
        .list_feedback_aois(&FeedbackAoiFilter::default())
        .await
        .unwrap();
    assert_eq!(body, serde_json::to_value(&stored).unwrap());

    let response = app.anonymous.get("/feedbacklabel/").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    let stored = app
        .store
        .list_feedback_labels(&FeedbackLabelFilter::default())
        .await
        .unwrap();
    assert_eq!(body, serde_json::to_value(&stored).unwrap());
}

#[tokio::test]
async fn test_feedback_retrieve_and_missing() {
    let app = spawn_app().await;

    let response = app
        .anonymous
        .get(&format!("/feedback/{}/", app.seeded.feedback.id))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::to_value(&app.seeded.feedback).unwrap());

    let response = app
        .anonymous
        .get(&format!("/feedback-label/{}", app.seeded.feedback_label.id))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    for path in ["/feedback/9999/", "/feedback-aoi/9999/", "/feedback-label/9999/"] {
        let response = app.anonymous.get(path).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", path);
    }
}

#[tokio::test]
async fn test_create_feedback() {
    let app = spawn_app().await;
    let before = feedback_count(&app.store).await;
    let payload = json!({
        "training": app.seeded.training.id,
        "geom": SQUARE,
        "zoom_level": 20,
        "feedback_type": "TP",
        "user": 999,
        "source_imagery": IMAGERY,
    });

    let response = app.anonymous.post("/feedback/", payload.clone()).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(feedback_count(&app.store).await, before);

    let response = app.authenticated.post("/feedback/", payload).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(feedback_count(&app.store).await, before + 1);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"], SEED_OSM_ID);
    assert_eq!(body["feedback_type"], "TP");
    assert_eq!(body["geom"]["type"], "Polygon");
    assert_eq!(body["validated"], false);
}

#[tokio::test]
async fn test_create_feedback_from_form() {
    let app = spawn_app().await;
    let before = feedback_count(&app.store).await;
    let training = app.seeded.training.id.to_string();

    let response = app
        .authenticated
        .post_form(
            "/feedback/",
            &[
                ("training", training.as_str()),
                ("geom", SQUARE),
                ("zoom_level", "20"),
                ("feedback_type", "TP"),
                ("source_imagery", IMAGERY),
            ],
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(feedback_count(&app.store).await, before + 1);
}

#[tokio::test]
async fn test_create_feedback_validation() {
    let app = spawn_app().await;
    let before = feedback_count(&app.store).await;
    let valid = json!({
        "training": app.seeded.training.id,
        "geom": SQUARE,
        "zoom_level": 20,
        "feedback_type": "TP",
        "source_imagery": IMAGERY,
    });

    let cases = [
        ("geom", json!("POLYGON((0 0, 0 1, 1 1, 1 0))")),
        (
            "geom",
            json!("POLYGON((0 0, 0 1, 1 1, 1 0, 0 0), (5 5, 5 9, 9 9, 9 5, 5 5))"),
        ),
        ("training", json!(9999)),
        ("zoom_level", json!(12)),
        ("feedback_type", json!("XX")),
        ("source_imagery", json!("not a url")),
    ];
    for (field, value) in cases {
        let mut payload = valid.clone();
        payload[field] = value;
        let response = app.authenticated.post("/feedback/", payload).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "field {}", field);
        let body: Value = response.json().await.unwrap();
        assert!(body["fields"][field].is_array(), "field {}: {}", field, body);
    }
    assert_eq!(feedback_count(&app.store).await, before);
}

#[tokio::test]
async fn test_create_feedback_aoi() {
    let app = spawn_app().await;
    let training = app.seeded.training.id;
    let payload = json!({
        "training": training,
        "geom": {
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]]]
        },
        "user": 999,
        "source_imagery": IMAGERY,
    });
    let filter = FeedbackAoiFilter {
        training: Some(training),
        user: None,
    };
    let before = aoi_count(&app.store).await;

    let response = app.anonymous.post("/feedback-aoi/", payload.clone()).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(aoi_count(&app.store).await, before);

    let response = app.authenticated.post("/feedback-aoi/", payload).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(aoi_count(&app.store).await, before + 1);

    let created: Value = response.json().await.unwrap();
    assert_eq!(created["label_status"], -1);
    let id = created["id"].as_i64().unwrap();

    let stored = app.store.list_feedback_aois(&filter).await.unwrap();
    assert_eq!(stored.iter().filter(|aoi| aoi.id == id).count(), 1);

    // The unhyphenated alias serves the same records
    let response = app.anonymous.get(&format!("/feedbackaoi/{}", id)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched: Value = response.json().await.unwrap();
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_create_feedback_label() {
    let app = spawn_app().await;
    let payload = json!({
        "feedback_aoi": app.seeded.feedback_aoi.id,
        "geom": SQUARE,
        "osm_id": 42,
        "tags": {"building": "house"},
    });

    let response = app.anonymous.post("/feedback-label/", payload.clone()).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.authenticated.post("/feedbacklabel/", payload).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["tags"]["building"], "house");

    let response = app
        .authenticated
        .post(
            "/feedback-label/",
            json!({"feedback_aoi": 9999, "geom": SQUARE}),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .anonymous
        .get(&format!("/feedback-label/?training={}", app.seeded.training.id))
        .await
        .unwrap();
    let labels: Vec<Value> = response.json().await.unwrap();
    assert_eq!(labels.len(), 2);
}

#[tokio::test]
async fn test_one_active_training_per_model() {
    let app = spawn_app().await;
    let payload = json!({
        "model": app.seeded.model.id,
        "zoom_level": [21, 19, 20],
        "epochs": 5,
        "batch_size": 8,
    });

    let response = app.authenticated.post("/training/", payload).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["fields"]["non_field_errors"].is_array());

    let trainings = app
        .store
        .list_trainings(&TrainingFilter::default())
        .await
        .unwrap();
    assert_eq!(trainings.len(), 1);
}

#[tokio::test]
async fn test_model_and_training_on_new_dataset() {
    let app = spawn_app().await;

    let response = app
        .authenticated
        .post("/dataset/", json!({"name": "Roads", "status": 0}))
        .await
        .unwrap();
    let dataset: Value = response.json().await.unwrap();

    let response = app
        .authenticated
        .post("/model/", json!({"dataset": dataset["id"], "name": "Road model"}))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let model: Value = response.json().await.unwrap();

    let response = app
        .authenticated
        .post(
            "/training/",
            json!({
                "model": model["id"],
                "zoom_level": [21, 19, 21],
                "epochs": 5,
                "batch_size": 8,
            }),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let training: Value = response.json().await.unwrap();
    assert_eq!(training["status"], "SUBMITTED");
    assert_eq!(training["zoom_level"], json!([19, 21]));

    let response = app
        .anonymous
        .get(&format!("/model/?dataset={}", dataset["id"]))
        .await
        .unwrap();
    let models: Vec<Value> = response.json().await.unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0]["name"], "Road model");

    let response = app
        .authenticated
        .post("/model/", json!({"dataset": 9999, "name": "Orphan"}))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_filters() {
    let app = spawn_app().await;

    let response = app.anonymous.get("/dataset/?status=1").await.unwrap();
    let archived: Vec<Value> = response.json().await.unwrap();
    assert!(archived.is_empty());

    let response = app.anonymous.get("/feedback/?feedback_type=TP").await.unwrap();
    let positives: Vec<Value> = response.json().await.unwrap();
    assert_eq!(positives.len(), 1);

    let response = app.anonymous.get("/feedback/?feedback_type=FN").await.unwrap();
    let negatives: Vec<Value> = response.json().await.unwrap();
    assert!(negatives.is_empty());

    let response = app.anonymous.get("/training/?model=abc").await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_current_user() {
    let app = spawn_app().await;

    let response = app.anonymous.get("/auth/me/").await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.authenticated.get("/auth/me/").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["osm_id"], SEED_OSM_ID);
    assert_eq!(body["username"], "UserOne");
}
