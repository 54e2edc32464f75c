//! Router tests against in-memory store doubles.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use agora_api::{router, ApiConfig, AppState};
use agora_core::{
    EntityKind, EntitySchema, ExploreConfig, ExploreStore, FacetDef, FacetValue,
    FilterVectorRefresher, OrderTerm, Predicate, RawEntity, Result,
};
use agora_search::{ExploreEngine, StaticLabelCatalog};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value as JsonValue;
use tower::ServiceExt;
use uuid::Uuid;

struct FakeStore;

#[async_trait]
impl ExploreStore for FakeStore {
    async fn count(&self, _: &'static EntitySchema, _: &Predicate) -> Result<i64> {
        Ok(0)
    }

    async fn fetch_page(
        &self,
        _: &'static EntitySchema,
        _: &Predicate,
        _: &[OrderTerm],
        _: i64,
    ) -> Result<Vec<Uuid>> {
        Ok(Vec::new())
    }

    async fn hydrate(&self, _: &'static EntitySchema, _: &[Uuid]) -> Result<Vec<RawEntity>> {
        Ok(Vec::new())
    }

    async fn facet_value_counts(
        &self,
        _: &'static EntitySchema,
        _: &'static FacetDef,
        _: &Predicate,
    ) -> Result<HashMap<String, i64>> {
        Ok(HashMap::new())
    }

    async fn predicate_counts(
        &self,
        _: &'static EntitySchema,
        _: &Predicate,
        _: &[(String, Predicate)],
    ) -> Result<HashMap<String, i64>> {
        Ok(HashMap::new())
    }

    async fn facet_values(&self) -> Result<BTreeMap<String, Vec<FacetValue>>> {
        let mut values = BTreeMap::new();
        values.insert(
            "area".to_string(),
            vec![FacetValue::new("bayern", "Bayern"), FacetValue::new("berlin", "Berlin")],
        );
        Ok(values)
    }
}

#[derive(Default)]
struct FakeRefresher {
    calls: Mutex<Vec<(EntityKind, Option<Uuid>)>>,
}

#[async_trait]
impl FilterVectorRefresher for FakeRefresher {
    async fn refresh_filter_vectors(&self, kind: EntityKind, id: Option<Uuid>) -> Result<u64> {
        self.calls.lock().unwrap().push((kind, id));
        Ok(7)
    }
}

async fn app() -> (Router, Arc<FakeRefresher>) {
    let engine = ExploreEngine::new(
        Arc::new(FakeStore),
        Arc::new(StaticLabelCatalog::new()),
        ExploreConfig::default(),
    )
    .await
    .unwrap();
    let refresher = Arc::new(FakeRefresher::default());
    let state = AppState {
        engine: Arc::new(engine),
        refresher: refresher.clone(),
        config: Arc::new(ApiConfig::default()),
    };
    (router(state), refresher)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, JsonValue) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, user: Option<Uuid>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user.to_string());
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app().await;
    let (status, body) = send(app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_explore_kind_result_shape() {
    let (app, _) = app().await;
    let (status, body) = send(
        app,
        get("/api/v1/explore/profiles?prfFilter.area=bayern&prfPage=2&search=ada"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalCount"], 0);
    assert_eq!(body["page"], 2);
    assert_eq!(body["take"], 24);
    assert_eq!(body["sortBy"], "firstName-asc");
    assert!(body["items"].as_array().unwrap().is_empty());
    let area = body["filterVectors"]["area"].as_array().unwrap();
    assert_eq!(area[0]["value"], "bayern");
    assert_eq!(area[0]["selected"], true);
    assert_eq!(area[0]["disabled"], false);
    assert_eq!(area[1]["disabled"], true);
}

#[tokio::test]
async fn test_explore_kind_accepts_prefix_alias() {
    let (app, _) = app().await;
    let (status, body) = send(app, get("/api/v1/explore/evt?evtFilter%5BperiodOfTime%5D=past")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sortBy"], "startTime-desc");
}

#[tokio::test]
async fn test_unknown_slug_is_bad_request() {
    let (app, _) = app().await;
    let (status, body) = send(app, get("/api/v1/explore/profiles?prfFilter.area=atlantis")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("atlantis"));
}

#[tokio::test]
async fn test_unknown_kind_is_not_found() {
    let (app, _) = app().await;
    let (status, _) = send(app, get("/api/v1/explore/people")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_explore_all() {
    let (app, _) = app().await;
    let (status, body) = send(app, get("/api/v1/explore?orgFilter.area=berlin")).await;
    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_object().unwrap();
    assert_eq!(results.len(), 5);
    let org_area = results["organizations"]["filterVectors"]["area"]
        .as_array()
        .unwrap();
    assert!(org_area.iter().any(|o| o["value"] == "berlin" && o["selected"] == true));
}

#[tokio::test]
async fn test_refresh_requires_authentication() {
    let (app, refresher) = app().await;
    let (status, _) = send(app, post("/api/v1/explore/events/filter-vectors/refresh", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(refresher.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_refresh_one_entity() {
    let (app, refresher) = app().await;
    let id = Uuid::new_v4();
    let (status, body) = send(
        app,
        post(
            &format!("/api/v1/explore/events/filter-vectors/refresh?id={}", id),
            Some(Uuid::new_v4()),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 7);
    assert_eq!(body["kind"], "events");
    assert_eq!(
        refresher.calls.lock().unwrap().as_slice(),
        &[(EntityKind::Events, Some(id))]
    );
}

#[tokio::test]
async fn test_catalog_reload() {
    let (app, _) = app().await;
    let (status, body) = send(
        app.clone(),
        post("/api/v1/explore/catalog/reload", Some(Uuid::new_v4())),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["values"], 2);

    let (status, _) = send(app, post("/api/v1/explore/catalog/reload", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
