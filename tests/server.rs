use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{test, App};
use async_trait::async_trait;
use serde_json::{json, Value};

use pivo_bot::conversation::{Conversations, Router};
use pivo_bot::error::ServiceError;
use pivo_bot::intents::{IntentDetectors, GREETING, PRODUCT_PROMPT};
use pivo_bot::matcher::{Matcher, QueryEncoder};
use pivo_bot::model::{CatalogBuilder, Vocabulary};
use pivo_bot::preprocess::{SnowballLemmatizer, TextNormalizer};
use pivo_bot::server;
use pivo_bot::services::{TriviaProvider, WeatherProvider};

struct Sunny;

#[async_trait]
impl WeatherProvider for Sunny {
    async fn forecast(&self, _location: &str, _horizon: usize) -> Result<String, ServiceError> {
        Ok("Прогноз погоды: Москва\nЯсно".to_string())
    }
}

struct NoFacts;

#[async_trait]
impl TriviaProvider for NoFacts {
    async fn fact(&self) -> Result<String, ServiceError> {
        Err(ServiceError::Malformed("offline".to_string()))
    }
}

fn data(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data").join(name)
}

fn components() -> (Arc<Conversations>, Arc<Matcher>) {
    let normalizer = TextNormalizer::new(Arc::new(SnowballLemmatizer::russian()));
    let vocabulary = Vocabulary::load_from_file(data("vocabulary.json")).unwrap();
    let catalog = CatalogBuilder::new(&vocabulary)
        .load_from_file(data("catalog.json"))
        .unwrap();
    let encoder = QueryEncoder::new(&vocabulary, normalizer.clone());
    let matcher = Arc::new(Matcher::new(Arc::new(catalog), encoder).unwrap());
    let detectors = IntentDetectors::new(normalizer, Arc::new(Sunny), Arc::new(NoFacts));
    let router = Router::new(detectors, Arc::clone(&matcher));
    (Arc::new(Conversations::new(router)), matcher)
}

fn texts(body: &Value) -> Vec<&str> {
    body["replies"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|r| r["kind"] == "text")
        .map(|r| r["payload"].as_str().unwrap())
        .collect()
}

#[actix_web::test]
async fn sample_catalog_drops_uninformative_items() {
    let (_, matcher) = components();
    let names: Vec<&str> = matcher
        .catalog()
        .items()
        .iter()
        .map(|item| item.name.as_str())
        .collect();
    assert_eq!(names.len(), 6);
    assert!(!names.contains(&"Жигулевское"));
    assert!(!names.contains(&"Без картинки"));
}

#[actix_web::test]
async fn health_answers_ok() {
    let (conversations, matcher) = components();
    let app = test::init_service(App::new().configure(server::configure(conversations, matcher))).await;
    let req = test::TestRequest::get().uri("/health").to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(body, "ok");
}

#[actix_web::test]
async fn product_dialogue_over_http() {
    let (conversations, matcher) = components();
    let app = test::init_service(App::new().configure(server::configure(conversations, matcher))).await;

    let req = test::TestRequest::post()
        .uri("/message")
        .set_json(json!({"chat_id": 7, "text": "Привет! Посоветуй пиво"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["state"], "PRODUCT");
    assert_eq!(texts(&body)[..2], [GREETING, PRODUCT_PROMPT]);

    let req = test::TestRequest::post()
        .uri("/message")
        .set_json(json!({"chat_id": 7, "text": "хочу стаут с кофе и шоколадом, к мясу"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["state"], "MAIN");
    let media: Vec<&Value> = body["replies"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|r| r["kind"] == "media")
        .collect();
    assert_eq!(media.len(), 3);
    assert_eq!(media[0]["payload"]["caption"], "Guinness Draught");
    assert_eq!(media[0]["payload"]["image"], "images/guinness-draught.jpg");
}

#[actix_web::test]
async fn chats_do_not_share_state() {
    let (conversations, matcher) = components();
    let app = test::init_service(App::new().configure(server::configure(
        Arc::clone(&conversations),
        matcher,
    )))
    .await;

    let req = test::TestRequest::post()
        .uri("/message")
        .set_json(json!({"chat_id": 1, "text": "хочу пиво"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["state"], "PRODUCT");

    let req = test::TestRequest::post()
        .uri("/message")
        .set_json(json!({"chat_id": 2, "text": "какая погода?"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["state"], "MAIN");
    assert!(texts(&body)[0].starts_with("Прогноз погоды"));
    assert_eq!(conversations.sessions().active_count(), 2);
}

#[actix_web::test]
async fn suggest_endpoint_ranks_by_distance() {
    let (conversations, matcher) = components();
    let app = test::init_service(App::new().configure(server::configure(conversations, matcher))).await;

    let req = test::TestRequest::post()
        .uri("/suggest")
        .set_json(json!({"query": "пшеничное с бананом", "k": 2}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["name"], "Paulaner Hefe-Weissbier");
    assert!(items[0]["distance"].as_f64().unwrap() <= items[1]["distance"].as_f64().unwrap());
}

#[actix_web::test]
async fn malformed_request_is_rejected() {
    let (conversations, matcher) = components();
    let app = test::init_service(App::new().configure(server::configure(conversations, matcher))).await;
    let req = test::TestRequest::post()
        .uri("/message")
        .set_json(json!({"text": "без чата"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_client_error());
}
