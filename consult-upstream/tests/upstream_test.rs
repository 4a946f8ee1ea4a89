//! Client tests against a local mock upstream
//!
//! Each test serves canned responses from an axum router bound to an
//! ephemeral port and points the client at it.

use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use consult_core::{Coordinates, Timestamp};
use consult_upstream::{
    build_client, AirQualityClient, AirQualityWindow, ClinicalResourceType, FhirClient, Geocoder,
    RecommendationClient, UpstreamError, WeatherClient, WeatherWindow,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

async fn start_mock(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn http() -> reqwest::Client {
    build_client(Duration::from_secs(10)).unwrap()
}

const BOISE: Coordinates = Coordinates {
    latitude: 43.6,
    longitude: -116.2,
};

async fn condition_pages(
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer token-1") {
        return Err(StatusCode::UNAUTHORIZED);
    }
    assert_eq!(params.get("patient").map(String::as_str), Some("p1"));

    let page = match params.get("page").map(String::as_str) {
        None => json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "link": [{"relation": "next", "url": "Condition?patient=p1&page=2"}],
            "entry": [
                {"resource": {"resourceType": "Condition", "id": "c1"}},
                {"resource": {"resourceType": "Condition", "id": "c2"}}
            ]
        }),
        Some("2") => json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "link": [
                {"relation": "self", "url": "Condition?patient=p1&page=2"},
                {"relation": "next", "url": "Condition?patient=p1&page=3"}
            ]
        }),
        _ => json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "entry": [{"resource": {"resourceType": "Condition", "id": "c3"}}]
        }),
    };
    Ok(Json(page))
}

#[tokio::test]
async fn test_fhir_search_follows_next_links() {
    let app = Router::new().route("/fhir/Condition", get(condition_pages));
    let base = start_mock(app).await;

    let client = FhirClient::new(http(), &format!("{}/fhir", base), "token-1").unwrap();
    let resources = client
        .search_all(ClinicalResourceType::Condition, "p1")
        .await
        .unwrap();

    // page 2 has no entry and still links onward
    let ids: Vec<_> = resources.iter().filter_map(|r| r.id.as_deref()).collect();
    assert_eq!(ids, vec!["c1", "c2", "c3"]);
}

#[tokio::test]
async fn test_fhir_pagination_loop_is_malformed() {
    let app = Router::new().route(
        "/fhir/Encounter",
        get(|| async {
            Json(json!({
                "resourceType": "Bundle",
                "type": "searchset",
                "link": [{"relation": "next", "url": "Encounter?patient=p1"}],
                "entry": [{"resource": {"resourceType": "Encounter", "id": "e1"}}]
            }))
        }),
    );
    let base = start_mock(app).await;

    let client = FhirClient::new(http(), &format!("{}/fhir", base), "t").unwrap();
    let result = client
        .search_all(ClinicalResourceType::Encounter, "p1")
        .await;
    assert!(matches!(result, Err(UpstreamError::Malformed { .. })));
}

#[tokio::test]
async fn test_fhir_read_patient_and_status_error() {
    let app = Router::new()
        .route(
            "/fhir/Patient/p1",
            get(|| async {
                Json(json!({"resourceType": "Patient", "id": "p1", "gender": "female"}))
            }),
        )
        .route(
            "/fhir/Patient/missing",
            get(|| async { (StatusCode::NOT_FOUND, "gone") }),
        );
    let base = start_mock(app).await;
    let client = FhirClient::new(http(), &format!("{}/fhir/", base), "t").unwrap();

    let patient = client.read_patient("p1").await.unwrap();
    assert_eq!(patient.str_element("gender"), Some("female"));

    for bad_id in ["..", "a/b", "p1%2F.."] {
        assert!(matches!(
            client.read_patient(bad_id).await,
            Err(UpstreamError::InvalidUrl { .. })
        ));
    }

    match client.read_patient("missing").await {
        Err(UpstreamError::Status { status, body, .. }) => {
            assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
            assert_eq!(body, "gone");
        }
        other => panic!("expected status error, got {:?}", other.map(|r| r.id)),
    }
}

async fn air_quality_lookup(
    Path(lookup): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    assert_eq!(params.get("key").map(String::as_str), Some("maps-key"));
    assert_eq!(body["location"]["latitude"], 43.6);

    let response = match (lookup.as_str(), body.get("pageToken").and_then(Value::as_str)) {
        ("forecast:lookup", None) => {
            assert_eq!(body["period"]["startTime"], "2024-01-01T13:00:00Z");
            assert_eq!(body["period"]["endTime"], "2024-01-05T12:00:00Z");
            json!({
                "hourlyForecasts": [
                    {"dateTime": "2024-01-01T13:00:00Z", "indexes": [{"aqi": 30}]}
                ],
                "nextPageToken": "f2"
            })
        }
        ("forecast:lookup", Some("f2")) => json!({
            "hourlyForecasts": [
                {"dateTime": "2024-01-01T14:00:00Z", "indexes": [{"aqi": 31}]}
            ]
        }),
        ("currentConditions:lookup", _) => json!({
            "dateTime": "2024-01-01T12:00:00Z",
            "indexes": [{"aqi": 25}]
        }),
        ("history:lookup", None) => {
            assert_eq!(body["hours"], 720);
            json!({
                "hoursInfo": [
                    {"dateTime": "2024-01-01T11:00:00Z", "indexes": [{"aqi": 20}]},
                    {"dateTime": "2024-01-01T10:00:00Z"}
                ],
                "nextPageToken": "h2"
            })
        }
        ("history:lookup", Some("h2")) => json!({
            "hoursInfo": [
                {"dateTime": "2024-01-01T12:00:00Z", "indexes": [{"aqi": 24}]}
            ]
        }),
        other => panic!("unexpected lookup {:?}", other),
    };
    Json(response)
}

#[tokio::test]
async fn test_air_quality_merges_three_lookups() {
    let app = Router::new().route("/v1/{lookup}", post(air_quality_lookup));
    let base = start_mock(app).await;

    let client = AirQualityClient::new(http(), &base, "maps-key", true);
    let now = Timestamp::parse("2024-01-01T12:00:00Z").unwrap();
    let series = client
        .fetch(BOISE, now, AirQualityWindow::default())
        .await
        .unwrap();

    // 4 distinct instants; the hour without indexes is skipped
    assert_eq!(series.len(), 4);
    // history is looked up last and replaces the current reading
    assert_eq!(series.get(&now), Some(24));
    assert_eq!(
        series.get(&Timestamp::parse("2024-01-01T14:00:00Z").unwrap()),
        Some(31)
    );
}

#[tokio::test]
async fn test_air_quality_repeated_token_is_malformed() {
    let app = Router::new().route(
        "/v1/{lookup}",
        post(|| async { Json(json!({"hourlyForecasts": [], "nextPageToken": "same"})) }),
    );
    let base = start_mock(app).await;

    let client = AirQualityClient::new(http(), &base, "k", true);
    let result = client
        .fetch(BOISE, Timestamp::now(), AirQualityWindow::default())
        .await;
    assert!(matches!(result, Err(UpstreamError::Malformed { .. })));
}

#[tokio::test]
async fn test_transport_error_does_not_expose_api_key() {
    // bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let base = format!("http://{}", addr);
    let client = AirQualityClient::new(http(), &base, "SECRET-MAPS-KEY", true);
    let err = client
        .fetch(BOISE, Timestamp::now(), AirQualityWindow::default())
        .await
        .unwrap_err();

    assert!(matches!(err, UpstreamError::Http { .. }));
    let mut messages = vec![err.to_string(), format!("{:?}", err)];
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        messages.push(cause.to_string());
        source = cause.source();
    }
    for message in messages {
        assert!(!message.contains("SECRET-MAPS-KEY"), "{}", message);
    }
}

#[tokio::test]
async fn test_weather_request_and_table() {
    let app = Router::new().route(
        "/v1/forecast",
        get(|Query(params): Query<HashMap<String, String>>| async move {
            assert_eq!(params["temperature_unit"], "fahrenheit");
            assert_eq!(params["past_days"], "29");
            assert_eq!(params["forecast_days"], "5");
            assert_eq!(params["current"], "temperature_2m,apparent_temperature");
            Json(json!({
                "current": {"time": "2024-01-01T12:00", "temperature_2m": 50.0, "apparent_temperature": 48.0},
                "hourly": {
                    "time": ["2024-01-01T11:00", "2024-01-01T12:00"],
                    "temperature_2m": [49.0, 50.5],
                    "apparent_temperature": [47.0, 48.5]
                }
            }))
        }),
    );
    let base = start_mock(app).await;

    let client = WeatherClient::new(http(), &base, WeatherWindow::default());
    let table = client.fetch(BOISE).await.unwrap();
    // current + 2 hourly, duplicate instant kept
    assert_eq!(table.len(), 3);
    assert_eq!(table.rows()[0].timestamp.to_string(), "2024-01-01T11:00:00Z");
}

#[tokio::test]
async fn test_geocoder_uses_first_result() {
    let app = Router::new().route(
        "/maps/api/geocode/json",
        get(|Query(params): Query<HashMap<String, String>>| async move {
            if params["address"] == "nowhere" {
                return Json(json!({"status": "ZERO_RESULTS", "results": []}));
            }
            Json(json!({
                "status": "OK",
                "results": [
                    {"geometry": {"location": {"lat": 43.6, "lng": -116.2}}},
                    {"geometry": {"location": {"lat": 0.0, "lng": 0.0}}}
                ]
            }))
        }),
    );
    let base = start_mock(app).await;
    let geocoder = Geocoder::new(http(), &base, "k");

    let coords = geocoder.geocode("1 Main St, Boise").await.unwrap();
    assert_eq!(coords, BOISE);

    assert!(matches!(
        geocoder.geocode("nowhere").await,
        Err(UpstreamError::Malformed { .. })
    ));
}

#[tokio::test]
async fn test_recommendation_returns_text_verbatim() {
    let app = Router::new().route(
        "/v1beta/models/{call}",
        post(|Path(call): Path<String>, Json(body): Json<Value>| async move {
            assert_eq!(call, "gemini-test:generateContent");
            let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap_or("");
            if prompt == "blocked" {
                return Json(json!({"promptFeedback": {"blockReason": "SAFETY"}}));
            }
            Json(json!({
                "candidates": [{
                    "content": {"parts": [{"text": "Stay indoors.\n"}, {"text": "Use a HEPA filter."}]}
                }]
            }))
        }),
    );
    let base = start_mock(app).await;
    let client = RecommendationClient::new(http(), &base, "gemini-key", "gemini-test");

    let text = client.recommend("advise").await.unwrap();
    assert_eq!(text, "Stay indoors.\nUse a HEPA filter.");

    match client.recommend("blocked").await {
        Err(UpstreamError::Malformed { detail, .. }) => assert!(detail.contains("SAFETY")),
        other => panic!("expected malformed response, got {:?}", other),
    }
}
