// libs/scheduling-cell/tests/handlers_test.rs
//
// HTTP round-trips through the router, the auth middleware and the handlers,
// with a mock Supabase server behind the service.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scheduling_cell::router::scheduling_routes;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

const SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

fn all_week_hours() -> Value {
    let days = [
        "sunday",
        "monday",
        "tuesday",
        "wednesday",
        "thursday",
        "friday",
        "saturday",
    ];
    Value::Array(
        days.iter()
            .map(|day| json!({"day": day, "open": "09:00", "close": "12:00"}))
            .collect(),
    )
}

async fn mount_provider(server: &MockServer, provider_id: Uuid) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/providers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": provider_id,
            "is_active": true,
            "working_hours": all_week_hours()
        }])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/provider_schedule_overrides"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn requests_without_a_token_are_rejected() {
    let config = TestConfig::default();
    let app = scheduling_routes(config.to_arc());

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/mine")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn garbage_tokens_are_rejected() {
    let config = TestConfig::default();
    let app = scheduling_routes(config.to_arc());

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/mine")
                .header("Authorization", "Bearer not.a.jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn slots_endpoint_returns_the_generated_grid() {
    let server = MockServer::start().await;
    let provider_id = Uuid::new_v4();
    mount_provider(&server, provider_id).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let config = TestConfig::with_supabase_url(&server.uri());
    let app = scheduling_routes(config.to_arc());

    let user = TestUser::patient("slots@example.com");
    let token = JwtTestUtils::create_test_token(&user, SECRET, None);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!(
                    "/providers/{}/slots?date=2030-06-03",
                    provider_id
                ))
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["success"], json!(true));

    // 09:00-12:00 on a 30-minute grid, all free.
    let slots = body["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 6);
    assert_eq!(slots[0]["time"], json!("09:00"));
    assert_eq!(slots[0]["is_available"], json!(true));
}

#[tokio::test]
async fn booking_round_trips_through_the_api() {
    let server = MockServer::start().await;
    let provider_id = Uuid::new_v4();
    mount_provider(&server, provider_id).await;

    let user = TestUser::patient("booker@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "patient_id": user.id,
            "provider_id": provider_id,
            "date": "2030-06-03",
            "time": "10:00",
            "status": "pending",
            "appointment_type": "consultation",
            "notes": null,
            "cancellation_reason": null,
            "created_at": "2030-06-01T10:00:00Z",
            "updated_at": "2030-06-01T10:00:00Z"
        }])))
        .mount(&server)
        .await;

    let config = TestConfig::with_supabase_url(&server.uri());
    let app = scheduling_routes(config.to_arc());

    let token = JwtTestUtils::create_test_token(&user, SECRET, None);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("Authorization", format!("Bearer {}", token))
                .header("Content-Type", "application/json")
                .body(Body::from(
                    json!({
                        "provider_id": provider_id,
                        "date": "2030-06-03",
                        "time": "10:00"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["appointment"]["status"], json!("pending"));
}

#[tokio::test]
async fn occupied_slot_maps_to_a_conflict_response() {
    let server = MockServer::start().await;
    let provider_id = Uuid::new_v4();
    mount_provider(&server, provider_id).await;

    // The advisory occupancy check finds the slot taken.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "patient_id": Uuid::new_v4(),
            "provider_id": provider_id,
            "date": "2030-06-03",
            "time": "10:00",
            "status": "confirmed",
            "appointment_type": "consultation",
            "notes": null,
            "cancellation_reason": null,
            "created_at": "2030-06-01T10:00:00Z",
            "updated_at": "2030-06-01T10:00:00Z"
        }])))
        .mount(&server)
        .await;

    let config = TestConfig::with_supabase_url(&server.uri());
    let app = scheduling_routes(config.to_arc());

    let user = TestUser::patient("late@example.com");
    let token = JwtTestUtils::create_test_token(&user, SECRET, None);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("Authorization", format!("Bearer {}", token))
                .header("Content-Type", "application/json")
                .body(Body::from(
                    json!({
                        "provider_id": provider_id,
                        "date": "2030-06-03",
                        "time": "10:00"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = read_json(response).await;
    assert_eq!(body["error"], json!("This time slot is no longer available"));
}

#[tokio::test]
async fn upcoming_count_reports_confirmed_future_appointments() {
    let server = MockServer::start().await;
    let user = TestUser::patient("dashboard@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "patient_id": user.id,
            "provider_id": Uuid::new_v4(),
            "date": "2030-06-03",
            "time": "10:00",
            "status": "confirmed",
            "appointment_type": "consultation",
            "notes": null,
            "cancellation_reason": null,
            "created_at": "2030-06-01T10:00:00Z",
            "updated_at": "2030-06-01T10:00:00Z"
        }])))
        .mount(&server)
        .await;

    let config = TestConfig::with_supabase_url(&server.uri());
    let app = scheduling_routes(config.to_arc());

    let token = JwtTestUtils::create_test_token(&user, SECRET, None);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/upcoming/count")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["count"], json!(1));
}

#[tokio::test]
async fn unknown_provider_maps_to_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/providers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let config = TestConfig::with_supabase_url(&server.uri());
    let app = scheduling_routes(config.to_arc());

    let user = TestUser::patient("lost@example.com");
    let token = JwtTestUtils::create_test_token(&user, SECRET, None);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!(
                    "/providers/{}/slots?date=2030-06-03",
                    Uuid::new_v4()
                ))
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
