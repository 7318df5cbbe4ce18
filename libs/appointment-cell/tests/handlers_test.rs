use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use tower::ServiceExt;

use appointment_cell::router::appointment_routes;
use appointment_cell::*;
use doctor_cell::{Doctor, InMemoryDoctorDirectory};
use patient_cell::{InMemoryPatientDirectory, Patient};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn app() -> Router {
    let config = TestConfig::default().to_arc();

    let doctors = Arc::new(InMemoryDoctorDirectory::with_doctors(vec![Doctor {
        id: 1,
        name: "Dr. Bailey".to_string(),
        specialty: "Surgery".to_string(),
        email: None,
        available_times: vec!["09:00-17:00".to_string()],
    }]));
    let patients = Arc::new(InMemoryPatientDirectory::with_patients(vec![
        Patient {
            id: 10,
            name: "Ada Lovelace".to_string(),
            email: None,
            phone: None,
        },
        Patient {
            id: 11,
            name: "Alan Turing".to_string(),
            email: None,
            phone: None,
        },
    ]));

    let lifecycle = AppointmentLifecycleManager::new(
        Arc::new(InMemoryAppointmentRepository::new()),
        doctors,
        patients,
        Arc::new(JwtIdentityResolver::new(config.supabase_jwt_secret.clone())),
        SchedulingRules::from_config(&config),
    );

    appointment_routes(Arc::new(AppointmentState::new(config, lifecycle)))
}

fn bearer(user: TestUser) -> String {
    let token = JwtTestUtils::create_test_token(&user, &TestConfig::default().jwt_secret, None);
    format!("Bearer {}", token)
}

async fn send(app: &Router, method: Method, uri: &str, auth: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header("Authorization", auth);
    }

    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn booking(patient_id: i64, time: &str) -> Value {
    json!({
        "doctor_id": 1,
        "patient_id": patient_id,
        "appointment_time": time
    })
}

#[tokio::test]
async fn test_routes_require_authentication() {
    let app = app();

    let (status, body) = send(&app, Method::POST, "/", None, Some(booking(10, "2024-05-01T09:00:00"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let expired = JwtTestUtils::create_expired_token(&TestUser::patient(10), &TestConfig::default().jwt_secret);
    let (status, _) = send(&app, Method::GET, "/doctor?date=2024-05-01", Some(&format!("Bearer {}", expired)), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_book_then_conflict() {
    let app = app();
    let ada = bearer(TestUser::patient(10));
    let alan = bearer(TestUser::patient(11));

    let (status, body) = send(&app, Method::POST, "/", Some(&ada), Some(booking(10, "2024-05-01T09:00:00"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["appointment_id"].as_i64().is_some());

    let (status, _) = send(&app, Method::POST, "/", Some(&alan), Some(booking(11, "2024-05-01T09:30:00"))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, Method::POST, "/", Some(&alan), Some(booking(11, "2024-05-01T18:00:00"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_patient_cannot_book_for_someone_else() {
    let app = app();
    let ada = bearer(TestUser::patient(10));

    let (status, _) = send(&app, Method::POST, "/", Some(&ada), Some(booking(11, "2024-05-01T09:00:00"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let doctor = bearer(TestUser::doctor(1));
    let (status, _) = send(&app, Method::POST, "/", Some(&doctor), Some(booking(10, "2024-05-01T09:00:00"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_update_cancel_and_status_flow() {
    let app = app();
    let ada = bearer(TestUser::patient(10));
    let alan = bearer(TestUser::patient(11));
    let doctor = bearer(TestUser::doctor(1));

    let (_, body) = send(&app, Method::POST, "/", Some(&ada), Some(booking(10, "2024-05-01T09:00:00"))).await;
    let id = body["appointment_id"].as_i64().unwrap();

    let (status, _) = send(&app, Method::PUT, "/999", Some(&ada), Some(booking(10, "2024-05-01T10:00:00"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, Method::PUT, &format!("/{}", id), Some(&ada), Some(booking(10, "2024-05-01T10:00:00"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["appointment_time"], "2024-05-01T10:00:00");

    let (status, body) = send(&app, Method::PATCH, &format!("/{}/status", id), Some(&doctor), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");

    let (status, _) = send(&app, Method::DELETE, &format!("/{}", id), Some(&alan), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::DELETE, &format!("/{}", id), Some(&ada), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::PATCH, &format!("/{}/status", id), Some(&doctor), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_doctor_schedule_query() {
    let app = app();
    let ada = bearer(TestUser::patient(10));
    let alan = bearer(TestUser::patient(11));
    let doctor = bearer(TestUser::doctor(1));

    send(&app, Method::POST, "/", Some(&ada), Some(booking(10, "2024-05-01T14:00:00"))).await;
    send(&app, Method::POST, "/", Some(&alan), Some(booking(11, "2024-05-01T09:00:00"))).await;
    send(&app, Method::POST, "/", Some(&alan), Some(booking(11, "2024-05-02T09:00:00"))).await;

    let (status, body) = send(&app, Method::GET, "/doctor?date=2024-05-01", Some(&doctor), None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["appointments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["patient_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Alan Turing", "Ada Lovelace"]);

    let (_, body) = send(&app, Method::GET, "/doctor?date=2024-05-01&patient_name=ada%20LOVELACE", Some(&doctor), None).await;
    assert_eq!(body["appointments"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, Method::GET, "/doctor?date=2024-05-01", Some(&ada), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::GET, "/doctor?date=yesterday", Some(&doctor), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_dates_at_the_end_of_the_calendar_are_bad_requests() {
    let app = app();
    let ada = bearer(TestUser::patient(10));
    let doctor = bearer(TestUser::doctor(1));

    let last_slot = NaiveDate::MAX.and_hms_opt(23, 30, 0).unwrap().format("%Y-%m-%dT%H:%M:%S").to_string();
    let (status, body) = send(&app, Method::POST, "/", Some(&ada), Some(booking(10, &last_slot))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let uri = format!("/doctor?date={}", NaiveDate::MAX.to_string().replace('+', "%2B"));
    let (status, _) = send(&app, Method::GET, &uri, Some(&doctor), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
