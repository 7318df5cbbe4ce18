use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patient_cell::*;
use shared_database::supabase::SupabaseClient;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn patient(id: i64, name: &str) -> Patient {
    Patient {
        id,
        name: name.to_string(),
        email: None,
        phone: None,
    }
}

#[test]
fn test_name_matching_ignores_case_and_padding() {
    let p = patient(1, "Maria Lopez");
    assert!(p.name_matches("maria lopez"));
    assert!(p.name_matches("  MARIA LOPEZ "));
    assert!(!p.name_matches("maria"));
    assert!(!p.name_matches("Mario Lopez"));
}

#[tokio::test]
async fn test_in_memory_directory() {
    let directory = InMemoryPatientDirectory::with_patients(vec![patient(1, "A"), patient(2, "B")]);
    assert_eq!(directory.find_patient(1).await.unwrap().unwrap().name, "A");
    assert!(directory.find_patient(5).await.unwrap().is_none());

    directory.insert(patient(5, "E")).await;
    assert_eq!(directory.find_patient(5).await.unwrap().unwrap().name, "E");
}

#[tokio::test]
async fn test_supabase_directory() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", "eq.3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_row(3, "Grace Hopper")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", "eq.4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", "eq.5"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let directory = SupabasePatientDirectory::new(Arc::new(SupabaseClient::new(&config)), "service-token");

    let found = directory.find_patient(3).await.unwrap().expect("patient exists");
    assert_eq!(found.name, "Grace Hopper");
    assert_eq!(found.phone.as_deref(), Some("555-0100"));

    assert!(directory.find_patient(4).await.unwrap().is_none());
    assert_matches!(directory.find_patient(5).await, Err(PatientError::DatabaseError(_)));
}
