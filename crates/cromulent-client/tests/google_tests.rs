//! Google API client tests against a mock server.

use cromulent_client::{ClientError, GoogleServices};
use cromulent_core::config::GoogleConfig;
use cromulent_cost::{BillingCatalogSource, CostError, MachineType, MachineTypeSource, OperationSource};
use serde_json::{Value, json};
use wiremock::{
    matchers::{header, method, path, query_param, query_param_is_missing},
    Mock, MockServer, ResponseTemplate,
};

fn config(server: &MockServer) -> GoogleConfig {
    GoogleConfig {
        api_key_env: "CROMULENT_TEST_UNSET_API_KEY".into(),
        access_token_env: "CROMULENT_TEST_UNSET_TOKEN".into(),
        billing_base_url: server.uri(),
        compute_base_url: server.uri(),
        genomics_base_url: server.uri(),
        ..Default::default()
    }
}

fn services(server: &MockServer) -> GoogleServices {
    GoogleServices::from_config(&config(server))
        .unwrap()
        .with_api_key("k")
        .with_access_token("t")
}

fn sku(description: &str, nanos: i64) -> Value {
    json!({
        "skuId": description.replace(' ', "-"),
        "description": description,
        "pricingInfo": [{"pricingExpression": {
            "baseUnitConversionFactor": 3600,
            "tieredRates": [{"startUsageAmount": 0, "unitPrice": {"units": "0", "nanos": nanos}}]
        }}]
    })
}

async fn mount_billing(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/services"))
        .and(query_param("key", "k"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "services": [
                {"name": "services/AAAA", "displayName": "Cloud Storage"},
                {"name": "services/6F81-5844-456A", "displayName": "Compute Engine"}
            ]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/services/6F81-5844-456A/skus"))
        .and(query_param("key", "k"))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "skus": [sku("N1 Predefined Instance Core running in Virginia", 1000)],
            "nextPageToken": "page-2"
        })))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/services/6F81-5844-456A/skus"))
        .and(query_param("key", "k"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "skus": [
                sku("N1 Predefined Instance Ram running in Virginia", 2000),
                sku("N1 Predefined Instance Core running in Virginia", 1500)
            ],
            "nextPageToken": ""
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_billing_service_lookup() {
    let mock_server = MockServer::start().await;
    mount_billing(&mock_server).await;
    let google = services(&mock_server);

    assert_eq!(
        google.billing_service("Compute Engine").await.unwrap(),
        "services/6F81-5844-456A"
    );
    match google.billing_service("BigQuery").await {
        Err(ClientError::ServiceNotFound(name)) => assert_eq!(name, "BigQuery"),
        other => panic!("expected ServiceNotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_compute_engine_skus_follow_pages() {
    let mock_server = MockServer::start().await;
    mount_billing(&mock_server).await;
    let google = services(&mock_server);

    let skus = google.compute_engine_skus().await.unwrap();
    assert_eq!(skus.len(), 2);
    // the second page's duplicate description replaces the first
    let core = &skus["N1 Predefined Instance Core running in Virginia"];
    assert_eq!(
        core["pricingInfo"][0]["pricingExpression"]["tieredRates"][0]["unitPrice"]["nanos"],
        1500
    );
}

#[tokio::test]
async fn test_sku_catalog_from_api() {
    let mock_server = MockServer::start().await;
    mount_billing(&mock_server).await;
    let google = services(&mock_server);

    let catalog = google.sku_catalog().await.unwrap();
    assert_eq!(catalog.len(), 2);
    assert!(catalog.get("N1 Predefined Instance Ram running in Virginia").is_some());
}

#[tokio::test]
async fn test_sku_catalog_from_file_skips_api() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("skus.json");
    let dump = json!({"Storage PD Capacity": sku("Storage PD Capacity", 40_000_000)});
    std::fs::write(&file, serde_json::to_string_pretty(&dump).unwrap()).unwrap();

    let google = services(&mock_server).with_sku_list(&file);
    let catalog = google.sku_catalog().await.unwrap();
    assert_eq!(catalog.len(), 1);
    assert!(catalog.get("Storage PD Capacity").is_some());
}

#[tokio::test]
async fn test_missing_api_key_fails_catalog_fetch() {
    let mock_server = MockServer::start().await;
    let google = GoogleServices::from_config(&config(&mock_server)).unwrap();

    match google.billing_service("Compute Engine").await {
        Err(ClientError::MissingCredential { env }) => assert_eq!(env, "CROMULENT_TEST_UNSET_API_KEY"),
        other => panic!("expected MissingCredential, got {:?}", other),
    }
    match google.sku_catalog().await {
        Err(CostError::CatalogFetch(message)) => assert!(message.contains("CROMULENT_TEST_UNSET_API_KEY")),
        other => panic!("expected CatalogFetch, got {:?}", other),
    }
}

#[tokio::test]
async fn test_machine_types_paged_with_bearer_token() {
    let mock_server = MockServer::start().await;
    let url = "/compute/v1/projects/proj/zones/us-east4-b/machineTypes";
    Mock::given(method("GET"))
        .and(path(url))
        .and(header("Authorization", "Bearer t"))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"name": "n1-standard-1", "guestCpus": 1, "memoryMb": 3840, "zone": "us-east4-b"},
                {"name": "n1-standard-2", "guestCpus": 2, "memoryMb": 7680, "zone": "us-east4-b"}
            ],
            "nextPageToken": "more"
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(url))
        .and(header("Authorization", "Bearer t"))
        .and(query_param("pageToken", "more"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"name": "f1-micro", "guestCpus": 1, "memoryMb": 614, "isSharedCpu": true}]
        })))
        .mount(&mock_server)
        .await;

    let google = services(&mock_server);
    let types = google.machine_types("proj", "us-east4-b").await.unwrap();
    assert_eq!(
        types,
        vec![
            MachineType::new("n1-standard-1", 1, 3840),
            MachineType::new("n1-standard-2", 2, 7680),
            MachineType::new("f1-micro", 1, 614),
        ]
    );
}

#[tokio::test]
async fn test_machine_types_error_maps_to_fetch_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": 403, "message": "Required 'compute.machineTypes.list' permission"}
        })))
        .mount(&mock_server)
        .await;

    let google = services(&mock_server);
    match google.machine_types("proj", "us-east4-b").await {
        Err(CostError::MachineTypeFetch { project, zone, message }) => {
            assert_eq!(project, "proj");
            assert_eq!(zone, "us-east4-b");
            assert!(message.contains("compute.machineTypes.list"));
        }
        other => panic!("expected MachineTypeFetch, got {:?}", other),
    }
}

#[tokio::test]
async fn test_operation_fetch() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2alpha1/projects/proj/operations/123"))
        .and(header("Authorization", "Bearer t"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/proj/operations/123",
            "metadata": {"startTime": "2018-06-01T10:00:00Z"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let google = services(&mock_server);
    let operation = google.operation_metadata("projects/proj/operations/123").await.unwrap();
    assert_eq!(operation["metadata"]["startTime"], "2018-06-01T10:00:00Z");
}

#[tokio::test]
async fn test_operation_not_found_maps_to_fetch_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let google = services(&mock_server);
    match google.operation_metadata("projects/proj/operations/missing").await {
        Err(CostError::OperationFetch { job_id, .. }) => assert_eq!(job_id, "projects/proj/operations/missing"),
        other => panic!("expected OperationFetch, got {:?}", other),
    }
}
