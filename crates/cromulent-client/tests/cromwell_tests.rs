//! Cromwell client tests against a mock server.

use cromulent_client::{ClientError, CromwellServer, WorkflowStatus};
use cromulent_cost::{CostError, ExecutionKind, WorkflowMetadataSource};
use serde_json::json;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

async fn server() -> (MockServer, CromwellServer) {
    let mock_server = MockServer::start().await;
    let client = CromwellServer::new(mock_server.uri(), 5).unwrap();
    (mock_server, client)
}

#[tokio::test]
async fn test_is_accessible() {
    let (mock_server, client) = server().await;
    Mock::given(method("GET"))
        .and(path("/engine/v1/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"cromwell": "36"})))
        .mount(&mock_server)
        .await;

    assert!(client.is_accessible().await);
    assert_eq!(client.version().await.unwrap(), "36");
}

#[tokio::test]
async fn test_not_accessible_on_error_status() {
    let (mock_server, client) = server().await;
    Mock::given(method("GET"))
        .and(path("/engine/v1/version"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    assert!(!client.is_accessible().await);
}

#[tokio::test]
async fn test_unreachable_server() {
    // nothing listens on port 9 (discard) in the test environment
    let client = CromwellServer::new("http://127.0.0.1:9", 2).unwrap();
    assert!(!client.is_accessible().await);
    let err = client.status("wf").await.unwrap_err();
    assert!(err.is_unreachable() || matches!(err, ClientError::Http(_)), "{err:?}");
}

#[tokio::test]
async fn test_metadata_does_not_expand_sub_workflows() {
    let (mock_server, client) = server().await;
    Mock::given(method("GET"))
        .and(path("/api/workflows/v1/wf-1/metadata"))
        .and(query_param("expandSubWorkflows", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "wf-1",
            "workflowName": "main",
            "status": "Succeeded",
            "calls": {
                "main.align": [{"shardIndex": 0, "jobId": "projects/p/operations/1", "executionStatus": "Done"}],
                "main.sub": [{"shardIndex": -1, "subWorkflowId": "wf-2"}]
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let metadata = client.workflow_metadata("wf-1").await.unwrap();
    assert_eq!(metadata.workflow_name.as_deref(), Some("main"));
    assert_eq!(metadata.calls.len(), 2);
    assert_eq!(
        metadata.executions("main.sub").unwrap()[0].kind(),
        ExecutionKind::SubWorkflowById("wf-2")
    );
}

#[tokio::test]
async fn test_metadata_error_surfaces_server_message() {
    let (mock_server, client) = server().await;
    Mock::given(method("GET"))
        .and(path("/api/workflows/v1/nope/metadata"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "status": "fail",
            "message": "Unrecognized workflow ID: nope"
        })))
        .mount(&mock_server)
        .await;

    let err = client.metadata_json("nope").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(err.to_string().contains("Unrecognized workflow ID: nope"));

    match client.workflow_metadata("nope").await {
        Err(CostError::WorkflowFetch { id, message }) => {
            assert_eq!(id, "nope");
            assert!(message.contains("Unrecognized workflow ID"));
        }
        other => panic!("expected WorkflowFetch, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_error_body_keeps_status() {
    let (mock_server, client) = server().await;
    Mock::given(method("GET"))
        .and(path("/api/workflows/v1/wf-1/status"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let err = client.status("wf-1").await.unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert!(err.to_string().contains("/api/workflows/v1/wf-1/status"), "{err}");
}

#[tokio::test]
async fn test_status_and_abort() {
    let (mock_server, client) = server().await;
    Mock::given(method("GET"))
        .and(path("/api/workflows/v1/wf-1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "wf-1", "status": "Running"})))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/workflows/v1/wf-1/abort"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "wf-1", "status": "Aborting"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    assert_eq!(
        client.status("wf-1").await.unwrap(),
        WorkflowStatus {
            id: "wf-1".into(),
            status: "Running".into()
        }
    );
    assert_eq!(client.abort("wf-1").await.unwrap().status, "Aborting");
}

#[tokio::test]
async fn test_execution_status_summary_counts() {
    let (mock_server, client) = server().await;
    Mock::given(method("GET"))
        .and(path("/api/workflows/v1/wf-1/metadata"))
        .and(query_param("includeKey", "executionStatus"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "calls": {
                "a": [{"executionStatus": "Done"}, {"executionStatus": "Done"}, {"executionStatus": "Failed"}],
                "b": [{"executionStatus": "Running"}],
                "c": [{"executionStatus": "Done"}]
            }
        })))
        .mount(&mock_server)
        .await;

    let summary = client.execution_status_summary("wf-1").await.unwrap();
    assert_eq!(summary.get("Done"), Some(&3));
    assert_eq!(summary.get("Failed"), Some(&1));
    assert_eq!(summary.get("Running"), Some(&1));
    assert_eq!(summary.len(), 3);
}

#[tokio::test]
async fn test_inputs_outputs() {
    let (mock_server, client) = server().await;
    Mock::given(method("GET"))
        .and(path("/api/workflows/v1/wf-1/metadata"))
        .and(query_param("includeKey", "outputs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "inputs": {"main.sample": "NA12878"},
            "outputs": {"main.bam": "gs://bucket/NA12878.bam"}
        })))
        .mount(&mock_server)
        .await;

    let body = client.inputs_outputs("wf-1").await.unwrap();
    assert_eq!(body["outputs"]["main.bam"], "gs://bucket/NA12878.bam");
}
