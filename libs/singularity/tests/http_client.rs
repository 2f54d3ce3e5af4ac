//! HTTP scheduler client and full actual-state passes against mock servers.

use std::sync::Arc;
use std::time::Duration;

use convoy_model::{Cluster, Clusters, Defs, DeployStatus, SourceId, SourceLocation};
use convoy_registry::{ImageLabeller, StaticLabeller};
use convoy_singularity::{
    build_with_retry, collect_actual_state, failure_summary, BackoffPolicy, BuildError,
    HttpSchedulerClient, RetryPolicy, SchedulerClient, SchedulerError, SingReq,
};
use rstest::rstest;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const IMAGE: &str = "docker.example.com/acme/shop:2.0.0";

fn client(server: &MockServer) -> HttpSchedulerClient {
    HttpSchedulerClient::new(server.uri(), Duration::from_secs(5)).unwrap()
}

fn request_json(id: &str, request_type: &str) -> serde_json::Value {
    json!({
        "request": {
            "id": id,
            "requestType": request_type,
            "instances": 2,
            "owners": ["team@example.com"]
        },
        "state": "ACTIVE",
        "requestDeployState": {
            "requestId": id,
            "activeDeploy": {"requestId": id, "deployId": "d1"}
        }
    })
}

fn deploy_json(id: &str, deploy_state: &str) -> serde_json::Value {
    json!({
        "deploy": {
            "id": "d1",
            "requestId": id,
            "containerInfo": {
                "type": "DOCKER",
                "docker": {"image": IMAGE}
            },
            "resources": {"cpus": 1.0, "memoryMb": 512, "numPorts": 2},
            "env": {"PORT": "8080"}
        },
        "deployMarker": {"requestId": id, "deployId": "d1", "timestamp": 1700000000000i64},
        "deployResult": {"deployState": deploy_state}
    })
}

async fn mount_request(server: &MockServer, id: &str, deploy_state: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/api/history/request/{id}/deploys")))
        .and(query_param("page", "1"))
        .and(query_param("count", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([deploy_json(id, deploy_state)])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/api/history/request/{id}/deploy/d1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(deploy_json(id, deploy_state)))
        .mount(server)
        .await;
}

fn single_cluster(server: &MockServer) -> Clusters {
    Clusters::from([(
        "left".to_string(),
        Cluster {
            base_url: server.uri(),
            ..Default::default()
        },
    )])
}

fn fast_retries() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        backoff: BackoffPolicy {
            base: Duration::from_millis(1),
            max: Duration::from_millis(1),
            jitter: 0.0,
        },
    }
}

async fn build_over_http(
    server: &MockServer,
    parent: serde_json::Value,
) -> Result<convoy_model::DeployState, BuildError> {
    let sid = SourceId::new(SourceLocation::new("github.com/acme/shop", ""), "2.0.0");
    let labeller = StaticLabeller::new().with_source(IMAGE, &sid);
    let req = SingReq {
        source_url: server.uri(),
        scheduler: Arc::new(client(server)),
        req_parent: Some(serde_json::from_value(parent).unwrap()),
    };
    build_with_retry(&labeller, &single_cluster(server), req, &fast_retries()).await
}

#[tokio::test]
async fn test_get_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/requests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            request_json("r1", "SERVICE"),
            request_json("r2", "WORKER"),
        ])))
        .mount(&server)
        .await;

    let requests = client(&server).get_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].request_id(), Some("r2"));
}

#[tokio::test]
async fn test_get_deploy() {
    let server = MockServer::start().await;
    mount_request(&server, "r1", "SUCCEEDED").await;

    let history = client(&server).get_deploy("r1", "d1").await.unwrap();
    let deploy = history.deploy.unwrap();
    assert_eq!(deploy.env.unwrap()["PORT"], "8080");
    assert_eq!(history.deploy_marker.unwrap().timestamp, Some(1_700_000_000_000));
}

#[tokio::test]
async fn test_missing_request_is_not_found() {
    let server = MockServer::start().await;

    let err = client(&server).get_request("nope").await.unwrap_err();
    assert!(matches!(err, SchedulerError::NotFound(_)));
}

#[tokio::test]
async fn test_server_error_keeps_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/requests"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let err = client(&server).get_requests().await.unwrap_err();
    match err {
        SchedulerError::UnexpectedStatus { status, body, .. } => {
            assert_eq!(status, 503);
            assert_eq!(body, "overloaded");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_bad_payload_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/requests"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server).get_requests().await.unwrap_err();
    assert!(matches!(err, SchedulerError::Decode(_)));
}

#[tokio::test]
async fn test_collect_actual_state_across_schedulers() {
    let left = MockServer::start().await;
    let right = MockServer::start().await;

    let shop = "github_com_acme_shop---left";
    let batch = "github_com_acme_batch---left";
    Mock::given(method("GET"))
        .and(path("/api/requests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            request_json(shop, "SERVICE"),
            request_json(batch, "BATCH"),
        ])))
        .mount(&left)
        .await;
    mount_request(&left, shop, "SUCCEEDED").await;
    mount_request(&left, batch, "SUCCEEDED").await;

    // The right scheduler cannot list its requests.
    Mock::given(method("GET"))
        .and(path("/api/requests"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&right)
        .await;

    let clusters: Clusters = [("left", left.uri()), ("right", right.uri())]
        .into_iter()
        .map(|(nick, url)| {
            (
                nick.to_string(),
                Cluster {
                    base_url: url,
                    ..Default::default()
                },
            )
        })
        .collect();
    let defs = Defs::new(clusters);

    let sid = SourceId::new(SourceLocation::new("github.com/acme/shop", ""), "2.0.0");
    let labeller: Arc<dyn ImageLabeller> = Arc::new(StaticLabeller::new().with_source(IMAGE, &sid));

    let actual = collect_actual_state(
        labeller,
        &defs,
        |url| {
            let client = HttpSchedulerClient::new(url, Duration::from_secs(5))?;
            Ok(Arc::new(client) as Arc<dyn SchedulerClient>)
        },
        &RetryPolicy::default(),
    )
    .await;

    assert_eq!(actual.states.len(), 1);
    let state = &actual.states[0];
    assert_eq!(state.status, DeployStatus::Active);
    assert_eq!(state.deployment.cluster_name, "left");
    assert_eq!(state.deployment.num_instances(), 2);
    assert_eq!(actual.count(DeployStatus::Active), 1);

    let summary = failure_summary(&actual.failures);
    assert_eq!(summary.get("unsupported"), Some(&1));
    assert_eq!(summary.get("scheduler"), Some(&1));
    assert_eq!(actual.failures.len(), 2);
}

#[rstest]
#[case::missing_image(json!({"type": "DOCKER", "docker": {}}))]
#[case::missing_type(json!({"docker": {"image": IMAGE}}))]
#[case::unknown_type(json!({"type": "PODMAN", "docker": {"image": IMAGE}}))]
#[case::missing_container_path(json!({
    "type": "DOCKER",
    "docker": {"image": IMAGE},
    "volumes": [{"hostPath": "/srv/data", "mode": "RO"}]
}))]
#[tokio::test]
async fn test_incomplete_container_info_is_malformed(#[case] container_info: serde_json::Value) {
    let server = MockServer::start().await;
    let id = "r1";
    let mut record = deploy_json(id, "SUCCEEDED");
    record["deploy"]["containerInfo"] = container_info;

    Mock::given(method("GET"))
        .and(path(format!("/api/history/request/{id}/deploys")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([record.clone()])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/api/history/request/{id}/deploy/d1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(record))
        .expect(1)
        .mount(&server)
        .await;

    let err = build_over_http(&server, request_json(id, "SERVICE"))
        .await
        .unwrap_err();
    assert!(err.is_malformed(), "{err}");
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_incomplete_history_marker_is_malformed() {
    let server = MockServer::start().await;
    let id = "r1";
    let mut record = deploy_json(id, "SUCCEEDED");
    record["deployMarker"] = json!({"requestId": id});

    Mock::given(method("GET"))
        .and(path(format!("/api/history/request/{id}/deploys")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([record])))
        .expect(1)
        .mount(&server)
        .await;

    let err = build_over_http(&server, request_json(id, "SERVICE"))
        .await
        .unwrap_err();
    assert!(err.is_malformed(), "{err}");
    assert!(err.to_string().contains("deploy marker is incomplete"));
}

#[tokio::test]
async fn test_request_without_id_is_malformed() {
    let server = MockServer::start().await;
    let mut parent = request_json("r1", "SERVICE");
    parent["request"].as_object_mut().unwrap().remove("id");
    parent["requestDeployState"] = json!({"pendingDeploy": {"requestId": "r1", "deployId": "d1"}});
    mount_request(&server, "r1", "SUCCEEDED").await;

    let err = build_over_http(&server, parent).await.unwrap_err();
    assert!(err.is_malformed(), "{err}");
    assert!(err.to_string().contains("no id"));
}

#[tokio::test]
async fn test_request_without_type_fails_alone() {
    let server = MockServer::start().await;
    let good = "github_com_acme_shop---left";
    let bad = "github_com_acme_untyped---left";
    let mut untyped = request_json(bad, "SERVICE");
    untyped["request"].as_object_mut().unwrap().remove("requestType");

    Mock::given(method("GET"))
        .and(path("/api/requests"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([request_json(good, "SERVICE"), untyped])),
        )
        .mount(&server)
        .await;
    mount_request(&server, good, "SUCCEEDED").await;
    mount_request(&server, bad, "SUCCEEDED").await;

    let defs = Defs::new(single_cluster(&server));
    let sid = SourceId::new(SourceLocation::new("github.com/acme/shop", ""), "2.0.0");
    let labeller: Arc<dyn ImageLabeller> = Arc::new(StaticLabeller::new().with_source(IMAGE, &sid));

    let actual = collect_actual_state(
        labeller,
        &defs,
        |url| {
            let client = HttpSchedulerClient::new(url, Duration::from_secs(5))?;
            Ok(Arc::new(client) as Arc<dyn SchedulerClient>)
        },
        &fast_retries(),
    )
    .await;

    assert_eq!(actual.states.len(), 1);
    assert_eq!(actual.states[0].deployment.cluster_name, "left");
    assert_eq!(actual.failures.len(), 1);
    let failure = &actual.failures[0];
    assert_eq!(failure.request_id.as_deref(), Some(bad));
    match &failure.error {
        BuildError::UnsupportedRequestType { request_id, request_type } => {
            assert_eq!(request_id, bad);
            assert_eq!(request_type, "");
        }
        other => panic!("unexpected error: {other}"),
    }
}
