#![cfg(feature = "http")]

use iobeam_rs::httpclient::HttpRequester;
use iobeam_rs::requester::{RawResponse, RequestResult};
use iobeam_rs::{Builder, ClientError, ConnectionSettings, Device, Requester};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn requester(server: &MockServer, timeout: Duration) -> HttpRequester {
    HttpRequester::new(Arc::new(ConnectionSettings {
        base_url: format!("{}/v1/", server.uri()),
        timeout,
        ..ConnectionSettings::default()
    }))
    .unwrap()
}

#[tokio::test]
async fn get_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/devices/timestamp"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "server_timestamp": 42 })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let requester = requester(&server, Duration::from_secs(5));
    let url = requester.full_endpoint("/devices/timestamp");
    assert_eq!(url, format!("{}/v1/devices/timestamp", server.uri()));

    let (result, response) = requester
        .perform(requester.get_request(&url, Some("tok")))
        .await;
    assert_eq!(result, RequestResult::Success);
    assert_eq!(
        response,
        Some(RawResponse::new(200, Some(json!({ "server_timestamp": 42 }))))
    );
}

#[tokio::test]
async fn post_sends_json_and_query() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/imports"))
        .and(query_param("fmt", "table"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "a": 1 })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let requester = requester(&server, Duration::from_secs(5));
    let url = requester.full_endpoint("/imports");
    let request = requester
        .post_request(&url, Some(json!({ "a": 1 })), Some("tok"))
        .query("fmt", "table");

    let (result, response) = requester.perform(request).await;
    assert_eq!(result, RequestResult::Success);
    assert_eq!(response, Some(RawResponse::new(201, None)));
}

#[tokio::test]
async fn classifies_failures() {
    let server = MockServer::start().await;
    Mock::given(path("/v1/forbidden"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(json!({ "errors": [{ "message": "invalid" }] })),
        )
        .mount(&server)
        .await;
    Mock::given(path("/v1/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("not json"))
        .mount(&server)
        .await;

    let requester = requester(&server, Duration::from_secs(5));
    let forbidden = requester.get_request(&requester.full_endpoint("/forbidden"), None);
    let (result, response) = requester.perform(forbidden).await;
    assert_eq!(result, RequestResult::Forbidden);
    assert_eq!(response.unwrap().status, 403);

    let broken = requester.get_request(&requester.full_endpoint("/broken"), None);
    let (result, response) = requester.perform(broken).await;
    assert_eq!(result, RequestResult::Failure);
    assert_eq!(response, Some(RawResponse::new(500, None)));
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(path("/v1/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let requester = requester(&server, Duration::from_millis(50));
    let request = requester.get_request(&requester.full_endpoint("/slow"), None);

    let mut seen = vec![];
    requester
        .execute(
            request,
            &mut |result: RequestResult, response: Option<&RawResponse>| {
                seen.push((result, response.cloned()))
            },
        )
        .await;
    assert_eq!(
        seen,
        vec![(RequestResult::Pending, None), (RequestResult::Timeout, None)]
    );
}

#[tokio::test]
async fn unreachable_server_reports_timeout() {
    let requester = HttpRequester::new(Arc::new(ConnectionSettings {
        base_url: "http://127.0.0.1:9/v1".to_string(),
        timeout: Duration::from_millis(500),
        ..ConnectionSettings::default()
    }))
    .unwrap();
    let request = requester.get_request(&requester.full_endpoint("/devices"), None);
    assert_eq!(
        requester.perform(request).await,
        (RequestResult::Timeout, None)
    );
}

#[test]
fn rejects_invalid_base_url() {
    let settings = ConnectionSettings {
        base_url: "not a url".to_string(),
        ..ConnectionSettings::default()
    };
    assert!(matches!(
        HttpRequester::new(Arc::new(settings)),
        Err(ClientError::InvalidUrl(_))
    ));
}

#[tokio::test]
async fn client_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/devices"))
        .and(header("authorization", "Bearer tok"))
        .and(body_json(json!({ "project_id": 3, "device_id": "d1" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "device_id": "d1" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/imports"))
        .and(query_param("fmt", "table"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = Builder::new(3, "tok")
        .unwrap()
        .set_backend(&format!("{}/v1", server.uri()))
        .unwrap()
        .build()
        .unwrap();

    let (reg_tx, reg_rx) = oneshot::channel();
    client.register(
        Some(Device::new("d1").unwrap()),
        move |result| {
            let _ = reg_tx.send(result);
        },
        false,
    );
    let store = client.create_data_store(["temperature"]).unwrap();
    store.add(1, [("temperature", 20)]).unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    client
        .send(move |result, _| {
            let _ = tx.send(result);
        })
        .unwrap();

    assert_eq!(reg_rx.await.unwrap().unwrap().id(), "d1");
    assert!(rx.recv().await.unwrap().is_ok());
}
