//! JSON surface driven through the router without a listener.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::*;
use ledgergate_server::http::{EndorseReply, EvaluateReply, SignedProposalBody};
use ledgergate_server::{router, Code, ErrorResponse};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Vec<u8>) {
    post_raw(app, uri, body.to_string()).await
}

async fn post_raw(app: &Router, uri: &str, body: String) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

fn parse<T: DeserializeOwned>(bytes: &[u8]) -> T {
    serde_json::from_slice(bytes).unwrap()
}

fn app(scenario: Scenario) -> (Router, Prepared) {
    let prepared = prepare(scenario);
    (router(prepared.gateway.clone()), prepared)
}

fn proposal_body(p: &Prepared) -> Value {
    json!({ "proposed_transaction": SignedProposalBody::encode(&p.signed_proposal) })
}

#[tokio::test]
async fn test_http_evaluate() {
    let (app, p) = app(Scenario::default());

    let (status, body) = post(&app, "/evaluate", proposal_body(&p)).await;

    assert_eq!(status, StatusCode::OK);
    let reply: EvaluateReply = parse(&body);
    assert_eq!(reply.result.status, 200);
    assert_eq!(reply.result.payload, hex::encode("mock_response"));
    assert_eq!(p.local.calls(), 1);
}

#[tokio::test]
async fn test_http_invalid_hex() {
    let (app, _p) = app(Scenario::default());

    let body = json!({ "proposed_transaction": { "proposal_bytes": "zz", "signature": "" } });
    let (status, body) = post(&app, "/evaluate", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorResponse = parse(&body);
    assert_eq!(error.code, Code::InvalidArgument);
    assert!(error.error.starts_with("invalid hex in proposal_bytes"));
}

#[tokio::test]
async fn test_http_malformed_body() {
    let (app, p) = app(Scenario::default());

    for uri in ["/evaluate", "/endorse", "/submit", "/commit-status"] {
        let (status, body) = post_raw(&app, uri, "{not json".to_string()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        let error: ErrorResponse = parse(&body);
        assert_eq!(error.code, Code::InvalidArgument);
        assert!(error.error.starts_with("invalid request body: "), "{}", error.error);
        assert!(error.details.is_empty());
    }
    assert_eq!(p.local.calls(), 0);
}

#[tokio::test]
async fn test_http_endorse_failure_carries_details() {
    let (app, p) = app(Scenario {
        plan: vec![("g1", vec!["peer1:8051"])],
        ..Default::default()
    });
    p.factory.fail_dial("peer1:8051", "endorser not answering");

    let (status, body) = post(&app, "/endorse", proposal_body(&p)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    let error: ErrorResponse = parse(&body);
    assert_eq!(error.code, Code::Aborted);
    assert_eq!(error.error, "failed to endorse transaction");
    assert_eq!(
        error.details,
        vec![detail(
            "peer1:8051",
            "msp1",
            "failed to create new connection: endorser not answering"
        )]
    );
}

#[tokio::test]
async fn test_http_endorse_then_submit() {
    let (app, p) = app(Scenario {
        plan: vec![("g1", vec!["localhost:7051"]), ("g2", vec!["peer1:8051"])],
        ..Default::default()
    });

    let (status, body) = post(&app, "/endorse", proposal_body(&p)).await;
    assert_eq!(status, StatusCode::OK);
    let reply: EndorseReply = parse(&body);
    assert_eq!(reply.prepared_transaction.signature, "");

    let submit = json!({
        "transaction_id": p.proposal.transaction_id(),
        "channel_id": TEST_CHANNEL,
        "prepared_transaction": {
            "payload": reply.prepared_transaction.payload,
            "signature": hex::encode("mysignature"),
        },
    });
    let (status, body) = post(&app, "/submit", submit).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse::<Value>(&body), json!({}));
    let sent = p.factory.orderer("orderer:7050").unwrap().sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].signature, b"mysignature");
}

#[tokio::test]
async fn test_http_submit_unsigned() {
    let (app, p) = app(Scenario::default());

    let submit = json!({
        "channel_id": TEST_CHANNEL,
        "prepared_transaction": { "payload": hex::encode("payload") },
    });
    let (status, body) = post(&app, "/submit", submit).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorResponse = parse(&body);
    assert_eq!(error.error, "prepared transaction must be signed");
    assert_eq!(p.factory.dial_count("orderer:7050"), 0);
}

#[tokio::test]
async fn test_http_commit_status() {
    let (app, p) = app(Scenario::default());
    let request = json!({ "channel_id": TEST_CHANNEL, "transaction_id": "tx1" });

    let ((status, body), _) = tokio::join!(
        post(&app, "/commit-status", request),
        p.commits.publish(TEST_CHANNEL, valid_commit(3, "tx1")),
    );

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        parse::<Value>(&body),
        json!({ "block_number": 3, "result": "VALID" })
    );
}

#[tokio::test]
async fn test_http_commit_status_missing_channel() {
    let (app, _p) = app(Scenario::default());

    let (status, body) = post(&app, "/commit-status", json!({ "transaction_id": "tx1" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorResponse = parse(&body);
    assert_eq!(error.code, Code::InvalidArgument);
    assert_eq!(error.error, "a channel id is required");
}
