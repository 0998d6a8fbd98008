//! Payment flows driven over HTTP against a mock chain.

use super::chain::{random_tx_hash, transfer_receipt};
use super::harness::{payer, recipient, stranger, StubBackend, TestHarness, CHAIN_ID};
use alloy_primitives::{Address, U256};
use futures::future::join_all;
use receipt_gate::GateEvent;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

async fn json_body(response: reqwest::Response) -> Value {
    response.json().await.expect("response body is JSON")
}

fn header(response: &reqwest::Response, name: &str) -> String {
    response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("missing header {name}"))
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_get_describes_payment() {
    let harness = TestHarness::setup().await.unwrap();

    let response = harness.http().get(harness.url("/api/ai")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["paymentRequired"], true);
    assert_eq!(body["method"], "POST");
    assert_eq!(body["payment"]["chainId"], CHAIN_ID);
    assert_eq!(body["payment"]["amount"], "1000000000000000000");
    let recipient_field: Address = body["payment"]["recipient"].as_str().unwrap().parse().unwrap();
    assert_eq!(recipient_field, recipient());

    harness.teardown().await;
}

#[tokio::test]
async fn test_no_token_requires_payment() {
    let harness = TestHarness::setup().await.unwrap();

    let response = harness.post_prompt(None, "hello").await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    assert_eq!(header(&response, "x-payment-network"), format!("shardeum-{CHAIN_ID}"));
    assert_eq!(header(&response, "x-payment-amount"), "1000000000000000000");
    let advertised_token: Address = header(&response, "x-payment-token").parse().unwrap();
    assert_eq!(advertised_token, harness.token());
    let advertised_recipient: Address = header(&response, "x-payment-recipient").parse().unwrap();
    assert_eq!(advertised_recipient, recipient());

    let body = json_body(response).await;
    assert_eq!(body["code"], "payment_required");
    assert_eq!(body["error"], "Payment Required");

    // Nothing was looked up and nothing was generated
    assert_eq!(harness.chain.receipt_calls(), 0);
    assert!(harness.backend.calls().is_empty());

    harness.teardown().await;
}

#[tokio::test]
async fn test_valid_payment_is_admitted_once() {
    let harness = TestHarness::setup().await.unwrap();
    let tx = harness.pay_in_full();

    let response = harness.post_prompt(Some(&tx), "write a haiku").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["model"], "gemini-2.5-flash");
    assert_eq!(body["data"]["text"], "[gemini-2.5-flash] write a haiku");
    assert_eq!(harness.backend.calls(), vec!["write a haiku".to_string()]);

    // Replaying the same hash is refused without reaching the chain again
    let calls_before = harness.chain.receipt_calls();
    let replay = harness.post_prompt(Some(&tx), "again").await;
    assert_eq!(replay.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(replay).await["code"], "proof_already_used");
    assert_eq!(harness.chain.receipt_calls(), calls_before);
    assert_eq!(harness.backend.calls().len(), 1);

    harness.teardown().await;
}

#[tokio::test]
async fn test_hash_case_does_not_bypass_replay() {
    let harness = TestHarness::setup().await.unwrap();
    let tx = harness.pay_in_full();

    let first = harness.post_prompt(Some(&tx), "one").await;
    assert_eq!(first.status(), StatusCode::OK);

    let shouted = format!("0x{}", tx.trim_start_matches("0x").to_uppercase());
    let second = harness.post_prompt(Some(&shouted), "two").await;
    assert_eq!(second.status(), StatusCode::FORBIDDEN);

    harness.teardown().await;
}

#[tokio::test]
async fn test_overpayment_is_admitted() {
    let harness = TestHarness::setup().await.unwrap();
    let tx = harness.pay(recipient(), harness.price() * U256::from(3));

    let response = harness.post_prompt(Some(&tx), "hi").await;
    assert_eq!(response.status(), StatusCode::OK);

    harness.teardown().await;
}

#[tokio::test]
async fn test_insufficient_payment() {
    let harness = TestHarness::setup().await.unwrap();
    let short = harness.price() - U256::from(1);
    let tx = harness.pay(recipient(), short);

    let response = harness.post_prompt(Some(&tx), "hi").await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    assert_eq!(header(&response, "x-payment-amount"), "1000000000000000000");
    let body = json_body(response).await;
    assert_eq!(body["code"], "insufficient_payment");
    assert_eq!(body["paid"], short.to_string());
    assert_eq!(body["required"], harness.price().to_string());
    assert!(harness.backend.calls().is_empty());

    harness.teardown().await;
}

#[tokio::test]
async fn test_wrong_recipient() {
    let harness = TestHarness::setup().await.unwrap();
    let tx = harness.pay(stranger(), harness.price());

    let response = harness.post_prompt(Some(&tx), "hi").await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    assert_eq!(json_body(response).await["code"], "wrong_recipient");

    harness.teardown().await;
}

#[tokio::test]
async fn test_unpadded_recipient_topic_is_rejected_and_released() {
    let harness = TestHarness::setup().await.unwrap();
    let tx = random_tx_hash();
    let mut receipt =
        transfer_receipt(&tx, true, harness.token(), payer(), recipient(), harness.price());
    // Some indexers hand back the bare 20-byte address instead of the padded word
    receipt["logs"][0]["topics"][2] = Value::String(format!("0x{}", hex::encode(recipient())));
    harness.chain.insert_receipt(&tx, receipt);

    let response = harness.post_prompt(Some(&tx), "hi").await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    assert_eq!(json_body(response).await["code"], "wrong_recipient");

    // Not spent: the same hash is judged again rather than refused as a replay
    let again = harness.post_prompt(Some(&tx), "hi").await;
    assert_eq!(json_body(again).await["code"], "wrong_recipient");

    harness.teardown().await;
}

#[tokio::test]
async fn test_wrong_token() {
    let harness = TestHarness::setup().await.unwrap();
    let tx = random_tx_hash();
    // Right recipient and amount, but a different contract emitted the log
    harness.chain.insert_receipt(
        &tx,
        transfer_receipt(&tx, true, stranger(), payer(), recipient(), harness.price()),
    );

    let response = harness.post_prompt(Some(&tx), "hi").await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    assert_eq!(json_body(response).await["code"], "wrong_or_missing_token");

    harness.teardown().await;
}

#[tokio::test]
async fn test_failed_transaction_is_terminal_by_default() {
    let harness = TestHarness::setup().await.unwrap();
    let tx = random_tx_hash();
    harness.chain.insert_receipt(
        &tx,
        transfer_receipt(&tx, false, harness.token(), payer(), recipient(), harness.price()),
    );

    let first = harness.post_prompt(Some(&tx), "hi").await;
    assert_eq!(first.status(), StatusCode::PAYMENT_REQUIRED);
    assert_eq!(json_body(first).await["code"], "transaction_failed");

    let second = harness.post_prompt(Some(&tx), "hi").await;
    assert_eq!(second.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(second).await["code"], "proof_already_used");

    harness.teardown().await;
}

#[tokio::test]
async fn test_failed_transaction_can_be_resubmitted_when_configured() {
    let harness = TestHarness::setup_with(
        |config| config.payment.retry_failed_transactions = true,
        StubBackend::new(),
    )
    .await
    .unwrap();
    let tx = random_tx_hash();
    harness.chain.insert_receipt(
        &tx,
        transfer_receipt(&tx, false, harness.token(), payer(), recipient(), harness.price()),
    );

    for _ in 0..2 {
        let response = harness.post_prompt(Some(&tx), "hi").await;
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(json_body(response).await["code"], "transaction_failed");
    }

    harness.teardown().await;
}

#[tokio::test]
async fn test_malformed_hash() {
    let harness = TestHarness::setup().await.unwrap();

    let long = "z".repeat(66);
    for bad in ["0xdeadbeef", "not-a-hash", long.as_str()] {
        let response = harness.post_prompt(Some(bad), "hi").await;
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED, "{bad}");
        assert!(response.headers().contains_key("x-payment-token"));
        assert_eq!(json_body(response).await["code"], "invalid_proof_format");
    }
    assert_eq!(harness.chain.receipt_calls(), 0);

    harness.teardown().await;
}

#[tokio::test]
async fn test_unknown_scheme_is_treated_as_no_token() {
    let harness = TestHarness::setup().await.unwrap();
    let tx = harness.pay_in_full();

    let response = harness
        .http()
        .post(harness.url("/api/ai"))
        .header("Authorization", format!("Bearer {tx}"))
        .json(&serde_json::json!({ "prompt": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    assert_eq!(json_body(response).await["code"], "payment_required");

    // The payment is still unspent
    let response = harness.post_prompt(Some(&tx), "hi").await;
    assert_eq!(response.status(), StatusCode::OK);

    harness.teardown().await;
}

#[tokio::test]
async fn test_chain_outage_does_not_consume_proof() {
    let harness = TestHarness::setup().await.unwrap();
    let tx = harness.pay_in_full();

    harness.chain.set_offline(true);
    let response = harness.post_prompt(Some(&tx), "hi").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Internal Payment Verification Error");
    assert_eq!(body["code"], "verification_unavailable");

    harness.chain.set_offline(false);
    let response = harness.post_prompt(Some(&tx), "hi").await;
    assert_eq!(response.status(), StatusCode::OK);

    harness.teardown().await;
}

#[tokio::test]
async fn test_unknown_transaction_is_retryable() {
    let harness = TestHarness::setup().await.unwrap();
    let tx = random_tx_hash();

    // Not yet mined
    let response = harness.post_prompt(Some(&tx), "hi").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    harness.chain.insert_receipt(
        &tx,
        transfer_receipt(&tx, true, harness.token(), payer(), recipient(), harness.price()),
    );
    let response = harness.post_prompt(Some(&tx), "hi").await;
    assert_eq!(response.status(), StatusCode::OK);

    harness.teardown().await;
}

#[tokio::test]
async fn test_invalid_body_does_not_consume_proof() {
    let harness = TestHarness::setup().await.unwrap();
    let tx = harness.pay_in_full();

    let response = harness
        .http()
        .post(harness.url("/api/ai"))
        .header("Authorization", format!("Token {tx}"))
        .header("Content-Type", "application/json")
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"]
        .as_str()
        .unwrap()
        .contains("prompt"));
    assert_eq!(harness.chain.receipt_calls(), 0);

    let response = harness.post_prompt(Some(&tx), "hi").await;
    assert_eq!(response.status(), StatusCode::OK);

    harness.teardown().await;
}

#[tokio::test]
async fn test_missing_api_key_does_not_consume_proof() {
    let harness = TestHarness::setup_with(|_| {}, StubBackend::unconfigured())
        .await
        .unwrap();
    let tx = harness.pay_in_full();

    let response = harness.post_prompt(Some(&tx), "hi").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await["error"],
        "Server Configuration Error: Missing API Key"
    );
    assert_eq!(harness.chain.receipt_calls(), 0);

    // Callers without a token still learn how to pay
    let response = harness.post_prompt(None, "hi").await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

    harness.teardown().await;
}

#[tokio::test]
async fn test_backend_failure_after_admission_spends_proof() {
    let harness = TestHarness::setup().await.unwrap();
    harness.backend.set_failing(true);
    let tx = harness.pay_in_full();

    let response = harness.post_prompt(Some(&tx), "hi").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await["error"],
        "Failed to generate AI response"
    );

    harness.backend.set_failing(false);
    let response = harness.post_prompt(Some(&tx), "hi").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    harness.teardown().await;
}

#[tokio::test]
async fn test_concurrent_requests_admit_exactly_one() {
    let harness = TestHarness::setup().await.unwrap();
    harness
        .chain
        .set_latency(Some(Duration::from_millis(100)));
    let tx = harness.pay_in_full();

    let responses = join_all((0..8).map(|i| {
        let prompt = format!("request {i}");
        let tx = tx.clone();
        let harness = &harness;
        async move { harness.post_prompt(Some(&tx), &prompt).await.status() }
    }))
    .await;

    let admitted = responses.iter().filter(|s| **s == StatusCode::OK).count();
    let refused = responses
        .iter()
        .filter(|s| **s == StatusCode::FORBIDDEN)
        .count();
    assert_eq!(admitted, 1, "{responses:?}");
    assert_eq!(refused, 7, "{responses:?}");
    assert_eq!(harness.backend.calls().len(), 1);

    harness.teardown().await;
}

#[tokio::test]
async fn test_events_are_published() {
    let mut harness = TestHarness::setup().await.unwrap();
    let mut events = harness.events().expect("event receiver");
    let tx = harness.pay_in_full();

    assert_eq!(
        harness.post_prompt(None, "hi").await.status(),
        StatusCode::PAYMENT_REQUIRED
    );
    assert_eq!(harness.post_prompt(Some(&tx), "hi").await.status(), StatusCode::OK);

    let mut seen = Vec::new();
    while let Ok(Ok(event)) = tokio::time::timeout(Duration::from_millis(500), events.recv()).await
    {
        let admitted = matches!(event, GateEvent::PaymentAdmitted { .. });
        seen.push(event);
        if admitted {
            break;
        }
    }

    assert!(seen.iter().any(|e| matches!(
        e,
        GateEvent::PaymentRejected { proof: None, reason } if reason == "payment_required"
    )));
    let expected_amount = harness.price().to_string();
    assert!(seen.iter().any(|e| matches!(
        e,
        GateEvent::PaymentAdmitted { proof, amount }
            if proof.eq_ignore_ascii_case(&tx) && *amount == expected_amount
    )));

    harness.teardown().await;
}

#[tokio::test]
async fn test_health_reports_counters() {
    let harness = TestHarness::setup().await.unwrap();
    let tx = harness.pay_in_full();

    harness.post_prompt(None, "hi").await;
    harness.post_prompt(Some(&tx), "hi").await;
    harness.post_prompt(Some(&tx), "hi").await;

    let response = harness.http().get(harness.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["verifier"]["admitted"], 1);
    assert_eq!(body["verifier"]["rejected"], 2);
    assert_eq!(body["verifier"]["errors"], 0);
    assert_eq!(body["store"]["entries"], 1);
    assert_eq!(body["store"]["insertions"], 1);
    assert_eq!(body["store"]["conflicts"], 1);

    harness.teardown().await;
}
