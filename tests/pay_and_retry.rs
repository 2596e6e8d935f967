//! End-to-end pay-and-retry against a real paywalled server

use async_trait::async_trait;
use axum::{response::Json, routing::get, Router};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::sync::oneshot;
use x402kit::middleware::{payment_middleware, Paywall, PaywallConfig};
use x402kit::server::{serve_listener, ServerConfig};
use x402kit::types::{PaymentChallenge, PaymentProof, PriceTable};
use x402kit::wallet::{Wallet, WalletError};
use x402kit::{X402Client, X402Error};

const PAY_TO: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";
const PAYER: &str = "ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG";

struct TestWallet;

#[async_trait]
impl Wallet for TestWallet {
    async fn sign(&self, challenge: &PaymentChallenge) -> Result<PaymentProof, WalletError> {
        Ok(
            PaymentProof::new(challenge.nonce.clone(), "0xsigned", challenge.amount)
                .with_payer(PAYER),
        )
    }
}

struct TestApi {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestApi {
    async fn start(facilitator: &ServerGuard) -> Self {
        let prices = PriceTable::from_prices([("/data", "0.01 STX")]).unwrap();
        let config = PaywallConfig::new(prices, PAY_TO).with_facilitator_url(facilitator.url());
        let paywall = Paywall::new(config).unwrap();

        let app = Router::new()
            .route(
                "/data",
                get(|| async { Json(json!({ "message": "This is paid data!" })) }),
            )
            .route("/", get(|| async { "Welcome to your x402kit API!" }))
            .layer(axum::middleware::from_fn_with_state(
                paywall,
                payment_middleware,
            ));

        let listener = ServerConfig::new("127.0.0.1:0").bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(serve_listener(listener, app, async {
            let _ = rx.await;
        }));

        Self {
            addr,
            shutdown: Some(tx),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestApi {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

#[tokio::test]
async fn test_client_pays_and_receives_data() {
    let mut facilitator = Server::new_async().await;
    let verify = facilitator
        .mock("POST", "/verify")
        .match_body(Matcher::PartialJson(json!({
            "paymentProof": { "amount": 10000, "payer": PAYER },
            "paymentChallenge": { "amount": 10000, "payTo": PAY_TO, "resource": "/data" }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "isValid": true, "payer": PAYER }).to_string())
        .expect(1)
        .create_async()
        .await;

    let api = TestApi::start(&facilitator).await;
    let client = X402Client::new(TestWallet).with_max_amount(10_000);

    let response = client.get(&api.url("/data")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-payment-receipt"));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "message": "This is paid data!" }));

    verify.assert_async().await;
}

#[tokio::test]
async fn test_free_route_needs_no_payment() {
    let facilitator = Server::new_async().await;
    let api = TestApi::start(&facilitator).await;

    let response = X402Client::new(TestWallet)
        .get(&api.url("/"))
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), "Welcome to your x402kit API!");
}

#[tokio::test]
async fn test_facilitator_outage_is_not_admitted() {
    let mut facilitator = Server::new_async().await;
    let _verify = facilitator
        .mock("POST", "/verify")
        .with_status(500)
        .create_async()
        .await;

    let api = TestApi::start(&facilitator).await;
    let err = X402Client::new(TestWallet)
        .get(&api.url("/data"))
        .await
        .unwrap_err();

    match err {
        X402Error::RetryExhausted { status, reason } => {
            assert_eq!(status, 503);
            assert_eq!(reason, "verification_unavailable");
        }
        other => panic!("expected RetryExhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_call_posts_and_decodes_json() {
    let mut facilitator = Server::new_async().await;
    let _verify = facilitator
        .mock("POST", "/verify")
        .with_status(200)
        .with_body(json!({ "isValid": true }).to_string())
        .create_async()
        .await;

    let prices = PriceTable::from_prices([("/rpc", "0.5 STX")]).unwrap();
    let config = PaywallConfig::new(prices, PAY_TO).with_facilitator_url(facilitator.url());
    let paywall = Paywall::new(config).unwrap();
    let app = Router::new()
        .route(
            "/rpc",
            axum::routing::post(|Json(body): Json<Value>| async move {
                Json(json!({ "echo": body }))
            }),
        )
        .layer(axum::middleware::from_fn_with_state(
            paywall,
            payment_middleware,
        ));

    let listener = ServerConfig::new("127.0.0.1:0").bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    let server = tokio::spawn(serve_listener(listener, app, async {
        let _ = rx.await;
    }));

    let answer = X402Client::new(TestWallet)
        .call(&format!("http://{}/rpc", addr), &json!({ "q": 1 }))
        .await
        .unwrap();
    assert_eq!(answer, json!({ "echo": { "q": 1 } }));

    tx.send(()).unwrap();
    server.await.unwrap().unwrap();
}
