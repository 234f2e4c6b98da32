use assert_matches::assert_matches;
use aurum_api::{
    config::AppConfig,
    errors::ServiceError,
    gateway::{PaymentGateway, RazorpayClient},
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> RazorpayClient {
    let mut cfg = AppConfig::new(
        "sqlite::memory:",
        "test_jwt_secret_that_is_long_enough_1234",
        "rzp_test_key",
        "rzp_test_secret",
        "test",
    );
    cfg.razorpay_base_url = server.uri();
    cfg.gateway_timeout_secs = 2;
    RazorpayClient::new(&cfg).unwrap()
}

#[tokio::test]
async fn create_order_posts_amount_and_decodes_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .and(header_exists("authorization"))
        .and(body_partial_json(json!({
            "amount": 200_000,
            "currency": "INR",
            "payment_capture": 1
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "order_live_123",
            "amount": 200_000,
            "currency": "INR",
            "receipt": "rcpt_abc",
            "status": "created"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let order = client
        .create_order(200_000, "INR", "rcpt_abc")
        .await
        .unwrap();

    assert_eq!(order.id, "order_live_123");
    assert_eq!(order.amount, 200_000);
    assert_eq!(order.currency, "INR");
    assert_eq!(client.key_id(), "rzp_test_key");
}

#[tokio::test]
async fn gateway_rejection_maps_to_gateway_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "description": "Authentication failed" }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.create_order(100, "INR", "rcpt_x").await.unwrap_err();

    assert_matches!(err, ServiceError::GatewayError(_));
}

#[tokio::test]
async fn malformed_gateway_response_is_a_gateway_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.create_order(100, "INR", "rcpt_y").await.unwrap_err();

    assert_matches!(err, ServiceError::GatewayError(_));
}

#[tokio::test]
async fn signature_verification_uses_the_configured_secret() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    let signature =
        aurum_api::gateway::sign_checkout("rzp_test_secret", "order_abc", "pay_xyz");
    assert!(client.verify_signature("order_abc", "pay_xyz", &signature));
    assert!(!client.verify_signature("order_abc", "pay_other", &signature));
}
