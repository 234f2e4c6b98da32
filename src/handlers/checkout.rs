use crate::handlers::common::validate_input;
use crate::{
    auth::AuthenticatedUser,
    errors::ServiceError,
    services::{
        CheckoutOrder, CheckoutSource, PaymentView, ReportFailureInput, VerifyPaymentInput,
    },
    ApiResponse, AppState,
};
use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for checkout endpoints
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/order", post(create_order))
        .route("/order/buy-now", post(create_buy_now_order))
        .route("/verify", post(verify_payment))
        .route("/failure", post(report_failure))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BuyNowRequest {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyPaymentRequest {
    #[validate(length(min = 1))]
    pub razorpay_order_id: String,
    #[validate(length(min = 1))]
    pub razorpay_payment_id: String,
    #[validate(length(min = 1))]
    pub razorpay_signature: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReportFailureRequest {
    #[validate(length(min = 1))]
    pub razorpay_order_id: String,
    pub reason: Option<String>,
}

/// Create a payment intent from the caller's cart
#[utoipa::path(
    post,
    path = "/api/v1/checkout/order",
    responses(
        (status = 200, description = "Gateway order and publishable key"),
        (status = 400, description = "Empty cart or invalid amount", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment gateway failure", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<CheckoutOrder>>, ServiceError> {
    let order = state
        .services
        .checkout
        .create_intent(user.customer_id, CheckoutSource::Cart)
        .await?;

    Ok(Json(ApiResponse::success(order)))
}

/// Create a payment intent for a single item, bypassing the cart
#[utoipa::path(
    post,
    path = "/api/v1/checkout/order/buy-now",
    request_body = BuyNowRequest,
    responses(
        (status = 200, description = "Gateway order and publishable key"),
        (status = 404, description = "Product or variant not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Requested quantity exceeds stock", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment gateway failure", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn create_buy_now_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<BuyNowRequest>,
) -> Result<Json<ApiResponse<CheckoutOrder>>, ServiceError> {
    validate_input(&payload)?;

    let order = state
        .services
        .checkout
        .create_intent(
            user.customer_id,
            CheckoutSource::BuyNow {
                product_id: payload.product_id,
                variant_id: payload.variant_id,
                quantity: payload.quantity,
            },
        )
        .await?;

    Ok(Json(ApiResponse::success(order)))
}

/// Verify a client-supplied payment confirmation
#[utoipa::path(
    post,
    path = "/api/v1/checkout/verify",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Settled payment intent"),
        (status = 400, description = "Signature mismatch", body = crate::errors::ErrorResponse),
        (status = 404, description = "No intent for the given order id", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(payload): Json<VerifyPaymentRequest>,
) -> Result<Json<ApiResponse<PaymentView>>, ServiceError> {
    validate_input(&payload)?;

    let payment = state
        .services
        .checkout
        .verify_payment(VerifyPaymentInput {
            razorpay_order_id: payload.razorpay_order_id,
            razorpay_payment_id: payload.razorpay_payment_id,
            razorpay_signature: payload.razorpay_signature,
        })
        .await?;

    Ok(Json(ApiResponse::success(payment.into())))
}

/// Record a client-reported payment failure
#[utoipa::path(
    post,
    path = "/api/v1/checkout/failure",
    request_body = ReportFailureRequest,
    responses(
        (status = 200, description = "Intent marked failed"),
        (status = 400, description = "Intent already captured", body = crate::errors::ErrorResponse),
        (status = 404, description = "No intent for the given order id", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn report_failure(
    State(state): State<AppState>,
    Json(payload): Json<ReportFailureRequest>,
) -> Result<Json<ApiResponse<PaymentView>>, ServiceError> {
    validate_input(&payload)?;

    let payment = state
        .services
        .checkout
        .report_failure(ReportFailureInput {
            razorpay_order_id: payload.razorpay_order_id,
            reason: payload.reason,
        })
        .await?;

    Ok(Json(ApiResponse::success(payment.into())))
}
