use crate::handlers::common::validate_input;
use crate::{
    auth::AuthenticatedUser,
    errors::ServiceError,
    services::{cart::CartView, AddItemInput, UpdateItemInput},
    ApiResponse, AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for cart endpoints
pub fn carts_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(add_to_cart))
        .route("/", get(get_cart))
        .route("/", put(update_cart_item))
        .route("/:product_id", delete(remove_cart_item))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateItemRequest {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    /// 0 removes the line item
    #[validate(range(min = 0))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct VariantQuery {
    pub variant_id: Option<Uuid>,
}

/// Add an item to the caller's cart
#[utoipa::path(
    post,
    path = "/api/v1/cart",
    request_body = AddItemRequest,
    responses(
        (status = 200, description = "Updated cart"),
        (status = 404, description = "Product or variant not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Requested quantity exceeds stock", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent cart modification", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<AddItemRequest>,
) -> Result<Json<ApiResponse<CartView>>, ServiceError> {
    validate_input(&payload)?;

    let cart = state
        .services
        .cart
        .add_item(
            user.customer_id,
            AddItemInput {
                product_id: payload.product_id,
                variant_id: payload.variant_id,
                quantity: payload.quantity,
            },
        )
        .await?;

    Ok(Json(ApiResponse::success(cart)))
}

/// Get the caller's cart
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses(
        (status = 200, description = "Cart with derived totals and savings")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<CartView>>, ServiceError> {
    let cart = state.services.cart.get_cart(user.customer_id).await?;
    Ok(Json(ApiResponse::success(cart)))
}

/// Overwrite a line item's quantity (0 removes it)
#[utoipa::path(
    put,
    path = "/api/v1/cart",
    request_body = UpdateItemRequest,
    responses(
        (status = 200, description = "Updated cart"),
        (status = 404, description = "Cart or line item not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Requested quantity exceeds stock", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdateItemRequest>,
) -> Result<Json<ApiResponse<CartView>>, ServiceError> {
    validate_input(&payload)?;

    let cart = state
        .services
        .cart
        .update_item(
            user.customer_id,
            UpdateItemInput {
                product_id: payload.product_id,
                variant_id: payload.variant_id,
                quantity: payload.quantity,
            },
        )
        .await?;

    Ok(Json(ApiResponse::success(cart)))
}

/// Remove a line item from the cart
#[utoipa::path(
    delete,
    path = "/api/v1/cart/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product to remove"),
        ("variant_id" = Option<Uuid>, Query, description = "Variant to remove")
    ),
    responses(
        (status = 200, description = "Updated cart"),
        (status = 404, description = "Cart or line item not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_cart_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(product_id): Path<Uuid>,
    Query(query): Query<VariantQuery>,
) -> Result<Json<ApiResponse<CartView>>, ServiceError> {
    let cart = state
        .services
        .cart
        .remove_item(user.customer_id, product_id, query.variant_id)
        .await?;

    Ok(Json(ApiResponse::success(cart)))
}
