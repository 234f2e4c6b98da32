use crate::handlers::common::PaginationParams;
use crate::{
    auth::{AdminUser, AuthenticatedUser},
    entities::PaymentStatus,
    errors::ServiceError,
    services::OrderView,
    ApiResponse, AppState, PaginatedResponse,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::get,
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

/// Customer-facing order routes
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
}

/// Admin order routes
pub fn admin_orders_routes() -> Router<AppState> {
    Router::new().route("/orders", get(list_all_orders))
}

#[derive(Debug, Deserialize)]
pub struct OrderStatusFilter {
    /// Filter by payment status (created, paid, failed)
    pub status: Option<String>,
}

/// List the caller's orders
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    responses(
        (status = 200, description = "Caller's orders, newest first")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<Vec<OrderView>>>, ServiceError> {
    let orders = state
        .services
        .orders
        .list_for_customer(user.customer_id)
        .await?;

    Ok(Json(ApiResponse::success(orders)))
}

/// Get a single order (owner or admin)
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order detail"),
        (status = 403, description = "Order belongs to another customer", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderView>>, ServiceError> {
    let order = state.services.orders.get_order(id, &user).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// List all orders across customers
#[utoipa::path(
    get,
    path = "/api/v1/admin/orders",
    params(
        ("page" = Option<u64>, Query, description = "Page number (1-indexed)"),
        ("per_page" = Option<u64>, Query, description = "Page size"),
        ("status" = Option<String>, Query, description = "Filter by payment status")
    ),
    responses(
        (status = 200, description = "Paginated orders"),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<PaginationParams>,
    Query(filter): Query<OrderStatusFilter>,
) -> Result<Json<ApiResponse<PaginatedResponse<OrderView>>>, ServiceError> {
    let status = filter.status.as_deref().map(parse_status).transpose()?;

    let (orders, total) = state
        .services
        .orders
        .list_all(params.page, params.per_page, status)
        .await?;

    let response = PaginatedResponse {
        total_pages: total.div_ceil(params.per_page.max(1)),
        items: orders,
        total,
        page: params.page,
        limit: params.per_page,
    };

    Ok(Json(ApiResponse::success(response)))
}

fn parse_status(value: &str) -> Result<PaymentStatus, ServiceError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "created" | "pending" => Ok(PaymentStatus::Created),
        "paid" | "processing" => Ok(PaymentStatus::Paid),
        "failed" | "cancelled" | "canceled" => Ok(PaymentStatus::Failed),
        other => Err(ServiceError::ValidationError(format!(
            "invalid status filter: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn status_filter_accepts_both_vocabularies() {
        assert_eq!(parse_status("paid").unwrap(), PaymentStatus::Paid);
        assert_eq!(parse_status("processing").unwrap(), PaymentStatus::Paid);
        assert_eq!(parse_status("CANCELLED").unwrap(), PaymentStatus::Failed);
        assert_matches!(parse_status("shipped"), Err(ServiceError::ValidationError(_)));
    }
}
