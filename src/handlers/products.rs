use crate::{
    auth::AdminUser,
    errors::ServiceError,
    services::catalog::{
        CreateProductInput, CreateVariantInput, ProductSearchQuery, ProductSearchResult,
        ProductWithVariants, UpdateProductInput, UpdateVariantInput,
    },
    ApiResponse, AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

/// Public catalog routes
pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product))
}

/// Admin catalog CRUD routes
pub fn admin_products_routes() -> Router<AppState> {
    Router::new()
        .route("/products", post(create_product))
        .route("/products/:id", put(update_product))
        .route("/products/:id", delete(archive_product))
        .route("/products/:id/variants", post(create_variant))
        .route("/variants/:id", put(update_variant))
        .route("/variants/:id", delete(delete_variant))
}

#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// List active products
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(
        ("search" = Option<String>, Query, description = "Match against title or SKU"),
        ("category" = Option<String>, Query, description = "Filter by category"),
        ("limit" = Option<u64>, Query, description = "Page size (max 100)"),
        ("offset" = Option<u64>, Query, description = "Offset into the result set")
    ),
    responses(
        (status = 200, description = "Matching products, newest first")
    ),
    tag = "Catalog"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<ApiResponse<ProductSearchResult>>, ServiceError> {
    let result = state
        .services
        .catalog
        .search_products(ProductSearchQuery {
            search: query.search,
            category: query.category,
            // The public listing only ever shows live products
            is_active: Some(true),
            limit: query.limit,
            offset: query.offset,
        })
        .await?;

    Ok(Json(ApiResponse::success(result)))
}

/// Get a product with its variants
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product with variants"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ProductWithVariants>>, ServiceError> {
    let product = state.services.catalog.get_product_with_variants(id).await?;
    Ok(Json(ApiResponse::success(product)))
}

/// Create a product
#[utoipa::path(
    post,
    path = "/api/v1/admin/products",
    responses(
        (status = 200, description = "Created product"),
        (status = 400, description = "Duplicate SKU or invalid input", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(input): Json<CreateProductInput>,
) -> Result<Json<ApiResponse<crate::entities::ProductModel>>, ServiceError> {
    if input.price <= rust_decimal::Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "price must be positive".to_string(),
        ));
    }
    if input.total_stock < 0 {
        return Err(ServiceError::ValidationError(
            "stock cannot be negative".to_string(),
        ));
    }

    let product = state.services.catalog.create_product(input).await?;
    Ok(Json(ApiResponse::success(product)))
}

/// Update a product
#[utoipa::path(
    put,
    path = "/api/v1/admin/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Updated product"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateProductInput>,
) -> Result<Json<ApiResponse<crate::entities::ProductModel>>, ServiceError> {
    let product = state.services.catalog.update_product(id, input).await?;
    Ok(Json(ApiResponse::success(product)))
}

/// Archive a product (soft delete)
#[utoipa::path(
    delete,
    path = "/api/v1/admin/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Archived product"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn archive_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<crate::entities::ProductModel>>, ServiceError> {
    let product = state.services.catalog.archive_product(id).await?;
    Ok(Json(ApiResponse::success(product)))
}

/// Add a variant to a product
#[utoipa::path(
    post,
    path = "/api/v1/admin/products/{id}/variants",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Created variant"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_variant(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(input): Json<CreateVariantInput>,
) -> Result<Json<ApiResponse<crate::entities::ProductVariantModel>>, ServiceError> {
    let variant = state.services.catalog.create_variant(id, input).await?;
    Ok(Json(ApiResponse::success(variant)))
}

/// Update a variant
#[utoipa::path(
    put,
    path = "/api/v1/admin/variants/{id}",
    params(("id" = Uuid, Path, description = "Variant ID")),
    responses(
        (status = 200, description = "Updated variant"),
        (status = 404, description = "Variant not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_variant(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateVariantInput>,
) -> Result<Json<ApiResponse<crate::entities::ProductVariantModel>>, ServiceError> {
    let variant = state.services.catalog.update_variant(id, input).await?;
    Ok(Json(ApiResponse::success(variant)))
}

/// Delete a variant
#[utoipa::path(
    delete,
    path = "/api/v1/admin/variants/{id}",
    params(("id" = Uuid, Path, description = "Variant ID")),
    responses(
        (status = 200, description = "Variant deleted"),
        (status = 404, description = "Variant not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_variant(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ServiceError> {
    state.services.catalog.delete_variant(id).await?;
    Ok(Json(ApiResponse::success(
        serde_json::json!({ "deleted": id }),
    )))
}
