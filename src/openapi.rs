use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI document for the storefront API.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::archive_product,
        crate::handlers::products::create_variant,
        crate::handlers::products::update_variant,
        crate::handlers::products::delete_variant,
        crate::handlers::carts::add_to_cart,
        crate::handlers::carts::get_cart,
        crate::handlers::carts::update_cart_item,
        crate::handlers::carts::remove_cart_item,
        crate::handlers::checkout::create_order,
        crate::handlers::checkout::create_buy_now_order,
        crate::handlers::checkout::verify_payment,
        crate::handlers::checkout::report_failure,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::list_all_orders,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::handlers::carts::AddItemRequest,
        crate::handlers::carts::UpdateItemRequest,
        crate::handlers::checkout::BuyNowRequest,
        crate::handlers::checkout::VerifyPaymentRequest,
        crate::handlers::checkout::ReportFailureRequest,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Catalog", description = "Public product catalog"),
        (name = "Cart", description = "Per-customer shopping cart"),
        (name = "Checkout", description = "Payment intents and verification"),
        (name = "Orders", description = "Order history derived from payments"),
        (name = "Admin", description = "Catalog and order administration")
    ),
    info(
        title = "aurum-api",
        description = "Jewellery storefront backend: catalog, carts, checkout and orders"
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Swagger UI router serving the generated document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
