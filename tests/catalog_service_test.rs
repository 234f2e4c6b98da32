mod common;

use assert_matches::assert_matches;
use aurum_api::{
    errors::ServiceError,
    services::catalog::{
        CreateProductInput, CreateVariantInput, ProductSearchQuery, UpdateProductInput,
        UpdateVariantInput,
    },
};
use common::TestApp;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn ring_input(sku: &str) -> CreateProductInput {
    CreateProductInput {
        title: "Classic Gold Ring".to_string(),
        slug: None,
        description: "22k gold, handmade".to_string(),
        category: "rings".to_string(),
        sku: sku.to_string(),
        price: dec!(12000),
        sale_price: Some(dec!(9999)),
        total_stock: 7,
        is_active: None,
        images: vec!["https://cdn.example/ring.jpg".to_string()],
        attributes: Some(serde_json::json!({"metal": "gold", "purity": "22k"})),
    }
}

#[tokio::test]
async fn product_crud_round_trip() {
    let app = TestApp::new().await;
    let catalog = &app.state.services.catalog;

    let created = catalog.create_product(ring_input("AU-R-1")).await.unwrap();
    assert_eq!(created.slug, "classic-gold-ring");
    assert!(created.is_active);
    assert_eq!(created.effective_price(), dec!(9999));

    let updated = catalog
        .update_product(
            created.id,
            UpdateProductInput {
                price: Some(dec!(13000)),
                clear_sale_price: true,
                total_stock: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.price, dec!(13000));
    assert_eq!(updated.sale_price, None);
    assert_eq!(updated.total_stock, 3);

    let fetched = catalog.get_product(created.id).await.unwrap();
    assert_eq!(fetched.price, dec!(13000));
}

#[tokio::test]
async fn duplicate_sku_is_rejected() {
    let app = TestApp::new().await;
    let catalog = &app.state.services.catalog;

    catalog.create_product(ring_input("AU-R-DUP")).await.unwrap();
    let err = catalog.create_product(ring_input("AU-R-DUP")).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn archived_products_are_hidden_from_the_public_listing() {
    let app = TestApp::new().await;
    let catalog = &app.state.services.catalog;

    let keep = catalog.create_product(ring_input("AU-KEEP")).await.unwrap();
    let gone = catalog.create_product(ring_input("AU-GONE")).await.unwrap();

    catalog.archive_product(gone.id).await.unwrap();

    let result = catalog
        .search_products(ProductSearchQuery {
            is_active: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();

    let ids: Vec<Uuid> = result.products.iter().map(|p| p.id).collect();
    assert!(ids.contains(&keep.id));
    assert!(!ids.contains(&gone.id));

    // The archived product is still readable directly (order history needs it)
    let archived = catalog.get_product(gone.id).await.unwrap();
    assert!(!archived.is_active);
}

#[tokio::test]
async fn variant_lifecycle() {
    let app = TestApp::new().await;
    let catalog = &app.state.services.catalog;

    let product = catalog.create_product(ring_input("AU-VAR")).await.unwrap();

    let variant = catalog
        .create_variant(
            product.id,
            CreateVariantInput {
                sku: "AU-VAR-S6".to_string(),
                name: "Size 6".to_string(),
                price: dec!(12500),
                sale_price: None,
                stock_quantity: 4,
                position: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(variant.product_id, product.id);

    let updated = catalog
        .update_variant(
            variant.id,
            UpdateVariantInput {
                stock_quantity: Some(9),
                sale_price: Some(dec!(11000)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.stock_quantity, 9);
    assert_eq!(updated.effective_price(), dec!(11000));

    let with_variants = catalog.get_product_with_variants(product.id).await.unwrap();
    assert_eq!(with_variants.variants.len(), 1);

    catalog.delete_variant(variant.id).await.unwrap();
    let with_variants = catalog.get_product_with_variants(product.id).await.unwrap();
    assert!(with_variants.variants.is_empty());

    assert_matches!(
        catalog.delete_variant(variant.id).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn variant_for_missing_product_is_rejected() {
    let app = TestApp::new().await;

    let err = app
        .state
        .services
        .catalog
        .create_variant(
            Uuid::new_v4(),
            CreateVariantInput {
                sku: "AU-NOPE".to_string(),
                name: "Size 7".to_string(),
                price: dec!(100),
                sale_price: None,
                stock_quantity: 1,
                position: None,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn search_matches_title() {
    let app = TestApp::new().await;
    let catalog = &app.state.services.catalog;

    catalog.create_product(ring_input("AU-S-1")).await.unwrap();
    let mut other = ring_input("AU-S-2");
    other.title = "Emerald Pendant".to_string();
    catalog.create_product(other).await.unwrap();

    let result = catalog
        .search_products(ProductSearchQuery {
            search: Some("Pendant".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(result.total, 1);
    assert_eq!(result.products[0].title, "Emerald Pendant");
}
