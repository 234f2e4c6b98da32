mod common;

use assert_matches::assert_matches;
use aurum_api::{
    entities::{cart, product, Cart},
    errors::ServiceError,
    services::{AddItemInput, UpdateItemInput},
};
use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

fn add(product_id: Uuid, variant_id: Option<Uuid>, quantity: i32) -> AddItemInput {
    AddItemInput {
        product_id,
        variant_id,
        quantity,
    }
}

fn update(product_id: Uuid, variant_id: Option<Uuid>, quantity: i32) -> UpdateItemInput {
    UpdateItemInput {
        product_id,
        variant_id,
        quantity,
    }
}

async fn stored_cart(app: &TestApp, customer_id: Uuid) -> cart::Model {
    Cart::find()
        .filter(cart::Column::CustomerId.eq(customer_id))
        .one(&*app.state.db)
        .await
        .unwrap()
        .expect("cart should exist")
}

#[tokio::test]
async fn get_cart_for_new_customer_is_empty() {
    let app = TestApp::new().await;
    let view = app.state.services.cart.get_cart(Uuid::new_v4()).await.unwrap();

    assert!(view.id.is_none());
    assert_eq!(view.total_items, 0);
    assert_eq!(view.total_price, Decimal::ZERO);
    assert!(view.items.is_empty());
}

#[tokio::test]
async fn add_item_creates_cart_and_rolls_up_totals() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let ring = app.seed_product("Gold Ring", dec!(1000), None, 5).await;

    let view = app
        .state
        .services
        .cart
        .add_item(customer, add(ring, None, 2))
        .await
        .unwrap();

    assert_eq!(view.total_items, 2);
    assert_eq!(view.total_price, dec!(2000));
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].unit_price, dec!(1000));
    assert_eq!(view.items[0].line_total, dec!(2000));

    // Persisted rollups equal the fold over items
    let stored = stored_cart(&app, customer).await;
    assert_eq!(stored.total_items, 2);
    assert_eq!(stored.total_price, dec!(2000));
}

#[tokio::test]
async fn re_adding_same_pair_increments_instead_of_duplicating() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let ring = app.seed_product("Gold Ring", dec!(500), None, 10).await;

    app.state
        .services
        .cart
        .add_item(customer, add(ring, None, 2))
        .await
        .unwrap();
    let view = app
        .state
        .services
        .cart
        .add_item(customer, add(ring, None, 3))
        .await
        .unwrap();

    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].quantity, 5);
    assert_eq!(view.total_price, dec!(2500));
}

#[tokio::test]
async fn variant_and_base_product_are_separate_lines() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let chain = app.seed_product("Chain", dec!(800), None, 10).await;
    let long_chain = app
        .seed_variant(chain, "22 inch", dec!(950), None, 4)
        .await;

    app.state
        .services
        .cart
        .add_item(customer, add(chain, None, 1))
        .await
        .unwrap();
    let view = app
        .state
        .services
        .cart
        .add_item(customer, add(chain, Some(long_chain), 2))
        .await
        .unwrap();

    assert_eq!(view.items.len(), 2);
    assert_eq!(view.total_items, 3);
    assert_eq!(view.total_price, dec!(800) + dec!(950) * Decimal::from(2));
}

#[tokio::test]
async fn sale_price_is_captured_and_savings_derived() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let pendant = app
        .seed_product("Pendant", dec!(1000), Some(dec!(799.50)), 5)
        .await;

    let view = app
        .state
        .services
        .cart
        .add_item(customer, add(pendant, None, 2))
        .await
        .unwrap();

    assert_eq!(view.items[0].unit_price, dec!(799.50));
    assert_eq!(view.total_price, dec!(1599.00));
    // (1000 - 799.50) * 2
    assert_eq!(view.total_savings, dec!(401.00));
}

#[tokio::test]
async fn add_rejects_quantity_exceeding_stock_and_leaves_cart_unchanged() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let ring = app.seed_product("Ring", dec!(1000), None, 5).await;

    app.state
        .services
        .cart
        .add_item(customer, add(ring, None, 4))
        .await
        .unwrap();

    // 4 in cart + 2 more would exceed the 5 in stock
    let err = app
        .state
        .services
        .cart
        .add_item(customer, add(ring, None, 2))
        .await
        .unwrap_err();
    // The error reports the available maximum
    assert_matches!(err, ServiceError::InsufficientStock(msg) if msg.contains('5'));

    let view = app.state.services.cart.get_cart(customer).await.unwrap();
    assert_eq!(view.total_items, 4);
}

#[tokio::test]
async fn add_rejects_out_of_stock_product() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let ring = app.seed_product("Ring", dec!(1000), None, 0).await;

    let err = app
        .state
        .services
        .cart
        .add_item(customer, add(ring, None, 1))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));
}

#[tokio::test]
async fn add_rejects_unknown_product_and_foreign_variant() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();

    let err = app
        .state
        .services
        .cart
        .add_item(customer, add(Uuid::new_v4(), None, 1))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    // A variant that belongs to a different product is rejected
    let ring = app.seed_product("Ring", dec!(1000), None, 5).await;
    let other = app.seed_product("Other", dec!(500), None, 5).await;
    let other_variant = app.seed_variant(other, "Size 6", dec!(550), None, 5).await;

    let err = app
        .state
        .services
        .cart
        .add_item(customer, add(ring, Some(other_variant), 1))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn update_overwrites_quantity_after_stock_check() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let ring = app.seed_product("Ring", dec!(1000), None, 5).await;

    app.state
        .services
        .cart
        .add_item(customer, add(ring, None, 2))
        .await
        .unwrap();

    let view = app
        .state
        .services
        .cart
        .update_item(customer, update(ring, None, 3))
        .await
        .unwrap();
    assert_eq!(view.total_items, 3);
    assert_eq!(view.total_price, dec!(3000));

    // Exceeding stock is rejected and the cart stays at the previous state
    let err = app
        .state
        .services
        .cart
        .update_item(customer, update(ring, None, 6))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));

    let view = app.state.services.cart.get_cart(customer).await.unwrap();
    assert_eq!(view.total_items, 3);
}

#[tokio::test]
async fn update_to_zero_removes_line_and_second_removal_errors() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let ring = app.seed_product("Ring", dec!(1000), None, 5).await;

    app.state
        .services
        .cart
        .add_item(customer, add(ring, None, 2))
        .await
        .unwrap();

    let view = app
        .state
        .services
        .cart
        .update_item(customer, update(ring, None, 0))
        .await
        .unwrap();
    assert_eq!(view.total_items, 0);
    assert!(view.items.is_empty());

    // Removing an already-removed line is a clean error, not a crash
    let err = app
        .state
        .services
        .cart
        .remove_item(customer, ring, None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn update_without_cart_is_not_found() {
    let app = TestApp::new().await;
    let ring = app.seed_product("Ring", dec!(1000), None, 5).await;

    let err = app
        .state
        .services
        .cart
        .update_item(Uuid::new_v4(), update(ring, None, 1))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn captured_price_survives_catalog_price_changes() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let ring = app.seed_product("Ring", dec!(1000), None, 5).await;

    app.state
        .services
        .cart
        .add_item(customer, add(ring, None, 2))
        .await
        .unwrap();

    // Reprice the product after the item entered the cart
    let model = product::Entity::find_by_id(ring)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    let mut active: product::ActiveModel = model.into();
    active.price = Set(dec!(1500));
    active.update(&*app.state.db).await.unwrap();

    let view = app.state.services.cart.get_cart(customer).await.unwrap();
    assert_eq!(view.items[0].unit_price, dec!(1000));
    assert_eq!(view.total_price, dec!(2000));
    // The raised base price now shows up as savings instead
    assert_eq!(view.total_savings, dec!(1000));
}

#[tokio::test]
async fn version_increments_on_every_mutation() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let ring = app.seed_product("Ring", dec!(1000), None, 10).await;

    app.state
        .services
        .cart
        .add_item(customer, add(ring, None, 1))
        .await
        .unwrap();
    let v1 = stored_cart(&app, customer).await.version;

    app.state
        .services
        .cart
        .add_item(customer, add(ring, None, 1))
        .await
        .unwrap();
    let v2 = stored_cart(&app, customer).await.version;

    app.state
        .services
        .cart
        .update_item(customer, update(ring, None, 5))
        .await
        .unwrap();
    let v3 = stored_cart(&app, customer).await.version;

    assert!(v2 > v1);
    assert!(v3 > v2);
}

#[tokio::test]
async fn clear_cart_zeroes_everything() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let ring = app.seed_product("Ring", dec!(1000), None, 5).await;
    let chain = app.seed_product("Chain", dec!(700), None, 5).await;

    app.state
        .services
        .cart
        .add_item(customer, add(ring, None, 2))
        .await
        .unwrap();
    app.state
        .services
        .cart
        .add_item(customer, add(chain, None, 1))
        .await
        .unwrap();

    app.state.services.cart.clear_cart(customer).await.unwrap();

    let view = app.state.services.cart.get_cart(customer).await.unwrap();
    assert_eq!(view.total_items, 0);
    assert_eq!(view.total_price, Decimal::ZERO);
    assert!(view.items.is_empty());

    let stored = stored_cart(&app, customer).await;
    assert_eq!(stored.total_items, 0);
    assert_eq!(stored.total_price, Decimal::ZERO);
}

#[tokio::test]
async fn archived_product_cannot_be_added() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let ring = app.seed_product("Ring", dec!(1000), None, 5).await;

    app.state.services.catalog.archive_product(ring).await.unwrap();

    let err = app
        .state
        .services
        .cart
        .add_item(customer, add(ring, None, 1))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));
}
