use crate::{
    entities::{cart, cart_item, product, product_variant, Cart, CartItem, Product, ProductVariant},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, SimpleExpr},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Shopping cart service; one cart per customer.
///
/// Every mutation runs in a single transaction: line-item write, rollup
/// recompute and an optimistic version check. Prices are captured when a line
/// is created and are never re-derived from the catalog afterwards.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Adds an item to the customer's cart, creating the cart lazily.
    ///
    /// Re-adding the same `(product, variant)` pair increments the existing
    /// line instead of duplicating it. The captured unit price of an existing
    /// line is kept; only new lines capture the current effective price.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        customer_id: Uuid,
        input: AddItemInput,
    ) -> Result<CartView, ServiceError> {
        if input.quantity < 1 {
            return Err(ServiceError::ValidationError(
                "quantity must be at least 1".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let (product, variant) =
            resolve_listing(&txn, input.product_id, input.variant_id, true).await?;
        let available = available_stock(&product, variant.as_ref());
        if available <= 0 {
            return Err(ServiceError::InsufficientStock(format!(
                "{} is out of stock",
                product.title
            )));
        }

        let cart = self.get_or_create_cart(&txn, customer_id).await?;

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(input.product_id))
            .filter(variant_condition(input.variant_id))
            .one(&txn)
            .await?;

        let new_quantity = existing.as_ref().map_or(0, |i| i.quantity) + input.quantity;
        if new_quantity > available {
            return Err(ServiceError::InsufficientStock(format!(
                "only {} left in stock for {}",
                available, product.title
            )));
        }

        if let Some(item) = existing {
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(new_quantity);
            item.updated_at = Set(Utc::now());
            item.update(&txn).await?;
        } else {
            let unit_price = variant
                .as_ref()
                .map(|v| v.effective_price())
                .unwrap_or_else(|| product.effective_price());

            let item = cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(input.product_id),
                variant_id: Set(input.variant_id),
                quantity: Set(input.quantity),
                unit_price: Set(unit_price),
                created_at: Set(Utc::now()),
                updated_at: Set(Utc::now()),
            };
            item.insert(&txn).await?;
        }

        commit_rollups(&txn, &cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: cart.id,
                product_id: input.product_id,
            })
            .await;

        info!(
            "Added item to cart {}: product {} x{}",
            cart.id, input.product_id, input.quantity
        );
        self.get_cart(customer_id).await
    }

    /// Overwrites the quantity of a line item; quantity 0 removes the line.
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        customer_id: Uuid,
        input: UpdateItemInput,
    ) -> Result<CartView, ServiceError> {
        if input.quantity < 0 {
            return Err(ServiceError::ValidationError(
                "quantity cannot be negative".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let cart = self.find_cart(&txn, customer_id).await?;

        let item = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(input.product_id))
            .filter(variant_condition(input.variant_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Item not found in cart".to_string()))?;

        if input.quantity == 0 {
            let active: cart_item::ActiveModel = item.into();
            active.delete(&txn).await?;
        } else {
            let (product, variant) =
                resolve_listing(&txn, input.product_id, input.variant_id, false).await?;
            let available = available_stock(&product, variant.as_ref());
            if input.quantity > available {
                return Err(ServiceError::InsufficientStock(format!(
                    "only {} left in stock for {}",
                    available, product.title
                )));
            }

            let mut active: cart_item::ActiveModel = item.into();
            active.quantity = Set(input.quantity);
            active.updated_at = Set(Utc::now());
            active.update(&txn).await?;
        }

        commit_rollups(&txn, &cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemUpdated {
                cart_id: cart.id,
                product_id: input.product_id,
            })
            .await;

        self.get_cart(customer_id).await
    }

    /// Removes a line item from the cart.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
        variant_id: Option<Uuid>,
    ) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = self.find_cart(&txn, customer_id).await?;

        let item = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .filter(variant_condition(variant_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Item not found in cart".to_string()))?;

        let active: cart_item::ActiveModel = item.into();
        active.delete(&txn).await?;

        commit_rollups(&txn, &cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                cart_id: cart.id,
                product_id,
            })
            .await;

        self.get_cart(customer_id).await
    }

    /// Returns the customer's cart with derived totals and savings.
    ///
    /// A pure read: a customer without a cart gets an empty view and nothing
    /// is persisted.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, customer_id: Uuid) -> Result<CartView, ServiceError> {
        let Some(cart) = Cart::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?
        else {
            return Ok(CartView::empty());
        };

        build_cart_view(&*self.db, &cart).await
    }

    /// Empties the cart and zeroes its rollups.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, customer_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let cart = self.find_cart(&txn, customer_id).await?;
        clear_cart_items(&txn, &cart).await?;

        txn.commit().await?;

        self.event_sender.send_or_log(Event::CartCleared(cart.id)).await;

        info!("Cleared cart: {}", cart.id);
        Ok(())
    }

    async fn find_cart<C: ConnectionTrait>(
        &self,
        conn: &C,
        customer_id: Uuid,
    ) -> Result<cart::Model, ServiceError> {
        Cart::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart not found".to_string()))
    }

    async fn get_or_create_cart<C: ConnectionTrait>(
        &self,
        conn: &C,
        customer_id: Uuid,
    ) -> Result<cart::Model, ServiceError> {
        if let Some(existing) = Cart::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .one(conn)
            .await?
        {
            return Ok(existing);
        }

        let cart_id = Uuid::new_v4();
        let cart = cart::ActiveModel {
            id: Set(cart_id),
            customer_id: Set(customer_id),
            total_items: Set(0),
            total_price: Set(Decimal::ZERO),
            version: Set(1),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        let cart = cart.insert(conn).await?;

        self.event_sender.send_or_log(Event::CartCreated(cart_id)).await;
        Ok(cart)
    }
}

/// Recomputes the rollups from the cart's current items and writes them with
/// an optimistic version check. Zero rows matched means another request won
/// the race; the transaction rolls back and the caller sees `Conflict`.
pub(crate) async fn commit_rollups<C: ConnectionTrait>(
    conn: &C,
    cart: &cart::Model,
) -> Result<(), ServiceError> {
    let items = CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .all(conn)
        .await?;

    let total_items: i32 = items.iter().map(|i| i.quantity).sum();
    let total_price: Decimal = items.iter().map(|i| i.line_total()).sum();

    let result = Cart::update_many()
        .col_expr(cart::Column::TotalItems, Expr::value(total_items))
        .col_expr(cart::Column::TotalPrice, Expr::value(total_price))
        .col_expr(cart::Column::Version, Expr::value(cart.version + 1))
        .col_expr(cart::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(cart::Column::Id.eq(cart.id))
        .filter(cart::Column::Version.eq(cart.version))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(ServiceError::Conflict(
            "cart was modified concurrently, retry the request".to_string(),
        ));
    }

    Ok(())
}

/// Deletes all items and zeroes the rollups. Runs inside the caller's
/// transaction; used by checkout once a payment is durably captured.
pub(crate) async fn clear_cart_items<C: ConnectionTrait>(
    conn: &C,
    cart: &cart::Model,
) -> Result<(), ServiceError> {
    CartItem::delete_many()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .exec(conn)
        .await?;

    Cart::update_many()
        .col_expr(cart::Column::TotalItems, Expr::value(0))
        .col_expr(cart::Column::TotalPrice, Expr::value(Decimal::ZERO))
        .col_expr(
            cart::Column::Version,
            Expr::col(cart::Column::Version).add(1),
        )
        .col_expr(cart::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(cart::Column::Id.eq(cart.id))
        .exec(conn)
        .await?;

    Ok(())
}

/// Loads the product (and variant, when given) backing a listing.
/// `require_active` is set for add-to-cart; quantity updates on lines whose
/// product has since been archived are still allowed.
pub(crate) async fn resolve_listing<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    variant_id: Option<Uuid>,
    require_active: bool,
) -> Result<(product::Model, Option<product_variant::Model>), ServiceError> {
    let product = Product::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

    if require_active && !product.is_active {
        return Err(ServiceError::InvalidOperation(format!(
            "{} is no longer available",
            product.title
        )));
    }

    let variant = match variant_id {
        Some(id) => {
            let variant = ProductVariant::find_by_id(id)
                .one(conn)
                .await?
                .filter(|v| v.product_id == product_id)
                .ok_or_else(|| {
                    ServiceError::NotFound(format!(
                        "Variant {} not found for product {}",
                        id, product_id
                    ))
                })?;
            Some(variant)
        }
        None => None,
    };

    Ok((product, variant))
}

pub(crate) fn available_stock(
    product: &product::Model,
    variant: Option<&product_variant::Model>,
) -> i32 {
    variant.map_or(product.total_stock, |v| v.stock_quantity)
}

fn variant_condition(variant_id: Option<Uuid>) -> SimpleExpr {
    match variant_id {
        Some(id) => cart_item::Column::VariantId.eq(id),
        None => cart_item::Column::VariantId.is_null(),
    }
}

/// Builds the populated cart view: lines joined to product summaries,
/// derived totals and the savings against current base prices.
pub(crate) async fn build_cart_view<C: ConnectionTrait>(
    conn: &C,
    cart: &cart::Model,
) -> Result<CartView, ServiceError> {
    let items = CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .order_by_asc(cart_item::Column::CreatedAt)
        .all(conn)
        .await?;

    let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    let products: HashMap<Uuid, product::Model> = Product::find()
        .filter(product::Column::Id.is_in(product_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let variant_ids: Vec<Uuid> = items.iter().filter_map(|i| i.variant_id).collect();
    let variants: HashMap<Uuid, product_variant::Model> = if variant_ids.is_empty() {
        HashMap::new()
    } else {
        ProductVariant::find()
            .filter(product_variant::Column::Id.is_in(variant_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|v| (v.id, v))
            .collect()
    };

    let mut views = Vec::with_capacity(items.len());
    let mut total_items = 0;
    let mut total_price = Decimal::ZERO;
    let mut total_savings = Decimal::ZERO;

    for item in &items {
        let product = products.get(&item.product_id);
        let variant = item.variant_id.and_then(|id| variants.get(&id));

        let base_price = variant
            .map(|v| v.price)
            .or_else(|| product.map(|p| p.price));
        if let Some(base) = base_price {
            if base > item.unit_price {
                total_savings += (base - item.unit_price) * Decimal::from(item.quantity);
            }
        }

        total_items += item.quantity;
        total_price += item.line_total();

        views.push(CartItemView {
            product_id: item.product_id,
            variant_id: item.variant_id,
            title: product.map_or_else(|| "(unavailable)".to_string(), |p| p.title.clone()),
            variant_name: variant.map(|v| v.name.clone()),
            image: product.and_then(first_image),
            quantity: item.quantity,
            unit_price: item.unit_price,
            line_total: item.line_total(),
        });
    }

    Ok(CartView {
        id: Some(cart.id),
        total_items,
        total_price,
        total_savings,
        items: views,
    })
}

fn first_image(product: &product::Model) -> Option<String> {
    product
        .images
        .as_array()
        .and_then(|a| a.first())
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Input for adding an item to the cart
#[derive(Debug, Deserialize)]
pub struct AddItemInput {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
}

/// Input for overwriting a line's quantity (0 removes it)
#[derive(Debug, Deserialize)]
pub struct UpdateItemInput {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
}

/// Populated cart returned to the storefront
#[derive(Debug, Serialize)]
pub struct CartView {
    /// Absent until the first add-to-cart creates the cart
    pub id: Option<Uuid>,
    pub total_items: i32,
    pub total_price: Decimal,
    pub total_savings: Decimal,
    pub items: Vec<CartItemView>,
}

impl CartView {
    pub fn empty() -> Self {
        Self {
            id: None,
            total_items: 0,
            total_price: Decimal::ZERO,
            total_savings: Decimal::ZERO,
            items: Vec::new(),
        }
    }
}

/// Cart line joined to a lightweight product summary
#[derive(Debug, Serialize)]
pub struct CartItemView {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub title: String,
    pub variant_name: Option<String>,
    pub image: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn empty_view_has_zero_rollups() {
        let view = CartView::empty();
        assert_eq!(view.total_items, 0);
        assert_eq!(view.total_price, Decimal::ZERO);
        assert_eq!(view.total_savings, Decimal::ZERO);
        assert!(view.items.is_empty());
    }

    #[test]
    fn line_total_is_quantity_times_captured_price() {
        let item = cart_item::Model {
            id: Uuid::new_v4(),
            cart_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            variant_id: None,
            quantity: 3,
            unit_price: dec!(299.50),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(item.line_total(), dec!(898.50));
    }

    proptest! {
        // Rollups are always the fold over line items, whatever the lines are.
        #[test]
        fn rollups_equal_fold_over_items(
            lines in prop::collection::vec((1i32..50, 1u32..100_000u32), 0..8)
        ) {
            let items: Vec<cart_item::Model> = lines
                .iter()
                .map(|(qty, paise)| cart_item::Model {
                    id: Uuid::new_v4(),
                    cart_id: Uuid::new_v4(),
                    product_id: Uuid::new_v4(),
                    variant_id: None,
                    quantity: *qty,
                    unit_price: Decimal::new(*paise as i64, 2),
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                })
                .collect();

            let total_price: Decimal = items.iter().map(|i| i.line_total()).sum();

            let expected_price: Decimal = items
                .iter()
                .map(|i| i.unit_price * Decimal::from(i.quantity))
                .sum();

            prop_assert_eq!(total_price, expected_price);
            prop_assert!(total_price >= Decimal::ZERO);
        }
    }
}
