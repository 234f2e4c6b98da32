use crate::{
    auth::AuthenticatedUser,
    entities::{payment_intent, product, PaymentIntent, PaymentIntentModel, PaymentStatus, Product},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Read side over payment intents: a paid intent *is* the order.
///
/// Purely derived; nothing here writes. Display status is mapped from the
/// payment status, and snapshot lines are joined to current product
/// summaries for images.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Lists the customer's orders, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_customer(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<OrderView>, ServiceError> {
        let intents = PaymentIntent::find()
            .filter(payment_intent::Column::CustomerId.eq(customer_id))
            .order_by_desc(payment_intent::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        self.build_views(intents).await
    }

    /// Fetches one order; the owner or an admin may read it.
    #[instrument(skip(self, requester))]
    pub async fn get_order(
        &self,
        order_id: Uuid,
        requester: &AuthenticatedUser,
    ) -> Result<OrderView, ServiceError> {
        let intent = PaymentIntent::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if intent.customer_id != requester.customer_id && !requester.is_admin() {
            return Err(ServiceError::Forbidden(
                "order belongs to another customer".to_string(),
            ));
        }

        let mut views = self.build_views(vec![intent]).await?;
        Ok(views.remove(0))
    }

    /// Admin listing across all customers with optional status filter.
    #[instrument(skip(self))]
    pub async fn list_all(
        &self,
        page: u64,
        per_page: u64,
        status: Option<PaymentStatus>,
    ) -> Result<(Vec<OrderView>, u64), ServiceError> {
        let mut query = PaymentIntent::find();
        if let Some(status) = status {
            query = query.filter(payment_intent::Column::Status.eq(status));
        }

        let paginator = query
            .order_by_desc(payment_intent::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));

        let total = paginator.num_items().await?;
        let intents = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((self.build_views(intents).await?, total))
    }

    async fn build_views(
        &self,
        intents: Vec<PaymentIntentModel>,
    ) -> Result<Vec<OrderView>, ServiceError> {
        let mut product_ids = Vec::new();
        let mut decoded = Vec::with_capacity(intents.len());

        for intent in intents {
            let items = intent
                .snapshot_items()
                .map_err(|e| ServiceError::SerializationError(e.to_string()))?;
            product_ids.extend(items.iter().map(|i| i.product_id));
            decoded.push((intent, items));
        }

        let images: HashMap<Uuid, Option<String>> = if product_ids.is_empty() {
            HashMap::new()
        } else {
            Product::find()
                .filter(product::Column::Id.is_in(product_ids))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|p| (p.id, first_image(&p)))
                .collect()
        };

        Ok(decoded
            .into_iter()
            .map(|(intent, items)| {
                let items = items
                    .into_iter()
                    .map(|line| OrderItemView {
                        line_total: line.line_total(),
                        image: images.get(&line.product_id).cloned().flatten(),
                        product_id: line.product_id,
                        variant_id: line.variant_id,
                        title: line.title,
                        quantity: line.quantity,
                        unit_price: line.unit_price,
                    })
                    .collect();

                OrderView {
                    id: intent.id,
                    gateway_order_id: intent.gateway_order_id,
                    status: display_status(intent.status).to_string(),
                    amount: intent.amount,
                    currency: intent.currency,
                    items,
                    created_at: intent.created_at,
                }
            })
            .collect())
    }
}

/// Storefront-facing order status derived from the payment status.
pub fn display_status(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Paid => "processing",
        PaymentStatus::Created => "pending",
        PaymentStatus::Failed => "cancelled",
    }
}

fn first_image(product: &product::Model) -> Option<String> {
    product
        .images
        .as_array()
        .and_then(|a| a.first())
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// An order as shown to customers and admins
#[derive(Debug, Serialize)]
pub struct OrderView {
    pub id: Uuid,
    pub gateway_order_id: String,
    pub status: String,
    /// Amount in minor currency units (paise)
    pub amount: i64,
    pub currency: String,
    pub items: Vec<OrderItemView>,
    pub created_at: DateTime<Utc>,
}

/// One snapshot line joined to a product summary
#[derive(Debug, Serialize)]
pub struct OrderItemView {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub title: String,
    pub image: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}
