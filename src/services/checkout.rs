use crate::{
    entities::{
        cart, cart_item, payment_intent, product, Cart, CartItem, LineSnapshot, PaymentIntent,
        PaymentIntentModel, PaymentStatus, Product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::{generate_receipt_id, GatewayOrder, PaymentGateway},
    services::cart::{available_stock, clear_cart_items, resolve_listing},
};
use chrono::Utc;
use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Checkout service: turns a cart (or a single "buy now" item) into a
/// payment intent with the external gateway, and reconciles the gateway's
/// signed confirmation back onto the intent.
///
/// The gateway client is injected at startup; nothing here constructs one.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn PaymentGateway>,
    event_sender: Arc<EventSender>,
    currency: String,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: Arc<EventSender>,
        currency: String,
    ) -> Self {
        Self {
            db,
            gateway,
            event_sender,
            currency,
        }
    }

    /// Creates a payment intent for the customer.
    ///
    /// The gateway order is created first; the local row is only written once
    /// the gateway accepted the order, so a failed or timed-out call leaves
    /// nothing behind and retrying is safe. The stored receipt id is the
    /// reconciliation key for the opposite failure (gateway order created,
    /// local insert lost).
    #[instrument(skip(self))]
    pub async fn create_intent(
        &self,
        customer_id: Uuid,
        source: CheckoutSource,
    ) -> Result<CheckoutOrder, ServiceError> {
        let lines = match source {
            CheckoutSource::Cart => self.snapshot_cart(customer_id).await?,
            CheckoutSource::BuyNow {
                product_id,
                variant_id,
                quantity,
            } => {
                self.snapshot_single(product_id, variant_id, quantity)
                    .await?
            }
        };

        if lines.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let total: Decimal = lines.iter().map(LineSnapshot::line_total).sum();
        let amount = to_minor_units(total)?;

        let receipt = generate_receipt_id();
        let order = self
            .gateway
            .create_order(amount, &self.currency, &receipt)
            .await?;

        let intent_id = Uuid::new_v4();
        let intent = payment_intent::ActiveModel {
            id: Set(intent_id),
            customer_id: Set(customer_id),
            gateway_order_id: Set(order.id.clone()),
            receipt: Set(receipt),
            amount: Set(amount),
            currency: Set(self.currency.clone()),
            status: Set(PaymentStatus::Created),
            payment_id: Set(None),
            signature: Set(None),
            items: Set(serde_json::to_value(&lines)
                .map_err(|e| ServiceError::SerializationError(e.to_string()))?),
            notes: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };

        if let Err(e) = intent.insert(&*self.db).await {
            // The charge exists remotely but not locally; the stored receipt
            // id on the gateway side is the key a reconciliation sweep uses.
            warn!(
                gateway_order_id = %order.id,
                "gateway order created but local intent persist failed"
            );
            return Err(e.into());
        }

        self.event_sender
            .send_or_log(Event::PaymentIntentCreated { intent_id, amount })
            .await;

        info!(
            "Created payment intent {} for {} {} (order {})",
            intent_id, amount, self.currency, order.id
        );

        Ok(CheckoutOrder {
            order,
            key_id: self.gateway.key_id().to_string(),
            intent_id,
        })
    }

    /// Authenticates a client-supplied payment confirmation and settles the
    /// matching intent.
    ///
    /// The cart is cleared in the same transaction that marks the intent
    /// paid, and only then. Re-verifying an already-paid intent is a no-op
    /// success; it neither errors nor clears anything again.
    #[instrument(skip(self, input))]
    pub async fn verify_payment(
        &self,
        input: VerifyPaymentInput,
    ) -> Result<PaymentIntentModel, ServiceError> {
        if !self.gateway.verify_signature(
            &input.razorpay_order_id,
            &input.razorpay_payment_id,
            &input.razorpay_signature,
        ) {
            warn!(order_id = %input.razorpay_order_id, "checkout signature mismatch");
            return Err(ServiceError::VerificationFailed);
        }

        let txn = self.db.begin().await?;

        let intent = self
            .find_by_gateway_order_id(&txn, &input.razorpay_order_id)
            .await?;

        match intent.status {
            PaymentStatus::Paid => {
                // Idempotent replay of a confirmation we already settled.
                txn.commit().await?;
                return Ok(intent);
            }
            PaymentStatus::Failed => {
                return Err(ServiceError::InvalidOperation(
                    "payment was already reported as failed".to_string(),
                ));
            }
            PaymentStatus::Created => {}
        }

        let customer_id = intent.customer_id;
        let intent_id = intent.id;

        let mut active: payment_intent::ActiveModel = intent.into();
        active.payment_id = Set(Some(input.razorpay_payment_id.clone()));
        active.signature = Set(Some(input.razorpay_signature.clone()));
        active.status = Set(PaymentStatus::Paid);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        // Sole place a cart transitions from "in use" to "emptied", and only
        // after the intent row above is durably paid in the same transaction.
        if let Some(cart) = Cart::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .one(&txn)
            .await?
        {
            clear_cart_items(&txn, &cart).await?;
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::PaymentCaptured(intent_id))
            .await;

        info!("Payment captured for intent {}", intent_id);
        Ok(updated)
    }

    /// Records a client-reported payment failure: `created → failed`.
    ///
    /// Reporting failure on an already-failed intent is a no-op success; a
    /// paid intent is never demoted.
    #[instrument(skip(self))]
    pub async fn report_failure(
        &self,
        input: ReportFailureInput,
    ) -> Result<PaymentIntentModel, ServiceError> {
        let txn = self.db.begin().await?;

        let intent = self
            .find_by_gateway_order_id(&txn, &input.razorpay_order_id)
            .await?;

        match intent.status {
            PaymentStatus::Failed => {
                txn.commit().await?;
                return Ok(intent);
            }
            PaymentStatus::Paid => {
                return Err(ServiceError::InvalidOperation(
                    "payment was already captured".to_string(),
                ));
            }
            PaymentStatus::Created => {}
        }

        let intent_id = intent.id;
        let mut active: payment_intent::ActiveModel = intent.into();
        active.status = Set(PaymentStatus::Failed);
        active.notes = Set(input.reason);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::PaymentFailed(intent_id))
            .await;

        Ok(updated)
    }

    async fn find_by_gateway_order_id<C: ConnectionTrait>(
        &self,
        conn: &C,
        gateway_order_id: &str,
    ) -> Result<PaymentIntentModel, ServiceError> {
        PaymentIntent::find()
            .filter(payment_intent::Column::GatewayOrderId.eq(gateway_order_id))
            .one(conn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Payment intent for order {} not found",
                    gateway_order_id
                ))
            })
    }

    /// Copies the customer's cart lines by value.
    async fn snapshot_cart(&self, customer_id: Uuid) -> Result<Vec<LineSnapshot>, ServiceError> {
        let Some(cart) = Cart::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?
        else {
            return Ok(Vec::new());
        };

        let items = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
        let titles: HashMap<Uuid, String> = Product::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|p| (p.id, p.title))
            .collect();

        Ok(items
            .into_iter()
            .map(|item| LineSnapshot {
                product_id: item.product_id,
                variant_id: item.variant_id,
                title: titles
                    .get(&item.product_id)
                    .cloned()
                    .unwrap_or_else(|| "(unavailable)".to_string()),
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect())
    }

    /// Synthesizes a one-line snapshot for "buy now", bypassing the cart but
    /// running the same listing and stock validation.
    async fn snapshot_single(
        &self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: i32,
    ) -> Result<Vec<LineSnapshot>, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "quantity must be at least 1".to_string(),
            ));
        }

        let (product, variant) =
            resolve_listing(&*self.db, product_id, variant_id, true).await?;

        let available = available_stock(&product, variant.as_ref());
        if quantity > available {
            return Err(ServiceError::InsufficientStock(format!(
                "only {} left in stock for {}",
                available, product.title
            )));
        }

        let unit_price = variant
            .as_ref()
            .map(|v| v.effective_price())
            .unwrap_or_else(|| product.effective_price());

        Ok(vec![LineSnapshot {
            product_id,
            variant_id,
            title: product.title,
            quantity,
            unit_price,
        }])
    }
}

/// Converts a rupee total into paise, rejecting non-positive amounts.
pub fn to_minor_units(total: Decimal) -> Result<i64, ServiceError> {
    let minor = (total * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    let amount = minor.to_i64().ok_or_else(|| {
        ServiceError::InvalidAmount(format!("amount {} cannot be represented", total))
    })?;

    if amount <= 0 {
        return Err(ServiceError::InvalidAmount(format!(
            "amount must be positive, got {}",
            total
        )));
    }

    Ok(amount)
}

/// What to charge: the whole cart, or one ad-hoc item.
#[derive(Debug, Clone)]
pub enum CheckoutSource {
    Cart,
    BuyNow {
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: i32,
    },
}

/// Gateway order plus the publishable key the storefront needs to open the
/// client-side payment flow.
#[derive(Debug, Serialize)]
pub struct CheckoutOrder {
    pub order: GatewayOrder,
    pub key_id: String,
    pub intent_id: Uuid,
}

/// Payment intent as returned to clients; the stored signature stays
/// server-side.
#[derive(Debug, Serialize)]
pub struct PaymentView {
    pub id: Uuid,
    pub gateway_order_id: String,
    pub payment_id: Option<String>,
    pub status: PaymentStatus,
    /// Amount in minor currency units (paise)
    pub amount: i64,
    pub currency: String,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<PaymentIntentModel> for PaymentView {
    fn from(intent: PaymentIntentModel) -> Self {
        Self {
            id: intent.id,
            gateway_order_id: intent.gateway_order_id,
            payment_id: intent.payment_id,
            status: intent.status,
            amount: intent.amount,
            currency: intent.currency,
            created_at: intent.created_at,
        }
    }
}

/// Client-supplied payment confirmation (field names follow the gateway's
/// callback payload).
#[derive(Debug, Deserialize)]
pub struct VerifyPaymentInput {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

/// Client-reported payment failure.
#[derive(Debug, Deserialize)]
pub struct ReportFailureInput {
    pub razorpay_order_id: String,
    pub reason: Option<String>,
}
