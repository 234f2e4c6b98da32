#![allow(dead_code)] // not every test binary uses every helper

use async_trait::async_trait;
use aurum_api::{
    auth::AuthService,
    config::AppConfig,
    db,
    entities::{product, product_variant},
    errors::ServiceError,
    events::{self, EventSender},
    gateway::{verify_checkout_signature, GatewayOrder, PaymentGateway},
    handlers::AppServices,
    AppState,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

pub const TEST_GATEWAY_SECRET: &str = "rzp_test_secret_0123456789";

/// In-process stand-in for the payment gateway. Orders get deterministic ids
/// and signature checks use the same HMAC scheme as the real client.
pub struct FakeGateway {
    secret: String,
    orders_created: AtomicUsize,
    fail_next: AtomicBool,
}

impl FakeGateway {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.to_string(),
            orders_created: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
        }
    }

    /// Number of orders the gateway has accepted.
    pub fn orders_created(&self) -> usize {
        self.orders_created.load(Ordering::SeqCst)
    }

    /// Makes the next create_order call fail like a gateway outage.
    pub fn fail_next_order(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Signature the gateway would attach to a confirmation for this order.
    pub fn sign(&self, order_id: &str, payment_id: &str) -> String {
        aurum_api::gateway::sign_checkout(&self.secret, order_id, payment_id)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn key_id(&self) -> &str {
        "rzp_test_key"
    }

    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, ServiceError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ServiceError::GatewayError(
                "gateway unavailable".to_string(),
            ));
        }

        let n = self.orders_created.fetch_add(1, Ordering::SeqCst);
        Ok(GatewayOrder {
            id: format!("order_test_{n}"),
            amount,
            currency: currency.to_string(),
            receipt: receipt.to_string(),
            status: "created".to_string(),
        })
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_checkout_signature(&self.secret, order_id, payment_id, signature)
    }
}

/// Application harness over an in-memory SQLite database and a fake gateway.
pub struct TestApp {
    pub state: AppState,
    pub gateway: Arc<FakeGateway>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:",
            "test_jwt_secret_that_is_long_enough_1234",
            "rzp_test_key",
            TEST_GATEWAY_SECRET,
            "test",
        );
        // A shared in-memory SQLite database needs a single pooled connection
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection(&cfg)
            .await
            .expect("failed to create test database");
        db::bootstrap_schema(&pool)
            .await
            .expect("failed to bootstrap schema");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let gateway = Arc::new(FakeGateway::new(TEST_GATEWAY_SECRET));

        let services = AppServices::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            gateway.clone(),
            cfg.currency.clone(),
        );

        let auth = Arc::new(AuthService::new(
            &cfg.jwt_secret,
            Duration::from_secs(3600),
            None,
        ));

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
            auth,
        };

        Self {
            state,
            gateway,
            _event_task: event_task,
        }
    }

    /// Inserts a product without variants and returns its id.
    pub async fn seed_product(
        &self,
        title: &str,
        price: Decimal,
        sale_price: Option<Decimal>,
        total_stock: i32,
    ) -> Uuid {
        let product_id = Uuid::new_v4();
        let now = Utc::now();

        let model = product::ActiveModel {
            id: Set(product_id),
            title: Set(title.to_string()),
            slug: Set(format!("{}-{}", title.to_lowercase().replace(' ', "-"), product_id)),
            description: Set(format!("{title} description")),
            category: Set("rings".to_string()),
            sku: Set(format!("SKU-{product_id}")),
            price: Set(price),
            sale_price: Set(sale_price),
            total_stock: Set(total_stock),
            is_active: Set(true),
            images: Set(serde_json::json!(["https://cdn.example/img.jpg"])),
            attributes: Set(serde_json::json!({"metal": "gold"})),
            created_at: Set(now),
            updated_at: Set(now),
        };

        model
            .insert(&*self.state.db)
            .await
            .expect("failed to seed product");
        product_id
    }

    /// Inserts a variant for a product and returns its id.
    pub async fn seed_variant(
        &self,
        product_id: Uuid,
        name: &str,
        price: Decimal,
        sale_price: Option<Decimal>,
        stock_quantity: i32,
    ) -> Uuid {
        let variant_id = Uuid::new_v4();
        let now = Utc::now();

        let model = product_variant::ActiveModel {
            id: Set(variant_id),
            product_id: Set(product_id),
            sku: Set(format!("SKU-VAR-{variant_id}")),
            name: Set(name.to_string()),
            price: Set(price),
            sale_price: Set(sale_price),
            stock_quantity: Set(stock_quantity),
            position: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        };

        model
            .insert(&*self.state.db)
            .await
            .expect("failed to seed variant");
        variant_id
    }
}
