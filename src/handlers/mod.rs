pub mod carts;
pub mod checkout;
pub mod common;
pub mod orders;
pub mod products;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::gateway::PaymentGateway;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<crate::services::CatalogService>,
    pub cart: Arc<crate::services::CartService>,
    pub checkout: Arc<crate::services::CheckoutService>,
    pub orders: Arc<crate::services::OrderService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        gateway: Arc<dyn PaymentGateway>,
        currency: String,
    ) -> Self {
        let catalog = Arc::new(crate::services::CatalogService::new(
            db_pool.clone(),
            event_sender.clone(),
        ));
        let cart = Arc::new(crate::services::CartService::new(
            db_pool.clone(),
            event_sender.clone(),
        ));
        let checkout = Arc::new(crate::services::CheckoutService::new(
            db_pool.clone(),
            gateway,
            event_sender,
            currency,
        ));
        let orders = Arc::new(crate::services::OrderService::new(db_pool));

        Self {
            catalog,
            cart,
            checkout,
            orders,
        }
    }
}
