pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;

pub use cart::{AddItemInput, CartService, CartView, UpdateItemInput};
pub use catalog::CatalogService;
pub use checkout::{
    CheckoutOrder, CheckoutService, CheckoutSource, PaymentView, ReportFailureInput,
    VerifyPaymentInput,
};
pub use orders::{OrderService, OrderView};
