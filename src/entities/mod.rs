/// Storefront entities
pub mod cart;
pub mod cart_item;
pub mod payment_intent;
pub mod product;
pub mod product_variant;

// Re-export entities
pub use cart::{Entity as Cart, Model as CartModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use payment_intent::{
    Entity as PaymentIntent, LineSnapshot, Model as PaymentIntentModel, PaymentStatus,
};
pub use product::{Entity as Product, Model as ProductModel};
pub use product_variant::{Entity as ProductVariant, Model as ProductVariantModel};
