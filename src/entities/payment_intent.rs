use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A checkout attempt against the payment gateway.
///
/// The row is written only after the gateway accepted the order, carries the
/// amount in minor currency units (paise) and an immutable snapshot of the
/// charged line items. A paid intent doubles as the customer's order record.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_intents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub customer_id: Uuid,
    #[sea_orm(unique)]
    pub gateway_order_id: String,
    /// Idempotent receipt id sent to the gateway; reconciliation key for
    /// sweeping charges that never produced a local row
    #[sea_orm(unique)]
    pub receipt: String,
    /// Amount in minor currency units (paise)
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    #[sea_orm(nullable)]
    pub payment_id: Option<String>,
    #[sea_orm(nullable)]
    pub signature: Option<String>,
    /// Line items copied by value at creation time
    #[sea_orm(column_type = "Json")]
    pub items: Json,
    #[sea_orm(nullable)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Payment intent lifecycle: `created` transitions once to either terminal
/// state and never leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "created")]
    Created,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Failed)
    }
}

/// One charged line item, copied by value into the intent at creation time
/// so later cart edits cannot alter a payment already in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSnapshot {
    pub product_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<Uuid>,
    pub title: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl LineSnapshot {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

impl Model {
    /// Decode the snapshot column back into line items.
    pub fn snapshot_items(&self) -> Result<Vec<LineSnapshot>, serde_json::Error> {
        serde_json::from_value(self.items.clone())
    }
}
