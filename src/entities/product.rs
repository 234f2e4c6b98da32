use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Jewellery product entity for the catalog
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    #[sea_orm(unique)]
    pub slug: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    /// Merchandising category (rings, necklaces, earrings, ...)
    pub category: String,
    #[sea_orm(unique)]
    pub sku: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub sale_price: Option<Decimal>,
    /// Stock for products sold without variants
    pub total_stock: i32,
    pub is_active: bool,
    #[sea_orm(column_type = "Json")]
    pub images: Json,
    /// Metal, purity, gemstone and similar display attributes
    #[sea_orm(column_type = "Json")]
    pub attributes: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product_variant::Entity")]
    Variants,
}

impl Related<super::product_variant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Variants.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Price a buyer actually pays: the sale price when one is set and
    /// undercuts the base price, the base price otherwise.
    pub fn effective_price(&self) -> Decimal {
        match self.sale_price {
            Some(sale) if sale < self.price => sale,
            _ => self.price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn product(price: Decimal, sale_price: Option<Decimal>) -> Model {
        Model {
            id: Uuid::new_v4(),
            title: "Gold Hoop Earrings".into(),
            slug: "gold-hoop-earrings".into(),
            description: "22k gold hoops".into(),
            category: "earrings".into(),
            sku: "AU-EAR-001".into(),
            price,
            sale_price,
            total_stock: 5,
            is_active: true,
            images: serde_json::json!([]),
            attributes: serde_json::json!({"metal": "gold", "purity": "22k"}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[rstest]
    #[case(dec!(1000), None, dec!(1000))]
    #[case(dec!(1000), Some(dec!(799.50)), dec!(799.50))]
    #[case(dec!(1000), Some(dec!(1000)), dec!(1000))]
    // A "sale" above the base price is ignored
    #[case(dec!(1000), Some(dec!(1200)), dec!(1000))]
    fn effective_price_prefers_lower_sale_price(
        #[case] price: Decimal,
        #[case] sale_price: Option<Decimal>,
        #[case] expected: Decimal,
    ) {
        assert_eq!(product(price, sale_price).effective_price(), expected);
    }
}
