use crate::{
    entities::{product, product_variant, Product, ProductModel, ProductVariant},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

const DEFAULT_LIMIT: u64 = 20;
const MAX_LIMIT: u64 = 100;

/// Catalog service for managing jewellery products and their variants.
///
/// Reads never mutate; the cart and checkout services treat this data as
/// read-only and capture prices at the moment an item enters a cart.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Create a new product
    #[instrument(skip(self))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        self.ensure_unique_sku(&input.sku, None).await?;

        let product_id = Uuid::new_v4();
        let now = Utc::now();
        let slug = input.slug.unwrap_or_else(|| slugify(&input.title));

        let product = product::ActiveModel {
            id: Set(product_id),
            title: Set(input.title),
            slug: Set(slug),
            description: Set(input.description),
            category: Set(input.category),
            sku: Set(input.sku),
            price: Set(input.price),
            sale_price: Set(input.sale_price),
            total_stock: Set(input.total_stock),
            is_active: Set(input.is_active.unwrap_or(true)),
            images: Set(serde_json::to_value(&input.images)
                .map_err(|e| ServiceError::SerializationError(e.to_string()))?),
            attributes: Set(input.attributes.unwrap_or_else(|| serde_json::json!({}))),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let product = product.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductCreated(product_id))
            .await;

        info!("Created product: {}", product_id);
        Ok(product)
    }

    /// Update an existing product
    #[instrument(skip(self))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        if let Some(ref sku) = input.sku {
            self.ensure_unique_sku(sku, Some(product_id)).await?;
        }

        let product = self.get_product(product_id).await?;
        let mut active: product::ActiveModel = product.into();

        if let Some(title) = input.title {
            active.title = Set(title);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(category) = input.category {
            active.category = Set(category);
        }
        if let Some(sku) = input.sku {
            active.sku = Set(sku);
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if input.clear_sale_price {
            active.sale_price = Set(None);
        } else if let Some(sale_price) = input.sale_price {
            active.sale_price = Set(Some(sale_price));
        }
        if let Some(total_stock) = input.total_stock {
            if total_stock < 0 {
                return Err(ServiceError::ValidationError(
                    "stock cannot be negative".to_string(),
                ));
            }
            active.total_stock = Set(total_stock);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(images) = input.images {
            active.images = Set(serde_json::to_value(&images)
                .map_err(|e| ServiceError::SerializationError(e.to_string()))?);
        }
        if let Some(attributes) = input.attributes {
            active.attributes = Set(attributes);
        }

        active.updated_at = Set(Utc::now());

        let product = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductUpdated(product_id))
            .await;

        info!("Updated product: {}", product_id);
        Ok(product)
    }

    /// Archive a product (soft delete; hides it from the public listing
    /// without breaking carts and order snapshots that reference it).
    #[instrument(skip(self))]
    pub async fn archive_product(&self, product_id: Uuid) -> Result<ProductModel, ServiceError> {
        let product = self.get_product(product_id).await?;

        let mut active: product::ActiveModel = product.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now());
        let product = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductArchived(product_id))
            .await;

        info!("Archived product: {}", product_id);
        Ok(product)
    }

    /// Create a product variant
    #[instrument(skip(self))]
    pub async fn create_variant(
        &self,
        product_id: Uuid,
        input: CreateVariantInput,
    ) -> Result<product_variant::Model, ServiceError> {
        // Variants hang off an existing product
        self.get_product(product_id).await?;

        if input.stock_quantity < 0 {
            return Err(ServiceError::ValidationError(
                "stock cannot be negative".to_string(),
            ));
        }

        let variant_id = Uuid::new_v4();
        let now = Utc::now();

        let variant = product_variant::ActiveModel {
            id: Set(variant_id),
            product_id: Set(product_id),
            sku: Set(input.sku),
            name: Set(input.name),
            price: Set(input.price),
            sale_price: Set(input.sale_price),
            stock_quantity: Set(input.stock_quantity),
            position: Set(input.position.unwrap_or(0)),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let variant = variant.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::VariantCreated {
                product_id,
                variant_id,
            })
            .await;

        info!("Created variant {} for product {}", variant_id, product_id);
        Ok(variant)
    }

    /// Update a variant's price pair and stock
    #[instrument(skip(self))]
    pub async fn update_variant(
        &self,
        variant_id: Uuid,
        input: UpdateVariantInput,
    ) -> Result<product_variant::Model, ServiceError> {
        let variant = self.get_variant(variant_id).await?;
        let mut active: product_variant::ActiveModel = variant.into();

        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if input.clear_sale_price {
            active.sale_price = Set(None);
        } else if let Some(sale_price) = input.sale_price {
            active.sale_price = Set(Some(sale_price));
        }
        if let Some(stock_quantity) = input.stock_quantity {
            if stock_quantity < 0 {
                return Err(ServiceError::ValidationError(
                    "stock cannot be negative".to_string(),
                ));
            }
            active.stock_quantity = Set(stock_quantity);
        }
        if let Some(position) = input.position {
            active.position = Set(position);
        }
        active.updated_at = Set(Utc::now());

        let variant = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::VariantUpdated(variant_id))
            .await;

        Ok(variant)
    }

    /// Delete a variant
    #[instrument(skip(self))]
    pub async fn delete_variant(&self, variant_id: Uuid) -> Result<(), ServiceError> {
        let variant = self.get_variant(variant_id).await?;

        let active: product_variant::ActiveModel = variant.into();
        active.delete(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::VariantDeleted(variant_id))
            .await;

        info!("Deleted variant {}", variant_id);
        Ok(())
    }

    /// Get a product by ID
    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductModel, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    /// Get a product together with its variants, ordered by position
    #[instrument(skip(self))]
    pub async fn get_product_with_variants(
        &self,
        product_id: Uuid,
    ) -> Result<ProductWithVariants, ServiceError> {
        let product = self.get_product(product_id).await?;

        let variants = ProductVariant::find()
            .filter(product_variant::Column::ProductId.eq(product_id))
            .order_by_asc(product_variant::Column::Position)
            .all(&*self.db)
            .await?;

        Ok(ProductWithVariants { product, variants })
    }

    /// Get a variant by its identifier
    pub async fn get_variant(
        &self,
        variant_id: Uuid,
    ) -> Result<product_variant::Model, ServiceError> {
        ProductVariant::find_by_id(variant_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product variant {} not found", variant_id))
            })
    }

    /// Search the catalog
    #[instrument(skip(self))]
    pub async fn search_products(
        &self,
        query: ProductSearchQuery,
    ) -> Result<ProductSearchResult, ServiceError> {
        let mut db_query = Product::find();

        if let Some(search) = &query.search {
            db_query = db_query.filter(
                product::Column::Title
                    .contains(search.as_str())
                    .or(product::Column::Sku.contains(search.as_str())),
            );
        }

        if let Some(category) = &query.category {
            db_query = db_query.filter(product::Column::Category.eq(category.as_str()));
        }

        if let Some(is_active) = query.is_active {
            db_query = db_query.filter(product::Column::IsActive.eq(is_active));
        }

        let total = db_query.clone().count(&*self.db).await?;

        let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = query.offset.unwrap_or(0);

        let products = db_query
            .order_by_desc(product::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(&*self.db)
            .await?;

        Ok(ProductSearchResult { products, total })
    }

    async fn ensure_unique_sku(
        &self,
        sku: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let mut query = Product::find().filter(product::Column::Sku.eq(sku));
        if let Some(id) = exclude_id {
            query = query.filter(product::Column::Id.ne(id));
        }

        if query.one(&*self.db).await?.is_some() {
            return Err(ServiceError::ValidationError(format!(
                "SKU {} already exists",
                sku
            )));
        }

        Ok(())
    }
}

fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_dash = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Input for creating a product
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductInput {
    pub title: String,
    pub slug: Option<String>,
    pub description: String,
    pub category: String,
    pub sku: String,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub total_stock: i32,
    pub is_active: Option<bool>,
    pub images: Vec<String>,
    pub attributes: Option<serde_json::Value>,
}

/// Input for a partial product update; set `clear_sale_price` to drop a sale
#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct UpdateProductInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub sku: Option<String>,
    pub price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    #[serde(default)]
    pub clear_sale_price: bool,
    pub total_stock: Option<i32>,
    pub is_active: Option<bool>,
    pub images: Option<Vec<String>>,
    pub attributes: Option<serde_json::Value>,
}

/// Input for creating a variant
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateVariantInput {
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub stock_quantity: i32,
    pub position: Option<i32>,
}

/// Input for a partial variant update; set `clear_sale_price` to drop a sale
#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct UpdateVariantInput {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    #[serde(default)]
    pub clear_sale_price: bool,
    pub stock_quantity: Option<i32>,
    pub position: Option<i32>,
}

/// Catalog search parameters
#[derive(Debug, Default, Deserialize)]
pub struct ProductSearchQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub is_active: Option<bool>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ProductSearchResult {
    pub products: Vec<ProductModel>,
    pub total: u64,
}

/// Product joined with its variants
#[derive(Debug, Serialize)]
pub struct ProductWithVariants {
    pub product: ProductModel,
    pub variants: Vec<product_variant::Model>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_handles_punctuation_and_case() {
        assert_eq!(slugify("Gold Hoop Earrings"), "gold-hoop-earrings");
        assert_eq!(slugify("22k 'Classic' Ring!"), "22k-classic-ring");
        assert_eq!(slugify("  spaced  out  "), "spaced-out");
    }

    #[test]
    fn search_query_defaults_are_empty() {
        let q = ProductSearchQuery::default();
        assert!(q.search.is_none());
        assert!(q.category.is_none());
        assert!(q.is_active.is_none());
    }
}
