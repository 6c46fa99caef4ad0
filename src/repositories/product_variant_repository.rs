use async_trait::async_trait;
use sea_orm::{DatabaseTransaction, EntityTrait};

use super::ProductVariantRepository;
use crate::entities::product_variant::{self, Entity as ProductVariant};
use crate::errors::ServiceError;

/// Variant lookups backed by the `product_variants` table.
#[derive(Debug, Default, Clone)]
pub struct SeaOrmProductVariantRepository;

impl SeaOrmProductVariantRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProductVariantRepository for SeaOrmProductVariantRepository {
    async fn get(
        &self,
        txn: &DatabaseTransaction,
        variant_id: i64,
    ) -> Result<Option<product_variant::Model>, ServiceError> {
        Ok(ProductVariant::find_by_id(variant_id).one(txn).await?)
    }
}
