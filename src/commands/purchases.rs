use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::entities::PurchaseStatus;

/// A purchase line entered by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ManualPurchaseItem {
    #[validate(range(min = 1))]
    pub product_variant_id: i64,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
    #[validate(range(min = 0))]
    pub cost_price: i64,
    /// Defaults to `cost_price`.
    #[validate(range(min = 0))]
    pub unit_price: Option<i64>,
}

/// A purchase line sourced from a backordered sales order line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct OrderItemBinding {
    #[validate(range(min = 1))]
    pub order_item_id: i64,
    #[validate(range(min = 1, message = "Purchase quantity must be positive"))]
    pub purchase_quantity: i32,
    /// Defaults to the variant's configured cost price.
    #[validate(range(min = 0))]
    pub cost_price: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_has_lines"))]
pub struct CreatePurchaseCommand {
    #[validate(range(min = 1))]
    pub store_id: i64,
    /// Generated as `<prefix>-<YYYYMMDD>-<seq>` when absent.
    #[validate(length(min = 1, max = 64))]
    pub order_number: Option<String>,
    #[validate(range(min = 0, message = "Shipping cost cannot be negative"))]
    pub shipping_cost: i64,
    /// Defaults to pending.
    pub status: Option<PurchaseStatus>,
    pub purchased_at: Option<DateTime<Utc>>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[validate]
    pub items: Vec<ManualPurchaseItem>,
    #[validate]
    pub order_items: Vec<OrderItemBinding>,
    pub user_id: Option<i64>,
}

fn validate_has_lines(cmd: &CreatePurchaseCommand) -> Result<(), ValidationError> {
    if cmd.items.is_empty() && cmd.order_items.is_empty() {
        let mut err = ValidationError::new("no_lines");
        err.message = Some("A purchase needs at least one item or order item".into());
        return Err(err);
    }
    Ok(())
}

/// Replaces a purchase's lines. A list left as `None` keeps the existing
/// lines of that kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdatePurchaseCommand {
    #[validate(range(min = 0, message = "Shipping cost cannot be negative"))]
    pub shipping_cost: Option<i64>,
    pub purchased_at: Option<DateTime<Utc>>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub items: Option<Vec<ManualPurchaseItem>>,
    pub order_items: Option<Vec<OrderItemBinding>>,
    pub user_id: Option<i64>,
}

impl UpdatePurchaseCommand {
    /// Validates the command and any supplied line lists.
    pub fn validate_all(&self) -> Result<(), validator::ValidationErrors> {
        self.validate()?;
        for item in self.items.iter().flatten() {
            item.validate()?;
        }
        for binding in self.order_items.iter().flatten() {
            binding.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual(quantity: i32) -> ManualPurchaseItem {
        ManualPurchaseItem {
            product_variant_id: 1,
            quantity,
            cost_price: 100,
            unit_price: None,
        }
    }

    #[test]
    fn create_requires_a_line() {
        let cmd = CreatePurchaseCommand {
            store_id: 1,
            ..Default::default()
        };
        assert!(cmd.validate().is_err());

        let cmd = CreatePurchaseCommand {
            store_id: 1,
            items: vec![manual(1)],
            ..Default::default()
        };
        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn create_rejects_negative_shipping_and_zero_quantities() {
        let cmd = CreatePurchaseCommand {
            store_id: 1,
            shipping_cost: -1,
            items: vec![manual(1)],
            ..Default::default()
        };
        assert!(cmd.validate().is_err());

        let cmd = CreatePurchaseCommand {
            store_id: 1,
            items: vec![manual(0)],
            ..Default::default()
        };
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn update_validates_supplied_lines() {
        let cmd = UpdatePurchaseCommand {
            order_items: Some(vec![OrderItemBinding {
                order_item_id: 3,
                purchase_quantity: 0,
                cost_price: None,
            }]),
            ..Default::default()
        };
        assert!(cmd.validate_all().is_err());
        assert!(UpdatePurchaseCommand::default().validate_all().is_ok());
    }
}
