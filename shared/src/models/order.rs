//! Restaurant orders and order items

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Product;
use crate::error::{DomainError, DomainResult};
use crate::types::generate_reference;

/// A customer order placed at a restaurant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    /// Display reference (e.g., "ORD-20241215-143022-A1B2...")
    pub reference: String,
    pub restaurant_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub order_date: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle status of an order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "confirmed" => Some(OrderStatus::Confirmed),
            "preparing" => Some(OrderStatus::Preparing),
            "ready" => Some(OrderStatus::Ready),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "Pending"),
            OrderStatus::Confirmed => write!(f, "Confirmed"),
            OrderStatus::Preparing => write!(f, "Preparing"),
            OrderStatus::Ready => write!(f, "Ready"),
            OrderStatus::Delivered => write!(f, "Delivered"),
            OrderStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl Order {
    /// A new order always starts out pending with no items
    pub fn new(
        id: Uuid,
        restaurant_id: Uuid,
        customer_id: Option<Uuid>,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Order {
            id,
            reference: generate_reference("ORD", now, id),
            restaurant_id,
            customer_id,
            status: OrderStatus::Pending,
            total_amount: Decimal::ZERO,
            order_date: now,
            delivered_at: None,
            note,
            created_at: now,
            updated_at: now,
        }
    }

    /// Recompute `total_amount` from the order's items
    pub fn recompute_total<'a>(&mut self, items: impl IntoIterator<Item = &'a OrderItem>) {
        self.total_amount = items
            .into_iter()
            .filter(|item| item.order_id == self.id)
            .map(|item| item.total_price)
            .sum();
    }
}

/// One product line of an order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderItem {
    /// Unit price defaults to the product's selling price
    pub fn new(
        id: Uuid,
        order_id: Uuid,
        product: &Product,
        quantity: u32,
        unit_price: Option<Decimal>,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        validate_item_quantity(quantity)?;
        let unit_price = unit_price.unwrap_or(product.selling_price);
        if unit_price < Decimal::ZERO {
            return Err(DomainError::invalid("Unit price cannot be negative"));
        }

        Ok(OrderItem {
            id,
            order_id,
            product_id: product.id,
            quantity,
            unit_price,
            total_price: unit_price * Decimal::from(quantity),
            note,
            created_at: now,
            updated_at: now,
        })
    }

    /// Change product and/or quantity and re-price the line
    pub fn revise(
        &mut self,
        product: &Product,
        quantity: u32,
        unit_price: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        validate_item_quantity(quantity)?;
        let unit_price = match unit_price {
            Some(price) => price,
            None if product.id != self.product_id => product.selling_price,
            None => self.unit_price,
        };
        if unit_price < Decimal::ZERO {
            return Err(DomainError::invalid("Unit price cannot be negative"));
        }

        self.product_id = product.id;
        self.quantity = quantity;
        self.unit_price = unit_price;
        self.total_price = unit_price * Decimal::from(quantity);
        self.updated_at = now;
        Ok(())
    }
}

fn validate_item_quantity(quantity: u32) -> DomainResult<()> {
    if quantity < 1 {
        return Err(DomainError::invalid("Order item quantity must be at least 1"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn product(price: &str) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: "Pad Thai".to_string(),
            selling_price: Decimal::from_str(price).unwrap(),
            is_available: true,
        }
    }

    #[test]
    fn test_item_total_price_from_product_price() {
        let order_id = Uuid::new_v4();
        let item = OrderItem::new(
            Uuid::new_v4(),
            order_id,
            &product("12.50"),
            3,
            None,
            None,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(item.unit_price, Decimal::from_str("12.50").unwrap());
        assert_eq!(item.total_price, Decimal::from_str("37.50").unwrap());
    }

    #[test]
    fn test_item_zero_quantity_rejected() {
        let result = OrderItem::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            &product("1"),
            0,
            None,
            None,
            Utc::now(),
        );
        assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
    }

    #[test]
    fn test_revise_keeps_price_for_same_product() {
        let p = product("4.00");
        let mut item =
            OrderItem::new(Uuid::new_v4(), Uuid::new_v4(), &p, 1, Some(Decimal::from(3)), None, Utc::now())
                .unwrap();
        item.revise(&p, 4, None, Utc::now()).unwrap();
        assert_eq!(item.unit_price, Decimal::from(3));
        assert_eq!(item.total_price, Decimal::from(12));
    }

    #[test]
    fn test_revise_new_product_takes_its_price() {
        let mut item = OrderItem::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            &product("4.00"),
            1,
            Some(Decimal::from(3)),
            None,
            Utc::now(),
        )
        .unwrap();
        let other = product("7.25");
        item.revise(&other, 2, None, Utc::now()).unwrap();
        assert_eq!(item.product_id, other.id);
        assert_eq!(item.total_price, Decimal::from_str("14.50").unwrap());
    }

    #[test]
    fn test_order_total_sums_own_items() {
        let now = Utc::now();
        let mut order = Order::new(Uuid::new_v4(), Uuid::new_v4(), None, None, now);
        let p = product("12.50");
        let mine = OrderItem::new(Uuid::new_v4(), order.id, &p, 3, None, None, now).unwrap();
        let foreign = OrderItem::new(Uuid::new_v4(), Uuid::new_v4(), &p, 9, None, None, now).unwrap();
        order.recompute_total([&mine, &foreign]);
        assert_eq!(order.total_amount, Decimal::from_str("37.50").unwrap());
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.reference.starts_with("ORD-"));
    }
}
