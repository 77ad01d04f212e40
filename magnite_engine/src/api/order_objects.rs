use std::fmt::Display;

use chrono::{DateTime, Utc};
use mgn_common::Money;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Order, OrderItem, OrderStatusType, PaymentStatusType},
    traits::OrderQueryError,
};

/// A customer's order history plus the lifetime sum of their order totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerOrders {
    pub customer_id: i64,
    pub total_orders: Money,
    pub orders: Vec<Order>,
}

/// An order together with its frozen-price line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub order_number: Option<String>,
    pub customer_id: Option<i64>,
    pub order_status: Option<Vec<OrderStatusType>>,
    pub payment_status: Option<PaymentStatusType>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl OrderQueryFilter {
    pub fn with_order_number(mut self, order_number: String) -> Self {
        self.order_number = Some(order_number);
        self
    }

    pub fn with_customer_id(mut self, customer_id: i64) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn with_order_status(mut self, status: OrderStatusType) -> Self {
        self.order_status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn with_payment_status(mut self, status: PaymentStatusType) -> Self {
        self.payment_status = Some(status);
        self
    }

    pub fn since<T>(mut self, since: T) -> Result<Self, OrderQueryError>
    where
        T: TryInto<DateTime<Utc>>,
        T::Error: Display,
    {
        let dt = since.try_into().map_err(|e| OrderQueryError::QueryError(e.to_string()))?;
        self.since = Some(dt);
        Ok(self)
    }

    pub fn until<T>(mut self, until: T) -> Result<Self, OrderQueryError>
    where
        T: TryInto<DateTime<Utc>>,
        T::Error: Display,
    {
        let dt = until.try_into().map_err(|e| OrderQueryError::QueryError(e.to_string()))?;
        self.until = Some(dt);
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.order_number.is_none() &&
            self.customer_id.is_none() &&
            self.order_status.is_none() &&
            self.payment_status.is_none() &&
            self.since.is_none() &&
            self.until.is_none()
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "No filters.")?;
            return Ok(());
        }
        if let Some(order_number) = &self.order_number {
            write!(f, "order_number: {order_number}. ")?;
        }
        if let Some(customer_id) = &self.customer_id {
            write!(f, "customer_id: {customer_id}. ")?;
        }
        if let Some(statuses) = &self.order_status {
            let statuses = statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            write!(f, "order_status: [{statuses}]. ")?;
        }
        if let Some(payment_status) = &self.payment_status {
            write!(f, "payment_status: {payment_status}. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        Ok(())
    }
}
