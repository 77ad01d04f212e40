use magnite_engine::{
    db_types::{NewOrder, Order, OrderId, OrderItem, PaymentOutcome, Product, ProductId, Transaction},
    order_objects::OrderQueryFilter,
    traits::{
        CancellationResult,
        InventoryError,
        InventoryManagement,
        OrderCreationResult,
        OrderManagement,
        OrderQueryError,
        PaymentGatewayDatabase,
        PaymentGatewayError,
        PaymentOutcomeResult,
    },
};
use mockall::mock;

mock! {
    pub OrderStore {}

    impl Clone for OrderStore {
        fn clone(&self) -> Self;
    }

    impl OrderManagement for OrderStore {
        async fn fetch_order(&self, order_id: OrderId) -> Result<Option<Order>, OrderQueryError>;
        async fn fetch_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, OrderQueryError>;
        async fn fetch_orders_for_customer(&self, customer_id: i64) -> Result<Vec<Order>, OrderQueryError>;
        async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderQueryError>;
        async fn fetch_transactions_for_customer(&self, customer_id: i64) -> Result<Vec<Transaction>, OrderQueryError>;
        async fn fetch_transactions_for_order(&self, order_id: OrderId) -> Result<Vec<Transaction>, OrderQueryError>;
        async fn fetch_transaction_by_intent_id(&self, intent_id: &str) -> Result<Option<Transaction>, OrderQueryError>;
    }

    impl InventoryManagement for OrderStore {
        async fn fetch_product(&self, product_id: ProductId) -> Result<Option<Product>, InventoryError>;
        async fn reserve_stock(&self, product_id: ProductId, quantity: i64) -> Result<(), InventoryError>;
        async fn release_stock(&self, product_id: ProductId, quantity: i64) -> Result<(), InventoryError>;
    }

    impl PaymentGatewayDatabase for OrderStore {
        fn url(&self) -> &str;
        async fn create_order_with_reservation(&self, order: NewOrder) -> Result<OrderCreationResult, PaymentGatewayError>;
        async fn begin_payment_attempt(&self, order_id: OrderId, customer_id: i64, currency: &str) -> Result<Transaction, PaymentGatewayError>;
        async fn attach_payment_intent(&self, transaction_id: i64, intent_id: &str) -> Result<Transaction, PaymentGatewayError>;
        async fn fail_payment_attempt(&self, transaction_id: i64) -> Result<Transaction, PaymentGatewayError>;
        async fn apply_payment_outcome(&self, intent_id: &str, outcome: PaymentOutcome) -> Result<PaymentOutcomeResult, PaymentGatewayError>;
        async fn cancel_order_for_customer(&self, order_id: OrderId, customer_id: i64) -> Result<CancellationResult, PaymentGatewayError>;
    }
}
