use crate::domain::{NewOrder, NewOrderItem, Order, OrderProduct};
use crate::error::{Result, ShopError};
use crate::observability::metrics;
use crate::signals::{M2mAction, Signal, SignalBus};
use crate::storage::Storage;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub const EMPTY_ORDER: &str = "At least one product is required to create an order.";
pub const UNKNOWN_USER: &str = "User with the provided ID does not exist.";

/// Use case for placing and cancelling orders
pub struct OrderUseCase {
    storage: Arc<dyn Storage>,
    signals: SignalBus,
}

impl OrderUseCase {
    pub fn new(storage: Arc<dyn Storage>, signals: SignalBus) -> Self {
        Self { storage, signals }
    }

    /// Place an order with one unit of each listed product.
    ///
    /// Everything is validated before the order is written; a product id
    /// listed twice yields two rows.
    pub async fn create_order(
        &self,
        user_id: i64,
        product_ids: &[i64],
    ) -> Result<(Order, Vec<OrderProduct>)> {
        if product_ids.is_empty() {
            return Err(ShopError::Validation(EMPTY_ORDER.to_string()));
        }
        if self.storage.get_user(user_id).await?.is_none() {
            return Err(ShopError::Validation(UNKNOWN_USER.to_string()));
        }

        let mut unique = product_ids.to_vec();
        unique.sort_unstable();
        unique.dedup();
        let prices: HashMap<i64, _> = self
            .storage
            .get_products_by_ids(&unique)
            .await?
            .into_iter()
            .map(|p| (p.id, p.price))
            .collect();

        let mut items = Vec::with_capacity(product_ids.len());
        for id in product_ids {
            let price = prices.get(id).copied().ok_or_else(|| {
                ShopError::Validation(format!("Product with ID {id} does not exist."))
            })?;
            items.push(NewOrderItem {
                product_id: *id,
                quantity: 1,
                price,
            });
        }

        let (order, order_products) = self
            .storage
            .create_order(NewOrder {
                user_id,
                display_number: display_number(),
                items,
            })
            .await?;

        metrics::orders::created(order_products.len());
        info!(order_uuid = %order.uuid, user_id, items = order_products.len(), "Order placed");

        self.signals.emit(Signal::OrderCreated(order.clone()));
        self.signals.emit(Signal::OrderProductsChanged {
            order_uuid: order.uuid,
            action: M2mAction::PostAdd,
            product_ids: order_products.iter().map(|op| op.product_id).collect(),
        });
        Ok((order, order_products))
    }

    /// Returns false when the order does not exist
    pub async fn delete_order(&self, uuid: Uuid) -> Result<bool> {
        match self.storage.delete_order(uuid).await? {
            Some(order) => {
                metrics::orders::deleted();
                self.signals.emit(Signal::OrderDeleted(order));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn list_orders(&self, user_id: Option<i64>) -> Result<Vec<Order>> {
        self.storage.list_orders(user_id).await
    }
}

/// Seconds since the epoch with microsecond precision
fn display_number() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Product, User};
    use crate::signals::SignalReceiver;
    use crate::storage::InMemoryStorage;
    use rust_decimal::Decimal;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Captured(Mutex<Vec<Signal>>);

    impl SignalReceiver for Captured {
        fn receive(&self, signal: &Signal) {
            self.0.lock().unwrap().push(signal.clone());
        }
    }

    struct Fixture {
        orders: OrderUseCase,
        storage: Arc<InMemoryStorage>,
        captured: Arc<Captured>,
        user: User,
        product: Product,
    }

    async fn fixture() -> Fixture {
        let storage = Arc::new(InMemoryStorage::new());
        let mut user = User {
            id: 0,
            username: "bob".to_string(),
            email: "bob@example.com".to_string(),
            created_at: Utc::now(),
        };
        storage.create_user(&mut user).await.unwrap();
        let mut product = Product {
            id: 0,
            title: "Lamp".to_string(),
            description: None,
            price: Decimal::new(1999, 2),
            summary: String::new(),
            is_18_plus: false,
            category_id: None,
            tag_ids: vec![],
            created_at: Utc::now(),
        };
        storage.create_product(&mut product).await.unwrap();

        let captured = Arc::new(Captured::default());
        let bus = SignalBus::new().with_receiver(captured.clone());
        Fixture {
            orders: OrderUseCase::new(storage.clone(), bus),
            storage,
            captured,
            user,
            product,
        }
    }

    #[tokio::test]
    async fn test_validation_messages_in_order() {
        let f = fixture().await;
        let err = f.orders.create_order(f.user.id, &[]).await.unwrap_err();
        assert_eq!(err.to_string(), EMPTY_ORDER);

        let err = f.orders.create_order(999, &[f.product.id]).await.unwrap_err();
        assert_eq!(err.to_string(), UNKNOWN_USER);

        let err = f
            .orders
            .create_order(f.user.id, &[f.product.id, 777])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Product with ID 777 does not exist.");

        assert!(f.storage.list_orders(None).await.unwrap().is_empty());
        assert!(f.captured.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_order_snapshots_price_and_emits_signals() {
        let f = fixture().await;
        let before = Utc::now().timestamp() as f64;
        let (order, items) = f
            .orders
            .create_order(f.user.id, &[f.product.id, f.product.id])
            .await
            .unwrap();

        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.quantity == 1 && i.price == Decimal::new(1999, 2)));
        assert!(order.display_number >= before);

        let signals = f.captured.0.lock().unwrap();
        assert_eq!(signals[0], Signal::OrderCreated(order.clone()));
        assert_eq!(
            signals[1],
            Signal::OrderProductsChanged {
                order_uuid: order.uuid,
                action: M2mAction::PostAdd,
                product_ids: vec![f.product.id, f.product.id],
            }
        );
    }

    #[tokio::test]
    async fn test_delete_order_emits_only_when_found() {
        let f = fixture().await;
        let (order, _) = f.orders.create_order(f.user.id, &[f.product.id]).await.unwrap();
        f.captured.0.lock().unwrap().clear();

        assert!(f.orders.delete_order(order.uuid).await.unwrap());
        assert!(!f.orders.delete_order(order.uuid).await.unwrap());
        assert_eq!(*f.captured.0.lock().unwrap(), vec![Signal::OrderDeleted(order)]);
    }
}
