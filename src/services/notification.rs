//! Notification dispatcher: explicit staff-triggered SMS / voice calls,
//! plus the policy and formatting helpers the transition-triggered path
//! (event handler) runs on. This module never mutates order or payment
//! state.

use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;
use futures::future::{self, Either};
use futures_cpupool::CpuPool;
use futures::Future;
use r2d2::{ManageConnection, Pool};
use serde_json;
use std::sync::Arc;

use client::catalog::{CatalogClient, Shop};
use client::messaging::{MessagingClient, OutboundCall, OutboundMessage};
use models::{
    is_usable_phone, NewNotificationAttempt, NotificationChannel, NotificationTarget, OrderId, OrderStatus,
    RawNotificationAttempt, RawOrder,
};
use repos::repo_factory::ReposFactory;

use super::error::{validation_errors, Error, ErrorKind};
use super::types::{spawn_on_pool, ServiceFuture};
use super::Service;

pub trait NotificationService {
    /// Staff-triggered SMS. Provider failures are reported back to the
    /// caller, unlike on the transition-triggered path.
    fn send_sms(&self, order_id: OrderId, target: NotificationTarget, message: String) -> ServiceFuture<RawNotificationAttempt>;

    /// Staff-triggered voice call with optional free-form context for the
    /// voice flow
    fn initiate_call(
        &self,
        order_id: OrderId,
        target: NotificationTarget,
        context: Option<serde_json::Value>,
    ) -> ServiceFuture<RawNotificationAttempt>;

    /// Delivery attempts of an order, newest first
    fn list_notifications(&self, order_id: OrderId) -> ServiceFuture<Vec<RawNotificationAttempt>>;
}

/// Whether the shop opted into customer notifications for this status
pub fn should_notify(shop: &Shop, status: OrderStatus) -> bool {
    shop.notify_statuses.contains(&status)
}

/// Customer-facing message for a status transition
pub fn format_status_message(order: &RawOrder, status: OrderStatus) -> String {
    match status {
        OrderStatus::Pending => format!("{}, we have received your order {}.", order.customer_name, order.id),
        OrderStatus::Confirmed => format!("{}, your order {} is confirmed.", order.customer_name, order.id),
        OrderStatus::Processing => format!("{}, your order {} is being prepared.", order.customer_name, order.id),
        OrderStatus::Shipped => match order.tracking_number {
            Some(ref tracking_number) => format!(
                "{}, your order {} has been shipped. Tracking number: {}.",
                order.customer_name, order.id, tracking_number
            ),
            None => format!("{}, your order {} has been shipped.", order.customer_name, order.id),
        },
        OrderStatus::Delivered => format!("{}, your order {} has been delivered.", order.customer_name, order.id),
        OrderStatus::Cancelled => format!("{}, your order {} has been cancelled.", order.customer_name, order.id),
    }
}

impl<
        T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
        M: ManageConnection<Connection = T>,
        F: ReposFactory<T>,
    > NotificationService for Service<T, M, F>
{
    fn send_sms(&self, order_id: OrderId, target: NotificationTarget, message: String) -> ServiceFuture<RawNotificationAttempt> {
        debug!("Sending sms for order {} to {:?}", order_id, target);

        let repo_factory = self.static_context.repo_factory.clone();
        let db_pool = self.static_context.db_pool.clone();
        let cpu_pool = self.static_context.cpu_pool.clone();
        let catalog = self.static_context.catalog_client.clone();
        let messaging = self.static_context.messaging_client.clone();
        let from = self.static_context.config.messaging.phone_number.clone();

        let fut = load_order(repo_factory.clone(), db_pool.clone(), cpu_pool.clone(), order_id)
            .and_then(move |order| resolve_target_phone(catalog, order, target))
            .and_then(move |(_, phone)| {
                let outbound = OutboundMessage {
                    to: phone.clone(),
                    from,
                    body: message,
                };

                messaging.send_message(outbound).then(move |result| match result {
                    Ok(response) => {
                        let attempt = NewNotificationAttempt::sent(order_id, NotificationChannel::Sms, phone, response.sid);
                        Either::A(record_attempt(repo_factory, db_pool, cpu_pool, attempt))
                    }
                    Err(e) => {
                        let attempt =
                            NewNotificationAttempt::failed(order_id, NotificationChannel::Sms, phone, format!("{}", e));
                        Either::B(record_attempt(repo_factory, db_pool, cpu_pool, attempt).and_then(move |_| {
                            let kind = ErrorKind::from(e.kind());
                            Err(ectx!(err e, kind))
                        }))
                    }
                })
            });

        Box::new(fut)
    }

    fn initiate_call(
        &self,
        order_id: OrderId,
        target: NotificationTarget,
        context: Option<serde_json::Value>,
    ) -> ServiceFuture<RawNotificationAttempt> {
        debug!("Initiating call for order {} to {:?}", order_id, target);

        let repo_factory = self.static_context.repo_factory.clone();
        let db_pool = self.static_context.db_pool.clone();
        let cpu_pool = self.static_context.cpu_pool.clone();
        let catalog = self.static_context.catalog_client.clone();
        let messaging = self.static_context.messaging_client.clone();
        let from = self.static_context.config.messaging.phone_number.clone();

        let fut = load_order(repo_factory.clone(), db_pool.clone(), cpu_pool.clone(), order_id)
            .and_then(move |order| resolve_target_phone(catalog, order, target))
            .and_then(move |(_, phone)| {
                let outbound = OutboundCall {
                    to: phone.clone(),
                    from,
                    context,
                };

                messaging.place_call(outbound).then(move |result| match result {
                    Ok(response) => {
                        let attempt = NewNotificationAttempt::sent(order_id, NotificationChannel::Voice, phone, response.sid);
                        Either::A(record_attempt(repo_factory, db_pool, cpu_pool, attempt))
                    }
                    Err(e) => {
                        let attempt =
                            NewNotificationAttempt::failed(order_id, NotificationChannel::Voice, phone, format!("{}", e));
                        Either::B(record_attempt(repo_factory, db_pool, cpu_pool, attempt).and_then(move |_| {
                            let kind = ErrorKind::from(e.kind());
                            Err(ectx!(err e, kind))
                        }))
                    }
                })
            });

        Box::new(fut)
    }

    fn list_notifications(&self, order_id: OrderId) -> ServiceFuture<Vec<RawNotificationAttempt>> {
        let repo_factory = self.static_context.repo_factory.clone();

        self.spawn_on_pool(move |conn| {
            let notification_attempts_repo = repo_factory.create_notification_attempts_repo(&conn);
            notification_attempts_repo.list_for_order(order_id).map_err(ectx!(convert => order_id))
        })
    }
}

fn load_order<T, M, F>(
    repo_factory: F,
    db_pool: Pool<M>,
    cpu_pool: CpuPool,
    order_id: OrderId,
) -> ServiceFuture<RawOrder>
where
    T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
    M: ManageConnection<Connection = T>,
    F: ReposFactory<T>,
{
    spawn_on_pool(db_pool, cpu_pool, move |conn| {
        let orders_repo = repo_factory.create_orders_repo(&conn);
        orders_repo
            .get(order_id)
            .map_err(ectx!(try convert => order_id))?
            .ok_or({
                let e = format_err!("Order {} not found", order_id);
                ectx!(err e, ErrorKind::NotFound)
            })
    })
}

/// The customer's number is snapshotted on the order; a delivery person's
/// number lives in the catalog. Targets without a usable number are
/// rejected before the provider is contacted.
fn resolve_target_phone(
    catalog: Arc<CatalogClient>,
    order: RawOrder,
    target: NotificationTarget,
) -> Box<Future<Item = (RawOrder, String), Error = Error>> {
    match target {
        NotificationTarget::Customer => {
            let result = order
                .customer_phone
                .clone()
                .ok_or_else(|| {
                    Error::from(ErrorKind::Validation(validation_errors(
                        "target",
                        "no_phone",
                        "Customer has no phone number on this order",
                    )))
                })
                .and_then(validate_phone)
                .map(move |phone| (order, phone));
            Box::new(future::result(result))
        }
        NotificationTarget::DeliveryPerson => {
            let delivery_person_id = match order.assigned_delivery_person_id {
                Some(id) => id,
                None => {
                    return Box::new(future::err(Error::from(ErrorKind::Validation(validation_errors(
                        "target",
                        "not_assigned",
                        "Order has no assigned delivery person",
                    )))));
                }
            };

            let fut = catalog
                .get_delivery_person(delivery_person_id)
                .map_err(ectx!(convert => delivery_person_id))
                .and_then(move |delivery_person| {
                    delivery_person
                        .phone
                        .ok_or_else(|| {
                            Error::from(ErrorKind::Validation(validation_errors(
                                "target",
                                "no_phone",
                                "Delivery person has no phone number",
                            )))
                        })
                        .and_then(validate_phone)
                        .map(move |phone| (order, phone))
                });
            Box::new(fut)
        }
    }
}

fn validate_phone(phone: String) -> Result<String, Error> {
    if is_usable_phone(&phone) {
        Ok(phone)
    } else {
        Err(Error::from(ErrorKind::Validation(validation_errors(
            "target",
            "invalid_phone",
            "Phone number must be in international format",
        ))))
    }
}

fn record_attempt<T, M, F>(
    repo_factory: F,
    db_pool: Pool<M>,
    cpu_pool: CpuPool,
    attempt: NewNotificationAttempt,
) -> ServiceFuture<RawNotificationAttempt>
where
    T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
    M: ManageConnection<Connection = T>,
    F: ReposFactory<T>,
{
    spawn_on_pool(db_pool, cpu_pool, move |conn| {
        let notification_attempts_repo = repo_factory.create_notification_attempts_repo(&conn);
        let order_id = attempt.order_id;
        notification_attempts_repo.create(attempt).map_err(ectx!(convert => order_id))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use client::catalog::Shop;
    use models::{Amount, Currency, OrderId, ShopId, UserId};
    use serde_json;
    use uuid::Uuid;

    fn shop(notify_statuses: Vec<OrderStatus>) -> Shop {
        Shop {
            id: ShopId::new(Uuid::new_v4()),
            user_id: UserId::new(Uuid::new_v4()),
            name: "Boulangerie".to_string(),
            url: None,
            phone_number: None,
            is_public: true,
            accepts_orders: true,
            notify_statuses,
        }
    }

    fn order() -> RawOrder {
        let timestamp = NaiveDate::from_ymd(2019, 3, 1).and_hms(12, 0, 0);
        RawOrder {
            id: OrderId::generate(),
            shop_id: ShopId::new(Uuid::new_v4()),
            user_id: None,
            customer_name: "Jean Dupont".to_string(),
            customer_email: "jean@example.com".to_string(),
            customer_phone: Some("+33612345678".to_string()),
            shipping_address: json!({}),
            items: json!([]),
            currency: Currency::Eur,
            subtotal: Amount::new(2000),
            shipping_cost: Amount::new(300),
            total: Amount::new(2300),
            status: OrderStatus::Shipped,
            tracking_number: Some("TRK-123".to_string()),
            carrier_name: None,
            tracking_url: None,
            estimated_delivery_at: None,
            shipped_at: None,
            delivered_at: None,
            assigned_user_id: None,
            assigned_delivery_person_id: None,
            notes: None,
            meta: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    #[test]
    fn notifies_only_for_opted_in_statuses() {
        let shop = shop(vec![OrderStatus::Shipped, OrderStatus::Delivered]);
        assert!(should_notify(&shop, OrderStatus::Shipped));
        assert!(should_notify(&shop, OrderStatus::Delivered));
        assert!(!should_notify(&shop, OrderStatus::Confirmed));

        let silent_shop = self::shop(vec![]);
        assert!(!should_notify(&silent_shop, OrderStatus::Shipped));
    }

    #[test]
    fn shipped_message_carries_the_tracking_number() {
        let order = order();
        let message = format_status_message(&order, OrderStatus::Shipped);
        assert!(message.contains("TRK-123"));
        assert!(message.contains("Jean Dupont"));
    }

    #[test]
    fn cancelled_message_mentions_cancellation() {
        let order = order();
        let message = format_status_message(&order, OrderStatus::Cancelled);
        assert!(message.contains("cancelled"));
    }
}
