use diesel::{connection::AnsiTransactionManager, pg::Pg, Connection};
use futures::future::{self, Either};
use futures::Future;
use r2d2::ManageConnection;

use client::catalog::CatalogClient;
use client::messaging::{MessagingClient, OutboundMessage};
use models::{
    is_usable_phone, Event, EventPayload, NewNotificationAttempt, NotificationChannel, OrderId, OrderStatus, RawOrder,
};
use repos::repo_factory::ReposFactory;
use services::notification::{format_status_message, should_notify};

use super::error::*;
use super::{spawn_on_pool, EventHandler, EventHandlerFuture};

impl<T, M, F> EventHandler<T, M, F>
where
    T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
    M: ManageConnection<Connection = T>,
    F: ReposFactory<T>,
{
    pub fn handle_event(self, event: Event) -> EventHandlerFuture<()> {
        let Event { id: _, payload } = event;

        match payload {
            EventPayload::NoOp => Box::new(future::ok(())),
            EventPayload::OrderStatusChanged { order_id, status } => self.handle_order_status_changed(order_id, status),
        }
    }

    /// Policy-driven customer notification on a status transition. A
    /// messaging failure is recorded in the attempts log and swallowed -
    /// an outage must never fail the event, let alone the transition that
    /// already committed.
    fn handle_order_status_changed(self, order_id: OrderId, status: OrderStatus) -> EventHandlerFuture<()> {
        let EventHandler {
            db_pool,
            cpu_pool,
            repo_factory,
            catalog_client,
            messaging_client,
            messaging_from,
        } = self;

        let fut = spawn_on_pool(db_pool.clone(), cpu_pool.clone(), {
            let repo_factory = repo_factory.clone();
            move |conn| {
                let orders_repo = repo_factory.create_orders_repo(&conn);
                orders_repo
                    .get(order_id)
                    .map_err(ectx!(try convert => order_id))?
                    .ok_or({
                        let e = format_err!("Order {} of a status change event not found", order_id);
                        ectx!(err e, ErrorKind::Internal)
                    })
            }
        })
        .and_then(move |order: RawOrder| {
            let shop_id = order.shop_id;
            catalog_client
                .get_shop(shop_id)
                .map_err(ectx!(convert => shop_id))
                .and_then(move |shop| {
                    if !should_notify(&shop, status) {
                        debug!("Shop {} has no notification opt-in for {}", shop_id, status);
                        return Either::A(future::ok(()));
                    }

                    let phone = match order.customer_phone.clone() {
                        Some(ref phone) if is_usable_phone(phone) => phone.clone(),
                        _ => {
                            debug!("Order {} has no usable customer phone, skipping notification", order_id);
                            return Either::A(future::ok(()));
                        }
                    };

                    let body = format_status_message(&order, status);
                    let outbound = OutboundMessage {
                        to: phone.clone(),
                        from: messaging_from,
                        body,
                    };

                    let fut = messaging_client.send_message(outbound).then(move |result| {
                        let attempt = match result {
                            Ok(response) => {
                                info!("Sent a {} notification for order {}: {}", status, order_id, response.sid);
                                NewNotificationAttempt::sent(order_id, NotificationChannel::Sms, phone, response.sid)
                            }
                            Err(e) => {
                                warn!("Failed to send a {} notification for order {}: {}", status, order_id, e);
                                NewNotificationAttempt::failed(order_id, NotificationChannel::Sms, phone, format!("{}", e))
                            }
                        };

                        spawn_on_pool(db_pool, cpu_pool, move |conn| {
                            let notification_attempts_repo = repo_factory.create_notification_attempts_repo(&conn);
                            notification_attempts_repo
                                .create(attempt)
                                .map(|_| ())
                                .map_err(ectx!(convert => order_id))
                        })
                    });

                    Either::B(fut)
                })
        });

        Box::new(fut)
    }
}
