//! `Controller` is a top layer that handles all http-related
//! stuff like reading bodies, parsing params, forming a response.
//! Basically it provides inputs to `Service` layer and converts outputs
//! of `Service` layer to http responses

pub mod context;
pub mod requests;
pub mod responses;
pub mod routes;

use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;
use failure::{Error as FailureError, Fail};
use futures::future;
use futures::Future;
use hyper::header::{Authorization, Headers};
use hyper::server::Request;
use hyper::{Get, Post};
use r2d2::ManageConnection;
use uuid::Uuid;

use self::context::{DynamicContext, StaticContext};
use self::requests::*;
use self::routes::{parse_route, Route};
use errors::Error;
use http::request_util::{parse_body, read_body, serialize_future};
use http::{Controller, ControllerFuture};
use models::{CreateOrder, UpdateFulfilment, UserId};
use repos::repo_factory::ReposFactory;
use services::error::Error as ServiceError;
use services::notification::NotificationService;
use services::order::OrderService;
use services::payment::PaymentService;
use services::Service;

/// Controller handles route parsing and calling `Service` layer
pub struct ControllerImpl<T, M, F>
where
    T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
    M: ManageConnection<Connection = T>,
    F: ReposFactory<T>,
{
    pub static_context: StaticContext<T, M, F>,
}

impl<
        T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
        M: ManageConnection<Connection = T>,
        F: ReposFactory<T>,
    > ControllerImpl<T, M, F>
{
    /// Create a new controller based on services
    pub fn new(static_context: StaticContext<T, M, F>) -> Self {
        Self { static_context }
    }
}

/// Attaches the http-facing error marker to a service error, so that the
/// application can map it to a status code
fn into_controller_error(e: ServiceError) -> FailureError {
    let code = Error::from(e.kind());
    FailureError::from(e.context(code))
}

fn raw_header(headers: &Headers, name: &str) -> Option<String> {
    headers
        .get_raw(name)
        .and_then(|raw| raw.one())
        .map(|bytes| String::from_utf8_lossy(bytes).to_string())
}

/// `?page=N` of listing endpoints, defaults to the first page
fn parse_page(query: Option<&str>) -> i64 {
    query
        .unwrap_or("")
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            match (parts.next(), parts.next()) {
                (Some("page"), Some(value)) => value.parse::<i64>().ok(),
                _ => None,
            }
        })
        .next()
        .unwrap_or(1)
}

impl<
        T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
        M: ManageConnection<Connection = T>,
        F: ReposFactory<T>,
    > Controller for ControllerImpl<T, M, F>
{
    /// Handle a request and get future response
    fn call(&self, req: Request) -> ControllerFuture {
        let headers = req.headers().clone();
        let auth_header = headers.get::<Authorization<String>>();
        let user_id = auth_header
            .map(move |auth| auth.0.clone())
            .and_then(|id| id.parse::<UserId>().ok());

        let correlation_token = format!("{}", Uuid::new_v4().hyphenated());
        debug!("Server received request, correlation token: {}", correlation_token);

        let dynamic_context = DynamicContext::new(user_id, correlation_token);
        let service = Service::new(self.static_context.clone(), dynamic_context);

        let path = req.path().to_string();

        match (&req.method().clone(), parse_route(req.path())) {
            (&Post, Some(Route::Orders)) => serialize_future({
                parse_body::<CreateOrder>(req.body()).and_then(move |payload| {
                    debug!("Received request to create an order for shop {}", payload.shop_id);
                    service.create_order(payload).map_err(into_controller_error)
                })
            }),
            (&Get, Some(Route::OrderById { order_id })) => {
                debug!("Received request to get order {}", order_id);
                serialize_future(service.get_order(order_id).map_err(into_controller_error))
            }
            (&Get, Some(Route::OrderStatusHistory { order_id })) => {
                debug!("Received request to get status history of order {}", order_id);
                serialize_future(service.get_status_history(order_id).map_err(into_controller_error))
            }
            (&Get, Some(Route::OrderNotifications { order_id })) => {
                debug!("Received request to list notifications of order {}", order_id);
                serialize_future(service.list_notifications(order_id).map_err(into_controller_error))
            }
            (&Get, Some(Route::OrdersByShop { shop_id })) => {
                let page = parse_page(req.query());
                debug!("Received request to list orders of shop {}, page {}", shop_id, page);
                serialize_future(service.list_orders_by_shop(shop_id, page).map_err(into_controller_error))
            }
            (&Get, Some(Route::OrdersByUser { user_id })) => {
                let page = parse_page(req.query());
                debug!("Received request to list orders of user {}, page {}", user_id, page);
                serialize_future(service.list_orders_by_user(user_id, page).map_err(into_controller_error))
            }
            (&Post, Some(Route::OrderTransition { order_id })) => serialize_future({
                parse_body::<TransitionPayload>(req.body()).and_then(move |payload| {
                    debug!("Received request to transition order {} to {}", order_id, payload.status);
                    service
                        .transition(order_id, payload.status, payload.note)
                        .map_err(into_controller_error)
                })
            }),
            (&Post, Some(Route::OrderFulfilment { order_id })) => serialize_future({
                parse_body::<UpdateFulfilment>(req.body()).and_then(move |payload| {
                    debug!("Received request to update fulfilment of order {}", order_id);
                    service.update_fulfilment(order_id, payload).map_err(into_controller_error)
                })
            }),
            (&Post, Some(Route::PaymentIntents)) => serialize_future({
                parse_body::<CreatePaymentIntentPayload>(req.body()).and_then(move |payload| {
                    debug!(
                        "Received request to create a {} payment intent for order {}",
                        payload.provider, payload.order_id
                    );
                    service
                        .create_intent(payload.order_id, payload.provider)
                        .map_err(into_controller_error)
                })
            }),
            (&Post, Some(Route::PaymentsConfirm)) => serialize_future({
                parse_body::<ConfirmPaymentPayload>(req.body()).and_then(move |payload| {
                    debug!(
                        "Received request to confirm payment {} of order {}",
                        payload.reference, payload.order_id
                    );
                    service
                        .confirm(payload.order_id, payload.reference, payload.payer_id)
                        .map_err(into_controller_error)
                })
            }),
            (&Post, Some(Route::CardCallback)) => {
                let signature = raw_header(&headers, "signature").unwrap_or_default();
                let timestamp = raw_header(&headers, "timestamp").unwrap_or_default();
                serialize_future({
                    read_body(req.body())
                        .map_err(|e| FailureError::from(e.context(Error::Parse)))
                        .and_then(move |body| {
                            service
                                .handle_card_callback(signature, timestamp, body)
                                .map_err(into_controller_error)
                        })
                })
            }
            (&Post, Some(Route::WalletCallback)) => serialize_future({
                parse_body::<WalletCallbackPayload>(req.body()).and_then(move |payload| {
                    service.handle_wallet_callback(payload).map_err(into_controller_error)
                })
            }),
            (&Post, Some(Route::NotificationsSms)) => serialize_future({
                parse_body::<SendSmsPayload>(req.body()).and_then(move |payload| {
                    debug!("Received request to send sms for order {}", payload.order_id);
                    service
                        .send_sms(payload.order_id, payload.target, payload.message)
                        .map_err(into_controller_error)
                })
            }),
            (&Post, Some(Route::NotificationsCall)) => serialize_future({
                parse_body::<InitiateCallPayload>(req.body()).and_then(move |payload| {
                    debug!("Received request to initiate a call for order {}", payload.order_id);
                    service
                        .initiate_call(payload.order_id, payload.target, payload.context)
                        .map_err(into_controller_error)
                })
            }),

            // Fallback
            (m, _) => Box::new(future::err(
                format_err!("Request to non existing endpoint in orders microservice! {:?} {:?}", m, path)
                    .context(Error::NotFound)
                    .into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_page;

    #[test]
    fn page_defaults_to_one() {
        assert_eq!(parse_page(None), 1);
        assert_eq!(parse_page(Some("")), 1);
        assert_eq!(parse_page(Some("foo=bar")), 1);
    }

    #[test]
    fn page_is_read_from_the_query() {
        assert_eq!(parse_page(Some("page=3")), 3);
        assert_eq!(parse_page(Some("foo=bar&page=7")), 7);
        assert_eq!(parse_page(Some("page=abc")), 1);
    }
}
