//! End-to-end service flows against a real database with mocked providers:
//! checkout, payment confirmation idempotency, fulfilment transitions and
//! notification outcomes.

extern crate bigdecimal;
extern crate diesel;
extern crate futures;
extern crate futures_cpupool;
extern crate r2d2;
extern crate r2d2_diesel;
extern crate tokio_core;
extern crate uuid;

extern crate orders_lib;

use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use diesel::pg::PgConnection;
use futures::Future;
use futures_cpupool::CpuPool;
use r2d2_diesel::ConnectionManager;
use tokio_core::reactor::Core;
use uuid::Uuid;

use orders_lib::client::card_gateway::mock::MockCardGatewayClient;
use orders_lib::client::catalog::mock::MockCatalogClient;
use orders_lib::client::catalog::{Product, Shop};
use orders_lib::client::messaging::mock::MockMessagingClient;
use orders_lib::client::wallet::mock::MockWalletClient;
use orders_lib::controller::context::{DynamicContext, StaticContext};
use orders_lib::event_handling::EventHandler;
use orders_lib::http::client::Client;
use orders_lib::models::*;
use orders_lib::repos::repo_factory::ReposFactoryImpl;
use orders_lib::services::error::ErrorKind;
use orders_lib::services::notification::NotificationService;
use orders_lib::services::order::OrderService;
use orders_lib::services::payment::PaymentService;
use orders_lib::services::Service;

type TestService = Service<PgConnection, ConnectionManager<PgConnection>, ReposFactoryImpl>;
type TestEventHandler = EventHandler<PgConnection, ConnectionManager<PgConnection>, ReposFactoryImpl>;

struct TestEnv {
    service: TestService,
    event_handler: TestEventHandler,
    catalog: Arc<MockCatalogClient>,
    card: Arc<MockCardGatewayClient>,
    wallet: Arc<MockWalletClient>,
    messaging: Arc<MockMessagingClient>,
    // keeps the outbound client machinery alive for the duration of a test
    _core: Core,
}

fn test_env() -> TestEnv {
    let config = orders_lib::config::Config::new().unwrap();

    let core = Core::new().unwrap();
    let handle = core.handle();
    let client = Client::new(&config.client, &handle);
    let client_handle = client.handle();

    let database_url = config.server.database.parse::<String>().unwrap();
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let db_pool = r2d2::Pool::builder().max_size(2).build(manager).unwrap();
    let cpu_pool = CpuPool::new(1);

    let repo_factory = ReposFactoryImpl::new(
        config.event_store.max_processing_attempts,
        config.event_store.stuck_threshold_sec,
    );

    let catalog = Arc::new(MockCatalogClient::default());
    let card = Arc::new(MockCardGatewayClient::default());
    let wallet = Arc::new(MockWalletClient::default());
    let messaging = Arc::new(MockMessagingClient::default());

    let messaging_from = config.messaging.phone_number.clone();

    let static_context = StaticContext {
        db_pool: db_pool.clone(),
        cpu_pool: cpu_pool.clone(),
        config: Arc::new(config),
        client_handle,
        repo_factory: repo_factory.clone(),
        catalog_client: catalog.clone(),
        card_gateway_client: card.clone(),
        wallet_client: wallet.clone(),
        messaging_client: messaging.clone(),
    };

    let service = Service::new(static_context, DynamicContext::new(None, "test".to_string()));

    let event_handler = EventHandler {
        cpu_pool,
        db_pool,
        repo_factory,
        catalog_client: catalog.clone(),
        messaging_client: messaging.clone(),
        messaging_from,
    };

    TestEnv {
        service,
        event_handler,
        catalog,
        card,
        wallet,
        messaging,
        _core: core,
    }
}

fn seed_shop(env: &TestEnv) -> ShopId {
    let shop_id = ShopId::new(Uuid::new_v4());
    env.catalog.with_shop(Shop {
        id: shop_id,
        user_id: UserId::new(Uuid::new_v4()),
        name: "Boulangerie".to_string(),
        url: None,
        phone_number: Some("+33712345678".to_string()),
        is_public: true,
        accepts_orders: true,
        notify_statuses: vec![OrderStatus::Shipped, OrderStatus::Delivered],
    });
    shop_id
}

fn seed_product(env: &TestEnv, shop_id: ShopId, price: &str, stock: i64) -> ProductId {
    let product_id = ProductId::new(Uuid::new_v4());
    env.catalog.with_product(Product {
        id: product_id,
        shop_id,
        name: format!("product-{}", product_id),
        price: BigDecimal::from_str(price).unwrap(),
        currency: Currency::Eur,
        stock,
    });
    product_id
}

fn address() -> ShippingAddress {
    ShippingAddress {
        street: "1 rue de Rivoli".to_string(),
        city: "Paris".to_string(),
        postal_code: "75001".to_string(),
        country: "FR".to_string(),
        state: None,
    }
}

fn checkout_payload(shop_id: ShopId, items: Vec<CreateOrderItem>) -> CreateOrder {
    CreateOrder {
        shop_id,
        customer_name: "Jean Dupont".to_string(),
        customer_email: "jean@example.com".to_string(),
        customer_phone: Some("+33612345678".to_string()),
        shipping_address: address(),
        items,
        shipping_cost: Some(Amount::new(300)),
        notes: None,
        meta: None,
    }
}

fn create_order(env: &TestEnv) -> RawOrder {
    let shop_id = seed_shop(env);
    let first = seed_product(env, shop_id, "10.00", 10);
    let second = seed_product(env, shop_id, "5.00", 10);

    let payload = checkout_payload(
        shop_id,
        vec![
            CreateOrderItem {
                product_id: first,
                quantity: 1,
            },
            CreateOrderItem {
                product_id: second,
                quantity: 2,
            },
        ],
    );

    env.service.create_order(payload).wait().unwrap()
}

#[test]
#[ignore] // requires a configured postgres database
fn create_order_recomputes_totals_and_reserves_stock() {
    let env = test_env();
    let shop_id = seed_shop(&env);
    let product_id = seed_product(&env, shop_id, "10.00", 5);
    let other_id = seed_product(&env, shop_id, "5.00", 5);

    let payload = checkout_payload(
        shop_id,
        vec![
            CreateOrderItem {
                product_id,
                quantity: 1,
            },
            CreateOrderItem {
                product_id: other_id,
                quantity: 2,
            },
        ],
    );

    let order = env.service.create_order(payload).wait().unwrap();

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.subtotal, Amount::new(2000));
    assert_eq!(order.shipping_cost, Amount::new(300));
    assert_eq!(order.total, Amount::new(2300));
    assert_eq!(order.currency, Currency::Eur);

    assert_eq!(env.catalog.stock_of(product_id), Some(4));
    assert_eq!(env.catalog.stock_of(other_id), Some(3));

    let history = env.service.get_status_history(order.id).wait().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, OrderStatus::Pending);
}

#[test]
#[ignore] // requires a configured postgres database
fn short_stock_fails_the_order_and_restores_reservations() {
    let env = test_env();
    let shop_id = seed_shop(&env);
    let plenty = seed_product(&env, shop_id, "10.00", 10);
    let scarce = seed_product(&env, shop_id, "5.00", 1);

    let payload = checkout_payload(
        shop_id,
        vec![
            CreateOrderItem {
                product_id: plenty,
                quantity: 2,
            },
            CreateOrderItem {
                product_id: scarce,
                quantity: 3,
            },
        ],
    );

    let err = env.service.create_order(payload).wait().unwrap_err();
    match err.kind() {
        ErrorKind::OutOfStock => {}
        kind => panic!("expected OutOfStock, got {:?}", kind),
    }

    // the reservation taken before the failure was handed back
    assert_eq!(env.catalog.stock_of(plenty), Some(10));
    assert_eq!(env.catalog.stock_of(scarce), Some(1));
}

#[test]
#[ignore] // requires a configured postgres database
fn card_payment_is_confirmed_exactly_once() {
    let env = test_env();
    let order = create_order(&env);

    let intent = env.service.create_intent(order.id, PaymentProvider::Card).wait().unwrap();
    assert!(intent.client_secret.is_some());

    // a second intent for the same order must not open another charge path
    let err = env.service.create_intent(order.id, PaymentProvider::Card).wait().unwrap_err();
    match err.kind() {
        ErrorKind::NotPayable => {}
        kind => panic!("expected NotPayable, got {:?}", kind),
    }

    // customer pays on the client side
    env.card.pay(intent.reference.clone());

    let confirmed = env.service.confirm(order.id, intent.reference.clone(), None).wait().unwrap();
    assert_eq!(confirmed.state, PaymentAttemptState::Succeeded);
    assert_eq!(confirmed.order_status, OrderStatus::Confirmed);

    // re-confirming yields the same result and no second transition
    let confirmed_again = env.service.confirm(order.id, intent.reference, None).wait().unwrap();
    assert_eq!(confirmed_again.state, PaymentAttemptState::Succeeded);
    assert_eq!(confirmed_again.order_status, OrderStatus::Confirmed);

    let history = env.service.get_status_history(order.id).wait().unwrap();
    let confirmations = history.iter().filter(|entry| entry.status == OrderStatus::Confirmed).count();
    assert_eq!(confirmations, 1);
}

#[test]
#[ignore] // requires a configured postgres database
fn confirming_an_unpaid_intent_fails_verification() {
    let env = test_env();
    let order = create_order(&env);

    let intent = env.service.create_intent(order.id, PaymentProvider::Card).wait().unwrap();

    // nobody paid: the provider-side intent has not succeeded
    let err = env.service.confirm(order.id, intent.reference, None).wait().unwrap_err();
    match err.kind() {
        ErrorKind::PaymentVerification => {}
        kind => panic!("expected PaymentVerification, got {:?}", kind),
    }

    // order stays pending, a new intent may be issued
    let order = env.service.get_order(order.id).wait().unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(env.service.create_intent(order.id, PaymentProvider::Card).wait().is_ok());
}

#[test]
#[ignore] // requires a configured postgres database
fn wallet_payment_confirms_through_the_approval_flow() {
    let env = test_env();
    let order = create_order(&env);

    let intent = env.service.create_intent(order.id, PaymentProvider::Wallet).wait().unwrap();
    let approval_url = intent.approval_url.clone().unwrap();
    assert!(approval_url.contains(intent.reference.inner()));

    let payer_id = env.wallet.approve(intent.reference.to_string());

    let confirmed = env
        .service
        .confirm(order.id, intent.reference, Some(payer_id))
        .wait()
        .unwrap();
    assert_eq!(confirmed.state, PaymentAttemptState::Succeeded);
    assert_eq!(confirmed.order_status, OrderStatus::Confirmed);
}

#[test]
#[ignore] // requires a configured postgres database
fn illegal_transitions_leave_the_order_untouched() {
    let env = test_env();
    let order = create_order(&env);

    // a pending order cannot ship
    let err = env.service.transition(order.id, OrderStatus::Shipped, None).wait().unwrap_err();
    match err.kind() {
        ErrorKind::IllegalTransition => {}
        kind => panic!("expected IllegalTransition, got {:?}", kind),
    }

    let unchanged = env.service.get_order(order.id).wait().unwrap().unwrap();
    assert_eq!(unchanged.status, OrderStatus::Pending);

    // cancel from processing, then nothing moves any more
    env.service.transition(order.id, OrderStatus::Confirmed, None).wait().unwrap();
    env.service.transition(order.id, OrderStatus::Processing, None).wait().unwrap();
    env.service.transition(order.id, OrderStatus::Cancelled, None).wait().unwrap();

    let err = env.service.transition(order.id, OrderStatus::Shipped, None).wait().unwrap_err();
    match err.kind() {
        ErrorKind::IllegalTransition => {}
        kind => panic!("expected IllegalTransition, got {:?}", kind),
    }
}

#[test]
#[ignore] // requires a configured postgres database
fn shipping_requires_a_tracking_number() {
    let env = test_env();
    let order = create_order(&env);

    env.service.transition(order.id, OrderStatus::Confirmed, None).wait().unwrap();
    env.service.transition(order.id, OrderStatus::Processing, None).wait().unwrap();

    let err = env.service.transition(order.id, OrderStatus::Shipped, None).wait().unwrap_err();
    match err.kind() {
        ErrorKind::Validation(_) => {}
        kind => panic!("expected Validation, got {:?}", kind),
    }

    env.service
        .update_fulfilment(
            order.id,
            UpdateFulfilment {
                tracking_number: Some("TRK-123".to_string()),
                carrier_name: Some("La Poste".to_string()),
                ..Default::default()
            },
        )
        .wait()
        .unwrap();

    let shipped = env.service.transition(order.id, OrderStatus::Shipped, None).wait().unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipped);
    assert!(shipped.shipped_at.is_some());
}

#[test]
#[ignore] // requires a configured postgres database
fn assigning_both_targets_at_once_is_rejected() {
    let env = test_env();
    let order = create_order(&env);

    let err = env
        .service
        .update_fulfilment(
            order.id,
            UpdateFulfilment {
                assigned_user_id: Some(UserId::new(Uuid::new_v4())),
                assigned_delivery_person_id: Some(DeliveryPersonId::new(Uuid::new_v4())),
                ..Default::default()
            },
        )
        .wait()
        .unwrap_err();
    match err.kind() {
        ErrorKind::Validation(_) => {}
        kind => panic!("expected Validation, got {:?}", kind),
    }
}

#[test]
#[ignore] // requires a configured postgres database
fn failed_transition_notification_is_recorded_but_swallowed() {
    let env = test_env();
    let order = create_order(&env);

    env.messaging.set_failing(true);

    // the event the shipped transition would have produced
    let event = Event::new(EventPayload::OrderStatusChanged {
        order_id: order.id,
        status: OrderStatus::Shipped,
    });

    // handling reports success even though the provider is down
    env.event_handler.clone().handle_event(event).wait().unwrap();

    let attempts = env.service.list_notifications(order.id).wait().unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].outcome, NotificationOutcome::Failed);
    assert!(attempts[0].error_message.is_some());
}

#[test]
#[ignore] // requires a configured postgres database
fn explicit_sms_surfaces_provider_errors() {
    let env = test_env();
    let order = create_order(&env);

    env.messaging.set_failing(true);

    let err = env
        .service
        .send_sms(order.id, NotificationTarget::Customer, "Bonjour".to_string())
        .wait()
        .unwrap_err();
    match err.kind() {
        ErrorKind::Provider => {}
        kind => panic!("expected Provider, got {:?}", kind),
    }

    // the failure is on the record for shop staff
    let attempts = env.service.list_notifications(order.id).wait().unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].outcome, NotificationOutcome::Failed);

    env.messaging.set_failing(false);
    let attempt = env
        .service
        .send_sms(order.id, NotificationTarget::Customer, "Bonjour".to_string())
        .wait()
        .unwrap();
    assert_eq!(attempt.outcome, NotificationOutcome::Sent);
    assert_eq!(env.messaging.sent_messages().len(), 1);
}
