extern crate diesel;
extern crate orders_lib;
extern crate serde_json;
extern crate uuid;

use diesel::pg::PgConnection;
use diesel::Connection;
use uuid::Uuid;

use orders_lib::models::*;
use orders_lib::repos::error::ErrorKind as RepoErrorKind;
use orders_lib::repos::{OrdersRepo, OrdersRepoImpl, PaymentAttemptsRepo, PaymentAttemptsRepoImpl};

fn with_test_db_conn<F, T>(f: F) -> T
where
    F: FnOnce(&PgConnection) -> T,
{
    let config = orders_lib::config::Config::new().unwrap();
    let database_url = config.server.database.parse::<String>().unwrap();
    let db_conn = PgConnection::establish(&database_url).unwrap();

    f(&db_conn)
}

fn seed_order(conn: &PgConnection) -> OrderId {
    let address = ShippingAddress {
        street: "1 rue de Rivoli".to_string(),
        city: "Paris".to_string(),
        postal_code: "75001".to_string(),
        country: "FR".to_string(),
        state: None,
    };
    let new_order = NewOrder {
        id: OrderId::generate(),
        shop_id: ShopId::new(Uuid::new_v4()),
        user_id: None,
        customer_name: "Jean Dupont".to_string(),
        customer_email: "jean@example.com".to_string(),
        customer_phone: None,
        shipping_address: serde_json::to_value(&address).unwrap(),
        items: serde_json::Value::Array(vec![]),
        currency: Currency::Eur,
        subtotal: Amount::new(2000),
        shipping_cost: Amount::new(300),
        total: Amount::new(2300),
        status: OrderStatus::Pending,
        notes: None,
        meta: None,
    };
    OrdersRepoImpl::new(conn).create(new_order).unwrap().id
}

fn new_attempt(order_id: OrderId) -> NewPaymentAttempt {
    NewPaymentAttempt {
        id: PaymentAttemptId::new(format!("pi_{}", Uuid::new_v4().simple())),
        order_id,
        provider: PaymentProvider::Card,
        amount: Amount::new(2300),
        currency: Currency::Eur,
        state: PaymentAttemptState::Created,
        client_secret: Some("secret".to_string()),
        approval_url: None,
        payer_id: None,
    }
}

#[test]
#[ignore] // requires a configured postgres database
fn payment_attempts_repo_crud_happy() {
    with_test_db_conn(|conn| {
        let order_id = seed_order(conn);
        let repo = PaymentAttemptsRepoImpl::new(conn);

        let attempt = new_attempt(order_id);
        let reference = attempt.id.clone();
        let created = repo.create(attempt).unwrap();
        assert_eq!(created.state, PaymentAttemptState::Created);

        let active = repo.get_active_by_order(order_id).unwrap();
        assert_eq!(active.map(|a| a.id), Some(reference.clone()));

        let updated = repo
            .update(
                reference.clone(),
                UpdatePaymentAttempt {
                    state: Some(PaymentAttemptState::Succeeded),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.state, PaymentAttemptState::Succeeded);

        // a settled attempt is no longer active
        assert!(repo.get_active_by_order(order_id).unwrap().is_none());
    });
}

#[test]
#[ignore] // requires a configured postgres database
fn only_one_attempt_may_be_open_per_order() {
    with_test_db_conn(|conn| {
        let order_id = seed_order(conn);
        let repo = PaymentAttemptsRepoImpl::new(conn);

        repo.create(new_attempt(order_id)).unwrap();

        let err = repo.create(new_attempt(order_id)).unwrap_err();
        match err.kind() {
            RepoErrorKind::Constraints(_) => {}
            kind => panic!("expected a constraints violation, got {:?}", kind),
        }
    });
}

#[test]
#[ignore] // requires a configured postgres database
fn only_one_attempt_may_ever_succeed_per_order() {
    with_test_db_conn(|conn| {
        let order_id = seed_order(conn);
        let repo = PaymentAttemptsRepoImpl::new(conn);

        let first = new_attempt(order_id);
        let first_reference = first.id.clone();
        repo.create(first).unwrap();
        repo.update(
            first_reference,
            UpdatePaymentAttempt {
                state: Some(PaymentAttemptState::Succeeded),
                ..Default::default()
            },
        )
        .unwrap();

        // a second open attempt is allowed once the first is terminal...
        let second = new_attempt(order_id);
        let second_reference = second.id.clone();
        repo.create(second).unwrap();

        // ...but it can never reach succeeded as well
        let err = repo
            .update(
                second_reference,
                UpdatePaymentAttempt {
                    state: Some(PaymentAttemptState::Succeeded),
                    ..Default::default()
                },
            )
            .unwrap_err();
        match err.kind() {
            RepoErrorKind::Constraints(_) => {}
            kind => panic!("expected a constraints violation, got {:?}", kind),
        }
    });
}
