extern crate diesel;
extern crate orders_lib;
extern crate serde_json;
extern crate uuid;

use diesel::pg::PgConnection;
use diesel::Connection;
use uuid::Uuid;

use orders_lib::models::*;
use orders_lib::repos::{OrdersRepo, OrdersRepoImpl, StatusHistoryRepo, StatusHistoryRepoImpl};

fn with_test_db_conn<F, T>(f: F) -> T
where
    F: FnOnce(&PgConnection) -> T,
{
    let config = orders_lib::config::Config::new().unwrap();
    let database_url = config.server.database.parse::<String>().unwrap();
    let db_conn = PgConnection::establish(&database_url).unwrap();

    f(&db_conn)
}

fn new_order() -> NewOrder {
    let items = vec![
        OrderItem {
            product_id: ProductId::new(Uuid::new_v4()),
            name: "baguette".to_string(),
            unit_price: Amount::new(1000),
            quantity: 1,
            currency: Currency::Eur,
        },
        OrderItem {
            product_id: ProductId::new(Uuid::new_v4()),
            name: "croissant".to_string(),
            unit_price: Amount::new(500),
            quantity: 2,
            currency: Currency::Eur,
        },
    ];
    let address = ShippingAddress {
        street: "1 rue de Rivoli".to_string(),
        city: "Paris".to_string(),
        postal_code: "75001".to_string(),
        country: "FR".to_string(),
        state: None,
    };

    NewOrder {
        id: OrderId::generate(),
        shop_id: ShopId::new(Uuid::new_v4()),
        user_id: None,
        customer_name: "Jean Dupont".to_string(),
        customer_email: "jean@example.com".to_string(),
        customer_phone: Some("+33612345678".to_string()),
        shipping_address: serde_json::to_value(&address).unwrap(),
        items: serde_json::to_value(&items).unwrap(),
        currency: Currency::Eur,
        subtotal: Amount::new(2000),
        shipping_cost: Amount::new(300),
        total: Amount::new(2300),
        status: OrderStatus::Pending,
        notes: None,
        meta: None,
    }
}

#[test]
#[ignore] // requires a configured postgres database
fn orders_repo_create_and_get() {
    let new_order = new_order();
    let order_id = new_order.id;

    let created = with_test_db_conn(move |conn| OrdersRepoImpl::new(conn).create(new_order)).unwrap();
    assert_eq!(created.id, order_id);
    assert_eq!(created.status, OrderStatus::Pending);
    assert_eq!(created.total, Amount::new(2300));

    let fetched = with_test_db_conn(move |conn| OrdersRepoImpl::new(conn).get(order_id)).unwrap();
    assert_eq!(fetched.map(|order| order.id), Some(order_id));
}

#[test]
#[ignore] // requires a configured postgres database
fn entering_shipped_stamps_shipped_at() {
    let new_order = new_order();
    let order_id = new_order.id;

    with_test_db_conn(move |conn| {
        let repo = OrdersRepoImpl::new(conn);
        repo.create(new_order).unwrap();

        let updated = repo.update_status(order_id, OrderStatus::Shipped).unwrap();
        assert_eq!(updated.status, OrderStatus::Shipped);
        assert!(updated.shipped_at.is_some());
        assert!(updated.delivered_at.is_none());

        let updated = repo.update_status(order_id, OrderStatus::Delivered).unwrap();
        assert!(updated.shipped_at.is_some());
        assert!(updated.delivered_at.is_some());
    });
}

#[test]
#[ignore] // requires a configured postgres database
fn assigning_one_side_clears_the_other() {
    let new_order = new_order();
    let order_id = new_order.id;

    with_test_db_conn(move |conn| {
        let repo = OrdersRepoImpl::new(conn);
        repo.create(new_order).unwrap();

        let staff_id = UserId::new(Uuid::new_v4());
        let updated = repo
            .update_fulfilment(
                order_id,
                UpdateFulfilment {
                    assigned_user_id: Some(staff_id),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.assigned_user_id, Some(staff_id));
        assert_eq!(updated.assigned_delivery_person_id, None);

        let delivery_person_id = DeliveryPersonId::new(Uuid::new_v4());
        let updated = repo
            .update_fulfilment(
                order_id,
                UpdateFulfilment {
                    assigned_delivery_person_id: Some(delivery_person_id),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.assigned_user_id, None);
        assert_eq!(updated.assigned_delivery_person_id, Some(delivery_person_id));
    });
}

#[test]
#[ignore] // requires a configured postgres database
fn status_history_is_appended_in_order() {
    let new_order = new_order();
    let order_id = new_order.id;

    with_test_db_conn(move |conn| {
        let orders_repo = OrdersRepoImpl::new(conn);
        let history_repo = StatusHistoryRepoImpl::new(conn);

        orders_repo.create(new_order).unwrap();

        for status in &[OrderStatus::Pending, OrderStatus::Confirmed, OrderStatus::Processing] {
            history_repo
                .create(NewStatusHistory::new(order_id, *status, None))
                .unwrap();
        }

        let history = history_repo.list_for_order(order_id).unwrap();
        let statuses: Vec<OrderStatus> = history.iter().map(|entry| entry.status).collect();
        assert_eq!(
            statuses,
            vec![OrderStatus::Pending, OrderStatus::Confirmed, OrderStatus::Processing]
        );
    });
}
