use models::{OrderId, ShopId, UserId};

/// List of all routes with params for the app
#[derive(Clone, Debug, PartialEq)]
pub enum Route {
    Orders,
    OrderById { order_id: OrderId },
    OrderStatusHistory { order_id: OrderId },
    OrderTransition { order_id: OrderId },
    OrderFulfilment { order_id: OrderId },
    OrderNotifications { order_id: OrderId },
    OrdersByShop { shop_id: ShopId },
    OrdersByUser { user_id: UserId },
    PaymentIntents,
    PaymentsConfirm,
    CardCallback,
    WalletCallback,
    NotificationsSms,
    NotificationsCall,
}

/// Segment-wise route matching. Literal segments win over id captures, so
/// `/orders/by-shop/...` is tried before `/orders/{id}`.
pub fn parse_route(path: &str) -> Option<Route> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match segments.as_slice() {
        ["orders"] => Some(Route::Orders),
        ["orders", "by-shop", shop_id] => shop_id.parse().ok().map(|shop_id| Route::OrdersByShop { shop_id }),
        ["orders", "by-user", user_id] => user_id.parse().ok().map(|user_id| Route::OrdersByUser { user_id }),
        ["orders", order_id] => order_id.parse().ok().map(|order_id| Route::OrderById { order_id }),
        ["orders", order_id, "status_history"] => order_id.parse().ok().map(|order_id| Route::OrderStatusHistory { order_id }),
        ["orders", order_id, "status"] => order_id.parse().ok().map(|order_id| Route::OrderTransition { order_id }),
        ["orders", order_id, "fulfilment"] => order_id.parse().ok().map(|order_id| Route::OrderFulfilment { order_id }),
        ["orders", order_id, "notifications"] => order_id.parse().ok().map(|order_id| Route::OrderNotifications { order_id }),
        ["payment_intents"] => Some(Route::PaymentIntents),
        ["payments", "confirm"] => Some(Route::PaymentsConfirm),
        ["payments", "card", "callback"] => Some(Route::CardCallback),
        ["payments", "wallet", "callback"] => Some(Route::WalletCallback),
        ["notifications", "sms"] => Some(Route::NotificationsSms),
        ["notifications", "call"] => Some(Route::NotificationsCall),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn parses_order_routes() {
        let id = Uuid::new_v4();
        assert_eq!(parse_route("/orders"), Some(Route::Orders));
        assert_eq!(
            parse_route(&format!("/orders/{}", id)),
            Some(Route::OrderById {
                order_id: OrderId::new(id)
            })
        );
        assert_eq!(
            parse_route(&format!("/orders/{}/status", id)),
            Some(Route::OrderTransition {
                order_id: OrderId::new(id)
            })
        );
        assert_eq!(
            parse_route(&format!("/orders/{}/status_history", id)),
            Some(Route::OrderStatusHistory {
                order_id: OrderId::new(id)
            })
        );
    }

    #[test]
    fn listing_routes_win_over_id_captures() {
        let id = Uuid::new_v4();
        assert_eq!(
            parse_route(&format!("/orders/by-shop/{}", id)),
            Some(Route::OrdersByShop {
                shop_id: ShopId::new(id)
            })
        );
        assert_eq!(
            parse_route(&format!("/orders/by-user/{}", id)),
            Some(Route::OrdersByUser {
                user_id: UserId::new(id)
            })
        );
    }

    #[test]
    fn rejects_malformed_ids_and_unknown_paths() {
        assert_eq!(parse_route("/orders/not-a-uuid"), None);
        assert_eq!(parse_route("/unknown"), None);
        assert_eq!(parse_route("/"), None);
    }

    #[test]
    fn parses_payment_and_notification_routes() {
        assert_eq!(parse_route("/payment_intents"), Some(Route::PaymentIntents));
        assert_eq!(parse_route("/payments/confirm"), Some(Route::PaymentsConfirm));
        assert_eq!(parse_route("/payments/card/callback"), Some(Route::CardCallback));
        assert_eq!(parse_route("/payments/wallet/callback"), Some(Route::WalletCallback));
        assert_eq!(parse_route("/notifications/sms"), Some(Route::NotificationsSms));
        assert_eq!(parse_route("/notifications/call"), Some(Route::NotificationsCall));
    }
}
