table! {
    orders (id) {
        id -> Uuid,
        shop_id -> Uuid,
        user_id -> Nullable<Uuid>,
        customer_name -> VarChar,
        customer_email -> VarChar,
        customer_phone -> Nullable<VarChar>,
        shipping_address -> Jsonb,
        items -> Jsonb,
        currency -> VarChar,
        subtotal -> BigInt,
        shipping_cost -> BigInt,
        total -> BigInt,
        status -> VarChar,
        tracking_number -> Nullable<VarChar>,
        carrier_name -> Nullable<VarChar>,
        tracking_url -> Nullable<VarChar>,
        estimated_delivery_at -> Nullable<Timestamp>,
        shipped_at -> Nullable<Timestamp>,
        delivered_at -> Nullable<Timestamp>,
        assigned_user_id -> Nullable<Uuid>,
        assigned_delivery_person_id -> Nullable<Uuid>,
        notes -> Nullable<Text>,
        meta -> Nullable<Jsonb>,
        created_at -> Timestamp, // UTC 0, generated at db level
        updated_at -> Timestamp, // UTC 0, generated at db level
    }
}

// The id is the provider-issued reference. Two partial unique indexes back
// the adapter invariants:
//   payment_attempts_one_succeeded_idx ON (order_id) WHERE state = 'succeeded'
//   payment_attempts_one_active_idx ON (order_id) WHERE state IN ('created', 'requires_confirmation')
table! {
    payment_attempts (id) {
        id -> VarChar,
        order_id -> Uuid,
        provider -> VarChar,
        amount -> BigInt,
        currency -> VarChar,
        state -> VarChar,
        client_secret -> Nullable<VarChar>,
        approval_url -> Nullable<VarChar>,
        payer_id -> Nullable<VarChar>,
        last_error_message -> Nullable<VarChar>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    order_status_history (id) {
        id -> BigInt,
        order_id -> Uuid,
        status -> VarChar,
        note -> Nullable<Text>,
        created_at -> Timestamp,
    }
}

table! {
    notification_attempts (id) {
        id -> BigInt,
        order_id -> Uuid,
        channel -> VarChar,
        target -> VarChar,
        provider_ref -> Nullable<VarChar>,
        outcome -> VarChar,
        error_message -> Nullable<VarChar>,
        created_at -> Timestamp,
    }
}

table! {
    event_store (id) {
        id -> BigInt,
        event_id -> Uuid,
        payload -> Jsonb,
        status -> VarChar,
        attempt_count -> Integer,
        scheduled_on -> Nullable<Timestamp>,
        status_updated_at -> Timestamp,
        created_at -> Timestamp,
    }
}
