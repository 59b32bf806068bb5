//! Payment gateway adapter: one normalized create / confirm contract over
//! the card and wallet rails. A confirmation - whether it arrives from the
//! storefront or from a provider callback - always runs through the same
//! idempotent settle path, which is what keeps double charges and double
//! fulfilment out.

use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;
use futures::future::{self, Either};
use futures::Future;
use r2d2::ManageConnection;
use serde_json;

use client::card_gateway::{self, CardGatewayClient, IntentMetadata, IntentStatus, NewIntent, WebhookEventType};
use client::wallet::{ExecutePayment, NewPayment, PaymentItem, PaymentState, WalletClient};
use controller::requests::WalletCallbackPayload;
use controller::responses::{ConfirmResponse, PaymentIntentResponse};
use models::{
    settle_decision, Amount, Currency, NewPaymentAttempt, OrderId, OrderStatus, PaymentAttempt, PaymentAttemptId,
    PaymentAttemptState, PaymentProvider, RawOrder, SettleDecision, UpdatePaymentAttempt,
};
use repos::error::ErrorKind as RepoErrorKind;
use repos::repo_factory::ReposFactory;
use repos::{EventStoreRepo, OrdersRepo, PaymentAttemptsRepo, StatusHistoryRepo};

use super::error::{validation_errors, Error, ErrorKind, ErrorSource};
use super::order::apply_transition;
use super::types::{spawn_on_pool, ServiceFuture};
use super::Service;

pub trait PaymentService {
    /// Creates a provider-side payment object for a pending order and
    /// persists the attempt. Fails with `NotPayable` when the order is not
    /// `pending` or another attempt is still open.
    fn create_intent(&self, order_id: OrderId, provider: PaymentProvider) -> ServiceFuture<PaymentIntentResponse>;

    /// Verifies the proof against the provider and settles the attempt.
    /// Idempotent: a confirmed attempt short-circuits to the stored result
    /// without a second provider call.
    fn confirm(&self, order_id: OrderId, reference: PaymentAttemptId, payer_id: Option<String>) -> ServiceFuture<ConfirmResponse>;

    /// Card gateway webhook: signature-checked, then settled through the
    /// same path as a client confirmation. Tolerates at-least-once delivery.
    fn handle_card_callback(&self, signature: String, timestamp: String, body: String) -> ServiceFuture<()>;

    /// Wallet callback: re-verified by fetching the payment from the
    /// provider, then settled through the same path.
    fn handle_wallet_callback(&self, payload: WalletCallbackPayload) -> ServiceFuture<()>;
}

/// Provider-verified facts a settle runs on
#[derive(Debug, Clone)]
struct ProviderProof {
    succeeded: bool,
    amount: Amount,
    currency: Currency,
    payer_id: Option<String>,
    detail: Option<String>,
}

struct SettleOutcome {
    decision: SettleDecision,
    response: ConfirmResponse,
}

/// Settles one attempt on the caller's connection. The terminal attempt
/// state, the history row and the `confirmed` transition all commit in the
/// surrounding transaction, so there is never a "maybe charged" state.
fn settle_attempt(
    orders_repo: &OrdersRepo,
    status_history_repo: &StatusHistoryRepo,
    event_store_repo: &EventStoreRepo,
    payment_attempts_repo: &PaymentAttemptsRepo,
    reference: PaymentAttemptId,
    proof: ProviderProof,
) -> Result<SettleOutcome, Error> {
    // lock ordering is always order row first, then attempt row
    let reference_cloned1 = reference.clone();
    let probe = payment_attempts_repo
        .get(reference.clone())
        .map_err(ectx!(try convert => reference_cloned1))?
        .ok_or({
            let e = format_err!("Payment attempt {} not found", reference);
            ectx!(try err e, ErrorKind::NotFound)
        })?;

    let order_id = probe.order_id;
    let order = orders_repo
        .get_for_update(order_id)
        .map_err(ectx!(try convert => order_id))?
        .ok_or({
            let e = format_err!("Order {} of payment attempt {} not found", order_id, reference);
            ectx!(try err e, ErrorKind::Internal)
        })?;

    let reference_cloned2 = reference.clone();
    let attempt = payment_attempts_repo
        .get_for_update(reference.clone())
        .map_err(ectx!(try convert => reference_cloned2))?
        .ok_or({
            let e = format_err!("Payment attempt {} not found", reference);
            ectx!(try err e, ErrorKind::NotFound)
        })?;

    // never trust an asserted success whose amount does not match the order
    let amount_matches = proof.amount == order.total && proof.currency == order.currency;
    let verified = proof.succeeded && amount_matches;

    let decision = settle_decision(attempt.state, verified);
    let response = match decision {
        SettleDecision::AlreadySettled => {
            debug!("Payment attempt {} is already settled, returning the stored result", reference);
            ConfirmResponse {
                order_id,
                reference,
                state: PaymentAttemptState::Succeeded,
                order_status: order.status,
            }
        }
        SettleDecision::AlreadyFailed => ConfirmResponse {
            order_id,
            reference,
            state: attempt.state,
            order_status: order.status,
        },
        SettleDecision::MarkSucceeded => {
            let update = UpdatePaymentAttempt {
                state: Some(PaymentAttemptState::Succeeded),
                payer_id: proof.payer_id,
                last_error_message: None,
            };
            let reference_cloned3 = reference.clone();
            let updated = payment_attempts_repo
                .update(reference.clone(), update)
                .map_err(ectx!(try convert => reference_cloned3))?;

            let note = format!("Payment confirmed via {} (reference: {})", attempt.provider, reference);
            let order = apply_transition(
                orders_repo,
                status_history_repo,
                event_store_repo,
                &order,
                OrderStatus::Confirmed,
                Some(note),
            )?;

            ConfirmResponse {
                order_id,
                reference,
                state: updated.state,
                order_status: order.status,
            }
        }
        SettleDecision::MarkFailed => {
            let reason = if proof.succeeded && !amount_matches {
                "Amount or currency does not match the order".to_string()
            } else {
                proof.detail.clone().unwrap_or_else(|| "Provider rejected the proof".to_string())
            };

            warn!("Payment attempt {} failed verification: {}", reference, reason);

            let update = UpdatePaymentAttempt {
                state: Some(PaymentAttemptState::Failed),
                payer_id: None,
                last_error_message: Some(reason),
            };
            let reference_cloned4 = reference.clone();
            let updated = payment_attempts_repo
                .update(reference.clone(), update)
                .map_err(ectx!(try convert => reference_cloned4))?;

            ConfirmResponse {
                order_id,
                reference,
                state: updated.state,
                order_status: order.status,
            }
        }
    };

    Ok(SettleOutcome { decision, response })
}

impl<
        T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
        M: ManageConnection<Connection = T>,
        F: ReposFactory<T>,
    > PaymentService for Service<T, M, F>
{
    fn create_intent(&self, order_id: OrderId, provider: PaymentProvider) -> ServiceFuture<PaymentIntentResponse> {
        debug!("Creating a {} payment intent for order {}", provider, order_id);

        let repo_factory = self.static_context.repo_factory.clone();
        let db_pool = self.static_context.db_pool.clone();
        let cpu_pool = self.static_context.cpu_pool.clone();
        let card_gateway = self.static_context.card_gateway_client.clone();
        let wallet = self.static_context.wallet_client.clone();
        let wallet_config = self.static_context.config.wallet_gateway.clone();

        let fut = spawn_on_pool(db_pool.clone(), cpu_pool.clone(), {
            let repo_factory = repo_factory.clone();
            move |conn| {
                let orders_repo = repo_factory.create_orders_repo(&conn);
                let payment_attempts_repo = repo_factory.create_payment_attempts_repo(&conn);

                conn.transaction::<RawOrder, Error, _>(move || {
                    let order = orders_repo
                        .get_for_update(order_id)
                        .map_err(ectx!(try convert => order_id))?
                        .ok_or({
                            let e = format_err!("Order {} not found", order_id);
                            ectx!(try err e, ErrorKind::NotFound)
                        })?;

                    if order.status != OrderStatus::Pending {
                        let e = format_err!("Order {} is {}, only pending orders can be paid", order_id, order.status);
                        return Err(ectx!(err e, ErrorKind::NotPayable));
                    }

                    let active = payment_attempts_repo
                        .get_active_by_order(order_id)
                        .map_err(ectx!(try convert => order_id))?;
                    if let Some(active) = active {
                        let e = format_err!("Order {} already has an open payment attempt {}", order_id, active.id);
                        return Err(ectx!(err e, ErrorKind::NotPayable));
                    }

                    Ok(order)
                })
            }
        })
        .and_then(move |order| match provider {
            PaymentProvider::Card => {
                let input = NewIntent {
                    amount: order.total,
                    currency: order.currency,
                    metadata: IntentMetadata {
                        order_id: order.id,
                        shop_id: order.shop_id,
                    },
                };
                Either::A(card_gateway.create_intent(input).map_err(ectx!(convert => order_id)).map(move |intent| {
                    NewPaymentAttempt {
                        id: intent.id,
                        order_id: order.id,
                        provider: PaymentProvider::Card,
                        amount: order.total,
                        currency: order.currency,
                        state: PaymentAttemptState::Created,
                        client_secret: intent.client_secret,
                        approval_url: None,
                        payer_id: None,
                    }
                }))
            }
            PaymentProvider::Wallet => {
                let items = match order.typed_items() {
                    Ok(items) => items,
                    Err(e) => {
                        return Either::B(Either::A(future::err(ectx!(err e, ErrorSource::SerdeJson, ErrorKind::Internal))));
                    }
                };

                let input = NewPayment {
                    amount: order.total,
                    currency: order.currency,
                    items: items
                        .into_iter()
                        .map(|item| PaymentItem {
                            name: item.name,
                            sku: item.product_id.to_string(),
                            price: item.unit_price,
                            currency: item.currency,
                            quantity: item.quantity,
                        })
                        .collect(),
                    description: format!("Order {}", order.id),
                    reference: order.id,
                    return_url: wallet_config.return_url,
                    cancel_url: wallet_config.cancel_url,
                };

                Either::B(Either::B(wallet.create_payment(input).map_err(ectx!(convert => order_id)).map(
                    move |payment| NewPaymentAttempt {
                        id: PaymentAttemptId::new(payment.id),
                        order_id: order.id,
                        provider: PaymentProvider::Wallet,
                        amount: order.total,
                        currency: order.currency,
                        state: PaymentAttemptState::Created,
                        client_secret: None,
                        approval_url: payment.approval_url,
                        payer_id: None,
                    },
                )))
            }
        })
        .and_then(move |new_attempt| {
            spawn_on_pool(db_pool, cpu_pool, move |conn| {
                let payment_attempts_repo = repo_factory.create_payment_attempts_repo(&conn);

                // the partial unique index on open attempts closes the race
                // between two concurrent create_intent calls
                payment_attempts_repo.create(new_attempt).map_err(|e| match e.kind() {
                    RepoErrorKind::Constraints(_) => ectx!(err e, ErrorKind::NotPayable),
                    kind => {
                        let kind = ErrorKind::from(kind);
                        ectx!(err e, kind)
                    }
                })
            })
        })
        .map(PaymentIntentResponse::from);

        Box::new(fut)
    }

    fn confirm(&self, order_id: OrderId, reference: PaymentAttemptId, payer_id: Option<String>) -> ServiceFuture<ConfirmResponse> {
        debug!("Confirming payment attempt {} for order {}", reference, order_id);

        let repo_factory = self.static_context.repo_factory.clone();
        let db_pool = self.static_context.db_pool.clone();
        let cpu_pool = self.static_context.cpu_pool.clone();
        let card_gateway = self.static_context.card_gateway_client.clone();
        let wallet = self.static_context.wallet_client.clone();

        let fut = spawn_on_pool(db_pool.clone(), cpu_pool.clone(), {
            let repo_factory = repo_factory.clone();
            let reference = reference.clone();
            move |conn| {
                let orders_repo = repo_factory.create_orders_repo(&conn);
                let payment_attempts_repo = repo_factory.create_payment_attempts_repo(&conn);

                let reference_cloned = reference.clone();
                let attempt = payment_attempts_repo
                    .get(reference.clone())
                    .map_err(ectx!(try convert => reference_cloned))?
                    .ok_or({
                        let e = format_err!("Payment attempt {} not found", reference);
                        ectx!(try err e, ErrorKind::NotFound)
                    })?;

                if attempt.order_id != order_id {
                    return Err(Error::from(ErrorKind::Validation(validation_errors(
                        "reference",
                        "mismatch",
                        "Payment reference does not belong to the order",
                    ))));
                }

                let order = orders_repo
                    .get(order_id)
                    .map_err(ectx!(try convert => order_id))?
                    .ok_or({
                        let e = format_err!("Order {} not found", order_id);
                        ectx!(try err e, ErrorKind::NotFound)
                    })?;

                Ok((attempt, order))
            }
        })
        .and_then(move |(attempt, order): (PaymentAttempt, RawOrder)| {
            // a settled attempt is answered from storage, the provider is
            // not contacted a second time
            if attempt.state == PaymentAttemptState::Succeeded {
                return Either::A(future::ok(ConfirmResponse {
                    order_id,
                    reference: attempt.id,
                    state: PaymentAttemptState::Succeeded,
                    order_status: order.status,
                }));
            }

            let verify = match attempt.provider {
                PaymentProvider::Card => {
                    let reference = attempt.id.clone();
                    Either::A(card_gateway.get_intent(reference.clone()).then(move |result| match result {
                        Ok(intent) => Ok(ProviderProof {
                            succeeded: intent.status == IntentStatus::Succeeded,
                            amount: intent.amount,
                            currency: intent.currency,
                            payer_id: None,
                            detail: if intent.status == IntentStatus::Succeeded {
                                None
                            } else {
                                Some("Intent has not succeeded at the provider".to_string())
                            },
                        }),
                        Err(e) => {
                            let kind = ErrorKind::from(e.kind());
                            Err(ectx!(err e, kind))
                        }
                    }))
                }
                PaymentProvider::Wallet => {
                    let payer_id = match payer_id {
                        Some(payer_id) => payer_id,
                        None => {
                            return Either::A(future::err(Error::from(ErrorKind::Validation(validation_errors(
                                "payer_id",
                                "required",
                                "Payer id is required to confirm a wallet payment",
                            )))));
                        }
                    };

                    let fallback_amount = attempt.amount;
                    let fallback_currency = attempt.currency;
                    Either::B(
                        wallet
                            .execute_payment(attempt.id.to_string(), ExecutePayment { payer_id: payer_id.clone() })
                            .then(move |result| match result {
                                Ok(payment) => Ok(ProviderProof {
                                    succeeded: payment.state == PaymentState::Approved,
                                    amount: payment.amount,
                                    currency: payment.currency,
                                    payer_id: Some(payer_id),
                                    detail: if payment.state == PaymentState::Approved {
                                        None
                                    } else {
                                        Some("Payment was not approved by the provider".to_string())
                                    },
                                }),
                                Err(e) => {
                                    if e.kind() == ::client::wallet::ErrorKind::Rejected {
                                        // a rejected execution is a failed proof,
                                        // not a transport error
                                        Ok(ProviderProof {
                                            succeeded: false,
                                            amount: fallback_amount,
                                            currency: fallback_currency,
                                            payer_id: None,
                                            detail: Some(format!("Provider rejected the execution: {}", e)),
                                        })
                                    } else {
                                        let kind = ErrorKind::from(e.kind());
                                        Err(ectx!(err e, kind))
                                    }
                                }
                            }),
                    )
                }
            };

            Either::B(verify.and_then(move |proof| {
                spawn_on_pool(db_pool, cpu_pool, move |conn| {
                    let orders_repo = repo_factory.create_orders_repo(&conn);
                    let status_history_repo = repo_factory.create_status_history_repo(&conn);
                    let event_store_repo = repo_factory.create_event_store_repo(&conn);
                    let payment_attempts_repo = repo_factory.create_payment_attempts_repo(&conn);

                    let outcome = conn.transaction::<SettleOutcome, Error, _>(|| {
                        settle_attempt(
                            &*orders_repo,
                            &*status_history_repo,
                            &*event_store_repo,
                            &*payment_attempts_repo,
                            reference.clone(),
                            proof,
                        )
                    })?;

                    match outcome.decision {
                        SettleDecision::MarkFailed | SettleDecision::AlreadyFailed => {
                            let e = format_err!("Payment attempt {} failed verification", outcome.response.reference);
                            Err(ectx!(err e, ErrorKind::PaymentVerification))
                        }
                        _ => Ok(outcome.response),
                    }
                })
            }))
        });

        Box::new(fut)
    }

    fn handle_card_callback(&self, signature: String, timestamp: String, body: String) -> ServiceFuture<()> {
        info!("Received card gateway callback, body.len(): {}", body.len());

        let repo_factory = self.static_context.repo_factory.clone();
        let signing_secret = self.static_context.config.card_gateway.signing_secret.clone();

        let fut = self.spawn_on_pool(move |conn| {
            if !card_gateway::verify_webhook_signature(&signing_secret, &timestamp, &body, &signature) {
                let e = format_err!("Card gateway callback signature mismatch");
                return Err(ectx!(err e, ErrorKind::PaymentVerification));
            }

            let event = serde_json::from_str::<card_gateway::WebhookEvent>(&body)
                .map_err(ectx!(try ErrorSource::SerdeJson, ErrorKind::Internal))?;

            let orders_repo = repo_factory.create_orders_repo(&conn);
            let status_history_repo = repo_factory.create_status_history_repo(&conn);
            let event_store_repo = repo_factory.create_event_store_repo(&conn);
            let payment_attempts_repo = repo_factory.create_payment_attempts_repo(&conn);

            let intent = event.intent;
            let reference = intent.id.clone();
            let proof = match event.event_type {
                WebhookEventType::IntentSucceeded => ProviderProof {
                    succeeded: intent.status == IntentStatus::Succeeded,
                    amount: intent.amount,
                    currency: intent.currency,
                    payer_id: None,
                    detail: None,
                },
                WebhookEventType::IntentPaymentFailed => ProviderProof {
                    succeeded: false,
                    amount: intent.amount,
                    currency: intent.currency,
                    payer_id: None,
                    detail: Some("Provider reported a failed payment".to_string()),
                },
                WebhookEventType::Other => {
                    warn!("Unprocessable card gateway callback for intent {}", reference);
                    return Ok(());
                }
            };

            let result = conn.transaction::<SettleOutcome, Error, _>(|| {
                settle_attempt(
                    &*orders_repo,
                    &*status_history_repo,
                    &*event_store_repo,
                    &*payment_attempts_repo,
                    reference.clone(),
                    proof,
                )
            });

            // deliveries for unknown references are acknowledged, the
            // provider would retry them forever otherwise
            match result {
                Ok(_) => Ok(()),
                Err(e) => {
                    if let ErrorKind::NotFound = e.kind() {
                        warn!("Card gateway callback for unknown attempt {}", reference);
                        Ok(())
                    } else {
                        Err(e)
                    }
                }
            }
        });

        Box::new(fut)
    }

    fn handle_wallet_callback(&self, payload: WalletCallbackPayload) -> ServiceFuture<()> {
        info!("Received wallet callback: {} for payment {}", payload.event_type, payload.payment_id);

        let repo_factory = self.static_context.repo_factory.clone();
        let db_pool = self.static_context.db_pool.clone();
        let cpu_pool = self.static_context.cpu_pool.clone();
        let wallet = self.static_context.wallet_client.clone();

        if payload.event_type != "payment.completed" && payload.event_type != "payment.failed" {
            warn!("Unprocessable wallet callback: {}", payload.event_type);
            return Box::new(future::ok(()));
        }

        // the callback body is never trusted: the payment is re-read from
        // the provider and that state is what gets settled
        let payment_id = payload.payment_id.clone();
        let fut = wallet
            .get_payment(payment_id.clone())
            .map_err(ectx!(convert => payment_id))
            .and_then(move |payment| {
                let reference = PaymentAttemptId::new(payment.id.clone());
                let proof = ProviderProof {
                    succeeded: payment.state == PaymentState::Approved,
                    amount: payment.amount,
                    currency: payment.currency,
                    payer_id: None,
                    detail: match payment.state {
                        PaymentState::Approved => None,
                        _ => Some("Payment is not approved at the provider".to_string()),
                    },
                };

                spawn_on_pool(db_pool, cpu_pool, move |conn| {
                    let orders_repo = repo_factory.create_orders_repo(&conn);
                    let status_history_repo = repo_factory.create_status_history_repo(&conn);
                    let event_store_repo = repo_factory.create_event_store_repo(&conn);
                    let payment_attempts_repo = repo_factory.create_payment_attempts_repo(&conn);

                    let result = conn.transaction::<SettleOutcome, Error, _>(|| {
                        settle_attempt(
                            &*orders_repo,
                            &*status_history_repo,
                            &*event_store_repo,
                            &*payment_attempts_repo,
                            reference.clone(),
                            proof,
                        )
                    });

                    match result {
                        Ok(_) => Ok(()),
                        Err(e) => {
                            if let ErrorKind::NotFound = e.kind() {
                                warn!("Wallet callback for unknown attempt {}", reference);
                                Ok(())
                            } else {
                                Err(e)
                            }
                        }
                    }
                })
            });

        Box::new(fut)
    }
}
