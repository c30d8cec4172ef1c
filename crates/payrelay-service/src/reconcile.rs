//! Event routing and reconciliation.
//!
//! Given a verified processor event, update at most one payment record and
//! report what happened. The report is for logging only; no caller consumes
//! it beyond the webhook handler's tracing.
//!
//! Routing priority for `payment_intent.*` events:
//!
//! 1. `order_type` metadata (request payment / additional charge /
//!    commission)
//! 2. `order_id` metadata (`"<ids>|<user>"`: invoice or bulk rule payments)
//! 3. reverse lookup of the payment-intent id across every table's stored
//!    reference, in fixed priority order
//!
//! A no-match outcome is logged and dropped; it is not an error. Exact
//! redeliveries are dropped through the processed-event ledger, which is
//! written only after a reconciliation that mutated something, so a failed
//! delivery stays retryable.

use std::fmt;

use payrelay_core::{
    routing, CustomerStatus, PaymentRecord, PaymentStatus, RecordId, RecordKind, RoutingKey,
    UserId,
};
use payrelay_store::{ReferenceMatch, Store};

use crate::error::ApiError;
use crate::state::AppState;
use crate::stripe::types::{Charge, PaymentIntent, SetupIntent, WebhookEvent};

/// What a reconciliation attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A customer record was marked verified.
    CustomerVerified(UserId),
    /// A customer record was marked failed.
    CustomerFailed(UserId),
    /// One payment record was updated.
    Updated {
        /// The table that matched.
        kind: RecordKind,
        /// The updated row.
        id: RecordId,
    },
    /// Several rule payments were updated from one comma-list order id.
    BulkUpdated {
        /// Number of rows updated.
        count: usize,
    },
    /// No record matched; the event was dropped.
    NoMatch,
    /// The event type is not one this service handles.
    Ignored,
    /// The event id was already in the processed ledger.
    Duplicate,
}

impl Outcome {
    /// Whether this outcome mutated a record.
    #[must_use]
    pub fn mutated(&self) -> bool {
        match self {
            Self::CustomerVerified(_) | Self::CustomerFailed(_) | Self::Updated { .. } => true,
            Self::BulkUpdated { count } => *count > 0,
            Self::NoMatch | Self::Ignored | Self::Duplicate => false,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CustomerVerified(user) => write!(f, "customer {user} verified"),
            Self::CustomerFailed(user) => write!(f, "customer {user} failed"),
            Self::Updated { kind, id } => write!(f, "updated {kind} {id}"),
            Self::BulkUpdated { count } => write!(f, "updated {count} rule payments"),
            Self::NoMatch => f.write_str("no matching record"),
            Self::Ignored => f.write_str("ignored"),
            Self::Duplicate => f.write_str("duplicate delivery"),
        }
    }
}

/// Process one verified event.
///
/// # Errors
///
/// Returns `ApiError::BadRequest` on malformed routing metadata or an event
/// object that does not match its type, and `ApiError::Internal` on store
/// failures. Both leave the ledger untouched so the processor's redelivery
/// can retry.
pub async fn process_event(state: &AppState, event: &WebhookEvent) -> Result<Outcome, ApiError> {
    if state.store.has_processed_event(&event.id)? {
        tracing::info!(event_id = %event.id, "Duplicate delivery, skipping");
        return Ok(Outcome::Duplicate);
    }

    let outcome = match event.event_type.as_str() {
        "setup_intent.succeeded" => {
            handle_setup_intent(state, event, CustomerStatus::Verified)?
        }
        "setup_intent.setup_failed" => handle_setup_intent(state, event, CustomerStatus::Failed)?,
        "payment_intent.succeeded" => {
            handle_payment_intent(state, event, PaymentStatus::Succeeded).await?
        }
        // requires_action is treated as still pending on our side
        "payment_intent.processing" | "payment_intent.requires_action" => {
            handle_payment_intent(state, event, PaymentStatus::Processing).await?
        }
        "payment_intent.payment_failed" => {
            handle_payment_intent(state, event, PaymentStatus::Failed).await?
        }
        "charge.pending" => handle_legacy_charge(state, event, PaymentStatus::Processing)?,
        "charge.succeeded" => handle_legacy_charge(state, event, PaymentStatus::Succeeded)?,
        "charge.failed" => handle_legacy_charge(state, event, PaymentStatus::Failed)?,
        other => {
            tracing::debug!(event_type = %other, event_id = %event.id, "Unhandled event type");
            Outcome::Ignored
        }
    };

    // Ledger only deliveries that changed something; a no-match redelivery
    // may still find its record once the surrounding application creates it.
    if outcome.mutated() {
        let created = chrono::DateTime::from_timestamp(event.created, 0)
            .unwrap_or_else(chrono::Utc::now);
        state.store.insert_processed_event(&event.id, created)?;
    }

    Ok(outcome)
}

/// Decode the event object as the payload type its event type promises.
fn decode_object<T: serde::de::DeserializeOwned>(event: &WebhookEvent) -> Result<T, ApiError> {
    serde_json::from_value(event.data.object.clone()).map_err(|e| {
        ApiError::BadRequest(format!(
            "event {} object does not match type {}: {e}",
            event.id, event.event_type
        ))
    })
}

// =============================================================================
// Setup intents
// =============================================================================

fn handle_setup_intent(
    state: &AppState,
    event: &WebhookEvent,
    status: CustomerStatus,
) -> Result<Outcome, ApiError> {
    let setup_intent: SetupIntent = decode_object(event)?;

    let Some(mut customer) = state
        .store
        .find_customer_by_setup_intent(&setup_intent.id)?
    else {
        tracing::warn!(
            setup_intent_id = %setup_intent.id,
            "No customer holds this setup intent"
        );
        return Ok(Outcome::NoMatch);
    };

    customer.mark_verification(status, setup_intent.payment_method.clone());
    state.store.put_customer(&customer)?;

    Ok(match status {
        CustomerStatus::Verified => Outcome::CustomerVerified(customer.user_id),
        _ => Outcome::CustomerFailed(customer.user_id),
    })
}

// =============================================================================
// Payment intents
// =============================================================================

async fn handle_payment_intent(
    state: &AppState,
    event: &WebhookEvent,
    status: PaymentStatus,
) -> Result<Outcome, ApiError> {
    let intent: PaymentIntent = decode_object(event)?;
    let snapshot = event.data.object.clone();

    // Decode the routing metadata once, loudly rejecting malformed hints.
    let key = routing::decode(&intent.metadata)?;

    match key {
        RoutingKey::RequestPayment { user_id } => {
            let Some(mut payment) = state.store.find_request_payment(user_id, &intent.id)? else {
                return no_match(RecordKind::RequestPayment, &intent.id);
            };
            payment.apply(&intent.id, status, snapshot);
            state.store.put_request_payment(&payment)?;
            Ok(Outcome::Updated {
                kind: RecordKind::RequestPayment,
                id: payment.id,
            })
        }

        RoutingKey::AdditionalCharge { user_id, cart_id } => {
            let Some(mut charge) =
                state
                    .store
                    .find_additional_charge(cart_id, user_id, &intent.id)?
            else {
                return no_match(RecordKind::AdditionalCharge, &intent.id);
            };
            charge.apply(&intent.id, status, snapshot);
            state.store.put_additional_charge(&charge)?;
            Ok(Outcome::Updated {
                kind: RecordKind::AdditionalCharge,
                id: charge.id,
            })
        }

        RoutingKey::Commission { period } => {
            let found = match period {
                Some(period) => state.store.find_commission_by_period(period)?,
                None => state.store.find_commission_by_reference(&intent.id)?,
            };
            let Some(mut commission) = found else {
                return no_match(RecordKind::Commission, &intent.id);
            };

            commission.apply(&intent.id, status, snapshot);
            if let Some(balance_id) = fetch_balance_reference(state, &intent).await {
                commission.balance_id = Some(balance_id);
            }
            state.store.put_commission(&commission)?;
            Ok(Outcome::Updated {
                kind: RecordKind::Commission,
                id: commission.id,
            })
        }

        RoutingKey::Order {
            invoice_ids,
            user_id,
        } => handle_order(state, &intent, &invoice_ids, user_id, status, &snapshot),

        RoutingKey::Reference => handle_reference_lookup(state, &intent, status, &snapshot),
    }
}

/// `order_id` routing: a comma list names rule payments for a bulk update;
/// a single id is tried against the invoice table first, then rule
/// payments.
fn handle_order(
    state: &AppState,
    intent: &PaymentIntent,
    invoice_ids: &[RecordId],
    user_id: UserId,
    status: PaymentStatus,
    snapshot: &serde_json::Value,
) -> Result<Outcome, ApiError> {
    if invoice_ids.len() > 1 {
        let mut payments = state.store.get_rule_payments(invoice_ids)?;
        if payments.is_empty() {
            return no_match(RecordKind::RulePayment, &intent.id);
        }
        let count = payments.len();
        for payment in &mut payments {
            payment.apply(&intent.id, status, snapshot.clone());
            state.store.put_rule_payment(payment)?;
        }
        tracing::info!(
            user_id = %user_id,
            count = %count,
            payment_intent = %intent.id,
            "Bulk rule-payment update"
        );
        return Ok(Outcome::BulkUpdated { count });
    }

    let id = invoice_ids[0];
    if let Some(mut invoice) = state.store.get_invoice(id)? {
        invoice.apply(&intent.id, status, snapshot.clone());
        state.store.put_invoice(&invoice)?;
        return Ok(Outcome::Updated {
            kind: RecordKind::Invoice,
            id,
        });
    }
    if let Some(mut payment) = state.store.get_rule_payment(id)? {
        payment.apply(&intent.id, status, snapshot.clone());
        state.store.put_rule_payment(&payment)?;
        return Ok(Outcome::Updated {
            kind: RecordKind::RulePayment,
            id,
        });
    }

    no_match(RecordKind::Invoice, &intent.id)
}

/// No routing hints: search every table's stored reference for the
/// payment-intent id, first match wins.
fn handle_reference_lookup(
    state: &AppState,
    intent: &PaymentIntent,
    status: PaymentStatus,
    snapshot: &serde_json::Value,
) -> Result<Outcome, ApiError> {
    let Some(found) = state.store.find_by_reference(&intent.id)? else {
        tracing::info!(
            payment_intent = %intent.id,
            "No table holds this payment reference"
        );
        return Ok(Outcome::NoMatch);
    };

    let kind = found.kind();
    let id = match found {
        ReferenceMatch::Invoice(mut invoice) => {
            invoice.apply(&intent.id, status, snapshot.clone());
            state.store.put_invoice(&invoice)?;
            invoice.id
        }
        ReferenceMatch::RulePayment(mut payment) => {
            payment.apply(&intent.id, status, snapshot.clone());
            state.store.put_rule_payment(&payment)?;
            payment.id
        }
        ReferenceMatch::RequestPayment(mut payment) => {
            payment.apply(&intent.id, status, snapshot.clone());
            state.store.put_request_payment(&payment)?;
            payment.id
        }
        ReferenceMatch::AdditionalCharge(mut charge) => {
            charge.apply(&intent.id, status, snapshot.clone());
            state.store.put_additional_charge(&charge)?;
            charge.id
        }
        ReferenceMatch::Commission(mut commission) => {
            commission.apply(&intent.id, status, snapshot.clone());
            state.store.put_commission(&commission)?;
            commission.id
        }
    };

    Ok(Outcome::Updated { kind, id })
}

/// Best-effort settlement reference for the commission table: retrieve the
/// intent's latest charge and read its balance transaction. Failures are
/// logged and never block the status update.
async fn fetch_balance_reference(state: &AppState, intent: &PaymentIntent) -> Option<String> {
    let charge_id = intent.latest_charge.as_deref()?;
    let stripe = state.stripe.as_ref()?;

    match stripe.get_charge(charge_id).await {
        Ok(charge) => charge.balance_transaction,
        Err(e) => {
            tracing::warn!(
                charge_id = %charge_id,
                error = %e,
                "Could not retrieve charge for balance reference"
            );
            None
        }
    }
}

// =============================================================================
// Legacy charges
// =============================================================================

/// Legacy `charge.*` path: invoices predate payment intents, so the charge
/// id is the stored reference. Falls back to matching the charge's invoice
/// reference against the invoice's subscription group.
fn handle_legacy_charge(
    state: &AppState,
    event: &WebhookEvent,
    status: PaymentStatus,
) -> Result<Outcome, ApiError> {
    let charge: Charge = decode_object(event)?;

    let mut invoice = match state.store.find_invoice_by_charge(&charge.id)? {
        Some(invoice) => invoice,
        None => {
            let by_group = match charge.invoice.as_deref() {
                Some(group) => state.store.find_invoice_by_subscription_group(group)?,
                None => None,
            };
            match by_group {
                Some(invoice) => invoice,
                None => {
                    tracing::info!(
                        charge_id = %charge.id,
                        "No invoice matches this charge"
                    );
                    return Ok(Outcome::NoMatch);
                }
            }
        }
    };

    invoice.apply(&charge.id, status, event.data.object.clone());
    state.store.put_invoice(&invoice)?;

    Ok(Outcome::Updated {
        kind: RecordKind::Invoice,
        id: invoice.id,
    })
}

fn no_match(kind: RecordKind, payment_ref: &str) -> Result<Outcome, ApiError> {
    tracing::info!(
        table = %kind,
        payment_intent = %payment_ref,
        "No matching record for routed event"
    );
    Ok(Outcome::NoMatch)
}
