//! Webhook verification and reconciliation integration tests.

mod common;

use common::{payment_intent_event, TestHarness, WEBHOOK_SECRET};

use chrono::{Duration, Utc};
use serde_json::json;

use payrelay_core::{
    AdditionalCharge, AdminId, CartId, CommissionPayment, Customer, Invoice, RecordId,
    RequestPayment, RulePayment, UserId,
};
use payrelay_service::stripe::webhook::sign_payload;
use payrelay_store::Store;

// ============================================================================
// Signature verification
// ============================================================================

#[tokio::test]
async fn missing_signature_header_is_rejected() {
    let harness = TestHarness::new();
    let event = payment_intent_event("evt_1", "payment_intent.succeeded", "pi_1", &[]);

    let response = harness
        .server
        .post("/webhooks/stripe")
        .text(event.to_string())
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn tampered_body_is_rejected_as_signature_mismatch() {
    let harness = TestHarness::new();

    // Seed a record the event would otherwise match.
    harness
        .store
        .put_request_payment(&RequestPayment::new(RecordId::new(1), UserId::new(42)))
        .unwrap();

    let event = payment_intent_event(
        "evt_1",
        "payment_intent.succeeded",
        "pi_1",
        &[("order_type", "request_payment"), ("user_id", "42")],
    );
    let body = event.to_string();
    let header = sign_payload(&body, WEBHOOK_SECRET, Utc::now().timestamp());

    // One tampered byte, unmodified header.
    let tampered = body.replace("succeeded", "succeedeX");

    let response = harness
        .server
        .post("/webhooks/stripe")
        .add_header("stripe-signature", header)
        .text(tampered)
        .await;

    response.assert_status_bad_request();
    let error: serde_json::Value = response.json();
    assert_eq!(error["error"]["message"], "Invalid webhook signature");

    // Nothing was reconciled.
    let record = harness
        .store
        .get_request_payment(RecordId::new(1))
        .unwrap()
        .unwrap();
    assert_eq!(record.status, 1);
    assert!(record.stripe_pay_id.is_none());
}

#[tokio::test]
async fn stale_signature_timestamp_is_rejected() {
    let harness = TestHarness::new();

    let event = payment_intent_event("evt_1", "payment_intent.succeeded", "pi_1", &[]);
    let body = event.to_string();
    let header = sign_payload(&body, WEBHOOK_SECRET, (Utc::now() - Duration::hours(1)).timestamp());

    let response = harness
        .server
        .post("/webhooks/stripe")
        .add_header("stripe-signature", header)
        .text(body)
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn valid_signature_with_unparseable_envelope_is_malformed_payload() {
    let harness = TestHarness::new();

    let body = r#"{"only": "half an event"}"#.to_string();
    let header = sign_payload(&body, WEBHOOK_SECRET, Utc::now().timestamp());

    let response = harness
        .server
        .post("/webhooks/stripe")
        .add_header("stripe-signature", header)
        .text(body)
        .await;

    response.assert_status_bad_request();
    let error: serde_json::Value = response.json();
    let message = error["error"]["message"].as_str().unwrap();
    assert!(message.starts_with("Malformed event payload"), "{message}");
}

// ============================================================================
// Routing: request payments
// ============================================================================

#[tokio::test]
async fn request_payment_routes_to_newest_open_record() {
    let harness = TestHarness::new();
    let user = UserId::new(42);

    let mut older = RequestPayment::new(RecordId::new(1), user);
    older.created_at = Utc::now() - Duration::hours(2);
    harness.store.put_request_payment(&older).unwrap();
    harness
        .store
        .put_request_payment(&RequestPayment::new(RecordId::new(2), user))
        .unwrap();

    let event = payment_intent_event(
        "evt_1",
        "payment_intent.succeeded",
        "pi_1",
        &[("order_type", "request_payment"), ("user_id", "42")],
    );
    harness.post_signed_event(&event).await.assert_status_ok();

    let updated = harness
        .store
        .get_request_payment(RecordId::new(2))
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, 2);
    assert_eq!(updated.stripe_pay_id.as_deref(), Some("pi_1"));
    assert_eq!(updated.response, event["data"]["object"]);

    // The older record is untouched: at most one record per event.
    let untouched = harness
        .store
        .get_request_payment(RecordId::new(1))
        .unwrap()
        .unwrap();
    assert_eq!(untouched.status, 1);
    assert!(untouched.stripe_pay_id.is_none());
}

#[tokio::test]
async fn request_payment_without_match_is_a_dropped_no_op() {
    let harness = TestHarness::new();

    let event = payment_intent_event(
        "evt_1",
        "payment_intent.succeeded",
        "pi_1",
        &[("order_type", "request_payment"), ("user_id", "42")],
    );

    harness.post_signed_event(&event).await.assert_status_ok();
}

// ============================================================================
// Routing: additional charges
// ============================================================================

#[tokio::test]
async fn additional_charge_keys_by_cart_when_present() {
    let harness = TestHarness::new();
    let user = UserId::new(42);

    harness
        .store
        .put_additional_charge(&AdditionalCharge::new(
            RecordId::new(1),
            user,
            Some(CartId::new(9)),
        ))
        .unwrap();
    harness
        .store
        .put_additional_charge(&AdditionalCharge::new(RecordId::new(2), user, None))
        .unwrap();

    let event = payment_intent_event(
        "evt_1",
        "payment_intent.payment_failed",
        "pi_1",
        &[
            ("order_type", "additional_charge"),
            ("user_id", "42"),
            ("cart_id", "9"),
        ],
    );
    harness.post_signed_event(&event).await.assert_status_ok();

    let by_cart = harness
        .store
        .get_additional_charge(RecordId::new(1))
        .unwrap()
        .unwrap();
    assert_eq!(by_cart.status, 3);
    assert_eq!(by_cart.charge_id.as_deref(), Some("pi_1"));

    let other = harness
        .store
        .get_additional_charge(RecordId::new(2))
        .unwrap()
        .unwrap();
    assert_eq!(other.status, 1);
}

// ============================================================================
// Routing: commissions
// ============================================================================

#[tokio::test]
async fn commission_period_update_stores_string_status() {
    let harness = TestHarness::new();

    harness
        .store
        .put_commission(&CommissionPayment::new(
            RecordId::new(1),
            AdminId::new(3),
            5,
            2024,
        ))
        .unwrap();

    let event = payment_intent_event(
        "evt_1",
        "payment_intent.processing",
        "pi_1",
        &[
            ("order_type", "commission_payment"),
            ("admin_id", "3"),
            ("month", "5"),
            ("year", "2024"),
        ],
    );
    harness.post_signed_event(&event).await.assert_status_ok();

    let commission = harness.store.get_commission(RecordId::new(1)).unwrap().unwrap();
    assert_eq!(commission.status, "processing");
    assert_eq!(commission.txt_id.as_deref(), Some("pi_1"));
}

#[tokio::test]
async fn commission_without_period_matches_by_stored_reference() {
    let harness = TestHarness::new();

    let mut commission =
        CommissionPayment::new(RecordId::new(1), AdminId::new(3), 5, 2024);
    commission.txt_id = Some("pi_1".into());
    harness.store.put_commission(&commission).unwrap();

    let event = payment_intent_event(
        "evt_1",
        "payment_intent.succeeded",
        "pi_1",
        &[("order_type", "commission_payment")],
    );
    harness.post_signed_event(&event).await.assert_status_ok();

    let commission = harness.store.get_commission(RecordId::new(1)).unwrap().unwrap();
    assert_eq!(commission.status, "succeeded");
}

// ============================================================================
// Routing: order ids
// ============================================================================

#[tokio::test]
async fn comma_list_order_id_bulk_updates_rule_payments() {
    let harness = TestHarness::new();

    for id in [7, 8, 9] {
        harness
            .store
            .put_rule_payment(&RulePayment::new(RecordId::new(id)))
            .unwrap();
    }

    let event = payment_intent_event(
        "evt_1",
        "payment_intent.payment_failed",
        "pi_1",
        &[("order_id", "7,8,9|42")],
    );
    harness.post_signed_event(&event).await.assert_status_ok();

    for id in [7, 8, 9] {
        let payment = harness
            .store
            .get_rule_payment(RecordId::new(id))
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, 3, "rule payment {id}");
        assert_eq!(payment.txt_id.as_deref(), Some("pi_1"));
    }
}

#[tokio::test]
async fn single_order_id_prefers_invoice_over_rule_payment() {
    let harness = TestHarness::new();

    harness
        .store
        .put_invoice(&Invoice::new(RecordId::new(7)))
        .unwrap();
    harness
        .store
        .put_rule_payment(&RulePayment::new(RecordId::new(7)))
        .unwrap();

    let event = payment_intent_event(
        "evt_1",
        "payment_intent.succeeded",
        "pi_1",
        &[("order_id", "7|42")],
    );
    harness.post_signed_event(&event).await.assert_status_ok();

    let invoice = harness.store.get_invoice(RecordId::new(7)).unwrap().unwrap();
    assert_eq!(invoice.status, 2);
    assert_eq!(invoice.charge_id.as_deref(), Some("pi_1"));

    // The rule payment with the same id is untouched.
    let rule = harness
        .store
        .get_rule_payment(RecordId::new(7))
        .unwrap()
        .unwrap();
    assert_eq!(rule.status, 1);
}

#[tokio::test]
async fn single_order_id_falls_back_to_rule_payment() {
    let harness = TestHarness::new();

    harness
        .store
        .put_rule_payment(&RulePayment::new(RecordId::new(7)))
        .unwrap();

    let event = payment_intent_event(
        "evt_1",
        "payment_intent.succeeded",
        "pi_1",
        &[("order_id", "7|42")],
    );
    harness.post_signed_event(&event).await.assert_status_ok();

    let rule = harness
        .store
        .get_rule_payment(RecordId::new(7))
        .unwrap()
        .unwrap();
    assert_eq!(rule.status, 2);
}

// ============================================================================
// Routing: reverse reference lookup
// ============================================================================

#[tokio::test]
async fn no_metadata_falls_back_to_reference_lookup() {
    let harness = TestHarness::new();

    let mut invoice = Invoice::new(RecordId::new(5));
    invoice.charge_id = Some("pi_1".into());
    harness.store.put_invoice(&invoice).unwrap();

    let event = payment_intent_event("evt_1", "payment_intent.succeeded", "pi_1", &[]);
    harness.post_signed_event(&event).await.assert_status_ok();

    let invoice = harness.store.get_invoice(RecordId::new(5)).unwrap().unwrap();
    assert_eq!(invoice.status, 2);
}

// ============================================================================
// Malformed routing metadata
// ============================================================================

#[tokio::test]
async fn unknown_order_type_is_rejected_loudly() {
    let harness = TestHarness::new();

    let event = payment_intent_event(
        "evt_1",
        "payment_intent.succeeded",
        "pi_1",
        &[("order_type", "gift_card")],
    );

    let response = harness.post_signed_event(&event).await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn malformed_order_id_is_rejected_loudly() {
    let harness = TestHarness::new();

    let event = payment_intent_event(
        "evt_1",
        "payment_intent.succeeded",
        "pi_1",
        &[("order_id", "7,8,9")],
    );

    let response = harness.post_signed_event(&event).await;
    response.assert_status_bad_request();
}

// ============================================================================
// Setup intents
// ============================================================================

#[tokio::test]
async fn setup_intent_succeeded_marks_customer_verified() {
    let harness = TestHarness::new();

    let mut customer = Customer::new(UserId::new(42));
    customer.customer_id = Some("cus_1".into());
    customer.setup_intent_id = Some("seti_1".into());
    harness.store.put_customer(&customer).unwrap();

    let event = json!({
        "id": "evt_1",
        "type": "setup_intent.succeeded",
        "created": Utc::now().timestamp(),
        "data": {
            "object": {
                "id": "seti_1",
                "status": "succeeded",
                "customer": "cus_1",
                "payment_method": "pm_1",
            }
        }
    });
    harness.post_signed_event(&event).await.assert_status_ok();

    let customer = harness.store.get_customer(UserId::new(42)).unwrap().unwrap();
    assert_eq!(customer.status.to_string(), "verified");
    assert_eq!(customer.payment_method_id.as_deref(), Some("pm_1"));
}

#[tokio::test]
async fn setup_intent_failure_marks_customer_failed() {
    let harness = TestHarness::new();

    let mut customer = Customer::new(UserId::new(42));
    customer.setup_intent_id = Some("seti_1".into());
    harness.store.put_customer(&customer).unwrap();

    let event = json!({
        "id": "evt_1",
        "type": "setup_intent.setup_failed",
        "created": Utc::now().timestamp(),
        "data": {
            "object": { "id": "seti_1", "status": "canceled" }
        }
    });
    harness.post_signed_event(&event).await.assert_status_ok();

    let customer = harness.store.get_customer(UserId::new(42)).unwrap().unwrap();
    assert_eq!(customer.status.to_string(), "failed");
}

// ============================================================================
// Legacy charges
// ============================================================================

#[tokio::test]
async fn legacy_charge_matches_invoice_by_charge_reference() {
    let harness = TestHarness::new();

    let mut invoice = Invoice::new(RecordId::new(3));
    invoice.charge_id = Some("ch_1".into());
    harness.store.put_invoice(&invoice).unwrap();

    let event = json!({
        "id": "evt_1",
        "type": "charge.succeeded",
        "created": Utc::now().timestamp(),
        "data": {
            "object": { "id": "ch_1", "status": "succeeded" }
        }
    });
    harness.post_signed_event(&event).await.assert_status_ok();

    let invoice = harness.store.get_invoice(RecordId::new(3)).unwrap().unwrap();
    assert_eq!(invoice.status, 2);
}

#[tokio::test]
async fn legacy_charge_falls_back_to_subscription_group() {
    let harness = TestHarness::new();

    let mut invoice = Invoice::new(RecordId::new(3));
    invoice.subscription_group = Some("in_grp_1".into());
    harness.store.put_invoice(&invoice).unwrap();

    let event = json!({
        "id": "evt_1",
        "type": "charge.pending",
        "created": Utc::now().timestamp(),
        "data": {
            "object": { "id": "ch_1", "status": "pending", "invoice": "in_grp_1" }
        }
    });
    harness.post_signed_event(&event).await.assert_status_ok();

    let invoice = harness.store.get_invoice(RecordId::new(3)).unwrap().unwrap();
    assert_eq!(invoice.status, 1);
    assert_eq!(invoice.charge_id.as_deref(), Some("ch_1"));
}

// ============================================================================
// Idempotence and unknown types
// ============================================================================

#[tokio::test]
async fn redelivering_an_identical_event_is_a_no_op() {
    let harness = TestHarness::new();
    let user = UserId::new(42);

    harness
        .store
        .put_request_payment(&RequestPayment::new(RecordId::new(1), user))
        .unwrap();

    let event = payment_intent_event(
        "evt_1",
        "payment_intent.succeeded",
        "pi_1",
        &[("order_type", "request_payment"), ("user_id", "42")],
    );

    harness.post_signed_event(&event).await.assert_status_ok();
    let first = harness
        .store
        .get_request_payment(RecordId::new(1))
        .unwrap()
        .unwrap();

    harness.post_signed_event(&event).await.assert_status_ok();
    let second = harness
        .store
        .get_request_payment(RecordId::new(1))
        .unwrap()
        .unwrap();

    assert_eq!(first.status, second.status);
    assert_eq!(first.stripe_pay_id, second.stripe_pay_id);
    assert_eq!(first.updated_at, second.updated_at);
}

#[tokio::test]
async fn unknown_event_type_is_accepted_without_mutation() {
    let harness = TestHarness::new();

    harness
        .store
        .put_invoice(&Invoice::new(RecordId::new(1)))
        .unwrap();

    let event = json!({
        "id": "evt_1",
        "type": "customer.created",
        "created": Utc::now().timestamp(),
        "data": { "object": { "id": "cus_1" } }
    });

    let response = harness.post_signed_event(&event).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["received"], true);

    let invoice = harness.store.get_invoice(RecordId::new(1)).unwrap().unwrap();
    assert_eq!(invoice.status, 1);
    assert!(invoice.charge_id.is_none());
}

#[tokio::test]
async fn event_object_not_matching_type_is_rejected() {
    let harness = TestHarness::new();

    // A payment_intent event whose object has no id.
    let event = json!({
        "id": "evt_1",
        "type": "payment_intent.succeeded",
        "created": Utc::now().timestamp(),
        "data": { "object": { "amount": 2500 } }
    });

    let response = harness.post_signed_event(&event).await;
    response.assert_status_bad_request();
}
