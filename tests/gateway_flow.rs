//! End-to-end callback and follow-up flows against an in-memory store and a
//! scripted processor.

use async_trait::async_trait;
use clickpay_gateway::config::{GatewayConfig, PayPageMode, Region};
use clickpay_gateway::error::{GatewayError, GatewayResult};
use clickpay_gateway::gateway::{FollowupOrchestrator, FollowupOutcome, OffsiteGateway};
use clickpay_gateway::money::Price;
use clickpay_gateway::order::{BillingProfile, Order};
use clickpay_gateway::payment::{Payment, PaymentState};
use clickpay_gateway::processor::types::{
    CallbackFields, FollowupRequest, FollowupResponse, PayPageResponse, TransactionDescriptor,
    TransactionType, VerifiedTransaction,
};
use clickpay_gateway::processor::ProcessorClient;
use clickpay_gateway::store::{InMemoryStore, OrderStore, PaymentStore, StoreError};
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Scripted processor double. Signature validity, the verified transaction
/// type, and the follow-up response are all fixed up front; every call is
/// counted.
struct MockProcessor {
    signature_valid: bool,
    verified_type: Option<TransactionType>,
    followup: FollowupResponse,
    verify_calls: AtomicUsize,
    followup_calls: AtomicUsize,
}

impl MockProcessor {
    fn approving(verified_type: Option<TransactionType>) -> Self {
        Self {
            signature_valid: true,
            verified_type,
            followup: approved_followup("TST2024002"),
            verify_calls: AtomicUsize::new(0),
            followup_calls: AtomicUsize::new(0),
        }
    }

    fn with_followup(mut self, followup: FollowupResponse) -> Self {
        self.followup = followup;
        self
    }

    fn rejecting_signatures() -> Self {
        Self {
            signature_valid: false,
            ..Self::approving(Some(TransactionType::Sale))
        }
    }
}

fn approved_followup(tran_ref: &str) -> FollowupResponse {
    FollowupResponse {
        success: true,
        pending_success: false,
        message: "Approved".to_string(),
        tran_ref: tran_ref.to_string(),
        cart_id: "1042".to_string(),
        response_status: "A".to_string(),
    }
}

#[async_trait]
impl ProcessorClient for MockProcessor {
    async fn create_pay_page(
        &self,
        _descriptor: &TransactionDescriptor,
    ) -> GatewayResult<PayPageResponse> {
        Ok(PayPageResponse {
            tran_ref: "TST2024001".to_string(),
            redirect_url: "https://secure.clickpay.com.sa/payment/page/TST2024001".to_string(),
        })
    }

    fn is_valid_redirect(&self, _fields: &CallbackFields) -> bool {
        self.signature_valid
    }

    async fn verify_payment(&self, tran_ref: &str) -> GatewayResult<VerifiedTransaction> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(VerifiedTransaction {
            tran_ref: tran_ref.to_string(),
            tran_type: self.verified_type,
        })
    }

    async fn request_followup(
        &self,
        _request: &FollowupRequest,
    ) -> GatewayResult<FollowupResponse> {
        self.followup_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.followup.clone())
    }
}

fn test_config() -> GatewayConfig {
    GatewayConfig {
        profile_id: 12345,
        server_key: "SJJ9KD6M2B-TESTKEY".to_string(),
        region: Region::Sau,
        pay_page_mode: PayPageMode::Sale,
        hide_shipping_address: false,
        complete_order_status: "completed".to_string(),
        callback_base_url: "https://shop.example".to_string(),
        request_timeout_secs: 30,
    }
}

fn test_order() -> Order {
    Order {
        id: "1042".to_string(),
        total_price: Price::new(dec!(150.000), "KWD"),
        billing: BillingProfile {
            given_name: "Noor".to_string(),
            family_name: "Hassan".to_string(),
            email: Some("noor@example.com".to_string()),
            phone: Some("96550001234".to_string()),
            address_line: Some("12 Gulf Road".to_string()),
            locality: Some("Kuwait City".to_string()),
            administrative_area: None,
            postal_code: None,
            country: "KWT".to_string(),
        },
        shipping: None,
        items: vec![],
        adjustments: vec![],
        status: "draft".to_string(),
    }
}

fn callback_fields(resp_status: &str) -> CallbackFields {
    CallbackFields::new([
        ("tranRef".to_string(), "TST2024001".to_string()),
        ("respStatus".to_string(), resp_status.to_string()),
        ("cartId".to_string(), "1042".to_string()),
        ("respMessage".to_string(), "Authorised".to_string()),
        ("signature".to_string(), "deadbeef".to_string()),
    ])
}

async fn gateway_with(
    processor: Arc<MockProcessor>,
) -> (OffsiteGateway, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    store.add_order(test_order()).await;
    let gateway = OffsiteGateway::new(test_config(), processor, store.clone(), store.clone());
    (gateway, store)
}

async fn seed_payment(store: &InMemoryStore, state: PaymentState) -> Payment {
    let payment = Payment::new(
        "1042",
        state,
        Price::new(dec!(150.000), "KWD"),
        "TST2024001",
        "A",
    );
    store.insert(&payment).await.unwrap()
}

#[tokio::test]
async fn test_approved_sale_completes_payment_and_order() {
    let processor = Arc::new(MockProcessor::approving(Some(TransactionType::Sale)));
    let (gateway, store) = gateway_with(processor.clone()).await;

    let payment = gateway
        .handle_return("1042", &callback_fields("A"))
        .await
        .unwrap()
        .expect("a payment record");

    assert_eq!(payment.state, PaymentState::Completed);
    assert_eq!(payment.amount, Price::new(dec!(150.000), "KWD"));
    assert_eq!(payment.remote_id, "TST2024001");
    assert_eq!(payment.remote_state, "A");
    assert_eq!(processor.verify_calls.load(Ordering::SeqCst), 1);

    let order = OrderStore::find_by_id(&*store, "1042").await.unwrap().unwrap();
    assert_eq!(order.status, "completed");
}

#[tokio::test]
async fn test_approved_auth_creates_authorization() {
    let processor = Arc::new(MockProcessor::approving(Some(TransactionType::Auth)));
    let (gateway, store) = gateway_with(processor).await;

    let payment = gateway
        .handle_return("1042", &callback_fields("A"))
        .await
        .unwrap()
        .expect("a payment record");

    assert_eq!(payment.state, PaymentState::Authorization);

    // An approved hold is still a successful return; the order advances.
    let order = OrderStore::find_by_id(&*store, "1042").await.unwrap().unwrap();
    assert_eq!(order.status, "completed");
}

#[tokio::test]
async fn test_auth_mode_return_applies_configured_order_status() {
    let processor = Arc::new(MockProcessor::approving(Some(TransactionType::Auth)));
    let store = Arc::new(InMemoryStore::new());
    store.add_order(test_order()).await;
    let mut config = test_config();
    config.pay_page_mode = PayPageMode::Auth;
    config.complete_order_status = "fulfillment".to_string();
    let gateway = OffsiteGateway::new(config, processor, store.clone(), store.clone());

    let payment = gateway
        .handle_return("1042", &callback_fields("A"))
        .await
        .unwrap()
        .expect("a payment record");

    assert_eq!(payment.state, PaymentState::Authorization);
    let order = OrderStore::find_by_id(&*store, "1042").await.unwrap().unwrap();
    assert_eq!(order.status, "fulfillment");
}

#[tokio::test]
async fn test_cancelled_callback_skips_verification() {
    let processor = Arc::new(MockProcessor::approving(Some(TransactionType::Sale)));
    let (gateway, _store) = gateway_with(processor.clone()).await;

    let payment = gateway
        .handle_return("1042", &callback_fields("C"))
        .await
        .unwrap()
        .expect("a payment record");

    assert_eq!(payment.state, PaymentState::Cancelled);
    assert_eq!(processor.verify_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_approved_unknown_type_is_noop() {
    let processor = Arc::new(MockProcessor::approving(None));
    let (gateway, store) = gateway_with(processor).await;

    let outcome = gateway
        .handle_return("1042", &callback_fields("A"))
        .await
        .unwrap();

    assert!(outcome.is_none());
    assert!(store.find_by_order("1042").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_delivery_yields_single_record() {
    let processor = Arc::new(MockProcessor::approving(Some(TransactionType::Sale)));
    let (gateway, store) = gateway_with(processor).await;

    let first = gateway
        .handle_return("1042", &callback_fields("A"))
        .await
        .unwrap()
        .unwrap();
    let second = gateway
        .handle_notify(&callback_fields("A"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(store.find_by_order("1042").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_deliveries_yield_single_record() {
    let processor = Arc::new(MockProcessor::approving(Some(TransactionType::Sale)));
    let store = Arc::new(InMemoryStore::new());
    store.add_order(test_order()).await;
    let gateway = Arc::new(OffsiteGateway::new(
        test_config(),
        processor,
        store.clone(),
        store.clone(),
    ));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let gateway = gateway.clone();
        handles.push(tokio::spawn(async move {
            gateway.handle_notify(&callback_fields("A")).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.find_by_order("1042").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_signature_rejected_without_side_effects() {
    let processor = Arc::new(MockProcessor::rejecting_signatures());
    let (gateway, store) = gateway_with(processor.clone()).await;

    let result = gateway.handle_return("1042", &callback_fields("A")).await;

    assert!(matches!(result, Err(GatewayError::InvalidCallback(_))));
    assert!(store.find_by_order("1042").await.unwrap().is_empty());
    assert_eq!(processor.verify_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_return_rejects_cart_id_mismatch() {
    let processor = Arc::new(MockProcessor::approving(Some(TransactionType::Sale)));
    let (gateway, _store) = gateway_with(processor).await;

    let result = gateway.handle_return("9999", &callback_fields("A")).await;
    assert!(matches!(result, Err(GatewayError::InvalidCallback(_))));
}

#[tokio::test]
async fn test_notify_unknown_order_is_not_found() {
    let processor = Arc::new(MockProcessor::approving(Some(TransactionType::Sale)));
    let store = Arc::new(InMemoryStore::new());
    let gateway = OffsiteGateway::new(test_config(), processor, store.clone(), store);

    let result = gateway.handle_notify(&callback_fields("A")).await;
    assert!(matches!(
        result,
        Err(GatewayError::Store(StoreError::NotFound { .. }))
    ));
}

#[tokio::test]
async fn test_refund_over_balance_never_reaches_processor() {
    let processor = Arc::new(MockProcessor::approving(Some(TransactionType::Sale)));
    let store = Arc::new(InMemoryStore::new());
    let payment = seed_payment(&store, PaymentState::Completed).await;
    let followups = FollowupOrchestrator::new(processor.clone(), store);

    let result = followups
        .refund(payment.id, Some(Price::new(dec!(200.000), "KWD")))
        .await;

    assert!(matches!(result, Err(GatewayError::AmountExceeded { .. })));
    assert_eq!(processor.followup_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_partial_then_full_refund() {
    let processor = Arc::new(MockProcessor::approving(Some(TransactionType::Sale)));
    let store = Arc::new(InMemoryStore::new());
    let payment = seed_payment(&store, PaymentState::Completed).await;
    let followups = FollowupOrchestrator::new(processor.clone(), store.clone());

    let outcome = followups
        .refund(payment.id, Some(Price::new(dec!(50.000), "KWD")))
        .await
        .unwrap();
    let FollowupOutcome::Applied(partial) = outcome else {
        panic!("expected in-place update");
    };
    assert_eq!(partial.state, PaymentState::PartiallyRefunded);
    assert_eq!(partial.refunded_amount, Price::new(dec!(50.000), "KWD"));
    assert_eq!(partial.balance(), Price::new(dec!(100.000), "KWD"));

    let outcome = followups
        .refund(payment.id, Some(Price::new(dec!(100.000), "KWD")))
        .await
        .unwrap();
    let FollowupOutcome::Applied(full) = outcome else {
        panic!("expected in-place update");
    };
    assert_eq!(full.state, PaymentState::Refunded);
    assert!(full.balance().is_zero());
    assert_eq!(processor.followup_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_refund_defaults_to_full_amount() {
    let processor = Arc::new(MockProcessor::approving(Some(TransactionType::Sale)));
    let store = Arc::new(InMemoryStore::new());
    let payment = seed_payment(&store, PaymentState::Completed).await;
    let followups = FollowupOrchestrator::new(processor, store);

    let outcome = followups.refund(payment.id, None).await.unwrap();
    let FollowupOutcome::Applied(refunded) = outcome else {
        panic!("expected in-place update");
    };
    assert_eq!(refunded.state, PaymentState::Refunded);
}

#[tokio::test]
async fn test_refund_requires_completed_state() {
    let processor = Arc::new(MockProcessor::approving(Some(TransactionType::Sale)));
    let store = Arc::new(InMemoryStore::new());
    let payment = seed_payment(&store, PaymentState::Authorization).await;
    let followups = FollowupOrchestrator::new(processor, store);

    let result = followups.refund(payment.id, None).await;
    assert!(matches!(result, Err(GatewayError::InvalidState { .. })));
}

#[tokio::test]
async fn test_partial_capture_splits_payment() {
    let processor = Arc::new(MockProcessor::approving(Some(TransactionType::Sale)));
    let store = Arc::new(InMemoryStore::new());
    let payment = seed_payment(&store, PaymentState::Authorization).await;
    let followups = FollowupOrchestrator::new(processor, store.clone());

    let outcome = followups
        .capture(payment.id, Some(Price::new(dec!(60.000), "KWD")))
        .await
        .unwrap();

    let FollowupOutcome::Split { original, capture } = outcome else {
        panic!("expected a split");
    };
    assert_eq!(original.id, payment.id);
    assert_eq!(original.state, PaymentState::Authorization);
    assert_eq!(original.amount, Price::new(dec!(90.000), "KWD"));
    assert_eq!(capture.state, PaymentState::Completed);
    assert_eq!(capture.amount, Price::new(dec!(60.000), "KWD"));
    assert_eq!(capture.remote_id, "TST2024002");
    assert_eq!(store.find_by_order("1042").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_full_capture_updates_in_place() {
    let processor = Arc::new(MockProcessor::approving(Some(TransactionType::Sale)));
    let store = Arc::new(InMemoryStore::new());
    let payment = seed_payment(&store, PaymentState::Authorization).await;
    let followups = FollowupOrchestrator::new(processor, store.clone());

    let outcome = followups.capture(payment.id, None).await.unwrap();

    let FollowupOutcome::Applied(captured) = outcome else {
        panic!("expected in-place update");
    };
    assert_eq!(captured.id, payment.id);
    assert_eq!(captured.state, PaymentState::Completed);
    assert_eq!(captured.remote_id, "TST2024002");
    assert_eq!(store.find_by_order("1042").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_capture_requires_authorization_state() {
    let processor = Arc::new(MockProcessor::approving(Some(TransactionType::Sale)));
    let store = Arc::new(InMemoryStore::new());
    let payment = seed_payment(&store, PaymentState::Completed).await;
    let followups = FollowupOrchestrator::new(processor.clone(), store);

    let result = followups.capture(payment.id, None).await;
    assert!(matches!(result, Err(GatewayError::InvalidState { .. })));
    assert_eq!(processor.followup_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_void_releases_authorization() {
    let processor = Arc::new(MockProcessor::approving(Some(TransactionType::Sale)));
    let store = Arc::new(InMemoryStore::new());
    let payment = seed_payment(&store, PaymentState::Authorization).await;
    let followups = FollowupOrchestrator::new(processor, store);

    let outcome = followups.void(payment.id).await.unwrap();
    let FollowupOutcome::Applied(voided) = outcome else {
        panic!("expected in-place update");
    };
    assert_eq!(voided.state, PaymentState::AuthorizationVoided);
    assert_eq!(voided.remote_id, "TST2024002");
}

#[tokio::test]
async fn test_void_requires_authorization_state() {
    let processor = Arc::new(MockProcessor::approving(Some(TransactionType::Sale)));
    let store = Arc::new(InMemoryStore::new());
    let payment = seed_payment(&store, PaymentState::Completed).await;
    let followups = FollowupOrchestrator::new(processor, store);

    let result = followups.void(payment.id).await;
    assert!(matches!(result, Err(GatewayError::InvalidState { .. })));
}

#[tokio::test]
async fn test_pending_followup_leaves_payment_untouched() {
    let pending = FollowupResponse {
        success: false,
        pending_success: true,
        message: "Refund queued for settlement".to_string(),
        tran_ref: "TST2024002".to_string(),
        cart_id: "1042".to_string(),
        response_status: "P".to_string(),
    };
    let processor = Arc::new(
        MockProcessor::approving(Some(TransactionType::Sale)).with_followup(pending),
    );
    let store = Arc::new(InMemoryStore::new());
    let payment = seed_payment(&store, PaymentState::Completed).await;
    let followups = FollowupOrchestrator::new(processor, store.clone());

    let outcome = followups.refund(payment.id, None).await.unwrap();
    let FollowupOutcome::Pending { message } = outcome else {
        panic!("expected a pending outcome");
    };
    assert_eq!(message, "Refund queued for settlement");

    let stored = PaymentStore::find_by_id(&*store, payment.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.state, PaymentState::Completed);
    assert!(stored.refunded_amount.is_zero());
}

#[tokio::test]
async fn test_declined_followup_is_processor_error() {
    let declined = FollowupResponse {
        success: false,
        pending_success: false,
        message: "Insufficient funds".to_string(),
        tran_ref: "TST2024002".to_string(),
        cart_id: "1042".to_string(),
        response_status: "E".to_string(),
    };
    let processor = Arc::new(
        MockProcessor::approving(Some(TransactionType::Sale)).with_followup(declined),
    );
    let store = Arc::new(InMemoryStore::new());
    let payment = seed_payment(&store, PaymentState::Completed).await;
    let followups = FollowupOrchestrator::new(processor, store.clone());

    let result = followups.refund(payment.id, None).await;
    assert!(matches!(result, Err(GatewayError::Processor { .. })));

    let stored = PaymentStore::find_by_id(&*store, payment.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.state, PaymentState::Completed);
}

#[tokio::test]
async fn test_create_payment_session_returns_redirect() {
    let processor = Arc::new(MockProcessor::approving(Some(TransactionType::Sale)));
    let (gateway, _store) = gateway_with(processor).await;

    let response = gateway
        .create_payment_session(&test_order(), "g1", "https://shop.example/return", "en")
        .await
        .unwrap();

    assert_eq!(response.tran_ref, "TST2024001");
    assert!(response.redirect_url.starts_with("https://"));
}
