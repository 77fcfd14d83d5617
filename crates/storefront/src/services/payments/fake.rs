//! Scripted in-process gateway for tests.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{GatewayError, Notes, PaymentGateway, RemoteOrder, RemoteOrderRequest, RemoteRefund};

/// A refund the fake gateway accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRefund {
    pub refund_id: String,
    pub payment_id: String,
    pub notes: Notes,
}

#[derive(Debug, Default)]
struct FakeState {
    orders: Vec<RemoteOrderRequest>,
    refunds: Vec<RecordedRefund>,
    fail_orders: bool,
    fail_refunds: bool,
    sequence: u64,
}

/// Gateway that records calls and can be told to fail.
///
/// Ids carry a per-instance tag so runs against a shared database never
/// collide.
#[derive(Debug, Clone)]
pub struct FakeGateway {
    state: Arc<Mutex<FakeState>>,
    tag: String,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeGateway {
    #[must_use]
    pub fn new() -> Self {
        let mut tag = uuid::Uuid::new_v4().simple().to_string();
        tag.truncate(12);
        Self {
            state: Arc::default(),
            tag,
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make subsequent create-order calls fail.
    pub fn fail_orders(&self, fail: bool) {
        self.state().fail_orders = fail;
    }

    /// Make subsequent refund calls fail.
    pub fn fail_refunds(&self, fail: bool) {
        self.state().fail_refunds = fail;
    }

    /// Create-order requests received so far.
    #[must_use]
    pub fn created_orders(&self) -> Vec<RemoteOrderRequest> {
        self.state().orders.clone()
    }

    /// Refunds accepted so far.
    #[must_use]
    pub fn refunds(&self) -> Vec<RecordedRefund> {
        self.state().refunds.clone()
    }
}

impl PaymentGateway for FakeGateway {
    async fn create_order(&self, request: &RemoteOrderRequest) -> Result<RemoteOrder, GatewayError> {
        let mut state = self.state();
        if state.fail_orders {
            return Err(GatewayError::Api("The amount is invalid".into()));
        }
        state.sequence += 1;
        state.orders.push(request.clone());
        Ok(RemoteOrder {
            id: format!("order_fake{}_{}", self.tag, state.sequence),
            amount: request.amount,
            currency: request.currency.to_string(),
        })
    }

    async fn refund(&self, payment_id: &str, notes: &Notes) -> Result<RemoteRefund, GatewayError> {
        let mut state = self.state();
        if state.fail_refunds {
            return Err(GatewayError::Api(
                "The payment has been fully refunded already".into(),
            ));
        }
        state.sequence += 1;
        let refund_id = format!("rfnd_fake{}_{}", self.tag, state.sequence);
        state.refunds.push(RecordedRefund {
            refund_id: refund_id.clone(),
            payment_id: payment_id.to_owned(),
            notes: notes.clone(),
        });
        Ok(RemoteRefund { id: refund_id })
    }
}
