//! Handlers shared by the worker tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use extask::{
    Args, ErrorMapping, Failure, HandlerDescriptor, ParameterBinding, ResultPolicy, TargetShape,
    TaskFailure, TaskHandler,
};
use serde_json::{Value, json};

pub const CHARGE_TOPIC: &str = "charge-card";
pub const CHARGE_LIMIT: f64 = 1000.0;

#[derive(Debug, thiserror::Error, TaskFailure)]
#[failure(extends = "BusinessFailure")]
pub enum PaymentError {
    #[error("card declined for amount {0}")]
    Declined(f64),
    #[error("gateway unavailable")]
    #[failure(category = "GatewayDown")]
    Unavailable,
}

/// Charges a card; amounts above [`CHARGE_LIMIT`] are declined.
#[derive(Default)]
pub struct ChargeCard {
    calls: AtomicUsize,
}

impl ChargeCard {
    pub fn new() -> Arc<Self> {
        Arc::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskHandler for ChargeCard {
    fn arity(&self) -> usize {
        2
    }

    async fn handle(&self, args: Args) -> Result<Option<Value>, Failure> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let amount: f64 = args.require(0)?;
        let currency: String = args.require(1)?;
        if amount > CHARGE_LIMIT {
            return Err(PaymentError::Declined(amount).into());
        }

        Ok(Some(json!({
            "charged": amount,
            "currency": currency,
        })))
    }
}

/// Descriptor for [`ChargeCard`]: receipt entries flattened with a `payment_` prefix.
pub fn charge_descriptor(handler: Arc<ChargeCard>) -> HandlerDescriptor {
    HandlerDescriptor::builder_shared(CHARGE_TOPIC, handler)
        .bind(
            ParameterBinding::variable("amount")
                .required()
                .shape(TargetShape::Float),
        )
        .bind(
            ParameterBinding::variable("currency")
                .fallback("EUR")
                .shape(TargetShape::String),
        )
        .result(ResultPolicy::flattened().prefix("payment_"))
        .map_error(ErrorMapping::new("Declined", "PAYMENT_DECLINED"))
        .build()
        .expect("valid charge descriptor")
}

/// Fails with a technical failure for the first `failures` calls, then succeeds.
pub struct Flaky {
    failures: usize,
    calls: AtomicUsize,
}

impl Flaky {
    pub fn new(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            failures,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskHandler for Flaky {
    fn arity(&self) -> usize {
        0
    }

    async fn handle(&self, _args: Args) -> Result<Option<Value>, Failure> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(PaymentError::Unavailable.into());
        }
        Ok(Some(json!("done")))
    }
}

pub fn flaky_descriptor(topic: &str, handler: Arc<Flaky>) -> HandlerDescriptor {
    HandlerDescriptor::builder_shared(topic, handler)
        .result(ResultPolicy::named("status"))
        .map_error(ErrorMapping::new("Declined", "PAYMENT_DECLINED"))
        .build()
        .expect("valid flaky descriptor")
}

/// Sleeps before echoing its input; counts concurrent invocations.
pub struct SlowEcho {
    delay: Duration,
    current: AtomicUsize,
    max_seen: AtomicUsize,
    calls: AtomicUsize,
}

impl SlowEcho {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            current: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_seen.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskHandler for SlowEcho {
    fn arity(&self) -> usize {
        1
    }

    async fn handle(&self, args: Args) -> Result<Option<Value>, Failure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let count = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(count, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(args.value(0).cloned())
    }
}

pub fn echo_descriptor(topic: &str, handler: Arc<SlowEcho>) -> HandlerDescriptor {
    HandlerDescriptor::builder_shared(topic, handler)
        .bind(ParameterBinding::variable("input"))
        .result(ResultPolicy::named("output"))
        .build()
        .expect("valid echo descriptor")
}
