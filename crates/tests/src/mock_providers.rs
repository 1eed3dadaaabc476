//! Scripted providers and a notification sink that records what it was sent.

use async_trait::async_trait;
use matchday_core::{
    alerts::{Notification, NotificationSink},
    provider::ProviderError,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

/// Answers calls per provider name from a queue of scripted results.
///
/// Once a provider's queue is empty it answers with `{"provider": name}`.
#[derive(Default)]
pub struct ScriptedProviders {
    scripts: Mutex<HashMap<String, VecDeque<Result<Value, ProviderError>>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProviders {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, provider: &str, result: Result<Value, ProviderError>) {
        self.scripts.lock().entry(provider.to_string()).or_default().push_back(result);
    }

    /// Makes `provider` fail `times` times with an HTTP 500.
    pub fn fail(&self, provider: &str, times: usize) {
        for _ in 0..times {
            self.push(provider, Err(ProviderError::Http { status: 500, message: "upstream error".into() }));
        }
    }

    pub fn respond(&self, provider: &str) -> Result<Value, ProviderError> {
        self.calls.lock().push(provider.to_string());
        self.scripts
            .lock()
            .get_mut(provider)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(json!({ "provider": provider })))
    }

    /// Call closure usable with `execute_with_fallback` and `DataGateway::fetch`.
    pub fn operation(
        self: &Arc<Self>,
    ) -> impl FnMut(Arc<str>) -> std::future::Ready<Result<Value, ProviderError>> {
        let providers = Arc::clone(self);
        move |name| std::future::ready(providers.respond(&name))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn titles(&self) -> Vec<String> {
        self.sent.lock().iter().map(|n| n.title.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, notification: &Notification) -> HashMap<String, bool> {
        self.sent.lock().push(notification.clone());
        HashMap::from([("recording".to_string(), true)])
    }
}
