//! The bridge: a pending-request map plus a single push subscriber, guarded
//! by one mutex. Delivery onto each request's reply slot is at-most-once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::RngCore;
use tokio::sync::mpsc;

use openlink_types::ProxySseEvent;

const SUBSCRIBER_CAPACITY: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("no SSE client connected")]
    NoClient,
    #[error("timed out waiting for browser reply")]
    Timeout,
    #[error("SSE client disconnected")]
    Disconnected,
}

/// Inbound request format, used to pick the response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestFormat {
    OpenAi,
    Anthropic,
}

/// What arrives on a request's reply slot. Disconnects are signalled as a
/// variant rather than a sentinel payload.
#[derive(Debug, Clone)]
enum ReplySignal {
    Reply(String),
    Disconnected,
}

/// A submitted chat request waiting for the extension's reply.
#[derive(Debug)]
pub struct ProxyRequest {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub format: RequestFormat,
    pub prompt: String,
    reply_rx: mpsc::Receiver<ReplySignal>,
}

#[derive(Default)]
struct State {
    pending: HashMap<String, mpsc::Sender<ReplySignal>>,
    subscriber: Option<mpsc::Sender<ProxySseEvent>>,
}

#[derive(Default)]
pub struct Manager {
    state: Mutex<State>,
}

impl Manager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a fresh push channel as the current subscriber, displacing
    /// any prior one. The prior channel is not signalled here; its own
    /// guard's teardown is a no-op for the slot because identity no longer
    /// matches.
    pub fn subscribe(self: Arc<Self>) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        self.state.lock().unwrap().subscriber = Some(tx.clone());
        Subscription {
            guard: SubscriberGuard { manager: self, tx },
            rx,
        }
    }

    /// Queue a prompt for the extension. Fails fast without a subscriber;
    /// rolls the pending entry back if the push channel is full.
    pub fn submit(&self, format: RequestFormat, prompt: String) -> Result<ProxyRequest, BridgeError> {
        let (subscriber, id, reply_rx) = {
            let mut state = self.state.lock().unwrap();
            let Some(subscriber) = state.subscriber.clone() else {
                return Err(BridgeError::NoClient);
            };
            let id = new_request_id();
            let (reply_tx, reply_rx) = mpsc::channel(1);
            state.pending.insert(id.clone(), reply_tx);
            (subscriber, id, reply_rx)
        };

        let event = ProxySseEvent {
            request_id: id.clone(),
            prompt: prompt.clone(),
        };
        if subscriber.try_send(event).is_err() {
            self.state.lock().unwrap().pending.remove(&id);
            return Err(BridgeError::NoClient);
        }

        Ok(ProxyRequest {
            id,
            created_at: Utc::now(),
            format,
            prompt,
            reply_rx,
        })
    }

    /// Hand the extension's reply to the waiting request. Returns whether
    /// the id was still pending.
    pub fn deliver(&self, request_id: &str, content: String) -> bool {
        let entry = self.state.lock().unwrap().pending.remove(request_id);
        match entry {
            Some(reply_tx) => {
                // Capacity-1 slot of a just-removed entry; the send cannot
                // block and at most one value ever lands.
                let _ = reply_tx.try_send(ReplySignal::Reply(content));
                true
            }
            None => false,
        }
    }

    /// Wait for the reply with a deadline. Exactly one of reply, timeout,
    /// or disconnect is observed; timing out removes the pending entry.
    pub async fn wait_reply(
        &self,
        request: &mut ProxyRequest,
        timeout: Duration,
    ) -> Result<String, BridgeError> {
        match tokio::time::timeout(timeout, request.reply_rx.recv()).await {
            Ok(Some(ReplySignal::Reply(content))) => Ok(content),
            Ok(Some(ReplySignal::Disconnected)) | Ok(None) => Err(BridgeError::Disconnected),
            Err(_) => {
                self.state.lock().unwrap().pending.remove(&request.id);
                Err(BridgeError::Timeout)
            }
        }
    }

    fn unregister(&self, tx: &mpsc::Sender<ProxySseEvent>) {
        let drained = {
            let mut state = self.state.lock().unwrap();
            let still_current = state
                .subscriber
                .as_ref()
                .is_some_and(|current| current.same_channel(tx));
            if still_current {
                state.subscriber = None;
            }
            std::mem::take(&mut state.pending)
        };
        for (_, reply_tx) in drained {
            // Non-blocking: a slot that already holds a reply keeps it.
            let _ = reply_tx.try_send(ReplySignal::Disconnected);
        }
    }
}

/// Live subscription: the event receiver plus the guard whose drop runs
/// unregister (and fans the disconnect signal out to pending requests).
pub struct Subscription {
    guard: SubscriberGuard,
    rx: mpsc::Receiver<ProxySseEvent>,
}

impl Subscription {
    pub fn split(self) -> (SubscriberGuard, mpsc::Receiver<ProxySseEvent>) {
        (self.guard, self.rx)
    }

    pub async fn recv(&mut self) -> Option<ProxySseEvent> {
        self.rx.recv().await
    }
}

pub struct SubscriberGuard {
    manager: Arc<Manager>,
    tx: mpsc::Sender<ProxySseEvent>,
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        tracing::debug!("SSE subscriber unregistered");
        self.manager.unregister(&self.tx);
    }
}

fn new_request_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
