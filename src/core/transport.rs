//! In-process addressable messaging with correlated request/reply.
//!
//! Every participant owns a [`Mailbox`] and is reached through a cloneable
//! [`Address`]. A requester keeps a [`Conversations`] table: each outgoing
//! envelope gets a fresh correlation id and a one-shot slot, and a router task
//! drains the requester's reply mailbox, completing slots by id. Replies are
//! therefore never matched by arrival order, and a reply whose conversation has
//! already timed out is logged and dropped.

use crate::domain::messages::ServiceKind;
use crate::domain::ports::RuleService;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("{service} did not reply within {after:?}")]
    Timeout { service: String, after: Duration },
    #[error("{service} mailbox is closed")]
    MailboxClosed { service: String },
    #[error("conversation with {service} ended without a reply")]
    ReplyDropped { service: String },
}

/// Where replies to an envelope should be posted.
pub type ReplyAddress = mpsc::Sender<Reply>;

#[derive(Debug)]
pub struct Envelope {
    pub correlation_id: Uuid,
    pub sent_at: DateTime<Utc>,
    pub body: Value,
    pub reply_to: Option<ReplyAddress>,
}

impl Envelope {
    /// Fire-and-forget envelope; nobody waits for an answer.
    pub fn notification(body: Value) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            sent_at: Utc::now(),
            body,
            reply_to: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reply {
    pub correlation_id: Uuid,
    pub from: String,
    pub body: Value,
}

#[derive(Debug, Clone)]
pub struct Address {
    name: Arc<str>,
    sender: mpsc::Sender<Envelope>,
}

impl Address {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn post(&self, envelope: Envelope) -> Result<(), TransportError> {
        self.sender
            .send(envelope)
            .await
            .map_err(|_| TransportError::MailboxClosed {
                service: self.name.to_string(),
            })
    }
}

#[derive(Debug)]
pub struct Mailbox {
    name: Arc<str>,
    receiver: mpsc::Receiver<Envelope>,
}

impl Mailbox {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn recv(&mut self) -> Option<Envelope> {
        self.receiver.recv().await
    }
}

/// Bounded mailbox and the address that feeds it.
pub fn mailbox(name: impl Into<String>, capacity: usize) -> (Address, Mailbox) {
    let name: Arc<str> = Arc::from(name.into());
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (
        Address {
            name: name.clone(),
            sender,
        },
        Mailbox { name, receiver },
    )
}

/// Serves a mailbox until every address to it is dropped.
///
/// Each envelope is handled on its own task, so a slow request never blocks
/// the ones queued behind it.
pub fn serve<H, Fut>(mut mailbox: Mailbox, handler: H) -> JoinHandle<()>
where
    H: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Value> + Send + 'static,
{
    let handler = Arc::new(handler);
    tokio::spawn(async move {
        while let Some(envelope) = mailbox.recv().await {
            let handler = handler.clone();
            let name = mailbox.name.clone();
            tokio::spawn(async move {
                let Envelope {
                    correlation_id,
                    sent_at,
                    body,
                    reply_to,
                } = envelope;
                debug!(
                    %correlation_id,
                    service = %name,
                    queued_ms = (Utc::now() - sent_at).num_milliseconds(),
                    "Handling request"
                );
                let reply = (*handler)(body).await;

                let Some(reply_to) = reply_to else {
                    return;
                };
                let reply = Reply {
                    correlation_id,
                    from: name.to_string(),
                    body: reply,
                };
                if reply_to.send(reply).await.is_err() {
                    debug!(%correlation_id, service = %name, "Requester is gone, reply discarded");
                }
            });
        }
        debug!(service = %mailbox.name, "Mailbox closed, service stopped");
    })
}

/// Serves a rule-check service behind its mailbox.
pub fn serve_rule_service(mailbox: Mailbox, service: Arc<dyn RuleService>) -> JoinHandle<()> {
    tracing::info!("🚀 Starting {} service on '{}'", service.kind(), mailbox.name());
    serve(mailbox, move |body| {
        let service = service.clone();
        async move { service.handle(&body).await }
    })
}

/// Addresses of the rule-check services, by kind.
#[derive(Debug, Clone, Default)]
pub struct ServiceDirectory {
    addresses: HashMap<ServiceKind, Address>,
}

impl ServiceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: ServiceKind, address: Address) -> Option<Address> {
        self.addresses.insert(kind, address)
    }

    pub fn get(&self, kind: ServiceKind) -> Option<&Address> {
        self.addresses.get(&kind)
    }
}

/// An outstanding request awaiting its correlated reply.
#[derive(Debug)]
pub struct PendingConversation {
    pub correlation_id: Uuid,
    pub awaiting: String,
    pub deadline: Instant,
    slot: oneshot::Sender<Value>,
}

type PendingMap = Arc<Mutex<HashMap<Uuid, PendingConversation>>>;

fn lock(pending: &Mutex<HashMap<Uuid, PendingConversation>>) -> MutexGuard<'_, HashMap<Uuid, PendingConversation>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes the pending entry when the asking future finishes, times out or is cancelled.
struct PendingGuard<'a> {
    pending: &'a Mutex<HashMap<Uuid, PendingConversation>>,
    correlation_id: Uuid,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(&self.correlation_id);
    }
}

/// Correlation table of one requester plus its reply mailbox.
#[derive(Debug, Clone)]
pub struct Conversations {
    owner: Arc<str>,
    pending: PendingMap,
    reply_to: ReplyAddress,
}

impl Conversations {
    /// Creates the table and spawns the router that completes conversations
    /// from the reply mailbox.
    pub fn start(owner: impl Into<String>, capacity: usize) -> (Self, JoinHandle<()>) {
        let owner: Arc<str> = Arc::from(owner.into());
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (reply_to, mut replies) = mpsc::channel::<Reply>(capacity.max(1));

        let router_pending = pending.clone();
        let router_owner = owner.clone();
        let router = tokio::spawn(async move {
            while let Some(reply) = replies.recv().await {
                let matched = lock(&router_pending).remove(&reply.correlation_id);
                match matched {
                    Some(conversation) => {
                        debug!(
                            correlation_id = %reply.correlation_id,
                            service = %conversation.awaiting,
                            remaining_ms = conversation
                                .deadline
                                .saturating_duration_since(Instant::now())
                                .as_millis() as u64,
                            "Reply matched"
                        );
                        let _ = conversation.slot.send(reply.body);
                    }
                    None => warn!(
                        owner = %router_owner,
                        correlation_id = %reply.correlation_id,
                        from = %reply.from,
                        "Dropping reply with no pending conversation"
                    ),
                }
            }
        });

        (
            Self {
                owner,
                pending,
                reply_to,
            },
            router,
        )
    }

    /// Number of conversations still waiting for a reply.
    pub fn outstanding(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Sends `body` to `to` and waits for the correlated reply, at most `timeout`.
    /// Queuing time in a full mailbox counts against the same deadline.
    pub async fn ask(
        &self,
        to: &Address,
        body: Value,
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        let correlation_id = Uuid::new_v4();
        let deadline = Instant::now() + timeout;
        let (slot, reply) = oneshot::channel();

        lock(&self.pending).insert(
            correlation_id,
            PendingConversation {
                correlation_id,
                awaiting: to.name().to_string(),
                deadline,
                slot,
            },
        );
        let _guard = PendingGuard {
            pending: &self.pending,
            correlation_id,
        };

        let envelope = Envelope {
            correlation_id,
            sent_at: Utc::now(),
            body,
            reply_to: Some(self.reply_to.clone()),
        };
        debug!(owner = %self.owner, %correlation_id, service = to.name(), "Sending request");

        let timed_out = || TransportError::Timeout {
            service: to.name().to_string(),
            after: timeout,
        };

        match timeout_at(deadline, to.post(envelope)).await {
            Err(_) => return Err(timed_out()),
            Ok(result) => result?,
        }

        match timeout_at(deadline, reply).await {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(_)) => Err(TransportError::ReplyDropped {
                service: to.name().to_string(),
            }),
            Err(_) => {
                warn!(owner = %self.owner, %correlation_id, service = to.name(), "Request timed out");
                Err(timed_out())
            }
        }
    }
}
