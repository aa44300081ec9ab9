//! Consumer registration: `(id, message_type, handler-or-URL)` (§3, §4.1).

// Layer 1: Standard library imports
use std::future::Future;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;

// Layer 3: Internal module imports
use super::error::BrokerError;
use crate::message::QueueMessage;
use crate::util::ConsumerId;

/// Implemented by anything that can process a delivered `QueueMessage`
/// in-process. Remote consumers skip this trait entirely and are delivered
/// to over HTTP instead (§4.1 Remote variant).
#[async_trait]
pub trait ConsumerHandler: Send + Sync {
    async fn handle(&self, message: QueueMessage) -> Result<(), BrokerError>;
}

/// Adapts a plain async closure into a [`ConsumerHandler`], so services can
/// register `move |msg| async move { ... }` instead of hand-rolling a type.
pub struct HandlerFn<F>(pub F);

#[async_trait]
impl<F, Fut> ConsumerHandler for HandlerFn<F>
where
    F: Fn(QueueMessage) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BrokerError>> + Send,
{
    async fn handle(&self, message: QueueMessage) -> Result<(), BrokerError> {
        (self.0)(message).await
    }
}

/// Where a registered consumer actually lives.
#[derive(Clone)]
pub enum ConsumerTarget {
    /// Delivered by calling `handle()` directly in the broker's drain loop.
    Local(Arc<dyn ConsumerHandler>),
    /// Delivered via `POST {callback_url}` with the message as JSON body
    /// (§4.1 Remote variant).
    Remote { callback_url: String },
}

/// A binding of a consumer to a topic (§3 "Consumer registration").
#[derive(Clone)]
pub struct Consumer {
    pub id: ConsumerId,
    pub message_type: String,
    pub target: ConsumerTarget,
}

impl Consumer {
    pub fn local(id: ConsumerId, message_type: impl Into<String>, handler: Arc<dyn ConsumerHandler>) -> Self {
        Self {
            id,
            message_type: message_type.into(),
            target: ConsumerTarget::Local(handler),
        }
    }

    pub fn remote(id: ConsumerId, message_type: impl Into<String>, callback_url: impl Into<String>) -> Self {
        Self {
            id,
            message_type: message_type.into(),
            target: ConsumerTarget::Remote {
                callback_url: callback_url.into(),
            },
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.target, ConsumerTarget::Remote { .. })
    }
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("id", &self.id)
            .field("message_type", &self.message_type)
            .field("is_remote", &self.is_remote())
            .finish()
    }
}
