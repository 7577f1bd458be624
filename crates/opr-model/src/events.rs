//! Change-event registration and dispatch. Handlers run
//! concurrently and never block the call that fired the event; a
//! handler's errors are logged and swallowed, never propagated.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use opr_core::{OfferChange, OprResult};

pub type ChangeHandler = Arc<dyn Fn(OfferChange) -> BoxFuture<'static, OprResult<()>> + Send + Sync>;

#[derive(Default)]
pub struct ChangeHandlerRegistry {
    handlers: RwLock<Vec<ChangeHandler>>,
}

impl ChangeHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, returning a token that can be passed to
    /// [`Self::unregister`].
    pub async fn register(&self, handler: ChangeHandler) -> usize {
        let mut handlers = self.handlers.write().await;
        handlers.push(handler);
        handlers.len() - 1
    }

    /// Fire `change` to every registered handler without waiting for any
    /// of them to finish.
    pub async fn dispatch(&self, change: OfferChange) {
        let handlers = self.handlers.read().await.clone();
        for handler in handlers {
            let change = change.clone();
            tokio::spawn(async move {
                if let Err(e) = handler(change).await {
                    tracing::error!(error = %e.message, code = %e.code, "change handler failed");
                }
            });
        }
    }
}
