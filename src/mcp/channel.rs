//! In-process transport emulation: a pair of mutually referencing
//! half-duplex endpoints.
//!
//! Sending on one half synchronously invokes the handler registered on the
//! other; the send returns only after the peer's handler has run to
//! completion. There is no buffering and no cross-peer concurrency to reason
//! about. A send with no reachable peer handler is a silent drop, not an
//! error: a missing handler means the connection has not been wired yet, and
//! callers must not rely on deferred delivery.

use std::sync::{Arc, Mutex, Weak};

/// JSON-RPC-shaped message carried over a paired channel.
#[derive(Debug, Clone)]
pub enum WireMessage {
    Request {
        id: u64,
        method: String,
        params: serde_json::Value,
    },
    Response {
        id: u64,
        result: Result<serde_json::Value, String>,
    },
}

type Handler = Arc<dyn Fn(WireMessage) + Send + Sync>;

/// One endpoint of a paired channel.
///
/// Cloning yields another handle to the same endpoint.
#[derive(Clone)]
pub struct ChannelHalf {
    inner: Arc<Mutex<HalfInner>>,
}

#[derive(Default)]
struct HalfInner {
    peer: Option<Weak<Mutex<HalfInner>>>,
    handler: Option<Handler>,
}

impl std::fmt::Debug for ChannelHalf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("ChannelHalf")
            .field("paired", &inner.peer.is_some())
            .field("has_handler", &inner.handler.is_some())
            .finish()
    }
}

impl ChannelHalf {
    /// Create two cross-registered halves.
    ///
    /// The pair is fully wired on return; only handler registration remains
    /// before messages flow.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let a = Self {
            inner: Arc::new(Mutex::new(HalfInner::default())),
        };
        let b = Self {
            inner: Arc::new(Mutex::new(HalfInner::default())),
        };
        a.inner.lock().unwrap().peer = Some(Arc::downgrade(&b.inner));
        b.inner.lock().unwrap().peer = Some(Arc::downgrade(&a.inner));
        (a, b)
    }

    /// Assign the message handler for this half.
    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(WireMessage) + Send + Sync + 'static,
    {
        self.inner.lock().unwrap().handler = Some(Arc::new(handler));
    }

    /// Deliver a message to the peer's handler, synchronously.
    ///
    /// The handler reference is cloned out of the lock before invocation, so
    /// the handler may itself call `send` on either half (a server answering
    /// a request does exactly that).
    pub fn send(&self, message: WireMessage) {
        let peer = self
            .inner
            .lock()
            .unwrap()
            .peer
            .as_ref()
            .and_then(Weak::upgrade);
        let handler = peer.and_then(|p| p.lock().unwrap().handler.clone());
        match handler {
            Some(handler) => handler(message),
            None => {
                tracing::trace!("paired channel send with no peer handler, dropping message");
            }
        }
    }

    /// Release the peer reference and drop the registered handler.
    /// Idempotent. Handlers routinely capture a clone of their own half,
    /// so clearing only the peer would leave that reference cycle alive.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.peer = None;
        inner.handler = None;
    }
}
