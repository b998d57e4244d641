//! Built-in and pluggable handler dispatch, keyed by client message
//! kind. Grounded on `pmoplaylist::manager::register_callback`'s
//! token-keyed callback map.

use crate::messages::ClientFrame;
use sidechain_common::{ConnectionId, UserId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock as StdRwLock};

/// Context a handler runs with: it must not block (spec §4.2 "handlers
/// run on the connection's read task").
pub struct HandlerContext {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
}

pub type Handler = Arc<dyn Fn(&HandlerContext, &ClientFrame) + Send + Sync>;

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: StdRwLock<HashMap<String, Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_kind<F>(&self, kind: impl Into<String>, f: F)
    where
        F: Fn(&HandlerContext, &ClientFrame) + Send + Sync + 'static,
    {
        self.handlers.write().unwrap().insert(kind.into(), Arc::new(f));
    }

    /// Dispatches `frame` to the registered handler for its kind, if
    /// any. Returns `true` if a handler ran.
    pub fn dispatch(&self, ctx: &HandlerContext, frame: &ClientFrame) -> bool {
        let handler = self.handlers.read().unwrap().get(&frame.kind).cloned();
        match handler {
            Some(h) => {
                h(ctx, frame);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn registered_handler_runs_on_dispatch() {
        let registry = HandlerRegistry::new();
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();
        registry.handle_kind("heartbeat", move |_ctx, _frame| {
            ran_clone.store(true, Ordering::SeqCst);
        });

        let ctx = HandlerContext {
            connection_id: ConnectionId::new(),
            user_id: UserId::new(),
        };
        let frame = ClientFrame {
            kind: "heartbeat".into(),
            payload: json!({}),
        };
        assert!(registry.dispatch(&ctx, &frame));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn unknown_kind_is_a_no_op() {
        let registry = HandlerRegistry::new();
        let ctx = HandlerContext {
            connection_id: ConnectionId::new(),
            user_id: UserId::new(),
        };
        let frame = ClientFrame {
            kind: "unknown".into(),
            payload: json!({}),
        };
        assert!(!registry.dispatch(&ctx, &frame));
    }
}
