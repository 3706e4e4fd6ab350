//! Per-tab view state.
//!
//! Every browser tab gets its own [`RootView`] (and with it its own auth
//! session), looked up by the id stored in the client cookie. Actions of one
//! tab are serialized through the async mutex around its root view.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::{views::RootView, Backend};

pub type ClientHandle = Arc<tokio::sync::Mutex<RootView>>;

struct ClientEntry {
    root: ClientHandle,
    last_seen: Instant,
}

pub struct ClientRegistry {
    backend: Backend,
    idle_timeout: Duration,
    clients: Mutex<HashMap<Uuid, ClientEntry>>,
}

#[derive(Clone)]
pub struct ResolvedClient {
    pub id: Uuid,
    pub root: ClientHandle,
    pub created: bool,
}

impl ClientRegistry {
    pub fn new(backend: Backend, idle_timeout: Duration) -> Self {
        Self {
            backend,
            idle_timeout,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the tab for `id`, or starts a new one when the id is unknown
    /// or has been idle past the timeout.
    pub fn resolve(&self, id: Option<Uuid>) -> ResolvedClient {
        let now = Instant::now();
        let mut clients = self.clients.lock();

        let before = clients.len();
        clients.retain(|_, entry| now.saturating_duration_since(entry.last_seen) < self.idle_timeout);
        let evicted = before - clients.len();
        if evicted > 0 {
            tracing::debug!(evicted, "evicted idle clients");
        }

        if let Some((id, entry)) = id.and_then(|id| clients.get_mut(&id).map(|entry| (id, entry))) {
            entry.last_seen = now;
            return ResolvedClient {
                id,
                root: Arc::clone(&entry.root),
                created: false,
            };
        }

        let id = Uuid::new_v4();
        let root = Arc::new(tokio::sync::Mutex::new(RootView::new(self.backend.clone())));
        clients.insert(
            id,
            ClientEntry {
                root: Arc::clone(&root),
                last_seen: now,
            },
        );
        tracing::debug!(client_id = %id, "new client");

        ResolvedClient {
            id,
            root,
            created: true,
        }
    }
}
