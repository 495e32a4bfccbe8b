//! Batch windows: the keys requested for one relation edge at one call site

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::oneshot;

use super::{LoadHandle, LoadResult, Related};
use crate::graphql::error::FieldError;
use crate::graphql::schema::{Cardinality, EdgeId, RelationEdge};
use crate::models::EntityKey;
use crate::repositories::{FetchResult, KeyedEntities};

/// A relation field occurrence in the query being executed
///
/// Assigned in document order while planning, so two structurally identical
/// traversals in different places of a query never share a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallSiteId(pub u32);

impl fmt::Display for CallSiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct WindowKey {
    pub edge: EdgeId,
    pub call_site: CallSiteId,
}

struct PendingSlot {
    sender: oneshot::Sender<LoadResult>,
    handle: LoadHandle,
}

/// Open accumulator of deduplicated keys and their pending result slots
///
/// Dropping a window without resolving it settles every handle with
/// [`FieldError::Cancelled`].
pub(crate) struct BatchWindow {
    pub edge: &'static RelationEdge,
    pub call_site: CallSiteId,
    keys: Vec<EntityKey>,
    pending: HashMap<EntityKey, PendingSlot>,
}

impl BatchWindow {
    pub fn new(edge: &'static RelationEdge, call_site: CallSiteId) -> Self {
        Self {
            edge,
            call_site,
            keys: Vec::new(),
            pending: HashMap::new(),
        }
    }

    /// Queue `key`, or hand back the slot already waiting on it
    pub fn enqueue(&mut self, key: EntityKey) -> LoadHandle {
        if let Some(slot) = self.pending.get(&key) {
            return slot.handle.clone();
        }

        let (sender, handle) = LoadHandle::pending();
        self.keys.push(key);
        self.pending.insert(
            key,
            PendingSlot {
                sender,
                handle: handle.clone(),
            },
        );
        handle
    }

    /// Distinct keys in first-request order
    pub fn keys(&self) -> &[EntityKey] {
        &self.keys
    }

    /// Settle every pending slot from the outcome of the window's fetch
    pub fn resolve(mut self, outcome: FetchResult<KeyedEntities>) {
        match outcome {
            Ok(mut found) => {
                for key in &self.keys {
                    let Some(slot) = self.pending.remove(key) else {
                        continue;
                    };
                    let matches = found.remove(key);
                    let related = match self.edge.cardinality {
                        Cardinality::Single => {
                            Related::One(matches.and_then(|records| records.into_iter().next()))
                        }
                        Cardinality::List => Related::Many(matches.unwrap_or_default()),
                    };
                    // the receiver is gone when its execution was abandoned
                    let _ = slot.sender.send(Ok(related));
                }
            }
            Err(error) => {
                let error = Arc::new(error);
                for key in &self.keys {
                    if let Some(slot) = self.pending.remove(key) {
                        let _ = slot
                            .sender
                            .send(Err(FieldError::fetch(self.edge.id.as_str(), Arc::clone(&error))));
                    }
                }
            }
        }
    }
}

impl fmt::Debug for BatchWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchWindow")
            .field("edge", &self.edge.id)
            .field("call_site", &self.call_site)
            .field("keys", &self.keys)
            .finish()
    }
}
