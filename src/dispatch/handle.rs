//! Dispatch handles: immutable capabilities bound to one resolved key path

use crate::dispatch::{DispatcherCore, Node, WorkItem};
use std::sync::Arc;

/// Capability bound to one fully resolved node path
///
/// Obtained from [`Dispatcher::resolve`](crate::Dispatcher::resolve). Cheap
/// to clone and safe to share across threads; the path is resolved once and
/// immutable thereafter.
#[derive(Clone)]
pub struct DispatchHandle {
    core: Arc<DispatcherCore>,
    path: Arc<[Arc<Node>]>,
}

impl DispatchHandle {
    pub(crate) fn new(core: Arc<DispatcherCore>, path: Vec<Arc<Node>>) -> Self {
        debug_assert!(!path.is_empty(), "path always contains the root");
        Self {
            core,
            path: path.into(),
        }
    }

    /// Depth of the target node (0 = root)
    #[inline]
    pub fn target_depth(&self) -> usize {
        self.path.len() - 1
    }

    /// Dispatch a callback for sequenced execution at this handle's key
    ///
    /// Never blocks and never fails; the item is guaranteed eventual
    /// delivery. The item enters the tree at the root regardless of target
    /// depth and is forwarded down one level at a time; this hop-per-level
    /// path is what produces arrival-order preservation between dispatches
    /// sharing a key prefix.
    pub fn dispatch<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.core.inc_outstanding();
        let item = WorkItem::new(Arc::clone(&self.path), Box::new(callback));
        self.path[0].push(&self.core, item);
    }

    /// Type-preserving convenience over [`dispatch`](Self::dispatch)
    pub fn dispatch_with<T, F>(&self, data: T, callback: F)
    where
        T: Send + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        self.dispatch(move || callback(data));
    }
}

impl std::fmt::Debug for DispatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchHandle")
            .field("target_depth", &self.target_depth())
            .finish()
    }
}
