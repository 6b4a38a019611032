//! Work items: one dispatched callback travelling through the tree

use crate::dispatch::Node;
use std::sync::Arc;

/// Boxed user callback with its state captured
pub(crate) type Callback = Box<dyn FnOnce() + Send + 'static>;

/// One dispatched unit of work
///
/// Created at dispatch time, enqueued at the root, forwarded down the tree
/// one level at a time, and dropped once the callback wrapper finishes.
/// `path` pins every node from the root to the target while the item is in
/// flight.
pub(crate) struct WorkItem {
    /// Depth of the node this item executes at (0 = root)
    pub target_depth: usize,
    /// Resolved node chain from root to target, shared with the handle
    pub path: Arc<[Arc<Node>]>,
    /// User callback, invoked exactly once
    pub callback: Callback,
}

impl WorkItem {
    pub(crate) fn new(path: Arc<[Arc<Node>]>, callback: Callback) -> Self {
        Self {
            target_depth: path.len() - 1,
            path,
            callback,
        }
    }
}
