//! Tree nodes: per-key queues, exclusivity gates and the scan loop
//!
//! Each node owns one segment of the key hierarchy: a FIFO queue of items
//! destined at or below its depth, a lazily built child index, and three
//! counters that gate dispatch:
//!
//! - `own_busy` (0/1): this node's own-level callback is in flight;
//! - `children_busy`: items forwarded below this node and not yet completed;
//! - `active`: scheduled scans plus running callbacks at or below this node.
//!
//! A node runs an own-level item only when `own_busy == 0` and
//! `children_busy == 0`; it forwards a deeper item only when `own_busy == 0`.
//! Together these enforce mutual exclusion between a node's own callback and
//! all work in its descendant subtree, pairwise along the lineage.

use crate::dispatch::{DispatcherCore, WorkItem};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// One node of the dispatch tree
pub(crate) struct Node {
    /// Distance from the root (root = 0)
    depth: usize,
    /// Non-owning back-reference; `None` for the root
    parent: Option<Weak<Node>>,
    /// Child index keyed by path segment, created on demand
    children: Mutex<HashMap<Box<str>, Arc<Node>>>,
    /// FIFO queue of items destined at or below this depth
    queue: Mutex<VecDeque<WorkItem>>,
    /// 0 or 1: own-level callback in flight
    own_busy: AtomicUsize,
    /// In-flight items forwarded into this node's subtree
    children_busy: AtomicUsize,
    /// Scheduled scans + running callbacks at or below this node
    active: AtomicUsize,
}

impl Node {
    /// Create a detached root node (depth 0)
    pub(crate) fn root() -> Arc<Node> {
        Arc::new(Node {
            depth: 0,
            parent: None,
            children: Mutex::new(HashMap::new()),
            queue: Mutex::new(VecDeque::new()),
            own_busy: AtomicUsize::new(0),
            children_busy: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
        })
    }

    fn parent(&self) -> Option<Arc<Node>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Strict ancestors, nearest first
    fn ancestors(&self) -> impl Iterator<Item = Arc<Node>> {
        std::iter::successors(self.parent(), |node| node.parent())
    }

    /// Look up or create the child for `segment`
    ///
    /// Idempotent under concurrent resolution: the child-map critical section
    /// guarantees exactly one node per segment.
    fn child(self: &Arc<Self>, segment: &str) -> Arc<Node> {
        let mut children = self.children.lock();
        if let Some(existing) = children.get(segment) {
            return Arc::clone(existing);
        }
        let node = Arc::new(Node {
            depth: self.depth + 1,
            parent: Some(Arc::downgrade(self)),
            children: Mutex::new(HashMap::new()),
            queue: Mutex::new(VecDeque::new()),
            own_busy: AtomicUsize::new(0),
            children_busy: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
        });
        children.insert(segment.into(), Arc::clone(&node));
        node
    }

    /// Resolve the node chain for `segments`, creating nodes on demand
    ///
    /// Returns the full path from this node (inclusive) down to the target.
    pub(crate) fn resolve_path(self: &Arc<Self>, segments: &[&str]) -> Vec<Arc<Node>> {
        let mut path = Vec::with_capacity(segments.len() + 1);
        path.push(Arc::clone(self));
        let mut current = Arc::clone(self);
        for segment in segments {
            let next = current.child(segment);
            path.push(Arc::clone(&next));
            current = next;
        }
        path
    }

    /// Append an item and schedule a scan pass
    ///
    /// Overlapping scheduled scans for the same node are safe: the queue
    /// critical section serializes the actual dequeue-and-dispatch, so a
    /// redundant scan simply finds nothing to do.
    pub(crate) fn push(self: &Arc<Self>, core: &Arc<DispatcherCore>, item: WorkItem) {
        self.queue.lock().push_back(item);
        self.schedule_scan(core);
    }

    /// Queue an asynchronous scan pass for this node on the pool
    pub(crate) fn schedule_scan(self: &Arc<Self>, core: &Arc<DispatcherCore>) {
        self.active.fetch_add(1, Ordering::SeqCst);
        let node = Arc::clone(self);
        let job_core = Arc::clone(core);
        core.pool().execute(move || node.scan(&job_core, false));
    }

    /// The scheduling loop, run on a pool worker
    ///
    /// When `completed` is set the pass doubles as the completion of this
    /// node's own-level callback: the slot is freed and every strict
    /// ancestor's `active` and `children_busy` are decremented before the
    /// queue is examined.
    ///
    /// Only the queue head is ever inspected. An own-level dispatch ends the
    /// pass; a forward continues it immediately. The asymmetry is deliberate
    /// and observable in the ordering guarantees.
    pub(crate) fn scan(self: &Arc<Self>, core: &Arc<DispatcherCore>, completed: bool) {
        if completed {
            let prev = self.own_busy.swap(0, Ordering::SeqCst);
            debug_assert_eq!(prev, 1, "own-level slot freed while not busy");
            for ancestor in self.ancestors() {
                let active = ancestor.active.fetch_sub(1, Ordering::SeqCst);
                debug_assert!(active > 0, "ancestor active underflow");
                let busy = ancestor.children_busy.fetch_sub(1, Ordering::SeqCst);
                debug_assert!(busy > 0, "ancestor children_busy underflow");
            }
        }

        // Lock held across the whole pass: forwards from overlapping scans
        // must not reorder, and the child push nests strictly parent -> child.
        let mut own_dispatch: Option<WorkItem> = None;
        {
            let mut queue = self.queue.lock();
            while let Some(head) = queue.front() {
                if head.target_depth == self.depth {
                    if self.own_busy.load(Ordering::SeqCst) == 0
                        && self.children_busy.load(Ordering::SeqCst) == 0
                    {
                        let item = queue.pop_front().expect("head observed");
                        let prev = self.own_busy.swap(1, Ordering::SeqCst);
                        debug_assert_eq!(prev, 0, "own-level double dispatch");
                        self.active.fetch_add(1, Ordering::SeqCst);
                        for ancestor in self.ancestors() {
                            ancestor.active.fetch_add(1, Ordering::SeqCst);
                        }
                        own_dispatch = Some(item);
                    }
                    // A blocked head stalls everything queued behind it
                    break;
                }

                debug_assert!(head.target_depth > self.depth, "item queued above target");
                if self.own_busy.load(Ordering::SeqCst) != 0 {
                    break;
                }
                let item = queue.pop_front().expect("head observed");
                self.children_busy.fetch_add(1, Ordering::SeqCst);
                let child = Arc::clone(&item.path[self.depth + 1]);
                child.push(core, item);
                // Forwarding continues the pass
            }
        }

        if let Some(item) = own_dispatch {
            self.submit_callback(core, item);
        }

        // Pass over; a fully quiescent subtree wakes the parent, whose own
        // head may have been blocked on our children_busy contribution.
        let prev = self.active.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(prev > 0, "active underflow");
        if prev == 1 {
            if let Some(parent) = self.parent() {
                parent.schedule_scan(core);
            }
        }
    }

    /// Hand the claimed own-level item to the pool, wrapped
    ///
    /// The wrapper contains panics: a panicking callback is logged and
    /// counted, never propagated. Exactly once per item, after invocation,
    /// the outstanding counter drops and a completion scan frees the slot.
    fn submit_callback(self: &Arc<Self>, core: &Arc<DispatcherCore>, item: WorkItem) {
        let node = Arc::clone(self);
        let job_core = Arc::clone(core);
        core.pool().execute(move || {
            let WorkItem { callback, .. } = item;
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(callback)) {
                job_core.record_callback_panic(&panic_message(&payload));
            }
            job_core.dec_outstanding();
            node.scan(&job_core, true);
        });
    }
}

/// Best-effort extraction of a panic payload message
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path_depths() {
        let root = Node::root();
        let path = root.resolve_path(&["A", "B", "C"]);
        assert_eq!(path.len(), 4);
        for (depth, node) in path.iter().enumerate() {
            assert_eq!(node.depth, depth);
        }
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let root = Node::root();
        let first = root.resolve_path(&["A", "B"]);
        let second = root.resolve_path(&["A", "B"]);
        for (a, b) in first.iter().zip(second.iter()) {
            assert!(Arc::ptr_eq(a, b));
        }
    }

    #[test]
    fn test_overlapping_prefixes_share_nodes() {
        let root = Node::root();
        let left = root.resolve_path(&["X", "Y", "Z"]);
        let right = root.resolve_path(&["X", "Y", "W"]);
        assert!(Arc::ptr_eq(&left[1], &right[1]));
        assert!(Arc::ptr_eq(&left[2], &right[2]));
        assert!(!Arc::ptr_eq(&left[3], &right[3]));
    }

    #[test]
    fn test_concurrent_resolution_single_node_per_segment() {
        let root = Node::root();
        let paths: Vec<Vec<Arc<Node>>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let root = Arc::clone(&root);
                    s.spawn(move || {
                        let leaf = if i % 2 == 0 { "Z" } else { "W" };
                        root.resolve_path(&["X", "Y", leaf])
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        // Every resolver must observe the same "X" and "X/Y" nodes
        for path in &paths[1..] {
            assert!(Arc::ptr_eq(&paths[0][1], &path[1]));
            assert!(Arc::ptr_eq(&paths[0][2], &path[2]));
        }
        assert_eq!(root.children.lock().len(), 1);
    }

    #[test]
    fn test_parent_backrefs() {
        let root = Node::root();
        let path = root.resolve_path(&["A", "B"]);
        assert!(Arc::ptr_eq(&path[1].parent().unwrap(), &path[0]));
        assert!(Arc::ptr_eq(&path[2].parent().unwrap(), &path[1]));
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*boxed), "boom");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*boxed), "bang");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(17u32);
        assert_eq!(panic_message(&*boxed), "non-string panic payload");
    }
}
