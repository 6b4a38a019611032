//! Hierarchical dispatch tree: dispatcher facade, handles, nodes, work items

mod dispatcher;
mod handle;
mod item;
mod node;

pub use dispatcher::Dispatcher;
pub use handle::DispatchHandle;

pub(crate) use dispatcher::DispatcherCore;
pub(crate) use item::WorkItem;
pub(crate) use node::Node;
