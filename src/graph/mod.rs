//! Graph entity model and the rules that derive it from result documents

mod edge;
mod mutation;
mod node;
pub mod transform;

pub use edge::{Edge, EdgeId};
pub use mutation::GraphMutation;
pub use node::{Node, NodeId, Properties};
pub use transform::{to_mutation, TransformError};
