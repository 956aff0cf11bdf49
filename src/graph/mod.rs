pub mod builder;
pub mod classify;
pub mod emitter;
pub mod health;
pub mod node;
pub mod visitors;
pub mod walker;

pub use builder::GraphBuilder;
pub use emitter::NodeEmitter;
pub use health::{HealthEvaluator, HealthEvaluatorFactory};
pub use node::{GraphNode, HealthStatusType, NodeType};
pub use visitors::ResourceVisitor;
pub use walker::Walker;
