pub mod builder;
pub mod edge;
pub mod matrix;
pub mod view;

pub use builder::DependencyGraphBuilder;
pub use edge::DependencyEdge;
pub use matrix::{MatrixHeader, MatrixRow, UsageMatrix};
pub use view::{DependencyItem, DependencyView, TypeUsageCount};
