//! Query checks run before any resolution starts

pub mod depth;
pub mod plan;

pub use depth::{operation_depth, DepthValidator, MAX_QUERY_DEPTH};
pub use plan::{
    plan_operation, select_operation, FieldNode, FieldPlan, QueryPlan, RootNode, RootPlan,
    SelectedOperation, SelectionPlan,
};
