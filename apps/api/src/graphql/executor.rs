//! Query execution
//!
//! [`Executor::execute`] parses the query, checks its depth, plans it against
//! the entity graph and resolves the plan. Resolution works one call site at a
//! time over all parents of that level: every parent's key for every relation
//! field is requested from the [`BatchCoordinator`] before a single
//! `dispatch()`, so each relation field costs one backing fetch per level no
//! matter how many parents reached it.
//!
//! Mutation root fields run one after another: each applies its write through
//! the [`Mutator`] and then resolves its sub-selection like a query would.

use std::sync::{Arc, Mutex, PoisonError};

use async_graphql_parser::types::OperationType;
use async_graphql_parser::{parse_query, Pos};
use futures_util::future::{self, BoxFuture, FutureExt};
use serde_json::{Map, Value};
use tracing::Instrument;

use super::error::{FieldError, ValidationError};
use super::loaders::{BatchCoordinator, LoadHandle, Related};
use super::request::ExecutionRequest;
use super::response::{child_path, ExecutionError, ExecutionResponse, PathSegment, ResponsePath};
use super::schema::{entity_graph, EntityGraph, Existence, MutationField, RelationEdge, RootAccess};
use super::validation::{
    plan_operation, select_operation, DepthValidator, FieldNode, FieldPlan, QueryPlan, RootNode,
    RootPlan, SelectionPlan,
};
use crate::models::Entity;
use crate::repositories::{Fetcher, Mutator, Write, WriteOutcome};

type Object = Map<String, Value>;

/// Executes operations against one backing store
///
/// Read-only until a [`Mutator`] is attached; mutations are rejected before
/// that.
#[derive(Clone)]
pub struct Executor {
    graph: &'static EntityGraph,
    fetcher: Arc<dyn Fetcher>,
    mutator: Option<Arc<dyn Mutator>>,
    depth: DepthValidator,
}

impl Executor {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            graph: entity_graph(),
            fetcher,
            mutator: None,
            depth: DepthValidator::default(),
        }
    }

    /// Accept mutations, applying their writes through `mutator`
    pub fn with_mutator(mut self, mutator: Arc<dyn Mutator>) -> Self {
        self.mutator = Some(mutator);
        self
    }

    /// Override the depth limit
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.depth = DepthValidator::new(max_depth);
        self
    }

    /// Execute one operation
    pub async fn execute(&self, request: impl Into<ExecutionRequest>) -> ExecutionResponse {
        let request = request.into();
        let span = tracing::info_span!(
            "graphql.execute",
            operation = request.operation_name.as_deref().unwrap_or("<anonymous>"),
        );
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: ExecutionRequest) -> ExecutionResponse {
        let plan = match self.prepare(&request) {
            Ok(plan) => plan,
            Err(response) => {
                tracing::debug!(errors = response.errors.len(), "Query rejected");
                return response;
            }
        };

        let cancel = request.cancel.unwrap_or_default();
        let ctx = ResolveContext {
            coordinator: BatchCoordinator::new(Arc::clone(&self.fetcher), cancel.clone()),
            fetcher: Arc::clone(&self.fetcher),
            mutator: self.mutator.clone(),
            errors: Mutex::new(Vec::new()),
        };

        let data = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            data = resolve_root(&ctx, &plan) => Some(data),
        };

        match data {
            Some(data) => {
                let batches = ctx.coordinator.dispatched_batches();
                let response = ExecutionResponse::new(data, ctx.into_errors());
                tracing::debug!(batches, errors = response.errors.len(), "Query executed");
                response
            }
            None => {
                tracing::info!("Query execution cancelled");
                ExecutionResponse::cancelled()
            }
        }
    }

    /// Parse, depth-check and plan, or reject with no data
    fn prepare(&self, request: &ExecutionRequest) -> Result<QueryPlan, ExecutionResponse> {
        let document = parse_query(&request.query).map_err(|error| {
            let syntax = ValidationError::Syntax(error.to_string());
            ExecutionResponse::rejected([ExecutionError::validation(
                &syntax,
                error.positions().next(),
            )])
        })?;

        let violations = self.depth.validate(&document);
        if !violations.is_empty() {
            return Err(ExecutionResponse::rejected(violations));
        }

        let operation = select_operation(&document, request.operation_name.as_deref())
            .map_err(|error| ExecutionResponse::rejected([error]))?;
        if operation.definition.node.ty == OperationType::Mutation && self.mutator.is_none() {
            let unsupported = ValidationError::UnsupportedOperation("mutation");
            return Err(ExecutionResponse::rejected([ExecutionError::validation(
                &unsupported,
                Some(operation.definition.pos),
            )]));
        }

        plan_operation(self.graph, &document, operation, &request.variables)
            .map_err(|error| ExecutionResponse::rejected([error]))
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("max_depth", &self.depth.max_depth())
            .field("writable", &self.mutator.is_some())
            .finish()
    }
}

/// State shared by every resolver of one execution
struct ResolveContext {
    coordinator: BatchCoordinator,
    fetcher: Arc<dyn Fetcher>,
    mutator: Option<Arc<dyn Mutator>>,
    errors: Mutex<Vec<ExecutionError>>,
}

impl ResolveContext {
    fn field_error(&self, error: FieldError, path: ResponsePath, pos: Pos) {
        error.log();
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ExecutionError::field(&error, path, pos));
    }

    fn into_errors(self) -> Vec<ExecutionError> {
        self.errors
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// An object being resolved and where it sits in the response
struct Parent {
    entity: Entity,
    path: ResponsePath,
}

/// Where a parent's value for one relation field comes from
enum Slot {
    Settled(Value),
    Object,
    List(usize),
}

async fn resolve_root(ctx: &ResolveContext, plan: &QueryPlan) -> Value {
    let values = match plan.operation_type {
        OperationType::Mutation => {
            let mut values = Vec::with_capacity(plan.fields.len());
            for field in &plan.fields {
                values.push(resolve_root_field(ctx, field).await);
            }
            values
        }
        _ => future::join_all(plan.fields.iter().map(|field| resolve_root_field(ctx, field))).await,
    };

    let mut data = Object::new();
    for (field, value) in plan.fields.iter().zip(values) {
        data.insert(field.response_key.clone(), value);
    }
    Value::Object(data)
}

/// Root lookups go straight to the backing store
async fn resolve_root_field(ctx: &ResolveContext, field: &RootPlan) -> Value {
    let path = vec![PathSegment::Field(field.response_key.clone())];

    match &field.node {
        RootNode::Typename(type_name) => Value::String(type_name.to_string()),
        RootNode::Collection { root, selection } => match ctx.fetcher.fetch_all(root.kind).await {
            Ok(entities) => {
                let parents = entities
                    .into_iter()
                    .enumerate()
                    .map(|(index, entity)| Parent {
                        entity,
                        path: child_path(&path, PathSegment::Index(index)),
                    })
                    .collect();
                let objects = resolve_selection(ctx, selection, parents).await;
                Value::Array(objects.into_iter().map(Value::Object).collect())
            }
            Err(error) => {
                ctx.field_error(FieldError::fetch(root.name, error), path, field.pos);
                Value::Null
            }
        },
        RootNode::ById {
            root,
            key,
            selection,
        } => match ctx.fetcher.fetch_one(root.kind, *key).await {
            Ok(Some(entity)) => resolve_selection(ctx, selection, vec![Parent { entity, path }])
                .await
                .pop()
                .map_or(Value::Null, Value::Object),
            Ok(None) => {
                if root.access == RootAccess::ById(Existence::Required) {
                    ctx.field_error(FieldError::not_found(root.kind, *key), path, field.pos);
                }
                Value::Null
            }
            Err(error) => {
                ctx.field_error(FieldError::fetch(root.name, error), path, field.pos);
                Value::Null
            }
        },
        RootNode::Write {
            mutation,
            write,
            selection,
        } => resolve_write(ctx, field, mutation, write, selection.as_ref(), path).await,
    }
}

/// Apply one write, then resolve the sub-selection on the record it returned
async fn resolve_write(
    ctx: &ResolveContext,
    field: &RootPlan,
    mutation: &MutationField,
    write: &Write,
    selection: Option<&SelectionPlan>,
    path: ResponsePath,
) -> Value {
    let Some(mutator) = &ctx.mutator else {
        return Value::Null;
    };

    match mutator.apply(write).await {
        Ok(WriteOutcome::Removed(removed)) => Value::Bool(removed),
        Ok(WriteOutcome::Record(Some(entity))) => match selection {
            Some(selection) => resolve_selection(ctx, selection, vec![Parent { entity, path }])
                .await
                .pop()
                .map_or(Value::Null, Value::Object),
            None => Value::Null,
        },
        Ok(WriteOutcome::Record(None)) => {
            if let Some(key) = write.target() {
                ctx.field_error(FieldError::not_found(write.kind(), key), path, field.pos);
            }
            Value::Null
        }
        Err(error) => {
            ctx.field_error(FieldError::write(mutation.name, error), path, field.pos);
            Value::Null
        }
    }
}

/// Resolve one selection for every parent of a level
///
/// Returns one object per parent, in parent order, with fields in selection
/// order.
fn resolve_selection<'a>(
    ctx: &'a ResolveContext,
    selection: &'a SelectionPlan,
    parents: Vec<Parent>,
) -> BoxFuture<'a, Vec<Object>> {
    async move {
        if parents.is_empty() {
            return Vec::new();
        }

        let requests: Vec<Option<Vec<Option<LoadHandle>>>> = selection
            .fields
            .iter()
            .map(|field| match &field.node {
                FieldNode::Relation {
                    edge, call_site, ..
                } => Some(
                    parents
                        .iter()
                        .map(|parent| {
                            (edge.source_key)(&parent.entity)
                                .map(|key| ctx.coordinator.request(*edge, *call_site, key))
                        })
                        .collect(),
                ),
                _ => None,
            })
            .collect();

        ctx.coordinator.dispatch().await;

        let parents = &parents;
        let mut relations = future::join_all(selection.fields.iter().zip(requests).map(
            |(field, handles)| async move {
                match (&field.node, handles) {
                    (
                        FieldNode::Relation {
                            edge, selection, ..
                        },
                        Some(handles),
                    ) => Some(
                        resolve_relation(ctx, field, edge, selection, parents, handles)
                            .await
                            .into_iter(),
                    ),
                    _ => None,
                }
            },
        ))
        .await;

        parents
            .iter()
            .map(|parent| {
                let mut object = Object::new();
                for (field, relation) in selection.fields.iter().zip(relations.iter_mut()) {
                    let value = match &field.node {
                        FieldNode::Typename => {
                            Value::String(selection.kind.type_name().to_string())
                        }
                        FieldNode::Scalar(scalar) => (scalar.read)(&parent.entity),
                        FieldNode::Relation { .. } => relation
                            .as_mut()
                            .and_then(Iterator::next)
                            .unwrap_or(Value::Null),
                    };
                    object.insert(field.response_key.clone(), value);
                }
                object
            })
            .collect()
    }
    .boxed()
}

/// Settle one relation field for every parent and resolve what it reached
///
/// Returns one value per parent.
async fn resolve_relation(
    ctx: &ResolveContext,
    field: &FieldPlan,
    edge: &RelationEdge,
    selection: &SelectionPlan,
    parents: &[Parent],
    handles: Vec<Option<LoadHandle>>,
) -> Vec<Value> {
    let settled = future::join_all(handles.into_iter().map(|handle| async move {
        match handle {
            Some(handle) => Some(handle.await),
            None => None,
        }
    }))
    .await;

    let mut children = Vec::new();
    let mut slots = Vec::with_capacity(parents.len());
    for (parent, outcome) in parents.iter().zip(settled) {
        let path = child_path(&parent.path, PathSegment::Field(field.response_key.clone()));
        let slot = match outcome {
            None if edge.is_list() => Slot::Settled(Value::Array(Vec::new())),
            None => Slot::Settled(Value::Null),
            Some(Ok(Related::One(Some(entity)))) => {
                children.push(Parent { entity, path });
                Slot::Object
            }
            Some(Ok(Related::One(None))) => {
                if edge.is_required() {
                    if let Some(key) = (edge.source_key)(&parent.entity) {
                        ctx.field_error(FieldError::not_found(edge.target, key), path, field.pos);
                    }
                }
                Slot::Settled(Value::Null)
            }
            Some(Ok(Related::Many(entities))) => {
                let count = entities.len();
                children.extend(entities.into_iter().enumerate().map(|(index, entity)| Parent {
                    entity,
                    path: child_path(&path, PathSegment::Index(index)),
                }));
                Slot::List(count)
            }
            Some(Err(error)) => {
                ctx.field_error(error, path, field.pos);
                Slot::Settled(Value::Null)
            }
        };
        slots.push(slot);
    }

    let mut objects = resolve_selection(ctx, selection, children)
        .await
        .into_iter()
        .map(Value::Object);

    slots
        .into_iter()
        .map(|slot| match slot {
            Slot::Settled(value) => value,
            Slot::Object => objects.next().unwrap_or(Value::Null),
            Slot::List(count) => Value::Array(objects.by_ref().take(count).collect()),
        })
        .collect()
}
