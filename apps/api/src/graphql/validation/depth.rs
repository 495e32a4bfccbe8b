//! Query depth limiting
//!
//! Root fields sit at depth 0 and every nested selection set adds one level.
//! Fragment spreads and inline fragments do not add a level: their fields are
//! measured as if written at the spread site. Introspection fields are not
//! counted and fragment cycles are not followed.

use std::collections::HashMap;

use async_graphql_parser::types::{
    ExecutableDocument, FragmentDefinition, OperationDefinition, Selection, SelectionSet,
};
use async_graphql_parser::{Pos, Positioned};
use async_graphql_value::Name;

use crate::graphql::error::ValidationError;

/// Deepest selection nesting a query may use
pub const MAX_QUERY_DEPTH: usize = 5;

/// Name reported for operations declared without one
const ANONYMOUS_OPERATION: &str = "<anonymous>";

/// Rejects operations nested deeper than a fixed limit
#[derive(Debug, Clone, Copy)]
pub struct DepthValidator {
    max_depth: usize,
}

impl Default for DepthValidator {
    fn default() -> Self {
        Self::new(MAX_QUERY_DEPTH)
    }
}

impl DepthValidator {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Check every operation of the document, one error per violating operation
    pub fn validate(&self, document: &ExecutableDocument) -> Vec<Positioned<ValidationError>> {
        document
            .operations
            .iter()
            .filter_map(|(name, operation)| {
                let deepest = deepest_field(document, &operation.node)?;
                if deepest.depth <= self.max_depth {
                    return None;
                }

                let operation = name.map_or(ANONYMOUS_OPERATION, |name| name.as_str());
                tracing::debug!(
                    operation,
                    depth = deepest.depth,
                    max_depth = self.max_depth,
                    "Rejecting query over depth limit"
                );
                Some(Positioned::new(
                    ValidationError::DepthExceeded {
                        operation: operation.to_string(),
                        max_depth: self.max_depth,
                    },
                    deepest.pos,
                ))
            })
            .collect()
    }
}

/// Depth of the deepest counted field of `operation`
pub fn operation_depth(document: &ExecutableDocument, operation: &OperationDefinition) -> usize {
    deepest_field(document, operation).map_or(0, |deepest| deepest.depth)
}

#[derive(Debug, Clone, Copy)]
struct Deepest {
    depth: usize,
    pos: Pos,
}

fn deepest_field(document: &ExecutableDocument, operation: &OperationDefinition) -> Option<Deepest> {
    let mut measure = Measure {
        fragments: &document.fragments,
        active: Vec::new(),
        deepest: None,
    };
    measure.selection_set(&operation.selection_set.node, 0);
    measure.deepest
}

struct Measure<'a> {
    fragments: &'a HashMap<Name, Positioned<FragmentDefinition>>,
    /// Fragments being expanded on the current path
    active: Vec<&'a str>,
    deepest: Option<Deepest>,
}

impl<'a> Measure<'a> {
    fn selection_set(&mut self, set: &'a SelectionSet, depth: usize) {
        for selection in &set.items {
            match &selection.node {
                Selection::Field(field) => {
                    if field.node.name.node.starts_with("__") {
                        continue;
                    }
                    self.record(depth, field.pos);
                    self.selection_set(&field.node.selection_set.node, depth + 1);
                }
                Selection::InlineFragment(fragment) => {
                    self.selection_set(&fragment.node.selection_set.node, depth);
                }
                Selection::FragmentSpread(spread) => {
                    let name = spread.node.fragment_name.node.as_str();
                    if self.active.contains(&name) {
                        continue;
                    }
                    // unknown fragments are reported by planning
                    let Some(fragment) = self.fragments.get(name) else {
                        continue;
                    };
                    self.active.push(name);
                    self.selection_set(&fragment.node.selection_set.node, depth);
                    self.active.pop();
                }
            }
        }
    }

    fn record(&mut self, depth: usize, pos: Pos) {
        if self.deepest.map_or(true, |deepest| depth > deepest.depth) {
            self.deepest = Some(Deepest { depth, pos });
        }
    }
}
