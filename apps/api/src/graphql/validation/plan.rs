//! Lowering a parsed operation into an executable plan
//!
//! Planning resolves everything the executor should not have to think about:
//! which operation runs, variable values and their declared types, fragments
//! and `@skip`/`@include`, merging of repeated response keys, and argument
//! coercion (mutation payloads included). Every field is checked against the
//! entity graph here, so any mistake in the query is a [`ValidationError`]
//! raised before the first fetch or write.

use std::collections::HashMap;

use async_graphql::Variables;
use async_graphql_parser::types::{
    BaseType, Directive, DocumentOperations, ExecutableDocument, Field, FragmentDefinition,
    OperationDefinition, OperationType, Selection, SelectionSet, Type,
};
use async_graphql_parser::{Pos, Positioned};
use async_graphql_value::{ConstValue, Name, Value};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::graphql::error::ValidationError;
use crate::graphql::loaders::CallSiteId;
use crate::graphql::schema::{
    ArgumentType, EntityGraph, FieldDef, InputObject, MutationField, MutationOp, RelationEdge,
    RootAccess, RootField, ScalarField, ScalarKind, MUTATION_TYPE_NAME, ROOT_TYPE_NAME,
};
use crate::models::{EntityKey, EntityKind, MemberTypeId};
use crate::repositories::Write;

const TYPENAME_FIELD: &str = "__typename";

type PlanResult<T> = Result<T, Positioned<ValidationError>>;

/// Executable form of one operation
#[derive(Debug)]
pub struct QueryPlan {
    pub operation_name: Option<String>,
    /// Query root fields run concurrently, mutation root fields one by one
    pub operation_type: OperationType,
    pub fields: Vec<RootPlan>,
}

/// A root field of the operation, under its response key
#[derive(Debug)]
pub struct RootPlan {
    pub response_key: String,
    pub pos: Pos,
    pub node: RootNode,
}

#[derive(Debug)]
pub enum RootNode {
    /// `__typename` on the root, carrying the root type's name
    Typename(&'static str),
    /// Every record of a kind
    Collection {
        root: &'static RootField,
        selection: SelectionPlan,
    },
    /// One record by primary key
    ById {
        root: &'static RootField,
        key: EntityKey,
        selection: SelectionPlan,
    },
    /// One write, then the sub-selection on the record it returned
    Write {
        mutation: &'static MutationField,
        write: Write,
        /// `None` when the field returns `Boolean`
        selection: Option<SelectionPlan>,
    },
}

/// Fields selected on objects of one kind, in response order
#[derive(Debug)]
pub struct SelectionPlan {
    pub kind: EntityKind,
    pub fields: Vec<FieldPlan>,
}

#[derive(Debug)]
pub struct FieldPlan {
    pub response_key: String,
    pub pos: Pos,
    pub node: FieldNode,
}

#[derive(Debug)]
pub enum FieldNode {
    Typename,
    Scalar(&'static ScalarField),
    Relation {
        edge: &'static RelationEdge,
        call_site: CallSiteId,
        selection: SelectionPlan,
    },
}

impl SelectionPlan {
    /// Number of relation fields in this selection and below
    pub fn relation_count(&self) -> usize {
        self.fields
            .iter()
            .map(|field| match &field.node {
                FieldNode::Relation { selection, .. } => 1 + selection.relation_count(),
                _ => 0,
            })
            .sum()
    }
}

/// The operation a request asked to run
#[derive(Debug, Clone, Copy)]
pub struct SelectedOperation<'a> {
    pub name: Option<&'a str>,
    pub definition: &'a Positioned<OperationDefinition>,
}

/// Pick the operation to execute
///
/// A name is required when the document holds several operations. Queries
/// and mutations can be executed; subscriptions cannot.
pub fn select_operation<'a>(
    document: &'a ExecutableDocument,
    operation_name: Option<&str>,
) -> Result<SelectedOperation<'a>, ValidationError> {
    let selected = match (&document.operations, operation_name) {
        (DocumentOperations::Single(definition), None) => SelectedOperation {
            name: None,
            definition,
        },
        (DocumentOperations::Single(_), Some(name)) => {
            return Err(ValidationError::UnknownOperation(name.to_string()))
        }
        (DocumentOperations::Multiple(operations), Some(name)) => operations
            .get_key_value(name)
            .map(|(name, definition)| SelectedOperation {
                name: Some(name.as_str()),
                definition,
            })
            .ok_or_else(|| ValidationError::UnknownOperation(name.to_string()))?,
        (DocumentOperations::Multiple(operations), None) if operations.len() == 1 => operations
            .iter()
            .next()
            .map(|(name, definition)| SelectedOperation {
                name: Some(name.as_str()),
                definition,
            })
            .ok_or(ValidationError::OperationNameRequired)?,
        (DocumentOperations::Multiple(_), None) => return Err(ValidationError::OperationNameRequired),
    };

    match selected.definition.node.ty {
        OperationType::Query | OperationType::Mutation => Ok(selected),
        OperationType::Subscription => Err(ValidationError::UnsupportedOperation("subscription")),
    }
}

/// Build the plan for `operation`
pub fn plan_operation(
    graph: &'static EntityGraph,
    document: &ExecutableDocument,
    operation: SelectedOperation<'_>,
    variables: &Variables,
) -> PlanResult<QueryPlan> {
    let definition = &operation.definition.node;
    let mut planner = Planner::new(graph, &document.fragments, definition, variables);
    let set = &definition.selection_set.node;
    let fields = match definition.ty {
        OperationType::Mutation => planner.plan_mutation(set)?,
        _ => planner.plan_root(set)?,
    };

    Ok(QueryPlan {
        operation_name: operation.name.map(str::to_string),
        operation_type: definition.ty,
        fields,
    })
}

/// Object type a selection set is applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParentType {
    Root,
    Mutation,
    Entity(EntityKind),
}

impl ParentType {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Root => ROOT_TYPE_NAME,
            Self::Mutation => MUTATION_TYPE_NAME,
            Self::Entity(kind) => kind.type_name(),
        }
    }
}

/// Fields sharing one response key, in document order
struct FieldGroup<'a> {
    response_key: &'a str,
    fields: Vec<&'a Positioned<Field>>,
}

impl<'a> FieldGroup<'a> {
    fn first(&self) -> &'a Positioned<Field> {
        self.fields[0]
    }

    fn name(&self) -> &'a str {
        self.first().node.name.node.as_str()
    }

    fn pos(&self) -> Pos {
        self.first().pos
    }

    fn sub_selections(&self) -> Vec<&'a SelectionSet> {
        self.fields
            .iter()
            .map(|field| &field.node.selection_set.node)
            .collect()
    }

    fn has_sub_selection(&self) -> bool {
        self.fields
            .iter()
            .any(|field| !field.node.selection_set.node.items.is_empty())
    }
}

struct Planner<'a> {
    graph: &'static EntityGraph,
    fragments: &'a HashMap<Name, Positioned<FragmentDefinition>>,
    variables: Variables,
    /// Declared type of every operation variable
    declared: HashMap<&'a str, &'a Type>,
    next_call_site: u32,
}

impl<'a> Planner<'a> {
    fn new(
        graph: &'static EntityGraph,
        fragments: &'a HashMap<Name, Positioned<FragmentDefinition>>,
        operation: &'a OperationDefinition,
        provided: &Variables,
    ) -> Self {
        let mut variables = provided.clone();
        let mut declared = HashMap::new();
        for definition in &operation.variable_definitions {
            let name = &definition.node.name.node;
            declared.insert(name.as_str(), &definition.node.var_type.node);
            if variables.contains_key(name) {
                continue;
            }
            if let Some(default) = &definition.node.default_value {
                variables.insert(name.clone(), default.node.clone());
            }
        }

        Self {
            graph,
            fragments,
            variables,
            declared,
            next_call_site: 0,
        }
    }

    fn plan_root(&mut self, set: &'a SelectionSet) -> PlanResult<Vec<RootPlan>> {
        let groups = self.collect_fields(ParentType::Root, &[set])?;
        let mut plans = Vec::with_capacity(groups.len());

        for group in groups {
            let name = group.name();
            let node = if name == TYPENAME_FIELD {
                self.leaf(&group, ROOT_TYPE_NAME, "String")?;
                RootNode::Typename(ROOT_TYPE_NAME)
            } else {
                let root = self.graph.root(name).ok_or_else(|| {
                    Positioned::new(
                        ValidationError::UnknownField {
                            type_name: ROOT_TYPE_NAME,
                            field: name.to_string(),
                        },
                        group.pos(),
                    )
                })?;
                self.plan_root_field(root, &group)?
            };

            plans.push(RootPlan {
                response_key: group.response_key.to_string(),
                pos: group.pos(),
                node,
            });
        }

        Ok(plans)
    }

    fn plan_mutation(&mut self, set: &'a SelectionSet) -> PlanResult<Vec<RootPlan>> {
        let groups = self.collect_fields(ParentType::Mutation, &[set])?;
        let mut plans = Vec::with_capacity(groups.len());

        for group in groups {
            let name = group.name();
            let node = if name == TYPENAME_FIELD {
                self.leaf(&group, MUTATION_TYPE_NAME, "String")?;
                RootNode::Typename(MUTATION_TYPE_NAME)
            } else {
                let mutation = self.graph.mutation(name).ok_or_else(|| {
                    Positioned::new(
                        ValidationError::UnknownField {
                            type_name: MUTATION_TYPE_NAME,
                            field: name.to_string(),
                        },
                        group.pos(),
                    )
                })?;
                self.plan_mutation_field(mutation, &group)?
            };

            plans.push(RootPlan {
                response_key: group.response_key.to_string(),
                pos: group.pos(),
                node,
            });
        }

        Ok(plans)
    }

    fn plan_mutation_field(
        &mut self,
        mutation: &'static MutationField,
        group: &FieldGroup<'a>,
    ) -> PlanResult<RootNode> {
        let args = MutationArguments::collect(mutation, &group.first().node, group.pos())?;

        let write = match mutation.op {
            MutationOp::CreateUser => Write::CreateUser(self.input_argument(&args, "dto")?),
            MutationOp::ChangeUser => Write::ChangeUser(
                self.uuid_argument(&args, "id")?,
                self.input_argument(&args, "dto")?,
            ),
            MutationOp::DeleteUser => Write::DeleteUser(self.uuid_argument(&args, "id")?),
            MutationOp::CreatePost => Write::CreatePost(self.input_argument(&args, "dto")?),
            MutationOp::ChangePost => Write::ChangePost(
                self.uuid_argument(&args, "id")?,
                self.input_argument(&args, "dto")?,
            ),
            MutationOp::DeletePost => Write::DeletePost(self.uuid_argument(&args, "id")?),
            MutationOp::CreateProfile => Write::CreateProfile(self.input_argument(&args, "dto")?),
            MutationOp::ChangeProfile => Write::ChangeProfile(
                self.uuid_argument(&args, "id")?,
                self.input_argument(&args, "dto")?,
            ),
            MutationOp::DeleteProfile => Write::DeleteProfile(self.uuid_argument(&args, "id")?),
            MutationOp::SubscribeTo => Write::SubscribeTo {
                user_id: self.uuid_argument(&args, "userId")?,
                author_id: self.uuid_argument(&args, "authorId")?,
            },
            MutationOp::UnsubscribeFrom => Write::UnsubscribeFrom {
                user_id: self.uuid_argument(&args, "userId")?,
                author_id: self.uuid_argument(&args, "authorId")?,
            },
        };

        let selection = match mutation.returns {
            Some(kind) => Some(self.plan_object(kind, group)?),
            None => {
                self.reject_selection(group, "Boolean")?;
                None
            }
        };

        Ok(RootNode::Write {
            mutation,
            write,
            selection,
        })
    }

    /// Coerce a `UUID!` mutation argument
    fn uuid_argument(&self, args: &MutationArguments<'a>, name: &'static str) -> PlanResult<Uuid> {
        let (ty, value) = args.get(name)?;
        match self.resolve(value, ty.type_name())? {
            ConstValue::Null => Err(args.missing(name, ty)),
            ConstValue::String(text) => Uuid::parse_str(&text).map_err(|err| {
                args.invalid(name, format!("'{}' is not a valid UUID: {}", text, err), value.pos)
            }),
            other => Err(args.invalid(name, format!("expected UUID!, found {}", other), value.pos)),
        }
    }

    /// Coerce an input object argument into its payload type
    fn input_argument<T: DeserializeOwned>(
        &self,
        args: &MutationArguments<'a>,
        name: &'static str,
    ) -> PlanResult<T> {
        let (ty, value) = args.get(name)?;
        if let ArgumentType::Input(input) = ty {
            self.check_input_variables(input, &value.node, value.pos)?;
        }
        let resolved = self.resolve(value, ty.type_name())?;
        if resolved == ConstValue::Null {
            return Err(args.missing(name, ty));
        }
        let json = resolved
            .into_json()
            .map_err(|err| args.invalid(name, err.to_string(), value.pos))?;
        serde_json::from_value(json).map_err(|err| args.invalid(name, err.to_string(), value.pos))
    }

    /// Check variables used directly as fields of an input object literal
    fn check_input_variables(&self, input: &InputObject, value: &Value, pos: Pos) -> PlanResult<()> {
        let Value::Object(fields) = value else {
            return Ok(());
        };
        for (name, field_value) in fields {
            if let (Value::Variable(variable), Some(field)) = (field_value, input.field(name.as_str())) {
                self.check_variable_type(variable, field.kind.type_name(), pos)?;
            }
        }
        Ok(())
    }

    fn plan_root_field(
        &mut self,
        root: &'static RootField,
        group: &FieldGroup<'a>,
    ) -> PlanResult<RootNode> {
        let field = &group.first().node;
        match root.access {
            RootAccess::All => {
                self.reject_arguments(field, ROOT_TYPE_NAME)?;
                let selection = self.plan_object(root.kind, group)?;
                Ok(RootNode::Collection { root, selection })
            }
            RootAccess::ById(_) => {
                let key = self.id_argument(root, field, group.pos())?;
                let selection = self.plan_object(root.kind, group)?;
                Ok(RootNode::ById {
                    root,
                    key,
                    selection,
                })
            }
        }
    }

    /// Plan the sub-selection of a field whose type is an object
    fn plan_object(&mut self, kind: EntityKind, group: &FieldGroup<'a>) -> PlanResult<SelectionPlan> {
        if !group.has_sub_selection() {
            return Err(Positioned::new(
                ValidationError::MissingSelection {
                    field: group.name().to_string(),
                    type_name: kind.type_name(),
                },
                group.pos(),
            ));
        }
        self.plan_selection(kind, &group.sub_selections())
    }

    fn plan_selection(
        &mut self,
        kind: EntityKind,
        sets: &[&'a SelectionSet],
    ) -> PlanResult<SelectionPlan> {
        let groups = self.collect_fields(ParentType::Entity(kind), sets)?;
        let mut fields = Vec::with_capacity(groups.len());

        for group in groups {
            let name = group.name();
            let node = if name == TYPENAME_FIELD {
                self.leaf(&group, kind.type_name(), "String")?;
                FieldNode::Typename
            } else {
                match self.graph.field(kind, name) {
                    Some(FieldDef::Scalar(scalar)) => {
                        self.leaf(&group, kind.type_name(), scalar.kind.type_name())?;
                        FieldNode::Scalar(scalar)
                    }
                    Some(FieldDef::Relation(edge)) => {
                        self.reject_arguments(&group.first().node, kind.type_name())?;
                        let call_site = self.next_call_site();
                        let selection = self.plan_object(edge.target, &group)?;
                        FieldNode::Relation {
                            edge,
                            call_site,
                            selection,
                        }
                    }
                    None => {
                        return Err(Positioned::new(
                            ValidationError::UnknownField {
                                type_name: kind.type_name(),
                                field: name.to_string(),
                            },
                            group.pos(),
                        ))
                    }
                }
            };

            fields.push(FieldPlan {
                response_key: group.response_key.to_string(),
                pos: group.pos(),
                node,
            });
        }

        Ok(SelectionPlan { kind, fields })
    }

    fn next_call_site(&mut self) -> CallSiteId {
        let id = CallSiteId(self.next_call_site);
        self.next_call_site += 1;
        id
    }

    /// Check a field whose type has no subfields
    fn leaf(&self, group: &FieldGroup<'a>, parent: &'static str, type_name: &'static str) -> PlanResult<()> {
        self.reject_arguments(&group.first().node, parent)?;
        self.reject_selection(group, type_name)
    }

    fn reject_selection(&self, group: &FieldGroup<'a>, type_name: &'static str) -> PlanResult<()> {
        if group.has_sub_selection() {
            return Err(Positioned::new(
                ValidationError::UnexpectedSelection {
                    field: group.name().to_string(),
                    type_name,
                },
                group.pos(),
            ));
        }
        Ok(())
    }

    fn reject_arguments(&self, field: &Field, type_name: &'static str) -> PlanResult<()> {
        match field.arguments.first() {
            Some((argument, _)) => Err(Positioned::new(
                ValidationError::UnknownArgument {
                    type_name,
                    field: field.name.node.to_string(),
                    argument: argument.node.to_string(),
                },
                argument.pos,
            )),
            None => Ok(()),
        }
    }

    /// Coerce the `id` argument of a by-id root field
    fn id_argument(&self, root: &RootField, field: &Field, pos: Pos) -> PlanResult<EntityKey> {
        let id_type = root.id_kind().type_name();
        let mut id = None;
        for (name, value) in &field.arguments {
            if name.node.as_str() != "id" {
                return Err(Positioned::new(
                    ValidationError::UnknownArgument {
                        type_name: ROOT_TYPE_NAME,
                        field: root.name.to_string(),
                        argument: name.node.to_string(),
                    },
                    name.pos,
                ));
            }
            id = Some(value);
        }

        let missing = |pos| {
            Positioned::new(
                ValidationError::MissingArgument {
                    field: root.name.to_string(),
                    argument: "id",
                    type_name: id_type,
                },
                pos,
            )
        };
        let value = id.ok_or_else(|| missing(pos))?;
        let invalid = |reason: String| {
            Positioned::new(
                ValidationError::InvalidArgument {
                    field: root.name.to_string(),
                    argument: "id".to_string(),
                    reason,
                },
                value.pos,
            )
        };

        match (root.id_kind(), self.resolve(value, id_type)?) {
            (_, ConstValue::Null) => Err(missing(value.pos)),
            (ScalarKind::MemberTypeId, ConstValue::Enum(name)) => name
                .parse::<MemberTypeId>()
                .map(EntityKey::from)
                .map_err(invalid),
            (ScalarKind::MemberTypeId, ConstValue::String(text)) => text
                .parse::<MemberTypeId>()
                .map(EntityKey::from)
                .map_err(invalid),
            (ScalarKind::Uuid, ConstValue::String(text)) => Uuid::parse_str(&text)
                .map(EntityKey::from)
                .map_err(|err| invalid(format!("'{}' is not a valid UUID: {}", text, err))),
            (_, other) => Err(invalid(format!("expected {}, found {}", id_type, other))),
        }
    }

    /// Substitute variables into an argument value of type `expected`
    ///
    /// A variable passed as the whole argument must be declared with that
    /// named type.
    fn resolve(&self, value: &Positioned<Value>, expected: &'static str) -> PlanResult<ConstValue> {
        if let Value::Variable(name) = &value.node {
            self.check_variable_type(name, expected, value.pos)?;
        }
        value
            .node
            .clone()
            .into_const_with(|name| match self.variables.get(&name) {
                Some(bound) => Ok(bound.clone()),
                None if self.declared.contains_key(name.as_str()) => Ok(ConstValue::Null),
                None => Err(ValidationError::UndefinedVariable(name.to_string())),
            })
            .map_err(|error| Positioned::new(error, value.pos))
    }

    /// Undeclared variables are left to [`resolve`](Self::resolve)
    fn check_variable_type(&self, name: &Name, expected: &'static str, pos: Pos) -> PlanResult<()> {
        let Some(declared) = self.declared.get(name.as_str()) else {
            return Ok(());
        };
        match &declared.base {
            BaseType::Named(base) if base.as_str() == expected => Ok(()),
            _ => Err(Positioned::new(
                ValidationError::VariableTypeMismatch {
                    variable: name.to_string(),
                    declared: declared.to_string(),
                    expected,
                },
                pos,
            )),
        }
    }

    /// Evaluate `@skip` / `@include` on one selection
    fn included(&self, directives: &[Positioned<Directive>]) -> PlanResult<bool> {
        for directive in directives {
            let skip_when = match directive.node.name.node.as_str() {
                "skip" => true,
                "include" => false,
                _ => continue,
            };
            let condition = directive.node.get_argument("if").ok_or_else(|| {
                Positioned::new(
                    ValidationError::MissingArgument {
                        field: format!("@{}", directive.node.name.node),
                        argument: "if",
                        type_name: "Boolean",
                    },
                    directive.pos,
                )
            })?;
            match self.resolve(condition, "Boolean")? {
                ConstValue::Boolean(value) if value == skip_when => return Ok(false),
                ConstValue::Boolean(_) => {}
                other => {
                    return Err(Positioned::new(
                        ValidationError::InvalidArgument {
                            field: format!("@{}", directive.node.name.node),
                            argument: "if".to_string(),
                            reason: format!("expected Boolean!, found {}", other),
                        },
                        condition.pos,
                    ))
                }
            }
        }
        Ok(true)
    }

    /// Flatten fragments and group fields by response key
    fn collect_fields(
        &self,
        parent: ParentType,
        sets: &[&'a SelectionSet],
    ) -> PlanResult<Vec<FieldGroup<'a>>> {
        let mut fields = Vec::new();
        let mut active = Vec::new();
        for set in sets {
            self.flatten(parent, set, &mut active, &mut fields)?;
        }

        let mut groups: Vec<FieldGroup<'a>> = Vec::new();
        let mut index: HashMap<&'a str, usize> = HashMap::new();
        for field in fields {
            let response_key = field.node.response_key().node.as_str();
            match index.get(response_key) {
                Some(&at) => {
                    let first = &groups[at].first().node;
                    if first.name.node != field.node.name.node
                        || first.arguments != field.node.arguments
                    {
                        return Err(Positioned::new(
                            ValidationError::FieldConflict(response_key.to_string()),
                            field.pos,
                        ));
                    }
                    groups[at].fields.push(field);
                }
                None => {
                    index.insert(response_key, groups.len());
                    groups.push(FieldGroup {
                        response_key,
                        fields: vec![field],
                    });
                }
            }
        }
        Ok(groups)
    }

    fn flatten(
        &self,
        parent: ParentType,
        set: &'a SelectionSet,
        active: &mut Vec<&'a str>,
        out: &mut Vec<&'a Positioned<Field>>,
    ) -> PlanResult<()> {
        for selection in &set.items {
            match &selection.node {
                Selection::Field(field) => {
                    if self.included(&field.node.directives)? {
                        out.push(field);
                    }
                }
                Selection::InlineFragment(fragment) => {
                    if !self.included(&fragment.node.directives)? {
                        continue;
                    }
                    if let Some(condition) = &fragment.node.type_condition {
                        check_type_condition(parent, &condition.node.on)?;
                    }
                    self.flatten(parent, &fragment.node.selection_set.node, active, out)?;
                }
                Selection::FragmentSpread(spread) => {
                    if !self.included(&spread.node.directives)? {
                        continue;
                    }
                    let name = &spread.node.fragment_name;
                    let fragment = self.fragments.get(name.node.as_str()).ok_or_else(|| {
                        Positioned::new(ValidationError::UnknownFragment(name.node.to_string()), name.pos)
                    })?;
                    if active.contains(&name.node.as_str()) {
                        return Err(Positioned::new(
                            ValidationError::FragmentCycle(name.node.to_string()),
                            name.pos,
                        ));
                    }
                    check_type_condition(parent, &fragment.node.type_condition.node.on)?;

                    active.push(name.node.as_str());
                    self.flatten(parent, &fragment.node.selection_set.node, active, out)?;
                    active.pop();
                }
            }
        }
        Ok(())
    }
}

/// Arguments of one mutation field, checked against its declaration
struct MutationArguments<'a> {
    mutation: &'static MutationField,
    values: HashMap<&'static str, (ArgumentType, &'a Positioned<Value>)>,
    pos: Pos,
}

impl<'a> MutationArguments<'a> {
    fn collect(mutation: &'static MutationField, field: &'a Field, pos: Pos) -> PlanResult<Self> {
        let mut values = HashMap::new();
        for (name, value) in &field.arguments {
            let Some(argument) = mutation.argument(name.node.as_str()) else {
                return Err(Positioned::new(
                    ValidationError::UnknownArgument {
                        type_name: MUTATION_TYPE_NAME,
                        field: mutation.name.to_string(),
                        argument: name.node.to_string(),
                    },
                    name.pos,
                ));
            };
            values.insert(argument.name, (argument.ty, value));
        }

        let args = Self {
            mutation,
            values,
            pos,
        };
        for argument in &mutation.arguments {
            if !args.values.contains_key(argument.name) {
                return Err(args.missing(argument.name, argument.ty));
            }
        }
        Ok(args)
    }

    fn get(&self, name: &'static str) -> PlanResult<(ArgumentType, &'a Positioned<Value>)> {
        match (self.values.get(name), self.mutation.argument(name)) {
            (Some(found), _) => Ok(*found),
            (None, Some(argument)) => Err(self.missing(name, argument.ty)),
            (None, None) => Err(Positioned::new(
                ValidationError::UnknownArgument {
                    type_name: MUTATION_TYPE_NAME,
                    field: self.mutation.name.to_string(),
                    argument: name.to_string(),
                },
                self.pos,
            )),
        }
    }

    fn missing(&self, argument: &'static str, ty: ArgumentType) -> Positioned<ValidationError> {
        Positioned::new(
            ValidationError::MissingArgument {
                field: self.mutation.name.to_string(),
                argument,
                type_name: ty.type_name(),
            },
            self.pos,
        )
    }

    fn invalid(&self, argument: &str, reason: String, pos: Pos) -> Positioned<ValidationError> {
        Positioned::new(
            ValidationError::InvalidArgument {
                field: self.mutation.name.to_string(),
                argument: argument.to_string(),
                reason,
            },
            pos,
        )
    }
}

fn check_type_condition(parent: ParentType, condition: &Positioned<Name>) -> PlanResult<()> {
    if condition.node.as_str() == parent.type_name() {
        return Ok(());
    }
    Err(Positioned::new(
        ValidationError::TypeConditionMismatch {
            condition: condition.node.to_string(),
            type_name: parent.type_name(),
        },
        condition.pos,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::schema::{entity_graph, EdgeId};
    use assert_matches::assert_matches;
    use async_graphql_parser::parse_query;
    use serde_json::json;

    fn plan_with(query: &str, variables: serde_json::Value) -> PlanResult<QueryPlan> {
        let document = parse_query(query).unwrap();
        let operation = select_operation(&document, None).unwrap();
        plan_operation(
            entity_graph(),
            &document,
            operation,
            &Variables::from_json(variables),
        )
    }

    fn plan(query: &str) -> PlanResult<QueryPlan> {
        plan_with(query, json!({}))
    }

    fn root_selection(plan: &QueryPlan, index: usize) -> &SelectionPlan {
        match &plan.fields[index].node {
            RootNode::Collection { selection, .. } | RootNode::ById { selection, .. } => selection,
            RootNode::Write {
                selection: Some(selection),
                ..
            } => selection,
            other => panic!("root field {} has no selection: {:?}", index, other),
        }
    }

    #[test]
    fn test_fields_keep_document_order() {
        let plan = plan("{ users { name id balance } }").unwrap();
        let keys: Vec<_> = root_selection(&plan, 0)
            .fields
            .iter()
            .map(|field| field.response_key.as_str())
            .collect();
        assert_eq!(keys, vec!["name", "id", "balance"]);
    }

    #[test]
    fn test_call_sites_are_distinct_per_occurrence() {
        let plan = plan("{ a: users { profile { id } } b: users { profile { id } } }").unwrap();
        let call_site = |index| match &root_selection(&plan, index).fields[0].node {
            FieldNode::Relation {
                edge, call_site, ..
            } => {
                assert_eq!(edge.id, EdgeId::UserProfile);
                *call_site
            }
            other => panic!("expected relation, got {:?}", other),
        };
        assert_ne!(call_site(0), call_site(1));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let error = plan("{ users { email } }").unwrap_err();
        assert_eq!(
            error.node,
            ValidationError::UnknownField {
                type_name: "User",
                field: "email".to_string()
            }
        );
        assert_eq!(error.pos.line, 1);
    }

    #[test]
    fn test_by_id_lookup_coerces_variables() {
        let id = Uuid::new_v4();
        let plan = plan_with(
            "query Q($id: UUID!) { user(id: $id) { id } }",
            json!({ "id": id.to_string() }),
        )
        .unwrap();
        assert_matches!(
            &plan.fields[0].node,
            RootNode::ById { key, .. } if *key == EntityKey::Id(id)
        );
    }

    #[test]
    fn test_member_type_accepts_enum_literal() {
        let plan = plan("{ memberType(id: business) { id } }").unwrap();
        assert_matches!(
            &plan.fields[0].node,
            RootNode::ById { key: EntityKey::MemberType(MemberTypeId::Business), .. }
        );
    }

    #[test]
    fn test_unknown_member_type_is_a_validation_error() {
        assert_matches!(
            plan("{ memberType(id: platinum) { id } }").unwrap_err().node,
            ValidationError::InvalidArgument { .. }
        );
    }

    #[test]
    fn test_argument_errors() {
        assert_matches!(
            plan("{ user { id } }").unwrap_err().node,
            ValidationError::MissingArgument { argument: "id", .. }
        );
        assert_matches!(
            plan("{ user(id: \"nope\") { id } }").unwrap_err().node,
            ValidationError::InvalidArgument { .. }
        );
        assert_matches!(
            plan("{ user(id: $missing) { id } }").unwrap_err().node,
            ValidationError::UndefinedVariable(name) if name == "missing"
        );
        assert_matches!(
            plan("{ users(first: 2) { id } }").unwrap_err().node,
            ValidationError::UnknownArgument { .. }
        );
    }

    #[test]
    fn test_selection_shape_errors() {
        assert_matches!(
            plan("{ users { posts } }").unwrap_err().node,
            ValidationError::MissingSelection { .. }
        );
        assert_matches!(
            plan("{ users { name { first } } }").unwrap_err().node,
            ValidationError::UnexpectedSelection { .. }
        );
    }

    #[test]
    fn test_fragments_are_flattened() {
        let plan = plan(
            r#"
            { users { ...Names ... on User { balance } } }
            fragment Names on User { id name }
            "#,
        )
        .unwrap();
        assert_eq!(root_selection(&plan, 0).fields.len(), 3);
    }

    #[test]
    fn test_fragment_errors() {
        assert_matches!(
            plan("{ users { ...Nope } }").unwrap_err().node,
            ValidationError::UnknownFragment(_)
        );
        assert_matches!(
            plan("{ users { ...A } } fragment A on User { ...A }").unwrap_err().node,
            ValidationError::FragmentCycle(_)
        );
        assert_matches!(
            plan("{ users { ... on Post { id } } }").unwrap_err().node,
            ValidationError::TypeConditionMismatch { .. }
        );
    }

    #[test]
    fn test_skip_and_include() {
        let plan = plan_with(
            "query Q($hide: Boolean!) { users { id @skip(if: $hide) name @include(if: false) balance } }",
            json!({ "hide": true }),
        )
        .unwrap();
        let keys: Vec<_> = root_selection(&plan, 0)
            .fields
            .iter()
            .map(|field| field.response_key.as_str())
            .collect();
        assert_eq!(keys, vec!["balance"]);
    }

    #[test]
    fn test_repeated_fields_merge_sub_selections() {
        let plan = plan("{ users { profile { id } profile { isMale } } }").unwrap();
        let selection = root_selection(&plan, 0);
        assert_eq!(selection.fields.len(), 1);
        assert_eq!(selection.relation_count(), 1);
        match &selection.fields[0].node {
            FieldNode::Relation { selection, .. } => assert_eq!(selection.fields.len(), 2),
            other => panic!("expected relation, got {:?}", other),
        }
    }

    #[test]
    fn test_conflicting_aliases_are_rejected() {
        assert_matches!(
            plan("{ users { x: name x: balance } }").unwrap_err().node,
            ValidationError::FieldConflict(key) if key == "x"
        );
    }

    #[test]
    fn test_operation_selection() {
        let document = parse_query("query A { users { id } } query B { posts { id } }").unwrap();
        assert_matches!(
            select_operation(&document, None),
            Err(ValidationError::OperationNameRequired)
        );
        assert_matches!(
            select_operation(&document, Some("B")),
            Ok(SelectedOperation { name: Some("B"), .. })
        );
        assert_matches!(
            select_operation(&document, Some("C")),
            Err(ValidationError::UnknownOperation(_))
        );

        let mutation = parse_query("mutation { deleteUser(id: \"x\") }").unwrap();
        assert_matches!(select_operation(&mutation, None), Ok(_));

        let subscription = parse_query("subscription { users { id } }").unwrap();
        assert_matches!(
            select_operation(&subscription, None),
            Err(ValidationError::UnsupportedOperation("subscription"))
        );
    }

    #[test]
    fn test_mutation_coerces_payload() {
        let author = Uuid::new_v4();
        let plan = plan_with(
            "mutation M($dto: CreatePostInput!) { createPost(dto: $dto) { id author { name } } __typename }",
            json!({ "dto": { "title": "t", "content": "c", "authorId": author.to_string() } }),
        )
        .unwrap();

        assert_eq!(plan.operation_type, OperationType::Mutation);
        assert_matches!(
            &plan.fields[0].node,
            RootNode::Write { mutation, write: Write::CreatePost(input), selection: Some(_) }
                if mutation.name == "createPost" && input.author_id == author
        );
        assert_eq!(root_selection(&plan, 0).relation_count(), 1);
        assert_matches!(&plan.fields[1].node, RootNode::Typename("Mutation"));
    }

    #[test]
    fn test_boolean_mutations_take_no_selection() {
        let id = Uuid::new_v4();
        let plan = plan(&format!(r#"mutation {{ deletePost(id: "{}") }}"#, id)).unwrap();
        assert_matches!(
            &plan.fields[0].node,
            RootNode::Write { write: Write::DeletePost(target), selection: None, .. } if *target == id
        );

        assert_matches!(
            self::plan(&format!(r#"mutation {{ deletePost(id: "{}") {{ id }} }}"#, id))
                .unwrap_err()
                .node,
            ValidationError::UnexpectedSelection { type_name: "Boolean", .. }
        );
    }

    #[test]
    fn test_mutation_argument_errors() {
        assert_matches!(
            plan("mutation { changeUser(dto: { name: \"x\" }) { id } }").unwrap_err().node,
            ValidationError::MissingArgument { argument: "id", type_name: "UUID", .. }
        );
        assert_matches!(
            plan("mutation { createUser(dto: { name: \"x\" }) { id } }").unwrap_err().node,
            ValidationError::InvalidArgument { argument, reason, .. }
                if argument == "dto" && reason.contains("balance")
        );
        assert_matches!(
            plan("mutation { createUser(dto: { name: \"x\", balance: 1, email: \"e\" }) { id } }")
                .unwrap_err()
                .node,
            ValidationError::InvalidArgument { reason, .. } if reason.contains("email")
        );
        assert_matches!(
            plan("mutation { createUser(input: {}) { id } }").unwrap_err().node,
            ValidationError::UnknownArgument { type_name: "Mutation", .. }
        );
        assert_matches!(
            plan("mutation { users { id } }").unwrap_err().node,
            ValidationError::UnknownField { type_name: "Mutation", .. }
        );
    }

    #[test]
    fn test_variable_type_must_match_argument() {
        let error = plan_with(
            "query($id: Int) { user(id: $id) { id } }",
            json!({ "id": 1 }),
        )
        .unwrap_err();
        assert_eq!(
            error.node,
            ValidationError::VariableTypeMismatch {
                variable: "id".to_string(),
                declared: "Int".to_string(),
                expected: "UUID",
            }
        );

        assert_matches!(
            plan("query($tier: UUID!) { memberType(id: $tier) { id } }").unwrap_err().node,
            ValidationError::VariableTypeMismatch { expected: "MemberTypeId", .. }
        );
        assert_matches!(
            plan("query($hide: String) { users { id @skip(if: $hide) } }").unwrap_err().node,
            ValidationError::VariableTypeMismatch { expected: "Boolean", .. }
        );
        assert_matches!(
            plan("query($ids: [UUID!]) { user(id: $ids) { id } }").unwrap_err().node,
            ValidationError::VariableTypeMismatch { declared, .. } if declared == "[UUID!]"
        );
    }

    #[test]
    fn test_variable_types_are_checked_in_payloads() {
        assert_matches!(
            plan("mutation($dto: ChangeUserInput!) { createUser(dto: $dto) { id } }")
                .unwrap_err()
                .node,
            ValidationError::VariableTypeMismatch { expected: "CreateUserInput", .. }
        );
        assert_matches!(
            plan("mutation($year: String) { changeProfile(id: \"00000000-0000-0000-0000-000000000000\", dto: { yearOfBirth: $year }) { id } }")
                .unwrap_err()
                .node,
            ValidationError::VariableTypeMismatch { variable, expected: "Int", .. } if variable == "year"
        );
    }

    #[test]
    fn test_variable_defaults_apply() {
        let plan = plan("query Q($id: MemberTypeId = basic) { memberType(id: $id) { id } }").unwrap();
        assert_matches!(
            &plan.fields[0].node,
            RootNode::ById { key: EntityKey::MemberType(MemberTypeId::Basic), .. }
        );
    }
}
