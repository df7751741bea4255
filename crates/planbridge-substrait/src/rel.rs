//! Substrait relation → plan node conversion

use crate::catalog::FunctionCatalog;
use crate::expr::{argument_values, expression_offset, literal_value, ExprConverter};
use crate::scope::InputSchemaScope;
use crate::types::to_internal_type;
use crate::{variant_name, ConvertError};
use planbridge_plan::{
    column_name, decimal_avg_result_type, Aggregate, AggregationStep, CallExpr, ColumnFilter,
    ComparisonOp, FieldAccess, JoinType, NodeIdAllocator, PlanNode, PlanNodeId, RowType,
    SortOrder, Type, TypedExpr,
};
use std::collections::BTreeMap;
use substrait::proto::aggregate_function::AggregationInvocation;
use substrait::proto::expression::{RexType, ScalarFunction};
use substrait::proto::{
    aggregate_rel, join_rel, plan_rel, read_rel, rel, rel_common, sort_field, AggregateFunction,
    AggregateRel, AggregationPhase, Expression, FilterRel, JoinRel, Plan, ProjectRel, ReadRel, Rel,
    RelCommon, SortField,
};

/// Final aggregates whose intermediate state arrives as several columns and
/// must be packed into one row before aggregation, with the packed fields.
const ROW_PACKED_AGGREGATES: &[(&str, &[&str])] = &[("avg", &["sum", "count"])];

/// Converts the relations of one plan into a plan tree.
///
/// Node ids are allocated in conversion order, so converting the same plan
/// with a fresh converter always yields the same tree.
pub struct SubstraitPlanConverter {
    catalog: FunctionCatalog,
    ids: NodeIdAllocator,
}

impl SubstraitPlanConverter {
    pub fn new(plan: &Plan) -> Result<Self, ConvertError> {
        Ok(Self::with_catalog(FunctionCatalog::from_plan(plan)?))
    }

    pub fn with_catalog(catalog: FunctionCatalog) -> Self {
        Self {
            catalog,
            ids: NodeIdAllocator::new(),
        }
    }

    pub fn catalog(&self) -> &FunctionCatalog {
        &self.catalog
    }

    /// Convert the first relation of `plan`.
    pub fn convert_plan(plan: &Plan) -> Result<PlanNode, ConvertError> {
        Self::new(plan)?.to_plan(plan)
    }

    pub fn to_plan(&mut self, plan: &Plan) -> Result<PlanNode, ConvertError> {
        let relation = plan.relations.first().ok_or(ConvertError::EmptyPlan)?;
        let rel = match &relation.rel_type {
            Some(plan_rel::RelType::Root(root)) => root
                .input
                .as_ref()
                .ok_or(ConvertError::MissingField("RelRoot.input"))?,
            Some(plan_rel::RelType::Rel(rel)) => rel,
            None => return Err(ConvertError::MissingField("PlanRel.rel_type")),
        };
        let node = self.to_plan_node(rel)?;
        tracing::debug!(
            root = node.kind_name(),
            id = %node.id(),
            "converted substrait plan"
        );
        Ok(node)
    }

    pub fn to_plan_node(&mut self, rel: &Rel) -> Result<PlanNode, ConvertError> {
        let rel_type = rel
            .rel_type
            .as_ref()
            .ok_or(ConvertError::MissingField("Rel.rel_type"))?;
        check_common(rel_common(rel_type))?;

        match rel_type {
            rel::RelType::Read(read) => self.convert_read(read),
            rel::RelType::Filter(filter) => self.convert_filter(filter),
            rel::RelType::Project(project) => self.convert_project(project),
            rel::RelType::Aggregate(aggregate) => self.convert_aggregate(aggregate),
            rel::RelType::Join(join) => self.convert_join(join),
            other => Err(ConvertError::UnsupportedRelation(variant_name(other))),
        }
    }

    fn expressions(&self) -> ExprConverter<'_> {
        ExprConverter::new(&self.catalog)
    }

    fn convert_read(&mut self, read: &ReadRel) -> Result<PlanNode, ConvertError> {
        let table = named_table(read)?;
        let base = base_schema(read)?;
        if read.projection.is_some() {
            return Err(ConvertError::UnsupportedRelation(
                "ReadRel with projection".to_string(),
            ));
        }

        let id = self.ids.next_id();
        let output_type = RowType::from_pairs(
            base.types()
                .enumerate()
                .map(|(i, ty)| (column_name(id, i), ty.clone())),
        );

        let mut filters: BTreeMap<String, Vec<ColumnFilter>> = BTreeMap::new();
        if let Some(condition) = &read.filter {
            for conjunct in flatten_conditions(&self.catalog, condition)? {
                let (column, filter) = to_column_filter(&self.catalog, conjunct, &base)?;
                filters.entry(column).or_default().push(filter);
            }
        }

        tracing::trace!(%id, table = %table, filters = filters.len(), "converted read");
        Ok(PlanNode::TableScan {
            id,
            table,
            columns: base.names().map(str::to_string).collect(),
            output_type,
            filters,
        })
    }

    fn convert_filter(&mut self, filter: &FilterRel) -> Result<PlanNode, ConvertError> {
        let input = filter
            .input
            .as_deref()
            .ok_or(ConvertError::MissingField("FilterRel.input"))?;
        let condition = filter
            .condition
            .as_deref()
            .ok_or(ConvertError::MissingField("FilterRel.condition"))?;

        let source = self.to_plan_node(input)?;
        let scope = InputSchemaScope::single(source.id(), source.output_type());
        let predicate = self.expressions().convert(condition, &scope)?;

        Ok(PlanNode::Filter {
            id: self.ids.next_id(),
            predicate,
            source: Box::new(source),
        })
    }

    fn convert_project(&mut self, project: &ProjectRel) -> Result<PlanNode, ConvertError> {
        let input = project
            .input
            .as_deref()
            .ok_or(ConvertError::MissingField("ProjectRel.input"))?;

        let source = self.to_plan_node(input)?;
        let scope = InputSchemaScope::single(source.id(), source.output_type());
        let projections = project
            .expressions
            .iter()
            .map(|expr| self.expressions().convert(expr, &scope))
            .collect::<Result<Vec<_>, _>>()?;

        let id = self.ids.next_id();
        let names = (0..projections.len()).map(|i| column_name(id, i)).collect();
        Ok(PlanNode::Project {
            id,
            names,
            projections,
            source: Box::new(source),
        })
    }

    fn convert_aggregate(&mut self, aggregate: &AggregateRel) -> Result<PlanNode, ConvertError> {
        let input = aggregate
            .input
            .as_deref()
            .ok_or(ConvertError::MissingField("AggregateRel.input"))?;

        let source = self.to_plan_node(input)?;
        let step = aggregation_step(&aggregate.measures)?;
        let groupings = grouping_expressions(aggregate)?;
        check_distinct_groupings(&groupings)?;
        let functions = measure_functions(aggregate)?;

        // Allocated first so both paths name their outputs identically.
        let id = self.ids.next_id();
        let scope = InputSchemaScope::single(source.id(), source.output_type());
        let grouping_keys = groupings
            .iter()
            .map(|expr| self.grouping_key(expr, &scope))
            .collect::<Result<Vec<_>, _>>()?;

        if needs_row_construct(&self.catalog, step, &functions)? {
            return self.aggregate_with_row_construct(
                id,
                step,
                grouping_keys,
                aggregate,
                &functions,
                source,
            );
        }

        let mut aggregates = Vec::with_capacity(functions.len());
        for (measure, function) in aggregate.measures.iter().zip(&functions) {
            aggregates.push(self.convert_measure(measure, function, &scope)?);
        }
        let aggregate_names = (0..aggregates.len())
            .map(|i| column_name(id, grouping_keys.len() + i))
            .collect();

        Ok(PlanNode::Aggregation {
            id,
            step,
            grouping_keys,
            aggregate_names,
            aggregates,
            source: Box::new(source),
        })
    }

    fn grouping_key(
        &self,
        expr: &Expression,
        scope: &InputSchemaScope,
    ) -> Result<FieldAccess, ConvertError> {
        match &expr.rex_type {
            Some(RexType::Selection(field)) => self.expressions().convert_field(field, scope),
            _ => Err(ConvertError::UnsupportedAggregate(
                "grouping key must be a column reference".to_string(),
            )),
        }
    }

    fn convert_measure(
        &self,
        measure: &aggregate_rel::Measure,
        function: &AggregateFunction,
        scope: &InputSchemaScope,
    ) -> Result<Aggregate, ConvertError> {
        let name = self.catalog.lookup(function.function_reference)?;
        let output_type = function
            .output_type
            .as_ref()
            .ok_or(ConvertError::MissingField("AggregateFunction.output_type"))?;
        let inputs = argument_values(&function.arguments)?
            .into_iter()
            .map(|arg| self.expressions().convert(arg, scope))
            .collect::<Result<Vec<_>, _>>()?;

        let mut aggregate = Aggregate::new(CallExpr::new(name, to_internal_type(output_type)?, inputs));
        if let Some(filter) = &measure.filter {
            aggregate.mask = Some(self.column_reference(filter, scope, "aggregate filter")?);
        }
        for sort in &function.sorts {
            let (key, order) = self.sort_key(sort, scope)?;
            aggregate.sorting_keys.push(key);
            aggregate.sorting_orders.push(order);
        }
        aggregate.distinct = is_distinct(function)?;
        Ok(aggregate)
    }

    fn column_reference(
        &self,
        expr: &Expression,
        scope: &InputSchemaScope,
        context: &str,
    ) -> Result<FieldAccess, ConvertError> {
        match &expr.rex_type {
            Some(RexType::Selection(field)) => self.expressions().convert_field(field, scope),
            _ => Err(ConvertError::UnsupportedAggregate(format!(
                "{} must be a column reference",
                context
            ))),
        }
    }

    fn sort_key(
        &self,
        sort: &SortField,
        scope: &InputSchemaScope,
    ) -> Result<(FieldAccess, SortOrder), ConvertError> {
        let expr = sort
            .expr
            .as_ref()
            .ok_or(ConvertError::MissingField("SortField.expr"))?;
        let key = self.column_reference(expr, scope, "sorting key")?;
        Ok((key, sort_order(sort)?))
    }

    /// Pack the multi-column intermediate state of final aggregates into one
    /// row column, aggregate over it, then restore the output names the
    /// direct path would have produced:
    ///
    /// Project(id: unify) → Aggregation → Project(row_constructor) → source
    fn aggregate_with_row_construct(
        &mut self,
        id: PlanNodeId,
        step: AggregationStep,
        grouping_keys: Vec<FieldAccess>,
        aggregate: &AggregateRel,
        functions: &[&AggregateFunction],
        source: PlanNode,
    ) -> Result<PlanNode, ConvertError> {
        let scope = InputSchemaScope::single(source.id(), source.output_type());
        let construct_id = self.ids.next_id();
        let aggregation_id = self.ids.next_id();
        let group_count = grouping_keys.len();

        let mut projections: Vec<TypedExpr> = grouping_keys
            .iter()
            .cloned()
            .map(TypedExpr::FieldAccess)
            .collect();
        let mut calls = Vec::with_capacity(functions.len());

        for (measure, function) in aggregate.measures.iter().zip(functions) {
            let name = self.catalog.lookup(function.function_reference)?;
            if measure.filter.is_some() || !function.sorts.is_empty() || is_distinct(function)? {
                return Err(ConvertError::UnsupportedAggregate(format!(
                    "final {} with filter, ordering or DISTINCT",
                    name
                )));
            }

            let inputs = argument_values(&function.arguments)?
                .into_iter()
                .map(|arg| self.expressions().convert(arg, &scope))
                .collect::<Result<Vec<_>, _>>()?;

            let packed = match row_packed_fields(name) {
                Some(fields) => {
                    if inputs.len() != fields.len() {
                        return Err(ConvertError::ArityMismatch {
                            function: name.to_string(),
                            expected: fields.len(),
                            actual: inputs.len(),
                        });
                    }
                    let row = Type::row(
                        fields
                            .iter()
                            .zip(&inputs)
                            .map(|(field, input)| (*field, input.data_type().clone())),
                    );
                    TypedExpr::call("row_constructor", row, inputs)
                }
                None => {
                    if inputs.len() != 1 {
                        return Err(ConvertError::ArityMismatch {
                            function: name.to_string(),
                            expected: 1,
                            actual: inputs.len(),
                        });
                    }
                    inputs.into_iter().next().ok_or(ConvertError::ArityMismatch {
                        function: name.to_string(),
                        expected: 1,
                        actual: 0,
                    })?
                }
            };

            let output_type = match &function.output_type {
                Some(ty) => to_internal_type(ty)?,
                None if name == "avg" => decimal_avg_result_type(packed.data_type()).ok_or(
                    ConvertError::MissingField("AggregateFunction.output_type"),
                )?,
                None => return Err(ConvertError::MissingField("AggregateFunction.output_type")),
            };
            calls.push((name.to_string(), output_type, packed.data_type().clone()));
            projections.push(packed);
        }

        let construct_names: Vec<String> = (0..projections.len())
            .map(|i| column_name(construct_id, i))
            .collect();
        let construct = PlanNode::Project {
            id: construct_id,
            names: construct_names.clone(),
            projections,
            source: Box::new(source),
        };

        let aggregation_keys: Vec<FieldAccess> = grouping_keys
            .iter()
            .zip(&construct_names)
            .map(|(key, name)| FieldAccess::new(name.clone(), key.data_type.clone()))
            .collect();
        let aggregates = calls
            .into_iter()
            .enumerate()
            .map(|(i, (name, output_type, input_type))| {
                let input = TypedExpr::field(construct_names[group_count + i].clone(), input_type);
                Aggregate::new(CallExpr::new(name, output_type, vec![input]))
            })
            .collect::<Vec<_>>();
        let aggregate_names: Vec<String> = (0..aggregates.len())
            .map(|i| column_name(aggregation_id, group_count + i))
            .collect();

        let aggregation = PlanNode::Aggregation {
            id: aggregation_id,
            step,
            grouping_keys: aggregation_keys.clone(),
            aggregate_names: aggregate_names.clone(),
            aggregates,
            source: Box::new(construct),
        };

        let aggregation_output = aggregation.output_type();
        let projections = aggregation_output
            .fields
            .iter()
            .map(|field| TypedExpr::field(field.name.clone(), field.data_type.clone()))
            .collect();
        let names = grouping_keys
            .iter()
            .map(|key| key.name.clone())
            .chain((0..aggregate_names.len()).map(|i| column_name(id, group_count + i)))
            .collect();

        tracing::trace!(%id, %construct_id, %aggregation_id, "packed final aggregate state");
        Ok(PlanNode::Project {
            id,
            names,
            projections,
            source: Box::new(aggregation),
        })
    }

    fn convert_join(&mut self, join: &JoinRel) -> Result<PlanNode, ConvertError> {
        let join_type = join_type(join.r#type)?;
        let left = join
            .left
            .as_deref()
            .ok_or(ConvertError::MissingField("JoinRel.left"))?;
        let right = join
            .right
            .as_deref()
            .ok_or(ConvertError::MissingField("JoinRel.right"))?;
        let condition = join
            .expression
            .as_deref()
            .ok_or(ConvertError::MissingField("JoinRel.expression"))?;

        let left = self.to_plan_node(left)?;
        let right = self.to_plan_node(right)?;
        let left_type = left.output_type();
        let right_type = right.output_type();

        let mut scope = InputSchemaScope::new();
        scope.push(left.id(), left_type.clone());
        scope.push(right.id(), right_type.clone());

        let mut left_keys = Vec::new();
        let mut right_keys = Vec::new();
        for (left_offset, right_offset) in extract_join_keys(&self.catalog, condition, &scope)? {
            left_keys.push(self.resolve_column(left_offset, &scope)?);
            right_keys.push(self.resolve_column(right_offset, &scope)?);
        }

        let filter = join
            .post_join_filter
            .as_deref()
            .map(|expr| self.expressions().convert(expr, &scope))
            .transpose()?;

        let output_type = if join_type.outputs_left_only() {
            left_type
        } else {
            left_type.concat(&right_type)
        };

        Ok(PlanNode::Join {
            id: self.ids.next_id(),
            join_type,
            left_keys,
            right_keys,
            filter,
            left: Box::new(left),
            right: Box::new(right),
            output_type,
        })
    }

    fn resolve_column(
        &self,
        offset: usize,
        scope: &InputSchemaScope,
    ) -> Result<FieldAccess, ConvertError> {
        let resolved = scope.resolve(offset).ok_or(ConvertError::FieldOutOfRange {
            offset: offset as i64,
            width: scope.width(),
        })?;
        Ok(FieldAccess::new(
            resolved.field.name.clone(),
            resolved.field.data_type.clone(),
        ))
    }
}

/// Common properties of the relation kinds the converter handles.
pub fn rel_common(rel_type: &rel::RelType) -> Option<&RelCommon> {
    match rel_type {
        rel::RelType::Read(read) => read.common.as_ref(),
        rel::RelType::Filter(filter) => filter.common.as_ref(),
        rel::RelType::Project(project) => project.common.as_ref(),
        rel::RelType::Aggregate(aggregate) => aggregate.common.as_ref(),
        rel::RelType::Join(join) => join.common.as_ref(),
        _ => None,
    }
}

/// Output remapping and extension enhancements reshape a relation's output
/// and are rejected. Direct emission and hints are fine.
pub fn check_common(common: Option<&RelCommon>) -> Result<(), ConvertError> {
    let Some(common) = common else {
        return Ok(());
    };
    if let Some(rel_common::EmitKind::Emit(emit)) = &common.emit_kind {
        return Err(ConvertError::UnsupportedRelation(format!(
            "relation with emit mapping {:?}",
            emit.output_mapping
        )));
    }
    if common
        .advanced_extension
        .as_ref()
        .is_some_and(|extension| extension.enhancement.is_some())
    {
        return Err(ConvertError::UnsupportedRelation(
            "relation with extension enhancement".to_string(),
        ));
    }
    Ok(())
}

/// Grouping the same column twice would give the aggregation two outputs
/// with one name.
pub fn check_distinct_groupings(groupings: &[&Expression]) -> Result<(), ConvertError> {
    let mut seen = Vec::with_capacity(groupings.len());
    for expr in groupings {
        let Some(offset) = expression_offset(expr) else {
            continue;
        };
        let offset = offset?;
        if seen.contains(&offset) {
            return Err(ConvertError::UnsupportedAggregate(format!(
                "column {} grouped more than once",
                offset
            )));
        }
        seen.push(offset);
    }
    Ok(())
}

/// Decompose a condition into its AND-ed leaves, left to right. OR and NOT
/// cannot be pushed into a scan and are rejected.
pub fn flatten_conditions<'e>(
    catalog: &FunctionCatalog,
    condition: &'e Expression,
) -> Result<Vec<&'e ScalarFunction>, ConvertError> {
    let mut conjuncts = Vec::new();
    collect_conjuncts(catalog, condition, &mut conjuncts)?;
    Ok(conjuncts)
}

fn collect_conjuncts<'e>(
    catalog: &FunctionCatalog,
    condition: &'e Expression,
    conjuncts: &mut Vec<&'e ScalarFunction>,
) -> Result<(), ConvertError> {
    let function = match &condition.rex_type {
        Some(RexType::ScalarFunction(function)) => function,
        _ => {
            return Err(ConvertError::UnsupportedFilter(
                "condition is not a function call".to_string(),
            ))
        }
    };

    match catalog.lookup(function.function_reference)? {
        "and" => {
            for arg in argument_values(&function.arguments)? {
                collect_conjuncts(catalog, arg, conjuncts)?;
            }
            Ok(())
        }
        connective @ ("or" | "not") => Err(ConvertError::UnsupportedFilter(format!(
            "'{}' in pushed-down filter",
            connective
        ))),
        _ => {
            conjuncts.push(function);
            Ok(())
        }
    }
}

/// Turn one pushed-down conjunct into a filter on a base column.
pub fn to_column_filter(
    catalog: &FunctionCatalog,
    conjunct: &ScalarFunction,
    base: &RowType,
) -> Result<(String, ColumnFilter), ConvertError> {
    let name = catalog.lookup(conjunct.function_reference)?;
    let args = argument_values(&conjunct.arguments)?;

    let column = |expr: &Expression| -> Option<Result<String, ConvertError>> {
        expression_offset(expr).map(|offset| {
            let offset = offset?;
            base.field(offset)
                .map(|field| field.name.clone())
                .ok_or(ConvertError::FieldOutOfRange {
                    offset: offset as i64,
                    width: base.len(),
                })
        })
    };
    let constant = |expr: &Expression| match &expr.rex_type {
        Some(RexType::Literal(literal)) => Some(literal_value(literal)),
        _ => None,
    };

    match name {
        "is_not_null" => match args.as_slice() {
            [arg] => match column(*arg) {
                Some(column) => Ok((column?, ColumnFilter::IsNotNull)),
                None => Err(ConvertError::UnsupportedFilter(
                    "is_not_null over a non-column".to_string(),
                )),
            },
            _ => Err(ConvertError::ArityMismatch {
                function: name.to_string(),
                expected: 1,
                actual: args.len(),
            }),
        },
        "lt" | "lte" | "gt" | "gte" => {
            let op = match name {
                "lt" => ComparisonOp::Lt,
                "lte" => ComparisonOp::Lte,
                "gt" => ComparisonOp::Gt,
                _ => ComparisonOp::Gte,
            };
            let [lhs, rhs] = args.as_slice() else {
                return Err(ConvertError::ArityMismatch {
                    function: name.to_string(),
                    expected: 2,
                    actual: args.len(),
                });
            };
            match (column(*lhs), constant(*rhs), column(*rhs), constant(*lhs)) {
                (Some(column), Some(value), _, _) => Ok((
                    column?,
                    ColumnFilter::Compare {
                        op,
                        value: value?,
                    },
                )),
                (_, _, Some(column), Some(value)) => Ok((
                    column?,
                    ColumnFilter::Compare {
                        op: op.mirrored(),
                        value: value?,
                    },
                )),
                _ => Err(ConvertError::UnsupportedFilter(format!(
                    "'{}' must compare a column with a literal",
                    name
                ))),
            }
        }
        other => Err(ConvertError::UnsupportedFilter(format!(
            "'{}' cannot be pushed into a scan",
            other
        ))),
    }
}

/// Equi-join key pairs as (left offset, right offset) from an AND of `eq`
/// comparisons between columns of opposite sides.
pub fn extract_join_keys(
    catalog: &FunctionCatalog,
    condition: &Expression,
    scope: &InputSchemaScope,
) -> Result<Vec<(usize, usize)>, ConvertError> {
    let left_width = scope.schema(0).map(RowType::len).unwrap_or(0);
    let width = scope.width();
    let mut keys = Vec::new();
    collect_join_keys(catalog, condition, left_width, width, &mut keys)?;
    Ok(keys)
}

fn collect_join_keys(
    catalog: &FunctionCatalog,
    condition: &Expression,
    left_width: usize,
    width: usize,
    keys: &mut Vec<(usize, usize)>,
) -> Result<(), ConvertError> {
    let function = match &condition.rex_type {
        Some(RexType::ScalarFunction(function)) => function,
        _ => {
            return Err(ConvertError::UnsupportedJoinCondition(
                "condition is not a function call".to_string(),
            ))
        }
    };
    let name = catalog.lookup(function.function_reference)?;
    let args = argument_values(&function.arguments)?;

    match name {
        "and" => {
            for arg in args {
                collect_join_keys(catalog, arg, left_width, width, keys)?;
            }
            Ok(())
        }
        "eq" => {
            let [lhs, rhs] = args.as_slice() else {
                return Err(ConvertError::ArityMismatch {
                    function: name.to_string(),
                    expected: 2,
                    actual: args.len(),
                });
            };
            let (Some(lhs), Some(rhs)) = (expression_offset(*lhs), expression_offset(*rhs)) else {
                return Err(ConvertError::UnsupportedJoinCondition(
                    "eq must compare two columns".to_string(),
                ));
            };
            let (lhs, rhs) = (lhs?, rhs?);
            for offset in [lhs, rhs] {
                if offset >= width {
                    return Err(ConvertError::FieldOutOfRange {
                        offset: offset as i64,
                        width,
                    });
                }
            }
            match (lhs < left_width, rhs < left_width) {
                (true, false) => keys.push((lhs, rhs)),
                (false, true) => keys.push((rhs, lhs)),
                _ => {
                    return Err(ConvertError::UnsupportedJoinCondition(
                        "eq must compare a left column with a right column".to_string(),
                    ))
                }
            }
            Ok(())
        }
        other => Err(ConvertError::UnsupportedJoinCondition(format!(
            "'{}' in join condition",
            other
        ))),
    }
}

pub fn join_type(wire: i32) -> Result<JoinType, ConvertError> {
    match wire {
        x if x == join_rel::JoinType::Inner as i32 => Ok(JoinType::Inner),
        x if x == join_rel::JoinType::Left as i32 => Ok(JoinType::Left),
        x if x == join_rel::JoinType::Right as i32 => Ok(JoinType::Right),
        x if x == join_rel::JoinType::Outer as i32 => Ok(JoinType::Full),
        x if x == join_rel::JoinType::LeftSemi as i32 => Ok(JoinType::LeftSemiFilter),
        x if x == join_rel::JoinType::LeftAnti as i32 => Ok(JoinType::Anti),
        other => Err(ConvertError::UnsupportedRelation(format!(
            "join type {}",
            join_rel::JoinType::try_from(other)
                .map(|t| t.as_str_name().to_string())
                .unwrap_or_else(|_| other.to_string())
        ))),
    }
}

/// Step shared by every measure. A plan without measures is a plain
/// grouping and runs as a single step.
pub fn aggregation_step(
    measures: &[aggregate_rel::Measure],
) -> Result<AggregationStep, ConvertError> {
    let mut step = None;
    for measure in measures {
        let function = measure
            .measure
            .as_ref()
            .ok_or(ConvertError::MissingField("Measure.measure"))?;
        let phase = match function.phase {
            x if x == AggregationPhase::InitialToIntermediate as i32 => AggregationStep::Partial,
            x if x == AggregationPhase::IntermediateToIntermediate as i32 => {
                AggregationStep::Intermediate
            }
            x if x == AggregationPhase::IntermediateToResult as i32 => AggregationStep::Final,
            x if x == AggregationPhase::InitialToResult as i32 => AggregationStep::Single,
            _ => {
                return Err(ConvertError::UnsupportedAggregate(
                    "unspecified aggregation phase".to_string(),
                ))
            }
        };
        match step {
            Some(existing) if existing != phase => {
                return Err(ConvertError::UnsupportedAggregate(
                    "measures with different aggregation phases".to_string(),
                ))
            }
            _ => step = Some(phase),
        }
    }
    Ok(step.unwrap_or(AggregationStep::Single))
}

/// Grouping expressions of the single grouping set. Grouping sets are not
/// supported.
#[allow(deprecated)]
pub fn grouping_expressions(aggregate: &AggregateRel) -> Result<Vec<&Expression>, ConvertError> {
    match aggregate.groupings.as_slice() {
        [] => Ok(vec![]),
        [grouping] if !grouping.expression_references.is_empty() => grouping
            .expression_references
            .iter()
            .map(|reference| {
                aggregate
                    .grouping_expressions
                    .get(*reference as usize)
                    .ok_or(ConvertError::FieldOutOfRange {
                        offset: i64::from(*reference),
                        width: aggregate.grouping_expressions.len(),
                    })
            })
            .collect(),
        [grouping] => Ok(grouping.grouping_expressions.iter().collect()),
        _ => Err(ConvertError::UnsupportedAggregate(
            "multiple grouping sets".to_string(),
        )),
    }
}

pub fn measure_functions(aggregate: &AggregateRel) -> Result<Vec<&AggregateFunction>, ConvertError> {
    aggregate
        .measures
        .iter()
        .map(|measure| {
            measure
                .measure
                .as_ref()
                .ok_or(ConvertError::MissingField("Measure.measure"))
        })
        .collect()
}

/// Fields a final aggregate's state is packed into, if it needs packing.
pub fn row_packed_fields(name: &str) -> Option<&'static [&'static str]> {
    ROW_PACKED_AGGREGATES
        .iter()
        .find(|(function, _)| *function == name)
        .map(|(_, fields)| *fields)
}

/// A final aggregation needs its inputs packed when any measure's
/// intermediate state spans several columns.
pub fn needs_row_construct(
    catalog: &FunctionCatalog,
    step: AggregationStep,
    functions: &[&AggregateFunction],
) -> Result<bool, ConvertError> {
    if step != AggregationStep::Final {
        return Ok(false);
    }
    for function in functions {
        if row_packed_fields(catalog.lookup(function.function_reference)?).is_some() {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn is_distinct(function: &AggregateFunction) -> Result<bool, ConvertError> {
    match function.invocation {
        x if x == AggregationInvocation::Distinct as i32 => Ok(true),
        x if x == AggregationInvocation::All as i32
            || x == AggregationInvocation::Unspecified as i32 =>
        {
            Ok(false)
        }
        other => Err(ConvertError::UnsupportedAggregate(format!(
            "invocation {}",
            other
        ))),
    }
}

pub fn sort_order(sort: &SortField) -> Result<SortOrder, ConvertError> {
    use sort_field::SortDirection;

    match &sort.sort_kind {
        Some(sort_field::SortKind::Direction(direction)) => match *direction {
            x if x == SortDirection::AscNullsFirst as i32 => Ok(SortOrder::ASC_NULLS_FIRST),
            x if x == SortDirection::AscNullsLast as i32 => Ok(SortOrder::ASC_NULLS_LAST),
            x if x == SortDirection::DescNullsFirst as i32 => Ok(SortOrder::DESC_NULLS_FIRST),
            x if x == SortDirection::DescNullsLast as i32 => Ok(SortOrder::DESC_NULLS_LAST),
            other => Err(ConvertError::UnsupportedAggregate(format!(
                "sort direction {}",
                other
            ))),
        },
        Some(other) => Err(ConvertError::UnsupportedAggregate(variant_name(other))),
        None => Err(ConvertError::MissingField("SortField.sort_kind")),
    }
}

pub fn named_table(read: &ReadRel) -> Result<String, ConvertError> {
    match &read.read_type {
        Some(read_rel::ReadType::NamedTable(table)) if !table.names.is_empty() => {
            Ok(table.names.join("."))
        }
        Some(read_rel::ReadType::NamedTable(_)) => Err(ConvertError::MissingField("NamedTable.names")),
        Some(other) => Err(ConvertError::UnsupportedRelation(format!(
            "ReadRel over {}",
            variant_name(other)
        ))),
        None => Err(ConvertError::MissingField("ReadRel.read_type")),
    }
}

/// Column names and types of a read's base schema.
pub fn base_schema(read: &ReadRel) -> Result<RowType, ConvertError> {
    let schema = read
        .base_schema
        .as_ref()
        .ok_or(ConvertError::MissingField("ReadRel.base_schema"))?;
    let types = schema
        .r#struct
        .as_ref()
        .map(|s| s.types.as_slice())
        .unwrap_or_default();
    if schema.names.len() != types.len() {
        return Err(ConvertError::UnsupportedType(
            "base schema with nested struct names".to_string(),
        ));
    }

    let fields = schema
        .names
        .iter()
        .zip(types)
        .map(|(name, ty)| Ok((name.clone(), to_internal_type(ty)?)))
        .collect::<Result<Vec<_>, ConvertError>>()?;
    Ok(RowType::from_pairs(fields))
}
