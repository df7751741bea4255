//! Plan feasibility check
//!
//! Decides, without building anything, whether a plan is inside the subset
//! the converter supports. The check is deliberately narrower than the
//! converter: whatever passes here converts without error.

use crate::catalog::FunctionCatalog;
use crate::expr::{argument_values, direct_offset, literal_value};
use crate::rel::{
    aggregation_step, base_schema, check_common, check_distinct_groupings, flatten_conditions,
    grouping_expressions, is_distinct, measure_functions, named_table, needs_row_construct,
    rel_common, row_packed_fields, sort_order, to_column_filter,
};
use crate::types::is_supported_scalar;
use crate::{variant_name, ConvertError};
use substrait::proto::expression::RexType;
use substrait::proto::{
    plan_rel, rel, AggregateRel, Expression, FilterRel, Plan, PlanRel, ProjectRel, ReadRel, Rel,
};

/// True when every relation of `plan` can be converted.
pub fn is_supported(plan: &Plan) -> bool {
    match FunctionCatalog::from_plan(plan) {
        Ok(catalog) => PlanValidator::new(catalog).validate(plan),
        Err(err) => {
            tracing::debug!(error = %err, "plan rejected");
            false
        }
    }
}

pub struct PlanValidator {
    catalog: FunctionCatalog,
}

impl PlanValidator {
    pub fn new(catalog: FunctionCatalog) -> Self {
        Self { catalog }
    }

    pub fn validate(&self, plan: &Plan) -> bool {
        match self.check_plan(plan) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(error = %err, "plan rejected");
                false
            }
        }
    }

    /// Like [`validate`](Self::validate) but reports the first reason for
    /// rejection.
    pub fn check_plan(&self, plan: &Plan) -> Result<(), ConvertError> {
        if plan.relations.is_empty() {
            return Err(ConvertError::EmptyPlan);
        }
        for relation in &plan.relations {
            self.check_plan_rel(relation)?;
        }
        Ok(())
    }

    fn check_plan_rel(&self, relation: &PlanRel) -> Result<(), ConvertError> {
        let rel = match &relation.rel_type {
            Some(plan_rel::RelType::Root(root)) => root
                .input
                .as_ref()
                .ok_or(ConvertError::MissingField("RelRoot.input"))?,
            Some(plan_rel::RelType::Rel(rel)) => rel,
            None => return Err(ConvertError::MissingField("PlanRel.rel_type")),
        };
        self.check_rel(rel).map(|_| ())
    }

    /// Validate `rel` and return the number of columns it produces.
    pub fn check_rel(&self, rel: &Rel) -> Result<usize, ConvertError> {
        let rel_type = rel
            .rel_type
            .as_ref()
            .ok_or(ConvertError::MissingField("Rel.rel_type"))?;
        check_common(rel_common(rel_type))?;

        match rel_type {
            rel::RelType::Read(read) => self.check_read(read),
            rel::RelType::Filter(filter) => self.check_filter(filter),
            rel::RelType::Project(project) => self.check_project(project),
            rel::RelType::Aggregate(aggregate) => self.check_aggregate(aggregate),
            other => Err(ConvertError::UnsupportedRelation(variant_name(other))),
        }
    }

    fn check_read(&self, read: &ReadRel) -> Result<usize, ConvertError> {
        named_table(read)?;
        if read.projection.is_some() {
            return Err(ConvertError::UnsupportedRelation(
                "ReadRel with projection".to_string(),
            ));
        }

        let wire_types = read
            .base_schema
            .as_ref()
            .and_then(|schema| schema.r#struct.as_ref())
            .map(|s| s.types.as_slice())
            .unwrap_or_default();
        if let Some(ty) = wire_types.iter().find(|ty| !is_supported_scalar(ty)) {
            return Err(ConvertError::UnsupportedType(type_name(ty)));
        }
        let base = base_schema(read)?;

        if let Some(condition) = &read.filter {
            for conjunct in flatten_conditions(&self.catalog, condition)? {
                to_column_filter(&self.catalog, conjunct, &base)?;
            }
        }
        Ok(base.len())
    }

    fn check_filter(&self, filter: &FilterRel) -> Result<usize, ConvertError> {
        let input = filter
            .input
            .as_deref()
            .ok_or(ConvertError::MissingField("FilterRel.input"))?;
        let condition = filter
            .condition
            .as_deref()
            .ok_or(ConvertError::MissingField("FilterRel.condition"))?;

        let width = self.check_rel(input)?;
        self.check_expression(condition, width)?;
        Ok(width)
    }

    fn check_project(&self, project: &ProjectRel) -> Result<usize, ConvertError> {
        let input = project
            .input
            .as_deref()
            .ok_or(ConvertError::MissingField("ProjectRel.input"))?;

        let width = self.check_rel(input)?;
        for expr in &project.expressions {
            self.check_expression(expr, width)?;
        }
        Ok(project.expressions.len())
    }

    fn check_aggregate(&self, aggregate: &AggregateRel) -> Result<usize, ConvertError> {
        let input = aggregate
            .input
            .as_deref()
            .ok_or(ConvertError::MissingField("AggregateRel.input"))?;

        let width = self.check_rel(input)?;
        let step = aggregation_step(&aggregate.measures)?;
        let groupings = grouping_expressions(aggregate)?;
        for expr in &groupings {
            self.check_column(expr, width, "grouping key")?;
        }
        check_distinct_groupings(&groupings)?;

        let functions = measure_functions(aggregate)?;
        let packed = needs_row_construct(&self.catalog, step, &functions)?;

        for (measure, function) in aggregate.measures.iter().zip(&functions) {
            let name = self.catalog.lookup(function.function_reference)?;
            self.check_output_type(function.output_type.as_ref(), "AggregateFunction.output_type")?;

            let args = argument_values(&function.arguments)?;
            for arg in &args {
                self.check_expression(arg, width)?;
            }
            let distinct = is_distinct(function)?;

            if packed {
                if measure.filter.is_some() || !function.sorts.is_empty() || distinct {
                    return Err(ConvertError::UnsupportedAggregate(format!(
                        "final {} with filter, ordering or DISTINCT",
                        name
                    )));
                }
                let expected = row_packed_fields(name).map_or(1, |fields| fields.len());
                if args.len() != expected {
                    return Err(ConvertError::ArityMismatch {
                        function: name.to_string(),
                        expected,
                        actual: args.len(),
                    });
                }
                continue;
            }

            if let Some(filter) = &measure.filter {
                self.check_column(filter, width, "aggregate filter")?;
            }
            for sort in &function.sorts {
                let expr = sort
                    .expr
                    .as_ref()
                    .ok_or(ConvertError::MissingField("SortField.expr"))?;
                self.check_column(expr, width, "sorting key")?;
                sort_order(sort)?;
            }
        }

        Ok(groupings.len() + aggregate.measures.len())
    }

    fn check_column(&self, expr: &Expression, width: usize, context: &str) -> Result<(), ConvertError> {
        match &expr.rex_type {
            Some(RexType::Selection(field)) => check_offset(direct_offset(field)?, width),
            _ => Err(ConvertError::UnsupportedAggregate(format!(
                "{} must be a column reference",
                context
            ))),
        }
    }

    fn check_output_type(
        &self,
        output_type: Option<&substrait::proto::Type>,
        field: &'static str,
    ) -> Result<(), ConvertError> {
        match output_type {
            Some(ty) if is_supported_scalar(ty) => Ok(()),
            Some(ty) => Err(ConvertError::UnsupportedType(type_name(ty))),
            None => Err(ConvertError::MissingField(field)),
        }
    }

    /// Validate an expression evaluated over `width` input columns.
    pub fn check_expression(&self, expr: &Expression, width: usize) -> Result<(), ConvertError> {
        let rex_type = expr
            .rex_type
            .as_ref()
            .ok_or(ConvertError::MissingField("Expression.rex_type"))?;

        match rex_type {
            RexType::Literal(literal) => literal_value(literal).map(|_| ()),
            RexType::Selection(field) => check_offset(direct_offset(field)?, width),
            RexType::ScalarFunction(function) => {
                let name = self.catalog.lookup(function.function_reference)?;
                let args = argument_values(&function.arguments)?;
                if matches!(name, "cast" | "alias") && args.len() != 1 {
                    return Err(ConvertError::ArityMismatch {
                        function: name.to_string(),
                        expected: 1,
                        actual: args.len(),
                    });
                }
                self.check_output_type(function.output_type.as_ref(), "ScalarFunction.output_type")?;
                for arg in args {
                    self.check_expression(arg, width)?;
                }
                Ok(())
            }
            other => Err(ConvertError::UnsupportedExpression(variant_name(other))),
        }
    }
}

fn type_name(ty: &substrait::proto::Type) -> String {
    ty.kind.as_ref().map(variant_name).unwrap_or_default()
}

fn check_offset(offset: usize, width: usize) -> Result<(), ConvertError> {
    if offset >= width {
        return Err(ConvertError::FieldOutOfRange {
            offset: offset as i64,
            width,
        });
    }
    Ok(())
}
