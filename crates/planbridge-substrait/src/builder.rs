//! Helpers for assembling Substrait plans by hand

use substrait::proto;
use substrait::proto::expression::field_reference::{ReferenceType, RootReference, RootType};
use substrait::proto::expression::literal::LiteralType;
use substrait::proto::expression::reference_segment::{self, StructField};
use substrait::proto::expression::{FieldReference, Literal, ReferenceSegment, RexType, ScalarFunction};
use substrait::proto::extensions::simple_extension_declaration::{ExtensionFunction, MappingType};
use substrait::proto::extensions::SimpleExtensionDeclaration;
use substrait::proto::r#type::{self, Kind};
use substrait::proto::{
    aggregate_rel, function_argument, join_rel, plan_rel, read_rel, rel, rel_common, sort_field,
    AggregateFunction, AggregateRel, AggregationPhase, Expression, FilterRel, FunctionArgument,
    JoinRel, NamedStruct, Plan, PlanRel, ProjectRel, ReadRel, Rel, RelCommon, RelRoot, SortField,
};

/// Accumulates function declarations and root relations.
#[derive(Debug, Default)]
pub struct PlanBuilder {
    plan: Plan,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn function(mut self, anchor: u32, signature: &str) -> Self {
        self.plan.extensions.push(SimpleExtensionDeclaration {
            mapping_type: Some(MappingType::ExtensionFunction(ExtensionFunction {
                function_anchor: anchor,
                name: signature.to_string(),
                ..Default::default()
            })),
        });
        self
    }

    pub fn root(mut self, input: Rel, names: &[&str]) -> Self {
        self.plan.relations.push(PlanRel {
            rel_type: Some(plan_rel::RelType::Root(RelRoot {
                input: Some(input),
                names: names.iter().map(|n| n.to_string()).collect(),
            })),
        });
        self
    }

    pub fn rel(mut self, input: Rel) -> Self {
        self.plan.relations.push(PlanRel {
            rel_type: Some(plan_rel::RelType::Rel(input)),
        });
        self
    }

    pub fn build(self) -> Plan {
        self.plan
    }
}

fn kind(kind: Kind) -> proto::Type {
    proto::Type { kind: Some(kind) }
}

pub fn bool_type() -> proto::Type {
    kind(Kind::Bool(r#type::Boolean::default()))
}

pub fn i32_type() -> proto::Type {
    kind(Kind::I32(r#type::I32::default()))
}

pub fn i64_type() -> proto::Type {
    kind(Kind::I64(r#type::I64::default()))
}

pub fn fp64_type() -> proto::Type {
    kind(Kind::Fp64(r#type::Fp64::default()))
}

pub fn string_type() -> proto::Type {
    kind(Kind::String(r#type::String::default()))
}

pub fn date_type() -> proto::Type {
    kind(Kind::Date(r#type::Date::default()))
}

pub fn decimal_type(precision: i32, scale: i32) -> proto::Type {
    kind(Kind::Decimal(r#type::Decimal {
        precision,
        scale,
        ..Default::default()
    }))
}

pub fn struct_type(types: Vec<proto::Type>) -> proto::Type {
    kind(Kind::Struct(r#type::Struct {
        types,
        ..Default::default()
    }))
}

fn rex(rex_type: RexType) -> Expression {
    Expression {
        rex_type: Some(rex_type),
    }
}

fn literal(literal_type: LiteralType) -> Expression {
    rex(RexType::Literal(Literal {
        literal_type: Some(literal_type),
        ..Default::default()
    }))
}

pub fn lit_i32(value: i32) -> Expression {
    literal(LiteralType::I32(value))
}

pub fn lit_f64(value: f64) -> Expression {
    literal(LiteralType::Fp64(value))
}

pub fn lit_bool(value: bool) -> Expression {
    literal(LiteralType::Boolean(value))
}

pub fn lit_string(value: &str) -> Expression {
    literal(LiteralType::String(value.to_string()))
}

/// Direct reference to the `offset`-th column of the input.
pub fn field(offset: i32) -> Expression {
    rex(RexType::Selection(Box::new(FieldReference {
        reference_type: Some(ReferenceType::DirectReference(ReferenceSegment {
            reference_type: Some(reference_segment::ReferenceType::StructField(Box::new(
                StructField {
                    field: offset,
                    child: None,
                },
            ))),
        })),
        root_type: Some(RootType::RootReference(RootReference {})),
    })))
}

pub fn value_args(args: Vec<Expression>) -> Vec<FunctionArgument> {
    args.into_iter()
        .map(|arg| FunctionArgument {
            arg_type: Some(function_argument::ArgType::Value(arg)),
        })
        .collect()
}

pub fn call(anchor: u32, args: Vec<Expression>, output_type: proto::Type) -> Expression {
    rex(RexType::ScalarFunction(ScalarFunction {
        function_reference: anchor,
        arguments: value_args(args),
        output_type: Some(output_type),
        ..Default::default()
    }))
}

pub fn read(table: &str, columns: &[(&str, proto::Type)], filter: Option<Expression>) -> Rel {
    Rel {
        rel_type: Some(rel::RelType::Read(Box::new(ReadRel {
            base_schema: Some(NamedStruct {
                names: columns.iter().map(|(name, _)| name.to_string()).collect(),
                r#struct: Some(r#type::Struct {
                    types: columns.iter().map(|(_, ty)| ty.clone()).collect(),
                    ..Default::default()
                }),
            }),
            filter: filter.map(Box::new),
            read_type: Some(read_rel::ReadType::NamedTable(read_rel::NamedTable {
                names: vec![table.to_string()],
                ..Default::default()
            })),
            ..Default::default()
        }))),
    }
}

pub fn filter(input: Rel, condition: Expression) -> Rel {
    Rel {
        rel_type: Some(rel::RelType::Filter(Box::new(FilterRel {
            input: Some(Box::new(input)),
            condition: Some(Box::new(condition)),
            ..Default::default()
        }))),
    }
}

pub fn project(input: Rel, expressions: Vec<Expression>) -> Rel {
    Rel {
        rel_type: Some(rel::RelType::Project(Box::new(ProjectRel {
            input: Some(Box::new(input)),
            expressions,
            ..Default::default()
        }))),
    }
}

pub fn measure(
    anchor: u32,
    args: Vec<Expression>,
    output_type: Option<proto::Type>,
    phase: AggregationPhase,
) -> aggregate_rel::Measure {
    aggregate_rel::Measure {
        measure: Some(AggregateFunction {
            function_reference: anchor,
            arguments: value_args(args),
            output_type,
            phase: phase as i32,
            ..Default::default()
        }),
        filter: None,
    }
}

/// Sort field over a column with an explicit direction.
pub fn sort(offset: i32, direction: sort_field::SortDirection) -> SortField {
    SortField {
        expr: Some(field(offset)),
        sort_kind: Some(sort_field::SortKind::Direction(direction as i32)),
    }
}

/// Aggregate grouped by a single grouping set over `grouping`.
pub fn aggregate(
    input: Rel,
    grouping: Vec<Expression>,
    measures: Vec<aggregate_rel::Measure>,
) -> Rel {
    let groupings = if grouping.is_empty() {
        vec![]
    } else {
        vec![aggregate_rel::Grouping {
            expression_references: (0..grouping.len() as u32).collect(),
            ..Default::default()
        }]
    };
    Rel {
        rel_type: Some(rel::RelType::Aggregate(Box::new(AggregateRel {
            input: Some(Box::new(input)),
            groupings,
            measures,
            grouping_expressions: grouping,
            ..Default::default()
        }))),
    }
}

pub fn join(left: Rel, right: Rel, condition: Expression, join_type: join_rel::JoinType) -> Rel {
    Rel {
        rel_type: Some(rel::RelType::Join(Box::new(JoinRel {
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
            expression: Some(Box::new(condition)),
            r#type: join_type as i32,
            ..Default::default()
        }))),
    }
}

/// Common properties remapping a relation's output to `output_mapping`.
pub fn emit(output_mapping: Vec<i32>) -> RelCommon {
    RelCommon {
        emit_kind: Some(rel_common::EmitKind::Emit(rel_common::Emit { output_mapping })),
        ..Default::default()
    }
}

/// Common properties that keep a relation's output as is.
pub fn direct() -> RelCommon {
    RelCommon {
        emit_kind: Some(rel_common::EmitKind::Direct(rel_common::Direct {})),
        ..Default::default()
    }
}

/// Attach `common` to a read, filter, project, aggregate or join.
pub fn with_common(mut input: Rel, common: RelCommon) -> Rel {
    match input.rel_type.as_mut() {
        Some(rel::RelType::Read(read)) => read.common = Some(common),
        Some(rel::RelType::Filter(filter)) => filter.common = Some(common),
        Some(rel::RelType::Project(project)) => project.common = Some(common),
        Some(rel::RelType::Aggregate(aggregate)) => aggregate.common = Some(common),
        Some(rel::RelType::Join(join)) => join.common = Some(common),
        _ => {}
    }
    input
}
