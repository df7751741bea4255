//! Plan → SQL text for a reference engine
//!
//! Emission is best effort: any construct the dialect cannot express makes
//! the whole translation return `None`. Leaves read from a staging table
//! named `tmp` that is populated before the SQL runs.

use crate::dialect::{get_dialect, DialectKind, SqlDialect};
use crate::SqlError;
use planbridge_plan::{
    Aggregate, AggregationStep, BoundType, CallExpr, ColumnFilter, ComparisonOp, FieldAccess,
    Frame, PlanNode, RowType, SortOrder, Type, TypedExpr, Value, WindowFunction, WindowType,
};

/// Name of the table leaves are staged into.
pub const STAGING_TABLE: &str = "tmp";

pub struct SqlEmitter {
    dialect: Box<dyn SqlDialect>,
}

impl SqlEmitter {
    pub fn new(dialect: Box<dyn SqlDialect>) -> Self {
        Self { dialect }
    }

    pub fn for_kind(kind: DialectKind) -> Self {
        Self::new(get_dialect(kind))
    }

    pub fn dialect(&self) -> &dyn SqlDialect {
        self.dialect.as_ref()
    }

    /// SQL computing `plan`, or `None` when the dialect cannot express it.
    pub fn to_sql(&self, plan: &PlanNode) -> Option<String> {
        let sql = self.node_sql(plan);
        if sql.is_none() {
            tracing::debug!(
                node = plan.kind_name(),
                id = %plan.id(),
                dialect = %self.dialect.kind(),
                "plan has no SQL translation"
            );
        }
        sql
    }

    fn node_sql(&self, plan: &PlanNode) -> Option<String> {
        match plan {
            PlanNode::Values { .. } | PlanNode::TableScan { .. } => self.leaf_sql(plan),
            PlanNode::Project {
                names,
                projections,
                source,
                ..
            } => self.project_sql(names, projections, source),
            PlanNode::Filter {
                predicate, source, ..
            } => self.filter_sql(predicate, source),
            PlanNode::Aggregation {
                step,
                grouping_keys,
                aggregate_names,
                aggregates,
                source,
                ..
            } => self.aggregation_sql(*step, grouping_keys, aggregate_names, aggregates, source),
            PlanNode::Window {
                partition_keys,
                sorting_keys,
                sorting_orders,
                window_names,
                window_functions,
                source,
                ..
            } => self.window_sql(
                partition_keys,
                sorting_keys,
                sorting_orders,
                window_names,
                window_functions,
                source,
            ),
            PlanNode::RowNumber {
                partition_keys,
                row_number_name,
                source,
                ..
            } => self.row_number_sql(partition_keys, row_number_name, source),
            PlanNode::Join { .. } => None,
        }
    }

    fn supports_row(&self, row: &RowType) -> bool {
        self.dialect.is_supported_type(&Type::Row(row.clone()))
    }

    /// `SELECT <columns> FROM tmp`, renaming staged columns to the leaf's
    /// output names and applying pushed-down filters.
    fn leaf_sql(&self, leaf: &PlanNode) -> Option<String> {
        let output = leaf.output_type();
        if !self.supports_row(&output) {
            return None;
        }

        let mut sql = String::from("SELECT ");
        match leaf {
            PlanNode::TableScan {
                columns, filters, ..
            } => {
                let selected = columns
                    .iter()
                    .zip(output.names())
                    .map(|(column, name)| {
                        if column == name {
                            column.clone()
                        } else {
                            format!("{} as {}", column, name)
                        }
                    })
                    .collect::<Vec<_>>();
                sql.push_str(&selected.join(", "));
                sql.push_str(" FROM ");
                sql.push_str(STAGING_TABLE);

                let conditions = filters
                    .iter()
                    .flat_map(|(column, filters)| {
                        filters.iter().map(move |filter| column_filter_sql(column, filter))
                    })
                    .collect::<Option<Vec<_>>>()?;
                if !conditions.is_empty() {
                    sql.push_str(" WHERE ");
                    sql.push_str(&conditions.join(" AND "));
                }
            }
            _ => {
                sql.push_str(&output.names().collect::<Vec<_>>().join(", "));
                sql.push_str(" FROM ");
                sql.push_str(STAGING_TABLE);
            }
        }
        Some(sql)
    }

    /// Relation to select from: the staging table itself when the source is
    /// a leaf that reads it unchanged, a subquery otherwise.
    fn from_sql(&self, source: &PlanNode) -> Option<String> {
        let reads_staging_as_is = match source {
            PlanNode::Values { .. } => true,
            PlanNode::TableScan {
                columns,
                output_type,
                filters,
                ..
            } => filters.is_empty() && columns.iter().map(String::as_str).eq(output_type.names()),
            _ => false,
        };
        if reads_staging_as_is {
            return Some(STAGING_TABLE.to_string());
        }
        Some(format!("({})", self.node_sql(source)?))
    }

    fn project_sql(
        &self,
        names: &[String],
        projections: &[TypedExpr],
        source: &PlanNode,
    ) -> Option<String> {
        let source_sql = self.node_sql(source)?;
        let columns = names
            .iter()
            .zip(projections)
            .map(|(name, projection)| Some(format!("{} as {}", self.expr_sql(projection)?, name)))
            .collect::<Option<Vec<_>>>()?;
        Some(format!("SELECT {} FROM ({})", columns.join(", "), source_sql))
    }

    fn filter_sql(&self, predicate: &TypedExpr, source: &PlanNode) -> Option<String> {
        let source_sql = self.node_sql(source)?;
        Some(format!(
            "SELECT * FROM ({}) WHERE {}",
            source_sql,
            self.expr_sql(predicate)?
        ))
    }

    fn aggregation_sql(
        &self,
        step: AggregationStep,
        grouping_keys: &[FieldAccess],
        aggregate_names: &[String],
        aggregates: &[Aggregate],
        source: &PlanNode,
    ) -> Option<String> {
        // Partial and final states have no SQL equivalent.
        if step != AggregationStep::Single {
            return None;
        }
        if !self.supports_row(&source.output_type())
            || !self.dialect.accepts_aggregation(grouping_keys, aggregates)
        {
            return None;
        }

        let keys: Vec<&str> = grouping_keys.iter().map(|key| key.name.as_str()).collect();
        let mut columns: Vec<String> = keys.iter().map(|key| key.to_string()).collect();
        for (aggregate, name) in aggregates.iter().zip(aggregate_names) {
            let mut call = self.aggregate_call_sql(aggregate)?;
            if let Some(mask) = &aggregate.mask {
                call.push_str(&format!(" filter (where {})", mask.name));
            }
            columns.push(format!("{} as {}", call, name));
        }

        let mut sql = format!("SELECT {} FROM {}", columns.join(", "), self.from_sql(source)?);
        if !keys.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&keys.join(", "));
        }
        Some(sql)
    }

    fn aggregate_call_sql(&self, aggregate: &Aggregate) -> Option<String> {
        let mut sql = format!("{}(", aggregate.call.name);
        if aggregate.distinct {
            sql.push_str("distinct ");
        }
        sql.push_str(&self.call_inputs_sql(&aggregate.call.inputs)?);

        if !aggregate.sorting_keys.is_empty() {
            if !self.dialect.supports_ordered_aggregates() {
                return None;
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_by_sql(&aggregate.sorting_keys, &aggregate.sorting_orders));
        }
        sql.push(')');
        Some(sql)
    }

    fn window_sql(
        &self,
        partition_keys: &[FieldAccess],
        sorting_keys: &[FieldAccess],
        sorting_orders: &[SortOrder],
        window_names: &[String],
        window_functions: &[WindowFunction],
        source: &PlanNode,
    ) -> Option<String> {
        let input = source.output_type();
        if !self.supports_row(&input) {
            return None;
        }

        let mut over = Vec::new();
        if !partition_keys.is_empty() {
            over.push(format!("PARTITION BY {}", names_sql(partition_keys)));
        }
        if !sorting_keys.is_empty() {
            over.push(format!("ORDER BY {}", order_by_sql(sorting_keys, sorting_orders)));
        }

        let mut columns: Vec<String> = input.names().map(str::to_string).collect();
        for (function, name) in window_functions.iter().zip(window_names) {
            let mut clauses = over.clone();
            clauses.push(self.frame_sql(&function.frame)?);

            let mut call = self.call_sql(&function.call)?;
            if function.ignore_nulls {
                call.push_str(" IGNORE NULLS");
            }
            columns.push(format!("{} OVER ({}) as {}", call, clauses.join(" "), name));
        }

        Some(format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            self.from_sql(source)?
        ))
    }

    fn frame_sql(&self, frame: &Frame) -> Option<String> {
        let window_type = match frame.window_type {
            WindowType::Range => "RANGE",
            WindowType::Rows => "ROWS",
        };
        Some(format!(
            "{} BETWEEN {} AND {}",
            window_type,
            self.bound_sql(frame.start_type, frame.start_value.as_ref())?,
            self.bound_sql(frame.end_type, frame.end_value.as_ref())?
        ))
    }

    fn bound_sql(&self, bound: BoundType, value: Option<&TypedExpr>) -> Option<String> {
        match bound {
            BoundType::UnboundedPreceding => Some("UNBOUNDED PRECEDING".to_string()),
            BoundType::UnboundedFollowing => Some("UNBOUNDED FOLLOWING".to_string()),
            BoundType::CurrentRow => Some("CURRENT ROW".to_string()),
            BoundType::Preceding => Some(format!("{} PRECEDING", self.expr_sql(value?)?)),
            BoundType::Following => Some(format!("{} FOLLOWING", self.expr_sql(value?)?)),
        }
    }

    fn row_number_sql(
        &self,
        partition_keys: &[FieldAccess],
        row_number_name: &str,
        source: &PlanNode,
    ) -> Option<String> {
        let input = source.output_type();
        if !self.supports_row(&input) {
            return None;
        }

        let mut columns: Vec<String> = input.names().map(str::to_string).collect();
        let partition = if partition_keys.is_empty() {
            String::new()
        } else {
            format!("PARTITION BY {}", names_sql(partition_keys))
        };
        columns.push(format!("row_number() OVER ({}) as {}", partition, row_number_name));

        Some(format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            self.from_sql(source)?
        ))
    }

    /// Scalar expression in projection or predicate position.
    pub fn expr_sql(&self, expr: &TypedExpr) -> Option<String> {
        match expr {
            TypedExpr::FieldAccess(field) => Some(field.name.clone()),
            TypedExpr::Call(call) => self.call_sql(call),
            TypedExpr::Constant { value, .. } => literal_sql(value),
            TypedExpr::Cast {
                data_type, input, ..
            } => Some(format!(
                "cast({} as {})",
                self.expr_sql(input)?,
                to_type_sql(data_type)?
            )),
            // Lambdas only appear as call arguments.
            TypedExpr::Lambda { .. } => None,
        }
    }

    fn call_sql(&self, call: &CallExpr) -> Option<String> {
        let inputs = call.inputs.as_slice();
        match call.name.as_str() {
            connective @ ("and" | "or") => {
                if inputs.len() < 2 {
                    return None;
                }
                let operator = if connective == "and" { " AND " } else { " OR " };
                let operands = inputs
                    .iter()
                    .map(|input| self.operand_sql(input))
                    .collect::<Option<Vec<_>>>()?;
                Some(operands.join(operator))
            }
            "not" => {
                let [input] = inputs else {
                    return None;
                };
                Some(format!("NOT ({})", self.expr_sql(input)?))
            }
            check @ ("is_null" | "is_not_null") => {
                let [input] = inputs else {
                    return None;
                };
                let predicate = if check == "is_null" { "IS NULL" } else { "IS NOT NULL" };
                Some(format!("{} {}", self.operand_sql(input)?, predicate))
            }
            name if NO_SQL_FUNCTIONS.contains(&name) => None,
            name => match infix_operator(name) {
                Some(operator) => {
                    let [lhs, rhs] = inputs else {
                        return None;
                    };
                    Some(format!(
                        "{} {} {}",
                        self.operand_sql(lhs)?,
                        operator,
                        self.operand_sql(rhs)?
                    ))
                }
                None => Some(format!("{}({})", name, self.call_inputs_sql(inputs)?)),
            },
        }
    }

    /// Operator-shaped operands are parenthesised.
    fn operand_sql(&self, operand: &TypedExpr) -> Option<String> {
        let sql = self.expr_sql(operand)?;
        let is_operator = operand
            .as_call()
            .is_some_and(|call| renders_as_operator(&call.name));
        Some(if is_operator { format!("({})", sql) } else { sql })
    }

    fn call_inputs_sql(&self, inputs: &[TypedExpr]) -> Option<String> {
        let args = inputs
            .iter()
            .map(|input| match input {
                TypedExpr::Lambda { signature, body } => {
                    // The body must itself be a call.
                    let body = body.as_call()?;
                    Some(format!(
                        "({}) -> {}",
                        signature.names().collect::<Vec<_>>().join(", "),
                        self.call_sql(body)?
                    ))
                }
                other => self.expr_sql(other),
            })
            .collect::<Option<Vec<_>>>()?;
        Some(args.join(", "))
    }
}

/// Internal functions neither reference engine can call by name.
const NO_SQL_FUNCTIONS: &[&str] = &["row_constructor"];

fn renders_as_operator(name: &str) -> bool {
    matches!(name, "and" | "or" | "not" | "is_null" | "is_not_null") || infix_operator(name).is_some()
}

fn infix_operator(name: &str) -> Option<&'static str> {
    Some(match name {
        "plus" => "+",
        "minus" => "-",
        "multiply" => "*",
        "divide" => "/",
        "mod" => "%",
        "eq" => "=",
        "neq" => "<>",
        "lt" => "<",
        "lte" => "<=",
        "gt" => ">",
        "gte" => ">=",
        _ => return None,
    })
}

fn names_sql(fields: &[FieldAccess]) -> String {
    fields
        .iter()
        .map(|field| field.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn order_by_sql(keys: &[FieldAccess], orders: &[SortOrder]) -> String {
    keys.iter()
        .zip(orders)
        .map(|(key, order)| format!("{} {}", key.name, order))
        .collect::<Vec<_>>()
        .join(", ")
}

fn literal_sql(value: &Value) -> Option<String> {
    match value {
        Value::Double(d) if !d.is_finite() => None,
        other => Some(other.to_string()),
    }
}

fn column_filter_sql(column: &str, filter: &ColumnFilter) -> Option<String> {
    match filter {
        ColumnFilter::IsNotNull => Some(format!("{} IS NOT NULL", column)),
        ColumnFilter::Compare { op, value } => {
            let operator = match op {
                ComparisonOp::Lt => "<",
                ComparisonOp::Lte => "<=",
                ComparisonOp::Gt => ">",
                ComparisonOp::Gte => ">=",
            };
            Some(format!("{} {} {}", column, operator, literal_sql(value)?))
        }
    }
}

/// SQL spelling of a column type. UNKNOWN has none.
pub fn to_type_sql(ty: &Type) -> Option<String> {
    match ty {
        Type::Array(element) => Some(format!("array({})", to_type_sql(element)?)),
        Type::Map { key, value } => Some(format!(
            "map({}, {})",
            to_type_sql(key)?,
            to_type_sql(value)?
        )),
        Type::Row(row) => {
            let fields = row
                .fields
                .iter()
                .map(|field| Some(format!("{} {}", field.name, to_type_sql(&field.data_type)?)))
                .collect::<Option<Vec<_>>>()?;
            Some(format!("row({})", fields.join(", ")))
        }
        Type::Unknown => None,
        primitive => Some(primitive.to_string()),
    }
}

/// Statements that (re)create the staging table with the input's columns
/// and leave it empty, ready for the staged data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingDdl {
    pub drop: String,
    pub create: String,
    pub delete: String,
}

/// Column staged in place of an input without columns, so the row count
/// survives.
pub const EMPTY_INPUT_COLUMN: &str = "x";

pub fn staging_ddl(input: &RowType) -> Result<StagingDdl, SqlError> {
    let placeholder;
    let input = if input.is_empty() {
        placeholder = RowType::from_pairs([(EMPTY_INPUT_COLUMN, Type::BigInt)]);
        &placeholder
    } else {
        input
    };

    let null_values = input
        .fields
        .iter()
        .map(|field| {
            to_type_sql(&field.data_type)
                .map(|ty| format!("cast(null as {})", ty))
                .ok_or_else(|| SqlError::UnsupportedStagingType {
                    column: field.name.clone(),
                    data_type: field.data_type.to_string(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(StagingDdl {
        drop: format!("DROP TABLE IF EXISTS {}", STAGING_TABLE),
        create: format!(
            "CREATE TABLE {}({}) WITH (format = 'DWRF') AS SELECT {}",
            STAGING_TABLE,
            input.names().collect::<Vec<_>>().join(", "),
            null_values.join(", ")
        ),
        delete: format!("DELETE FROM {}", STAGING_TABLE),
    })
}

/// Spark stages input as a temporary view over a local Parquet file.
pub fn spark_staging_view(parquet_path: &str) -> Result<String, SqlError> {
    if parquet_path.is_empty() || parquet_path.contains('`') {
        return Err(SqlError::UnsupportedStagingPath(parquet_path.to_string()));
    }
    Ok(format!(
        "CREATE OR REPLACE TEMPORARY VIEW {} AS (SELECT * from parquet.`file://{}`)",
        STAGING_TABLE, parquet_path
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use planbridge_plan::PlanNodeId;

    fn values(columns: &[(&str, Type)]) -> PlanNode {
        PlanNode::Values {
            id: PlanNodeId(0),
            output_type: RowType::from_pairs(columns.iter().cloned()),
        }
    }

    fn presto() -> SqlEmitter {
        SqlEmitter::for_kind(DialectKind::Presto)
    }

    #[test]
    fn test_project_over_values() {
        let plan = PlanNode::Project {
            id: PlanNodeId(1),
            names: vec!["c".to_string()],
            projections: vec![TypedExpr::call(
                "plus",
                Type::Integer,
                vec![
                    TypedExpr::field("a", Type::Integer),
                    TypedExpr::field("b", Type::Integer),
                ],
            )],
            source: Box::new(values(&[("a", Type::Integer), ("b", Type::Integer)])),
        };
        assert_eq!(
            presto().to_sql(&plan).unwrap(),
            "SELECT a + b as c FROM (SELECT a, b FROM tmp)"
        );
    }

    #[test]
    fn test_nested_infix_is_parenthesised() {
        let sum = TypedExpr::call(
            "plus",
            Type::Integer,
            vec![TypedExpr::field("a", Type::Integer), TypedExpr::field("b", Type::Integer)],
        );
        let expr = TypedExpr::call(
            "multiply",
            Type::Integer,
            vec![sum, TypedExpr::constant(Value::Integer(2))],
        );
        assert_eq!(presto().expr_sql(&expr).unwrap(), "(a + b) * 2");
    }

    #[test]
    fn test_logical_operators() {
        let gt = |name: &str| {
            TypedExpr::call(
                "gt",
                Type::Boolean,
                vec![TypedExpr::field(name, Type::Integer), TypedExpr::constant(Value::Integer(0))],
            )
        };
        let is_null = TypedExpr::call("is_null", Type::Boolean, vec![TypedExpr::field("c", Type::Integer)]);
        let either = TypedExpr::call("or", Type::Boolean, vec![gt("b"), is_null]);
        let all = TypedExpr::call(
            "and",
            Type::Boolean,
            vec![
                gt("a"),
                either.clone(),
                TypedExpr::call("not", Type::Boolean, vec![gt("d")]),
            ],
        );
        assert_eq!(
            presto().expr_sql(&all).unwrap(),
            "(a > 0) AND ((b > 0) OR (c IS NULL)) AND (NOT (d > 0))"
        );

        let not_null = TypedExpr::call("is_not_null", Type::Boolean, vec![either]);
        assert_eq!(
            presto().expr_sql(&not_null).unwrap(),
            "((b > 0) OR (c IS NULL)) IS NOT NULL"
        );
    }

    #[test]
    fn test_operators_with_wrong_arity_have_no_sql() {
        let a = || TypedExpr::field("a", Type::Boolean);
        for call in [
            TypedExpr::call("and", Type::Boolean, vec![a()]),
            TypedExpr::call("not", Type::Boolean, vec![a(), a()]),
            TypedExpr::call("is_not_null", Type::Boolean, vec![]),
            TypedExpr::call("eq", Type::Boolean, vec![a(), a(), a()]),
            TypedExpr::call("row_constructor", Type::row([("a", Type::Boolean)]), vec![a()]),
        ] {
            assert!(presto().expr_sql(&call).is_none(), "{:?}", call);
        }
    }

    #[test]
    fn test_cast_and_function_call() {
        let expr = TypedExpr::Cast {
            data_type: Type::Double,
            input: Box::new(TypedExpr::call(
                "abs",
                Type::Integer,
                vec![TypedExpr::field("a", Type::Integer)],
            )),
            null_on_failure: false,
        };
        assert_eq!(presto().expr_sql(&expr).unwrap(), "cast(abs(a) as DOUBLE)");
    }

    #[test]
    fn test_lambda_argument() {
        let lambda = TypedExpr::Lambda {
            signature: RowType::from_pairs([("x", Type::Integer)]),
            body: Box::new(TypedExpr::call(
                "plus",
                Type::Integer,
                vec![TypedExpr::field("x", Type::Integer), TypedExpr::constant(Value::Integer(1))],
            )),
        };
        let call = TypedExpr::call(
            "transform",
            Type::array(Type::Integer),
            vec![TypedExpr::field("arr", Type::array(Type::Integer)), lambda],
        );
        assert_eq!(presto().expr_sql(&call).unwrap(), "transform(arr, (x) -> x + 1)");

        let bad_lambda = TypedExpr::Lambda {
            signature: RowType::from_pairs([("x", Type::Integer)]),
            body: Box::new(TypedExpr::field("x", Type::Integer)),
        };
        let call = TypedExpr::call("transform", Type::Unknown, vec![bad_lambda]);
        assert!(presto().expr_sql(&call).is_none());
    }

    #[test]
    fn test_filter() {
        let plan = PlanNode::Filter {
            id: PlanNodeId(1),
            predicate: TypedExpr::call(
                "gt",
                Type::Boolean,
                vec![TypedExpr::field("a", Type::Integer), TypedExpr::constant(Value::Integer(0))],
            ),
            source: Box::new(values(&[("a", Type::Integer)])),
        };
        assert_eq!(
            presto().to_sql(&plan).unwrap(),
            "SELECT * FROM (SELECT a FROM tmp) WHERE a > 0"
        );
    }

    #[test]
    fn test_unsupported_leaf_type() {
        let plan = PlanNode::Project {
            id: PlanNodeId(1),
            names: vec!["d".to_string()],
            projections: vec![TypedExpr::field("d", Type::Date)],
            source: Box::new(values(&[("d", Type::Date)])),
        };
        assert!(presto().to_sql(&plan).is_none());
    }

    #[test]
    fn test_join_has_no_sql() {
        let plan = PlanNode::Join {
            id: PlanNodeId(2),
            join_type: planbridge_plan::JoinType::Inner,
            left_keys: vec![],
            right_keys: vec![],
            filter: None,
            left: Box::new(values(&[("a", Type::Integer)])),
            right: Box::new(values(&[("b", Type::Integer)])),
            output_type: RowType::from_pairs([("a", Type::Integer), ("b", Type::Integer)]),
        };
        assert!(presto().to_sql(&plan).is_none());
    }

    #[test]
    fn test_to_type_sql() {
        let ty = Type::row([
            ("a", Type::array(Type::Integer)),
            ("b", Type::map(Type::Varchar, Type::Decimal { precision: 10, scale: 2 })),
        ]);
        assert_eq!(
            to_type_sql(&ty).unwrap(),
            "row(a array(INTEGER), b map(VARCHAR, DECIMAL(10, 2)))"
        );
        assert!(to_type_sql(&Type::array(Type::Unknown)).is_none());
    }

    #[test]
    fn test_staging_ddl() {
        let ddl = staging_ddl(&RowType::from_pairs([("a", Type::Integer), ("b", Type::Varchar)])).unwrap();
        assert_eq!(ddl.drop, "DROP TABLE IF EXISTS tmp");
        assert_eq!(
            ddl.create,
            "CREATE TABLE tmp(a, b) WITH (format = 'DWRF') AS SELECT cast(null as INTEGER), cast(null as VARCHAR)"
        );
        assert_eq!(ddl.delete, "DELETE FROM tmp");
    }

    #[test]
    fn test_spark_staging_view() {
        assert_eq!(
            spark_staging_view("/tmp/planbridge/input.parquet").unwrap(),
            "CREATE OR REPLACE TEMPORARY VIEW tmp AS (SELECT * from parquet.`file:///tmp/planbridge/input.parquet`)"
        );
        assert!(matches!(
            spark_staging_view("/tmp/a`b.parquet"),
            Err(SqlError::UnsupportedStagingPath(_))
        ));
    }

    #[test]
    fn test_staging_ddl_without_columns() {
        let ddl = staging_ddl(&RowType::default()).unwrap();
        assert_eq!(
            ddl.create,
            "CREATE TABLE tmp(x) WITH (format = 'DWRF') AS SELECT cast(null as BIGINT)"
        );
        assert!(matches!(
            staging_ddl(&RowType::from_pairs([("u", Type::Unknown)])),
            Err(SqlError::UnsupportedStagingType { .. })
        ));
    }
}
