//! Reference engine dialects
//!
//! A dialect narrows what the base emitter attempts: which column types the
//! engine can read back, and which aggregations it accepts.

use crate::SqlError;
use planbridge_plan::{Aggregate, FieldAccess, Type};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    Presto,
    Spark,
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialectKind::Presto => write!(f, "presto"),
            DialectKind::Spark => write!(f, "spark"),
        }
    }
}

impl FromStr for DialectKind {
    type Err = SqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "presto" => Ok(DialectKind::Presto),
            "spark" => Ok(DialectKind::Spark),
            _ => Err(SqlError::UnknownDialect(s.to_string())),
        }
    }
}

/// Trait for reference-engine specific SQL emission rules
pub trait SqlDialect: Send + Sync {
    fn kind(&self) -> DialectKind;

    /// Whether columns of this type can be staged and read back.
    fn is_supported_type(&self, ty: &Type) -> bool {
        is_base_supported_type(ty)
    }

    /// Whether `ORDER BY` inside an aggregate call is accepted.
    fn supports_ordered_aggregates(&self) -> bool {
        true
    }

    /// Dialect-specific veto over an aggregation's keys and calls.
    fn accepts_aggregation(&self, _grouping_keys: &[FieldAccess], _aggregates: &[Aggregate]) -> bool {
        true
    }
}

/// DATE, INTERVAL DAY TO SECOND and UNKNOWN cannot round-trip through the
/// staging table, at any nesting depth.
pub fn is_base_supported_type(ty: &Type) -> bool {
    if matches!(ty, Type::Date | Type::IntervalDayTime | Type::Unknown) {
        return false;
    }
    ty.children().into_iter().all(is_base_supported_type)
}

/// Aggregates that reject map-typed arguments.
const MAP_INCOMPATIBLE_AGGREGATES: &[&str] = &[
    "min",
    "max",
    "min_by",
    "max_by",
    "approx_distinct",
    "approx_set",
    "approx_most_frequent",
];

pub struct PrestoDialect;

impl SqlDialect for PrestoDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Presto
    }

    fn accepts_aggregation(&self, grouping_keys: &[FieldAccess], aggregates: &[Aggregate]) -> bool {
        // Map-typed grouping keys are not comparable.
        if grouping_keys.iter().any(|key| key.data_type.is_map()) {
            return false;
        }

        aggregates.iter().all(|aggregate| {
            let has_map_arg = aggregate
                .call
                .inputs
                .iter()
                .any(|input| input.data_type().is_map());
            if !has_map_arg {
                return true;
            }
            !aggregate.distinct && !MAP_INCOMPATIBLE_AGGREGATES.contains(&aggregate.call.name.as_str())
        })
    }
}

pub struct SparkDialect;

impl SqlDialect for SparkDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Spark
    }

    /// Also rules out VARBINARY, MAP and ARRAY anywhere, and rows nested
    /// inside rows.
    fn is_supported_type(&self, ty: &Type) -> bool {
        if !is_base_supported_type(ty)
            || matches!(ty, Type::Varbinary | Type::Map { .. } | Type::Array(_))
        {
            return false;
        }
        ty.children()
            .into_iter()
            .all(|child| !child.is_row() && self.is_supported_type(child))
    }

    fn supports_ordered_aggregates(&self) -> bool {
        false
    }

    fn accepts_aggregation(&self, _grouping_keys: &[FieldAccess], aggregates: &[Aggregate]) -> bool {
        aggregates
            .iter()
            .all(|aggregate| aggregate.sorting_keys.is_empty())
    }
}

pub fn get_dialect(kind: DialectKind) -> Box<dyn SqlDialect> {
    match kind {
        DialectKind::Presto => Box::new(PrestoDialect),
        DialectKind::Spark => Box::new(SparkDialect),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planbridge_plan::{CallExpr, TypedExpr};

    fn map_type() -> Type {
        Type::map(Type::Varchar, Type::BigInt)
    }

    #[test]
    fn test_base_supported_type() {
        assert!(is_base_supported_type(&Type::Integer));
        assert!(is_base_supported_type(&Type::array(map_type())));
        assert!(!is_base_supported_type(&Type::Date));
        assert!(!is_base_supported_type(&Type::array(Type::IntervalDayTime)));
        assert!(!is_base_supported_type(&Type::row([("a", Type::Unknown)])));
    }

    #[test]
    fn test_spark_supported_type() {
        let spark = SparkDialect;
        assert!(spark.is_supported_type(&Type::row([("a", Type::Integer), ("b", Type::Varchar)])));
        assert!(!spark.is_supported_type(&Type::row([("a", Type::Varbinary)])));
        assert!(!spark.is_supported_type(&Type::row([("a", Type::array(Type::Integer))])));
        assert!(!spark.is_supported_type(&Type::row([("a", Type::row([("b", Type::Integer)]))])));
        assert!(!spark.is_supported_type(&Type::row([("a", Type::Date)])));
    }

    #[test]
    fn test_presto_rejects_map_aggregations() {
        let presto = PrestoDialect;
        let over_map = |name: &str| {
            Aggregate::new(CallExpr::new(
                name,
                Type::BigInt,
                vec![TypedExpr::field("m", map_type())],
            ))
        };

        assert!(!presto.accepts_aggregation(&[FieldAccess::new("m", map_type())], &[]));
        assert!(!presto.accepts_aggregation(&[], &[over_map("max")]));
        assert!(!presto.accepts_aggregation(&[], &[over_map("approx_set")]));
        assert!(presto.accepts_aggregation(&[], &[over_map("count")]));

        let mut distinct = over_map("count");
        distinct.distinct = true;
        assert!(!presto.accepts_aggregation(&[], &[distinct]));
    }

    #[test]
    fn test_spark_rejects_ordered_aggregates() {
        let spark = SparkDialect;
        let mut aggregate = Aggregate::new(CallExpr::new(
            "array_agg",
            Type::array(Type::Integer),
            vec![TypedExpr::field("a", Type::Integer)],
        ));
        assert!(spark.accepts_aggregation(&[], std::slice::from_ref(&aggregate)));

        aggregate.sorting_keys.push(FieldAccess::new("a", Type::Integer));
        aggregate.sorting_orders.push(planbridge_plan::SortOrder::ASC_NULLS_LAST);
        assert!(!spark.accepts_aggregation(&[], &[aggregate]));
    }

    #[test]
    fn test_dialect_kind_parsing() {
        assert_eq!("Presto".parse::<DialectKind>().unwrap(), DialectKind::Presto);
        assert_eq!("spark".parse::<DialectKind>().unwrap(), DialectKind::Spark);
        assert!("duckdb".parse::<DialectKind>().is_err());
        assert_eq!(get_dialect(DialectKind::Spark).kind(), DialectKind::Spark);
    }
}
