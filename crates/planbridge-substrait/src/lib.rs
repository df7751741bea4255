//! Substrait plan consumer
//!
//! Decodes Substrait plans, checks whether they are within the supported
//! subset, and converts them into `planbridge_plan` trees.

pub mod builder;
pub mod catalog;
pub mod expr;
pub mod rel;
pub mod scope;
pub mod types;
pub mod validator;

pub use catalog::FunctionCatalog;
pub use expr::ExprConverter;
pub use rel::SubstraitPlanConverter;
pub use scope::{InputSchemaScope, ResolvedField};
pub use substrait::proto;
pub use validator::{is_supported, PlanValidator};

use prost::Message;
use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Failed to decode Substrait plan: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Failed to parse Substrait JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Plan has no relations")]
    EmptyPlan,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Unsupported relation: {0}")]
    UnsupportedRelation(String),

    #[error("Unsupported expression: {0}")]
    UnsupportedExpression(String),

    #[error("Unsupported literal: {0}")]
    UnsupportedLiteral(String),

    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Unsupported aggregate: {0}")]
    UnsupportedAggregate(String),

    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    #[error("Unsupported join condition: {0}")]
    UnsupportedJoinCondition(String),

    #[error("Function anchor {0} is not declared")]
    UndeclaredFunction(u32),

    #[error("Function anchor {anchor} declared as both '{first}' and '{second}'")]
    DuplicateFunction {
        anchor: u32,
        first: String,
        second: String,
    },

    #[error("{function} takes {expected} argument(s), got {actual}")]
    ArityMismatch {
        function: String,
        expected: usize,
        actual: usize,
    },

    #[error("Field reference {offset} out of range for {width} input column(s)")]
    FieldOutOfRange { offset: i64, width: usize },
}

impl ConvertError {
    /// True when the plan is well formed but uses something outside the
    /// supported subset.
    pub fn is_unsupported(&self) -> bool {
        !matches!(
            self,
            ConvertError::Decode(_)
                | ConvertError::Json(_)
                | ConvertError::EmptyPlan
                | ConvertError::MissingField(_)
        )
    }
}

/// Decode a binary Substrait plan.
pub fn decode_plan(bytes: &[u8]) -> Result<proto::Plan, ConvertError> {
    Ok(proto::Plan::decode(bytes)?)
}

/// Parse a Substrait plan in its canonical JSON form.
pub fn plan_from_json(json: &str) -> Result<proto::Plan, ConvertError> {
    Ok(serde_json::from_str(json)?)
}

/// Name of an enum variant without its payload, for error messages.
pub(crate) fn variant_name<T: Debug>(value: &T) -> String {
    let debug = format!("{:?}", value);
    debug
        .split(|c: char| c == '(' || c == '{' || c == ' ')
        .next()
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{self, PlanBuilder};

    #[test]
    fn test_decode_round_trip() {
        let plan = PlanBuilder::new()
            .function(1, "add:i32_i32")
            .root(
                builder::read("t", &[("a", builder::i32_type())], None),
                &["a"],
            )
            .build();
        let decoded = decode_plan(&plan.encode_to_vec()).unwrap();
        assert_eq!(decoded, plan);
    }

    #[test]
    fn test_decode_garbage_is_error() {
        assert!(matches!(
            decode_plan(&[0xff, 0xff, 0xff]),
            Err(ConvertError::Decode(_))
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let plan = PlanBuilder::new()
            .root(
                builder::read("t", &[("a", builder::i64_type())], None),
                &["a"],
            )
            .build();
        let json = serde_json::to_string(&plan).unwrap();
        assert_eq!(plan_from_json(&json).unwrap(), plan);
    }

    #[test]
    fn test_variant_name() {
        let rex = builder::lit_i32(3).rex_type.unwrap();
        assert_eq!(variant_name(&rex), "Literal");
    }
}
