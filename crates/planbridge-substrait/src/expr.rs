//! Substrait expression → typed expression conversion

use crate::catalog::FunctionCatalog;
use crate::scope::InputSchemaScope;
use crate::types::to_internal_type;
use crate::{variant_name, ConvertError};
use planbridge_plan::{FieldAccess, TypedExpr, Value};
use substrait::proto::expression::field_reference::{ReferenceType, RootType};
use substrait::proto::expression::literal::LiteralType;
use substrait::proto::expression::reference_segment;
use substrait::proto::expression::{FieldReference, Literal, RexType, ScalarFunction};
use substrait::proto::{function_argument, Expression, FunctionArgument};

/// Converts expressions of one plan against the input schemas in scope.
pub struct ExprConverter<'a> {
    catalog: &'a FunctionCatalog,
}

impl<'a> ExprConverter<'a> {
    pub fn new(catalog: &'a FunctionCatalog) -> Self {
        Self { catalog }
    }

    pub fn convert(
        &self,
        expr: &Expression,
        scope: &InputSchemaScope,
    ) -> Result<TypedExpr, ConvertError> {
        let rex_type = expr
            .rex_type
            .as_ref()
            .ok_or(ConvertError::MissingField("Expression.rex_type"))?;

        match rex_type {
            RexType::Literal(literal) => self.convert_literal(literal),
            RexType::Selection(field) => Ok(TypedExpr::FieldAccess(self.convert_field(field, scope)?)),
            RexType::ScalarFunction(function) => self.convert_scalar_function(function, scope),
            other => Err(ConvertError::UnsupportedExpression(variant_name(other))),
        }
    }

    pub fn convert_literal(&self, literal: &Literal) -> Result<TypedExpr, ConvertError> {
        Ok(TypedExpr::constant(literal_value(literal)?))
    }

    /// Resolve a direct field reference to the column it names.
    pub fn convert_field(
        &self,
        field: &FieldReference,
        scope: &InputSchemaScope,
    ) -> Result<FieldAccess, ConvertError> {
        let offset = direct_offset(field)?;
        let resolved = scope.resolve(offset).ok_or(ConvertError::FieldOutOfRange {
            offset: offset as i64,
            width: scope.width(),
        })?;
        Ok(FieldAccess::new(
            resolved.field.name.clone(),
            resolved.field.data_type.clone(),
        ))
    }

    pub fn convert_scalar_function(
        &self,
        function: &ScalarFunction,
        scope: &InputSchemaScope,
    ) -> Result<TypedExpr, ConvertError> {
        let name = self.catalog.lookup(function.function_reference)?;
        let mut inputs = argument_values(&function.arguments)?
            .into_iter()
            .map(|arg| self.convert(arg, scope))
            .collect::<Result<Vec<_>, _>>()?;

        match name {
            "alias" => {
                check_arity(name, &inputs, 1)?;
                Ok(inputs.remove(0))
            }
            "cast" => {
                check_arity(name, &inputs, 1)?;
                let output_type = function
                    .output_type
                    .as_ref()
                    .ok_or(ConvertError::MissingField("ScalarFunction.output_type"))?;
                Ok(TypedExpr::Cast {
                    data_type: to_internal_type(output_type)?,
                    input: Box::new(inputs.remove(0)),
                    null_on_failure: false,
                })
            }
            _ => {
                let output_type = function
                    .output_type
                    .as_ref()
                    .ok_or(ConvertError::MissingField("ScalarFunction.output_type"))?;
                Ok(TypedExpr::call(name, to_internal_type(output_type)?, inputs))
            }
        }
    }
}

fn check_arity(function: &str, inputs: &[TypedExpr], expected: usize) -> Result<(), ConvertError> {
    if inputs.len() != expected {
        return Err(ConvertError::ArityMismatch {
            function: function.to_string(),
            expected,
            actual: inputs.len(),
        });
    }
    Ok(())
}

/// Literal kinds the engine accepts from the wire.
pub fn literal_value(literal: &Literal) -> Result<Value, ConvertError> {
    let literal_type = literal
        .literal_type
        .as_ref()
        .ok_or(ConvertError::MissingField("Literal.literal_type"))?;

    match literal_type {
        LiteralType::I32(v) => Ok(Value::Integer(*v)),
        LiteralType::Fp64(v) => Ok(Value::Double(*v)),
        LiteralType::Boolean(v) => Ok(Value::Boolean(*v)),
        other => Err(ConvertError::UnsupportedLiteral(variant_name(other))),
    }
}

/// Flat column offset of a direct struct-field reference. Nested, masked and
/// outer references are not supported.
pub fn direct_offset(field: &FieldReference) -> Result<usize, ConvertError> {
    match &field.root_type {
        None | Some(RootType::RootReference(_)) => {}
        Some(other) => return Err(ConvertError::UnsupportedExpression(variant_name(other))),
    }

    let segment = match &field.reference_type {
        Some(ReferenceType::DirectReference(segment)) => segment,
        Some(other) => return Err(ConvertError::UnsupportedExpression(variant_name(other))),
        None => return Err(ConvertError::MissingField("FieldReference.reference_type")),
    };

    match &segment.reference_type {
        Some(reference_segment::ReferenceType::StructField(struct_field)) => {
            if struct_field.child.is_some() {
                return Err(ConvertError::UnsupportedExpression(
                    "nested field reference".to_string(),
                ));
            }
            usize::try_from(struct_field.field).map_err(|_| ConvertError::FieldOutOfRange {
                offset: i64::from(struct_field.field),
                width: 0,
            })
        }
        Some(other) => Err(ConvertError::UnsupportedExpression(variant_name(other))),
        None => Err(ConvertError::MissingField("ReferenceSegment.reference_type")),
    }
}

/// Field offset of an expression that must be a bare column reference.
pub fn expression_offset(expr: &Expression) -> Option<Result<usize, ConvertError>> {
    match &expr.rex_type {
        Some(RexType::Selection(field)) => Some(direct_offset(field)),
        _ => None,
    }
}

/// Argument expressions of a function. Enum and type arguments are rejected.
pub fn argument_values(arguments: &[FunctionArgument]) -> Result<Vec<&Expression>, ConvertError> {
    arguments
        .iter()
        .map(|argument| match &argument.arg_type {
            Some(function_argument::ArgType::Value(expr)) => Ok(expr),
            Some(other) => Err(ConvertError::UnsupportedExpression(format!(
                "{} function argument",
                variant_name(other)
            ))),
            None => Err(ConvertError::MissingField("FunctionArgument.arg_type")),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{self, PlanBuilder};
    use planbridge_plan::{PlanNodeId, RowType, Type};

    fn catalog() -> FunctionCatalog {
        let plan = PlanBuilder::new()
            .function(1, "add:i32_i32")
            .function(2, "cast")
            .function(3, "alias")
            .function(4, "gte:i32_i32")
            .build();
        FunctionCatalog::from_plan(&plan).unwrap()
    }

    fn scope() -> InputSchemaScope {
        InputSchemaScope::single(
            PlanNodeId(0),
            RowType::from_pairs([("n0_0", Type::Integer), ("n0_1", Type::Double)]),
        )
    }

    #[test]
    fn test_convert_field_uses_scope_name() {
        let catalog = catalog();
        let converter = ExprConverter::new(&catalog);
        let expr = converter.convert(&builder::field(1), &scope()).unwrap();
        assert_eq!(expr, TypedExpr::field("n0_1", Type::Double));
    }

    #[test]
    fn test_field_out_of_range() {
        let catalog = catalog();
        let converter = ExprConverter::new(&catalog);
        let err = converter.convert(&builder::field(2), &scope()).unwrap_err();
        assert!(matches!(err, ConvertError::FieldOutOfRange { offset: 2, width: 2 }));
    }

    #[test]
    fn test_convert_call_maps_name() {
        let catalog = catalog();
        let converter = ExprConverter::new(&catalog);
        let expr = builder::call(1, vec![builder::field(0), builder::lit_i32(1)], builder::i32_type());
        let converted = converter.convert(&expr, &scope()).unwrap();
        assert_eq!(
            converted,
            TypedExpr::call(
                "plus",
                Type::Integer,
                vec![
                    TypedExpr::field("n0_0", Type::Integer),
                    TypedExpr::constant(Value::Integer(1)),
                ],
            )
        );
    }

    #[test]
    fn test_cast_and_alias() {
        let catalog = catalog();
        let converter = ExprConverter::new(&catalog);

        let cast = builder::call(2, vec![builder::field(0)], builder::fp64_type());
        match converter.convert(&cast, &scope()).unwrap() {
            TypedExpr::Cast {
                data_type,
                null_on_failure,
                ..
            } => {
                assert_eq!(data_type, Type::Double);
                assert!(!null_on_failure);
            }
            other => panic!("expected cast, got {:?}", other),
        }

        let alias = builder::call(3, vec![builder::field(1)], builder::fp64_type());
        assert_eq!(
            converter.convert(&alias, &scope()).unwrap(),
            TypedExpr::field("n0_1", Type::Double)
        );

        let bad_cast = builder::call(2, vec![builder::field(0), builder::field(1)], builder::fp64_type());
        assert!(matches!(
            converter.convert(&bad_cast, &scope()),
            Err(ConvertError::ArityMismatch { expected: 1, actual: 2, .. })
        ));
    }

    #[test]
    fn test_missing_output_type() {
        let catalog = catalog();
        let converter = ExprConverter::new(&catalog);
        let mut expr = builder::call(4, vec![builder::field(0), builder::lit_i32(3)], builder::bool_type());
        if let Some(RexType::ScalarFunction(function)) = &mut expr.rex_type {
            function.output_type = None;
        }
        assert!(matches!(
            converter.convert(&expr, &scope()),
            Err(ConvertError::MissingField(_))
        ));
    }

    #[test]
    fn test_unsupported_literal() {
        let catalog = catalog();
        let converter = ExprConverter::new(&catalog);
        assert!(matches!(
            converter.convert(&builder::lit_string("x"), &scope()),
            Err(ConvertError::UnsupportedLiteral(_))
        ));
        assert_eq!(
            converter.convert(&builder::lit_bool(true), &scope()).unwrap(),
            TypedExpr::constant(Value::Boolean(true))
        );
    }

    #[test]
    fn test_undeclared_function() {
        let catalog = catalog();
        let converter = ExprConverter::new(&catalog);
        let expr = builder::call(99, vec![], builder::i32_type());
        assert!(matches!(
            converter.convert(&expr, &scope()),
            Err(ConvertError::UndeclaredFunction(99))
        ));
    }
}
