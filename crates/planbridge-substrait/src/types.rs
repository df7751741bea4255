//! Substrait type → internal type mapping

use crate::{variant_name, ConvertError};
use planbridge_plan::{RowType, Type};
use substrait::proto;
use substrait::proto::r#type::Kind;

/// Convert a Substrait type. Struct fields carry no names on the wire, so
/// they are named positionally `c0`, `c1`, ...
pub fn to_internal_type(ty: &proto::Type) -> Result<Type, ConvertError> {
    let kind = ty
        .kind
        .as_ref()
        .ok_or(ConvertError::MissingField("Type.kind"))?;

    let converted = match kind {
        Kind::Bool(_) => Type::Boolean,
        Kind::I8(_) => Type::TinyInt,
        Kind::I16(_) => Type::SmallInt,
        Kind::I32(_) => Type::Integer,
        Kind::I64(_) => Type::BigInt,
        Kind::Fp32(_) => Type::Real,
        Kind::Fp64(_) => Type::Double,
        Kind::String(_) | Kind::Varchar(_) | Kind::FixedChar(_) => Type::Varchar,
        Kind::Binary(_) | Kind::FixedBinary(_) => Type::Varbinary,
        Kind::Date(_) => Type::Date,
        Kind::PrecisionTimestamp(_) => Type::Timestamp,
        Kind::IntervalDay(_) => Type::IntervalDayTime,
        Kind::IntervalYear(_) => Type::IntervalYearMonth,
        Kind::Decimal(decimal) => Type::Decimal {
            precision: decimal_digits(decimal.precision)?,
            scale: decimal_digits(decimal.scale)?,
        },
        Kind::List(list) => {
            let element = list
                .r#type
                .as_deref()
                .ok_or(ConvertError::MissingField("List.type"))?;
            Type::array(to_internal_type(element)?)
        }
        Kind::Map(map) => {
            let key = map
                .key
                .as_deref()
                .ok_or(ConvertError::MissingField("Map.key"))?;
            let value = map
                .value
                .as_deref()
                .ok_or(ConvertError::MissingField("Map.value"))?;
            Type::map(to_internal_type(key)?, to_internal_type(value)?)
        }
        Kind::Struct(fields) => Type::Row(struct_row_type(&fields.types)?),
        other => return Err(ConvertError::UnsupportedType(variant_name(other))),
    };
    Ok(converted)
}

fn struct_row_type(types: &[proto::Type]) -> Result<RowType, ConvertError> {
    let fields = types
        .iter()
        .enumerate()
        .map(|(i, ty)| Ok((format!("c{}", i), to_internal_type(ty)?)))
        .collect::<Result<Vec<_>, ConvertError>>()?;
    Ok(RowType::from_pairs(fields))
}

fn decimal_digits(value: i32) -> Result<u8, ConvertError> {
    u8::try_from(value)
        .ok()
        .filter(|digits| *digits <= 38)
        .ok_or_else(|| ConvertError::UnsupportedType(format!("DECIMAL with {} digits", value)))
}

/// Types the validator lets through: scalars whose conversion is exact.
pub fn is_supported_scalar(ty: &proto::Type) -> bool {
    matches!(
        ty.kind,
        Some(
            Kind::Bool(_)
                | Kind::I8(_)
                | Kind::I16(_)
                | Kind::I32(_)
                | Kind::I64(_)
                | Kind::Fp32(_)
                | Kind::Fp64(_)
                | Kind::String(_)
                | Kind::Varchar(_)
                | Kind::Date(_)
        )
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder;

    #[test]
    fn test_scalar_types() {
        assert_eq!(to_internal_type(&builder::i32_type()).unwrap(), Type::Integer);
        assert_eq!(to_internal_type(&builder::i64_type()).unwrap(), Type::BigInt);
        assert_eq!(to_internal_type(&builder::fp64_type()).unwrap(), Type::Double);
        assert_eq!(to_internal_type(&builder::bool_type()).unwrap(), Type::Boolean);
        assert_eq!(to_internal_type(&builder::string_type()).unwrap(), Type::Varchar);
        assert_eq!(
            to_internal_type(&builder::decimal_type(10, 2)).unwrap(),
            Type::Decimal { precision: 10, scale: 2 }
        );
    }

    #[test]
    fn test_struct_fields_named_positionally() {
        let ty = builder::struct_type(vec![builder::fp64_type(), builder::i64_type()]);
        assert_eq!(
            to_internal_type(&ty).unwrap(),
            Type::row([("c0", Type::Double), ("c1", Type::BigInt)])
        );
    }

    #[test]
    fn test_missing_kind_is_error() {
        assert!(matches!(
            to_internal_type(&proto::Type::default()),
            Err(ConvertError::MissingField(_))
        ));
    }

    #[test]
    fn test_supported_scalars() {
        assert!(is_supported_scalar(&builder::i32_type()));
        assert!(!is_supported_scalar(&builder::decimal_type(10, 2)));
        assert!(!is_supported_scalar(&builder::struct_type(vec![])));
    }
}
