//! Type system for the internal plan

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    // Primitives
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Decimal { precision: u8, scale: u8 },

    // Text
    Varchar,

    // Binary
    Varbinary,

    // Temporal
    Date,
    Timestamp,
    IntervalDayTime,
    IntervalYearMonth,

    // Complex
    Array(Box<Type>),
    Map { key: Box<Type>, value: Box<Type> },
    Row(RowType),

    // Special
    Unknown,
}

impl Type {
    pub fn array(element: Type) -> Self {
        Type::Array(Box::new(element))
    }

    pub fn map(key: Type, value: Type) -> Self {
        Type::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn row<N: Into<String>>(fields: impl IntoIterator<Item = (N, Type)>) -> Self {
        Type::Row(RowType::from_pairs(fields))
    }

    /// True for scalar types with no children.
    pub fn is_primitive(&self) -> bool {
        !matches!(
            self,
            Type::Array(_) | Type::Map { .. } | Type::Row(_) | Type::Unknown
        )
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Type::Map { .. })
    }

    pub fn is_row(&self) -> bool {
        matches!(self, Type::Row(_))
    }

    /// Direct child types: the element of an array, key and value of a map,
    /// the field types of a row.
    pub fn children(&self) -> Vec<&Type> {
        match self {
            Type::Array(element) => vec![element.as_ref()],
            Type::Map { key, value } => vec![key.as_ref(), value.as_ref()],
            Type::Row(row) => row.types().collect(),
            _ => vec![],
        }
    }

    pub fn as_row(&self) -> Option<&RowType> {
        match self {
            Type::Row(row) => Some(row),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Boolean => write!(f, "BOOLEAN"),
            Type::TinyInt => write!(f, "TINYINT"),
            Type::SmallInt => write!(f, "SMALLINT"),
            Type::Integer => write!(f, "INTEGER"),
            Type::BigInt => write!(f, "BIGINT"),
            Type::Real => write!(f, "REAL"),
            Type::Double => write!(f, "DOUBLE"),
            Type::Decimal { precision, scale } => write!(f, "DECIMAL({}, {})", precision, scale),
            Type::Varchar => write!(f, "VARCHAR"),
            Type::Varbinary => write!(f, "VARBINARY"),
            Type::Date => write!(f, "DATE"),
            Type::Timestamp => write!(f, "TIMESTAMP"),
            Type::IntervalDayTime => write!(f, "INTERVAL DAY TO SECOND"),
            Type::IntervalYearMonth => write!(f, "INTERVAL YEAR TO MONTH"),
            Type::Array(element) => write!(f, "ARRAY({})", element),
            Type::Map { key, value } => write!(f, "MAP({}, {})", key, value),
            Type::Row(row) => {
                write!(f, "ROW(")?;
                for (i, field) in row.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", field.name, field.data_type)?;
                }
                write!(f, ")")
            }
            Type::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: Type,
}

/// Ordered list of named, typed columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowType {
    pub fields: Vec<Field>,
}

impl RowType {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn from_pairs<N: Into<String>>(pairs: impl IntoIterator<Item = (N, Type)>) -> Self {
        Self {
            fields: pairs
                .into_iter()
                .map(|(name, data_type)| Field {
                    name: name.into(),
                    data_type,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn types(&self) -> impl Iterator<Item = &Type> {
        self.fields.iter().map(|f| &f.data_type)
    }

    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    /// Columns of `self` followed by the columns of `other`.
    pub fn concat(&self, other: &RowType) -> RowType {
        let mut fields = self.fields.clone();
        fields.extend(other.fields.iter().cloned());
        RowType { fields }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i32),
    BigInt(i64),
    Double(f64),
    Varchar(String),
}

impl Value {
    /// The type a non-null value carries by itself.
    pub fn natural_type(&self) -> Type {
        match self {
            Value::Null => Type::Unknown,
            Value::Boolean(_) => Type::Boolean,
            Value::Integer(_) => Type::Integer,
            Value::BigInt(_) => Type::BigInt,
            Value::Double(_) => Type::Double,
            Value::Varchar(_) => Type::Varchar,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::BigInt(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{:?}", d),
            Value::Varchar(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

const MAX_DECIMAL_PRECISION: u8 = 38;

/// Result type of a final decimal average given its intermediate
/// `ROW(sum DECIMAL(p', s), count BIGINT)`.
///
/// The partial phase widens the sum to `min(p + 10, 38)`; the result of the
/// input `DECIMAL(p, s)` is `DECIMAL(p + 4, s + 4)`, or `DECIMAL(38, min(s + 4, 38))`
/// once the intermediate precision saturates.
pub fn decimal_avg_result_type(intermediate: &Type) -> Option<Type> {
    let row = intermediate.as_row()?;
    let (precision, scale) = match row.field(0).map(|f| &f.data_type) {
        Some(Type::Decimal { precision, scale }) => (*precision, *scale),
        _ => return None,
    };

    if precision == MAX_DECIMAL_PRECISION {
        return Some(Type::Decimal {
            precision: MAX_DECIMAL_PRECISION,
            scale: (scale + 4).min(MAX_DECIMAL_PRECISION),
        });
    }

    // No input precision widens to fewer than 11 digits.
    let input_precision = precision.checked_sub(10).filter(|p| *p >= 1)?;
    if scale > input_precision {
        return None;
    }
    Some(Type::Decimal {
        precision: input_precision + 4,
        scale: scale + 4,
    })
}
