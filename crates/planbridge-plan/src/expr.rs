//! Typed expression tree

use crate::types::{RowType, Type, Value};
use serde::{Deserialize, Serialize};

/// Reference to a named column of the input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldAccess {
    pub name: String,
    pub data_type: Type,
}

impl FieldAccess {
    pub fn new(name: impl Into<String>, data_type: Type) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Call of a scalar, aggregate or window function by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpr {
    pub name: String,
    pub data_type: Type,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<TypedExpr>,
}

impl CallExpr {
    pub fn new(name: impl Into<String>, data_type: Type, inputs: Vec<TypedExpr>) -> Self {
        Self {
            name: name.into(),
            data_type,
            inputs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expr")]
pub enum TypedExpr {
    FieldAccess(FieldAccess),
    Call(CallExpr),
    Constant {
        value: Value,
        data_type: Type,
    },
    Cast {
        data_type: Type,
        input: Box<TypedExpr>,
        /// When false a failed conversion fails the query instead of
        /// producing NULL.
        null_on_failure: bool,
    },
    Lambda {
        signature: RowType,
        body: Box<TypedExpr>,
    },
}

impl TypedExpr {
    pub fn field(name: impl Into<String>, data_type: Type) -> Self {
        TypedExpr::FieldAccess(FieldAccess::new(name, data_type))
    }

    pub fn call(name: impl Into<String>, data_type: Type, inputs: Vec<TypedExpr>) -> Self {
        TypedExpr::Call(CallExpr::new(name, data_type, inputs))
    }

    pub fn constant(value: Value) -> Self {
        let data_type = value.natural_type();
        TypedExpr::Constant { value, data_type }
    }

    /// Result type. A lambda reports the type of its body.
    pub fn data_type(&self) -> &Type {
        match self {
            TypedExpr::FieldAccess(field) => &field.data_type,
            TypedExpr::Call(call) => &call.data_type,
            TypedExpr::Constant { data_type, .. } => data_type,
            TypedExpr::Cast { data_type, .. } => data_type,
            TypedExpr::Lambda { body, .. } => body.data_type(),
        }
    }

    pub fn as_field(&self) -> Option<&FieldAccess> {
        match self {
            TypedExpr::FieldAccess(field) => Some(field),
            _ => None,
        }
    }

    pub fn as_call(&self) -> Option<&CallExpr> {
        match self {
            TypedExpr::Call(call) => Some(call),
            _ => None,
        }
    }
}
