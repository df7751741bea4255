//! Function anchor → function name lookup built from a plan's extensions

use crate::ConvertError;
use std::collections::HashMap;
use substrait::proto;
use substrait::proto::extensions::simple_extension_declaration::MappingType;

/// Functions declared by one Substrait plan, keyed by anchor.
///
/// Built once per plan and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct FunctionCatalog {
    functions: HashMap<u32, String>,
}

impl FunctionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every extension function declared by `plan`. Type and type
    /// variation declarations are ignored.
    pub fn from_plan(plan: &proto::Plan) -> Result<Self, ConvertError> {
        let mut catalog = Self::new();
        for declaration in &plan.extensions {
            if let Some(MappingType::ExtensionFunction(function)) = &declaration.mapping_type {
                catalog.declare(function.function_anchor, &function.name)?;
            }
        }
        tracing::trace!(functions = catalog.len(), "built function catalog");
        Ok(catalog)
    }

    /// Register `signature` under `anchor`. Declaring the same signature twice
    /// is harmless; binding one anchor to two different signatures is not.
    pub fn declare(&mut self, anchor: u32, signature: &str) -> Result<(), ConvertError> {
        match self.functions.get(&anchor) {
            Some(existing) if existing != signature => Err(ConvertError::DuplicateFunction {
                anchor,
                first: existing.clone(),
                second: signature.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.functions.insert(anchor, signature.to_string());
                Ok(())
            }
        }
    }

    /// The declared signature, e.g. `add:i32_i32`.
    pub fn signature(&self, anchor: u32) -> Result<&str, ConvertError> {
        self.functions
            .get(&anchor)
            .map(String::as_str)
            .ok_or(ConvertError::UndeclaredFunction(anchor))
    }

    /// The internal engine's name for the function declared under `anchor`.
    pub fn lookup(&self, anchor: u32) -> Result<&'_ str, ConvertError> {
        let signature = self.signature(anchor)?;
        Ok(internal_function_name(short_name(signature)))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Strip the argument signature from a compound function name.
pub fn short_name(signature: &str) -> &str {
    signature.split(':').next().unwrap_or(signature)
}

/// Substrait standard function names that the engine spells differently.
pub fn internal_function_name(name: &str) -> &str {
    match name {
        "add" => "plus",
        "subtract" => "minus",
        "modulus" => "mod",
        "equal" => "eq",
        "not_equal" => "neq",
        other => other,
    }
}
