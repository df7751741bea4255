//! Resolution of flat field offsets against one or more input schemas

use planbridge_plan::{Field, PlanNodeId, RowType};

/// Input schemas visible to an expression, in order. A Substrait field
/// reference indexes into their concatenation.
#[derive(Debug, Clone, Default)]
pub struct InputSchemaScope {
    inputs: Vec<(PlanNodeId, RowType)>,
}

/// A column located by [`InputSchemaScope::resolve`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedField<'a> {
    /// Position of the owning schema within the scope.
    pub input: usize,
    pub node: PlanNodeId,
    /// Index within the owning schema.
    pub local_index: usize,
    pub field: &'a Field,
}

impl InputSchemaScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(node: PlanNodeId, schema: RowType) -> Self {
        let mut scope = Self::new();
        scope.push(node, schema);
        scope
    }

    pub fn push(&mut self, node: PlanNodeId, schema: RowType) {
        self.inputs.push((node, schema));
    }

    /// Total number of columns across all inputs.
    pub fn width(&self) -> usize {
        self.inputs.iter().map(|(_, schema)| schema.len()).sum()
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn schema(&self, input: usize) -> Option<&RowType> {
        self.inputs.get(input).map(|(_, schema)| schema)
    }

    /// Walk the inputs subtracting widths until `offset` falls inside one.
    pub fn resolve(&self, offset: usize) -> Option<ResolvedField<'_>> {
        let mut remaining = offset;
        for (input, (node, schema)) in self.inputs.iter().enumerate() {
            if remaining < schema.len() {
                return Some(ResolvedField {
                    input,
                    node: *node,
                    local_index: remaining,
                    field: schema.field(remaining)?,
                });
            }
            remaining -= schema.len();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planbridge_plan::{column_name, Type};

    fn schema(id: u32, width: usize) -> (PlanNodeId, RowType) {
        let id = PlanNodeId(id);
        let row = RowType::from_pairs((0..width).map(|i| (column_name(id, i), Type::Integer)));
        (id, row)
    }

    fn scope(widths: &[usize]) -> InputSchemaScope {
        let mut scope = InputSchemaScope::new();
        for (i, width) in widths.iter().enumerate() {
            let (id, row) = schema(i as u32, *width);
            scope.push(id, row);
        }
        scope
    }

    #[test]
    fn test_resolve_boundaries() {
        let scope = scope(&[2, 3, 1]);
        assert_eq!(scope.width(), 6);

        let first = scope.resolve(0).unwrap();
        assert_eq!((first.input, first.local_index), (0, 0));

        let last_of_first = scope.resolve(1).unwrap();
        assert_eq!((last_of_first.input, last_of_first.local_index), (0, 1));

        let start_of_second = scope.resolve(2).unwrap();
        assert_eq!((start_of_second.input, start_of_second.local_index), (1, 0));
        assert_eq!(start_of_second.field.name, "n1_0");

        let last = scope.resolve(5).unwrap();
        assert_eq!((last.input, last.local_index), (2, 0));

        assert!(scope.resolve(6).is_none());
    }

    #[test]
    fn test_resolve_second_schema() {
        let scope = scope(&[2, 3]);
        let resolved = scope.resolve(3).unwrap();
        assert_eq!(resolved.input, 1);
        assert_eq!(resolved.local_index, 1);
        assert_eq!(resolved.node, PlanNodeId(1));
        assert_eq!(resolved.field.name, "n1_1");
    }

    #[test]
    fn test_empty_schemas_are_skipped() {
        let scope = scope(&[0, 2]);
        let resolved = scope.resolve(0).unwrap();
        assert_eq!(resolved.input, 1);
        assert_eq!(resolved.local_index, 0);
    }
}
