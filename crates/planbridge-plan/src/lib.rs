//! Internal plan representation
//!
//! The typed plan and expression tree that Substrait plans are converted
//! into and that SQL text is emitted from. All types are deterministically
//! serializable so a plan can be fingerprinted.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

mod expr;
mod types;
pub use expr::*;
pub use types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlanNodeId(pub u32);

impl fmt::Display for PlanNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of the `index`-th output column of node `id`.
pub fn column_name(id: PlanNodeId, index: usize) -> String {
    format!("n{}_{}", id.0, index)
}

/// Mints plan node ids for one translation. Never share an allocator
/// between translations.
#[derive(Debug, Default)]
pub struct NodeIdAllocator {
    next: u32,
}

impl NodeIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> PlanNodeId {
        let id = PlanNodeId(self.next);
        self.next += 1;
        id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregationStep {
    Partial,
    Intermediate,
    Final,
    Single,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub ascending: bool,
    pub nulls_first: bool,
}

impl SortOrder {
    pub const ASC_NULLS_FIRST: SortOrder = SortOrder { ascending: true, nulls_first: true };
    pub const ASC_NULLS_LAST: SortOrder = SortOrder { ascending: true, nulls_first: false };
    pub const DESC_NULLS_FIRST: SortOrder = SortOrder { ascending: false, nulls_first: true };
    pub const DESC_NULLS_LAST: SortOrder = SortOrder { ascending: false, nulls_first: false };
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} NULLS {}",
            if self.ascending { "ASC" } else { "DESC" },
            if self.nulls_first { "FIRST" } else { "LAST" }
        )
    }
}

/// One aggregate of an Aggregation node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub call: CallExpr,
    /// Boolean column selecting the rows this aggregate sees.
    pub mask: Option<FieldAccess>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sorting_keys: Vec<FieldAccess>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sorting_orders: Vec<SortOrder>,
    #[serde(default)]
    pub distinct: bool,
}

impl Aggregate {
    pub fn new(call: CallExpr) -> Self {
        Self {
            call,
            mask: None,
            sorting_keys: vec![],
            sorting_orders: vec![],
            distinct: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowType {
    Range,
    Rows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundType {
    UnboundedPreceding,
    Preceding,
    CurrentRow,
    Following,
    UnboundedFollowing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub window_type: WindowType,
    pub start_type: BoundType,
    pub start_value: Option<TypedExpr>,
    pub end_type: BoundType,
    pub end_value: Option<TypedExpr>,
}

impl Frame {
    /// `RANGE BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW`
    pub fn default_range() -> Self {
        Self {
            window_type: WindowType::Range,
            start_type: BoundType::UnboundedPreceding,
            start_value: None,
            end_type: BoundType::CurrentRow,
            end_value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowFunction {
    pub call: CallExpr,
    pub frame: Frame,
    #[serde(default)]
    pub ignore_nulls: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    LeftSemiFilter,
    Anti,
}

impl JoinType {
    /// Semi and anti joins only produce the left side.
    pub fn outputs_left_only(&self) -> bool {
        matches!(self, JoinType::LeftSemiFilter | JoinType::Anti)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    Lt,
    Lte,
    Gt,
    Gte,
}

impl ComparisonOp {
    /// The operator that holds with operands swapped: `5 > a` is `a < 5`.
    pub fn mirrored(self) -> Self {
        match self {
            ComparisonOp::Lt => ComparisonOp::Gt,
            ComparisonOp::Lte => ComparisonOp::Gte,
            ComparisonOp::Gt => ComparisonOp::Lt,
            ComparisonOp::Gte => ComparisonOp::Lte,
        }
    }
}

/// Predicate pushed into a table scan for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnFilter {
    IsNotNull,
    Compare { op: ComparisonOp, value: Value },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node")]
pub enum PlanNode {
    Values {
        id: PlanNodeId,
        output_type: RowType,
    },
    TableScan {
        id: PlanNodeId,
        table: String,
        /// Base column read into each output column, by position.
        columns: Vec<String>,
        output_type: RowType,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        filters: BTreeMap<String, Vec<ColumnFilter>>,
    },
    Project {
        id: PlanNodeId,
        names: Vec<String>,
        projections: Vec<TypedExpr>,
        source: Box<PlanNode>,
    },
    Filter {
        id: PlanNodeId,
        predicate: TypedExpr,
        source: Box<PlanNode>,
    },
    Aggregation {
        id: PlanNodeId,
        step: AggregationStep,
        grouping_keys: Vec<FieldAccess>,
        aggregate_names: Vec<String>,
        aggregates: Vec<Aggregate>,
        source: Box<PlanNode>,
    },
    Window {
        id: PlanNodeId,
        partition_keys: Vec<FieldAccess>,
        sorting_keys: Vec<FieldAccess>,
        sorting_orders: Vec<SortOrder>,
        window_names: Vec<String>,
        window_functions: Vec<WindowFunction>,
        source: Box<PlanNode>,
    },
    RowNumber {
        id: PlanNodeId,
        partition_keys: Vec<FieldAccess>,
        row_number_name: String,
        source: Box<PlanNode>,
    },
    Join {
        id: PlanNodeId,
        join_type: JoinType,
        left_keys: Vec<FieldAccess>,
        right_keys: Vec<FieldAccess>,
        filter: Option<TypedExpr>,
        left: Box<PlanNode>,
        right: Box<PlanNode>,
        output_type: RowType,
    },
}

impl PlanNode {
    pub fn id(&self) -> PlanNodeId {
        match self {
            PlanNode::Values { id, .. }
            | PlanNode::TableScan { id, .. }
            | PlanNode::Project { id, .. }
            | PlanNode::Filter { id, .. }
            | PlanNode::Aggregation { id, .. }
            | PlanNode::Window { id, .. }
            | PlanNode::RowNumber { id, .. }
            | PlanNode::Join { id, .. } => *id,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            PlanNode::Values { .. } => "Values",
            PlanNode::TableScan { .. } => "TableScan",
            PlanNode::Project { .. } => "Project",
            PlanNode::Filter { .. } => "Filter",
            PlanNode::Aggregation { .. } => "Aggregation",
            PlanNode::Window { .. } => "Window",
            PlanNode::RowNumber { .. } => "RowNumber",
            PlanNode::Join { .. } => "Join",
        }
    }

    pub fn output_type(&self) -> RowType {
        match self {
            PlanNode::Values { output_type, .. }
            | PlanNode::TableScan { output_type, .. }
            | PlanNode::Join { output_type, .. } => output_type.clone(),
            PlanNode::Project {
                names, projections, ..
            } => RowType::from_pairs(
                names
                    .iter()
                    .cloned()
                    .zip(projections.iter().map(|p| p.data_type().clone())),
            ),
            PlanNode::Filter { source, .. } => source.output_type(),
            PlanNode::Aggregation {
                grouping_keys,
                aggregate_names,
                aggregates,
                ..
            } => RowType::from_pairs(
                grouping_keys
                    .iter()
                    .map(|k| (k.name.clone(), k.data_type.clone()))
                    .chain(
                        aggregate_names
                            .iter()
                            .cloned()
                            .zip(aggregates.iter().map(|a| a.call.data_type.clone())),
                    ),
            ),
            PlanNode::Window {
                window_names,
                window_functions,
                source,
                ..
            } => source.output_type().concat(&RowType::from_pairs(
                window_names
                    .iter()
                    .cloned()
                    .zip(window_functions.iter().map(|w| w.call.data_type.clone())),
            )),
            PlanNode::RowNumber {
                row_number_name,
                source,
                ..
            } => source
                .output_type()
                .concat(&RowType::from_pairs([(row_number_name.clone(), Type::BigInt)])),
        }
    }

    /// SHA-256 of the canonical JSON form, for deterministic caching.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).expect("plan should always serialize");
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
