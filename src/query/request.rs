//! Fully formed queries handed to the browsing engine

use crate::cell::Cell;
use crate::model::{Cube, FactRow};
use crate::request::{Drilldown, OrderSpec, PagingSpec};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Aggregation over a cell
#[derive(Debug, Clone)]
pub struct AggregationRequest {
    pub cell: Cell,
    /// Aggregate names in request order; empty means every cube aggregate
    pub aggregates: Vec<String>,
    pub drilldown: Drilldown,
    /// Cells inside this (unrestricted) cell are flagged in the result
    pub split: Option<Cell>,
    pub paging: PagingSpec,
    pub order: OrderSpec,
}

impl AggregationRequest {
    /// Aggregate the whole cell with cube defaults
    pub fn new(cell: Cell) -> Self {
        Self {
            cell,
            aggregates: Vec::new(),
            drilldown: Drilldown::default(),
            split: None,
            paging: PagingSpec::default(),
            order: OrderSpec::default(),
        }
    }
}

/// Fact listing
#[derive(Debug, Clone)]
pub struct FactsRequest {
    pub cell: Cell,
    /// Attribute references to return
    pub fields: Vec<String>,
    pub paging: PagingSpec,
    pub order: OrderSpec,
}

/// Member listing of one dimension
#[derive(Debug, Clone)]
pub struct MembersRequest {
    pub cell: Cell,
    pub dimension: String,
    /// Resolved hierarchy name
    pub hierarchy: String,
    pub depth: usize,
    pub paging: PagingSpec,
}

/// Aggregation result returned unmodified to the client
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregationResult {
    pub cell: Value,
    pub aggregates: Vec<String>,
    pub summary: Map<String, Value>,
    pub cells: Vec<FactRow>,
    /// Drilled dimension to the level names it was drilled through
    pub levels: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cell_count: Option<usize>,
}

/// Members response: the request echo plus the engine's member records
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MembersResult {
    pub dimension: String,
    pub hierarchy: String,
    pub depth: usize,
    pub data: Vec<FactRow>,
}

/// One query inside a report
#[derive(Debug, Clone)]
pub enum ReportQuery {
    Aggregate(AggregationRequest),
    Facts(FactsRequest),
    Fact { cube: Arc<Cube>, id: String },
    Members(MembersRequest),
    /// Cut details of the report cell
    Details(Cell),
    /// Dictionary form of the report cell
    Cell(Cell),
}

impl ReportQuery {
    /// Query type name as written in report bodies
    pub fn type_name(&self) -> &'static str {
        match self {
            ReportQuery::Aggregate(_) => "aggregate",
            ReportQuery::Facts(_) => "facts",
            ReportQuery::Fact { .. } => "fact",
            ReportQuery::Members(_) => "members",
            ReportQuery::Details(_) => "details",
            ReportQuery::Cell(_) => "cell",
        }
    }
}

/// A report query with its result name
#[derive(Debug, Clone)]
pub struct NamedQuery {
    pub name: String,
    pub query: ReportQuery,
}
