//! Core trait definitions for pluggable engines

use crate::cell::Cell;
use crate::error::Result;
use crate::model::{Cube, FactRow, HierarchyLimits};
use crate::query::request::{
    AggregationRequest, AggregationResult, FactsRequest, MembersRequest, MembersResult,
    NamedQuery, ReportQuery,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;

// =============================================================================
// Identity
// =============================================================================

/// Requesting user as seen by the authorizer
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Identity(Option<String>);

impl Identity {
    /// Anonymous requester
    pub fn anonymous() -> Self {
        Self(None)
    }

    /// Named requester; blank names are anonymous
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.trim().is_empty() {
            Self(None)
        } else {
            Self(Some(name))
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "<anonymous>"),
        }
    }
}

// =============================================================================
// Browser Trait
// =============================================================================

/// Actions a browser can serve, reported in the cube model
pub const BROWSER_ACTIONS: [&str; 6] = ["aggregate", "fact", "facts", "members", "cell", "report"];

/// Core trait for cube browsing engines
///
/// Requests arrive fully validated and restricted; engines execute them and
/// return payloads without further interpretation by the HTTP layer.
#[async_trait]
pub trait Browser: Send + Sync + 'static {
    /// Unique identifier for this engine
    fn engine_id(&self) -> &str;

    /// Features advertised for a cube
    fn features(&self, _cube: &Cube) -> Value {
        serde_json::json!({ "actions": BROWSER_ACTIONS })
    }

    /// Aggregate a cell, optionally drilled down
    async fn aggregate(&self, request: &AggregationRequest) -> Result<AggregationResult>;

    /// Detail payload for every cut of the cell, in cut order
    async fn cell_details(&self, cell: &Cell) -> Result<Vec<Value>>;

    /// Fact listing
    async fn facts(&self, request: &FactsRequest) -> Result<Vec<FactRow>>;

    /// Single fact by key; unknown keys are `Error::NotFound`
    async fn fact(&self, cube: &Cube, id: &str) -> Result<FactRow>;

    /// Distinct members of a dimension down to the requested depth
    async fn members(&self, request: &MembersRequest) -> Result<Vec<FactRow>>;

    /// Run several named queries and collect their results by name
    async fn report(&self, queries: &[NamedQuery]) -> Result<Map<String, Value>> {
        let mut report = Map::new();
        for named in queries {
            let value = match &named.query {
                ReportQuery::Aggregate(request) => serde_json::to_value(self.aggregate(request).await?)?,
                ReportQuery::Facts(request) => Value::Array(
                    self.facts(request)
                        .await?
                        .into_iter()
                        .map(Value::Object)
                        .collect(),
                ),
                ReportQuery::Fact { cube, id } => Value::Object(self.fact(cube, id).await?),
                ReportQuery::Members(request) => {
                    let data = self.members(request).await?;
                    serde_json::to_value(MembersResult {
                        dimension: request.dimension.clone(),
                        hierarchy: request.hierarchy.clone(),
                        depth: request.depth,
                        data,
                    })?
                }
                ReportQuery::Details(cell) => Value::Array(self.cell_details(cell).await?),
                ReportQuery::Cell(cell) => cell.to_json(),
            };
            report.insert(named.name.clone(), value);
        }
        Ok(report)
    }
}

// =============================================================================
// Authorizer Trait
// =============================================================================

/// Access control over cubes and cells
#[async_trait]
pub trait Authorizer: Send + Sync + 'static {
    /// True if the identity may use the cube at all
    async fn authorize(&self, identity: &Identity, cube: &Cube) -> Result<bool>;

    /// Narrow a cell to what the identity may see
    ///
    /// Implementations may only add restrictions; the returned cell must never
    /// select anything the input cell does not.
    async fn restricted_cell(&self, identity: &Identity, cube: &Cube, cell: Cell) -> Result<Cell>;

    /// Hierarchies shown to the identity only down to a level
    async fn hierarchy_limits(&self, _identity: &Identity, _cube: &Cube) -> Result<HierarchyLimits> {
        Ok(HierarchyLimits::new())
    }
}
