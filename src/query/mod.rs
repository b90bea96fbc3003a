//! Query dispatch
//!
//! Each endpoint resolves the cube, builds and restricts the cell, normalizes
//! its parameters and only then calls the browser exactly once. Every
//! validation failure surfaces before the engine sees the request.

pub mod report;
pub mod request;

pub use report::ReportBody;
pub use request::{
    AggregationRequest, AggregationResult, FactsRequest, MembersRequest, MembersResult,
    NamedQuery, ReportQuery,
};

use crate::cell::{cuts_from_strings, Cell};
use crate::engine::{Identity, Workspace};
use crate::error::{Error, Result};
use crate::model::{Cube, FactRow, HierarchyLimits};
use crate::request::{
    resolve_depth, resolve_fields, Drilldown, OrderSpec, PagingSpec, RequestParams,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Version of the HTTP API
pub const API_VERSION: u32 = 2;

/// Parameter carrying cuts of the main cell
pub const CUT_PARAM: &str = "cut";
/// Parameter carrying cuts of the split cell
pub const SPLIT_PARAM: &str = "split";

/// Per-request dispatcher bound to a workspace and an identity
#[derive(Debug, Clone)]
pub struct QueryContext {
    workspace: Arc<Workspace>,
    identity: Identity,
}

impl QueryContext {
    pub fn new(workspace: Arc<Workspace>, identity: Identity) -> Self {
        Self {
            workspace,
            identity,
        }
    }

    pub fn workspace(&self) -> &Arc<Workspace> {
        &self.workspace
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Cube by name; unknown or inaccessible cubes are `NotFound`
    pub async fn cube(&self, name: &str) -> Result<Arc<Cube>> {
        self.workspace.cube(name, &self.identity).await
    }

    /// Cell from every occurrence of `argname`, optionally restricted
    ///
    /// No cuts yields the whole cube.
    pub async fn cell(
        &self,
        cube: &Arc<Cube>,
        params: &RequestParams,
        argname: &str,
        restrict: bool,
    ) -> Result<Cell> {
        let cuts = cuts_from_strings(cube, params.get_all(argname), self.workspace.converters())?;
        let cell = Cell::new(cube.clone(), cuts);
        if restrict {
            self.restrict(cube, cell).await
        } else {
            Ok(cell)
        }
    }

    async fn restrict(&self, cube: &Arc<Cube>, cell: Cell) -> Result<Cell> {
        match self.workspace.authorizer() {
            Some(authorizer) => authorizer.restricted_cell(&self.identity, cube, cell).await,
            None => Ok(cell),
        }
    }

    /// Aggregate the requested cell
    pub async fn aggregate(&self, cube_name: &str, params: &RequestParams) -> Result<AggregationResult> {
        let cube = self.cube(cube_name).await?;
        let cell = self.cell(&cube, params, CUT_PARAM, true).await?;

        let aggregates = params.get_list("aggregates");
        for aggregate in &aggregates {
            cube.aggregate(aggregate)?;
        }
        let drilldown = Drilldown::parse(&cube, &params.get_list("drilldown"))?;
        let split = if params.contains(SPLIT_PARAM) {
            let split = self.cell(&cube, params, SPLIT_PARAM, false).await?;
            (!split.is_whole_cube()).then_some(split)
        } else {
            None
        };

        let request = AggregationRequest {
            cell,
            aggregates,
            drilldown,
            split,
            paging: PagingSpec::from_params(params),
            order: OrderSpec::from_params(params)?,
        };
        debug!(cube = %cube.name, cell = %request.cell, "Dispatching aggregate");
        self.workspace.browser().aggregate(&request).await
    }

    /// Cell dictionary with engine details attached to each cut
    pub async fn cell_details(&self, cube_name: &str, params: &RequestParams) -> Result<Value> {
        let cube = self.cube(cube_name).await?;
        let cell = self.cell(&cube, params, CUT_PARAM, true).await?;
        let details = self.workspace.browser().cell_details(&cell).await?;

        if details.len() != cell.cuts().len() {
            return Err(Error::Engine(format!(
                "Browser returned {} cut details for {} cuts",
                details.len(),
                cell.cuts().len()
            )));
        }

        let cuts: Vec<Value> = cell
            .cuts()
            .iter()
            .zip(details)
            .map(|(cut, detail)| {
                let mut value = cut.to_json();
                if let Value::Object(object) = &mut value {
                    object.insert("details".into(), detail);
                }
                value
            })
            .collect();

        Ok(serde_json::json!({
            "cube": cell.cube_name(),
            "cuts": cuts,
        }))
    }

    /// Paged fact listing
    pub async fn facts(&self, cube_name: &str, params: &RequestParams) -> Result<Vec<FactRow>> {
        let cube = self.cube(cube_name).await?;
        let cell = self.cell(&cube, params, CUT_PARAM, true).await?;
        let request = FactsRequest {
            fields: resolve_fields(&cube, params.get("fields"))?,
            paging: PagingSpec::from_params(params),
            order: OrderSpec::from_params(params)?,
            cell,
        };
        self.workspace.browser().facts(&request).await
    }

    /// Single fact by id
    pub async fn fact(&self, cube_name: &str, id: &str) -> Result<FactRow> {
        let cube = self.cube(cube_name).await?;
        self.workspace.browser().fact(&cube, id).await
    }

    /// Members of one dimension
    pub async fn members(
        &self,
        cube_name: &str,
        dimension_name: &str,
        params: &RequestParams,
    ) -> Result<MembersResult> {
        let cube = self.cube(cube_name).await?;
        let cell = self.cell(&cube, params, CUT_PARAM, true).await?;

        let dimension = cube.dimension(dimension_name)?;
        let hierarchy = dimension.hierarchy(params.get_non_empty("hierarchy"))?;
        let depth = resolve_depth(hierarchy, params.get("depth"), params.get("level"))?;

        let request = MembersRequest {
            cell,
            dimension: dimension.name.clone(),
            hierarchy: hierarchy.name.clone(),
            depth,
            paging: PagingSpec::from_params(params),
        };
        let data = self.workspace.browser().members(&request).await?;

        Ok(MembersResult {
            dimension: request.dimension,
            hierarchy: request.hierarchy,
            depth: request.depth,
            data,
        })
    }

    /// Run the named queries of a report body
    pub async fn report(
        &self,
        cube_name: &str,
        params: &RequestParams,
        body: &Value,
    ) -> Result<Map<String, Value>> {
        let cube = self.cube(cube_name).await?;
        let converters = self.workspace.converters();
        let report = ReportBody::parse(&cube, body, converters)?;

        let cell = match report.cell {
            Some(cuts) => {
                info!(
                    cube = %cube.name,
                    "Using cell from report request (URL parameters are ignored)"
                );
                self.restrict(&cube, Cell::new(cube.clone(), cuts)).await?
            }
            None => self.cell(&cube, params, CUT_PARAM, true).await?,
        };

        let queries = report
            .queries
            .iter()
            .map(|(name, spec)| report::build_query(&cell, name, spec, converters))
            .collect::<Result<Vec<NamedQuery>>>()?;

        debug!(cube = %cube.name, queries = queries.len(), "Dispatching report");
        self.workspace.browser().report(&queries).await
    }

    /// Cube model with the browser's features, hierarchies cut at the identity's limits
    pub async fn model(&self, cube_name: &str) -> Result<Value> {
        let cube = self.cube(cube_name).await?;
        let limits = match self.workspace.authorizer() {
            Some(authorizer) => authorizer.hierarchy_limits(&self.identity, &cube).await?,
            None => HierarchyLimits::new(),
        };
        let mut model = cube.to_json_limited(&limits);
        if let Value::Object(object) = &mut model {
            object.insert("features".into(), self.workspace.browser().features(&cube));
        }
        Ok(model)
    }

    /// Cubes visible to the identity
    pub async fn list_cubes(&self) -> Result<Vec<Value>> {
        Ok(self
            .workspace
            .list_cubes(&self.identity)
            .await?
            .iter()
            .map(|cube| cube.summary_json())
            .collect())
    }

    /// Workspace info with server and calendar details
    pub fn info(&self) -> Map<String, Value> {
        let calendar = self.workspace.calendar();
        let mut info = self.workspace.info().clone();
        info.insert("cubes_version".into(), Value::from(env!("CARGO_PKG_VERSION")));
        info.insert("timezone".into(), Value::from(calendar.timezone()));
        info.insert(
            "first_weekday".into(),
            Value::from(calendar.first_weekday().num_days_from_monday()),
        );
        info.insert("api_version".into(), Value::from(API_VERSION));
        info
    }
}
