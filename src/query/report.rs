//! Report body parsing
//!
//! A report body names several queries that run against one cell:
//!
//! ```json
//! {
//!   "queries": {
//!     "by_year": {"query": "aggregate", "drilldown": "date", "aggregates": ["amount_sum"]},
//!     "latest":  {"query": "facts", "fields": "date.year,amount", "order": "id:desc", "pagesize": 5},
//!     "years":   {"query": "members", "dimension": "date", "level": "year"}
//!   },
//!   "cell": [{"type": "point", "dimension": "date", "path": [2024]}]
//! }
//! ```
//!
//! A non-empty `cell` replaces the cuts of the request URL.

use super::request::{
    AggregationRequest, FactsRequest, MembersRequest, NamedQuery, ReportQuery,
};
use crate::cell::{cuts_from_string, validate_cut, Cell, Cut, RoleConverters};
use crate::error::{Error, Result};
use crate::model::Cube;
use crate::request::{resolve_depth, resolve_fields, Drilldown, OrderSpec, PagingSpec};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Parsed top level of a report body
#[derive(Debug, Clone)]
pub struct ReportBody {
    /// Query definitions in body order
    pub queries: Vec<(String, Map<String, Value>)>,
    /// Cuts replacing the URL cell; `None` when absent or empty
    pub cell: Option<Vec<Cut>>,
}

impl ReportBody {
    /// Parse and validate the body structure against the cube
    pub fn parse(cube: &Cube, body: &Value, converters: &RoleConverters) -> Result<Self> {
        let object = body
            .as_object()
            .ok_or_else(|| Error::validation("Report request must be a JSON object"))?;

        let queries = match object.get("queries") {
            None => {
                return Err(Error::validation(
                    "Report request does not contain 'queries' key",
                ))
            }
            Some(Value::Object(queries)) => queries
                .iter()
                .map(|(name, spec)| Ok((name.clone(), query_object(name, spec)?)))
                .collect::<Result<Vec<_>>>()?,
            Some(Value::Array(queries)) => queries
                .iter()
                .enumerate()
                .map(|(index, spec)| {
                    let name = spec
                        .get("name")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| index.to_string());
                    Ok((name.clone(), query_object(&name, spec)?))
                })
                .collect::<Result<Vec<_>>>()?,
            Some(other) => {
                return Err(Error::validation(format!(
                    "Report 'queries' must be an object, got {}",
                    other
                )))
            }
        };

        let cell = match object.get("cell") {
            None | Some(Value::Null) => None,
            Some(Value::Array(cuts)) if cuts.is_empty() => None,
            Some(Value::Array(cuts)) => {
                let mut parsed = Vec::with_capacity(cuts.len());
                for cut in cuts {
                    parsed.extend(report_cut(cube, cut, converters)?);
                }
                Some(parsed)
            }
            Some(Value::String(text)) if text.is_empty() => None,
            Some(Value::String(text)) => Some(cuts_from_string(cube, text, converters)?),
            Some(other) => {
                return Err(Error::validation(format!(
                    "Report 'cell' must be a list of cuts, got {}",
                    other
                )))
            }
        };

        Ok(Self { queries, cell })
    }
}

fn query_object(name: &str, spec: &Value) -> Result<Map<String, Value>> {
    spec.as_object().cloned().ok_or_else(|| {
        Error::validation(format!("Report query '{}' must be an object", name))
    })
}

/// Cut from its dictionary form (or a cut string), checked against the cube
fn report_cut(cube: &Cube, value: &Value, converters: &RoleConverters) -> Result<Vec<Cut>> {
    if let Value::String(text) = value {
        return cuts_from_string(cube, text, converters);
    }
    let cut = Cut::from_json(value)
        .map_err(|e| Error::validation(format!("Invalid cut in report cell: {}", e)))?;
    validate_cut(cube, &cut, &value.to_string())?;
    Ok(vec![cut])
}

fn string_param(spec: &Map<String, Value>, key: &str) -> Option<String> {
    match spec.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn list_param(spec: &Map<String, Value>, key: &str, separator: char) -> Result<Vec<String>> {
    match spec.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(text)) => Ok(text
            .split(separator)
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    Error::validation(format!("Invalid '{}' entry {}", key, item))
                })
            })
            .collect(),
        Some(other) => Err(Error::validation(format!("Invalid '{}' value {}", key, other))),
    }
}

/// Build one report query against the report cell
pub fn build_query(
    cell: &Cell,
    name: &str,
    spec: &Map<String, Value>,
    converters: &RoleConverters,
) -> Result<NamedQuery> {
    let cube: &Arc<Cube> = cell.cube();
    let query_type = spec
        .get("query")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::validation(format!("Report query '{}' has no 'query' type", name)))?;
    let spec_value = Value::Object(spec.clone());
    let paging = PagingSpec::from_json(&spec_value);

    let query = match query_type {
        "aggregate" => {
            let aggregates = list_param(spec, "aggregates", '|')?;
            for aggregate in &aggregates {
                cube.aggregate(aggregate)?;
            }
            let split = match string_param(spec, "split") {
                Some(text) => Some(Cell::new(
                    cube.clone(),
                    cuts_from_string(cube, &text, converters)?,
                )),
                None => None,
            };
            ReportQuery::Aggregate(AggregationRequest {
                cell: cell.clone(),
                aggregates,
                drilldown: Drilldown::from_json(cube, spec.get("drilldown"))?,
                split,
                paging,
                order: OrderSpec::from_json(spec.get("order"))?,
            })
        }
        "facts" => {
            let fields = list_param(spec, "fields", ',')?;
            let fields = resolve_fields(cube, Some(&fields.join(",")))?;
            ReportQuery::Facts(FactsRequest {
                cell: cell.clone(),
                fields,
                paging,
                order: OrderSpec::from_json(spec.get("order"))?,
            })
        }
        "fact" => {
            let id = string_param(spec, "id")
                .or_else(|| string_param(spec, "key"))
                .ok_or_else(|| {
                    Error::validation(format!("Report query '{}' requires an 'id'", name))
                })?;
            ReportQuery::Fact {
                cube: cube.clone(),
                id,
            }
        }
        "members" | "values" => {
            let dimension_name = string_param(spec, "dimension").ok_or_else(|| {
                Error::validation(format!("Report query '{}' requires a 'dimension'", name))
            })?;
            let dimension = cube.dimension(&dimension_name)?;
            let hierarchy_name = string_param(spec, "hierarchy");
            let hierarchy = dimension.hierarchy(hierarchy_name.as_deref())?;
            let depth = resolve_depth(
                hierarchy,
                string_param(spec, "depth").as_deref(),
                string_param(spec, "level").as_deref(),
            )?;
            ReportQuery::Members(MembersRequest {
                cell: cell.clone(),
                dimension: dimension.name.clone(),
                hierarchy: hierarchy.name.clone(),
                depth,
                paging,
            })
        }
        "details" => ReportQuery::Details(cell.clone()),
        "cell" => ReportQuery::Cell(cell.clone()),
        other => {
            return Err(Error::validation(format!(
                "Unknown report query type '{}' in query '{}'",
                other, name
            )))
        }
    };

    Ok(NamedQuery {
        name: name.to_string(),
        query,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cube() -> Arc<Cube> {
        Arc::new(
            serde_json::from_value(json!({
                "name": "sales",
                "dimensions": [
                    {"name": "date", "levels": [{"name": "year"}, {"name": "month"}]},
                    {"name": "product"}
                ],
                "measures": [{"name": "amount"}]
            }))
            .unwrap(),
        )
    }

    fn parse(body: Value) -> Result<ReportBody> {
        ReportBody::parse(&cube(), &body, &RoleConverters::new())
    }

    #[test]
    fn test_missing_queries_rejected() {
        let err = parse(json!({"cell": []})).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("queries"));
        assert!(parse(json!([1, 2])).is_err());
    }

    #[test]
    fn test_cell_forms() {
        let body = parse(json!({"queries": {}, "cell": []})).unwrap();
        assert!(body.cell.is_none());

        let body = parse(json!({
            "queries": {},
            "cell": [{"type": "point", "dimension": "date", "path": [2024]}, "product:tea"]
        }))
        .unwrap();
        let cuts = body.cell.unwrap();
        assert_eq!(cuts.len(), 2);
        assert_eq!(cuts[0], Cut::point("date", vec!["2024".into()]));

        assert!(parse(json!({"queries": {}, "cell": [{"type": "point", "dimension": "store", "path": [1]}]})).is_err());
    }

    #[test]
    fn test_cell_dictionaries_validated_like_strings() {
        for cut in [
            json!({"type": "point", "dimension": "date", "path": [2024, 1, 1, 1]}),
            json!({"type": "range", "dimension": "date"}),
            json!({"type": "point", "dimension": "date", "path": []}),
        ] {
            match parse(json!({"queries": {}, "cell": [cut.clone()]})) {
                Err(Error::CutParse { cut: text, .. }) => assert!(text.contains("date"), "{}", text),
                other => panic!("expected cut parse error for {}, got {:?}", cut, other),
            }
        }
    }

    #[test]
    fn test_queries_keep_body_order() {
        let body = parse(json!({"queries": {
            "zeta": {"query": "cell"},
            "alpha": {"query": "details"},
            "mid": {"query": "aggregate"}
        }}))
        .unwrap();
        let names: Vec<&str> = body.queries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_queries_as_list() {
        let body = parse(json!({"queries": [{"name": "a", "query": "cell"}, {"query": "details"}]})).unwrap();
        let names: Vec<&str> = body.queries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "1"]);
    }

    #[test]
    fn test_build_queries() {
        let cube = cube();
        let cell = Cell::whole(cube);
        let converters = RoleConverters::new();
        let spec = |value: Value| value.as_object().cloned().unwrap();

        let aggregate = build_query(
            &cell,
            "by_year",
            &spec(json!({"query": "aggregate", "drilldown": ["date:year"], "aggregates": "amount_sum", "pagesize": "5"})),
            &converters,
        )
        .unwrap();
        match aggregate.query {
            ReportQuery::Aggregate(request) => {
                assert_eq!(request.aggregates, vec!["amount_sum"]);
                assert_eq!(request.drilldown.items()[0].depth, Some(1));
                assert_eq!(request.paging.limit(), Some(5));
            }
            other => panic!("unexpected {:?}", other),
        }

        let members = build_query(
            &cell,
            "years",
            &spec(json!({"query": "values", "dimension": "date", "level": "month"})),
            &converters,
        )
        .unwrap();
        assert_eq!(members.query.type_name(), "members");
        match members.query {
            ReportQuery::Members(request) => assert_eq!(request.depth, 2),
            other => panic!("unexpected {:?}", other),
        }

        for bad in [
            json!({"query": "pivot"}),
            json!({"drilldown": "date"}),
            json!({"query": "aggregate", "aggregates": ["nope"]}),
            json!({"query": "members", "dimension": "date", "depth": 1, "level": "year"}),
            json!({"query": "fact"}),
        ] {
            assert!(build_query(&cell, "q", &spec(bad.clone()), &converters).is_err(), "{}", bad);
        }
    }
}
