//! In-memory browser
//!
//! Serves every browser operation from fact rows held in memory. Rows are
//! JSON objects keyed by attribute reference (`date.year`, `product`,
//! `amount`). Intended for small models, tests and development.
//!
//! Member keys are compared numerically when both sides parse as numbers
//! and as strings otherwise, so `2` sorts before `10`.

use super::traits::Browser;
use crate::cell::{Cell, Cut, CutKind, Path};
use crate::error::{Error, Result};
use crate::model::{Aggregate, AggregateFunction, Cube, Dimension, FactRow, Hierarchy, Model};
use crate::query::request::{
    AggregationRequest, AggregationResult, FactsRequest, MembersRequest,
};
use crate::request::{OrderDirection, OrderSpec, PagingSpec};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

/// Output key flagging aggregation cells inside the split cell
pub const SPLIT_DIMENSION: &str = "__within_split__";

/// Browser over in-memory fact rows
#[derive(Debug, Default)]
pub struct MemoryBrowser {
    facts: RwLock<HashMap<String, Vec<FactRow>>>,
}

impl MemoryBrowser {
    /// Browser without any facts
    pub fn new() -> Self {
        Self::default()
    }

    /// Browser over the inline facts of a model
    pub fn from_model(model: &Model) -> Self {
        Self {
            facts: RwLock::new(model.facts.clone()),
        }
    }

    /// Add facts for a cube
    pub fn with_facts(self, cube: impl Into<String>, rows: Vec<FactRow>) -> Self {
        self.insert_facts(cube, rows);
        self
    }

    /// Append facts for a cube
    pub fn insert_facts(&self, cube: impl Into<String>, rows: Vec<FactRow>) {
        self.facts.write().entry(cube.into()).or_default().extend(rows);
    }

    /// Number of facts held for a cube
    pub fn fact_count(&self, cube: &str) -> usize {
        self.facts.read().get(cube).map_or(0, Vec::len)
    }

    fn rows(&self, cube: &str) -> Vec<FactRow> {
        self.facts.read().get(cube).cloned().unwrap_or_default()
    }

    fn cell_rows(&self, cell: &Cell) -> Result<Vec<FactRow>> {
        let filter = CellFilter::new(cell)?;
        Ok(self
            .rows(cell.cube_name())
            .into_iter()
            .filter(|row| filter.matches(row))
            .collect())
    }
}

// =============================================================================
// Key comparison
// =============================================================================

fn member_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn compare_keys(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

fn compare_paths(a: &[String], b: &[String]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        match compare_keys(x, y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a.and_then(member_key), b.and_then(member_key)) {
        (Some(x), Some(y)) => compare_keys(&x, &y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn row_path(row: &FactRow, key_refs: &[String], depth: usize) -> Option<Path> {
    key_refs
        .iter()
        .take(depth)
        .map(|reference| row.get(reference).and_then(member_key))
        .collect()
}

fn level_key_refs(dimension: &Dimension, hierarchy: &Hierarchy) -> Vec<String> {
    hierarchy
        .levels
        .iter()
        .map(|level| dimension.key_ref(level))
        .collect()
}

// =============================================================================
// Cell filtering
// =============================================================================

struct CutFilter {
    key_refs: Vec<String>,
    kind: CutKind,
    invert: bool,
}

impl CutFilter {
    fn new(cube: &Cube, cut: &Cut) -> Result<Self> {
        let dimension = cube.dimension(&cut.dimension)?;
        let hierarchy = dimension.hierarchy(cut.hierarchy.as_deref())?;
        Ok(Self {
            key_refs: level_key_refs(dimension, hierarchy),
            kind: cut.kind.clone(),
            invert: cut.invert,
        })
    }

    fn path_equals(&self, row: &FactRow, path: &[String]) -> bool {
        match row_path(row, &self.key_refs, path.len()) {
            Some(actual) => actual.len() == path.len() && compare_paths(&actual, path) == Ordering::Equal,
            None => false,
        }
    }

    fn matches(&self, row: &FactRow) -> bool {
        let selected = match &self.kind {
            CutKind::Point { path } => self.path_equals(row, path),
            CutKind::Set { paths } => paths.iter().any(|path| self.path_equals(row, path)),
            CutKind::Range { from, to } => {
                let above = from.as_ref().map_or(true, |from| {
                    row_path(row, &self.key_refs, from.len())
                        .filter(|actual| actual.len() == from.len())
                        .is_some_and(|actual| compare_paths(&actual, from) != Ordering::Less)
                });
                let below = to.as_ref().map_or(true, |to| {
                    row_path(row, &self.key_refs, to.len())
                        .filter(|actual| actual.len() == to.len())
                        .is_some_and(|actual| compare_paths(&actual, to) != Ordering::Greater)
                });
                above && below
            }
        };
        selected != self.invert
    }
}

struct CellFilter {
    cuts: Vec<CutFilter>,
}

impl CellFilter {
    fn new(cell: &Cell) -> Result<Self> {
        let cuts = cell
            .cuts()
            .iter()
            .map(|cut| CutFilter::new(cell.cube(), cut))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { cuts })
    }

    fn matches(&self, row: &FactRow) -> bool {
        self.cuts.iter().all(|cut| cut.matches(row))
    }
}

// =============================================================================
// Aggregation
// =============================================================================

enum Numeric {
    Int(i64),
    Float(f64),
}

impl Numeric {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Numeric::Int(i)),
                None => n.as_f64().map(Numeric::Float),
            },
            Value::String(s) => s
                .parse::<i64>()
                .map(Numeric::Int)
                .or_else(|_| s.parse::<f64>().map(Numeric::Float))
                .ok(),
            _ => None,
        }
    }

    fn as_f64(&self) -> f64 {
        match self {
            Numeric::Int(i) => *i as f64,
            Numeric::Float(f) => *f,
        }
    }
}

fn compute_aggregate(aggregate: &Aggregate, rows: &[&FactRow]) -> Value {
    let measure = match (&aggregate.function, &aggregate.measure) {
        (AggregateFunction::Count, _) | (_, None) => return Value::from(rows.len()),
        (_, Some(measure)) => measure,
    };
    let values: Vec<Numeric> = rows
        .iter()
        .filter_map(|row| row.get(measure).and_then(Numeric::from_value))
        .collect();
    let all_ints = values.iter().all(|v| matches!(v, Numeric::Int(_)));
    let ints = || values.iter().filter_map(|v| match v {
        Numeric::Int(i) => Some(*i),
        Numeric::Float(_) => None,
    });
    let floats = || values.iter().map(Numeric::as_f64);

    match aggregate.function {
        AggregateFunction::Count => Value::from(rows.len()),
        AggregateFunction::Sum => {
            if all_ints {
                if let Some(sum) = ints().try_fold(0i64, |acc, v| acc.checked_add(v)) {
                    return Value::from(sum);
                }
            }
            Value::from(floats().sum::<f64>())
        }
        AggregateFunction::Min => {
            if values.is_empty() {
                Value::Null
            } else if all_ints {
                ints().min().map_or(Value::Null, Value::from)
            } else {
                Value::from(floats().fold(f64::INFINITY, f64::min))
            }
        }
        AggregateFunction::Max => {
            if values.is_empty() {
                Value::Null
            } else if all_ints {
                ints().max().map_or(Value::Null, Value::from)
            } else {
                Value::from(floats().fold(f64::NEG_INFINITY, f64::max))
            }
        }
        AggregateFunction::Avg => {
            if values.is_empty() {
                Value::Null
            } else {
                Value::from(floats().sum::<f64>() / values.len() as f64)
            }
        }
    }
}

fn selected_aggregates<'a>(cube: &'a Cube, names: &[String]) -> Result<Vec<&'a Aggregate>> {
    if names.is_empty() {
        Ok(cube.aggregates.iter().collect())
    } else {
        names.iter().map(|name| cube.aggregate(name)).collect()
    }
}

struct DrillLevels {
    dimension: String,
    level_names: Vec<String>,
    key_refs: Vec<String>,
    attribute_refs: Vec<String>,
}

fn drill_levels(request: &AggregationRequest) -> Result<Vec<DrillLevels>> {
    let cube = request.cell.cube();
    request
        .drilldown
        .items()
        .iter()
        .map(|item| {
            let dimension = cube.dimension(&item.dimension)?;
            let hierarchy = dimension.hierarchy(item.hierarchy.as_deref())?;
            let depth = item
                .depth
                .unwrap_or_else(|| {
                    request
                        .cell
                        .cut_for_dimension(&dimension.name)
                        .map_or(1, |cut| cut.level_depth() + 1)
                })
                .clamp(1, hierarchy.len().max(1));
            let levels = &hierarchy.levels[..depth.min(hierarchy.len())];
            Ok(DrillLevels {
                dimension: dimension.name.clone(),
                level_names: levels.iter().map(|level| level.name.clone()).collect(),
                key_refs: levels.iter().map(|level| dimension.key_ref(level)).collect(),
                attribute_refs: levels
                    .iter()
                    .flat_map(|level| level.attribute_names())
                    .map(|attribute| dimension.attribute_ref(attribute))
                    .collect(),
            })
        })
        .collect()
}

fn group_key(row: &FactRow, drills: &[DrillLevels], within_split: Option<bool>) -> Vec<String> {
    let mut key: Vec<String> = drills
        .iter()
        .flat_map(|drill| drill.key_refs.iter())
        .map(|reference| row.get(reference).and_then(member_key).unwrap_or_default())
        .collect();
    if let Some(flag) = within_split {
        key.push(flag.to_string());
    }
    key
}

// =============================================================================
// Ordering and paging
// =============================================================================

fn apply_order(rows: &mut [FactRow], order: &OrderSpec) {
    if order.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for item in order.items() {
            let ordering = compare_values(a.get(&item.field), b.get(&item.field));
            let ordering = match item.direction {
                Some(OrderDirection::Desc) => ordering.reverse(),
                _ => ordering,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn apply_paging<T>(rows: Vec<T>, paging: &PagingSpec) -> Vec<T> {
    let iter = rows.into_iter().skip(paging.offset());
    match paging.limit() {
        Some(limit) => iter.take(limit).collect(),
        None => iter.collect(),
    }
}

fn path_details(
    dimension: &Dimension,
    hierarchy: &Hierarchy,
    path: &[String],
    rows: &[FactRow],
) -> Value {
    let key_refs = level_key_refs(dimension, hierarchy);
    let details: Vec<Value> = hierarchy
        .levels
        .iter()
        .zip(path)
        .enumerate()
        .map(|(index, (level, key))| {
            let prefix = &path[..=index];
            let row = rows.iter().find(|row| {
                row_path(row, &key_refs, prefix.len())
                    .is_some_and(|actual| compare_paths(&actual, prefix) == Ordering::Equal)
            });
            let mut detail = Map::new();
            for attribute in level.attribute_names() {
                let reference = dimension.attribute_ref(attribute);
                let value = row
                    .and_then(|row| row.get(&reference).cloned())
                    .unwrap_or(Value::Null);
                detail.insert(reference, value);
            }
            let label = row
                .and_then(|row| row.get(&dimension.label_ref(level)).cloned())
                .unwrap_or_else(|| Value::from(key.clone()));
            detail.insert("_key".into(), Value::from(key.clone()));
            detail.insert("_label".into(), label);
            Value::Object(detail)
        })
        .collect();
    Value::Array(details)
}

#[async_trait]
impl Browser for MemoryBrowser {
    fn engine_id(&self) -> &str {
        "memory"
    }

    async fn aggregate(&self, request: &AggregationRequest) -> Result<AggregationResult> {
        let cube = request.cell.cube();
        let aggregates = selected_aggregates(cube, &request.aggregates)?;
        let drills = drill_levels(request)?;
        let split = request.split.as_ref().map(CellFilter::new).transpose()?;
        let rows = self.cell_rows(&request.cell)?;
        let row_refs: Vec<&FactRow> = rows.iter().collect();

        let mut summary = Map::new();
        for aggregate in &aggregates {
            summary.insert(aggregate.name.clone(), compute_aggregate(aggregate, &row_refs));
        }

        let mut levels = Map::new();
        for drill in &drills {
            levels.insert(drill.dimension.clone(), Value::from(drill.level_names.clone()));
        }

        let mut cells = Vec::new();
        let mut total_cell_count = None;
        if !drills.is_empty() || split.is_some() {
            let mut groups: Vec<(Vec<String>, Option<bool>, Vec<&FactRow>)> = Vec::new();
            let mut index: HashMap<Vec<String>, usize> = HashMap::new();
            for row in &rows {
                let within = split.as_ref().map(|filter| filter.matches(row));
                let key = group_key(row, &drills, within);
                match index.get(&key) {
                    Some(&position) => groups[position].2.push(row),
                    None => {
                        index.insert(key.clone(), groups.len());
                        groups.push((key, within, vec![row]));
                    }
                }
            }
            groups.sort_by(|a, b| compare_paths(&a.0, &b.0));

            for (_, within, members) in &groups {
                let mut record = Map::new();
                for drill in &drills {
                    for reference in &drill.attribute_refs {
                        let value = members[0].get(reference).cloned().unwrap_or(Value::Null);
                        record.insert(reference.clone(), value);
                    }
                }
                if let Some(flag) = within {
                    record.insert(SPLIT_DIMENSION.to_string(), Value::from(*flag));
                }
                for aggregate in &aggregates {
                    record.insert(aggregate.name.clone(), compute_aggregate(aggregate, members));
                }
                cells.push(record);
            }

            apply_order(&mut cells, &request.order);
            total_cell_count = Some(cells.len());
            cells = apply_paging(cells, &request.paging);
        }

        debug!(
            cube = %cube.name,
            rows = rows.len(),
            cells = cells.len(),
            "Aggregated cell"
        );

        Ok(AggregationResult {
            cell: request.cell.to_json(),
            aggregates: aggregates.iter().map(|a| a.name.clone()).collect(),
            summary,
            cells,
            levels,
            total_cell_count,
        })
    }

    async fn cell_details(&self, cell: &Cell) -> Result<Vec<Value>> {
        let cube = cell.cube();
        let rows = self.rows(&cube.name);
        cell.cuts()
            .iter()
            .map(|cut| {
                let dimension = cube.dimension(&cut.dimension)?;
                let hierarchy = dimension.hierarchy(cut.hierarchy.as_deref())?;
                let details = |path: &Path| path_details(dimension, hierarchy, path, &rows);
                Ok(match &cut.kind {
                    CutKind::Point { path } => details(path),
                    CutKind::Range { from, to } => serde_json::json!({
                        "from": from.as_ref().map(details),
                        "to": to.as_ref().map(details),
                    }),
                    CutKind::Set { paths } => Value::Array(paths.iter().map(details).collect()),
                })
            })
            .collect()
    }

    async fn facts(&self, request: &FactsRequest) -> Result<Vec<FactRow>> {
        let key = request.cell.cube().key.clone();
        let mut rows = self.cell_rows(&request.cell)?;
        rows.sort_by(|a, b| compare_values(a.get(&key), b.get(&key)));
        apply_order(&mut rows, &request.order);

        let projected = apply_paging(rows, &request.paging)
            .into_iter()
            .map(|row| {
                let mut record = Map::new();
                record.insert(key.clone(), row.get(&key).cloned().unwrap_or(Value::Null));
                for field in &request.fields {
                    record.insert(field.clone(), row.get(field).cloned().unwrap_or(Value::Null));
                }
                record
            })
            .collect();
        Ok(projected)
    }

    async fn fact(&self, cube: &Cube, id: &str) -> Result<FactRow> {
        self.facts
            .read()
            .get(&cube.name)
            .and_then(|rows| {
                rows.iter().find(|row| {
                    row.get(&cube.key)
                        .and_then(member_key)
                        .is_some_and(|key| key == id)
                })
            })
            .cloned()
            .ok_or_else(|| {
                Error::not_found(format!("Fact '{}' was not found in cube '{}'", id, cube.name))
            })
    }

    async fn members(&self, request: &MembersRequest) -> Result<Vec<FactRow>> {
        let cube = request.cell.cube();
        let dimension = cube.dimension(&request.dimension)?;
        let hierarchy = dimension.hierarchy(Some(&request.hierarchy))?;
        let depth = request.depth.min(hierarchy.len());
        let levels = &hierarchy.levels[..depth];
        let key_refs = level_key_refs(dimension, hierarchy);

        let mut members: Vec<(Path, FactRow)> = Vec::new();
        for row in self.cell_rows(&request.cell)? {
            let path = match row_path(&row, &key_refs, depth) {
                Some(path) if path.len() == depth => path,
                _ => continue,
            };
            if members.iter().any(|(existing, _)| existing == &path) {
                continue;
            }
            let mut record = Map::new();
            for level in levels {
                for attribute in level.attribute_names() {
                    let reference = dimension.attribute_ref(attribute);
                    let value = row.get(&reference).cloned().unwrap_or(Value::Null);
                    record.insert(reference, value);
                }
            }
            members.push((path, record));
        }
        members.sort_by(|a, b| compare_paths(&a.0, &b.0));

        Ok(apply_paging(
            members.into_iter().map(|(_, record)| record).collect(),
            &request.paging,
        ))
    }
}
