//! Cube metadata: dimensions, measures and aggregates

use super::dimension::{Dimension, HierarchyLimits};
use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::convert::TryFrom;
use std::fmt;

/// Name of the implicit record count aggregate
pub const RECORD_COUNT: &str = "record_count";

fn default_fact_key() -> String {
    "id".to_string()
}

/// A numeric fact attribute
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Measure {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// Aggregate function applied to a measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::Avg => "avg",
        };
        write!(f, "{}", name)
    }
}

/// A named aggregate exposed by the cube
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Aggregate {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    pub function: AggregateFunction,
    /// Measure the function applies to; `None` only for `count`
    #[serde(default)]
    pub measure: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CubeSpec {
    name: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    dimensions: Vec<Dimension>,
    #[serde(default)]
    measures: Vec<Measure>,
    #[serde(default)]
    aggregates: Vec<Aggregate>,
    #[serde(default = "default_fact_key")]
    key: String,
    #[serde(default)]
    info: Map<String, Value>,
}

/// A named multidimensional dataset
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "CubeSpec")]
pub struct Cube {
    pub name: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub dimensions: Vec<Dimension>,
    pub measures: Vec<Measure>,
    /// Declared aggregates, or `record_count` plus `<measure>_sum` when none were declared
    pub aggregates: Vec<Aggregate>,
    /// Fact key attribute
    pub key: String,
    pub info: Map<String, Value>,
}

impl TryFrom<CubeSpec> for Cube {
    type Error = String;

    fn try_from(spec: CubeSpec) -> std::result::Result<Self, Self::Error> {
        let mut seen = HashSet::new();
        for dimension in &spec.dimensions {
            if !seen.insert(dimension.name.as_str()) {
                return Err(format!(
                    "cube '{}' declares dimension '{}' twice",
                    spec.name, dimension.name
                ));
            }
        }

        for aggregate in &spec.aggregates {
            match (&aggregate.measure, aggregate.function) {
                (None, AggregateFunction::Count) => {}
                (None, function) => {
                    return Err(format!(
                        "aggregate '{}' uses function '{}' without a measure",
                        aggregate.name, function
                    ))
                }
                (Some(measure), _) => {
                    if !spec.measures.iter().any(|m| &m.name == measure) {
                        return Err(format!(
                            "aggregate '{}' references unknown measure '{}'",
                            aggregate.name, measure
                        ));
                    }
                }
            }
        }

        let aggregates = if spec.aggregates.is_empty() {
            default_aggregates(&spec.measures)
        } else {
            spec.aggregates
        };

        Ok(Cube {
            name: spec.name,
            label: spec.label,
            description: spec.description,
            dimensions: spec.dimensions,
            measures: spec.measures,
            aggregates,
            key: spec.key,
            info: spec.info,
        })
    }
}

fn default_aggregates(measures: &[Measure]) -> Vec<Aggregate> {
    let mut aggregates = vec![Aggregate {
        name: RECORD_COUNT.to_string(),
        label: Some("Record count".to_string()),
        function: AggregateFunction::Count,
        measure: None,
    }];
    aggregates.extend(measures.iter().map(|measure| Aggregate {
        name: format!("{}_sum", measure.name),
        label: None,
        function: AggregateFunction::Sum,
        measure: Some(measure.name.clone()),
    }));
    aggregates
}

impl Cube {
    /// Create a cube with default aggregates
    pub fn new(name: impl Into<String>, dimensions: Vec<Dimension>, measures: Vec<Measure>) -> Self {
        let aggregates = default_aggregates(&measures);
        Self {
            name: name.into(),
            label: None,
            description: None,
            dimensions,
            measures,
            aggregates,
            key: default_fact_key(),
            info: Map::new(),
        }
    }

    /// Dimension by name
    pub fn dimension(&self, name: &str) -> Result<&Dimension> {
        self.dimensions
            .iter()
            .find(|dimension| dimension.name == name)
            .ok_or_else(|| Error::validation(format!("Dimension '{}' was not found", name)))
    }

    /// Aggregate by name
    pub fn aggregate(&self, name: &str) -> Result<&Aggregate> {
        self.aggregates
            .iter()
            .find(|aggregate| aggregate.name == name)
            .ok_or_else(|| {
                Error::validation(format!(
                    "Aggregate '{}' was not found in cube '{}'",
                    name, self.name
                ))
            })
    }

    /// References of every attribute: dimension attributes then measures
    pub fn all_attribute_refs(&self) -> Vec<String> {
        self.dimensions
            .iter()
            .flat_map(Dimension::attribute_refs)
            .chain(self.measures.iter().map(|measure| measure.name.clone()))
            .collect()
    }

    /// Resolve attribute references against the catalog, preserving order
    pub fn attribute_refs(&self, names: &[&str]) -> Result<Vec<String>> {
        let catalog = self.all_attribute_refs();
        names
            .iter()
            .map(|name| {
                catalog
                    .iter()
                    .find(|reference| reference.as_str() == *name)
                    .cloned()
                    .ok_or_else(|| {
                        Error::validation(format!(
                            "Attribute '{}' was not found in cube '{}'",
                            name, self.name
                        ))
                    })
            })
            .collect()
    }

    /// Short description for cube listings
    pub fn summary_json(&self) -> Value {
        json!({
            "name": self.name,
            "label": self.label.clone().unwrap_or_else(|| self.name.clone()),
            "description": self.description,
        })
    }

    /// Full model description
    pub fn to_json(&self) -> Value {
        self.to_json_limited(&HierarchyLimits::new())
    }

    /// Full model description with hierarchies cut at the given limits
    pub fn to_json_limited(&self, limits: &HierarchyLimits) -> Value {
        json!({
            "name": self.name,
            "label": self.label.clone().unwrap_or_else(|| self.name.clone()),
            "description": self.description,
            "key": self.key,
            "info": self.info,
            "dimensions": self
                .dimensions
                .iter()
                .map(|dimension| dimension.to_json_limited(limits.get(&dimension.name)))
                .collect::<Vec<_>>(),
            "measures": self
                .measures
                .iter()
                .map(|measure| json!({
                    "name": measure.name,
                    "ref": measure.name,
                    "label": measure.label.clone().unwrap_or_else(|| measure.name.clone()),
                }))
                .collect::<Vec<_>>(),
            "aggregates": self
                .aggregates
                .iter()
                .map(|aggregate| json!({
                    "name": aggregate.name,
                    "ref": aggregate.name,
                    "label": aggregate.label.clone().unwrap_or_else(|| aggregate.name.clone()),
                    "function": aggregate.function.to_string(),
                    "measure": aggregate.measure,
                }))
                .collect::<Vec<_>>(),
            "attributes": self.all_attribute_refs(),
        })
    }
}
