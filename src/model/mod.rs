//! Cube model and model file loading
//!
//! A model file is a JSON document:
//!
//! ```json
//! {
//!   "info": {"label": "Sales workspace"},
//!   "cubes": [
//!     {
//!       "name": "sales",
//!       "dimensions": [
//!         {"name": "date", "role": "time",
//!          "levels": [{"name": "year"}, {"name": "month"}, {"name": "day"}]},
//!         {"name": "product"}
//!       ],
//!       "measures": [{"name": "amount"}]
//!     }
//!   ],
//!   "facts": {"sales": [{"id": 1, "date.year": 2024, "date.month": 1, "date.day": 3,
//!                       "product": "tea", "amount": 10.5}]}
//! }
//! ```
//!
//! `facts` is optional and only feeds the in-memory browser.

mod cube;
mod dimension;

pub use cube::{Aggregate, AggregateFunction, Cube, Measure, RECORD_COUNT};
pub use dimension::{
    Dimension, DimensionRole, Hierarchy, HierarchyLimit, HierarchyLimits, Level,
    DEFAULT_HIERARCHY_NAME,
};

use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;

/// A fact row keyed by attribute reference
pub type FactRow = Map<String, Value>;

/// Contents of a model file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Model {
    #[serde(default)]
    pub info: Map<String, Value>,
    #[serde(default)]
    pub cubes: Vec<Cube>,
    #[serde(default)]
    pub facts: HashMap<String, Vec<FactRow>>,
}

impl Model {
    /// Parse a model from JSON text
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let model: Model =
            serde_json::from_str(contents).map_err(|e| Error::Model(e.to_string()))?;
        model.validate()?;
        Ok(model)
    }

    /// Load a model file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Model(format!("Failed to read model file {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&contents)
    }

    fn validate(&self) -> Result<()> {
        let mut names = std::collections::HashSet::new();
        for cube in &self.cubes {
            if !names.insert(cube.name.as_str()) {
                return Err(Error::Model(format!("cube '{}' is defined twice", cube.name)));
            }
        }
        for cube_name in self.facts.keys() {
            if !names.contains(cube_name.as_str()) {
                return Err(Error::Model(format!(
                    "facts provided for unknown cube '{}'",
                    cube_name
                )));
            }
        }
        Ok(())
    }
}
