use crate::error::{Error, Result};
use crate::model::Cube;
use serde::Serialize;
use serde_json::Value;

/// One validated `dimension[@hierarchy][:level]` drilldown item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrilldownItem {
    pub dimension: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hierarchy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Depth implied by `level`; `None` lets the engine pick one below the cut
    #[serde(skip)]
    pub depth: Option<usize>,
}

impl DrilldownItem {
    /// Parse and validate one item against the cube
    pub fn parse(cube: &Cube, text: &str) -> Result<Self> {
        let (head, level) = match text.split_once(':') {
            Some((head, level)) => (head, Some(level.trim())),
            None => (text, None),
        };
        let (dimension_name, hierarchy) = match head.split_once('@') {
            Some((dimension, hierarchy)) => (dimension.trim(), Some(hierarchy.trim())),
            None => (head.trim(), None),
        };

        let dimension = cube.dimension(dimension_name)?;
        let resolved = dimension.hierarchy(hierarchy)?;
        let depth = match level {
            Some(level) => Some(resolved.level_index(level).map(|i| i + 1).ok_or_else(|| {
                Error::validation(format!(
                    "Level '{}' was not found in hierarchy '{}' of dimension '{}'",
                    level, resolved.name, dimension.name
                ))
            })?),
            None => None,
        };

        Ok(Self {
            dimension: dimension.name.clone(),
            hierarchy: hierarchy.map(str::to_string),
            level: level.map(str::to_string),
            depth,
        })
    }
}

/// Ordered drilldown directives
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Drilldown(pub Vec<DrilldownItem>);

impl Drilldown {
    /// Validate already split drilldown items
    pub fn parse<S: AsRef<str>>(cube: &Cube, items: &[S]) -> Result<Self> {
        let mut parsed: Vec<DrilldownItem> = Vec::with_capacity(items.len());
        for text in items {
            let item = DrilldownItem::parse(cube, text.as_ref())?;
            if parsed.iter().any(|existing| existing.dimension == item.dimension) {
                return Err(Error::validation(format!(
                    "Dimension '{}' is drilled down more than once",
                    item.dimension
                )));
            }
            parsed.push(item);
        }
        Ok(Self(parsed))
    }

    /// Drilldown from a report query: a `|` string or a list of strings
    pub fn from_json(cube: &Cube, value: Option<&Value>) -> Result<Self> {
        match value {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(Value::String(text)) => {
                let items: Vec<&str> = text.split('|').filter(|s| !s.is_empty()).collect();
                Self::parse(cube, &items)
            }
            Some(Value::Array(entries)) => {
                let items = entries
                    .iter()
                    .map(|entry| {
                        entry.as_str().ok_or_else(|| {
                            Error::validation(format!("Invalid drilldown entry {}", entry))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Self::parse(cube, &items)
            }
            Some(other) => Err(Error::validation(format!("Invalid drilldown {}", other))),
        }
    }

    pub fn items(&self) -> &[DrilldownItem] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cube() -> Cube {
        serde_json::from_value(json!({
            "name": "sales",
            "dimensions": [
                {"name": "date", "levels": [{"name": "year"}, {"name": "month"}]},
                {"name": "geography",
                 "levels": [{"name": "country"}, {"name": "city"}],
                 "hierarchies": [
                    {"name": "default", "levels": ["country", "city"]},
                    {"name": "cities", "levels": ["city"]}
                 ]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_items() {
        let drilldown = Drilldown::parse(&cube(), &["date:month", "geography@cities"]).unwrap();
        assert_eq!(drilldown.items()[0].depth, Some(2));
        assert_eq!(drilldown.items()[1].hierarchy.as_deref(), Some("cities"));
        assert_eq!(drilldown.items()[1].depth, None);
    }

    #[test]
    fn test_unknown_references_rejected() {
        for text in ["store", "date@fiscal", "geography@cities:country", "date:week"] {
            assert!(
                matches!(Drilldown::parse(&cube(), &[text]), Err(Error::Validation(_))),
                "{}",
                text
            );
        }
        assert!(Drilldown::parse(&cube(), &["date", "date:month"]).is_err());
    }

    #[test]
    fn test_from_json() {
        let drilldown = Drilldown::from_json(&cube(), Some(&json!("date|geography"))).unwrap();
        assert_eq!(drilldown.items().len(), 2);
        assert!(Drilldown::from_json(&cube(), Some(&json!([1]))).is_err());
    }
}
