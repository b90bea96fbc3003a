//! Dimension, level and hierarchy types

use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::TryFrom;
use std::fmt;

/// Name of the hierarchy created for dimensions that declare none
pub const DEFAULT_HIERARCHY_NAME: &str = "default";

/// Special role of a dimension
///
/// Roles select the member converter used when parsing cuts; dimensions
/// without a role use raw member keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionRole {
    /// No special interpretation of member keys
    #[default]
    Default,
    /// Calendar dimension (levels named year, quarter, month, week, day)
    Time,
}

impl fmt::Display for DimensionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionRole::Default => write!(f, "default"),
            DimensionRole::Time => write!(f, "time"),
        }
    }
}

/// A level of a dimension (e.g. year, month)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Level {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Key attribute; defaults to the first attribute
    #[serde(default)]
    pub key: Option<String>,
    /// Label attribute; defaults to the key
    #[serde(default)]
    pub label_attribute: Option<String>,
    /// Attribute names; a level without attributes has a single attribute named after it
    #[serde(default)]
    pub attributes: Vec<String>,
}

impl Level {
    /// Create a level with a single attribute of the same name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            key: None,
            label_attribute: None,
            attributes: Vec::new(),
        }
    }

    /// Attribute names of this level, key first
    pub fn attribute_names(&self) -> Vec<&str> {
        if self.attributes.is_empty() {
            vec![self.name.as_str()]
        } else {
            self.attributes.iter().map(String::as_str).collect()
        }
    }

    /// Name of the key attribute
    pub fn key_attribute(&self) -> &str {
        match &self.key {
            Some(key) => key,
            None => self
                .attributes
                .first()
                .map(String::as_str)
                .unwrap_or(self.name.as_str()),
        }
    }

    /// Name of the label attribute
    pub fn label_attribute(&self) -> &str {
        self.label_attribute
            .as_deref()
            .unwrap_or_else(|| self.key_attribute())
    }
}

/// An ordered list of levels within a dimension
#[derive(Debug, Clone, PartialEq)]
pub struct Hierarchy {
    pub name: String,
    pub label: Option<String>,
    pub levels: Vec<Level>,
}

impl Hierarchy {
    /// Number of levels
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// True when the hierarchy has no levels
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Zero-based index of a level by name
    pub fn level_index(&self, name: &str) -> Option<usize> {
        self.levels.iter().position(|level| level.name == name)
    }

    /// Level names in hierarchy order
    pub fn level_names(&self) -> Vec<&str> {
        self.levels.iter().map(|level| level.name.as_str()).collect()
    }
}

/// Deepest level of a hierarchy shown to an identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyLimit {
    /// Limited hierarchy; `None` is the dimension's default hierarchy
    pub hierarchy: Option<String>,
    /// Last visible level
    pub level: String,
}

/// Hierarchy limits of one cube, keyed by dimension name
pub type HierarchyLimits = HashMap<String, HierarchyLimit>;

#[derive(Debug, Deserialize)]
struct HierarchySpec {
    name: String,
    #[serde(default)]
    label: Option<String>,
    levels: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DimensionSpec {
    name: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    role: DimensionRole,
    #[serde(default)]
    levels: Vec<Level>,
    #[serde(default)]
    hierarchies: Vec<HierarchySpec>,
    #[serde(default)]
    default_hierarchy_name: Option<String>,
}

/// A cube dimension with resolved hierarchies
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "DimensionSpec")]
pub struct Dimension {
    pub name: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub role: DimensionRole,
    pub levels: Vec<Level>,
    pub hierarchies: Vec<Hierarchy>,
    pub default_hierarchy_name: String,
}

impl TryFrom<DimensionSpec> for Dimension {
    type Error = String;

    fn try_from(spec: DimensionSpec) -> std::result::Result<Self, Self::Error> {
        let levels = if spec.levels.is_empty() {
            vec![Level::new(spec.name.clone())]
        } else {
            spec.levels
        };

        let hierarchies = if spec.hierarchies.is_empty() {
            vec![Hierarchy {
                name: DEFAULT_HIERARCHY_NAME.to_string(),
                label: None,
                levels: levels.clone(),
            }]
        } else {
            let mut resolved = Vec::with_capacity(spec.hierarchies.len());
            for hierarchy in spec.hierarchies {
                let mut hierarchy_levels = Vec::with_capacity(hierarchy.levels.len());
                for level_name in &hierarchy.levels {
                    let level = levels
                        .iter()
                        .find(|level| &level.name == level_name)
                        .ok_or_else(|| {
                            format!(
                                "hierarchy '{}' of dimension '{}' references unknown level '{}'",
                                hierarchy.name, spec.name, level_name
                            )
                        })?;
                    hierarchy_levels.push(level.clone());
                }
                resolved.push(Hierarchy {
                    name: hierarchy.name,
                    label: hierarchy.label,
                    levels: hierarchy_levels,
                });
            }
            resolved
        };

        let default_hierarchy_name = match spec.default_hierarchy_name {
            Some(name) => {
                if !hierarchies.iter().any(|h| h.name == name) {
                    return Err(format!(
                        "default hierarchy '{}' of dimension '{}' is not defined",
                        name, spec.name
                    ));
                }
                name
            }
            None => hierarchies[0].name.clone(),
        };

        Ok(Dimension {
            name: spec.name,
            label: spec.label,
            description: spec.description,
            role: spec.role,
            levels,
            hierarchies,
            default_hierarchy_name,
        })
    }
}

impl Dimension {
    /// Create a dimension with the given levels and a single default hierarchy
    pub fn with_levels(name: impl Into<String>, levels: Vec<Level>) -> Self {
        let name = name.into();
        let levels = if levels.is_empty() {
            vec![Level::new(name.clone())]
        } else {
            levels
        };
        Self {
            hierarchies: vec![Hierarchy {
                name: DEFAULT_HIERARCHY_NAME.to_string(),
                label: None,
                levels: levels.clone(),
            }],
            name,
            label: None,
            description: None,
            role: DimensionRole::Default,
            levels,
            default_hierarchy_name: DEFAULT_HIERARCHY_NAME.to_string(),
        }
    }

    /// Set the dimension role
    pub fn with_role(mut self, role: DimensionRole) -> Self {
        self.role = role;
        self
    }

    /// Hierarchy by name, or the default hierarchy when `name` is `None`
    pub fn hierarchy(&self, name: Option<&str>) -> Result<&Hierarchy> {
        let wanted = name.unwrap_or(self.default_hierarchy_name.as_str());
        self.hierarchies
            .iter()
            .find(|hierarchy| hierarchy.name == wanted)
            .ok_or_else(|| {
                Error::validation(format!(
                    "Hierarchy '{}' was not found in dimension '{}'",
                    wanted, self.name
                ))
            })
    }

    /// Level by name
    pub fn level(&self, name: &str) -> Option<&Level> {
        self.levels.iter().find(|level| level.name == name)
    }

    /// A flat dimension has one level with one attribute named after the dimension
    pub fn is_flat(&self) -> bool {
        self.levels.len() == 1 && self.levels[0].attribute_names() == [self.name.as_str()]
    }

    /// Fully qualified reference of one of this dimension's attributes
    pub fn attribute_ref(&self, attribute: &str) -> String {
        if self.is_flat() {
            self.name.clone()
        } else {
            format!("{}.{}", self.name, attribute)
        }
    }

    /// Reference of a level's key attribute
    pub fn key_ref(&self, level: &Level) -> String {
        self.attribute_ref(level.key_attribute())
    }

    /// Reference of a level's label attribute
    pub fn label_ref(&self, level: &Level) -> String {
        self.attribute_ref(level.label_attribute())
    }

    /// References of all attributes of all levels
    pub fn attribute_refs(&self) -> Vec<String> {
        self.levels
            .iter()
            .flat_map(|level| level.attribute_names())
            .map(|attribute| self.attribute_ref(attribute))
            .collect()
    }

    /// Limit of one of this dimension's hierarchies, checked against it
    pub fn hierarchy_limit(&self, hierarchy: Option<&str>, level: &str) -> Result<HierarchyLimit> {
        let limited = self.hierarchy(hierarchy)?;
        if limited.level_index(level).is_none() {
            return Err(Error::validation(format!(
                "Level '{}' is not in hierarchy '{}' of dimension '{}'",
                level, limited.name, self.name
            )));
        }
        Ok(HierarchyLimit {
            hierarchy: hierarchy.map(str::to_string),
            level: level.to_string(),
        })
    }

    /// Model description used by the model endpoint
    pub fn to_json(&self) -> Value {
        self.to_json_limited(None)
    }

    /// Model description with the limited hierarchy cut after its limit level
    pub fn to_json_limited(&self, limit: Option<&HierarchyLimit>) -> Value {
        let levels: Vec<Value> = self
            .levels
            .iter()
            .map(|level| {
                json!({
                    "name": level.name,
                    "label": level.label.clone().unwrap_or_else(|| level.name.clone()),
                    "key": self.key_ref(level),
                    "label_attribute": self.label_ref(level),
                    "attributes": level
                        .attribute_names()
                        .iter()
                        .map(|attribute| self.attribute_ref(attribute))
                        .collect::<Vec<_>>(),
                })
            })
            .collect();
        let hierarchies: Vec<Value> = self
            .hierarchies
            .iter()
            .map(|hierarchy| {
                let mut names = hierarchy.level_names();
                if let Some(limit) = limit {
                    let limited = limit
                        .hierarchy
                        .as_deref()
                        .unwrap_or(self.default_hierarchy_name.as_str());
                    if limited == hierarchy.name {
                        if let Some(index) = hierarchy.level_index(&limit.level) {
                            names.truncate(index + 1);
                        }
                    }
                }
                json!({
                    "name": hierarchy.name,
                    "label": hierarchy.label.clone().unwrap_or_else(|| hierarchy.name.clone()),
                    "levels": names,
                })
            })
            .collect();

        json!({
            "name": self.name,
            "label": self.label.clone().unwrap_or_else(|| self.name.clone()),
            "description": self.description,
            "role": self.role.to_string(),
            "is_flat": self.is_flat(),
            "default_hierarchy_name": self.default_hierarchy_name,
            "levels": levels,
            "hierarchies": hierarchies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geography() -> Dimension {
        serde_json::from_value(json!({
            "name": "geography",
            "levels": [
                {"name": "country", "attributes": ["country_code", "country_name"]},
                {"name": "city"},
                {"name": "district"}
            ],
            "hierarchies": [
                {"name": "full", "levels": ["country", "city", "district"]},
                {"name": "cities", "levels": ["city"]}
            ],
            "default_hierarchy_name": "full"
        }))
        .unwrap()
    }

    #[test]
    fn test_default_hierarchy_created() {
        let dim: Dimension = serde_json::from_value(json!({
            "name": "date",
            "role": "time",
            "levels": [{"name": "year"}, {"name": "month"}]
        }))
        .unwrap();

        assert_eq!(dim.role, DimensionRole::Time);
        let hierarchy = dim.hierarchy(None).unwrap();
        assert_eq!(hierarchy.name, DEFAULT_HIERARCHY_NAME);
        assert_eq!(hierarchy.level_names(), vec!["year", "month"]);
    }

    #[test]
    fn test_named_hierarchies() {
        let dim = geography();
        assert_eq!(dim.hierarchy(None).unwrap().len(), 3);
        assert_eq!(dim.hierarchy(Some("cities")).unwrap().len(), 1);
        assert_eq!(dim.hierarchy(None).unwrap().level_index("city"), Some(1));
        assert!(matches!(
            dim.hierarchy(Some("nope")),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_unknown_level_in_hierarchy_rejected() {
        let result: std::result::Result<Dimension, _> = serde_json::from_value(json!({
            "name": "bad",
            "levels": [{"name": "a"}],
            "hierarchies": [{"name": "h", "levels": ["a", "b"]}]
        }));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown level 'b'"));
    }

    #[test]
    fn test_attribute_refs() {
        let dim = geography();
        let country = dim.level("country").unwrap();
        assert_eq!(dim.key_ref(country), "geography.country_code");
        assert_eq!(
            dim.attribute_refs(),
            vec![
                "geography.country_code",
                "geography.country_name",
                "geography.city",
                "geography.district"
            ]
        );

        let flat = Dimension::with_levels("product", vec![]);
        assert!(flat.is_flat());
        assert_eq!(flat.attribute_refs(), vec!["product"]);
    }

    #[test]
    fn test_hierarchy_limit_truncates_one_hierarchy() {
        let dim = geography();
        let limit = dim.hierarchy_limit(None, "city").unwrap();
        let json = dim.to_json_limited(Some(&limit));

        assert_eq!(json["hierarchies"][0]["name"], "full");
        assert_eq!(json["hierarchies"][0]["levels"], json!(["country", "city"]));
        assert_eq!(json["hierarchies"][1]["levels"], json!(["city"]));
        assert_eq!(json["levels"].as_array().unwrap().len(), 3);

        assert!(dim.hierarchy_limit(Some("cities"), "country").is_err());
        assert!(dim.hierarchy_limit(Some("nope"), "city").is_err());
    }
}
