//! Cut: a filter on one dimension

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Member key path, root level first
pub type Path = Vec<String>;

/// Selection encoded by a cut
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CutKind {
    /// A single member path
    Point {
        #[serde(deserialize_with = "path_keys")]
        path: Path,
    },
    /// Inclusive range between two paths; either bound may be open
    Range {
        #[serde(default, deserialize_with = "optional_path_keys")]
        from: Option<Path>,
        #[serde(default, deserialize_with = "optional_path_keys")]
        to: Option<Path>,
    },
    /// Any of several alternative paths
    Set {
        #[serde(deserialize_with = "set_path_keys")]
        paths: Vec<Path>,
    },
}

/// A filter on one dimension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cut {
    pub dimension: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hierarchy: Option<String>,
    #[serde(default)]
    pub invert: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(flatten)]
    pub kind: CutKind,
}

impl Cut {
    fn with_kind(dimension: impl Into<String>, kind: CutKind) -> Self {
        Self {
            dimension: dimension.into(),
            hierarchy: None,
            invert: false,
            hidden: false,
            kind,
        }
    }

    /// Point cut on a single path
    pub fn point(dimension: impl Into<String>, path: Path) -> Self {
        Self::with_kind(dimension, CutKind::Point { path })
    }

    /// Range cut with optional bounds
    pub fn range(dimension: impl Into<String>, from: Option<Path>, to: Option<Path>) -> Self {
        Self::with_kind(dimension, CutKind::Range { from, to })
    }

    /// Set cut over alternative paths
    pub fn set(dimension: impl Into<String>, paths: Vec<Path>) -> Self {
        Self::with_kind(dimension, CutKind::Set { paths })
    }

    /// Select a hierarchy other than the dimension's default
    pub fn with_hierarchy(mut self, hierarchy: impl Into<String>) -> Self {
        self.hierarchy = Some(hierarchy.into());
        self
    }

    /// Invert the selection
    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }

    /// Deepest level touched by this cut
    pub fn level_depth(&self) -> usize {
        match &self.kind {
            CutKind::Point { path } => path.len(),
            CutKind::Range { from, to } => {
                let from = from.as_ref().map_or(0, Vec::len);
                let to = to.as_ref().map_or(0, Vec::len);
                from.max(to)
            }
            CutKind::Set { paths } => paths.iter().map(Vec::len).max().unwrap_or(0),
        }
    }

    /// Name of the cut type
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            CutKind::Point { .. } => "point",
            CutKind::Range { .. } => "range",
            CutKind::Set { .. } => "set",
        }
    }

    /// Dictionary form returned to clients
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert("type".into(), Value::from(self.type_name()));
        object.insert("dimension".into(), Value::from(self.dimension.clone()));
        object.insert(
            "hierarchy".into(),
            self.hierarchy.clone().map_or(Value::Null, Value::from),
        );
        object.insert("level_depth".into(), Value::from(self.level_depth()));
        object.insert("invert".into(), Value::from(self.invert));
        object.insert("hidden".into(), Value::from(self.hidden));
        match &self.kind {
            CutKind::Point { path } => {
                object.insert("path".into(), Value::from(path.clone()));
            }
            CutKind::Range { from, to } => {
                object.insert("from".into(), from.clone().map_or(Value::Null, Value::from));
                object.insert("to".into(), to.clone().map_or(Value::Null, Value::from));
            }
            CutKind::Set { paths } => {
                object.insert("paths".into(), Value::from(paths.clone()));
            }
        }
        Value::Object(object)
    }

    /// Build a cut from its dictionary form
    pub fn from_json(value: &Value) -> Result<Self, serde_json::Error> {
        Cut::deserialize(value)
    }
}

// Cut string form: `[!]dimension[@hierarchy]:path_spec`
impl fmt::Display for Cut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.invert {
            write!(f, "!")?;
        }
        write!(f, "{}", self.dimension)?;
        if let Some(hierarchy) = &self.hierarchy {
            write!(f, "@{}", hierarchy)?;
        }
        write!(f, ":")?;
        match &self.kind {
            CutKind::Point { path } => write!(f, "{}", path_to_string(path)),
            CutKind::Range { from, to } => write!(
                f,
                "{}-{}",
                from.as_deref().map(path_to_string).unwrap_or_default(),
                to.as_deref().map(path_to_string).unwrap_or_default()
            ),
            CutKind::Set { paths } => {
                let parts: Vec<String> = paths.iter().map(|p| path_to_string(p)).collect();
                write!(f, "{}", parts.join(";"))
            }
        }
    }
}

/// Characters with a meaning in cut strings
pub(crate) const RESERVED_CHARS: [char; 6] = ['|', ':', ',', ';', '-', '\\'];

/// Join path keys, escaping reserved characters
pub fn path_to_string(path: &[String]) -> String {
    path.iter()
        .map(|key| {
            let mut escaped = String::with_capacity(key.len());
            for c in key.chars() {
                if RESERVED_CHARS.contains(&c) {
                    escaped.push('\\');
                }
                escaped.push(c);
            }
            escaped
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn key_from_value(value: Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!("invalid member key: {}", other)),
    }
}

fn keys_from_values(values: Vec<Value>) -> Result<Path, String> {
    values.into_iter().map(key_from_value).collect()
}

// Report bodies may carry numeric member keys (e.g. `[2024, 1]`)
fn path_keys<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Path, D::Error> {
    let values = Vec::<Value>::deserialize(deserializer)?;
    keys_from_values(values).map_err(D::Error::custom)
}

fn optional_path_keys<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Path>, D::Error> {
    let values = Option::<Vec<Value>>::deserialize(deserializer)?;
    values
        .map(keys_from_values)
        .transpose()
        .map_err(D::Error::custom)
}

fn set_path_keys<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Path>, D::Error> {
    let values = Vec::<Vec<Value>>::deserialize(deserializer)?;
    values
        .into_iter()
        .map(keys_from_values)
        .collect::<Result<Vec<_>, _>>()
        .map_err(D::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(keys: &[&str]) -> Path {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_level_depth() {
        assert_eq!(Cut::point("date", path(&["2024", "3"])).level_depth(), 2);
        assert_eq!(
            Cut::range("date", Some(path(&["2024"])), Some(path(&["2025", "6"]))).level_depth(),
            2
        );
        assert_eq!(Cut::range("date", None, None).level_depth(), 0);
        assert_eq!(
            Cut::set("geo", vec![path(&["de"]), path(&["fr", "paris", "8"])]).level_depth(),
            3
        );
    }

    #[test]
    fn test_from_json_with_numeric_keys() {
        let cut = Cut::from_json(&json!({
            "type": "point",
            "dimension": "date",
            "path": [2024, 3]
        }))
        .unwrap();
        assert_eq!(cut, Cut::point("date", path(&["2024", "3"])));

        let range = Cut::from_json(&json!({
            "type": "range",
            "dimension": "date",
            "hierarchy": "ywd",
            "from": [2024],
            "invert": true
        }))
        .unwrap();
        assert_eq!(
            range,
            Cut::range("date", Some(path(&["2024"])), None)
                .with_hierarchy("ywd")
                .inverted()
        );
    }

    #[test]
    fn test_from_json_rejects_unknown_type() {
        let result = Cut::from_json(&json!({"type": "fuzzy", "dimension": "date"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_to_json_shape() {
        let cut = Cut::set("geo", vec![path(&["de"]), path(&["fr"])]);
        let value = cut.to_json();
        assert_eq!(value["type"], "set");
        assert_eq!(value["dimension"], "geo");
        assert_eq!(value["level_depth"], 1);
        assert_eq!(value["paths"], json!([["de"], ["fr"]]));
        assert_eq!(value["invert"], false);
    }

    #[test]
    fn test_display_escapes_reserved_characters() {
        let cut = Cut::point("code", path(&["a-b", "c,d"])).inverted();
        assert_eq!(cut.to_string(), "!code:a\\-b,c\\,d");

        let range = Cut::range("date", None, Some(path(&["2024"])));
        assert_eq!(range.to_string(), "date:-2024");
    }
}
