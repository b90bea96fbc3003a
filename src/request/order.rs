use super::RequestParams;
use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl FromStr for OrderDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(OrderDirection::Asc),
            "desc" => Ok(OrderDirection::Desc),
            other => Err(Error::validation(format!(
                "Invalid order direction '{}', expected 'asc' or 'desc'",
                other
            ))),
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "asc"),
            OrderDirection::Desc => write!(f, "desc"),
        }
    }
}

/// One ordering directive; a missing direction leaves it to the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    pub field: String,
    pub direction: Option<OrderDirection>,
}

impl OrderItem {
    /// Parse `field[:direction]`
    pub fn parse(token: &str) -> Result<Self> {
        let (field, direction) = match token.split_once(':') {
            Some((field, direction)) => (field, Some(direction.parse()?)),
            None => (token, None),
        };
        let field = field.trim();
        if field.is_empty() {
            return Err(Error::validation(format!(
                "Order item '{}' has no field",
                token
            )));
        }
        Ok(Self {
            field: field.to_string(),
            direction,
        })
    }
}

/// Ordered sort directives
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OrderSpec(pub Vec<OrderItem>);

impl OrderSpec {
    /// Flatten every `order` occurrence (comma lists) in request order
    pub fn from_params(params: &RequestParams) -> Result<Self> {
        Self::from_strings(params.get_all("order"))
    }

    fn from_strings<'a>(values: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut items = Vec::new();
        for value in values {
            for token in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                items.push(OrderItem::parse(token)?);
            }
        }
        Ok(Self(items))
    }

    /// Order from a report query: a string, a list of strings or a list of
    /// `[field, direction]` pairs
    pub fn from_json(value: Option<&Value>) -> Result<Self> {
        let value = match value {
            None | Some(Value::Null) => return Ok(Self::default()),
            Some(value) => value,
        };
        match value {
            Value::String(text) => Self::from_strings([text.as_str()]),
            Value::Array(entries) => {
                let mut items = Vec::with_capacity(entries.len());
                for entry in entries {
                    match entry {
                        Value::String(text) => items.extend(Self::from_strings([text.as_str()])?.0),
                        Value::Array(pair) => match pair.as_slice() {
                            [Value::String(field)] => items.push(OrderItem {
                                field: field.clone(),
                                direction: None,
                            }),
                            [Value::String(field), Value::String(direction)] => {
                                items.push(OrderItem {
                                    field: field.clone(),
                                    direction: Some(direction.parse()?),
                                })
                            }
                            _ => {
                                return Err(Error::validation(format!(
                                    "Invalid order entry {}",
                                    entry
                                )))
                            }
                        },
                        other => {
                            return Err(Error::validation(format!(
                                "Invalid order entry {}",
                                other
                            )))
                        }
                    }
                }
                Ok(Self(items))
            }
            other => Err(Error::validation(format!("Invalid order {}", other))),
        }
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
