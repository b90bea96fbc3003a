use super::RequestParams;
use serde::Serialize;
use serde_json::Value;

/// Page index and page size; both absent means unpaged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PagingSpec {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl PagingSpec {
    /// Read `page` and `pagesize` (or `page_size`)
    ///
    /// Values that are not non-negative integers are ignored.
    pub fn from_params(params: &RequestParams) -> Self {
        let page_size = params
            .get("pagesize")
            .or_else(|| params.get("page_size"))
            .and_then(parse_lenient);
        Self {
            page: params.get("page").and_then(parse_lenient),
            page_size,
        }
    }

    /// Read paging from a report query object, with the same leniency
    pub fn from_json(value: &Value) -> Self {
        let field = |name: &str| value.get(name).and_then(json_lenient);
        Self {
            page: field("page"),
            page_size: field("pagesize").or_else(|| field("page_size")),
        }
    }

    pub fn is_paged(&self) -> bool {
        self.page_size.is_some()
    }

    /// Number of records to skip
    pub fn offset(&self) -> usize {
        match self.page_size {
            Some(size) => self.page.unwrap_or(0).saturating_mul(size),
            None => 0,
        }
    }

    /// Maximum number of records to return
    pub fn limit(&self) -> Option<usize> {
        self.page_size
    }
}

fn parse_lenient(text: &str) -> Option<usize> {
    text.trim().parse().ok()
}

fn json_lenient(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => parse_lenient(s),
        _ => None,
    }
}
