//! Request parameter normalization
//!
//! Turns raw, string-typed query parameters into validated query directives.
//! Paging is lenient (bad values mean "unpaged"); everything else fails with
//! a validation error before the engine is called.

mod depth;
mod drilldown;
mod fields;
mod order;
mod paging;

pub use depth::resolve_depth;
pub use drilldown::{Drilldown, DrilldownItem};
pub use fields::resolve_fields;
pub use order::{OrderDirection, OrderItem, OrderSpec};
pub use paging::PagingSpec;

/// Separator for multi-valued parameters such as `aggregates` and `drilldown`
pub const LIST_SEPARATOR: char = '|';

/// Decoded query string parameters in request order
///
/// Parameters may repeat. Single-valued lookups see the last occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    pairs: Vec<(String, String)>,
}

impl RequestParams {
    /// Decode a raw `application/x-www-form-urlencoded` query string
    pub fn from_query(query: Option<&str>) -> Self {
        let pairs = query
            .map(|query| {
                url::form_urlencoded::parse(query.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();
        Self { pairs }
    }

    /// Build from already decoded pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Last value of a parameter
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Last value of a parameter, treating an empty string as absent
    pub fn get_non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|value| !value.is_empty())
    }

    /// Every value of a repeated parameter, in request order
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Split every occurrence of a list parameter on `|`, dropping empty items
    pub fn get_list(&self, name: &str) -> Vec<String> {
        self.get_all(name)
            .flat_map(|value| value.split(LIST_SEPARATOR))
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pairs.iter().any(|(key, _)| key == name)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_repeated_parameters() {
        let params = RequestParams::from_query(Some("cut=date%3A2024&cut=product:tea&page=1&page=2"));
        assert_eq!(
            params.get_all("cut").collect::<Vec<_>>(),
            vec!["date:2024", "product:tea"]
        );
        assert_eq!(params.get("page"), Some("2"));
        assert_eq!(params.get("missing"), None);
    }

    #[test]
    fn test_plus_decodes_to_space_and_empty_is_absent() {
        let params = RequestParams::from_query(Some("fields=a+b&depth="));
        assert_eq!(params.get("fields"), Some("a b"));
        assert_eq!(params.get("depth"), Some(""));
        assert_eq!(params.get_non_empty("depth"), None);
        assert!(params.contains("depth"));
    }

    #[test]
    fn test_list_parameters() {
        let params = RequestParams::from_pairs([
            ("drilldown", "date|product"),
            ("drilldown", "geography||"),
        ]);
        assert_eq!(params.get_list("drilldown"), vec!["date", "product", "geography"]);
        assert!(RequestParams::from_query(None).is_empty());
    }
}
