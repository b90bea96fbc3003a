use crate::error::Result;
use crate::model::Cube;

/// Attribute references selected by the `fields` parameter
///
/// A non-empty comma list selects exactly those attributes in the given
/// order; otherwise every cube attribute is returned.
pub fn resolve_fields(cube: &Cube, fields: Option<&str>) -> Result<Vec<String>> {
    let names: Vec<&str> = fields
        .map(|fields| {
            fields
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .collect()
        })
        .unwrap_or_default();

    if names.is_empty() {
        Ok(cube.all_attribute_refs())
    } else {
        cube.attribute_refs(&names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::{Dimension, Level, Measure};

    fn cube() -> Cube {
        Cube::new(
            "sales",
            vec![
                Dimension::with_levels("date", vec![Level::new("year")]),
                Dimension::with_levels("product", vec![]),
            ],
            vec![Measure {
                name: "amount".into(),
                label: None,
            }],
        )
    }

    #[test]
    fn test_explicit_fields_keep_order() {
        assert_eq!(
            resolve_fields(&cube(), Some("amount, date.year")).unwrap(),
            vec!["amount", "date.year"]
        );
    }

    #[test]
    fn test_absent_or_empty_means_all() {
        let all = vec!["date.year", "product", "amount"];
        assert_eq!(resolve_fields(&cube(), None).unwrap(), all);
        assert_eq!(resolve_fields(&cube(), Some("")).unwrap(), all);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            resolve_fields(&cube(), Some("price")),
            Err(Error::Validation(_))
        ));
    }
}
