use crate::error::{Error, Result};
use crate::model::Hierarchy;

/// Effective member depth from the `depth` and `level` parameters
///
/// Empty strings count as absent. Giving both is ambiguous; a level maps to
/// its position plus one; nothing at all means the full hierarchy.
pub fn resolve_depth(
    hierarchy: &Hierarchy,
    depth: Option<&str>,
    level: Option<&str>,
) -> Result<usize> {
    let depth = depth.filter(|value| !value.is_empty());
    let level = level.filter(|value| !value.is_empty());

    match (depth, level) {
        (Some(_), Some(_)) => Err(Error::validation(
            "Both depth and level provided, use only one (preferably level)",
        )),
        (None, Some(level)) => hierarchy
            .level_index(level)
            .map(|index| index + 1)
            .ok_or_else(|| {
                Error::validation(format!(
                    "Level '{}' was not found in hierarchy '{}'",
                    level, hierarchy.name
                ))
            }),
        (Some(depth), None) => depth.trim().parse::<usize>().map_err(|_| {
            Error::validation(format!(
                "depth should be a non-negative integer, got '{}'",
                depth
            ))
        }),
        (None, None) => Ok(hierarchy.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Level;

    fn hierarchy() -> Hierarchy {
        Hierarchy {
            name: "default".into(),
            label: None,
            levels: vec![Level::new("country"), Level::new("city"), Level::new("district")],
        }
    }

    #[test]
    fn test_depth_and_level_is_ambiguous() {
        let err = resolve_depth(&hierarchy(), Some("2"), Some("city")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_level_maps_to_index_plus_one() {
        assert_eq!(resolve_depth(&hierarchy(), None, Some("city")).unwrap(), 2);
        assert!(resolve_depth(&hierarchy(), None, Some("street")).is_err());
    }

    #[test]
    fn test_depth_must_be_non_negative_integer() {
        assert_eq!(resolve_depth(&hierarchy(), Some("1"), None).unwrap(), 1);
        for bad in ["two", "-1", "1.5"] {
            assert!(resolve_depth(&hierarchy(), Some(bad), None).is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_defaults_to_hierarchy_length() {
        assert_eq!(resolve_depth(&hierarchy(), None, None).unwrap(), 3);
        assert_eq!(resolve_depth(&hierarchy(), Some(""), Some("")).unwrap(), 3);
    }
}
