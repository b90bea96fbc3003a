//! Fuzz Tests for Cut Parsing and Cell Building
//!
//! Uses property-based testing (proptest) to check the cut string syntax
//! against escaping, concatenation and arbitrary input.

use cube_slicer::{
    cell::{cuts_from_string, cuts_from_strings, RoleConverters},
    Cell, Cube, Cut, CutKind,
};
use proptest::prelude::*;
use std::sync::Arc;

fn cube() -> Arc<Cube> {
    Arc::new(
        serde_json::from_value(serde_json::json!({
            "name": "sales",
            "dimensions": [
                {"name": "date", "levels": [{"name": "year"}, {"name": "month"}, {"name": "day"}]},
                {"name": "product"}
            ],
            "measures": [{"name": "amount"}]
        }))
        .unwrap(),
    )
}

// =============================================================================
// Test Data Strategies
// =============================================================================

/// Member keys, including every character with a meaning in cut strings
fn key() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => "[a-z0-9]{1,6}",
        1 => r"[a-z0-9|:,;\\-]{1,6}",
    ]
}

fn path(max_depth: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(key(), 1..=max_depth)
}

fn cut_kind(max_depth: usize) -> impl Strategy<Value = CutKind> {
    prop_oneof![
        path(max_depth).prop_map(|path| CutKind::Point { path }),
        (
            prop::option::of(path(max_depth)),
            prop::option::of(path(max_depth))
        )
            .prop_filter("range needs a bound", |(from, to)| from.is_some() || to.is_some())
            .prop_map(|(from, to)| CutKind::Range { from, to }),
        prop::collection::vec(path(max_depth), 2..4).prop_map(|paths| CutKind::Set { paths }),
    ]
}

fn cut() -> impl Strategy<Value = Cut> {
    let date = (cut_kind(3), any::<bool>()).prop_map(|(kind, invert)| Cut {
        dimension: "date".into(),
        hierarchy: None,
        invert,
        hidden: false,
        kind,
    });
    let product = (cut_kind(1), any::<bool>()).prop_map(|(kind, invert)| Cut {
        dimension: "product".into(),
        hierarchy: None,
        invert,
        hidden: false,
        kind,
    });
    prop_oneof![date, product]
}

fn parse(text: &str) -> cube_slicer::Result<Vec<Cut>> {
    cuts_from_string(&cube(), text, &RoleConverters::new())
}

// =============================================================================
// Cut String Fuzz Tests
// =============================================================================

proptest! {
    /// A rendered cut parses back to itself, escapes included
    #[test]
    fn rendered_cut_parses_back(cut in cut()) {
        let parsed = parse(&cut.to_string()).unwrap();
        prop_assert_eq!(parsed, vec![cut]);
    }

    /// Joining cut strings with `|` concatenates their cuts
    #[test]
    fn joined_strings_concatenate(cuts in prop::collection::vec(cut(), 1..5)) {
        let texts: Vec<String> = cuts.iter().map(ToString::to_string).collect();
        let joined = parse(&texts.join("|")).unwrap();
        let separate = cuts_from_strings(
            &cube(),
            texts.iter().map(String::as_str),
            &RoleConverters::new(),
        )
        .unwrap();
        prop_assert_eq!(&joined, &cuts);
        prop_assert_eq!(joined, separate);
    }

    /// Arbitrary input yields cuts or an error, the same way every time
    #[test]
    fn arbitrary_input_is_deterministic(text in r"[!@a-z0-9|:,;\\ -]{0,24}") {
        let first = parse(&text);
        let second = parse(&text);
        match (first, second) {
            (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
            (Err(a), Err(b)) => prop_assert_eq!(a.to_string(), b.to_string()),
            _ => prop_assert!(false, "parse of {:?} was not deterministic", text),
        }
    }
}

// =============================================================================
// Cell Building Fuzz Tests
// =============================================================================

proptest! {
    /// A cell keeps one cut per dimension: the last one given
    #[test]
    fn cell_keeps_last_cut_per_dimension(cuts in prop::collection::vec(cut(), 0..8)) {
        let cell = Cell::new(cube(), cuts.clone());

        for dimension in ["date", "product"] {
            let kept: Vec<&Cut> = cell.cuts().iter().filter(|c| c.dimension == dimension).collect();
            let last = cuts.iter().rev().find(|c| c.dimension == dimension);
            match last {
                Some(last) => prop_assert_eq!(kept, vec![last]),
                None => prop_assert!(kept.is_empty()),
            }
        }
        prop_assert_eq!(cell.is_whole_cube(), cuts.is_empty());
    }

    /// Restriction never drops request cuts
    #[test]
    fn restriction_only_adds_cuts(
        cuts in prop::collection::vec(cut(), 0..5),
        restriction in prop::collection::vec(cut(), 0..3),
    ) {
        let cell = Cell::new(cube(), cuts);
        let before = cell.cuts().to_vec();
        let restricted = cell.restrict(restriction.clone());

        prop_assert_eq!(&restricted.cuts()[..before.len()], &before[..]);
        prop_assert_eq!(&restricted.cuts()[before.len()..], &restriction[..]);
    }
}
