//! Cut string parser
//!
//! Parses the textual cut syntax used in `cut` and `split` query parameters.
//!
//! # Syntax
//!
//! ```text
//! cuts      := cut ( "|" cut )*
//! cut       := [ "!" ] dimension [ "@" hierarchy ] ":" path_spec
//! path_spec := path                      point
//!            | path ( ";" path )+        set
//!            | [ path ] "-" [ path ]     range
//! path      := key ( "," key )*
//! ```
//!
//! A backslash escapes the next character, so keys may contain any of the
//! separator characters.
//!
//! # Example
//!
//! ```text
//! date:2024,3|geography@cities:berlin;paris|!product:tea
//! date:2023,1-2023,6
//! date:lastmonth            (converted by the calendar for time dimensions)
//! ```

use super::converter::RoleConverters;
use super::cut::{Cut, CutKind, Path};
use crate::error::{Error, Result};
use crate::model::Cube;
use nom::{
    bytes::complete::take_while1,
    character::complete::char,
    combinator::opt,
    sequence::preceded,
    IResult, Parser,
};

/// Separator between cuts in a cut string
pub const CUT_SEPARATOR: char = '|';
/// Separator between dimension header and member path
pub const DIMENSION_SEPARATOR: char = ':';
/// Separator between path keys
pub const PATH_SEPARATOR: char = ',';
/// Separator between range bounds
pub const RANGE_SEPARATOR: char = '-';
/// Separator between set members
pub const SET_SEPARATOR: char = ';';

const ESCAPE: char = '\\';

/// Parsed `[!]dimension[@hierarchy]:` header
#[derive(Debug, PartialEq, Eq)]
struct CutHeader<'a> {
    invert: bool,
    dimension: &'a str,
    hierarchy: Option<&'a str>,
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn cut_header(input: &str) -> IResult<&str, CutHeader<'_>> {
    let (input, invert) = opt(char('!')).parse(input)?;
    let (input, dimension) = take_while1(is_word_char).parse(input)?;
    let (input, hierarchy) = opt(preceded(char('@'), take_while1(is_word_char))).parse(input)?;
    let (input, _) = char(DIMENSION_SEPARATOR).parse(input)?;
    Ok((
        input,
        CutHeader {
            invert: invert.is_some(),
            dimension,
            hierarchy,
        },
    ))
}

/// Split on unescaped occurrences of `separator`, keeping escapes in the pieces
fn split_unescaped(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (idx, c) in input.char_indices() {
        if escaped {
            escaped = false;
        } else if c == ESCAPE {
            escaped = true;
        } else if c == separator {
            parts.push(&input[start..idx]);
            start = idx + c.len_utf8();
        }
    }
    parts.push(&input[start..]);
    parts
}

fn unescape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c == ESCAPE {
            // A trailing escape stands for itself
            out.push(chars.next().unwrap_or(ESCAPE));
        } else {
            out.push(c);
        }
    }
    out
}

fn parse_path(text: &str, cut_text: &str) -> Result<Path> {
    let keys: Path = split_unescaped(text, PATH_SEPARATOR)
        .into_iter()
        .map(unescape)
        .collect();
    if keys.iter().any(String::is_empty) {
        return Err(Error::cut_parse(cut_text, "empty member key in path"));
    }
    Ok(keys)
}

fn parse_path_spec(spec: &str, cut_text: &str) -> Result<CutKind> {
    if spec.is_empty() {
        return Err(Error::cut_parse(cut_text, "missing member path"));
    }

    let set_parts = split_unescaped(spec, SET_SEPARATOR);
    if set_parts.len() > 1 {
        let paths = set_parts
            .into_iter()
            .map(|part| parse_path(part, cut_text))
            .collect::<Result<Vec<_>>>()?;
        return Ok(CutKind::Set { paths });
    }

    let range_parts = split_unescaped(spec, RANGE_SEPARATOR);
    match range_parts.as_slice() {
        [point] => Ok(CutKind::Point {
            path: parse_path(point, cut_text)?,
        }),
        [from, to] => {
            if from.is_empty() && to.is_empty() {
                return Err(Error::cut_parse(cut_text, "range without bounds"));
            }
            let from = if from.is_empty() {
                None
            } else {
                Some(parse_path(from, cut_text)?)
            };
            let to = if to.is_empty() {
                None
            } else {
                Some(parse_path(to, cut_text)?)
            };
            Ok(CutKind::Range { from, to })
        }
        _ => Err(Error::cut_parse(
            cut_text,
            "too many range bounds (escape '-' inside keys)",
        )),
    }
}

fn apply_converter(kind: CutKind, convert: impl Fn(Path) -> Path) -> CutKind {
    match kind {
        CutKind::Point { path } => CutKind::Point {
            path: convert(path),
        },
        CutKind::Range { from, to } => CutKind::Range {
            from: from.map(&convert),
            to: to.map(&convert),
        },
        CutKind::Set { paths } => CutKind::Set {
            paths: paths.into_iter().map(convert).collect(),
        },
    }
}

/// Parse a single cut (no `|` separators) against the cube
fn parse_single_cut(cube: &Cube, cut_text: &str, converters: &RoleConverters) -> Result<Cut> {
    let (spec, header) = cut_header(cut_text).map_err(|_| {
        Error::cut_parse(
            cut_text,
            "expected '[!]dimension[@hierarchy]:path' with word characters in names",
        )
    })?;

    let dimension = cube.dimension(header.dimension).map_err(|_| {
        Error::cut_parse(
            cut_text,
            format!("unknown dimension '{}'", header.dimension),
        )
    })?;
    let hierarchy = dimension
        .hierarchy(header.hierarchy)
        .map_err(|e| Error::cut_parse(cut_text, e.to_string()))?;

    let kind = parse_path_spec(spec, cut_text)?;
    let converter = converters.get(dimension.role);
    let kind = apply_converter(kind, |path| converter.convert(dimension, hierarchy, path));

    let cut = Cut {
        dimension: dimension.name.clone(),
        hierarchy: header.hierarchy.map(str::to_string),
        invert: header.invert,
        hidden: false,
        kind,
    };
    validate_cut(cube, &cut, cut_text)?;
    Ok(cut)
}

/// Check a cut against the cube, whichever form it arrived in
///
/// Errors name `cut_text` as the offending input.
pub fn validate_cut(cube: &Cube, cut: &Cut, cut_text: &str) -> Result<()> {
    let dimension = cube.dimension(&cut.dimension).map_err(|_| {
        Error::cut_parse(cut_text, format!("unknown dimension '{}'", cut.dimension))
    })?;
    let hierarchy = dimension
        .hierarchy(cut.hierarchy.as_deref())
        .map_err(|e| Error::cut_parse(cut_text, e.to_string()))?;

    let paths: Vec<&Path> = match &cut.kind {
        CutKind::Point { path } => vec![path],
        CutKind::Range { from, to } => {
            if from.is_none() && to.is_none() {
                return Err(Error::cut_parse(cut_text, "range without bounds"));
            }
            from.iter().chain(to.iter()).collect()
        }
        CutKind::Set { paths } => {
            if paths.is_empty() {
                return Err(Error::cut_parse(cut_text, "set without members"));
            }
            paths.iter().collect()
        }
    };
    for path in paths {
        if path.is_empty() {
            return Err(Error::cut_parse(cut_text, "missing member path"));
        }
        if path.iter().any(String::is_empty) {
            return Err(Error::cut_parse(cut_text, "empty member key in path"));
        }
    }

    if cut.level_depth() > hierarchy.len() {
        return Err(Error::cut_parse(
            cut_text,
            format!(
                "path is deeper than hierarchy '{}' ({} levels)",
                hierarchy.name,
                hierarchy.len()
            ),
        ));
    }
    Ok(())
}

/// Parse a cut string into cuts, in textual order
///
/// Role converters translate symbolic members (e.g. `yesterday` on a time
/// dimension) before the cut is built.
pub fn cuts_from_string(cube: &Cube, text: &str, converters: &RoleConverters) -> Result<Vec<Cut>> {
    if text.trim().is_empty() {
        return Err(Error::cut_parse(text, "empty cut"));
    }
    split_unescaped(text, CUT_SEPARATOR)
        .into_iter()
        .map(|cut_text| {
            // An empty piece has no text of its own to report
            if cut_text.trim().is_empty() {
                return Err(Error::cut_parse(text, "empty cut between separators"));
            }
            parse_single_cut(cube, cut_text, converters)
        })
        .collect()
}

/// Parse every occurrence of a repeated cut parameter and concatenate the cuts
///
/// Empty occurrences (`?cut=`) are skipped.
pub fn cuts_from_strings<'a, I>(cube: &Cube, texts: I, converters: &RoleConverters) -> Result<Vec<Cut>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut cuts = Vec::new();
    for text in texts {
        if text.trim().is_empty() {
            continue;
        }
        cuts.extend(cuts_from_string(cube, text, converters)?);
    }
    Ok(cuts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::converter::MemberConverter;
    use crate::model::{Dimension, DimensionRole, Hierarchy};
    use serde_json::json;

    fn cube() -> Cube {
        serde_json::from_value(json!({
            "name": "sales",
            "dimensions": [
                {"name": "date", "role": "time",
                 "levels": [{"name": "year"}, {"name": "month"}, {"name": "day"}]},
                {"name": "geography",
                 "levels": [{"name": "country"}, {"name": "city"}],
                 "hierarchies": [
                    {"name": "default", "levels": ["country", "city"]},
                    {"name": "cities", "levels": ["city"]}
                 ]},
                {"name": "product"}
            ],
            "measures": [{"name": "amount"}]
        }))
        .unwrap()
    }

    fn path(keys: &[&str]) -> Path {
        keys.iter().map(|k| k.to_string()).collect()
    }

    fn parse(text: &str) -> Result<Vec<Cut>> {
        cuts_from_string(&cube(), text, &RoleConverters::new())
    }

    #[test]
    fn test_header() {
        let (rest, header) = cut_header("!geography@cities:berlin").unwrap();
        assert_eq!(rest, "berlin");
        assert_eq!(
            header,
            CutHeader {
                invert: true,
                dimension: "geography",
                hierarchy: Some("cities")
            }
        );
        assert!(cut_header("geography").is_err());
        assert!(cut_header(":2024").is_err());
    }

    #[test]
    fn test_point_cut() {
        let cuts = parse("date:2024,3").unwrap();
        assert_eq!(cuts, vec![Cut::point("date", path(&["2024", "3"]))]);
    }

    #[test]
    fn test_multiple_cuts_keep_order() {
        let cuts = parse("product:tea|date:2024").unwrap();
        assert_eq!(cuts.len(), 2);
        assert_eq!(cuts[0].dimension, "product");
        assert_eq!(cuts[1].dimension, "date");
    }

    #[test]
    fn test_range_cut() {
        let cuts = parse("date:2023,1-2023,6").unwrap();
        assert_eq!(
            cuts,
            vec![Cut::range(
                "date",
                Some(path(&["2023", "1"])),
                Some(path(&["2023", "6"]))
            )]
        );

        let open = parse("date:2023-").unwrap();
        assert_eq!(open, vec![Cut::range("date", Some(path(&["2023"])), None)]);
        let open = parse("date:-2023").unwrap();
        assert_eq!(open, vec![Cut::range("date", None, Some(path(&["2023"])))]);
    }

    #[test]
    fn test_set_cut_with_hierarchy_and_invert() {
        let cuts = parse("!geography@cities:berlin;paris").unwrap();
        assert_eq!(
            cuts,
            vec![Cut::set("geography", vec![path(&["berlin"]), path(&["paris"])])
                .with_hierarchy("cities")
                .inverted()]
        );
    }

    #[test]
    fn test_escaped_separators() {
        let cuts = parse(r"product:earl\-grey\|x\,y").unwrap();
        assert_eq!(cuts, vec![Cut::point("product", path(&["earl-grey|x,y"]))]);
    }

    #[test]
    fn test_errors_name_offending_text() {
        for text in [
            "date",
            "date:",
            "date:2020-2021-2022",
            "date:-",
            "date:2020,,1",
            "unknown:1",
            "geography@nope:de",
            "date:1,2,3,4",
        ] {
            match parse(text) {
                Err(Error::CutParse { cut, .. }) => assert_eq!(cut, text),
                other => panic!("expected cut parse error for {:?}, got {:?}", text, other),
            }
        }
    }

    #[test]
    fn test_error_names_only_bad_cut() {
        match parse("date:2024|bogus:1") {
            Err(Error::CutParse { cut, message }) => {
                assert_eq!(cut, "bogus:1");
                assert!(message.contains("bogus"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_repeated_parameters_concatenate() {
        let cube = cube();
        let converters = RoleConverters::new();
        let all = cuts_from_strings(&cube, ["date:2024", "product:tea|geography:de"], &converters)
            .unwrap();
        let mut expected = cuts_from_string(&cube, "date:2024", &converters).unwrap();
        expected.extend(cuts_from_string(&cube, "product:tea|geography:de", &converters).unwrap());
        assert_eq!(all, expected);
        assert_eq!(all.len(), 3);

        let skipped = cuts_from_strings(&cube, ["", "date:2024"], &converters).unwrap();
        assert_eq!(skipped.len(), 1);
    }

    struct Fixed;

    impl MemberConverter for Fixed {
        fn convert(&self, _dimension: &Dimension, hierarchy: &Hierarchy, path: Path) -> Path {
            if path == ["today"] {
                hierarchy.levels.iter().map(|_| "1".to_string()).collect()
            } else {
                path
            }
        }
    }

    #[test]
    fn test_role_converter_applied_to_time_only() {
        let converters = RoleConverters::new().with_converter(DimensionRole::Time, Fixed);
        let cuts = cuts_from_string(&cube(), "date:today|product:today", &converters).unwrap();
        assert_eq!(cuts[0], Cut::point("date", path(&["1", "1", "1"])));
        assert_eq!(cuts[1], Cut::point("product", path(&["today"])));

        let range = cuts_from_string(&cube(), "date:today-2030", &converters).unwrap();
        assert_eq!(
            range[0],
            Cut::range("date", Some(path(&["1", "1", "1"])), Some(path(&["2030"])))
        );
    }

    #[test]
    fn test_empty_text_rejected() {
        assert!(matches!(parse("  "), Err(Error::CutParse { .. })));
    }

    #[test]
    fn test_empty_piece_names_whole_text() {
        for text in ["date:2024|", "|date:2024", "date:2024||product:tea"] {
            match parse(text) {
                Err(Error::CutParse { cut, message }) => {
                    assert_eq!(cut, text);
                    assert!(message.contains("separators"));
                }
                other => panic!("expected cut parse error for {:?}, got {:?}", text, other),
            }
        }
    }

    #[test]
    fn test_validate_cut_dictionary_forms() {
        let cube = cube();
        let deep = Cut::point("date", path(&["2024", "1", "1", "1"]));
        let open = Cut::range("date", None, None);
        let empty = Cut::point("date", Vec::new());
        let blank_key = Cut::set("product", vec![path(&["tea"]), path(&[""])]);
        for cut in [deep, open, empty, blank_key] {
            assert!(matches!(
                validate_cut(&cube, &cut, "cut"),
                Err(Error::CutParse { .. })
            ));
        }

        let fine = Cut::point("geography", path(&["berlin"])).with_hierarchy("cities");
        assert!(validate_cut(&cube, &fine, "cut").is_ok());
        let too_deep = Cut::point("geography", path(&["de", "berlin"])).with_hierarchy("cities");
        assert!(validate_cut(&cube, &too_deep, "cut").is_err());
    }
}
