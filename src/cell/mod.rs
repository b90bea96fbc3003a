//! Cells: the slice of a cube selected by a list of cuts

pub mod converter;
pub mod cut;
pub mod parser;

pub use converter::{IdentityConverter, MemberConverter, RoleConverters};
pub use cut::{path_to_string, Cut, CutKind, Path};
pub use parser::{cuts_from_string, cuts_from_strings, validate_cut};

use crate::model::Cube;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

/// A cube together with the cuts that narrow it
///
/// A cell without cuts is the whole cube.
#[derive(Debug, Clone)]
pub struct Cell {
    cube: Arc<Cube>,
    cuts: Vec<Cut>,
}

impl Cell {
    /// The whole cube
    pub fn whole(cube: Arc<Cube>) -> Self {
        Self {
            cube,
            cuts: Vec::new(),
        }
    }

    /// Cell from client cuts
    ///
    /// When several cuts name the same dimension the last one wins; survivors
    /// keep their relative order.
    pub fn new(cube: Arc<Cube>, cuts: Vec<Cut>) -> Self {
        let mut kept: Vec<Cut> = Vec::with_capacity(cuts.len());
        for cut in cuts {
            kept.retain(|existing| existing.dimension != cut.dimension);
            kept.push(cut);
        }
        Self { cube, cuts: kept }
    }

    pub fn cube(&self) -> &Arc<Cube> {
        &self.cube
    }

    pub fn cube_name(&self) -> &str {
        &self.cube.name
    }

    pub fn cuts(&self) -> &[Cut] {
        &self.cuts
    }

    pub fn is_whole_cube(&self) -> bool {
        self.cuts.is_empty()
    }

    /// Narrow the cell with restriction cuts
    ///
    /// Restriction cuts are appended without replacing client cuts on the
    /// same dimension, so a restricted cell is never wider than the original.
    pub fn restrict(mut self, cuts: impl IntoIterator<Item = Cut>) -> Self {
        self.cuts.extend(cuts);
        self
    }

    /// Cuts on one dimension, in cell order
    pub fn cuts_for_dimension<'a>(&'a self, dimension: &'a str) -> impl Iterator<Item = &'a Cut> + 'a {
        self.cuts.iter().filter(move |cut| cut.dimension == dimension)
    }

    /// First visible cut on a dimension
    pub fn cut_for_dimension(&self, dimension: &str) -> Option<&Cut> {
        self.cuts
            .iter()
            .find(|cut| cut.dimension == dimension && !cut.hidden)
    }

    /// Dictionary form returned to clients
    pub fn to_json(&self) -> Value {
        json!({
            "cube": self.cube.name,
            "cuts": self.cuts.iter().map(Cut::to_json).collect::<Vec<_>>(),
        })
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.cube.name == other.cube.name && self.cuts == other.cuts
    }
}

// Cut string form of the whole cell
impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.cuts.iter().map(Cut::to_string).collect();
        write!(f, "{}", parts.join("|"))
    }
}
