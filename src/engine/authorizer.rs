//! Rights-table authorizer
//!
//! Each identity has a rights entry with cube allow/deny lists, restriction
//! cuts per cube and hierarchy limits per cube. Identities without an entry (including anonymous requests)
//! fall back to the guest entry when one is configured, and are refused
//! otherwise.

use super::traits::{Authorizer, Identity};
use crate::cell::{cuts_from_string, Cell, RoleConverters};
use crate::config::{AuthorizationConfig, RightsConfig};
use crate::error::{Error, Result};
use crate::model::{Cube, HierarchyLimits};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

const ANY_CUBE: &str = "*";

/// Authorizer backed by a static rights table
#[derive(Debug, Clone, Default)]
pub struct SimpleAuthorizer {
    rights: HashMap<String, RightsConfig>,
    guest: Option<String>,
    converters: RoleConverters,
}

impl SimpleAuthorizer {
    pub fn new(rights: HashMap<String, RightsConfig>) -> Self {
        Self {
            rights,
            guest: None,
            converters: RoleConverters::new(),
        }
    }

    pub fn from_config(config: &AuthorizationConfig) -> Self {
        Self {
            rights: config.rights.clone(),
            guest: config.guest.clone(),
            converters: RoleConverters::new(),
        }
    }

    /// Rights entry applied to identities without their own
    pub fn with_guest(mut self, guest: impl Into<String>) -> Self {
        self.guest = Some(guest.into());
        self
    }

    /// Member converters used when parsing restriction cuts
    pub fn with_converters(mut self, converters: RoleConverters) -> Self {
        self.converters = converters;
        self
    }

    fn rights_for(&self, identity: &Identity) -> Option<&RightsConfig> {
        identity
            .name()
            .and_then(|name| self.rights.get(name))
            .or_else(|| self.guest.as_ref().and_then(|guest| self.rights.get(guest)))
    }
}

fn lists(list: &[String], cube: &str) -> bool {
    list.iter().any(|entry| entry == cube || entry == ANY_CUBE)
}

#[async_trait]
impl Authorizer for SimpleAuthorizer {
    async fn authorize(&self, identity: &Identity, cube: &Cube) -> Result<bool> {
        let rights = match self.rights_for(identity) {
            Some(rights) => rights,
            None => return Ok(false),
        };
        if lists(&rights.deny_cubes, &cube.name) {
            return Ok(false);
        }
        Ok(rights.allow_cubes.is_empty() || lists(&rights.allow_cubes, &cube.name))
    }

    async fn restricted_cell(&self, identity: &Identity, cube: &Cube, cell: Cell) -> Result<Cell> {
        let rights = self.rights_for(identity).ok_or_else(|| {
            Error::Forbidden(format!("Identity '{}' has no rights on cube '{}'", identity, cube.name))
        })?;

        let restrictions = match rights.cube_restrictions.get(&cube.name) {
            Some(restrictions) if !restrictions.is_empty() => restrictions,
            _ => return Ok(cell),
        };

        let mut cuts = Vec::new();
        for text in restrictions {
            let parsed = cuts_from_string(cube, text, &self.converters).map_err(|e| {
                Error::Configuration(format!(
                    "Invalid restriction for cube '{}': {}",
                    cube.name, e
                ))
            })?;
            cuts.extend(parsed);
        }
        debug!(
            cube = %cube.name,
            identity = %identity,
            restrictions = cuts.len(),
            "Restricting cell"
        );
        Ok(cell.restrict(cuts))
    }

    async fn hierarchy_limits(&self, identity: &Identity, cube: &Cube) -> Result<HierarchyLimits> {
        let configured = match self
            .rights_for(identity)
            .and_then(|rights| rights.hierarchy_limits.get(&cube.name))
        {
            Some(configured) => configured,
            None => return Ok(HierarchyLimits::new()),
        };

        let mut limits = HierarchyLimits::new();
        for (reference, level) in configured {
            let (dimension, hierarchy) = match reference.split_once('@') {
                Some((dimension, hierarchy)) => (dimension, Some(hierarchy)),
                None => (reference.as_str(), None),
            };
            let limit = cube
                .dimension(dimension)
                .and_then(|dim| dim.hierarchy_limit(hierarchy, level))
                .map_err(|e| {
                    Error::Configuration(format!(
                        "Invalid hierarchy limit '{}' for cube '{}': {}",
                        reference, cube.name, e
                    ))
                })?;
            limits.insert(dimension.to_string(), limit);
        }
        Ok(limits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cut;
    use crate::model::{Dimension, Level, Measure};
    use std::sync::Arc;

    fn cube(name: &str) -> Arc<Cube> {
        Arc::new(Cube::new(
            name,
            vec![Dimension::with_levels(
                "geography",
                vec![Level::new("country"), Level::new("city")],
            )],
            vec![Measure {
                name: "amount".into(),
                label: None,
            }],
        ))
    }

    fn authorizer() -> SimpleAuthorizer {
        let mut rights = HashMap::new();
        rights.insert(
            "alice".to_string(),
            RightsConfig {
                allow_cubes: vec!["sales".into()],
                deny_cubes: vec![],
                cube_restrictions: HashMap::from([(
                    "sales".to_string(),
                    vec!["geography:de".to_string()],
                )]),
                hierarchy_limits: HashMap::from([(
                    "sales".to_string(),
                    HashMap::from([("geography".to_string(), "country".to_string())]),
                )]),
            },
        );
        rights.insert(
            "public".to_string(),
            RightsConfig {
                deny_cubes: vec!["*".into()],
                ..RightsConfig::default()
            },
        );
        SimpleAuthorizer::new(rights).with_guest("public")
    }

    #[tokio::test]
    async fn test_authorize() {
        let auth = authorizer();
        let alice = Identity::named("alice");
        assert!(auth.authorize(&alice, &cube("sales")).await.unwrap());
        assert!(!auth.authorize(&alice, &cube("hr")).await.unwrap());
        assert!(!auth.authorize(&Identity::anonymous(), &cube("sales")).await.unwrap());
        assert!(!auth.authorize(&Identity::named("mallory"), &cube("sales")).await.unwrap());

        let no_guest = SimpleAuthorizer::new(HashMap::new());
        assert!(!no_guest.authorize(&Identity::anonymous(), &cube("sales")).await.unwrap());
    }

    #[tokio::test]
    async fn test_restriction_never_widens() {
        let auth = authorizer();
        let sales = cube("sales");
        let requested = Cell::new(
            sales.clone(),
            vec![Cut::point("geography", vec!["fr".into()])],
        );

        let restricted = auth
            .restricted_cell(&Identity::named("alice"), &sales, requested.clone())
            .await
            .unwrap();

        // The client cut stays, the restriction is added alongside it
        assert_eq!(&restricted.cuts()[..1], requested.cuts());
        assert_eq!(
            restricted.cuts()[1],
            Cut::point("geography", vec!["de".into()])
        );
    }

    #[tokio::test]
    async fn test_unrestricted_cube_unchanged() {
        let mut rights = HashMap::new();
        rights.insert("bob".to_string(), RightsConfig::default());
        let auth = SimpleAuthorizer::new(rights);
        let sales = cube("sales");
        let cell = Cell::whole(sales.clone());
        let restricted = auth
            .restricted_cell(&Identity::named("bob"), &sales, cell.clone())
            .await
            .unwrap();
        assert_eq!(restricted, cell);
    }

    #[tokio::test]
    async fn test_hierarchy_limits() {
        let auth = authorizer();
        let sales = cube("sales");

        let limits = auth
            .hierarchy_limits(&Identity::named("alice"), &sales)
            .await
            .unwrap();
        assert_eq!(limits["geography"].level, "country");
        assert_eq!(limits["geography"].hierarchy, None);

        let guest = auth
            .hierarchy_limits(&Identity::anonymous(), &sales)
            .await
            .unwrap();
        assert!(guest.is_empty());

        let mut rights = HashMap::new();
        rights.insert(
            "carol".to_string(),
            RightsConfig {
                hierarchy_limits: HashMap::from([(
                    "sales".to_string(),
                    HashMap::from([("geography".to_string(), "street".to_string())]),
                )]),
                ..RightsConfig::default()
            },
        );
        let result = SimpleAuthorizer::new(rights)
            .hierarchy_limits(&Identity::named("carol"), &sales)
            .await;
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
