//! Workspace builder with pluggable engines
//!
//! The [`Workspace`] ties the cube catalog to the browsing engine, the
//! optional authorizer and the calendar used for time members.

use super::authorizer::SimpleAuthorizer;
use super::memory::MemoryBrowser;
use super::traits::{Authorizer, Browser, Identity};
use crate::calendar::{Calendar, CalendarMemberConverter};
use crate::cell::RoleConverters;
use crate::config::ApplicationConfig;
use crate::error::{Error, Result};
use crate::model::{Cube, DimensionRole, Model};
use chrono::Weekday;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builder for configuring a workspace with custom engines
pub struct WorkspaceBuilder {
    cubes: Vec<Cube>,
    browser: Option<Arc<dyn Browser>>,
    authorizer: Option<Arc<dyn Authorizer>>,
    calendar: Calendar,
    info: Map<String, Value>,
}

impl WorkspaceBuilder {
    /// Create a new workspace builder
    pub fn new() -> Self {
        Self {
            cubes: Vec::new(),
            browser: None,
            authorizer: None,
            calendar: Calendar::default(),
            info: Map::new(),
        }
    }

    /// Add a cube to the catalog
    pub fn with_cube(mut self, cube: Cube) -> Self {
        self.cubes.push(cube);
        self
    }

    /// Add several cubes to the catalog
    pub fn with_cubes(mut self, cubes: impl IntoIterator<Item = Cube>) -> Self {
        self.cubes.extend(cubes);
        self
    }

    /// Set the browsing engine
    pub fn with_browser<B>(mut self, browser: B) -> Self
    where
        B: Browser + 'static,
    {
        self.browser = Some(Arc::new(browser));
        self
    }

    /// Set the browsing engine from an existing Arc
    ///
    /// Use this when the caller keeps a handle to the engine (e.g. to load
    /// more facts into a [`MemoryBrowser`]).
    pub fn with_browser_arc(mut self, browser: Arc<dyn Browser>) -> Self {
        self.browser = Some(browser);
        self
    }

    /// Set the authorizer
    pub fn with_authorizer<A>(mut self, authorizer: A) -> Self
    where
        A: Authorizer + 'static,
    {
        self.authorizer = Some(Arc::new(authorizer));
        self
    }

    /// Set the calendar
    pub fn with_calendar(mut self, calendar: Calendar) -> Self {
        self.calendar = calendar;
        self
    }

    /// Set workspace info returned by `/info`
    pub fn with_info(mut self, info: Map<String, Value>) -> Self {
        self.info = info;
        self
    }

    /// Build the workspace
    pub fn build(self) -> Result<Workspace> {
        let browser = self
            .browser
            .ok_or_else(|| Error::Configuration("No browser configured".to_string()))?;

        let mut cubes: Vec<Arc<Cube>> = Vec::with_capacity(self.cubes.len());
        for cube in self.cubes {
            if cubes.iter().any(|existing| existing.name == cube.name) {
                return Err(Error::Configuration(format!(
                    "Cube '{}' registered twice",
                    cube.name
                )));
            }
            cubes.push(Arc::new(cube));
        }

        let calendar = Arc::new(self.calendar);
        let converters = RoleConverters::new().with_converter(
            DimensionRole::Time,
            CalendarMemberConverter::new(calendar.clone()),
        );

        info!(
            cubes = cubes.len(),
            browser = browser.engine_id(),
            authorization = self.authorizer.is_some(),
            "Workspace ready"
        );

        Ok(Workspace {
            cubes,
            browser,
            authorizer: self.authorizer,
            calendar,
            converters,
            info: self.info,
        })
    }
}

impl Default for WorkspaceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Cube catalog with its browsing engine
pub struct Workspace {
    cubes: Vec<Arc<Cube>>,
    browser: Arc<dyn Browser>,
    authorizer: Option<Arc<dyn Authorizer>>,
    calendar: Arc<Calendar>,
    converters: RoleConverters,
    info: Map<String, Value>,
}

impl Workspace {
    /// Start building a workspace
    pub fn builder() -> WorkspaceBuilder {
        WorkspaceBuilder::new()
    }

    /// Build the workspace described by the application configuration
    ///
    /// Loads the model file (if any) and serves its inline facts with the
    /// in-memory browser.
    pub fn from_config(config: &ApplicationConfig) -> Result<Self> {
        let model = match &config.workspace.model_path {
            Some(path) => {
                debug!(path = %path.display(), "Loading model");
                Model::load(path)?
            }
            None => {
                warn!("No model configured, workspace has no cubes");
                Model::default()
            }
        };

        let first_weekday = weekday_from_index(config.calendar.first_weekday)?;
        let calendar = Calendar::new(config.calendar.timezone.clone(), first_weekday);

        let mut info = model.info.clone();
        info.extend(config.workspace.info.clone());

        let mut builder = WorkspaceBuilder::new()
            .with_browser(MemoryBrowser::from_model(&model))
            .with_calendar(calendar.clone())
            .with_info(info)
            .with_cubes(model.cubes);

        if config.authorization.enabled {
            let converters = RoleConverters::new().with_converter(
                DimensionRole::Time,
                CalendarMemberConverter::new(Arc::new(calendar)),
            );
            builder = builder.with_authorizer(
                SimpleAuthorizer::from_config(&config.authorization).with_converters(converters),
            );
        }

        builder.build()
    }

    /// Cube by name, as visible to the identity
    ///
    /// Cubes the identity may not use are reported as unknown.
    pub async fn cube(&self, name: &str, identity: &Identity) -> Result<Arc<Cube>> {
        let cube = self
            .cubes
            .iter()
            .find(|cube| cube.name == name)
            .ok_or_else(|| Error::not_found(format!("Unknown cube '{}'", name)))?;

        if let Some(authorizer) = &self.authorizer {
            if !authorizer.authorize(identity, cube).await? {
                debug!(cube = %name, identity = %identity, "Cube access denied");
                return Err(Error::not_found(format!("Unknown cube '{}'", name)));
            }
        }
        Ok(cube.clone())
    }

    /// Cubes visible to the identity, in catalog order
    pub async fn list_cubes(&self, identity: &Identity) -> Result<Vec<Arc<Cube>>> {
        let mut visible = Vec::with_capacity(self.cubes.len());
        for cube in &self.cubes {
            let allowed = match &self.authorizer {
                Some(authorizer) => authorizer.authorize(identity, cube).await?,
                None => true,
            };
            if allowed {
                visible.push(cube.clone());
            }
        }
        Ok(visible)
    }

    /// Names of all cubes regardless of rights
    pub fn cube_names(&self) -> Vec<&str> {
        self.cubes.iter().map(|cube| cube.name.as_str()).collect()
    }

    /// Browsing engine
    pub fn browser(&self) -> &Arc<dyn Browser> {
        &self.browser
    }

    /// Authorizer, if access control is enabled
    pub fn authorizer(&self) -> Option<&Arc<dyn Authorizer>> {
        self.authorizer.as_ref()
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    /// Member converters applied when parsing cuts
    pub fn converters(&self) -> &RoleConverters {
        &self.converters
    }

    pub fn info(&self) -> &Map<String, Value> {
        &self.info
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("cubes", &self.cube_names())
            .field("browser", &self.browser.engine_id())
            .field("authorization", &self.authorizer.is_some())
            .finish()
    }
}

fn weekday_from_index(index: u8) -> Result<Weekday> {
    match index {
        0 => Ok(Weekday::Mon),
        1 => Ok(Weekday::Tue),
        2 => Ok(Weekday::Wed),
        3 => Ok(Weekday::Thu),
        4 => Ok(Weekday::Fri),
        5 => Ok(Weekday::Sat),
        6 => Ok(Weekday::Sun),
        other => Err(Error::Configuration(format!(
            "first_weekday must be between 0 and 6, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RightsConfig;
    use crate::model::{Dimension, Measure};

    fn cube(name: &str) -> Cube {
        Cube::new(
            name,
            vec![Dimension::with_levels("product", vec![])],
            vec![Measure {
                name: "amount".into(),
                label: None,
            }],
        )
    }

    #[test]
    fn test_builder_requires_browser() {
        let result = WorkspaceBuilder::new().with_cube(cube("sales")).build();
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_duplicate_cube_rejected() {
        let result = Workspace::builder()
            .with_browser(MemoryBrowser::new())
            .with_cubes([cube("sales"), cube("sales")])
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unknown_and_denied_cubes_are_not_found() {
        let mut rights = std::collections::HashMap::new();
        rights.insert(
            "alice".to_string(),
            RightsConfig {
                allow_cubes: vec!["sales".into()],
                ..RightsConfig::default()
            },
        );
        let workspace = Workspace::builder()
            .with_browser(MemoryBrowser::new())
            .with_authorizer(SimpleAuthorizer::new(rights))
            .with_cubes([cube("sales"), cube("hr")])
            .build()
            .unwrap();

        let alice = Identity::named("alice");
        assert!(workspace.cube("sales", &alice).await.is_ok());
        assert!(matches!(workspace.cube("hr", &alice).await, Err(Error::NotFound(_))));
        assert!(matches!(workspace.cube("nope", &alice).await, Err(Error::NotFound(_))));

        let visible = workspace.list_cubes(&alice).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(workspace.cube_names(), vec!["sales", "hr"]);
    }

    #[test]
    fn test_from_config_without_model() {
        let workspace = Workspace::from_config(&ApplicationConfig::default()).unwrap();
        assert!(workspace.cube_names().is_empty());
        assert!(workspace.authorizer().is_none());
        assert!(workspace.converters().contains(DimensionRole::Time));
        assert_eq!(workspace.calendar().first_weekday(), Weekday::Mon);
    }
}
