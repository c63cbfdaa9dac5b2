use std::time::Duration;

use scenegraph_core::error::CoreError;

/// Engine configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development and tests.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Delay between fixed-point passes of the migration worklist.
    pub poll_interval: Duration,
    /// Character budget of directory-derived scene set names.
    pub scene_set_name_budget: usize,
    /// Base name of the space a legacy migration writes into.
    pub migration_space_name: String,
    /// Entities copied between two cancellation checks.
    pub cancel_check_every: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            scene_set_name_budget: 50,
            migration_space_name: "legacy-migration".into(),
            cancel_check_every: 50,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default            |
    /// |------------------------------|--------------------|
    /// | `MIGRATION_POLL_INTERVAL_MS` | `100`              |
    /// | `SCENE_SET_NAME_BUDGET`      | `50`               |
    /// | `MIGRATION_SPACE_NAME`       | `legacy-migration` |
    /// | `COPY_SPAWN_CHECK_EVERY`     | `50`               |
    pub fn from_env() -> Result<Self, CoreError> {
        let defaults = Self::default();

        let poll_interval_ms: u64 = parse_var("MIGRATION_POLL_INTERVAL_MS", 100)?;
        let scene_set_name_budget: usize =
            parse_var("SCENE_SET_NAME_BUDGET", defaults.scene_set_name_budget)?;
        let migration_space_name = std::env::var("MIGRATION_SPACE_NAME")
            .unwrap_or(defaults.migration_space_name);
        let cancel_check_every: usize =
            parse_var("COPY_SPAWN_CHECK_EVERY", defaults.cancel_check_every)?;

        if scene_set_name_budget <= scenegraph_core::naming::ELLIPSIS.len() {
            return Err(CoreError::Validation(
                "SCENE_SET_NAME_BUDGET must leave room for the ellipsis".into(),
            ));
        }

        Ok(Self {
            poll_interval: Duration::from_millis(poll_interval_ms),
            scene_set_name_budget,
            migration_space_name,
            cancel_check_every: cancel_check_every.max(1),
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, CoreError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CoreError::Validation(format!("{name} must be a valid number, got '{raw}'"))),
        Err(_) => Ok(default),
    }
}
