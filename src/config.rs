use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::{compiler::SearchOptions, error::Error};

/// Name of the optional settings file (`catalog.toml`, `catalog.yaml`, ...)
/// looked up in the working directory.
pub const SETTINGS_FILE: &str = "catalog";

pub const DEFAULT_PAGE_SIZE: u64 = 100;

static SETTINGS: OnceCell<Settings> = OnceCell::new();

/// Process settings. Every field can be set in the settings file or through
/// an upper-case environment variable of the same name (`POSTGRES_SERVER`,
/// `CASE_INSENSITIVE_EQUALITY`, ...); the environment wins.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub postgres_server: String,
    pub postgres_user: String,
    pub postgres_password: String,
    pub postgres_db: String,
    #[serde(default = "default_test_db")]
    pub postgres_test_db: String,
    /// Connect to `postgres_test_db` instead of `postgres_db`.
    #[serde(default)]
    pub use_test_db: bool,
    /// Overrides the URL assembled from the `postgres_*` fields.
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default)]
    pub case_insensitive_equality: bool,
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,
}

fn default_test_db() -> String {
    "tests_challenger_expedition".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

impl Settings {
    /// Load from the settings file, if any, layered under the environment.
    pub fn load() -> Result<Self, Error> {
        Self::from_builder(
            config::Config::builder()
                .add_source(config::File::with_name(SETTINGS_FILE).required(false))
                .add_source(config::Environment::default()),
        )
    }

    /// Load from TOML text alone.
    pub fn from_toml(toml: &str) -> Result<Self, Error> {
        Self::from_builder(
            config::Config::builder()
                .add_source(config::File::from_str(toml, config::FileFormat::Toml)),
        )
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, Error> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        if settings.default_page_size == 0 {
            return Err(Error::Config(
                "default_page_size must be greater than zero".to_string(),
            ));
        }
        Ok(settings)
    }

    /// Settings of this process, loaded once on first use.
    pub fn global() -> Result<&'static Settings, Error> {
        SETTINGS.get_or_try_init(Settings::load)
    }

    pub fn database_url(&self) -> String {
        if let Some(url) = &self.database_url {
            return url.clone();
        }
        let db = if self.use_test_db {
            &self.postgres_test_db
        } else {
            &self.postgres_db
        };
        format!(
            "postgresql://{}:{}@{}/{}",
            self.postgres_user, self.postgres_password, self.postgres_server, db
        )
    }

    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            case_insensitive: self.case_insensitive_equality,
        }
    }
}
