use crate::error::{ErrorKind, Result};
use directories::{ProjectDirs, UserDirs};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "sastra.toml";
const SETTINGS_FILE: &str = "settings.json";
const SESSION_FILE: &str = "session.json";
const DATABASE_FILE: &str = "sastra.db";
const ENV_PREFIX: &str = "SASTRA_";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("app", "sastra", "sastra")
}

/// Application configuration.
///
/// Layered, lowest priority first:
///
/// 1. built-in defaults,
/// 2. `sastra.toml` in the platform config directory (or an explicit file),
/// 3. `SASTRA_*` environment variables, nested with `__`
///    (`SASTRA_REMOTE__URL`, `SASTRA_PATHS__DOCUMENTS`, `SASTRA_PERMITTED_ROLE`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub paths: PathsConfig,
    /// Role a signed-in user needs for online and bundled books.
    pub permitted_role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Project base URL, e.g. `https://<project>.supabase.co`.
    pub url: String,
    /// Public anon key sent with every request.
    pub anon_key: String,
    /// Storage bucket holding the zipped tables of contents.
    pub toc_bucket: String,
    /// Bound on every remote call and archive read.
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self { url: String::new(), anon_key: String::new(), toc_bucket: "toc".to_string(), timeout_secs: 30 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Document root; downloaded books live under `SastraApp/` inside it.
    pub documents: PathBuf,
    /// Bundled-resource root; holds `resources/`.
    pub resources: PathBuf,
    /// Local store database file.
    pub database: PathBuf,
    /// Persisted reader settings.
    pub settings: PathBuf,
    /// Saved sign-in session.
    pub session: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let dirs = project_dirs();
        let data_dir = dirs.as_ref().map_or_else(|| PathBuf::from(".sastra"), |d| d.data_dir().to_path_buf());
        let config_dir = dirs.as_ref().map_or_else(|| PathBuf::from(".sastra"), |d| d.config_dir().to_path_buf());
        let documents = UserDirs::new()
            .and_then(|u| u.document_dir().map(Path::to_path_buf))
            .unwrap_or_else(|| data_dir.join("documents"));
        Self {
            documents,
            resources: data_dir.clone(),
            database: data_dir.join(DATABASE_FILE),
            settings: config_dir.join(SETTINGS_FILE),
            session: config_dir.join(SESSION_FILE),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self { remote: RemoteConfig::default(), paths: PathsConfig::default(), permitted_role: "permitted".to_string() }
    }
}

impl Config {
    /// `sastra.toml` in the platform config directory, if the platform has one.
    pub fn default_file() -> Option<PathBuf> {
        project_dirs().map(|d| d.config_dir().join(CONFIG_FILE))
    }

    /// The layered sources, before extraction.
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load from the default file and the environment, then validate.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_file().as_deref())
    }

    /// Load from an explicit file (missing files are skipped) and the
    /// environment, then validate.
    pub fn load_from(file: Option<&Path>) -> Result<Self> {
        let config: Config = Self::figment(file).extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        tracing::debug!(
            remote = %config.remote.url,
            documents = %config.paths.documents.display(),
            database = %config.paths.database.display(),
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.remote.url.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("remote.url must be set".to_string()));
        }
        if self.remote.anon_key.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("remote.anon_key must be set".to_string()));
        }
        if self.remote.timeout_secs == 0 {
            exn::bail!(ErrorKind::Invalid("remote.timeout_secs must be greater than zero".to_string()));
        }
        if self.remote.toc_bucket.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("remote.toc_bucket must be set".to_string()));
        }
        for (name, path) in [("paths.documents", &self.paths.documents), ("paths.resources", &self.paths.resources)] {
            if !path.is_absolute() {
                exn::bail!(ErrorKind::Invalid(format!("{name} must be an absolute path")));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.remote.timeout_secs)
    }
}
