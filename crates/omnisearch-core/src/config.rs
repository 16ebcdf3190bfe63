use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::access::{Membership, User, Workspace};
use crate::context::{BackendOptions, DEFAULT_MAX_SIZE};
use crate::types::DEFAULT_SIZE;

pub const ENV_PREFIX: &str = "OMNISEARCH_";

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    /// `path`, then `config.<env>.toml` next to it, then `OMNISEARCH_*` env vars.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let dir = path.parent().unwrap_or_else(|| Path::new(""));

        let mut figment = Figment::new().merge(Toml::file(path));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(toml: &str) -> anyhow::Result<Self> {
        let config = Self { figment: Figment::new().merge(Toml::string(toml)) };
        config.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    fn get_or_default<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        if self.figment.find_value(key).is_err() {
            return Ok(T::default());
        }
        self.get(key)
    }

    pub fn search(&self) -> anyhow::Result<SearchSettings> {
        self.get_or_default("search")
    }

    pub fn backend(&self) -> anyhow::Result<BackendSettings> {
        self.get_or_default("backend")
    }

    pub fn access(&self) -> anyhow::Result<AccessConfig> {
        self.get_or_default("access")
    }

    /// `data.index_dir`, resolved against `base` when relative.
    pub fn index_dir(&self, base: &Path) -> Option<PathBuf> {
        self.get::<String>("data.index_dir").ok().map(|p| resolve_with_base(base, p))
    }

    fn validate(&self) -> anyhow::Result<()> {
        let search = self.search()?;
        if search.default_size == 0 {
            anyhow::bail!("search.default_size must be positive");
        }
        if search.default_size > search.max_size {
            anyhow::bail!(
                "search.default_size ({}) exceeds search.max_size ({})",
                search.default_size,
                search.max_size
            );
        }
        self.backend()?;
        self.access()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub default_size: usize,
    pub max_size: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { default_size: DEFAULT_SIZE as usize, max_size: DEFAULT_MAX_SIZE }
    }
}

/// TOML and env values arrive typed; backend options are plain strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl std::fmt::Display for OptionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub kind: String,
    pub options: BTreeMap<String, OptionValue>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self { kind: "text".to_string(), options: BTreeMap::new() }
    }
}

impl BackendSettings {
    pub fn options(&self) -> BackendOptions {
        self.options.iter().map(|(k, v)| (k.clone(), v.to_string())).collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceEntry {
    #[serde(default)]
    pub datastores: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserEntry {
    #[serde(default)]
    pub workspaces: BTreeMap<String, Membership>,
}

/// Static workspace/user definitions for the CLI and tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub workspaces: BTreeMap<String, WorkspaceEntry>,
    pub users: BTreeMap<String, UserEntry>,
}

impl AccessConfig {
    pub fn workspace(&self, id: &str) -> anyhow::Result<Workspace> {
        let entry = self
            .workspaces
            .get(id)
            .ok_or_else(|| anyhow::anyhow!("unknown workspace '{}'", id))?;
        Ok(Workspace::new(id, entry.datastores.iter().cloned()))
    }

    pub fn user(&self, id: &str) -> anyhow::Result<User> {
        let entry = self.users.get(id).ok_or_else(|| anyhow::anyhow!("unknown user '{}'", id))?;
        Ok(entry
            .workspaces
            .iter()
            .fold(User::new(id), |user, (ws, m)| user.member_of(ws.clone(), m.clone())))
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
