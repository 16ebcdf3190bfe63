//! Construction context shared by all backends.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::access::{resolve_scope, User, Workspace};
use crate::error::{Error, Result};
use crate::types::{QueryPlan, SearchRequest};

pub const DEFAULT_MAX_SIZE: usize = 1000;

/// Open-ended, backend-specific named options.
///
/// Each backend documents the keys it recognizes; the rest are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendOptions(BTreeMap<String, String>);

impl BackendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Parse an option, failing with `Configuration` when present but invalid.
    pub fn parse<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|e| {
                    Error::configuration(format!("option '{key}' has invalid value '{raw}': {e}"))
                })
            })
            .transpose()
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| Error::configuration(format!("missing required option '{key}'")))
    }

    /// Log every key not listed in `recognized`.
    pub fn note_unrecognized(&self, backend: &str, recognized: &[&str]) {
        for key in self.0.keys().filter(|k| !recognized.contains(&k.as_str())) {
            debug!(backend, option = %key, "ignoring unrecognized backend option");
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BackendOptions {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Workspace, user and options a backend is bound to for its lifetime.
#[derive(Debug, Clone)]
pub struct BackendContext {
    workspace: Arc<Workspace>,
    user: Arc<User>,
    options: BackendOptions,
    max_size: usize,
}

impl BackendContext {
    /// Recognized here: `max_size` (positive integer, default 1000).
    pub fn new(workspace: Arc<Workspace>, user: Arc<User>, options: BackendOptions) -> Result<Self> {
        let max_size = options.parse::<usize>("max_size")?.unwrap_or(DEFAULT_MAX_SIZE);
        if max_size == 0 {
            return Err(Error::configuration("option 'max_size' must be positive"));
        }
        Ok(Self { workspace, user, options, max_size })
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn options(&self) -> &BackendOptions {
        &self.options
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Same workspace and user, different options.
    pub fn with_options(&self, options: BackendOptions) -> Result<Self> {
        Self::new(Arc::clone(&self.workspace), Arc::clone(&self.user), options)
    }

    /// Validate pagination and resolve the authorized scope of `request`.
    ///
    /// Performs no I/O; backends call this before anything else.
    pub fn plan(&self, request: &SearchRequest) -> Result<QueryPlan> {
        if request.start < 0 {
            return Err(Error::InvalidPagination(format!(
                "start must be non-negative, got {}",
                request.start
            )));
        }
        if request.size <= 0 {
            return Err(Error::InvalidPagination(format!("size must be positive, got {}", request.size)));
        }
        let datastores = resolve_scope(&self.workspace, &self.user, request.datastores.as_ref())?;
        let start = usize::try_from(request.start)
            .map_err(|_| Error::InvalidPagination(format!("start {} out of range", request.start)))?;
        let size = usize::try_from(request.size).unwrap_or(usize::MAX).min(self.max_size);
        let types = request.types.clone().filter(|t| !t.is_empty());
        let query = request.query.trim().to_string();
        let plan = QueryPlan {
            workspace_id: self.workspace.id.clone(),
            match_all: query.is_empty(),
            query,
            types,
            datastores,
            start,
            size,
            facets: request.facets.clone(),
        };
        debug!(
            workspace = %plan.workspace_id,
            user = %self.user.id,
            datastores = plan.datastores.len(),
            start = plan.start,
            size = plan.size,
            "planned search"
        );
        Ok(plan)
    }
}
