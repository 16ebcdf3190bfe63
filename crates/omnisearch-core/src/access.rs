//! Workspace and user handles, and the datastore-level grant check every
//! backend runs before touching its data.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::types::{DatastoreId, WorkspaceId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    #[serde(default)]
    pub datastores: BTreeSet<DatastoreId>,
}

impl Workspace {
    pub fn new<I, S>(id: impl Into<String>, datastores: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { id: id.into(), datastores: datastores.into_iter().map(Into::into).collect() }
    }
}

/// A user's grant inside one workspace. `datastores: None` grants all of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    #[serde(default)]
    pub datastores: Option<BTreeSet<DatastoreId>>,
}

impl Membership {
    pub fn all() -> Self {
        Self { datastores: None }
    }

    pub fn only<I, S>(datastores: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { datastores: Some(datastores.into_iter().map(Into::into).collect()) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub memberships: BTreeMap<WorkspaceId, Membership>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), memberships: BTreeMap::new() }
    }

    pub fn member_of(mut self, workspace: impl Into<String>, membership: Membership) -> Self {
        self.memberships.insert(workspace.into(), membership);
        self
    }

    /// Datastores of `workspace` this user may read.
    pub fn granted(&self, workspace: &Workspace) -> Result<BTreeSet<DatastoreId>> {
        let membership = self.memberships.get(&workspace.id).ok_or_else(|| {
            Error::Authorization(format!(
                "user '{}' is not a member of workspace '{}'",
                self.id, workspace.id
            ))
        })?;
        Ok(match &membership.datastores {
            None => workspace.datastores.clone(),
            Some(allowed) => workspace.datastores.intersection(allowed).cloned().collect(),
        })
    }
}

/// Resolve the datastores a query may touch.
///
/// Asking for a datastore outside the user's grant is an error, not a silent
/// narrowing. An empty or absent `requested` set means "everything granted".
pub fn resolve_scope(
    workspace: &Workspace,
    user: &User,
    requested: Option<&BTreeSet<DatastoreId>>,
) -> Result<BTreeSet<DatastoreId>> {
    let granted = user.granted(workspace)?;
    match requested {
        Some(req) if !req.is_empty() => {
            if let Some(denied) = req.iter().find(|d| !granted.contains(*d)) {
                return Err(Error::Authorization(format!(
                    "user '{}' has no access to datastore '{}' in workspace '{}'",
                    user.id, denied, workspace.id
                )));
            }
            Ok(req.clone())
        }
        _ => Ok(granted),
    }
}
