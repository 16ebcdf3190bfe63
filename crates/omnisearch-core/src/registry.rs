//! Name -> constructor table for backends selected by configuration.

use std::collections::BTreeMap;

use crate::context::BackendContext;
use crate::error::{Error, Result};
use crate::traits::SearchBackend;

pub type Constructor = Box<dyn Fn(BackendContext) -> Result<Box<dyn SearchBackend>> + Send + Sync>;

#[derive(Default)]
pub struct BackendRegistry {
    constructors: BTreeMap<String, Constructor>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `constructor` under `name`, replacing any previous entry.
    pub fn register<F, B>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(BackendContext) -> Result<B> + Send + Sync + 'static,
        B: SearchBackend + 'static,
    {
        self.constructors.insert(
            name.into(),
            Box::new(move |ctx: BackendContext| constructor(ctx).map(|b| Box::new(b) as Box<dyn SearchBackend>)),
        );
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Construct backend `name`. An unknown name fails here, at construction.
    pub fn build(&self, name: &str, ctx: BackendContext) -> Result<Box<dyn SearchBackend>> {
        let constructor = self.constructors.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.names().collect();
            Error::configuration(format!("unknown backend '{name}' (registered: {})", known.join(", ")))
        })?;
        constructor(ctx)
    }
}
