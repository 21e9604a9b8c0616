//! Execution contexts.
//!
//! A [`Context`] binds a [`Config`](crate::config::Config) to a
//! [`StorageBackend`](crate::storage::StorageBackend). Every other object in the
//! crate is created within a context, either passed explicitly or resolved from
//! the process-wide default obtained with [`Context::default_ctx`].

use std::sync::{Arc, OnceLock};

use thiserror::Error;

use crate::{
    config::{Config, ConfigError, KEY_BACKEND, KEY_FILESYSTEM_ROOT},
    storage::{FilesystemBackend, MemoryBackend, StorageBackend},
};

/// A context creation error.
#[derive(Debug, Error)]
pub enum ContextError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug)]
struct ContextInner {
    config: Config,
    backend: Arc<dyn StorageBackend>,
}

/// An execution environment holding configuration and a connection to the storage
/// backend.
///
/// A `Context` is a cheap-clone handle; clones share the same configuration and
/// backend. Resources release when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

static DEFAULT_CONTEXT: OnceLock<Context> = OnceLock::new();

impl Context {
    /// Create a context from `config`.
    ///
    /// The backend is chosen from the `backend` configuration key: `"filesystem"`
    /// (rooted at `filesystem.root`) or `"memory"`.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the backend selection is unrecognized.
    pub fn create(config: Config) -> Result<Self, ContextError> {
        let backend: Arc<dyn StorageBackend> = match config.get(KEY_BACKEND) {
            Some("memory") => Arc::new(MemoryBackend::new()),
            Some("filesystem") => {
                let root = config.get(KEY_FILESYSTEM_ROOT).unwrap_or(".");
                Arc::new(FilesystemBackend::new(root))
            }
            other => {
                return Err(ConfigError::InvalidValue {
                    key: KEY_BACKEND.to_string(),
                    value: other.unwrap_or("").to_string(),
                }
                .into())
            }
        };
        Ok(Self::with_backend(config, backend))
    }

    /// Create a context from `config` with an explicit `backend`, bypassing the
    /// backend selection keys.
    #[must_use]
    pub fn with_backend(config: Config, backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            inner: Arc::new(ContextInner { config, backend }),
        }
    }

    /// The process-wide default context.
    ///
    /// Constructed exactly once on first use with a default [`Config`] (filesystem
    /// backend rooted at the current directory) and reused for all subsequent calls
    /// that omit an explicit context. Concurrent first use from multiple threads
    /// never observes two distinct defaults.
    #[must_use]
    pub fn default_ctx() -> Self {
        DEFAULT_CONTEXT
            .get_or_init(|| {
                Self::with_backend(Config::default(), Arc::new(FilesystemBackend::new(".")))
            })
            .clone()
    }

    /// The process-wide default context, constructed from `config` only if it does
    /// not exist yet.
    ///
    /// If the default was already constructed, `config` is ignored and the existing
    /// default is returned; the default is never silently rebuilt.
    ///
    /// # Errors
    /// Returns a [`ContextError`] if the default must be constructed and `config`
    /// is invalid.
    pub fn default_ctx_with(config: Config) -> Result<Self, ContextError> {
        if let Some(ctx) = DEFAULT_CONTEXT.get() {
            return Ok(ctx.clone());
        }
        let ctx = Self::create(config)?;
        // Another thread may have won the race; the OnceLock keeps the first.
        Ok(DEFAULT_CONTEXT.get_or_init(|| ctx).clone())
    }

    /// The configuration bound to this context.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// The storage backend bound to this context.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.inner.backend
    }

    /// Whether `self` and `other` are handles to the identical context.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
