//! Expert wrapper and expert table
//!
//! An [`Expert`] is an opaque `query -> response` callable with lifecycle
//! hooks for deferred loading. The model behind it is out of scope here:
//! it may be an in-process function, a remote call adapter, or anything a
//! [`ModelLoader`] produces from a task/model-name pair.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::info;

use crate::domain_types::ExpertId;
use crate::error::ExpertError;

/// The callable bound to an expert
pub type ExpertFn = Box<dyn Fn(&str) -> Result<String, ExpertError> + Send + Sync>;

/// Mapping from expert id to expert, fixed for the dispatcher's lifetime
pub type ExpertTable = HashMap<ExpertId, Arc<Expert>>;

/// Seam for deferred model loading
///
/// Implementations resolve a task/model-name pair into a callable. The
/// crate ships no real loader; inference backends live behind this trait.
pub trait ModelLoader: Send + Sync {
    /// Resolves `task` + `model_name` into a ready callable
    fn load(&self, task: &str, model_name: &str) -> Result<ExpertFn, ExpertError>;
}

/// A named unit that can answer a query
///
/// Refuses to run until a callable is bound, either directly via
/// [`Expert::bind`] or through a [`ModelLoader`]. Rebinding replaces the
/// callable wholesale.
pub struct Expert {
    id: ExpertId,
    model: RwLock<Option<ExpertFn>>,
}

impl std::fmt::Debug for Expert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Expert")
            .field("id", &self.id)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl Expert {
    /// Creates an unloaded expert
    #[must_use]
    pub fn new(id: ExpertId) -> Self {
        Self {
            id,
            model: RwLock::new(None),
        }
    }

    /// Creates an expert with a callable already bound
    #[must_use]
    pub fn with_callable(
        id: ExpertId,
        callable: impl Fn(&str) -> Result<String, ExpertError> + Send + Sync + 'static,
    ) -> Self {
        let expert = Self::new(id);
        expert.bind(Box::new(callable));
        expert
    }

    /// Creates an expert that echoes its input, for demos and smoke tests
    #[must_use]
    pub fn echo(id: ExpertId) -> Self {
        let tag = id.to_string();
        Self::with_callable(id, move |query| Ok(format!("[ECHO {tag}] {query}")))
    }

    /// The expert's id
    #[must_use]
    pub fn id(&self) -> &ExpertId {
        &self.id
    }

    /// Binds (or replaces) the callable
    pub fn bind(&self, callable: ExpertFn) {
        let mut slot = self.model.write().expect("expert model lock poisoned");
        *slot = Some(callable);
    }

    /// Resolves and binds a callable through the loader
    pub fn load(
        &self,
        task: &str,
        model_name: &str,
        loader: &dyn ModelLoader,
    ) -> Result<(), ExpertError> {
        let callable = loader.load(task, model_name)?;
        self.bind(callable);
        info!(expert_id = %self.id, task, model_name, "expert model loaded");
        Ok(())
    }

    /// True iff a callable is bound
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.model
            .read()
            .expect("expert model lock poisoned")
            .is_some()
    }

    /// Runs the bound callable against the query
    ///
    /// # Errors
    /// [`ExpertError::NotReady`] when no callable is bound; otherwise
    /// whatever the callable itself raises.
    pub fn run(&self, query: &str) -> Result<String, ExpertError> {
        let slot = self.model.read().expect("expert model lock poisoned");
        match slot.as_ref() {
            Some(callable) => callable(query),
            None => Err(ExpertError::NotReady),
        }
    }
}

/// Builds an expert table from experts, keyed by their ids
#[must_use]
pub fn expert_table(experts: impl IntoIterator<Item = Expert>) -> ExpertTable {
    experts
        .into_iter()
        .map(|expert| (expert.id().clone(), Arc::new(expert)))
        .collect()
}
