//! Dispatcher façade
//!
//! Binds a router to an expert table: `exec(query)` asks the router for
//! an expert id, runs that expert, and returns both. The router can be
//! replaced at any time between calls; an in-flight `exec` observes
//! either the old or the new router, never a hybrid.

use std::sync::Mutex;

use tracing::error;

use crate::domain_types::ExpertId;
use crate::error::DispatchError;
use crate::expert::ExpertTable;
use crate::routing::Router;

/// Result of one dispatched query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    /// The expert the router selected
    pub expert: ExpertId,
    /// The expert's response payload
    pub response: String,
}

/// Router + expert table façade with a hot-swappable router
pub struct Dispatcher {
    table: ExpertTable,
    router: Mutex<Box<dyn Router>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("experts", &self.table.len())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates the façade over a table and an initial router
    #[must_use]
    pub fn new(table: ExpertTable, router: Box<dyn Router>) -> Self {
        Self {
            table,
            router: Mutex::new(router),
        }
    }

    /// Atomically replaces the routing strategy
    pub fn set_router(&self, router: Box<dyn Router>) {
        let mut slot = self.router.lock().expect("dispatcher router lock poisoned");
        *slot = router;
    }

    /// Routes and executes one query
    ///
    /// # Errors
    /// [`DispatchError::UnknownExpert`] if the router violates its
    /// contract and names an unregistered expert;
    /// [`DispatchError::ExpertFailed`] when the selected expert fails.
    pub fn exec(&self, query: &str) -> Result<Dispatch, DispatchError> {
        let expert_id = {
            let mut router = self.router.lock().expect("dispatcher router lock poisoned");
            router.route(query)
        };

        let Some(expert) = self.table.get(&expert_id) else {
            error!(expert_id = %expert_id, "router returned an expert missing from the table");
            return Err(DispatchError::UnknownExpert { expert_id });
        };

        let response = expert.run(query).map_err(|source| {
            DispatchError::ExpertFailed {
                expert_id: expert_id.clone(),
                source,
            }
        })?;
        Ok(Dispatch {
            expert: expert_id,
            response,
        })
    }

    /// The registered expert ids, in table order
    #[must_use]
    pub fn expert_ids(&self) -> Vec<ExpertId> {
        self.table.keys().cloned().collect()
    }
}
