//! Access to the external reasoner.
//!
//! The knowledge base only needs one thing from the reasoner: run a query
//! and hand back every solution. [`Reasoner`] is that contract.
//! [`PrologClient`] speaks the json_prolog service protocol over any
//! [`PrologService`] transport; [`ScriptedReasoner`] answers from canned
//! rules and is used for tests and dry runs.

mod json_prolog;
mod scripted;

pub use json_prolog::{PrologClient, PrologService, SolutionStatus};
pub use scripted::{ScriptedReasoner, ScriptedRule};

use crate::error::ReasonerError;
use crate::term::Solution;

/// A Prolog reasoner.
pub trait Reasoner: Send + Sync {
    /// Runs `query` and returns all of its solutions, in reasoner order.
    ///
    /// A query that is false yields an empty vector, not an error.
    fn all_solutions(&self, query: &str) -> Result<Vec<Solution>, ReasonerError>;

    /// Runs `query` and returns its first solution, if any.
    fn once(&self, query: &str) -> Result<Option<Solution>, ReasonerError> {
        Ok(self.all_solutions(query)?.into_iter().next())
    }
}

impl<R: Reasoner + ?Sized> Reasoner for std::sync::Arc<R> {
    fn all_solutions(&self, query: &str) -> Result<Vec<Solution>, ReasonerError> {
        (**self).all_solutions(query)
    }

    fn once(&self, query: &str) -> Result<Option<Solution>, ReasonerError> {
        (**self).once(query)
    }
}
