//! Client side of the json_prolog service protocol.
//!
//! A query is a three step conversation, each step one service call:
//! `query` registers the text under a client chosen id, `next_solution`
//! is called until the reasoner reports no further solutions, and `finish`
//! releases the id. Solutions travel as JSON objects.

use tracing::{debug, warn};
use uuid::Uuid;

use super::Reasoner;
use crate::error::ReasonerError;
use crate::term::Solution;

/// Status code returned by `next_solution`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolutionStatus {
    /// No further solutions.
    NoSolution,
    /// The service does not know the query id.
    WrongId,
    /// The query raised an error; the payload carries the message.
    QueryFailed,
    /// The payload carries the next solution.
    Ok,
}

impl SolutionStatus {
    /// Maps the numeric status of the service response.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::NoSolution),
            1 => Some(Self::WrongId),
            2 => Some(Self::QueryFailed),
            3 => Some(Self::Ok),
            _ => None,
        }
    }

    /// Wire code of the status.
    pub const fn code(self) -> u8 {
        match self {
            Self::NoSolution => 0,
            Self::WrongId => 1,
            Self::QueryFailed => 2,
            Self::Ok => 3,
        }
    }
}

/// The three reasoner services, as exposed by the middleware transport.
pub trait PrologService: Send + Sync {
    /// Registers `query` under `id`. Returns `Err(QueryFailed)` when the
    /// reasoner refuses it (syntax error, unknown predicate, ...).
    fn query(&self, id: &str, query: &str, incremental: bool) -> Result<(), ReasonerError>;

    /// Fetches the next solution of query `id` as raw JSON.
    fn next_solution(&self, id: &str) -> Result<(SolutionStatus, String), ReasonerError>;

    /// Releases query `id`.
    fn finish(&self, id: &str) -> Result<(), ReasonerError>;
}

/// [`Reasoner`] implementation on top of a [`PrologService`].
#[derive(Debug)]
pub struct PrologClient<S> {
    service: S,
    max_solutions: usize,
}

impl<S: PrologService> PrologClient<S> {
    /// Default cap on solutions drained from a single query.
    pub const DEFAULT_MAX_SOLUTIONS: usize = 100_000;

    /// Client over a service, with the default solution cap.
    pub const fn new(service: S) -> Self {
        Self {
            service,
            max_solutions: Self::DEFAULT_MAX_SOLUTIONS,
        }
    }

    /// Caps the number of solutions read from one query.
    #[must_use]
    pub fn with_max_solutions(mut self, max: usize) -> Self {
        self.max_solutions = max.max(1);
        self
    }

    /// The underlying service.
    pub const fn service(&self) -> &S {
        &self.service
    }

    fn drain(&self, id: &str) -> Result<Vec<Solution>, ReasonerError> {
        let mut solutions = Vec::new();
        while solutions.len() < self.max_solutions {
            let (status, payload) = self.service.next_solution(id)?;
            match status {
                SolutionStatus::NoSolution => break,
                SolutionStatus::WrongId => {
                    return Err(ReasonerError::WrongQueryId { id: id.to_string() });
                }
                SolutionStatus::QueryFailed => {
                    return Err(ReasonerError::QueryFailed { message: payload });
                }
                SolutionStatus::Ok => solutions.push(Solution::from_json_str(&payload)?),
            }
        }
        if solutions.len() >= self.max_solutions {
            warn!(
                query_id = %id,
                max_solutions = self.max_solutions,
                "solution cap reached, remaining solutions dropped"
            );
        }
        Ok(solutions)
    }
}

impl<S: PrologService> Reasoner for PrologClient<S> {
    fn all_solutions(&self, query: &str) -> Result<Vec<Solution>, ReasonerError> {
        let id = Uuid::new_v4().simple().to_string();
        self.service.query(&id, query, true)?;

        let result = self.drain(&id);
        if let Err(e) = self.service.finish(&id) {
            warn!(query_id = %id, error = %e, "failed to finish query");
        }
        if let Ok(solutions) = &result {
            debug!(query_id = %id, solutions = solutions.len(), "query drained");
        }
        result
    }
}
