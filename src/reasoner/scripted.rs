//! In-memory reasoner answering from canned rules.
//!
//! Intended for tests, dry runs and as a reference implementation of the
//! [`Reasoner`] contract. Queries that match no rule are false.

use std::collections::VecDeque;
use std::sync::Mutex;

use regex::Regex;
use tracing::trace;

use super::Reasoner;
use crate::error::ReasonerError;
use crate::term::Solution;

fn lock_err(context: &'static str) -> ReasonerError {
    ReasonerError::Unavailable {
        message: format!("poisoned lock: {context}"),
    }
}

#[derive(Debug)]
enum Matcher {
    Exact(String),
    Pattern(Regex),
}

impl Matcher {
    fn matches(&self, query: &str) -> bool {
        match self {
            Self::Exact(text) => text == query,
            Self::Pattern(re) => re.is_match(query),
        }
    }
}

#[derive(Debug, Clone)]
enum Answer {
    Solutions(Vec<Solution>),
    Error(String),
}

/// One canned answer.
///
/// A rule may hold several answers; each hit consumes one and the last
/// answer repeats forever.
#[derive(Debug)]
pub struct ScriptedRule {
    matcher: Matcher,
    answers: VecDeque<Answer>,
}

impl ScriptedRule {
    /// Rule for exactly this query text.
    pub fn exact(query: impl Into<String>) -> Self {
        Self {
            matcher: Matcher::Exact(query.into()),
            answers: VecDeque::new(),
        }
    }

    /// Rule for every query matching `pattern`.
    pub fn matching(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            matcher: Matcher::Pattern(Regex::new(pattern)?),
            answers: VecDeque::new(),
        })
    }

    /// Answers with these solutions.
    #[must_use]
    pub fn solutions(mut self, solutions: Vec<Solution>) -> Self {
        self.answers.push_back(Answer::Solutions(solutions));
        self
    }

    /// Answers with one solution.
    #[must_use]
    pub fn solution(self, solution: Solution) -> Self {
        self.solutions(vec![solution])
    }

    /// Answers `true` (a single empty solution).
    #[must_use]
    pub fn succeed(self) -> Self {
        self.solution(Solution::new())
    }

    /// Answers `false`.
    #[must_use]
    pub fn fail(self) -> Self {
        self.solutions(Vec::new())
    }

    /// Answers with a reasoner error.
    #[must_use]
    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.answers.push_back(Answer::Error(message.into()));
        self
    }

    fn next_answer(&mut self) -> Answer {
        if self.answers.len() > 1 {
            self.answers.pop_front().unwrap_or(Answer::Solutions(Vec::new()))
        } else {
            self.answers
                .front()
                .cloned()
                .unwrap_or(Answer::Solutions(Vec::new()))
        }
    }
}

/// Reasoner that answers from [`ScriptedRule`]s and records every query.
#[derive(Debug, Default)]
pub struct ScriptedReasoner {
    rules: Mutex<Vec<ScriptedRule>>,
    log: Mutex<Vec<String>>,
}

impl ScriptedReasoner {
    /// Reasoner without rules; every query answers false.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule. Rules are tried in insertion order.
    pub fn add_rule(&self, rule: ScriptedRule) -> Result<(), ReasonerError> {
        self.rules.lock().map_err(|_| lock_err("rules"))?.push(rule);
        Ok(())
    }

    /// Builder form of [`add_rule`](Self::add_rule).
    pub fn with_rule(self, rule: ScriptedRule) -> Result<Self, ReasonerError> {
        self.add_rule(rule)?;
        Ok(self)
    }

    /// Every query received so far, oldest first.
    pub fn queries(&self) -> Vec<String> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Received queries containing `needle`.
    pub fn queries_containing(&self, needle: &str) -> Vec<String> {
        self.queries()
            .into_iter()
            .filter(|q| q.contains(needle))
            .collect()
    }
}

impl Reasoner for ScriptedReasoner {
    fn all_solutions(&self, query: &str) -> Result<Vec<Solution>, ReasonerError> {
        self.log
            .lock()
            .map_err(|_| lock_err("query log"))?
            .push(query.to_string());

        let mut rules = self.rules.lock().map_err(|_| lock_err("rules"))?;
        let Some(rule) = rules.iter_mut().find(|r| r.matcher.matches(query)) else {
            trace!(query, "no scripted rule, answering false");
            return Ok(Vec::new());
        };
        match rule.next_answer() {
            Answer::Solutions(solutions) => Ok(solutions),
            Answer::Error(message) => Err(ReasonerError::QueryFailed { message }),
        }
    }
}
