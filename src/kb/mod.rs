//! The knowledge base wrapper.
//!
//! [`KnowledgeBase`] turns perception results into reasoner queries and
//! reasoner bindings back into geometry. It keeps only session state: the
//! current episode and a few lookup caches. Everything else is asked from
//! the reasoner every time.
//!
//! Operations are grouped by what they touch:
//! shelf systems and layers ([`shelf`]), perception updates
//! ([`perception`]), facings ([`facing`]), labels ([`label`]) and the
//! belief state / episode lifecycle ([`episode`]).

pub mod episode;
pub mod facing;
pub mod label;
pub mod perception;
pub mod shelf;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{KbConfig, LayoutConfig};
use crate::error::{ConfigError, KbError, KbResult};
use crate::geometry::PoseStamped;
use crate::heuristics::{DefaultHeuristics, LayoutHeuristics};
use crate::query;
use crate::reasoner::Reasoner;
use crate::term::Solution;
use crate::transforms::TransformLookup;

pub use label::LabelRecord;

/// Log target for every query sent to the reasoner.
pub const QUERY_LOG_TARGET: &str = "shelfkb::kb";

/// Something the reasoner knows, with its pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectPose {
    /// Reasoner id of the object.
    pub id: String,
    /// Pose of the object.
    pub pose: PoseStamped,
}

/// Hook fired when the belief state was replaced wholesale, so that
/// downstream publishers can drop what they cached.
pub trait StateNotifier: Send + Sync {
    /// Called after the belief state was cleared or replaced.
    fn belief_state_reset(&self) -> KbResult<()>;
}

#[derive(Debug, Default)]
struct Session {
    episode_id: Option<String>,
    initial_beliefstate: Option<String>,
    perceived_frames: HashMap<String, String>,
    system_of_layer: HashMap<String, String>,
    layer_of_facing: HashMap<String, String>,
}

fn lock_err(context: &'static str) -> KbError {
    KbError::internal(format!("poisoned lock: {context}"))
}

/// Client of the reasoner's shelf world model.
pub struct KnowledgeBase<R, T, H = DefaultHeuristics> {
    reasoner: R,
    tf: T,
    heuristics: H,
    config: KbConfig,
    layout: LayoutConfig,
    session: Mutex<Session>,
    notifier: Option<Box<dyn StateNotifier>>,
}

impl<R: Reasoner, T: TransformLookup> KnowledgeBase<R, T> {
    /// Creates a knowledge base with the default layout heuristics.
    ///
    /// The layout file named in `config` is loaded here; a missing or
    /// broken file leaves the layout empty.
    pub fn new(reasoner: R, tf: T, config: KbConfig) -> Self {
        let heuristics = DefaultHeuristics::new(config.heuristics.clone());
        let layout = config.load_layout();
        Self {
            reasoner,
            tf,
            heuristics,
            config,
            layout,
            session: Mutex::new(Session::default()),
            notifier: None,
        }
    }
}

impl<R: Reasoner, T: TransformLookup, H: LayoutHeuristics> KnowledgeBase<R, T, H> {
    /// Replaces the layout heuristics.
    pub fn with_heuristics<H2: LayoutHeuristics>(self, heuristics: H2) -> KnowledgeBase<R, T, H2> {
        KnowledgeBase {
            reasoner: self.reasoner,
            tf: self.tf,
            heuristics,
            config: self.config,
            layout: self.layout,
            session: self.session,
            notifier: self.notifier,
        }
    }

    /// Replaces the layout.
    #[must_use]
    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    /// Installs the belief-state reset hook.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Box<dyn StateNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// The reasoner queries go to.
    pub const fn reasoner(&self) -> &R {
        &self.reasoner
    }

    /// The transform lookup in use.
    pub const fn transforms(&self) -> &T {
        &self.tf
    }

    /// Settings in use.
    pub const fn config(&self) -> &KbConfig {
        &self.config
    }

    /// The shelf layout in use.
    pub const fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    // ------------------------------------------------------------------------
    // Query plumbing
    // ------------------------------------------------------------------------

    /// Runs a query and returns all solutions.
    pub fn all_solutions(&self, q: &str) -> KbResult<Vec<Solution>> {
        debug!(target: QUERY_LOG_TARGET, query = q, "ask");
        let solutions = self.reasoner.all_solutions(q)?;
        debug!(target: QUERY_LOG_TARGET, solutions = ?solutions, "result");
        Ok(solutions)
    }

    /// Runs a query and returns its first solution, `None` when false.
    pub fn once(&self, q: &str) -> KbResult<Option<Solution>> {
        Ok(self.all_solutions(q)?.into_iter().next())
    }

    /// Runs a query that must have a solution.
    pub(crate) fn once_required(&self, q: &str) -> KbResult<Solution> {
        self.once(q)?.ok_or_else(|| KbError::query_failed(q))
    }

    /// Runs a query and reports whether it is true.
    pub(crate) fn holds(&self, q: &str) -> KbResult<bool> {
        Ok(self.once(q)?.is_some())
    }

    /// Runs a `findall` query and returns the atoms collected in `variable`.
    pub(crate) fn find_atoms(&self, q: &str, variable: &str) -> KbResult<Vec<String>> {
        let Some(solution) = self.once(q)? else {
            return Ok(Vec::new());
        };
        solution
            .list(q, variable)?
            .iter()
            .map(|t| {
                t.as_atom()
                    .ok_or_else(|| crate::term::unexpected(variable, "atom", t))
            })
            .collect()
    }

    pub(crate) fn settle(&self, pause: Duration) {
        if !pause.is_zero() {
            std::thread::sleep(pause);
        }
    }

    fn session(&self) -> KbResult<std::sync::MutexGuard<'_, Session>> {
        self.session.lock().map_err(|_| lock_err("session"))
    }

    fn cached(
        &self,
        key: &str,
        pick: fn(&mut Session) -> &mut HashMap<String, String>,
        fetch: impl FnOnce() -> KbResult<String>,
    ) -> KbResult<String> {
        if let Some(hit) = pick(&mut *self.session()?).get(key) {
            return Ok(hit.clone());
        }
        // not held across the query; a racing fetch stores the same value
        let value = fetch()?;
        pick(&mut *self.session()?).insert(key.to_string(), value.clone());
        Ok(value)
    }

    /// Drops every cached lookup.
    pub fn clear_caches(&self) -> KbResult<()> {
        let mut session = self.session()?;
        session.perceived_frames.clear();
        session.system_of_layer.clear();
        session.layer_of_facing.clear();
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Objects and frames
    // ------------------------------------------------------------------------

    /// Ids of every individual of `object_type`.
    pub fn get_all_individuals_of(&self, object_type: &str) -> KbResult<Vec<String>> {
        self.find_atoms(&query::individuals_of(object_type), "Rs")
    }

    /// Frame of an object's perception feature, the frame perception
    /// results for that object are expressed in. Cached per session.
    pub fn get_perceived_frame_id(&self, object_id: &str) -> KbResult<String> {
        self.cached(object_id, |s| &mut s.perceived_frames, || {
            let q = query::perceived_frame(object_id);
            self.once_required(&q)?.atom(&q, "FeatureFrame")
        })
    }

    /// Frame at the center of an object's mesh.
    pub fn get_object_frame_id(&self, object_id: &str) -> KbResult<String> {
        let q = query::object_frame(object_id);
        self.once_required(&q)?.atom(&q, "R")
    }

    /// Moves an object in the belief state.
    pub fn belief_at_update(&self, object_id: &str, pose: &PoseStamped) -> KbResult<bool> {
        self.holds(&query::belief_at_update(object_id, pose))
    }

    /// Side of the aisle from the layout file.
    pub fn is_left(&self, shelf_system_id: &str) -> KbResult<bool> {
        self.layout.is_left(shelf_system_id).ok_or_else(|| not_in_layout(shelf_system_id))
    }

    /// Whether a listed shelf system stands on the right of the aisle.
    pub fn is_right(&self, shelf_system_id: &str) -> KbResult<bool> {
        self.layout.is_right(shelf_system_id).ok_or_else(|| not_in_layout(shelf_system_id))
    }

    pub(crate) fn notify_reset(&self) -> KbResult<()> {
        match &self.notifier {
            Some(n) => n.belief_state_reset(),
            None => Ok(()),
        }
    }
}

fn not_in_layout(shelf_system_id: &str) -> KbError {
    ConfigError::InvalidEntry {
        id: shelf_system_id.to_string(),
        reason: "shelf system is not in the layout file".to_string(),
    }
    .into()
}
