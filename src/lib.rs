//! # shelfkb - knowledge base interface for shelf perception
//!
//! `shelfkb` sits between a shelf-scanning robot and a Prolog reasoner
//! holding the store's world model. Perception results go in as queries,
//! reasoner bindings come back out as typed values and poses.
//!
//! ## Core Concepts
//!
//! - **Reasoner**: anything that answers Prolog queries with variable bindings
//! - **Term / Solution**: decoded bindings of one answer
//! - **Transform lookup**: frame-to-frame poses, as a TF buffer provides them
//! - **Layout**: the shelf systems to visit, their order and aisle side
//! - **Heuristics**: cleanup of noisy layer heights and separator positions
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use shelfkb::{KbConfig, KnowledgeBase, ScriptedReasoner, ScriptedRule, StaticTransforms};
//!
//! let reasoner = Arc::new(ScriptedReasoner::new());
//! reasoner
//!     .add_rule(ScriptedRule::exact(shelfkb::query::START_TF_LOGGING).succeed())
//!     .unwrap();
//!
//! let kb = KnowledgeBase::new(reasoner, StaticTransforms::new(), KbConfig::default());
//! kb.start_tf_logging().unwrap();
//! assert!(kb.layout().is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod error;
pub mod geometry;
pub mod heuristics;
pub mod kb;
pub mod query;
pub mod reasoner;
pub mod term;
pub mod transforms;

pub use config::{KbConfig, LayoutConfig, ShelfEntry, Side};
pub use error::{ConfigError, KbError, KbResult, ReasonerError};
pub use geometry::{Header, Point, Pose, PoseStamped, Quaternion, Transform, TransformStamped};
pub use heuristics::{DefaultHeuristics, HeuristicsConfig, LayoutHeuristics};
pub use kb::{KnowledgeBase, LabelRecord, ObjectPose, StateNotifier};
pub use reasoner::{
    PrologClient, PrologService, Reasoner, ScriptedReasoner, ScriptedRule, SolutionStatus,
};
pub use term::{Solution, Term};
pub use transforms::{StaticTransforms, TransformLookup};
