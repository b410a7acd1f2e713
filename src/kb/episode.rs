//! Belief-state files and logging episodes.

use std::path::Path;

use tracing::{error, info, warn};

use super::KnowledgeBase;
use crate::error::{ConfigError, KbResult};
use crate::heuristics::LayoutHeuristics;
use crate::query;
use crate::reasoner::Reasoner;
use crate::transforms::TransformLookup;

impl<R: Reasoner, T: TransformLookup, H: LayoutHeuristics> KnowledgeBase<R, T, H> {
    /// Id of the running episode, if one was started by this session.
    pub fn episode_id(&self) -> KbResult<Option<String>> {
        Ok(self.session()?.episode_id.clone())
    }

    /// Stops any running episode and starts a new one, optionally seeded
    /// from an exported belief state.
    ///
    /// Returns `false` when the reasoner refused to start the episode.
    pub fn start_episode(&self, import_from: Option<&str>) -> KbResult<bool> {
        if self.holds(query::CURRENT_EPISODE)? {
            self.once(query::STOP_CURRENT_EPISODE)?;
        }

        let q = match import_from {
            Some(path) => query::start_episode_from(path),
            None => query::START_EPISODE.to_string(),
        };
        let Some(solution) = self.once(&q)? else {
            warn!("reasoner did not start an episode");
            return Ok(false);
        };
        let episode = solution.atom(&q, "E")?;
        info!(episode = %episode, "episode started");
        self.session()?.episode_id = Some(episode);
        Ok(true)
    }

    /// Stops the episode started by [`start_episode`](Self::start_episode).
    pub fn stop_episode(&self) -> KbResult<bool> {
        let Some(episode) = self.episode_id()? else {
            warn!("no episode to stop");
            return Ok(false);
        };
        let stopped = self.holds(&query::stop_episode(&episode))?;
        if stopped {
            info!(episode = %episode, "episode stopped");
            self.session()?.episode_id = None;
        }
        Ok(stopped)
    }

    /// Starts logging transforms into the current episode.
    pub fn start_tf_logging(&self) -> KbResult<()> {
        self.once(query::START_TF_LOGGING)?;
        Ok(())
    }

    /// Stops logging transforms.
    pub fn stop_tf_logging(&self) -> KbResult<()> {
        self.once(query::STOP_TF_LOGGING)?;
        Ok(())
    }

    /// Exports the belief state to `path`, or to the configured export path.
    pub fn save_beliefstate(&self, path: Option<&Path>) -> KbResult<()> {
        let path = path.unwrap_or(&self.config.beliefstate_export_path);
        self.once(&query::mem_export(&path.to_string_lossy()))?;
        info!(path = %path.display(), "belief state exported");
        Ok(())
    }

    /// Imports an OWL file into the belief state.
    pub fn load_owl(&self, path: &Path) -> KbResult<bool> {
        self.holds(&query::mem_import(&path.to_string_lossy()))
    }

    fn initial_beliefstate(&self, explicit: Option<&str>) -> KbResult<String> {
        if let Some(dir) = explicit {
            return Ok(dir.to_string());
        }
        if let Some(dir) = self.session()?.initial_beliefstate.clone() {
            return Ok(dir);
        }
        self.config
            .initial_beliefstate
            .clone()
            .ok_or_else(|| ConfigError::MissingKey { key: "initial_beliefstate" }.into())
    }

    /// Forgets that the initial belief state was loaded, so it can be
    /// loaded again. Notifies the state hook.
    pub fn clear_beliefstate(&self, initial_beliefstate: Option<&str>) -> KbResult<bool> {
        let dir = self.initial_beliefstate(initial_beliefstate)?;
        let cleared = self.holds(&query::retract_owl_file(&dir))?;
        self.clear_caches()?;
        self.notify_reset()?;
        Ok(cleared)
    }

    /// Same as [`load_initial_beliefstate`](Self::load_initial_beliefstate).
    pub fn reset_beliefstate(&self) -> KbResult<bool> {
        self.load_initial_beliefstate()
    }

    /// Clears the belief state and starts a fresh episode from the
    /// configured initial belief state.
    pub fn load_initial_beliefstate(&self) -> KbResult<bool> {
        let dir = self
            .config
            .initial_beliefstate
            .clone()
            .ok_or(ConfigError::MissingKey { key: "initial_beliefstate" })?;
        self.session()?.initial_beliefstate = Some(dir.clone());

        self.clear_beliefstate(Some(&dir))?;
        if self.start_episode(Some(&dir))? {
            info!(beliefstate = %dir, "loaded initial belief state");
            self.notify_reset()?;
            Ok(true)
        } else {
            error!(beliefstate = %dir, "error loading initial belief state");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::config::KbConfig;
    use crate::kb::testing::*;
    use crate::kb::{KnowledgeBase, StateNotifier};
    use crate::query;
    use crate::reasoner::ScriptedRule;
    use crate::term::Solution;
    use crate::KbResult;

    struct CountingNotifier(Arc<AtomicUsize>);

    impl StateNotifier for CountingNotifier {
        fn belief_state_reset(&self) -> KbResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_start_episode_stops_running_one() {
        let (kb, reasoner, _) = kb();
        rule(&reasoner, ScriptedRule::exact(query::CURRENT_EPISODE).succeed());
        rule(
            &reasoner,
            ScriptedRule::exact(query::START_EPISODE)
                .solution(Solution::new().with("E", atom("episode_7"))),
        );
        assert!(kb.start_episode(None).unwrap());
        assert_eq!(kb.episode_id().unwrap().as_deref(), Some("episode_7"));
        assert_eq!(
            reasoner.queries(),
            vec![query::CURRENT_EPISODE, query::STOP_CURRENT_EPISODE, query::START_EPISODE]
        );
    }

    #[test]
    fn test_start_episode_refused() {
        let (kb, _, _) = kb();
        assert!(!kb.start_episode(Some("/tmp/old")).unwrap());
        assert_eq!(kb.episode_id().unwrap(), None);
    }

    #[test]
    fn test_stop_episode() {
        let (kb, reasoner, _) = kb();
        assert!(!kb.stop_episode().unwrap());

        rule(
            &reasoner,
            ScriptedRule::exact(query::START_EPISODE)
                .solution(Solution::new().with("E", atom("ep"))),
        );
        rule(&reasoner, ScriptedRule::exact(query::stop_episode("ep")).succeed());
        kb.start_episode(None).unwrap();
        assert!(kb.stop_episode().unwrap());
        assert_eq!(kb.episode_id().unwrap(), None);
    }

    #[test]
    fn test_save_beliefstate_default_path() {
        let (kb, reasoner, _) = kb();
        kb.save_beliefstate(None).unwrap();
        kb.save_beliefstate(Some(Path::new("/tmp/out.owl"))).unwrap();
        assert_eq!(
            reasoner.queries_containing("mem_export"),
            vec!["mem_export('data/beliefstate.owl')", "mem_export('/tmp/out.owl')"]
        );
    }

    #[test]
    fn test_clear_without_initial_beliefstate_is_config_error() {
        let (kb, _, _) = kb();
        assert!(kb.clear_beliefstate(None).unwrap_err().is_config());
        assert!(kb.load_initial_beliefstate().unwrap_err().is_config());
    }

    #[test]
    fn test_load_initial_beliefstate() {
        let (_, reasoner, tf) = kb();
        let resets = Arc::new(AtomicUsize::new(0));
        let config = KbConfig {
            initial_beliefstate: Some("/data/initial".to_string()),
            ..KbConfig::default().without_settling()
        };
        let kb = KnowledgeBase::new(Arc::clone(&reasoner), tf, config)
            .with_notifier(Box::new(CountingNotifier(Arc::clone(&resets))));
        rule(&reasoner, ScriptedRule::exact(query::retract_owl_file("/data/initial")).succeed());
        rule(
            &reasoner,
            ScriptedRule::exact(query::start_episode_from("/data/initial"))
                .solution(Solution::new().with("E", atom("ep_1"))),
        );

        assert!(kb.reset_beliefstate().unwrap());
        assert_eq!(kb.episode_id().unwrap().as_deref(), Some("ep_1"));
        // once for the clear, once for the fresh episode
        assert_eq!(resets.load(Ordering::SeqCst), 2);

        // the session remembers the directory
        assert!(kb.clear_beliefstate(None).unwrap());
    }

    #[test]
    fn test_tf_logging_and_owl_import() {
        let (kb, reasoner, _) = kb();
        rule(&reasoner, ScriptedRule::exact(query::mem_import("/tmp/a.owl")).succeed());
        kb.start_tf_logging().unwrap();
        kb.stop_tf_logging().unwrap();
        assert!(kb.load_owl(Path::new("/tmp/a.owl")).unwrap());
        assert!(!kb.load_owl(Path::new("/tmp/b.owl")).unwrap());
        assert_eq!(
            &reasoner.queries()[..2],
            &[query::START_TF_LOGGING.to_string(), query::STOP_TF_LOGGING.to_string()]
        );
    }
}
