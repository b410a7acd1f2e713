//! Configuration files.
//!
//! Two files feed the knowledge base:
//!
//! - the *layout* file: one entry per shelf system, in visiting order, with
//!   the side of the aisle the shelf is on and the navigation via-points
//!   leading to it;
//! - the *wrapper* settings: file locations, timing and thresholds.
//!
//! Both are YAML. JSON files load as well.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;
use crate::geometry::PoseStamped;
use crate::heuristics::HeuristicsConfig;

/// Side of the aisle a shelf system stands on, seen from the robot's path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Left of the robot's path.
    Left,
    /// Right of the robot's path.
    Right,
}

/// Layout entry of one shelf system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ShelfEntry {
    /// Aisle side the shelf system stands on.
    pub side: Side,
    /// Id of the shelf system the robot comes from.
    #[serde(default)]
    pub starting_point: Option<String>,
    /// Poses the robot passes on its way to the shelf system.
    #[serde(default)]
    pub via_points: Vec<PoseStamped>,
    /// Layers of this shelf are one depth class deeper than the reasoner
    /// reports.
    #[serde(default)]
    pub hack: bool,
}

/// Shelf systems in visiting order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutConfig {
    entries: Vec<(String, ShelfEntry)>,
}

impl LayoutConfig {
    /// Parses a layout document, keeping the document order.
    pub fn from_yaml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let parse_err = |message: String| ConfigError::Parse {
            path: origin.to_path_buf(),
            message,
        };
        let doc: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|e| parse_err(e.to_string()))?;
        let mapping = match doc {
            serde_yaml::Value::Mapping(m) => m,
            serde_yaml::Value::Null => serde_yaml::Mapping::new(),
            _ => return Err(parse_err("layout must be a mapping of shelf ids".to_string())),
        };

        let mut entries = Vec::with_capacity(mapping.len());
        for (key, value) in mapping {
            let id = match key {
                serde_yaml::Value::String(s) => s,
                other => {
                    return Err(parse_err(format!("shelf id must be a string, got {other:?}")));
                }
            };
            let entry: ShelfEntry =
                serde_yaml::from_value(value).map_err(|e| ConfigError::InvalidEntry {
                    id: id.clone(),
                    reason: e.to_string(),
                })?;
            entries.push((id, entry));
        }

        let layout = Self { entries };
        layout.check_chain();
        Ok(layout)
    }

    /// Loads a layout file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text, path)
    }

    /// Loads a layout file, falling back to an empty layout on any error.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(layout) => layout,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load layout file");
                Self::default()
            }
        }
    }

    /// Warns where an entry does not start at the previous shelf system.
    fn check_chain(&self) {
        for pair in self.entries.windows(2) {
            let (prev_id, _) = &pair[0];
            let (id, entry) = &pair[1];
            if entry.starting_point.as_deref() != Some(prev_id.as_str()) {
                warn!(
                    shelf_system = %id,
                    expected = %prev_id,
                    "starting point doesn't match the previous entry"
                );
            }
        }
    }

    /// Whether the layout lists no shelf system.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of shelf systems in the layout.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Shelf system ids in visiting order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    /// Entries in visiting order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ShelfEntry)> {
        self.entries.iter().map(|(id, e)| (id.as_str(), e))
    }

    /// Entry of a shelf system, if listed.
    pub fn entry(&self, shelf_system_id: &str) -> Option<&ShelfEntry> {
        self.entries
            .iter()
            .find(|(id, _)| id == shelf_system_id)
            .map(|(_, e)| e)
    }

    /// Whether a shelf system is listed.
    pub fn contains(&self, shelf_system_id: &str) -> bool {
        self.entry(shelf_system_id).is_some()
    }

    /// `None` for unlisted shelf systems.
    pub fn is_left(&self, shelf_system_id: &str) -> Option<bool> {
        self.entry(shelf_system_id).map(|e| e.side == Side::Left)
    }

    /// `None` for unlisted shelf systems.
    pub fn is_right(&self, shelf_system_id: &str) -> Option<bool> {
        self.entry(shelf_system_id).map(|e| e.side == Side::Right)
    }

    /// Whether layers of a listed shelf system are one depth class deeper.
    pub fn has_depth_hack(&self, shelf_system_id: &str) -> bool {
        self.entry(shelf_system_id).is_some_and(|e| e.hack)
    }

    /// Appends an entry. Replaces an existing entry with the same id.
    pub fn push(&mut self, id: impl Into<String>, entry: ShelfEntry) {
        let id = id.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == id) {
            slot.1 = entry;
        } else {
            self.entries.push((id, entry));
        }
    }
}

/// Settings of the knowledge-base wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KbConfig {
    /// Layout file; no layout when unset.
    pub layout_path: Option<PathBuf>,
    /// Directory holding the initial `beliefstate.owl`.
    pub initial_beliefstate: Option<String>,
    /// Where `save_beliefstate` writes when no path is given.
    pub beliefstate_export_path: PathBuf,
    /// Perceived layers above this height (meters, in the shelf frame) are
    /// ignored.
    pub max_shelf_height: f64,
    /// Pause after asserting shelf markers, for the reasoner to settle.
    pub marker_settle_ms: u64,
    /// Pause after a bulk floor insert, before facings are marked dirty.
    pub facing_settle_ms: u64,
    /// Depth, width and height given to articles created for unknown DANs.
    pub article_dimensions: [f64; 3],
    /// Thresholds of the default layout heuristics.
    pub heuristics: HeuristicsConfig,
}

impl Default for KbConfig {
    fn default() -> Self {
        Self {
            layout_path: None,
            initial_beliefstate: None,
            beliefstate_export_path: PathBuf::from("data/beliefstate.owl"),
            max_shelf_height: 1.1,
            marker_settle_ms: 3000,
            facing_settle_ms: 5000,
            article_dimensions: [0.4, 0.015, 0.1],
            heuristics: HeuristicsConfig::default(),
        }
    }
}

impl KbConfig {
    /// Loads settings from a YAML or JSON file. Missing keys take defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Settings with both settle pauses disabled.
    #[must_use]
    pub fn without_settling(mut self) -> Self {
        self.marker_settle_ms = 0;
        self.facing_settle_ms = 0;
        self
    }

    /// Pause after asserting shelf markers.
    pub const fn marker_settle(&self) -> Duration {
        Duration::from_millis(self.marker_settle_ms)
    }

    /// Pause before marking facings dirty.
    pub const fn facing_settle(&self) -> Duration {
        Duration::from_millis(self.facing_settle_ms)
    }

    /// Loads the layout file named by `layout_path`, empty when unset or
    /// unreadable.
    pub fn load_layout(&self) -> LayoutConfig {
        match &self.layout_path {
            Some(path) => LayoutConfig::load_or_empty(path),
            None => LayoutConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const LAYOUT: &str = r#"
shelf_system_3:
  side: left
  starting-point: start
  via-points: []
shelf_system_1:
  side: right
  starting-point: shelf_system_3
  hack: true
  via-points:
    - header: {frame_id: map}
      pose:
        position: {x: 1.0, y: 2.0, z: 0.0}
        orientation: {x: 0.0, y: 0.0, z: 0.0, w: 1.0}
"#;

    #[test]
    fn test_layout_keeps_document_order() {
        let layout = LayoutConfig::from_yaml_str(LAYOUT, Path::new("layout.yaml")).unwrap();
        assert_eq!(layout.ids().collect::<Vec<_>>(), vec!["shelf_system_3", "shelf_system_1"]);
        assert_eq!(layout.is_left("shelf_system_3"), Some(true));
        assert_eq!(layout.is_right("shelf_system_1"), Some(true));
        assert_eq!(layout.is_left("unknown"), None);
        assert!(layout.has_depth_hack("shelf_system_1"));
        assert!(!layout.has_depth_hack("shelf_system_3"));
        let vias = &layout.entry("shelf_system_1").unwrap().via_points;
        assert_eq!(vias.len(), 1);
        assert_eq!(vias[0].frame_id(), "map");
    }

    #[test]
    fn test_layout_from_json() {
        let json = r#"{"s1": {"side": "left", "starting-point": "x", "via-points": []}}"#;
        let layout = LayoutConfig::from_yaml_str(json, Path::new("layout.json")).unwrap();
        assert_eq!(layout.len(), 1);
    }

    #[test]
    fn test_invalid_side_is_rejected() {
        let err = LayoutConfig::from_yaml_str("s1: {side: up}\n", Path::new("l.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEntry { ref id, .. } if id == "s1"));
    }

    #[test]
    fn test_non_mapping_is_rejected() {
        let err = LayoutConfig::from_yaml_str("- a\n- b\n", Path::new("l.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_layout_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let layout = LayoutConfig::load_or_empty(&dir.path().join("missing.yaml"));
        assert!(layout.is_empty());
    }

    #[test]
    fn test_push_replaces_existing() {
        let mut layout = LayoutConfig::default();
        let entry = |side| ShelfEntry {
            side,
            starting_point: None,
            via_points: Vec::new(),
            hack: false,
        };
        layout.push("s1", entry(Side::Left));
        layout.push("s1", entry(Side::Right));
        assert_eq!(layout.len(), 1);
        assert_eq!(layout.is_right("s1"), Some(true));
    }

    #[test]
    fn test_kb_config_defaults_and_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_shelf_height: 1.8\nfacing_settle_ms: 0\n").unwrap();
        let cfg = KbConfig::load(file.path()).unwrap();
        assert!((cfg.max_shelf_height - 1.8).abs() < f64::EPSILON);
        assert_eq!(cfg.facing_settle(), Duration::ZERO);
        assert_eq!(cfg.marker_settle(), Duration::from_secs(3));
        assert_eq!(cfg.article_dimensions, [0.4, 0.015, 0.1]);
    }

    #[test]
    fn test_kb_config_load_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.yaml");
        std::fs::write(&path, LAYOUT).unwrap();
        let cfg = KbConfig {
            layout_path: Some(path),
            ..KbConfig::default()
        };
        assert_eq!(cfg.load_layout().len(), 2);
        assert!(KbConfig::default().load_layout().is_empty());
    }
}
