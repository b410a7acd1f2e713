//! Shelf systems and shelf layers.

use std::collections::BTreeSet;

use tracing::debug;

use super::{KnowledgeBase, ObjectPose};
use crate::error::{KbError, KbResult};
use crate::geometry::PoseStamped;
use crate::heuristics::LayoutHeuristics;
use crate::query::{self, MAP};
use crate::reasoner::Reasoner;
use crate::transforms::TransformLookup;

impl<R: Reasoner, T: TransformLookup, H: LayoutHeuristics> KnowledgeBase<R, T, H> {
    /// Shelf system ids known to the reasoner.
    ///
    /// With `filter_with_layout` only systems listed in the layout file are
    /// returned, in layout order. Otherwise every system is returned,
    /// sorted by id.
    pub fn get_shelf_system_ids(&self, filter_with_layout: bool) -> KbResult<Vec<String>> {
        let all: BTreeSet<String> = self
            .get_all_individuals_of(query::SHELF_SYSTEM)?
            .into_iter()
            .collect();
        if filter_with_layout {
            Ok(self
                .layout
                .ids()
                .filter(|id| all.contains(*id))
                .map(str::to_string)
                .collect())
        } else {
            Ok(all.into_iter().collect())
        }
    }

    /// True when the reasoner knows the system and the layout lists it.
    pub fn shelf_system_exists(&self, shelf_system_id: &str) -> KbResult<bool> {
        Ok(self
            .get_shelf_system_ids(true)?
            .iter()
            .any(|id| id == shelf_system_id))
    }

    /// Pose of a shelf system's mesh frame in the map.
    pub fn get_shelf_pose(&self, shelf_system_id: &str) -> KbResult<PoseStamped> {
        let frame = self.get_object_frame_id(shelf_system_id)?;
        self.tf.lookup_pose(MAP, &frame)
    }

    /// Whether a shelf system has 5-tile deep layers.
    pub fn is_5tile_system(&self, shelf_system_id: &str) -> KbResult<bool> {
        self.holds(&query::individual_of(shelf_system_id, query::SHELF_T5))
    }

    /// Whether a shelf system has 6-tile deep layers.
    pub fn is_6tile_system(&self, shelf_system_id: &str) -> KbResult<bool> {
        self.holds(&query::individual_of(shelf_system_id, query::SHELF_T6))
    }

    /// Whether a shelf system has 7-tile deep layers.
    pub fn is_7tile_system(&self, shelf_system_id: &str) -> KbResult<bool> {
        self.holds(&query::individual_of(shelf_system_id, query::SHELF_T7))
    }

    /// Whether a shelf system is a heavy duty one.
    pub fn is_heavy_system(&self, shelf_system_id: &str) -> KbResult<bool> {
        self.holds(&query::individual_of(shelf_system_id, query::SHELF_H))
    }

    /// Number of tiles (depth class) of a shelf system: 5, 6 or 7.
    pub fn get_num_of_tiles(&self, shelf_system_id: &str) -> KbResult<u8> {
        if self.is_5tile_system(shelf_system_id)? {
            Ok(5)
        } else if self.is_6tile_system(shelf_system_id)? {
            Ok(6)
        } else if self.is_7tile_system(shelf_system_id)? {
            Ok(7)
        } else {
            Err(KbError::Unsupported {
                what: format!("could not identify number of tiles for shelf {shelf_system_id}"),
            })
        }
    }

    /// Layer class used for the bottom layer of a shelf system.
    pub fn get_bottom_layer_type(&self, shelf_system_id: &str) -> KbResult<String> {
        let q = query::bottom_floor_type(shelf_system_id);
        self.once_required(&q)?.atom(&q, "LayerType")
    }

    /// Layer class used for every other layer of a shelf system.
    pub fn get_shelf_layer_type(&self, shelf_system_id: &str) -> KbResult<String> {
        let q = query::floor_type(shelf_system_id);
        self.once_required(&q)?.atom(&q, "LayerType")
    }

    /// Width of a shelf system in meters.
    pub fn get_shelf_system_width(&self, shelf_system_id: &str) -> KbResult<f64> {
        let q = query::object_dimensions(shelf_system_id);
        self.once_required(&q)?.number(&q, "W")
    }

    /// Height of a shelf system in meters.
    pub fn get_shelf_system_height(&self, shelf_system_id: &str) -> KbResult<f64> {
        let q = query::object_dimensions(shelf_system_id);
        self.once_required(&q)?.number(&q, "H")
    }

    /// Layers of a shelf system with their perception-feature poses in the
    /// shelf's perceived frame, lowest first.
    ///
    /// Layers at or above `max_shelf_height` are dropped.
    pub fn get_shelf_layer_from_system(&self, shelf_system_id: &str) -> KbResult<Vec<ObjectPose>> {
        let q = query::layers_of_system(shelf_system_id);
        let solutions = self.all_solutions(&q)?;
        let shelf_frame = self.get_perceived_frame_id(shelf_system_id)?;

        let mut layers = Vec::with_capacity(solutions.len());
        for solution in &solutions {
            let id = solution.atom(&q, "Floor")?;
            let feature_frame = solution.atom(&q, "FeatureFrame")?;
            let pose = self.tf.lookup_pose(&shelf_frame, &feature_frame)?;
            layers.push(ObjectPose { id, pose });
        }
        layers.sort_by(|a, b| a.pose.pose.position.z.total_cmp(&b.pose.pose.position.z));
        layers.retain(|l| l.pose.pose.position.z < self.config.max_shelf_height);
        debug!(shelf_system = shelf_system_id, layers = layers.len(), "layers of shelf system");
        Ok(layers)
    }

    /// Whether the reasoner knows a shelf layer.
    pub fn shelf_layer_exists(&self, shelf_layer_id: &str) -> KbResult<bool> {
        self.holds(&query::layer_exists(shelf_layer_id))
    }

    /// Width of a shelf layer in meters.
    pub fn get_shelf_layer_width(&self, shelf_layer_id: &str) -> KbResult<f64> {
        let q = query::object_dimensions(shelf_layer_id);
        match self.once(&q)? {
            Some(solution) => solution.number(&q, "W"),
            None => Err(KbError::query_failed(q)),
        }
    }

    /// Shelf system a layer belongs to. Cached per session.
    pub fn get_shelf_system_from_layer(&self, shelf_layer_id: &str) -> KbResult<String> {
        self.cached(shelf_layer_id, |s| &mut s.system_of_layer, || {
            let q = query::layer_frame(shelf_layer_id);
            self.once_required(&q)?.atom(&q, "Frame")
        })
    }

    /// The layer directly above, `None` for the top layer.
    pub fn get_shelf_layer_above(&self, shelf_layer_id: &str) -> KbResult<Option<String>> {
        let q = query::layer_above(shelf_layer_id);
        self.once(&q)?
            .map(|solution| solution.atom(&q, "Above"))
            .transpose()
    }

    /// Whether no layer sits above a shelf layer.
    pub fn is_top_layer(&self, shelf_layer_id: &str) -> KbResult<bool> {
        Ok(self.get_shelf_layer_above(shelf_layer_id)?.is_none())
    }

    /// Whether a shelf layer is the bottom layer of its system.
    pub fn is_bottom_layer(&self, shelf_layer_id: &str) -> KbResult<bool> {
        self.holds(&query::individual_of(shelf_layer_id, query::SHELF_BOTTOM_LAYER))
    }
}
