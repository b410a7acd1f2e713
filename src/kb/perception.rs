//! Writing perception results into the belief state.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{info, warn};

use super::KnowledgeBase;
use crate::error::KbResult;
use crate::geometry::PoseStamped;
use crate::heuristics::LayoutHeuristics;
use crate::query::{self, MAP};
use crate::reasoner::Reasoner;
use crate::transforms::TransformLookup;

static FLOOR_DEPTH: OnceLock<Option<Regex>> = OnceLock::new();

/// `...DMFloorT4W100` becomes `...DMFloorT5W100`. Types without a depth
/// class are returned unchanged.
pub fn deepen_layer_type(layer_type: &str) -> String {
    let re = FLOOR_DEPTH.get_or_init(|| Regex::new(r"DMFloorT(\d+)").ok());
    let Some(re) = re else {
        return layer_type.to_string();
    };
    re.replacen(layer_type, 1, |caps: &regex::Captures<'_>| {
        match caps[1].parse::<u32>() {
            Ok(depth) => format!("DMFloorT{}", depth + 1),
            Err(_) => caps[0].to_string(),
        }
    })
    .into_owned()
}

impl<R: Reasoner, T: TransformLookup, H: LayoutHeuristics> KnowledgeBase<R, T, H> {
    /// Asserts the two shelf markers and the shelf system standing between
    /// them. Returns the id of the shelf system.
    pub fn assert_shelf_markers(
        &self,
        left_pose: &PoseStamped,
        right_pose: &PoseStamped,
        left_id: &str,
        right_id: &str,
        shelf_pose: &PoseStamped,
    ) -> KbResult<Option<String>> {
        let q = query::shelf_markers(left_pose, left_id, right_pose, right_id);
        let bindings = self.once_required(&q)?;
        let left = bindings.atom(&q, "Left")?;
        let right = bindings.atom(&q, "Right")?;
        info!(left = %left, right = %right, "shelf markers asserted");
        self.settle(self.config.marker_settle());

        self.once(&query::mark_dirty_objects(&[&left, &right]))?;

        let q = query::shelf_at(&left, &right, shelf_pose);
        let Some(bindings) = self.once(&q)? else {
            warn!(left = %left, right = %right, "no shelf system between markers");
            return Ok(None);
        };
        bindings.atom(&q, "Shelf").map(Some)
    }

    /// Asserts one layer per detected height on a shelf system.
    ///
    /// Close heights are merged first. The lowest layer gets the bottom
    /// layer type. Returns the number of layers asserted.
    pub fn add_shelf_layers(&self, shelf_system_id: &str, shelf_layer_heights: &[f64]) -> KbResult<usize> {
        let mut heights = self.heuristics.merge_close_shelf_layers(shelf_layer_heights);
        heights.sort_by(f64::total_cmp);
        for (i, height) in heights.iter().enumerate() {
            let layer_type = if i == 0 {
                self.get_bottom_layer_type(shelf_system_id)?
            } else if self.layout.has_depth_hack(shelf_system_id) {
                deepen_layer_type(&self.get_shelf_layer_type(shelf_system_id)?)
            } else {
                self.get_shelf_layer_type(shelf_system_id)?
            };
            self.once(&query::shelf_part_at(shelf_system_id, &query::atom(&layer_type), *height))?;
        }
        info!(shelf_system = shelf_system_id, layers = heights.len(), "shelf layers added");
        Ok(heights.len())
    }

    /// Moves a layer so its perceived height matches the mean height of the
    /// separators seen on it. Separators are map-frame poses.
    pub fn update_shelf_layer_position(&self, shelf_layer_id: &str, separators: &[PoseStamped]) -> KbResult<()> {
        if separators.is_empty() {
            return Ok(());
        }
        let perceived = self.tf.lookup_pose(MAP, &self.get_perceived_frame_id(shelf_layer_id)?)?;
        #[allow(clippy::cast_precision_loss)]
        let new_height = separators.iter().map(|p| p.pose.position.z).sum::<f64>() / separators.len() as f64;

        let mut floor = self.tf.lookup_pose(MAP, &self.get_object_frame_id(shelf_layer_id)?)?;
        floor.pose.position.z += new_height - perceived.pose.position.z;
        self.once(&query::belief_at_update(shelf_layer_id, &floor))?;
        Ok(())
    }

    /// Asserts separators on a layer, one query each. Positions are taken
    /// from `x` of poses relative to the layer.
    ///
    /// Stops at the first reasoner error and returns `false`.
    pub fn add_separators(&self, shelf_layer_id: &str, separators: &[PoseStamped]) -> KbResult<bool> {
        for p in separators {
            if let Err(e) = self.once(&query::separator_at(shelf_layer_id, p.pose.position.x)) {
                warn!(shelf_layer = shelf_layer_id, error = %e, "failed to add separator");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Asserts barcodes on a layer, creating article types for unknown DANs.
    /// Positions are taken from `x` of poses relative to the layer.
    pub fn add_barcodes(&self, shelf_layer_id: &str, barcodes: &[(String, PoseStamped)]) -> KbResult<()> {
        for (dan, p) in barcodes {
            self.create_article_if_unknown(dan)?;
            self.once(&query::barcode_at(shelf_layer_id, dan, p.pose.position.x))?;
        }
        Ok(())
    }

    /// Creates article types for every DAN the reasoner does not know yet.
    pub fn create_unknown_barcodes(&self, barcodes: &[(String, PoseStamped)]) -> KbResult<()> {
        for (dan, _) in barcodes {
            self.create_article_if_unknown(dan)?;
        }
        Ok(())
    }

    fn create_article_if_unknown(&self, dan: &str) -> KbResult<()> {
        if !self.does_dan_exist(dan)? {
            info!(dan, "creating article for unknown barcode");
            self.once(&query::create_article(dan, self.config.article_dimensions))?;
        }
        Ok(())
    }

    /// Replaces a layer's separators and labels in one go.
    ///
    /// Poses are map-frame detections. They are moved into the layer's
    /// perceived frame, normalized by the layer width, cleaned up by the
    /// layout heuristics and bulk inserted. Facings of the layer are marked
    /// dirty once the reasoner has settled.
    pub fn add_separators_and_barcodes(
        &self,
        shelf_layer_id: &str,
        separators: &[PoseStamped],
        barcodes: &[(String, PoseStamped)],
    ) -> KbResult<()> {
        let layer_frame = self.get_perceived_frame_id(shelf_layer_id)?;
        let t = self.tf.lookup_transform(&layer_frame, MAP)?;
        let width = self.get_shelf_layer_width(shelf_layer_id)?;

        let separator_xs: Vec<f64> = separators
            .iter()
            .map(|p| t.apply(p).pose.position.x / width)
            .collect();
        let labels: Vec<(f64, String)> = barcodes
            .iter()
            .map(|(dan, p)| (t.apply(p).pose.position.x / width, dan.clone()))
            .collect();

        let (separator_xs, labels) = self.heuristics.add_separator_between_barcodes(&separator_xs, &labels);
        let separator_xs = self.heuristics.add_edge_separators(&separator_xs);
        let separator_xs = self.heuristics.merge_close_separators(&separator_xs);

        self.once(&query::bulk_insert_floor(shelf_layer_id, &separator_xs, &labels))?;
        info!(
            shelf_layer = shelf_layer_id,
            separators = separator_xs.len(),
            labels = labels.len(),
            "layer contents inserted"
        );
        self.settle(self.config.facing_settle());
        self.once(&query::facings_mark_dirty(shelf_layer_id))?;
        Ok(())
    }

    /// Whether an article number exists for a DAN.
    pub fn does_dan_exist(&self, dan: &str) -> KbResult<bool> {
        self.holds(&query::dan_exists(dan))
    }

    /// Every DAN with an article number in the belief state.
    pub fn get_all_product_dan(&self) -> KbResult<Vec<String>> {
        self.find_atoms(query::ALL_PRODUCT_DANS, "DANS")
    }
}
