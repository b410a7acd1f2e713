//! Facings: the per-product slots the reasoner derives from separators
//! and labels.

use super::{KnowledgeBase, ObjectPose};
use crate::error::KbResult;
use crate::geometry::PoseStamped;
use crate::heuristics::LayoutHeuristics;
use crate::query;
use crate::reasoner::Reasoner;
use crate::term::unexpected;
use crate::transforms::TransformLookup;

impl<R: Reasoner, T: TransformLookup, H: LayoutHeuristics> KnowledgeBase<R, T, H> {
    /// Facings of a layer with poses in the layer's perceived frame.
    ///
    /// Ordered along the robot's path: ascending `x` on left shelves,
    /// descending on right shelves.
    pub fn get_facing_ids_from_layer(&self, shelf_layer_id: &str) -> KbResult<Vec<ObjectPose>> {
        let shelf_system_id = self.get_shelf_system_from_layer(shelf_layer_id)?;
        let layer_frame = self.get_perceived_frame_id(shelf_layer_id)?;
        let q = query::facings_with_poses(shelf_layer_id);
        let solution = self.once_required(&q)?;

        let mut facings = Vec::new();
        for item in solution.list(&q, "Fs")? {
            let pair = item
                .as_list()
                .filter(|pair| pair.len() == 2)
                .ok_or_else(|| unexpected("Fs", "[Facing, Pose] pair", item))?;
            let id = pair[0]
                .as_atom()
                .ok_or_else(|| unexpected("Fs", "facing atom", &pair[0]))?;
            let pose = PoseStamped::from_term(&pair[1])?;
            let pose = self.tf.transform_pose(&layer_frame, &pose)?;
            facings.push(ObjectPose { id, pose });
        }

        let direction = if self.is_left(&shelf_system_id)? { 1.0 } else { -1.0 };
        facings.sort_by(|a, b| {
            (a.pose.pose.position.x * direction).total_cmp(&(b.pose.pose.position.x * direction))
        });
        Ok(facings)
    }

    /// Whether the reasoner knows a facing.
    pub fn facing_exists(&self, facing_id: &str) -> KbResult<bool> {
        Ok(!self.all_solutions(&query::facing_layer(facing_id))?.is_empty())
    }

    /// Layer a facing belongs to. Cached per session.
    pub fn get_shelf_layer_from_facing(&self, facing_id: &str) -> KbResult<String> {
        self.cached(facing_id, |s| &mut s.layer_of_facing, || {
            let q = query::facing_layer(facing_id);
            self.once_required(&q)?.atom(&q, "Layer")
        })
    }

    fn facing_measure(&self, predicate: &str, facing_id: &str) -> KbResult<f64> {
        let q = query::facing_measure(predicate, facing_id);
        self.once_required(&q)?.number(&q, "W")
    }

    /// Depth of a facing in meters.
    pub fn get_facing_depth(&self, facing_id: &str) -> KbResult<f64> {
        self.facing_measure("comp_facingDepth", facing_id)
    }

    /// Height of a facing in meters.
    pub fn get_facing_height(&self, facing_id: &str) -> KbResult<f64> {
        self.facing_measure("comp_facingHeight", facing_id)
    }

    /// Width of a facing in meters.
    pub fn get_facing_width(&self, facing_id: &str) -> KbResult<f64> {
        self.facing_measure("comp_facingWidth", facing_id)
    }

    /// Left and right separator of a facing.
    pub fn get_facing_separator(&self, facing_id: &str) -> KbResult<Option<(String, String)>> {
        let q = query::facing_separators(facing_id);
        match self.once(&q)? {
            Some(s) => Ok(Some((s.atom(&q, "L")?, s.atom(&q, "R")?))),
            None => Ok(None),
        }
    }

    /// Product type expected in a facing.
    pub fn get_object_of_facing(&self, facing_id: &str) -> KbResult<Option<String>> {
        let q = query::facing_product_type(facing_id);
        self.once(&q)?.map(|s| s.atom(&q, "P")).transpose()
    }

    /// Dimensions of a product class as `[width, depth, height]`.
    pub fn get_object_dimensions(&self, object_class: &str) -> KbResult<Option<[f64; 3]>> {
        let q = query::object_class_dimensions(object_class);
        let Some(s) = self.once(&q)? else {
            return Ok(None);
        };
        Ok(Some([
            s.number(&q, "Y_num")?,
            s.number(&q, "X_num")?,
            s.number(&q, "Z_num")?,
        ]))
    }

    /// Facings with no product in them, over the whole store.
    pub fn get_all_empty_facings(&self) -> KbResult<Vec<String>> {
        self.find_atoms(query::ALL_EMPTY_FACINGS, "Fs")
    }

    /// Facings with no product in them, on one layer.
    pub fn get_empty_facings_from_layer(&self, shelf_layer_id: &str) -> KbResult<Vec<String>> {
        self.find_atoms(&query::empty_facings_of_layer(shelf_layer_id), "Fs")
    }

    /// Records how sure perception is about a facing's content.
    pub fn assert_confidence(&self, facing_id: &str, confidence: f64) -> KbResult<()> {
        self.once(&query::assert_confidence(facing_id, confidence))?;
        Ok(())
    }

    /// Spawns `number` products of the facing's type, front to back.
    pub fn add_objects(&self, facing_id: &str, number: usize) -> KbResult<()> {
        let q = query::spawn_product(facing_id);
        for _ in 0..number {
            self.once(&q)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::geometry::PoseStamped;
    use crate::kb::testing::*;
    use crate::query;
    use crate::reasoner::{ScriptedReasoner, ScriptedRule};
    use crate::term::{Solution, Term};
    use crate::transforms::StaticTransforms;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn facing_layer(reasoner: &ScriptedReasoner, tf: &StaticTransforms, layer: &str, shelf: &str) {
        rule(
            reasoner,
            ScriptedRule::exact(query::layer_frame(layer))
                .solution(Solution::new().with("Frame", atom(shelf))),
        );
        rule(
            reasoner,
            ScriptedRule::exact(query::perceived_frame(layer))
                .solution(Solution::new().with("FeatureFrame", atom("layer_feature"))),
        );
        tf.insert_frame("layer_feature", &PoseStamped::at(query::MAP, 1.0, 0.0, 0.0))
            .unwrap();
        let fs = Term::from_json(json!([
            ["'f_mid'", ["map", null, [1.5, 0, 0], [0, 0, 0, 1]]],
            ["'f_far'", ["map", null, [1.9, 0, 0], [0, 0, 0, 1]]],
            ["'f_near'", ["map", null, [1.1, 0, 0], [0, 0, 0, 1]]],
        ]));
        rule(
            reasoner,
            ScriptedRule::exact(query::facings_with_poses(layer))
                .solution(Solution::new().with("Fs", fs)),
        );
    }

    #[test]
    fn test_facings_ordered_on_left_shelf() {
        let (kb, reasoner, tf) = kb();
        facing_layer(&reasoner, &tf, "l1", "shelf_left");
        let facings = kb.get_facing_ids_from_layer("l1").unwrap();
        let ids: Vec<&str> = facings.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["f_near", "f_mid", "f_far"]);
        assert_eq!(facings[0].pose.frame_id(), "layer_feature");
        assert_relative_eq!(facings[0].pose.pose.position.x, 0.1, epsilon = 1e-9);
    }

    #[test]
    fn test_facings_mirrored_on_right_shelf() {
        let (kb, reasoner, tf) = kb();
        facing_layer(&reasoner, &tf, "l1", "shelf_right");
        let ids: Vec<String> = kb
            .get_facing_ids_from_layer("l1")
            .unwrap()
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, vec!["f_far", "f_mid", "f_near"]);
    }

    #[test]
    fn test_facing_measures() {
        let (kb, reasoner, _) = kb();
        rule(
            &reasoner,
            ScriptedRule::exact(query::facing_measure("comp_facingWidth", "f1"))
                .solution(Solution::new().with("W", Term::Float(0.12))),
        );
        rule(
            &reasoner,
            ScriptedRule::exact(query::facing_measure("comp_facingHeight", "f1"))
                .solution(Solution::new().with("W", Term::Int(1))),
        );
        assert_relative_eq!(kb.get_facing_width("f1").unwrap(), 0.12);
        assert_relative_eq!(kb.get_facing_height("f1").unwrap(), 1.0);
        assert!(kb.get_facing_depth("f1").unwrap_err().is_answer_error());
    }

    #[test]
    fn test_facing_lookups() {
        let (kb, reasoner, _) = kb();
        rule(
            &reasoner,
            ScriptedRule::exact(query::facing_layer("f1"))
                .solution(Solution::new().with("Layer", atom("l1"))),
        );
        rule(
            &reasoner,
            ScriptedRule::exact(query::facing_separators("f1")).solution(
                Solution::new().with("L", atom("sep_a")).with("R", atom("sep_b")),
            ),
        );
        rule(
            &reasoner,
            ScriptedRule::exact(query::facing_product_type("f1"))
                .solution(Solution::new().with("P", atom("shop:Product_42"))),
        );
        assert!(kb.facing_exists("f1").unwrap());
        assert!(!kb.facing_exists("f2").unwrap());
        assert_eq!(kb.get_shelf_layer_from_facing("f1").unwrap(), "l1");
        assert_eq!(
            kb.get_facing_separator("f1").unwrap(),
            Some(("sep_a".to_string(), "sep_b".to_string()))
        );
        assert_eq!(kb.get_facing_separator("f2").unwrap(), None);
        assert_eq!(kb.get_object_of_facing("f1").unwrap().as_deref(), Some("shop:Product_42"));
        assert_eq!(kb.get_object_of_facing("f2").unwrap(), None);
    }

    #[test]
    fn test_object_dimensions_order() {
        let (kb, reasoner, _) = kb();
        rule(
            &reasoner,
            ScriptedRule::exact(query::object_class_dimensions("shop:P")).solution(
                Solution::new()
                    .with("X_num", Term::Float(0.3))
                    .with("Y_num", Term::Float(0.1))
                    .with("Z_num", Term::Float(0.2)),
            ),
        );
        assert_eq!(kb.get_object_dimensions("shop:P").unwrap(), Some([0.1, 0.3, 0.2]));
        assert_eq!(kb.get_object_dimensions("shop:Q").unwrap(), None);
    }

    #[test]
    fn test_empty_facings() {
        let (kb, reasoner, _) = kb();
        rule(
            &reasoner,
            ScriptedRule::exact(query::empty_facings_of_layer("l1"))
                .solution(Solution::new().with("Fs", Term::List(vec![atom("f3")]))),
        );
        assert_eq!(kb.get_empty_facings_from_layer("l1").unwrap(), vec!["f3"]);
        assert!(kb.get_all_empty_facings().unwrap().is_empty());
    }

    #[test]
    fn test_add_objects_and_confidence() {
        let (kb, reasoner, _) = kb();
        kb.add_objects("f1", 3).unwrap();
        kb.assert_confidence("f1", 0.75).unwrap();
        assert_eq!(reasoner.queries_containing("product_spawn_front_to_back").len(), 3);
        assert_eq!(
            reasoner.queries_containing("rdf_assert"),
            vec![query::assert_confidence("f1", 0.75)]
        );
    }
}
