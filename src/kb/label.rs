//! Shelf labels (price tags) and their export.

use serde::{Deserialize, Serialize};

use super::KnowledgeBase;
use crate::error::KbResult;
use crate::heuristics::LayoutHeuristics;
use crate::query;
use crate::reasoner::Reasoner;
use crate::term::{unexpected, Term};
use crate::transforms::TransformLookup;

/// One label of the belief state, ready for export.
///
/// Layer and label numbers are 1-based; layers count from the bottom and
/// labels from the layer's left edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRecord {
    /// Shelf system the label sits on.
    pub shelf_id: String,
    /// Layer counted from the bottom.
    pub layer_num: usize,
    /// Label counted from the layer's left edge.
    pub label_num: usize,
    /// Article number printed on the label.
    pub dan: String,
    /// Position relative to the layer's left edge, in meters.
    pub pos: f64,
}

/// DANs are bound as quoted text; drop one pair of surrounding quotes.
fn unquote_dan(term: &Term) -> Option<String> {
    match term {
        Term::Atom(raw) => {
            let trimmed = raw
                .strip_prefix(&['\'', '"'][..])
                .and_then(|s| s.strip_suffix(&['\'', '"'][..]))
                .unwrap_or(raw);
            Some(trimmed.to_string())
        }
        Term::Int(i) => Some(i.to_string()),
        _ => None,
    }
}

impl<R: Reasoner, T: TransformLookup, H: LayoutHeuristics> KnowledgeBase<R, T, H> {
    /// Labels on a layer, left to right.
    pub fn get_label_ids(&self, shelf_layer_id: &str) -> KbResult<Vec<String>> {
        let q = query::labels_of_layer(shelf_layer_id);
        let solution = self.once_required(&q)?;

        let mut labels = Vec::new();
        for item in solution.list(&q, "Ls")? {
            let pair = item
                .as_list()
                .filter(|pair| pair.len() == 2)
                .ok_or_else(|| unexpected("Ls", "[Label, X] pair", item))?;
            let id = pair[0]
                .as_atom()
                .ok_or_else(|| unexpected("Ls", "label atom", &pair[0]))?;
            let x = pair[1]
                .as_f64()
                .ok_or_else(|| unexpected("Ls", "number", &pair[1]))?;
            labels.push((x, id));
        }
        labels.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(labels.into_iter().map(|(_, id)| id).collect())
    }

    /// Article number printed on a label.
    pub fn get_label_dan(&self, label_id: &str) -> KbResult<String> {
        let q = query::label_dan(label_id);
        let solution = self.once_required(&q)?;
        let term = solution.require(&q, "DAN")?;
        unquote_dan(term).ok_or_else(|| unexpected("DAN", "atom", term))
    }

    /// Position of a label relative to the left edge of its layer, in
    /// meters.
    pub fn get_label_pos(&self, label_id: &str) -> KbResult<f64> {
        let q = query::label_position(label_id);
        let solution = self.once_required(&q)?;
        Ok(solution.number(&q, "Pos")? + solution.number(&q, "Width")? / 2.0)
    }

    /// Every label of every shelf system, for export.
    pub fn read_labels(&self) -> KbResult<Vec<LabelRecord>> {
        let mut labels = Vec::new();
        for shelf_id in self.get_shelf_system_ids(false)? {
            for (layer_idx, layer) in self.get_shelf_layer_from_system(&shelf_id)?.iter().enumerate() {
                for (label_idx, label_id) in self.get_label_ids(&layer.id)?.iter().enumerate() {
                    labels.push(LabelRecord {
                        shelf_id: shelf_id.clone(),
                        layer_num: layer_idx + 1,
                        label_num: label_idx + 1,
                        dan: self.get_label_dan(label_id)?,
                        pos: self.get_label_pos(label_id)?,
                    });
                }
            }
        }
        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::testing::*;
    use crate::reasoner::ScriptedRule;
    use crate::term::Solution;
    use approx::assert_relative_eq;
    use serde_json::json;

    #[test]
    fn test_unquote_dan() {
        assert_eq!(unquote_dan(&Term::Atom("'4010355'".into())).as_deref(), Some("4010355"));
        assert_eq!(unquote_dan(&Term::Atom("\"4010355\"".into())).as_deref(), Some("4010355"));
        assert_eq!(unquote_dan(&Term::Atom("4010355".into())).as_deref(), Some("4010355"));
        assert_eq!(unquote_dan(&Term::Int(42)).as_deref(), Some("42"));
        assert_eq!(unquote_dan(&Term::Null), None);
    }

    #[test]
    fn test_label_ids_sorted_by_x() {
        let (kb, reasoner, _) = kb();
        rule(
            &reasoner,
            ScriptedRule::exact(query::labels_of_layer("l1")).solution(Solution::new().with(
                "Ls",
                Term::from_json(json!([["'lab_b'", 0.6], ["'lab_a'", -0.2], ["'lab_c'", "0.9"]])),
            )),
        );
        assert_eq!(kb.get_label_ids("l1").unwrap(), vec!["lab_a", "lab_b", "lab_c"]);
    }

    #[test]
    fn test_label_pos_is_offset_by_half_width() {
        let (kb, reasoner, _) = kb();
        rule(
            &reasoner,
            ScriptedRule::exact(query::label_position("lab_a")).solution(
                Solution::new()
                    .with("Pos", Term::Float(-0.25))
                    .with("Width", Term::Float(1.0)),
            ),
        );
        assert_relative_eq!(kb.get_label_pos("lab_a").unwrap(), 0.25);
    }

    #[test]
    fn test_label_record_serializes() {
        let record = LabelRecord {
            shelf_id: "s1".to_string(),
            layer_num: 1,
            label_num: 2,
            dan: "4011".to_string(),
            pos: 0.5,
        };
        let v = serde_json::to_value(&record).unwrap();
        assert_eq!(v["label_num"], 2);
        assert_eq!(v["dan"], "4011");
    }
}
