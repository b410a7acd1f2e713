use shelfkb::{
    query, KbConfig, KnowledgeBase, LabelRecord, PoseStamped, ScriptedReasoner, ScriptedRule,
    Solution, StaticTransforms, Term,
};
use std::io::Write;
use std::sync::Arc;

const LAYOUT: &str = r"
shelf_b:
  side: right
  starting-point: shelf_a
  via-points: []
shelf_a:
  side: left
  via-points: []
";

fn atom(s: &str) -> Term {
    Term::Atom(format!("'{s}'"))
}

fn store() -> (
    KnowledgeBase<Arc<ScriptedReasoner>, Arc<StaticTransforms>>,
    Arc<ScriptedReasoner>,
    Arc<StaticTransforms>,
    tempfile::NamedTempFile,
) {
    let mut layout = tempfile::NamedTempFile::new().unwrap();
    layout.write_all(LAYOUT.as_bytes()).unwrap();

    let config = KbConfig {
        layout_path: Some(layout.path().to_path_buf()),
        ..KbConfig::default().without_settling()
    };
    let reasoner = Arc::new(ScriptedReasoner::new());
    let tf = Arc::new(StaticTransforms::new());
    let kb = KnowledgeBase::new(Arc::clone(&reasoner), Arc::clone(&tf), config);
    (kb, reasoner, tf, layout)
}

fn answer(reasoner: &ScriptedReasoner, q: String, solution: Solution) {
    reasoner
        .add_rule(ScriptedRule::exact(q).solution(solution))
        .unwrap();
}

#[test]
fn layout_file_drives_system_order() {
    let (kb, reasoner, _tf, _layout) = store();
    answer(
        &reasoner,
        query::individuals_of(query::SHELF_SYSTEM),
        Solution::new().with(
            "Rs",
            Term::List(vec![atom("shelf_a"), atom("shelf_b"), atom("shelf_c")]),
        ),
    );

    assert_eq!(kb.layout().len(), 2);
    assert_eq!(kb.get_shelf_system_ids(true).unwrap(), vec!["shelf_b", "shelf_a"]);
    assert!(kb.is_right("shelf_b").unwrap());
    assert!(kb.is_left("shelf_a").unwrap());
    assert!(kb.is_left("shelf_c").unwrap_err().is_config());
}

#[test]
fn read_labels_walks_systems_layers_and_labels() {
    let (kb, reasoner, tf, _layout) = store();

    answer(
        &reasoner,
        query::individuals_of(query::SHELF_SYSTEM),
        Solution::new().with("Rs", Term::List(vec![atom("shelf_a")])),
    );
    answer(
        &reasoner,
        query::perceived_frame("shelf_a"),
        Solution::new().with("FeatureFrame", atom("shelf_a_feature")),
    );
    reasoner
        .add_rule(ScriptedRule::exact(query::layers_of_system("shelf_a")).solutions(vec![
            Solution::new()
                .with("Floor", atom("upper"))
                .with("FeatureFrame", atom("upper_feature")),
            Solution::new()
                .with("Floor", atom("lower"))
                .with("FeatureFrame", atom("lower_feature")),
        ]))
        .unwrap();
    tf.insert_frame("upper_feature", &PoseStamped::at("shelf_a_feature", 0.0, 0.0, 0.75))
        .unwrap();
    tf.insert_frame("lower_feature", &PoseStamped::at("shelf_a_feature", 0.0, 0.0, 0.125))
        .unwrap();

    answer(
        &reasoner,
        query::labels_of_layer("lower"),
        Solution::new().with(
            "Ls",
            Term::List(vec![
                Term::List(vec![atom("label_2"), Term::Float(0.5)]),
                Term::List(vec![atom("label_1"), Term::Float(0.25)]),
            ]),
        ),
    );
    answer(
        &reasoner,
        query::labels_of_layer("upper"),
        Solution::new().with("Ls", Term::List(vec![])),
    );
    for (label, dan, pos, width) in [("label_1", "1111", 0.0, 0.5), ("label_2", "2222", 0.5, 0.25)] {
        answer(&reasoner, query::label_dan(label), Solution::new().with("DAN", atom(dan)));
        answer(
            &reasoner,
            query::label_position(label),
            Solution::new()
                .with("Pos", Term::Float(pos))
                .with("Width", Term::Float(width)),
        );
    }

    let labels = kb.read_labels().unwrap();
    assert_eq!(
        labels,
        vec![
            LabelRecord {
                shelf_id: "shelf_a".to_string(),
                layer_num: 1,
                label_num: 1,
                dan: "1111".to_string(),
                pos: 0.25,
            },
            LabelRecord {
                shelf_id: "shelf_a".to_string(),
                layer_num: 1,
                label_num: 2,
                dan: "2222".to_string(),
                pos: 0.625,
            },
        ]
    );

    let exported = serde_json::to_string(&labels).unwrap();
    let back: Vec<LabelRecord> = serde_json::from_str(&exported).unwrap();
    assert_eq!(back, labels);
}

#[test]
fn scan_of_one_shelf() {
    let (kb, reasoner, tf, _layout) = store();

    reasoner
        .add_rule(
            ScriptedRule::matching(r"^belief_shelf_left_marker_at")
                .unwrap()
                .solution(
                    Solution::new()
                        .with("Left", atom("marker_left"))
                        .with("Right", atom("marker_right")),
                ),
        )
        .unwrap();
    reasoner
        .add_rule(
            ScriptedRule::matching(r"^belief_shelf_at\('marker_left','marker_right'")
                .unwrap()
                .solution(Solution::new().with("Shelf", atom("shelf_a"))),
        )
        .unwrap();
    answer(
        &reasoner,
        query::bottom_floor_type("shelf_a"),
        Solution::new().with("LayerType", atom("dmshop:DMFloorBottomT5")),
    );
    answer(
        &reasoner,
        query::floor_type("shelf_a"),
        Solution::new().with("LayerType", atom("dmshop:DMFloorT5W100")),
    );

    let map_pose = |x: f64| PoseStamped::at(query::MAP, x, 0.0, 0.0);
    let shelf = kb
        .assert_shelf_markers(&map_pose(0.0), &map_pose(1.0), "m_left", "m_right", &map_pose(0.5))
        .unwrap();
    assert_eq!(shelf.as_deref(), Some("shelf_a"));
    assert_eq!(
        reasoner.queries_containing("mark_dirty_objects"),
        vec!["mark_dirty_objects(['marker_left', 'marker_right'])"]
    );

    let added = kb.add_shelf_layers("shelf_a", &[0.125, 0.5, 0.5]).unwrap();
    assert_eq!(added, 2);
    assert_eq!(reasoner.queries_containing("belief_shelf_part_at").len(), 2);

    // layer contents, in a layer whose feature frame sits at x = 2 in the map
    answer(
        &reasoner,
        query::perceived_frame("layer_0"),
        Solution::new().with("FeatureFrame", atom("layer_0_feature")),
    );
    answer(
        &reasoner,
        query::object_dimensions("layer_0"),
        Solution::new().with("W", Term::Float(1.0)),
    );
    tf.insert_frame("layer_0_feature", &map_pose(2.0)).unwrap();

    kb.add_separators_and_barcodes(
        "layer_0",
        &[map_pose(2.0), map_pose(2.5), map_pose(3.0)],
        &[("4011".to_string(), map_pose(2.25))],
    )
    .unwrap();
    let inserts = reasoner.queries_containing("bulk_insert_floor");
    assert_eq!(inserts.len(), 1);
    assert!(inserts[0].starts_with("bulk_insert_floor('layer_0', separators([0.0,0.5,1.0])"));
    assert_eq!(reasoner.queries().last(), Some(&query::facings_mark_dirty("layer_0")));
}
