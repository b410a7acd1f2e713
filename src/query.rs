//! Prolog query construction.
//!
//! Every query the knowledge base sends is built here, so the exact text
//! can be checked without a reasoner. Identifiers are always quoted with
//! [`atom`]; floats always go through [`float`] so the reasoner parses them
//! as floats.

use crate::geometry::{PoseStamped, TransformStamped};

/// Namespace prefix of the generic shop ontology.
pub const SHOP: &str = "shop";
/// Namespace prefix of the retailer specific ontology.
pub const DM_MARKET: &str = "dmshop";
/// Frame all world poses are expressed in.
pub const MAP: &str = "map";

/// Class of every shelf layer.
pub const SHELF_FLOOR: &str = "shop:'ShelfLayer'";
/// Class of the bottom layer of a shelf system.
pub const SHELF_BOTTOM_LAYER: &str = "dmshop:'DMShelfBFloor'";
/// Class of shelf systems.
pub const SHELF_SYSTEM: &str = "dmshop:'DMShelfFrame'";
/// Shelf systems 200 cm high.
pub const SHELF_H200: &str = "dmshop:'DMShelfH200'";
/// Shelf systems with 5-tile deep layers.
pub const SHELF_T5: &str = "dmshop:'DMShelfT5'";
/// Shelf systems with 6-tile deep layers.
pub const SHELF_T6: &str = "dmshop:'DMShelfT6'";
/// Shelf systems with 7-tile deep layers.
pub const SHELF_T7: &str = "dmshop:'DMShelfT7'";
/// Shelf systems 60 cm wide.
pub const SHELF_W60: &str = "dmshop:'DMShelfW60'";
/// Shelf systems 75 cm wide.
pub const SHELF_W75: &str = "dmshop:'DMShelfW75'";
/// Shelf systems 100 cm wide.
pub const SHELF_W100: &str = "dmshop:'DMShelfW100'";
/// Shelf systems 120 cm wide.
pub const SHELF_W120: &str = "dmshop:'DMShelfW120'";
/// Heavy duty shelf systems.
pub const SHELF_H: &str = "dmshop:'DMShelfH'";
/// Light shelf systems.
pub const SHELF_L: &str = "dmshop:'DMShelfL'";
/// Class of the separators between facings.
pub const SEPARATOR: &str = "dmshop:'DMShelfSeparator4Tiles'";
/// Class of mounting bars.
pub const MOUNTING_BAR: &str = "dmshop:'DMShelfMountingBar'";
/// Class of shelf labels.
pub const BARCODE: &str = "dmshop:'DMShelfLabel'";
/// Affordance perception results attach to.
pub const PERCEPTION_AFFORDANCE: &str = "dmshop:'DMShelfPerceptionAffordance'";
/// Feature whose frame perception results are expressed in.
pub const PERCEPTION_FEATURE: &str = "dmshop:'DMShelfPerceptionFeature'";

/// Property linking an action to the object it acts on.
pub const OBJECT_ACTED_ON: &str = "'http://knowrob.org/kb/knowrob.owl#objectActedOn'";
/// Property linking an action to its goal location.
pub const GOAL_LOCATION: &str = "'http://knowrob.org/kb/knowrob.owl#goalLocation'";
/// Property linking a perception action to what it detected.
pub const DETECTED_OBJECT: &str = "'http://knowrob.org/kb/knowrob.owl#detectedObject'";

/// Quotes an identifier as a Prolog atom.
///
/// # Examples
///
/// ```
/// assert_eq!(shelfkb::query::atom("shelf_1"), "'shelf_1'");
/// assert_eq!(shelfkb::query::atom("it's"), r"'it\'s'");
/// ```
#[must_use]
pub fn atom(id: &str) -> String {
    let mut out = String::with_capacity(id.len() + 2);
    out.push('\'');
    for c in id.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Renders a float the reasoner reads back as a float.
///
/// Prolog rejects `1e-07` and reads `1` as an integer, so the output always
/// carries a fractional part.
///
/// # Examples
///
/// ```
/// use shelfkb::query::float;
/// assert_eq!(float(1.0), "1.0");
/// assert_eq!(float(0.25), "0.25");
/// assert_eq!(float(1e-7), "1.0e-7");
/// ```
#[must_use]
pub fn float(v: f64) -> String {
    if !v.is_finite() {
        return if v.is_nan() {
            "nan".to_string()
        } else if v > 0.0 {
            "inf".to_string()
        } else {
            "-inf".to_string()
        };
    }
    let s = format!("{v:?}");
    match s.find('e') {
        Some(pos) if !s[..pos].contains('.') => format!("{}.0{}", &s[..pos], &s[pos..]),
        _ => s,
    }
}

/// Renders a list of floats: `[0.1,0.5]`.
#[must_use]
pub fn float_list(values: &[f64]) -> String {
    let items: Vec<String> = values.iter().map(|v| float(*v)).collect();
    format!("[{}]", items.join(","))
}

/// Renders barcode positions as `[(X, 'DAN'),...]`.
#[must_use]
pub fn label_list(labels: &[(f64, String)]) -> String {
    let items: Vec<String> = labels
        .iter()
        .map(|(x, dan)| format!("({}, {})", float(*x), atom(dan)))
        .collect();
    format!("[{}]", items.join(","))
}

/// Pose in the form the reasoner expects:
/// `['frame', _, [x,y,z], [qx,qy,qz,qw]]`.
#[must_use]
pub fn pose_term(pose: &PoseStamped) -> String {
    let p = pose.pose.position;
    let q = pose.pose.orientation;
    format!(
        "[{}, _, [{},{},{}], [{},{},{},{}]]",
        atom(pose.frame_id()),
        float(p.x),
        float(p.y),
        float(p.z),
        float(q.x),
        float(q.y),
        float(q.z),
        float(q.w),
    )
}

/// The child frame's origin of a transform, rendered like [`pose_term`].
#[must_use]
pub fn transform_term(transform: &TransformStamped) -> String {
    pose_term(&PoseStamped::from(transform))
}

// ----------------------------------------------------------------------------
// Shelf systems
// ----------------------------------------------------------------------------

/// Collects every individual of a class into `Rs`.
pub fn individuals_of(object_type: &str) -> String {
    format!("findall(R, rdfs_individual_of(R, {object_type}), Rs).")
}

/// Holds if `id` is an individual of `class`.
pub fn individual_of(id: &str, class: &str) -> String {
    format!("rdfs_individual_of({}, {class})", atom(id))
}

/// Binds `LayerType` to the bottom layer class of a shelf system.
pub fn bottom_floor_type(shelf_system_id: &str) -> String {
    format!("shelf_bottom_floor_type({}, LayerType).", atom(shelf_system_id))
}

/// Binds `LayerType` to the class of the other layers of a shelf system.
pub fn floor_type(shelf_system_id: &str) -> String {
    format!("shelf_floor_type({}, LayerType).", atom(shelf_system_id))
}

/// Binds `D`, `W` and `H` to an object's depth, width and height.
pub fn object_dimensions(object_id: &str) -> String {
    format!("object_dimensions({}, D, W, H).", atom(object_id))
}

/// Asserts both shelf markers, binding `Left` and `Right` to their ids.
pub fn shelf_markers(left: &PoseStamped, left_id: &str, right: &PoseStamped, right_id: &str) -> String {
    format!(
        "belief_shelf_left_marker_at({}, {}, Left),belief_shelf_right_marker_at({}, {}, Right).",
        pose_term(left),
        atom(left_id),
        pose_term(right),
        atom(right_id),
    )
}

/// Marks objects for republishing.
pub fn mark_dirty_objects(ids: &[&str]) -> String {
    let items: Vec<String> = ids.iter().map(|id| atom(id)).collect();
    format!("mark_dirty_objects([{}])", items.join(", "))
}

/// Binds `Shelf` to the shelf system between two markers and moves it to `shelf_pose`.
pub fn shelf_at(left: &str, right: &str, shelf_pose: &PoseStamped) -> String {
    format!(
        "belief_shelf_at({},{},Shelf), belief_at_update(Shelf, {}).",
        atom(left),
        atom(right),
        pose_term(shelf_pose),
    )
}

// ----------------------------------------------------------------------------
// Frames and poses
// ----------------------------------------------------------------------------

/// Binds `FeatureFrame` to the frame of an object's perception feature.
pub fn perceived_frame(object_id: &str) -> String {
    format!(
        "object_feature({}, Feature, {PERCEPTION_FEATURE}),object_frame_name(Feature,FeatureFrame).",
        atom(object_id)
    )
}

/// Binds `R` to the frame at the center of an object's mesh.
pub fn object_frame(object_id: &str) -> String {
    format!("object_frame_name({}, R).", atom(object_id))
}

/// Moves an object to a new pose.
pub fn belief_at_update(object_id: &str, pose: &PoseStamped) -> String {
    format!("belief_at_update({}, {})", atom(object_id), pose_term(pose))
}

// ----------------------------------------------------------------------------
// Shelf layers
// ----------------------------------------------------------------------------

/// One solution per layer of a shelf system, binding `Floor` and `FeatureFrame`.
pub fn layers_of_system(shelf_system_id: &str) -> String {
    format!(
        "rdf_has({}, knowrob:properPhysicalParts, Floor), \
         rdfs_individual_of(Floor, {SHELF_FLOOR}), \
         object_feature(Floor, Feature, {PERCEPTION_FEATURE}),\
         object_frame_name(Feature, FeatureFrame).",
        atom(shelf_system_id)
    )
}

/// Binds `Frame` to the frame of a shelf layer.
pub fn layer_frame(shelf_layer_id: &str) -> String {
    format!("shelf_layer_frame({}, Frame).", atom(shelf_layer_id))
}

/// Holds if a shelf layer is known.
pub fn layer_exists(shelf_layer_id: &str) -> String {
    format!("shelf_layer_frame({}, _).", atom(shelf_layer_id))
}

/// Binds `Above` to the layer above a shelf layer.
pub fn layer_above(shelf_layer_id: &str) -> String {
    format!("shelf_layer_above({}, Above).", atom(shelf_layer_id))
}

/// Asserts a part of `part_type` at `position` on its parent.
pub fn shelf_part_at(parent_id: &str, part_type: &str, position: f64) -> String {
    format!(
        "belief_shelf_part_at({}, {part_type}, {}, R)",
        atom(parent_id),
        float(position)
    )
}

/// Asserts a separator at `x` on a shelf layer.
pub fn separator_at(shelf_layer_id: &str, x: f64) -> String {
    format!(
        "belief_shelf_part_at({}, {SEPARATOR}, {}, _)",
        atom(shelf_layer_id),
        float(x)
    )
}

/// Asserts a label carrying `dan` at `x` on a shelf layer.
pub fn barcode_at(shelf_layer_id: &str, dan: &str, x: f64) -> String {
    format!(
        "belief_shelf_barcode_at({}, {BARCODE}, dan({}), {}, _).",
        atom(shelf_layer_id),
        atom(dan),
        float(x)
    )
}

/// Replaces the separators and labels of a shelf layer.
pub fn bulk_insert_floor(shelf_layer_id: &str, separators: &[f64], labels: &[(f64, String)]) -> String {
    format!(
        "bulk_insert_floor({}, separators({}), labels({}))",
        atom(shelf_layer_id),
        float_list(separators),
        label_list(labels)
    )
}

/// Marks the facings of a shelf layer for recomputation.
pub fn facings_mark_dirty(shelf_layer_id: &str) -> String {
    format!("shelf_facings_mark_dirty({})", atom(shelf_layer_id))
}

// ----------------------------------------------------------------------------
// Articles
// ----------------------------------------------------------------------------

/// Holds if an article number exists for `dan`.
pub fn dan_exists(dan: &str) -> String {
    format!("article_number_of_dan({}, _)", atom(dan))
}

/// Creates an article number and an article type of the given size.
pub fn create_article(dan: &str, dimensions: [f64; 3]) -> String {
    format!(
        "create_article_number(dan({}),AN), create_article_type(AN,{},ProductType).",
        atom(dan),
        float_list(&dimensions)
    )
}

/// Collects every DAN with an article number into `DANS`.
pub const ALL_PRODUCT_DANS: &str = "findall(DAN, rdf_has(AN, shop:dan, literal(type(_, DAN))), DANS).";

/// Binds `X_num`, `Y_num` and `Z_num` to the size of an object class.
pub fn object_class_dimensions(object_class: &str) -> String {
    let c = atom(object_class);
    format!(
        "owl_class_properties({c},knowrob:depthOfObject, literal(type(_,X))), atom_number(X,X_num),\
         owl_class_properties({c},knowrob:widthOfObject, literal(type(_,Y))), atom_number(Y,Y_num),\
         owl_class_properties({c},knowrob:heightOfObject, literal(type(_,Z))), atom_number(Z,Z_num)."
    )
}

// ----------------------------------------------------------------------------
// Facings
// ----------------------------------------------------------------------------

/// Collects `[Facing, Pose]` pairs of a shelf layer into `Fs`.
pub fn facings_with_poses(shelf_layer_id: &str) -> String {
    format!(
        "findall([F, P], (shelf_facing({}, F),current_object_pose(F, P)), Fs).",
        atom(shelf_layer_id)
    )
}

/// Binds `Layer` to the shelf layer a facing belongs to.
pub fn facing_layer(facing_id: &str) -> String {
    format!("shelf_facing(Layer, {}).", atom(facing_id))
}

/// `comp_facingDepth`, `comp_facingHeight`, `comp_facingWidth`.
pub fn facing_measure(predicate: &str, facing_id: &str) -> String {
    format!(
        "{predicate}({}, literal(type(_, W_XSD))),atom_number(W_XSD,W)",
        atom(facing_id)
    )
}

/// Binds `L` and `R` to the separators bounding a facing.
pub fn facing_separators(facing_id: &str) -> String {
    let f = atom(facing_id);
    format!("rdf_has({f}, shop:leftSeparator, L), rdf_has({f}, shop:rightSeparator, R)")
}

/// Binds `P` to the product type a facing holds.
pub fn facing_product_type(facing_id: &str) -> String {
    format!("shelf_facing_product_type({}, P)", atom(facing_id))
}

/// Collects every facing without a product into `Fs`.
pub const ALL_EMPTY_FACINGS: &str = "findall(Facing, (entity(Facing, [a,location,[type,shop:product_facing]]),\\+holds(shop:productInFacing(Facing,_))),Fs)";

/// Collects the facings of a shelf layer without a product into `Fs`.
pub fn empty_facings_of_layer(shelf_layer_id: &str) -> String {
    format!(
        "findall(F, (shelf_facing({}, F), \\+holds(shop:productInFacing(F,_))),Fs)",
        atom(shelf_layer_id)
    )
}

/// Stores a confidence value on a facing.
pub fn assert_confidence(facing_id: &str, confidence: f64) -> String {
    format!(
        "rdf_assert({}, knowrob:confidence, literal(type(xsd:double, {})), belief_state).",
        atom(facing_id),
        atom(&float(confidence))
    )
}

/// Spawns a product into a facing, front to back.
pub fn spawn_product(facing_id: &str) -> String {
    format!("product_spawn_front_to_back({}, ObjId)", atom(facing_id))
}

// ----------------------------------------------------------------------------
// Labels
// ----------------------------------------------------------------------------

/// Collects `[Label, X]` pairs of a shelf layer into `Ls`.
pub fn labels_of_layer(shelf_layer_id: &str) -> String {
    let l = atom(shelf_layer_id);
    format!(
        "findall([L, X], (rdf_has({l}, knowrob:properPhysicalParts, L), \
         rdfs_individual_of(L, {BARCODE}), \
         belief_at_relative_to(L, {l}, [_,_,[X,_,_],_])), Ls)."
    )
}

/// Binds `DAN` to the article number a label carries.
pub fn label_dan(label_id: &str) -> String {
    format!(
        "rdf_has({}, shop:articleNumberOfLabel, _AN), rdf_has_prolog(_AN, shop:dan, DAN).",
        atom(label_id)
    )
}

/// Binds `Pos` and `Width` for a label and the layer holding it.
pub fn label_position(label_id: &str) -> String {
    let l = atom(label_id);
    format!(
        "rdf_has(_Layer, knowrob:properPhysicalParts, {l}), \
         rdfs_individual_of(_Layer, {SHELF_FLOOR}), \
         belief_at_relative_to({l}, _Layer, [_,_,[Pos,_,_],_]), \
         object_dimensions(_Layer, _, Width, _)."
    )
}

// ----------------------------------------------------------------------------
// Belief state and episodes
// ----------------------------------------------------------------------------

/// Exports the belief state to a directory.
pub fn mem_export(path: &str) -> String {
    format!("mem_export({})", atom(path))
}

/// Imports a belief state from a directory.
pub fn mem_import(path: &str) -> String {
    format!("mem_import({})", atom(path))
}

/// Forgets that the belief state file under `beliefstate_dir` was loaded.
pub fn retract_owl_file(beliefstate_dir: &str) -> String {
    format!(
        "retractall(owl_parser:owl_file_loaded({}))",
        atom(&format!("{beliefstate_dir}/beliefstate.owl"))
    )
}

/// Binds `Y` to the running episode.
pub const CURRENT_EPISODE: &str = "knowrob_memory:current_episode(Y)";
/// Stops the running episode, binding it to `E`.
pub const STOP_CURRENT_EPISODE: &str = "knowrob_memory:current_episode(E), mem_episode_stop(E)";
/// Starts an episode, binding it to `E`.
pub const START_EPISODE: &str = "mem_episode_start(E).";

/// Starts an episode from a stored belief state.
pub fn start_episode_from(path: &str) -> String {
    format!("mem_episode_start(E, [import:{}]).", atom(path))
}

/// Stops an episode.
pub fn stop_episode(episode_id: &str) -> String {
    format!("mem_episode_stop({}).", atom(episode_id))
}

/// Starts logging transforms into the episode.
pub const START_TF_LOGGING: &str = "ros_logger_start([['tf',[]]])";
/// Stops logging transforms.
pub const STOP_TF_LOGGING: &str = "ros_logger_stop.";
