//! Frame lookups.
//!
//! The transform tree itself lives in the middleware. The knowledge base
//! only asks "where is frame B in frame A right now", through
//! [`TransformLookup`].

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{KbError, KbResult};
use crate::geometry::{PoseStamped, Transform, TransformStamped};

/// Current-time lookups in the transform tree.
pub trait TransformLookup: Send + Sync {
    /// Transform taking coordinates in `source` into `target`.
    fn lookup_transform(&self, target: &str, source: &str) -> KbResult<TransformStamped>;

    /// Pose of `source`'s origin expressed in `target`.
    fn lookup_pose(&self, target: &str, source: &str) -> KbResult<PoseStamped> {
        Ok(self.lookup_transform(target, source)?.origin_pose())
    }

    /// Re-expresses `pose` in `target`.
    fn transform_pose(&self, target: &str, pose: &PoseStamped) -> KbResult<PoseStamped> {
        if pose.frame_id() == target {
            return Ok(pose.clone());
        }
        Ok(self.lookup_transform(target, pose.frame_id())?.apply(pose))
    }
}

impl<T: TransformLookup + ?Sized> TransformLookup for std::sync::Arc<T> {
    fn lookup_transform(&self, target: &str, source: &str) -> KbResult<TransformStamped> {
        (**self).lookup_transform(target, source)
    }
}

fn lock_err(context: &'static str) -> KbError {
    KbError::internal(format!("poisoned lock: {context}"))
}

/// A fixed table of transforms.
///
/// Registering `target <- source` also answers `source <- target`.
/// A frame is always at the identity in itself. Chains are not resolved;
/// register every pair that will be asked for.
#[derive(Debug, Default)]
pub struct StaticTransforms {
    table: RwLock<HashMap<(String, String), Transform>>,
}

impl StaticTransforms {
    /// Empty lookup; only identity transforms resolve.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the transform taking `source` coordinates into `target`.
    pub fn insert(&self, target: &str, source: &str, transform: Transform) -> KbResult<()> {
        let mut table = self.table.write().map_err(|_| lock_err("transform table"))?;
        table.insert((source.to_string(), target.to_string()), transform.inverse());
        table.insert((target.to_string(), source.to_string()), transform);
        Ok(())
    }

    /// Registers `frame` as placed at `pose` (in `pose`'s frame).
    pub fn insert_frame(&self, frame: &str, pose: &PoseStamped) -> KbResult<()> {
        self.insert(pose.frame_id(), frame, Transform::from_pose(&pose.pose))
    }

    /// Builder form of [`insert_frame`](Self::insert_frame).
    pub fn with_frame(self, frame: &str, pose: &PoseStamped) -> KbResult<Self> {
        self.insert_frame(frame, pose)?;
        Ok(self)
    }
}

impl TransformLookup for StaticTransforms {
    fn lookup_transform(&self, target: &str, source: &str) -> KbResult<TransformStamped> {
        if target == source {
            return Ok(TransformStamped::new(target, source, Transform::identity()));
        }
        let table = self.table.read().map_err(|_| lock_err("transform table"))?;
        table
            .get(&(target.to_string(), source.to_string()))
            .map(|t| TransformStamped::new(target, source, *t))
            .ok_or_else(|| KbError::Transform {
                target: target.to_string(),
                source_frame: source.to_string(),
                reason: "frame pair not registered".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Pose, Quaternion};
    use approx::assert_relative_eq;

    fn layer_in_map() -> PoseStamped {
        PoseStamped::new(
            "map",
            Pose::new(Point::new(2.0, 1.0, 0.4), Quaternion::identity()),
        )
    }

    #[test]
    fn test_identity_for_same_frame() {
        let tf = StaticTransforms::new();
        let p = tf.lookup_pose("map", "map").unwrap();
        assert_eq!(p.pose, Pose::default());
    }

    #[test]
    fn test_lookup_pose_of_registered_frame() {
        let tf = StaticTransforms::new()
            .with_frame("layer_1", &layer_in_map())
            .unwrap();
        let p = tf.lookup_pose("map", "layer_1").unwrap();
        assert_eq!(p.frame_id(), "map");
        assert_relative_eq!(p.pose.position.z, 0.4);
    }

    #[test]
    fn test_inverse_is_registered() {
        let tf = StaticTransforms::new();
        tf.insert_frame("layer_1", &layer_in_map()).unwrap();
        let in_layer = tf
            .transform_pose("layer_1", &PoseStamped::at("map", 2.5, 1.0, 0.45))
            .unwrap();
        assert_eq!(in_layer.frame_id(), "layer_1");
        assert_relative_eq!(in_layer.pose.position.x, 0.5, epsilon = 1e-12);
        assert_relative_eq!(in_layer.pose.position.z, 0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_unknown_pair_errors() {
        let tf = StaticTransforms::new();
        let err = tf.lookup_transform("map", "nowhere").unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_poisoned_table_is_reported_by_both_builders() {
        let tf = StaticTransforms::new();
        std::thread::scope(|s| {
            let _ = s
                .spawn(|| {
                    let _table = tf.table.write().unwrap();
                    panic!("transform table poisoned");
                })
                .join();
        });
        assert!(tf.insert_frame("layer_1", &layer_in_map()).is_err());
        assert!(tf.with_frame("layer_1", &layer_in_map()).is_err());
    }

    #[test]
    fn test_transform_pose_same_frame_is_noop() {
        let tf = StaticTransforms::new();
        let p = PoseStamped::at("map", 1.0, 2.0, 3.0);
        assert_eq!(tf.transform_pose("map", &p).unwrap(), p);
    }
}
