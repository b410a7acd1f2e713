//! Geometry types exchanged with perception and the reasoner.
//!
//! These mirror the middleware's `geometry_msgs` shapes so that via-points
//! in the layout file can be written in the usual dictionary form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::KbError;
use crate::term::{unexpected, Term};

/// A point (or vector) in 3-D space, in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Meters along x.
    #[serde(default)]
    pub x: f64,
    /// Meters along y.
    #[serde(default)]
    pub y: f64,
    /// Meters along z.
    #[serde(default)]
    pub z: f64,
}

impl Point {
    /// Point at `(x, y, z)`.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// `[x, y, z]`.
    pub const fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Component-wise sum.
    #[must_use]
    pub fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    /// Every component multiplied by `k`.
    #[must_use]
    pub fn scale(self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k, self.z * k)
    }
}

/// A rotation quaternion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    /// Vector part, x.
    #[serde(default)]
    pub x: f64,
    /// Vector part, y.
    #[serde(default)]
    pub y: f64,
    /// Vector part, z.
    #[serde(default)]
    pub z: f64,
    /// Scalar part.
    #[serde(default = "one")]
    pub w: f64,
}

const fn one() -> f64 {
    1.0
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl Quaternion {
    /// Quaternion from its components, not normalized.
    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// No rotation.
    pub const fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }

    /// Rotation of `angle` radians about the z axis.
    pub fn from_yaw(angle: f64) -> Self {
        let half = angle / 2.0;
        Self::new(0.0, 0.0, half.sin(), half.cos())
    }

    /// `[x, y, z, w]`.
    pub const fn to_array(self) -> [f64; 4] {
        [self.x, self.y, self.z, self.w]
    }

    /// Euclidean length.
    pub fn norm(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }

    /// Unit-length copy; a zero quaternion becomes the identity.
    #[must_use]
    pub fn normalized(self) -> Self {
        let n = self.norm();
        if n <= f64::EPSILON || !n.is_finite() {
            return Self::identity();
        }
        Self::new(self.x / n, self.y / n, self.z / n, self.w / n)
    }

    /// Inverse rotation of a unit quaternion.
    #[must_use]
    pub const fn conjugate(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    /// Hamilton product `self * other`.
    #[must_use]
    pub fn mul(self, o: Self) -> Self {
        Self::new(
            self.w * o.x + self.x * o.w + self.y * o.z - self.z * o.y,
            self.w * o.y - self.x * o.z + self.y * o.w + self.z * o.x,
            self.w * o.z + self.x * o.y - self.y * o.x + self.z * o.w,
            self.w * o.w - self.x * o.x - self.y * o.y - self.z * o.z,
        )
    }

    /// Rotates a vector by this (unit) quaternion.
    #[must_use]
    pub fn rotate(self, v: Point) -> Point {
        // v' = v + 2w(q x v) + 2 q x (q x v)
        let q = Point::new(self.x, self.y, self.z);
        let t = cross(q, v).scale(2.0);
        v.add(t.scale(self.w)).add(cross(q, t))
    }
}

fn cross(a: Point, b: Point) -> Point {
    Point::new(
        a.y * b.z - a.z * b.y,
        a.z * b.x - a.x * b.z,
        a.x * b.y - a.y * b.x,
    )
}

/// Position and orientation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Origin, in meters.
    #[serde(default)]
    pub position: Point,
    /// Rotation relative to the reference frame.
    #[serde(default)]
    pub orientation: Quaternion,
}

impl Pose {
    /// Pose from its parts.
    pub const fn new(position: Point, orientation: Quaternion) -> Self {
        Self { position, orientation }
    }
}

/// Frame and time a pose or transform refers to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Reference frame.
    #[serde(default)]
    pub frame_id: String,
    /// Time of the measurement.
    #[serde(default = "Utc::now")]
    pub stamp: DateTime<Utc>,
}

impl Header {
    /// Header for `frame_id` stamped now.
    pub fn new(frame_id: impl Into<String>) -> Self {
        Self {
            frame_id: frame_id.into(),
            stamp: Utc::now(),
        }
    }
}

/// A pose expressed in a named frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseStamped {
    /// Frame the pose is expressed in.
    pub header: Header,
    /// The pose itself.
    #[serde(default)]
    pub pose: Pose,
}

impl PoseStamped {
    /// Pose in `frame_id`, stamped now.
    pub fn new(frame_id: impl Into<String>, pose: Pose) -> Self {
        Self {
            header: Header::new(frame_id),
            pose,
        }
    }

    /// Position-only pose with identity orientation.
    pub fn at(frame_id: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self::new(frame_id, Pose::new(Point::new(x, y, z), Quaternion::identity()))
    }

    /// Reference frame of the pose.
    pub fn frame_id(&self) -> &str {
        &self.header.frame_id
    }

    /// Parses the reasoner's pose list `[Frame, _, [X,Y,Z], [QX,QY,QZ,QW]]`.
    pub fn from_term(term: &Term) -> Result<Self, KbError> {
        let items = term
            .as_list()
            .filter(|items| items.len() == 4)
            .ok_or_else(|| unexpected("Pose", "pose list", term))?;
        let frame = items[0]
            .as_atom()
            .ok_or_else(|| unexpected("Pose", "frame atom", &items[0]))?;
        let [x, y, z] = numbers::<3>(&items[2])?;
        let [qx, qy, qz, qw] = numbers::<4>(&items[3])?;
        Ok(Self::new(
            frame,
            Pose::new(Point::new(x, y, z), Quaternion::new(qx, qy, qz, qw)),
        ))
    }
}

fn numbers<const N: usize>(term: &Term) -> Result<[f64; N], KbError> {
    let items = term
        .as_list()
        .filter(|items| items.len() == N)
        .ok_or_else(|| unexpected("Pose", "number list", term))?;
    let mut out = [0.0; N];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = item
            .as_f64()
            .ok_or_else(|| unexpected("Pose", "number", item))?;
    }
    Ok(out)
}

/// A rigid transform: rotate, then translate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Translation, applied after the rotation.
    pub translation: Point,
    /// Rotation.
    pub rotation: Quaternion,
}

impl Transform {
    /// Transform from its parts.
    pub const fn new(translation: Point, rotation: Quaternion) -> Self {
        Self { translation, rotation }
    }

    /// Transform that changes nothing.
    pub const fn identity() -> Self {
        Self::new(Point::new(0.0, 0.0, 0.0), Quaternion::identity())
    }

    /// Transform that places a frame at `pose`.
    pub const fn from_pose(pose: &Pose) -> Self {
        Self::new(pose.position, pose.orientation)
    }

    /// Pose of the transformed frame's origin.
    pub const fn to_pose(&self) -> Pose {
        Pose::new(self.translation, self.rotation)
    }

    /// Transform undoing this one.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let r = self.rotation.normalized().conjugate();
        Self::new(r.rotate(self.translation).scale(-1.0), r)
    }

    /// `self ∘ other`: apply `other` first, then `self`.
    #[must_use]
    pub fn compose(&self, other: &Self) -> Self {
        Self::new(
            self.rotation.rotate(other.translation).add(self.translation),
            self.rotation.mul(other.rotation).normalized(),
        )
    }

    /// Moves a pose by this transform.
    pub fn apply_pose(&self, pose: &Pose) -> Pose {
        Pose::new(
            self.rotation.rotate(pose.position).add(self.translation),
            self.rotation.mul(pose.orientation).normalized(),
        )
    }
}

/// A transform from `child_frame_id` into `header.frame_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformStamped {
    /// Target frame.
    pub header: Header,
    /// Source frame.
    pub child_frame_id: String,
    /// Transform taking source coordinates into the target frame.
    pub transform: Transform,
}

impl TransformStamped {
    /// Transform from `child_frame_id` into `frame_id`, stamped now.
    pub fn new(
        frame_id: impl Into<String>,
        child_frame_id: impl Into<String>,
        transform: Transform,
    ) -> Self {
        Self {
            header: Header::new(frame_id),
            child_frame_id: child_frame_id.into(),
            transform,
        }
    }

    /// Re-expresses `pose` in this transform's target frame.
    ///
    /// The pose's own frame is not checked; the caller picked the transform.
    pub fn apply(&self, pose: &PoseStamped) -> PoseStamped {
        PoseStamped {
            header: Header {
                frame_id: self.header.frame_id.clone(),
                stamp: self.header.stamp,
            },
            pose: self.transform.apply_pose(&pose.pose),
        }
    }

    /// The child frame's origin, expressed in the target frame.
    pub fn origin_pose(&self) -> PoseStamped {
        PoseStamped {
            header: self.header.clone(),
            pose: self.transform.to_pose(),
        }
    }
}

impl From<&TransformStamped> for PoseStamped {
    fn from(t: &TransformStamped) -> Self {
        t.origin_pose()
    }
}
