use nalgebra::{Matrix3, Matrix4, Rotation3, Translation3, Unit, Vector3};

use crate::model::Transform;

// origin (xyz + rpy) -> homogeneous transform
// rotation is fixed-axis x, then y, then z; translation is applied after it
pub fn from_xyz_rpy(xyz: &Vector3<f64>, rpy: &Vector3<f64>) -> Transform {
    let rotation = Rotation3::from_euler_angles(rpy.x, rpy.y, rpy.z);
    Translation3::from(*xyz).to_homogeneous() * rotation.to_homogeneous()
}

/// Splits a rigid transform back into translation and roll-pitch-yaw.
pub fn to_xyz_rpy(transform: &Transform) -> (Vector3<f64>, Vector3<f64>) {
    let xyz = Vector3::new(transform[(0, 3)], transform[(1, 3)], transform[(2, 3)]);
    let rotation: Matrix3<f64> = transform.fixed_view::<3, 3>(0, 0).into_owned();
    let (roll, pitch, yaw) = Rotation3::from_matrix_unchecked(rotation).euler_angles();
    (xyz, Vector3::new(roll, pitch, yaw))
}

pub fn translation(offset: &Vector3<f64>) -> Transform {
    Translation3::from(*offset).to_homogeneous()
}

/// Rotation about `axis` by `angle`. A zero axis yields the identity.
pub fn rotation(axis: &Vector3<f64>, angle: f64) -> Transform {
    match Unit::try_new(*axis, f64::EPSILON) {
        Some(axis) => Rotation3::from_axis_angle(&axis, angle).to_homogeneous(),
        None => Matrix4::identity(),
    }
}

pub fn is_identity(transform: &Transform) -> bool {
    *transform == Matrix4::identity()
}
