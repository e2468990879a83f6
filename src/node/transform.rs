// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Node transforms (translation, rotation, scale)

use nalgebra::{Matrix3, Matrix4, Point3, Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
    pub scale: Vector3<f64>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self {
            translation,
            ..Self::identity()
        }
    }

    /// Decompose an affine matrix into translation, rotation and scale.
    /// Shear is lost; mirrored matrices get a negative X scale.
    pub fn from_matrix(m: &Matrix4<f64>) -> Self {
        let translation = Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);
        let linear: Matrix3<f64> = m.fixed_view::<3, 3>(0, 0).into_owned();
        let mut scale = Vector3::new(
            linear.column(0).norm(),
            linear.column(1).norm(),
            linear.column(2).norm(),
        );
        if linear.determinant() < 0.0 {
            scale.x = -scale.x;
        }
        let mut basis = linear;
        for i in 0..3 {
            if scale[i].abs() > 1e-12 {
                let column = basis.column(i) / scale[i];
                basis.set_column(i, &column);
            }
        }
        let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix(&basis));
        Self {
            translation,
            rotation,
            scale,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.translation == Vector3::zeros()
            && self.rotation == UnitQuaternion::identity()
            && self.has_unit_scale()
    }

    pub fn has_unit_scale(&self) -> bool {
        (self.scale - Vector3::new(1.0, 1.0, 1.0)).amax() < 1e-9
    }

    /// Scale, then rotate, then translate
    pub fn to_matrix(&self) -> Matrix4<f64> {
        Matrix4::new_translation(&self.translation)
            * self.rotation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&self.scale)
    }

    pub fn transform_point(&self, p: &Point3<f64>) -> Point3<f64> {
        self.to_matrix().transform_point(p)
    }

    pub fn translate(&mut self, v: Vector3<f64>) {
        self.translation += v;
    }

    /// Rotate by Euler angles (radians, roll/pitch/yaw about X/Y/Z)
    pub fn rotate_euler(&mut self, angles: Vector3<f64>) {
        self.rotate(UnitQuaternion::from_euler_angles(angles.x, angles.y, angles.z));
    }

    /// Apply a rotation after the current transform
    pub fn rotate(&mut self, q: UnitQuaternion<f64>) {
        self.rotation = q * self.rotation;
        self.translation = q * self.translation;
    }

    pub fn scale_by(&mut self, s: Vector3<f64>) {
        self.scale.component_mul_assign(&s);
        self.translation.component_mul_assign(&s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_matrix_order() {
        let mut t = Transform::identity();
        t.scale_by(Vector3::new(2.0, 2.0, 2.0));
        t.rotate_euler(Vector3::new(0.0, 0.0, FRAC_PI_2));
        t.translate(Vector3::new(10.0, 0.0, 0.0));
        let p = t.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert!((p - Point3::new(10.0, 2.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn test_from_matrix_round_trip() {
        let mut t = Transform::identity();
        t.scale_by(Vector3::new(2.0, 3.0, 1.0));
        t.rotate_euler(Vector3::new(0.0, 0.0, 0.7));
        t.translate(Vector3::new(1.0, -2.0, 5.0));
        let back = Transform::from_matrix(&t.to_matrix());
        assert!((back.to_matrix() - t.to_matrix()).amax() < 1e-9);
        assert!((back.scale - Vector3::new(2.0, 3.0, 1.0)).amax() < 1e-9);
    }

    #[test]
    fn test_identity() {
        assert!(Transform::default().is_identity());
        let mut t = Transform::identity();
        t.scale_by(Vector3::new(1.0, 2.0, 1.0));
        assert!(!t.has_unit_scale());
    }
}
