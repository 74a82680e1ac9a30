//! Pose transform: recorded 4x4 frames to rig commands.
//!
//! A frame is combined with its trajectory's reference frame as
//! `reference⁻¹ · frame`, so the command is the pose offset expressed in the
//! reference's coordinate system. Rotation is decomposed as ZYX Euler angles
//! (`R = Rz(yaw) · Ry(pitch) · Rx(roll)`) in degrees, translation is divided by
//! the configured unit divisor (recorded millimeters to meters by default).

use nalgebra::{Matrix3, Matrix4, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RigError};

/// Distance from ±1 at which `r20` is treated as gimbal lock.
const GIMBAL_EPSILON: f64 = 1e-9;

/// One sampled 4x4 homogeneous pose.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frame(Matrix4<f64>);

impl Frame {
    pub fn identity() -> Self {
        Self(Matrix4::identity())
    }

    pub fn from_matrix(m: Matrix4<f64>) -> Self {
        Self(m)
    }

    /// Build a frame from row-major nested rows. Must be exactly 4x4.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        if rows.len() != 4 {
            return Err(RigError::Dimension {
                expected: 4,
                actual: rows.len(),
            });
        }
        let mut m = Matrix4::zeros();
        for (r, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != 4 {
                return Err(RigError::Dimension {
                    expected: 4,
                    actual: row.len(),
                });
            }
            for (c, &v) in row.iter().enumerate() {
                m[(r, c)] = v;
            }
        }
        Ok(Self(m))
    }

    /// Frame from a rotation and a translation (in recorded units).
    pub fn from_parts(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation);
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&translation);
        Self(m)
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.0
    }

    pub fn rotation(&self) -> Matrix3<f64> {
        self.0.fixed_view::<3, 3>(0, 0).into_owned()
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.0.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// Rigid-body inverse `[Rᵀ | -Rᵀt]`.
    fn rigid_inverse(&self) -> Self {
        let rt = self.rotation().transpose();
        Self::from_parts(rt, -(rt * self.translation()))
    }
}

/// A pose delta handed to the kinematics solver.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Command {
    /// Degrees.
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    /// Meters.
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Command {
    pub fn zero() -> Self {
        Self::default()
    }

    /// `[roll, pitch, yaw, x, y, z]`
    pub fn from_array(v: [f64; 6]) -> Self {
        Self {
            roll: v[0],
            pitch: v[1],
            yaw: v[2],
            x: v[3],
            y: v[4],
            z: v[5],
        }
    }

    pub fn from_slice(v: &[f64]) -> Result<Self> {
        let arr: [f64; 6] = v.try_into().map_err(|_| RigError::Dimension {
            expected: 6,
            actual: v.len(),
        })?;
        Ok(Self::from_array(arr))
    }

    pub fn to_array(&self) -> [f64; 6] {
        [self.roll, self.pitch, self.yaw, self.x, self.y, self.z]
    }
}

/// Transform tuning.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Recorded translation units per meter.
    pub unit_divisor: f64,
    /// Max deviation of `RᵀR` from identity (and of det from 1).
    pub orthonormal_tolerance: f64,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            unit_divisor: 1000.0,
            orthonormal_tolerance: 1e-3,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PoseTransform {
    config: TransformConfig,
}

impl PoseTransform {
    pub fn new(config: TransformConfig) -> Result<Self> {
        if !(config.unit_divisor.is_finite() && config.unit_divisor > 0.0) {
            return Err(RigError::Config(format!(
                "unit_divisor must be positive, got {}",
                config.unit_divisor
            )));
        }
        Ok(Self { config })
    }

    /// Check that a frame is a rigid transform within tolerance.
    pub fn validate(&self, frame: &Frame) -> Result<()> {
        let m = frame.matrix();
        if m.iter().any(|v| !v.is_finite()) {
            return Err(RigError::degenerate("frame contains non-finite values"));
        }

        let tol = self.config.orthonormal_tolerance;
        let bottom = [m[(3, 0)], m[(3, 1)], m[(3, 2)], m[(3, 3)] - 1.0];
        if bottom.iter().any(|v| v.abs() > tol) {
            return Err(RigError::degenerate(format!(
                "homogeneous row is [{}, {}, {}, {}]",
                m[(3, 0)],
                m[(3, 1)],
                m[(3, 2)],
                m[(3, 3)]
            )));
        }

        let r = frame.rotation();
        let deviation = (r.transpose() * r - Matrix3::identity()).amax();
        if deviation > tol {
            return Err(RigError::degenerate(format!(
                "rotation is not orthonormal (deviation {:.3e})",
                deviation
            )));
        }
        let det = r.determinant();
        if (det - 1.0).abs() > tol {
            return Err(RigError::degenerate(format!(
                "rotation determinant is {:.6}",
                det
            )));
        }
        Ok(())
    }

    /// Command for `frame` relative to `reference`.
    pub fn relative_command(&self, frame: &Frame, reference: &Frame) -> Result<Command> {
        self.validate(frame)?;
        self.validate(reference)?;

        let delta = reference.rigid_inverse().0 * frame.0;
        let delta = Frame(delta);
        let (roll, pitch, yaw) = euler_from_rotation(&delta.rotation());
        let t = delta.translation() / self.config.unit_divisor;

        Ok(Command {
            roll,
            pitch,
            yaw,
            x: t.x,
            y: t.y,
            z: t.z,
        })
    }
}

/// ZYX Euler angles `(roll, pitch, yaw)` in degrees.
///
/// At gimbal lock (`r20 = ±1`) yaw is not observable and is reported as 0,
/// with the whole rotation about the locked axis assigned to roll.
pub fn euler_from_rotation(r: &Matrix3<f64>) -> (f64, f64, f64) {
    let r20 = r[(2, 0)];

    let (roll, pitch, yaw) = if (r20.abs() - 1.0).abs() < GIMBAL_EPSILON {
        let pitch = -r20.signum() * std::f64::consts::FRAC_PI_2;
        let roll = (-r[(1, 2)]).atan2(r[(1, 1)]);
        (roll, pitch, 0.0)
    } else {
        let roll = r[(2, 1)].atan2(r[(2, 2)]);
        let pitch = (-r20).clamp(-1.0, 1.0).asin();
        let yaw = r[(1, 0)].atan2(r[(0, 0)]);
        (roll, pitch, yaw)
    };

    (roll.to_degrees(), pitch.to_degrees(), yaw.to_degrees())
}

/// Inverse of [`euler_from_rotation`].
pub fn rotation_from_euler(roll: f64, pitch: f64, yaw: f64) -> Matrix3<f64> {
    nalgebra::Rotation3::from_euler_angles(roll.to_radians(), pitch.to_radians(), yaw.to_radians())
        .into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn transform() -> PoseTransform {
        PoseTransform::default()
    }

    fn pose(roll: f64, pitch: f64, yaw: f64, t: [f64; 3]) -> Frame {
        Frame::from_parts(
            rotation_from_euler(roll, pitch, yaw),
            Vector3::new(t[0], t[1], t[2]),
        )
    }

    #[test]
    fn test_identity_is_zero_command() {
        let cmd = transform()
            .relative_command(&Frame::identity(), &Frame::identity())
            .unwrap();
        assert_eq!(cmd.to_array(), [0.0; 6]);
    }

    #[test]
    fn test_translation_in_meters() {
        let frame = pose(0.0, 0.0, 0.0, [100.0, -20.0, 5.0]);
        let cmd = transform()
            .relative_command(&frame, &Frame::identity())
            .unwrap();
        assert_relative_eq!(cmd.x, 0.1, epsilon = 1e-12);
        assert_relative_eq!(cmd.y, -0.02, epsilon = 1e-12);
        assert_relative_eq!(cmd.z, 0.005, epsilon = 1e-12);
    }

    #[test]
    fn test_relative_to_reference() {
        // Reference yawed 90° and shifted; frame is a further 10° roll and a
        // 10 mm step along the reference's own x axis.
        let reference = pose(0.0, 0.0, 90.0, [50.0, 0.0, 0.0]);
        let frame = Frame::from_matrix(reference.matrix() * pose(10.0, 0.0, 0.0, [10.0, 0.0, 0.0]).matrix());

        let cmd = transform().relative_command(&frame, &reference).unwrap();
        assert_relative_eq!(cmd.roll, 10.0, epsilon = 1e-9);
        assert_relative_eq!(cmd.pitch, 0.0, epsilon = 1e-9);
        assert_relative_eq!(cmd.yaw, 0.0, epsilon = 1e-9);
        assert_relative_eq!(cmd.x, 0.01, epsilon = 1e-12);
        assert_relative_eq!(cmd.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_custom_unit_divisor() {
        let t = PoseTransform::new(TransformConfig {
            unit_divisor: 100.0,
            ..Default::default()
        })
        .unwrap();
        let cmd = t
            .relative_command(&pose(0.0, 0.0, 0.0, [0.0, 0.0, 250.0]), &Frame::identity())
            .unwrap();
        assert_relative_eq!(cmd.z, 2.5, epsilon = 1e-12);
        assert!(PoseTransform::new(TransformConfig {
            unit_divisor: 0.0,
            ..Default::default()
        })
        .is_err());
    }

    #[test]
    fn test_gimbal_lock() {
        for (pitch, roll) in [(90.0, 30.0), (-90.0, -45.0)] {
            let r = rotation_from_euler(roll, pitch, 0.0);
            let (roll_out, pitch_out, yaw_out) = euler_from_rotation(&r);
            assert_relative_eq!(pitch_out, pitch, epsilon = 1e-6);
            assert_eq!(yaw_out, 0.0);
            assert_relative_eq!(roll_out, roll, epsilon = 1e-6);
        }

        // Exact boundary matrix: r20 = -1.
        let r = Matrix3::new(0.0, 0.0, 1.0, 0.0, 1.0, 0.0, -1.0, 0.0, 0.0);
        let (roll, pitch, yaw) = euler_from_rotation(&r);
        assert_eq!(pitch, 90.0);
        assert_eq!(yaw, 0.0);
        assert_relative_eq!(roll, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_frames() {
        let mut m = Matrix4::identity();
        m[(0, 0)] = 2.0;
        let err = transform()
            .relative_command(&Frame::from_matrix(m), &Frame::identity())
            .unwrap_err();
        assert!(matches!(err, RigError::DegenerateFrame(_)));

        // Reflection: orthonormal but det = -1.
        let mut m = Matrix4::identity();
        m[(2, 2)] = -1.0;
        assert!(transform().validate(&Frame::from_matrix(m)).is_err());

        let mut m = Matrix4::identity();
        m[(3, 0)] = 1.0;
        assert!(transform().validate(&Frame::from_matrix(m)).is_err());

        let mut m = Matrix4::identity();
        m[(1, 3)] = f64::NAN;
        assert!(transform().validate(&Frame::from_matrix(m)).is_err());

        // Degenerate reference is caught too.
        let err = transform()
            .relative_command(&Frame::identity(), &Frame::from_matrix(Matrix4::zeros()))
            .unwrap_err();
        assert!(matches!(err, RigError::DegenerateFrame(_)));
    }

    #[test]
    fn test_from_rows_dimensions() {
        let ok = Frame::from_rows(&[
            vec![1.0, 0.0, 0.0, 1.0],
            vec![0.0, 1.0, 0.0, 2.0],
            vec![0.0, 0.0, 1.0, 3.0],
            vec![0.0, 0.0, 0.0, 1.0],
        ])
        .unwrap();
        assert_eq!(ok.translation(), Vector3::new(1.0, 2.0, 3.0));

        let err = Frame::from_rows(&[vec![1.0; 4], vec![1.0; 4], vec![1.0; 4]]).unwrap_err();
        assert!(matches!(err, RigError::Dimension { expected: 4, actual: 3 }));

        let err = Frame::from_rows(&[vec![1.0; 4], vec![1.0; 3], vec![1.0; 4], vec![1.0; 4]])
            .unwrap_err();
        assert!(matches!(err, RigError::Dimension { expected: 4, actual: 3 }));
    }

    #[test]
    fn test_command_from_slice() {
        let cmd = Command::from_slice(&[1.0, 2.0, 3.0, 0.1, 0.2, 0.3]).unwrap();
        assert_eq!(cmd.yaw, 3.0);
        assert_eq!(cmd.z, 0.3);
        assert!(matches!(
            Command::from_slice(&[1.0, 2.0]),
            Err(RigError::Dimension { expected: 6, actual: 2 })
        ));
    }

    proptest! {
        #[test]
        fn euler_round_trip(
            roll in -179.0..179.0f64,
            pitch in -89.0..89.0f64,
            yaw in -179.0..179.0f64,
        ) {
            let r = rotation_from_euler(roll, pitch, yaw);
            let (a, b, c) = euler_from_rotation(&r);
            let rebuilt = rotation_from_euler(a, b, c);
            prop_assert!((rebuilt - r).amax() < 1e-9);
        }

        #[test]
        fn euler_round_trip_at_gimbal_lock(
            roll in -179.0..179.0f64,
            yaw in -179.0..179.0f64,
            up in any::<bool>(),
        ) {
            let pitch = if up { 90.0 } else { -90.0 };
            let r = rotation_from_euler(roll, pitch, yaw);
            let (a, b, c) = euler_from_rotation(&r);
            prop_assert_eq!(c, 0.0);
            let rebuilt = rotation_from_euler(a, b, c);
            prop_assert!((rebuilt - r).amax() < 1e-6);
        }
    }
}
