//! Kinematics solver seam and a Stewart-platform implementation.
//!
//! The playback loop only sees [`KinematicsSolver`]; any closure of the right
//! shape works, which is how tests count and fail solver calls.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::codec::{ActuatorLengths, ACTUATORS};
use crate::error::{Result, RigError};
use crate::transform::{rotation_from_euler, Command};

/// Resolves a pose command into six actuator lengths.
///
/// Implementations must be deterministic and free of side effects that the
/// playback loop would need to undo.
pub trait KinematicsSolver: Send + Sync {
    fn solve(&self, command: &Command) -> Result<ActuatorLengths>;
}

impl<F> KinematicsSolver for F
where
    F: Fn(&Command) -> Result<ActuatorLengths> + Send + Sync,
{
    fn solve(&self, command: &Command) -> Result<ActuatorLengths> {
        self(command)
    }
}

/// Anchor layout of a 6-6 Stewart platform.
///
/// Anchors come in three pairs spaced 120° apart. Within a pair the two anchors
/// sit `half_angle` either side of the pair's center, on both base and
/// platform; leg `i` joins base anchor `i` to platform anchor `i`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StewartGeometry {
    /// Meters.
    pub base_radius: f64,
    pub platform_radius: f64,
    /// Degrees.
    pub base_half_angle: f64,
    pub platform_half_angle: f64,
    /// Leg length with the platform at its home pose.
    pub home_leg_length: f64,
    /// Stroke limits; lengths outside are unreachable.
    pub min_leg_length: f64,
    pub max_leg_length: f64,
}

impl Default for StewartGeometry {
    fn default() -> Self {
        Self {
            base_radius: 0.12,
            platform_radius: 0.08,
            base_half_angle: 10.0,
            platform_half_angle: 50.0,
            home_leg_length: 0.1569,
            min_leg_length: 0.10,
            max_leg_length: 0.25,
        }
    }
}

fn anchor(radius: f64, pair_half_angle: f64, leg: usize) -> Vector3<f64> {
    let center = 120.0 * (leg / 2) as f64;
    let offset = if leg % 2 == 0 {
        -pair_half_angle
    } else {
        pair_half_angle
    };
    let angle = (center + offset).to_radians();
    Vector3::new(radius * angle.cos(), radius * angle.sin(), 0.0)
}

/// Inverse kinematics for a Stewart platform: `leg = |t + R·p - b|`.
#[derive(Clone, Debug)]
pub struct StewartSolver {
    geometry: StewartGeometry,
    base: [Vector3<f64>; ACTUATORS],
    platform: [Vector3<f64>; ACTUATORS],
    home_height: f64,
}

impl StewartSolver {
    pub fn new(geometry: StewartGeometry) -> Result<Self> {
        let g = &geometry;
        if g.base_radius <= 0.0 || g.platform_radius <= 0.0 {
            return Err(RigError::Config("platform radii must be positive".into()));
        }
        if g.min_leg_length >= g.max_leg_length {
            return Err(RigError::Config(format!(
                "min_leg_length {} must be below max_leg_length {}",
                g.min_leg_length, g.max_leg_length
            )));
        }

        let base = std::array::from_fn(|i| anchor(g.base_radius, g.base_half_angle, i));
        let platform = std::array::from_fn(|i| anchor(g.platform_radius, g.platform_half_angle, i));

        // All legs share the same horizontal span at home by symmetry.
        let span: Vector3<f64> = platform[0] - base[0];
        let span = span.norm();
        if g.home_leg_length <= span {
            return Err(RigError::Config(format!(
                "home_leg_length {} must exceed the horizontal anchor span {:.4}",
                g.home_leg_length, span
            )));
        }
        let home_height = (g.home_leg_length.powi(2) - span.powi(2)).sqrt();

        Ok(Self {
            geometry,
            base,
            platform,
            home_height,
        })
    }

    pub fn geometry(&self) -> &StewartGeometry {
        &self.geometry
    }

    /// Platform height above the base plane at the home pose.
    pub fn home_height(&self) -> f64 {
        self.home_height
    }
}

impl KinematicsSolver for StewartSolver {
    fn solve(&self, command: &Command) -> Result<ActuatorLengths> {
        let rotation = rotation_from_euler(command.roll, command.pitch, command.yaw);
        let translation = Vector3::new(command.x, command.y, command.z + self.home_height);

        let mut lengths = [0.0; ACTUATORS];
        for (i, length) in lengths.iter_mut().enumerate() {
            let leg = translation + rotation * self.platform[i] - self.base[i];
            let l = leg.norm();
            if !l.is_finite() {
                return Err(RigError::solver(format!("leg {} is not finite", i + 1)));
            }
            if l < self.geometry.min_leg_length || l > self.geometry.max_leg_length {
                return Err(RigError::solver(format!(
                    "leg {} length {:.4} outside stroke [{}, {}]",
                    i + 1,
                    l,
                    self.geometry.min_leg_length,
                    self.geometry.max_leg_length
                )));
            }
            *length = l;
        }
        Ok(ActuatorLengths(lengths))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn solver() -> StewartSolver {
        StewartSolver::new(StewartGeometry::default()).unwrap()
    }

    #[test]
    fn test_home_pose_is_uniform() {
        let lengths = solver().solve(&Command::zero()).unwrap();
        for l in lengths.0 {
            assert_relative_eq!(l, 0.1569, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_heave_extends_all_legs_equally() {
        let lengths = solver()
            .solve(&Command::from_array([0.0, 0.0, 0.0, 0.0, 0.0, 0.01]))
            .unwrap();
        for l in lengths.0 {
            assert!(l > 0.1569);
            assert_relative_eq!(l, lengths.0[0], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_roll_tilts_legs() {
        let lengths = solver()
            .solve(&Command::from_array([5.0, 0.0, 0.0, 0.0, 0.0, 0.0]))
            .unwrap();
        let min = lengths.0.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = lengths.0.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!(max - min > 1e-3);
    }

    #[test]
    fn test_unreachable_pose() {
        let err = solver()
            .solve(&Command::from_array([0.0, 0.0, 0.0, 0.0, 0.0, 0.5]))
            .unwrap_err();
        assert!(matches!(err, RigError::Solver(_)));
    }

    #[test]
    fn test_invalid_geometry() {
        let g = StewartGeometry {
            home_leg_length: 0.01,
            ..Default::default()
        };
        assert!(matches!(StewartSolver::new(g), Err(RigError::Config(_))));
    }

    #[test]
    fn test_closure_solver() {
        let s = |cmd: &Command| -> Result<ActuatorLengths> { Ok(ActuatorLengths::uniform(cmd.z)) };
        let out = s
            .solve(&Command::from_array([0.0, 0.0, 0.0, 0.0, 0.0, 0.2]))
            .unwrap();
        assert_eq!(out, ActuatorLengths::uniform(0.2));
    }
}
