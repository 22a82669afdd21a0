//! Lead projection - dipole geometry to per-lead weights ("dot factors").
//!
//! Every path is treated as a current dipole pointing from its source node to
//! its target node. The dipole is rotated into the torso frame by a fixed
//! heart-axis rotation and observed from nine virtual electrodes:
//!
//! ```text
//!          RA ●─────────────● LA          V1..V6 across the precordium
//!              \    ♥      /
//!               \         /               potential(e) = (d̂ · r̂) / |r|²
//!                \       /                 d̂ = rotated unit dipole
//!                 ● LL  /                  r = electrode - rotated source
//! ```
//!
//! Electrode potentials are combined into the twelve standard leads:
//! Einthoven (I, II, III), Goldberger (aVR, aVL, aVF) and the precordial
//! leads referenced to Wilson's central terminal.
//!
//! Anatomy is static, so weights are computed once per path and cached.

use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// Number of output leads.
pub const LEAD_COUNT: usize = 12;

/// Scale applied to raw inverse-square potentials so lead values land in mV.
pub const LEAD_GAIN: f64 = 400.0;

/// Heart-axis rotation (roll, pitch, yaw) in radians.
pub const HEART_AXIS_EULER: [f64; 3] = [0.20, -0.30, 0.35];

/// An electrocardiographic output lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Lead {
    I,
    II,
    III,
    #[serde(rename = "aVR")]
    AVR,
    #[serde(rename = "aVL")]
    AVL,
    #[serde(rename = "aVF")]
    AVF,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
}

impl Lead {
    /// All leads in display order.
    pub const ALL: [Lead; LEAD_COUNT] = [
        Lead::I,
        Lead::II,
        Lead::III,
        Lead::AVR,
        Lead::AVL,
        Lead::AVF,
        Lead::V1,
        Lead::V2,
        Lead::V3,
        Lead::V4,
        Lead::V5,
        Lead::V6,
    ];

    /// Position in [`Lead::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Conventional lead label.
    pub fn name(self) -> &'static str {
        match self {
            Lead::I => "I",
            Lead::II => "II",
            Lead::III => "III",
            Lead::AVR => "aVR",
            Lead::AVL => "aVL",
            Lead::AVF => "aVF",
            Lead::V1 => "V1",
            Lead::V2 => "V2",
            Lead::V3 => "V3",
            Lead::V4 => "V4",
            Lead::V5 => "V5",
            Lead::V6 => "V6",
        }
    }
}

impl std::fmt::Display for Lead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Lead {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Lead::ALL
            .iter()
            .copied()
            .find(|lead| lead.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown lead: {}", s))
    }
}

/// A virtual electrode on the torso.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Electrode {
    RightArm,
    LeftArm,
    LeftLeg,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
}

impl Electrode {
    pub const ALL: [Electrode; 9] = [
        Electrode::RightArm,
        Electrode::LeftArm,
        Electrode::LeftLeg,
        Electrode::V1,
        Electrode::V2,
        Electrode::V3,
        Electrode::V4,
        Electrode::V5,
        Electrode::V6,
    ];

    /// Torso position in cm (x = patient left, y = inferior, z = anterior),
    /// origin at the centre of the heart.
    pub fn position(self) -> Vector3<f64> {
        match self {
            Electrode::RightArm => Vector3::new(-20.0, -12.0, 0.0),
            Electrode::LeftArm => Vector3::new(20.0, -12.0, 0.0),
            Electrode::LeftLeg => Vector3::new(4.0, 22.0, 0.0),
            Electrode::V1 => Vector3::new(-3.0, -3.0, 9.0),
            Electrode::V2 => Vector3::new(2.0, -3.0, 9.0),
            Electrode::V3 => Vector3::new(5.0, 0.0, 9.0),
            Electrode::V4 => Vector3::new(8.0, 3.0, 7.0),
            Electrode::V5 => Vector3::new(11.0, 3.0, 4.0),
            Electrode::V6 => Vector3::new(13.0, 3.0, 0.0),
        }
    }
}

/// One scalar per lead. Used both for cached weights and for summed samples.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LeadVector(pub [f64; LEAD_COUNT]);

impl LeadVector {
    pub fn zeros() -> Self {
        Self([0.0; LEAD_COUNT])
    }

    pub fn get(&self, lead: Lead) -> f64 {
        self.0[lead.index()]
    }

    /// `self += other * scale`
    pub fn add_scaled(&mut self, other: &LeadVector, scale: f64) {
        for (acc, w) in self.0.iter_mut().zip(other.0.iter()) {
            *acc += w * scale;
        }
    }

    /// Iterates `(lead, value)` pairs in display order.
    pub fn iter(&self) -> impl Iterator<Item = (Lead, f64)> + '_ {
        Lead::ALL.iter().map(move |&lead| (lead, self.get(lead)))
    }
}

/// The fixed rotation from the anatomical heart frame into the torso frame.
pub fn heart_axis() -> Rotation3<f64> {
    let [roll, pitch, yaw] = HEART_AXIS_EULER;
    Rotation3::from_euler_angles(roll, pitch, yaw)
}

/// Computes the lead weights of a dipole running from `from` to `to`.
///
/// Pure: identical endpoints always give bit-identical weights. A
/// zero-length dipole projects to zero on every lead.
pub fn project(from: &Vector3<f64>, to: &Vector3<f64>) -> LeadVector {
    let dipole = to - from;
    let length = dipole.norm();
    if length < f64::EPSILON {
        return LeadVector::zeros();
    }

    let axis = heart_axis();
    let direction = axis * (dipole / length);
    let source = axis * ((from + to) * 0.5);

    let mut potentials = [0.0; 9];
    for (slot, electrode) in potentials.iter_mut().zip(Electrode::ALL.iter()) {
        let r = electrode.position() - source;
        let dist_sq = r.norm_squared();
        if dist_sq < f64::EPSILON {
            continue;
        }
        *slot = direction.dot(&(r / dist_sq.sqrt())) / dist_sq * LEAD_GAIN;
    }

    combine_leads(&potentials)
}

/// Combines the nine electrode potentials into the twelve output leads.
fn combine_leads(p: &[f64; 9]) -> LeadVector {
    let (ra, la, ll) = (p[0], p[1], p[2]);
    let wilson = (ra + la + ll) / 3.0;

    LeadVector([
        la - ra,
        ll - ra,
        ll - la,
        ra - (la + ll) / 2.0,
        la - (ra + ll) / 2.0,
        ll - (ra + la) / 2.0,
        p[3] - wilson,
        p[4] - wilson,
        p[5] - wilson,
        p[6] - wilson,
        p[7] - wilson,
        p[8] - wilson,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_projection_is_deterministic() {
        let from = Vector3::new(-1.0, 0.0, 0.0);
        let to = Vector3::new(4.0, 5.0, -1.0);

        let a = project(&from, &to);
        let b = project(&from, &to);

        for lead in Lead::ALL {
            assert_eq!(a.get(lead).to_bits(), b.get(lead).to_bits());
        }
    }

    #[test]
    fn test_zero_length_dipole() {
        let p = Vector3::new(1.0, 2.0, 3.0);
        assert_eq!(project(&p, &p), LeadVector::zeros());
    }

    #[test]
    fn test_reversed_dipole_flips_sign() {
        let a = Vector3::new(-3.0, -5.0, 1.0);
        let b = Vector3::new(4.0, 5.0, -1.0);

        let forward = project(&a, &b);
        let backward = project(&b, &a);

        for lead in Lead::ALL {
            assert_relative_eq!(forward.get(lead), -backward.get(lead), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_einthoven_law() {
        // II = I + III holds for any dipole
        let weights = project(&Vector3::new(0.0, 1.0, 0.0), &Vector3::new(4.0, 5.0, -1.0));
        assert_relative_eq!(
            weights.get(Lead::II),
            weights.get(Lead::I) + weights.get(Lead::III),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_augmented_leads_sum_to_zero() {
        let weights = project(&Vector3::new(-1.0, 2.0, 1.0), &Vector3::new(-1.0, 4.0, 3.0));
        let sum = weights.get(Lead::AVR) + weights.get(Lead::AVL) + weights.get(Lead::AVF);
        assert_relative_eq!(sum, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_lead_names_round_trip() {
        for lead in Lead::ALL {
            assert_eq!(lead.name().parse::<Lead>().unwrap(), lead);
        }
        assert_eq!("avf".parse::<Lead>().unwrap(), Lead::AVF);
        assert!("V7".parse::<Lead>().is_err());
    }

    #[test]
    fn test_add_scaled() {
        let mut acc = LeadVector::zeros();
        let mut w = LeadVector::zeros();
        w.0[Lead::II.index()] = 2.0;

        acc.add_scaled(&w, 0.5);
        acc.add_scaled(&w, 0.5);
        assert_eq!(acc.get(Lead::II), 2.0);
        assert_eq!(acc.get(Lead::I), 0.0);
    }
}
