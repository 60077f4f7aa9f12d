use crate::config::EarLayout;
use crate::math::{Pose, Vec3};

/// Output channel a tap or rendered buffer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Ear {
    Left,
    Right,
    Mono,
}

impl Ear {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ear::Left => "left",
            Ear::Right => "right",
            Ear::Mono => "mono",
        }
    }
}

/// Where the listener's head is and which way it faces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Listener {
    pub head: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    pub layout: EarLayout,
}

impl Listener {
    pub fn new(head: Vec3, forward: Vec3, up: Vec3, layout: EarLayout) -> Self {
        Self {
            head,
            forward,
            up,
            layout,
        }
    }

    pub fn from_pose(pose: &Pose, layout: EarLayout) -> Self {
        Self::new(pose.position, pose.forward(), pose.up(), layout)
    }

    /// Unit vector pointing out of the right ear.
    pub fn right(&self) -> Vec3 {
        self.forward.cross(self.up).normalize_or_zero()
    }

    /// Reception points, one for mono and two for binaural layouts.
    pub fn ears(&self) -> impl Iterator<Item = (Ear, Vec3)> + use<> {
        let (points, count) = match self.layout {
            EarLayout::Mono => ([(Ear::Mono, self.head), (Ear::Mono, self.head)], 1),
            EarLayout::Binaural { half_width } => {
                let offset = self.right() * half_width;
                (
                    [
                        (Ear::Left, self.head - offset),
                        (Ear::Right, self.head + offset),
                    ],
                    2,
                )
            }
        };
        points.into_iter().take(count)
    }

    /// Lateral position of `point` as seen from the head: -1 fully left,
    /// +1 fully right. A point at the head centre pans to the middle.
    pub fn pan(&self, point: Vec3) -> f32 {
        (point - self.head)
            .try_normalize()
            .map_or(0.0, |dir| dir.dot(self.right()).clamp(-1.0, 1.0))
    }

    /// Panning weight of a sound arriving from `point` at `ear`.
    ///
    /// `mix` blends between fully panned (0) and centred (1).
    pub fn weight(&self, ear: Ear, point: Vec3, mix: f32) -> f32 {
        let pan = self.pan(point);
        match ear {
            Ear::Right => 0.5 * (1.0 + pan) * (1.0 - mix) + 0.5 * mix,
            Ear::Left => 0.5 * (1.0 - pan) * (1.0 - mix) + 0.5 * mix,
            Ear::Mono => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listener() -> Listener {
        Listener::new(
            Vec3::ZERO,
            -Vec3::Z,
            Vec3::Y,
            EarLayout::Binaural { half_width: 0.1 },
        )
    }

    #[test]
    fn ears_sit_on_the_right_vector() {
        let l = listener();
        assert_eq!(l.right(), Vec3::X);
        let ears: Vec<_> = l.ears().collect();
        assert_eq!(ears.len(), 2);
        assert_eq!(ears[0], (Ear::Left, Vec3::new(-0.1, 0.0, 0.0)));
        assert_eq!(ears[1], (Ear::Right, Vec3::new(0.1, 0.0, 0.0)));
    }

    #[test]
    fn mono_layout_has_one_ear() {
        let l = Listener {
            layout: EarLayout::Mono,
            ..listener()
        };
        let ears: Vec<_> = l.ears().collect();
        assert_eq!(ears, vec![(Ear::Mono, Vec3::ZERO)]);
        assert_eq!(l.weight(Ear::Mono, Vec3::X, 0.3), 1.0);
    }

    #[test]
    fn hard_pan_without_mix() {
        let l = listener();
        let right = Vec3::new(5.0, 0.0, 0.0);
        assert!((l.weight(Ear::Right, right, 0.0) - 1.0).abs() < 1e-6);
        assert!(l.weight(Ear::Left, right, 0.0).abs() < 1e-6);
    }

    #[test]
    fn full_mix_centres_everything() {
        let l = listener();
        let right = Vec3::new(5.0, 0.0, 0.0);
        assert!((l.weight(Ear::Right, right, 1.0) - 0.5).abs() < 1e-6);
        assert!((l.weight(Ear::Left, right, 1.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn weights_sum_to_one() {
        let l = listener();
        for point in [Vec3::new(3.0, 1.0, -2.0), Vec3::new(-7.0, 0.0, 1.0), Vec3::Z] {
            let sum = l.weight(Ear::Left, point, 0.7) + l.weight(Ear::Right, point, 0.7);
            assert!((sum - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn pose_conversion() {
        let l = Listener::from_pose(&Pose::identity(), EarLayout::default());
        assert_eq!(l.forward, -Vec3::Z);
        assert_eq!(l.right(), Vec3::X);
    }
}
