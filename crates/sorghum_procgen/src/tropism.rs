use glam::{Quat, Vec3};

/// Headings closer than this (in |cos|) to the target are left alone
const PARALLEL_LIMIT: f32 = 0.99;

/// Rotate `front` toward `target` by `tropism` times the angle between them,
/// never past alignment, then re-orthogonalize `up` against the new `front`.
///
/// Nothing happens when `front` is (anti)parallel to `target`, where the
/// rotation axis is undefined.
pub fn apply_tropism(target: Vec3, tropism: f32, front: &mut Vec3, up: &mut Vec3) {
    let direction = target.normalize_or_zero();
    if direction == Vec3::ZERO {
        return;
    }
    let cos_angle = front.dot(direction).clamp(-1.0, 1.0);
    if cos_angle.abs() >= PARALLEL_LIMIT {
        return;
    }

    let axis = front.cross(direction).normalize();
    let max_angle = cos_angle.acos();
    let angle = (max_angle * tropism).min(max_angle);
    *front = (Quat::from_axis_angle(axis, angle) * *front).normalize();

    let new_up = front.cross(*up).cross(*front);
    if new_up.length_squared() > 1e-12 {
        *up = new_up.normalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_tropism_keeps_front() {
        let mut front = Vec3::new(1.0, 0.2, 0.0).normalize();
        let original = front;
        let mut up = Vec3::Z;
        apply_tropism(Vec3::NEG_Y, 0.0, &mut front, &mut up);
        assert!((front - original).length() < 1e-6);
    }

    #[test]
    fn test_full_tropism_aligns() {
        let mut front = Vec3::new(1.0, 0.3, 0.0).normalize();
        let mut up = Vec3::Z;
        apply_tropism(Vec3::NEG_Y * 3.0, 1.0, &mut front, &mut up);
        assert!((front - Vec3::NEG_Y).length() < 1e-5);

        // Works past 90 degrees as well
        let mut front = Vec3::new(1.0, 1.0, 0.0).normalize();
        let mut up = Vec3::Z;
        apply_tropism(Vec3::NEG_Y, 1.0, &mut front, &mut up);
        assert!((front - Vec3::NEG_Y).length() < 1e-5);
    }

    #[test]
    fn test_overshoot_clamped() {
        let mut front = Vec3::X;
        let mut up = Vec3::Y;
        apply_tropism(Vec3::NEG_Y, 5.0, &mut front, &mut up);
        assert!((front - Vec3::NEG_Y).length() < 1e-5);
    }

    #[test]
    fn test_partial_rotation() {
        let mut front = Vec3::X;
        let mut up = Vec3::Z;
        apply_tropism(Vec3::NEG_Y, 0.5, &mut front, &mut up);
        let expected = Vec3::new(1.0, -1.0, 0.0).normalize();
        assert!((front - expected).length() < 1e-5);
        assert!(front.dot(up).abs() < 1e-5);
        assert!((up.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_parallel_skipped() {
        let mut front = Vec3::Y;
        let mut up = Vec3::Z;
        apply_tropism(Vec3::NEG_Y, 1.0, &mut front, &mut up);
        assert_eq!(front, Vec3::Y);
        assert_eq!(up, Vec3::Z);
        assert!(!front.is_nan() && !up.is_nan());
    }
}
