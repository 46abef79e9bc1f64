use crate::types::Point2;

/// Angle in degrees at vertex `b` formed by the segments `b->a` and `b->c`,
/// normalized to `[0, 180]` regardless of winding direction.
///
/// Coincident points degenerate to `atan2(0, 0) == 0`, so a zero-length
/// segment yields an angle of 0 rather than an error.
pub fn joint_angle(a: Point2, b: Point2, c: Point2) -> f32 {
    let raw = (c.y - b.y).atan2(c.x - b.x) - (a.y - b.y).atan2(a.x - b.x);
    let deg = raw.abs().to_degrees();
    if deg > 180.0 { 360.0 - deg } else { deg }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f32, y: f32) -> Point2 {
        Point2::new(x, y)
    }

    #[test]
    fn collinear_points_measure_straight() {
        let angle = joint_angle(p(0.1, 0.5), p(0.5, 0.5), p(0.9, 0.5));
        assert!((angle - 180.0).abs() < 1e-3, "got {angle}");

        // Diagonal line, vertex strictly between the endpoints.
        let angle = joint_angle(p(0.0, 0.0), p(0.3, 0.3), p(0.8, 0.8));
        assert!((angle - 180.0).abs() < 1e-3, "got {angle}");
    }

    #[test]
    fn right_angle() {
        let angle = joint_angle(p(1.0, 0.0), p(0.0, 0.0), p(0.0, 1.0));
        assert!((angle - 90.0).abs() < 1e-3, "got {angle}");
    }

    #[test]
    fn endpoint_order_does_not_matter() {
        let a = p(0.12, 0.78);
        let b = p(0.4, 0.33);
        let c = p(0.91, 0.6);
        let forward = joint_angle(a, b, c);
        let reversed = joint_angle(c, b, a);
        assert!((forward - reversed).abs() < 1e-4);
    }

    #[test]
    fn result_stays_in_range() {
        // Reflex configuration that would read > 180 without folding.
        let angle = joint_angle(p(1.0, 0.0), p(0.0, 0.0), p(0.7, -0.7));
        assert!((0.0..=180.0).contains(&angle), "got {angle}");
        assert!((angle - 135.0).abs() < 1e-3, "got {angle}");
    }

    #[test]
    fn coincident_points_yield_zero() {
        let b = p(0.5, 0.5);
        assert_eq!(joint_angle(b, b, b), 0.0);
    }
}
