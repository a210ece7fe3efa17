// Shape-overlap primitives for the approximate collision model.
//
// Everything is circles except the optional oriented-rectangle hull test for
// ships; squared distances are compared where possible to avoid sqrt in the
// per-tick loops.

use crate::domain::entity::Vec2;

/// Which overlap test ships use against non-ship entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShipCollisionModel {
    /// Plain circle-vs-circle on ship size. The live default.
    Circular,
    /// Rotated-hull rectangle vs circle.
    OrientedRect,
}

/// Circle-vs-circle: overlap iff center distance < sum of radii.
pub fn circles_overlap(a: Vec2, a_radius: f32, b: Vec2, b_radius: f32) -> bool {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    let reach = a_radius + b_radius;
    dx * dx + dy * dy < reach * reach
}

/// Oriented-rectangle (ship hull) vs circle.
///
/// The other entity's center is rotated into the hull's local frame; overlap
/// requires both local axes to be within half-extent plus the circle radius.
pub fn hull_overlaps_circle(
    hull_pos: Vec2,
    hull_angle: f32,
    hull_length: f32,
    hull_beam: f32,
    other: Vec2,
    other_radius: f32,
) -> bool {
    let dx = other.x - hull_pos.x;
    let dy = other.y - hull_pos.y;
    // Inverse rotation by the hull heading.
    let (sin, cos) = hull_angle.sin_cos();
    let local_x = dx * cos + dy * sin;
    let local_y = -dx * sin + dy * cos;
    local_x.abs() < hull_length / 2.0 + other_radius && local_y.abs() < hull_beam / 2.0 + other_radius
}

/// Ship-vs-ship blocking test: a lenient circular check with both radii
/// scaled down so dense crowds don't wedge against each other.
pub fn ships_overlap(a: Vec2, a_size: f32, b: Vec2, b_size: f32, scale: f32) -> bool {
    circles_overlap(a, a_size * scale, b, b_size * scale)
}
