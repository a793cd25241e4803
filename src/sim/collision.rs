//! Collision detection and impulse response
//!
//! Balls are circles; paddles and obstacles are axis-aligned rectangles.
//! Normals always point from the other shape toward the ball, so a negative
//! relative normal velocity means the shapes are approaching.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::body::PhysicsBody;

/// Squared distances below this are treated as coincident points
const DEGENERATE_EPSILON: f32 = 1e-8;

/// Fallback normal when geometry gives no direction
pub const CANONICAL_NORMAL: Vec2 = Vec2::X;

/// Axis-aligned rectangle (paddles, obstacles)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub center: Vec2,
    pub half_extents: Vec2,
}

impl Rect {
    pub fn new(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            center,
            half_extents,
        }
    }

    #[inline]
    pub fn min(&self) -> Vec2 {
        self.center - self.half_extents
    }

    #[inline]
    pub fn max(&self) -> Vec2 {
        self.center + self.half_extents
    }

    /// Closest point inside the rectangle to `point`
    #[inline]
    pub fn closest_point(&self, point: Vec2) -> Vec2 {
        point.clamp(self.min(), self.max())
    }
}

/// Result of a collision check
#[derive(Debug, Clone)]
pub struct CollisionResult {
    /// Whether a collision occurred
    pub hit: bool,
    /// Collision point (if hit)
    pub point: Vec2,
    /// Surface normal at collision (pointing toward ball center)
    pub normal: Vec2,
    /// Penetration depth (for position correction)
    pub penetration: f32,
}

impl CollisionResult {
    pub fn miss() -> Self {
        Self {
            hit: false,
            point: Vec2::ZERO,
            normal: Vec2::ZERO,
            penetration: 0.0,
        }
    }
}

/// Where a ball struck a paddle, relative to the paddle center
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// -1.0 at the top edge, 1.0 at the bottom edge
    pub offset: f32,
    /// Angular velocity to add to the ball
    pub spin: f32,
    /// Hit landed within the center band
    pub perfect: bool,
}

/// Check a circle against a rectangle
pub fn circle_rect_collision(center: Vec2, radius: f32, rect: &Rect) -> CollisionResult {
    let closest = rect.closest_point(center);
    let delta = center - closest;
    let dist_sq = delta.length_squared();

    if dist_sq >= radius * radius {
        return CollisionResult::miss();
    }

    if dist_sq > DEGENERATE_EPSILON {
        let dist = dist_sq.sqrt();
        return CollisionResult {
            hit: true,
            point: closest,
            normal: delta / dist,
            penetration: radius - dist,
        };
    }

    // Center is inside the rectangle: push out along the shallowest face.
    // Faces are checked right, left, bottom, top so ties are deterministic.
    let min = rect.min();
    let max = rect.max();
    let faces = [
        (max.x - center.x, Vec2::X, Vec2::new(max.x, center.y)),
        (center.x - min.x, Vec2::NEG_X, Vec2::new(min.x, center.y)),
        (max.y - center.y, Vec2::Y, Vec2::new(center.x, max.y)),
        (center.y - min.y, Vec2::NEG_Y, Vec2::new(center.x, min.y)),
    ];
    let (depth, normal, point) = faces
        .into_iter()
        .fold((f32::MAX, CANONICAL_NORMAL, center), |best, face| {
            if face.0 < best.0 { face } else { best }
        });

    CollisionResult {
        hit: true,
        point,
        normal,
        penetration: depth + radius,
    }
}

/// Check two circles against each other (normal points from `b` to `a`)
pub fn circle_circle_collision(a: Vec2, radius_a: f32, b: Vec2, radius_b: f32) -> CollisionResult {
    let delta = a - b;
    let dist_sq = delta.length_squared();
    let sum = radius_a + radius_b;

    if dist_sq >= sum * sum {
        return CollisionResult::miss();
    }

    let dist = dist_sq.sqrt();
    let normal = if dist_sq > DEGENERATE_EPSILON {
        delta / dist
    } else {
        CANONICAL_NORMAL
    };

    CollisionResult {
        hit: true,
        point: b + normal * radius_b,
        normal,
        penetration: sum - dist,
    }
}

/// Impulse magnitude along `normal` for two bodies in contact (0 when separating)
fn contact_impulse(relative_velocity: Vec2, normal: Vec2, restitution: f32, inv_mass_sum: f32) -> f32 {
    let vn = relative_velocity.dot(normal);
    if vn >= 0.0 || inv_mass_sum <= 0.0 {
        return 0.0;
    }
    -(1.0 + restitution) * vn / inv_mass_sum
}

/// Resolve a ball against a rectangle that never yields (paddle, obstacle).
///
/// `rect_velocity` is the rectangle's own motion; `rect_restitution` is
/// combined with the ball's by taking the minimum. Returns the contact when
/// the shapes overlap, whether or not an impulse was needed.
pub fn resolve_circle_rect(
    ball: &mut PhysicsBody,
    radius: f32,
    rect: &Rect,
    rect_velocity: Vec2,
    rect_restitution: f32,
) -> Option<CollisionResult> {
    let result = circle_rect_collision(ball.position, radius, rect);
    if !result.hit {
        return None;
    }

    let restitution = ball.restitution.min(rect_restitution);
    let inv_mass = ball.inverse_mass();
    let j = contact_impulse(ball.velocity - rect_velocity, result.normal, restitution, inv_mass);
    ball.velocity += result.normal * j * inv_mass;

    if inv_mass > 0.0 {
        ball.position += result.normal * result.penetration;
    }

    Some(result)
}

/// Resolve two circular bodies; penetration is split by inverse mass.
pub fn resolve_circle_circle(
    a: &mut PhysicsBody,
    radius_a: f32,
    b: &mut PhysicsBody,
    radius_b: f32,
) -> Option<CollisionResult> {
    let result = circle_circle_collision(a.position, radius_a, b.position, radius_b);
    if !result.hit {
        return None;
    }

    let inv_a = a.inverse_mass();
    let inv_b = b.inverse_mass();
    let inv_sum = inv_a + inv_b;
    if inv_sum <= 0.0 {
        return Some(result);
    }

    let restitution = a.restitution.min(b.restitution);
    let j = contact_impulse(a.velocity - b.velocity, result.normal, restitution, inv_sum);
    a.velocity += result.normal * j * inv_a;
    b.velocity -= result.normal * j * inv_b;

    let correction = result.normal * result.penetration;
    a.position += correction * (inv_a / inv_sum);
    b.position -= correction * (inv_b / inv_sum);

    Some(result)
}

/// Resolve a body against an infinite static wall with the given normal.
/// Returns true if an impulse was applied.
///
/// With `penetration > 0` the normal points from the wall toward the body:
/// the body is pushed out along it and only bounces if moving against it.
/// Without penetration the wall is two-sided and any velocity with a
/// component along the normal is reflected.
pub fn resolve_against_wall(
    body: &mut PhysicsBody,
    normal: Vec2,
    penetration: f32,
    wall_restitution: f32,
) -> bool {
    let mut normal = normal.try_normalize().unwrap_or(CANONICAL_NORMAL);
    if penetration > 0.0 {
        body.position += normal * penetration;
    } else if body.velocity.dot(normal) > 0.0 {
        normal = -normal;
    }

    let restitution = body.restitution.min(wall_restitution);
    let vn = body.velocity.dot(normal);
    if vn >= 0.0 {
        return false;
    }
    body.velocity -= (1.0 + restitution) * vn * normal;
    true
}

/// Where along a paddle's height a contact landed, and the spin it imparts
pub fn paddle_contact(point: Vec2, paddle: &Rect, spin_factor: f32, perfect_band: f32) -> Contact {
    let offset = if paddle.half_extents.y > 0.0 {
        ((point.y - paddle.center.y) / paddle.half_extents.y).clamp(-1.0, 1.0)
    } else {
        0.0
    };

    Contact {
        offset,
        spin: offset * spin_factor,
        perfect: offset.abs() <= perfect_band,
    }
}

/// Reflect velocity off a surface
///
/// Standard reflection: v' = v - 2(v·n)n
#[inline]
pub fn reflect_velocity(velocity: Vec2, normal: Vec2) -> Vec2 {
    velocity - 2.0 * velocity.dot(normal) * normal
}
