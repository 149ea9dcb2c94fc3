//! Planar and geodesic predicates over `[lon, lat]` positions.
//!
//! These mirror the PostGIS functions the database backend relies on
//! (`ST_Within`, `ST_Contains`, `ST_Intersects`, geography `ST_Distance`)
//! closely enough for the in-memory store.

use crate::models::geometry::Position;

/// Mean Earth radius in metres (IUGG).
const EARTH_RADIUS_M: f64 = 6_371_008.8;

const EPSILON: f64 = 1e-12;

/// Where a position lies relative to a polygon ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingLocation {
    Inside,
    Boundary,
    Outside,
}

/// Great-circle distance in metres.
pub fn haversine_distance(a: Position, b: Position) -> f64 {
    let (lat1, lat2) = (a.lat().to_radians(), b.lat().to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = (b.lon() - a.lon()).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Locates `p` against `ring` using an even-odd ray cast; boundary hits are reported separately.
pub fn locate(p: Position, ring: &[Position]) -> RingLocation {
    let mut inside = false;
    for (a, b) in edges(ring) {
        if on_segment(p, a, b) {
            return RingLocation::Boundary;
        }
        if (a.lat() > p.lat()) != (b.lat() > p.lat()) {
            let x = a.lon() + (p.lat() - a.lat()) * (b.lon() - a.lon()) / (b.lat() - a.lat());
            if p.lon() < x {
                inside = !inside;
            }
        }
    }
    if inside {
        RingLocation::Inside
    } else {
        RingLocation::Outside
    }
}

/// True when the two rings share any point, touching included.
pub fn rings_intersect(a: &[Position], b: &[Position]) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }

    let edges_cross = edges(a).any(|(p1, p2)| edges(b).any(|(q1, q2)| segments_intersect(p1, p2, q1, q2)));

    edges_cross
        || locate(a[0], b) != RingLocation::Outside
        || locate(b[0], a) != RingLocation::Outside
}

/// Consecutive edges, including the closing edge for rings that are not explicitly closed.
fn edges(ring: &[Position]) -> impl Iterator<Item = (Position, Position)> + '_ {
    ring.iter()
        .copied()
        .zip(ring.iter().copied().cycle().skip(1))
        .take(ring.len())
}

fn cross(o: Position, a: Position, b: Position) -> f64 {
    (a.lon() - o.lon()) * (b.lat() - o.lat()) - (a.lat() - o.lat()) * (b.lon() - o.lon())
}

fn on_segment(p: Position, a: Position, b: Position) -> bool {
    cross(a, b, p).abs() <= EPSILON
        && p.lon() >= a.lon().min(b.lon()) - EPSILON
        && p.lon() <= a.lon().max(b.lon()) + EPSILON
        && p.lat() >= a.lat().min(b.lat()) - EPSILON
        && p.lat() <= a.lat().max(b.lat()) + EPSILON
}

fn segments_intersect(p1: Position, p2: Position, q1: Position, q2: Position) -> bool {
    let d1 = cross(q1, q2, p1);
    let d2 = cross(q1, q2, p2);
    let d3 = cross(p1, p2, q1);
    let d4 = cross(p1, p2, q2);

    let straddles = |x: f64, y: f64| (x > EPSILON && y < -EPSILON) || (x < -EPSILON && y > EPSILON);
    if straddles(d1, d2) && straddles(d3, d4) {
        return true;
    }

    on_segment(p1, q1, q2) || on_segment(p2, q1, q2) || on_segment(q1, p1, p2) || on_segment(q2, p1, p2)
}
