//! Minimal Well-Known Text geometry support.
//!
//! Covers the geometry interop the tile renderer needs: parsing and
//! serializing POINT, LINESTRING and POLYGON, envelope queries, and
//! intersection tests. Coordinates are (x, y) pairs; for geographic
//! geometries that means (lon, lat) degrees.

use crate::error::{MapError, MapResult};

/// A parsed WKT geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(f64, f64),
    LineString(Vec<(f64, f64)>),
    /// First ring is the exterior; any further rings are holes.
    Polygon(Vec<Vec<(f64, f64)>>),
}

/// Formats a coordinate with up to 8 fractional digits, trimming
/// trailing zeros so whole numbers serialize without a decimal point.
pub fn format_coord(v: f64) -> String {
    let s = format!("{:.8}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    s.to_string()
}

impl Geometry {
    /// Axis-aligned rectangle as a closed polygon ring.
    pub fn rectangle(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Geometry {
        Geometry::Polygon(vec![vec![
            (min_x, min_y),
            (max_x, min_y),
            (max_x, max_y),
            (min_x, max_y),
            (min_x, min_y),
        ]])
    }

    /// Parse a WKT string. Tags are case-insensitive.
    pub fn parse_wkt(wkt: &str) -> MapResult<Geometry> {
        let trimmed = wkt.trim();
        let upper = trimmed.to_uppercase();

        if let Some(rest) = upper.strip_prefix("POINT") {
            let body = strip_parens(rest, trimmed, "POINT")?;
            let pt = parse_coord(body)?;
            Ok(Geometry::Point(pt.0, pt.1))
        } else if let Some(rest) = upper.strip_prefix("LINESTRING") {
            let body = strip_parens(rest, trimmed, "LINESTRING")?;
            let pts = parse_coord_list(body)?;
            if pts.len() < 2 {
                return Err(MapError::WktParse(format!(
                    "LINESTRING needs at least 2 points: {}",
                    trimmed
                )));
            }
            Ok(Geometry::LineString(pts))
        } else if let Some(rest) = upper.strip_prefix("POLYGON") {
            let body = strip_parens(rest, trimmed, "POLYGON")?;
            let mut rings = Vec::new();
            for ring_body in split_rings(body, trimmed)? {
                let pts = parse_coord_list(&ring_body)?;
                if pts.len() < 4 {
                    return Err(MapError::WktParse(format!(
                        "polygon ring needs at least 4 points: {}",
                        trimmed
                    )));
                }
                rings.push(pts);
            }
            if rings.is_empty() {
                return Err(MapError::WktParse(format!("empty POLYGON: {}", trimmed)));
            }
            Ok(Geometry::Polygon(rings))
        } else {
            Err(MapError::WktParse(format!(
                "unrecognized geometry type: {}",
                trimmed
            )))
        }
    }

    /// Serialize back to WKT using the shared coordinate formatter.
    pub fn to_wkt(&self) -> String {
        match self {
            Geometry::Point(x, y) => {
                format!("POINT({} {})", format_coord(*x), format_coord(*y))
            }
            Geometry::LineString(pts) => format!("LINESTRING({})", coords_to_wkt(pts)),
            Geometry::Polygon(rings) => {
                let body = rings
                    .iter()
                    .map(|r| format!("({})", coords_to_wkt(r)))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("POLYGON({})", body)
            }
        }
    }

    /// Bounding envelope as (min_x, min_y, max_x, max_y).
    pub fn envelope(&self) -> (f64, f64, f64, f64) {
        let mut env = (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        let mut grow = |(x, y): (f64, f64)| {
            env.0 = env.0.min(x);
            env.1 = env.1.min(y);
            env.2 = env.2.max(x);
            env.3 = env.3.max(y);
        };
        match self {
            Geometry::Point(x, y) => grow((*x, *y)),
            Geometry::LineString(pts) => pts.iter().copied().for_each(&mut grow),
            Geometry::Polygon(rings) => {
                rings.iter().flatten().copied().for_each(&mut grow)
            }
        }
        env
    }

    /// True if the two geometries touch or overlap.
    pub fn intersects(&self, other: &Geometry) -> bool {
        use Geometry::*;
        match (self, other) {
            (Point(x1, y1), Point(x2, y2)) => x1 == x2 && y1 == y2,
            (Point(x, y), LineString(pts)) | (LineString(pts), Point(x, y)) => {
                segments(pts).any(|(a, b)| on_segment(a, b, (*x, *y)))
            }
            (Point(x, y), Polygon(rings)) | (Polygon(rings), Point(x, y)) => {
                polygon_contains(rings, (*x, *y))
            }
            (LineString(a), LineString(b)) => any_edge_crossing(a, b),
            (LineString(pts), Polygon(rings)) | (Polygon(rings), LineString(pts)) => {
                rings.iter().any(|ring| any_edge_crossing(pts, ring))
                    || pts.iter().any(|p| polygon_contains(rings, *p))
            }
            (Polygon(a), Polygon(b)) => {
                a.iter()
                    .any(|ra| b.iter().any(|rb| any_edge_crossing(ra, rb)))
                    || a.iter().flatten().any(|p| polygon_contains(b, *p))
                    || b.iter().flatten().any(|p| polygon_contains(a, *p))
            }
        }
    }
}

fn coords_to_wkt(pts: &[(f64, f64)]) -> String {
    pts.iter()
        .map(|(x, y)| format!("{} {}", format_coord(*x), format_coord(*y)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Extracts the text between the outermost parentheses following a tag.
fn strip_parens<'a>(after_tag: &str, original: &'a str, tag: &str) -> MapResult<&'a str> {
    let open_rel = after_tag
        .find('(')
        .ok_or_else(|| MapError::WktParse(format!("{} without '(': {}", tag, original)))?;
    // Index into the original string so the body keeps its original case
    let open = original.len() - after_tag.len() + open_rel;
    let close = original
        .rfind(')')
        .ok_or_else(|| MapError::WktParse(format!("{} without ')': {}", tag, original)))?;
    if close <= open {
        return Err(MapError::WktParse(format!("mismatched parens: {}", original)));
    }
    Ok(&original[open + 1..close])
}

/// Splits a POLYGON body "(...),(...)" into ring bodies.
fn split_rings(body: &str, original: &str) -> MapResult<Vec<String>> {
    let mut rings = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for ch in body.chars() {
        match ch {
            '(' => {
                depth += 1;
                if depth > 1 {
                    return Err(MapError::WktParse(format!("nested rings: {}", original)));
                }
            }
            ')' => {
                if depth == 0 {
                    return Err(MapError::WktParse(format!("mismatched parens: {}", original)));
                }
                depth -= 1;
                rings.push(std::mem::take(&mut current));
            }
            ',' if depth == 0 => {}
            c => {
                if depth == 1 {
                    current.push(c);
                }
            }
        }
    }
    if depth != 0 {
        return Err(MapError::WktParse(format!("unterminated ring: {}", original)));
    }
    Ok(rings)
}

fn parse_coord(s: &str) -> MapResult<(f64, f64)> {
    let mut parts = s.split_whitespace();
    let x = parts
        .next()
        .and_then(|p| p.parse::<f64>().ok())
        .ok_or_else(|| MapError::WktParse(format!("bad coordinate: {}", s)))?;
    let y = parts
        .next()
        .and_then(|p| p.parse::<f64>().ok())
        .ok_or_else(|| MapError::WktParse(format!("bad coordinate: {}", s)))?;
    Ok((x, y))
}

fn parse_coord_list(s: &str) -> MapResult<Vec<(f64, f64)>> {
    s.split(',').map(|pair| parse_coord(pair.trim())).collect()
}

fn segments(pts: &[(f64, f64)]) -> impl Iterator<Item = ((f64, f64), (f64, f64))> + '_ {
    pts.windows(2).map(|w| (w[0], w[1]))
}

fn any_edge_crossing(a: &[(f64, f64)], b: &[(f64, f64)]) -> bool {
    segments(a).any(|(a1, a2)| segments(b).any(|(b1, b2)| segments_cross(a1, a2, b1, b2)))
}

fn cross(o: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

/// True if point p lies on the segment [a, b].
fn on_segment(a: (f64, f64), b: (f64, f64), p: (f64, f64)) -> bool {
    if cross(a, b, p).abs() > 1e-12 {
        return false;
    }
    p.0 >= a.0.min(b.0) && p.0 <= a.0.max(b.0) && p.1 >= a.1.min(b.1) && p.1 <= a.1.max(b.1)
}

/// Segment intersection test, inclusive of endpoints and collinear overlap.
fn segments_cross(p1: (f64, f64), p2: (f64, f64), p3: (f64, f64), p4: (f64, f64)) -> bool {
    let d1 = cross(p3, p4, p1);
    let d2 = cross(p3, p4, p2);
    let d3 = cross(p1, p2, p3);
    let d4 = cross(p1, p2, p4);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    on_segment(p3, p4, p1)
        || on_segment(p3, p4, p2)
        || on_segment(p1, p2, p3)
        || on_segment(p1, p2, p4)
}

/// Ray-cast point-in-ring test; points on the boundary count as inside.
fn ring_contains(ring: &[(f64, f64)], p: (f64, f64)) -> bool {
    if segments(ring).any(|(a, b)| on_segment(a, b, p)) {
        return true;
    }
    let mut inside = false;
    for (a, b) in segments(ring) {
        if (a.1 > p.1) != (b.1 > p.1) {
            let x = a.0 + (p.1 - a.1) / (b.1 - a.1) * (b.0 - a.0);
            if p.0 < x {
                inside = !inside;
            }
        }
    }
    inside
}

/// Inside the exterior ring and not strictly inside any hole.
fn polygon_contains(rings: &[Vec<(f64, f64)>], p: (f64, f64)) -> bool {
    let Some(exterior) = rings.first() else {
        return false;
    };
    if !ring_contains(exterior, p) {
        return false;
    }
    for hole in &rings[1..] {
        let on_edge = segments(hole).any(|(a, b)| on_segment(a, b, p));
        if !on_edge && ring_contains(hole, p) {
            return false;
        }
    }
    true
}
