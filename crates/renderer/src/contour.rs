//! Iso-alpha contour vectorization.
//!
//! Turns a binarized alpha channel into closed polygon outlines:
//! edge-node classification, boundary path walking driven by lookup
//! tables, midpoint interpolation with 8-direction tags, and recursive
//! line/quadratic-spline fitting (run as an explicit worklist so deep
//! splits cannot exhaust the stack). Quadratic segments are flattened at
//! half-pixel tolerance during assembly.

use crate::canvas::Canvas;

/// One extracted density level: a list of closed polygon rings in pixel
/// coordinates. The first point of every ring equals its last point.
#[derive(Debug, Clone, Default)]
pub struct Contour {
    pub polygons: Vec<Vec<(f64, f64)>>,
}

impl Contour {
    pub fn polygons(&self) -> &[Vec<(f64, f64)>] {
        &self.polygons
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }
}

/// A fitted path segment.
#[derive(Debug, Clone, Copy)]
enum Segment {
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    },
    Quad {
        x1: f64,
        y1: f64,
        cx: f64,
        cy: f64,
        x2: f64,
        y2: f64,
    },
}

/// Walk direction for each edge-node code at path start.
const START_DIR: [u8; 16] = [0, 0, 3, 0, 1, 0, 3, 0, 0, 3, 3, 1, 0, 3, 0, 0];

/// Whether a path starting at this edge-node code outlines a hole.
const HOLE_PATH: [bool; 16] = [
    false, false, false, false, false, false, false, true, false, false, false, true, false,
    true, true, false,
];

/// Transition table for the boundary walk, indexed by
/// `[edge-node code][direction]`, yielding
/// `[replacement code, new direction, dx, dy]`. Directions: 0 east,
/// 1 north, 2 west, 3 south. Codes 0 and 15 are interior and invalid.
#[rustfmt::skip]
const STEP_LOOKUP: [[[i8; 4]; 4]; 16] = [
    [[-1,-1,-1,-1], [-1,-1,-1,-1], [-1,-1,-1,-1], [-1,-1,-1,-1]],
    [[ 0, 1, 0,-1], [-1,-1,-1,-1], [-1,-1,-1,-1], [ 0, 2,-1, 0]],
    [[-1,-1,-1,-1], [-1,-1,-1,-1], [ 0, 1, 0,-1], [ 0, 0, 1, 0]],
    [[ 0, 0, 1, 0], [-1,-1,-1,-1], [ 0, 2,-1, 0], [-1,-1,-1,-1]],
    [[-1,-1,-1,-1], [ 0, 0, 1, 0], [ 0, 3, 0, 1], [-1,-1,-1,-1]],
    [[13, 3, 0, 1], [13, 2,-1, 0], [ 7, 1, 0,-1], [ 7, 0, 1, 0]],
    [[-1,-1,-1,-1], [ 0, 1, 0,-1], [-1,-1,-1,-1], [ 0, 3, 0, 1]],
    [[ 0, 3, 0, 1], [ 0, 2,-1, 0], [-1,-1,-1,-1], [-1,-1,-1,-1]],
    [[ 0, 3, 0, 1], [ 0, 2,-1, 0], [-1,-1,-1,-1], [-1,-1,-1,-1]],
    [[-1,-1,-1,-1], [ 0, 1, 0,-1], [-1,-1,-1,-1], [ 0, 3, 0, 1]],
    [[11, 1, 0,-1], [14, 0, 1, 0], [14, 3, 0, 1], [11, 2,-1, 0]],
    [[-1,-1,-1,-1], [ 0, 0, 1, 0], [ 0, 3, 0, 1], [-1,-1,-1,-1]],
    [[ 0, 0, 1, 0], [-1,-1,-1,-1], [ 0, 2,-1, 0], [-1,-1,-1,-1]],
    [[-1,-1,-1,-1], [-1,-1,-1,-1], [ 0, 1, 0,-1], [ 0, 0, 1, 0]],
    [[ 0, 1, 0,-1], [-1,-1,-1,-1], [-1,-1,-1,-1], [ 0, 2,-1, 0]],
    [[-1,-1,-1,-1], [-1,-1,-1,-1], [-1,-1,-1,-1], [-1,-1,-1,-1]],
];

/// Vectorize the level set `alpha >= threshold` of a canvas into closed
/// polygon rings. `ltres`/`qtres` are squared-error thresholds for the
/// line and spline fits; paths shorter than `path_omit` are discarded.
pub fn vectorize_alpha(
    canvas: &Canvas,
    threshold: u8,
    ltres: f64,
    qtres: f64,
    path_omit: usize,
) -> Vec<Vec<(f64, f64)>> {
    let grid = binarize(canvas, threshold);
    let mut polygons = Vec::new();

    for mut layer in layering(&grid) {
        let paths = pathscan(&mut layer, path_omit);
        for path in interpolate_paths(&paths) {
            let segments = trace_path(&path, ltres, qtres);
            if let Some(ring) = assemble_ring(&segments) {
                polygons.push(ring);
            }
        }
    }
    polygons
}

/// Indexed image with a one-pixel border of -1 in every direction.
fn binarize(canvas: &Canvas, threshold: u8) -> Vec<Vec<i16>> {
    let w = canvas.width() as usize;
    let h = canvas.height() as usize;

    let mut grid = vec![vec![0i16; w + 2]; h + 2];
    for row in grid.iter_mut() {
        row[0] = -1;
        row[w + 1] = -1;
    }
    for i in 0..w + 2 {
        grid[0][i] = -1;
        grid[h + 1][i] = -1;
    }

    let pixels = canvas.pixels();
    for y in 0..h {
        for x in 0..w {
            let alpha = pixels[y * w + x].alpha();
            grid[y + 1][x + 1] = (alpha >= threshold) as i16;
        }
    }
    grid
}

/// Edge-node classification, one layer per indexed color (0 and 1).
///
/// Each pixel's code records which of its E/SE/S neighbors share its
/// color; the NW/N/W neighbors retro-write tentative codes into the
/// cells above and to the left.
fn layering(grid: &[Vec<i16>]) -> [Vec<Vec<i16>>; 2] {
    let ah = grid.len();
    let aw = grid[0].len();
    let mut layers = [vec![vec![0i16; aw]; ah], vec![vec![0i16; aw]; ah]];

    for j in 1..ah - 1 {
        for i in 1..aw - 1 {
            let val = grid[j][i];
            if val < 0 {
                continue;
            }
            let eq = |jj: usize, ii: usize| (grid[jj][ii] == val) as i16;
            let n1 = eq(j - 1, i - 1);
            let n2 = eq(j - 1, i);
            let n3 = eq(j - 1, i + 1);
            let n4 = eq(j, i - 1);
            let n5 = eq(j, i + 1);
            let n6 = eq(j + 1, i - 1);
            let n7 = eq(j + 1, i);
            let n8 = eq(j + 1, i + 1);

            let layer = &mut layers[val as usize];
            layer[j + 1][i + 1] = 1 + n5 * 2 + n8 * 4 + n7 * 8;
            if n4 == 0 {
                layer[j + 1][i] = 2 + n7 * 4 + n6 * 8;
            }
            if n2 == 0 {
                layer[j][i + 1] = n3 * 2 + n5 * 4 + 8;
            }
            if n1 == 0 {
                layer[j][i] = n2 * 2 + 4 + n4 * 8;
            }
        }
    }
    layers
}

/// Walk the boundary paths of one layer, consuming edge nodes as it goes.
/// Hole outlines and paths shorter than `path_omit` are discarded.
fn pathscan(layer: &mut [Vec<i16>], path_omit: usize) -> Vec<Vec<(i32, i32, i16)>> {
    let h = layer.len();
    let w = layer[0].len();
    let mut paths = Vec::new();

    for j in 0..h {
        for i in 0..w {
            let code = layer[j][i];
            if code == 0 || code == 15 {
                continue;
            }

            let mut px = i as i32;
            let mut py = j as i32;
            let mut dir = START_DIR[code as usize] as i32;
            let hole = HOLE_PATH[code as usize];
            let mut path: Vec<(i32, i32, i16)> = Vec::new();

            loop {
                let cell = layer[py as usize][px as usize];
                if !(0..16).contains(&cell) {
                    break;
                }
                path.push((px - 1, py - 1, cell));

                let step = STEP_LOOKUP[cell as usize][dir as usize];
                layer[py as usize][px as usize] = step[0] as i16;
                dir = step[1] as i32;
                px += step[2] as i32;
                py += step[3] as i32;

                if px - 1 == path[0].0 && py - 1 == path[0].1 {
                    if !hole && path.len() >= path_omit {
                        paths.push(path);
                    }
                    break;
                }
                // a malformed walk would read outside the table
                if dir < 0 {
                    break;
                }
            }
        }
    }
    paths
}

/// Midpoint interpolation: every path node becomes the midpoint to its
/// successor, tagged with one of 8 directions toward the next midpoint
/// (0 E, 1 SE, 2 S, 3 SW, 4 W, 5 NW, 6 N, 7 NE).
fn interpolate_paths(paths: &[Vec<(i32, i32, i16)>]) -> Vec<Vec<(f64, f64, u8)>> {
    paths
        .iter()
        .map(|path| {
            let n = path.len();
            (0..n)
                .map(|p| {
                    let p1 = path[p];
                    let p2 = path[(p + 1) % n];
                    let p3 = path[(p + 2) % n];
                    let this = ((p1.0 + p2.0) as f64 / 2.0, (p1.1 + p2.1) as f64 / 2.0);
                    let next = ((p2.0 + p3.0) as f64 / 2.0, (p2.1 + p3.1) as f64 / 2.0);
                    (this.0, this.1, direction_tag(this, next))
                })
                .collect()
        })
        .collect()
}

fn direction_tag(this: (f64, f64), next: (f64, f64)) -> u8 {
    if this.0 < next.0 {
        if this.1 < next.1 {
            1 // SE
        } else if this.1 > next.1 {
            7 // NE
        } else {
            0 // E
        }
    } else if this.0 > next.0 {
        if this.1 < next.1 {
            3 // SW
        } else if this.1 > next.1 {
            5 // NW
        } else {
            4 // W
        }
    } else if this.1 < next.1 {
        2 // S
    } else if this.1 > next.1 {
        6 // N
    } else {
        8 // coincident; does not occur on a valid walk
    }
}

/// Split an interpolated path into sequences holding at most two
/// direction tags and fit each sequence.
fn trace_path(path: &[(f64, f64, u8)], ltres: f64, qtres: f64) -> Vec<Segment> {
    let plen = path.len();
    let mut segments = Vec::new();
    if plen < 3 {
        return segments;
    }

    let mut pcnt = 0;
    while pcnt < plen {
        let segtype1 = path[pcnt].2 as i32;
        let mut segtype2 = -1;
        let mut seqend = (pcnt + 1).min(plen - 1);
        while (path[seqend].2 as i32 == segtype1
            || path[seqend].2 as i32 == segtype2
            || segtype2 == -1)
            && seqend < plen - 1
        {
            if path[seqend].2 as i32 != segtype1 && segtype2 == -1 {
                segtype2 = path[seqend].2 as i32;
            }
            seqend += 1;
        }
        if seqend == plen - 1 {
            seqend = 0;
        }

        fit_sequence(path, ltres, qtres, pcnt as i64, seqend as i64, &mut segments);

        if seqend > 0 {
            pcnt = seqend;
        } else {
            pcnt = plen;
        }
    }
    segments
}

/// Fit straight lines and quadratic splines over a (possibly wrapping)
/// index range, splitting at the worst error point until both fits
/// succeed. The recursion is expressed as an explicit worklist.
fn fit_sequence(
    path: &[(f64, f64, u8)],
    ltres: f64,
    qtres: f64,
    seq_start: i64,
    seq_end: i64,
    out: &mut Vec<Segment>,
) {
    let plen = path.len() as i64;
    let at = |i: i64| {
        let p = path[i as usize];
        (p.0, p.1)
    };

    let mut stack = vec![(seq_start, seq_end)];
    while let Some((s, e)) = stack.pop() {
        if e > plen || e < 0 {
            continue;
        }

        let mut tl = (e - s) as f64;
        if tl < 0.0 {
            tl += plen as f64;
        }
        let (sx, sy) = at(s);
        let (ex, ey) = at(e);
        let vx = (ex - sx) / tl;
        let vy = (ey - sy) / tl;

        // straight-line attempt
        let mut error_point = s;
        let mut error_val = 0.0;
        let mut fits = true;
        let mut pcnt = (s + 1).rem_euclid(plen);
        while pcnt != e {
            let mut pl = (pcnt - s) as f64;
            if pl < 0.0 {
                pl += plen as f64;
            }
            let px = sx + vx * pl;
            let py = sy + vy * pl;
            let (x, y) = at(pcnt);
            let dist2 = (x - px) * (x - px) + (y - py) * (y - py);
            if dist2 > ltres {
                fits = false;
            }
            if dist2 > error_val {
                error_point = pcnt;
                error_val = dist2;
            }
            pcnt = (pcnt + 1) % plen;
        }
        if fits {
            out.push(Segment::Line {
                x1: sx,
                y1: sy,
                x2: ex,
                y2: ey,
            });
            continue;
        }

        // quadratic attempt through the worst point
        let fit_point = error_point;
        fits = true;
        error_val = 0.0;

        let t = (fit_point - s) as f64 / tl;
        let t1 = (1.0 - t) * (1.0 - t);
        let t2 = 2.0 * (1.0 - t) * t;
        let t3 = t * t;
        let (fx, fy) = at(fit_point);
        let cpx = ((t1 * sx + t3 * ex) - fx) / -t2;
        let cpy = ((t1 * sy + t3 * ey) - fy) / -t2;

        let mut pcnt = (s + 1).rem_euclid(plen);
        while pcnt != e {
            let mut pl = (pcnt - s) as f64;
            if pl < 0.0 {
                pl += plen as f64;
            }
            let t = pl / tl;
            let t1 = (1.0 - t) * (1.0 - t);
            let t2 = 2.0 * (1.0 - t) * t;
            let t3 = t * t;
            let px = t1 * sx + t2 * cpx + t3 * ex;
            let py = t1 * sy + t2 * cpy + t3 * ey;
            let (x, y) = at(pcnt);
            let dist2 = (x - px) * (x - px) + (y - py) * (y - py);
            if dist2 > qtres {
                fits = false;
            }
            if dist2 > error_val {
                error_point = pcnt;
                error_val = dist2;
            }
            pcnt = (pcnt + 1) % plen;
        }
        if fits {
            out.push(Segment::Quad {
                x1: sx,
                y1: sy,
                cx: cpx,
                cy: cpy,
                x2: ex,
                y2: ey,
            });
            continue;
        }

        // split at the midpoint between fit point and worst point;
        // pushed right-then-left so segments emit in path order
        let split = (fit_point + error_point) / 2;
        stack.push((split, e));
        stack.push((s, split));
    }
}

/// Flatten segments into a coordinate ring. Rings are kept only when
/// they have more than two points and close on themselves; 4-segment
/// rings starting at the image origin are frame artifacts and dropped.
fn assemble_ring(segments: &[Segment]) -> Option<Vec<(f64, f64)>> {
    let mut coords: Vec<(f64, f64)> = Vec::new();
    for segment in segments {
        match *segment {
            Segment::Line { x1, y1, x2, y2 } => {
                coords.push((x1, y1));
                coords.push((x2, y2));
            }
            Segment::Quad {
                x1,
                y1,
                cx,
                cy,
                x2,
                y2,
            } => flatten_quad(x1, y1, cx, cy, x2, y2, 0.5, &mut coords),
        }
    }

    if coords.len() <= 2 {
        return None;
    }
    let first = coords[0];
    let last = coords[coords.len() - 1];
    let (fx, fy) = (first.0.round() as i64, first.1.round() as i64);
    let (lx, ly) = (last.0.round() as i64, last.1.round() as i64);
    if fx != lx || fy != ly {
        return None;
    }
    let frame_artifact =
        segments.len() == 4 && matches!((fx, fy), (0, 0) | (1, 0) | (0, 1));
    if frame_artifact {
        return None;
    }
    Some(coords)
}

/// Flatten a quadratic Bezier at the given tolerance, emitting the start
/// point and every subdivision endpoint.
fn flatten_quad(
    x1: f64,
    y1: f64,
    cx: f64,
    cy: f64,
    x2: f64,
    y2: f64,
    flatness: f64,
    out: &mut Vec<(f64, f64)>,
) {
    out.push((x1, y1));
    subdivide_quad(x1, y1, cx, cy, x2, y2, flatness * flatness, 10, out);
}

fn subdivide_quad(
    x1: f64,
    y1: f64,
    cx: f64,
    cy: f64,
    x2: f64,
    y2: f64,
    flat_sq: f64,
    depth: u32,
    out: &mut Vec<(f64, f64)>,
) {
    if depth == 0 || point_segment_dist_sq(x1, y1, x2, y2, cx, cy) <= flat_sq {
        out.push((x2, y2));
        return;
    }
    // de Casteljau split at t = 0.5
    let lx = (x1 + cx) / 2.0;
    let ly = (y1 + cy) / 2.0;
    let rx = (cx + x2) / 2.0;
    let ry = (cy + y2) / 2.0;
    let mx = (lx + rx) / 2.0;
    let my = (ly + ry) / 2.0;
    subdivide_quad(x1, y1, lx, ly, mx, my, flat_sq, depth - 1, out);
    subdivide_quad(mx, my, rx, ry, x2, y2, flat_sq, depth - 1, out);
}

/// Squared distance from point (px, py) to the segment (x1, y1)-(x2, y2).
fn point_segment_dist_sq(x1: f64, y1: f64, x2: f64, y2: f64, px: f64, py: f64) -> f64 {
    let dx = x2 - x1;
    let dy = y2 - y1;
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((px - x1) * dx + (py - y1) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let qx = x1 + t * dx - px;
    let qy = y1 + t * dy - py;
    qx * qx + qy * qy
}

#[cfg(test)]
mod tests {
    use super::*;
    use map_common::Color;

    fn canvas_with_block(size: u32, x0: i32, y0: i32, x1: i32, y1: i32) -> Canvas {
        let mut canvas = Canvas::new(size, size).unwrap();
        for y in y0..=y1 {
            for x in x0..=x1 {
                canvas.set_pixel(x, y, Color::rgba(0, 0, 0, 255));
            }
        }
        canvas
    }

    #[test]
    fn test_step_lookup_invalid_rows() {
        // codes 0 and 15 are interior pixels and never walked
        for dir in 0..4 {
            assert_eq!(STEP_LOOKUP[0][dir], [-1, -1, -1, -1]);
            assert_eq!(STEP_LOOKUP[15][dir], [-1, -1, -1, -1]);
        }
    }

    #[test]
    fn test_step_lookup_moves_are_unit_steps() {
        for code in 1..15 {
            for dir in 0..4 {
                let row = STEP_LOOKUP[code][dir];
                if row[0] < 0 {
                    assert_eq!(row, [-1, -1, -1, -1], "code {} dir {}", code, dir);
                    continue;
                }
                // replacement codes come from the consumed-cell set
                assert!(
                    [0, 7, 11, 13, 14].contains(&row[0]),
                    "code {} dir {}",
                    code,
                    dir
                );
                assert!((0..4).contains(&row[1]), "code {} dir {}", code, dir);
                // exactly one axis moves, by one cell
                assert_eq!(
                    row[2].abs() + row[3].abs(),
                    1,
                    "code {} dir {}",
                    code,
                    dir
                );
            }
        }
    }

    #[test]
    fn test_start_dir_enters_valid_transition() {
        for code in 1..15 {
            let dir = START_DIR[code] as usize;
            assert!(
                STEP_LOOKUP[code][dir][0] >= 0,
                "start direction for code {} hits an invalid row",
                code
            );
        }
    }

    #[test]
    fn test_saddle_codes_valid_in_all_directions() {
        for code in [5usize, 10] {
            for dir in 0..4 {
                assert!(STEP_LOOKUP[code][dir][0] >= 0, "code {} dir {}", code, dir);
            }
        }
    }

    #[test]
    fn test_hole_flags() {
        let holes: Vec<usize> = (0..16).filter(|&c| HOLE_PATH[c]).collect();
        assert_eq!(holes, vec![7, 11, 13, 14]);
    }

    #[test]
    fn test_direction_tags() {
        let origin = (0.0, 0.0);
        assert_eq!(direction_tag(origin, (1.0, 0.0)), 0); // E
        assert_eq!(direction_tag(origin, (1.0, 1.0)), 1); // SE
        assert_eq!(direction_tag(origin, (0.0, 1.0)), 2); // S
        assert_eq!(direction_tag(origin, (-1.0, 1.0)), 3); // SW
        assert_eq!(direction_tag(origin, (-1.0, 0.0)), 4); // W
        assert_eq!(direction_tag(origin, (-1.0, -1.0)), 5); // NW
        assert_eq!(direction_tag(origin, (0.0, -1.0)), 6); // N
        assert_eq!(direction_tag(origin, (1.0, -1.0)), 7); // NE
    }

    #[test]
    fn test_layering_flat_region_is_interior() {
        // a uniform image has no edges except against the -1 border
        let canvas = canvas_with_block(4, 0, 0, 3, 3);
        let grid = binarize(&canvas, 1);
        let layers = layering(&grid);
        // the center of layer 1 is interior (code 15)
        assert_eq!(layers[1][3][3], 15);
    }

    #[test]
    fn test_vectorize_block_outline() {
        let canvas = canvas_with_block(16, 6, 6, 9, 9);
        let polygons = vectorize_alpha(&canvas, 128, 1.0, 1.0, 8);
        assert_eq!(polygons.len(), 1);

        let ring = &polygons[0];
        assert!(ring.len() > 2);
        assert_eq!(ring.first(), ring.last());
        // outline hugs the block
        for &(x, y) in ring {
            assert!((5.0..=10.5).contains(&x), "x {}", x);
            assert!((5.0..=10.5).contains(&y), "y {}", y);
        }
    }

    #[test]
    fn test_vectorize_discards_tiny_blobs() {
        // a single pixel produces a 4-node path, below the omit threshold
        let canvas = canvas_with_block(16, 8, 8, 8, 8);
        let polygons = vectorize_alpha(&canvas, 128, 1.0, 1.0, 8);
        assert!(polygons.is_empty());
    }

    #[test]
    fn test_vectorize_two_blobs() {
        let mut canvas = canvas_with_block(24, 3, 3, 7, 7);
        for y in 14..20 {
            for x in 14..20 {
                canvas.set_pixel(x, y, Color::rgba(0, 0, 0, 255));
            }
        }
        let polygons = vectorize_alpha(&canvas, 128, 1.0, 1.0, 8);
        assert_eq!(polygons.len(), 2);
        for ring in &polygons {
            assert_eq!(ring.first(), ring.last());
        }
    }

    #[test]
    fn test_threshold_selects_level_set() {
        let mut canvas = Canvas::new(12, 12).unwrap();
        for y in 0..12 {
            for x in 0..12 {
                let a = if (3..9).contains(&x) && (3..9).contains(&y) {
                    200
                } else {
                    50
                };
                canvas.set_pixel(x, y, Color::rgba(0, 0, 0, a));
            }
        }
        // at a high threshold only the inner block binarizes to 1
        let polygons = vectorize_alpha(&canvas, 100, 1.0, 1.0, 8);
        assert_eq!(polygons.len(), 1);
        for &(x, y) in &polygons[0] {
            assert!((2.0..=9.5).contains(&x));
            assert!((2.0..=9.5).contains(&y));
        }
    }

    #[test]
    fn test_flatten_quad_endpoints_and_tolerance() {
        let mut out = Vec::new();
        flatten_quad(0.0, 0.0, 5.0, 10.0, 10.0, 0.0, 0.5, &mut out);
        assert_eq!(out[0], (0.0, 0.0));
        assert_eq!(*out.last().unwrap(), (10.0, 0.0));
        assert!(out.len() > 3);
        // every emitted point lies on or near the curve's hull
        for &(x, y) in &out {
            assert!((0.0..=10.0).contains(&x));
            assert!((-0.01..=5.01).contains(&y));
        }
    }

    #[test]
    fn test_fit_sequence_straight_line() {
        // collinear east-tagged points collapse to a single line segment
        let path: Vec<(f64, f64, u8)> = (0..10).map(|i| (i as f64, 0.0, 0)).collect();
        let mut out = Vec::new();
        fit_sequence(&path, 1.0, 1.0, 0, 9, &mut out);
        assert_eq!(out.len(), 1);
        match out[0] {
            Segment::Line { x1, y1, x2, y2 } => {
                assert_eq!((x1, y1), (0.0, 0.0));
                assert_eq!((x2, y2), (9.0, 0.0));
            }
            _ => panic!("expected a line fit"),
        }
    }

    #[test]
    fn test_fit_sequence_splits_sharp_corner() {
        // an L-shape cannot be one line or one quad within tolerance
        let mut path: Vec<(f64, f64, u8)> = (0..8).map(|i| (i as f64, 0.0, 0)).collect();
        path.extend((1..8).map(|i| (7.0, i as f64, 2)));
        let mut out = Vec::new();
        fit_sequence(&path, 0.5, 0.5, 0, path.len() as i64 - 1, &mut out);
        assert!(out.len() >= 2);
    }
}
