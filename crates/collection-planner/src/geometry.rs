//! Geometry Decomposer
//!
//! Splits an area of interest into swath-sized strips. Work happens in a
//! local equirectangular projection centred on the AOI bounding box, which
//! keeps distances in kilometres and is affine in lon/lat, so straight edges
//! stay straight in both spaces.
//!
//! Strips are slabs cut across the longer bounding-box axis at swath
//! intervals and clipped to the polygon (Sutherland-Hodgman against the two
//! slab half-planes). Slabs whose clipped area falls below
//! `min_sliver_fraction × swath × strip length` are merged into a neighbour.

use crate::config::DecomposerConfig;
use crate::model::{AreaOfInterest, BoundingBox, Coordinate, Geometry, ScanDirection, Strip, StripId};
use crate::{PlannerError, Result};
use orbital_mechanics::geodesy::EARTH_MEAN_RADIUS_KM;
use tracing::{debug, instrument};

/// Numerical slack for slab counting (km)
const SLAB_EPSILON_KM: f64 = 1e-9;

/// Polygons below this area are treated as degenerate (km²)
const MIN_POLYGON_AREA_KM2: f64 = 1e-9;

// ============================================================================
// Projection
// ============================================================================

/// Equirectangular projection around a fixed origin, output in km
#[derive(Debug, Clone, Copy)]
pub struct LocalProjection {
    origin: Coordinate,
    cos_lat: f64,
}

impl LocalProjection {
    pub fn centred_on(origin: Coordinate) -> Self {
        Self {
            origin,
            cos_lat: origin.lat.to_radians().cos().max(1e-6),
        }
    }

    pub fn project(&self, c: Coordinate) -> (f64, f64) {
        let x = EARTH_MEAN_RADIUS_KM * (c.lon - self.origin.lon).to_radians() * self.cos_lat;
        let y = EARTH_MEAN_RADIUS_KM * (c.lat - self.origin.lat).to_radians();
        (x, y)
    }

    pub fn unproject(&self, x: f64, y: f64) -> Coordinate {
        let lon = self.origin.lon + (x / (EARTH_MEAN_RADIUS_KM * self.cos_lat)).to_degrees();
        let lat = self.origin.lat + (y / EARTH_MEAN_RADIUS_KM).to_degrees();
        Coordinate::new(lon, lat)
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Reject geometries the decomposer cannot work with
pub fn validate_geometry(geometry: &Geometry) -> Result<()> {
    match geometry {
        Geometry::Point(c) => {
            if !c.is_valid() {
                return Err(PlannerError::Geometry(format!(
                    "point ({}, {}) outside WGS84 bounds",
                    c.lon, c.lat
                )));
            }
            Ok(())
        }
        Geometry::Polygon(ring) => validate_ring(ring),
    }
}

fn validate_ring(ring: &[Coordinate]) -> Result<()> {
    if ring.len() < 4 {
        return Err(PlannerError::Geometry(format!(
            "polygon ring needs at least 4 positions, got {}",
            ring.len()
        )));
    }
    if let Some(bad) = ring.iter().find(|c| !c.is_valid()) {
        return Err(PlannerError::Geometry(format!(
            "vertex ({}, {}) outside WGS84 bounds",
            bad.lon, bad.lat
        )));
    }
    if ring.first() != ring.last() {
        return Err(PlannerError::Geometry("polygon ring is not closed".into()));
    }

    let bbox = BoundingBox::from_coordinates(ring)
        .ok_or_else(|| PlannerError::Geometry("empty polygon".into()))?;
    if bbox.max_lon - bbox.min_lon > 180.0 {
        return Err(PlannerError::Geometry(
            "polygon spans more than 180° of longitude (antimeridian crossing unsupported)".into(),
        ));
    }

    let ring = dedup_consecutive(ring);
    if ring.len() < 4 {
        return Err(PlannerError::Geometry(
            "polygon has fewer than 3 distinct vertices".into(),
        ));
    }
    if let Some((i, j)) = find_self_intersection(&ring) {
        return Err(PlannerError::Geometry(format!(
            "polygon is self-intersecting (edges {} and {})",
            i, j
        )));
    }

    let proj = LocalProjection::centred_on(bbox.center());
    if ring_area_km2(&ring, &proj) <= MIN_POLYGON_AREA_KM2 {
        return Err(PlannerError::Geometry("polygon has zero area".into()));
    }
    Ok(())
}

fn dedup_consecutive(ring: &[Coordinate]) -> Vec<Coordinate> {
    let mut out: Vec<Coordinate> = Vec::with_capacity(ring.len());
    for c in ring {
        if out.last() != Some(c) {
            out.push(*c);
        }
    }
    out
}

/// First pair of non-adjacent edges that touch, if any
fn find_self_intersection(ring: &[Coordinate]) -> Option<(usize, usize)> {
    let edges = ring.len() - 1;
    for i in 0..edges {
        for j in (i + 1)..edges {
            let adjacent = j == i + 1 || (i == 0 && j == edges - 1);
            if adjacent {
                continue;
            }
            if segments_intersect(ring[i], ring[i + 1], ring[j], ring[j + 1]) {
                return Some((i, j));
            }
        }
    }
    None
}

fn orient(a: Coordinate, b: Coordinate, c: Coordinate) -> f64 {
    (b.lon - a.lon) * (c.lat - a.lat) - (b.lat - a.lat) * (c.lon - a.lon)
}

fn on_segment(a: Coordinate, b: Coordinate, p: Coordinate) -> bool {
    p.lon >= a.lon.min(b.lon)
        && p.lon <= a.lon.max(b.lon)
        && p.lat >= a.lat.min(b.lat)
        && p.lat <= a.lat.max(b.lat)
}

fn segments_intersect(p1: Coordinate, p2: Coordinate, p3: Coordinate, p4: Coordinate) -> bool {
    let d1 = orient(p3, p4, p1);
    let d2 = orient(p3, p4, p2);
    let d3 = orient(p1, p2, p3);
    let d4 = orient(p1, p2, p4);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }
    (d1 == 0.0 && on_segment(p3, p4, p1))
        || (d2 == 0.0 && on_segment(p3, p4, p2))
        || (d3 == 0.0 && on_segment(p1, p2, p3))
        || (d4 == 0.0 && on_segment(p1, p2, p4))
}

// ============================================================================
// Planar helpers
// ============================================================================

type Point2 = (f64, f64);

fn signed_area(points: &[Point2]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..points.len() {
        let (x0, y0) = points[i];
        let (x1, y1) = points[(i + 1) % points.len()];
        sum += x0 * y1 - x1 * y0;
    }
    sum / 2.0
}

/// Shoelace area of a lon/lat ring in km²
pub fn ring_area_km2(ring: &[Coordinate], proj: &LocalProjection) -> f64 {
    let points: Vec<Point2> = open_ring(ring).iter().map(|c| proj.project(*c)).collect();
    signed_area(&points).abs()
}

fn open_ring(ring: &[Coordinate]) -> &[Coordinate] {
    match (ring.first(), ring.last()) {
        (Some(first), Some(last)) if ring.len() > 1 && first == last => &ring[..ring.len() - 1],
        _ => ring,
    }
}

fn centroid(points: &[Point2]) -> Point2 {
    let area = signed_area(points);
    if area.abs() < MIN_POLYGON_AREA_KM2 {
        let n = points.len().max(1) as f64;
        let (sx, sy) = points
            .iter()
            .fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
        return (sx / n, sy / n);
    }
    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..points.len() {
        let (x0, y0) = points[i];
        let (x1, y1) = points[(i + 1) % points.len()];
        let cross = x0 * y1 - x1 * y0;
        cx += (x0 + x1) * cross;
        cy += (y0 + y1) * cross;
    }
    (cx / (6.0 * area), cy / (6.0 * area))
}

/// Clip against `axis >= lo` then `axis <= hi`
fn clip_to_slab(points: &[Point2], along_x: bool, lo: f64, hi: f64) -> Vec<Point2> {
    let coord = move |p: &Point2| if along_x { p.0 } else { p.1 };
    let lower = clip_half_plane(points, |p| coord(p) - lo, along_x, lo);
    clip_half_plane(&lower, |p| hi - coord(p), along_x, hi)
}

fn clip_half_plane<F>(points: &[Point2], inside: F, along_x: bool, boundary: f64) -> Vec<Point2>
where
    F: Fn(&Point2) -> f64,
{
    let mut out = Vec::with_capacity(points.len() + 2);
    if points.is_empty() {
        return out;
    }
    for i in 0..points.len() {
        let current = points[i];
        let previous = points[(i + points.len() - 1) % points.len()];
        let (dc, dp) = (inside(&current), inside(&previous));

        if dc >= 0.0 {
            if dp < 0.0 {
                out.push(intersect_axis(previous, current, along_x, boundary));
            }
            out.push(current);
        } else if dp >= 0.0 {
            out.push(intersect_axis(previous, current, along_x, boundary));
        }
    }
    out
}

fn intersect_axis(a: Point2, b: Point2, along_x: bool, boundary: f64) -> Point2 {
    if along_x {
        let t = (boundary - a.0) / (b.0 - a.0);
        (boundary, a.1 + t * (b.1 - a.1))
    } else {
        let t = (boundary - a.1) / (b.1 - a.1);
        (a.0 + t * (b.0 - a.0), boundary)
    }
}

fn extent(points: &[Point2], along_x: bool) -> (f64, f64) {
    points.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
        let v = if along_x { p.0 } else { p.1 };
        (lo.min(v), hi.max(v))
    })
}

// ============================================================================
// Decomposition
// ============================================================================

/// Slab of the sweep axis and the polygon piece inside it
struct Slab {
    lo: f64,
    hi: f64,
    piece: Vec<Point2>,
    area: f64,
}

impl Slab {
    fn cut(points: &[Point2], along_x: bool, lo: f64, hi: f64) -> Self {
        let piece = clip_to_slab(points, along_x, lo, hi);
        let area = signed_area(&piece).abs();
        Self { lo, hi, piece, area }
    }
}

/// Decompose with default decomposer settings
pub fn decompose(area: &AreaOfInterest, swath_width_km: f64) -> Result<Vec<Strip>> {
    decompose_with(area, swath_width_km, &DecomposerConfig::default())
}

/// Split `area` into strips no wider than `swath_width_km` (merged slivers
/// excepted), numbered in scan order.
#[instrument(skip(area, config), fields(area_km2 = area.area_km2()))]
pub fn decompose_with(
    area: &AreaOfInterest,
    swath_width_km: f64,
    config: &DecomposerConfig,
) -> Result<Vec<Strip>> {
    if !(swath_width_km.is_finite() && swath_width_km > 0.0) {
        return Err(PlannerError::Validation(format!(
            "swath width must be positive, got {}",
            swath_width_km
        )));
    }

    if !(0.0..1.0).contains(&config.strip_overlap) {
        return Err(PlannerError::Config(format!(
            "strip overlap must be in [0, 1), got {}",
            config.strip_overlap
        )));
    }

    let ring = match area.geometry() {
        Geometry::Point(c) => return Ok(vec![point_strip(*c)]),
        Geometry::Polygon(ring) => ring,
    };

    let proj = LocalProjection::centred_on(area.bounding_box().center());
    let points: Vec<Point2> = open_ring(ring).iter().map(|c| proj.project(*c)).collect();

    let (min_x, max_x) = extent(&points, true);
    let (min_y, max_y) = extent(&points, false);
    let along_x = (max_x - min_x) >= (max_y - min_y);
    let (sweep_min, sweep_max) = if along_x { (min_x, max_x) } else { (min_y, max_y) };
    let strip_length = if along_x { max_y - min_y } else { max_x - min_x };
    let sweep = sweep_max - sweep_min;

    let mut slabs = if sweep <= swath_width_km {
        vec![Slab::cut(&points, along_x, sweep_min, sweep_max)]
    } else {
        let step = swath_width_km * (1.0 - config.strip_overlap);
        let count = ((sweep - swath_width_km) / step - SLAB_EPSILON_KM).ceil().max(0.0) as usize + 1;
        (0..count)
            .map(|i| {
                let lo = sweep_min + i as f64 * step;
                let hi = (lo + swath_width_km).min(sweep_max);
                Slab::cut(&points, along_x, lo, hi)
            })
            .collect()
    };

    let threshold = config.min_sliver_fraction * swath_width_km * strip_length;
    merge_slivers(&mut slabs, &points, along_x, threshold);

    let strips: Vec<Strip> = slabs
        .iter()
        .enumerate()
        .map(|(i, slab)| {
            let overlap_prev = i
                .checked_sub(1)
                .map(|p| (slabs[p].hi - slab.lo).max(0.0))
                .unwrap_or(0.0);
            let overlap_next = slabs
                .get(i + 1)
                .map(|n| (slab.hi - n.lo).max(0.0))
                .unwrap_or(0.0);
            let width = slab.hi - slab.lo;
            let overlap = if width > 0.0 {
                ((overlap_prev + overlap_next) / width).min(1.0)
            } else {
                0.0
            };
            build_strip(i as u32, slab, along_x, overlap, config.boustrophedon, &proj)
        })
        .collect();

    debug!(
        "Decomposed {:.1} km² into {} strips (swath {:.1} km)",
        area.area_km2(),
        strips.len(),
        swath_width_km
    );
    Ok(strips)
}

fn merge_slivers(slabs: &mut Vec<Slab>, points: &[Point2], along_x: bool, threshold: f64) {
    while slabs.len() > 1 {
        let Some(idx) = slabs.iter().position(|s| s.area < threshold) else {
            break;
        };
        let neighbour = if idx > 0 { idx - 1 } else { idx + 1 };
        let (a, b) = (idx.min(neighbour), idx.max(neighbour));
        let lo = slabs[a].lo.min(slabs[b].lo);
        let hi = slabs[a].hi.max(slabs[b].hi);
        debug!("Merging sliver slab {} ({:.3} km²) into {}", idx, slabs[idx].area, neighbour);
        slabs[a] = Slab::cut(points, along_x, lo, hi);
        slabs.remove(b);
    }
}

fn build_strip(
    index: u32,
    slab: &Slab,
    along_x: bool,
    overlap: f64,
    boustrophedon: bool,
    proj: &LocalProjection,
) -> Strip {
    let (c_x, c_y) = centroid(&slab.piece);
    let (w_lo, w_hi) = extent(&slab.piece, along_x);
    let (l_lo, l_hi) = extent(&slab.piece, !along_x);

    let mut polygon: Vec<Coordinate> = slab.piece.iter().map(|(x, y)| proj.unproject(*x, *y)).collect();
    if let Some(first) = polygon.first().copied() {
        polygon.push(first);
    }

    let scan_direction = if boustrophedon && index % 2 == 1 {
        ScanDirection::Descending
    } else {
        ScanDirection::Ascending
    };

    Strip {
        id: StripId(index),
        sequence_index: index,
        polygon,
        centroid: proj.unproject(c_x, c_y),
        area_km2: slab.area,
        width_km: (w_hi - w_lo).max(0.0),
        length_km: (l_hi - l_lo).max(0.0),
        overlap_fraction_with_neighbors: overlap,
        scan_direction,
    }
}

fn point_strip(c: Coordinate) -> Strip {
    Strip {
        id: StripId(0),
        sequence_index: 0,
        polygon: vec![c],
        centroid: c,
        area_km2: 0.0,
        width_km: 0.0,
        length_km: 0.0,
        overlap_fraction_with_neighbors: 0.0,
        scan_direction: ScanDirection::Ascending,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Axis-aligned rectangle of the given size (km), centred on `centre`
    pub(crate) fn rectangle_km(centre: Coordinate, width_km: f64, height_km: f64) -> AreaOfInterest {
        let proj = LocalProjection::centred_on(centre);
        let (hw, hh) = (width_km / 2.0, height_km / 2.0);
        let ring = vec![
            proj.unproject(-hw, -hh),
            proj.unproject(hw, -hh),
            proj.unproject(hw, hh),
            proj.unproject(-hw, hh),
            proj.unproject(-hw, -hh),
        ];
        AreaOfInterest::new(Geometry::Polygon(ring)).unwrap()
    }

    fn total_area(strips: &[Strip]) -> f64 {
        strips.iter().map(|s| s.area_km2).sum()
    }

    #[test]
    fn test_scenario_1_long_rectangle_yields_five_strips() {
        let aoi = rectangle_km(Coordinate::new(0.0, 0.0), 500.0, 50.0);
        assert!((aoi.area_km2() - 25_000.0).abs() < 25_000.0 * 0.001);

        let strips = decompose(&aoi, 100.0).unwrap();
        assert_eq!(strips.len(), 5);
        for (i, strip) in strips.iter().enumerate() {
            assert_eq!(strip.sequence_index, i as u32);
            assert!((strip.width_km - 100.0).abs() < 0.5, "{}", strip.width_km);
            assert!((strip.length_km - 50.0).abs() < 0.5);
        }
        let total = total_area(&strips);
        assert!((total - 25_000.0).abs() / 25_000.0 < 0.01, "{}", total);
    }

    #[test]
    fn test_tall_rectangle_sweeps_latitude() {
        let aoi = rectangle_km(Coordinate::new(30.0, 45.0), 40.0, 300.0);
        let strips = decompose(&aoi, 100.0).unwrap();
        assert_eq!(strips.len(), 3);
        // strips advance northwards
        assert!(strips[0].centroid.lat < strips[1].centroid.lat);
        assert!(strips[1].centroid.lat < strips[2].centroid.lat);
    }

    #[test]
    fn test_narrow_area_is_single_strip() {
        let aoi = rectangle_km(Coordinate::new(10.0, 10.0), 80.0, 30.0);
        let strips = decompose(&aoi, 100.0).unwrap();
        assert_eq!(strips.len(), 1);
        assert!((strips[0].area_km2 - aoi.area_km2()).abs() < 1e-6);
        assert_eq!(strips[0].polygon.first(), strips[0].polygon.last());
    }

    #[test]
    fn test_point_is_single_degenerate_strip() {
        let aoi = AreaOfInterest::new(Geometry::Point(Coordinate::new(2.35, 48.85))).unwrap();
        let strips = decompose(&aoi, 100.0).unwrap();
        assert_eq!(strips.len(), 1);
        assert_eq!(strips[0].area_km2, 0.0);
        assert_eq!(strips[0].centroid, Coordinate::new(2.35, 48.85));
    }

    #[test]
    fn test_sliver_is_merged_into_neighbour() {
        let aoi = rectangle_km(Coordinate::new(0.0, 0.0), 500.5, 50.0);
        let strips = decompose(&aoi, 100.0).unwrap();
        assert_eq!(strips.len(), 5);
        assert!((strips[4].width_km - 100.5).abs() < 0.5);
        let total = total_area(&strips);
        assert!((total - aoi.area_km2()).abs() / aoi.area_km2() < 1e-6);
    }

    #[test]
    fn test_boustrophedon_alternates() {
        let aoi = rectangle_km(Coordinate::new(0.0, 0.0), 300.0, 20.0);
        let strips = decompose(&aoi, 100.0).unwrap();
        let dirs: Vec<_> = strips.iter().map(|s| s.scan_direction).collect();
        assert_eq!(
            dirs,
            vec![ScanDirection::Ascending, ScanDirection::Descending, ScanDirection::Ascending]
        );

        let config = DecomposerConfig {
            boustrophedon: false,
            ..Default::default()
        };
        let strips = decompose_with(&aoi, 100.0, &config).unwrap();
        assert!(strips.iter().all(|s| s.scan_direction == ScanDirection::Ascending));
    }

    #[test]
    fn test_strip_overlap_reported() {
        let aoi = rectangle_km(Coordinate::new(0.0, 0.0), 500.0, 50.0);
        let config = DecomposerConfig {
            strip_overlap: 0.2,
            ..Default::default()
        };
        let strips = decompose_with(&aoi, 100.0, &config).unwrap();
        assert_eq!(strips.len(), 6);
        assert!(strips[0].overlap_fraction_with_neighbors > 0.19);
        assert!(strips[2].overlap_fraction_with_neighbors > 0.39);
    }

    #[test]
    fn test_concave_polygon_area_preserved() {
        // L-shape, ~2° by 2° with a 1° notch
        let ring = vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(2.0, 0.0),
            Coordinate::new(2.0, 1.0),
            Coordinate::new(1.0, 1.0),
            Coordinate::new(1.0, 2.0),
            Coordinate::new(0.0, 2.0),
            Coordinate::new(0.0, 0.0),
        ];
        let aoi = AreaOfInterest::new(Geometry::Polygon(ring)).unwrap();
        let strips = decompose(&aoi, 50.0).unwrap();
        assert!(strips.len() >= 4);
        let total = total_area(&strips);
        assert!((total - aoi.area_km2()).abs() / aoi.area_km2() < 0.01);
    }

    #[test]
    fn test_bowtie_rejected() {
        let ring = vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(1.0, 1.0),
            Coordinate::new(1.0, 0.0),
            Coordinate::new(0.0, 1.0),
            Coordinate::new(0.0, 0.0),
        ];
        let err = AreaOfInterest::new(Geometry::Polygon(ring)).unwrap_err();
        assert!(matches!(err, PlannerError::Geometry(_)));
        assert!(err.to_string().contains("self-intersecting"));
    }

    #[test]
    fn test_degenerate_and_open_rings_rejected() {
        let collinear = vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(1.0, 0.0),
            Coordinate::new(2.0, 0.0),
            Coordinate::new(0.0, 0.0),
        ];
        assert!(AreaOfInterest::new(Geometry::Polygon(collinear)).is_err());

        let open = vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(1.0, 0.0),
            Coordinate::new(1.0, 1.0),
            Coordinate::new(0.0, 1.0),
        ];
        let err = AreaOfInterest::new(Geometry::Polygon(open)).unwrap_err();
        assert!(err.to_string().contains("not closed"));
    }

    #[test]
    fn test_out_of_bounds_and_antimeridian_rejected() {
        let out = vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(1.0, 0.0),
            Coordinate::new(1.0, 91.0),
            Coordinate::new(0.0, 0.0),
        ];
        assert!(AreaOfInterest::new(Geometry::Polygon(out)).is_err());

        let wide = vec![
            Coordinate::new(-179.0, 0.0),
            Coordinate::new(179.0, 0.0),
            Coordinate::new(179.0, 1.0),
            Coordinate::new(-179.0, 1.0),
            Coordinate::new(-179.0, 0.0),
        ];
        assert!(AreaOfInterest::new(Geometry::Polygon(wide)).is_err());
    }

    #[test]
    fn test_invalid_swath_rejected() {
        let aoi = rectangle_km(Coordinate::new(0.0, 0.0), 100.0, 10.0);
        assert!(matches!(decompose(&aoi, 0.0), Err(PlannerError::Validation(_))));
        assert!(decompose(&aoi, f64::NAN).is_err());
    }

    #[test]
    fn test_full_overlap_rejected() {
        let aoi = rectangle_km(Coordinate::new(0.0, 0.0), 500.0, 50.0);
        for strip_overlap in [1.0, -0.1, f64::NAN] {
            let config = DecomposerConfig {
                strip_overlap,
                ..Default::default()
            };
            assert!(matches!(
                decompose_with(&aoi, 100.0, &config),
                Err(PlannerError::Config(_))
            ));
        }
    }

    proptest! {
        #[test]
        fn prop_coverage_completeness(
            width in 20.0f64..900.0,
            height in 20.0f64..900.0,
            swath in 10.0f64..200.0,
            lat in -60.0f64..60.0,
            lon in -170.0f64..170.0,
        ) {
            let aoi = rectangle_km(Coordinate::new(lon, lat), width, height);
            let strips = decompose(&aoi, swath).unwrap();
            let total = total_area(&strips);
            prop_assert!((total - aoi.area_km2()).abs() / aoi.area_km2() < 0.01);
            prop_assert!(!strips.is_empty());
            for (i, s) in strips.iter().enumerate() {
                prop_assert_eq!(s.id, StripId(i as u32));
            }
        }
    }
}
