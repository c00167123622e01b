use log::{debug, info, warn};

use crate::cell::{CellData, CellKind};
use crate::geometry::{Region, Side};
use crate::grid::Grid;
use crate::index_space::range2d;




/**
 * What a region does to one grid point inside its mapped rectangle.
 */
#[derive(Clone, Copy, Debug, PartialEq)]
enum Stamp {
    Edge(Side),
    Corner(Side, Side),
    Inside,
}




/**
 * Rasterize the regions onto a grid of the given shape. The union bounding
 * box of the regions is mapped onto the grid, leaving a one-point margin on
 * each side. Regions are applied in order, so a later region overwrites an
 * earlier one wherever they overlap. Active regions get a one-point border
 * of boundary placeholders around their interior cells; solid regions place
 * their border inside their own extent, and void their interior.
 *
 * Degenerate input does not fail: an empty region list gives a grid of void
 * points, and a region whose rectangle rounds to nothing is skipped.
 */
pub fn make_whole_grid<R: Region>(shape: (usize, usize), regions: &[R]) -> Grid {
    let mut grid = Grid::with_shape(shape);

    let first = match regions.first() {
        Some(first) => first,
        None => {
            warn!("no regions given, the grid will be empty");
            return grid;
        }
    };

    let mut lb = first.point();
    let mut rt = lb;

    for region in regions {
        let (x, y) = region.point();
        let (w, h) = extent(region);
        lb = (lb.0.min(x), lb.1.min(y));
        rt = (rt.0.max(x + w), rt.1.max(y + h));
    }

    let scale = (
        axis_scale(rt.0 - lb.0, shape.0),
        axis_scale(rt.1 - lb.1, shape.1),
    );

    for (n, region) in regions.iter().enumerate() {
        let (x, y) = region.point();
        let (w, h) = extent(region);
        let lower = (x - lb.0, y - lb.1);
        let upper = (lower.0 + w, lower.1 + h);

        let mut i0 = (lower.0 * scale.0) as i64 + 1;
        let mut j0 = (lower.1 * scale.1) as i64 + 1;
        let mut i1 = (upper.0 * scale.0) as i64 + 1;
        let mut j1 = (upper.1 * scale.1) as i64 + 1;

        if !region.is_solid() {
            i0 -= 1;
            j0 -= 1;
            i1 += 1;
            j1 += 1;
        }

        if i1 <= i0 || j1 <= j0 {
            debug!("region {} maps to an empty rectangle, skipping", n);
            continue;
        }
        stamp_region(&mut grid, region, (i0, j0), (i1 - 1, j1 - 1));
    }

    info!(
        "built whole grid {}x{} with {} cells from {} regions",
        shape.0,
        shape.1,
        grid.count_present(),
        regions.len()
    );
    grid
}




// ============================================================================
fn extent<R: Region>(region: &R) -> (f64, f64) {
    let (w, h) = region.size();
    (w.max(0.0), h.max(0.0))
}

fn axis_scale(physical: f64, points: usize) -> f64 {
    if physical > 0.0 {
        points.saturating_sub(2) as f64 / physical
    } else {
        0.0
    }
}

fn normalize(offset: i64, span: i64) -> f64 {
    if span > 0 {
        offset as f64 / span as f64
    } else {
        0.0
    }
}




/**
 * Classify a point against the inclusive rectangle `lower ..= upper`. Edges
 * exclude the corners; corners are only classified for solid regions. Points
 * outside the rectangle, and corners of active regions, are left alone.
 */
fn classify(index: (i64, i64), lower: (i64, i64), upper: (i64, i64), solid: bool) -> Option<Stamp> {
    let (x, y) = index;
    let inner_x = x > lower.0 && x < upper.0;
    let inner_y = y > lower.1 && y < upper.1;

    if inner_x && y == lower.1 {
        Some(Stamp::Edge(Side::Bottom))
    } else if inner_x && y == upper.1 {
        Some(Stamp::Edge(Side::Top))
    } else if x == lower.0 && inner_y {
        Some(Stamp::Edge(Side::Left))
    } else if x == upper.0 && inner_y {
        Some(Stamp::Edge(Side::Right))
    } else if solid && x == lower.0 && y == lower.1 {
        Some(Stamp::Corner(Side::Bottom, Side::Left))
    } else if solid && x == lower.0 && y == upper.1 {
        Some(Stamp::Corner(Side::Left, Side::Top))
    } else if solid && x == upper.0 && y == lower.1 {
        Some(Stamp::Corner(Side::Bottom, Side::Right))
    } else if solid && x == upper.0 && y == upper.1 {
        Some(Stamp::Corner(Side::Top, Side::Right))
    } else if inner_x && inner_y {
        Some(Stamp::Inside)
    } else {
        None
    }
}




/**
 * Apply one region to every grid point of its inclusive rectangle
 * `lower ..= upper`, clipped to the grid.
 */
fn stamp_region<R: Region>(grid: &mut Grid, region: &R, lower: (i64, i64), upper: (i64, i64)) {
    let solid = region.is_solid();
    let rect = range2d(lower.0..upper.0 + 1, lower.1..upper.1 + 1).intersect(grid.space());

    for index in rect.iter() {
        let point = (
            normalize(index.0 - lower.0, upper.0 - lower.0),
            normalize(index.1 - lower.1, upper.1 - lower.1),
        );
        let along = |side: Side| match side {
            Side::Bottom | Side::Top => point.0,
            Side::Left | Side::Right => point.1,
        };

        let cell = match classify(index, lower, upper, solid) {
            None => continue,
            Some(Stamp::Edge(side)) => {
                let mut data = CellData::new(CellKind::BoundaryPlaceholder);
                region.edge_fill(side, along(side), &mut data);
                Some(data)
            }
            Some(Stamp::Corner(a, b)) => {
                let mut data = CellData::new(CellKind::BoundaryPlaceholder);
                region.edge_fill(a, along(a), &mut data);
                region.edge_fill(b, along(b), &mut data);
                Some(data)
            }
            Some(Stamp::Inside) if solid => None,
            Some(Stamp::Inside) => {
                let mut data = CellData::new(CellKind::Interior);
                region.main_fill(point, &mut data);
                Some(data)
            }
        };
        grid.set(index, cell);
    }
}
