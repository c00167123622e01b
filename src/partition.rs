use core::ops::Range;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::cell::{CellData, CellKind, Params};
use crate::error::Error;
use crate::grid::Grid;
use crate::index_space::IndexSpace;




#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]


/**
 * One partition of the whole-domain grid: a contiguous range of columns that
 * this rank owns, plus halo columns replicating cells owned by the adjacent
 * ranks. Cells keep their whole-domain coordinates, so a halo cell sits at the
 * point its `origin_index` names in the whole-domain index space.
 */
pub struct Slab {
    rank: usize,
    columns: Range<i64>,
    whole: IndexSpace,
    grid: Grid,
}




// ============================================================================
impl Slab {


    /**
     * Wrap a whole-domain grid as the only slab of a single-rank run.
     */
    pub fn whole(grid: Grid) -> Self {
        Self {
            rank: 0,
            columns: grid.space().columns(),
            whole: grid.space().clone(),
            grid,
        }
    }


    pub fn rank(&self) -> usize {
        self.rank
    }


    /**
     * Return the range of whole-domain columns owned by this slab.
     */
    pub fn columns(&self) -> Range<i64> {
        self.columns.clone()
    }


    /**
     * Return the index space of the whole-domain grid this slab was cut from.
     */
    pub fn whole_space(&self) -> &IndexSpace {
        &self.whole
    }


    pub fn grid(&self) -> &Grid {
        &self.grid
    }


    /**
     * Return true if the cell at this whole-domain point is owned here (not a
     * halo replica).
     */
    pub fn owns(&self, index: (i64, i64)) -> bool {
        self.columns.contains(&index.0) && self.grid.get(index).map_or(false, |c| !c.is_halo())
    }


    /**
     * Iterate over the halo cells with their whole-domain flat index and
     * owning rank.
     */
    pub fn halo_cells(&self) -> impl Iterator<Item = (usize, usize, &CellData)> + '_ {
        self.grid.iter().filter_map(|(_, cell)| match cell.kind() {
            CellKind::ExternalHalo { origin_index, owner_rank } => {
                Some((origin_index, owner_rank, cell))
            }
            _ => None,
        })
    }


    /**
     * Return the payload of the owned cell at the given whole-domain flat
     * index, as requested by a neighbor holding a replica of it.
     */
    pub fn owned_params(&self, origin_index: usize) -> Result<&Params, Error> {
        let index = self.origin_point(origin_index)?;

        if self.owns(index) {
            self.grid.get(index).map(CellData::params).ok_or(Error::UnknownOrigin(origin_index))
        } else {
            Err(Error::UnknownOrigin(origin_index))
        }
    }


    /**
     * Overwrite the payload of the halo replica of the given whole-domain
     * cell. Only the halo synchronizer writes halo payloads.
     */
    pub(crate) fn write_halo(&mut self, origin_index: usize, params: Params) -> Result<(), Error> {
        let index = self.origin_point(origin_index)?;

        match self.grid.get_mut(index) {
            Some(cell) if cell.is_halo() => {
                *cell.params_mut() = params;
                Ok(())
            }
            _ => Err(Error::UnknownOrigin(origin_index)),
        }
    }


    /**
     * Overwrite the payload of an owned interior cell. Any other target is
     * refused, so that integrators cannot touch boundary or halo cells.
     */
    pub fn write_interior(&mut self, index: (i64, i64), params: Params) -> Result<(), Error> {
        let owned = self.columns.contains(&index.0);

        match self.grid.get_mut(index) {
            Some(cell) if owned && cell.is_interior() => {
                *cell.params_mut() = params;
                Ok(())
            }
            _ => Err(Error::HaloWrite(index)),
        }
    }


    fn origin_point(&self, origin_index: usize) -> Result<(i64, i64), Error> {
        if origin_index < self.whole.len() {
            Ok(self.whole.point_at(origin_index))
        } else {
            Err(Error::UnknownOrigin(origin_index))
        }
    }
}




/**
 * Split the columns of a grid into `num_slabs` contiguous ranges of roughly
 * equal load, measured in present cells. The target load is `total /
 * num_slabs`; slab `k` is closed after the first column at which the running
 * count reaches `target * (k + 1)`, at most one slab per column, and the last
 * slab takes whatever is left (including the remainder of the division).
 * Exactly `num_slabs` ranges are returned; trailing ranges are empty if the
 * grid runs out of columns.
 */
pub fn column_ranges(grid: &Grid, num_slabs: usize) -> Vec<Range<i64>> {
    let total = grid.count_present();
    let target = total / num_slabs.max(1);
    let columns = grid.space().columns();
    let mut ranges = Vec::with_capacity(num_slabs);
    let mut first = columns.start;
    let mut running = 0;

    for x in columns.clone() {
        running += grid.count_present_in_column(x);

        if ranges.len() + 1 < num_slabs && running >= target * (ranges.len() + 1) {
            ranges.push(first..x + 1);
            first = x + 1;
        }
    }
    while ranges.len() < num_slabs {
        ranges.push(first..columns.end);
        first = columns.end;
    }
    ranges
}




/**
 * Split a whole-domain grid into `num_slabs` slabs (see `column_ranges`).
 * Each non-empty slab receives its owned columns, plus, as halo replicas of
 * the neighbors' interior cells, the column just left of its range (owned by
 * `rank - 1`) and up to two columns right of it (owned by `rank + 1`). Halo
 * columns are only taken from columns the neighbor actually owns. Each slab's
 * grid is cropped to the bounding box of its cells.
 *
 * Asking for more slabs than there are columns or cells is not an error: the
 * surplus slabs are empty.
 */
pub fn split_grid(grid: &Grid, num_slabs: usize) -> Vec<Slab> {
    if num_slabs == 0 {
        warn!("asked to split the grid into zero slabs");
        return Vec::new();
    }

    let ranges = column_ranges(grid, num_slabs);

    if grid.count_present() < num_slabs {
        warn!(
            "splitting {} cells into {} slabs, some slabs will be empty",
            grid.count_present(),
            num_slabs
        );
    }

    ranges
        .iter()
        .enumerate()
        .map(|(rank, range)| {
            let slab = make_slab(grid, &ranges, rank);
            info!(
                "slab {} owns columns {}..{} with {} cells ({} halo)",
                rank,
                range.start,
                range.end,
                slab.grid.count_present(),
                slab.halo_cells().count()
            );
            slab
        })
        .collect()
}




// ============================================================================
fn make_slab(whole: &Grid, ranges: &[Range<i64>], rank: usize) -> Slab {
    let columns = ranges[rank].clone();
    let space = whole.space();

    let left = match rank.checked_sub(1).map(|r| &ranges[r]) {
        Some(prev) if !columns.is_empty() && prev.contains(&(columns.start - 1)) => {
            columns.start - 1..columns.start
        }
        _ => columns.start..columns.start,
    };
    let right = match ranges.get(rank + 1) {
        Some(next) if !columns.is_empty() && next.start == columns.end => {
            columns.end..(columns.end + 2).min(next.end)
        }
        _ => columns.end..columns.end,
    };

    let mut grid = Grid::new(space.select_columns(left.start..right.end));

    for index in space.select_columns(columns.clone()).iter() {
        if let Some(cell) = whole.get(index) {
            grid.set(index, Some(cell.clone()));
        }
    }

    let halos = [(left, rank.wrapping_sub(1)), (right, rank + 1)];

    for (halo_columns, owner) in halos.iter() {
        for index in space.select_columns(halo_columns.clone()).iter() {
            if let Some(cell) = whole.get(index).filter(|c| !c.is_placeholder()) {
                grid.set(index, Some(cell.to_halo(whole.to_flat_index(index), *owner)));
            }
        }
    }
    grid.crop();

    Slab {
        rank,
        columns,
        whole: space.clone(),
        grid,
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;
    use crate::cell::MacroParams;
    use crate::geometry::{default_boxes, EdgeFill, GridBox, MainFill};
    use crate::index_space::range2d;
    use crate::meshing::make_whole_grid;

    fn full_box_grid(shape: (usize, usize)) -> Grid {
        let b = GridBox::new((0.0, 0.0), (1.0, 1.0), false)
            .with_main(MainFill::uniform(vec![MacroParams::new(1.0, 1.0, 1.0)]))
            .with_walls(EdgeFill::diffuse(0, 1.0));
        make_whole_grid(shape, &[b])
    }

    fn row_grid(width: usize) -> Grid {
        let mut grid = Grid::with_shape((width, 1));
        for x in 0..width as i64 {
            grid.set((x, 0), Some(CellData::new(CellKind::Interior)));
        }
        grid
    }

    fn halo_columns(slab: &Slab) -> Vec<i64> {
        let mut columns: Vec<_> = slab
            .grid()
            .iter()
            .filter(|(_, c)| c.is_halo())
            .map(|((x, _), _)| x)
            .collect();
        columns.dedup();
        columns
    }

    /// Check that the owned cells of the slabs reproduce the whole grid exactly,
    /// and that every halo refers to an adjacent column owned by an adjacent rank.
    fn check_partition(whole: &Grid, slabs: &[Slab], num_slabs: usize) {
        assert_eq!(slabs.len(), num_slabs);

        let mut seen = Grid::new(whole.space().clone());

        for slab in slabs {
            for (index, cell) in slab.grid().iter() {
                match cell.kind() {
                    CellKind::ExternalHalo { origin_index, owner_rank } => {
                        let (x, _) = whole.to_point(origin_index);
                        assert_eq!(whole.to_point(origin_index), index);
                        assert!(whole.get(index).unwrap().is_interior());
                        assert!(slabs[owner_rank].columns().contains(&x));
                        if x < slab.columns().start {
                            assert_eq!(x, slab.columns().start - 1);
                            assert_eq!(owner_rank + 1, slab.rank());
                        } else {
                            assert!(x == slab.columns().end || x == slab.columns().end + 1);
                            assert_eq!(owner_rank, slab.rank() + 1);
                        }
                    }
                    _ => {
                        assert!(slab.columns().contains(&index.0));
                        assert!(seen.get(index).is_none(), "cell ({:?}) owned twice", index);
                        assert_eq!(whole.get(index), Some(cell));
                        seen.set(index, Some(cell.clone()));
                    }
                }
            }
        }
        assert_eq!(&seen, whole);
    }

    #[test]
    fn ten_by_ten_into_three() {
        let whole = full_box_grid((10, 10));
        let slabs = split_grid(&whole, 3);
        check_partition(&whole, &slabs, 3);

        assert_eq!(slabs[0].columns(), 0..4);
        assert_eq!(slabs[1].columns(), 4..7);
        assert_eq!(slabs[2].columns(), 7..10);

        assert_eq!(halo_columns(&slabs[0]), vec![4, 5]);
        assert_eq!(halo_columns(&slabs[1]), vec![3, 7, 8]);
        assert_eq!(halo_columns(&slabs[2]), vec![6]);

        // Halo columns hold only interior cells, and the grid is cropped.
        assert_eq!(slabs[1].grid().space(), &range2d(3..9, 0..10));
        assert_eq!(slabs[1].halo_cells().count(), 24);
        assert!(slabs[1].grid().get((3, 0)).is_none());
    }

    #[test]
    fn partitions_cover_the_whole_grid() {
        for &shape in &[(10, 10), (12, 12), (20, 16), (7, 30)] {
            let whole = make_whole_grid(shape, &default_boxes());
            for num_slabs in 1..=9 {
                check_partition(&whole, &split_grid(&whole, num_slabs), num_slabs);
            }
        }
    }

    #[test]
    fn single_slab_has_no_halo() {
        let whole = full_box_grid((10, 10));
        let slabs = split_grid(&whole, 1);
        assert_eq!(slabs[0].halo_cells().count(), 0);
        assert_eq!(slabs[0].grid().count_present(), whole.count_present());
    }

    #[test]
    fn last_slab_takes_the_remainder() {
        let whole = row_grid(5);
        assert_eq!(column_ranges(&whole, 2), vec![0..2, 2..5]);
    }

    #[test]
    fn halo_is_limited_to_columns_the_neighbor_owns() {
        let whole = row_grid(5);
        let slabs = split_grid(&whole, 4);
        check_partition(&whole, &slabs, 4);
        assert_eq!(slabs[2].columns(), 2..3);
        assert_eq!(halo_columns(&slabs[1]), vec![0, 2]);
        assert_eq!(halo_columns(&slabs[2]), vec![1, 3, 4]);
    }

    #[test]
    fn more_slabs_than_cells_gives_empty_slabs() {
        let whole = full_box_grid((4, 4));
        assert_eq!(whole.count_present(), 12);

        let slabs = split_grid(&whole, 20);
        check_partition(&whole, &slabs, 20);
        assert!(slabs[10].grid().is_empty());
        assert_eq!(slabs[10].halo_cells().count(), 0);
    }

    #[test]
    fn zero_slabs_is_empty() {
        assert!(split_grid(&full_box_grid((4, 4)), 0).is_empty());
    }

    #[test]
    fn halo_and_interior_writes_are_guarded() {
        let whole = full_box_grid((10, 10));
        let mut slabs = split_grid(&whole, 3);
        let slab = &mut slabs[1];
        let params = Params::new(1);

        assert!(slab.write_interior((5, 5), params.clone()).is_ok());
        assert!(matches!(slab.write_interior((7, 5), params.clone()), Err(Error::HaloWrite(_))));
        assert!(matches!(slab.write_interior((4, 0), params.clone()), Err(Error::HaloWrite(_))));

        let origin = whole.to_flat_index((7, 5));
        assert!(slab.write_halo(origin, params.clone()).is_ok());
        assert!(slab.write_halo(whole.to_flat_index((5, 5)), params.clone()).is_err());
        assert!(slab.owned_params(whole.to_flat_index((5, 5))).is_ok());
        assert!(slab.owned_params(origin).is_err());
        assert!(slab.owned_params(10_000).is_err());
    }
}
