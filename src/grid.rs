use std::convert::TryFrom;
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::cell::CellData;
use crate::index_space::IndexSpace;




#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGrid")]


/**
 * A dense 2D container of optional cells. Points are addressed by absolute
 * `(x, y)` indexes inside the grid's index space, or by flat offset relative
 * to the start of that space. A `None` entry is a void point, outside the
 * simulated domain.
 *
 * Cells keep their absolute coordinates across `resize` and `crop`, which is
 * what lets a slab cut from a whole-domain grid keep addressing its cells
 * (and its halo cells' origins) in whole-domain coordinates.
 */
pub struct Grid {
    space: IndexSpace,
    cells: Vec<Option<CellData>>,
}




// ============================================================================
impl Grid {


    /**
     * Create a grid of void points covering the given index space.
     */
    pub fn new(space: IndexSpace) -> Self {
        let cells = vec![None; space.len()];
        Self { space, cells }
    }


    pub fn with_shape(shape: (usize, usize)) -> Self {
        Self::new(IndexSpace::with_shape(shape))
    }


    pub fn space(&self) -> &IndexSpace {
        &self.space
    }


    /**
     * Return the number of points on each axis (present or void).
     */
    pub fn dim(&self) -> (usize, usize) {
        self.space.dim()
    }


    /**
     * Return the total number of points (present or void).
     */
    pub fn len(&self) -> usize {
        self.cells.len()
    }


    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }


    pub fn to_flat_index(&self, index: (i64, i64)) -> usize {
        self.space.flat_offset(index)
    }


    pub fn to_point(&self, offset: usize) -> (i64, i64) {
        self.space.point_at(offset)
    }


    /**
     * Return the cell at the given index, or `None` if the point is void or
     * outside the grid.
     */
    pub fn get(&self, index: (i64, i64)) -> Option<&CellData> {
        if self.space.contains(index) {
            self.cells[self.space.flat_offset(index)].as_ref()
        } else {
            None
        }
    }


    pub fn get_mut(&mut self, index: (i64, i64)) -> Option<&mut CellData> {
        if self.space.contains(index) {
            let n = self.space.flat_offset(index);
            self.cells[n].as_mut()
        } else {
            None
        }
    }


    pub fn get_by_index(&self, offset: usize) -> Option<&CellData> {
        self.cells.get(offset).and_then(Option::as_ref)
    }


    /**
     * Put a cell (or a void) at the given index. Panics if the index is
     * outside the grid.
     */
    pub fn set(&mut self, index: (i64, i64), cell: Option<CellData>) {
        self.validate_index(index);
        let n = self.space.flat_offset(index);
        self.cells[n] = cell;
    }


    /**
     * Return the number of present (non-void) cells.
     */
    pub fn count_present(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }


    /**
     * Return the number of present cells in the given column.
     */
    pub fn count_present_in_column(&self, x: i64) -> usize {
        self.column(x).filter(|c| c.is_some()).count()
    }


    fn column(&self, x: i64) -> impl Iterator<Item = &Option<CellData>> {
        let (_, m) = self.dim();
        let range = if self.space.columns().contains(&x) {
            let n = (x - self.space.start().0) as usize * m;
            n..n + m
        } else {
            0..0
        };
        self.cells[range].iter()
    }


    /**
     * Iterate over the present cells in flat-offset order, with their
     * absolute indexes.
     */
    pub fn iter(&self) -> impl Iterator<Item = ((i64, i64), &CellData)> + '_ {
        self.space
            .iter()
            .zip(self.cells.iter())
            .filter_map(|(index, cell)| cell.as_ref().map(|c| (index, c)))
    }


    /**
     * Shift the lower corner of the grid by `shift` and give it a new shape,
     * expanding or cropping as needed. Cells keep their absolute indexes;
     * cells falling outside the new bounds are dropped.
     */
    pub fn resize(&mut self, shift: (i64, i64), shape: (usize, usize)) {
        let space = self.space.reshape(shift, shape);
        let mut cells = vec![None; space.len()];

        for index in self.space.intersect(&space).iter() {
            let n = self.space.flat_offset(index);
            cells[space.flat_offset(index)] = self.cells[n].take();
        }
        self.space = space;
        self.cells = cells;
    }


    /**
     * Crop the grid to the bounding box of its present cells. A grid with no
     * present cells is cropped to zero size at its lower corner.
     */
    pub fn crop(&mut self) {
        let (x0, y0) = self.space.start();
        let bounds = self.iter().fold(None, |bounds: Option<(i64, i64, i64, i64)>, ((x, y), _)| {
            Some(match bounds {
                None => (x, y, x + 1, y + 1),
                Some((i0, j0, i1, j1)) => (i0.min(x), j0.min(y), i1.max(x + 1), j1.max(y + 1)),
            })
        });

        match bounds {
            Some((i0, j0, i1, j1)) => {
                let shape = ((i1 - i0) as usize, (j1 - j0) as usize);
                self.resize((i0 - x0, j0 - y0), shape)
            }
            None => self.resize((0, 0), (0, 0)),
        }
    }


    /**
     * Render one row of the cell-type map over the given columns.
     */
    fn render_row(&self, y: i64, columns: Range<i64>) -> String {
        columns
            .map(|x| self.get((x, y)).map_or(' ', CellData::code))
            .collect()
    }


    fn validate_index(&self, index: (i64, i64)) {
        if !self.space.contains(index) {
            let (i0, j0) = self.space.start();
            let (i1, j1) = self.space.end();
            panic!("index ({} {}) out of range on grid ({}..{} {}..{})",
                index.0,
                index.1,
                i0,
                i1,
                j0,
                j1);
        }
    }
}




/**
 * Prints the cell-type map: `0` interior, `1` boundary placeholder, `P`
 * external halo, blank for void. One line per row.
 */
impl fmt::Display for Grid {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (_, j0) = self.space.start();
        let (_, j1) = self.space.end();

        for y in j0..j1 {
            writeln!(fmt, "{}", self.render_row(y, self.space.columns()))?;
        }
        Ok(())
    }
}




/**
 * Render several grids next to each other, one line per row in `rows`,
 * separated by a blank column. Useful for printing the slabs of a partition.
 */
pub fn render_side_by_side<'a, I>(grids: I, rows: Range<i64>) -> String
where
    I: IntoIterator<Item = &'a Grid> + Clone,
{
    rows.map(|y| {
        grids
            .clone()
            .into_iter()
            .map(|g| g.render_row(y, g.space.columns()))
            .collect::<Vec<_>>()
            .join(" ")
    })
    .collect::<Vec<_>>()
    .join("\n")
}




#[derive(Deserialize)]


/**
 * Unchecked wire form of a grid. Converting it into a `Grid` checks that the
 * cell buffer matches the index space.
 */
struct RawGrid {
    space: IndexSpace,
    cells: Vec<Option<CellData>>,
}

impl TryFrom<RawGrid> for Grid {
    type Error = String;

    fn try_from(raw: RawGrid) -> Result<Self, Self::Error> {
        if raw.cells.len() != raw.space.len() {
            return Err(format!(
                "grid holds {} cells but its extent has {}",
                raw.cells.len(),
                raw.space.len()
            ));
        }
        Ok(Self {
            space: raw.space,
            cells: raw.cells,
        })
    }
}
