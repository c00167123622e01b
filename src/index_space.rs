use core::ops::Range;
use std::convert::TryFrom;
use serde::{Deserialize, Serialize};




#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawIndexSpace")]


/**
 * Represents a rectangular region in a discrete 2D index space. The first
 * axis is `x` (columns) and the second is `y` (rows within a column). Flat
 * offsets increase fastest along `y`, so a contiguous range of offsets is a
 * run of whole columns, possibly with a partial column at either end.
 */
pub struct IndexSpace {
    di: Range<i64>,
    dj: Range<i64>,
}




/**
 * Describes a rectangular index space. The index type is signed 64-bit
 * integer. Unlike a patch area, an index space may be empty on either axis;
 * slabs with no columns are legitimate.
 */
impl IndexSpace {


    pub fn new(di: Range<i64>, dj: Range<i64>) -> Self {

        assert!(
            di.start <= di.end && dj.start <= dj.end,
            "index space has negative volume");

        Self { di, dj }
    }


    /**
     * An index space anchored at the origin with the given shape.
     */
    pub fn with_shape(shape: (usize, usize)) -> Self {
        Self::new(0..shape.0 as i64, 0..shape.1 as i64)
    }


    /**
     * Return the number of indexes on each axis.
     */
    pub fn dim(&self) -> (usize, usize) {
        ((self.di.end - self.di.start) as usize,
         (self.dj.end - self.dj.start) as usize)
    }


    /**
     * Return the number of elements in this index space.
     */
    pub fn len(&self) -> usize {
        let (l, m) = self.dim();
        l * m
    }


    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }


    /**
     * Return the minimum index (inclusive).
     */
    pub fn start(&self) -> (i64, i64) {
        (self.di.start, self.dj.start)
    }


    /**
     * Return the maximum index (exclusive).
     */
    pub fn end(&self) -> (i64, i64) {
        (self.di.end, self.dj.end)
    }


    /**
     * Return the range of columns covered by this index space.
     */
    pub fn columns(&self) -> Range<i64> {
        self.di.clone()
    }


    /**
     * Determine whether this index space contains the given index.
     */
    pub fn contains(&self, index: (i64, i64)) -> bool {
        self.di.contains(&index.0) && self.dj.contains(&index.1)
    }


    /**
     * Return the intersection of this index space with another one. The
     * result is empty (but well-formed) if they do not overlap.
     */
    pub fn intersect(&self, other: &Self) -> Self {
        let i0 = self.di.start.max(other.di.start);
        let j0 = self.dj.start.max(other.dj.start);
        let i1 = self.di.end.min(other.di.end).max(i0);
        let j1 = self.dj.end.min(other.dj.end).max(j0);
        Self::new(i0..i1, j0..j1)
    }


    /**
     * Shift the lower corner by `shift` and give the result a new shape.
     */
    pub fn reshape(&self, shift: (i64, i64), shape: (usize, usize)) -> Self {
        let i0 = self.di.start + shift.0;
        let j0 = self.dj.start + shift.1;
        Self::new(i0..i0 + shape.0 as i64, j0..j0 + shape.1 as i64)
    }


    /**
     * Return the sub-space containing only the given range of columns,
     * clipped to this space.
     */
    pub fn select_columns(&self, columns: Range<i64>) -> Self {
        self.intersect(&Self::new(columns, self.dj.clone()))
    }


    /**
     * Return the linear offset for the given index, in a column-major memory
     * buffer aligned with the start of this index space (the `y` index
     * increases fastest).
     */
    pub fn flat_offset(&self, index: (i64, i64)) -> usize {
        let i = (index.0 - self.di.start) as usize;
        let j = (index.1 - self.dj.start) as usize;
        let m = (self.dj.end - self.dj.start) as usize;
        i * m + j
    }


    /**
     * Inverse of `flat_offset`.
     */
    pub fn point_at(&self, offset: usize) -> (i64, i64) {
        let m = (self.dj.end - self.dj.start) as usize;
        (self.di.start + (offset / m) as i64, self.dj.start + (offset % m) as i64)
    }


    /**
     * Return an iterator which traverses the index space in flat-offset
     * order (the final index increases fastest).
     */
    pub fn iter(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.di.clone().map(move |i| self.dj.clone().map(move |j| (i, j))).flatten()
    }
}




// ============================================================================
impl From<(Range<i64>, Range<i64>)> for IndexSpace {
    fn from(range: (Range<i64>, Range<i64>)) -> Self {
        Self::new(range.0, range.1)
    }
}

impl From<IndexSpace> for (Range<i64>, Range<i64>) {
    fn from(space: IndexSpace) -> Self {
        (space.di, space.dj)
    }
}




#[derive(Deserialize)]
struct RawIndexSpace {
    di: Range<i64>,
    dj: Range<i64>,
}

impl TryFrom<RawIndexSpace> for IndexSpace {
    type Error = String;

    fn try_from(raw: RawIndexSpace) -> Result<Self, Self::Error> {
        if raw.di.start <= raw.di.end && raw.dj.start <= raw.dj.end {
            Ok(Self { di: raw.di, dj: raw.dj })
        } else {
            Err(format!("index space has negative volume ({:?} {:?})", raw.di, raw.dj))
        }
    }
}




/**
 * Less imposing factory function to construct an IndexSpace object.
 */
pub fn range2d(di: Range<i64>, dj: Range<i64>) -> IndexSpace {
    IndexSpace::new(di, dj)
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{range2d, IndexSpace};

    #[test]
    fn flat_offsets_are_column_major() {
        let space = range2d(2..5, 10..14);
        assert_eq!(space.flat_offset((2, 10)), 0);
        assert_eq!(space.flat_offset((2, 11)), 1);
        assert_eq!(space.flat_offset((3, 10)), 4);
        assert_eq!(space.point_at(4), (3, 10));
        assert_eq!(space.point_at(11), (4, 13));
    }

    #[test]
    fn flat_offsets_are_bijective() {
        let space = range2d(-3..4, 1..6);
        for (n, index) in space.iter().enumerate() {
            assert_eq!(space.flat_offset(index), n);
            assert_eq!(space.point_at(n), index);
        }
        assert_eq!(space.iter().count(), space.len());
    }

    #[test]
    fn intersection_of_disjoint_spaces_is_empty() {
        let a = range2d(0..4, 0..4);
        let b = range2d(6..8, 0..4);
        assert!(a.intersect(&b).is_empty());
        assert_eq!(a.intersect(&range2d(2..8, 1..2)), range2d(2..4, 1..2));
    }

    #[test]
    fn reshape_keeps_absolute_coordinates() {
        let space = IndexSpace::with_shape((10, 10));
        let grown = space.reshape((-1, 0), (12, 10));
        assert_eq!(grown.start(), (-1, 0));
        assert_eq!(grown.end(), (11, 10));
        assert_eq!(space.select_columns(8..20), range2d(8..10, 0..10));
    }
}
