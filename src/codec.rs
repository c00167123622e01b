//! Byte encoding of everything that crosses a process boundary: slabs and
//! grids at setup, identifier lists and halo payloads during synchronization,
//! and the run configuration. The encoding is CBOR. Decoding a grid validates
//! it, so a malformed buffer is an error rather than a half-built grid.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Error;

/// Encode a value into a fresh byte buffer.
///
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, Error> {
    let mut buffer = Vec::new();
    ciborium::ser::into_writer(value, &mut buffer).map_err(|e| Error::Encode(e.to_string()))?;
    Ok(buffer)
}

/// Decode a value from a byte buffer. The whole buffer must be consumed.
///
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
    let mut reader = bytes;
    let value = ciborium::de::from_reader(&mut reader).map_err(|e| Error::Decode(e.to_string()))?;

    if !reader.is_empty() {
        return Err(Error::Decode(format!("{} trailing bytes", reader.len())));
    }
    Ok(value)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cell::{BoundaryType, CellData, CellKind, Params};
    use crate::grid::Grid;
    use crate::index_space::range2d;
    use crate::partition::{split_grid, Slab};

    fn mixed_grid() -> Grid {
        let mut grid = Grid::new(range2d(-1..3, 0..2));

        let mut interior = CellData::new(CellKind::Interior);
        interior.params_mut().set(0, 1.5, 0.25, 3.0);
        interior.params_mut().species_mut(1).heat_flow = (0.1, -0.2);
        interior.set_step((0.1, 0.1, 0.0));

        let mut wall = CellData::new(CellKind::BoundaryPlaceholder);
        wall.set_boundary_type(0, BoundaryType::Diffuse);
        wall.boundary_params_mut().set_temp(0, 2.0);

        grid.set((-1, 0), Some(interior.to_halo(17, 4)));
        grid.set((0, 1), Some(wall));
        grid.set((2, 0), Some(interior));
        grid
    }

    #[test]
    fn grid_survives_encoding() {
        let grid = mixed_grid();
        let decoded: Grid = decode(&encode(&grid).unwrap()).unwrap();
        assert_eq!(decoded, grid);
        assert_eq!(
            decoded.get((-1, 0)).unwrap().kind(),
            CellKind::ExternalHalo {
                origin_index: 17,
                owner_rank: 4
            }
        );
    }

    #[test]
    fn slab_survives_encoding() {
        let mut whole = Grid::with_shape((6, 3));
        for x in 0..6 {
            for y in 0..3 {
                whole.set((x, y), Some(CellData::new(CellKind::Interior)));
            }
        }
        for slab in split_grid(&whole, 3) {
            let decoded: Slab = decode(&encode(&slab).unwrap()).unwrap();
            assert_eq!(decoded, slab);
        }
    }

    #[test]
    fn payload_lists_survive_encoding() {
        let ids = vec![3usize, 1, 4, 1, 5];
        assert_eq!(decode::<Vec<usize>>(&encode(&ids).unwrap()).unwrap(), ids);

        let mut p = Params::new(2);
        p.set(1, 1.0, 2.0, 3.0);
        let payloads = vec![p.clone(), Params::new(1), p];
        assert_eq!(decode::<Vec<Params>>(&encode(&payloads).unwrap()).unwrap(), payloads);
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let bytes = encode(&mixed_grid()).unwrap();
        let result: Result<Grid, _> = decode(&bytes[..bytes.len() / 2]);
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = encode(&vec![1usize, 2, 3]).unwrap();
        bytes.push(0);
        assert!(decode::<Vec<usize>>(&bytes).is_err());
    }

    #[test]
    fn grid_with_wrong_cell_count_is_rejected() {
        #[derive(serde::Serialize)]
        struct Forged {
            space: crate::index_space::IndexSpace,
            cells: Vec<Option<CellData>>,
        }
        let forged = Forged {
            space: range2d(0..3, 0..3),
            cells: vec![None; 4],
        };
        let result: Result<Grid, _> = decode(&encode(&forged).unwrap());
        assert!(matches!(result, Err(Error::Decode(_))));
    }
}
