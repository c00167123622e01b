use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::Error;
use crate::geometry::{default_boxes, GridBox};
use crate::grid::Grid;
use crate::meshing::make_whole_grid;




#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]


/**
 * Everything a run needs to know, resolved on the coordinator and shared with
 * every peer before the grid is built. Passed by reference to the builder and
 * the solver loop.
 */
pub struct Config {
    pub name: String,
    pub grid_size: (usize, usize),
    pub num_species: usize,
    pub max_iteration: usize,
    pub log_every: usize,
    pub geometry: Vec<GridBox>,
}




// ============================================================================
impl Config {


    /**
     * Names accepted by `Config::preset`.
     */
    pub const PRESETS: [&'static str; 2] = ["debug_1", "more_bigger"];


    /**
     * Return one of the named run presets, over the default geometry.
     */
    pub fn preset(name: &str) -> Result<Self, Error> {
        let (grid_size, max_iteration, log_every) = match name {
            "debug_1" => ((10, 10), 5, 1),
            "more_bigger" => ((8, 8), 100, 10),
            _ => {
                return Err(Error::Config(format!(
                    "unknown preset '{}' (expected one of {})",
                    name,
                    Self::PRESETS.join(", ")
                )))
            }
        };
        Ok(Self {
            name: name.to_string(),
            grid_size,
            num_species: 1,
            max_iteration,
            log_every,
            geometry: default_boxes(),
        })
    }


    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path)?;
        let config: Self = ciborium::de::from_reader(BufReader::new(file))
            .map_err(|e| Error::Config(format!("unreadable config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }


    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let file = File::create(path)?;
        ciborium::ser::into_writer(self, BufWriter::new(file)).map_err(|e| Error::Encode(e.to_string()))
    }


    pub fn validate(&self) -> Result<(), Error> {
        let (w, h) = self.grid_size;

        if w < 3 || h < 3 {
            return Err(Error::Config(format!("grid size {}x{} is below 3x3", w, h)));
        }
        if self.num_species == 0 {
            return Err(Error::Config("at least one species is required".into()));
        }
        if self.log_every == 0 {
            return Err(Error::Config("log_every must be positive".into()));
        }
        Ok(())
    }


    /**
     * Build the whole-domain grid for this configuration. Every present cell
     * carries at least `num_species` species.
     */
    pub fn build_grid(&self) -> Grid {
        let mut grid = make_whole_grid(self.grid_size, &self.geometry);
        let points: Vec<_> = grid.iter().map(|(index, _)| index).collect();

        for index in points {
            if let Some(cell) = grid.get_mut(index) {
                if cell.params().num_species() < self.num_species {
                    cell.params_mut().species_mut(self.num_species - 1);
                }
            }
        }
        grid
    }


    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        codec::encode(self)
    }


    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let config: Self = codec::decode(bytes)?;
        config.validate()?;
        Ok(config)
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn presets_are_valid() {
        for name in Config::PRESETS.iter() {
            let config = Config::preset(name).unwrap();
            assert_eq!(&config.name, name);
            config.validate().unwrap();
        }
        assert_eq!(Config::preset("debug_1").unwrap().grid_size, (10, 10));
        assert_eq!(Config::preset("more_bigger").unwrap().max_iteration, 100);
        assert!(matches!(Config::preset("huge"), Err(Error::Config(_))));
    }

    #[test]
    fn validation_rejects_degenerate_runs() {
        let mut config = Config::preset("debug_1").unwrap();
        config.grid_size = (2, 10);
        assert!(config.validate().is_err());

        let mut config = Config::preset("debug_1").unwrap();
        config.num_species = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_file_round_trip() {
        let path = std::env::temp_dir().join(format!("rgs-config-{}.cbor", std::process::id()));
        let mut config = Config::preset("more_bigger").unwrap();
        config.num_species = 2;
        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_config_file_is_an_io_error() {
        assert!(matches!(
            Config::load("/nonexistent/rgs/config.cbor"),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn built_grid_carries_every_species() {
        let mut config = Config::preset("debug_1").unwrap();
        config.num_species = 3;
        let grid = config.build_grid();
        assert!(grid.count_present() > 0);
        assert!(grid.iter().all(|(_, c)| c.params().num_species() >= 3));
    }
}
