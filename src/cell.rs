use serde::{Deserialize, Serialize};




/// Role of a present grid point.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellKind {
    /// A bulk cell advanced by the physics integrator.
    Interior,

    /// A domain edge where boundary-condition values are stored.
    BoundaryPlaceholder,

    /// A read-replica of an interior cell owned by a neighboring partition.
    /// `origin_index` is the flat index of the authoritative cell in the
    /// whole-domain grid, and `owner_rank` the partition that updates it.
    ExternalHalo { origin_index: usize, owner_rank: usize },
}




/// Kind of boundary condition stamped onto a boundary placeholder.
///
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum BoundaryType {
    Diffuse,
    Mirror,
    Pressure,
    Flow,
}




/// Macroscopic state of one gas species in one cell.
///
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroParams {
    pub pressure: f64,
    pub density: f64,
    pub temp: f64,
    pub flow: (f64, f64),
    pub heat_flow: (f64, f64),
}

impl MacroParams {
    pub fn new(pressure: f64, density: f64, temp: f64) -> Self {
        Self {
            pressure,
            density,
            temp,
            ..Self::default()
        }
    }
}




/// Per-species macroscopic state. This is the payload exchanged for halo
/// cells; it always travels as one serialized unit.
///
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Params {
    species: Vec<MacroParams>,
}

impl Params {
    pub fn new(num_species: usize) -> Self {
        Self {
            species: vec![MacroParams::default(); num_species],
        }
    }

    pub fn num_species(&self) -> usize {
        self.species.len()
    }

    pub fn get(&self, species: usize) -> Option<&MacroParams> {
        self.species.get(species)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MacroParams> {
        self.species.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut MacroParams> {
        self.species.iter_mut()
    }

    /// Return a mutable reference to the given species, growing the species
    /// list if needed.
    pub fn species_mut(&mut self, species: usize) -> &mut MacroParams {
        if species >= self.species.len() {
            self.species.resize(species + 1, MacroParams::default());
        }
        &mut self.species[species]
    }

    pub fn set(&mut self, species: usize, pressure: f64, density: f64, temp: f64) {
        let p = self.species_mut(species);
        p.pressure = pressure;
        p.density = density;
        p.temp = temp;
    }

    pub fn set_temp(&mut self, species: usize, temp: f64) {
        self.species_mut(species).temp = temp;
    }
}




/// Data carried by a present grid cell.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellData {
    kind: CellKind,
    params: Params,
    boundary_types: Vec<Option<BoundaryType>>,
    boundary_params: Params,
    step: (f64, f64, f64),
}

impl CellData {
    pub fn new(kind: CellKind) -> Self {
        Self {
            kind,
            params: Params::default(),
            boundary_types: Vec::new(),
            boundary_params: Params::default(),
            step: (0.0, 0.0, 0.0),
        }
    }

    pub fn kind(&self) -> CellKind {
        self.kind
    }

    pub fn is_interior(&self) -> bool {
        self.kind == CellKind::Interior
    }

    pub fn is_placeholder(&self) -> bool {
        self.kind == CellKind::BoundaryPlaceholder
    }

    pub fn is_halo(&self) -> bool {
        matches!(self.kind, CellKind::ExternalHalo { .. })
    }

    /// Return a copy of this cell re-tagged as a replica of the whole-grid
    /// cell at `origin_index`, owned by `owner_rank`.
    pub fn to_halo(&self, origin_index: usize, owner_rank: usize) -> Self {
        Self {
            kind: CellKind::ExternalHalo {
                origin_index,
                owner_rank,
            },
            ..self.clone()
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    pub fn boundary_type(&self, species: usize) -> Option<BoundaryType> {
        self.boundary_types.get(species).copied().flatten()
    }

    pub fn set_boundary_type(&mut self, species: usize, boundary_type: BoundaryType) {
        if species >= self.boundary_types.len() {
            self.boundary_types.resize(species + 1, None);
        }
        self.boundary_types[species] = Some(boundary_type);
    }

    pub fn boundary_params(&self) -> &Params {
        &self.boundary_params
    }

    pub fn boundary_params_mut(&mut self) -> &mut Params {
        &mut self.boundary_params
    }

    pub fn step(&self) -> (f64, f64, f64) {
        self.step
    }

    pub fn set_step(&mut self, step: (f64, f64, f64)) {
        self.step = step
    }

    /// Single-character code used when printing cell-type maps.
    pub fn code(&self) -> char {
        match self.kind {
            CellKind::Interior => '0',
            CellKind::BoundaryPlaceholder => '1',
            CellKind::ExternalHalo { .. } => 'P',
        }
    }
}
