//! Regions that seed the whole-domain grid. A region is an axis-aligned box in
//! physical coordinates, either active (it fills space with cells) or solid
//! (it carves a hole out of space), which stamps cell data through the
//! `Region` capability interface. The concrete `GridBox` describes its fills
//! as plain data so that a geometry can be serialized with the run config.

use serde::{Deserialize, Serialize};

use crate::cell::{BoundaryType, CellData, MacroParams};

/// One of the four edges of a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

/// Capability interface used by the grid builder to classify and populate
/// the points covered by a region.
///
pub trait Region {
    /// Lower-left corner in physical coordinates.
    fn point(&self) -> (f64, f64);

    /// Extent in physical coordinates.
    fn size(&self) -> (f64, f64);

    /// Whether the region is a hole rather than part of the flow domain.
    fn is_solid(&self) -> bool;

    /// Populate an interior cell. `point` is the normalized position of the
    /// cell within the region, in `[0, 1]` on both axes.
    fn main_fill(&self, _point: (f64, f64), _cell: &mut CellData) {}

    /// Populate a boundary placeholder on the given edge. `position` is the
    /// normalized position along the edge.
    fn edge_fill(&self, _side: Side, _position: f64, _cell: &mut CellData) {}
}

/// A boundary condition variant and its parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum BoundaryCondition {
    Diffuse { temp: f64 },
    Mirror,
    Pressure { pressure: f64 },
    Flow { flow: (f64, f64), pressure: f64 },
}

impl BoundaryCondition {
    pub fn boundary_type(&self) -> BoundaryType {
        match self {
            BoundaryCondition::Diffuse { .. } => BoundaryType::Diffuse,
            BoundaryCondition::Mirror => BoundaryType::Mirror,
            BoundaryCondition::Pressure { .. } => BoundaryType::Pressure,
            BoundaryCondition::Flow { .. } => BoundaryType::Flow,
        }
    }
}

/// Boundary condition applied to one species along an edge.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeFill {
    pub species: usize,
    pub condition: BoundaryCondition,
}

impl EdgeFill {
    pub fn diffuse(species: usize, temp: f64) -> Self {
        Self {
            species,
            condition: BoundaryCondition::Diffuse { temp },
        }
    }

    fn apply(&self, cell: &mut CellData) {
        cell.set_boundary_type(self.species, self.condition.boundary_type());
        let params = cell.boundary_params_mut().species_mut(self.species);

        match self.condition {
            BoundaryCondition::Diffuse { temp } => params.temp = temp,
            BoundaryCondition::Mirror => {}
            BoundaryCondition::Pressure { pressure } => params.pressure = pressure,
            BoundaryCondition::Flow { flow, pressure } => {
                params.flow = flow;
                params.pressure = pressure;
            }
        }
    }
}

/// Initial macroscopic state of interior cells. The temperature of each
/// species varies linearly across the region by `temp_gradient` (per unit of
/// normalized position).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MainFill {
    pub species: Vec<MacroParams>,
    pub temp_gradient: (f64, f64),
}

impl MainFill {
    pub fn uniform(species: Vec<MacroParams>) -> Self {
        Self {
            species,
            temp_gradient: (0.0, 0.0),
        }
    }

    fn apply(&self, point: (f64, f64), cell: &mut CellData) {
        for (s, p) in self.species.iter().enumerate() {
            let target = cell.params_mut().species_mut(s);
            *target = *p;
            target.temp += self.temp_gradient.0 * point.0 + self.temp_gradient.1 * point.1;
        }
    }
}

/// A serializable region with data-driven fills.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridBox {
    point: (f64, f64),
    size: (f64, f64),
    solid: bool,
    step: (f64, f64, f64),
    main: Option<MainFill>,
    left: Option<EdgeFill>,
    right: Option<EdgeFill>,
    top: Option<EdgeFill>,
    bottom: Option<EdgeFill>,
}

impl GridBox {
    pub fn new(point: (f64, f64), size: (f64, f64), solid: bool) -> Self {
        Self {
            point,
            size,
            solid,
            step: (0.0, 0.0, 0.0),
            main: None,
            left: None,
            right: None,
            top: None,
            bottom: None,
        }
    }

    pub fn with_step(mut self, step: (f64, f64, f64)) -> Self {
        self.step = step;
        self
    }

    pub fn with_main(mut self, main: MainFill) -> Self {
        self.main = Some(main);
        self
    }

    pub fn with_edge(mut self, side: Side, fill: EdgeFill) -> Self {
        *self.edge_mut(side) = Some(fill);
        self
    }

    /// Apply the same fill on all four edges.
    pub fn with_walls(self, fill: EdgeFill) -> Self {
        self.with_edge(Side::Left, fill)
            .with_edge(Side::Right, fill)
            .with_edge(Side::Top, fill)
            .with_edge(Side::Bottom, fill)
    }

    pub fn edge(&self, side: Side) -> Option<&EdgeFill> {
        match side {
            Side::Left => self.left.as_ref(),
            Side::Right => self.right.as_ref(),
            Side::Top => self.top.as_ref(),
            Side::Bottom => self.bottom.as_ref(),
        }
    }

    fn edge_mut(&mut self, side: Side) -> &mut Option<EdgeFill> {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
            Side::Top => &mut self.top,
            Side::Bottom => &mut self.bottom,
        }
    }
}

impl Region for GridBox {
    fn point(&self) -> (f64, f64) {
        self.point
    }

    fn size(&self) -> (f64, f64) {
        self.size
    }

    fn is_solid(&self) -> bool {
        self.solid
    }

    fn main_fill(&self, point: (f64, f64), cell: &mut CellData) {
        if let Some(main) = &self.main {
            main.apply(point, cell);
            cell.set_step(self.step);
        }
    }

    fn edge_fill(&self, side: Side, _position: f64, cell: &mut CellData) {
        if let Some(fill) = self.edge(side) {
            fill.apply(cell);
            cell.set_step(self.step);
        }
    }
}

/// The default geometry: a 100 x 100 active box with diffuse walls at unit
/// temperature, enclosing a 40 x 40 solid obstacle whose walls are held at
/// twice that temperature.
pub fn default_boxes() -> Vec<GridBox> {
    let step = (0.1, 0.1, 0.0);

    vec![
        GridBox::new((0.0, 0.0), (100.0, 100.0), false)
            .with_step(step)
            .with_main(MainFill::uniform(vec![MacroParams::new(1.0, 1.0, 1.0)]))
            .with_walls(EdgeFill::diffuse(0, 1.0)),
        GridBox::new((30.0, 30.0), (40.0, 40.0), true)
            .with_step(step)
            .with_walls(EdgeFill::diffuse(0, 2.0)),
    ]
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cell::CellKind;

    #[test]
    fn edge_fill_stamps_boundary_condition() {
        let b = GridBox::new((0.0, 0.0), (1.0, 1.0), false)
            .with_step((0.5, 0.5, 0.0))
            .with_edge(
                Side::Top,
                EdgeFill {
                    species: 1,
                    condition: BoundaryCondition::Flow {
                        flow: (2.0, 0.0),
                        pressure: 3.0,
                    },
                },
            );
        let mut cell = CellData::new(CellKind::BoundaryPlaceholder);
        b.edge_fill(Side::Top, 0.5, &mut cell);
        assert_eq!(cell.boundary_type(1), Some(BoundaryType::Flow));
        assert_eq!(cell.boundary_params().get(1).unwrap().flow, (2.0, 0.0));
        assert_eq!(cell.boundary_params().get(1).unwrap().pressure, 3.0);
        assert_eq!(cell.step(), (0.5, 0.5, 0.0));

        let mut untouched = CellData::new(CellKind::BoundaryPlaceholder);
        b.edge_fill(Side::Left, 0.5, &mut untouched);
        assert_eq!(untouched, CellData::new(CellKind::BoundaryPlaceholder));
    }

    #[test]
    fn main_fill_applies_gradient() {
        let b = GridBox::new((0.0, 0.0), (1.0, 1.0), false).with_main(MainFill {
            species: vec![MacroParams::new(1.0, 1.0, 1.0)],
            temp_gradient: (1.0, 2.0),
        });
        let mut cell = CellData::new(CellKind::Interior);
        b.main_fill((0.5, 0.25), &mut cell);
        assert_eq!(cell.params().get(0).unwrap().temp, 2.0);
        assert_eq!(cell.params().get(0).unwrap().density, 1.0);
    }

    #[test]
    fn default_geometry_has_an_enclosed_hole() {
        let boxes = default_boxes();
        assert_eq!(boxes.len(), 2);
        assert!(!boxes[0].is_solid());
        assert!(boxes[1].is_solid());
        assert_eq!(boxes[1].edge(Side::Left), Some(&EdgeFill::diffuse(0, 2.0)));
    }
}
