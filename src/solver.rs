use std::time::Instant;

use log::{debug, info};
use rayon::prelude::*;

use crate::cell::{BoundaryType, CellData, MacroParams, Params};
use crate::config::Config;
use crate::error::Error;
use crate::grid::Grid;
use crate::halo::synchronize;
use crate::message::comm::Communicator;
use crate::partition::Slab;




/**
 * Interface to the physics kernels. An integrator reads the slab (including
 * its halo replicas and boundary placeholders) and returns new payloads for
 * the interior cells it owns. It never writes the slab itself: the solver
 * applies the payloads, and refuses any that target a cell other than an
 * owned interior one.
 */
pub trait Integrator {
    fn step(&mut self, slab: &Slab) -> Vec<((i64, i64), Params)>;
}




/**
 * Jacobi relaxation of the macroscopic state: every interior cell takes the
 * mean of its four neighbors. A boundary placeholder in the same column
 * contributes the cell's own state, with the wall temperature substituted
 * for species under a diffuse condition. Void neighbors, and placeholders in
 * the adjacent columns, are skipped: halos never replicate placeholders, so
 * a stencil reaching across a column could see a wall in one split and a
 * void in another. Cells are computed in parallel but independently, so the
 * result does not depend on how the domain is split.
 */
#[derive(Clone, Copy, Debug, Default)]
pub struct Relaxation;

impl Integrator for Relaxation {
    fn step(&mut self, slab: &Slab) -> Vec<((i64, i64), Params)> {
        let grid = slab.grid();
        let owned: Vec<_> = grid
            .iter()
            .filter(|&(index, cell)| cell.is_interior() && slab.owns(index))
            .collect();

        owned
            .par_iter()
            .map(|&(index, cell)| (index, relax(grid, index, cell)))
            .collect()
    }
}

fn relax(grid: &Grid, index: (i64, i64), center: &CellData) -> Params {
    let (x, y) = index;
    let mut total = Params::new(center.params().num_species());
    let mut count = 0;

    let neighbors = [
        ((x - 1, y), true),
        ((x + 1, y), true),
        ((x, y - 1), false),
        ((x, y + 1), false),
    ];

    for &(neighbor, across) in &neighbors {
        let cell = match grid.get(neighbor) {
            Some(cell) if across && cell.is_placeholder() => continue,
            Some(cell) => cell,
            None => continue,
        };
        for (s, sum) in total.iter_mut().enumerate() {
            let own = center.params().get(s).copied().unwrap_or_default();

            let value = if cell.is_placeholder() {
                wall_state(own, cell, s)
            } else {
                cell.params().get(s).copied().unwrap_or(own)
            };
            accumulate(sum, &value);
        }
        count += 1;
    }

    if count == 0 {
        return center.params().clone();
    }
    for sum in total.iter_mut() {
        scale(sum, count as f64);
    }
    total
}

fn wall_state(own: MacroParams, wall: &CellData, species: usize) -> MacroParams {
    match (wall.boundary_type(species), wall.boundary_params().get(species)) {
        (Some(BoundaryType::Diffuse), Some(bc)) => MacroParams { temp: bc.temp, ..own },
        _ => own,
    }
}

fn accumulate(sum: &mut MacroParams, p: &MacroParams) {
    sum.pressure += p.pressure;
    sum.density += p.density;
    sum.temp += p.temp;
    sum.flow.0 += p.flow.0;
    sum.flow.1 += p.flow.1;
    sum.heat_flow.0 += p.heat_flow.0;
    sum.heat_flow.1 += p.heat_flow.1;
}

fn scale(sum: &mut MacroParams, count: f64) {
    sum.pressure /= count;
    sum.density /= count;
    sum.temp /= count;
    sum.flow.0 /= count;
    sum.flow.1 /= count;
    sum.heat_flow.0 /= count;
    sum.heat_flow.1 /= count;
}




/**
 * The outer time-step loop of one rank: integrate, apply the new interior
 * payloads, then refresh the halos, for the configured number of iterations.
 * Every rank of the communicator must run the same number of iterations.
 */
pub struct Solver<'a, C: Communicator, I: Integrator> {
    comm: &'a C,
    config: &'a Config,
    integrator: I,
    slab: Slab,
    iteration: usize,
}




// ============================================================================
impl<'a, C: Communicator, I: Integrator> Solver<'a, C, I> {

    pub fn new(comm: &'a C, config: &'a Config, slab: Slab, integrator: I) -> Self {
        Self {
            comm,
            config,
            integrator,
            slab,
            iteration: 0,
        }
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn slab(&self) -> &Slab {
        &self.slab
    }

    pub fn into_slab(self) -> Slab {
        self.slab
    }


    /**
     * Advance by one iteration. Collective: every rank must call it.
     */
    pub fn advance(&mut self) -> Result<(), Error> {
        for (index, params) in self.integrator.step(&self.slab) {
            self.slab.write_interior(index, params)?;
        }
        let refreshed = synchronize(self.comm, &mut self.slab)?;
        self.iteration += 1;

        debug!("rank {} iteration {} refreshed {} halo cells", self.comm.rank(), self.iteration, refreshed);
        Ok(())
    }


    pub fn run(&mut self) -> Result<(), Error> {
        let start = Instant::now();

        if self.comm.is_coordinator() {
            info!(
                "running '{}' for {} iterations on {} ranks",
                self.config.name,
                self.config.max_iteration,
                self.comm.size()
            );
        }

        while self.iteration < self.config.max_iteration {
            let step_start = Instant::now();
            self.advance()?;

            if self.comm.is_coordinator() && self.iteration % self.config.log_every.max(1) == 0 {
                info!(
                    "[{}/{}] {:.3}ms",
                    self.iteration,
                    self.config.max_iteration,
                    step_start.elapsed().as_secs_f64() * 1e3
                );
            }
        }

        if self.comm.is_coordinator() {
            info!("It took {:.3}s", start.elapsed().as_secs_f64());
        }
        Ok(())
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;
    use crate::geometry::{default_boxes, EdgeFill, GridBox, MainFill};
    use crate::message::local::LocalCommunicator;
    use crate::partition::split_grid;

    fn heated_box(grid_size: (usize, usize), max_iteration: usize) -> Config {
        Config {
            name: "heated_box".to_string(),
            grid_size,
            num_species: 2,
            max_iteration,
            log_every: 5,
            geometry: vec![GridBox::new((0.0, 0.0), (1.0, 1.0), false)
                .with_main(MainFill {
                    species: vec![MacroParams::new(1.0, 1.0, 1.0), MacroParams::new(0.5, 2.0, 1.5)],
                    temp_gradient: (1.0, 0.25),
                })
                .with_walls(EdgeFill::diffuse(0, 3.0))],
        }
    }

    fn owned_state(slab: &Slab) -> Vec<((i64, i64), Params)> {
        slab.grid()
            .iter()
            .filter(|&(index, _)| slab.owns(index))
            .map(|(index, cell)| (index, cell.params().clone()))
            .collect()
    }

    #[test]
    fn relaxation_moves_towards_the_wall_temperature() {
        let config = heated_box((6, 6), 1);
        let mut slab = Slab::whole(config.build_grid());
        let before = slab.grid().get((1, 1)).unwrap().params().get(0).unwrap().temp;

        for (index, params) in Relaxation.step(&slab) {
            slab.write_interior(index, params).unwrap();
        }
        let after = slab.grid().get((1, 1)).unwrap().params().get(0).unwrap().temp;
        assert!(after > before);

        let untouched = slab.grid().get((1, 1)).unwrap().params().get(1).unwrap().density;
        assert_eq!(untouched, 2.0);
    }

    #[test]
    fn decomposed_run_matches_single_rank_run() {
        let config = heated_box((14, 9), 12);

        let serial = LocalCommunicator::run_group(1, |comm| {
            let slab = Slab::whole(config.build_grid());
            let mut solver = Solver::new(&comm, &config, slab, Relaxation);
            solver.run().unwrap();
            owned_state(solver.slab())
        })
        .remove(0);

        for size in 2..=5 {
            let slabs = split_grid(&config.build_grid(), size);

            let mut decomposed: Vec<_> = LocalCommunicator::run_group(size, |comm| {
                let mut solver = Solver::new(&comm, &config, slabs[comm.rank()].clone(), Relaxation);
                solver.run().unwrap();
                assert_eq!(solver.iteration(), 12);
                owned_state(&solver.into_slab())
            })
            .into_iter()
            .flatten()
            .collect();

            decomposed.sort_by_key(|&(index, _)| index);
            assert_eq!(decomposed, serial, "{} ranks", size);
        }
    }

    fn run_split(config: &Config, size: usize) -> Vec<((i64, i64), Params)> {
        let slabs = split_grid(&config.build_grid(), size);

        let mut state: Vec<_> = LocalCommunicator::run_group(size, |comm| {
            let mut solver = Solver::new(&comm, config, slabs[comm.rank()].clone(), Relaxation);
            solver.run().unwrap();
            owned_state(&solver.into_slab())
        })
        .into_iter()
        .flatten()
        .collect();

        state.sort_by_key(|&(index, _)| index);
        state
    }

    #[test]
    fn decomposed_run_around_an_obstacle_matches_single_rank_run() {
        let mut config = heated_box((16, 12), 3);
        config.geometry = default_boxes();
        let serial = run_split(&config, 1);

        // The obstacle's walls fall on slab boundaries for some of these splits.
        for size in 2..=6 {
            assert_eq!(run_split(&config, size), serial, "{} ranks", size);
        }
    }

    struct Trespasser;

    impl Integrator for Trespasser {
        fn step(&mut self, slab: &Slab) -> Vec<((i64, i64), Params)> {
            slab.halo_cells()
                .take(1)
                .map(|(origin, _, cell)| (slab.whole_space().point_at(origin), cell.params().clone()))
                .collect()
        }
    }

    #[test]
    fn integrator_cannot_write_halos() {
        let config = heated_box((8, 6), 1);
        let slabs = split_grid(&config.build_grid(), 2);

        let results = LocalCommunicator::run_group(2, |comm| {
            Solver::new(&comm, &config, slabs[comm.rank()].clone(), Trespasser).advance()
        });
        assert!(matches!(results[0], Err(Error::HaloWrite(_))));
    }
}
