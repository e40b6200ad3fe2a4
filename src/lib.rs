//! Blade element momentum model of a horizontal axis wind turbine rotor.

use aerofoil::Aerofoil;

use log::info;
use ndarray::{Array1, Zip};

use component::Evaluable;
use distribution::{LinearDistribution, Span};
use element::{BladeElement, ElementGeometry, ElementState, InflowSettings, InflowSolver};
use error::{ConfigError, RotorError};
use performance::{PerformanceAggregator, RotorPerformance};
use rotor::{FlowConditions, RotorGeometry};

pub mod actuator_disc;
pub mod aerofoil;
pub mod component;
pub mod distribution;
pub mod element;
pub mod error;
pub mod optimize;
pub mod performance;
pub mod rotor;

/// A rotor discretised into a fixed number of blade elements and solver settings.
///
/// Element `i` takes the `i`-th value of the radius, chord and twist
/// distributions, so the elements are ordered from hub to tip.
#[derive(Debug, Clone)]
pub struct BEMSolver<'a> {
    aerofoil: &'a Aerofoil,
    distribution: LinearDistribution,
    settings: InflowSettings,
    parallel: bool,
}

impl<'a> BEMSolver<'a> {
    /// create a new Solver for `n_elements` blade elements with the following default values:
    ///
    /// - `tolerance = 1e-9` absolute tolerance of the induction factor residual
    /// - `max_iter = 50` Newton iterations per element
    /// - `initial_guess = (0.2, 0.01)` start values for `a` and `b`
    /// - `parallel = false` solve the elements one after another
    pub fn new(aerofoil: &'a Aerofoil, n_elements: usize) -> Result<BEMSolver<'a>, ConfigError> {
        Ok(BEMSolver {
            aerofoil,
            distribution: LinearDistribution::new(n_elements)?,
            settings: InflowSettings::default(),
            parallel: false,
        })
    }

    pub fn n_elements(&self) -> usize {
        self.distribution.n()
    }

    /// update the residual tolerance of the element solver
    pub fn tolerance(&mut self, tolerance: f64) -> &mut Self {
        self.settings.tolerance = tolerance;
        self
    }

    /// update the iteration limit of the element solver
    pub fn max_iter(&mut self, max_iter: usize) -> &mut Self {
        self.settings.max_iter = max_iter;
        self
    }

    /// update the initial guess for the axial and angular induction factors
    pub fn initial_guess(&mut self, a: f64, b: f64) -> &mut Self {
        self.settings.a_init = a;
        self.settings.b_init = b;
        self
    }

    /// solve the blade elements in parallel
    pub fn parallel(&mut self, yes: bool) -> &mut Self {
        self.parallel = yes;
        self
    }

    pub fn settings(&self) -> &InflowSettings {
        &self.settings
    }

    /// generate the blade elements of `geometry`, ordered from hub to tip
    pub fn elements(
        &self,
        geometry: &RotorGeometry,
        flow: &FlowConditions,
    ) -> Result<Vec<BladeElement>, ConfigError> {
        geometry.validate()?;
        flow.validate()?;

        let radius = self
            .distribution
            .sample(Span::new(geometry.hub_radius, geometry.tip_radius));
        let chord = self
            .distribution
            .sample(Span::new(geometry.chord_hub, geometry.chord_tip));
        let twist = self.distribution.sample(
            Span::new(geometry.twist_hub, geometry.twist_tip).with_offset(geometry.pitch),
        );

        let mut elements = Vec::with_capacity(self.n_elements());
        Zip::from(&radius.values)
            .and(&chord.values)
            .and(&twist.values)
            .for_each(|&r, &c, &t| {
                elements.push(BladeElement {
                    geometry: ElementGeometry {
                        radius: r,
                        width: radius.delta,
                        twist: t.to_radians(),
                        chord: c,
                    },
                    blades: geometry.blades,
                    rpm: geometry.rpm,
                    flow: *flow,
                })
            });

        for (index, element) in elements.iter().enumerate() {
            let ElementGeometry { radius, chord, .. } = element.geometry;
            if !(radius.is_finite() && radius > 0.0) {
                return Err(ConfigError::InvalidElement {
                    index,
                    name: "radius",
                    value: radius,
                });
            }
            if !(chord.is_finite() && chord > 0.0) {
                return Err(ConfigError::InvalidElement {
                    index,
                    name: "chord",
                    value: chord,
                });
            }
        }
        Ok(elements)
    }

    /// solve all blade elements, the states are ordered from hub to tip
    pub fn solve_elements(
        &self,
        geometry: &RotorGeometry,
        flow: &FlowConditions,
    ) -> Result<Vec<ElementState>, RotorError> {
        let elements = Array1::from(self.elements(geometry, flow)?);
        let solver = InflowSolver::new(self.aerofoil, self.settings);

        let results = if self.parallel {
            Zip::from(&elements).par_map_collect(|element| solver.solve(element))
        } else {
            Zip::from(&elements).map_collect(|element| solver.solve(element))
        };

        results
            .into_iter()
            .enumerate()
            .map(|(index, result)| result.map_err(|source| RotorError::Element { index, source }))
            .collect()
    }

    /// solve the rotor and aggregate the performance
    pub fn evaluate(
        &self,
        geometry: &RotorGeometry,
        flow: &FlowConditions,
    ) -> Result<RotorSolution, RotorError> {
        let elements = self.solve_elements(geometry, flow)?;
        let performance = PerformanceAggregator::new(*flow, *geometry).aggregate(&elements)?;
        info!(
            "rotor with {} elements at {} rpm: Cp = {:.4}, Ct = {:.4}, tsr = {:.3}",
            self.n_elements(),
            geometry.rpm,
            performance.cp,
            performance.ct,
            performance.tip_speed_ratio
        );
        Ok(RotorSolution {
            elements,
            performance,
        })
    }
}

impl<'a> Evaluable for BEMSolver<'a> {
    type Input = (RotorGeometry, FlowConditions);
    type Output = RotorSolution;
    type Error = RotorError;

    fn evaluate(&self, input: &Self::Input) -> Result<RotorSolution, RotorError> {
        BEMSolver::evaluate(self, &input.0, &input.1)
    }
}

/// The solution of a rotor evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct RotorSolution {
    /// converged element states from hub to tip
    pub elements: Vec<ElementState>,
    pub performance: RotorPerformance,
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn elements_follow_the_distributions() {
        let foil = Aerofoil::naca0012();
        let solver = BEMSolver::new(&foil, 6).unwrap();
        let geometry = RotorGeometry {
            pitch: 1.0,
            ..Default::default()
        };
        let elements = solver.elements(&geometry, &FlowConditions::default()).unwrap();
        assert_eq!(elements.len(), 6);
        assert_relative_eq!(elements[0].geometry.radius, 0.6, max_relative = 1e-12);
        assert_relative_eq!(elements[5].geometry.radius, 4.6, max_relative = 1e-12);
        assert_relative_eq!(elements[0].geometry.width, 0.8, max_relative = 1e-12);
        assert_relative_eq!(elements[0].geometry.chord, 0.65725, max_relative = 1e-12);
        assert_relative_eq!(
            elements[0].geometry.twist,
            27.285f64.to_radians(),
            max_relative = 1e-12
        );
        assert!(elements.iter().all(|e| e.blades == 3 && e.rpm == 107.0));
    }

    #[test]
    fn zero_elements_are_rejected() {
        let foil = Aerofoil::naca0012();
        assert_eq!(BEMSolver::new(&foil, 0).unwrap_err(), ConfigError::NoElements);
    }

    #[test]
    fn invalid_geometry_fails_before_solving() {
        let foil = Aerofoil::naca0012();
        let solver = BEMSolver::new(&foil, 6).unwrap();
        let geometry = RotorGeometry {
            tip_radius: 0.1,
            ..Default::default()
        };
        let err = solver
            .evaluate(&geometry, &FlowConditions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            RotorError::Config(ConfigError::HubOutsideTip { .. })
        ));
    }

    #[test]
    fn element_failures_carry_the_index() {
        let foil = Aerofoil::naca0012();
        let mut solver = BEMSolver::new(&foil, 6).unwrap();
        solver.max_iter(0);
        let err = solver
            .evaluate(&RotorGeometry::default(), &FlowConditions::default())
            .unwrap_err();
        match err {
            RotorError::Element { index, .. } => assert_eq!(index, 0),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn evaluable_matches_evaluate() {
        let foil = Aerofoil::naca0012();
        let solver = BEMSolver::new(&foil, 4).unwrap();
        let input = (RotorGeometry::default(), FlowConditions::default());
        let a = Evaluable::evaluate(&solver, &input).unwrap();
        let b = solver.evaluate(&input.0, &input.1).unwrap();
        assert_eq!(a, b);
    }
}
