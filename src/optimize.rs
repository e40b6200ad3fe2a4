//! Optimization problems handed to `argmin`.
//!
//! [`RotorProblem`] maximizes the power coefficient of a blade element rotor
//! over box bounded design variables. The element solves are not
//! differentiable, so it only provides a cost and is driven by Nelder-Mead.
//! [`BetzProblem`] maximizes the power coefficient of an actuator disc with
//! L-BFGS, fed by the analytic Jacobian of the disc model.

use argmin::{
    core::{CostFunction, Executor, Gradient, State},
    solver::{linesearch::MoreThuenteLineSearch, neldermead::NelderMead, quasinewton::LBFGS},
};
use itertools::Itertools;
use log::{debug, info};
use ndarray::{array, Array, Array1};
use thiserror::Error;

use crate::{
    actuator_disc::{ActuatorDisc, DiscInput},
    component::Differentiable,
    error::RotorError,
    performance::RotorPerformance,
    rotor::{FlowConditions, RotorGeometry},
    BEMSolver,
};

#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("optimizer failed: {0}")]
    Solver(String),
    #[error(transparent)]
    Rotor(#[from] RotorError),
    #[error("no design variables declared")]
    NoVariables,
    #[error("invalid bounds [{low}, {high}] for {name}")]
    InvalidBounds {
        name: &'static str,
        low: f64,
        high: f64,
    },
    #[error("optimizer returned no solution")]
    NoSolution,
}

impl From<argmin::core::Error> for OptimizeError {
    fn from(e: argmin::core::Error) -> Self {
        Self::Solver(e.to_string())
    }
}

/// Rotor parameters the optimizer may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DesignVariable {
    ChordHub,
    ChordTip,
    TwistHub,
    TwistTip,
    Rpm,
    TipRadius,
    Pitch,
}

impl DesignVariable {
    pub fn name(&self) -> &'static str {
        match self {
            DesignVariable::ChordHub => "chord_hub",
            DesignVariable::ChordTip => "chord_tip",
            DesignVariable::TwistHub => "twist_hub",
            DesignVariable::TwistTip => "twist_tip",
            DesignVariable::Rpm => "rpm",
            DesignVariable::TipRadius => "tip_radius",
            DesignVariable::Pitch => "pitch",
        }
    }

    pub fn get(&self, geometry: &RotorGeometry) -> f64 {
        match self {
            DesignVariable::ChordHub => geometry.chord_hub,
            DesignVariable::ChordTip => geometry.chord_tip,
            DesignVariable::TwistHub => geometry.twist_hub,
            DesignVariable::TwistTip => geometry.twist_tip,
            DesignVariable::Rpm => geometry.rpm,
            DesignVariable::TipRadius => geometry.tip_radius,
            DesignVariable::Pitch => geometry.pitch,
        }
    }

    pub fn set(&self, geometry: &mut RotorGeometry, value: f64) {
        let field = match self {
            DesignVariable::ChordHub => &mut geometry.chord_hub,
            DesignVariable::ChordTip => &mut geometry.chord_tip,
            DesignVariable::TwistHub => &mut geometry.twist_hub,
            DesignVariable::TwistTip => &mut geometry.twist_tip,
            DesignVariable::Rpm => &mut geometry.rpm,
            DesignVariable::TipRadius => &mut geometry.tip_radius,
            DesignVariable::Pitch => &mut geometry.pitch,
        };
        *field = value;
    }
}

/// Box constraint `low <= x <= high`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub low: f64,
    pub high: f64,
}

impl Bounds {
    pub fn new(low: f64, high: f64) -> Self {
        Bounds { low, high }
    }

    pub fn clamp(&self, x: f64) -> f64 {
        x.clamp(self.low, self.high)
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    /// `n` equally spaced values including both bounds, the midpoint for `n = 1`
    pub fn levels(&self, n: usize) -> Vec<f64> {
        if n == 1 {
            return vec![0.5 * (self.low + self.high)];
        }
        Array::linspace(self.low, self.high, n).to_vec()
    }
}

/// Result of [`RotorProblem::optimize`].
#[derive(Debug, Clone)]
pub struct RotorOptimum {
    /// best design variables, clamped to their bounds
    pub parameters: Array1<f64>,
    pub geometry: RotorGeometry,
    pub performance: RotorPerformance,
    /// performance of the start point, `None` if it could not be evaluated
    pub baseline: Option<RotorPerformance>,
    pub iterations: u64,
}

/// One case of a design of experiments.
#[derive(Debug)]
pub struct DoeCase {
    pub parameters: Array1<f64>,
    pub result: Result<RotorPerformance, RotorError>,
}

/// Maximize the rotor power coefficient over the declared design variables.
///
/// Parameter vectors are clamped to the bounds before they are written into
/// the baseline geometry. Points where the rotor can not be evaluated get the
/// failure cost instead of `-Cp`.
#[derive(Debug, Clone)]
pub struct RotorProblem<'a> {
    solver: BEMSolver<'a>,
    flow: FlowConditions,
    baseline: RotorGeometry,
    variables: Vec<(DesignVariable, Bounds)>,
    failure_cost: f64,
    initial_step: f64,
}

impl<'a> RotorProblem<'a> {
    /// create a new problem with the following default values:
    ///
    /// - `failure_cost = 1e3` cost of points where the evaluation fails
    /// - `initial_step = 0.05` size of the initial simplex relative to the bounds
    pub fn new(
        solver: BEMSolver<'a>,
        flow: FlowConditions,
        baseline: RotorGeometry,
        variables: Vec<(DesignVariable, Bounds)>,
    ) -> Result<RotorProblem<'a>, OptimizeError> {
        if variables.is_empty() {
            return Err(OptimizeError::NoVariables);
        }
        for (variable, bounds) in &variables {
            if !(bounds.low.is_finite() && bounds.high.is_finite() && bounds.low < bounds.high) {
                return Err(OptimizeError::InvalidBounds {
                    name: variable.name(),
                    low: bounds.low,
                    high: bounds.high,
                });
            }
        }
        Ok(RotorProblem {
            solver,
            flow,
            baseline,
            variables,
            failure_cost: 1e3,
            initial_step: 0.05,
        })
    }

    /// chord `[0.1, 2]` m, twist `[-5, 50]`° at hub and tip and rpm `[20, 300]`
    pub fn standard_bounds() -> Vec<(DesignVariable, Bounds)> {
        vec![
            (DesignVariable::ChordHub, Bounds::new(0.1, 2.0)),
            (DesignVariable::ChordTip, Bounds::new(0.1, 2.0)),
            (DesignVariable::TwistHub, Bounds::new(-5.0, 50.0)),
            (DesignVariable::TwistTip, Bounds::new(-5.0, 50.0)),
            (DesignVariable::Rpm, Bounds::new(20.0, 300.0)),
        ]
    }

    /// update the cost returned for points that can not be evaluated
    pub fn failure_cost(&mut self, cost: f64) -> &mut Self {
        self.failure_cost = cost;
        self
    }

    /// update the initial simplex size, relative to the width of the bounds
    pub fn initial_step(&mut self, step: f64) -> &mut Self {
        self.initial_step = step;
        self
    }

    pub fn variables(&self) -> &[(DesignVariable, Bounds)] {
        &self.variables
    }

    /// baseline values of the design variables, clamped to their bounds
    pub fn initial_point(&self) -> Array1<f64> {
        self.variables
            .iter()
            .map(|(variable, bounds)| bounds.clamp(variable.get(&self.baseline)))
            .collect()
    }

    /// the baseline geometry with the clamped parameters written into it
    pub fn geometry(&self, param: &Array1<f64>) -> RotorGeometry {
        let mut geometry = self.baseline;
        for ((variable, bounds), &value) in self.variables.iter().zip(param) {
            variable.set(&mut geometry, bounds.clamp(value));
        }
        geometry
    }

    pub fn evaluate(&self, param: &Array1<f64>) -> Result<RotorPerformance, RotorError> {
        self.solver
            .evaluate(&self.geometry(param), &self.flow)
            .map(|solution| solution.performance)
    }

    /// `-Cp` at `param`, or the failure cost
    pub fn objective(&self, param: &Array1<f64>) -> f64 {
        match self.evaluate(param) {
            Ok(performance) if performance.cp.is_finite() => -performance.cp,
            Ok(performance) => {
                debug!("non finite Cp {} at {param}", performance.cp);
                self.failure_cost
            }
            Err(err) => {
                debug!("rotor evaluation failed at {param}: {err}");
                self.failure_cost
            }
        }
    }

    /// initial simplex: the start point and one step along each variable,
    /// stepping towards the inside of the bounds
    fn simplex(&self, x0: &Array1<f64>) -> Vec<Array1<f64>> {
        let mut simplex = vec![x0.clone()];
        for (i, (_, bounds)) in self.variables.iter().enumerate() {
            let step = self.initial_step * bounds.width();
            let mut vertex = x0.clone();
            vertex[i] = if x0[i] + step <= bounds.high {
                x0[i] + step
            } else {
                x0[i] - step
            };
            simplex.push(vertex);
        }
        simplex
    }

    /// Run Nelder-Mead starting from the baseline geometry.
    ///
    /// The start point is a vertex of the initial simplex, so the result is
    /// never worse than the baseline.
    pub fn optimize(&self, max_iters: u64) -> Result<RotorOptimum, OptimizeError> {
        let x0 = self.initial_point();
        let baseline = self.evaluate(&x0).ok();
        info!(
            "optimizing {} design variables, baseline Cp = {:?}",
            self.variables.len(),
            baseline.map(|p| p.cp)
        );

        let solver = NelderMead::new(self.simplex(&x0)).with_sd_tolerance(1e-8)?;
        let res = Executor::new(self.clone(), solver)
            .configure(|state| state.max_iters(max_iters))
            .run()?;
        let iterations = res.state().get_iter();
        let best = res
            .state()
            .get_best_param()
            .ok_or(OptimizeError::NoSolution)?;

        let geometry = self.geometry(best);
        let parameters = self
            .variables
            .iter()
            .map(|(variable, _)| variable.get(&geometry))
            .collect();
        let performance = self.solver.evaluate(&geometry, &self.flow)?.performance;
        info!(
            "optimization finished after {iterations} iterations: Cp = {:.4}",
            performance.cp
        );
        Ok(RotorOptimum {
            parameters,
            geometry,
            performance,
            baseline,
            iterations,
        })
    }

    /// Evaluate every combination of `levels` equally spaced values per
    /// design variable.
    pub fn full_factorial(&self, levels: usize) -> Vec<DoeCase> {
        self.variables
            .iter()
            .map(|(_, bounds)| bounds.levels(levels).into_iter())
            .multi_cartesian_product()
            .map(|values| {
                let parameters = Array1::from(values);
                let result = self.evaluate(&parameters);
                DoeCase { parameters, result }
            })
            .collect()
    }
}

impl<'a> CostFunction for RotorProblem<'a> {
    type Param = Array1<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        Ok(self.objective(param))
    }
}

/// Result of [`BetzProblem::solve`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetzOptimum {
    /// optimal induction factor
    pub a: f64,
    /// maximal power coefficient
    pub cp: f64,
    pub iterations: u64,
    /// number of analytic gradient evaluations
    pub gradient_evaluations: u64,
}

/// Maximize the power coefficient of an actuator disc over the induction
/// factor `a` in `[0, 1]`.
///
/// The parameter vector holds `a` only. Values outside `[0, 1]` are clamped
/// before the disc is evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetzProblem {
    /// operating point, `a` is the start value of the search
    pub disc: DiscInput,
}

impl BetzProblem {
    pub fn new(disc: DiscInput) -> Self {
        BetzProblem { disc }
    }

    fn at(&self, param: &Array1<f64>) -> DiscInput {
        DiscInput {
            a: param[0].clamp(0.0, 1.0),
            ..self.disc
        }
    }

    /// Run L-BFGS until the gradient norm drops below `tolerance`.
    pub fn solve(&self, tolerance: f64) -> Result<BetzOptimum, OptimizeError> {
        let linesearch = MoreThuenteLineSearch::new();
        let solver = LBFGS::new(linesearch, 7).with_tolerance_grad(tolerance)?;
        let res = Executor::new(*self, solver)
            .configure(|state| state.param(array![self.disc.a]).max_iters(100))
            .run()?;
        let best = res
            .state()
            .get_best_param()
            .ok_or(OptimizeError::NoSolution)?;
        let input = self.at(best);
        let cp = ActuatorDisc.solve(&input).cp;
        let gradient_evaluations = res
            .state()
            .get_func_counts()
            .get("gradient_count")
            .copied()
            .unwrap_or(0);
        info!(
            "actuator disc optimum: a = {:.5}, Cp = {cp:.5}, {gradient_evaluations} gradients",
            input.a
        );
        Ok(BetzOptimum {
            a: input.a,
            cp,
            iterations: res.state().get_iter(),
            gradient_evaluations,
        })
    }
}

impl CostFunction for BetzProblem {
    type Param = Array1<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<f64, argmin::core::Error> {
        Ok(-ActuatorDisc.solve(&self.at(param)).cp)
    }
}

impl Gradient for BetzProblem {
    type Param = Array1<f64>;
    type Gradient = Array1<f64>;

    fn gradient(&self, param: &Self::Param) -> Result<Array1<f64>, argmin::core::Error> {
        let input = self.at(param);
        let jacobian = ActuatorDisc.jacobian(&input, &ActuatorDisc.solve(&input));
        let d_cp = jacobian
            .get("cp", "a")
            .ok_or_else(|| argmin::core::Error::msg("actuator disc declares no dCp/da"))?;
        Ok(array![-d_cp])
    }
}
