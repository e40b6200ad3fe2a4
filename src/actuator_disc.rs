//! Simple wind turbine model based on actuator disc theory.
//!
//! All outputs are closed form functions of the induction factor, the disc
//! area, the air density and the upstream velocity, so the model provides
//! analytic derivatives.

use std::convert::Infallible;

use ndarray::{array, Array1, ArrayView1};

use crate::component::{Differentiable, Evaluable, Jacobian};

/// Operating point of an actuator disc.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscInput {
    /// induced velocity factor
    pub a: f64,
    /// rotor disc area in m²
    pub area: f64,
    /// air density in kg/m³
    pub rho: f64,
    /// free stream air velocity upstream of the rotor in m/s
    pub vu: f64,
}

impl Default for DiscInput {
    /// - `a = 0.5`
    /// - `area = 10.0` m²
    /// - `rho = 1.225` kg/m³
    /// - `vu = 10.0` m/s
    fn default() -> Self {
        DiscInput {
            a: 0.5,
            area: 10.0,
            rho: 1.225,
            vu: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscOutput {
    /// air velocity at the rotor exit plane in m/s
    pub vr: f64,
    /// slipstream air velocity downstream of the rotor in m/s
    pub vd: f64,
    /// thrust coefficient
    pub ct: f64,
    /// thrust produced by the rotor in N
    pub thrust: f64,
    /// power coefficient
    pub cp: f64,
    /// power produced by the rotor in W
    pub power: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActuatorDisc;

impl ActuatorDisc {
    pub const INPUTS: [&'static str; 4] = ["a", "area", "rho", "vu"];
    pub const OUTPUTS: [&'static str; 6] = ["vr", "vd", "ct", "thrust", "cp", "power"];

    pub fn solve(&self, input: &DiscInput) -> DiscOutput {
        let DiscInput { a, area, rho, vu } = *input;
        let q_a = 0.5 * rho * area * vu.powi(2);

        let vd = vu * (1.0 - 2.0 * a);
        let vr = 0.5 * (vu + vd);
        let ct = 4.0 * a * (1.0 - a);
        let cp = ct * (1.0 - a);
        DiscOutput {
            vr,
            vd,
            ct,
            thrust: ct * q_a,
            cp,
            power: cp * q_a * vu,
        }
    }
}

impl Evaluable for ActuatorDisc {
    type Input = DiscInput;
    type Output = DiscOutput;
    type Error = Infallible;

    fn evaluate(&self, input: &DiscInput) -> Result<DiscOutput, Infallible> {
        Ok(self.solve(input))
    }
}

impl Differentiable for ActuatorDisc {
    fn input_names(&self) -> Vec<String> {
        Self::INPUTS.iter().map(|s| s.to_string()).collect()
    }

    fn output_names(&self) -> Vec<String> {
        Self::OUTPUTS.iter().map(|s| s.to_string()).collect()
    }

    fn input_vector(&self, input: &DiscInput) -> Array1<f64> {
        array![input.a, input.area, input.rho, input.vu]
    }

    fn input_from_vector(&self, values: ArrayView1<f64>) -> DiscInput {
        DiscInput {
            a: values[0],
            area: values[1],
            rho: values[2],
            vu: values[3],
        }
    }

    fn output_vector(&self, output: &DiscOutput) -> Array1<f64> {
        array![
            output.vr,
            output.vd,
            output.ct,
            output.thrust,
            output.cp,
            output.power
        ]
    }

    fn jacobian(&self, input: &DiscInput, _output: &DiscOutput) -> Jacobian {
        let DiscInput { a, area, rho, vu } = *input;
        let one_minus_a = 1.0 - a;
        let a_area = a * area;
        let a_area_rho_vu = a_area * rho * vu;

        #[rustfmt::skip]
        let values = array![
            // vr
            [-vu, 0.0, 0.0, one_minus_a],
            // vd
            [-2.0 * vu, 0.0, 0.0, 1.0 - 2.0 * a],
            // ct
            [4.0 - 8.0 * a, 0.0, 0.0, 0.0],
            // thrust
            [
                area * vu.powi(2) * rho * (2.0 - 4.0 * a),
                2.0 * vu.powi(2) * a * rho * one_minus_a,
                2.0 * a_area * vu.powi(2) * one_minus_a,
                4.0 * a_area_rho_vu * one_minus_a,
            ],
            // cp
            [4.0 * a * (2.0 * a - 2.0) + 4.0 * one_minus_a.powi(2), 0.0, 0.0, 0.0],
            // power
            [
                2.0 * area * vu.powi(3) * rho * (a * (2.0 * a - 2.0) + one_minus_a.powi(2)),
                2.0 * vu.powi(3) * a * rho * one_minus_a.powi(2),
                2.0 * a_area * vu.powi(3) * one_minus_a.powi(2),
                6.0 * a_area * vu.powi(2) * rho * one_minus_a.powi(2),
            ],
        ];
        Jacobian::from_matrix(self.input_names(), self.output_names(), values)
    }
}
