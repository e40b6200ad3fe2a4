//! Capability traits shared by the rotor components.
//!
//! Every component is a pure function object: [`Evaluable::evaluate`] maps an
//! input record to an output record without touching `self`. Components with
//! closed form derivatives additionally implement [`Differentiable`], which
//! lets an optimizer use exact gradients instead of finite differences.

use approx::relative_eq;
use log::debug;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Forward evaluation of a component.
pub trait Evaluable {
    type Input: ?Sized;
    type Output;
    type Error;

    fn evaluate(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// Analytic partial derivatives of a component.
///
/// The declared names fix the order of the packed input and output vectors
/// and of the rows (outputs) and columns (inputs) of the [`Jacobian`].
pub trait Differentiable: Evaluable {
    fn input_names(&self) -> Vec<String>;

    fn output_names(&self) -> Vec<String>;

    /// pack the declared inputs into a vector ordered as [`Self::input_names`]
    fn input_vector(&self, input: &Self::Input) -> Array1<f64>;

    /// build an input record from a vector ordered as [`Self::input_names`]
    fn input_from_vector(&self, values: ArrayView1<f64>) -> Self::Input
    where
        Self::Input: Sized;

    /// pack the declared outputs into a vector ordered as [`Self::output_names`]
    fn output_vector(&self, output: &Self::Output) -> Array1<f64>;

    /// Partial derivatives at `input`.
    ///
    /// `output` must be the result of [`Evaluable::evaluate`] at the same `input`.
    fn jacobian(&self, input: &Self::Input, output: &Self::Output) -> Jacobian;
}

/// Dense matrix of `∂output/∂input`, rows are outputs and columns are inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Jacobian {
    inputs: Vec<String>,
    outputs: Vec<String>,
    values: Array2<f64>,
}

impl Jacobian {
    pub fn zeros(inputs: Vec<String>, outputs: Vec<String>) -> Self {
        let values = Array2::zeros((outputs.len(), inputs.len()));
        Jacobian {
            inputs,
            outputs,
            values,
        }
    }

    /// create a Jacobian from a `outputs.len() x inputs.len()` matrix
    pub fn from_matrix(inputs: Vec<String>, outputs: Vec<String>, values: Array2<f64>) -> Self {
        debug_assert_eq!(values.dim(), (outputs.len(), inputs.len()));
        Jacobian {
            inputs,
            outputs,
            values,
        }
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn matrix(&self) -> ArrayView2<f64> {
        self.values.view()
    }

    /// `∂output/∂input`, `None` if either name is not declared
    pub fn get(&self, output: &str, input: &str) -> Option<f64> {
        let row = self.outputs.iter().position(|name| name == output)?;
        let col = self.inputs.iter().position(|name| name == input)?;
        Some(self.values[(row, col)])
    }

    /// gradient of a single output over all inputs
    pub fn row(&self, output: &str) -> Option<ArrayView1<f64>> {
        let row = self.outputs.iter().position(|name| name == output)?;
        Some(self.values.row(row))
    }
}

/// Analytic and central difference Jacobian of a component at one point.
#[derive(Debug, Clone)]
pub struct GradientCheck {
    pub analytic: Jacobian,
    pub numeric: Jacobian,
}

impl GradientCheck {
    /// largest relative deviation between the two Jacobians together with
    /// the (output, input) pair where it occurs
    pub fn worst(&self) -> (String, String, f64) {
        let mut worst = (String::new(), String::new(), 0.0);
        for ((row, col), &analytic) in self.analytic.values.indexed_iter() {
            let numeric = self.numeric.values[(row, col)];
            let scale = analytic.abs().max(numeric.abs());
            let error = if scale == 0.0 {
                0.0
            } else {
                (analytic - numeric).abs() / scale
            };
            if error > worst.2 {
                worst = (
                    self.analytic.outputs[row].clone(),
                    self.analytic.inputs[col].clone(),
                    error,
                );
            }
        }
        worst
    }

    /// true when every entry agrees within `max_relative`, or within
    /// `epsilon` for entries close to zero
    pub fn is_consistent(&self, max_relative: f64, epsilon: f64) -> bool {
        self.analytic
            .values
            .iter()
            .zip(self.numeric.values.iter())
            .all(|(a, n)| relative_eq!(*a, *n, epsilon = epsilon, max_relative = max_relative))
    }
}

/// Compare the analytic Jacobian of `component` at `input` against central
/// differences with a relative step of `step`.
pub fn check_gradient<C>(
    component: &C,
    input: &C::Input,
    step: f64,
) -> Result<GradientCheck, C::Error>
where
    C: Differentiable,
    C::Input: Sized,
{
    let output = component.evaluate(input)?;
    let analytic = component.jacobian(input, &output);

    let x = component.input_vector(input);
    let n_outputs = component.output_names().len();
    let mut numeric = Array2::zeros((n_outputs, x.len()));
    for (col, &x_j) in x.iter().enumerate() {
        let h = step * x_j.abs().max(1.0);
        let mut x_plus = x.clone();
        x_plus[col] += h;
        let mut x_minus = x.clone();
        x_minus[col] -= h;
        let f_plus = component.output_vector(
            &component.evaluate(&component.input_from_vector(x_plus.view()))?,
        );
        let f_minus = component.output_vector(
            &component.evaluate(&component.input_from_vector(x_minus.view()))?,
        );
        numeric
            .column_mut(col)
            .assign(&((f_plus - f_minus) / (2.0 * h)));
    }

    let check = GradientCheck {
        numeric: Jacobian::from_matrix(
            component.input_names(),
            component.output_names(),
            numeric,
        ),
        analytic,
    };
    let (output, input, error) = check.worst();
    debug!("gradient check: worst relative error {error:e} for d{output}/d{input}");
    Ok(check)
}
