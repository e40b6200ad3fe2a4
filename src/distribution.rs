use std::convert::Infallible;

use ndarray::{Array, Array1, Array2, ArrayView1};

use crate::{
    component::{Differentiable, Evaluable, Jacobian},
    error::ConfigError,
};

/// Start, end and uniform offset of a [`LinearDistribution`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub start: f64,
    pub end: f64,
    pub offset: f64,
}

impl Span {
    pub fn new(start: f64, end: f64) -> Self {
        Span {
            start,
            end,
            offset: 0.0,
        }
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }
}

/// N values sampled from a [`Span`] together with their spacing.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub values: Array1<f64>,
    /// width of each of the N sub-intervals, `(end - start) / N`
    pub delta: f64,
}

/// Samples `n` values at the midpoints of `n` equal sub-intervals between
/// start and end, shifted by the offset.
///
/// The first value is nearest to `start` and the last nearest to `end`,
/// consecutive values are `delta = (end - start) / n` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearDistribution {
    n: usize,
}

impl LinearDistribution {
    pub fn new(n: usize) -> Result<Self, ConfigError> {
        if n == 0 {
            return Err(ConfigError::NoElements);
        }
        Ok(LinearDistribution { n })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn sample(&self, span: Span) -> Distribution {
        let delta = (span.end - span.start) / self.n as f64;
        let values =
            Array::linspace(span.start + delta / 2.0, span.end - delta / 2.0, self.n) + span.offset;
        Distribution { values, delta }
    }
}

impl Evaluable for LinearDistribution {
    type Input = Span;
    type Output = Distribution;
    type Error = Infallible;

    fn evaluate(&self, input: &Span) -> Result<Distribution, Infallible> {
        Ok(self.sample(*input))
    }
}

impl Differentiable for LinearDistribution {
    fn input_names(&self) -> Vec<String> {
        vec!["start".into(), "end".into(), "offset".into()]
    }

    fn output_names(&self) -> Vec<String> {
        let mut names: Vec<String> = (0..self.n).map(|i| format!("output[{i}]")).collect();
        names.push("delta".into());
        names
    }

    fn input_vector(&self, input: &Span) -> Array1<f64> {
        Array1::from(vec![input.start, input.end, input.offset])
    }

    fn input_from_vector(&self, values: ArrayView1<f64>) -> Span {
        Span::new(values[0], values[1]).with_offset(values[2])
    }

    fn output_vector(&self, output: &Distribution) -> Array1<f64> {
        let mut v = output.values.to_vec();
        v.push(output.delta);
        Array1::from(v)
    }

    fn jacobian(&self, _input: &Span, _output: &Distribution) -> Jacobian {
        let n = self.n as f64;
        let mut values = Array2::zeros((self.n + 1, 3));
        for (i, mut row) in values.rows_mut().into_iter().take(self.n).enumerate() {
            let weight = (i as f64 + 0.5) / n;
            row[0] = 1.0 - weight;
            row[1] = weight;
            row[2] = 1.0;
        }
        values[(self.n, 0)] = -1.0 / n;
        values[(self.n, 1)] = 1.0 / n;
        Jacobian::from_matrix(self.input_names(), self.output_names(), values)
    }
}
