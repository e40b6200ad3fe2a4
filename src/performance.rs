use itertools::Itertools;
use log::warn;
use thiserror::Error;

use crate::{
    component::Evaluable,
    element::ElementState,
    rotor::{FlowConditions, RotorGeometry},
};

/// Aggregated performance of the whole rotor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotorPerformance {
    /// net axial thrust in N
    pub net_thrust: f64,
    /// net power produced in W
    pub net_power: f64,
    /// thrust coefficient
    pub ct: f64,
    /// power coefficient
    pub cp: f64,
    /// advance ratio
    pub j: f64,
    pub tip_speed_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PerformanceError {
    #[error("no blade elements to integrate")]
    NoElements,
    #[error("largest local tip speed ratio {0} is not positive")]
    NoRotation(f64),
}

/// Integrates the section coefficients of all blade elements over the local
/// tip speed ratio.
///
/// The `(λr, value)` pairs are sorted by `λr` before the composite trapezoid
/// rule is applied. A single element spans no interval, its rotor
/// coefficients are zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceAggregator {
    pub flow: FlowConditions,
    /// rotor the elements belong to, only tip radius and rpm are used
    pub geometry: RotorGeometry,
}

impl PerformanceAggregator {
    pub fn new(flow: FlowConditions, geometry: RotorGeometry) -> Self {
        PerformanceAggregator { flow, geometry }
    }

    pub fn aggregate(
        &self,
        elements: &[ElementState],
    ) -> Result<RotorPerformance, PerformanceError> {
        if elements.is_empty() {
            return Err(PerformanceError::NoElements);
        }
        let FlowConditions { density, velocity } = self.flow;
        let lambda_max = elements
            .iter()
            .map(|e| e.lambda_r)
            .fold(f64::NEG_INFINITY, f64::max);
        if lambda_max.is_nan() || lambda_max <= 0.0 {
            return Err(PerformanceError::NoRotation(lambda_max));
        }
        if elements.len() == 1 {
            warn!("a single blade element spans no interval, rotor Ct and Cp are zero");
        }

        let sorted: Vec<&ElementState> = elements
            .iter()
            .sorted_by(|a, b| a.lambda_r.total_cmp(&b.lambda_r))
            .collect();
        let lambda: Vec<f64> = sorted.iter().map(|e| e.lambda_r).collect();
        let delta_ct: Vec<f64> = sorted.iter().map(|e| e.delta_ct).collect();
        let delta_cp: Vec<f64> = sorted.iter().map(|e| e.delta_cp).collect();

        let RotorGeometry { tip_radius, rpm, .. } = self.geometry;
        let norm = 0.5 * density * velocity.powi(2) * self.geometry.swept_area();
        let ct = trapezoid(&lambda, &delta_ct);
        let cp = trapezoid(&lambda, &delta_cp) * 8.0 / lambda_max.powi(2);

        Ok(RotorPerformance {
            net_thrust: ct * norm,
            net_power: cp * norm * velocity,
            ct,
            cp,
            j: velocity / (rpm / 60.0 * 2.0 * tip_radius),
            tip_speed_ratio: self.geometry.omega() * tip_radius / velocity,
        })
    }
}

impl Evaluable for PerformanceAggregator {
    type Input = [ElementState];
    type Output = RotorPerformance;
    type Error = PerformanceError;

    fn evaluate(&self, input: &[ElementState]) -> Result<RotorPerformance, PerformanceError> {
        self.aggregate(input)
    }
}

/// composite trapezoid rule over the points `(x_i, y_i)`, zero for less than two points
pub fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    x.iter()
        .zip(y)
        .tuple_windows()
        .map(|((x0, y0), (x1, y1))| (x1 - x0) * (y0 + y1) / 2.0)
        .sum()
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use approx::assert_relative_eq;

    use super::*;

    fn state(lambda_r: f64, delta_ct: f64, delta_cp: f64) -> ElementState {
        ElementState {
            a: 0.0,
            b: 0.0,
            phi: 0.0,
            alpha: 0.0,
            lambda_r,
            sigma: 0.0,
            omega: 0.0,
            v_0: 0.0,
            v_1: 0.0,
            v_2: 0.0,
            delta_ct,
            delta_cp,
            iterations: 0,
            residual: 0.0,
        }
    }

    fn aggregator() -> PerformanceAggregator {
        // tip radius 5 m at 107 rpm
        PerformanceAggregator::new(FlowConditions::default(), RotorGeometry::default())
    }

    #[test]
    fn trapezoid_is_exact_for_constants() {
        let lambda = [0.3, 1.1, 1.2, 4.0, 7.9];
        let elements: Vec<_> = lambda.iter().map(|&l| state(l, 0.25, 0.0)).collect();
        let perf = aggregator().aggregate(&elements).unwrap();
        assert_relative_eq!(perf.ct, 0.25 * (7.9 - 0.3), max_relative = 1e-12);
    }

    #[test]
    fn trapezoid_is_exact_for_linear_functions() {
        let x = [0.0, 0.5, 2.0, 3.0];
        let y: Vec<f64> = x.iter().map(|x| 2.0 * x + 1.0).collect();
        assert_relative_eq!(trapezoid(&x, &y), 12.0, max_relative = 1e-12);
        assert_eq!(trapezoid(&[1.0], &[3.0]), 0.0);
        assert_eq!(trapezoid(&[], &[]), 0.0);
    }

    #[test]
    fn elements_are_sorted_by_tip_speed_ratio() {
        let ordered = [state(1.0, 1.0, 1.0), state(2.0, 3.0, 2.0), state(4.0, 2.0, 5.0)];
        let shuffled = [ordered[2], ordered[0], ordered[1]];
        let a = aggregator().aggregate(&ordered).unwrap();
        let b = aggregator().aggregate(&shuffled).unwrap();
        assert_eq!(a, b);
        // (1 + 3) / 2 * 1 + (3 + 2) / 2 * 2
        assert_relative_eq!(a.ct, 7.0, max_relative = 1e-12);
        // ((1 + 2) / 2 * 1 + (2 + 5) / 2 * 2) * 8 / 16
        assert_relative_eq!(a.cp, 4.25, max_relative = 1e-12);
    }

    #[test]
    fn dimensional_values() {
        let elements = [state(1.0, 1.0, 1.0), state(3.0, 1.0, 1.0)];
        let perf = aggregator().aggregate(&elements).unwrap();
        let norm = 0.5 * 1.225 * 49.0 * PI * 25.0;
        assert_relative_eq!(perf.ct, 2.0, max_relative = 1e-12);
        assert_relative_eq!(perf.net_thrust, 2.0 * norm, max_relative = 1e-12);
        assert_relative_eq!(perf.cp, 2.0 * 8.0 / 9.0, max_relative = 1e-12);
        assert_relative_eq!(perf.net_power, perf.cp * norm * 7.0, max_relative = 1e-12);
        assert_relative_eq!(perf.j, 7.0 / (107.0 / 60.0 * 10.0), max_relative = 1e-12);
        assert_relative_eq!(
            perf.tip_speed_ratio,
            107.0 * 2.0 * PI / 60.0 * 5.0 / 7.0,
            max_relative = 1e-12
        );
    }

    #[test]
    fn dimensional_values_follow_the_geometry() {
        let geometry = RotorGeometry {
            tip_radius: 10.0,
            rpm: 50.0,
            ..Default::default()
        };
        let elements = [state(1.0, 1.0, 1.0), state(3.0, 1.0, 1.0)];
        let perf = PerformanceAggregator::new(FlowConditions::default(), geometry)
            .aggregate(&elements)
            .unwrap();
        let norm = 0.5 * 1.225 * 49.0 * PI * 100.0;
        assert_relative_eq!(perf.net_thrust, 2.0 * norm, max_relative = 1e-12);
        assert_relative_eq!(perf.j, 7.0 / (50.0 / 60.0 * 20.0), max_relative = 1e-12);
        assert_relative_eq!(
            perf.tip_speed_ratio,
            50.0 * 2.0 * PI / 60.0 * 10.0 / 7.0,
            max_relative = 1e-12
        );
    }

    #[test]
    fn single_element_has_zero_coefficients() {
        let perf = aggregator().aggregate(&[state(2.0, 1.0, 1.0)]).unwrap();
        assert_eq!(perf.ct, 0.0);
        assert_eq!(perf.cp, 0.0);
        assert_eq!(perf.net_power, 0.0);
    }

    #[test]
    fn degenerate_inputs_fail() {
        assert_eq!(aggregator().aggregate(&[]), Err(PerformanceError::NoElements));
        assert_eq!(
            aggregator().aggregate(&[state(0.0, 1.0, 1.0), state(0.0, 1.0, 1.0)]),
            Err(PerformanceError::NoRotation(0.0))
        );
    }
}
