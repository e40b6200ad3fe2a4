use std::f64::consts::PI;

use log::debug;
use ndarray::{array, Array1, Array2};
use thiserror::Error;

use crate::{
    aerofoil::{Aerofoil, ClCd},
    component::Evaluable,
    rotor::FlowConditions,
};

/// Denominators below this magnitude mean the flow left the physical regime.
pub const SINGULAR_EPS: f64 = 1e-9;

/// relative step of the forward difference Jacobian
const FD_STEP: f64 = 1e-7;
/// maximum number of step halvings in the line search
const MAX_BACKTRACK: usize = 30;

/// Geometry of a single radial slice of a blade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementGeometry {
    /// mean radius of the element in m
    pub radius: f64,
    /// radial width of the element in m
    pub width: f64,
    /// local twist angle in radians
    pub twist: f64,
    /// local chord length in m
    pub chord: f64,
}

/// A blade element together with the rotor and flow values it shares with
/// all other elements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BladeElement {
    pub geometry: ElementGeometry,
    /// number of blades
    pub blades: u32,
    /// rotations per minute
    pub rpm: f64,
    pub flow: FlowConditions,
}

impl BladeElement {
    /// local solidity `σ = B c / (2 π r)`
    pub fn solidity(&self) -> f64 {
        self.blades as f64 * self.geometry.chord / (2.0 * PI * self.geometry.radius)
    }

    /// angular velocity in rad/s
    pub fn omega(&self) -> f64 {
        self.rpm * 2.0 * PI / 60.0
    }

    /// local tip speed ratio `λr = ω r / V`
    pub fn lambda_r(&self) -> f64 {
        self.omega() * self.geometry.radius / self.flow.velocity
    }
}

/// Converged state of a blade element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementState {
    /// axial induction factor
    pub a: f64,
    /// angular induction factor
    pub b: f64,
    /// relative flow angle onto the blade in radians
    pub phi: f64,
    /// angle of attack in radians
    pub alpha: f64,
    /// local tip speed ratio
    pub lambda_r: f64,
    /// local solidity
    pub sigma: f64,
    /// angular velocity in rad/s
    pub omega: f64,
    /// axial flow at the rotor disk in m/s
    pub v_0: f64,
    /// local flow velocity in m/s
    pub v_1: f64,
    /// angular flow at the rotor disk in m/s
    pub v_2: f64,
    /// section thrust coefficient
    pub delta_ct: f64,
    /// section power coefficient (integrand over `λr`)
    pub delta_cp: f64,
    /// Newton iterations used
    pub iterations: usize,
    /// infinity norm of the residual at the solution
    pub residual: f64,
}

/// Settings of the induction factor iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InflowSettings {
    /// initial guess for the axial induction factor
    pub a_init: f64,
    /// initial guess for the angular induction factor
    pub b_init: f64,
    /// absolute tolerance on the infinity norm of the residual
    pub tolerance: f64,
    pub max_iter: usize,
}

impl Default for InflowSettings {
    fn default() -> Self {
        InflowSettings {
            a_init: 0.2,
            b_init: 0.01,
            tolerance: 1e-9,
            max_iter: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InflowError {
    #[error("no convergence after {iterations} iterations (a = {a}, b = {b}, residual = {residual:e})")]
    NotConverged {
        a: f64,
        b: f64,
        residual: f64,
        iterations: usize,
    },
    #[error("singular flow at a = {a}, b = {b}: {reason}")]
    SingularFlow { a: f64, b: f64, reason: &'static str },
}

/// Induced flow for one pair of induction factors.
#[derive(Debug, Clone, Copy)]
struct Inflow {
    phi: f64,
    alpha: f64,
    clcd: ClCd,
    a: f64,
    b: f64,
}

/// Solves the momentum / blade element equations of a single [`BladeElement`]
/// for the axial and angular induction factors.
#[derive(Debug, Clone, Copy)]
pub struct InflowSolver<'a> {
    aerofoil: &'a Aerofoil,
    settings: InflowSettings,
}

impl<'a> InflowSolver<'a> {
    pub fn new(aerofoil: &'a Aerofoil, settings: InflowSettings) -> Self {
        InflowSolver { aerofoil, settings }
    }

    pub fn settings(&self) -> &InflowSettings {
        &self.settings
    }

    /// the updated induction factors `(a', b')` for the iterate `(a, b)`
    fn inflow(&self, element: &BladeElement, a: f64, b: f64) -> Result<Inflow, InflowError> {
        let sigma = element.solidity();
        let lambda_r = element.lambda_r();

        let phi = (lambda_r * (1.0 + b) / (1.0 - a)).atan();
        let alpha = PI / 2.0 - element.geometry.twist - phi;
        let clcd = self.aerofoil.cl_cd(alpha);
        let (sin_phi, cos_phi) = phi.sin_cos();
        if !phi.is_finite() || cos_phi.abs() < SINGULAR_EPS {
            return Err(InflowError::SingularFlow {
                a,
                b,
                reason: "cos(phi) vanishes",
            });
        }

        // 1 / (1 + 4 cos²φ / (σ cl sinφ)), written without dividing by cl
        let lift = sigma * clcd.cl() * sin_phi;
        let denominator = lift + 4.0 * cos_phi.powi(2);
        if denominator.abs() < SINGULAR_EPS {
            return Err(InflowError::SingularFlow {
                a,
                b,
                reason: "axial induction update is singular",
            });
        }
        let a_new = lift / denominator;
        let b_new = sigma * clcd.cl() / (4.0 * lambda_r * cos_phi) * (1.0 - a_new);
        Ok(Inflow {
            phi,
            alpha,
            clcd,
            a: a_new,
            b: b_new,
        })
    }

    /// residual `(a - a', b - b')` of the induction factor equations
    pub fn residual(
        &self,
        element: &BladeElement,
        a: f64,
        b: f64,
    ) -> Result<[f64; 2], InflowError> {
        let inflow = self.inflow(element, a, b)?;
        Ok([a - inflow.a, b - inflow.b])
    }

    fn residual_vec(
        &self,
        element: &BladeElement,
        x: &Array1<f64>,
    ) -> Result<Array1<f64>, InflowError> {
        let [r_a, r_b] = self.residual(element, x[0], x[1])?;
        Ok(array![r_a, r_b])
    }

    /// forward difference Jacobian of the residual at `x`
    fn jacobian(
        &self,
        element: &BladeElement,
        x: &Array1<f64>,
        r: &Array1<f64>,
    ) -> Result<Array2<f64>, InflowError> {
        let mut jac = Array2::zeros((2, 2));
        for j in 0..2 {
            let h = FD_STEP * x[j].abs().max(1.0);
            let mut x_h = x.clone();
            x_h[j] += h;
            let r_h = self.residual_vec(element, &x_h)?;
            jac.column_mut(j).assign(&((r_h - r) / h));
        }
        Ok(jac)
    }

    /// Damped Newton iteration on the residual, starting from the initial guess.
    ///
    /// Steps are halved until the residual decreases and `a < 1`.
    fn solve_induction(
        &self,
        element: &BladeElement,
    ) -> Result<(Array1<f64>, f64, usize), InflowError> {
        let settings = &self.settings;
        let mut x = array![settings.a_init, settings.b_init];
        let mut r = self.residual_vec(element, &x)?;
        let mut iterations = 0;
        loop {
            let norm = max_norm(&r);
            if norm < settings.tolerance {
                return Ok((x, norm, iterations));
            }
            let not_converged = InflowError::NotConverged {
                a: x[0],
                b: x[1],
                residual: norm,
                iterations,
            };
            if iterations >= settings.max_iter || norm.is_nan() {
                return Err(not_converged);
            }

            let jac = self.jacobian(element, &x, &r)?;
            let dx = match solve_2x2(&jac, &r) {
                Some(dx) => dx,
                None => return Err(not_converged),
            };

            let mut t = 1.0;
            let mut fallback = None;
            let mut accepted = None;
            for _ in 0..MAX_BACKTRACK {
                let candidate = &x - &(&dx * t);
                t *= 0.5;
                if candidate[0].is_nan() || candidate[0] >= 1.0 {
                    continue;
                }
                let Ok(r_c) = self.residual_vec(element, &candidate) else {
                    continue;
                };
                if max_norm(&r_c) < norm {
                    accepted = Some((candidate, r_c));
                    break;
                }
                fallback = Some((candidate, r_c));
            }
            (x, r) = match accepted.or(fallback) {
                Some(step) => step,
                None => return Err(not_converged),
            };
            iterations += 1;
        }
    }

    /// Solve the induction factors and evaluate the section coefficients.
    pub fn solve(&self, element: &BladeElement) -> Result<ElementState, InflowError> {
        let (x, residual, iterations) = self.solve_induction(element)?;
        let (a, b) = (x[0], x[1]);
        let inflow = self.inflow(element, a, b)?;
        let (cl, cd) = (inflow.clcd.cl(), inflow.clcd.cd());
        if cl.abs() < SINGULAR_EPS {
            return Err(InflowError::SingularFlow {
                a,
                b,
                reason: "lift coefficient vanishes",
            });
        }

        let FlowConditions { density, velocity } = element.flow;
        let ElementGeometry {
            radius,
            width,
            chord,
            ..
        } = element.geometry;
        let omega = element.omega();
        let omega_r = omega * radius;
        let lambda_r = element.lambda_r();

        let v_0 = velocity * (1.0 - a);
        let v_2 = omega_r * (1.0 - b);
        let v_1 = (v_0.powi(2) + v_2.powi(2)).sqrt();

        let (sin_phi, cos_phi) = inflow.phi.sin_cos();
        let q_c = element.blades as f64 * 0.5 * density * v_1.powi(2) * chord * width;
        let delta_ct = q_c * (cl * cos_phi - cd * sin_phi)
            / (0.5 * density * velocity.powi(2) * PI * radius.powi(2));
        let delta_cp = b * (1.0 - a) * lambda_r.powi(3) * (1.0 - cd / cl * inflow.phi.tan());

        debug!(
            "element at r = {radius:.3} m converged in {iterations} iterations: a = {a:.5}, b = {b:.5}, alpha = {:.2}°",
            inflow.alpha.to_degrees()
        );

        Ok(ElementState {
            a,
            b,
            phi: inflow.phi,
            alpha: inflow.alpha,
            lambda_r,
            sigma: element.solidity(),
            omega,
            v_0,
            v_1,
            v_2,
            delta_ct,
            delta_cp,
            iterations,
            residual,
        })
    }
}

impl<'a> Evaluable for InflowSolver<'a> {
    type Input = BladeElement;
    type Output = ElementState;
    type Error = InflowError;

    fn evaluate(&self, input: &BladeElement) -> Result<ElementState, InflowError> {
        self.solve(input)
    }
}

/// infinity norm, NaN if any entry is NaN
fn max_norm(v: &Array1<f64>) -> f64 {
    v.iter()
        .map(|x| x.abs())
        .fold(0.0, |acc, x| if x.is_nan() || x > acc { x } else { acc })
}

/// solve `J dx = r` with Cramer's rule
fn solve_2x2(jac: &Array2<f64>, r: &Array1<f64>) -> Option<Array1<f64>> {
    let det = jac[(0, 0)] * jac[(1, 1)] - jac[(0, 1)] * jac[(1, 0)];
    if !det.is_normal() {
        return None;
    }
    Some(array![
        (jac[(1, 1)] * r[0] - jac[(0, 1)] * r[1]) / det,
        (jac[(0, 0)] * r[1] - jac[(1, 0)] * r[0]) / det,
    ])
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::array;

    use super::*;

    /// hub element of the six element reference rotor
    fn hub_element() -> BladeElement {
        BladeElement {
            geometry: ElementGeometry {
                radius: 0.6,
                width: 0.8,
                twist: 26.285f64.to_radians(),
                chord: 0.65725,
            },
            blades: 3,
            rpm: 107.0,
            flow: FlowConditions::default(),
        }
    }

    /// tip element of the six element reference rotor
    fn tip_element() -> BladeElement {
        BladeElement {
            geometry: ElementGeometry {
                radius: 4.6,
                width: 0.8,
                twist: (-0.865f64).to_radians(),
                chord: 0.22975,
            },
            ..hub_element()
        }
    }

    #[test]
    fn derived_quantities() {
        let element = hub_element();
        assert_relative_eq!(element.solidity(), 0.5230229317357411, max_relative = 1e-12);
        assert_relative_eq!(element.omega(), 107.0 * PI / 30.0, max_relative = 1e-12);
        assert_relative_eq!(element.lambda_r(), 0.9604297540974509, max_relative = 1e-12);
    }

    #[test]
    fn hub_element_converges() {
        let foil = Aerofoil::naca0012();
        let solver = InflowSolver::new(&foil, InflowSettings::default());
        let state = solver.solve(&hub_element()).unwrap();
        assert_relative_eq!(state.a, 0.22065294449530687, max_relative = 1e-6);
        assert_relative_eq!(state.b, 0.16062641403663203, max_relative = 1e-6);
        assert_relative_eq!(state.delta_ct, 0.8716, max_relative = 1e-3);
        assert_relative_eq!(state.delta_cp, 0.1109, max_relative = 1e-3);
        assert!(state.iterations > 0);
    }

    #[test]
    fn converged_factors_satisfy_the_residual_equations() {
        let foil = Aerofoil::naca0012();
        let settings = InflowSettings::default();
        let solver = InflowSolver::new(&foil, settings);
        for element in [hub_element(), tip_element()] {
            let state = solver.solve(&element).unwrap();
            let [r_a, r_b] = solver.residual(&element, state.a, state.b).unwrap();
            assert!(r_a.abs().max(r_b.abs()) < settings.tolerance);
            assert!((0.0..1.0).contains(&state.a));
        }
    }

    #[test]
    fn tip_element_state() {
        let foil = Aerofoil::naca0012();
        let solver = InflowSolver::new(&foil, InflowSettings::default());
        let state = solver.solve(&tip_element()).unwrap();
        assert_relative_eq!(state.a, 0.2928857596042688, max_relative = 1e-6);
        assert_relative_eq!(state.b, 0.003805344340605576, max_relative = 1e-6);
        assert_relative_eq!(state.lambda_r, 7.36329478141379, max_relative = 1e-12);
        assert_relative_eq!(state.v_0, 7.0 * (1.0 - state.a), max_relative = 1e-12);
        assert_relative_eq!(
            state.v_1,
            (state.v_0.powi(2) + state.v_2.powi(2)).sqrt(),
            max_relative = 1e-12
        );
        assert_relative_eq!(
            state.alpha,
            PI / 2.0 - tip_element().geometry.twist - state.phi,
            max_relative = 1e-12
        );
    }

    #[test]
    fn iteration_cap_is_reported() {
        let foil = Aerofoil::naca0012();
        let settings = InflowSettings {
            max_iter: 1,
            tolerance: 1e-15,
            ..Default::default()
        };
        let err = InflowSolver::new(&foil, settings)
            .solve(&hub_element())
            .unwrap_err();
        match err {
            InflowError::NotConverged {
                iterations,
                residual,
                a,
                ..
            } => {
                assert_eq!(iterations, 1);
                assert!(residual > 0.0);
                assert!(a < 1.0);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn residual_norm_propagates_nan() {
        assert_eq!(max_norm(&array![0.5, -2.0]), 2.0);
        assert!(max_norm(&array![f64::NAN, 1.0]).is_nan());
        assert!(max_norm(&array![1.0, f64::NAN]).is_nan());
    }

    #[test]
    fn nan_initial_guess_never_converges() {
        let foil = Aerofoil::naca0012();
        for (a_init, b_init) in [(f64::NAN, 0.01), (0.2, f64::NAN)] {
            let settings = InflowSettings {
                a_init,
                b_init,
                ..Default::default()
            };
            let result = InflowSolver::new(&foil, settings).solve(&hub_element());
            assert!(result.is_err(), "{result:?}");
        }
    }

    #[test]
    fn zero_lift_is_singular() {
        let foil = Aerofoil::builder()
            .lift(array![[-2.0, 0.0], [2.0, 0.0]])
            .drag(array![[-2.0, 0.01], [2.0, 0.01]])
            .fill_value(0.0)
            .build()
            .unwrap();
        let err = InflowSolver::new(&foil, InflowSettings::default())
            .solve(&hub_element())
            .unwrap_err();
        assert!(matches!(err, InflowError::SingularFlow { .. }), "{err}");
    }

    #[test]
    fn axial_factor_at_one_is_singular() {
        let foil = Aerofoil::naca0012();
        let settings = InflowSettings {
            a_init: 1.0,
            ..Default::default()
        };
        let err = InflowSolver::new(&foil, settings)
            .solve(&hub_element())
            .unwrap_err();
        assert!(matches!(err, InflowError::SingularFlow { .. }), "{err}");
    }
}
