use log::trace;
use ndarray::{array, Array2, Axis, Ix1, OwnedRepr};
use ndarray_interp::{
    interp1d::{Interp1D, Linear},
    vector_extensions::{Monotonic, VectorExtensions},
};
use thiserror::Error;

/// Value returned by both tables for angles of attack outside their data.
pub const DEFAULT_FILL_VALUE: f64 = 0.001;

/// Coefficient of lift and drag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClCd([f64; 2]);

impl ClCd {
    pub fn cl(&self) -> f64 {
        self.0[0]
    }

    pub fn cd(&self) -> f64 {
        self.0[1]
    }
}

impl AsRef<[f64; 2]> for ClCd {
    fn as_ref(&self) -> &[f64; 2] {
        &self.0
    }
}

type Lut = Interp1D<OwnedRepr<f64>, OwnedRepr<f64>, Ix1, Linear>;

/// One piecewise linear coefficient table over the angle of attack.
#[derive(Debug)]
struct CoefficientTable {
    lut: Lut,
    alpha_min: f64,
    alpha_max: f64,
    fill: f64,
}

impl CoefficientTable {
    fn lookup(&self, alpha: f64) -> f64 {
        if !(self.alpha_min..=self.alpha_max).contains(&alpha) {
            trace!(
                "angle of attack {:.3}° outside [{:.3}°, {:.3}°], using fill value {}",
                alpha.to_degrees(),
                self.alpha_min.to_degrees(),
                self.alpha_max.to_degrees(),
                self.fill
            );
            return self.fill;
        }
        // alpha is inside the grid, so the lookup can not go out of bounds
        self.lut.interp_scalar(alpha).unwrap_or(self.fill)
    }
}

/// An Aerofoil implemented using two independent LUTs for lift and drag.
///
/// Angles of attack outside of a table are not an error, the table answers
/// with its fill value instead.
#[derive(Debug)]
pub struct Aerofoil {
    lift: CoefficientTable,
    drag: CoefficientTable,
}

impl Aerofoil {
    pub fn builder() -> AerofoilBuilder {
        AerofoilBuilder::new()
    }

    /// Rough linear fit of NACA 0012 data.
    ///
    /// - lift: `alpha = [0, 13, 15, 20, 30]°`, `cl = [0, 1.3, 0.8, 0.7, 1.1]`
    /// - drag: `alpha = [0, 10, 20, 30, 40]°`, `cd = [0, 0, 0.3, 0.6, 1.0]`
    pub fn naca0012() -> Self {
        let lift = array![[0.0, 0.0], [13.0, 1.3], [15.0, 0.8], [20.0, 0.7], [30.0, 1.1]];
        let drag = array![[0.0, 0.0], [10.0, 0.0], [20.0, 0.3], [30.0, 0.6], [40.0, 1.0]];
        // the tables above are valid by construction
        match Aerofoil::builder().lift(lift).drag(drag).degrees(true).build() {
            Ok(aerofoil) => aerofoil,
            Err(err) => unreachable!("builtin NACA 0012 tables are invalid: {err}"),
        }
    }

    /// The coefficient of lift and drag ([`ClCd`]) at the given angle of attack in radians
    pub fn cl_cd(&self, alpha: f64) -> ClCd {
        ClCd([self.lift.lookup(alpha), self.drag.lookup(alpha)])
    }
}

#[derive(Debug)]
pub struct AerofoilBuilder {
    /// data rows for [alpha, cl]
    lift: Option<Array2<f64>>,
    /// data rows for [alpha, cd]
    drag: Option<Array2<f64>>,
    fill: f64,
    degrees: bool,
}

impl Default for AerofoilBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AerofoilBuilder {
    pub fn new() -> Self {
        AerofoilBuilder {
            lift: None,
            drag: None,
            fill: DEFAULT_FILL_VALUE,
            degrees: false,
        }
    }

    /// lift data as an 2-d array of `[[alpha_1, cl_1], [alpha_2, cl_2], ..]`
    /// alpha must be strict monotonic rising
    pub fn lift(mut self, data: Array2<f64>) -> Self {
        self.lift = Some(data);
        self
    }

    /// drag data as an 2-d array of `[[alpha_1, cd_1], [alpha_2, cd_2], ..]`
    /// alpha must be strict monotonic rising
    pub fn drag(mut self, data: Array2<f64>) -> Self {
        self.drag = Some(data);
        self
    }

    /// value used for angles of attack outside of the provided data
    pub fn fill_value(mut self, fill: f64) -> Self {
        self.fill = fill;
        self
    }

    /// When this is set, the alpha column is given in degrees instead of radians.
    pub fn degrees(mut self, yes: bool) -> Self {
        self.degrees = yes;
        self
    }

    pub fn build(self) -> Result<Aerofoil, AerofoilBuildError> {
        let AerofoilBuilder {
            lift,
            drag,
            fill,
            degrees,
        } = self;
        if !fill.is_finite() {
            return Err(AerofoilBuildError::NotFinite("fill value".into()));
        }
        let lift = lift.ok_or(AerofoilBuildError::Missing("lift"))?;
        let drag = drag.ok_or(AerofoilBuildError::Missing("drag"))?;
        Ok(Aerofoil {
            lift: build_table(lift, fill, degrees, "lift")?,
            drag: build_table(drag, fill, degrees, "drag")?,
        })
    }
}

fn build_table(
    data: Array2<f64>,
    fill: f64,
    degrees: bool,
    name: &'static str,
) -> Result<CoefficientTable, AerofoilBuildError> {
    if data.shape()[1] != 2 {
        return Err(AerofoilBuildError::ShapeError(format!(
            "{name} data must contain 2 elements in the second dimension"
        )));
    }
    if data.iter().any(|v| !v.is_finite()) {
        return Err(AerofoilBuildError::NotFinite(format!("{name} data")));
    }
    let mut alpha = data.index_axis(Axis(1), 0).to_owned();
    if degrees {
        alpha.mapv_inplace(f64::to_radians);
    }
    let values = data.index_axis(Axis(1), 1).to_owned();
    if alpha.len() < 2 {
        return Err(AerofoilBuildError::NotEnoughData(format!(
            "{name} data needs at least 2 rows"
        )));
    }
    if !matches!(alpha.monotonic_prop(), Monotonic::Rising { strict: true }) {
        return Err(AerofoilBuildError::Monotonic(format!(
            "{name} alpha values must be strict monotonic rising"
        )));
    }
    let alpha_min = alpha[0];
    let alpha_max = alpha[alpha.len() - 1];
    let lut = Interp1D::builder(values)
        .x(alpha)
        .strategy(Linear::new())
        .build()?;
    Ok(CoefficientTable {
        lut,
        alpha_min,
        alpha_max,
        fill,
    })
}

#[derive(Debug, Error)]
pub enum AerofoilBuildError {
    #[error("{0}")]
    ShapeError(String),
    #[error("{0}")]
    NotEnoughData(String),
    #[error("{0}")]
    Monotonic(String),
    #[error("{0} contains non finite values")]
    NotFinite(String),
    #[error("no {0} data provided")]
    Missing(&'static str),
    #[error("could not build lookup table: {0}")]
    Lut(String),
}

impl From<ndarray_interp::BuilderError> for AerofoilBuildError {
    fn from(value: ndarray_interp::BuilderError) -> Self {
        AerofoilBuildError::Lut(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::array;

    use super::*;

    #[test]
    fn naca0012_interpolates_between_breakpoints() {
        let foil = Aerofoil::naca0012();
        let clcd = foil.cl_cd(14f64.to_radians());
        assert_relative_eq!(clcd.cl(), 1.05, max_relative = 1e-12);
        assert_relative_eq!(clcd.cd(), 0.12, max_relative = 1e-12);

        let clcd = foil.cl_cd(6.5f64.to_radians());
        assert_relative_eq!(clcd.cl(), 0.65, max_relative = 1e-12);
        assert_eq!(clcd.cd(), 0.0);
    }

    #[test]
    fn lift_and_drag_use_their_own_domain() {
        let foil = Aerofoil::naca0012();
        // beyond the lift table but inside the drag table
        let clcd = foil.cl_cd(35f64.to_radians());
        assert_eq!(clcd.cl(), DEFAULT_FILL_VALUE);
        assert_relative_eq!(clcd.cd(), 0.8, max_relative = 1e-12);
    }

    #[test]
    fn out_of_domain_uses_fill_value() {
        let foil = Aerofoil::builder()
            .lift(array![[0.0, 0.0], [0.5, 1.0]])
            .drag(array![[-0.5, 0.1], [0.5, 0.1]])
            .fill_value(0.25)
            .build()
            .unwrap();
        let clcd = foil.cl_cd(-1.0);
        assert_eq!(clcd.cl(), 0.25);
        assert_eq!(clcd.cd(), 0.25);
        let clcd = foil.cl_cd(0.25);
        assert_relative_eq!(clcd.cl(), 0.5, max_relative = 1e-12);
        assert_relative_eq!(clcd.cd(), 0.1, max_relative = 1e-12);
    }

    #[test]
    fn rejects_invalid_tables() {
        let err = Aerofoil::builder()
            .lift(array![[0.0, 0.0, 1.0], [1.0, 1.0, 1.0]])
            .drag(array![[0.0, 0.0], [1.0, 1.0]])
            .build()
            .unwrap_err();
        assert!(matches!(err, AerofoilBuildError::ShapeError(_)));

        let err = Aerofoil::builder()
            .lift(array![[0.0, 0.0], [1.0, 1.0]])
            .drag(array![[1.0, 0.0], [0.0, 1.0]])
            .build()
            .unwrap_err();
        assert!(matches!(err, AerofoilBuildError::Monotonic(_)));

        let err = Aerofoil::builder()
            .lift(array![[0.0, 0.0]])
            .drag(array![[0.0, 0.0], [1.0, 1.0]])
            .build()
            .unwrap_err();
        assert!(matches!(err, AerofoilBuildError::NotEnoughData(_)));

        let err = Aerofoil::builder()
            .lift(array![[0.0, 0.0], [1.0, 1.0]])
            .build()
            .unwrap_err();
        assert!(matches!(err, AerofoilBuildError::Missing("drag")));
    }
}
