use crate::error::ConfigError;

/// Free stream conditions shared by all blade elements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowConditions {
    /// air density in kg/m³
    pub density: f64,
    /// free stream air velocity in m/s
    pub velocity: f64,
}

impl Default for FlowConditions {
    /// - `density = 1.225` kg/m³
    /// - `velocity = 7.0` m/s
    fn default() -> Self {
        FlowConditions {
            density: 1.225,
            velocity: 7.0,
        }
    }
}

impl FlowConditions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_positive("air density", self.density)?;
        ConfigError::check_positive("free stream velocity", self.velocity)?;
        Ok(())
    }
}

/// Hub and tip geometry of the rotor blades and the operating point.
///
/// Radii and chords are given in m, angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotorGeometry {
    pub hub_radius: f64,
    pub tip_radius: f64,
    /// twist angle at the hub radius in degrees
    pub twist_hub: f64,
    /// twist angle at the tip radius in degrees
    pub twist_tip: f64,
    pub chord_hub: f64,
    pub chord_tip: f64,
    /// overall blade pitch in degrees, added to the twist of every element
    pub pitch: f64,
    /// number of blades
    pub blades: u32,
    /// rotations per minute
    pub rpm: f64,
}

impl Default for RotorGeometry {
    /// A three bladed 5 m rotor:
    ///
    /// - `hub_radius = 0.2`, `tip_radius = 5.0`
    /// - `twist_hub = 29.0`, `twist_tip = -3.58`
    /// - `chord_hub = 0.7`, `chord_tip = 0.187`
    /// - `pitch = 0.0`, `blades = 3`, `rpm = 107.0`
    fn default() -> Self {
        RotorGeometry {
            hub_radius: 0.2,
            tip_radius: 5.0,
            twist_hub: 29.0,
            twist_tip: -3.58,
            chord_hub: 0.7,
            chord_tip: 0.187,
            pitch: 0.0,
            blades: 3,
            rpm: 107.0,
        }
    }
}

impl RotorGeometry {
    /// check the rotor level invariants, element level checks happen when
    /// the elements are generated
    pub fn validate(&self) -> Result<(), ConfigError> {
        let hub = ConfigError::check_positive("hub radius", self.hub_radius)?;
        let tip = ConfigError::check_positive("tip radius", self.tip_radius)?;
        if hub >= tip {
            return Err(ConfigError::HubOutsideTip { hub, tip });
        }
        ConfigError::check_positive("hub chord", self.chord_hub)?;
        ConfigError::check_positive("tip chord", self.chord_tip)?;
        ConfigError::check_finite("hub twist", self.twist_hub)?;
        ConfigError::check_finite("tip twist", self.twist_tip)?;
        ConfigError::check_finite("pitch", self.pitch)?;
        ConfigError::check_positive("blade count", self.blades as f64)?;
        ConfigError::check_positive("rpm", self.rpm)?;
        Ok(())
    }

    /// angular velocity of the rotor in rad/s
    pub fn omega(&self) -> f64 {
        self.rpm * 2.0 * std::f64::consts::PI / 60.0
    }

    /// swept area in m²
    pub fn swept_area(&self) -> f64 {
        std::f64::consts::PI * self.tip_radius.powi(2)
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn default_rotor_is_valid() {
        assert_eq!(RotorGeometry::default().validate(), Ok(()));
        assert_eq!(FlowConditions::default().validate(), Ok(()));
    }

    #[test]
    fn invalid_geometry_is_rejected() {
        let rotor = RotorGeometry {
            hub_radius: 5.0,
            ..Default::default()
        };
        assert_eq!(
            rotor.validate(),
            Err(ConfigError::HubOutsideTip { hub: 5.0, tip: 5.0 })
        );

        let rotor = RotorGeometry {
            chord_tip: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            rotor.validate(),
            Err(ConfigError::NotPositive { name: "tip chord", .. })
        ));

        let rotor = RotorGeometry {
            blades: 0,
            ..Default::default()
        };
        assert!(rotor.validate().is_err());

        let rotor = RotorGeometry {
            twist_hub: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(rotor.validate(), Err(ConfigError::NotFinite { .. })));
    }

    #[test]
    fn derived_rotor_quantities() {
        let rotor = RotorGeometry::default();
        assert_relative_eq!(rotor.swept_area(), 25.0 * PI, max_relative = 1e-12);
        assert_relative_eq!(rotor.omega(), 107.0 * PI / 30.0, max_relative = 1e-12);
    }

    #[test]
    fn invalid_flow_is_rejected() {
        let flow = FlowConditions {
            velocity: 0.0,
            ..Default::default()
        };
        assert!(flow.validate().is_err());
    }
}
