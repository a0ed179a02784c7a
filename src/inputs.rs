//! Input assembly: the six observation scalars and three source coordinate
//! pairs a caller hands over, with the documented defaults and UI minimums.

use serde::{Deserialize, Serialize};

use crate::error::MixingError;
use crate::model::{Observation, Signature, Source, Sources, SOURCE_COUNT, SOURCE_LABELS};

/// Smallest σ(δ¹⁸O) the input boundary accepts.
pub const MIN_SD_O18: f64 = 0.01;
/// Smallest σ(δ²H) the input boundary accepts.
pub const MIN_SD_H2: f64 = 0.1;

const DEFAULT_SOURCE_O18: [f64; SOURCE_COUNT] = [-8.0, -5.5, -7.0];
const DEFAULT_SOURCE_H2: [f64; SOURCE_COUNT] = [-60.0, 30.0, -55.0];

/// Raw, unchecked inputs of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixingInputs {
    pub obs_o18: f64,
    pub obs_h2: f64,
    pub sd_o18: f64,
    pub sd_h2: f64,
    pub sources: Vec<Source>,
}

impl Default for MixingInputs {
    fn default() -> Self {
        MixingInputs {
            obs_o18: -6.0,
            obs_h2: -40.0,
            sd_o18: 0.5,
            sd_h2: 2.0,
            sources: default_sources(),
        }
    }
}

pub fn default_sources() -> Vec<Source> {
    SOURCE_LABELS
        .iter()
        .enumerate()
        .map(|(i, label)| Source::new(*label, DEFAULT_SOURCE_O18[i], DEFAULT_SOURCE_H2[i]))
        .collect()
}

impl MixingInputs {
    /// Overwrite the coordinates of the source at `index`, keeping its name.
    pub fn set_source(&mut self, index: usize, o18: f64, h2: f64) -> Result<(), MixingError> {
        let source = self.sources.get_mut(index).ok_or_else(|| {
            MixingError::invalid(format!("no source at position {}", index + 1))
        })?;
        source.mean = Signature::new(o18, h2);
        Ok(())
    }

    /// Reject anything the input widgets would not allow, then build the
    /// checked model types.
    pub fn validate(&self) -> Result<(Observation, Sources), MixingError> {
        if self.sd_o18 < MIN_SD_O18 {
            return Err(MixingError::invalid(format!(
                "sd_o18 must be at least {MIN_SD_O18}, got {}",
                self.sd_o18
            )));
        }
        if self.sd_h2 < MIN_SD_H2 {
            return Err(MixingError::invalid(format!(
                "sd_h2 must be at least {MIN_SD_H2}, got {}",
                self.sd_h2
            )));
        }
        let observation = Observation::new(
            Signature::new(self.obs_o18, self.obs_h2),
            self.sd_o18,
            self.sd_h2,
        )?;
        let sources = Sources::from_vec(self.sources.clone())?;
        Ok((observation, sources))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let (obs, sources) = MixingInputs::default().validate().unwrap();
        assert_eq!(obs.signature(), Signature::new(-6.0, -40.0));
        assert_eq!(obs.sd_o18(), 0.5);
        assert_eq!(obs.sd_h2(), 2.0);
        assert_eq!(sources.names(), SOURCE_LABELS);
        assert_eq!(sources.h2_means(), [-60.0, 30.0, -55.0]);
    }

    #[test]
    fn test_ui_minimums_enforced() {
        let mut inputs = MixingInputs::default();
        inputs.sd_o18 = 0.005;
        assert!(matches!(inputs.validate(), Err(MixingError::InvalidParameter(_))));

        let mut inputs = MixingInputs::default();
        inputs.sd_h2 = 0.05;
        assert!(matches!(inputs.validate(), Err(MixingError::InvalidParameter(_))));

        let mut inputs = MixingInputs::default();
        inputs.sd_o18 = MIN_SD_O18;
        inputs.sd_h2 = MIN_SD_H2;
        assert!(inputs.validate().is_ok());
    }

    #[test]
    fn test_nan_sd_rejected() {
        let mut inputs = MixingInputs::default();
        inputs.sd_h2 = f64::NAN;
        assert!(inputs.validate().is_err());
    }

    #[test]
    fn test_set_source() {
        let mut inputs = MixingInputs::default();
        inputs.set_source(1, -4.0, 10.0).unwrap();
        assert_eq!(inputs.sources[1].name, "S2");
        assert_eq!(inputs.sources[1].mean, Signature::new(-4.0, 10.0));
        assert!(inputs.set_source(3, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_wrong_source_count_rejected() {
        let mut inputs = MixingInputs::default();
        inputs.sources.pop();
        assert!(matches!(inputs.validate(), Err(MixingError::InvalidParameter(_))));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let inputs: MixingInputs = toml::from_str("obs_o18 = -7.5").unwrap();
        assert_eq!(inputs.obs_o18, -7.5);
        assert_eq!(inputs.obs_h2, -40.0);
        assert_eq!(inputs.sources.len(), 3);
    }
}
