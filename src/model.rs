//! Isotope mixing data model.
//! One observation, exactly three sources, proportion vectors on the 2-simplex.

use serde::{Deserialize, Serialize};

use crate::error::MixingError;

/// Number of sources the model mixes. Fixed.
pub const SOURCE_COUNT: usize = 3;

/// Default source names, in proportion-vector order.
pub const SOURCE_LABELS: [&str; SOURCE_COUNT] = ["S1", "S2", "S3"];

/// One point on the 2-simplex: proportion contributed by each source.
pub type Proportions = [f64; SOURCE_COUNT];

/// A (δ¹⁸O, δ²H) pair in per mil.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub o18: f64,
    pub h2: f64,
}

impl Signature {
    pub fn new(o18: f64, h2: f64) -> Self {
        Signature { o18, h2 }
    }

    fn check_finite(&self, what: &str) -> Result<(), MixingError> {
        if !self.o18.is_finite() || !self.h2.is_finite() {
            return Err(MixingError::invalid(format!(
                "{what} must be finite, got ({}, {})",
                self.o18, self.h2
            )));
        }
        Ok(())
    }
}

/// Observed mixture with its measurement uncertainty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    signature: Signature,
    sd_o18: f64,
    sd_h2: f64,
}

impl Observation {
    /// Both standard deviations must be strictly positive and finite.
    pub fn new(signature: Signature, sd_o18: f64, sd_h2: f64) -> Result<Self, MixingError> {
        signature.check_finite("observed signature")?;
        for (name, sd) in [("sd_o18", sd_o18), ("sd_h2", sd_h2)] {
            if !(sd.is_finite() && sd > 0.0) {
                return Err(MixingError::invalid(format!(
                    "{name} must be a positive finite number, got {sd}"
                )));
            }
        }
        Ok(Observation {
            signature,
            sd_o18,
            sd_h2,
        })
    }

    pub fn signature(&self) -> Signature {
        self.signature
    }

    pub fn sd_o18(&self) -> f64 {
        self.sd_o18
    }

    pub fn sd_h2(&self) -> f64 {
        self.sd_h2
    }
}

/// A named candidate end-member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    #[serde(flatten)]
    pub mean: Signature,
}

impl Source {
    pub fn new(name: impl Into<String>, o18: f64, h2: f64) -> Self {
        Source {
            name: name.into(),
            mean: Signature::new(o18, h2),
        }
    }
}

/// Exactly three sources. Order defines the proportion-vector indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Sources([Source; SOURCE_COUNT]);

impl Sources {
    pub fn new(sources: [Source; SOURCE_COUNT]) -> Result<Self, MixingError> {
        for s in &sources {
            s.mean.check_finite(&format!("source {}", s.name))?;
        }
        Ok(Sources(sources))
    }

    /// Checked construction from an arbitrary collection; anything but three
    /// sources is rejected.
    pub fn from_vec(sources: Vec<Source>) -> Result<Self, MixingError> {
        let count = sources.len();
        let array: [Source; SOURCE_COUNT] = sources.try_into().map_err(|_| {
            MixingError::invalid(format!(
                "exactly {SOURCE_COUNT} sources are required, got {count}"
            ))
        })?;
        Self::new(array)
    }

    pub fn names(&self) -> [&str; SOURCE_COUNT] {
        [
            self.0[0].name.as_str(),
            self.0[1].name.as_str(),
            self.0[2].name.as_str(),
        ]
    }

    pub fn o18_means(&self) -> [f64; SOURCE_COUNT] {
        self.0.each_ref().map(|s| s.mean.o18)
    }

    pub fn h2_means(&self) -> [f64; SOURCE_COUNT] {
        self.0.each_ref().map(|s| s.mean.h2)
    }
}
