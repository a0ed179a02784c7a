use thiserror::Error;

/// Failures of a single inference run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MixingError {
    /// Rejected at the input boundary: non-positive σ, non-finite value,
    /// wrong source count or mismatched vector lengths.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Every sample's likelihood underflowed, so the weights cannot be normalized.
    #[error("observation incompatible with sampled source mixtures at this σ (likelihood sum {total:e} over {samples} samples)")]
    DegenerateLikelihood { total: f64, samples: usize },
}

impl MixingError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        MixingError::InvalidParameter(msg.into())
    }

    /// Short machine-readable tag used by the web boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            MixingError::InvalidParameter(_) => "invalid_parameter",
            MixingError::DegenerateLikelihood { .. } => "degenerate_likelihood",
        }
    }
}

/// Failures while rasterizing density curves.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("nothing to draw: {0}")]
    Empty(&'static str),

    #[error("image {width}x{height} is too small for the plot area")]
    TooSmall { width: u32, height: u32 },

    #[error("failed to write image: {0}")]
    Image(#[from] image::ImageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(MixingError::invalid("x").kind(), "invalid_parameter");
        let e = MixingError::DegenerateLikelihood { total: 0.0, samples: 10 };
        assert_eq!(e.kind(), "degenerate_likelihood");
        assert!(e.to_string().contains("incompatible"));
    }
}
