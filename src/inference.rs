//! Importance-sampling posterior over source proportions.
//!
//! Prior draw → forward-predict → likelihood-weight → normalize → reduce.
//! Every stage is a plain function over slices so a caller can inject fixed
//! prior draws and replay the deterministic part of a run.

use rand::Rng;
use rand_distr::{Dirichlet, Distribution};
use std::f64::consts::PI;
use tracing::{debug, warn};

use crate::error::MixingError;
use crate::model::{Observation, Proportions, Sources, SOURCE_COUNT};

/// Prior draws per run unless configured otherwise.
pub const DEFAULT_SAMPLE_COUNT: usize = 5000;

/// Flat Dirichlet prior over the simplex.
pub const PRIOR_CONCENTRATION: [f64; SOURCE_COUNT] = [1.0; SOURCE_COUNT];

/// Draw `count` proportion vectors i.i.d. from Dirichlet(1,1,1).
pub fn sample_prior<R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
) -> Result<Vec<Proportions>, MixingError> {
    if count == 0 {
        return Err(MixingError::invalid("sample count must be at least 1"));
    }
    let prior = Dirichlet::new(&PRIOR_CONCENTRATION)
        .map_err(|e| MixingError::invalid(format!("prior concentration: {e}")))?;

    let mut samples = Vec::with_capacity(count);
    for _ in 0..count {
        let draw: Vec<f64> = prior.sample(rng);
        samples.push([draw[0], draw[1], draw[2]]);
    }
    debug!(count, "drew prior proportions");
    Ok(samples)
}

/// Linear mixing: predicted value of each sample is Σ pᵢ · meanᵢ.
pub fn predict(proportions: &[Proportions], means: &[f64; SOURCE_COUNT]) -> Vec<f64> {
    proportions
        .iter()
        .map(|p| p.iter().zip(means).map(|(pi, mi)| pi * mi).sum())
        .collect()
}

/// Gaussian density of `x` under N(mean, sd²).
pub fn normal_pdf(x: f64, mean: f64, sd: f64) -> f64 {
    let z = (x - mean) / sd;
    (-0.5 * z * z).exp() / (sd * (2.0 * PI).sqrt())
}

/// Per-sample likelihood under independent Gaussian noise on both isotopes,
/// normalized into posterior weights.
///
/// Fails with [`MixingError::DegenerateLikelihood`] when the likelihood sum
/// underflows below the smallest normal `f64`; the weights would otherwise be
/// NaN or dominated by subnormal rounding. A sum that overflows (σ so small
/// the density exceeds `f64::MAX`) is an [`MixingError::InvalidParameter`].
pub fn likelihood_weights(
    observation: &Observation,
    pred_o18: &[f64],
    pred_h2: &[f64],
) -> Result<Vec<f64>, MixingError> {
    if pred_o18.len() != pred_h2.len() {
        return Err(MixingError::invalid(format!(
            "prediction length mismatch: {} δ¹⁸O vs {} δ²H",
            pred_o18.len(),
            pred_h2.len()
        )));
    }
    if pred_o18.is_empty() {
        return Err(MixingError::invalid("no predictions to weight"));
    }

    let obs = observation.signature();
    let mut weights: Vec<f64> = pred_o18
        .iter()
        .zip(pred_h2)
        .map(|(&o18, &h2)| {
            normal_pdf(obs.o18, o18, observation.sd_o18())
                * normal_pdf(obs.h2, h2, observation.sd_h2())
        })
        .collect();

    let total: f64 = weights.iter().sum();
    if !total.is_finite() {
        return Err(MixingError::invalid(format!(
            "likelihood sum {total} is not finite; σ ({}, {}) is too small to evaluate",
            observation.sd_o18(),
            observation.sd_h2()
        )));
    }
    if total < f64::MIN_POSITIVE {
        warn!(total, samples = weights.len(), "likelihoods vanished for every sample");
        return Err(MixingError::DegenerateLikelihood {
            total,
            samples: weights.len(),
        });
    }

    for w in &mut weights {
        *w /= total;
    }
    Ok(weights)
}

/// Weighted mean of each proportion column.
pub fn posterior_means(proportions: &[Proportions], weights: &[f64]) -> [f64; SOURCE_COUNT] {
    let mut means = [0.0; SOURCE_COUNT];
    for (p, &w) in proportions.iter().zip(weights) {
        for (m, pi) in means.iter_mut().zip(p) {
            *m += pi * w;
        }
    }
    means
}

/// Outcome of one inference run. Nothing here outlives the run that made it.
#[derive(Debug, Clone, PartialEq)]
pub struct Posterior {
    proportions: Vec<Proportions>,
    weights: Vec<f64>,
    means: [f64; SOURCE_COUNT],
}

impl Posterior {
    pub fn proportions(&self) -> &[Proportions] {
        &self.proportions
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Posterior mean proportion per source, in source order.
    pub fn means(&self) -> [f64; SOURCE_COUNT] {
        self.means
    }

    pub fn len(&self) -> usize {
        self.proportions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proportions.is_empty()
    }

    /// Proportion column of one source, aligned with [`Posterior::weights`].
    pub fn column(&self, source: usize) -> Vec<f64> {
        self.proportions.iter().map(|p| p[source]).collect()
    }

    /// Kish effective sample size, 1 / Σ w².
    pub fn effective_sample_size(&self) -> f64 {
        effective_sample_size(&self.weights)
    }
}

pub(crate) fn effective_sample_size(weights: &[f64]) -> f64 {
    let sum_sq: f64 = weights.iter().map(|w| w * w).sum();
    if sum_sq > 0.0 {
        1.0 / sum_sq
    } else {
        0.0
    }
}

/// Run the whole pipeline from a fresh prior draw.
pub fn infer<R: Rng + ?Sized>(
    rng: &mut R,
    observation: &Observation,
    sources: &Sources,
    count: usize,
) -> Result<Posterior, MixingError> {
    let proportions = sample_prior(rng, count)?;
    infer_from_samples(proportions, observation, sources)
}

/// Everything after the sampler, on caller-supplied prior draws.
pub fn infer_from_samples(
    proportions: Vec<Proportions>,
    observation: &Observation,
    sources: &Sources,
) -> Result<Posterior, MixingError> {
    let pred_o18 = predict(&proportions, &sources.o18_means());
    let pred_h2 = predict(&proportions, &sources.h2_means());
    debug!(samples = proportions.len(), "forward-predicted mixtures");

    let weights = likelihood_weights(observation, &pred_o18, &pred_h2)?;
    let means = posterior_means(&proportions, &weights);
    debug!(
        ess = effective_sample_size(&weights),
        ?means,
        "reduced posterior"
    );

    Ok(Posterior {
        proportions,
        weights,
        means,
    })
}
