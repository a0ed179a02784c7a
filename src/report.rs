//! Output boundary: the N×4 posterior frame, the summary table and the full
//! report handed to renderers.

use rand::Rng;
use serde::Serialize;
use std::fmt;
use tracing::info;

use crate::density::{estimate_curves, DensityCurve, DEFAULT_GRID_SIZE};
use crate::error::MixingError;
use crate::inference::{infer, Posterior, DEFAULT_SAMPLE_COUNT};
use crate::inputs::MixingInputs;
use crate::model::{Sources, SOURCE_COUNT};

/// Column name of the weight column in [`PosteriorFrame`].
pub const WEIGHT_COLUMN: &str = "weights";

/// Knobs of one run that do not belong to the inputs themselves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSettings {
    pub sample_count: usize,
    pub grid_size: usize,
    /// Attach the N×4 [`PosteriorFrame`] to the report.
    pub include_frame: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        RunSettings {
            sample_count: DEFAULT_SAMPLE_COUNT,
            grid_size: DEFAULT_GRID_SIZE,
            include_frame: false,
        }
    }
}

/// One row per prior sample: three proportions then the posterior weight.
#[derive(Debug, Clone, Serialize)]
pub struct PosteriorFrame {
    pub columns: [String; SOURCE_COUNT + 1],
    pub rows: Vec<[f64; SOURCE_COUNT + 1]>,
}

impl PosteriorFrame {
    pub fn new(posterior: &Posterior, sources: &Sources) -> Self {
        let [a, b, c] = sources.names();
        let rows = posterior
            .proportions()
            .iter()
            .zip(posterior.weights())
            .map(|(p, &w)| [p[0], p[1], p[2], w])
            .collect();
        PosteriorFrame {
            columns: [
                a.to_string(),
                b.to_string(),
                c.to_string(),
                WEIGHT_COLUMN.to_string(),
            ],
            rows,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryRow {
    pub source: String,
    pub posterior_mean: f64,
    /// Mean rounded to three decimals for display.
    pub formatted: String,
}

/// Posterior mean proportion per source.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryTable {
    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    pub fn new(posterior: &Posterior, sources: &Sources) -> Self {
        let rows = sources
            .names()
            .iter()
            .zip(posterior.means())
            .map(|(name, mean)| SummaryRow {
                source: name.to_string(),
                posterior_mean: mean,
                formatted: format!("{mean:.3}"),
            })
            .collect();
        SummaryTable { rows }
    }

    pub fn total(&self) -> f64 {
        self.rows.iter().map(|r| r.posterior_mean).sum()
    }
}

impl fmt::Display for SummaryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const HEADER: &str = "Posterior Mean Proportion";
        let width = self
            .rows
            .iter()
            .map(|r| r.source.len())
            .max()
            .unwrap_or(0)
            .max("Source".len());
        writeln!(f, "{:<width$}  {HEADER}", "Source")?;
        writeln!(f, "{}  {}", "-".repeat(width), "-".repeat(HEADER.len()))?;
        for row in &self.rows {
            writeln!(f, "{:<width$}  {:>w2$}", row.source, row.formatted, w2 = HEADER.len())?;
        }
        Ok(())
    }
}

/// Everything one run produces for the renderers.
#[derive(Debug, Clone, Serialize)]
pub struct MixingReport {
    pub sample_count: usize,
    pub effective_sample_size: f64,
    pub summary: SummaryTable,
    pub curves: Vec<DensityCurve>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<PosteriorFrame>,
}

impl MixingReport {
    /// Validate → infer → summarize → estimate densities.
    pub fn run<R: Rng + ?Sized>(
        inputs: &MixingInputs,
        settings: RunSettings,
        rng: &mut R,
    ) -> Result<Self, MixingError> {
        let (observation, sources) = inputs.validate()?;
        let posterior = infer(rng, &observation, &sources, settings.sample_count)?;
        let mut report = Self::from_posterior(&posterior, &sources, settings.grid_size);
        if settings.include_frame {
            report = report.with_frame(&posterior, &sources);
        }
        info!(
            samples = report.sample_count,
            ess = report.effective_sample_size,
            means = ?posterior.means(),
            "posterior ready"
        );
        Ok(report)
    }

    pub fn from_posterior(posterior: &Posterior, sources: &Sources, grid_size: usize) -> Self {
        MixingReport {
            sample_count: posterior.len(),
            effective_sample_size: posterior.effective_sample_size(),
            summary: SummaryTable::new(posterior, sources),
            curves: estimate_curves(posterior, sources.names(), grid_size),
            frame: None,
        }
    }

    /// Attach the N×4 frame; it is large, so only on request.
    pub fn with_frame(mut self, posterior: &Posterior, sources: &Sources) -> Self {
        self.frame = Some(PosteriorFrame::new(posterior, sources));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::infer_from_samples;
    use crate::inputs::MixingInputs;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fixed_posterior() -> (Posterior, Sources) {
        let (obs, sources) = MixingInputs::default().validate().unwrap();
        let draws = vec![
            [0.1, 0.2, 0.7],
            [0.3, 0.2, 0.5],
            [0.2, 0.1, 0.7],
            [0.6, 0.3, 0.1],
        ];
        (infer_from_samples(draws, &obs, &sources).unwrap(), sources)
    }

    #[test]
    fn test_frame_has_weight_column() {
        let (post, sources) = fixed_posterior();
        let frame = PosteriorFrame::new(&post, &sources);
        assert_eq!(frame.columns, ["S1", "S2", "S3", WEIGHT_COLUMN]);
        assert_eq!(frame.rows.len(), 4);
        assert_eq!(frame.rows[1][..3], [0.3, 0.2, 0.5]);
        let total: f64 = frame.rows.iter().map(|r| r[3]).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_formats_three_decimals() {
        let (post, sources) = fixed_posterior();
        let table = SummaryTable::new(&post, &sources);
        assert_eq!(table.rows.len(), 3);
        for row in &table.rows {
            assert_eq!(row.formatted, format!("{:.3}", row.posterior_mean));
            assert_eq!(row.formatted.split('.').nth(1).map(str::len), Some(3));
        }
        assert!((table.total() - 1.0).abs() < 1e-6);

        let text = table.to_string();
        assert!(text.starts_with("Source"));
        assert!(text.contains("Posterior Mean Proportion"));
        assert_eq!(text.lines().count(), 5);
    }

    #[test]
    fn test_run_with_defaults() {
        let mut rng = StdRng::seed_from_u64(99);
        let settings = RunSettings {
            sample_count: 2000,
            grid_size: 50,
            include_frame: false,
        };
        let report = MixingReport::run(&MixingInputs::default(), settings, &mut rng).unwrap();
        assert_eq!(report.sample_count, 2000);
        assert_eq!(report.curves.len(), 3);
        assert!(report.curves.iter().all(|c| c.x.len() == 50));
        assert!(report.effective_sample_size >= 1.0);
        assert!(report.frame.is_none());
        assert!((report.summary.total() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_run_attaches_frame_on_request() {
        let mut rng = StdRng::seed_from_u64(4);
        let settings = RunSettings {
            sample_count: 300,
            include_frame: true,
            ..RunSettings::default()
        };
        let report = MixingReport::run(&MixingInputs::default(), settings, &mut rng).unwrap();
        let frame = report.frame.expect("frame requested");
        assert_eq!(frame.rows.len(), 300);
        for row in &frame.rows {
            assert!((row[0] + row[1] + row[2] - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_run_reports_degenerate() {
        let mut rng = StdRng::seed_from_u64(1);
        let inputs = MixingInputs {
            obs_o18: 1000.0,
            sd_o18: 0.01,
            ..MixingInputs::default()
        };
        let err = MixingReport::run(&inputs, RunSettings::default(), &mut rng).unwrap_err();
        assert_eq!(err.kind(), "degenerate_likelihood");
    }

    #[test]
    fn test_report_json_shape() {
        let (post, sources) = fixed_posterior();
        let report = MixingReport::from_posterior(&post, &sources, 20).with_frame(&post, &sources);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["sample_count"], 4);
        assert_eq!(json["summary"]["rows"][0]["source"], "S1");
        assert_eq!(json["frame"]["columns"][3], "weights");
        assert_eq!(json["curves"][2]["x"].as_array().map(Vec::len), Some(20));
    }
}
