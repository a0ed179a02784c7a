use anyhow::Context;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use isomix::inputs::{MIN_SD_H2, MIN_SD_O18};
use isomix::{logging, Config, MixingError, MixingInputs, MixingReport};

#[derive(Parser)]
#[command(name = "web")]
#[command(about = "Interactive posterior viewer for the isotope mixing model")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = isomix::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Deserialize, Default)]
struct PosteriorQuery {
    obs_o18: Option<f64>,
    obs_h2: Option<f64>,
    sd_o18: Option<f64>,
    sd_h2: Option<f64>,
    s1_o18: Option<f64>,
    s1_h2: Option<f64>,
    s2_o18: Option<f64>,
    s2_h2: Option<f64>,
    s3_o18: Option<f64>,
    s3_h2: Option<f64>,
    frame: Option<bool>,
}

impl PosteriorQuery {
    /// Missing parameters keep the configured defaults.
    fn apply_to(&self, defaults: &MixingInputs) -> Result<MixingInputs, MixingError> {
        let mut inputs = defaults.clone();
        inputs.obs_o18 = self.obs_o18.unwrap_or(inputs.obs_o18);
        inputs.obs_h2 = self.obs_h2.unwrap_or(inputs.obs_h2);
        inputs.sd_o18 = self.sd_o18.unwrap_or(inputs.sd_o18);
        inputs.sd_h2 = self.sd_h2.unwrap_or(inputs.sd_h2);

        let pairs = [
            (self.s1_o18, self.s1_h2),
            (self.s2_o18, self.s2_h2),
            (self.s3_o18, self.s3_h2),
        ];
        for (idx, (o18, h2)) in pairs.into_iter().enumerate() {
            if o18.is_none() && h2.is_none() {
                continue;
            }
            let current = inputs
                .sources
                .get(idx)
                .map(|s| s.mean)
                .ok_or_else(|| MixingError::invalid(format!("no source at position {}", idx + 1)))?;
            inputs.set_source(idx, o18.unwrap_or(current.o18), h2.unwrap_or(current.h2))?;
        }
        Ok(inputs)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

#[derive(Serialize)]
struct DefaultsResponse {
    inputs: MixingInputs,
    min_sd_o18: f64,
    min_sd_h2: f64,
    sample_count: usize,
}

struct AppState {
    config: Config,
}

const INDEX_HTML: &str = r##"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Bayesian Mixing Model</title>
    <style>
      html, body { margin: 0; padding: 0; height: 100%; background: #f7f8fa; color: #1d232b; font-family: "Segoe UI", system-ui, sans-serif; }
      #panel { position: fixed; top: 0; left: 0; bottom: 0; width: 300px; overflow-y: auto; background: #eef1f5; padding: 14px; border-right: 1px solid #d5dbe3; box-sizing: border-box; }
      #main { margin-left: 300px; padding: 18px 28px; }
      h1 { font-size: 24px; margin: 4px 0 14px; }
      h2 { font-size: 18px; margin: 18px 0 8px; }
      .section { margin-top: 12px; padding-top: 10px; border-top: 1px solid #d5dbe3; }
      .section:first-of-type { margin-top: 0; padding-top: 0; border-top: none; }
      .section-title { font-size: 12px; text-transform: uppercase; letter-spacing: 0.1em; color: #5b6673; margin-bottom: 6px; }
      .row { display: flex; align-items: center; justify-content: space-between; gap: 8px; margin-top: 6px; }
      .row label { font-size: 13px; color: #36404c; }
      input[type="number"] { width: 96px; background: #fff; color: #1d232b; border: 1px solid #c3cbd6; border-radius: 6px; padding: 4px 6px; font-size: 13px; }
      details { margin-top: 6px; background: #e4e8ee; border-radius: 6px; padding: 6px 8px; }
      summary { cursor: pointer; font-size: 13px; font-weight: 600; }
      canvas { background: #fff; border: 1px solid #d5dbe3; border-radius: 8px; max-width: 100%; }
      #legend { display: flex; gap: 16px; margin-top: 8px; font-size: 14px; }
      .swatch { display: inline-block; width: 14px; height: 14px; border-radius: 3px; margin-right: 6px; vertical-align: -2px; }
      table { border-collapse: collapse; font-size: 15px; min-width: 360px; }
      th, td { text-align: left; padding: 6px 14px; border-bottom: 1px solid #d5dbe3; }
      td.num { text-align: right; font-variant-numeric: tabular-nums; }
      #status { margin-top: 8px; font-size: 13px; color: #5b6673; min-height: 18px; }
      #status.error { color: #b3261e; font-weight: 600; }
    </style>
  </head>
  <body>
    <div id="panel">
      <div class="section">
        <div class="section-title">Observed mixture (δ values)</div>
        <div class="row"><label for="obs_o18">Observed δ¹⁸O</label><input id="obs_o18" type="number" step="0.1" /></div>
        <div class="row"><label for="obs_h2">Observed δ²H</label><input id="obs_h2" type="number" step="0.5" /></div>
      </div>
      <div class="section">
        <div class="section-title">Measurement uncertainty (σ)</div>
        <div class="row"><label for="sd_o18">σ(δ¹⁸O)</label><input id="sd_o18" type="number" step="0.1" /></div>
        <div class="row"><label for="sd_h2">σ(δ²H)</label><input id="sd_h2" type="number" step="0.5" /></div>
      </div>
      <div class="section">
        <div class="section-title">Source isotope values</div>
        <div id="sources"></div>
      </div>
      <div id="status"></div>
    </div>
    <div id="main">
      <h1>Bayesian Mixing Model (δ¹⁸O &amp; δ²H)</h1>
      <h2>Posterior distributions of source contributions</h2>
      <canvas id="plot" width="1200" height="500"></canvas>
      <div id="legend"></div>
      <h2>Posterior mean source contributions</h2>
      <table>
        <thead><tr><th>Source</th><th>Posterior Mean Proportion</th></tr></thead>
        <tbody id="summary"></tbody>
      </table>
    </div>
    <script>
      const COLORS = ["31,119,180", "255,127,14", "44,160,44"];
      const statusEl = document.getElementById("status");
      const sourcesEl = document.getElementById("sources");
      const canvas = document.getElementById("plot");
      const ctx = canvas.getContext("2d");
      let sourceCount = 0;
      let pending = null;
      let requestSeq = 0;

      function field(id) {
        return document.getElementById(id);
      }

      function buildSourceFields(sources) {
        sourcesEl.innerHTML = "";
        sourceCount = sources.length;
        sources.forEach((src, i) => {
          const n = i + 1;
          const box = document.createElement("details");
          box.innerHTML = `<summary>Source ${src.name}</summary>
            <div class="row"><label for="s${n}_o18">${src.name} δ¹⁸O</label><input id="s${n}_o18" type="number" step="0.1" value="${src.o18}" /></div>
            <div class="row"><label for="s${n}_h2">${src.name} δ²H</label><input id="s${n}_h2" type="number" step="1" value="${src.h2}" /></div>`;
          sourcesEl.appendChild(box);
        });
      }

      function collectParams() {
        const params = new URLSearchParams();
        const ids = ["obs_o18", "obs_h2", "sd_o18", "sd_h2"];
        for (let n = 1; n <= sourceCount; n++) {
          ids.push(`s${n}_o18`, `s${n}_h2`);
        }
        // blank fields fall back to the server defaults
        for (const id of ids) {
          const value = field(id).value;
          if (value !== "") params.set(id, value);
        }
        return params;
      }

      function setStatus(text, isError) {
        statusEl.textContent = text;
        statusEl.className = isError ? "error" : "";
      }

      function drawAxes(x0, x1, yTop, yBase, yMax) {
        ctx.strokeStyle = "#333";
        ctx.fillStyle = "#333";
        ctx.lineWidth = 1;
        ctx.beginPath();
        ctx.moveTo(x0, yTop);
        ctx.lineTo(x0, yBase);
        ctx.lineTo(x1, yBase);
        ctx.stroke();
        ctx.font = "13px sans-serif";
        ctx.textAlign = "center";
        for (let i = 0; i <= 5; i++) {
          const x = x0 + (x1 - x0) * i / 5;
          ctx.beginPath();
          ctx.moveTo(x, yBase);
          ctx.lineTo(x, yBase + 6);
          ctx.stroke();
          ctx.fillText((i / 5).toFixed(1), x, yBase + 20);
        }
        ctx.textAlign = "right";
        for (let i = 0; i <= 4; i++) {
          const y = yBase - (yBase - yTop) * i / 4;
          ctx.beginPath();
          ctx.moveTo(x0 - 6, y);
          ctx.lineTo(x0, y);
          ctx.stroke();
          ctx.fillText((yMax * i / 4).toFixed(1), x0 - 9, y + 4);
        }
        ctx.textAlign = "center";
        ctx.font = "15px sans-serif";
        ctx.fillText("Proportion", (x0 + x1) / 2, yBase + 42);
        ctx.save();
        ctx.translate(18, (yTop + yBase) / 2);
        ctx.rotate(-Math.PI / 2);
        ctx.fillText("Density", 0, 0);
        ctx.restore();
        ctx.font = "16px sans-serif";
        ctx.fillText("Posterior Distribution for Each Source", (x0 + x1) / 2, yTop - 8);
      }

      function drawCurves(curves) {
        ctx.clearRect(0, 0, canvas.width, canvas.height);
        const x0 = 70, x1 = canvas.width - 20, yTop = 36, yBase = canvas.height - 56;
        let yMax = 0;
        for (const c of curves) {
          for (const d of c.density) {
            if (d > yMax) yMax = d;
          }
        }
        yMax = yMax > 0 ? yMax * 1.05 : 1;
        const px = (x) => x0 + (x1 - x0) * x;
        const py = (d) => yBase - (yBase - yTop) * (d / yMax);
        curves.forEach((c, i) => {
          const rgb = COLORS[i % COLORS.length];
          ctx.beginPath();
          ctx.moveTo(px(c.x[0]), yBase);
          for (let k = 0; k < c.x.length; k++) {
            ctx.lineTo(px(c.x[k]), py(c.density[k]));
          }
          ctx.lineTo(px(c.x[c.x.length - 1]), yBase);
          ctx.closePath();
          ctx.fillStyle = `rgba(${rgb},0.25)`;
          ctx.fill();
          ctx.beginPath();
          for (let k = 0; k < c.x.length; k++) {
            const X = px(c.x[k]);
            const Y = py(c.density[k]);
            if (k === 0) ctx.moveTo(X, Y); else ctx.lineTo(X, Y);
          }
          ctx.strokeStyle = `rgb(${rgb})`;
          ctx.lineWidth = 2;
          ctx.stroke();
        });
        drawAxes(x0, x1, yTop, yBase, yMax);
        document.getElementById("legend").innerHTML = curves
          .map((c, i) => `<span><span class="swatch" style="background: rgb(${COLORS[i % COLORS.length]})"></span>${c.source}</span>`)
          .join("");
      }

      function drawSummary(summary) {
        document.getElementById("summary").innerHTML = summary.rows
          .map((r) => `<tr><td>${r.source}</td><td class="num">${r.formatted}</td></tr>`)
          .join("");
      }

      function clearOutput() {
        ctx.clearRect(0, 0, canvas.width, canvas.height);
        document.getElementById("legend").innerHTML = "";
        document.getElementById("summary").innerHTML = "";
      }

      async function runModel() {
        const seq = ++requestSeq;
        setStatus("Sampling...", false);
        try {
          const res = await fetch(`/posterior?${collectParams().toString()}`);
          const data = await res.json();
          if (seq !== requestSeq) return;
          if (!res.ok) {
            clearOutput();
            setStatus(data.error || ("Error: " + res.status), true);
            return;
          }
          drawCurves(data.curves);
          drawSummary(data.summary);
          setStatus(`${data.sample_count} prior draws, effective sample size ${data.effective_sample_size.toFixed(1)}`, false);
        } catch (err) {
          if (seq === requestSeq) setStatus("Request failed: " + err, true);
        }
      }

      function scheduleRun() {
        if (pending) clearTimeout(pending);
        pending = setTimeout(runModel, 200);
      }

      async function init() {
        const res = await fetch("/defaults");
        const data = await res.json();
        const inputs = data.inputs;
        field("obs_o18").value = inputs.obs_o18;
        field("obs_h2").value = inputs.obs_h2;
        field("sd_o18").value = inputs.sd_o18;
        field("sd_o18").min = data.min_sd_o18;
        field("sd_h2").value = inputs.sd_h2;
        field("sd_h2").min = data.min_sd_h2;
        buildSourceFields(inputs.sources);
        document.getElementById("panel").addEventListener("input", scheduleRun);
        runModel();
      }

      init();
    </script>
  </body>
</html>
"##;

async fn index() -> impl IntoResponse {
    Html(INDEX_HTML)
}

async fn defaults(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(DefaultsResponse {
        inputs: state.config.defaults.clone(),
        min_sd_o18: MIN_SD_O18,
        min_sd_h2: MIN_SD_H2,
        sample_count: state.config.inference.sample_count,
    })
}

/// Unparseable query values are reported like any other invalid input.
fn resolve_query(
    query: Result<Query<PosteriorQuery>, QueryRejection>,
    defaults: &MixingInputs,
) -> Result<(MixingInputs, bool), MixingError> {
    let Query(q) = query.map_err(|rejection| MixingError::invalid(rejection.body_text()))?;
    let inputs = q.apply_to(defaults)?;
    Ok((inputs, q.frame.unwrap_or(false)))
}

async fn posterior(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PosteriorQuery>, QueryRejection>,
) -> Response {
    let (inputs, include_frame) = match resolve_query(query, &state.config.defaults) {
        Ok(resolved) => resolved,
        Err(e) => return mixing_error_response(e),
    };
    let mut settings = state.config.run_settings();
    settings.include_frame = include_frame;
    let seed = state.config.inference.seed;

    let result = tokio::task::spawn_blocking(move || {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        MixingReport::run(&inputs, settings, &mut rng)
    })
    .await;

    match result {
        Ok(Ok(report)) => Json(report).into_response(),
        Ok(Err(e)) => mixing_error_response(e),
        Err(e) => {
            warn!(error = %e, "inference task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: "inference task failed".to_string(),
                    kind: "internal",
                }),
            )
                .into_response()
        }
    }
}

fn mixing_error_response(e: MixingError) -> Response {
    let status = match &e {
        MixingError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
        MixingError::DegenerateLikelihood { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    };
    warn!(kind = e.kind(), error = %e, "run rejected");
    (
        status,
        Json(ErrorBody {
            error: e.to_string(),
            kind: e.kind(),
        }),
    )
        .into_response()
}

fn app(config: Config) -> Router {
    let state = Arc::new(AppState { config });
    Router::new()
        .route("/", get(index))
        .route("/defaults", get(defaults))
        .route("/posterior", get(posterior))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(if cli.verbose { "debug" } else { "info" });

    let config = Config::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let addr = config.server.bind;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Serving on http://{addr}");
    axum::serve(listener, app(config)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_overrides_only_given_fields() {
        let q = PosteriorQuery {
            obs_o18: Some(-7.0),
            s2_h2: Some(10.0),
            ..PosteriorQuery::default()
        };
        let inputs = q.apply_to(&MixingInputs::default()).unwrap();
        assert_eq!(inputs.obs_o18, -7.0);
        assert_eq!(inputs.obs_h2, -40.0);
        assert_eq!(inputs.sources[1].mean.o18, -5.5);
        assert_eq!(inputs.sources[1].mean.h2, 10.0);
        assert_eq!(inputs.sources[0].mean.h2, -60.0);
    }

    fn query(uri: &str) -> Result<Query<PosteriorQuery>, QueryRejection> {
        let uri: axum::http::Uri = uri.parse().unwrap();
        Query::try_from_uri(&uri)
    }

    #[test]
    fn test_malformed_number_is_invalid_parameter() {
        let err = resolve_query(query("/posterior?obs_o18=abc"), &MixingInputs::default())
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_parameter");
        assert!(err.to_string().contains("query string"));
        assert_eq!(mixing_error_response(err).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_query_string_resolves_with_frame_flag() {
        let (inputs, frame) = resolve_query(
            query("/posterior?obs_h2=-50&s1_o18=-9&frame=true"),
            &MixingInputs::default(),
        )
        .unwrap();
        assert!(frame);
        assert_eq!(inputs.obs_h2, -50.0);
        assert_eq!(inputs.sources[0].mean.o18, -9.0);

        let (_, frame) = resolve_query(query("/posterior"), &MixingInputs::default()).unwrap();
        assert!(!frame);
    }

    #[test]
    fn test_error_status_codes() {
        let bad = mixing_error_response(MixingError::invalid("sd_o18"));
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let degenerate = mixing_error_response(MixingError::DegenerateLikelihood {
            total: 0.0,
            samples: 5000,
        });
        assert_eq!(degenerate.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
