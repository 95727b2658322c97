use crate::{config::BenchmarkConfig, dimensionality::Dimensionality};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    fs::File,
    io::BufWriter,
    path::Path,
    time::Duration,
};

/// Per-batch wall-clock seconds, kept separately for each dimensionality.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Timings {
    #[serde(rename = "1d")]
    one_d: Vec<f64>,
    #[serde(rename = "2d")]
    two_d: Vec<f64>,
}

#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq)]
pub struct BatchStats {
    pub batches: usize,
    pub total: f64,
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

impl Timings {
    pub fn record(&mut self, dim: Dimensionality, elapsed: Duration) {
        self.samples_mut(dim).push(elapsed.as_secs_f64());
    }

    pub fn samples(&self, dim: Dimensionality) -> &[f64] {
        match dim {
            Dimensionality::OneD => &self.one_d,
            Dimensionality::TwoD => &self.two_d,
        }
    }

    fn samples_mut(&mut self, dim: Dimensionality) -> &mut Vec<f64> {
        match dim {
            Dimensionality::OneD => &mut self.one_d,
            Dimensionality::TwoD => &mut self.two_d,
        }
    }

    /// Accumulated seconds over all batches of `dim`.
    pub fn total(&self, dim: Dimensionality) -> f64 {
        self.samples(dim).iter().sum()
    }

    pub fn stats(&self, dim: Dimensionality) -> Option<BatchStats> {
        let samples = self.samples(dim);
        if samples.is_empty() {
            return None;
        }
        let total = self.total(dim);
        Some(BatchStats {
            batches: samples.len(),
            total,
            min: samples.iter().copied().fold(f64::INFINITY, f64::min),
            mean: total / samples.len() as f64,
            max: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }

    /// Mean 2D batch time over mean 1D batch time. Above 1 means 1D sampling
    /// was faster.
    pub fn ratio(&self) -> Option<f64> {
        let one_d = self.stats(Dimensionality::OneD)?;
        let two_d = self.stats(Dimensionality::TwoD)?;
        (one_d.mean > 0.0).then(|| two_d.mean / one_d.mean)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Report {
    pub device: String,
    pub config: BenchmarkConfig,
    /// Whether both programs produced the same image before measuring
    pub outputs_match: bool,
    pub timings: Timings,
}

impl Report {
    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for dim in Dimensionality::ALL {
            writeln!(f, "{}: {}", dim.label(), format_g(self.timings.total(dim)))?;
        }

        writeln!(f)?;
        writeln!(f, "device: {}", self.device)?;
        writeln!(
            f,
            "{} frames per batch, {:?} filtering, {} texels",
            self.config.frames_per_batch, self.config.filter, self.config.texels
        )?;
        for dim in Dimensionality::ALL {
            if let Some(stats) = self.timings.stats(dim) {
                writeln!(
                    f,
                    "{}: {} batches, per batch min {} ms / mean {} ms / max {} ms",
                    dim.label(),
                    stats.batches,
                    format_g(stats.min * 1e3),
                    format_g(stats.mean * 1e3),
                    format_g(stats.max * 1e3),
                )?;
            }
        }
        if let Some(ratio) = self.timings.ratio() {
            let faster = if ratio >= 1.0 { "1D" } else { "2D" };
            let gain = if ratio >= 1.0 { ratio - 1.0 } else { 1.0 / ratio - 1.0 };
            writeln!(
                f,
                "2D/1D: {} ({faster} faster by {}%)",
                format_g(ratio),
                format_g(gain * 100.0)
            )?;
        }
        if !self.outputs_match {
            writeln!(f, "warning: the 1D and 2D programs rendered different images")?;
        }
        Ok(())
    }
}

/// Shortest representation with six significant digits, switching to
/// exponent notation for very large or very small magnitudes.
pub fn format_g(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return value.to_string();
    }

    let scientific = format!("{value:.5e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if !(-4..6).contains(&exponent) {
        format!(
            "{}e{}{:02}",
            strip_zeros(mantissa),
            if exponent < 0 { '-' } else { '+' },
            exponent.abs()
        )
    } else {
        let decimals = (5 - exponent) as usize;
        strip_zeros(&format!("{value:.decimals$}")).to_owned()
    }
}

fn strip_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
