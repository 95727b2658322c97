use crate::dimensionality::Dimensionality;
use anyhow::ensure;
use clap::{Parser, ValueEnum};
use derivative::Derivative;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Every Vulkan device supports 1D images at least this wide.
pub const MAX_TEXELS: u32 = 4096;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FilterMode {
    /// Linear magnification and minification, linear between mip levels
    Linear,
    /// Nearest everywhere
    Nearest,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RecordingMode {
    /// Record each program's batch once and re-submit it
    Prerecorded,
    /// Record the batch again inside every timed region
    PerBatch,
}

#[derive(Derivative, Clone, Debug, Serialize, Deserialize, PartialEq)]
#[derivative(Default)]
pub struct BenchmarkConfig {
    #[derivative(Default(value = "40"))]
    pub batches: usize,
    #[derivative(Default(value = "2_500"))]
    pub frames_per_batch: u32,
    pub warmup_batches: usize,
    #[derivative(Default(value = "Dimensionality::OneD"))]
    pub start_with: Dimensionality,
    #[derivative(Default(value = "128"))]
    pub texels: u32,
    #[derivative(Default(value = "1280"))]
    pub width: u32,
    #[derivative(Default(value = "1024"))]
    pub height: u32,
    #[derivative(Default(value = "FilterMode::Linear"))]
    pub filter: FilterMode,
    #[derivative(Default(value = "RecordingMode::Prerecorded"))]
    pub recording: RecordingMode,
    pub capture: bool,
}

impl BenchmarkConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.batches > 0, "at least one measured batch is required");
        ensure!(self.frames_per_batch > 0, "a batch needs at least one frame");
        ensure!(
            (1..=MAX_TEXELS).contains(&self.texels),
            "texel count must be within 1..={MAX_TEXELS}, got {}",
            self.texels
        );
        ensure!(
            self.width > 0 && self.height > 0,
            "viewport must not be empty, got {}x{}",
            self.width,
            self.height
        );
        Ok(())
    }

    pub fn viewport_size(&self) -> Vector2<u32> {
        Vector2::new(self.width, self.height)
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Measured batches, alternating between the two programs
    #[arg(short, long, default_value_t = 40)]
    pub batches: usize,

    /// Clear+draw pairs issued per batch before waiting for the GPU
    #[arg(short, long, default_value_t = 2_500)]
    pub frames_per_batch: u32,

    /// Batches run before measuring, discarded
    #[arg(long, default_value_t = 0)]
    pub warmup: usize,

    #[arg(short, long, value_enum, default_value_t = Dimensionality::OneD)]
    pub start_with: Dimensionality,

    /// Lookup table size
    #[arg(short, long, default_value_t = 128)]
    pub texels: u32,

    #[arg(long, default_value_t = 1280)]
    pub width: u32,
    #[arg(long, default_value_t = 1024)]
    pub height: u32,

    #[arg(long, value_enum, default_value_t = FilterMode::Linear)]
    pub filter: FilterMode,

    #[arg(long, value_enum, default_value_t = RecordingMode::Prerecorded)]
    pub recording: RecordingMode,

    /// Render offscreen only, without opening a window
    #[arg(long, default_value_t = false)]
    pub headless: bool,

    #[arg(long, default_value_t = false)]
    pub maximized: bool,

    /// Keep the window open after the run until it is closed or Escape is hit
    #[arg(long, default_value_t = false)]
    pub hold: bool,

    /// Enable the Khronos validation layer and log its messages
    #[arg(long, default_value_t = false)]
    pub validation: bool,

    /// Capture the first measured batch of each program with RenderDoc
    #[arg(long, default_value_t = false)]
    pub capture: bool,

    /// Also write the report as JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl Args {
    pub fn benchmark_config(&self) -> BenchmarkConfig {
        BenchmarkConfig {
            batches: self.batches,
            frames_per_batch: self.frames_per_batch,
            warmup_batches: self.warmup,
            start_with: self.start_with,
            texels: self.texels,
            width: self.width,
            height: self.height,
            filter: self.filter,
            recording: self.recording,
            capture: self.capture,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_reference_run() {
        let config = BenchmarkConfig::default();
        assert_eq!(config.batches, 40);
        assert_eq!(config.frames_per_batch, 2_500);
        assert_eq!(config.warmup_batches, 0);
        assert_eq!(config.start_with, Dimensionality::OneD);
        assert_eq!(config.texels, 128);
        assert_eq!(config.viewport_size(), Vector2::new(1280, 1024));
        assert_eq!(config.filter, FilterMode::Linear);
        assert_eq!(config.recording, RecordingMode::Prerecorded);
        config.validate().unwrap();
    }

    #[test]
    fn cli_defaults_match_config_defaults() {
        let args = Args::try_parse_from(["tex_dim_bench"]).unwrap();
        assert_eq!(args.benchmark_config(), BenchmarkConfig::default());
        assert!(!args.headless);
        assert!(args.output.is_none());
    }

    #[test]
    fn cli_flags_reach_the_config() {
        let args = Args::try_parse_from([
            "tex_dim_bench",
            "--batches",
            "10",
            "--start-with",
            "2d",
            "--filter",
            "nearest",
            "--recording",
            "per-batch",
            "--warmup",
            "2",
            "--headless",
        ])
        .unwrap();
        let config = args.benchmark_config();
        assert_eq!(config.batches, 10);
        assert_eq!(config.start_with, Dimensionality::TwoD);
        assert_eq!(config.filter, FilterMode::Nearest);
        assert_eq!(config.recording, RecordingMode::PerBatch);
        assert_eq!(config.warmup_batches, 2);
        assert!(args.headless);
    }

    #[test]
    fn rejects_degenerate_runs() {
        let invalid = [
            BenchmarkConfig {
                batches: 0,
                ..Default::default()
            },
            BenchmarkConfig {
                frames_per_batch: 0,
                ..Default::default()
            },
            BenchmarkConfig {
                texels: 0,
                ..Default::default()
            },
            BenchmarkConfig {
                texels: MAX_TEXELS + 1,
                ..Default::default()
            },
            BenchmarkConfig {
                height: 0,
                ..Default::default()
            },
        ];
        for config in invalid {
            assert!(config.validate().is_err(), "{config:?} should be rejected");
        }
    }
}
