use crate::{
    batch::{BatchRunner, RenderTarget},
    capture::{capture_if, renderdoc_attached},
    config::BenchmarkConfig,
    dimensionality::{BatchSchedule, Dimensionality},
    program::SamplerProgram,
    report::{Report, Timings},
    texture::LookupTexture,
    vulkan_util::VulkanData,
};
use std::time::Duration;
use vulkano::command_buffer::CommandBufferUsage;

/// Largest per-channel difference tolerated between the 1D and 2D images.
/// Implementations may round filtered results differently by one step.
const OUTPUT_TOLERANCE: u8 = 1;

/// Both sampler programs, set up against one shared render target.
pub struct Benchmark {
    config: BenchmarkConfig,
    target: RenderTarget,
    runners: [BatchRunner; 2],
    _textures: [LookupTexture; 2],
}

impl Benchmark {
    /// Uploads both lookup textures and waits for the upload, so nothing of
    /// the setup leaks into the measured batches.
    pub fn new(vulkan: &mut VulkanData, config: BenchmarkConfig) -> anyhow::Result<Self> {
        config.validate()?;

        let target = RenderTarget::new(vulkan, config.viewport_size())?;

        let mut command_buffer =
            vulkan.create_command_buffer(CommandBufferUsage::OneTimeSubmit)?;
        let textures = [
            LookupTexture::new(
                vulkan,
                &mut command_buffer,
                Dimensionality::OneD,
                config.texels,
                config.filter,
            )?,
            LookupTexture::new(
                vulkan,
                &mut command_buffer,
                Dimensionality::TwoD,
                config.texels,
                config.filter,
            )?,
        ];
        vulkan.submit_and_wait(command_buffer.build()?)?;
        log::info!("Uploaded {} texel lookup tables", config.texels);

        let runners = [
            build_runner(vulkan, &target, &textures[0], &config)?,
            build_runner(vulkan, &target, &textures[1], &config)?,
        ];

        Ok(Self {
            config,
            target,
            runners,
            _textures: textures,
        })
    }

    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    pub fn runner(&self, dim: Dimensionality) -> &BatchRunner {
        &self.runners[dim.index()]
    }

    pub fn run_batch(&self, vulkan: &VulkanData, dim: Dimensionality) -> anyhow::Result<Duration> {
        self.runner(dim).run(vulkan, &self.target)
    }

    /// Renders one frame with each program and compares the images.
    pub fn outputs_match(&self, vulkan: &VulkanData) -> anyhow::Result<bool> {
        let one_d = self.runner(Dimensionality::OneD).snapshot(vulkan, &self.target)?;
        let two_d = self.runner(Dimensionality::TwoD).snapshot(vulkan, &self.target)?;
        Ok(pixels_match(&one_d, &two_d, OUTPUT_TOLERANCE))
    }

    /// Runs the whole protocol: output check, warm-up, then the measured
    /// alternating batches.
    pub fn run(&self, vulkan: &VulkanData) -> anyhow::Result<Report> {
        let outputs_match = self.outputs_match(vulkan)?;
        if !outputs_match {
            log::warn!("1D and 2D programs rendered different images");
        }

        let capture = self.config.capture && renderdoc_attached();
        if self.config.capture && !capture {
            log::warn!("--capture given but RenderDoc is not attached");
        }

        let timings = run_schedule(&self.config, capture, |dim, captured| {
            capture_if(captured, || self.run_batch(vulkan, dim))
        })?;

        Ok(Report {
            device: vulkan.device_name().to_owned(),
            config: self.config.clone(),
            outputs_match,
            timings,
        })
    }
}

/// Runs `config.warmup_batches` discarded batches, then the measured
/// schedule. `run_batch` gets the dimensionality and whether that batch is
/// to be captured; only the first measured batch of each dimensionality is.
pub fn run_schedule<F>(
    config: &BenchmarkConfig,
    capture: bool,
    mut run_batch: F,
) -> anyhow::Result<Timings>
where
    F: FnMut(Dimensionality, bool) -> anyhow::Result<Duration>,
{
    for dim in BatchSchedule::new(config.start_with, config.warmup_batches) {
        run_batch(dim, false)?;
    }

    let schedule = BatchSchedule::new(config.start_with, config.batches);
    log::info!(
        "Running {} batches of {} frames, {} first",
        schedule.len(),
        config.frames_per_batch,
        config.start_with
    );

    let mut timings = Timings::default();
    for (i, dim) in schedule.iter().enumerate() {
        let first_of_dim = timings.samples(dim).is_empty();
        let elapsed = run_batch(dim, capture && first_of_dim)?;
        if capture && first_of_dim {
            log::info!("Captured batch {i} ({dim})");
        }
        log::debug!("batch {i} ({dim}): {elapsed:?}");
        timings.record(dim, elapsed);
    }
    Ok(timings)
}

fn build_runner(
    vulkan: &VulkanData,
    target: &RenderTarget,
    texture: &LookupTexture,
    config: &BenchmarkConfig,
) -> anyhow::Result<BatchRunner> {
    let program = SamplerProgram::new(vulkan, target.render_pass.clone(), texture)?;
    BatchRunner::new(
        vulkan,
        program,
        target,
        config.frames_per_batch,
        config.recording,
    )
}

pub fn pixels_match(a: &[[u8; 4]], b: &[[u8; 4]], tolerance: u8) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(a, b)| {
            a.iter()
                .zip(b)
                .all(|(a, b)| a.abs_diff(*b) <= tolerance)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(start_with: Dimensionality, warmup_batches: usize, batches: usize) -> BenchmarkConfig {
        BenchmarkConfig {
            start_with,
            warmup_batches,
            batches,
            ..Default::default()
        }
    }

    #[test]
    fn warmup_batches_are_discarded() {
        let mut calls = Vec::new();
        let timings = run_schedule(&config(Dimensionality::TwoD, 2, 5), false, |dim, _| {
            calls.push(dim);
            // warm-up batches take 100 s, measured ones 1 ms, 2 ms, ...
            let n = calls.len() as u64;
            Ok(if n <= 2 {
                Duration::from_secs(100)
            } else {
                Duration::from_millis(n - 2)
            })
        })
        .unwrap();

        use Dimensionality::*;
        assert_eq!(calls, vec![TwoD, OneD, TwoD, OneD, TwoD, OneD, TwoD]);
        assert_eq!(timings.samples(TwoD), &[0.001, 0.003, 0.005]);
        assert_eq!(timings.samples(OneD), &[0.002, 0.004]);
        assert!(timings.total(TwoD) < 1.0);
    }

    #[test]
    fn only_the_first_measured_batch_of_each_program_is_captured() {
        let mut captured = Vec::new();
        let timings = run_schedule(&config(Dimensionality::OneD, 3, 6), true, |dim, capture| {
            captured.push((dim, capture));
            Ok(Duration::from_millis(1))
        })
        .unwrap();

        use Dimensionality::*;
        let flagged: Vec<_> = captured
            .iter()
            .enumerate()
            .filter(|(_, (_, capture))| *capture)
            .map(|(i, (dim, _))| (i, *dim))
            .collect();
        // three warm-up calls precede the measured schedule
        assert_eq!(flagged, vec![(3, OneD), (4, TwoD)]);
        assert_eq!(captured.len(), 9);
        assert_eq!(timings.samples(OneD).len() + timings.samples(TwoD).len(), 6);
    }

    #[test]
    fn nothing_is_captured_unless_requested() {
        run_schedule(&config(Dimensionality::OneD, 1, 4), false, |_, capture| {
            assert!(!capture);
            Ok(Duration::ZERO)
        })
        .unwrap();
    }

    #[test]
    fn batch_errors_stop_the_run() {
        let mut calls = 0;
        let result = run_schedule(&config(Dimensionality::OneD, 0, 4), false, |_, _| {
            calls += 1;
            if calls == 2 {
                anyhow::bail!("device lost");
            }
            Ok(Duration::ZERO)
        });
        assert!(result.is_err());
        assert_eq!(calls, 2);
    }

    #[test]
    fn identical_images_match() {
        let image = vec![[102, 102, 102, 0], [4, 4, 4, 255]];
        assert!(pixels_match(&image, &image, 0));
    }

    #[test]
    fn rounding_differences_are_tolerated() {
        let a = vec![[10, 10, 10, 255]];
        let b = vec![[11, 9, 10, 255]];
        assert!(pixels_match(&a, &b, 1));
        assert!(!pixels_match(&a, &b, 0));
    }

    #[test]
    fn different_sizes_never_match() {
        let a = vec![[0; 4]; 3];
        let b = vec![[0; 4]; 4];
        assert!(!pixels_match(&a, &b, u8::MAX));
    }
}
