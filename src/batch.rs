use crate::{
    config::RecordingMode,
    program::SamplerProgram,
    vulkan_util::{QuadVertex, RenderPassKey, VulkanData},
};
use anyhow::Context;
use nalgebra::Vector2;
use std::{
    iter::once,
    sync::Arc,
    time::{Duration, Instant},
};
use vulkano::{
    buffer::Subbuffer,
    command_buffer::{
        AutoCommandBufferBuilder, CommandBufferUsage, PrimaryAutoCommandBuffer,
        RenderPassBeginInfo, SubpassContents,
    },
    format::{ClearValue, Format},
    image::{view::ImageView, AttachmentImage},
    pipeline::{graphics::viewport::Viewport, Pipeline, PipelineBindPoint},
    render_pass::{Framebuffer, FramebufferCreateInfo, RenderPass},
};

pub const TARGET_FORMAT: Format = Format::R8G8B8A8_UNORM;
pub const CLEAR_COLOR: [f32; 4] = [0.4, 0.4, 0.4, 0.0];

/// Offscreen colour attachment every frame is rendered into.
pub struct RenderTarget {
    pub size: Vector2<u32>,
    pub image: Arc<AttachmentImage>,
    pub render_pass: Arc<RenderPass>,
    pub framebuffer: Arc<Framebuffer>,
}

impl RenderTarget {
    pub fn new(vulkan: &mut VulkanData, size: Vector2<u32>) -> anyhow::Result<Self> {
        let render_pass = vulkan.create_render_pass(RenderPassKey {
            format: TARGET_FORMAT,
        })?;
        let image = vulkan.create_target_image(size, TARGET_FORMAT)?;
        let framebuffer = Framebuffer::new(
            render_pass.clone(),
            FramebufferCreateInfo {
                attachments: vec![ImageView::new_default(image.clone())?],
                ..Default::default()
            },
        )?;

        Ok(Self {
            size,
            image,
            render_pass,
            framebuffer,
        })
    }

    fn viewport(&self) -> Viewport {
        Viewport {
            origin: [0.0, 0.0],
            dimensions: self.size.map(|e| e as f32).into(),
            depth_range: 0.0..1.0,
        }
    }
}

/// Records `frames` clear+draw pairs. Each frame is its own render pass
/// instance so the clear happens through the attachment load op.
pub fn record_frames(
    command_buffer: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
    program: &SamplerProgram,
    target: &RenderTarget,
    vertex_buffer: &Subbuffer<[QuadVertex]>,
    frames: u32,
) -> anyhow::Result<()> {
    for _ in 0..frames {
        command_buffer
            .begin_render_pass(
                RenderPassBeginInfo {
                    clear_values: vec![Some(ClearValue::Float(CLEAR_COLOR))],
                    ..RenderPassBeginInfo::framebuffer(target.framebuffer.clone())
                },
                SubpassContents::Inline,
            )?
            .set_viewport(0, once(target.viewport()))
            .bind_pipeline_graphics(program.pipeline.clone())
            .bind_descriptor_sets(
                PipelineBindPoint::Graphics,
                program.pipeline.layout().clone(),
                0,
                program.set.clone(),
            )
            .bind_vertex_buffers(0, vertex_buffer.clone())
            .draw(vertex_buffer.len() as _, 1, 0, 0)?
            .end_render_pass()?;
    }
    Ok(())
}

/// Issues batches of one program and times them until the GPU is idle.
pub struct BatchRunner {
    program: SamplerProgram,
    frames: u32,
    prerecorded: Option<Arc<PrimaryAutoCommandBuffer>>,
}

impl BatchRunner {
    pub fn new(
        vulkan: &VulkanData,
        program: SamplerProgram,
        target: &RenderTarget,
        frames: u32,
        recording: RecordingMode,
    ) -> anyhow::Result<Self> {
        let prerecorded = match recording {
            RecordingMode::Prerecorded => {
                let mut command_buffer =
                    vulkan.create_command_buffer(CommandBufferUsage::MultipleSubmit)?;
                record_frames(
                    &mut command_buffer,
                    &program,
                    target,
                    &vulkan.vertex_buffer(),
                    frames,
                )?;
                Some(Arc::new(command_buffer.build()?))
            },
            RecordingMode::PerBatch => None,
        };

        Ok(Self {
            program,
            frames,
            prerecorded,
        })
    }

    /// Wall-clock time from issuing the batch until the fence signalled.
    pub fn run(&self, vulkan: &VulkanData, target: &RenderTarget) -> anyhow::Result<Duration> {
        let start = Instant::now();
        match &self.prerecorded {
            Some(command_buffer) => vulkan.submit_and_wait(command_buffer.clone())?,
            None => {
                let mut command_buffer =
                    vulkan.create_command_buffer(CommandBufferUsage::OneTimeSubmit)?;
                record_frames(
                    &mut command_buffer,
                    &self.program,
                    target,
                    &vulkan.vertex_buffer(),
                    self.frames,
                )?;
                vulkan.submit_and_wait(command_buffer.build()?)?;
            },
        }
        Ok(start.elapsed())
    }

    /// Renders a single frame and reads the target back.
    pub fn snapshot(
        &self,
        vulkan: &VulkanData,
        target: &RenderTarget,
    ) -> anyhow::Result<Vec<[u8; 4]>> {
        let mut command_buffer =
            vulkan.create_command_buffer(CommandBufferUsage::OneTimeSubmit)?;
        record_frames(
            &mut command_buffer,
            &self.program,
            target,
            &vulkan.vertex_buffer(),
            1,
        )?;
        let read_buffer =
            vulkan.download_image::<[u8; 4], _>(&mut command_buffer, target.image.clone())?;
        vulkan.submit_and_wait(command_buffer.build()?)?;

        let pixels = read_buffer
            .read()
            .context("failed to map the read-back buffer")?
            .to_vec();
        Ok(pixels)
    }
}
