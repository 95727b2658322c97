use crate::{batch::RenderTarget, vulkan_util::VulkanData};
use anyhow::Context;
use nalgebra::Vector2;
use std::sync::Arc;
use vulkano::{
    command_buffer::{BlitImageInfo, CommandBufferUsage},
    image::{ImageUsage, SwapchainImage},
    sampler::Filter,
    swapchain::{
        acquire_next_image, PresentMode, Surface, Swapchain, SwapchainCreateInfo,
        SwapchainPresentInfo,
    },
    sync::GpuFuture,
};
use winit::{
    dpi::PhysicalSize,
    event::{ElementState, KeyboardInput, VirtualKeyCode, WindowEvent},
    event_loop::EventLoop,
    window::{Window, WindowBuilder},
};

pub struct BenchWindow {
    pub window: Arc<Window>,
    pub surface: Arc<Surface>,
}

impl BenchWindow {
    pub fn new(
        event_loop: &EventLoop<()>,
        instance: Arc<vulkano::instance::Instance>,
        size: Vector2<u32>,
        maximized: bool,
    ) -> anyhow::Result<Self> {
        let window = Arc::new(
            WindowBuilder::new()
                .with_title(env!("CARGO_PKG_NAME"))
                .with_inner_size(PhysicalSize::new(size.x, size.y))
                .with_maximized(maximized)
                .build(event_loop)?,
        );
        let surface = vulkano_win::create_surface_from_winit(window.clone(), instance)?;
        Ok(Self { window, surface })
    }
}

/// Vsync swapchain that only ever receives a copy of the offscreen target.
pub struct Presenter {
    swapchain: Arc<Swapchain>,
    images: Vec<Arc<SwapchainImage>>,
}

impl Presenter {
    pub fn new(vulkan: &VulkanData, window: &BenchWindow) -> anyhow::Result<Self> {
        let capabilities = vulkan
            .physical_device
            .surface_capabilities(&window.surface, Default::default())?;
        let image_format = vulkan
            .physical_device
            .surface_formats(&window.surface, Default::default())?
            .first()
            .map(|(format, _)| *format)
            .context("surface reports no formats")?;
        let composite_alpha = capabilities
            .supported_composite_alpha
            .into_iter()
            .next()
            .context("surface reports no composite alpha mode")?;

        let (swapchain, images) = Swapchain::new(
            vulkan.device.clone(),
            window.surface.clone(),
            SwapchainCreateInfo {
                min_image_count: capabilities.min_image_count.max(2),
                image_format: Some(image_format),
                image_extent: swapchain_extent(
                    capabilities.current_extent,
                    window.window.inner_size(),
                ),
                image_usage: ImageUsage::TRANSFER_DST,
                composite_alpha,
                present_mode: PresentMode::Fifo,
                ..Default::default()
            },
        )?;

        Ok(Self { swapchain, images })
    }

    /// Blits the target onto the next swapchain image and presents it.
    pub fn present(&self, vulkan: &VulkanData, target: &RenderTarget) -> anyhow::Result<()> {
        let (index, suboptimal, acquire_future) = acquire_next_image(self.swapchain.clone(), None)?;
        if suboptimal {
            log::debug!("swapchain is suboptimal for the window");
        }

        let mut command_buffer = vulkan.create_command_buffer(CommandBufferUsage::OneTimeSubmit)?;
        command_buffer.blit_image(BlitImageInfo {
            filter: Filter::Linear,
            ..BlitImageInfo::images(target.image.clone(), self.images[index as usize].clone())
        })?;

        acquire_future
            .then_execute(vulkan.queue.clone(), command_buffer.build()?)?
            .then_swapchain_present(
                vulkan.queue.clone(),
                SwapchainPresentInfo::swapchain_image_index(self.swapchain.clone(), index),
            )
            .then_signal_fence_and_flush()?
            .wait(None)?;
        Ok(())
    }
}

/// The surface's own extent wins when it reports one; the window size only
/// applies when the surface leaves the choice to the swapchain.
fn swapchain_extent(current_extent: Option<[u32; 2]>, window_size: PhysicalSize<u32>) -> [u32; 2] {
    current_extent.unwrap_or(window_size.into())
}

/// Close request or Escape.
pub fn is_exit_request(event: &WindowEvent<'_>) -> bool {
    matches!(
        event,
        WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                input: KeyboardInput {
                    virtual_keycode: Some(VirtualKeyCode::Escape),
                    state: ElementState::Pressed,
                    ..
                },
                ..
            }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_extent_overrides_the_requested_size() {
        let requested = PhysicalSize::new(1280, 1024);
        assert_eq!(swapchain_extent(Some([1920, 1080]), requested), [1920, 1080]);
        assert_eq!(swapchain_extent(None, requested), [1280, 1024]);
    }

    #[test]
    fn escape_and_close_exit() {
        assert!(is_exit_request(&WindowEvent::CloseRequested));
        assert!(!is_exit_request(&WindowEvent::Focused(true)));
    }
}
