use anyhow::{bail, Context};
use bytemuck::{Pod, Zeroable};
use nalgebra::Vector2;
use std::{
    collections::{hash_map::Entry, HashMap},
    sync::Arc,
};
use vulkano::{
    buffer::{Buffer, BufferContents, BufferCreateInfo, BufferUsage, Subbuffer},
    command_buffer::{
        allocator::StandardCommandBufferAllocator, AutoCommandBufferBuilder, CommandBufferUsage,
        CopyImageToBufferInfo, PrimaryAutoCommandBuffer, PrimaryCommandBufferAbstract,
    },
    descriptor_set::allocator::StandardDescriptorSetAllocator,
    device::{
        physical::{PhysicalDevice, PhysicalDeviceType},
        Device, DeviceCreateInfo, DeviceExtensions, Queue, QueueCreateInfo, QueueFlags,
    },
    format::Format,
    image::{
        AttachmentImage, ImageAccess, ImageDimensions, ImageUsage, ImmutableImage, MipmapsCount,
    },
    instance::{
        debug::{
            DebugUtilsMessageSeverity, DebugUtilsMessageType, DebugUtilsMessenger,
            DebugUtilsMessengerCreateInfo, Message,
        },
        Instance, InstanceCreateInfo, InstanceExtensions,
    },
    memory::allocator::{AllocationCreateInfo, MemoryUsage, StandardMemoryAllocator},
    pipeline::graphics::vertex_input::Vertex,
    render_pass::RenderPass,
    single_pass_renderpass,
    swapchain::Surface,
    sync::GpuFuture,
    VulkanLibrary,
};

const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// Instance plus the debug messenger that has to outlive it.
pub struct InstanceSetup {
    pub instance: Arc<Instance>,
    debug_messenger: Option<DebugUtilsMessenger>,
}

impl InstanceSetup {
    /// `windowed` enables the surface extensions winit needs. `validation`
    /// turns on the Khronos layer if it is installed.
    pub fn new(windowed: bool, validation: bool) -> anyhow::Result<Self> {
        let library = VulkanLibrary::new().context("failed to load the Vulkan library")?;

        let mut enabled_layers = Vec::new();
        let mut debug_utils = false;
        if validation {
            let has_layer = library
                .layer_properties()?
                .any(|layer| layer.name() == VALIDATION_LAYER);
            if has_layer {
                enabled_layers.push(VALIDATION_LAYER.to_owned());
                debug_utils = library.supported_extensions().ext_debug_utils;
            } else {
                log::warn!("{VALIDATION_LAYER} is not installed, running without validation");
            }
        }

        let base_extensions = if windowed {
            vulkano_win::required_extensions(&library)
        } else {
            InstanceExtensions::empty()
        };

        let instance = Instance::new(
            library,
            InstanceCreateInfo {
                enabled_extensions: InstanceExtensions {
                    ext_debug_utils: debug_utils,
                    ..base_extensions
                },
                enabled_layers,
                enumerate_portability: true,
                ..Default::default()
            },
        )
        .context("failed to create the Vulkan instance")?;

        let debug_messenger = if debug_utils {
            Some(unsafe { create_debug_messenger(instance.clone()) }?)
        } else {
            None
        };

        Ok(Self {
            instance,
            debug_messenger,
        })
    }
}

unsafe fn create_debug_messenger(instance: Arc<Instance>) -> anyhow::Result<DebugUtilsMessenger> {
    let messenger = DebugUtilsMessenger::new(
        instance,
        DebugUtilsMessengerCreateInfo {
            message_severity: DebugUtilsMessageSeverity::ERROR
                | DebugUtilsMessageSeverity::WARNING
                | DebugUtilsMessageSeverity::INFO
                | DebugUtilsMessageSeverity::VERBOSE,
            message_type: DebugUtilsMessageType::VALIDATION
                | DebugUtilsMessageType::PERFORMANCE,
            ..DebugUtilsMessengerCreateInfo::user_callback(Arc::new(|msg: &Message<'_>| {
                let level = if msg.severity.intersects(DebugUtilsMessageSeverity::ERROR) {
                    log::Level::Error
                } else if msg.severity.intersects(DebugUtilsMessageSeverity::WARNING) {
                    log::Level::Warn
                } else if msg.severity.intersects(DebugUtilsMessageSeverity::INFO) {
                    log::Level::Info
                } else {
                    log::Level::Debug
                };
                log::log!(
                    level,
                    "[{}] {}",
                    msg.layer_prefix.unwrap_or("vulkan"),
                    msg.description
                );
            }))
        },
    )?;
    Ok(messenger)
}

pub struct VulkanData {
    pub physical_device: Arc<PhysicalDevice>,
    pub device: Arc<Device>,
    pub queue: Arc<Queue>,
    pub memory_allocator: StandardMemoryAllocator,
    pub command_buffer_allocator: StandardCommandBufferAllocator,
    pub descriptor_set_allocator: StandardDescriptorSetAllocator,

    render_pass_cache: HashMap<RenderPassKey, Arc<RenderPass>>,
    vertex_buffer: Subbuffer<[QuadVertex]>,

    _debug_messenger: Option<DebugUtilsMessenger>,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct RenderPassKey {
    pub format: Format,
}

#[derive(Pod, Zeroable, Copy, Clone, Debug, PartialEq, Vertex)]
#[repr(C)]
pub struct QuadVertex {
    #[format(R32G32B32_SFLOAT)]
    pub position: [f32; 3],
    #[format(R32_SFLOAT)]
    pub tex_coord: f32,
}

/// Full-viewport quad in triangle strip order. The lookup coordinate runs
/// from 0 on the left edge to 1 on the right edge.
pub const QUAD: [QuadVertex; 4] = [
    QuadVertex {
        position: [-1.0, -1.0, 0.0],
        tex_coord: 0.0,
    },
    QuadVertex {
        position: [1.0, -1.0, 0.0],
        tex_coord: 1.0,
    },
    QuadVertex {
        position: [-1.0, 1.0, 0.0],
        tex_coord: 0.0,
    },
    QuadVertex {
        position: [1.0, 1.0, 0.0],
        tex_coord: 1.0,
    },
];

fn device_type_rank(ty: PhysicalDeviceType) -> u32 {
    match ty {
        PhysicalDeviceType::DiscreteGpu => 0,
        PhysicalDeviceType::IntegratedGpu => 1,
        PhysicalDeviceType::VirtualGpu => 2,
        PhysicalDeviceType::Cpu => 3,
        PhysicalDeviceType::Other => 4,
        _ => 5,
    }
}

impl VulkanData {
    /// Picks the best device with a graphics queue. With a surface, the
    /// queue must also be able to present to it.
    pub fn init(setup: InstanceSetup, surface: Option<&Arc<Surface>>) -> anyhow::Result<Self> {
        let InstanceSetup {
            instance,
            debug_messenger,
        } = setup;

        let device_extensions = DeviceExtensions {
            khr_swapchain: surface.is_some(),
            ..DeviceExtensions::empty()
        };

        let physical_device_and_queue = instance
            .enumerate_physical_devices()?
            .filter(|p| p.supported_extensions().contains(&device_extensions))
            .filter_map(|p| {
                p.queue_family_properties()
                    .iter()
                    .enumerate()
                    .position(|(i, q)| {
                        q.queue_flags.intersects(QueueFlags::GRAPHICS)
                            && surface.map_or(true, |surface| {
                                p.surface_support(i as u32, surface).unwrap_or(false)
                            })
                    })
                    .map(|i| (p, i as u32))
            })
            .min_by_key(|(p, _)| device_type_rank(p.properties().device_type));

        let Some((physical_device, queue_family_index)) = physical_device_and_queue else {
            bail!("no Vulkan device with a suitable graphics queue");
        };

        let (device, mut queues) = Device::new(
            physical_device.clone(),
            DeviceCreateInfo {
                enabled_extensions: device_extensions,
                queue_create_infos: vec![QueueCreateInfo {
                    queue_family_index,
                    ..Default::default()
                }],
                ..Default::default()
            },
        )
        .context("failed to create the logical device")?;
        let queue = queues.next().context("device returned no queue")?;

        log::info!(
            "Using device: {} (type: {:?})",
            physical_device.properties().device_name,
            physical_device.properties().device_type,
        );
        let memory_allocator = StandardMemoryAllocator::new_default(device.clone());

        let command_buffer_allocator =
            StandardCommandBufferAllocator::new(device.clone(), Default::default());

        let vertex_buffer = Buffer::from_iter(
            &memory_allocator,
            BufferCreateInfo {
                usage: BufferUsage::VERTEX_BUFFER,
                ..Default::default()
            },
            AllocationCreateInfo {
                usage: MemoryUsage::Upload,
                ..Default::default()
            },
            QUAD,
        )?;

        let descriptor_set_allocator = StandardDescriptorSetAllocator::new(device.clone());

        Ok(Self {
            physical_device,
            device,
            queue,
            memory_allocator,
            command_buffer_allocator,
            descriptor_set_allocator,
            render_pass_cache: Default::default(),
            vertex_buffer,
            _debug_messenger: debug_messenger,
        })
    }

    /// Offscreen context without a window.
    pub fn headless(validation: bool) -> anyhow::Result<Self> {
        Self::init(InstanceSetup::new(false, validation)?, None)
    }

    pub fn device_name(&self) -> &str {
        &self.physical_device.properties().device_name
    }

    pub fn create_command_buffer(
        &self,
        usage: CommandBufferUsage,
    ) -> anyhow::Result<AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>> {
        Ok(AutoCommandBufferBuilder::primary(
            &self.command_buffer_allocator,
            self.queue.queue_family_index(),
            usage,
        )?)
    }

    /// Submits `command_buffer` and blocks until the GPU has finished it.
    pub fn submit_and_wait<Cb>(&self, command_buffer: Cb) -> anyhow::Result<()>
    where
        Cb: PrimaryCommandBufferAbstract + 'static,
    {
        command_buffer
            .execute(self.queue.clone())?
            .then_signal_fence_and_flush()?
            .wait(None)?;
        Ok(())
    }

    pub fn create_target_image(
        &self,
        size: Vector2<u32>,
        format: Format,
    ) -> anyhow::Result<Arc<AttachmentImage>> {
        Ok(AttachmentImage::with_usage(
            &self.memory_allocator,
            size.into(),
            format,
            ImageUsage::TRANSFER_SRC,
        )?)
    }

    pub fn create_render_pass(&mut self, key: RenderPassKey) -> anyhow::Result<Arc<RenderPass>> {
        Ok(match self.render_pass_cache.entry(key) {
            Entry::Occupied(e) => e.get().clone(),
            Entry::Vacant(e) => e
                .insert(single_pass_renderpass!(self.device.clone(),
                    attachments: {
                        color: {
                            load: Clear,
                            store: Store,
                            format: key.format,
                            samples: 1,
                        },
                    },
                    pass: {
                        color: [color],
                        depth_stencil: {},
                    },
                )?)
                .clone(),
        })
    }

    pub fn vertex_buffer(&self) -> Subbuffer<[QuadVertex]> {
        self.vertex_buffer.clone()
    }

    pub fn download_image<Px, I>(
        &self,
        command_buffer: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
        image: Arc<I>,
    ) -> anyhow::Result<Subbuffer<[Px]>>
    where
        Px: BufferContents,
        I: ImageAccess + 'static,
    {
        check_pixel_size::<Px>(image.format())?;

        let read_buffer = Buffer::new_slice::<Px>(
            &self.memory_allocator,
            BufferCreateInfo {
                usage: BufferUsage::TRANSFER_DST,
                ..Default::default()
            },
            AllocationCreateInfo {
                usage: MemoryUsage::Download,
                ..Default::default()
            },
            texel_count(image.dimensions()),
        )?;

        command_buffer.copy_image_to_buffer(CopyImageToBufferInfo::image_buffer(
            image,
            read_buffer.clone(),
        ))?;

        Ok(read_buffer)
    }

    /// Uploads `iter` into a sampled image and records generation of its
    /// full mip chain. The caller has to execute `command_buffer` before the
    /// image is sampled.
    pub fn create_lookup_image<Px, I>(
        &self,
        command_buffer: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
        iter: I,
        dimensions: ImageDimensions,
        format: Format,
    ) -> anyhow::Result<Arc<ImmutableImage>>
    where
        Px: BufferContents,
        I: IntoIterator<Item = Px>,
        I::IntoIter: ExactSizeIterator,
    {
        check_pixel_size::<Px>(format)?;

        let iter = iter.into_iter();
        if iter.len() as u64 != texel_count(dimensions) {
            bail!(
                "{} texels do not fill a {:?} image",
                iter.len(),
                dimensions
            );
        }

        Ok(ImmutableImage::from_iter(
            &self.memory_allocator,
            iter,
            dimensions,
            MipmapsCount::Log2,
            format,
            command_buffer,
        )?)
    }
}

fn texel_count(dimensions: ImageDimensions) -> u64 {
    let [width, height, depth] = dimensions.width_height_depth();
    width as u64 * height as u64 * depth as u64 * dimensions.array_layers() as u64
}

fn check_pixel_size<Px>(format: Format) -> anyhow::Result<()> {
    let pixel_bits = format
        .components()
        .iter()
        .copied()
        .map(|i| i as usize)
        .sum::<usize>();
    if pixel_bits != std::mem::size_of::<Px>() * 8 {
        bail!(
            "{format:?} has {pixel_bits} bits per texel, the source type has {}",
            std::mem::size_of::<Px>() * 8
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_spans_the_viewport() {
        let xs = QUAD.iter().map(|v| v.position[0]);
        let ys = QUAD.iter().map(|v| v.position[1]);
        assert_eq!(xs.clone().fold(f32::MAX, f32::min), -1.0);
        assert_eq!(xs.fold(f32::MIN, f32::max), 1.0);
        assert_eq!(ys.clone().fold(f32::MAX, f32::min), -1.0);
        assert_eq!(ys.fold(f32::MIN, f32::max), 1.0);
    }

    #[test]
    fn lookup_coordinate_follows_x() {
        for v in QUAD {
            assert_eq!(v.tex_coord, (v.position[0] + 1.0) / 2.0);
        }
    }

    #[test]
    fn pixel_size_must_match_format() {
        assert!(check_pixel_size::<[u8; 4]>(Format::R8G8B8A8_UNORM).is_ok());
        assert!(check_pixel_size::<u32>(Format::R8G8B8A8_UNORM).is_ok());
        assert!(check_pixel_size::<[u8; 3]>(Format::R8G8B8A8_UNORM).is_err());
    }

    #[test]
    fn texel_count_covers_all_axes() {
        assert_eq!(
            texel_count(ImageDimensions::Dim1d {
                width: 128,
                array_layers: 1
            }),
            128
        );
        assert_eq!(
            texel_count(ImageDimensions::Dim2d {
                width: 128,
                height: 3,
                array_layers: 2
            }),
            768
        );
    }

    #[test]
    fn vertex_layout_is_packed() {
        assert_eq!(std::mem::size_of::<QuadVertex>(), 16);
    }
}
