use crate::{config::FilterMode, dimensionality::Dimensionality, vulkan_util::VulkanData};
use std::sync::Arc;
use vulkano::{
    command_buffer::{AutoCommandBufferBuilder, PrimaryAutoCommandBuffer},
    format::Format,
    image::{view::ImageView, ImageAccess, ImmutableImage},
    sampler::{
        Filter, Sampler, SamplerAddressMode, SamplerCreateInfo, SamplerMipmapMode, LOD_CLAMP_NONE,
    },
};

pub const LOOKUP_FORMAT: Format = Format::R8G8B8A8_UNORM;

/// Grey ramp: texel `i` holds `2 * i` in every colour channel, saturating
/// at 255, with an opaque alpha.
pub fn lookup_texels(count: u32) -> impl ExactSizeIterator<Item = [u8; 4]> {
    (0..count as usize).map(|i| {
        let grey = (2 * i).min(u8::MAX as usize) as u8;
        [grey, grey, grey, u8::MAX]
    })
}

pub fn sampler_create_info(filter: FilterMode) -> SamplerCreateInfo {
    let (filter, mipmap_mode) = match filter {
        FilterMode::Linear => (Filter::Linear, SamplerMipmapMode::Linear),
        FilterMode::Nearest => (Filter::Nearest, SamplerMipmapMode::Nearest),
    };
    SamplerCreateInfo {
        mag_filter: filter,
        min_filter: filter,
        mipmap_mode,
        address_mode: [SamplerAddressMode::ClampToEdge; 3],
        lod: 0.0..=LOD_CLAMP_NONE,
        ..Default::default()
    }
}

/// The colour lookup table stored with one dimensionality.
pub struct LookupTexture {
    pub dimensionality: Dimensionality,
    pub view: Arc<ImageView<ImmutableImage>>,
    pub sampler: Arc<Sampler>,
}

impl LookupTexture {
    /// Records the upload into `command_buffer`. The texture may only be
    /// sampled once that command buffer has completed.
    pub fn new(
        vulkan: &VulkanData,
        command_buffer: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
        dimensionality: Dimensionality,
        texels: u32,
        filter: FilterMode,
    ) -> anyhow::Result<Self> {
        let image = vulkan.create_lookup_image(
            command_buffer,
            lookup_texels(texels),
            dimensionality.image_dimensions(texels),
            LOOKUP_FORMAT,
        )?;
        let view = ImageView::new_default(image.clone())?;
        let sampler = Sampler::new(vulkan.device.clone(), sampler_create_info(filter))?;

        log::debug!(
            "{dimensionality} lookup texture: {texels} texels, {} mip levels, {filter:?} filtering",
            image.mip_levels()
        );

        Ok(Self {
            dimensionality,
            view,
            sampler,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;

    #[test]
    fn ramp_doubles_the_index() {
        let texels = lookup_texels(128).collect_vec();
        assert_eq!(texels.len(), 128);
        assert_eq!(texels[0], [0, 0, 0, 255]);
        assert_eq!(texels[1], [2, 2, 2, 255]);
        assert_eq!(texels[127], [254, 254, 254, 255]);
    }

    #[test]
    fn ramp_saturates_past_the_byte_range() {
        let texels = lookup_texels(200).collect_vec();
        assert_eq!(texels[127], [254, 254, 254, 255]);
        assert_eq!(texels[128], [255, 255, 255, 255]);
        assert_eq!(texels[199], [255, 255, 255, 255]);
    }

    #[test]
    fn ramp_reports_exact_size() {
        assert_eq!(lookup_texels(7).len(), 7);
        assert_eq!(lookup_texels(0).len(), 0);
    }

    #[test]
    fn linear_sampler_blends_between_mips() {
        let info = sampler_create_info(FilterMode::Linear);
        assert_eq!(info.mag_filter, Filter::Linear);
        assert_eq!(info.min_filter, Filter::Linear);
        assert_eq!(info.mipmap_mode, SamplerMipmapMode::Linear);
        assert_eq!(info.address_mode, [SamplerAddressMode::ClampToEdge; 3]);
        assert_eq!(*info.lod.end(), LOD_CLAMP_NONE);
    }

    #[test]
    fn nearest_sampler_is_nearest_everywhere() {
        let info = sampler_create_info(FilterMode::Nearest);
        assert_eq!(info.mag_filter, Filter::Nearest);
        assert_eq!(info.min_filter, Filter::Nearest);
        assert_eq!(info.mipmap_mode, SamplerMipmapMode::Nearest);
    }
}
