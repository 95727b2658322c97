use crate::{
    dimensionality::Dimensionality,
    shaders::{fs_1d, fs_2d, vs},
    texture::LookupTexture,
    vulkan_util::{QuadVertex, VulkanData},
};
use anyhow::Context;
use std::sync::Arc;
use vulkano::{
    descriptor_set::{PersistentDescriptorSet, WriteDescriptorSet},
    pipeline::{
        graphics::{
            color_blend::ColorBlendState,
            input_assembly::{InputAssemblyState, PrimitiveTopology},
            vertex_input::Vertex,
            viewport::ViewportState,
        },
        GraphicsPipeline, Pipeline,
    },
    render_pass::{RenderPass, Subpass},
    shader::ShaderModule,
};

/// Pipeline plus descriptor set that draws the quad while sampling one
/// lookup texture.
pub struct SamplerProgram {
    pub pipeline: Arc<GraphicsPipeline>,
    pub set: Arc<PersistentDescriptorSet>,
}

fn load_fragment_shader(
    vulkan: &VulkanData,
    dimensionality: Dimensionality,
) -> anyhow::Result<Arc<ShaderModule>> {
    Ok(match dimensionality {
        Dimensionality::OneD => fs_1d::load(vulkan.device.clone())?,
        Dimensionality::TwoD => fs_2d::load(vulkan.device.clone())?,
    })
}

impl SamplerProgram {
    pub fn new(
        vulkan: &VulkanData,
        render_pass: Arc<RenderPass>,
        texture: &LookupTexture,
    ) -> anyhow::Result<Self> {
        let dimensionality = texture.dimensionality;
        let vert = vs::load(vulkan.device.clone())?;
        let frag = load_fragment_shader(vulkan, dimensionality)?;

        let subpass = Subpass::from(render_pass, 0).context("render pass has no subpass")?;
        let pipeline = GraphicsPipeline::start()
            .vertex_input_state(QuadVertex::per_vertex())
            .vertex_shader(
                vert.entry_point("main")
                    .context("vertex shader has no main")?,
                (),
            )
            .input_assembly_state(
                InputAssemblyState::new().topology(PrimitiveTopology::TriangleStrip),
            )
            .viewport_state(ViewportState::viewport_dynamic_scissor_irrelevant())
            .fragment_shader(
                frag.entry_point("main")
                    .context("fragment shader has no main")?,
                (),
            )
            .color_blend_state(ColorBlendState::new(subpass.num_color_attachments()))
            .render_pass(subpass)
            .build(vulkan.device.clone())
            .with_context(|| format!("failed to build the {dimensionality} pipeline"))?;

        let set = PersistentDescriptorSet::new(
            &vulkan.descriptor_set_allocator,
            pipeline
                .layout()
                .set_layouts()
                .get(0)
                .context("pipeline has no descriptor set layout")?
                .clone(),
            [WriteDescriptorSet::image_view_sampler(
                0,
                texture.view.clone(),
                texture.sampler.clone(),
            )],
        )?;

        Ok(Self { pipeline, set })
    }
}
