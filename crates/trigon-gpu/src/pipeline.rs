//! Render pass and graphics pipeline construction.

use crate::error::{GpuError, Result};
use crate::mesh::{ObjectData, Vertex};
use crate::shader::ShaderLoader;
use ash::vk;
use std::path::Path;

/// Render pass, layout and pipeline built for one swapchain format.
///
/// Null handles are valid and skipped on destroy, so a partially built
/// state can always be released.
#[derive(Debug, Default)]
pub struct PipelineState {
    pub layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    pub pipeline: vk::Pipeline,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
}

impl PipelineState {
    /// Build the render pass, pipeline layout and pipeline.
    ///
    /// Shader modules are destroyed before returning, on success and on
    /// failure alike.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn build(
        device: &ash::Device,
        shaders: &dyn ShaderLoader,
        vertex_shader: &Path,
        fragment_shader: &Path,
        format: vk::Format,
        extent: vk::Extent2D,
    ) -> Result<Self> {
        let vertex_code = shaders.load_bytecode(vertex_shader)?;
        let fragment_code = shaders.load_bytecode(fragment_shader)?;

        let mut state = Self {
            format,
            extent,
            ..Self::default()
        };
        let built = unsafe { state.create_objects(device, shaders, &vertex_code, &fragment_code) };
        if let Err(err) = built {
            unsafe { state.destroy(device) };
            return Err(err);
        }

        tracing::info!("Graphics pipeline built for {:?}", format);
        Ok(state)
    }

    unsafe fn create_objects(
        &mut self,
        device: &ash::Device,
        shaders: &dyn ShaderLoader,
        vertex_code: &[u8],
        fragment_code: &[u8],
    ) -> Result<()> {
        self.render_pass = unsafe { create_render_pass(device, self.format) }?;

        let push_constant_ranges = [ObjectData::push_constant_range()];
        let layout_info =
            vk::PipelineLayoutCreateInfo::default().push_constant_ranges(&push_constant_ranges);
        self.layout = unsafe { device.create_pipeline_layout(&layout_info, None) }
            .map_err(GpuError::PipelineLayout)?;

        let vert_module = unsafe { shaders.create_module(device, vertex_code) }?;
        let frag_module = match unsafe { shaders.create_module(device, fragment_code) } {
            Ok(module) => module,
            Err(err) => {
                unsafe { device.destroy_shader_module(vert_module, None) };
                return Err(err);
            }
        };

        let pipeline = unsafe { self.create_pipeline(device, vert_module, frag_module) };

        // Clean up shader modules (no longer needed)
        unsafe {
            device.destroy_shader_module(vert_module, None);
            device.destroy_shader_module(frag_module, None);
        }

        self.pipeline = pipeline?;
        Ok(())
    }

    unsafe fn create_pipeline(
        &self,
        device: &ash::Device,
        vert_module: vk::ShaderModule,
        frag_module: vk::ShaderModule,
    ) -> Result<vk::Pipeline> {
        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vert_module)
                .name(c"main"),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(frag_module)
                .name(c"main"),
        ];

        let bindings = [Vertex::binding_description()];
        let attributes = Vertex::attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Viewport (dynamic)
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false)
            .line_width(1.0);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .sample_shading_enable(false);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(false)
            .color_write_mask(vk::ColorComponentFlags::RGBA)];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(self.layout)
            .render_pass(self.render_pass)
            .subpass(0);

        let pipelines = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        }
        .map_err(|(_pipelines, e)| GpuError::PipelineCreation(e))?;

        pipelines
            .first()
            .copied()
            .ok_or(GpuError::PipelineCreation(vk::Result::ERROR_UNKNOWN))
    }

    /// Destroy the pipeline, then the render pass, then the layout.
    ///
    /// # Safety
    /// The device must be valid and the pipeline must not be in use.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            device.destroy_pipeline(self.pipeline, None);
            device.destroy_render_pass(self.render_pass, None);
            device.destroy_pipeline_layout(self.layout, None);
        }
        self.pipeline = vk::Pipeline::null();
        self.render_pass = vk::RenderPass::null();
        self.layout = vk::PipelineLayout::null();
    }
}

/// Single color attachment, cleared on load and handed to presentation.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_render_pass(device: &ash::Device, format: vk::Format) -> Result<vk::RenderPass> {
    let attachments = [vk::AttachmentDescription::default()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)];

    let color_refs = [vk::AttachmentReference::default()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];

    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)];

    // Image layout transition waits for the acquire semaphore's stage.
    let dependencies = [vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)];

    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    unsafe { device.create_render_pass(&create_info, None) }.map_err(GpuError::RenderPassCreation)
}
