//! Command recording for one frame.

use ash::vk;
use trigon_core::Scene;
use trigon_gpu::command::{begin_command_buffer, end_command_buffer};
use trigon_gpu::{GpuMesh, ObjectData, PipelineState};

/// Push-constant data for every draw, in scene order.
pub fn plan_draws(scene: &Scene) -> Vec<ObjectData> {
    scene.transforms().map(|model| ObjectData { model }).collect()
}

/// Where a frame is drawn.
#[derive(Debug, Clone, Copy)]
pub struct RecordTarget {
    /// The cursor slot's command buffer.
    pub command_buffer: vk::CommandBuffer,
    /// Framebuffer of the acquired image.
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
}

/// Viewport covering the whole extent.
#[allow(clippy::cast_precision_loss)]
pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Record one frame: clear, then one three-vertex draw per planned entry.
///
/// # Safety
/// All handles must be valid, the command buffer must be in the initial
/// state and the pipeline must be compatible with the framebuffer.
pub unsafe fn record_frame(
    device: &ash::Device,
    target: &RecordTarget,
    pipeline: &PipelineState,
    mesh: &GpuMesh,
    draws: &[ObjectData],
    clear_color: [f32; 4],
) -> trigon_gpu::Result<()> {
    let cmd = target.command_buffer;
    unsafe { begin_command_buffer(device, cmd, vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT) }?;

    let clear_values = [vk::ClearValue {
        color: vk::ClearColorValue {
            float32: clear_color,
        },
    }];
    let render_area = vk::Rect2D {
        offset: vk::Offset2D::default(),
        extent: target.extent,
    };
    let render_pass_begin = vk::RenderPassBeginInfo::default()
        .render_pass(pipeline.render_pass)
        .framebuffer(target.framebuffer)
        .render_area(render_area)
        .clear_values(&clear_values);

    unsafe {
        device.cmd_begin_render_pass(cmd, &render_pass_begin, vk::SubpassContents::INLINE);
        device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);
        device.cmd_set_viewport(cmd, 0, &[full_viewport(target.extent)]);
        device.cmd_set_scissor(cmd, 0, &[render_area]);
        device.cmd_bind_vertex_buffers(cmd, 0, &[mesh.buffer.buffer], &[0]);

        for draw in draws {
            device.cmd_push_constants(
                cmd,
                pipeline.layout,
                vk::ShaderStageFlags::VERTEX,
                0,
                bytemuck::bytes_of(draw),
            );
            device.cmd_draw(cmd, mesh.vertex_count, 1, 0, 0);
        }

        device.cmd_end_render_pass(cmd);
    }

    unsafe { end_command_buffer(device, cmd) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::{Mat4, Vec3};

    #[test]
    fn one_draw_per_position_in_order() {
        let scene = Scene::new(vec![Vec3::new(-0.4, 0.2, 0.0), Vec3::new(0.6, -0.8, 0.0)]);
        let draws = plan_draws(&scene);

        assert_eq!(draws.len(), 2);
        let first = draws[0].model.transform_point3(Vec3::ZERO);
        assert_relative_eq!(first.x, -0.4);
        assert_relative_eq!(first.y, 0.2);
        let second = draws[1].model.w_axis;
        assert_relative_eq!(second.x, 0.6);
        assert_relative_eq!(second.y, -0.8);
    }

    #[test]
    fn empty_scene_plans_nothing() {
        assert!(plan_draws(&Scene::default()).is_empty());
    }

    #[test]
    fn origin_draw_is_identity() {
        let draws = plan_draws(&Scene::new(vec![Vec3::ZERO]));
        assert_eq!(draws[0].model, Mat4::IDENTITY);
    }

    #[test]
    fn draw_data_fits_push_constant_range() {
        let draws = plan_draws(&Scene::demo());
        assert_eq!(draws.len(), Scene::demo().len());
        assert_eq!(bytemuck::bytes_of(&draws[0]).len(), ObjectData::SIZE as usize);
    }

    #[test]
    fn viewport_covers_extent() {
        let viewport = full_viewport(vk::Extent2D {
            width: 800,
            height: 600,
        });
        assert_relative_eq!(viewport.width, 800.0);
        assert_relative_eq!(viewport.height, 600.0);
        assert_relative_eq!(viewport.max_depth, 1.0);
    }
}
