//! Rendering
//!
//! The camera feed is drawn as a full-screen background; annotations are
//! painted on top by the egui overlay in [`overlay`].

pub mod overlay;

use bytemuck::{Pod, Zeroable};

use crate::camera::CameraFrame;

pub use overlay::{layout_annotations, paint_annotations, AnnotationLayout};

/// Texture coordinate transform for the background pass
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct UvTransform {
    pub scale: [f32; 2],
    pub offset: [f32; 2],
}

impl UvTransform {
    pub const IDENTITY: UvTransform = UvTransform {
        scale: [1.0, 1.0],
        offset: [0.0, 0.0],
    };

    /// Crop the frame so it fills the target without distortion
    pub fn aspect_fill(frame_width: u32, frame_height: u32, target_width: u32, target_height: u32) -> Self {
        if frame_width == 0 || frame_height == 0 || target_width == 0 || target_height == 0 {
            return Self::IDENTITY;
        }

        let frame_aspect = frame_width as f32 / frame_height as f32;
        let target_aspect = target_width as f32 / target_height as f32;

        if frame_aspect > target_aspect {
            // Frame is wider: crop left and right
            let scale = target_aspect / frame_aspect;
            Self {
                scale: [scale, 1.0],
                offset: [(1.0 - scale) * 0.5, 0.0],
            }
        } else {
            let scale = frame_aspect / target_aspect;
            Self {
                scale: [1.0, scale],
                offset: [0.0, (1.0 - scale) * 0.5],
            }
        }
    }
}

/// GPU resources for the camera background
pub struct CameraBackground {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uv_buffer: wgpu::Buffer,
    texture: Option<wgpu::Texture>,
    bind_group: Option<wgpu::BindGroup>,
    last_frame_number: u64,
}

impl CameraBackground {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Camera Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Camera Background Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("camera_background.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Camera Background Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Camera Background Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Camera Background Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let uv_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera UV Transform Buffer"),
            size: std::mem::size_of::<UvTransform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            pipeline,
            bind_group_layout,
            sampler,
            uv_buffer,
            texture: None,
            bind_group: None,
            last_frame_number: 0,
        }
    }

    /// Upload a camera frame if it is newer than the last one uploaded
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, frame: &CameraFrame) {
        if frame.frame_number <= self.last_frame_number || !frame.is_complete() {
            return;
        }
        self.last_frame_number = frame.frame_number;

        let needs_new_texture = match &self.texture {
            None => true,
            Some(tex) => {
                let size = tex.size();
                size.width != frame.width || size.height != frame.height
            }
        };

        if needs_new_texture {
            log::info!("Creating camera texture: {}x{}", frame.width, frame.height);

            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Camera Texture"),
                size: wgpu::Extent3d {
                    width: frame.width,
                    height: frame.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });

            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Camera Background Bind Group"),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: self.uv_buffer.as_entire_binding(),
                    },
                ],
            });

            self.texture = Some(texture);
            self.bind_group = Some(bind_group);
        }

        if let Some(texture) = &self.texture {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &frame.data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(frame.width * 4),
                    rows_per_image: Some(frame.height),
                },
                wgpu::Extent3d {
                    width: frame.width,
                    height: frame.height,
                    depth_or_array_layers: 1,
                },
            );
        }
    }

    /// Clear the target and draw the latest uploaded frame over it
    pub fn render(
        &self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        target_size: (u32, u32),
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Camera Background Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let (Some(texture), Some(bind_group)) = (&self.texture, &self.bind_group) else {
            return;
        };

        let size = texture.size();
        let uv = UvTransform::aspect_fill(size.width, size.height, target_size.0, target_size.1);
        queue.write_buffer(&self.uv_buffer, 0, bytemuck::bytes_of(&uv));

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }

    /// Forget the uploaded frame sequence, e.g. after the session restarts
    pub fn reset_sequence(&mut self) {
        self.last_frame_number = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: [f32; 2], b: [f32; 2]) -> bool {
        (a[0] - b[0]).abs() < 1e-6 && (a[1] - b[1]).abs() < 1e-6
    }

    #[test]
    fn test_aspect_fill_same_aspect() {
        assert_eq!(UvTransform::aspect_fill(1280, 720, 1920, 1080), UvTransform::IDENTITY);
    }

    #[test]
    fn test_aspect_fill_crops_wide_frame() {
        // 16:9 frame into a square view keeps the middle 9/16 horizontally
        let uv = UvTransform::aspect_fill(1600, 900, 500, 500);
        assert!(approx(uv.scale, [0.5625, 1.0]));
        assert!(approx(uv.offset, [0.21875, 0.0]));
    }

    #[test]
    fn test_aspect_fill_crops_tall_frame() {
        let uv = UvTransform::aspect_fill(720, 1280, 1280, 720);
        assert!((uv.scale[0] - 1.0).abs() < 1e-6);
        assert!(uv.scale[1] < 1.0);
        assert!((uv.offset[1] * 2.0 + uv.scale[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_aspect_fill_degenerate_sizes() {
        assert_eq!(UvTransform::aspect_fill(0, 720, 100, 100), UvTransform::IDENTITY);
        assert_eq!(UvTransform::aspect_fill(1280, 720, 100, 0), UvTransform::IDENTITY);
    }
}
