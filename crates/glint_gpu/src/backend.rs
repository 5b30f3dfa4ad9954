//! wgpu implementation of [`TextBackend`]
//!
//! Draws are queued as instances and flushed into a caller-owned render
//! pass by [`WgpuTextBackend::render`]. Consecutive draws of the same
//! texture share one draw call.
//!
//! `render` may be called for several passes before the queue is
//! submitted: each call writes its instances to a fresh range of the
//! instance buffer. Call [`WgpuTextBackend::begin_frame`] after each submit
//! to start reusing the buffer from the beginning.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glint_text::{QuadUniforms, TextBackend, TextImage};

use crate::shaders::TEXT_SPRITE_SHADER;
use crate::texture::SpriteTexture;

const INITIAL_INSTANCE_CAPACITY: u64 = 256;

/// Errors from setting up a GPU device
#[derive(Debug)]
pub enum GpuError {
    /// Failed to request GPU adapter
    AdapterNotFound,
    /// Failed to request GPU device
    DeviceError(wgpu::RequestDeviceError),
}

impl std::fmt::Display for GpuError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuError::AdapterNotFound => write!(f, "No suitable GPU adapter found"),
            GpuError::DeviceError(e) => write!(f, "Failed to request GPU device: {}", e),
        }
    }
}

impl std::error::Error for GpuError {}

/// Request a device without a surface, for offscreen rendering and tests.
pub async fn request_headless_device() -> Result<(Arc<wgpu::Device>, Arc<wgpu::Queue>), GpuError>
{
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .ok_or(GpuError::AdapterNotFound)?;

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Glint Text Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                memory_hints: wgpu::MemoryHints::MemoryUsage,
            },
            None,
        )
        .await
        .map_err(GpuError::DeviceError)?;

    Ok((Arc::new(device), Arc::new(queue)))
}

/// Viewport scale uniform
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct Globals {
    scale: [f32; 2],
    _padding: [f32; 2],
}

/// Per-sprite vertex data
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SpriteInstance {
    pub center: [f32; 2],
    pub size: [f32; 2],
    pub color: [f32; 4],
    pub uv_max: [f32; 2],
    pub _padding: [f32; 2],
}

impl SpriteInstance {
    const ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x2,
        1 => Float32x2,
        2 => Float32x4,
        3 => Float32x2
    ];

    fn new(quad: &QuadUniforms, uv_max: [f32; 2]) -> Self {
        Self {
            center: quad.center,
            size: quad.size,
            color: quad.color,
            uv_max,
            _padding: [0.0; 2],
        }
    }

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Where the next `render` call writes in the instance buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InstanceCursor {
    /// Instances already written since the last frame start
    offset: u64,
    capacity: u64,
}

/// Range of the instance buffer reserved for one `render` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Reservation {
    /// First instance of the range
    start: u64,
    /// Capacity of a replacement buffer, when the current one is full
    reallocate: Option<u64>,
}

impl InstanceCursor {
    fn new(capacity: u64) -> Self {
        Self {
            offset: 0,
            capacity,
        }
    }

    /// Reserve `count` instances after everything written this frame.
    ///
    /// Ranges already handed out stay intact: when they leave too little
    /// room, a replacement buffer is requested and writing restarts at its
    /// beginning while earlier passes keep the old buffer.
    fn reserve(&mut self, count: u64) -> Reservation {
        let reallocate = if self.offset + count > self.capacity {
            self.capacity = self.capacity.max(count.next_power_of_two());
            self.offset = 0;
            Some(self.capacity)
        } else {
            None
        };
        let start = self.offset;
        self.offset += count;
        Reservation { start, reallocate }
    }

    fn reset(&mut self) {
        self.offset = 0;
    }
}

/// A run of instances drawn with one texture
struct Batch {
    bind_group: Arc<wgpu::BindGroup>,
    instances: std::ops::Range<u32>,
}

/// Clip-space scale for a viewport centered on the origin, y down.
pub(crate) fn viewport_scale(width: u32, height: u32) -> [f32; 2] {
    [2.0 / width.max(1) as f32, -2.0 / height.max(1) as f32]
}

/// Text sprite renderer for wgpu
pub struct WgpuTextBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipeline: wgpu::RenderPipeline,
    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    instance_buffer: wgpu::Buffer,
    cursor: InstanceCursor,
    instances: Vec<SpriteInstance>,
    batches: Vec<Batch>,
    viewport: (u32, u32),
}

impl WgpuTextBackend {
    /// Create a backend drawing into targets of `format`.
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        format: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Text Sprite Shader"),
            source: wgpu::ShaderSource::Wgsl(TEXT_SPRITE_SHADER.into()),
        });

        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Text Globals Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Text Sprite Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }],
        });

        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Text Globals Buffer"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Text Sprite Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Text Globals Bind Group"),
            layout: &globals_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: globals_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Text Sprite Pipeline Layout"),
            bind_group_layouts: &[&globals_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        // Coverage is multiplied into a premultiplied color
        let blend = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Text Sprite Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[SpriteInstance::layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        let instance_buffer = Self::create_instance_buffer(&device, INITIAL_INSTANCE_CAPACITY);

        let backend = Self {
            device,
            queue,
            pipeline,
            globals_buffer,
            globals_bind_group,
            texture_layout,
            instance_buffer,
            cursor: InstanceCursor::new(INITIAL_INSTANCE_CAPACITY),
            instances: Vec::new(),
            batches: Vec::new(),
            viewport: (1, 1),
        };
        backend.write_globals();
        backend
    }

    fn create_instance_buffer(device: &wgpu::Device, capacity: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Text Sprite Instance Buffer"),
            size: capacity * std::mem::size_of::<SpriteInstance>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn write_globals(&self) {
        let globals = Globals {
            scale: viewport_scale(self.viewport.0, self.viewport.1),
            _padding: [0.0; 2],
        };
        self.queue
            .write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&globals));
    }

    /// Set the render target size in raw pixels. The size applies to every
    /// pass of the next submission.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if self.viewport != (width, height) {
            self.viewport = (width, height);
            self.write_globals();
        }
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Number of sprites waiting for [`render`](Self::render)
    pub fn queued(&self) -> usize {
        self.instances.len()
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    /// Start a new frame; the previous frame's work must have been
    /// submitted.
    pub fn begin_frame(&mut self) {
        self.cursor.reset();
    }

    /// Draw every queued sprite into `pass` and clear the queue.
    pub fn render(&mut self, pass: &mut wgpu::RenderPass<'_>) {
        if self.instances.is_empty() {
            return;
        }

        let count = self.instances.len() as u64;
        let reservation = self.cursor.reserve(count);
        if let Some(capacity) = reservation.reallocate {
            tracing::debug!("Allocating text instance buffer for {} sprites", capacity);
            self.instance_buffer = Self::create_instance_buffer(&self.device, capacity);
        }

        let stride = std::mem::size_of::<SpriteInstance>() as u64;
        let start = reservation.start * stride;
        let end = start + count * stride;
        self.queue.write_buffer(
            &self.instance_buffer,
            start,
            bytemuck::cast_slice(&self.instances),
        );

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.globals_bind_group, &[]);
        pass.set_vertex_buffer(0, self.instance_buffer.slice(start..end));
        for batch in &self.batches {
            pass.set_bind_group(1, batch.bind_group.as_ref(), &[]);
            pass.draw(0..6, batch.instances.clone());
        }

        self.instances.clear();
        self.batches.clear();
    }
}

impl TextBackend for WgpuTextBackend {
    type Texture = SpriteTexture;

    fn create_texture(&mut self, image: &TextImage) -> SpriteTexture {
        SpriteTexture::new(&self.device, &self.texture_layout, &self.queue, image)
    }

    fn update_texture(&mut self, texture: &mut SpriteTexture, image: &TextImage) {
        if texture.fits(image) {
            texture.write(&self.queue, image);
        } else {
            *texture = self.create_texture(image);
        }
    }

    fn draw_quad(&mut self, texture: &SpriteTexture, quad: &QuadUniforms) {
        let index = self.instances.len() as u32;
        self.instances
            .push(SpriteInstance::new(quad, texture.uv_max()));

        match self.batches.last_mut() {
            Some(batch) if Arc::ptr_eq(&batch.bind_group, texture.bind_group()) => {
                batch.instances.end = index + 1;
            }
            _ => self.batches.push(Batch {
                bind_group: Arc::clone(texture.bind_group()),
                instances: index..index + 1,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<SpriteInstance>(), 48);
        assert_eq!(std::mem::size_of::<Globals>(), 16);
    }

    #[test]
    fn renders_in_one_frame_get_disjoint_ranges() {
        let mut cursor = InstanceCursor::new(8);
        let first = cursor.reserve(3);
        let second = cursor.reserve(4);
        assert_eq!(first, Reservation { start: 0, reallocate: None });
        assert_eq!(second, Reservation { start: 3, reallocate: None });

        cursor.reset();
        assert_eq!(cursor.reserve(8).start, 0);
    }

    #[test]
    fn full_buffer_is_replaced_not_overwritten() {
        let mut cursor = InstanceCursor::new(8);
        cursor.reserve(6);
        let overflow = cursor.reserve(4);
        assert_eq!(overflow, Reservation { start: 0, reallocate: Some(8) });
        assert_eq!(cursor.reserve(4).start, 4);

        let large = cursor.reserve(20);
        assert_eq!(large, Reservation { start: 0, reallocate: Some(32) });
        assert_eq!(cursor.reserve(12).start, 20);
    }

    #[test]
    fn viewport_scale_flips_y() {
        assert_eq!(viewport_scale(800, 400), [0.0025, -0.005]);
        assert_eq!(viewport_scale(0, 0), [2.0, -2.0]);
    }

    #[test]
    fn instance_copies_quad() {
        let quad = QuadUniforms {
            center: [3.0, -4.0],
            size: [10.0, 20.0],
            color: [0.5, 0.5, 0.5, 0.5],
        };
        let instance = SpriteInstance::new(&quad, [1.0, 0.5]);
        assert_eq!(instance.center, quad.center);
        assert_eq!(instance.size, quad.size);
        assert_eq!(instance.color, quad.color);
        assert_eq!(instance.uv_max, [1.0, 0.5]);
    }
}
