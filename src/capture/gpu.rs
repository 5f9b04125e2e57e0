//! The GPU backend: texture upload, fullscreen quad draw, pixel readback.
//!
//! Runs headless on a wgpu device. Each grab uploads the current frame as a
//! texture and draws it across an offscreen render target; retrieve copies
//! the target into a mapped buffer and strips the row padding wgpu requires.

use std::sync::mpsc;

use tracing::{debug, info};

use crate::capture::shaders::{self, FragmentShader};
use crate::capture::{Options, VideoCapture};
use crate::error::{CaptureError, Result};
use crate::source::{Frame, FrameSource};
use crate::surface::{ContextKind, Surface};

/// Quad corners in clip space, counter-clockwise from bottom-left.
const QUAD_CORNERS: [f32; 8] = [-1.0, -1.0, 1.0, -1.0, 1.0, 1.0, -1.0, 1.0];

/// Two triangles covering the quad.
const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

const CORNER_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

/// Render target format. Non-sRGB so sampled bytes round-trip exactly.
const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Adapter/device settings passed through verbatim to wgpu.
#[derive(Debug, Clone, Copy)]
pub struct AdapterOptions {
    /// Graphics APIs the instance may use.
    pub backends: wgpu::Backends,
    /// Adapter power preference.
    pub power_preference: wgpu::PowerPreference,
    /// Force a software fallback adapter. Useful on headless CI machines.
    pub force_fallback_adapter: bool,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::default(),
            force_fallback_adapter: false,
        }
    }
}

/// Construction options for [`GpuCapture`].
#[derive(Debug, Default)]
pub struct GpuOptions {
    /// Pre-existing drawing surface. Created on demand when absent.
    pub surface: Option<Surface>,
    /// Native context-creation settings, passed through to wgpu.
    pub context: AdapterOptions,
    /// Fragment shader variant. Defaults to RGBA passthrough.
    pub shader: FragmentShader,
}

impl From<Options> for GpuOptions {
    fn from(options: Options) -> Self {
        Self {
            surface: options.surface,
            ..Self::default()
        }
    }
}

/// The uploaded frame texture and its bind group.
///
/// wgpu textures have fixed extents, so a change in the source frame's own
/// dimensions recreates the pair in place.
#[derive(Debug)]
struct FrameTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

/// Offscreen render target plus the buffer frames are read back through.
#[derive(Debug)]
struct RenderTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    readback: wgpu::Buffer,
    width: u32,
    height: u32,
    /// Row stride in the readback buffer, 256-byte aligned per wgpu.
    padded_bytes_per_row: u32,
}

impl RenderTarget {
    fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    fn destroy(&self) {
        self.texture.destroy();
        self.readback.destroy();
    }
}

/// Captures frames through a minimal GPU pipeline.
///
/// All pipeline state (program, sampler, geometry buffers) is created once at
/// construction and reused every frame; only texture contents and logical
/// sizes change per grab. Construction is transactional: any failing phase
/// drops whatever was created earlier before the error propagates.
#[derive(Debug)]
pub struct GpuCapture<S: FrameSource> {
    source: S,
    surface: Surface,
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::RenderPipeline,
    sampler: wgpu::Sampler,
    corner_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    frame_texture: FrameTexture,
    target: RenderTarget,
    released: bool,
}

impl<S: FrameSource> GpuCapture<S> {
    /// Create a GPU capture backend over the given frame source.
    ///
    /// Acquires a device, compiles the vertex shader and the selected
    /// fragment variant, links the pipeline, and allocates the texture,
    /// geometry buffers and readback buffer. Each phase maps to its own
    /// error variant; on failure everything acquired so far is dropped
    /// before the error is returned.
    pub fn new(source: S, options: GpuOptions) -> Result<Self> {
        let GpuOptions {
            surface,
            context,
            shader,
        } = options;

        let mut surface = surface.unwrap_or_default();
        surface.bind(ContextKind::Gpu)?;
        surface.resize(source.width(), source.height());

        let (device, queue) = request_device(&context)?;

        let vertex = compile_shader(&device, "framegrab-clip", shaders::CLIP)?;
        let fragment = compile_shader(&device, "framegrab-fragment", shader.source())?;
        let pipeline = link_pipeline(&device, &vertex, &fragment)?;

        let (texture, target, corner_buffer, index_buffer) = {
            let (width, height) = (surface.width(), surface.height());
            with_allocation_scope(&device, |device| {
                (
                    create_frame_texture(device, width, height),
                    create_render_target(device, width, height),
                    device.create_buffer(&wgpu::BufferDescriptor {
                        label: Some("framegrab-corners"),
                        size: std::mem::size_of_val(&QUAD_CORNERS) as u64,
                        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                        mapped_at_creation: false,
                    }),
                    device.create_buffer(&wgpu::BufferDescriptor {
                        label: Some("framegrab-indices"),
                        size: std::mem::size_of_val(&QUAD_INDICES) as u64,
                        usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
                        mapped_at_creation: false,
                    }),
                )
            })
            .map_err(CaptureError::ResourceAllocation)?
        };

        // Resolving the texture binding against the pipeline is the
        // uniform-lookup step: a fragment variant that does not expose the
        // expected binding fails here, after which the resources above are
        // dropped on the way out.
        let (sampler, bind_group) = with_error_scope(&device, |device| {
            let sampler = create_sampler(device);
            let bind_group = create_bind_group(device, &pipeline, &texture, &sampler);
            (sampler, bind_group)
        })
        .map_err(CaptureError::UniformLookup)?;

        let frame_texture = FrameTexture {
            texture,
            bind_group,
            width: surface.width(),
            height: surface.height(),
        };

        Ok(Self {
            source,
            surface,
            device,
            queue,
            pipeline,
            sampler,
            corner_buffer,
            index_buffer,
            frame_texture,
            target,
            released: false,
        })
    }

    /// The owned drawing surface.
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    fn ensure_live(&self, operation: &str) -> Result<()> {
        if self.released {
            return Err(CaptureError::Runtime(format!(
                "{operation} called after release"
            )));
        }
        Ok(())
    }

    /// Recreate the render target when the surface dimensions drifted from
    /// the frame source since the last grab.
    fn sync_render_target(&mut self) -> Result<()> {
        if !self.surface.resize(self.source.width(), self.source.height()) {
            return Ok(());
        }
        let (width, height) = (self.surface.width(), self.surface.height());
        debug!(width, height, "resizing gpu render target");
        let target = with_allocation_scope(&self.device, |device| {
            create_render_target(device, width, height)
        })
        .map_err(CaptureError::Runtime)?;
        let old = std::mem::replace(&mut self.target, target);
        old.destroy();
        Ok(())
    }

    /// Recreate the frame texture and its bind group when the frame's own
    /// dimensions changed.
    fn sync_frame_texture(&mut self, frame: &Frame) -> Result<()> {
        if frame.width == self.frame_texture.width && frame.height == self.frame_texture.height {
            return Ok(());
        }
        debug!(
            width = frame.width,
            height = frame.height,
            "recreating frame texture"
        );
        let (texture, bind_group) = with_error_scope(&self.device, |device| {
            let texture = create_frame_texture(device, frame.width, frame.height);
            let bind_group = create_bind_group(device, &self.pipeline, &texture, &self.sampler);
            (texture, bind_group)
        })
        .map_err(CaptureError::Runtime)?;
        self.frame_texture.texture.destroy();
        self.frame_texture = FrameTexture {
            texture,
            bind_group,
            width: frame.width,
            height: frame.height,
        };
        Ok(())
    }
}

impl<S: FrameSource> VideoCapture for GpuCapture<S> {
    fn width(&self) -> u32 {
        self.source.width()
    }

    fn height(&self) -> u32 {
        self.source.height()
    }

    fn grab(&mut self) -> Result<()> {
        self.ensure_live("grab")?;
        if self.source.width() == 0 || self.source.height() == 0 {
            return Err(CaptureError::Runtime(
                "frame source reports zero dimensions".to_string(),
            ));
        }
        self.sync_render_target()?;

        let frame = self.source.current_frame();
        if frame.data.len() != frame.byte_len() {
            return Err(CaptureError::Runtime(format!(
                "source frame has {} bytes, expected {} for {}x{} RGBA8",
                frame.data.len(),
                frame.byte_len(),
                frame.width,
                frame.height
            )));
        }
        self.sync_frame_texture(&frame)?;

        // The geometry never changes, but re-uploading it every grab keeps
        // the path robust to device loss between frames.
        self.queue
            .write_buffer(&self.corner_buffer, 0, bytemuck::cast_slice(&QUAD_CORNERS));
        self.queue
            .write_buffer(&self.index_buffer, 0, bytemuck::cast_slice(&QUAD_INDICES));

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.frame_texture.texture,
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

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("framegrab-grab"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("framegrab-draw"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target.view,
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
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.frame_texture.bind_group, &[]);
            pass.set_vertex_buffer(0, self.corner_buffer.slice(..));
            pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..1);
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn retrieve(&mut self, buffer: &mut [u8]) -> Result<()> {
        self.ensure_live("retrieve")?;
        let expected = self.target.byte_len();
        if buffer.len() != expected {
            return Err(CaptureError::BufferLength {
                expected,
                actual: buffer.len(),
            });
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("framegrab-readback"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.target.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.target.padded_bytes_per_row),
                    rows_per_image: Some(self.target.height),
                },
            },
            wgpu::Extent3d {
                width: self.target.width,
                height: self.target.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = self.target.readback.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| CaptureError::Runtime(format!("device poll failed: {e}")))?;
        rx.recv()
            .map_err(|_| CaptureError::Runtime("readback mapping was abandoned".to_string()))?
            .map_err(|e| CaptureError::Runtime(format!("readback mapping failed: {e}")))?;

        {
            let data = slice.get_mapped_range();
            let unpadded = self.target.width as usize * 4;
            let padded = self.target.padded_bytes_per_row as usize;
            if padded == unpadded {
                buffer.copy_from_slice(&data[..buffer.len()]);
            } else {
                for (row, out) in buffer.chunks_exact_mut(unpadded).enumerate() {
                    let start = row * padded;
                    out.copy_from_slice(&data[start..start + unpadded]);
                }
            }
        }
        self.target.readback.unmap();
        Ok(())
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.frame_texture.texture.destroy();
        self.target.destroy();
        self.corner_buffer.destroy();
        self.index_buffer.destroy();
        debug!("gpu capture released");
    }
}

/// Acquire an adapter and device per the caller's context options.
fn request_device(options: &AdapterOptions) -> Result<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: options.backends,
        ..Default::default()
    });
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: options.power_preference,
        force_fallback_adapter: options.force_fallback_adapter,
        compatible_surface: None,
    }))
    .map_err(|e| CaptureError::ContextAcquisition(format!("no suitable gpu adapter: {e}")))?;
    info!(adapter = %adapter.get_info().name, "selected gpu adapter");

    pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("framegrab-capture"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits()),
        memory_hints: Default::default(),
        trace: wgpu::Trace::Off,
    }))
    .map_err(|e| CaptureError::ContextAcquisition(format!("gpu device request failed: {e}")))
}

/// Compile a WGSL module, surfacing the driver diagnostic on rejection.
fn compile_shader(
    device: &wgpu::Device,
    label: &str,
    source: &str,
) -> Result<wgpu::ShaderModule> {
    with_error_scope(device, |device| {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        })
    })
    .map_err(CaptureError::ShaderCompile)
}

/// Link the vertex and fragment modules into a render pipeline.
fn link_pipeline(
    device: &wgpu::Device,
    vertex: &wgpu::ShaderModule,
    fragment: &wgpu::ShaderModule,
) -> Result<wgpu::RenderPipeline> {
    with_error_scope(device, |device| {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("framegrab-pipeline"),
            layout: None,
            vertex: wgpu::VertexState {
                module: vertex,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: 8,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &CORNER_ATTRIBUTES,
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: fragment,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: Default::default(),
            multiview: None,
            cache: None,
        })
    })
    .map_err(CaptureError::Link)
}

fn create_frame_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("framegrab-frame"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TARGET_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

fn create_render_target(device: &wgpu::Device, width: u32, height: u32) -> RenderTarget {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("framegrab-target"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TARGET_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    let unpadded_bytes_per_row = width * 4;
    let padded_bytes_per_row = unpadded_bytes_per_row
        .div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
        * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let readback = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("framegrab-readback"),
        size: padded_bytes_per_row as u64 * height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    RenderTarget {
        texture,
        view,
        readback,
        width,
        height,
        padded_bytes_per_row,
    }
}

/// Clamp-to-edge sampler with linear minification and nearest magnification.
fn create_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Nearest,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

fn create_bind_group(
    device: &wgpu::Device,
    pipeline: &wgpu::RenderPipeline,
    texture: &wgpu::Texture,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("framegrab-texture-bind-group"),
        layout: &pipeline.get_bind_group_layout(0),
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

/// Run `f` inside a validation error scope, returning the driver diagnostic
/// on failure.
fn with_error_scope<T>(
    device: &wgpu::Device,
    f: impl FnOnce(&wgpu::Device) -> T,
) -> std::result::Result<T, String> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f(device);
    match pollster::block_on(device.pop_error_scope()) {
        None => Ok(value),
        Some(error) => Err(error.to_string()),
    }
}

/// Like [`with_error_scope`] but also catches out-of-memory errors, which is
/// what texture and buffer creation fail with under memory pressure.
fn with_allocation_scope<T>(
    device: &wgpu::Device,
    f: impl FnOnce(&wgpu::Device) -> T,
) -> std::result::Result<T, String> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    let result = with_error_scope(device, f);
    let oom = pollster::block_on(device.pop_error_scope());
    match (result, oom) {
        (Err(validation), _) => Err(validation),
        (Ok(_), Some(error)) => Err(error.to_string()),
        (Ok(value), None) => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SharedSource;

    fn red_source(width: u32, height: u32) -> SharedSource {
        SharedSource::new(Frame::solid(width, height, [255, 0, 0, 255]))
    }

    /// Build a GPU capture, or skip the test when the machine has no
    /// adapter at all.
    fn gpu_capture(
        source: SharedSource,
        shader: FragmentShader,
    ) -> Option<GpuCapture<SharedSource>> {
        let options = GpuOptions {
            shader,
            ..GpuOptions::default()
        };
        match GpuCapture::new(source, options) {
            Ok(capture) => Some(capture),
            Err(CaptureError::ContextAcquisition(reason)) => {
                eprintln!("skipping gpu test, no adapter: {reason}");
                None
            }
            Err(other) => panic!("gpu construction failed: {other}"),
        }
    }

    #[test]
    fn two_by_two_red_frame_reads_back_exactly() {
        let Some(mut capture) = gpu_capture(red_source(2, 2), FragmentShader::Rgba) else {
            return;
        };
        let buffer = capture.read().unwrap();
        assert_eq!(buffer.len(), 16);
        for pixel in buffer.chunks_exact(4) {
            assert_eq!(pixel, [255, 0, 0, 255]);
        }
        capture.release();
    }

    #[test]
    fn dimension_math_matches_the_source() {
        let Some(capture) = gpu_capture(red_source(320, 240), FragmentShader::Rgba) else {
            return;
        };
        assert_eq!(capture.width(), 320);
        assert_eq!(capture.height(), 240);
        assert_eq!(capture.size(), 320 * 240 * 4);
    }

    #[test]
    fn source_resize_resizes_the_render_target() {
        let source = red_source(320, 240);
        let Some(mut capture) = gpu_capture(source.clone(), FragmentShader::Rgba) else {
            return;
        };
        capture.grab().unwrap();

        source.publish(Frame::solid(640, 480, [0, 255, 0, 255]));
        capture.grab().unwrap();
        assert_eq!(capture.surface().width(), 640);

        let mut buffer = vec![0; capture.size()];
        assert_eq!(buffer.len(), 640 * 480 * 4);
        capture.retrieve(&mut buffer).unwrap();
        assert_eq!(&buffer[..4], &[0, 255, 0, 255]);
        capture.release();
    }

    #[test]
    fn readback_strips_row_padding_at_odd_widths() {
        // 3 pixels per row is 12 bytes, far from the 256-byte row alignment.
        let Some(mut capture) = gpu_capture(red_source(3, 2), FragmentShader::Rgba) else {
            return;
        };
        let buffer = capture.read().unwrap();
        assert_eq!(buffer.len(), 3 * 2 * 4);
        for pixel in buffer.chunks_exact(4) {
            assert_eq!(pixel, [255, 0, 0, 255]);
        }
        capture.release();
    }

    #[test]
    fn successive_reads_return_independent_buffers() {
        let Some(mut capture) = gpu_capture(red_source(2, 2), FragmentShader::Rgba) else {
            return;
        };
        let mut first = capture.read().unwrap();
        let second = capture.read().unwrap();
        first.fill(0);
        assert_eq!(&second[..4], &[255, 0, 0, 255]);
        capture.release();
    }

    #[test]
    fn lum_variant_produces_grey_opaque_pixels() {
        let Some(mut capture) = gpu_capture(red_source(2, 2), FragmentShader::Lum) else {
            return;
        };
        let buffer = capture.read().unwrap();
        for pixel in buffer.chunks_exact(4) {
            // Pure red weighs in at 0.299, about 76 of 255.
            assert_eq!(pixel[0], pixel[1]);
            assert_eq!(pixel[1], pixel[2]);
            assert!((70..=82).contains(&pixel[0]), "luminance was {}", pixel[0]);
            assert_eq!(pixel[3], 255);
        }
        capture.release();
    }

    #[test]
    fn rgblum_variant_packs_luminance_into_alpha() {
        let Some(mut capture) = gpu_capture(red_source(2, 2), FragmentShader::RgbLum) else {
            return;
        };
        let buffer = capture.read().unwrap();
        for pixel in buffer.chunks_exact(4) {
            assert_eq!(&pixel[..3], &[255, 0, 0]);
            assert!((70..=82).contains(&pixel[3]), "packed lum was {}", pixel[3]);
        }
        capture.release();
    }

    #[test]
    fn garbled_fragment_shader_fails_construction_with_compile_error() {
        let options = GpuOptions {
            shader: FragmentShader::Custom("not valid glsl".to_string()),
            ..GpuOptions::default()
        };
        match GpuCapture::new(red_source(2, 2), options) {
            Err(CaptureError::ShaderCompile(log)) => {
                assert!(!log.is_empty());
            }
            Err(CaptureError::ContextAcquisition(reason)) => {
                eprintln!("skipping gpu test, no adapter: {reason}");
            }
            other => panic!("expected a shader compile error, got {other:?}"),
        }
    }

    #[test]
    fn fragment_shader_without_texture_binding_fails_uniform_lookup() {
        let source = "@fragment\nfn fs_main() -> @location(0) vec4<f32> {\n    return vec4<f32>(1.0, 1.0, 1.0, 1.0);\n}\n";
        let options = GpuOptions {
            shader: FragmentShader::Custom(source.to_string()),
            ..GpuOptions::default()
        };
        match GpuCapture::new(red_source(2, 2), options) {
            Err(CaptureError::UniformLookup(_)) => {}
            Err(CaptureError::ContextAcquisition(reason)) => {
                eprintln!("skipping gpu test, no adapter: {reason}");
            }
            other => panic!("expected a uniform lookup error, got {other:?}"),
        }
    }

    #[test]
    fn grab_and_retrieve_after_release_fail_cleanly() {
        let Some(mut capture) = gpu_capture(red_source(2, 2), FragmentShader::Rgba) else {
            return;
        };
        capture.release();
        capture.release(); // Idempotent.

        assert!(matches!(capture.grab(), Err(CaptureError::Runtime(_))));
        let mut buffer = vec![0; 16];
        assert!(matches!(
            capture.retrieve(&mut buffer),
            Err(CaptureError::Runtime(_))
        ));
    }

    #[test]
    fn release_does_not_affect_other_instances() {
        let source = red_source(2, 2);
        let Some(mut a) = gpu_capture(source.clone(), FragmentShader::Rgba) else {
            return;
        };
        let Some(mut b) = gpu_capture(source, FragmentShader::Rgba) else {
            return;
        };
        a.release();
        let buffer = b.read().unwrap();
        assert_eq!(&buffer[..4], &[255, 0, 0, 255]);
        b.release();
    }

    #[test]
    fn retrieve_rejects_mismatched_buffer_length() {
        let Some(mut capture) = gpu_capture(red_source(2, 2), FragmentShader::Rgba) else {
            return;
        };
        capture.grab().unwrap();
        let mut short = vec![0; 8];
        assert!(matches!(
            capture.retrieve(&mut short),
            Err(CaptureError::BufferLength {
                expected: 16,
                actual: 8
            })
        ));
        capture.release();
    }
}
