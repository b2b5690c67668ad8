use std::sync::Mutex;

use crate::{
    backend::{BackendKind, FilterBackend},
    filters,
    foundation::core::{Frame, GrayPlane},
    foundation::error::{VidstyleError, VidstyleResult},
};

const WORKGROUP_SIZE: u32 = 16;
const PARAMS_SIZE: u64 = 32;

const SHADER: &str = r#"
struct Params {
  width: u32,
  height: u32,
  radius: u32,
  horizontal: u32,
  space_coeff: f32,
  color_coeff: f32,
  _pad0: f32,
  _pad1: f32,
};

@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var<storage, read> src: array<u32>;
@group(0) @binding(2) var<storage, read_write> dst: array<u32>;
@group(0) @binding(3) var<storage, read> weights: array<f32>;

fn load(x: i32, y: i32) -> u32 {
  let cx = clamp(x, 0, i32(params.width) - 1);
  let cy = clamp(y, 0, i32(params.height) - 1);
  return src[u32(cy) * params.width + u32(cx)];
}

fn unpack_rgb(p: u32) -> vec3<f32> {
  return vec3<f32>(f32(p & 0xffu), f32((p >> 8u) & 0xffu), f32((p >> 16u) & 0xffu));
}

fn pack_rgb(c: vec3<f32>) -> u32 {
  let q = vec3<u32>(clamp(round(c), vec3<f32>(0.0), vec3<f32>(255.0)));
  return q.x | (q.y << 8u) | (q.z << 16u);
}

@compute @workgroup_size(16, 16)
fn blur_gray(@builtin(global_invocation_id) gid: vec3<u32>) {
  if (gid.x >= params.width || gid.y >= params.height) {
    return;
  }
  let r = i32(params.radius);
  var acc = 0.0;
  for (var k = -r; k <= r; k = k + 1) {
    var v: u32;
    if (params.horizontal == 1u) {
      v = load(i32(gid.x) + k, i32(gid.y));
    } else {
      v = load(i32(gid.x), i32(gid.y) + k);
    }
    acc = acc + weights[u32(k + r)] * f32(v);
  }
  dst[gid.y * params.width + gid.x] = u32(clamp(round(acc), 0.0, 255.0));
}

@compute @workgroup_size(16, 16)
fn bilateral_rgb(@builtin(global_invocation_id) gid: vec3<u32>) {
  if (gid.x >= params.width || gid.y >= params.height) {
    return;
  }
  let r = i32(params.radius);
  let center = unpack_rgb(load(i32(gid.x), i32(gid.y)));
  var acc = vec3<f32>(0.0);
  var wsum = 0.0;
  for (var dy = -r; dy <= r; dy = dy + 1) {
    for (var dx = -r; dx <= r; dx = dx + 1) {
      let r2 = f32(dx * dx + dy * dy);
      if (sqrt(r2) > f32(r)) {
        continue;
      }
      let px = unpack_rgb(load(i32(gid.x) + dx, i32(gid.y) + dy));
      let diff = px - center;
      let w = exp(r2 * params.space_coeff + dot(diff, diff) * params.color_coeff);
      acc = acc + w * px;
      wsum = wsum + w;
    }
  }
  dst[gid.y * params.width + gid.x] = pack_rgb(acc / wsum);
}
"#;

struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    layout: wgpu::BindGroupLayout,
    blur: wgpu::ComputePipeline,
    bilateral: wgpu::ComputePipeline,
}

/// Accelerated backend running the blur and bilateral kernels as compute shaders.
///
/// The device is shared by every worker of a run; the mutex serializes all device access.
/// Edge-preserving smoothing is a sequential recursion per row and stays on the CPU path.
pub struct GpuBackend {
    adapter_name: String,
    ctx: Mutex<GpuContext>,
}

struct Pass<'a> {
    pipeline: &'a wgpu::ComputePipeline,
    params: [u8; PARAMS_SIZE as usize],
    src: &'a wgpu::Buffer,
    dst: &'a wgpu::Buffer,
}

impl GpuBackend {
    /// Requests an adapter and device and compiles the pipelines. Fails when no adapter
    /// is available.
    pub fn probe() -> VidstyleResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| match e {
            wgpu::RequestAdapterError::NotFound { .. } => {
                gpu_error("no gpu adapter available".to_string())
            }
            other => gpu_error(format!("wgpu request_adapter failed: {other:?}")),
        })?;
        let adapter_name = adapter.get_info().name;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("vidstyle_device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| gpu_error(format!("wgpu request_device failed: {e:?}")))?;

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("vidstyle_filter_bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(PARAMS_SIZE),
                    },
                    count: None,
                },
                storage_entry(1, true),
                storage_entry(2, false),
                storage_entry(3, true),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("vidstyle_filter_pl"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("vidstyle_filter_shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let make_pipeline = |entry: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some(entry),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            })
        };
        let blur = make_pipeline("blur_gray");
        let bilateral = make_pipeline("bilateral_rgb");

        tracing::info!(adapter = %adapter_name, "gpu backend ready");
        Ok(Self {
            adapter_name,
            ctx: Mutex::new(GpuContext {
                device,
                queue,
                layout,
                blur,
                bilateral,
            }),
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    fn lock(&self) -> VidstyleResult<std::sync::MutexGuard<'_, GpuContext>> {
        self.ctx
            .lock()
            .map_err(|_| gpu_error("gpu context lock poisoned".to_string()))
    }
}

impl FilterBackend for GpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Gpu
    }

    fn gaussian_blur(&self, plane: &GrayPlane, ksize: u32) -> VidstyleResult<GrayPlane> {
        if ksize.is_multiple_of(2) {
            return Err(VidstyleError::validation(format!(
                "gaussian kernel size must be odd, got {ksize}"
            )));
        }
        let radius = ksize / 2;
        if radius == 0 {
            return Ok(plane.clone());
        }
        let ctx = self.lock()?;
        if !ctx.fits(plane.data.len()) {
            drop(ctx);
            return filters::blur::gaussian_blur_gray(plane, ksize);
        }

        let weights = filters::blur::gaussian_weights(radius, filters::blur::sigma_for_ksize(ksize))?;
        let words: Vec<u32> = plane.data.iter().map(|&v| u32::from(v)).collect();
        let src = ctx.storage_buffer("vidstyle_blur_src", &words);
        let tmp = ctx.storage_buffer("vidstyle_blur_tmp", &vec![0u32; words.len()]);
        let dst = ctx.storage_buffer("vidstyle_blur_dst", &vec![0u32; words.len()]);
        let weight_words: Vec<u32> = weights.iter().map(|w| w.to_bits()).collect();
        let weight_buf = ctx.storage_buffer("vidstyle_blur_weights", &weight_words);

        let out = ctx.run(
            &[
                Pass {
                    pipeline: &ctx.blur,
                    params: encode_params(plane.width, plane.height, radius, true, 0.0, 0.0),
                    src: &src,
                    dst: &tmp,
                },
                Pass {
                    pipeline: &ctx.blur,
                    params: encode_params(plane.width, plane.height, radius, false, 0.0, 0.0),
                    src: &tmp,
                    dst: &dst,
                },
            ],
            &weight_buf,
            plane.width,
            plane.height,
        )?;

        GrayPlane::new(
            plane.width,
            plane.height,
            out.into_iter().map(|v| v.min(255) as u8).collect(),
        )
    }

    fn bilateral(
        &self,
        frame: &Frame,
        diameter: u32,
        sigma_color: f32,
        sigma_space: f32,
    ) -> VidstyleResult<Frame> {
        if !(sigma_color > 0.0 && sigma_space > 0.0) {
            return Err(VidstyleError::validation(
                "bilateral sigmas must be finite and > 0",
            ));
        }
        let radius = diameter / 2;
        if radius == 0 {
            return Ok(frame.clone());
        }
        let ctx = self.lock()?;
        let pixels = frame.dimensions().pixel_count();
        if !ctx.fits(pixels) {
            drop(ctx);
            return filters::bilateral::bilateral_filter(frame, diameter, sigma_color, sigma_space);
        }

        let words: Vec<u32> = frame
            .data
            .chunks_exact(Frame::CHANNELS)
            .map(|px| u32::from(px[0]) | (u32::from(px[1]) << 8) | (u32::from(px[2]) << 16))
            .collect();
        let src = ctx.storage_buffer("vidstyle_bilateral_src", &words);
        let dst = ctx.storage_buffer("vidstyle_bilateral_dst", &vec![0u32; words.len()]);
        let unused_weights = ctx.storage_buffer("vidstyle_bilateral_weights", &[0u32]);

        let space_coeff = -0.5 / (sigma_space * sigma_space);
        let color_coeff = -0.5 / (sigma_color * sigma_color);
        let out = ctx.run(
            &[Pass {
                pipeline: &ctx.bilateral,
                params: encode_params(
                    frame.width,
                    frame.height,
                    radius,
                    false,
                    space_coeff,
                    color_coeff,
                ),
                src: &src,
                dst: &dst,
            }],
            &unused_weights,
            frame.width,
            frame.height,
        )?;

        let mut data = Vec::with_capacity(pixels * Frame::CHANNELS);
        for v in out {
            data.extend_from_slice(&[
                (v & 0xff) as u8,
                ((v >> 8) & 0xff) as u8,
                ((v >> 16) & 0xff) as u8,
            ]);
        }
        Frame::new(frame.width, frame.height, data)
    }
}

impl GpuContext {
    fn fits(&self, words: usize) -> bool {
        let bytes = (words as u64).saturating_mul(4);
        bytes <= u64::from(self.device.limits().max_storage_buffer_binding_size)
    }

    fn storage_buffer(&self, label: &str, words: &[u32]) -> wgpu::Buffer {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: bytes.len() as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        self.queue.write_buffer(&buffer, 0, &bytes);
        buffer
    }

    /// Encodes `passes` in order, then reads back the last pass's destination.
    fn run(
        &self,
        passes: &[Pass<'_>],
        weights: &wgpu::Buffer,
        width: u32,
        height: u32,
    ) -> VidstyleResult<Vec<u32>> {
        let last = passes
            .last()
            .ok_or_else(|| gpu_error("no gpu passes to run".to_string()))?;
        let size = last.dst.size();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("vidstyle_filter_encoder"),
            });

        // One uniform buffer per pass: writes land before the submission, not between passes.
        let mut keep_alive = Vec::with_capacity(passes.len());
        for pass in passes {
            let params = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("vidstyle_filter_params"),
                size: PARAMS_SIZE,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.queue.write_buffer(&params, 0, &pass.params);

            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("vidstyle_filter_bg"),
                layout: &self.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: params.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: pass.src.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: pass.dst.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: weights.as_entire_binding(),
                    },
                ],
            });

            {
                let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("vidstyle_filter_pass"),
                    timestamp_writes: None,
                });
                cpass.set_pipeline(pass.pipeline);
                cpass.set_bind_group(0, &bind_group, &[]);
                cpass.dispatch_workgroups(
                    width.div_ceil(WORKGROUP_SIZE),
                    height.div_ceil(WORKGROUP_SIZE),
                    1,
                );
            }
            keep_alive.push((params, bind_group));
        }

        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("vidstyle_readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        encoder.copy_buffer_to_buffer(last.dst, 0, &readback, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| gpu_error(format!("wgpu poll failed: {e:?}")))?;
        rx.recv()
            .map_err(|_| gpu_error("readback channel closed".to_string()))?
            .map_err(|e| gpu_error(format!("readback map failed: {e:?}")))?;

        let mapped = slice.get_mapped_range();
        let out = mapped
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        drop(mapped);
        readback.unmap();
        drop(keep_alive);
        Ok(out)
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn encode_params(
    width: u32,
    height: u32,
    radius: u32,
    horizontal: bool,
    space_coeff: f32,
    color_coeff: f32,
) -> [u8; PARAMS_SIZE as usize] {
    let mut out = [0u8; PARAMS_SIZE as usize];
    let fields = [
        width,
        height,
        radius,
        u32::from(horizontal),
        space_coeff.to_bits(),
        color_coeff.to_bits(),
        0,
        0,
    ];
    for (chunk, v) in out.chunks_exact_mut(4).zip(fields) {
        chunk.copy_from_slice(&v.to_le_bytes());
    }
    out
}

fn gpu_error(msg: String) -> VidstyleError {
    VidstyleError::Other(anyhow::anyhow!(msg))
}
