use std::num::NonZeroU64;

use crate::error::{RenderError, RenderResult};

/// Rounds `size` up to the next multiple of `alignment`.
pub(crate) fn aligned_stride(size: u64, alignment: u64) -> u64 {
    let alignment = alignment.max(1);
    size.div_ceil(alignment) * alignment
}

/// Uniform buffer holding one block per pass (or per draw), addressed with
/// dynamic offsets. Blocks are staged on the CPU while a frame is recorded
/// and uploaded in one write before submission.
pub(crate) struct UniformRing {
    label: &'static str,
    item_size: u64,
    stride: u64,
    capacity: u32,
    used: u32,
    staging: Vec<u8>,
    pub(crate) buffer: wgpu::Buffer,
    pub(crate) bind_group: wgpu::BindGroup,
}

impl UniformRing {
    pub(crate) fn layout(
        device: &wgpu::Device,
        label: &'static str,
        item_size: u64,
    ) -> wgpu::BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(item_size),
                },
                count: None,
            }],
        })
    }

    pub(crate) fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        label: &'static str,
        item_size: u64,
        capacity: u32,
    ) -> Self {
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let stride = aligned_stride(item_size, alignment);
        let capacity = capacity.max(1);
        let (buffer, bind_group) =
            Self::allocate(device, layout, label, item_size, stride, capacity);

        Self {
            label,
            item_size,
            stride,
            capacity,
            used: 0,
            staging: Vec::with_capacity((stride * capacity as u64) as usize),
            buffer,
            bind_group,
        }
    }

    fn allocate(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        label: &'static str,
        item_size: u64,
        stride: u64,
        capacity: u32,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: stride * capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(item_size),
                }),
            }],
        });
        (buffer, bind_group)
    }

    /// Starts a new frame, growing the buffer so `required` blocks fit.
    pub(crate) fn begin_frame(
        &mut self,
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        required: u32,
    ) {
        self.used = 0;
        self.staging.clear();

        if required > self.capacity {
            let new_capacity = required.max(self.capacity * 2);
            log::info!(
                "Growing {} buffer: {} -> {}",
                self.label,
                self.capacity,
                new_capacity
            );
            let (buffer, bind_group) = Self::allocate(
                device,
                layout,
                self.label,
                self.item_size,
                self.stride,
                new_capacity,
            );
            self.buffer = buffer;
            self.bind_group = bind_group;
            self.capacity = new_capacity;
        }
    }

    /// Stages one block and returns its dynamic offset.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> RenderResult<u32> {
        if self.used >= self.capacity {
            return Err(RenderError::InvalidState(format!(
                "{} exceeded the frame budget of {} blocks",
                self.label, self.capacity
            )));
        }
        let offset = self.used as u64 * self.stride;
        self.staging.resize(offset as usize, 0);
        self.staging.extend_from_slice(bytes);
        self.used += 1;
        Ok(offset as u32)
    }

    pub(crate) fn flush(&mut self, queue: &wgpu::Queue) {
        if !self.staging.is_empty() {
            queue.write_buffer(&self.buffer, 0, &self.staging);
        }
    }

    pub(crate) fn discard(&mut self) {
        self.used = 0;
        self.staging.clear();
    }
}
