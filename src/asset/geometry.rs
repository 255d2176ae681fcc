// asset/geometry.rs
// CPU-side vertex data plus the per-context GPU buffers uploaded from it.

use std::collections::{BTreeMap, HashMap};
use std::f32::consts::PI;

use glam::Vec3;

use crate::cache::ContextCache;
use crate::gpu::{BufferId, BufferTarget, GraphicsApi};
use crate::scene::BoundingBox;

const BUFFERS: &str = "buffers";

pub const POSITION: &str = "position";
pub const NORMAL: &str = "normal";
pub const TEXCOORD0: &str = "texcoord0";

#[derive(Debug, Clone, PartialEq)]
pub struct VertexAttribute {
    /// Floats per vertex (1-4).
    pub components: u32,
    pub values: Vec<f32>,
}

impl VertexAttribute {
    pub fn vertex_count(&self) -> usize {
        if self.components == 0 {
            0
        } else {
            self.values.len() / self.components as usize
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeBuffer {
    pub buffer: BufferId,
    pub components: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexBuffer {
    pub buffer: BufferId,
    pub count: u32,
}

/// Buffers uploaded for one context.
#[derive(Debug, Default)]
pub struct BufferChunks {
    pub attributes: HashMap<String, AttributeBuffer>,
    pub indices: Option<IndexBuffer>,
}

impl BufferChunks {
    fn release(self, gl: &mut dyn GraphicsApi) {
        for attribute in self.attributes.into_values() {
            gl.delete_buffer(attribute.buffer);
        }
        if let Some(indices) = self.indices {
            gl.delete_buffer(indices.buffer);
        }
    }
}

#[derive(Debug, Default)]
pub struct Geometry {
    attributes: BTreeMap<String, VertexAttribute>,
    indices: Option<Vec<u32>>,
    bounding_box: Option<BoundingBox>,
    cache: ContextCache<BufferChunks>,
}

impl Geometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: &str, components: u32, values: Vec<f32>) -> Self {
        self.set_attribute(name, components, values);
        self
    }

    pub fn with_indices(mut self, indices: Vec<u32>) -> Self {
        self.set_indices(Some(indices));
        self
    }

    pub fn set_attribute(&mut self, name: &str, components: u32, values: Vec<f32>) {
        self.attributes
            .insert(name.to_string(), VertexAttribute { components, values });
        self.cache.dirty_all(BUFFERS);
    }

    pub fn attribute(&self, name: &str) -> Option<&VertexAttribute> {
        self.attributes.get(name)
    }

    pub fn set_indices(&mut self, indices: Option<Vec<u32>>) {
        self.indices = indices;
        self.cache.dirty_all(BUFFERS);
    }

    pub fn indices(&self) -> Option<&[u32]> {
        self.indices.as_deref()
    }

    pub fn is_indexed(&self) -> bool {
        self.indices.is_some()
    }

    pub fn vertex_count(&self) -> usize {
        self.attributes
            .get(POSITION)
            .map(VertexAttribute::vertex_count)
            .unwrap_or(0)
    }

    pub fn triangle_count(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len() / 3,
            None => self.vertex_count() / 3,
        }
    }

    pub fn bounding_box(&self) -> Option<&BoundingBox> {
        self.bounding_box.as_ref()
    }

    pub fn set_bounding_box(&mut self, bounding_box: Option<BoundingBox>) {
        self.bounding_box = bounding_box;
    }

    /// Recomputes the bounding box from the position attribute.
    pub fn update_bounding_box(&mut self) {
        self.bounding_box = self.attributes.get(POSITION).and_then(|position| {
            let stride = position.components.max(1) as usize;
            BoundingBox::from_points(position.values.chunks_exact(stride).map(|p| {
                Vec3::new(
                    p[0],
                    p.get(1).copied().unwrap_or(0.0),
                    p.get(2).copied().unwrap_or(0.0),
                )
            }))
        });
    }

    /// Buffers for `gl`'s context, uploading them first if the data changed.
    pub fn buffer_chunks(&mut self, gl: &mut dyn GraphicsApi) -> Result<&BufferChunks, String> {
        self.cache.use_context(gl.context_id());
        if self.cache.is_dirty(BUFFERS) {
            let stale = std::mem::take(self.cache.get_mut());
            stale.release(gl);

            let chunks = self.upload(gl)?;
            self.cache.put(chunks);
            self.cache.fresh(BUFFERS);
        }
        Ok(self.cache.get_mut())
    }

    fn upload(&self, gl: &mut dyn GraphicsApi) -> Result<BufferChunks, String> {
        let mut chunks = BufferChunks::default();
        for (name, attribute) in &self.attributes {
            let buffer = gl.create_buffer()?;
            gl.bind_buffer(BufferTarget::Array, Some(buffer));
            gl.buffer_data(BufferTarget::Array, bytemuck::cast_slice(&attribute.values));
            chunks.attributes.insert(
                name.clone(),
                AttributeBuffer {
                    buffer,
                    components: attribute.components,
                },
            );
        }
        if let Some(indices) = &self.indices {
            let buffer = gl.create_buffer()?;
            gl.bind_buffer(BufferTarget::ElementArray, Some(buffer));
            gl.buffer_data(BufferTarget::ElementArray, bytemuck::cast_slice(indices));
            chunks.indices = Some(IndexBuffer {
                buffer,
                count: indices.len() as u32,
            });
        }
        log::debug!(
            "Uploaded geometry: {} attributes, {} vertices",
            chunks.attributes.len(),
            self.vertex_count()
        );
        Ok(chunks)
    }

    /// Releases the buffers uploaded for `gl`'s context.
    pub fn dispose(&mut self, gl: &mut dyn GraphicsApi) {
        if let Some(chunks) = self.cache.take_context(gl.context_id()) {
            chunks.release(gl);
        }
    }

    // ------------------------------------------------------------------
    // Primitives
    // ------------------------------------------------------------------

    /// Unit cube centred at the origin, 24 vertices with per-face normals.
    pub fn cube() -> Self {
        const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            // normal, u axis, v axis
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ];

        let mut positions = Vec::with_capacity(72);
        let mut normals = Vec::with_capacity(72);
        let mut uvs = Vec::with_capacity(48);
        let mut indices = Vec::with_capacity(36);

        for (face, (n, u, v)) in FACES.iter().enumerate() {
            let (n, u, v) = (Vec3::from(*n), Vec3::from(*u), Vec3::from(*v));
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let p = (n + u * su + v * sv) * 0.5;
                positions.extend_from_slice(&p.to_array());
                normals.extend_from_slice(&n.to_array());
                uvs.extend_from_slice(&[(su + 1.0) * 0.5, (sv + 1.0) * 0.5]);
            }
            let base = face as u32 * 4;
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        let mut geometry = Self::new()
            .with_attribute(POSITION, 3, positions)
            .with_attribute(NORMAL, 3, normals)
            .with_attribute(TEXCOORD0, 2, uvs)
            .with_indices(indices);
        geometry.update_bounding_box();
        geometry
    }

    /// Unit quad in the XY plane facing +Z.
    pub fn plane() -> Self {
        let mut geometry = Self::new()
            .with_attribute(
                POSITION,
                3,
                vec![-0.5, -0.5, 0.0, 0.5, -0.5, 0.0, 0.5, 0.5, 0.0, -0.5, 0.5, 0.0],
            )
            .with_attribute(NORMAL, 3, [0.0, 0.0, 1.0].repeat(4))
            .with_attribute(TEXCOORD0, 2, vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0])
            .with_indices(vec![0, 1, 2, 0, 2, 3]);
        geometry.update_bounding_box();
        geometry
    }

    /// UV sphere of radius 1.
    pub fn sphere(segments: u32, rings: u32) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);
        let mut positions = Vec::new();
        let mut uvs = Vec::new();
        let mut indices = Vec::new();

        for ring in 0..=rings {
            let phi = PI * ring as f32 / rings as f32;
            let (y, ring_radius) = (phi.cos(), phi.sin());
            for segment in 0..=segments {
                let theta = 2.0 * PI * segment as f32 / segments as f32;
                positions.extend_from_slice(&[ring_radius * theta.cos(), y, ring_radius * theta.sin()]);
                uvs.extend_from_slice(&[
                    segment as f32 / segments as f32,
                    ring as f32 / rings as f32,
                ]);
            }
        }
        for ring in 0..rings {
            for segment in 0..segments {
                let current = ring * (segments + 1) + segment;
                let next = current + segments + 1;
                indices.extend_from_slice(&[current, next, current + 1, current + 1, next, next + 1]);
            }
        }

        let normals = positions.clone();
        let mut geometry = Self::new()
            .with_attribute(POSITION, 3, positions)
            .with_attribute(NORMAL, 3, normals)
            .with_attribute(TEXCOORD0, 2, uvs)
            .with_indices(indices);
        geometry.update_bounding_box();
        geometry
    }
}
