// renderer/renderer.rs
// Frame driver: clears, refreshes the scene, sorts the queues and issues draws.

use std::collections::BTreeSet;

use glam::{Mat3, Mat4};
use instant::Instant;

use super::culling::is_culled;
use super::matrices::MatrixSet;
use super::sort::{sort_opaque, sort_transparent};
use super::state::{RenderState, StateCache};
use super::stats::RenderStats;
use crate::asset::{Assets, Handle};
use crate::gpu::{BufferTarget, Capability, GraphicsApi, UniformData, Viewport};
use crate::material::Material;
use crate::scene::lights::light_uniform_components;
use crate::scene::{BoundingBox, Camera, LightGroupData, QueueItem, Scene};
use crate::settings::RendererSettings;
use crate::shader::{LightCounts, Shader, UniformDeclaration, UniformSemantic, LIGHT_UNIFORMS};

/// Per-call switches for [`Renderer::render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// The caller already ran `Scene::update` this frame.
    pub scene_updated: bool,
    pub clear: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            scene_updated: false,
            clear: true,
        }
    }
}

/// Camera-derived values shared by every draw of a frame.
struct FrameContext {
    view: Mat4,
    projection: Mat4,
    frustum: BoundingBox,
    near: f32,
    far: f32,
}

impl FrameContext {
    fn new(camera: &Camera, viewport: Viewport) -> Self {
        let aspect = viewport.aspect();
        Self {
            view: camera.view(),
            projection: camera.proj(aspect),
            frustum: camera.frustum_box(aspect),
            near: camera.near,
            far: camera.far,
        }
    }
}

/// What the previous draw left bound, so repeated work can be skipped.
#[derive(Debug, Default)]
struct DrawCursor {
    shader: Option<Handle<Shader>>,
    /// Light-count variant of `shader` that is bound.
    light_counts: Option<LightCounts>,
    material: Option<Handle<Material>>,
    light_group: Option<u32>,
}

pub struct Renderer<G: GraphicsApi> {
    gl: G,
    settings: RendererSettings,
    viewport: Viewport,
    device_pixel_ratio: f32,
    start: Instant,
    state: StateCache,
    enabled_attributes: BTreeSet<u32>,
    stats: RenderStats,
}

impl<G: GraphicsApi> Renderer<G> {
    pub fn new(gl: G, settings: RendererSettings) -> Self {
        let settings = settings.validate();
        let (width, height) = gl.drawing_buffer_size();
        let viewport = settings
            .viewport
            .map(Viewport::from)
            .unwrap_or_else(|| Viewport::new(0, 0, width, height));
        log::info!(
            "Renderer created for context {} ({}x{}, viewport {:?})",
            gl.context_id(),
            width,
            height,
            viewport
        );
        Self {
            device_pixel_ratio: settings.device_pixel_ratio,
            gl,
            settings,
            viewport,
            start: Instant::now(),
            state: StateCache::default(),
            enabled_attributes: BTreeSet::new(),
            stats: RenderStats::default(),
        }
    }

    pub fn gl(&self) -> &G {
        &self.gl
    }

    pub fn gl_mut(&mut self) -> &mut G {
        &mut self.gl
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Resets the viewport to cover a drawing buffer of the new size.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = Viewport::new(0, 0, width, height);
        log::debug!("Renderer resized to {}x{}", width, height);
    }

    pub fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }

    pub fn set_device_pixel_ratio(&mut self, ratio: f32) {
        if ratio.is_finite() && ratio > 0.0 {
            self.device_pixel_ratio = ratio;
        } else {
            log::warn!("Ignoring invalid device pixel ratio {}", ratio);
        }
    }

    /// Stats of the last rendered frame.
    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Releases every GPU object `assets` created in this renderer's context.
    pub fn dispose_context(&mut self, assets: &mut Assets) {
        assets.dispose_context(&mut self.gl);
        self.state.reset();
        self.enabled_attributes.clear();
    }

    // ------------------------------------------------------------------
    // Frame
    // ------------------------------------------------------------------

    /// Renders one frame of `scene` as seen from `camera`.
    pub fn render(
        &mut self,
        scene: &mut Scene,
        camera: &Camera,
        assets: &mut Assets,
        options: RenderOptions,
    ) -> RenderStats {
        self.stats.reset();
        self.state.reset();
        self.gl.viewport(self.viewport);

        if options.clear {
            self.clear();
        }

        if !options.scene_updated {
            scene.update(&assets.materials);
        }

        self.refresh_variants(scene, assets);

        let frame = FrameContext::new(camera, self.viewport);
        let (opaque, transparent) = scene.queues_mut();
        for item in transparent.iter_mut() {
            item.camera_z = (frame.view * item.world).w_axis.z;
        }
        sort_opaque(opaque, &assets.materials);
        sort_transparent(transparent, &assets.materials);
        let opaque = std::mem::take(opaque);
        let transparent = std::mem::take(transparent);

        self.draw_queue(&opaque, &frame, scene, assets, false);
        self.draw_queue(&transparent, &frame, scene, assets, true);

        let (opaque_slot, transparent_slot) = scene.queues_mut();
        *opaque_slot = opaque;
        *transparent_slot = transparent;

        log::trace!("Frame rendered: {:?}", self.stats);
        self.stats
    }

    /// Draws an explicit list of items, e.g. a queue the caller filtered.
    /// Stats accumulate onto the current frame's counters.
    pub fn render_queue(
        &mut self,
        queue: &[QueueItem],
        camera: &Camera,
        scene: &Scene,
        assets: &mut Assets,
        transparent: bool,
    ) -> RenderStats {
        let frame = FrameContext::new(camera, self.viewport);
        self.draw_queue(queue, &frame, scene, assets, transparent);
        self.stats
    }

    fn clear(&mut self) {
        let mask = self.settings.clear_mask();
        if mask.is_empty() {
            return;
        }
        let partial = self.viewport.is_partial(self.gl.drawing_buffer_size());
        if partial {
            self.gl.enable(Capability::ScissorTest);
            self.gl.scissor(self.viewport);
        }
        // Depth writes must be on or the depth clear is ignored.
        self.gl.depth_mask(true);
        self.gl.clear_color(self.settings.clear_color);
        self.gl.clear(mask);
        if partial {
            self.gl.disable(Capability::ScissorTest);
        }
    }

    /// Lets each material reconfigure its shader. Light counts are selected
    /// per draw since one shader may serve several light groups.
    fn refresh_variants(&self, scene: &Scene, assets: &mut Assets) {
        let (opaque, transparent) = (scene.opaque_queue(), scene.transparent_queue());
        for item in opaque.iter().chain(transparent) {
            let Some(material) = assets.materials.get(item.material()) else {
                continue;
            };
            let Some(shader) = material.shader().and_then(|h| assets.shaders.get_mut(h)) else {
                continue;
            };
            shader.set_precision(&self.settings.precision);
            shader.set_extensions(self.settings.extensions.as_slice());
            if let Some(selector) = material.selector() {
                selector.update_shader(material, shader);
            }
        }
    }

    fn draw_queue(
        &mut self,
        queue: &[QueueItem],
        frame: &FrameContext,
        scene: &Scene,
        assets: &mut Assets,
        transparent: bool,
    ) {
        let Assets {
            geometries,
            textures,
            shaders,
            materials,
        } = assets;
        let mut cursor = DrawCursor::default();

        for item in queue {
            self.stats.mesh_count += 1;

            let Some(material) = materials.get(item.material()) else {
                log::warn!("Renderable {:?} references a missing material", item.entity);
                continue;
            };
            let Some(shader_handle) = material.shader() else {
                log::debug!("Material `{}` has no shader, skipped", material.name);
                continue;
            };
            let (Some(shader), Some(geometry)) =
                (shaders.get_mut(shader_handle), geometries.get_mut(item.geometry()))
            else {
                log::warn!("Renderable {:?} references a missing asset", item.entity);
                continue;
            };

            let mut matrices = MatrixSet::new(item.world, frame.view, frame.projection);

            if item.renderable.frustum_culling && !item.skinned {
                if let Some(bbox) = geometry.bounding_box() {
                    if is_culled(bbox, &matrices.world_view(), &frame.projection, &frame.frustum) {
                        continue;
                    }
                }
            }

            let group = item.renderable.light_group;
            let counts = scene.light_counts(group);
            if cursor.shader != Some(shader_handle) || cursor.light_counts != Some(counts) {
                shader.set_light_counts(counts);
                if let Err(err) = shader.bind(&mut self.gl) {
                    log::debug!("Skipping {:?}: {}", item.entity, err);
                    cursor = DrawCursor::default();
                    continue;
                }
                cursor = DrawCursor {
                    shader: Some(shader_handle),
                    light_counts: Some(counts),
                    material: None,
                    light_group: None,
                };
                self.push_frame_uniforms(shader, frame, counts.total());
            }
            if cursor.light_group != Some(group) {
                push_light_uniforms(&mut self.gl, shader, scene.light_group(group));
                cursor.light_group = Some(group);
            }

            push_object_uniforms(&mut self.gl, shader, &mut matrices, scene, item);

            if cursor.material != Some(item.material()) {
                material.bind(&mut self.gl, shader, textures);
                cursor.material = Some(item.material());
            }

            self.state.apply(
                &mut self.gl,
                RenderState::for_draw(material, &item.renderable, transparent),
            );

            let vertex_count = geometry.vertex_count();
            let triangle_count = geometry.triangle_count();
            let chunks = match geometry.buffer_chunks(&mut self.gl) {
                Ok(chunks) => chunks,
                Err(err) => {
                    log::warn!("Failed to upload geometry {:?}: {}", item.geometry(), err);
                    continue;
                }
            };

            let mut enabled = BTreeSet::new();
            for (index, attribute) in shader.attributes().iter().enumerate() {
                let Some(buffer) = chunks.attributes.get(attribute.source_attribute()) else {
                    continue;
                };
                let index = index as u32;
                self.gl.bind_buffer(BufferTarget::Array, Some(buffer.buffer));
                if !self.enabled_attributes.contains(&index) {
                    self.gl.enable_vertex_attrib_array(index);
                }
                self.gl
                    .vertex_attrib_pointer_f32(index, buffer.components, 0, 0);
                enabled.insert(index);
            }
            for stale in self.enabled_attributes.difference(&enabled) {
                self.gl.disable_vertex_attrib_array(*stale);
            }
            self.enabled_attributes = enabled;

            match chunks.indices {
                Some(indices) => {
                    self.gl
                        .bind_buffer(BufferTarget::ElementArray, Some(indices.buffer));
                    self.gl.draw_elements(item.renderable.mode, indices.count, 0);
                }
                None => {
                    self.gl
                        .draw_arrays(item.renderable.mode, 0, vertex_count as u32);
                }
            }
            self.stats.record_draw(vertex_count, triangle_count);
        }
    }

    /// Semantics that stay constant for the whole frame, pushed once per
    /// program switch.
    fn push_frame_uniforms(&mut self, shader: &Shader, frame: &FrameContext, light_count: usize) {
        let viewport = self.viewport;
        let (buffer_width, buffer_height) = self.gl.drawing_buffer_size();
        let ratio = self.device_pixel_ratio;
        let time = self.start.elapsed().as_secs_f32();

        for decl in shader.semantic_uniforms() {
            let Some(semantic) = decl.semantic.filter(UniformSemantic::is_frame_constant) else {
                continue;
            };
            let values: Vec<f32> = match semantic {
                UniformSemantic::Viewport => vec![
                    viewport.x as f32,
                    viewport.y as f32,
                    viewport.width as f32,
                    viewport.height as f32,
                ],
                UniformSemantic::ViewportSize => {
                    vec![viewport.width as f32, viewport.height as f32]
                }
                UniformSemantic::WindowSize => {
                    vec![buffer_width as f32 / ratio, buffer_height as f32 / ratio]
                }
                UniformSemantic::DevicePixelRatio => vec![ratio],
                UniformSemantic::Near => vec![frame.near],
                UniformSemantic::Far => vec![frame.far],
                UniformSemantic::Time => vec![time],
                UniformSemantic::LightCount => vec![light_count as f32],
                UniformSemantic::Matrix(_) | UniformSemantic::SkinMatrix => continue,
            };
            push_values(&mut self.gl, shader, decl, &values);
        }
    }
}

fn push_values(gl: &mut dyn GraphicsApi, shader: &Shader, decl: &UniformDeclaration, values: &[f32]) {
    let components = decl.kind.components().min(4) as u8;
    if decl.kind.is_integer() {
        let ints: Vec<i32> = values.iter().map(|v| *v as i32).collect();
        shader.set_uniform(
            gl,
            &decl.symbol,
            UniformData::Int {
                components,
                values: &ints,
            },
        );
    } else {
        shader.set_uniform(
            gl,
            &decl.symbol,
            UniformData::Float {
                components,
                values,
            },
        );
    }
}

/// Light arrays of one group; symbols the group lacks are left untouched.
fn push_light_uniforms(gl: &mut dyn GraphicsApi, shader: &Shader, group: Option<&LightGroupData>) {
    let Some(group) = group else {
        return;
    };
    for symbol in LIGHT_UNIFORMS {
        if !shader.has_uniform(symbol) {
            continue;
        }
        if let Some(values) = group.uniform(symbol) {
            shader.set_uniform(
                gl,
                symbol,
                UniformData::Float {
                    components: light_uniform_components(symbol),
                    values,
                },
            );
        }
    }
}

/// Matrix and skinning semantics, which change with every object.
fn push_object_uniforms(
    gl: &mut dyn GraphicsApi,
    shader: &Shader,
    matrices: &mut MatrixSet,
    scene: &Scene,
    item: &QueueItem,
) {
    for decl in shader.semantic_uniforms() {
        match decl.semantic {
            Some(UniformSemantic::Matrix(semantic)) => {
                let matrix = matrices.get(semantic);
                push_matrix(gl, shader, decl, &matrix.to_cols_array());
            }
            Some(UniformSemantic::SkinMatrix) => {
                let Some(joints) = scene.skin(item.entity) else {
                    continue;
                };
                let values: Vec<f32> = joints.iter().flat_map(Mat4::to_cols_array).collect();
                shader.set_uniform(gl, &decl.symbol, UniformData::Matrix { dim: 4, values: &values });
            }
            _ => {}
        }
    }
}

fn push_matrix(gl: &mut dyn GraphicsApi, shader: &Shader, decl: &UniformDeclaration, cols: &[f32; 16]) {
    match decl.kind.matrix_dim() {
        Some(3) => {
            let upper = Mat3::from_mat4(Mat4::from_cols_array(cols)).to_cols_array();
            shader.set_uniform(gl, &decl.symbol, UniformData::Matrix { dim: 3, values: &upper });
        }
        _ => {
            shader.set_uniform(gl, &decl.symbol, UniformData::Matrix { dim: 4, values: cols });
        }
    }
}
