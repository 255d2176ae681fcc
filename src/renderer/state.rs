// renderer/state.rs
// Fixed-function GPU state, applied as a diff against what was last issued.

use crate::gpu::{Capability, CullFace, FrontFace, GraphicsApi};
use crate::material::{BlendState, Material};
use crate::scene::Renderable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderState {
    pub depth_test: bool,
    pub depth_mask: bool,
    pub cull_enabled: bool,
    pub cull_face: CullFace,
    pub front_face: FrontFace,
    /// `None` disables blending.
    pub blend: Option<BlendState>,
}

impl RenderState {
    pub fn for_draw(material: &Material, renderable: &Renderable, transparent_pass: bool) -> Self {
        Self {
            depth_test: material.depth_test,
            depth_mask: material.depth_mask,
            cull_enabled: renderable.cull_face_enabled,
            cull_face: renderable.cull_face,
            front_face: renderable.front_face,
            blend: transparent_pass.then(|| material.blend_mode().state()),
        }
    }
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            depth_test: true,
            depth_mask: true,
            cull_enabled: true,
            cull_face: CullFace::Back,
            front_face: FrontFace::Ccw,
            blend: None,
        }
    }
}

/// Remembers the last applied state so only changed values reach the GPU.
#[derive(Debug, Default)]
pub struct StateCache {
    current: Option<RenderState>,
}

impl StateCache {
    /// Forgets what was applied; the next `apply` issues everything.
    pub fn reset(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<&RenderState> {
        self.current.as_ref()
    }

    /// Issues GPU calls for every field of `state` that differs from the
    /// previous state. Returns the number of calls made.
    pub fn apply(&mut self, gl: &mut dyn GraphicsApi, state: RenderState) -> usize {
        let previous = self.current.replace(state);
        let mut calls = 0;
        let changed = |f: fn(&RenderState) -> bool| -> bool {
            previous.as_ref().map_or(true, |p| f(p) != f(&state))
        };

        if changed(|s| s.depth_test) {
            toggle(gl, Capability::DepthTest, state.depth_test);
            calls += 1;
        }
        if changed(|s| s.depth_mask) {
            gl.depth_mask(state.depth_mask);
            calls += 1;
        }
        if changed(|s| s.cull_enabled) {
            toggle(gl, Capability::CullFace, state.cull_enabled);
            calls += 1;
        }
        // Issued even while culling is off so `current` always mirrors the GPU.
        if previous.as_ref().map_or(true, |p| p.cull_face != state.cull_face) {
            gl.cull_face(state.cull_face);
            calls += 1;
        }
        if previous.as_ref().map_or(true, |p| p.front_face != state.front_face) {
            gl.front_face(state.front_face);
            calls += 1;
        }

        let previous_blend = previous.as_ref().map(|p| p.blend);
        if previous_blend != Some(state.blend) {
            let was_enabled = previous_blend.map(|b| b.is_some());
            let enabled = state.blend.is_some();
            if was_enabled != Some(enabled) {
                toggle(gl, Capability::Blend, enabled);
                calls += 1;
            }
            if let Some(blend) = state.blend {
                gl.blend_equation_separate(blend.equation_rgb, blend.equation_alpha);
                gl.blend_func_separate(blend.src_rgb, blend.dst_rgb, blend.src_alpha, blend.dst_alpha);
                calls += 2;
            }
        }

        calls
    }
}

fn toggle(gl: &mut dyn GraphicsApi, capability: Capability, on: bool) {
    if on {
        gl.enable(capability);
    } else {
        gl.disable(capability);
    }
}
