// renderer/stats.rs

/// Counters for the last rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub triangle_count: u32,
    pub vertex_count: u32,
    pub draw_call_count: u32,
    /// Renderables submitted to the executor, culled or not.
    pub mesh_count: u32,
    pub rendered_mesh_count: u32,
}

impl RenderStats {
    pub fn culled_mesh_count(&self) -> u32 {
        self.mesh_count - self.rendered_mesh_count
    }

    pub(crate) fn record_draw(&mut self, vertices: usize, triangles: usize) {
        self.draw_call_count += 1;
        self.rendered_mesh_count += 1;
        self.vertex_count += vertices as u32;
        self.triangle_count += triangles as u32;
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}
