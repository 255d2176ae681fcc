// renderer/sort.rs
// Queue ordering that groups draws by program, then material, then geometry.

use std::cmp::Ordering;

use crate::asset::AssetCache;
use crate::material::Material;
use crate::scene::QueueItem;

fn shader_index(item: &QueueItem, materials: &AssetCache<Material>) -> usize {
    materials
        .get(item.material())
        .and_then(Material::shader)
        .map(|handle| handle.index())
        .unwrap_or(usize::MAX)
}

fn by_state(a: &QueueItem, b: &QueueItem, materials: &AssetCache<Material>) -> Ordering {
    shader_index(a, materials)
        .cmp(&shader_index(b, materials))
        .then_with(|| a.material().cmp(&b.material()))
        .then_with(|| a.geometry().cmp(&b.geometry()))
}

/// `(render_order, shader, material, geometry)`.
pub fn opaque_order(a: &QueueItem, b: &QueueItem, materials: &AssetCache<Material>) -> Ordering {
    a.renderable
        .render_order
        .cmp(&b.renderable.render_order)
        .then_with(|| by_state(a, b, materials))
}

/// `(render_order, camera_z, shader, material, geometry)`. Camera space looks
/// down -Z, so ascending z draws the farthest object first.
pub fn transparent_order(
    a: &QueueItem,
    b: &QueueItem,
    materials: &AssetCache<Material>,
) -> Ordering {
    a.renderable
        .render_order
        .cmp(&b.renderable.render_order)
        .then_with(|| a.camera_z.total_cmp(&b.camera_z))
        .then_with(|| by_state(a, b, materials))
}

pub fn sort_opaque(queue: &mut [QueueItem], materials: &AssetCache<Material>) {
    queue.sort_by(|a, b| opaque_order(a, b, materials));
}

pub fn sort_transparent(queue: &mut [QueueItem], materials: &AssetCache<Material>) {
    queue.sort_by(|a, b| transparent_order(a, b, materials));
}
