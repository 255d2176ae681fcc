// scene/scene.rs
// hecs world plus the render queues and light tables rebuilt on update.

use std::collections::BTreeMap;

use glam::Mat4;
use hecs::{Entity, World};

use super::components::*;
use super::lights::LightGroupData;
use crate::asset::{AssetCache, Geometry, Handle};
use crate::material::Material;
use crate::scene::Transform;
use crate::shader::LightCounts;

/// One renderable as seen by a single frame.
#[derive(Debug, Clone, Copy)]
pub struct QueueItem {
    pub entity: Entity,
    pub renderable: Renderable,
    pub world: Mat4,
    pub skinned: bool,
    /// View-space z of the object's origin. Filled in by the renderer for
    /// transparent items before sorting.
    pub camera_z: f32,
}

impl QueueItem {
    pub fn geometry(&self) -> Handle<Geometry> {
        self.renderable.geometry
    }

    pub fn material(&self) -> Handle<Material> {
        self.renderable.material
    }
}

#[derive(Default)]
pub struct Scene {
    pub world: World,
    opaque: Vec<QueueItem>,
    transparent: Vec<QueueItem>,
    light_groups: BTreeMap<u32, LightGroupData>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Building
    // ------------------------------------------------------------------

    pub fn add_node(&mut self, transform: Transform) -> Entity {
        self.world
            .spawn((TransformComponent::new(transform), Visible::default()))
    }

    pub fn add_mesh(&mut self, transform: Transform, renderable: Renderable) -> Entity {
        self.world.spawn((
            TransformComponent::new(transform),
            Visible::default(),
            renderable,
        ))
    }

    /// Spawns a light node. `light` is one of the light components.
    pub fn add_light<L: hecs::Component>(&mut self, transform: Transform, light: L) -> Entity {
        self.world
            .spawn((TransformComponent::new(transform), Visible::default(), light))
    }

    /// Moves `child` under `parent`, detaching it from any previous parent.
    pub fn set_parent(&mut self, child: Entity, parent: Option<Entity>) {
        if let Ok(old) = self.world.get::<&Parent>(child).map(|p| p.0) {
            if let Ok(mut children) = self.world.get::<&mut Children>(old) {
                children.0.retain(|c| *c != child);
            }
        }

        match parent {
            Some(parent) => {
                let has_children = self.world.get::<&Children>(parent).is_ok();
                if has_children {
                    if let Ok(mut children) = self.world.get::<&mut Children>(parent) {
                        children.0.push(child);
                    }
                } else if let Err(e) = self.world.insert_one(parent, Children(vec![child])) {
                    log::error!("Failed to attach child to {:?}: {:?}", parent, e);
                    return;
                }
                if let Err(e) = self.world.insert_one(child, Parent(parent)) {
                    log::error!("Failed to set parent of {:?}: {:?}", child, e);
                }
            }
            None => {
                let _ = self.world.remove_one::<Parent>(child);
            }
        }

        if let Ok(mut transform) = self.world.get::<&mut TransformComponent>(child) {
            transform.mark_dirty();
        }
    }

    pub fn set_transform(&mut self, entity: Entity, transform: Transform) {
        if let Ok(mut component) = self.world.get::<&mut TransformComponent>(entity) {
            component.set(transform);
        }
    }

    pub fn set_visible(&mut self, entity: Entity, visible: bool) {
        let updated = match self.world.get::<&mut Visible>(entity) {
            Ok(mut component) => {
                component.0 = visible;
                true
            }
            Err(_) => false,
        };
        if !updated {
            if let Err(e) = self.world.insert_one(entity, Visible(visible)) {
                log::error!("Failed to set visibility of {:?}: {:?}", entity, e);
            }
        }
    }

    pub fn set_skin(&mut self, entity: Entity, joints: Vec<Mat4>) {
        if let Err(e) = self.world.insert_one(entity, Skin(joints)) {
            log::error!("Failed to set skin of {:?}: {:?}", entity, e);
        }
    }

    pub fn world_transform(&self, entity: Entity) -> Option<Mat4> {
        self.world.get::<&WorldTransform>(entity).ok().map(|w| w.0)
    }

    // ------------------------------------------------------------------
    // Per-frame update
    // ------------------------------------------------------------------

    /// Recomputes stale world matrices and rebuilds the render queues and
    /// light tables in one depth-first walk.
    pub fn update(&mut self, materials: &AssetCache<Material>) {
        self.opaque.clear();
        self.transparent.clear();
        self.light_groups.clear();

        let mut roots: Vec<Entity> = self
            .world
            .query::<&TransformComponent>()
            .without::<&Parent>()
            .iter()
            .map(|(entity, _)| entity)
            .collect();
        roots.sort_by_key(|e| e.to_bits());

        // (entity, parent world matrix, ancestor changed, ancestors visible)
        let mut stack: Vec<(Entity, Mat4, bool, bool)> = Vec::new();
        let mut recomputed = 0usize;

        for root in roots {
            stack.push((root, Mat4::IDENTITY, false, true));

            while let Some((entity, parent_world, parent_changed, parent_visible)) = stack.pop() {
                let Some((world, changed)) = self.update_world(entity, parent_world, parent_changed)
                else {
                    continue;
                };
                if changed {
                    recomputed += 1;
                }

                // Hidden subtrees keep their matrices current but stay out of the queues.
                let visible = parent_visible
                    && self
                        .world
                        .get::<&Visible>(entity)
                        .map(|v| v.0)
                        .unwrap_or(true);
                if visible {
                    self.collect(entity, world, materials);
                }

                if let Ok(children) = self.world.get::<&Children>(entity) {
                    for &child in children.0.iter().rev() {
                        stack.push((child, world, changed, visible));
                    }
                }
            }
        }

        log::trace!(
            "Scene update: {} world matrices recomputed, {} opaque, {} transparent",
            recomputed,
            self.opaque.len(),
            self.transparent.len()
        );
    }

    /// Returns the entity's world matrix, recomputing it if it or an ancestor changed.
    fn update_world(
        &mut self,
        entity: Entity,
        parent_world: Mat4,
        parent_changed: bool,
    ) -> Option<(Mat4, bool)> {
        let (local, dirty) = match self.world.get::<&TransformComponent>(entity) {
            Ok(t) => (t.get().matrix(), t.is_dirty()),
            Err(_) => {
                log::trace!("Entity {:?} has no TransformComponent, skipping", entity);
                return None;
            }
        };

        let cached = self.world.get::<&WorldTransform>(entity).ok().map(|w| w.0);
        match cached {
            Some(world) if !dirty && !parent_changed => Some((world, false)),
            _ => {
                let world = parent_world * local;
                if cached.is_some() {
                    if let Ok(mut wt) = self.world.get::<&mut WorldTransform>(entity) {
                        wt.0 = world;
                    }
                } else if let Err(e) = self.world.insert_one(entity, WorldTransform(world)) {
                    log::error!(
                        "Failed to insert WorldTransform for entity {:?}: {:?}",
                        entity,
                        e
                    );
                }
                if let Ok(mut t) = self.world.get::<&mut TransformComponent>(entity) {
                    t.clear_dirty();
                }
                Some((world, true))
            }
        }
    }

    fn collect(&mut self, entity: Entity, world: Mat4, materials: &AssetCache<Material>) {
        if let Ok(renderable) = self.world.get::<&Renderable>(entity) {
            let renderable = *renderable;
            let skinned = self.world.get::<&Skin>(entity).is_ok();
            let item = QueueItem {
                entity,
                renderable,
                world,
                skinned,
                camera_z: 0.0,
            };
            let transparent = materials
                .get(renderable.material)
                .is_some_and(|m| m.transparent);
            if transparent {
                self.transparent.push(item);
            } else {
                self.opaque.push(item);
            }
        }

        let group = self
            .world
            .get::<&LightGroup>(entity)
            .map(|g| g.0)
            .unwrap_or(0);
        if let Ok(light) = self.world.get::<&AmbientLight>(entity) {
            self.light_groups.entry(group).or_default().add_ambient(&light);
        }
        if let Ok(light) = self.world.get::<&DirectionalLight>(entity) {
            self.light_groups
                .entry(group)
                .or_default()
                .add_directional(&light, &world);
        }
        if let Ok(light) = self.world.get::<&PointLight>(entity) {
            self.light_groups
                .entry(group)
                .or_default()
                .add_point(&light, &world);
        }
        if let Ok(light) = self.world.get::<&SpotLight>(entity) {
            self.light_groups
                .entry(group)
                .or_default()
                .add_spot(&light, &world);
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn opaque_queue(&self) -> &[QueueItem] {
        &self.opaque
    }

    pub fn transparent_queue(&self) -> &[QueueItem] {
        &self.transparent
    }

    pub(crate) fn queues_mut(&mut self) -> (&mut Vec<QueueItem>, &mut Vec<QueueItem>) {
        (&mut self.opaque, &mut self.transparent)
    }

    pub fn light_group(&self, group: u32) -> Option<&LightGroupData> {
        self.light_groups.get(&group)
    }

    pub fn light_counts(&self, group: u32) -> LightCounts {
        self.light_group(group)
            .map(LightGroupData::counts)
            .unwrap_or_default()
    }

    pub fn skin(&self, entity: Entity) -> Option<Vec<Mat4>> {
        self.world.get::<&Skin>(entity).ok().map(|s| s.0.clone())
    }
}
