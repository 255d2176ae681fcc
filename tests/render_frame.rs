use std::collections::HashMap;
use std::sync::Arc;

use canvas3d::asset::Geometry;
use canvas3d::gpu::{Capability, CullFace, GlCommand, RecordingDevice, TextureId};
use canvas3d::material::EnableSetTextures;
use canvas3d::scene::{DirectionalLight, LightGroup};
use canvas3d::{
    Assets, Camera, Handle, Material, RenderOptions, RenderStats, Renderable, Renderer,
    RendererSettings, Scene, Shader, ShaderLibrary, Texture, Transform,
};
use glam::{Mat4, Vec3};

struct Frame {
    renderer: Renderer<RecordingDevice>,
    scene: Scene,
    assets: Assets,
    camera: Camera,
    library: ShaderLibrary,
    cube: Handle<Geometry>,
}

impl Frame {
    fn new() -> Self {
        let mut assets = Assets::new();
        let cube = assets.add_geometry(Geometry::cube());
        Self {
            renderer: Renderer::new(RecordingDevice::new(7, 320, 240), RendererSettings::default()),
            scene: Scene::new(),
            assets,
            camera: Camera::default(),
            library: ShaderLibrary::with_builtin_chunks(),
            cube,
        }
    }

    fn shader(&mut self, vertex: &str, fragment: &str) -> Handle<Shader> {
        let shader = Shader::from_chunks(&self.library, vertex, fragment).unwrap();
        self.assets.add_shader(shader)
    }

    fn basic(&mut self) -> Handle<Shader> {
        self.shader("canvas3d.basic.vertex", "canvas3d.basic.fragment")
    }

    fn material(&mut self, name: &str, shader: Handle<Shader>, color: [f32; 3]) -> Handle<Material> {
        let handle = self.assets.material_for(name, shader).unwrap();
        let material = self.assets.materials.get_mut(handle).unwrap();
        assert!(material.set("color", color));
        handle
    }

    fn mesh(&mut self, material: Handle<Material>, position: Vec3) -> hecs::Entity {
        self.scene.add_mesh(
            Transform::from_translation(position),
            Renderable::new(self.cube, material),
        )
    }

    fn render(&mut self) -> RenderStats {
        self.renderer.render(
            &mut self.scene,
            &self.camera,
            &mut self.assets,
            RenderOptions::default(),
        )
    }

    fn gl(&self) -> &RecordingDevice {
        self.renderer.gl()
    }

    fn colors(&self) -> Vec<Vec<f32>> {
        self.gl()
            .uniform_history("color")
            .into_iter()
            .filter_map(|u| u.floats().map(<[f32]>::to_vec))
            .collect()
    }
}

fn use_program_count(commands: &[GlCommand]) -> usize {
    commands
        .iter()
        .filter(|c| matches!(c, GlCommand::UseProgram(Some(_))))
        .count()
}

#[test]
fn opaque_queue_groups_draws_by_program() {
    let mut frame = Frame::new();
    let basic = frame.basic();
    let lambert = frame.shader("canvas3d.lambert.vertex", "canvas3d.lambert.fragment");
    let a = frame.material("a", basic, [1.0, 0.0, 0.0]);
    let b = frame.material("b", lambert, [0.0, 1.0, 0.0]);
    for (i, material) in [b, a, b, a].into_iter().enumerate() {
        frame.mesh(material, Vec3::new(i as f32 * 0.1, 0.0, 0.0));
    }

    let stats = frame.render();
    assert_eq!(stats.draw_call_count, 4);
    assert_eq!(use_program_count(frame.gl().commands()), 2);
    // Each material binds once per contiguous run.
    assert_eq!(frame.colors(), vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
}

#[test]
fn draw_order_is_stable_across_frames() {
    let mut frame = Frame::new();
    let basic = frame.basic();
    let materials: Vec<_> = (0..3)
        .map(|i| frame.material(&format!("m{}", i), basic, [i as f32, 0.0, 0.0]))
        .collect();
    for material in materials.iter().rev() {
        frame.mesh(*material, Vec3::ZERO);
    }

    frame.render();
    let first = frame.colors();
    frame.renderer.gl_mut().take_commands();
    frame.render();
    assert_eq!(frame.colors(), first);
    assert_eq!(first[0], vec![0.0, 0.0, 0.0]);
}

#[test]
fn transparent_objects_draw_back_to_front_after_opaque() {
    let mut frame = Frame::new();
    let basic = frame.basic();
    let near = frame.material("near", basic, [0.0, 0.0, 1.0]);
    let far = frame.material("far", basic, [0.0, 0.0, 2.0]);
    let solid = frame.material("solid", basic, [9.0, 9.0, 9.0]);
    for handle in [near, far] {
        frame.assets.materials.get_mut(handle).unwrap().transparent = true;
    }
    frame.mesh(near, Vec3::new(0.0, 0.0, 1.0));
    frame.mesh(far, Vec3::new(0.0, 0.0, -5.0));
    frame.mesh(solid, Vec3::new(0.0, 0.0, 0.0));

    frame.render();
    assert_eq!(
        frame.colors(),
        vec![vec![9.0, 9.0, 9.0], vec![0.0, 0.0, 2.0], vec![0.0, 0.0, 1.0]]
    );
    let commands = frame.gl().commands();
    let blend_on = commands
        .iter()
        .position(|c| *c == GlCommand::Enable(Capability::Blend))
        .unwrap();
    let first_draw = commands
        .iter()
        .position(|c| matches!(c, GlCommand::DrawElements { .. }))
        .unwrap();
    assert!(first_draw < blend_on, "opaque draw happens before blending is enabled");
}

#[test]
fn failing_shader_skips_its_renderables_and_is_not_recompiled() {
    let mut frame = Frame::new();
    frame
        .renderer
        .gl_mut()
        .reject_sources_containing("render_frame_broken_marker");

    let good = frame.basic();
    let broken = frame
        .assets
        .add_shader(
            Shader::new(
                &frame.library,
                "@import canvas3d.basic.vertex",
                "uniform vec3 color : [1.0, 1.0, 1.0];\n\
                 float render_frame_broken_marker() { return 1.0; }\n\
                 void main() { gl_FragColor = vec4(color, 1.0); }\n",
            )
            .unwrap(),
        );
    let ok = frame.material("ok", good, [1.0, 1.0, 1.0]);
    let bad = frame.material("bad", broken, [1.0, 1.0, 1.0]);
    frame.mesh(ok, Vec3::ZERO);
    frame.mesh(bad, Vec3::ZERO);

    let stats = frame.render();
    assert_eq!(stats.mesh_count, 2);
    assert_eq!(stats.draw_call_count, 1);
    let compiles = frame.gl().compile_count();

    let stats = frame.render();
    assert_eq!(stats.draw_call_count, 1);
    assert_eq!(frame.gl().compile_count(), compiles);
}

#[test]
fn texture_selector_enables_map_and_assigns_unit_zero() {
    let mut frame = Frame::new();
    let basic = frame.basic();
    let material = frame.material("textured", basic, [1.0, 1.0, 1.0]);
    let texture = frame.assets.add_texture(Texture::solid([255, 0, 0, 255]));
    {
        let material = frame.assets.materials.get_mut(material).unwrap();
        assert!(material.set("diffuseMap", texture));
        material.set_selector(Some(Arc::new(EnableSetTextures)));
    }
    frame.mesh(material, Vec3::ZERO);

    frame.render();
    let shader = frame.assets.shaders.get(basic).unwrap();
    assert!(shader.is_texture_enabled("diffuseMap"));
    assert!(shader
        .materialized_fragment()
        .unwrap()
        .contains("#define DIFFUSEMAP_ENABLED"));
    let unit = frame.gl().last_uniform("diffuseMap").unwrap();
    assert_eq!(unit.ints(), Some(&[0][..]));
    assert_eq!(shader.current_texture_slot(), 0);
}

#[test]
fn light_counts_reach_the_shader_and_uniforms_are_pushed() {
    let mut frame = Frame::new();
    let lambert = frame.shader("canvas3d.lambert.vertex", "canvas3d.lambert.fragment");
    let material = frame.material("lit", lambert, [1.0, 1.0, 1.0]);
    frame.mesh(material, Vec3::ZERO);
    frame.scene.add_light(
        Transform::IDENTITY,
        DirectionalLight {
            color: Vec3::new(1.0, 0.5, 0.25),
            intensity: 2.0,
        },
    );

    frame.render();
    let shader = frame.assets.shaders.get(lambert).unwrap();
    assert_eq!(shader.light_counts().directional, 1);
    assert!(shader
        .materialized_fragment()
        .unwrap()
        .contains("#define DIRECTIONAL_LIGHT_COUNT 1"));
    let color = frame.gl().last_uniform("directionalLightColor").unwrap();
    assert_eq!(color.floats(), Some(&[2.0, 1.0, 0.5][..]));
    assert!(frame.gl().last_uniform("worldInverseTranspose").is_some());
}

#[test]
fn state_is_issued_once_for_identical_draws() {
    let mut frame = Frame::new();
    let basic = frame.basic();
    let material = frame.material("m", basic, [1.0, 1.0, 1.0]);
    for i in 0..3 {
        frame.mesh(material, Vec3::new(i as f32 * 0.2, 0.0, 0.0));
    }

    frame.render();
    let depth_test_enables = frame
        .gl()
        .commands()
        .iter()
        .filter(|c| **c == GlCommand::Enable(Capability::DepthTest))
        .count();
    assert_eq!(depth_test_enables, 1);
    assert_eq!(frame.gl().draw_call_count(), 3);
}

#[test]
fn culling_stats_and_exemptions() {
    let mut frame = Frame::new();
    let basic = frame.basic();
    let material = frame.material("m", basic, [1.0, 1.0, 1.0]);
    frame.mesh(material, Vec3::ZERO);
    frame.mesh(material, Vec3::new(0.0, 0.0, 40.0));

    let skinned = frame.mesh(material, Vec3::new(0.0, 0.0, 40.0));
    frame.scene.set_skin(skinned, vec![Mat4::IDENTITY]);

    let unbounded = frame.assets.add_geometry({
        let mut geometry = Geometry::cube();
        geometry.set_bounding_box(None);
        geometry
    });
    frame.scene.add_mesh(
        Transform::from_translation(Vec3::new(0.0, 0.0, 40.0)),
        Renderable::new(unbounded, material),
    );

    let stats = frame.render();
    assert_eq!(stats.mesh_count, 4);
    assert_eq!(stats.rendered_mesh_count, 3);
    assert_eq!(stats.culled_mesh_count(), 1);
    assert_eq!(stats.triangle_count, 36);
    assert_eq!(stats.vertex_count, 72);
}

#[test]
fn scene_update_can_be_skipped_by_the_caller() {
    let mut frame = Frame::new();
    let basic = frame.basic();
    let material = frame.material("m", basic, [1.0, 1.0, 1.0]);
    frame.mesh(material, Vec3::ZERO);

    let stats = frame.renderer.render(
        &mut frame.scene,
        &frame.camera,
        &mut frame.assets,
        RenderOptions {
            scene_updated: true,
            clear: false,
        },
    );
    // The queues were never built.
    assert_eq!(stats.mesh_count, 0);
    assert!(!frame
        .gl()
        .commands()
        .iter()
        .any(|c| matches!(c, GlCommand::Clear(_))));
}

#[test]
fn light_groups_sharing_a_shader_get_matching_variants() {
    let mut frame = Frame::new();
    let lambert = frame.shader("canvas3d.lambert.vertex", "canvas3d.lambert.fragment");
    let material = frame.material("lit", lambert, [1.0, 1.0, 1.0]);
    frame.mesh(material, Vec3::ZERO);
    frame.scene.add_mesh(
        Transform::from_translation(Vec3::new(0.5, 0.0, 0.0)),
        Renderable::new(frame.cube, material).with_light_group(1),
    );
    let light = DirectionalLight {
        color: Vec3::ONE,
        intensity: 1.0,
    };
    frame.scene.add_light(Transform::IDENTITY, light);
    for _ in 0..2 {
        let grouped = frame.scene.add_light(Transform::IDENTITY, light);
        frame.scene.world.insert_one(grouped, LightGroup(1)).unwrap();
    }

    frame.render();
    let gl = frame.gl();
    let mut program = None;
    let mut pushed = 0;
    let mut draws = Vec::new();
    for command in gl.commands() {
        match command {
            GlCommand::UseProgram(Some(id)) => program = Some(*id),
            GlCommand::SetUniform { location, value }
                if gl.uniform_name(*location) == Some("directionalLightColor") =>
            {
                pushed = value.floats().map_or(0, |f| f.len() / 3);
            }
            GlCommand::DrawElements { .. } => draws.push((program, pushed)),
            _ => {}
        }
    }
    assert_eq!(draws.len(), 2);
    assert_ne!(draws[0].0, draws[1].0);
    let mut lights: Vec<_> = draws.iter().map(|(_, lights)| *lights).collect();
    lights.sort();
    assert_eq!(lights, vec![1, 2]);
    assert_eq!(frame.assets.shaders.get(lambert).unwrap().variant_count(7), 2);

    // Both variants stay cached; the next frame compiles nothing.
    let links = frame.gl().link_count();
    frame.render();
    assert_eq!(frame.gl().link_count(), links);
}

#[test]
fn textured_materials_in_one_frame_each_bind_their_own_texture() {
    let mut frame = Frame::new();
    let basic = frame.basic();
    let red = frame.assets.add_texture(Texture::solid([255, 0, 0, 255]));
    let blue = frame.assets.add_texture(Texture::solid([0, 0, 255, 255]));
    for (name, texture) in [("red", red), ("blue", blue)] {
        let material = frame.material(name, basic, [1.0, 1.0, 1.0]);
        assert!(frame
            .assets
            .materials
            .get_mut(material)
            .unwrap()
            .set("diffuseMap", texture));
        frame.mesh(material, Vec3::ZERO);
    }

    frame.render();
    let gl = frame.gl();
    let mut active = 0;
    let mut bound: HashMap<u32, TextureId> = HashMap::new();
    let mut at_draw = Vec::new();
    for command in gl.commands() {
        match command {
            GlCommand::ActiveTexture(unit) => active = *unit,
            GlCommand::BindTexture(_, Some(id)) => {
                bound.insert(active, *id);
            }
            GlCommand::BindTexture(_, None) => {
                bound.remove(&active);
            }
            GlCommand::DrawElements { .. } => at_draw.push(bound.get(&0).copied()),
            _ => {}
        }
    }
    let texture_id = |handle: Handle<Texture>| frame.assets.textures.get(handle).unwrap().texture_id(7);
    assert_eq!(at_draw, vec![texture_id(red), texture_id(blue)]);
    let units: Vec<_> = gl
        .uniform_history("diffuseMap")
        .into_iter()
        .map(|u| u.ints().map(<[i32]>::to_vec))
        .collect();
    assert_eq!(units, vec![Some(vec![0]), Some(vec![0])]);
    assert_eq!(frame.assets.shaders.get(basic).unwrap().current_texture_slot(), 0);
}

#[test]
fn cull_face_follows_each_draw_when_culling_is_toggled() {
    let mut frame = Frame::new();
    let basic = frame.basic();
    let faces = [
        (true, CullFace::Back),
        (false, CullFace::Front),
        (true, CullFace::Front),
    ];
    for (i, (enabled, face)) in faces.into_iter().enumerate() {
        let material = frame.material(&format!("m{}", i), basic, [i as f32, 0.0, 0.0]);
        let mut renderable = Renderable::new(frame.cube, material);
        renderable.cull_face_enabled = enabled;
        renderable.cull_face = face;
        frame
            .scene
            .add_mesh(Transform::from_translation(Vec3::ZERO), renderable);
    }

    frame.render();
    let mut culling = false;
    let mut face = None;
    let mut at_draw = Vec::new();
    for command in frame.gl().commands() {
        match command {
            GlCommand::Enable(Capability::CullFace) => culling = true,
            GlCommand::Disable(Capability::CullFace) => culling = false,
            GlCommand::CullFace(f) => face = Some(*f),
            GlCommand::DrawElements { .. } => at_draw.push((culling, face)),
            _ => {}
        }
    }
    assert_eq!(
        at_draw,
        vec![
            (true, Some(CullFace::Back)),
            (false, Some(CullFace::Front)),
            (true, Some(CullFace::Front)),
        ]
    );
}
