// scene/lights.rs
// Per-light-group uniform aggregation.

use std::collections::BTreeMap;

use glam::{Mat4, Vec3};

use super::components::{AmbientLight, DirectionalLight, PointLight, SpotLight};
use crate::shader::LightCounts;

/// Floats per element of each light uniform array.
pub fn light_uniform_components(symbol: &str) -> u8 {
    match symbol {
        "pointLightRange"
        | "spotLightRange"
        | "spotLightUmbraAngleCosine"
        | "spotLightPenumbraAngleCosine" => 1,
        _ => 3,
    }
}

/// Lights of one group, flattened into the arrays shaders read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightGroupData {
    counts: LightCounts,
    uniforms: BTreeMap<&'static str, Vec<f32>>,
}

impl LightGroupData {
    pub fn counts(&self) -> LightCounts {
        self.counts
    }

    pub fn uniform(&self, symbol: &str) -> Option<&[f32]> {
        self.uniforms.get(symbol).map(Vec::as_slice)
    }

    pub fn uniforms(&self) -> impl Iterator<Item = (&'static str, &[f32])> {
        self.uniforms.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    fn push(&mut self, symbol: &'static str, values: &[f32]) {
        self.uniforms.entry(symbol).or_default().extend_from_slice(values);
    }

    pub(crate) fn add_ambient(&mut self, light: &AmbientLight) {
        self.counts.ambient += 1;
        self.push("ambientLightColor", &(light.color * light.intensity).to_array());
    }

    pub(crate) fn add_directional(&mut self, light: &DirectionalLight, world: &Mat4) {
        self.counts.directional += 1;
        let direction = safe_normalize(world.transform_vector3(Vec3::NEG_Z), Vec3::NEG_Y);
        self.push("directionalLightDirection", &direction.to_array());
        self.push("directionalLightColor", &(light.color * light.intensity).to_array());
    }

    pub(crate) fn add_point(&mut self, light: &PointLight, world: &Mat4) {
        self.counts.point += 1;
        self.push("pointLightPosition", &world.w_axis.truncate().to_array());
        self.push("pointLightRange", &[light.range]);
        self.push("pointLightColor", &(light.color * light.intensity).to_array());
    }

    pub(crate) fn add_spot(&mut self, light: &SpotLight, world: &Mat4) {
        self.counts.spot += 1;
        let direction = safe_normalize(world.transform_vector3(Vec3::NEG_Z), Vec3::NEG_Y);
        self.push("spotLightPosition", &world.w_axis.truncate().to_array());
        self.push("spotLightDirection", &direction.to_array());
        self.push("spotLightRange", &[light.range]);
        self.push(
            "spotLightUmbraAngleCosine",
            &[(light.umbra_angle * 0.5).cos()],
        );
        self.push(
            "spotLightPenumbraAngleCosine",
            &[(light.penumbra_angle * 0.5).cos()],
        );
        self.push("spotLightColor", &(light.color * light.intensity).to_array());
    }
}

pub(crate) fn safe_normalize(v: Vec3, fallback: Vec3) -> Vec3 {
    v.try_normalize().unwrap_or(fallback)
}
