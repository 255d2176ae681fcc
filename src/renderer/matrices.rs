// renderer/matrices.rs
// Per-draw transform matrices, derived variants computed on first request.

use glam::Mat4;

use crate::shader::{MatrixBase, MatrixSemantic, MatrixVariant};

const BASES: usize = 6;
const VARIANTS: usize = 4;

fn slot(semantic: MatrixSemantic) -> usize {
    let base = match semantic.base {
        MatrixBase::World => 0,
        MatrixBase::View => 1,
        MatrixBase::Projection => 2,
        MatrixBase::WorldView => 3,
        MatrixBase::ViewProjection => 4,
        MatrixBase::WorldViewProjection => 5,
    };
    let variant = match semantic.variant {
        MatrixVariant::Plain => 0,
        MatrixVariant::Inverse => 1,
        MatrixVariant::Transpose => 2,
        MatrixVariant::InverseTranspose => 3,
    };
    base * VARIANTS + variant
}

/// Matrices for one renderable. Only what a shader asks for is computed.
#[derive(Debug, Clone)]
pub struct MatrixSet {
    world: Mat4,
    view: Mat4,
    projection: Mat4,
    cache: [Option<Mat4>; BASES * VARIANTS],
    inversions: usize,
}

impl MatrixSet {
    pub fn new(world: Mat4, view: Mat4, projection: Mat4) -> Self {
        let mut set = Self {
            world,
            view,
            projection,
            cache: [None; BASES * VARIANTS],
            inversions: 0,
        };
        // Every draw needs these two.
        set.get(MatrixSemantic::new(MatrixBase::WorldView, MatrixVariant::Plain));
        set.get(MatrixSemantic::new(
            MatrixBase::WorldViewProjection,
            MatrixVariant::Plain,
        ));
        set
    }

    pub fn world_view(&mut self) -> Mat4 {
        self.get(MatrixSemantic::new(MatrixBase::WorldView, MatrixVariant::Plain))
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn get(&mut self, semantic: MatrixSemantic) -> Mat4 {
        let index = slot(semantic);
        if let Some(matrix) = self.cache[index] {
            return matrix;
        }
        let matrix = match semantic.variant {
            MatrixVariant::Plain => self.base(semantic.base),
            MatrixVariant::Transpose => self.plain(semantic.base).transpose(),
            MatrixVariant::Inverse => self.inverse(semantic.base),
            MatrixVariant::InverseTranspose => self.inverse(semantic.base).transpose(),
        };
        self.cache[index] = Some(matrix);
        matrix
    }

    /// Number of matrix inversions performed so far.
    pub fn inversions(&self) -> usize {
        self.inversions
    }

    fn plain(&mut self, base: MatrixBase) -> Mat4 {
        self.get(MatrixSemantic::new(base, MatrixVariant::Plain))
    }

    fn inverse(&mut self, base: MatrixBase) -> Mat4 {
        let index = slot(MatrixSemantic::new(base, MatrixVariant::Inverse));
        if let Some(matrix) = self.cache[index] {
            return matrix;
        }
        self.inversions += 1;
        let matrix = self.plain(base).inverse();
        self.cache[index] = Some(matrix);
        matrix
    }

    fn base(&mut self, base: MatrixBase) -> Mat4 {
        match base {
            MatrixBase::World => self.world,
            MatrixBase::View => self.view,
            MatrixBase::Projection => self.projection,
            MatrixBase::WorldView => self.view * self.world,
            MatrixBase::ViewProjection => self.projection * self.view,
            MatrixBase::WorldViewProjection => {
                self.projection * self.plain(MatrixBase::WorldView)
            }
        }
    }
}
