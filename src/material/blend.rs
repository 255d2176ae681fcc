use crate::gpu::{BlendEquation, BlendFactor};

/// Equations and factors issued for a blended draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub equation_rgb: BlendEquation,
    pub equation_alpha: BlendEquation,
    pub src_rgb: BlendFactor,
    pub dst_rgb: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Source alpha over one-minus-source alpha.
    #[default]
    Alpha,
    Premultiplied,
    Additive,
    Multiply,
    Custom(BlendState),
}

impl BlendMode {
    pub fn state(&self) -> BlendState {
        use BlendFactor::*;
        let (src, dst) = match self {
            Self::Alpha => (SrcAlpha, OneMinusSrcAlpha),
            Self::Premultiplied => (One, OneMinusSrcAlpha),
            Self::Additive => (SrcAlpha, One),
            Self::Multiply => (DstColor, Zero),
            Self::Custom(state) => return *state,
        };
        BlendState {
            equation_rgb: BlendEquation::Add,
            equation_alpha: BlendEquation::Add,
            src_rgb: src,
            dst_rgb: dst,
            src_alpha: src,
            dst_alpha: dst,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_is_the_default_blend() {
        let state = BlendMode::default().state();
        assert_eq!(state.src_rgb, BlendFactor::SrcAlpha);
        assert_eq!(state.dst_rgb, BlendFactor::OneMinusSrcAlpha);
        assert_eq!(state.equation_alpha, BlendEquation::Add);
    }
}
