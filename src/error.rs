use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShaderError {
    #[error("unknown semantic `{semantic}` on `{symbol}`")]
    UnknownSemantic { symbol: String, semantic: String },

    #[error("invalid default value `{value}` for uniform `{symbol}`")]
    InvalidDefault { symbol: String, value: String },

    #[error("cannot resolve loop bound `{bound}`")]
    UnresolvedLoopBound { bound: String },

    #[error("shader program failed to build:\n{diagnostic}")]
    Compile { diagnostic: String },

    #[error("gpu error: {0}")]
    Gpu(String),
}

impl ShaderError {
    /// Parse errors are raised at construction time; compile errors at bind time.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownSemantic { .. } | Self::InvalidDefault { .. } | Self::UnresolvedLoopBound { .. }
        )
    }
}

impl From<String> for ShaderError {
    fn from(message: String) -> Self {
        Self::Gpu(message)
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}
