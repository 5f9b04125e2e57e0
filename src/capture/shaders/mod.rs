//! Shader source registry: one fixed vertex shader and the fragment shader
//! variants the GPU backend can be constructed with.

/// Fullscreen clip-space quad vertex shader.
pub const CLIP: &str = include_str!("clip.wgsl");

/// Luminance variant: grey replicated across RGB, opaque alpha.
pub const LUM: &str = include_str!("lum.wgsl");

/// Passthrough variant: sampled colour returned unmodified.
pub const RGBA: &str = include_str!("rgba.wgsl");

/// Packed variant: RGB passthrough with luminance in the alpha channel.
pub const RGBLUM: &str = include_str!("rgblum.wgsl");

/// Fragment shader variant selected at GPU backend construction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FragmentShader {
    /// Luminance-only encoding.
    Lum,
    /// RGBA passthrough. The default.
    #[default]
    Rgba,
    /// RGB with luminance packed into alpha.
    RgbLum,
    /// Caller-supplied WGSL fragment source. Must expose an `fs_main` entry
    /// point and is expected to bind the frame texture and sampler at
    /// `@group(0) @binding(0)` / `@binding(1)`.
    Custom(String),
}

impl FragmentShader {
    /// The WGSL source text for this variant.
    pub fn source(&self) -> &str {
        match self {
            FragmentShader::Lum => LUM,
            FragmentShader::Rgba => RGBA,
            FragmentShader::RgbLum => RGBLUM,
            FragmentShader::Custom(source) => source,
        }
    }
}
