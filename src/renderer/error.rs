use std::io;
use std::path::PathBuf;

/// Failures while building the scene. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("could not read shader source {}: {source}", path.display())]
    ShaderSource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("compiling {stage} shader failed: {log}")]
    ShaderCompile { stage: &'static str, log: String },
    #[error("linking shader program failed: {0}")]
    ProgramLink(String),
    #[error("could not load image {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("could not import model {}: {reason}", path.display())]
    Model { path: PathBuf, reason: String },
    #[error("framebuffer is incomplete (status {0:#x})")]
    IncompleteFramebuffer(u32),
}
