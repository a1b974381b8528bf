use std::fs;
use std::path::Path;

use log::info;

use crate::renderer::device::{Device, ProgramId, Uniform};
use crate::renderer::error::RenderError;

/// A linked vertex + fragment shader pair. Clones share the GL object, which
/// is deleted once through the copy held by the [`Assets`].
///
/// [`Assets`]: crate::renderer::arena::Assets
#[derive(Clone, Debug)]
pub struct Program {
    id: ProgramId,
}

impl Program {
    /// Loads and links `<dir>/<name>.vs` and `<dir>/<name>.fs`.
    pub fn load(device: &mut dyn Device, dir: &Path, name: &str) -> Result<Program, RenderError> {
        let read = |extension: &str| {
            let path = dir.join(format!("{name}.{extension}"));
            fs::read_to_string(&path).map_err(|source| RenderError::ShaderSource { path, source })
        };
        let vertex = read("vs")?;
        let fragment = read("fs")?;
        Program::from_sources(device, name, &vertex, &fragment)
    }

    pub fn from_sources(
        device: &mut dyn Device,
        name: &str,
        vertex: &str,
        fragment: &str,
    ) -> Result<Program, RenderError> {
        let id = device.create_program(vertex, fragment)?;
        info!("program {name}: {id:?}");
        Ok(Program { id })
    }

    #[cfg(test)]
    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn use_program(&self, device: &mut dyn Device) {
        device.use_program(self.id);
    }

    pub fn set_uniform(&self, device: &mut dyn Device, name: &str, value: impl Into<Uniform>) {
        device.set_uniform(self.id, name, value.into());
    }

    pub fn destroy(self, device: &mut dyn Device) {
        device.delete_program(self.id);
    }
}
