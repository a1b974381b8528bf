use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

use crate::renderer::device::Device;
use crate::renderer::material::Material;
use crate::renderer::mesh::Mesh;
use crate::renderer::program::Program;
use crate::renderer::texture::Texture;

/// Stable index of a value stored in an [`Arena`].
pub struct Handle<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(index: usize) -> Handle<T> {
        Handle {
            index: index as u32,
            _marker: PhantomData,
        }
    }

    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Handle<T> {}
impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}
impl<T> Eq for Handle<T> {}
impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}
impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.index)
    }
}

/// Append-only storage. Values live as long as the arena.
pub struct Arena<T> {
    items: Vec<T>,
}

impl<T> Arena<T> {
    pub fn new() -> Arena<T> {
        Arena { items: Vec::new() }
    }

    pub fn insert(&mut self, item: T) -> Handle<T> {
        self.items.push(item);
        Handle::new(self.items.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.items.drain(..)
    }
}

impl<T> Index<Handle<T>> for Arena<T> {
    type Output = T;
    fn index(&self, handle: Handle<T>) -> &T {
        &self.items[handle.index()]
    }
}

impl<T> IndexMut<Handle<T>> for Arena<T> {
    fn index_mut(&mut self, handle: Handle<T>) -> &mut T {
        &mut self.items[handle.index()]
    }
}

/// Owner of every shared GPU resource of the scene. Meshes, materials and
/// textures are referenced by handle from the objects that use them.
pub struct Assets {
    pub programs: Arena<Program>,
    pub textures: Arena<Texture>,
    pub meshes: Arena<Mesh>,
    pub materials: Arena<Material>,
}

impl Assets {
    pub fn new() -> Assets {
        Assets {
            programs: Arena::new(),
            textures: Arena::new(),
            meshes: Arena::new(),
            materials: Arena::new(),
        }
    }

    /// Deletes all GPU objects. The arenas are empty afterwards.
    pub fn release(&mut self, device: &mut dyn Device) {
        self.materials = Arena::new();
        for mesh in self.meshes.drain() {
            mesh.destroy(device);
        }
        for texture in self.textures.drain() {
            texture.destroy(device);
        }
        for program in self.programs.drain() {
            program.destroy(device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_index_what_was_inserted() {
        let mut arena = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_ne!(a, b);
        assert_eq!(arena[a], "a");
        arena[b] = "c";
        assert_eq!(arena[b], "c");
        assert_eq!(arena.len(), 2);
    }
}
