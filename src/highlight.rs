//! Hover highlighting.
//!
//! [`Hover`] remembers which mesh is highlighted and the emissive colour it had
//! before. At most one mesh is highlighted at a time: highlighting a new one
//! always restores the previous one first.

use crate::data_structures::colour::Rgb;

/// Anything whose meshes can be looked up by pick id and have their emissive
/// colour swapped.
pub trait Emissive {
    fn emissive(&self, id: u32) -> Option<Rgb>;

    /// Returns false if no mesh has this id.
    fn set_emissive(&mut self, id: u32, colour: Rgb) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Highlighted {
    pub id: u32,
    /// Emissive colour before highlighting, restored bit for bit.
    pub saved: Rgb,
}

#[derive(Debug, Clone)]
pub struct Hover {
    current: Option<Highlighted>,
    colour: Rgb,
}

impl Hover {
    pub fn new(colour: Rgb) -> Self {
        Self {
            current: None,
            colour,
        }
    }

    pub fn current(&self) -> Option<Highlighted> {
        self.current
    }

    pub fn colour(&self) -> Rgb {
        self.colour
    }

    /// Move the highlight to `hit`, the id of the nearest intersected mesh of
    /// this frame (or `None` if the pointer is over nothing). Returns whether
    /// the highlighted mesh changed.
    pub fn update<E: Emissive + ?Sized>(&mut self, target: &mut E, hit: Option<u32>) -> bool {
        if self.current.map(|current| current.id) == hit {
            return false;
        }
        self.clear(target);

        let Some(id) = hit else {
            return true;
        };
        match target.emissive(id) {
            Some(saved) => {
                target.set_emissive(id, self.colour);
                self.current = Some(Highlighted { id, saved });
                log::debug!("Hovering mesh {id}");
            }
            None => log::warn!("Pointer hit mesh {id}, which is not part of the scene"),
        }
        true
    }

    /// Restore the highlighted mesh, if any.
    pub fn clear<E: Emissive + ?Sized>(&mut self, target: &mut E) {
        if let Some(Highlighted { id, saved }) = self.current.take() {
            target.set_emissive(id, saved);
            log::debug!("Left mesh {id}");
        }
    }

    /// Drop the highlight without restoring anything, for when the scene it
    /// referred to is gone.
    pub fn forget(&mut self) {
        self.current = None;
    }
}
