use slotmap::SlotMap;

use crate::contour::Contour;

slotmap::new_key_type! {
    /// A stable handle to a pooled [`Contour`].
    pub struct ContourHandle;
}

/// Reuses `Contour` backing storage across pipeline runs.
///
/// Contour tracing allocates one `Vec` of raw vertices and one of simplified
/// vertices per region; doing that from scratch every run is wasteful when
/// the same heightfield is rebuilt repeatedly (e.g. after a local edit).
/// `ContourPool` rents handles out of a `SlotMap` and hands the backing
/// vectors back, with their capacity intact, on the next [`ContourPool::clear`].
#[derive(Debug, Default)]
pub struct ContourPool {
    contours: SlotMap<ContourHandle, Contour>,
}

impl ContourPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rents a contour with at least `capacity_hint` vertices of reserved
    /// capacity, returning a handle to it.
    pub fn rent(&mut self, capacity_hint: usize) -> ContourHandle {
        let mut contour = Contour::default();
        contour.vertices.reserve(capacity_hint);
        contour.raw_vertices.reserve(capacity_hint);
        self.contours.insert(contour)
    }

    /// Returns a reference to the contour behind `handle`.
    pub fn get(&self, handle: ContourHandle) -> &Contour {
        &self.contours[handle]
    }

    /// Returns a mutable reference to the contour behind `handle`.
    pub fn get_mut(&mut self, handle: ContourHandle) -> &mut Contour {
        &mut self.contours[handle]
    }

    /// Releases every rented handle, clearing each contour's vertex vectors
    /// in place so their allocations survive for the next pass.
    pub fn clear(&mut self) {
        for (_, contour) in self.contours.iter_mut() {
            contour.vertices.clear();
            contour.raw_vertices.clear();
        }
        self.contours.clear();
    }

    /// The number of handles currently rented out.
    pub fn len(&self) -> usize {
        self.contours.len()
    }

    /// Whether no handles are currently rented out.
    pub fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }
}
