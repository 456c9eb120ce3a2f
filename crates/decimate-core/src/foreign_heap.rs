//! Adapter for reduction routines that live in a separate address space
//! (for example a compiled WebAssembly module with its own heap).
//!
//! The module is driven through [`SimplifyModule`]: allocate regions in
//! its heap, copy inputs in, run, copy outputs back out. Every region is
//! owned by a [`HeapScope`] and freed when the scope drops, so error
//! returns and panics release the same memory a successful run does.
//! Callers only ever receive owned vectors, never heap addresses.

use log::debug;

use crate::reduction::{ReductionError, ReductionInput, ReductionResult, Reducer};

/// Byte address inside the module's heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapPtr(pub u32);

/// Status returned by [`SimplifyModule::simplify`] on success.
pub const SIMPLIFY_OK: i32 = 0;

/// Low-level entry points of a foreign reduction module.
pub trait SimplifyModule {
    /// Returns `None` when the heap cannot satisfy the request.
    fn malloc(&mut self, bytes: usize) -> Option<HeapPtr>;
    fn free(&mut self, ptr: HeapPtr);

    fn write_f32(&mut self, ptr: HeapPtr, values: &[f32]);
    fn write_u32(&mut self, ptr: HeapPtr, values: &[u32]);
    fn read_f32(&self, ptr: HeapPtr, len: usize) -> Vec<f32>;
    fn read_u32(&self, ptr: HeapPtr, len: usize) -> Vec<u32>;

    /// Runs the reduction. Returns [`SIMPLIFY_OK`] on success.
    fn simplify(
        &mut self,
        vertices: HeapPtr,
        vertex_count: usize,
        triangles: HeapPtr,
        triangle_count: usize,
        ratio: f32,
        texcoords: Option<HeapPtr>,
    ) -> i32;

    fn vertex_count(&self) -> usize;
    fn triangle_count(&self) -> usize;
    fn copy_vertices(&mut self, out: HeapPtr);
    fn copy_triangles(&mut self, out: HeapPtr);
    /// Writes one source vertex per output index slot. Returns `false`
    /// when the module does not track corner correspondence.
    fn copy_correspondence(&mut self, out: HeapPtr) -> bool;
}

/// Owns allocations in a module heap for the duration of one call.
pub struct HeapScope<'m, M: SimplifyModule> {
    module: &'m mut M,
    live: Vec<HeapPtr>,
}

impl<'m, M: SimplifyModule> HeapScope<'m, M> {
    pub fn new(module: &'m mut M) -> Self {
        Self {
            module,
            live: Vec::new(),
        }
    }

    pub fn alloc(&mut self, bytes: usize) -> Result<HeapPtr, ReductionError> {
        let ptr = self
            .module
            .malloc(bytes)
            .ok_or(ReductionError::AllocationFailed { bytes })?;
        self.live.push(ptr);
        Ok(ptr)
    }

    /// Allocates a region and copies `values` into it.
    pub fn alloc_f32(&mut self, values: &[f32]) -> Result<HeapPtr, ReductionError> {
        let ptr = self.alloc(values.len() * 4)?;
        self.module.write_f32(ptr, values);
        Ok(ptr)
    }

    pub fn alloc_u32(&mut self, values: &[u32]) -> Result<HeapPtr, ReductionError> {
        let ptr = self.alloc(values.len() * 4)?;
        self.module.write_u32(ptr, values);
        Ok(ptr)
    }

    pub fn module(&mut self) -> &mut M {
        &mut *self.module
    }

    pub fn live_allocations(&self) -> usize {
        self.live.len()
    }
}

impl<M: SimplifyModule> Drop for HeapScope<'_, M> {
    fn drop(&mut self) {
        for ptr in self.live.drain(..).rev() {
            self.module.free(ptr);
        }
    }
}

/// [`Reducer`] backed by a [`SimplifyModule`].
pub struct ForeignReducer<M: SimplifyModule> {
    module: M,
}

impl<M: SimplifyModule> ForeignReducer<M> {
    pub fn new(module: M) -> Self {
        Self { module }
    }

    pub fn module(&self) -> &M {
        &self.module
    }

    pub fn into_inner(self) -> M {
        self.module
    }
}

impl<M: SimplifyModule> Reducer for ForeignReducer<M> {
    fn reduce(&mut self, input: &ReductionInput<'_>) -> Result<ReductionResult, ReductionError> {
        input.validate()?;
        let vertex_count = input.vertex_count();
        let triangle_count = input.triangle_count();

        let mut scope = HeapScope::new(&mut self.module);
        let vertices = scope.alloc_f32(input.positions)?;
        let triangles = scope.alloc_u32(input.indices)?;
        let correspondence = scope.alloc(input.indices.len() * 4)?;
        let texcoords = match input.texcoords {
            Some(uvs) => Some(scope.alloc_f32(uvs)?),
            None => None,
        };

        let status = scope.module().simplify(
            vertices,
            vertex_count,
            triangles,
            triangle_count,
            input.ratio,
            texcoords,
        );
        if status != SIMPLIFY_OK {
            return Err(ReductionError::RoutineFailed { status });
        }

        let out_vertices = scope.module().vertex_count();
        let out_triangles = scope.module().triangle_count();
        if out_vertices > vertex_count || out_triangles > triangle_count {
            return Err(ReductionError::OutputOverflow(format!(
                "{} vertices / {} triangles from {} / {}",
                out_vertices, out_triangles, vertex_count, triangle_count
            )));
        }

        // Outputs reuse the input regions; they are never larger.
        let module = scope.module();
        module.copy_vertices(vertices);
        module.copy_triangles(triangles);
        let has_correspondence = module.copy_correspondence(correspondence);

        let result = ReductionResult {
            vertices: module.read_f32(vertices, out_vertices * 3),
            indices: module.read_u32(triangles, out_triangles * 3),
            correspondence: has_correspondence
                .then(|| module.read_u32(correspondence, out_triangles * 3)),
        };
        debug!(
            "Foreign reduction: {} -> {} vertices, {} -> {} triangles",
            vertex_count, out_vertices, triangle_count, out_triangles
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// In-process stand-in for a foreign module: a byte heap with a bump
    /// allocator and an identity "simplifier".
    #[derive(Default)]
    struct MockModule {
        heap: Vec<u8>,
        live: HashMap<u32, usize>,
        fail_alloc_after: Option<usize>,
        allocs: usize,
        status: i32,
        overflow: bool,
        track_correspondence: bool,
        last: Option<(Vec<f32>, Vec<u32>)>,
    }

    impl MockModule {
        fn bytes(&self, ptr: HeapPtr, len: usize) -> &[u8] {
            &self.heap[ptr.0 as usize..ptr.0 as usize + len]
        }
    }

    impl SimplifyModule for MockModule {
        fn malloc(&mut self, bytes: usize) -> Option<HeapPtr> {
            if let Some(limit) = self.fail_alloc_after {
                if self.allocs >= limit {
                    return None;
                }
            }
            self.allocs += 1;
            let ptr = self.heap.len() as u32;
            self.heap.resize(self.heap.len() + bytes.max(4), 0);
            self.live.insert(ptr, bytes);
            Some(HeapPtr(ptr))
        }

        fn free(&mut self, ptr: HeapPtr) {
            assert!(self.live.remove(&ptr.0).is_some(), "double free");
        }

        fn write_f32(&mut self, ptr: HeapPtr, values: &[f32]) {
            for (i, v) in values.iter().enumerate() {
                let at = ptr.0 as usize + i * 4;
                self.heap[at..at + 4].copy_from_slice(&v.to_le_bytes());
            }
        }

        fn write_u32(&mut self, ptr: HeapPtr, values: &[u32]) {
            for (i, v) in values.iter().enumerate() {
                let at = ptr.0 as usize + i * 4;
                self.heap[at..at + 4].copy_from_slice(&v.to_le_bytes());
            }
        }

        fn read_f32(&self, ptr: HeapPtr, len: usize) -> Vec<f32> {
            self.bytes(ptr, len * 4)
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect()
        }

        fn read_u32(&self, ptr: HeapPtr, len: usize) -> Vec<u32> {
            self.bytes(ptr, len * 4)
                .chunks_exact(4)
                .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect()
        }

        fn simplify(
            &mut self,
            vertices: HeapPtr,
            vertex_count: usize,
            triangles: HeapPtr,
            triangle_count: usize,
            _ratio: f32,
            _texcoords: Option<HeapPtr>,
        ) -> i32 {
            let v = self.read_f32(vertices, vertex_count * 3);
            let t = self.read_u32(triangles, triangle_count * 3);
            self.last = Some((v, t));
            self.status
        }

        fn vertex_count(&self) -> usize {
            let n = self.last.as_ref().map_or(0, |(v, _)| v.len() / 3);
            if self.overflow {
                n + 1
            } else {
                n
            }
        }

        fn triangle_count(&self) -> usize {
            self.last.as_ref().map_or(0, |(_, t)| t.len() / 3)
        }

        fn copy_vertices(&mut self, out: HeapPtr) {
            if let Some((v, _)) = self.last.clone() {
                self.write_f32(out, &v);
            }
        }

        fn copy_triangles(&mut self, out: HeapPtr) {
            if let Some((_, t)) = self.last.clone() {
                self.write_u32(out, &t);
            }
        }

        fn copy_correspondence(&mut self, out: HeapPtr) -> bool {
            if !self.track_correspondence {
                return false;
            }
            if let Some((_, t)) = self.last.clone() {
                self.write_u32(out, &t);
            }
            true
        }
    }

    const POSITIONS: [f32; 12] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0];
    const INDICES: [u32; 6] = [0, 1, 2, 2, 1, 3];

    #[test]
    fn test_round_trip_through_heap() {
        let module = MockModule {
            track_correspondence: true,
            ..Default::default()
        };
        let mut reducer = ForeignReducer::new(module);
        let result = reducer
            .reduce(&ReductionInput::new(&POSITIONS, &INDICES, 0.5))
            .unwrap();
        assert_eq!(result.vertices, POSITIONS);
        assert_eq!(result.indices, INDICES);
        assert_eq!(result.correspondence.as_deref(), Some(&INDICES[..]));
        assert!(reducer.module().live.is_empty());
    }

    #[test]
    fn test_texcoords_are_allocated_and_released() {
        let uvs = [0.0f32; 8];
        let mut reducer = ForeignReducer::new(MockModule::default());
        let result = reducer
            .reduce(&ReductionInput::new(&POSITIONS, &INDICES, 0.5).with_texcoords(&uvs))
            .unwrap();
        assert_eq!(result.correspondence, None);
        assert_eq!(reducer.module().allocs, 4);
        assert!(reducer.module().live.is_empty());
    }

    #[test]
    fn test_scope_frees_on_drop() {
        let mut module = MockModule::default();
        {
            let mut scope = HeapScope::new(&mut module);
            let first = scope.alloc_f32(&[1.0, 2.0]).unwrap();
            scope.alloc_u32(&[7]).unwrap();
            assert_eq!(scope.live_allocations(), 2);
            assert_eq!(scope.module().read_f32(first, 2), vec![1.0, 2.0]);
        }
        assert!(module.live.is_empty());
        assert_eq!(module.allocs, 2);
    }

    #[test]
    fn test_allocation_failure_releases_earlier_regions() {
        let module = MockModule {
            fail_alloc_after: Some(2),
            ..Default::default()
        };
        let mut reducer = ForeignReducer::new(module);
        let err = reducer
            .reduce(&ReductionInput::new(&POSITIONS, &INDICES, 0.5))
            .unwrap_err();
        assert!(matches!(err, ReductionError::AllocationFailed { .. }));
        assert!(reducer.module().live.is_empty());
    }

    #[test]
    fn test_routine_failure_releases_regions() {
        let module = MockModule {
            status: 1,
            ..Default::default()
        };
        let mut reducer = ForeignReducer::new(module);
        let err = reducer
            .reduce(&ReductionInput::new(&POSITIONS, &INDICES, 0.5))
            .unwrap_err();
        assert_eq!(err, ReductionError::RoutineFailed { status: 1 });
        assert!(reducer.module().live.is_empty());
    }

    #[test]
    fn test_oversized_output_is_rejected() {
        let module = MockModule {
            overflow: true,
            ..Default::default()
        };
        let mut reducer = ForeignReducer::new(module);
        let err = reducer
            .reduce(&ReductionInput::new(&POSITIONS, &INDICES, 0.5))
            .unwrap_err();
        assert!(matches!(err, ReductionError::OutputOverflow(_)));
        assert!(reducer.into_inner().live.is_empty());
    }

    #[test]
    fn test_invalid_input_never_touches_heap() {
        let mut reducer = ForeignReducer::new(MockModule::default());
        let err = reducer
            .reduce(&ReductionInput::new(&POSITIONS, &INDICES, 0.0))
            .unwrap_err();
        assert_eq!(err, ReductionError::InvalidRatio(0.0));
        assert_eq!(reducer.module().allocs, 0);
    }
}
