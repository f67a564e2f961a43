//! Graphics device abstraction
//!
//! The core never talks to a graphics API directly. Everything it needs from
//! the GPU (material buffer uploads, instanced draws and occlusion queries)
//! goes through [`GraphicsDevice`]. [`HeadlessDevice`] records those calls
//! and stands in for a GPU in tests and tools.

use std::collections::HashMap;

use crate::foundation::math::Mat4;

/// Opaque handle on a geometry resource owned by the device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct GeometryId(pub u64);

/// Opaque handle on a hardware occlusion query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryId(pub u32);

/// Backend failures
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// The device refused to create another query
    #[error("Occlusion query unavailable: {0}")]
    QueryUnavailable(String),

    /// A buffer could not be created or written
    #[error("Buffer error: {0}")]
    Buffer(String),

    /// A draw could not be recorded
    #[error("Draw submission failed: {0}")]
    Draw(String),

    /// The device is gone
    #[error("Device lost")]
    Lost,
}

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Operations the scene core issues against the GPU
pub trait GraphicsDevice: Send {
    /// Replace the contents of the material buffer
    fn update_material_buffer(&mut self, bytes: &[u8]) -> DeviceResult<()>;

    /// Draw `transforms.len()` instances of a geometry with one material
    fn draw_instances(&mut self, geometry: GeometryId, material_slot: u32, transforms: &[Mat4]) -> DeviceResult<()>;

    /// Allocate an occlusion query
    fn create_occlusion_query(&mut self) -> DeviceResult<QueryId>;

    /// Rasterize a box proxy (unit cube under `bounds`) inside the query
    fn issue_occlusion_query(&mut self, query: QueryId, bounds: &Mat4) -> DeviceResult<()>;

    /// Non-blocking poll; `Some(visible)` once the result is available
    fn poll_occlusion_query(&mut self, query: QueryId) -> DeviceResult<Option<bool>>;

    /// Release an occlusion query
    fn destroy_occlusion_query(&mut self, query: QueryId);
}

/// One recorded draw call
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDraw {
    /// Geometry drawn
    pub geometry: GeometryId,
    /// Material slot used
    pub material_slot: u32,
    /// Instance transforms
    pub transforms: Vec<Mat4>,
}

type OcclusionOracle = Box<dyn Fn(&Mat4) -> bool + Send>;

/// Device that records calls instead of rendering
///
/// Query results become available on the first poll after the query was
/// issued; visibility is decided by an optional oracle over the proxy box.
pub struct HeadlessDevice {
    draws: Vec<RecordedDraw>,
    material_buffer: Vec<u8>,
    material_uploads: usize,
    queries: HashMap<QueryId, Option<bool>>,
    next_query: u32,
    query_limit: Option<usize>,
    issued_queries: usize,
    oracle: Option<OcclusionOracle>,
    fail_uploads: bool,
    fail_issues: bool,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    /// Create a device where everything is visible
    pub fn new() -> Self {
        Self {
            draws: Vec::new(),
            material_buffer: Vec::new(),
            material_uploads: 0,
            queries: HashMap::new(),
            next_query: 0,
            query_limit: None,
            issued_queries: 0,
            oracle: None,
            fail_uploads: false,
            fail_issues: false,
        }
    }

    /// Decide occlusion query results with `oracle` (true = visible)
    pub fn with_occlusion_oracle(mut self, oracle: impl Fn(&Mat4) -> bool + Send + 'static) -> Self {
        self.oracle = Some(Box::new(oracle));
        self
    }

    /// Refuse to create more than `limit` live queries
    pub fn with_query_limit(mut self, limit: usize) -> Self {
        self.query_limit = Some(limit);
        self
    }

    /// Make material uploads fail
    pub fn with_failing_uploads(mut self) -> Self {
        self.fail_uploads = true;
        self
    }

    /// Make occlusion query issues fail
    pub fn with_failing_issues(mut self) -> Self {
        self.fail_issues = true;
        self
    }

    /// Draws recorded since the last call
    pub fn take_draws(&mut self) -> Vec<RecordedDraw> {
        std::mem::take(&mut self.draws)
    }

    /// Draws recorded so far
    pub fn draws(&self) -> &[RecordedDraw] {
        &self.draws
    }

    /// Last uploaded material buffer
    pub fn material_buffer(&self) -> &[u8] {
        &self.material_buffer
    }

    /// Number of material uploads
    pub fn material_uploads(&self) -> usize {
        self.material_uploads
    }

    /// Number of live queries
    pub fn live_queries(&self) -> usize {
        self.queries.len()
    }

    /// Total queries issued
    pub fn issued_queries(&self) -> usize {
        self.issued_queries
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn update_material_buffer(&mut self, bytes: &[u8]) -> DeviceResult<()> {
        if self.fail_uploads {
            return Err(DeviceError::Buffer("upload rejected".to_string()));
        }
        self.material_buffer.clear();
        self.material_buffer.extend_from_slice(bytes);
        self.material_uploads += 1;
        Ok(())
    }

    fn draw_instances(&mut self, geometry: GeometryId, material_slot: u32, transforms: &[Mat4]) -> DeviceResult<()> {
        self.draws.push(RecordedDraw {
            geometry,
            material_slot,
            transforms: transforms.to_vec(),
        });
        Ok(())
    }

    fn create_occlusion_query(&mut self) -> DeviceResult<QueryId> {
        if self.query_limit.is_some_and(|limit| self.queries.len() >= limit) {
            return Err(DeviceError::QueryUnavailable("query limit reached".to_string()));
        }
        let id = QueryId(self.next_query);
        self.next_query += 1;
        self.queries.insert(id, None);
        Ok(id)
    }

    fn issue_occlusion_query(&mut self, query: QueryId, bounds: &Mat4) -> DeviceResult<()> {
        if self.fail_issues {
            return Err(DeviceError::QueryUnavailable("issue rejected".to_string()));
        }
        let visible = self.oracle.as_ref().map_or(true, |oracle| oracle(bounds));
        match self.queries.get_mut(&query) {
            Some(result) => {
                *result = Some(visible);
                self.issued_queries += 1;
                Ok(())
            }
            None => Err(DeviceError::QueryUnavailable(format!("unknown query {}", query.0))),
        }
    }

    fn poll_occlusion_query(&mut self, query: QueryId) -> DeviceResult<Option<bool>> {
        match self.queries.get_mut(&query) {
            Some(result) => Ok(result.take()),
            None => Err(DeviceError::QueryUnavailable(format!("unknown query {}", query.0))),
        }
    }

    fn destroy_occlusion_query(&mut self, query: QueryId) {
        self.queries.remove(&query);
    }
}
