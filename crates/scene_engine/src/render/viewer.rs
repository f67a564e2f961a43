//! Camera view state
//!
//! A viewer holds the matrices and culling volume of one camera. It is
//! refreshed from the owning entity's world matrix before every render.

use crate::foundation::math::{translation_of, Mat4, Point3, Vec3};
use crate::spatial::{Aabb, Frustum, SpatialQuery};

/// How a viewer rejects objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullingMode {
    /// Test against the view frustum
    #[default]
    Frustum,
    /// Test against a sphere of radius `far` (cube maps, point lights)
    Cubic,
    /// Keep everything
    Disabled,
}

/// View, projection and culling state of a camera
#[derive(Debug, Clone, PartialEq)]
pub struct Viewer {
    /// World to view transform
    pub view: Mat4,
    /// View to clip transform
    pub projection: Mat4,
    /// Per-face view-projection matrices for cubic viewers
    pub faces: [Mat4; 6],
    /// World position
    pub position: Vec3,
    /// Vertical field of view (radians)
    pub fov_y: f32,
    /// Width over height
    pub aspect: f32,
    /// Near plane distance
    pub near: f32,
    /// Far plane distance
    pub far: f32,
    /// Culling mode
    pub mode: CullingMode,
    frustum: Frustum,
}

impl Viewer {
    /// Perspective viewer at the origin looking down -Z
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut viewer = Self {
            view: Mat4::identity(),
            projection: Mat4::new_perspective(aspect, fov_y, near, far),
            faces: [Mat4::identity(); 6],
            position: Vec3::zeros(),
            fov_y,
            aspect,
            near,
            far,
            mode: CullingMode::Frustum,
            frustum: Frustum::from_matrix(&Mat4::identity()),
        };
        viewer.update(&Mat4::identity());
        viewer
    }

    /// Omnidirectional viewer rendering six 90 degree faces
    pub fn cubic(near: f32, far: f32) -> Self {
        let mut viewer = Self::perspective(std::f32::consts::FRAC_PI_2, 1.0, near, far);
        viewer.mode = CullingMode::Cubic;
        viewer.update(&Mat4::identity());
        viewer
    }

    /// Builder: replace the culling mode
    pub fn with_mode(mut self, mode: CullingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Refresh view state from the camera's world matrix
    pub fn update(&mut self, world: &Mat4) {
        self.position = translation_of(world);
        self.view = world.try_inverse().unwrap_or_else(Mat4::identity);
        self.frustum = Frustum::from_matrix(&self.view_projection());

        if self.mode == CullingMode::Cubic {
            let eye = Point3::from(self.position);
            let directions = [
                (Vec3::x(), -Vec3::y()),
                (-Vec3::x(), -Vec3::y()),
                (Vec3::y(), Vec3::z()),
                (-Vec3::y(), -Vec3::z()),
                (Vec3::z(), -Vec3::y()),
                (-Vec3::z(), -Vec3::y()),
            ];
            for (face, (direction, up)) in self.faces.iter_mut().zip(directions) {
                let view = Mat4::look_at_rh(&eye, &(eye + direction), &up);
                *face = self.projection * view;
            }
        }
    }

    /// Place the camera at `eye` looking at `target`
    pub fn look_at(&mut self, eye: Vec3, target: Vec3, up: Vec3) {
        let view = Mat4::look_at_rh(&Point3::from(eye), &Point3::from(target), &up);
        let world = view.try_inverse().unwrap_or_else(Mat4::identity);
        self.update(&world);
    }

    /// Combined view-projection matrix
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Current view frustum
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// Whether a world box survives culling
    pub fn is_visible(&self, bounds: &Aabb) -> bool {
        match self.mode {
            CullingMode::Frustum => self.frustum.intersects_aabb(bounds),
            CullingMode::Cubic => bounds.intersects_sphere(self.position, self.far),
            CullingMode::Disabled => true,
        }
    }
}

impl SpatialQuery for Viewer {
    fn overlaps(&self, bounds: &Aabb) -> bool {
        self.is_visible(bounds)
    }
}
