use glam::{Affine3A, Mat4, Vec3, Vec4};

/// Camera component
///
/// Projection parameters live here; the view matrix is derived from the
/// owning node's world matrix by the transform system whenever that world
/// matrix changes. Projections follow the GL clip convention (NDC z in
/// `[-1, 1]`) and the camera looks down its local -Z axis.
///
/// Call [`Camera::update_projection_matrix`] after editing projection fields.
#[derive(Debug, Clone)]
pub struct Camera {
    pub projection_type: ProjectionType,
    /// Vertical field of view in degrees (perspective only).
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub zoom: f32,
    /// Half the visible height (orthographic only).
    pub ortho_size: f32,

    pub(crate) world_matrix: Affine3A,
    pub(crate) view_matrix: Mat4,
    pub(crate) projection_matrix: Mat4,
    pub(crate) view_projection_matrix: Mat4,
    pub(crate) frustum: Frustum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionType {
    Perspective,
    Orthographic,
}

impl Camera {
    #[must_use]
    pub fn new_perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self::with_projection(ProjectionType::Perspective, fov, aspect, near, far, 1.0)
    }

    #[must_use]
    pub fn new_orthographic(size: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self::with_projection(ProjectionType::Orthographic, 50.0, aspect, near, far, size)
    }

    fn with_projection(
        projection_type: ProjectionType,
        fov: f32,
        aspect: f32,
        near: f32,
        far: f32,
        ortho_size: f32,
    ) -> Self {
        let mut cam = Self {
            projection_type,
            fov,
            aspect,
            near,
            far,
            zoom: 1.0,
            ortho_size,

            world_matrix: Affine3A::IDENTITY,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
            view_projection_matrix: Mat4::IDENTITY,
            frustum: Frustum::default(),
        };
        cam.update_projection_matrix();
        cam
    }

    pub fn update_projection_matrix(&mut self) {
        let zoom = if self.zoom > 0.0 { self.zoom } else { 1.0 };
        self.projection_matrix = match self.projection_type {
            ProjectionType::Perspective => {
                let fov = 2.0 * ((self.fov.to_radians() * 0.5).tan() / zoom).atan();
                Mat4::perspective_rh_gl(fov, self.aspect, self.near, self.far)
            }
            ProjectionType::Orthographic => {
                let h = self.ortho_size / zoom;
                let w = h * self.aspect;
                Mat4::orthographic_rh_gl(-w, w, -h, h, self.near, self.far)
            }
        };

        self.view_projection_matrix = self.projection_matrix * self.view_matrix;
        self.frustum = Frustum::from_matrix(self.view_projection_matrix);
    }

    /// Called by the transform system when the owning node's world matrix changes.
    pub(crate) fn update_view(&mut self, world_transform: &Affine3A) {
        self.world_matrix = *world_transform;
        self.view_matrix = Mat4::from(world_transform.inverse());
        self.view_projection_matrix = self.projection_matrix * self.view_matrix;
        self.frustum = Frustum::from_matrix(self.view_projection_matrix);
    }

    #[inline]
    #[must_use]
    pub fn view_matrix(&self) -> &Mat4 {
        &self.view_matrix
    }

    #[inline]
    #[must_use]
    pub fn projection_matrix(&self) -> &Mat4 {
        &self.projection_matrix
    }

    #[inline]
    #[must_use]
    pub fn view_projection_matrix(&self) -> &Mat4 {
        &self.view_projection_matrix
    }

    #[inline]
    #[must_use]
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// World-space eye position.
    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        Vec3::from(self.world_matrix.translation)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Frustum {
    planes: [Vec4; 6], // Left, Right, Bottom, Top, Near, Far
}

impl Frustum {
    /// Gribb-Hartmann plane extraction for a GL-convention clip matrix.
    #[must_use]
    pub fn from_matrix(m: Mat4) -> Self {
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];

        let mut planes = [
            rows[3] + rows[0],
            rows[3] - rows[0],
            rows[3] + rows[1],
            rows[3] - rows[1],
            rows[3] + rows[2],
            rows[3] - rows[2],
        ];

        for plane in &mut planes {
            let length = plane.truncate().length();
            if length > 0.0 {
                *plane /= length;
            }
        }

        Self { planes }
    }

    #[must_use]
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.truncate().dot(center) + plane.w >= -radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perspective_frustum_culls_behind_camera() {
        let mut cam = Camera::new_perspective(60.0, 1.0, 0.1, 100.0);
        cam.update_view(&Affine3A::IDENTITY);

        assert!(cam.frustum().intersects_sphere(Vec3::new(0.0, 0.0, -10.0), 1.0));
        assert!(!cam.frustum().intersects_sphere(Vec3::new(0.0, 0.0, 10.0), 1.0));
        assert!(!cam.frustum().intersects_sphere(Vec3::new(0.0, 0.0, -200.0), 1.0));
        assert!(cam.frustum().intersects_sphere(Vec3::new(0.0, 0.0, 0.5), 1.0));
    }

    #[test]
    fn gl_depth_range() {
        let cam = Camera::new_perspective(60.0, 1.0, 1.0, 10.0);
        let near = cam.projection_matrix().project_point3(Vec3::new(0.0, 0.0, -1.0));
        let far = cam.projection_matrix().project_point3(Vec3::new(0.0, 0.0, -10.0));
        assert!((near.z + 1.0).abs() < 1e-4);
        assert!((far.z - 1.0).abs() < 1e-4);
    }
}
