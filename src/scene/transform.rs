use glam::{Affine3A, EulerRot, Mat3, Quat, Vec3};

/// Transform component
///
/// Holds a node's local position/rotation/scale (TRS), the cached local and
/// world matrices, and the change tracking that drives propagation.
///
/// # Change detection
///
/// `position`, `rotation` and `scale` are plain public fields. Mutations are
/// detected lazily by comparing them against a shadow copy taken the last time
/// the local matrix was rebuilt, so writing the same value twice costs nothing.
///
/// # World dirtiness
///
/// `world_dirty` is raised whenever the local matrix changes and on
/// attach/detach. Only a propagation pass clears it.
#[derive(Debug, Clone)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,

    /// When `false` the local matrix is never rebuilt from TRS; use
    /// [`Transform::set_local_matrix`] to drive it directly.
    pub matrix_auto_update: bool,

    pub(crate) local_matrix: Affine3A,
    pub(crate) world_matrix: Affine3A,
    pub(crate) world_dirty: bool,

    last_position: Vec3,
    last_rotation: Quat,
    last_scale: Vec3,
    force_update: bool,
}

impl Transform {
    #[must_use]
    pub fn new() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            matrix_auto_update: true,

            local_matrix: Affine3A::IDENTITY,
            world_matrix: Affine3A::IDENTITY,
            world_dirty: true,

            last_position: Vec3::ZERO,
            last_rotation: Quat::IDENTITY,
            last_scale: Vec3::ONE,
            force_update: true,
        }
    }

    // ========================================================================
    // Shadow state check
    // ========================================================================

    /// Rebuilds the local matrix if TRS changed since the last rebuild.
    ///
    /// Returns whether the local matrix changed. A change also raises
    /// `world_dirty`. Does nothing when `matrix_auto_update` is off.
    pub fn update_local_matrix(&mut self) -> bool {
        if !self.matrix_auto_update {
            return false;
        }

        let changed = self.position != self.last_position
            || self.rotation != self.last_rotation
            || self.scale != self.last_scale
            || self.force_update;

        if changed {
            self.local_matrix =
                Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.position);

            self.last_position = self.position;
            self.last_rotation = self.rotation;
            self.last_scale = self.scale;
            self.force_update = false;
            self.world_dirty = true;
        }

        changed
    }

    // ========================================================================
    // Getters & Helpers
    // ========================================================================

    /// Sets the rotation from XYZ-ordered Euler angles (radians).
    pub fn set_rotation_euler(&mut self, x: f32, y: f32, z: f32) {
        self.rotation = Quat::from_euler(EulerRot::XYZ, x, y, z);
    }

    /// Returns the rotation as XYZ-ordered Euler angles (radians).
    #[must_use]
    pub fn rotation_euler(&self) -> Vec3 {
        let (x, y, z) = self.rotation.to_euler(EulerRot::XYZ);
        Vec3::new(x, y, z)
    }

    #[inline]
    #[must_use]
    pub fn local_matrix(&self) -> &Affine3A {
        &self.local_matrix
    }

    /// World matrix as of the last propagation.
    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &Affine3A {
        &self.world_matrix
    }

    #[inline]
    #[must_use]
    pub fn is_world_dirty(&self) -> bool {
        self.world_dirty
    }

    /// Written by the transform system once a world matrix is recomputed.
    pub(crate) fn set_world_matrix(&mut self, mat: Affine3A) {
        self.world_matrix = mat;
        self.world_dirty = false;
    }

    /// Sets the local matrix directly and decomposes it back into TRS.
    ///
    /// Shear is lost in the decomposition.
    pub fn set_local_matrix(&mut self, mat: Affine3A) {
        self.local_matrix = mat;

        let (scale, rotation, translation) = mat.to_scale_rotation_translation();
        self.scale = scale;
        self.rotation = rotation;
        self.position = translation;

        self.last_scale = scale;
        self.last_rotation = rotation;
        self.last_position = translation;
        self.force_update = false;

        self.world_dirty = true;
    }

    /// Orients the -Z axis towards `target`.
    ///
    /// `target` and `up` are expressed in the parent's space. Degenerate input
    /// (target on the up axis or at the current position) leaves the rotation
    /// untouched.
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        let offset = target - self.position;
        if offset.length_squared() < f32::EPSILON {
            return;
        }
        let forward = offset.normalize();

        if forward.cross(up).length_squared() < 1e-4 {
            return;
        }

        let right = forward.cross(up).normalize();
        let new_up = right.cross(forward).normalize();

        let rot_mat = Mat3::from_cols(right, new_up, -forward);
        self.rotation = Quat::from_mat3(&rot_mat);
    }

    /// Flags only the world matrix as stale (used on attach/detach).
    pub(crate) fn mark_world_dirty(&mut self) {
        self.world_dirty = true;
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}
