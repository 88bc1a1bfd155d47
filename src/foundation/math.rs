/// Row-major 3x3 rotation matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Mat3(pub(crate) [[f64; 3]; 3]);

impl Mat3 {
    pub(crate) const IDENTITY: Self = Self([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);

    /// Rotation about the vertical (+y) axis. Positive yaw turns the camera to the right.
    pub(crate) fn yaw(rad: f64) -> Self {
        let (s, c) = rad.sin_cos();
        Self([[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]])
    }

    /// Rotation about the camera's right (+x) axis. Positive pitch looks up.
    pub(crate) fn pitch(rad: f64) -> Self {
        let (s, c) = rad.sin_cos();
        Self([[1.0, 0.0, 0.0], [0.0, c, s], [0.0, -s, c]])
    }

    /// Rotation about the viewing (+z) axis.
    pub(crate) fn roll(rad: f64) -> Self {
        let (s, c) = rad.sin_cos();
        Self([[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]])
    }

    /// Camera-to-world rotation, intrinsic order yaw -> pitch -> roll.
    pub(crate) fn from_orientation(yaw: f64, pitch: f64, roll: f64) -> Self {
        Self::yaw(yaw).mul(&Self::pitch(pitch)).mul(&Self::roll(roll))
    }

    pub(crate) fn mul(&self, rhs: &Self) -> Self {
        let mut out = [[0.0; 3]; 3];
        for (r, row) in out.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = (0..3).map(|k| self.0[r][k] * rhs.0[k][c]).sum();
            }
        }
        Self(out)
    }

    pub(crate) fn apply(&self, v: [f64; 3]) -> [f64; 3] {
        let m = &self.0;
        [
            m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
            m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
            m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
        ]
    }
}

/// Round down to the nearest even integer.
pub(crate) fn floor_even(v: u32) -> u32 {
    v - v % 2
}

/// Floor a float to an even integer. Non-finite and non-positive inputs map to `0`.
pub(crate) fn floor_even_f64(v: f64) -> u32 {
    if !v.is_finite() || v <= 0.0 {
        return 0;
    }
    floor_even(v.floor().min(f64::from(u32::MAX)) as u32)
}

/// Number of decimal digits needed to print `v`.
pub(crate) fn decimal_digits(v: u32) -> usize {
    v.checked_ilog10().map_or(1, |d| d as usize + 1)
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
