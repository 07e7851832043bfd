//! The drawable scene.

use glam::{Mat4, Vec3};

/// Largest number of cells along one side of [`Scene::grid`].
pub const MAX_GRID_SIDE: u32 = 1024;

/// Ordered set of triangle positions.
///
/// Every entry yields one draw of the unit triangle, translated to that
/// position. An empty scene is valid and renders only the clear color.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    triangle_positions: Vec<Vec3>,
}

impl Scene {
    /// Create a scene from explicit positions.
    pub const fn new(triangle_positions: Vec<Vec3>) -> Self {
        Self { triangle_positions }
    }

    /// A square grid on the XY plane, inclusive of both bounds.
    ///
    /// Grids wider than [`MAX_GRID_SIDE`] cells, or with non-finite bounds,
    /// come back empty.
    pub fn grid(min: f32, max: f32, step: f32) -> Self {
        if step <= 0.0 || max < min {
            return Self::default();
        }

        // Integer stepping avoids dropping the last row to float drift.
        let span = ((max - min) / step).round();
        #[allow(clippy::cast_precision_loss)]
        let limit = MAX_GRID_SIDE as f32;
        if !span.is_finite() || span >= limit {
            tracing::warn!("Grid {min}..{max} step {step} exceeds {MAX_GRID_SIDE} cells per side");
            return Self::default();
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let cells = span as u32 + 1;
        let mut triangle_positions = Vec::with_capacity(cells as usize * cells as usize);
        for row in 0..cells {
            for column in 0..cells {
                #[allow(clippy::cast_precision_loss)]
                triangle_positions.push(Vec3::new(
                    step.mul_add(column as f32, min),
                    step.mul_add(row as f32, min),
                    0.0,
                ));
            }
        }

        Self { triangle_positions }
    }

    /// The demo layout: a grid from -1 to 1 in steps of 0.2.
    pub fn demo() -> Self {
        Self::grid(-1.0, 1.0, 0.2)
    }

    /// Triangle positions in draw order.
    pub fn positions(&self) -> &[Vec3] {
        &self.triangle_positions
    }

    /// Model matrices in draw order.
    pub fn transforms(&self) -> impl Iterator<Item = Mat4> + '_ {
        self.triangle_positions
            .iter()
            .map(|&position| Mat4::from_translation(position))
    }

    /// Append a triangle.
    pub fn push(&mut self, position: Vec3) {
        self.triangle_positions.push(position);
    }

    /// Remove every triangle.
    pub fn clear(&mut self) {
        self.triangle_positions.clear();
    }

    pub fn len(&self) -> usize {
        self.triangle_positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangle_positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn demo_grid_covers_both_bounds() {
        let scene = Scene::demo();
        assert_eq!(scene.len(), 121);

        let first = scene.positions()[0];
        let last = scene.positions()[scene.len() - 1];
        assert_relative_eq!(first.x, -1.0);
        assert_relative_eq!(first.y, -1.0);
        assert_relative_eq!(last.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(last.y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn degenerate_grid_is_empty() {
        assert!(Scene::grid(0.0, 1.0, 0.0).is_empty());
        assert!(Scene::grid(1.0, 0.0, 0.5).is_empty());
    }

    #[test]
    fn unbounded_grid_is_empty() {
        assert!(Scene::grid(0.0, f32::INFINITY, 1.0).is_empty());
        assert!(Scene::grid(f32::NEG_INFINITY, 0.0, 1.0).is_empty());
        assert!(Scene::grid(0.0, 1.0, f32::MIN_POSITIVE).is_empty());
        assert!(Scene::grid(f32::NAN, 1.0, 0.5).is_empty());
    }

    #[test]
    fn grid_at_side_limit_is_built() {
        #[allow(clippy::cast_precision_loss)]
        let max = (MAX_GRID_SIDE - 1) as f32;
        let scene = Scene::grid(0.0, max, 1.0);
        assert_eq!(scene.len(), (MAX_GRID_SIDE * MAX_GRID_SIDE) as usize);
        assert!(Scene::grid(0.0, max + 1.0, 1.0).is_empty());
    }

    #[test]
    fn transforms_translate_each_position() {
        let scene = Scene::new(vec![Vec3::new(0.5, -0.25, 0.0), Vec3::ZERO]);
        let transforms: Vec<Mat4> = scene.transforms().collect();

        assert_eq!(transforms.len(), 2);
        let moved = transforms[0].transform_point3(Vec3::ZERO);
        assert_relative_eq!(moved.x, 0.5);
        assert_relative_eq!(moved.y, -0.25);
        assert_eq!(transforms[1], Mat4::IDENTITY);
    }

    #[test]
    fn push_and_clear() {
        let mut scene = Scene::default();
        assert!(scene.is_empty());
        scene.push(Vec3::X);
        assert_eq!(scene.positions(), &[Vec3::X]);
        scene.clear();
        assert!(scene.is_empty());
    }
}
