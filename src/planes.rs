//! Contains the PlaneMapper struct, which describes a relationship
//! between a rectangle on the integral plane with an origin at the
//! upper-left corner, and a rectangle on the complex plane described
//! by its four edges.  Row zero of the integral plane sits on the top
//! (maximum imaginary) edge of the complex plane.
use num::Complex;

use error::Error;

/// The rectangle of the complex plane being rendered, as its four
/// edges.  The real axis runs from `x_min` to `x_max`, the imaginary
/// axis from `y_min` to `y_max`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DomainBounds {
    /// Left edge.
    pub x_min: f64,
    /// Right edge.
    pub x_max: f64,
    /// Bottom edge.
    pub y_min: f64,
    /// Top edge.
    pub y_max: f64,
}

impl DomainBounds {
    /// Constructor.  Rejects empty, inverted, and non-finite rectangles.
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Result<DomainBounds, Error> {
        let bounds = DomainBounds {
            x_min,
            x_max,
            y_min,
            y_max,
        };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Checks that the rectangle is finite and has positive area.
    pub fn validate(&self) -> Result<(), Error> {
        if [self.x_min, self.x_max, self.y_min, self.y_max]
            .iter()
            .any(|v| !v.is_finite())
        {
            return Err(Error::Config(format!("bounds {:?} are not finite", self)));
        }
        if !(self.x_min < self.x_max) {
            return Err(Error::Config(format!(
                "x_min ({}) must be less than x_max ({})",
                self.x_min, self.x_max
            )));
        }
        if !(self.y_min < self.y_max) {
            return Err(Error::Config(format!(
                "y_min ({}) must be less than y_max ({})",
                self.y_min, self.y_max
            )));
        }
        Ok(())
    }

    /// The height, in complex units, of a single row when the domain
    /// is rasterized `height` rows tall.
    pub fn row_step(&self, height: usize) -> f64 {
        (self.y_max - self.y_min) / (height as f64)
    }

    /// The sub-rectangle covered by `row` when the domain is
    /// rasterized `height` rows tall.  The top edge is computed the
    /// same way `PlaneMapper::pixel_to_point` computes it, so mapping
    /// through a row's own bounds lands on exactly the same point as
    /// mapping through the whole domain.
    pub fn row_bounds(&self, row: usize, height: usize) -> DomainBounds {
        let dy = self.row_step(height);
        let top = self.y_max - (row as f64) * dy;
        DomainBounds {
            x_min: self.x_min,
            x_max: self.x_max,
            y_min: top - dy,
            y_max: top,
        }
    }
}

impl Default for DomainBounds {
    fn default() -> DomainBounds {
        DomainBounds {
            x_min: -1.78,
            x_max: 0.78,
            y_min: -0.961,
            y_max: 0.961,
        }
    }
}

/// Describes the column and row of a pixel on the integral plane.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pixel(pub usize, pub usize);

/// Contains the definitions of two planes: an integral cartesian
/// plane, and a rectangle of the complex plane.  Maps pixels from one
/// to points on the other.
#[derive(Debug)]
pub struct PlaneMapper {
    /// Width and height of the integral plane.
    pub integral_plane: (usize, usize),
    /// The rectangle of the complex plane.
    pub bounds: DomainBounds,
    // The complex width and height of a single pixel.
    steps: (f64, f64),
}

impl PlaneMapper {
    /// Constructor.  Takes the size of the integral plane and the
    /// rectangle of the complex plane it is laid over.
    pub fn new(width: usize, height: usize, bounds: DomainBounds) -> Result<PlaneMapper, Error> {
        if width == 0 || height == 0 {
            return Err(Error::Config(format!(
                "plane dimensions {}x{} must be non-zero",
                width, height
            )));
        }
        bounds.validate()?;

        let steps = (
            (bounds.x_max - bounds.x_min) / (width as f64),
            (bounds.y_max - bounds.y_min) / (height as f64),
        );

        Ok(PlaneMapper {
            integral_plane: (width, height),
            bounds,
            steps,
        })
    }

    /// Given a pixel on the integral cartesian plane, map it to the
    /// point on the complex plane at its upper-left corner.
    pub fn pixel_to_point(&self, pixel: &Pixel) -> Complex<f64> {
        Complex::new(
            self.bounds.x_min + (pixel.0 as f64) * self.steps.0,
            self.bounds.y_max - (pixel.1 as f64) * self.steps.1,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_fail_on_bad_shape() {
        assert!(DomainBounds::new(1.0, -1.0, -1.0, 1.0).is_err());
        assert!(DomainBounds::new(-1.0, 1.0, 1.0, -1.0).is_err());
        assert!(DomainBounds::new(-1.0, -1.0, -1.0, 1.0).is_err());
        assert!(DomainBounds::new(-1.0, ::std::f64::NAN, -1.0, 1.0).is_err());
    }

    #[test]
    fn bounds_pass_on_good_shape() {
        assert!(DomainBounds::new(-1.0, 1.0, -1.0, 1.0).is_ok());
        assert!(DomainBounds::default().validate().is_ok());
    }

    #[test]
    fn planemapper_fails_on_empty_plane() {
        assert!(PlaneMapper::new(0, 4, DomainBounds::default()).is_err());
        assert!(PlaneMapper::new(4, 0, DomainBounds::default()).is_err());
    }

    #[test]
    fn pixel_to_point_on_positive_planes() {
        let pm = PlaneMapper::new(5, 5, DomainBounds::new(0.0, 5.0, 0.0, 5.0).unwrap()).unwrap();
        assert_eq!(pm.pixel_to_point(&Pixel(0, 0)), Complex::new(0.0, 5.0));
        assert_eq!(pm.pixel_to_point(&Pixel(2, 2)), Complex::new(2.0, 3.0));
        assert_eq!(pm.pixel_to_point(&Pixel(4, 4)), Complex::new(4.0, 1.0));
    }

    #[test]
    fn pixel_to_points_on_mixed_planes() {
        let pm =
            PlaneMapper::new(4, 4, DomainBounds::new(-2.0, 2.0, -2.0, 2.0).unwrap()).unwrap();
        assert_eq!(pm.pixel_to_point(&Pixel(2, 2)), Complex::new(0.0, 0.0));
        assert_eq!(pm.pixel_to_point(&Pixel(0, 0)), Complex::new(-2.0, 2.0));
        assert_eq!(pm.pixel_to_point(&Pixel(4, 4)), Complex::new(2.0, -2.0));
    }

    #[test]
    fn row_bounds_map_to_the_same_point_as_the_whole_plane() {
        let bounds = DomainBounds::default();
        let (width, height) = (7, 13);
        let whole = PlaneMapper::new(width, height, bounds).unwrap();
        for row in 0..height {
            let strip = PlaneMapper::new(width, 1, bounds.row_bounds(row, height)).unwrap();
            for column in 0..width {
                assert_eq!(
                    whole.pixel_to_point(&Pixel(column, row)),
                    strip.pixel_to_point(&Pixel(column, 0))
                );
            }
        }
    }
}
