// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Query shapes and derived geometric summaries for node sets.

use nalgebra::{Point3, Vector3};

use crate::error::{Error, Result};

/// Axis-aligned box, closed on all sides.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBox {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl BoundingBox {
    /// Creates the box spanned by two opposite corners, in any order.
    pub fn new(a: Point3<f64>, b: Point3<f64>) -> Self {
        Self {
            min: a.inf(&b),
            max: a.sup(&b),
        }
    }

    /// Smallest box containing every point, or `None` for no points.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Point3<f64>>,
    {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::new(first, first), |bb, p| Self {
            min: bb.min.inf(&p),
            max: bb.max.sup(&p),
        }))
    }

    /// Box of the given full `size` centered on `center`.
    pub fn centered(center: Point3<f64>, size: Vector3<f64>) -> Self {
        let half = size.abs() / 2.0;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn volume(&self) -> f64 {
        let s = self.size();
        s.x * s.y * s.z
    }

    /// Grows the box by `margin` on every side.
    pub fn expanded(&self, margin: f64) -> Self {
        let m = Vector3::repeat(margin);
        Self {
            min: self.min - m,
            max: self.max + m,
        }
    }

    /// Closed containment test, widened by `tolerance`.
    pub fn contains(&self, p: &Point3<f64>, tolerance: f64) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] - tolerance && p[i] <= self.max[i] + tolerance)
    }
}

/// A solid cylinder, or a cylindrical shell when `thickness` is set.
///
/// The axis runs from `base` to `top`. With a thickness, only points between
/// the outer radius and `radius - thickness` are inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cylinder {
    pub base: Point3<f64>,
    pub top: Point3<f64>,
    pub radius: f64,
    pub thickness: Option<f64>,
}

impl Cylinder {
    pub fn new(base: Point3<f64>, top: Point3<f64>, radius: f64) -> Self {
        Self {
            base,
            top,
            radius,
            thickness: None,
        }
    }

    /// Restricts the cylinder to a shell of the given wall thickness.
    pub fn with_thickness(mut self, thickness: f64) -> Self {
        self.thickness = Some(thickness);
        self
    }

    pub fn axis(&self) -> Vector3<f64> {
        self.top - self.base
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(Error::DegenerateInput(format!(
                "cylinder radius must be positive, got {}",
                self.radius
            )));
        }
        if let Some(t) = self.thickness {
            if !(t.is_finite() && t > 0.0) {
                return Err(Error::DegenerateInput(format!(
                    "cylinder thickness must be positive, got {t}"
                )));
            }
        }
        if self.axis().norm() < f64::EPSILON {
            return Err(Error::DegenerateInput("cylinder axis has zero length".into()));
        }
        Ok(())
    }

    /// Tight axis-aligned box around the cylinder.
    pub fn enclosing_box(&self) -> BoundingBox {
        let dir = self.axis().normalize();
        let reach = Vector3::from_fn(|i, _| self.radius * (1.0 - dir[i] * dir[i]).max(0.0).sqrt());
        let bb = BoundingBox::new(self.base, self.top);
        BoundingBox {
            min: bb.min - reach,
            max: bb.max + reach,
        }
    }

    /// Exact containment test, widened by `tolerance`.
    pub fn contains(&self, p: &Point3<f64>, tolerance: f64) -> bool {
        let axis = self.axis();
        let length = axis.norm();
        let dir = axis / length;

        let v = p - self.base;
        let along = v.dot(&dir);
        if along < -tolerance || along > length + tolerance {
            return false;
        }

        let radial = (v - dir * along).norm();
        if radial > self.radius + tolerance {
            return false;
        }

        match self.thickness {
            Some(t) => {
                let inner = self.radius - t;
                inner <= 0.0 || radial >= inner - tolerance
            }
            None => true,
        }
    }
}

/// Describes the volume searched by [`Nodes::get_by_volume`](crate::Nodes::get_by_volume).
///
/// A cylinder takes precedence over explicit bounds, which take precedence
/// over a center (with an optional box `extent` around it). A query with
/// none of them is rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeQuery {
    pub center: Option<Point3<f64>>,
    /// Full box size around `center`; a bare center is a point query.
    pub extent: Option<Vector3<f64>>,
    pub bounds: Option<BoundingBox>,
    pub cylinder: Option<Cylinder>,
}

pub(crate) enum Shape {
    Box(BoundingBox),
    Cylinder(Cylinder),
}

impl VolumeQuery {
    pub fn point(center: Point3<f64>) -> Self {
        Self {
            center: Some(center),
            ..Self::default()
        }
    }

    pub fn centered_box(center: Point3<f64>, extent: Vector3<f64>) -> Self {
        Self {
            center: Some(center),
            extent: Some(extent),
            ..Self::default()
        }
    }

    pub fn bounds(bounds: BoundingBox) -> Self {
        Self {
            bounds: Some(bounds),
            ..Self::default()
        }
    }

    pub fn cylinder(cylinder: Cylinder) -> Self {
        Self {
            cylinder: Some(cylinder),
            ..Self::default()
        }
    }

    pub(crate) fn shape(&self) -> Result<Shape> {
        if let Some(cylinder) = self.cylinder {
            cylinder.validate()?;
            return Ok(Shape::Cylinder(cylinder));
        }
        if let Some(bounds) = self.bounds {
            return Ok(Shape::Box(bounds));
        }
        match (self.center, self.extent) {
            (Some(center), Some(extent)) => {
                if extent.iter().any(|e| !e.is_finite() || *e < 0.0) {
                    return Err(Error::DegenerateInput(format!(
                        "box extent must be non-negative, got {extent:?}"
                    )));
                }
                Ok(Shape::Box(BoundingBox::centered(center, extent)))
            }
            (Some(center), None) => Ok(Shape::Box(BoundingBox::new(center, center))),
            (None, Some(_)) => Err(Error::InvalidQuery("box extent given without a center")),
            (None, None) => Err(Error::InvalidQuery(
                "no center, bounds or cylinder given",
            )),
        }
    }
}
