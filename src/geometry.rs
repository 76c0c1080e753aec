//! Polygon soup input types.
//!
//! A polygon is an ordered list of `(x, y)` points; a soup is an ordered list of
//! independent polygons (outer boundaries and holes mixed freely; the worker
//! sorts out nesting itself).

use std::io::Read;

/// A 2-D point as `(x, y)`.
pub type Point = (f64, f64);

/// Ordered sequence of points. Closing the ring is implicit.
pub type Polygon = Vec<Point>;

/// Errors reading a polygon soup document.
#[derive(Debug)]
pub enum SoupError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for SoupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SoupError::Io(e) => write!(f, "failed to read polygon soup: {e}"),
            SoupError::Json(e) => write!(f, "invalid polygon soup JSON: {e}"),
        }
    }
}

impl std::error::Error for SoupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SoupError::Io(e) => Some(e),
            SoupError::Json(e) => Some(e),
        }
    }
}

/// Read a polygon soup from JSON shaped like `[[[x, y], [x, y], ...], ...]`.
pub fn read_polygon_soup<R: Read>(mut reader: R) -> Result<Vec<Polygon>, SoupError> {
    let mut text = String::new();
    reader.read_to_string(&mut text).map_err(SoupError::Io)?;
    serde_json::from_str(&text).map_err(SoupError::Json)
}

/// Axis-aligned bounds of every point in the soup, as `(min, max)`.
///
/// Returns `None` when the soup holds no points at all.
pub fn bounds(polygons: &[Polygon]) -> Option<(Point, Point)> {
    let mut points = polygons.iter().flatten();
    let &(x0, y0) = points.next()?;
    let init = ((x0, y0), (x0, y0));
    Some(points.fold(init, |((min_x, min_y), (max_x, max_y)), &(x, y)| {
        ((min_x.min(x), min_y.min(y)), (max_x.max(x), max_y.max(y)))
    }))
}
