//! Rectangle filter over the point store.

use tracing::debug;

use crate::models::{Point, SelectionRect};

/// Points inside `rect`, edges inclusive, in input order.
///
/// An invalid rectangle selects nothing.
pub fn filter_in_bounds(points: &[Point], rect: &SelectionRect) -> Vec<Point> {
    if !rect.is_valid() {
        debug!("Ignoring invalid selection {:?}", rect);
        return Vec::new();
    }

    let selected: Vec<Point> = points
        .iter()
        .filter(|p| rect.contains(p.lat, p.lng))
        .cloned()
        .collect();

    debug!("Selection kept {} of {} points", selected.len(), points.len());
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;

    fn pt(lat: f64, lng: f64) -> Point {
        Point::new(lat, lng, Record::new())
    }

    #[test]
    fn test_inside_and_outside() {
        let rect = SelectionRect::new(0.0, 0.0, 10.0, 10.0);
        let points = vec![pt(5.0, 5.0), pt(11.0, 5.0), pt(5.0, -0.1), pt(-1.0, -1.0)];
        let kept = filter_in_bounds(&points, &rect);
        assert_eq!(kept, vec![pt(5.0, 5.0)]);
    }

    #[test]
    fn test_edges_are_inclusive() {
        let rect = SelectionRect::new(0.0, 0.0, 10.0, 10.0);
        let points = vec![
            pt(0.0, 5.0),
            pt(10.0, 5.0),
            pt(5.0, 0.0),
            pt(5.0, 10.0),
            pt(10.0, 10.0),
        ];
        assert_eq!(filter_in_bounds(&points, &rect).len(), 5);
    }

    #[test]
    fn test_order_preserved() {
        let rect = SelectionRect::new(-90.0, -180.0, 90.0, 180.0);
        let points = vec![pt(3.0, 3.0), pt(1.0, 1.0), pt(2.0, 2.0)];
        assert_eq!(filter_in_bounds(&points, &rect), points);
    }

    #[test]
    fn test_empty_inputs() {
        let rect = SelectionRect::new(0.0, 0.0, 10.0, 10.0);
        assert!(filter_in_bounds(&[], &rect).is_empty());

        let inverted = SelectionRect::new(10.0, 0.0, 0.0, 10.0);
        assert!(filter_in_bounds(&[pt(5.0, 5.0)], &inverted).is_empty());
    }

    #[test]
    fn test_filtered_points_are_copies() {
        let rect = SelectionRect::new(0.0, 0.0, 10.0, 10.0);
        let points = vec![pt(5.0, 5.0)];
        let mut kept = filter_in_bounds(&points, &rect);
        kept[0].set_attribute("country", "X");
        assert!(points[0].attributes.is_empty());
    }
}
