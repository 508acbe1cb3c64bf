//! Spatial index for fast country lookups.

use geo::{Intersects, Point};
use rstar::{RTree, RTreeObject, AABB};
use std::sync::Arc;
use tracing::info;

use super::{BoundaryDataset, BoundaryFeature};

/// Wrapper for R-tree indexing of country boundaries
#[derive(Clone)]
pub struct IndexedBoundary {
    pub boundary: Arc<BoundaryFeature>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedBoundary {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl IndexedBoundary {
    pub fn new(boundary: BoundaryFeature) -> Option<Self> {
        let (min_x, min_y, max_x, max_y) = boundary.bbox()?;
        Some(Self {
            boundary: Arc::new(boundary),
            envelope: AABB::from_corners([min_x, min_y], [max_x, max_y]),
        })
    }
}

/// Spatial index over country boundaries using an R-tree.
///
/// Lookups answer "which is the first feature, in dataset order, whose
/// polygon contains the point"; the tree only narrows the candidates.
pub struct CountryIndex {
    tree: RTree<IndexedBoundary>,
}

impl CountryIndex {
    /// Build spatial index from a boundary dataset
    pub fn build(dataset: BoundaryDataset) -> Self {
        info!(
            "Building spatial index for {} boundaries...",
            dataset.features.len()
        );

        let indexed: Vec<IndexedBoundary> = dataset
            .features
            .into_iter()
            .filter_map(IndexedBoundary::new)
            .collect();

        let tree = RTree::bulk_load(indexed);

        info!("Spatial index built with {} entries", tree.size());

        Self { tree }
    }

    /// First boundary in dataset order containing the point (edges count as inside)
    pub fn lookup(&self, lon: f64, lat: f64) -> Option<Arc<BoundaryFeature>> {
        let point = Point::new(lon, lat);
        let query_envelope = AABB::from_point([lon, lat]);

        // R-tree gives envelope candidates in arbitrary order; keep the lowest ordinal
        self.tree
            .locate_in_envelope_intersecting(&query_envelope)
            .filter(|ib| ib.boundary.geometry.intersects(&point))
            .min_by_key(|ib| ib.boundary.ordinal)
            .map(|ib| Arc::clone(&ib.boundary))
    }

    /// Get total number of indexed boundaries
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    fn square(ordinal: usize, name: &str, min: f64, max: f64) -> BoundaryFeature {
        BoundaryFeature {
            ordinal,
            name: Some(name.to_string()),
            geometry: MultiPolygon::new(vec![polygon![
                (x: min, y: min),
                (x: max, y: min),
                (x: max, y: max),
                (x: min, y: max),
                (x: min, y: min),
            ]]),
        }
    }

    #[test]
    fn test_empty_index() {
        let index = CountryIndex::build(BoundaryDataset::default());
        assert!(index.is_empty());
        assert!(index.lookup(8.5, 47.4).is_none());
    }

    #[test]
    fn test_first_feature_wins_on_overlap() {
        // The larger square comes first in the dataset, so it wins in the overlap
        let dataset = BoundaryDataset {
            features: vec![square(0, "Big", 0.0, 10.0), square(1, "Small", 4.0, 6.0)],
        };
        let index = CountryIndex::build(dataset);
        assert_eq!(index.len(), 2);
        let hit = index.lookup(5.0, 5.0).unwrap();
        assert_eq!(hit.name.as_deref(), Some("Big"));

        let dataset = BoundaryDataset {
            features: vec![square(0, "Small", 4.0, 6.0), square(1, "Big", 0.0, 10.0)],
        };
        let index = CountryIndex::build(dataset);
        assert_eq!(index.lookup(5.0, 5.0).unwrap().name.as_deref(), Some("Small"));
        assert_eq!(index.lookup(1.0, 1.0).unwrap().name.as_deref(), Some("Big"));
    }

    #[test]
    fn test_boundary_and_outside() {
        let index = CountryIndex::build(BoundaryDataset {
            features: vec![square(0, "Unit", 0.0, 1.0)],
        });
        assert!(index.lookup(1.0, 0.5).is_some());
        assert!(index.lookup(0.0, 0.0).is_some());
        assert!(index.lookup(1.5, 0.5).is_none());
    }

    #[test]
    fn test_hole_is_outside() {
        let ring = polygon!(
            exterior: [
                (x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0), (x: 0.0, y: 0.0),
            ],
            interiors: [
                [(x: 4.0, y: 4.0), (x: 6.0, y: 4.0), (x: 6.0, y: 6.0), (x: 4.0, y: 6.0), (x: 4.0, y: 4.0)],
            ],
        );
        let index = CountryIndex::build(BoundaryDataset {
            features: vec![BoundaryFeature {
                ordinal: 0,
                name: Some("Donut".into()),
                geometry: MultiPolygon::new(vec![ring]),
            }],
        });
        assert!(index.lookup(5.0, 5.0).is_none());
        assert!(index.lookup(2.0, 2.0).is_some());
    }
}
