use super::*;
use anyhow::{Result, ensure};
use std::fmt::Debug;

#[derive(Clone, PartialEq)]
pub struct MultiPolygonGeometry(pub Vec<PolygonGeometry>);

impl MultiPolygonGeometry {
	pub fn normalize_winding(&mut self) {
		self.0.iter_mut().for_each(PolygonGeometry::normalize_winding);
	}
}

impl GeometryTrait for MultiPolygonGeometry {
	fn verify(&self) -> Result<()> {
		ensure!(!self.0.is_empty(), "MultiPolygon must have at least one polygon");
		self.0.iter().try_for_each(PolygonGeometry::verify)
	}

	fn compute_bounds(&self) -> Option<[f64; 4]> {
		self.0.iter().fold(None, |acc, p| merge_bounds(acc, p.compute_bounds()))
	}

	fn map_coordinates(&self, f: &mut impl FnMut(&Coordinates) -> Coordinates) -> Self {
		MultiPolygonGeometry(self.0.iter().map(|p| p.map_coordinates(f)).collect())
	}

	fn for_each_coordinate(&self, f: &mut impl FnMut(&Coordinates)) {
		self.0.iter().for_each(|p| p.for_each_coordinate(f));
	}
}

impl CompositeGeometryTrait<PolygonGeometry> for MultiPolygonGeometry {
	fn new() -> Self {
		Self(Vec::new())
	}
	fn as_vec(&self) -> &Vec<PolygonGeometry> {
		&self.0
	}
	fn as_mut_vec(&mut self) -> &mut Vec<PolygonGeometry> {
		&mut self.0
	}
	fn into_inner(self) -> Vec<PolygonGeometry> {
		self.0
	}
}

impl Debug for MultiPolygonGeometry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_list().entries(&self.0).finish()
	}
}

crate::impl_from_array!(MultiPolygonGeometry, PolygonGeometry);
