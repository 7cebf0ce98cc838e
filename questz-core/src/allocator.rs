//! Spatial allocator for build sites.
//!
//! Every building quest reserves its site here. A new claim is refused when
//! it comes within `buffer` blocks of an existing one, so two quest buildings
//! never share walls or crowd each other.

use crate::types::{BlockPos, Bounds, ClaimId, EntityId};
use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Default clearance between two claims, in blocks.
pub const DEFAULT_BUFFER: i32 = 3;

/// A reserved build volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimedArea {
    /// Claim identity.
    pub id: ClaimId,
    /// Reserved box (normalised).
    pub bounds: Bounds,
    /// Agent whose quest owns the claim.
    pub owner: EntityId,
    /// When the claim was made.
    pub claimed_at: DateTime<Utc>,
}

/// All claims in one world shard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingAreas {
    areas: Vec<ClaimedArea>,
    #[serde(skip, default = "default_buffer")]
    buffer: i32,
}

fn default_buffer() -> i32 {
    DEFAULT_BUFFER
}

impl Default for BuildingAreas {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER)
    }
}

impl BuildingAreas {
    /// Empty allocator with the given clearance.
    #[must_use]
    pub fn new(buffer: i32) -> Self {
        Self {
            areas: Vec::new(),
            buffer,
        }
    }

    /// Clearance in blocks.
    #[must_use]
    pub const fn buffer(&self) -> i32 {
        self.buffer
    }

    /// Change the clearance (used after loading persisted claims).
    pub fn set_buffer(&mut self, buffer: i32) {
        self.buffer = buffer;
    }

    /// Whether `bounds` conflicts with any existing claim.
    ///
    /// The existing claim is grown by the buffer and tested against the
    /// candidate, which makes the relation symmetric.
    #[must_use]
    pub fn would_overlap(&self, bounds: Bounds) -> bool {
        self.areas
            .iter()
            .any(|a| a.bounds.expand(self.buffer).intersects(&bounds))
    }

    /// Reserve the box spanned by two arbitrary corners.
    ///
    /// Returns the new claim's id, or `None` (with nothing recorded) when it
    /// conflicts with an existing claim.
    pub fn try_claim(
        &mut self,
        a: BlockPos,
        b: BlockPos,
        owner: EntityId,
        now: DateTime<Utc>,
    ) -> Option<ClaimId> {
        let bounds = Bounds::from_corners(a, b);
        if self.would_overlap(bounds) {
            debug!(%bounds, owner = %owner, "Claim rejected: overlaps existing area");
            return None;
        }

        let id = ClaimId::new();
        self.areas.push(ClaimedArea {
            id,
            bounds,
            owner,
            claimed_at: now,
        });
        info!(%bounds, owner = %owner, claim = %id, "Registered building area");
        Some(id)
    }

    /// The claim whose minimum corner is nearest to `point`, strictly within
    /// `max_distance`. Ties go to the earliest claim.
    #[must_use]
    pub fn find_nearest(&self, point: BlockPos, max_distance: f64) -> Option<&ClaimedArea> {
        let mut best: Option<(&ClaimedArea, OrderedFloat<f64>)> = None;
        for area in &self.areas {
            let d = OrderedFloat(area.bounds.min.distance(point));
            if d >= OrderedFloat(max_distance) {
                continue;
            }
            if best.is_none_or(|(_, bd)| d < bd) {
                best = Some((area, d));
            }
        }
        best.map(|(a, _)| a)
    }

    /// Drop every claim owned by `owner`. Returns how many were removed.
    pub fn release(&mut self, owner: EntityId) -> usize {
        let before = self.areas.len();
        self.areas.retain(|a| a.owner != owner);
        let removed = before - self.areas.len();
        if removed > 0 {
            info!(owner = %owner, removed, "Released building area");
        }
        removed
    }

    /// The claim owned by `owner`, if any.
    #[must_use]
    pub fn claim_of(&self, owner: EntityId) -> Option<&ClaimedArea> {
        self.areas.iter().find(|a| a.owner == owner)
    }

    /// Every claim, in creation order.
    #[must_use]
    pub fn areas(&self) -> &[ClaimedArea] {
        &self.areas
    }

    /// Number of claims.
    #[must_use]
    pub fn len(&self) -> usize {
        self.areas.len()
    }

    /// No claims recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: i32, y: i32, z: i32) -> BlockPos {
        BlockPos::new(x, y, z)
    }

    #[test]
    fn buffer_keeps_claims_apart() {
        let mut areas = BuildingAreas::default();
        let now = Utc::now();
        assert!(areas.try_claim(p(0, 0, 0), p(4, 4, 4), EntityId::new(), now).is_some());
        // 3-block gap: still inside the buffer.
        assert!(areas.try_claim(p(8, 0, 0), p(12, 4, 4), EntityId::new(), now).is_none());
        // 4-block gap: clear.
        assert!(areas.try_claim(p(9, 0, 0), p(13, 4, 4), EntityId::new(), now).is_some());
        assert_eq!(areas.len(), 2);
    }

    #[test]
    fn reversed_corners_are_normalised() {
        let mut areas = BuildingAreas::new(0);
        let id = EntityId::new();
        areas.try_claim(p(5, 5, 5), p(0, 0, 0), id, Utc::now());
        let claim = areas.claim_of(id).expect("claim");
        assert_eq!(claim.bounds.min, p(0, 0, 0));
        assert_eq!(claim.bounds.max, p(5, 5, 5));
    }

    #[test]
    fn nearest_is_strict_and_first_wins_ties() {
        let mut areas = BuildingAreas::new(0);
        let now = Utc::now();
        let first = EntityId::new();
        let second = EntityId::new();
        areas.try_claim(p(10, 0, 0), p(11, 1, 1), first, now);
        areas.try_claim(p(-10, 0, 0), p(-9, 1, 1), second, now);

        let hit = areas.find_nearest(p(0, 0, 0), 20.0).expect("in range");
        assert_eq!(hit.owner, first);
        assert!(areas.find_nearest(p(0, 0, 0), 10.0).is_none());
    }

    #[test]
    fn release_frees_the_footprint() {
        let mut areas = BuildingAreas::default();
        let owner = EntityId::new();
        let now = Utc::now();
        areas.try_claim(p(0, 0, 0), p(4, 4, 4), owner, now);
        assert!(areas.would_overlap(Bounds::from_corners(p(0, 0, 0), p(4, 4, 4))));
        assert_eq!(areas.release(owner), 1);
        assert!(areas.try_claim(p(0, 0, 0), p(4, 4, 4), EntityId::new(), now).is_some());
    }
}
