//! An ordered set of non-overlapping regions: the multi-cursor model.
//!
//! Overlapping members merge on every mutation; touching members do not, so
//! cursors can sit right next to each other without collapsing.

use crate::region::Region;
use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct RegionSet {
    regions: Mutex<Vec<Region>>,
}

impl RegionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, region: Region) {
        let mut regions = self.regions.lock();
        regions.push(region);
        normalize(&mut regions);
    }

    pub fn add_all(&self, new: &[Region]) {
        let mut regions = self.regions.lock();
        regions.extend_from_slice(new);
        normalize(&mut regions);
    }

    pub fn clear(&self) {
        self.regions.lock().clear();
    }

    /// Remove `region` from every member, dropping pieces left empty.
    pub fn subtract(&self, region: Region) {
        let mut regions = self.regions.lock();
        *regions = cut_all(&regions, region);
        normalize(&mut regions);
    }

    /// The members left after cutting `region` away, without mutating the
    /// set.
    pub fn cut(&self, region: Region) -> Vec<Region> {
        let mut out = cut_all(&self.regions.lock(), region);
        normalize(&mut out);
        out
    }

    /// Re-anchor every member for an edit of size `delta` at `position`.
    pub fn adjust(&self, position: usize, delta: isize) {
        let mut regions = self.regions.lock();
        for region in regions.iter_mut() {
            region.adjust(position, delta);
        }
        normalize(&mut regions);
    }

    pub fn get(&self, index: usize) -> Region {
        self.regions.lock()[index]
    }

    pub fn len(&self) -> usize {
        self.regions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.lock().is_empty()
    }

    /// A snapshot of the members, ascending by `begin`.
    pub fn regions(&self) -> Vec<Region> {
        self.regions.lock().clone()
    }

    /// Whether `region` equals a member or lies within one.
    pub fn contains(&self, region: Region) -> bool {
        self.regions
            .lock()
            .iter()
            .any(|r| *r == region || (r.contains(region.begin()) && r.contains(region.end())))
    }

    pub fn has_empty(&self) -> bool {
        self.regions.lock().iter().any(|r| r.is_empty())
    }

    pub fn has_non_empty(&self) -> bool {
        self.regions.lock().iter().any(|r| !r.is_empty())
    }
}

fn cut_all(regions: &[Region], region: Region) -> Vec<Region> {
    regions
        .iter()
        .flat_map(|r| r.cut(region))
        .filter(|piece| !piece.is_empty())
        .collect()
}

/// Restore the set invariant: ascending `(begin, end)` order, with any
/// overlapping or swallowed neighbors merged into a forward region. Merely
/// touching neighbors survive.
fn normalize(regions: &mut Vec<Region>) {
    regions.sort_by_key(|r| (r.begin(), r.end()));
    let mut i = 0;
    while i + 1 < regions.len() {
        let (x, y) = (regions[i], regions[i + 1]);
        if x == y || x.intersects(y) || y.covers(x) {
            regions[i] = x.cover(y);
            regions.remove(i + 1);
        } else {
            i += 1;
        }
    }
}
