use std::collections::{BTreeMap, HashMap, HashSet};

use crate::read_info::ReadInfo;

/// Mate-link multigraph over region ids
///
/// Symmetric: `graph[u][v]` and `graph[v][u]` carry the same weight, the number of mate-pair
/// links between the two regions. Self-loops hold pairs whose mates share one region.
///
pub type RegionGraph = BTreeMap<u32, BTreeMap<u32, u32>>;

/// One closed stretch of genome holding discordant reads
///
pub struct Region {
    pub tid: i32,
    pub begin: i64,
    pub last: i64,

    /// Concordant pairs counted while the region was open
    pub normal_read_count: u32,

    /// Normal reads per grouping key (library or source file), covering the gap before the
    /// region plus its open span; consumed by copy-number estimation
    pub normal_reads_by_key: BTreeMap<String, u32>,

    pub reads: Vec<ReadInfo>,
}

impl Region {
    pub fn size(&self) -> i64 {
        self.last - self.begin + 1
    }
}

/// Id-keyed store of registered regions and the mate-link graph between them
///
/// Ids are assigned monotonically and never reused. The store also maintains a reverse lookup
/// from the coordinates of every owned read to its region id, which is how later reads resolve
/// their mate's region.
///
#[derive(Default)]
pub struct RegionStore {
    regions: BTreeMap<u32, Region>,
    graph: RegionGraph,
    read_coords: HashMap<(i32, i64), u32>,
    next_region_id: u32,

    /// Most recently registered region still eligible to absorb links from discarded neighbors
    last_region_id: Option<u32>,
}

impl RegionStore {
    /// Register a closed region: assign the next id, take ownership of its reads, and fold the
    /// accumulated mate links into the graph
    ///
    /// Links pointing at regions that have since been erased are dropped.
    ///
    #[allow(clippy::too_many_arguments)]
    pub fn register_region(
        &mut self,
        tid: i32,
        begin: i64,
        last: i64,
        normal_read_count: u32,
        normal_reads_by_key: BTreeMap<String, u32>,
        reads: Vec<ReadInfo>,
        pending_links: &BTreeMap<u32, u32>,
        pending_self_links: u32,
    ) -> u32 {
        let id = self.next_region_id;
        self.next_region_id += 1;

        for read in reads.iter() {
            self.read_coords.insert((read.tid, read.pos), id);
        }
        self.regions.insert(
            id,
            Region {
                tid,
                begin,
                last,
                normal_read_count,
                normal_reads_by_key,
                reads,
            },
        );

        for (&mate_region, &weight) in pending_links.iter() {
            if self.region_exists(mate_region) {
                self.add_edge(id, mate_region, weight);
            }
        }
        if pending_self_links > 0 {
            self.add_edge(id, id, pending_self_links);
        }

        self.last_region_id = Some(id);
        id
    }

    /// Fold the scratch of a coverage-filtered region into the most recent surviving region
    ///
    /// Discarded regions still contribute their mate links and normal-read counts to whichever
    /// neighbor survives; with no surviving region yet, the links are dropped.
    ///
    pub fn merge_into_last_region(
        &mut self,
        normal_reads_by_key: &BTreeMap<String, u32>,
        pending_links: &BTreeMap<u32, u32>,
        pending_self_links: u32,
    ) {
        let Some(last_id) = self.last_region_id else {
            return;
        };
        if !self.region_exists(last_id) {
            self.last_region_id = None;
            return;
        }

        for (&mate_region, &weight) in pending_links.iter() {
            if self.region_exists(mate_region) {
                self.add_edge(last_id, mate_region, weight);
            }
        }
        if pending_self_links > 0 {
            self.add_edge(last_id, last_id, pending_self_links);
        }

        let region = self.regions.get_mut(&last_id).unwrap();
        for (key, count) in normal_reads_by_key.iter() {
            *region.normal_reads_by_key.entry(key.clone()).or_insert(0) += count;
        }
    }

    fn add_edge(&mut self, u: u32, v: u32, weight: u32) {
        *self.graph.entry(u).or_default().entry(v).or_insert(0) += weight;
        if u != v {
            *self.graph.entry(v).or_default().entry(u).or_insert(0) += weight;
        }
    }

    /// Detach the full graph for a destructive traversal, leaving the store's graph empty
    pub fn take_graph(&mut self) -> RegionGraph {
        std::mem::take(&mut self.graph)
    }

    pub fn region_exists(&self, id: u32) -> bool {
        self.regions.contains_key(&id)
    }

    pub fn region(&self, id: u32) -> &Region {
        &self.regions[&id]
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn graph(&self) -> &RegionGraph {
        &self.graph
    }

    pub fn num_reads_in_region(&self, id: u32) -> usize {
        self.regions.get(&id).map_or(0, |x| x.reads.len())
    }

    /// Region owning a read at the given coordinates, if any
    pub fn lookup_read_region(&self, tid: i32, pos: i64) -> Option<u32> {
        self.read_coords.get(&(tid, pos)).copied()
    }

    /// Sum of normal reads per key over surviving regions with ids in `(lo, hi]`
    ///
    /// Each region's attached counts cover the gap before it plus its open span, so this
    /// approximates the normal background between the two candidate regions.
    ///
    pub fn accumulate_reads_between_regions(&self, lo: u32, hi: u32) -> BTreeMap<String, u32> {
        use std::ops::Bound::{Excluded, Included};

        let mut acc = BTreeMap::new();
        for (_, region) in self.regions.range((Excluded(lo), Included(hi))) {
            for (key, count) in region.normal_reads_by_key.iter() {
                *acc.entry(key.clone()).or_insert(0) += count;
            }
        }
        acc
    }

    pub fn sum_of_region_sizes(&self, snodes: &[u32]) -> i64 {
        snodes.iter().map(|&id| self.region(id).size()).sum()
    }

    /// Drop every read of the region whose query name is in `observed`; spent evidence
    ///
    pub fn remove_observed_reads(&mut self, id: u32, observed: &HashSet<String>) {
        let Some(region) = self.regions.get_mut(&id) else {
            return;
        };
        let mut removed_coords = Vec::new();
        region.reads.retain(|read| {
            let remove = observed.contains(&read.qname);
            if remove {
                removed_coords.push((read.tid, read.pos));
            }
            !remove
        });
        for coords in removed_coords {
            if self.read_coords.get(&coords) == Some(&id) {
                self.read_coords.remove(&coords);
            }
        }
    }

    /// Erase a region along with its reads, reverse-lookup entries, and graph edges
    pub fn remove_region(&mut self, id: u32) {
        let Some(region) = self.regions.remove(&id) else {
            return;
        };
        for read in region.reads.iter() {
            let coords = (read.tid, read.pos);
            if self.read_coords.get(&coords) == Some(&id) {
                self.read_coords.remove(&coords);
            }
        }
        if let Some(adjacency) = self.graph.remove(&id) {
            for (&neighbor, _) in adjacency.iter() {
                if let Some(neighbor_adjacency) = self.graph.get_mut(&neighbor) {
                    neighbor_adjacency.remove(&id);
                }
            }
        }
        if self.last_region_id == Some(id) {
            self.last_region_id = None;
        }
    }

    /// Check that every graph key and neighbor references a live region, and that edge weights
    /// are symmetric
    #[cfg(test)]
    pub fn assert_graph_invariants(&self) {
        for (&u, adjacency) in self.graph.iter() {
            assert!(self.region_exists(u));
            for (&v, &weight) in adjacency.iter() {
                assert!(self.region_exists(v));
                assert!(weight >= 1);
                assert_eq!(self.graph[&v].get(&u), Some(&weight));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_info::test_utils::test_read;
    use crate::read_info::PairOrientation;

    fn region_reads(tid: i32, positions: &[i64]) -> Vec<ReadInfo> {
        positions
            .iter()
            .enumerate()
            .map(|(i, &pos)| {
                test_read(
                    &format!("r{tid}_{i}"),
                    tid,
                    pos,
                    false,
                    tid,
                    pos + 2500,
                    2500,
                    PairOrientation::FrBigInsert,
                )
            })
            .collect()
    }

    fn register_simple(store: &mut RegionStore, tid: i32, positions: &[i64]) -> u32 {
        let reads = region_reads(tid, positions);
        store.register_region(
            tid,
            positions[0],
            *positions.last().unwrap(),
            0,
            BTreeMap::new(),
            reads,
            &BTreeMap::new(),
            0,
        )
    }

    #[test]
    fn test_ids_are_monotonic_and_never_reused() {
        let mut store = RegionStore::default();
        let a = register_simple(&mut store, 0, &[100, 200]);
        let b = register_simple(&mut store, 0, &[1000, 1100]);
        assert_eq!((a, b), (0, 1));

        store.remove_region(b);
        let c = register_simple(&mut store, 0, &[2000, 2100]);
        assert_eq!(c, 2);
    }

    #[test]
    fn test_edges_are_symmetric_with_self_loops() {
        let mut store = RegionStore::default();
        let a = register_simple(&mut store, 0, &[100, 200]);

        let mut links = BTreeMap::new();
        links.insert(a, 3);
        store.register_region(
            0,
            1000,
            1100,
            0,
            BTreeMap::new(),
            region_reads(0, &[1000, 1100]),
            &links,
            2,
        );
        store.assert_graph_invariants();
        assert_eq!(store.graph()[&1][&0], 3);
        assert_eq!(store.graph()[&0][&1], 3);
        assert_eq!(store.graph()[&1][&1], 2);
    }

    #[test]
    fn test_discard_merges_into_last_surviving_region() {
        let mut store = RegionStore::default();
        let a = register_simple(&mut store, 0, &[100, 200]);
        let b = register_simple(&mut store, 0, &[1000, 1100]);

        let mut links = BTreeMap::new();
        links.insert(a, 2);
        let mut counts = BTreeMap::new();
        counts.insert("libA".to_string(), 7);
        store.merge_into_last_region(&counts, &links, 1);

        store.assert_graph_invariants();
        assert_eq!(store.graph()[&b][&a], 2);
        assert_eq!(store.graph()[&b][&b], 1);
        assert_eq!(store.region(b).normal_reads_by_key["libA"], 7);
    }

    #[test]
    fn test_discard_with_no_surviving_region_drops_links() {
        let mut store = RegionStore::default();
        let mut links = BTreeMap::new();
        links.insert(0, 2);
        store.merge_into_last_region(&BTreeMap::new(), &links, 0);
        assert!(store.graph().is_empty());
    }

    #[test]
    fn test_mate_lookup_and_read_removal() {
        let mut store = RegionStore::default();
        let a = register_simple(&mut store, 0, &[100, 150]);
        assert_eq!(store.lookup_read_region(0, 150), Some(a));
        assert_eq!(store.lookup_read_region(0, 151), None);

        let mut observed = HashSet::new();
        observed.insert("r0_1".to_string());
        store.remove_observed_reads(a, &observed);
        assert_eq!(store.num_reads_in_region(a), 1);
        assert_eq!(store.lookup_read_region(0, 150), None);
        assert_eq!(store.lookup_read_region(0, 100), Some(a));
    }

    #[test]
    fn test_accumulate_reads_between_regions() {
        let mut store = RegionStore::default();
        for (i, counts) in [3u32, 5, 7].iter().enumerate() {
            let mut by_key = BTreeMap::new();
            by_key.insert("libA".to_string(), *counts);
            store.register_region(
                0,
                1000 * (i as i64 + 1),
                1000 * (i as i64 + 1) + 100,
                0,
                by_key,
                region_reads(0, &[1000 * (i as i64 + 1)]),
                &BTreeMap::new(),
                0,
            );
        }
        // Half-open on the low side: region 0's own counts are excluded
        let acc = store.accumulate_reads_between_regions(0, 2);
        assert_eq!(acc["libA"], 12);
    }

    #[test]
    fn test_remove_region_purges_graph() {
        let mut store = RegionStore::default();
        let a = register_simple(&mut store, 0, &[100, 200]);
        let mut links = BTreeMap::new();
        links.insert(a, 2);
        let b = store.register_region(
            0,
            1000,
            1100,
            0,
            BTreeMap::new(),
            region_reads(0, &[1000, 1100]),
            &links,
            0,
        );

        store.remove_region(a);
        store.assert_graph_invariants();
        assert!(store.graph()[&b].is_empty());
        assert_eq!(store.lookup_read_region(0, 100), None);
    }
}
