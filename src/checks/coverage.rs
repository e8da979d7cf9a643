use crate::index::*;
use std::collections::{BTreeMap, BTreeSet};

/// Maps every request `(f, u)` to the set of locations admissible for it.
/// Duplicate triplets collapse into a single entry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CoverageIndex {
    admissible: BTreeMap<Request, BTreeSet<LocationIdx>>,
    num_triplets: usize,
}

impl CoverageIndex {
    /// Inserts a triplet and returns `false` if it was already present.
    pub fn insert(&mut self, triplet: Triplet) -> bool {
        let is_new = self
            .admissible
            .entry(triplet.request())
            .or_default()
            .insert(triplet.location);

        self.num_triplets += is_new as usize;
        is_new
    }

    pub fn admissible(&self, request: &Request) -> Option<&BTreeSet<LocationIdx>> {
        self.admissible.get(request)
    }

    pub fn is_admissible(&self, request: &Request, location: LocationIdx) -> bool {
        self.admissible
            .get(request)
            .is_some_and(|locs| locs.contains(&location))
    }

    pub fn contains_request(&self, request: &Request) -> bool {
        self.admissible.contains_key(request)
    }

    pub fn requests(&self) -> impl Iterator<Item = (&Request, &BTreeSet<LocationIdx>)> + '_ {
        self.admissible.iter()
    }

    pub fn num_requests(&self) -> usize {
        self.admissible.len()
    }

    /// Number of distinct triplets.
    pub fn num_triplets(&self) -> usize {
        self.num_triplets
    }

    /// Distinct triplets in `(service, location, demand)` order.
    pub fn triplets(&self) -> Vec<Triplet> {
        let mut result: Vec<_> = self
            .admissible
            .iter()
            .flat_map(|(req, locs)| {
                locs.iter().map(|&location| Triplet {
                    service: req.service,
                    location,
                    demand: req.demand,
                })
            })
            .collect();
        result.sort_unstable();
        result
    }

    pub fn services(&self) -> BTreeSet<ServiceIdx> {
        self.admissible.keys().map(|r| r.service).collect()
    }

    pub fn demand_points(&self) -> BTreeSet<DemandIdx> {
        self.admissible.keys().map(|r| r.demand).collect()
    }

    pub fn locations(&self) -> BTreeSet<LocationIdx> {
        self.admissible.values().flatten().copied().collect()
    }

    /// For each location, the number of distinct demand points it can serve.
    pub fn demand_points_per_location(&self) -> BTreeMap<LocationIdx, usize> {
        let mut per_location: BTreeMap<LocationIdx, BTreeSet<DemandIdx>> = BTreeMap::new();
        for (req, locs) in &self.admissible {
            for &l in locs {
                per_location.entry(l).or_default().insert(req.demand);
            }
        }

        per_location
            .into_iter()
            .map(|(l, points)| (l, points.len()))
            .collect()
    }
}

impl FromIterator<Triplet> for CoverageIndex {
    fn from_iter<T: IntoIterator<Item = Triplet>>(iter: T) -> Self {
        let mut index = CoverageIndex::default();
        for t in iter {
            index.insert(t);
        }
        index
    }
}
