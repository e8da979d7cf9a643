use crate::index::*;
use crate::io::instance_reader::Instance;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq)]
pub struct InstanceStatistics {
    pub num_services: u32,
    pub num_locations: u32,
    pub num_demand_points: u32,
    pub num_requests: usize,
    pub num_triplets: usize,
    pub num_duplicate_rows: usize,
    /// Location that can serve the most demand points, and how many.
    pub busiest_location: Option<(LocationIdx, usize)>,
}

/// Balance diagnostics in the spirit of the instance generator: a location connected
/// to more than half of all nodes makes an instance too easy; if even the best location
/// reaches only a tiny share, coverage is too sparse.
#[derive(Debug, Error, PartialEq)]
pub enum BalanceLint {
    #[error("{location} can serve more than half of all nodes ({percent}%)")]
    DominantLocation { location: LocationIdx, percent: u32 },

    #[error("Location with most demand points can serve only {percent}% of all nodes")]
    WeakestCoverage { percent: u32 },
}

impl InstanceStatistics {
    pub fn of(instance: &Instance) -> Self {
        let coverage = instance.coverage();

        let busiest_location = coverage
            .demand_points_per_location()
            .into_iter()
            .max_by(|(la, a), (lb, b)| a.cmp(b).then(lb.cmp(la)));

        Self {
            num_services: instance.num_services(),
            num_locations: instance.num_locations(),
            num_demand_points: coverage.demand_points().len() as u32,
            num_requests: coverage.num_requests(),
            num_triplets: coverage.num_triplets(),
            num_duplicate_rows: instance.triplets().len() - coverage.num_triplets(),
            busiest_location,
        }
    }

    /// Degree centrality of the busiest location in the bipartite location/demand graph.
    pub fn max_centrality(&self) -> f64 {
        let nodes = (self.num_locations + self.num_demand_points) as f64;
        match self.busiest_location {
            Some((_, degree)) if nodes > 1.0 => degree as f64 / (nodes - 1.0),
            _ => 0.0,
        }
    }

    pub fn lints(&self) -> Vec<BalanceLint> {
        let centrality = self.max_centrality();
        let percent = (100.0 * centrality).floor() as u32;
        let mut lints = Vec::new();

        if let Some((location, _)) = self.busiest_location
            && centrality > 0.5
        {
            lints.push(BalanceLint::DominantLocation { location, percent });
        } else if self.num_locations > 0 && centrality < 2.0 / self.num_locations as f64 {
            lints.push(BalanceLint::WeakestCoverage { percent });
        }

        lints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(data: &str) -> InstanceStatistics {
        InstanceStatistics::of(&Instance::read_from(data.as_bytes(), false).unwrap())
    }

    #[test]
    fn counts() {
        let s = stats(
            "service,location,point,opening_costs,equip_costs\n\
             0,0,0,1,1\n\
             0,0,1,1,1\n\
             0,1,1,,\n\
             1,1,2,,\n\
             1,1,2,,\n",
        );

        assert_eq!(s.num_services, 2);
        assert_eq!(s.num_locations, 2);
        assert_eq!(s.num_demand_points, 3);
        assert_eq!(s.num_requests, 3);
        assert_eq!(s.num_triplets, 4);
        assert_eq!(s.num_duplicate_rows, 1);
        // both locations serve two points; ties go to the smaller index
        assert_eq!(s.busiest_location, Some((LocationIdx(0), 2)));
        assert_eq!(s.max_centrality(), 0.5);
        assert_eq!(s.lints(), vec![BalanceLint::WeakestCoverage { percent: 50 }]);
    }

    #[test]
    fn dominant_location() {
        let s = stats(
            "service,location,point,opening_costs,equip_costs\n\
             0,0,0,1,1\n\
             0,0,1,1,\n\
             0,0,2,,\n\
             0,1,2,,\n",
        );

        assert_eq!(s.busiest_location, Some((LocationIdx(0), 3)));
        assert_eq!(
            s.lints(),
            vec![BalanceLint::DominantLocation {
                location: LocationIdx(0),
                percent: 75
            }]
        );
    }

    #[test]
    fn weak_coverage() {
        let s = InstanceStatistics {
            num_services: 1,
            num_locations: 100,
            num_demand_points: 1000,
            num_requests: 1000,
            num_triplets: 1000,
            num_duplicate_rows: 0,
            busiest_location: Some((LocationIdx(7), 10)),
        };

        assert_eq!(s.lints(), vec![BalanceLint::WeakestCoverage { percent: 0 }]);
    }
}
