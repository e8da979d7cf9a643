use crate::digest::digest_output::{
    DIGEST_BYTES, DigestBuilder, DigestError, InstanceDigest, SolutionDigest,
};
use crate::index::*;
use crate::io::{instance_reader::Instance, solution_reader::Solution};
use sha2::{Digest, Sha256};

type Algo = Sha256;

/// Logarithmic size class in `0..=0xf`; zero and one share class 0.
fn size_score(value: u32, offset: u32) -> u8 {
    value
        .checked_ilog2()
        .unwrap_or(0)
        .saturating_sub(offset)
        .min(0xf) as u8
}

/// Computes the digest of an instance. The digest is invariant in the order of the triplet
/// rows, in duplicated triplets, and in the layout of the equip-cost columns. The first digit
/// indicates the approximate number of locations, the second the approximate number of
/// demand points (both in a logarithmic scale).
pub fn digest_instance(instance: &Instance) -> InstanceDigest {
    let mut hasher = Algo::new();

    hasher.update(instance.num_services().to_le_bytes());
    hasher.update(instance.num_locations().to_le_bytes());
    hasher.update(instance.num_demand_points().to_le_bytes());

    for t in instance.coverage().triplets() {
        hasher.update(t.service.0.to_le_bytes());
        hasher.update(t.location.0.to_le_bytes());
        hasher.update(t.demand.0.to_le_bytes());
    }

    for &cost in &instance.opening_costs {
        hasher.update(cost.to_bits().to_le_bytes());
    }

    for l in 0..instance.num_locations() {
        for f in 0..instance.num_services() {
            let cost = instance
                .equip_cost(LocationIdx(l), ServiceIdx(f))
                .map_or(u64::MAX, f64::to_bits);
            hasher.update(cost.to_le_bytes());
        }
    }

    let hash = hasher.finalize();

    let build = || -> Result<InstanceDigest, DigestError> {
        DigestBuilder::default()
            .push_u4(size_score(instance.num_locations(), 1))?
            .push_u4(size_score(instance.num_demand_points(), 3))?
            .push_slice(&hash[..DIGEST_BYTES - 1])?
            .build()
    };
    build().expect("prefix and hash fill the digest exactly")
}

/// Computes the digest of a solution over its opened locations and equipped pairs; neither
/// order nor repeated decisions matter. The first four digits are the number of opened
/// locations (clamped at 0xffff).
pub fn digest_solution(solution: &Solution) -> SolutionDigest {
    let mut hasher = Algo::new();

    hasher.update((solution.num_opened() as u64).to_le_bytes());
    for location in solution.opened() {
        hasher.update(location.0.to_le_bytes());
    }

    hasher.update((solution.num_equipped() as u64).to_le_bytes());
    for (location, service) in solution.equipped() {
        hasher.update(location.0.to_le_bytes());
        hasher.update(service.0.to_le_bytes());
    }

    let hash = hasher.finalize();
    let opened = solution.num_opened().min(0xffff) as u16;

    let build = || -> Result<SolutionDigest, DigestError> {
        DigestBuilder::default()
            .push_u16(opened)?
            .push_slice(&hash[..DIGEST_BYTES - 2])?
            .build()
    };
    build().expect("prefix and hash fill the digest exactly")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(data: &str) -> Instance {
        Instance::read_from(data.as_bytes(), false).unwrap()
    }

    #[test]
    fn instance_digest_ignores_order_duplicates_and_layout() {
        let instances = [
            "service,location,point,opening_costs,equip_costs\n\
             0,0,0,10,1\n\
             0,1,1,7,2\n\
             1,1,1,,\n",
            "service,location,point,opening_costs,equip_costs\n\
             1,1,1,10,1\n\
             0,1,1,7,2\n\
             0,0,0,,\n\
             1,1,1,,\n",
            "service,location,point,opening_costs,equip_costs_0,equip_costs_1\n\
             0,0,0,10,1,2\n\
             0,1,1,7,1,2\n\
             1,1,1,,,\n",
        ];

        let digests: Vec<_> = instances.iter().map(|d| digest_instance(&instance(d))).collect();
        assert!(digests.windows(2).all(|w| w[0] == w[1]), "{digests:?}");
    }

    #[test]
    fn instance_digest_depends_on_costs() {
        let a = instance("service,location,point,opening_costs,equip_costs\n0,0,0,10,1\n0,1,0,7,\n");
        let b = instance("service,location,point,opening_costs,equip_costs\n0,0,0,10,1\n0,1,0,8,\n");
        assert_ne!(digest_instance(&a), digest_instance(&b));
    }

    #[test]
    fn instance_digest_prefix() {
        let data = "service,location,point,opening_costs,equip_costs\n0,0,0,1,1\n0,1,0,1,\n";
        let digest = digest_instance(&instance(data));
        // two locations and a single demand point
        assert_eq!(digest.to_binary()[0], 0x00);
    }

    #[test]
    fn solution_digest() {
        let inst = instance(
            "service,location,point,opening_costs,equip_costs\n0,0,0,1,1\n0,1,0,1,\n0,2,0,1,\n",
        );
        let read = |data: &str| Solution::read_from(data.as_bytes(), &inst, false).unwrap();

        let a = digest_solution(&read("open 2\nopen 0\nequip 0 0\n"));
        let b = digest_solution(&read("equip 0 0\nopen 0\nopen 2\nopen 0\n"));
        let c = digest_solution(&read("open 2\nopen 0\nequip 2 0\n"));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_binary()[..2], [0x00, 0x02]);
    }
}
