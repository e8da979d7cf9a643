use crate::index::*;
use crate::io::{instance_reader::Instance, solution_reader::Solution};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use tracing::debug;

/// Relative tolerance when comparing a claimed objective value against the computed one.
pub const COST_TOLERANCE: f64 = 1e-6;

pub fn costs_agree(a: Cost, b: Cost) -> bool {
    (a - b).abs() <= COST_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignmentViolation {
    NotAdmissible,
    NotOpen,
    NotEquipped,
}

impl Display for AssignmentViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AssignmentViolation::NotAdmissible => "not admissible for this request",
            AssignmentViolation::NotOpen => "not opened",
            AssignmentViolation::NotEquipped => "not equipped with the requested service",
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct InvalidAssignment {
    pub lineno: usize,
    pub request: Request,
    pub location: LocationIdx,
    pub violation: AssignmentViolation,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationReport {
    /// Requests without an admissible, opened and equipped location.
    pub uncovered: Vec<Request>,
    /// `(lineno, location, service)` of equip decisions at locations that are never opened.
    pub equipped_but_closed: Vec<(usize, LocationIdx, ServiceIdx)>,
    pub invalid_assignments: Vec<InvalidAssignment>,
    /// Location serving each covered request.
    pub assignment: BTreeMap<Request, LocationIdx>,
    pub opening_cost: Cost,
    pub equipping_cost: Cost,
    pub claimed_cost: Option<Cost>,
}

impl ValidationReport {
    pub fn total_cost(&self) -> Cost {
        self.opening_cost + self.equipping_cost
    }

    pub fn is_covering(&self) -> bool {
        self.uncovered.is_empty()
    }

    pub fn is_feasible(&self) -> bool {
        self.is_covering()
            && self.equipped_but_closed.is_empty()
            && self.invalid_assignments.is_empty()
    }

    /// `None` if the solution does not state its cost.
    pub fn cost_matches(&self) -> Option<bool> {
        self.claimed_cost
            .map(|claimed| costs_agree(claimed, self.total_cost()))
    }

    pub fn is_valid(&self) -> bool {
        self.is_feasible() && self.cost_matches() != Some(false)
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "feasible": self.is_feasible(),
            "total_cost": self.total_cost(),
            "opening_cost": self.opening_cost,
            "equipping_cost": self.equipping_cost,
            "claimed_cost": self.claimed_cost,
            "cost_matches": self.cost_matches(),
            "uncovered": self.uncovered.iter().map(|r| json!({
                "service": r.service.0,
                "point": r.demand.0,
            })).collect::<Vec<_>>(),
            "equipped_but_closed": self.equipped_but_closed.iter().map(|(lineno, l, f)| json!({
                "line": lineno + 1,
                "location": l.0,
                "service": f.0,
            })).collect::<Vec<_>>(),
            "invalid_assignments": self.invalid_assignments.iter().map(|a| json!({
                "line": a.lineno + 1,
                "service": a.request.service.0,
                "point": a.request.demand.0,
                "location": a.location.0,
                "violation": a.violation.to_string(),
            })).collect::<Vec<_>>(),
            "assignment": self.assignment.iter().map(|(r, l)| json!([r.service.0, r.demand.0, l.0])).collect::<Vec<_>>(),
        })
    }
}

/// Checks the solution against every invariant of the instance. Violations are
/// collected in the report rather than returned as errors.
pub fn validate(instance: &Instance, solution: &Solution) -> ValidationReport {
    let mut report = ValidationReport {
        claimed_cost: solution.claimed_cost(),
        ..Default::default()
    };

    report.opening_cost = solution
        .opened()
        .filter_map(|l| instance.opening_cost(l))
        .sum();

    report.equipping_cost = solution
        .equipped()
        .filter_map(|(l, f)| instance.equip_cost(l, f))
        .sum();

    report.equipped_but_closed = solution
        .equipped
        .iter()
        .filter(|((l, _), _)| !solution.is_open(*l))
        .map(|(&(l, f), &lineno)| (lineno, l, f))
        .collect();

    let serves = |location: LocationIdx, service: ServiceIdx| {
        solution.is_open(location) && solution.is_equipped(location, service)
    };

    for (request, &(lineno, location)) in &solution.assignments {
        let violation = if !instance.coverage().is_admissible(request, location) {
            Some(AssignmentViolation::NotAdmissible)
        } else if !solution.is_open(location) {
            Some(AssignmentViolation::NotOpen)
        } else if !solution.is_equipped(location, request.service) {
            Some(AssignmentViolation::NotEquipped)
        } else {
            None
        };

        if let Some(violation) = violation {
            report.invalid_assignments.push(InvalidAssignment {
                lineno,
                request: *request,
                location,
                violation,
            });
        }
    }

    for (request, admissible) in instance.coverage().requests() {
        let explicit = solution
            .assignments
            .get(request)
            .map(|&(_, l)| l)
            .filter(|&l| admissible.contains(&l) && serves(l, request.service));

        let location = explicit.or_else(|| {
            admissible
                .iter()
                .copied()
                .find(|&l| serves(l, request.service))
        });

        match location {
            Some(l) => {
                report.assignment.insert(*request, l);
            }
            None => report.uncovered.push(*request),
        }
    }

    debug!(
        "Validated solution: {} uncovered, {} equipped but closed, {} invalid assignments, cost {}",
        report.uncovered.len(),
        report.equipped_but_closed.len(),
        report.invalid_assignments.len(),
        report.total_cost()
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    // Opening costs [10, 7, 5, 9, 12]; equipping service 0 costs 3 at location 4 and 6 at location 2.
    const INSTANCE: &str = "service,location,point,opening_costs,equip_costs_0\n\
                            0,0,0,10,1\n\
                            0,1,0,7,1\n\
                            0,2,31,5,6\n\
                            0,3,0,9,1\n\
                            0,4,31,12,3\n";

    fn check(solution: &str) -> ValidationReport {
        let instance = Instance::read_from(INSTANCE.as_bytes(), false).unwrap();
        let solution = Solution::read_from(solution.as_bytes(), &instance, false).unwrap();
        validate(&instance, &solution)
    }

    fn req(f: u32, u: u32) -> Request {
        Request::new(ServiceIdx(f), DemandIdx(u))
    }

    #[test]
    fn open_and_equip_covers() {
        let report = check("open 2\nequip 2 0\nopen 0\nequip 0 0\n");
        assert!(report.is_feasible());
        assert_eq!(report.opening_cost, 15.0);
        assert_eq!(report.equipping_cost, 7.0);
        assert_eq!(report.total_cost(), 22.0);
        assert_eq!(report.assignment[&req(0, 31)], LocationIdx(2));
        assert_eq!(report.assignment[&req(0, 0)], LocationIdx(0));
        assert_eq!(report.cost_matches(), None);
        assert!(report.is_valid());
    }

    #[test]
    fn open_without_equip_is_uncovered() {
        let report = check("open 4\nopen 0\nequip 0 0\n");
        assert!(!report.is_feasible());
        assert_eq!(report.uncovered, vec![req(0, 31)]);
    }

    #[test]
    fn equip_without_open() {
        let report = check("open 0\nequip 0 0\nequip 4 0\n");
        assert_eq!(
            report.equipped_but_closed,
            vec![(2, LocationIdx(4), ServiceIdx(0))]
        );
        assert_eq!(report.uncovered, vec![req(0, 31)]);
        assert_eq!(report.equipping_cost, 4.0);
    }

    #[test]
    fn explicit_assignment_wins() {
        let report = check("open 0\nequip 0 0\nopen 2\nequip 2 0\nopen 4\nequip 4 0\nassign 0 31 4\n");
        assert!(report.is_feasible());
        assert_eq!(report.assignment[&req(0, 31)], LocationIdx(4));
    }

    #[test]
    fn invalid_assignments() {
        let report = check(
            "open 0\nequip 0 0\nopen 2\nassign 0 31 0\nassign 0 0 2\n",
        );
        assert_eq!(report.invalid_assignments.len(), 2);
        assert_eq!(
            report.invalid_assignments[0],
            InvalidAssignment {
                lineno: 4,
                request: req(0, 0),
                location: LocationIdx(2),
                violation: AssignmentViolation::NotAdmissible,
            }
        );
        assert_eq!(
            report.invalid_assignments[1].violation,
            AssignmentViolation::NotAdmissible
        );
    }

    #[test]
    fn assignment_to_closed_or_unequipped() {
        let report = check("open 0\nequip 0 0\nequip 2 0\nassign 0 31 2\n");
        assert_eq!(
            report.invalid_assignments[0].violation,
            AssignmentViolation::NotOpen
        );

        let report = check("open 0\nequip 0 0\nopen 2\nassign 0 31 2\n");
        assert_eq!(
            report.invalid_assignments[0].violation,
            AssignmentViolation::NotEquipped
        );
        assert_eq!(report.uncovered, vec![req(0, 31)]);
    }

    #[test]
    fn claimed_cost() {
        let report = check("#s cost 22\nopen 2\nequip 2 0\nopen 0\nequip 0 0\n");
        assert_eq!(report.cost_matches(), Some(true));

        let report = check("#s cost 21.5\nopen 2\nequip 2 0\nopen 0\nequip 0 0\n");
        assert_eq!(report.cost_matches(), Some(false));
        assert!(report.is_feasible());
        assert!(!report.is_valid());
    }

    #[test]
    fn duplicate_triplets_do_not_double_count() {
        let data = "service,location,point,opening_costs,equip_costs\n\
                    0,0,0,10,1\n\
                    0,0,0,,\n";
        let instance = Instance::read_from(data.as_bytes(), false).unwrap();
        let solution = Solution::read_from(&b"open 0\nequip 0 0\n"[..], &instance, false).unwrap();
        let report = validate(&instance, &solution);

        assert!(report.is_feasible());
        assert_eq!(report.assignment.len(), 1);
        assert_eq!(report.total_cost(), 11.0);
    }

    #[test]
    fn costs_agree_relative() {
        assert!(costs_agree(13.0, 13.0));
        assert!(costs_agree(1e9, 1e9 + 1.0));
        assert!(!costs_agree(13.0, 13.01));
        assert!(costs_agree(0.0, 1e-7));
    }

    #[test]
    fn json_report() {
        let report = check("open 4\nopen 0\nequip 0 0\n");
        let json = report.to_json();
        assert_eq!(json["feasible"], false);
        assert_eq!(json["total_cost"], 23.0);
        assert_eq!(json["uncovered"][0]["point"], 31);
        assert_eq!(json["cost_matches"], serde_json::Value::Null);
    }
}
