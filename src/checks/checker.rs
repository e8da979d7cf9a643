use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::checks::validation::*;
use crate::index::*;
use crate::io::instance_reader::{Instance, InstanceReaderError};
use crate::io::solution_reader::*;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CheckerError {
    #[error("{location} is equipped with {service} in line {}, but never opened", lineno + 1)]
    EquipWithoutOpen {
        lineno: usize,
        location: LocationIdx,
        service: ServiceIdx,
    },

    #[error("Line {} assigns {request} to {location}, which is {violation}", lineno + 1)]
    InvalidAssignment {
        lineno: usize,
        request: Request,
        location: LocationIdx,
        violation: AssignmentViolation,
    },

    #[error("Request {request} is not covered by any opened and equipped location ({count} uncovered requests in total)")]
    UncoveredDemand { request: Request, count: usize },

    #[error("Solution claims cost {claimed}, but opening and equipping costs sum up to {computed}")]
    CostMismatch { claimed: Cost, computed: Cost },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    InstanceReaderError(#[from] InstanceReaderError),

    #[error(transparent)]
    SolutionReaderError(#[from] SolutionReaderError),
}

pub fn load_instance(path: &Path) -> Result<Instance, InstanceReaderError> {
    Instance::read(path, false)
}

/// Reads a solution and rejects it unless it passes validation against `instance`.
/// [`Solution::read`] returns the decisions without validating them.
pub fn load_solution(path: &Path, instance: &Instance) -> Result<Solution, CheckerError> {
    let solution = Solution::read(path, instance, false)?;
    ensure_valid(&validate(instance, &solution))?;
    Ok(solution)
}

pub fn check_instance_only(path: &Path, paranoid: bool) -> Result<Instance, CheckerError> {
    Ok(Instance::read(path, paranoid)?)
}

/// Converts the first violation of the report into an error.
pub fn ensure_valid(report: &ValidationReport) -> Result<(), CheckerError> {
    if let Some(&(lineno, location, service)) = report.equipped_but_closed.first() {
        return Err(CheckerError::EquipWithoutOpen {
            lineno,
            location,
            service,
        });
    }

    if let Some(a) = report.invalid_assignments.first() {
        return Err(CheckerError::InvalidAssignment {
            lineno: a.lineno,
            request: a.request,
            location: a.location,
            violation: a.violation,
        });
    }

    if let Some(&request) = report.uncovered.first() {
        return Err(CheckerError::UncoveredDemand {
            request,
            count: report.uncovered.len(),
        });
    }

    if let Some(claimed) = report.claimed_cost
        && report.cost_matches() == Some(false)
    {
        return Err(CheckerError::CostMismatch {
            claimed,
            computed: report.total_cost(),
        });
    }

    Ok(())
}

// Checks feasibility of solution for instance and if successful returns the validation report
pub fn check_instance_and_solution(
    instance_path: &Path,
    solution_path: &Path,
    paranoid: bool,
) -> Result<(Instance, Solution, ValidationReport), CheckerError> {
    debug!("Check {solution_path:?} against {instance_path:?}");
    let instance_reader = BufReader::new(File::open(instance_path)?);
    let solution_reader = BufReader::new(File::open(solution_path)?);
    check_instance_and_solution_from(instance_reader, solution_reader, paranoid)
}

pub fn check_instance_and_solution_from(
    instance_reader: impl Read,
    solution_reader: impl BufRead,
    paranoid: bool,
) -> Result<(Instance, Solution, ValidationReport), CheckerError> {
    let instance = Instance::read_from(instance_reader, paranoid)?;
    let solution = Solution::read_from(solution_reader, &instance, paranoid)?;
    let report = validate(&instance, &solution);

    ensure_valid(&report)?;
    debug!("Feasible solution found");

    Ok((instance, solution, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::tests::{test_instances, test_instances_directory};
    use crate::io::writer::write_instance;

    #[test]
    fn check_instance_and_solution_valid() {
        for (input, output) in test_instances("valid") {
            check_instance_and_solution(&input, output.as_ref().unwrap(), false)
                .unwrap_or_else(|e| panic!("{input:?}: {e}"));
        }
    }

    #[test]
    fn check_instance_and_solution_valid_paranoid() {
        for (input, output) in test_instances("valid") {
            check_instance_and_solution(&input, output.as_ref().unwrap(), true)
                .unwrap_or_else(|e| panic!("{input:?}: {e}"));
        }
    }

    #[test]
    fn check_instance_and_solution_invalid() {
        for (input, output) in test_instances("invalid") {
            let okay = check_instance_and_solution(&input, output.as_ref().unwrap(), false).is_ok();
            assert!(!okay, "{input:?}");
        }
    }

    #[test]
    fn check_instance_and_solution_invalid_paranoid() {
        for (input, output) in test_instances("invalid") {
            let okay = check_instance_and_solution(&input, output.as_ref().unwrap(), true).is_ok();
            assert!(!okay, "{input:?}");
        }
    }

    #[test]
    fn invalid_solutions_fail_for_their_reason() {
        use crate::io::instance_reader::{InstanceReaderError, InstanceVisitorError};
        use crate::io::line_reader::ReaderError;

        fn visitor_error(e: &CheckerError) -> Option<&SolutionVisitorError> {
            match e {
                CheckerError::SolutionReaderError(SolutionReaderError::VisitorError(e)) => Some(e),
                _ => None,
            }
        }

        let expected: &[(&str, fn(&CheckerError) -> bool)] = &[
            ("assignment_not_admissible", |e| {
                matches!(e, CheckerError::InvalidAssignment { violation: AssignmentViolation::NotAdmissible, .. })
            }),
            ("assignment_not_equipped", |e| {
                matches!(e, CheckerError::InvalidAssignment { violation: AssignmentViolation::NotEquipped, .. })
            }),
            ("broken_instance", |e| {
                matches!(
                    e,
                    CheckerError::InstanceReaderError(InstanceReaderError::VisitorError(
                        InstanceVisitorError::InconsistentLocationCount { .. }
                    ))
                )
            }),
            ("broken_json", |e| {
                matches!(visitor_error(e), Some(SolutionVisitorError::JsonSyntaxError { .. }))
            }),
            ("conflicting_assignment", |e| {
                matches!(visitor_error(e), Some(SolutionVisitorError::ConflictingAssignment { .. }))
            }),
            ("cost_mismatch", |e| matches!(e, CheckerError::CostMismatch { .. })),
            ("equip_without_open", |e| matches!(e, CheckerError::EquipWithoutOpen { .. })),
            ("malformed_directive", |e| {
                matches!(
                    visitor_error(e),
                    Some(SolutionVisitorError::MalformedRow(ReaderError::Arity { .. }))
                )
            }),
            ("negative_claimed_cost", |e| {
                matches!(visitor_error(e), Some(SolutionVisitorError::InvalidClaimedCost { .. }))
            }),
            ("non_numeric_argument", |e| {
                matches!(
                    visitor_error(e),
                    Some(SolutionVisitorError::MalformedRow(ReaderError::InvalidArgument { .. }))
                )
            }),
            ("uncovered_demand", |e| matches!(e, CheckerError::UncoveredDemand { .. })),
            ("unknown_location", |e| {
                matches!(
                    visitor_error(e),
                    Some(SolutionVisitorError::UnknownEntity { entity: Entity::Location(LocationIdx(2)), .. })
                )
            }),
            ("unknown_request", |e| {
                matches!(
                    visitor_error(e),
                    Some(SolutionVisitorError::UnknownEntity { entity: Entity::Request(_), .. })
                )
            }),
            ("unknown_service", |e| {
                matches!(
                    visitor_error(e),
                    Some(SolutionVisitorError::UnknownEntity { entity: Entity::Service(ServiceIdx(2)), .. })
                )
            }),
        ];

        let fixtures = test_instances("invalid");
        assert_eq!(fixtures.len(), expected.len());

        for (input, output) in fixtures {
            let name = input.file_stem().unwrap().to_str().unwrap();
            let (_, is_expected) = expected
                .iter()
                .find(|(n, _)| *n == name)
                .unwrap_or_else(|| panic!("no expectation for {input:?}"));

            let error = check_instance_and_solution(&input, output.as_ref().unwrap(), false)
                .err()
                .unwrap_or_else(|| panic!("{input:?} was accepted"));
            assert!(is_expected(&error), "{input:?}: {error}");
        }
    }

    #[test]
    fn check_instance_only_invalid_paranoid() {
        for (input, _) in test_instances("instance_only") {
            assert!(check_instance_only(&input, true).is_err(), "{input:?}");
        }
    }

    #[test]
    fn check_instance_only_valid() {
        for (input, _) in test_instances("valid") {
            assert!(check_instance_only(&input, false).is_ok(), "{input:?}");
        }
    }

    #[test]
    fn check_instance_only_valid_paranoid() {
        for (input, _) in test_instances("valid") {
            assert!(check_instance_only(&input, true).is_ok(), "{input:?}");
        }
    }

    #[test]
    fn valid_solutions_cover_every_request() {
        for (input, output) in test_instances("valid") {
            let (instance, _solution, report) =
                check_instance_and_solution(&input, output.as_ref().unwrap(), false).unwrap();

            for (request, _) in instance.coverage().requests() {
                let location = report.assignment[request];
                assert!(instance.coverage().is_admissible(request, location));
            }
            assert_eq!(report.cost_matches(), Some(true), "{input:?}");
        }
    }

    #[test]
    fn valid_instances_survive_roundtrip() {
        for (input, _) in test_instances("valid") {
            let instance = load_instance(&input).unwrap();

            let mut buffer = Vec::new();
            write_instance(&instance, &mut buffer).unwrap();
            let reread = Instance::read_from(&buffer[..], true).unwrap();

            let triplets = |i: &Instance| i.triplets().iter().map(|(_, t)| *t).collect::<Vec<_>>();
            assert_eq!(triplets(&instance), triplets(&reread));
            assert_eq!(instance.opening_costs, reread.opening_costs);
            assert_eq!(instance.equip_costs, reread.equip_costs);
        }
    }

    #[test]
    fn worked_example() {
        let dir = test_instances_directory("tiny");
        let instance = load_instance(&dir.join("example.csv")).unwrap();

        let solution = load_solution(&dir.join("example.sol"), &instance).unwrap();
        let report = validate(&instance, &solution);
        assert!(report.is_valid());
        assert_eq!(report.total_cost(), 11.0);
        assert_eq!(
            report.assignment[&Request::new(ServiceIdx(0), DemandIdx(31))],
            LocationIdx(2)
        );

        assert!(matches!(
            load_solution(&dir.join("example_unequipped.sol"), &instance),
            Err(CheckerError::UncoveredDemand { count: 1, .. })
        ));
        let near_miss = Solution::read(&dir.join("example_unequipped.sol"), &instance, true).unwrap();
        assert!(near_miss.is_open(LocationIdx(4)));

        let result = check_instance_and_solution(
            &dir.join("example.csv"),
            &dir.join("example_unequipped.sol"),
            false,
        );
        assert!(matches!(
            result,
            Err(CheckerError::UncoveredDemand { count: 1, .. })
        ));
    }

    #[test]
    fn report_errors_are_ordered() {
        let instance = "service,location,point,opening_costs,equip_costs\n0,0,0,1,1\n0,1,0,1,\n";

        let check = |solution: &str| {
            check_instance_and_solution_from(instance.as_bytes(), solution.as_bytes(), false)
        };

        assert!(matches!(
            check("equip 1 0\n"),
            Err(CheckerError::EquipWithoutOpen { lineno: 0, .. })
        ));
        assert!(matches!(
            check("assign 0 0 1\n"),
            Err(CheckerError::InvalidAssignment {
                violation: AssignmentViolation::NotOpen,
                ..
            })
        ));
        assert!(matches!(
            check("open 1\n"),
            Err(CheckerError::UncoveredDemand { count: 1, .. })
        ));
        assert!(matches!(
            check("#s cost 3\nopen 1\nequip 1 0\n"),
            Err(CheckerError::CostMismatch { .. })
        ));
        assert!(check("#s cost 2\nopen 1\nequip 1 0\n").is_ok());
        assert!(matches!(
            check("open 2\n"),
            Err(CheckerError::SolutionReaderError(..))
        ));
    }
}
