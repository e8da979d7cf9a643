use std::{
    collections::{BTreeMap, btree_map::Entry},
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use tracing::{debug, error, warn};

use crate::index::*;
use crate::io::instance_reader::Instance;
use crate::io::line_reader::*;
use thiserror::Error;

pub const COST_KEY: &str = "cost";

#[derive(Debug, Error)]
pub enum SolutionReaderError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Error while reading solution: {0}")]
    VisitorError(#[from] SolutionVisitorError),

    #[error("Warning while reading solution (paranoid mode): {0}")]
    VisitorWarning(#[from] SolutionVisitorWarning),
}

/// Decisions of a solution; every entry keeps the 0-based line it was read from.
#[derive(Clone, Debug, Default)]
pub struct Solution {
    pub opened: BTreeMap<LocationIdx, usize>,
    pub equipped: BTreeMap<(LocationIdx, ServiceIdx), usize>,
    pub assignments: BTreeMap<Request, (usize, LocationIdx)>,
    pub stride_lines: Vec<(String, serde_json::Value)>,
    pub claimed_cost: Option<Cost>,
}

impl Solution {
    pub fn num_opened(&self) -> usize {
        self.opened.len()
    }

    pub fn num_equipped(&self) -> usize {
        self.equipped.len()
    }

    pub fn is_open(&self, location: LocationIdx) -> bool {
        self.opened.contains_key(&location)
    }

    pub fn is_equipped(&self, location: LocationIdx, service: ServiceIdx) -> bool {
        self.equipped.contains_key(&(location, service))
    }

    pub fn opened(&self) -> impl Iterator<Item = LocationIdx> + '_ {
        self.opened.keys().copied()
    }

    pub fn equipped(&self) -> impl Iterator<Item = (LocationIdx, ServiceIdx)> + '_ {
        self.equipped.keys().copied()
    }

    /// Objective value stated in the `#s cost` line, if any.
    pub fn claimed_cost(&self) -> Option<Cost> {
        self.claimed_cost
    }

    pub fn read(
        path: &Path,
        instance: &Instance,
        paranoid: bool,
    ) -> Result<Self, SolutionReaderError> {
        debug!("Read solution from {path:?}");
        let file = File::open(path)?;
        Self::read_from(BufReader::new(file), instance, paranoid)
    }

    pub fn read_from(
        reader: impl BufRead,
        instance: &Instance,
        paranoid: bool,
    ) -> Result<Self, SolutionReaderError> {
        let mut visitor = SolutionInputVisitor::process(reader, instance);

        if !visitor.errors.is_empty() || !visitor.warnings.is_empty() {
            for w in &visitor.warnings {
                warn!(" {w}");
            }

            for e in &visitor.errors {
                error!(" {e}");
            }

            if !visitor.errors.is_empty() {
                return Err(SolutionReaderError::VisitorError(visitor.errors.remove(0)));
            }

            if paranoid {
                return Err(SolutionReaderError::VisitorWarning(
                    visitor.warnings.remove(0),
                ));
            }
        }

        Ok(std::mem::take(&mut visitor.solution))
    }
}

pub struct SolutionInputVisitor<'a> {
    pub errors: Vec<SolutionVisitorError>,
    pub warnings: Vec<SolutionVisitorWarning>,
    pub solution: Solution,
    instance: &'a Instance,
}

#[derive(Error, Debug)]
pub enum SolutionVisitorError {
    #[error("Line {} references {entity}, which does not exist in the instance", lineno + 1)]
    UnknownEntity { lineno: usize, entity: Entity },

    #[error("Line {} assigns {request} to {location}, but line {} already assigned it to {previous}", lineno + 1, first_lineno + 1)]
    ConflictingAssignment {
        lineno: usize,
        first_lineno: usize,
        request: Request,
        location: LocationIdx,
        previous: LocationIdx,
    },

    #[error("Line {} claims cost {value}, which is not a non-negative number", lineno + 1)]
    InvalidClaimedCost {
        lineno: usize,
        value: serde_json::Value,
    },

    #[error("Line {} has invalid JSON syntax: {source}", lineno + 1)]
    JsonSyntaxError {
        lineno: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    MalformedRow(#[from] ReaderError),
}

#[derive(Debug, Error, PartialEq)]
pub enum SolutionVisitorWarning {
    #[error("Line {} has extra whitespace", lineno + 1)]
    ExtraWhitespace { lineno: usize },

    #[error("Line {} starts with `#`, but is neither a comment ('# ') nor a metadata line ('#s key value')", lineno + 1)]
    UnrecognizedDashLine { lineno: usize },

    #[error("Line {} is neither a comment nor an `open`, `equip` or `assign` directive", lineno + 1)]
    UnrecognizedLine { lineno: usize },

    #[error("Line {} repeats the decision of line {}", lineno + 1, first_lineno + 1)]
    DuplicateDecision { lineno: usize, first_lineno: usize },
}

impl SolutionInputVisitor<'_> {
    fn unknown(&mut self, lineno: usize, entity: Entity) -> Action {
        self.errors
            .push(SolutionVisitorError::UnknownEntity { lineno, entity });
        Action::Continue
    }

    fn duplicate(&mut self, lineno: usize, first_lineno: usize) {
        self.warnings
            .push(SolutionVisitorWarning::DuplicateDecision {
                lineno,
                first_lineno,
            });
    }
}

impl SolutionVisitor for SolutionInputVisitor<'_> {
    fn visit_open(&mut self, lineno: usize, location: u32) -> Action {
        let location = LocationIdx(location);
        if !self.instance.has_location(location) {
            return self.unknown(lineno, Entity::Location(location));
        }

        if let Some(&first_lineno) = self.solution.opened.get(&location) {
            self.duplicate(lineno, first_lineno);
        } else {
            self.solution.opened.insert(location, lineno);
        }

        Action::Continue
    }

    fn visit_equip(&mut self, lineno: usize, location: u32, service: u32) -> Action {
        let (location, service) = (LocationIdx(location), ServiceIdx(service));
        if !self.instance.has_location(location) {
            return self.unknown(lineno, Entity::Location(location));
        }
        if !self.instance.has_service(service) {
            return self.unknown(lineno, Entity::Service(service));
        }

        if let Some(&first_lineno) = self.solution.equipped.get(&(location, service)) {
            self.duplicate(lineno, first_lineno);
        } else {
            self.solution.equipped.insert((location, service), lineno);
        }

        Action::Continue
    }

    fn visit_assign(&mut self, lineno: usize, service: u32, demand: u32, location: u32) -> Action {
        let (service, demand, location) =
            (ServiceIdx(service), DemandIdx(demand), LocationIdx(location));
        let request = Request::new(service, demand);

        if !self.instance.has_service(service) {
            return self.unknown(lineno, Entity::Service(service));
        }
        if !self.instance.has_demand_point(demand) {
            return self.unknown(lineno, Entity::Demand(demand));
        }
        if !self.instance.coverage().contains_request(&request) {
            return self.unknown(lineno, Entity::Request(request));
        }
        if !self.instance.has_location(location) {
            return self.unknown(lineno, Entity::Location(location));
        }

        match self.solution.assignments.entry(request) {
            Entry::Vacant(slot) => {
                slot.insert((lineno, location));
            }
            Entry::Occupied(prev) => {
                let (first_lineno, previous) = *prev.get();
                if previous == location {
                    self.duplicate(lineno, first_lineno);
                } else {
                    self.errors
                        .push(SolutionVisitorError::ConflictingAssignment {
                            lineno,
                            first_lineno,
                            request,
                            location,
                            previous,
                        });
                }
            }
        }

        Action::Continue
    }

    fn visit_stride_line(&mut self, lineno: usize, _line: &str, key: &str, value: &str) -> Action {
        match serde_json::from_str::<serde_json::Value>(value) {
            Ok(json_value) => {
                if key == COST_KEY {
                    match json_value.as_f64() {
                        Some(cost) if cost.is_finite() && cost >= 0.0 => {
                            self.solution.claimed_cost = Some(cost)
                        }
                        _ => self
                            .errors
                            .push(SolutionVisitorError::InvalidClaimedCost {
                                lineno,
                                value: json_value.clone(),
                            }),
                    }
                }
                self.solution
                    .stride_lines
                    .push((key.to_string(), json_value));
            }
            Err(e) => {
                self.errors
                    .push(SolutionVisitorError::JsonSyntaxError { lineno, source: e });
            }
        }

        Action::Continue
    }

    fn visit_line_with_extra_whitespace(&mut self, lineno: usize, _line: &str) -> Action {
        self.warnings
            .push(SolutionVisitorWarning::ExtraWhitespace { lineno });
        Action::Continue
    }

    fn visit_unrecognized_dash_line(&mut self, lineno: usize, _line: &str) -> Action {
        self.warnings
            .push(SolutionVisitorWarning::UnrecognizedDashLine { lineno });
        Action::Continue
    }

    fn visit_unrecognized_line(&mut self, lineno: usize, _line: &str) -> Action {
        self.warnings
            .push(SolutionVisitorWarning::UnrecognizedLine { lineno });
        Action::Continue
    }
}

impl<'a> SolutionInputVisitor<'a> {
    pub fn process(reader: impl BufRead, instance: &'a Instance) -> SolutionInputVisitor<'a> {
        let mut visitor = SolutionInputVisitor {
            errors: Vec::new(),
            warnings: Vec::new(),
            solution: Solution::default(),
            instance,
        };
        let mut solution_reader = LineReader::new(&mut visitor);

        if let Err(e) = solution_reader.read(reader) {
            visitor.errors.push(SolutionVisitorError::MalformedRow(e));
        }

        visitor
    }
}
