use crate::checks::coverage::CoverageIndex;
use crate::index::*;

use std::{
    collections::{BTreeMap, HashMap, hash_map::Entry},
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use csv::StringRecord;
use thiserror::Error;
use tracing::{debug, error, warn};

pub const SERVICE_COLUMN: &str = "service";
pub const LOCATION_COLUMN: &str = "location";
pub const POINT_COLUMN: &str = "point";
pub const OPENING_COSTS_COLUMN: &str = "opening_costs";
pub const EQUIP_COSTS_COLUMN: &str = "equip_costs";
pub const EQUIP_COSTS_PREFIX: &str = "equip_costs_";

#[derive(Debug, Error)]
pub enum InstanceReaderError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Error while reading instance: {0}")]
    VisitorError(#[from] InstanceVisitorError),
    #[error("Warning while reading instance (paranoid mode): {0}")]
    VisitorWarning(#[from] InstanceVisitorWarning),
}

/// Equipping costs in one of the two supported layouts.
#[derive(Clone, Debug, PartialEq)]
pub enum EquipCosts {
    /// Row `f` of a single `equip_costs` column; the cost is the same at every location.
    PerService(Vec<Cost>),
    /// Row `l`, column `equip_costs_f`; indexed as `[location][service]`.
    PerLocation(Vec<Vec<Cost>>),
}

impl Default for EquipCosts {
    fn default() -> Self {
        EquipCosts::PerService(Vec::new())
    }
}

impl EquipCosts {
    /// Cost of equipping `service` at `location`. The per-service layout does not
    /// know the number of locations, so callers are expected to range check `location`.
    pub fn cost(&self, location: LocationIdx, service: ServiceIdx) -> Option<Cost> {
        match self {
            EquipCosts::PerService(costs) => costs.get(service.idx()).copied(),
            EquipCosts::PerLocation(rows) => rows.get(location.idx())?.get(service.idx()).copied(),
        }
    }

    pub fn num_rows(&self) -> usize {
        match self {
            EquipCosts::PerService(costs) => costs.len(),
            EquipCosts::PerLocation(rows) => rows.len(),
        }
    }
}

/// An immutable MSLSCP instance.
#[derive(Clone, Debug)]
pub struct Instance {
    /// Triplets in file order, including duplicates, with their 0-based line number.
    pub triplets: Vec<(usize, Triplet)>,
    pub opening_costs: Vec<Cost>,
    pub equip_costs: EquipCosts,
    pub coverage: CoverageIndex,
    pub num_services: u32,
    pub num_demand_points: u32,
}

impl Instance {
    pub fn num_services(&self) -> u32 {
        self.num_services
    }

    pub fn num_locations(&self) -> u32 {
        self.opening_costs.len() as u32
    }

    /// One more than the largest demand point index.
    pub fn num_demand_points(&self) -> u32 {
        self.num_demand_points
    }

    pub fn triplets(&self) -> &[(usize, Triplet)] {
        &self.triplets
    }

    pub fn coverage(&self) -> &CoverageIndex {
        &self.coverage
    }

    pub fn opening_cost(&self, location: LocationIdx) -> Option<Cost> {
        self.opening_costs.get(location.idx()).copied()
    }

    pub fn equip_cost(&self, location: LocationIdx, service: ServiceIdx) -> Option<Cost> {
        if location.0 >= self.num_locations() || service.0 >= self.num_services {
            return None;
        }
        self.equip_costs.cost(location, service)
    }

    pub fn has_service(&self, service: ServiceIdx) -> bool {
        service.0 < self.num_services
    }

    pub fn has_location(&self, location: LocationIdx) -> bool {
        location.0 < self.num_locations()
    }

    pub fn has_demand_point(&self, demand: DemandIdx) -> bool {
        demand.0 < self.num_demand_points
    }

    pub fn read(path: &Path, paranoid: bool) -> Result<Self, InstanceReaderError> {
        debug!("Read instance from {path:?}");
        let file = File::open(path)?;
        Self::read_from(BufReader::new(file), paranoid)
    }

    pub fn read_from(reader: impl Read, paranoid: bool) -> Result<Self, InstanceReaderError> {
        let mut visitor = InstanceInputVisitor::process(reader);

        if !visitor.errors.is_empty() || !visitor.warnings.is_empty() {
            for w in &visitor.warnings {
                warn!(" {w}");
            }

            for e in &visitor.errors {
                error!(" {e}");
            }

            if !visitor.errors.is_empty() {
                return Err(InstanceReaderError::VisitorError(visitor.errors.remove(0)));
            }

            if paranoid {
                return Err(InstanceReaderError::VisitorWarning(
                    visitor.warnings.remove(0),
                ));
            }
        }

        let num_services = visitor.coverage.services().len() as u32;
        let num_demand_points = visitor
            .coverage
            .demand_points()
            .last()
            .map_or(0, |u| u.0 + 1);

        Ok(Self {
            triplets: visitor.triplets,
            opening_costs: visitor.opening_costs,
            equip_costs: visitor.equip_costs,
            coverage: visitor.coverage,
            num_services,
            num_demand_points,
        })
    }
}

//////////////////////////////////////////////////////////////////

#[derive(Error, Debug, PartialEq)]
pub enum RowError {
    #[error("expected {expected} fields, but found {found}")]
    Arity { expected: usize, found: usize },

    #[error("column `{column}` contains `{value}`, which is not a non-negative integer")]
    NotAnIndex { column: String, value: String },

    #[error("column `{column}` contains `{value}`, which exceeds the largest index {}", MAX_INDEX)]
    IndexTooLarge { column: String, value: String },

    #[error("column `{column}` contains `{value}`, which is not a non-negative finite number")]
    NotACost { column: String, value: String },

    #[error("columns `service`, `location` and `point` must either be all set or all empty")]
    IncompleteTriplet,

    #[error("columns `equip_costs_*` must either be all set or all empty")]
    IncompleteEquipRow,

    #[error("column `{column}` has a value after an empty cell")]
    GapInColumn { column: &'static str },
}

#[derive(Error, Debug)]
pub enum InstanceVisitorError {
    #[error("No header found in the input")]
    NoHeaderFound,

    #[error("Header lacks mandatory column `{name}`")]
    MissingColumn { name: String },

    #[error("Header contains unknown column `{name}`")]
    UnknownColumn { name: String },

    #[error("Header contains column `{name}` more than once")]
    DuplicateColumn { name: String },

    #[error("Header mixes `equip_costs` with per-location `equip_costs_<f>` columns")]
    MixedEquipLayout,

    #[error("Line {} is malformed: {reason}", lineno + 1)]
    MalformedRow { lineno: usize, reason: RowError },

    #[error("Instance contains no coverage triplets")]
    EmptyInstance,

    #[error("Column `{column}` has {found} rows, but triplets reference {expected} distinct locations")]
    InconsistentLocationCount {
        column: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Column `{column}` provides costs for {found} services, but triplets reference {expected} distinct services")]
    InconsistentServiceCount {
        column: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Line {} references location {location}, but only locations [0, {num_locations}) have opening costs", lineno + 1)]
    LocationOutOfRange {
        lineno: usize,
        location: u32,
        num_locations: usize,
    },

    #[error("Line {} references service {service}, but services are not numbered densely in [0, {num_services})", lineno + 1)]
    ServiceOutOfRange {
        lineno: usize,
        service: u32,
        num_services: usize,
    },

    #[error("Failed to read CSV record: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Error, PartialEq)]
pub enum InstanceVisitorWarning {
    #[error("Line {} has extra whitespace", lineno + 1)]
    ExtraWhitespace { lineno: usize },

    #[error("Line {} repeats the triplet of line {}", lineno + 1, first_lineno + 1)]
    DuplicateTriplet { lineno: usize, first_lineno: usize },

    #[error("Line {} breaks the (service, location, point) order of triplets", lineno + 1)]
    UnsortedTriplets { lineno: usize },

    #[error("Demand point {demand} never occurs, but larger indices do")]
    DemandPointGap { demand: u32 },
}

#[derive(Debug)]
enum EquipColumns {
    PerService(usize),
    PerLocation(Vec<usize>),
}

#[derive(Debug)]
struct Columns {
    len: usize,
    service: usize,
    location: usize,
    point: usize,
    opening: usize,
    equip: EquipColumns,
}

impl Columns {
    fn from_header(header: &StringRecord) -> Result<Self, InstanceVisitorError> {
        if header.iter().all(|name| name.trim().is_empty()) {
            return Err(InstanceVisitorError::NoHeaderFound);
        }

        let mut named: HashMap<&str, usize> = HashMap::new();
        let mut per_location: BTreeMap<u32, usize> = BTreeMap::new();

        for (col, name) in header.iter().enumerate() {
            let name = name.trim();
            let duplicate = || InstanceVisitorError::DuplicateColumn {
                name: name.to_string(),
            };

            if let Some(service) = name.strip_prefix(EQUIP_COSTS_PREFIX) {
                let service = parse_digits(service).ok_or_else(|| {
                    InstanceVisitorError::UnknownColumn {
                        name: name.to_string(),
                    }
                })?;
                if per_location.insert(service, col).is_some() {
                    return Err(duplicate());
                }
                continue;
            }

            match name {
                SERVICE_COLUMN | LOCATION_COLUMN | POINT_COLUMN | OPENING_COSTS_COLUMN
                | EQUIP_COSTS_COLUMN => {
                    if named.insert(name, col).is_some() {
                        return Err(duplicate());
                    }
                }
                _ => {
                    return Err(InstanceVisitorError::UnknownColumn {
                        name: name.to_string(),
                    });
                }
            }
        }

        let column = |name: &str| {
            named
                .get(name)
                .copied()
                .ok_or_else(|| InstanceVisitorError::MissingColumn {
                    name: name.to_string(),
                })
        };

        let equip = match (named.get(EQUIP_COSTS_COLUMN), per_location.is_empty()) {
            (Some(&col), true) => EquipColumns::PerService(col),
            (Some(_), false) => return Err(InstanceVisitorError::MixedEquipLayout),
            (None, true) => {
                return Err(InstanceVisitorError::MissingColumn {
                    name: EQUIP_COSTS_COLUMN.to_string(),
                });
            }
            (None, false) => {
                if let Some(missing) = (0u32..)
                    .zip(per_location.keys())
                    .find_map(|(expected, &found)| (expected != found).then_some(expected))
                {
                    return Err(InstanceVisitorError::MissingColumn {
                        name: format!("{EQUIP_COSTS_PREFIX}{missing}"),
                    });
                }
                EquipColumns::PerLocation(per_location.into_values().collect())
            }
        };

        Ok(Self {
            len: header.len(),
            service: column(SERVICE_COLUMN)?,
            location: column(LOCATION_COLUMN)?,
            point: column(POINT_COLUMN)?,
            opening: column(OPENING_COSTS_COLUMN)?,
            equip,
        })
    }
}

#[derive(Clone, Copy)]
enum Group {
    Triplets = 0,
    Opening = 1,
    Equip = 2,
}

#[derive(Default)]
pub struct InstanceInputVisitor {
    pub errors: Vec<InstanceVisitorError>,
    pub warnings: Vec<InstanceVisitorWarning>,
    pub triplets: Vec<(usize, Triplet)>,
    pub opening_costs: Vec<Cost>,
    pub equip_costs: EquipCosts,
    pub coverage: CoverageIndex,
    first_seen: HashMap<Triplet, usize>,
    ended: [bool; 3],
}

/// Largest accepted index; the count `index + 1` has to fit into a `u32`.
pub const MAX_INDEX: u32 = u32::MAX - 1;

/// Plain decimal digits, no sign or exponent.
fn parse_digits(value: &str) -> Option<u32> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Parses an index. Integral floats such as `3.0` are accepted since spreadsheet
/// exports pad shorter columns and thereby turn integer columns into floats.
fn parse_index(column: &str, value: &str) -> Result<u32, RowError> {
    let (digits, fraction) = value.split_once('.').unwrap_or((value, "0"));
    let integral = !fraction.is_empty() && fraction.bytes().all(|b| b == b'0');

    match parse_digits(digits).filter(|_| integral) {
        Some(v) if v <= MAX_INDEX => Ok(v),
        Some(_) => Err(RowError::IndexTooLarge {
            column: column.to_string(),
            value: value.to_string(),
        }),
        None => Err(RowError::NotAnIndex {
            column: column.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_cost(column: &str, value: &str) -> Result<Cost, RowError> {
    match value.parse::<Cost>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(RowError::NotACost {
            column: column.to_string(),
            value: value.to_string(),
        }),
    }
}

impl InstanceInputVisitor {
    pub fn process(reader: impl Read) -> InstanceInputVisitor {
        let mut visitor = InstanceInputVisitor::default();
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .comment(Some(b'#'))
            .from_reader(reader);

        let columns = match csv_reader.headers().map(Columns::from_header) {
            Ok(Ok(columns)) => columns,
            Ok(Err(e)) => {
                visitor.errors.push(e);
                return visitor;
            }
            Err(e) => {
                visitor.errors.push(e.into());
                return visitor;
            }
        };

        if let EquipColumns::PerLocation(_) = columns.equip {
            visitor.equip_costs = EquipCosts::PerLocation(Vec::new());
        }

        for record in csv_reader.records() {
            match record {
                Ok(record) => {
                    let lineno = record
                        .position()
                        .map_or(0, |p| p.line().saturating_sub(1) as usize);
                    visitor.visit_record(lineno, &columns, &record);
                }
                Err(e) => {
                    visitor.errors.push(e.into());
                    return visitor;
                }
            }
        }

        visitor.check_cardinalities(&columns);
        visitor
    }

    fn visit_record(&mut self, lineno: usize, columns: &Columns, record: &StringRecord) {
        if record.len() != columns.len {
            self.errors.push(InstanceVisitorError::MalformedRow {
                lineno,
                reason: RowError::Arity {
                    expected: columns.len,
                    found: record.len(),
                },
            });
            return;
        }

        if record.iter().any(|field| field.trim() != field) {
            self.warnings
                .push(InstanceVisitorWarning::ExtraWhitespace { lineno });
        }

        if let Err(reason) = self.visit_cells(lineno, columns, record) {
            self.errors
                .push(InstanceVisitorError::MalformedRow { lineno, reason });
        }
    }

    fn visit_cells(
        &mut self,
        lineno: usize,
        columns: &Columns,
        record: &StringRecord,
    ) -> Result<(), RowError> {
        let cell = |col: usize| {
            let value = record.get(col).unwrap_or_default().trim();
            (!value.is_empty()).then_some(value)
        };

        match (
            cell(columns.service),
            cell(columns.location),
            cell(columns.point),
        ) {
            (Some(f), Some(l), Some(u)) => {
                self.continue_group(Group::Triplets, SERVICE_COLUMN)?;
                let triplet = Triplet::new(
                    parse_index(SERVICE_COLUMN, f)?,
                    parse_index(LOCATION_COLUMN, l)?,
                    parse_index(POINT_COLUMN, u)?,
                );
                self.visit_triplet(lineno, triplet);
            }
            (None, None, None) => self.ended[Group::Triplets as usize] = true,
            _ => return Err(RowError::IncompleteTriplet),
        }

        match cell(columns.opening) {
            Some(value) => {
                self.continue_group(Group::Opening, OPENING_COSTS_COLUMN)?;
                let cost = parse_cost(OPENING_COSTS_COLUMN, value)?;
                self.opening_costs.push(cost);
            }
            None => self.ended[Group::Opening as usize] = true,
        }

        match &columns.equip {
            EquipColumns::PerService(col) => match cell(*col) {
                Some(value) => {
                    self.continue_group(Group::Equip, EQUIP_COSTS_COLUMN)?;
                    let cost = parse_cost(EQUIP_COSTS_COLUMN, value)?;
                    if let EquipCosts::PerService(costs) = &mut self.equip_costs {
                        costs.push(cost);
                    }
                }
                None => self.ended[Group::Equip as usize] = true,
            },
            EquipColumns::PerLocation(cols) => {
                let cells: Vec<_> = cols.iter().map(|&c| cell(c)).collect();
                if cells.iter().all(Option::is_none) {
                    self.ended[Group::Equip as usize] = true;
                } else if cells.iter().all(Option::is_some) {
                    self.continue_group(Group::Equip, EQUIP_COSTS_PREFIX)?;
                    let row = cells
                        .into_iter()
                        .flatten()
                        .zip(0u32..)
                        .map(|(value, f)| parse_cost(&format!("{EQUIP_COSTS_PREFIX}{f}"), value))
                        .collect::<Result<Vec<_>, _>>()?;
                    if let EquipCosts::PerLocation(rows) = &mut self.equip_costs {
                        rows.push(row);
                    }
                } else {
                    return Err(RowError::IncompleteEquipRow);
                }
            }
        }

        Ok(())
    }

    fn continue_group(&self, group: Group, column: &'static str) -> Result<(), RowError> {
        if self.ended[group as usize] {
            Err(RowError::GapInColumn { column })
        } else {
            Ok(())
        }
    }

    fn visit_triplet(&mut self, lineno: usize, triplet: Triplet) {
        match self.first_seen.entry(triplet) {
            Entry::Occupied(first) => {
                self.warnings.push(InstanceVisitorWarning::DuplicateTriplet {
                    lineno,
                    first_lineno: *first.get(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(lineno);
            }
        }

        let is_unsorted = self.triplets.last().is_some_and(|(_, prev)| *prev > triplet);
        let already_warned = self
            .warnings
            .iter()
            .any(|w| matches!(w, InstanceVisitorWarning::UnsortedTriplets { .. }));
        if is_unsorted && !already_warned {
            self.warnings
                .push(InstanceVisitorWarning::UnsortedTriplets { lineno });
        }

        self.coverage.insert(triplet);
        self.triplets.push((lineno, triplet));
    }

    fn check_cardinalities(&mut self, columns: &Columns) {
        if !self.errors.is_empty() {
            return;
        }

        if self.triplets.is_empty() {
            self.errors.push(InstanceVisitorError::EmptyInstance);
            return;
        }

        let num_locations = self.coverage.locations().len();
        let num_services = self.coverage.services().len();

        if self.opening_costs.len() != num_locations {
            self.errors
                .push(InstanceVisitorError::InconsistentLocationCount {
                    column: OPENING_COSTS_COLUMN,
                    expected: num_locations,
                    found: self.opening_costs.len(),
                });
        } else if let Some((lineno, t)) = self
            .triplets
            .iter()
            .find(|(_, t)| t.location.idx() >= num_locations)
        {
            self.errors.push(InstanceVisitorError::LocationOutOfRange {
                lineno: *lineno,
                location: t.location.0,
                num_locations,
            });
        }

        if let Some((lineno, t)) = self
            .triplets
            .iter()
            .find(|(_, t)| t.service.idx() >= num_services)
        {
            self.errors.push(InstanceVisitorError::ServiceOutOfRange {
                lineno: *lineno,
                service: t.service.0,
                num_services,
            });
        }

        match (&columns.equip, &self.equip_costs) {
            (EquipColumns::PerService(_), EquipCosts::PerService(costs)) => {
                if costs.len() != num_services {
                    self.errors
                        .push(InstanceVisitorError::InconsistentServiceCount {
                            column: EQUIP_COSTS_COLUMN,
                            expected: num_services,
                            found: costs.len(),
                        });
                }
            }
            (EquipColumns::PerLocation(cols), EquipCosts::PerLocation(rows)) => {
                if cols.len() != num_services {
                    self.errors
                        .push(InstanceVisitorError::InconsistentServiceCount {
                            column: EQUIP_COSTS_PREFIX,
                            expected: num_services,
                            found: cols.len(),
                        });
                }
                if rows.len() != num_locations {
                    self.errors
                        .push(InstanceVisitorError::InconsistentLocationCount {
                            column: EQUIP_COSTS_PREFIX,
                            expected: num_locations,
                            found: rows.len(),
                        });
                }
            }
            _ => unreachable!("equip cost storage is chosen from the header"),
        }

        let points = self.coverage.demand_points();
        if let Some(gap) = (0..)
            .zip(points.iter())
            .find_map(|(expected, found)| (expected != found.0).then_some(expected))
        {
            self.warnings
                .push(InstanceVisitorWarning::DemandPointGap { demand: gap });
        }
    }
}
