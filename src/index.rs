use std::fmt::{Display, Formatter};

/// Monetary value of opening a location or equipping a service.
pub type Cost = f64;

macro_rules! impl_index {
    ($name : ident, $label : literal) => {
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u32);

        impl $name {
            pub fn idx(self) -> usize {
                self.0 as usize
            }
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                Self(value)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($label, " {}"), self.0)
            }
        }
    };
}

impl_index!(ServiceIdx, "service");
impl_index!(LocationIdx, "location");
impl_index!(DemandIdx, "demand point");

/// A demand point `demand` that requires `service`; every request has to be covered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Request {
    pub service: ServiceIdx,
    pub demand: DemandIdx,
}

impl Request {
    pub fn new(service: ServiceIdx, demand: DemandIdx) -> Self {
        Self { service, demand }
    }
}

impl Display for Request {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.service, self.demand)
    }
}

/// A row of the instance: `location` may provide `service` to `demand`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Triplet {
    pub service: ServiceIdx,
    pub location: LocationIdx,
    pub demand: DemandIdx,
}

impl Triplet {
    pub fn new(service: u32, location: u32, demand: u32) -> Self {
        Self {
            service: ServiceIdx(service),
            location: LocationIdx(location),
            demand: DemandIdx(demand),
        }
    }

    pub fn request(&self) -> Request {
        Request::new(self.service, self.demand)
    }
}

/// Any entity a solution may refer to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entity {
    Service(ServiceIdx),
    Location(LocationIdx),
    Demand(DemandIdx),
    Request(Request),
}

impl Display for Entity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Entity::Service(s) => s.fmt(f),
            Entity::Location(l) => l.fmt(f),
            Entity::Demand(u) => u.fmt(f),
            Entity::Request(r) => write!(f, "request {r}"),
        }
    }
}
