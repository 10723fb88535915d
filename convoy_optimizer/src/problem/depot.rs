use crate::{
    define_index_newtype,
    problem::{NodeId, location::Location, vehicle::VehicleIdx},
};

define_index_newtype!(DepotIdx, Depot);

/// A base a fleet subset originates from and returns to. Doubles as the
/// battery/payload reset point for drones.
#[derive(Debug, Clone)]
pub struct Depot {
    external_id: NodeId,
    location: Location,
    vehicles: Vec<VehicleIdx>,
}

impl Depot {
    pub fn new(external_id: NodeId, location: Location) -> Self {
        Self {
            external_id,
            location,
            vehicles: Vec::new(),
        }
    }

    pub fn external_id(&self) -> NodeId {
        self.external_id
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn vehicles(&self) -> &[VehicleIdx] {
        &self.vehicles
    }

    pub fn add_vehicle(&mut self, vehicle: VehicleIdx) {
        self.vehicles.push(vehicle);
    }
}
