use crate::{
    define_index_newtype,
    problem::{Cost, NodeId, Time, Weight, depot::DepotIdx},
};

define_index_newtype!(VehicleIdx, Vehicle);

/// Kind-specific limits. Trucks are only bounded by the road network;
/// drones carry a payload capacity and a battery measured in flight hours.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VehicleKind {
    Truck,
    Drone { max_load: Weight, max_battery: Time },
}

#[derive(Debug, Clone)]
pub struct Vehicle {
    external_id: NodeId,
    kind: VehicleKind,
    speed: f64,
    unit_cost: Cost,
    depot: DepotIdx,
}

impl Vehicle {
    pub fn new(
        external_id: NodeId,
        kind: VehicleKind,
        speed: f64,
        unit_cost: Cost,
        depot: DepotIdx,
    ) -> Self {
        Self {
            external_id,
            kind,
            speed,
            unit_cost,
            depot,
        }
    }

    pub fn external_id(&self) -> NodeId {
        self.external_id
    }

    pub fn kind(&self) -> VehicleKind {
        self.kind
    }

    pub fn is_drone(&self) -> bool {
        matches!(self.kind, VehicleKind::Drone { .. })
    }

    /// Speed in km/h, before any congestion factor.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn unit_cost(&self) -> Cost {
        self.unit_cost
    }

    pub fn depot(&self) -> DepotIdx {
        self.depot
    }

    pub fn max_load(&self) -> Option<Weight> {
        match self.kind {
            VehicleKind::Truck => None,
            VehicleKind::Drone { max_load, .. } => Some(max_load),
        }
    }

    pub fn max_battery(&self) -> Option<Time> {
        match self.kind {
            VehicleKind::Truck => None,
            VehicleKind::Drone { max_battery, .. } => Some(max_battery),
        }
    }
}
