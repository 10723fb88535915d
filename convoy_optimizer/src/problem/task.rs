use crate::{
    define_index_newtype,
    problem::{NodeId, Time, Weight, location::Location},
};

define_index_newtype!(TaskIdx, Task);

/// A demand point. Initial demands are known at planning time
/// (`release_time == 0`); extra demands reveal themselves at a known future
/// clock time and may not be visited before it.
#[derive(Debug, Clone)]
pub struct Task {
    external_id: NodeId,
    location: Location,
    release_time: Time,
    pickup_weight: Weight,
    delivery_weight: Weight,
}

impl Task {
    pub fn new(
        external_id: NodeId,
        location: Location,
        release_time: Time,
        pickup_weight: Weight,
        delivery_weight: Weight,
    ) -> Self {
        Self {
            external_id,
            location,
            release_time,
            pickup_weight,
            delivery_weight,
        }
    }

    pub fn external_id(&self) -> NodeId {
        self.external_id
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn release_time(&self) -> Time {
        self.release_time
    }

    pub fn is_extra(&self) -> bool {
        self.release_time > 0.0
    }

    pub fn pickup_weight(&self) -> Weight {
        self.pickup_weight
    }

    pub fn delivery_weight(&self) -> Weight {
        self.delivery_weight
    }
}
