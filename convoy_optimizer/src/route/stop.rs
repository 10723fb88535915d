use std::fmt::Display;

use crate::problem::{
    NodeId, RENDEZVOUS_ID_OFFSET, delivery_problem::DeliveryProblem, depot::DepotIdx,
    task::TaskIdx,
};

/// One entry of a route. A `Rendezvous` is a drone-only stop: the drone
/// lands at a task point a truck will visit and waits for it to recharge
/// and reload; the task itself is served by the truck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    Depot(DepotIdx),
    Task(TaskIdx),
    Rendezvous(TaskIdx),
}

impl Stop {
    pub fn is_depot(&self) -> bool {
        matches!(self, Stop::Depot(_))
    }

    pub fn is_rendezvous(&self) -> bool {
        matches!(self, Stop::Rendezvous(_))
    }

    /// The served task, if this stop serves one. Rendezvous stops do not.
    pub fn served_task(&self) -> Option<TaskIdx> {
        match self {
            Stop::Task(task) => Some(*task),
            _ => None,
        }
    }

    /// The battery/payload reset point, if this stop is one.
    pub fn is_reset_point(&self) -> bool {
        matches!(self, Stop::Depot(_) | Stop::Rendezvous(_))
    }

    /// Serialized id, using the rendezvous marker offset over the task id.
    pub fn external_id(&self, problem: &DeliveryProblem) -> NodeId {
        match self {
            Stop::Depot(depot) => problem.depot(*depot).external_id(),
            Stop::Task(task) => problem.task(*task).external_id(),
            Stop::Rendezvous(task) => problem.task(*task).external_id() + RENDEZVOUS_ID_OFFSET,
        }
    }
}

impl Display for Stop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stop::Depot(depot) => write!(f, "Depot({depot})"),
            Stop::Task(task) => write!(f, "Task({task})"),
            Stop::Rendezvous(task) => write!(f, "Rendezvous({task})"),
        }
    }
}
