pub mod dynamic_search;
mod evolution;
pub mod params;
pub mod static_search;

use crate::problem::{delivery_problem::DeliveryProblem, task::TaskIdx, vehicle::VehicleIdx};

/// The task -> vehicle mapping a genetic search produces. Tasks the search
/// never placed (unassignable demand, a depot whose population could not
/// be seeded) stay `None`.
#[derive(Debug, Clone)]
pub struct TaskAssignment {
    vehicle_of: Vec<Option<VehicleIdx>>,
}

impl TaskAssignment {
    pub fn empty(problem: &DeliveryProblem) -> Self {
        Self {
            vehicle_of: vec![None; problem.tasks().len()],
        }
    }

    pub fn set(&mut self, task: TaskIdx, vehicle: VehicleIdx) {
        self.vehicle_of[task.get()] = Some(vehicle);
    }

    pub fn vehicle_of(&self, task: TaskIdx) -> Option<VehicleIdx> {
        self.vehicle_of[task.get()]
    }

    /// Groups assigned tasks per vehicle, indexed by vehicle.
    pub fn group_by_vehicle(&self, problem: &DeliveryProblem) -> Vec<Vec<TaskIdx>> {
        let mut groups = vec![Vec::new(); problem.vehicles().len()];
        for (i, assigned) in self.vehicle_of.iter().enumerate() {
            if let Some(vehicle) = assigned {
                groups[vehicle.get()].push(TaskIdx::new(i));
            }
        }
        groups
    }
}
