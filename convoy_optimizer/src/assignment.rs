use tracing::{debug, warn};

use crate::problem::{
    Time, delivery_problem::DeliveryProblem, depot::DepotIdx, task::TaskIdx,
};

/// Result of assigning the initial demand points to depots. Tasks no depot
/// can serve are kept aside; the validator reports the resulting
/// incompleteness instead of the planner inventing a route.
pub struct DepotAssignment {
    tasks_by_depot: Vec<Vec<TaskIdx>>,
    unassigned: Vec<TaskIdx>,
}

impl DepotAssignment {
    pub fn tasks_of(&self, depot: DepotIdx) -> &[TaskIdx] {
        &self.tasks_by_depot[depot.get()]
    }

    pub fn unassigned(&self) -> &[TaskIdx] {
        &self.unassigned
    }
}

/// Assigns every initial task to the depot that reaches it fastest with
/// its own vehicle kind. A drone depot is only eligible when a round trip
/// at drone speed fits within the battery. Ties go to the smaller depot
/// id.
pub fn assign_to_depots(problem: &DeliveryProblem) -> DepotAssignment {
    let mut tasks_by_depot = vec![Vec::new(); problem.depots().len()];
    let mut unassigned = Vec::new();

    for task_idx in problem.initial_task_indices() {
        let task = problem.task(task_idx);

        let mut best: Option<(DepotIdx, Time)> = None;
        for (i, depot) in problem.depots().iter().enumerate() {
            let depot_idx = DepotIdx::new(i);
            let Some(&vehicle_idx) = depot.vehicles().first() else {
                continue;
            };
            let vehicle = problem.vehicle(vehicle_idx);
            let is_drone = vehicle.is_drone();

            let distance = problem.distance(task.external_id(), depot.external_id(), is_drone);
            if !distance.is_finite() {
                continue;
            }
            let approach = distance / vehicle.speed();

            if let Some(max_battery) = vehicle.max_battery()
                && 2.0 * approach > max_battery
            {
                continue;
            }

            let better = match best {
                None => true,
                Some((best_depot, best_time)) => {
                    approach < best_time
                        || (approach == best_time
                            && depot.external_id() < problem.depot(best_depot).external_id())
                }
            };
            if better {
                best = Some((depot_idx, approach));
            }
        }

        match best {
            Some((depot_idx, approach)) => {
                debug!(
                    task = task.external_id(),
                    depot = problem.depot(depot_idx).external_id(),
                    approach_hours = approach,
                    "assigned task to depot"
                );
                tasks_by_depot[depot_idx.get()].push(task_idx);
            }
            None => {
                warn!(
                    task = task.external_id(),
                    "no depot can serve task, dropping it"
                );
                unassigned.push(task_idx);
            }
        }
    }

    DepotAssignment {
        tasks_by_depot,
        unassigned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ProblemBuilder;

    #[test]
    fn test_tasks_go_to_nearest_depot() {
        let problem = ProblemBuilder::new()
            .task(1, 1.0, 0.0)
            .task(2, 9.0, 0.0)
            .truck_depot(101, 0.0, 0.0, 1)
            .truck_depot(102, 10.0, 0.0, 1)
            .edge(1, 101, 1.0)
            .edge(1, 2, 8.0)
            .edge(2, 102, 1.0)
            .build();
        let assignment = assign_to_depots(&problem);

        let d0 = problem.depot_idx(20101).unwrap();
        let d1 = problem.depot_idx(20102).unwrap();
        assert_eq!(assignment.tasks_of(d0), &[problem.task_idx(1).unwrap()]);
        assert_eq!(assignment.tasks_of(d1), &[problem.task_idx(2).unwrap()]);
        assert!(assignment.unassigned().is_empty());
    }

    #[test]
    fn test_drone_depot_needs_round_trip_battery() {
        // The drone reaches the task in 0.6 h, well ahead of the truck,
        // but the 1.2 h round trip exceeds the 1 h battery.
        let problem = ProblemBuilder::new()
            .truck_speed(50.0)
            .drone_speed(10.0)
            .task(1, 6.0, 0.0)
            .truck_depot(101, 50.0, 0.0, 1)
            .drone_depot(102, 0.0, 0.0, 1, 10.0, 1.0)
            .edge(1, 101, 44.0)
            .build();
        let assignment = assign_to_depots(&problem);

        let truck_depot = problem.depot_idx(20101).unwrap();
        let drone_depot = problem.depot_idx(20102).unwrap();
        assert_eq!(assignment.tasks_of(truck_depot).len(), 1);
        assert!(assignment.tasks_of(drone_depot).is_empty());
    }

    #[test]
    fn test_unreachable_task_is_dropped() {
        let problem = ProblemBuilder::new()
            .task(1, 1.0, 0.0)
            .truck_depot(101, 0.0, 0.0, 1)
            // No edge connects the task to anything.
            .edge(101, 102, 1.0)
            .build();
        let assignment = assign_to_depots(&problem);
        assert_eq!(assignment.unassigned().len(), 1);
    }
}
