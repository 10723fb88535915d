use serde::Serialize;

use crate::{
    problem::{Cost, NodeId, Time, Weight, delivery_problem::DeliveryProblem},
    route::{plan::Plan, stop::Stop},
};

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseLabel {
    Static,
    Dynamic,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopKind {
    Depot,
    Task,
    Rendezvous,
}

#[derive(Serialize, Debug, Clone)]
pub struct StopReport {
    pub kind: StopKind,
    /// External id, rendezvous stops carrying the marker offset.
    pub id: NodeId,
    pub arrival: Time,
}

#[derive(Serialize, Debug, Clone)]
pub struct RouteReport {
    pub vehicle_id: NodeId,
    pub depot_id: NodeId,
    pub is_drone: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_load: Option<Weight>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_battery: Option<Time>,
    pub stops: Vec<StopReport>,
    pub tasks_served: usize,
    pub completion_time: Time,
    pub cost: Cost,
}

#[derive(Serialize, Debug, Clone)]
pub struct PlanStats {
    pub tasks_served: usize,
    pub makespan: Time,
    pub max_completion_time: Time,
    pub total_cost: Cost,
}

/// The serializable shape of one phase's solution.
#[derive(Serialize, Debug, Clone)]
pub struct PlanReport {
    pub phase: PhaseLabel,
    pub routes: Vec<RouteReport>,
    pub stats: PlanStats,
}

impl PlanReport {
    pub fn from_plan(problem: &DeliveryProblem, plan: &Plan, phase: PhaseLabel) -> Self {
        let routes = plan
            .routes()
            .iter()
            .map(|route| {
                let vehicle = problem.vehicle(route.vehicle());
                let stops = route
                    .stops()
                    .iter()
                    .zip(route.arrivals())
                    .map(|(stop, &arrival)| StopReport {
                        kind: match stop {
                            Stop::Depot(_) => StopKind::Depot,
                            Stop::Task(_) => StopKind::Task,
                            Stop::Rendezvous(_) => StopKind::Rendezvous,
                        },
                        id: stop.external_id(problem),
                        arrival,
                    })
                    .collect();

                RouteReport {
                    vehicle_id: vehicle.external_id(),
                    depot_id: problem.depot(vehicle.depot()).external_id(),
                    is_drone: vehicle.is_drone(),
                    max_load: vehicle.max_load(),
                    max_battery: vehicle.max_battery(),
                    stops,
                    tasks_served: route.task_count(),
                    completion_time: route.completion_time(),
                    cost: route.cost(problem),
                }
            })
            .collect();

        let stats = PlanStats {
            tasks_served: plan.total_tasks_served(),
            makespan: plan.makespan(),
            max_completion_time: plan.max_completion_time(),
            total_cost: plan.total_cost(problem),
        };

        PlanReport {
            phase,
            routes,
            stats,
        }
    }
}
