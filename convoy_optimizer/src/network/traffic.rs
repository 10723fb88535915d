use crate::problem::{Distance, Time};

const HOURS_PER_DAY: Time = 24.0;

/// Daily congestion windows. Fixed per run, configurable at load.
#[derive(Debug, Clone, Copy)]
pub struct TrafficModel {
    morning_start: Time,
    morning_end: Time,
    evening_start: Time,
    evening_end: Time,
}

impl Default for TrafficModel {
    fn default() -> Self {
        Self {
            morning_start: 7.0,
            morning_end: 9.0,
            evening_start: 17.0,
            evening_end: 19.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrafficPhase {
    PreMorning,
    MorningPeak,
    Between,
    EveningPeak,
    PostEvening,
}

impl TrafficModel {
    /// Phase containing the given time of day, and the wall-clock hour at
    /// which that phase ends. Windows are half-open `[start, end)`.
    fn phase_at(&self, time_of_day: Time) -> (TrafficPhase, Time) {
        if time_of_day < self.morning_start {
            (TrafficPhase::PreMorning, self.morning_start)
        } else if time_of_day < self.morning_end {
            (TrafficPhase::MorningPeak, self.morning_end)
        } else if time_of_day < self.evening_start {
            (TrafficPhase::Between, self.evening_start)
        } else if time_of_day < self.evening_end {
            (TrafficPhase::EveningPeak, self.evening_end)
        } else {
            (TrafficPhase::PostEvening, HOURS_PER_DAY)
        }
    }

    /// Simulates one road segment in wall-clock time, splitting it across
    /// phase boundaries. `factors` is the (morning, evening) multiplier
    /// pair of the segment; pairs without known factors drive at nominal
    /// speed through the peaks.
    pub fn segment_travel_time(
        &self,
        distance: Distance,
        start_time: Time,
        speed: f64,
        factors: Option<(f64, f64)>,
    ) -> Time {
        if distance <= 0.0 {
            return 0.0;
        }
        if distance.is_infinite() {
            return Time::INFINITY;
        }

        let (morning_factor, evening_factor) = factors.unwrap_or((1.0, 1.0));

        let mut remaining = distance;
        let mut elapsed: Time = 0.0;

        loop {
            let time_of_day = (start_time + elapsed).rem_euclid(HOURS_PER_DAY);
            let (phase, phase_end) = self.phase_at(time_of_day);

            let factor = match phase {
                TrafficPhase::MorningPeak => morning_factor,
                TrafficPhase::EveningPeak => evening_factor,
                _ => 1.0,
            };
            let effective_speed = speed * factor;

            let window = phase_end - time_of_day;
            let coverable = effective_speed * window;

            if coverable >= remaining {
                return elapsed + remaining / effective_speed;
            }

            remaining -= coverable;
            elapsed += window;
        }
    }
}
