use serde::Serialize;

use crate::config::TimeUnit;

// ------------------------------------------------------------------------------------------------
// --- OdMatrix
// ------------------------------------------------------------------------------------------------

/// Shortest travel times between origin nodes (rows) and destination nodes (columns).
/// Unreachable pairs read as `fail_value`, expressed in the matrix unit.
#[derive(Debug, Clone, Serialize)]
pub struct OdMatrix {
    origins: Vec<usize>,
    destinations: Vec<usize>,
    values: Vec<Vec<Option<f64>>>,
    fail_value: f64,
    unit: TimeUnit,
}

impl OdMatrix {
    /// `values` are travel times in seconds.
    pub fn new(
        origins: Vec<usize>,
        destinations: Vec<usize>,
        values: Vec<Vec<Option<f64>>>,
        fail_value: f64,
    ) -> Self {
        Self {
            origins,
            destinations,
            values,
            fail_value,
            unit: TimeUnit::Seconds,
        }
    }

    // Getters/Setters

    pub fn origins(&self) -> &Vec<usize> {
        &self.origins
    }

    pub fn destinations(&self) -> &Vec<usize> {
        &self.destinations
    }

    pub fn fail_value(&self) -> f64 {
        self.fail_value
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    // Functions

    pub fn shape(&self) -> (usize, usize) {
        (self.origins.len(), self.destinations.len())
    }

    pub fn get(&self, origin: usize, destination: usize) -> f64 {
        self.values[origin][destination].unwrap_or(self.fail_value)
    }

    /// The row of `origin`, unreachable entries replaced by the fail value.
    pub fn row(&self, origin: usize) -> Vec<f64> {
        self.values[origin]
            .iter()
            .map(|v| v.unwrap_or(self.fail_value))
            .collect()
    }

    pub fn num_unreachable(&self) -> usize {
        self.values.iter().flatten().filter(|v| v.is_none()).count()
    }

    /// Same matrix expressed in `unit`. The fail value is converted like any other entry.
    pub fn to_unit(&self, unit: TimeUnit) -> Self {
        let convert = |v: f64| {
            let seconds = match self.unit {
                TimeUnit::Seconds => v,
                TimeUnit::Minutes => v * 60.0,
            };
            unit.from_seconds(seconds)
        };
        let values = self
            .values
            .iter()
            .map(|row| row.iter().map(|v| v.map(convert)).collect())
            .collect();

        Self {
            origins: self.origins.clone(),
            destinations: self.destinations.clone(),
            values,
            fail_value: convert(self.fail_value),
            unit,
        }
    }

    /// For every origin, the travel time to its closest reachable destination.
    pub fn nearest(&self) -> Vec<Option<f64>> {
        self.values
            .iter()
            .map(|row| row.iter().flatten().copied().reduce(f64::min))
            .collect()
    }
}
