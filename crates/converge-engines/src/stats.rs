use std::time::Duration;

/// Metric names the driver records on every run.
pub mod metric_names {
    pub const CYCLE: &str = "cycle";
    pub const CHECKPOINT: &str = "checkpoint";
}

/// One named operation counter with timing: how often it ran, how long it
/// took in total and the most recent duration.
#[derive(Clone, Debug, PartialEq)]
pub struct Metric {
    name: &'static str,
    count: u64,
    total: Duration,
    last: Duration,
}

impl Metric {
    pub fn new(name: &'static str) -> Self {
        Metric {
            name,
            count: 0,
            total: Duration::ZERO,
            last: Duration::ZERO,
        }
    }

    pub fn record(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total += elapsed;
        self.last = elapsed;
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn last(&self) -> Duration {
        self.last
    }

    pub fn mean(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total / self.count as u32
        }
    }
}

/// A small set of [Metric]s keyed by name. Lookups are linear; the set only
/// ever holds a handful of entries.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricSet {
    metrics: Vec<Metric>,
}

impl MetricSet {
    pub fn new() -> Self {
        MetricSet::default()
    }

    pub fn upsert(&mut self, name: &'static str, elapsed: Duration) {
        match self.metrics.iter_mut().find(|metric| metric.name == name) {
            Some(metric) => metric.record(elapsed),
            None => {
                let mut metric = Metric::new(name);
                metric.record(elapsed);
                self.metrics.push(metric);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Metric> {
        self.metrics.iter().find(|metric| metric.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Metric> {
        self.metrics.iter()
    }
}
