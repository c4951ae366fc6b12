use std::collections::HashMap;

/// Global result mapping, keyed by station name.
pub type StationTable = HashMap<String, Station>;

/// Running min/max/sum/count aggregate for one station.
///
/// A `Station` only exists once it has seen a value, so `count >= 1` and
/// `min <= max` hold for every instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub name: String,
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub sum: f64,
}

impl Station {
    pub fn new(name: String, value: f64) -> Self {
        Self {
            name,
            count: 1,
            min: value,
            max: value,
            sum: value,
        }
    }

    pub fn observe(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
        self.count += 1;
    }

    /// Fold another partial aggregate for the same station into this one.
    ///
    /// Commutative and associative, except that `sum` is subject to
    /// floating-point rounding and may differ in the last bits depending on
    /// merge order.
    pub fn combine(&mut self, other: &Station) {
        debug_assert_eq!(self.name, other.name);
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.count += other.count;
    }

    pub fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }
}

/// Fold every station of `partial` into `table`, inserting unseen keys.
pub fn merge_into(table: &mut StationTable, partial: impl IntoIterator<Item = Station>) {
    for station in partial {
        match table.get_mut(&station.name) {
            Some(existing) => existing.combine(&station),
            None => {
                table.insert(station.name.clone(), station);
            }
        }
    }
}
