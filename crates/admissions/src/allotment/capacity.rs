use std::collections::BTreeMap;
use std::env;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::students::Branch;

/// Seats per branch when neither the environment nor the caller says otherwise.
pub const BUILTIN_CAPACITIES: [(Branch, u32); 4] = [
    (Branch::Cse, 60),
    (Branch::Ece, 60),
    (Branch::Civil, 40),
    (Branch::Mechanical, 40),
];

/// Default capacity for every known branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityDefaults {
    seats: BTreeMap<Branch, u32>,
}

impl Default for CapacityDefaults {
    fn default() -> Self {
        Self {
            seats: BUILTIN_CAPACITIES.into_iter().collect(),
        }
    }
}

impl CapacityDefaults {
    /// Built-in values overridden by `SEATS_<BRANCH>` variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Unparsable values keep the built-in constant for that branch.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut defaults = Self::default();
        for branch in Branch::ALL {
            let key = env_key(branch);
            let Some(raw) = lookup(&key) else {
                continue;
            };
            match raw.trim().parse::<u32>() {
                Ok(seats) => {
                    defaults.seats.insert(branch, seats);
                }
                Err(_) => warn!(%key, value = %raw, "ignoring unparsable seat default"),
            }
        }
        defaults
    }

    pub fn with(mut self, branch: Branch, seats: u32) -> Self {
        self.seats.insert(branch, seats);
        self
    }

    pub fn get(&self, branch: Branch) -> u32 {
        self.seats.get(&branch).copied().unwrap_or(0)
    }
}

pub fn env_key(branch: Branch) -> String {
    format!("SEATS_{}", branch.as_str())
}

/// Configuration source consulted once at the start of every allotment run.
pub trait CapacitySource: Send + Sync {
    fn defaults(&self) -> CapacityDefaults;
}

impl CapacitySource for CapacityDefaults {
    fn defaults(&self) -> CapacityDefaults {
        self.clone()
    }
}

/// Reads `SEATS_<BRANCH>` from the process environment on every run.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCapacitySource;

impl CapacitySource for EnvCapacitySource {
    fn defaults(&self) -> CapacityDefaults {
        CapacityDefaults::from_env()
    }
}

/// Caller-supplied per-branch capacities for a single run.
///
/// Deserialization is lenient: keys are upper-cased and matched against [`Branch`], values
/// must be non-negative integers (or strings holding one). Anything else is dropped with a
/// warning so the branch falls back to its default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CapacityOverrides(BTreeMap<Branch, u32>);

impl CapacityOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, branch: Branch, seats: u32) {
        self.0.insert(branch, seats);
    }

    pub fn with(mut self, branch: Branch, seats: u32) -> Self {
        self.set(branch, seats);
        self
    }

    pub fn get(&self, branch: Branch) -> Option<u32> {
        self.0.get(&branch).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn from_json(raw: &Map<String, Value>) -> Self {
        let mut overrides = Self::new();
        for (key, value) in raw {
            let Some(branch) = Branch::parse(key) else {
                warn!(branch = %key, "ignoring capacity override for unknown branch");
                continue;
            };
            match seats_from_value(value) {
                Some(seats) => overrides.set(branch, seats),
                None => warn!(%branch, %value, "ignoring non-numeric capacity override"),
            }
        }
        overrides
    }
}

impl<'de> Deserialize<'de> for CapacityOverrides {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Object(map) => Ok(Self::from_json(&map)),
            Value::Null => Ok(Self::new()),
            other => {
                warn!(value = %other, "capacity overrides must be an object; ignoring");
                Ok(Self::new())
            }
        }
    }
}

fn seats_from_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => {
            if let Some(seats) = number.as_u64() {
                return u32::try_from(seats).ok();
            }
            number
                .as_f64()
                .filter(|seats| seats.is_finite() && *seats >= 0.0 && *seats <= u32::MAX as f64)
                .map(|seats| seats.trunc() as u32)
        }
        Value::String(raw) => raw.trim().parse::<u32>().ok(),
        _ => None,
    }
}

/// Effective capacity for every known branch in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapacityTable(BTreeMap<Branch, u32>);

impl CapacityTable {
    pub fn get(&self, branch: Branch) -> u32 {
        self.0.get(&branch).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Branch, u32)> + '_ {
        self.0.iter().map(|(branch, seats)| (*branch, *seats))
    }
}

/// Merge defaults with overrides; an override always wins for its branch.
pub fn resolve_capacities(
    defaults: &CapacityDefaults,
    overrides: &CapacityOverrides,
) -> CapacityTable {
    CapacityTable(
        Branch::ALL
            .into_iter()
            .map(|branch| {
                let seats = overrides
                    .get(branch)
                    .unwrap_or_else(|| defaults.get(branch));
                (branch, seats)
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_fall_back_to_builtin_values() {
        let defaults = CapacityDefaults::from_lookup(|_| None);
        assert_eq!(defaults.get(Branch::Cse), 60);
        assert_eq!(defaults.get(Branch::Mechanical), 40);
    }

    #[test]
    fn defaults_read_seat_variables_and_skip_garbage() {
        let defaults = CapacityDefaults::from_lookup(|key| match key {
            "SEATS_CSE" => Some("12".to_string()),
            "SEATS_ECE" => Some("lots".to_string()),
            _ => None,
        });
        assert_eq!(defaults.get(Branch::Cse), 12);
        assert_eq!(defaults.get(Branch::Ece), 60);
    }

    #[test]
    fn overrides_normalize_keys_and_ignore_bad_values() {
        let overrides: CapacityOverrides = serde_json::from_value(json!({
            "cse": 1,
            "Ece": "7",
            "CIVIL": "abc",
            "MECHANICAL": -3,
            "AERO": 10,
        }))
        .expect("lenient parse");

        assert_eq!(overrides.get(Branch::Cse), Some(1));
        assert_eq!(overrides.get(Branch::Ece), Some(7));
        assert_eq!(overrides.get(Branch::Civil), None);
        assert_eq!(overrides.get(Branch::Mechanical), None);
    }

    #[test]
    fn non_object_overrides_are_ignored() {
        let overrides: CapacityOverrides =
            serde_json::from_value(json!([1, 2, 3])).expect("lenient parse");
        assert!(overrides.is_empty());
    }

    #[test]
    fn resolve_covers_every_branch() {
        let table = resolve_capacities(
            &CapacityDefaults::default(),
            &CapacityOverrides::new().with(Branch::Civil, 0),
        );
        let branches: Vec<Branch> = table.iter().map(|(branch, _)| branch).collect();
        assert_eq!(branches, Branch::ALL.to_vec());
        assert_eq!(table.get(Branch::Civil), 0);
        assert_eq!(table.get(Branch::Ece), 60);
    }

    #[test]
    fn fractional_override_truncates() {
        let overrides: CapacityOverrides =
            serde_json::from_value(json!({ "CSE": 2.7 })).expect("lenient parse");
        assert_eq!(overrides.get(Branch::Cse), Some(2));
    }
}
