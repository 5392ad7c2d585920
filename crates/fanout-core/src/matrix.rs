//! Matrix and job description types.

use crate::ids::JobId;
use indexmap::IndexMap;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A single candidate value of an axis.
///
/// YAML scalars of any kind are accepted and kept in their written form,
/// so `python: [3.8, "3.9", 3.10]` yields `"3.8"`, `"3.9"` and `"3.10"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AxisValue(String);

impl AxisValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AxisValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AxisValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for AxisValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // YAML hands plain scalars to `visit_str` verbatim, which keeps
        // `3.10` from collapsing into `3.1`.
        deserializer.deserialize_str(AxisValueVisitor)
    }
}

struct AxisValueVisitor;

impl Visitor<'_> for AxisValueVisitor {
    type Value = AxisValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a scalar axis value")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<AxisValue, E> {
        Ok(AxisValue::new(value))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<AxisValue, E> {
        Ok(AxisValue(value))
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<AxisValue, E> {
        Ok(AxisValue(value.to_string()))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<AxisValue, E> {
        Ok(AxisValue(value.to_string()))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<AxisValue, E> {
        Ok(AxisValue(value.to_string()))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<AxisValue, E> {
        let text = value.to_string();
        // Only reached from formats without source text; refuse what would
        // not read back as the same number.
        match text.parse::<f64>() {
            Ok(parsed) if parsed == value => Ok(AxisValue(text)),
            _ => Err(E::custom(format!("axis value {value} has no exact text form"))),
        }
    }
}

/// A partial or complete assignment of values to axes.
pub type Combination = IndexMap<String, AxisValue>;

/// A named dimension of the build matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Axis {
    pub name: String,
    pub values: Vec<AxisValue>,
}

/// Declared matrix: axes in declaration order plus exclusions and inclusions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatrixConfig {
    pub axes: IndexMap<String, Vec<AxisValue>>,
    #[serde(default)]
    pub exclude: Vec<Combination>,
    #[serde(default)]
    pub include: Vec<Combination>,
}

impl MatrixConfig {
    /// Axes in declaration order.
    pub fn axes(&self) -> Vec<Axis> {
        self.axes
            .iter()
            .map(|(name, values)| Axis {
                name: name.clone(),
                values: values.clone(),
            })
            .collect()
    }
}

/// One concrete combination of axis values.
///
/// Immutable once created; the id is a pure function of `values`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSpec {
    id: JobId,
    index: usize,
    values: Vec<(String, AxisValue)>,
}

impl JobSpec {
    pub fn new(index: usize, values: Vec<(String, AxisValue)>) -> Self {
        let id = JobId::derive(values.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        Self { id, index, values }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Position in submission order.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Axis values in axis declaration order.
    pub fn values(&self) -> &[(String, AxisValue)] {
        &self.values
    }

    pub fn value(&self, axis: &str) -> Option<&AxisValue> {
        self.values
            .iter()
            .find(|(name, _)| name == axis)
            .map(|(_, value)| value)
    }

    /// Whether every entry of `partial` agrees with this job's values.
    pub fn matches(&self, partial: &Combination) -> bool {
        partial
            .iter()
            .all(|(axis, value)| self.value(axis) == Some(value))
    }

    pub fn display_name(&self) -> String {
        if self.values.is_empty() {
            return self.id.to_string();
        }
        self.values
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scalar_axis_values_are_normalised() {
        let yaml = r#"
axes:
  python: [3.8, "3.9", 3]
  debug: [true, false]
exclude:
  - python: 3.8
    debug: true
"#;
        let matrix: MatrixConfig = serde_yaml::from_str(yaml).unwrap();
        let axes = matrix.axes();

        assert_eq!(axes[0].name, "python");
        assert_eq!(
            axes[0].values,
            vec![AxisValue::new("3.8"), AxisValue::new("3.9"), AxisValue::new("3")]
        );
        assert_eq!(axes[1].values, vec![AxisValue::new("true"), AxisValue::new("false")]);
        assert_eq!(matrix.exclude[0]["python"], AxisValue::new("3.8"));
        assert!(matrix.include.is_empty());
    }

    #[test]
    fn test_axes_keep_declaration_order() {
        let yaml = "axes:\n  zeta: [a]\n  alpha: [b]\n  mid: [c]\n";
        let matrix: MatrixConfig = serde_yaml::from_str(yaml).unwrap();
        let names: Vec<_> = matrix.axes().into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_job_spec_matches_partial_combination() {
        let job = JobSpec::new(
            0,
            vec![
                ("python".into(), "3.8".into()),
                ("os".into(), "macos".into()),
            ],
        );

        let mut partial = Combination::new();
        partial.insert("os".into(), "macos".into());
        assert!(job.matches(&partial));

        partial.insert("python".into(), "3.9".into());
        assert!(!job.matches(&partial));

        assert_eq!(job.display_name(), "python=3.8, os=macos");
    }
}
