//! Matrix expansion into concrete build jobs.

use fanout_core::matrix::{Axis, AxisValue, Combination, JobSpec, MatrixConfig};
use fanout_core::{Error, Result};
use std::collections::HashSet;
use tracing::debug;

/// Expands a declared matrix into the ordered list of jobs.
///
/// The first declared axis varies slowest. Exclusions filter the cartesian
/// product; includes are appended afterwards unless already present. The
/// output order depends only on the input, so job identities and logs are
/// reproducible between runs.
pub struct AxisResolver;

impl AxisResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, matrix: &MatrixConfig) -> Result<Vec<JobSpec>> {
        let axes = matrix.axes();
        self.validate_axes(&axes)?;
        for exclude in &matrix.exclude {
            self.validate_exclude(&axes, exclude)?;
        }
        for include in &matrix.include {
            self.validate_include(&axes, include)?;
        }

        let mut combinations: Vec<Vec<(String, AxisValue)>> = self
            .generate_combinations(&axes)
            .into_iter()
            .filter(|combo| {
                !matrix
                    .exclude
                    .iter()
                    .any(|exclude| Self::matches(combo, exclude))
            })
            .collect();

        for include in &matrix.include {
            let combo: Vec<(String, AxisValue)> = axes
                .iter()
                .map(|axis| (axis.name.clone(), include[&axis.name].clone()))
                .collect();
            if !combinations.contains(&combo) {
                combinations.push(combo);
            }
        }

        let jobs: Vec<JobSpec> = combinations
            .into_iter()
            .enumerate()
            .map(|(index, values)| JobSpec::new(index, values))
            .collect();

        debug!(
            axes = axes.len(),
            excluded = matrix.exclude.len(),
            included = matrix.include.len(),
            jobs = jobs.len(),
            "Resolved build matrix"
        );

        Ok(jobs)
    }

    fn validate_axes(&self, axes: &[Axis]) -> Result<()> {
        for axis in axes {
            if axis.values.is_empty() {
                return Err(Error::Configuration(format!(
                    "axis '{}' has no values",
                    axis.name
                )));
            }
            let mut seen = HashSet::new();
            for value in &axis.values {
                if !seen.insert(value) {
                    return Err(Error::Configuration(format!(
                        "axis '{}' lists value '{}' more than once",
                        axis.name, value
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_exclude(&self, axes: &[Axis], exclude: &Combination) -> Result<()> {
        if exclude.is_empty() {
            return Err(Error::Configuration(
                "empty exclusion would remove every job".to_string(),
            ));
        }
        for (name, value) in exclude {
            let axis = axes.iter().find(|a| &a.name == name).ok_or_else(|| {
                Error::Configuration(format!("exclusion references unknown axis '{name}'"))
            })?;
            if !axis.values.contains(value) {
                return Err(Error::Configuration(format!(
                    "exclusion references unknown value '{value}' of axis '{name}'"
                )));
            }
        }
        Ok(())
    }

    fn validate_include(&self, axes: &[Axis], include: &Combination) -> Result<()> {
        let complete = include.len() == axes.len()
            && axes.iter().all(|axis| include.contains_key(&axis.name));
        if !complete {
            let names: Vec<_> = axes.iter().map(|a| a.name.as_str()).collect();
            return Err(Error::Configuration(format!(
                "include entries must set exactly the axes [{}]",
                names.join(", ")
            )));
        }
        Ok(())
    }

    fn generate_combinations(&self, axes: &[Axis]) -> Vec<Vec<(String, AxisValue)>> {
        let mut result = vec![Vec::new()];

        for axis in axes {
            let mut next = Vec::with_capacity(result.len() * axis.values.len());
            for combo in &result {
                for value in &axis.values {
                    let mut extended = combo.clone();
                    extended.push((axis.name.clone(), value.clone()));
                    next.push(extended);
                }
            }
            result = next;
        }

        result
    }

    fn matches(combo: &[(String, AxisValue)], exclude: &Combination) -> bool {
        exclude.iter().all(|(name, value)| {
            combo
                .iter()
                .any(|(axis, candidate)| axis == name && candidate == value)
        })
    }
}

impl Default for AxisResolver {
    fn default() -> Self {
        Self::new()
    }
}
