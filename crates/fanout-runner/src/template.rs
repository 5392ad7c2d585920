//! Build argument templates.

use fanout_core::matrix::JobSpec;
use std::path::Path;

/// Values substituted into `{placeholder}` tokens of build arguments.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    pub job: &'a JobSpec,
    pub recipe: &'a Path,
    pub output_folder: &'a Path,
    pub variant_config: Option<&'a Path>,
}

impl TemplateContext<'_> {
    /// Render every argument.
    ///
    /// Without a variant config, an argument using `{variant_config}` is
    /// dropped. A bare `{variant_config}` argument also takes the `-flag`
    /// argument before it.
    pub fn render_args(&self, templates: &[String]) -> Vec<String> {
        let mut rendered: Vec<String> = Vec::with_capacity(templates.len());
        let mut previous_was_flag = false;

        for template in templates {
            if self.variant_config.is_none() && template.contains("{variant_config}") {
                // A bare value belongs to the flag before it; `--x={variant_config}`
                // stands alone.
                if template == "{variant_config}" && previous_was_flag {
                    rendered.pop();
                }
                previous_was_flag = false;
                continue;
            }
            previous_was_flag = template.starts_with('-');
            rendered.push(self.render(template));
        }

        rendered
    }

    pub fn render(&self, template: &str) -> String {
        let mut out = template
            .replace("{recipe}", &self.recipe.display().to_string())
            .replace("{output_folder}", &self.output_folder.display().to_string())
            .replace("{job_id}", self.job.id().as_str())
            .replace("{variants}", &self.variants());
        if let Some(variant_config) = self.variant_config {
            out = out.replace("{variant_config}", &variant_config.display().to_string());
        }
        for (axis, value) in self.job.values() {
            out = out.replace(&format!("{{axis.{axis}}}"), value.as_str());
        }
        out
    }

    /// Axis values as an inline mapping, e.g. `{python: 3.9, os: ubuntu}`.
    pub fn variants(&self) -> String {
        let pairs: Vec<String> = self
            .job
            .values()
            .iter()
            .map(|(axis, value)| format!("{axis}: {value}"))
            .collect();
        format!("{{{}}}", pairs.join(", "))
    }

    /// Environment exported to the build tool.
    pub fn env(&self) -> Vec<(String, String)> {
        let mut env = vec![("FANOUT_JOB_ID".to_string(), self.job.id().to_string())];
        env.extend(
            self.job
                .values()
                .iter()
                .map(|(axis, value)| (axis_env_name(axis), value.to_string())),
        );
        env
    }
}

/// `python-version` becomes `FANOUT_AXIS_PYTHON_VERSION`.
pub fn axis_env_name(axis: &str) -> String {
    let name: String = axis
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("FANOUT_AXIS_{name}")
}
