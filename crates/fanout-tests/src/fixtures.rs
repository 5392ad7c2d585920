//! Temporary workspaces with a recipe and a scripted build tool.

use fanout_core::config::RunConfig;
use fanout_core::trigger::{Trigger, TriggerKind};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Two axes, four jobs: (3.8, ubuntu), (3.8, macos), (3.9, ubuntu), (3.9, macos).
pub const AXES_2X2: &str = "    python: ['3.8', '3.9']\n    os: [ubuntu, macos]\n";

/// Behaviour of the scripted build tool.
#[derive(Debug, Clone, Default)]
pub struct BuildScript {
    /// `python-os` combinations that exit 1.
    pub fail: Vec<String>,
    /// `python-os` combinations that sleep this many seconds first.
    pub slow: Vec<(String, f32)>,
    /// `python-os` combinations that exit 0 without writing an artifact.
    pub empty: Vec<String>,
}

impl BuildScript {
    pub fn failing(combos: &[&str]) -> Self {
        Self {
            fail: combos.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn empty(combos: &[&str]) -> Self {
        Self {
            empty: combos.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn slow(mut self, combo: &str, seconds: f32) -> Self {
        self.slow.push((combo.to_string(), seconds));
        self
    }

    /// POSIX shell source. Takes the output folder as `$1` and reads the axis
    /// values from `FANOUT_AXIS_PYTHON` and `FANOUT_AXIS_OS`.
    pub fn render(&self) -> String {
        let mut script = String::from(
            "#!/bin/sh\nout=\"$1\"\ncombo=\"${FANOUT_AXIS_PYTHON}-${FANOUT_AXIS_OS}\"\necho \"building $combo into $out\"\n",
        );
        for (combo, seconds) in &self.slow {
            script.push_str(&format!(
                "if [ \"$combo\" = \"{combo}\" ]; then sleep {seconds}; fi\n"
            ));
        }
        for combo in &self.fail {
            script.push_str(&format!(
                "if [ \"$combo\" = \"{combo}\" ]; then echo \"error: build of $combo broke\" >&2; exit 1; fi\n"
            ));
        }
        for combo in &self.empty {
            script.push_str(&format!("if [ \"$combo\" = \"{combo}\" ]; then exit 0; fi\n"));
        }
        script.push_str(
            "mkdir -p \"$out/noarch\"\ntouch \"$out/noarch/pkg-py${FANOUT_AXIS_PYTHON}-${FANOUT_AXIS_OS}.conda\"\necho done\n",
        );
        script
    }
}

/// A temporary directory holding a recipe, a build script and a config file.
pub struct WorkspaceFixture {
    dir: TempDir,
    pub recipe: PathBuf,
    pub config_path: PathBuf,
    pub script_path: PathBuf,
}

impl WorkspaceFixture {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_script(&BuildScript::default())
    }

    pub fn with_script(script: &BuildScript) -> anyhow::Result<Self> {
        let dir = TempDir::new()?;
        let recipe = dir.path().join("recipe");
        std::fs::create_dir(&recipe)?;
        std::fs::write(
            recipe.join("meta.yaml"),
            "package:\n  name: demo\n  version: 1.0\n",
        )?;
        let script_path = dir.path().join("build.sh");
        std::fs::write(&script_path, script.render())?;

        Ok(Self {
            recipe,
            config_path: dir.path().join("fanout.yaml"),
            script_path,
            dir,
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("build-output")
    }

    /// A config running the scripted build tool over `axes` (indented YAML
    /// mapping entries). `extra` is appended verbatim at the top level.
    pub fn config_yaml(&self, axes: &str, extra: &str) -> String {
        format!(
            "matrix:\n  axes:\n{axes}output_dir: {out}\nbuild:\n  program: sh\n  args: ['{script}', '{{output_folder}}']\n  artifact_extensions: ['.conda']\npublish:\n  target_user: test-org\n  retry:\n    max_retries: 3\n    base_delay_ms: 1\n    max_delay_ms: 5\n    jitter: false\n{extra}",
            out = self.output_dir().display(),
            script = self.script_path.display(),
        )
    }

    /// Write `yaml` to the config path and load it.
    pub fn write_config(&self, yaml: &str) -> anyhow::Result<RunConfig> {
        std::fs::write(&self.config_path, yaml)?;
        Ok(RunConfig::from_file(&self.config_path)?)
    }

    pub fn trigger(&self, kind: TriggerKind) -> Trigger {
        Trigger::new(&self.recipe, &self.config_path, kind)
    }
}
