//! Multi-stage pipelines: a fixed chain of external stages per input file.
//!
//! Every stage consumes the file the previous stage produced and writes
//! the next one. Items run concurrently in an in-process pool. Within one
//! item the stages run one after another, each as a keyed subprocess in a
//! private single-slot pool, so each stage leaves its own
//! `output_{bin}_{run}_{stage}.out/.err` pair.
//!
//! ```toml
//! [pipeline]
//! name = "detector-response"
//!
//! [[pipeline.stages]]
//! name = "clsim"
//! command = "sh /scripts/clsim.sh {input} {output}"
//! output = "/sim/generated/clsim/{bin}/{run}.i3.bz2"
//!
//! [[pipeline.stages]]
//! name = "detector"
//! command = "sh /scripts/detector.sh {input} {output}"
//! output = "/sim/generated/detector/{bin}/{run}.i3.bz2"
//! ```
//!
//! Placeholders: `{key}`, `{bin}`, `{run}`, `{input}`, `{output}`.

pub mod inputs;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{RunSummary, TaskReport, WorkItem};
use crate::pool::{CallLauncher, CommandLauncher, CommandPool, PoolConfig, WorkPool};
use crate::source::Source;

pub use inputs::{PipelineInput, discover_inputs};

/// Top-level TOML wrapper.
#[derive(Debug, Deserialize)]
struct PipelineFile {
    pipeline: PipelineDef,
}

#[derive(Debug, Deserialize)]
struct PipelineDef {
    name: String,
    #[serde(default)]
    stages: Vec<Stage>,
}

/// One external processing step.
#[derive(Debug, Clone, Deserialize)]
pub struct Stage {
    pub name: String,
    /// Command line template.
    pub command: String,
    /// Output file template. Also the next stage's `{input}`. May use every
    /// placeholder except `{output}`.
    pub output: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Stage {
    pub fn new(name: impl Into<String>, command: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            output: output.into(),
            enabled: true,
        }
    }

    fn output_path(&self, input: &PipelineInput, current: &Path) -> PathBuf {
        PathBuf::from(render(&self.output, input, current, None))
    }

    fn command_line(&self, input: &PipelineInput, current: &Path, output: &Path) -> String {
        render(&self.command, input, current, Some(output))
    }
}

fn render(template: &str, input: &PipelineInput, current: &Path, output: Option<&Path>) -> String {
    let mut text = template
        .replace("{key}", &input.key())
        .replace("{bin}", &input.bin)
        .replace("{run}", &input.run)
        .replace("{input}", &current.to_string_lossy());
    if let Some(output) = output {
        text = text.replace("{output}", &output.to_string_lossy());
    }
    text
}

/// What happened to one stage of one item.
#[derive(Debug, Clone)]
pub enum StageStatus {
    /// The stage ran; the report says how it ended.
    Ran(TaskReport),
    /// The output already existed.
    Skipped,
    Disabled,
}

/// A named chain of stages.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub name: String,
    stages: Vec<Stage>,
    log_dir: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, stages: Vec<Stage>) -> Result<Self> {
        let name = name.into();
        if stages.is_empty() {
            return Err(Error::Config(format!("pipeline {name} has no stages")));
        }
        let mut seen = HashSet::new();
        for stage in &stages {
            if stage.name.trim().is_empty() {
                return Err(Error::Config(format!("pipeline {name} has a stage without a name")));
            }
            if !seen.insert(stage.name.as_str()) {
                return Err(Error::Config(format!(
                    "pipeline {name} defines stage {} twice",
                    stage.name
                )));
            }
            if stage.output.contains("{output}") {
                return Err(Error::Config(format!(
                    "stage {} names its output in terms of itself",
                    stage.name
                )));
            }
        }
        Ok(Self {
            name,
            stages,
            log_dir: None,
        })
    }

    /// Parse a pipeline definition from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let file: PipelineFile = toml::from_str(text)
            .map_err(|e| Error::Config(format!("bad pipeline definition: {e}")))?;
        Self::new(file.pipeline.name, file.pipeline.stages)
    }

    /// Load a pipeline definition from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read pipeline {}: {e}", path.display()))
        })?;
        Self::from_toml(&text)
    }

    /// Directory for the per-stage `.out`/`.err` logs. Required before any
    /// item is run.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }

    fn require_log_dir(&self) -> Result<PathBuf> {
        self.log_dir.clone().ok_or_else(|| {
            Error::Config(format!("pipeline {} has no log directory", self.name))
        })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Enable exactly the named stages and disable the rest.
    pub fn restrict_to(&mut self, names: &[String]) -> Result<()> {
        for name in names {
            if !self.stages.iter().any(|s| &s.name == name) {
                return Err(Error::Config(format!(
                    "pipeline {} has no stage {name}",
                    self.name
                )));
            }
        }
        for stage in &mut self.stages {
            stage.enabled = names.contains(&stage.name);
        }
        Ok(())
    }

    /// Push one input through every stage, in order.
    ///
    /// A stage runs only when it is enabled and its output does not exist
    /// yet. Disabled and skipped stages still name their output, which
    /// becomes the next stage's input. A failing stage does not stop the
    /// chain; its stderr log is the record of the failure.
    pub async fn run_item(&self, input: PipelineInput) -> Result<Vec<(String, StageStatus)>> {
        let key = input.key();
        let mut pool = CommandPool::new(
            CommandLauncher::new(),
            Source::empty(),
            PoolConfig {
                capacity: 1,
                log_dir: Some(self.require_log_dir()?),
                ..PoolConfig::default()
            },
        )?;

        let mut statuses = Vec::with_capacity(self.stages.len());
        let mut current = input.path.clone();

        for stage in &self.stages {
            let output = stage.output_path(&input, &current);

            let status = if !stage.enabled {
                debug!(key = %key, stage = %stage.name, "stage disabled");
                StageStatus::Disabled
            } else if output.exists() {
                info!(key = %key, stage = %stage.name, output = %output.display(), "output exists, skipping stage");
                StageStatus::Skipped
            } else {
                if !current.exists() {
                    warn!(key = %key, stage = %stage.name, input = %current.display(), "stage input does not exist");
                }
                let stage_key = format!("{key}_{}", stage.name);
                let command = stage.command_line(&input, &current, &output);
                info!(key = %key, stage = %stage.name, "running stage");
                pool.admit_keyed(stage_key.clone(), command)?;
                StageStatus::Ran(pool.reap(&stage_key).await?)
            };

            statuses.push((stage.name.clone(), status));
            current = output;
        }

        Ok(statuses)
    }
}

/// Run every input through the pipeline, at most `config.capacity` items at
/// a time.
pub async fn run_pipeline(
    pipeline: Arc<Pipeline>,
    inputs: Vec<PipelineInput>,
    config: PoolConfig,
) -> Result<RunSummary> {
    pipeline.require_log_dir()?;
    info!(pipeline = %pipeline.name, items = inputs.len(), "starting pipeline");

    let source = Source::new(move || {
        inputs
            .into_iter()
            .map(|input| WorkItem::new(input.key(), input))
    });
    let launcher = CallLauncher::new(move |input: PipelineInput| {
        let pipeline = Arc::clone(&pipeline);
        async move { pipeline.run_item(input).await.map(|_| ()) }
    });

    let mut pool = WorkPool::new(launcher, source, config)?;
    pool.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> PipelineInput {
        PipelineInput {
            bin: "5.0".to_string(),
            run: "000007".to_string(),
            path: PathBuf::from("/in/5.0/DAT000007"),
        }
    }

    #[test]
    fn render_fills_placeholders() {
        let stage = Stage::new(
            "clsim",
            "sh clsim.sh {input} {output} --key {key}",
            "/out/clsim/{bin}/{run}.i3.bz2",
        );
        let input = input();
        let output = stage.output_path(&input, &input.path);
        assert_eq!(output, PathBuf::from("/out/clsim/5.0/000007.i3.bz2"));
        assert_eq!(
            stage.command_line(&input, &input.path, &output),
            "sh clsim.sh /in/5.0/DAT000007 /out/clsim/5.0/000007.i3.bz2 --key 5.0_000007"
        );
    }

    #[test]
    fn parses_toml_definition() {
        let pipeline = Pipeline::from_toml(
            r#"
            [pipeline]
            name = "detector-response"

            [[pipeline.stages]]
            name = "clsim"
            command = "sh clsim.sh {input} {output}"
            output = "/out/clsim/{bin}/{run}"

            [[pipeline.stages]]
            name = "detector"
            command = "sh det.sh {input} {output}"
            output = "/out/det/{bin}/{run}"
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(pipeline.name, "detector-response");
        assert_eq!(pipeline.stages().len(), 2);
        assert!(pipeline.stages()[0].enabled);
        assert!(!pipeline.stages()[1].enabled);
    }

    #[test]
    fn rejects_duplicate_and_empty_definitions() {
        let dup = vec![Stage::new("a", "x", "y"), Stage::new("a", "x", "z")];
        assert!(matches!(Pipeline::new("p", dup), Err(Error::Config(_))));
        assert!(matches!(Pipeline::new("p", vec![]), Err(Error::Config(_))));
    }

    #[test]
    fn output_template_cannot_name_itself() {
        let stages = vec![Stage::new("a", "x {output}", "/out/{output}.bz2")];
        assert!(matches!(Pipeline::new("p", stages), Err(Error::Config(_))));
    }

    #[test]
    fn items_need_a_log_directory() {
        let pipeline = Pipeline::new("p", vec![Stage::new("a", "x", "/out/{key}")]).unwrap();
        assert!(pipeline.log_dir().is_none());
        assert!(matches!(pipeline.require_log_dir(), Err(Error::Config(_))));

        let pipeline = pipeline.with_log_dir("/logs");
        assert_eq!(pipeline.require_log_dir().unwrap(), PathBuf::from("/logs"));
    }

    #[test]
    fn restrict_to_toggles_stages() {
        let mut pipeline = Pipeline::new(
            "p",
            vec![Stage::new("a", "x", "1"), Stage::new("b", "x", "2")],
        )
        .unwrap();

        pipeline.restrict_to(&["b".to_string()]).unwrap();
        assert!(!pipeline.stages()[0].enabled);
        assert!(pipeline.stages()[1].enabled);

        assert!(pipeline.restrict_to(&["nope".to_string()]).is_err());
    }
}
