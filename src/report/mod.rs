//! # Report runs
//!
//! Orchestrates a deck run: a fresh task directory, input copies, per-entity
//! slide generation in a scratch directory, the merge into one output deck and
//! the structural check of the result. [`monthly`] holds the spreadsheet reports.
use crate::chart::ChartRenderer;
use crate::config::ReportConfig;
use crate::deck::merge::append_slide;
use crate::deck::validate;
use crate::deck::validate::Issue;
use crate::deck::Deck;
use crate::error::ReportError;
use crate::error::ResultMessage;
use crate::tabular::detect::detect_files;
use crate::tabular::detect::list_files;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

pub mod entity;
pub mod monthly;
pub mod slide;

pub use entity::Datasets;
pub use entity::Entity;

/// Extensions accepted as tabular inputs
pub(crate) const INPUT_EXTENSIONS: [&str; 3] = ["csv", "xlsx", "xlsm"];

/// Errors that end a run
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Input file not found: {0}")]
    MissingInput(String),

    #[error("No input given: pass files or --input-dir")]
    NoInputs,

    #[error("Summary dataset has no entities")]
    NoEntities,

    #[error("Every entity failed, no output written")]
    AllEntitiesFailed,

    #[error("No report could be generated, put input files into '{0}'")]
    NothingGenerated(String),
}

/// Per-run working directory with `input/` and `output/`
#[derive(Clone, Debug)]
pub struct TaskDir {
    pub root: PathBuf,
    pub input: PathBuf,
    pub output: PathBuf,
}

impl TaskDir {
    /// Creates `<tasks_dir>/<date>`, or `<date>_2`, `<date>_3`… when it already exists
    pub fn create(tasks_dir: &Path, date: &str) -> Result<TaskDir, ReportError> {
        let mut root = tasks_dir.join(date);
        let mut suffix = 2;
        while root.exists() {
            root = tasks_dir.join(format!("{date}_{suffix}"));
            suffix += 1;
        }
        let task = TaskDir {
            input: root.join("input"),
            output: root.join("output"),
            root,
        };
        std::fs::create_dir_all(&task.input)
            .map_err(ReportError::from)
            .with_prefix(&format!("Create task directory '{}'", task.root.display()))?;
        std::fs::create_dir_all(&task.output)?;
        log::info!("Task directory: {}", task.root.display());
        Ok(task)
    }

    /// Copies explicit files, or every tabular file of `input_dir`, into `input/`
    pub fn copy_inputs(&self, files: &[PathBuf], input_dir: Option<&Path>) -> Result<usize, ReportError> {
        let sources = if !files.is_empty() {
            for file in files {
                if !file.is_file() {
                    Err(RunError::MissingInput(file.display().to_string()))?;
                }
            }
            files.to_vec()
        } else if let Some(directory) = input_dir {
            list_files(directory, &INPUT_EXTENSIONS)?
        } else {
            Err(RunError::NoInputs)?
        };
        for source in &sources {
            if let Some(name) = source.file_name() {
                std::fs::copy(source, self.input.join(name))
                    .map_err(ReportError::from)
                    .with_prefix(&format!("Copy input '{}'", source.display()))?;
            }
        }
        log::info!("Copied {} input file(s) to {}", sources.len(), self.input.display());
        Ok(sources.len())
    }
}

/// Parameters of a deck run
#[derive(Clone, Debug, Default)]
pub struct DeckRequest {
    /// Target month, used in the output name
    pub period: String,
    pub files: Vec<PathBuf>,
    pub input_dir: Option<PathBuf>,
    pub skip_validation: bool,
}

/// What a deck run produced
#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    pub task_dir: PathBuf,
    pub output: Option<PathBuf>,
    pub generated: Vec<String>,
    /// Entities that failed, with the reason
    pub failed: Vec<(String, String)>,
    /// Data gaps and malformed labels per entity
    pub notes: Vec<(String, String)>,
    pub issues: Vec<Issue>,
}

impl RunSummary {
    /// True when every entity was generated and the output has no structural error
    pub fn is_success(&self) -> bool {
        self.output.is_some() && self.failed.is_empty() && !validate::has_errors(&self.issues)
    }

    pub fn log(&self) {
        log::info!("Slides: {}", self.generated.len());
        for (entity, note) in &self.notes {
            log::info!("  note {}: {}", entity, note);
        }
        for (entity, reason) in &self.failed {
            log::error!("  failed {}: {}", entity, reason);
        }
        if let Some(output) = &self.output {
            log::info!("Output: {}", output.display());
        }
        log::info!("Task directory: {}", self.task_dir.display());
    }
}

/// Runs the whole deck pipeline.
///
/// Entities are generated one by one from the template; a failing entity is
/// logged, recorded and skipped. The first generated slide's deck is the base
/// the others are appended to.
///
/// # Arguments
/// * `config` - Run configuration
/// * `request` - Period and inputs of this run
/// * `date` - Date stamp of the task directory (`YYYYMMDD`)
///
/// # Returns
/// * `Result<RunSummary, ReportError>` - Generated, failed and noted entities plus validation issues
pub fn run_deck(config: &ReportConfig, request: &DeckRequest, date: &str) -> Result<RunSummary, ReportError> {
    config.require_template()?;
    let template = std::fs::read(&config.template)
        .map_err(ReportError::from)
        .with_prefix(&format!("Read template '{}'", config.template.display()))?;

    let task = TaskDir::create(&config.tasks_dir, date)?;
    task.copy_inputs(&request.files, request.input_dir.as_deref())?;

    let patterns = config.datasets.patterns();
    let detected = detect_files(&task.input, &patterns, &INPUT_EXTENSIONS)?;
    detected.require_all(&task.input, &patterns)?;
    for (role, _) in &patterns {
        if let Some(path) = detected.get(role) {
            log::info!("  {}: {}", role, path.display());
        }
    }

    let datasets = Datasets::load(&detected, &config.datasets)?;
    let entities = datasets.entities(&config.datasets)?;
    if entities.is_empty() {
        Err(RunError::NoEntities)?;
    }
    log::info!("Entities: {}", entities.len());

    let renderer = ChartRenderer::new(&config.chart);
    let title_strip = config.title_strip_regex()?;
    let scratch = tempfile::tempdir()?;
    let mut summary = RunSummary {
        task_dir: task.root.to_owned(),
        ..RunSummary::default()
    };
    let mut slides: Vec<PathBuf> = Vec::new();
    for (index, entity) in entities.iter().enumerate() {
        log::info!("Generating {}", entity.name);
        match slide::build_slide(&template, entity, config, &renderer, &title_strip) {
            Ok((mut deck, notes)) => {
                let path = scratch.path().join(format!("entity_{index}.pptx"));
                deck.save(&path)?;
                slides.push(path);
                summary.generated.push(entity.name.to_owned());
                summary.notes.extend(notes.into_iter().map(|note| (entity.name.to_owned(), note)));
            }
            Err(error) => {
                log::error!("Failed to generate {}: {}", entity.name, error);
                summary.failed.push((entity.name.to_owned(), error.to_string()));
            }
        }
    }

    let (first, rest) = match slides.split_first() {
        Some(split) => split,
        None => Err(RunError::AllEntitiesFailed)?,
    };
    log::info!("Merging {} slide(s)", slides.len());
    let mut merged = Deck::open(first)?;
    for path in rest {
        append_slide(&mut merged, &Deck::open(path)?)?;
    }
    let output = task.output.join(config.output_file_name(&request.period));
    merged.save(&output)?;
    summary.output = Some(output.to_owned());

    if request.skip_validation {
        log::info!("Validation skipped");
    } else {
        summary.issues = validate::validate_files(&output, &config.template)?;
        validate::report(&summary.issues);
    }
    Ok(summary)
}
