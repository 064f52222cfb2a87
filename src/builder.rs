use std::path::PathBuf;

use tracing::debug;

use crate::catalog::BaseCatalog;
use crate::error::RunfigError;
use crate::format;
use crate::merge::deep_merge;
use crate::overrides;
use crate::resolve::Resolver;
use crate::run::{self, RUN_NAME_KEY, RunConfig, RunNameStrategy};
use crate::session::{FormRenderer, InteractiveSession};
use crate::settings::Settings;
use crate::value::{Table, Value};

/// Entry point for loading a run configuration.
pub struct Runfig;

impl Runfig {
    pub fn builder() -> RunfigBuilder {
        RunfigBuilder::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum RunSource {
    RunFile(PathBuf),
    Template(PathBuf),
}

/// Builder for loading one run's configuration.
///
/// A run comes either from a concrete run file, resolved directly against
/// the catalog, or from a template materialized through a
/// [`FormRenderer`]. Overrides are applied on top of the resolved tree.
pub struct RunfigBuilder {
    base_dir: Option<PathBuf>,
    source: Option<RunSource>,
    settings: Option<Settings>,
    cli_args: Vec<String>,
    cli_overrides: Vec<(String, Value)>,
    create_out_dir: bool,
    run_name_strategy: RunNameStrategy,
}

impl RunfigBuilder {
    fn new() -> Self {
        Self {
            base_dir: None,
            source: None,
            settings: None,
            cli_args: Vec::new(),
            cli_overrides: Vec::new(),
            create_out_dir: false,
            run_name_strategy: RunNameStrategy::default(),
        }
    }

    /// Directory holding the base catalog. Required.
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Load a concrete run file. Replaces any template set earlier.
    pub fn run_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(RunSource::RunFile(path.into()));
        self
    }

    /// Materialize a template interactively. Replaces any run file set earlier.
    pub fn template_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(RunSource::Template(path.into()));
        self
    }

    /// Use explicit settings instead of the built-in defaults.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Raw `--key=value` arguments, parsed when loading.
    pub fn cli_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cli_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an override. `None` values are ignored (useful for optional clap args).
    pub fn cli_override<V: Into<Value>>(mut self, key: &str, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.cli_overrides.push((key.to_string(), v.into()));
        }
        self
    }

    /// Create `output_root/run_name` and save the run file into it
    /// (default: `false`).
    pub fn create_out_dir(mut self, enabled: bool) -> Self {
        self.create_out_dir = enabled;
        self
    }

    /// How to name a run whose tree has no `run_name` (default: date).
    pub fn run_name_strategy(mut self, strategy: RunNameStrategy) -> Self {
        self.run_name_strategy = strategy;
        self
    }

    fn effective_settings(&self) -> Result<Settings, RunfigError> {
        match &self.settings {
            Some(settings) => Ok(settings.clone()),
            None => Settings::defaults(),
        }
    }

    fn effective_catalog(&self) -> Result<BaseCatalog, RunfigError> {
        let dir = self.base_dir.as_ref().ok_or(RunfigError::BaseDirRequired)?;
        BaseCatalog::load(dir)
    }

    /// Parsed `cli_args` followed by `cli_override` entries, so the explicit
    /// overrides win on conflicts.
    fn effective_overrides(&self) -> Result<Vec<(String, Value)>, RunfigError> {
        let mut all = overrides::parse_overrides(&self.cli_args)?;
        all.extend(self.cli_overrides.iter().cloned());
        Ok(all)
    }

    /// Load the run. Templates are materialized in the terminal.
    #[cfg(feature = "tui")]
    pub fn load(self) -> Result<RunConfig, RunfigError> {
        let mut renderer = crate::tui::TerminalRenderer::new();
        self.load_with(&mut renderer)
    }

    /// Load the run. Without the `tui` feature, templates need
    /// [`load_with`](Self::load_with).
    #[cfg(not(feature = "tui"))]
    pub fn load(self) -> Result<RunConfig, RunfigError> {
        if matches!(self.source, Some(RunSource::Template(_))) {
            return Err(RunfigError::RunSourceRequired);
        }
        self.load_with(&mut NoRenderer)
    }

    /// Load the run, materializing a template through `renderer`. The
    /// renderer is not used for run files.
    pub fn load_with(self, renderer: &mut dyn FormRenderer) -> Result<RunConfig, RunfigError> {
        let settings = self.effective_settings()?;
        let source = self.source.clone().ok_or(RunfigError::RunSourceRequired)?;
        let overrides = self.effective_overrides()?;
        let catalog = self.effective_catalog()?;

        let (resolved, marker) = match &source {
            RunSource::RunFile(path) => {
                let mut tree = format::read_map(path)?;
                let marker = run::take_out_dir_marker(&mut tree);
                let resolved = Resolver::new(&catalog)
                    .with_base_key(&settings.base_key)
                    .resolve(&tree)?;
                debug!(path = %path.display(), "Resolved run file");
                (resolved, marker)
            }
            RunSource::Template(path) => {
                let template = format::read_map(path)?;
                let session =
                    InteractiveSession::new(&template, &catalog, settings.prompt_options())?;
                (session.run(renderer)?, None)
            }
        };

        let mut tree = if overrides.is_empty() {
            resolved
        } else {
            debug!(count = overrides.len(), "Applying overrides");
            deep_merge(resolved, overrides::overrides_to_table(&overrides))
        };

        let run_name = self
            .run_name_strategy
            .run_name(&tree, &settings.run_name_date_format)?;
        tree.insert(RUN_NAME_KEY.into(), Value::String(run_name.clone()));

        let out_dir = match marker {
            Some(dir) => {
                debug!(out_dir = %dir.display(), "Reusing run directory");
                Some(dir)
            }
            None if self.create_out_dir => Some(run::create_out_dir(&tree, &run_name, &settings)?),
            None => None,
        };

        Ok(RunConfig::new(tree, run_name, out_dir))
    }
}

#[cfg(not(feature = "tui"))]
struct NoRenderer;

#[cfg(not(feature = "tui"))]
impl FormRenderer for NoRenderer {
    fn show(&mut self, _form: &mut crate::session::Form) -> Result<crate::session::FormAction, RunfigError> {
        Err(RunfigError::RunSourceRequired)
    }
}

/// Resolve a tree that is already in memory. Useful for callers that build
/// run trees themselves.
pub fn resolve_tree(
    tree: &Table,
    catalog: &BaseCatalog,
    settings: &Settings,
) -> Result<Table, RunfigError> {
    Resolver::new(catalog)
        .with_base_key(&settings.base_key)
        .resolve(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{catalog_dir, write_file};
    use crate::prompt::Answer;
    use crate::session::{Form, FormAction, Phase};
    use crate::value::table_get;
    use tempfile::TempDir;

    const RUN_FILE: &str = "\
run_name: exp1
epochs: 30
dataset:
  base: dataset.cifar.cifar100
net:
  base: net.resnet.resnet18
  num_layers: 34
";

    /// Picks the second option of every selection, then saves as `picked`.
    struct PickSecond;

    impl FormRenderer for PickSecond {
        fn show(&mut self, form: &mut Form) -> Result<FormAction, RunfigError> {
            match form.phase() {
                Phase::Edit => {
                    for i in 0..form.prompts().len() {
                        if matches!(form.answer(i), Some(Answer::Index(_))) {
                            form.set_answer(i, Answer::Index(1))?;
                        }
                    }
                    Ok(FormAction::Proceed)
                }
                Phase::Recap => {
                    form.set_run_name("picked")?;
                    Ok(FormAction::Save)
                }
            }
        }
    }

    fn settings_in(dir: &TempDir) -> Settings {
        let mut settings = Settings::defaults().unwrap();
        settings.output_root = dir.path().join("logs");
        settings
    }

    #[test]
    fn base_dir_required() {
        let result = Runfig::builder().run_file("run.yaml").load_with(&mut PickSecond);
        assert!(matches!(result.unwrap_err(), RunfigError::BaseDirRequired));
    }

    #[test]
    fn run_source_required() {
        let dir = catalog_dir();
        let result = Runfig::builder()
            .base_dir(dir.path().join("bases"))
            .load_with(&mut PickSecond);
        assert!(matches!(result.unwrap_err(), RunfigError::RunSourceRequired));
    }

    #[test]
    fn run_file_is_resolved() {
        let dir = catalog_dir();
        write_file(dir.path(), "run.yaml", RUN_FILE);
        let run = Runfig::builder()
            .base_dir(dir.path().join("bases"))
            .run_file(dir.path().join("run.yaml"))
            .load_with(&mut PickSecond)
            .unwrap();

        assert_eq!(run.run_name(), "exp1");
        assert_eq!(run.get_as::<i64>("epochs").unwrap(), 30);
        assert_eq!(run.get_as::<i64>("dataset.num_classes").unwrap(), 100);
        assert_eq!(run.get_as::<String>("net.name").unwrap(), "resnet18");
        assert_eq!(run.get_as::<i64>("net.num_layers").unwrap(), 34);
        assert!(run.get_as::<bool>("net.use_skip").unwrap());
        assert!(run.get("net.base").is_err());
        assert!(run.out_dir().is_none());
    }

    #[test]
    fn overrides_apply_on_top() {
        let dir = catalog_dir();
        write_file(dir.path(), "run.yaml", RUN_FILE);
        let run = Runfig::builder()
            .base_dir(dir.path().join("bases"))
            .run_file(dir.path().join("run.yaml"))
            .cli_args(["--epochs=5", "--net.ckpt_path=best.pth"])
            .cli_override("net.num_layers", Some(50))
            .cli_override::<i64>("ignored", None)
            .load_with(&mut PickSecond)
            .unwrap();

        assert_eq!(run.get_as::<i64>("epochs").unwrap(), 5);
        assert_eq!(run.get_as::<String>("net.ckpt_path").unwrap(), "best.pth");
        assert_eq!(run.get_as::<i64>("net.num_layers").unwrap(), 50);
        assert_eq!(run.get_as::<String>("net.name").unwrap(), "resnet18");
        assert!(run.get("ignored").is_err());
    }

    #[test]
    fn invalid_cli_arg_rejected() {
        let dir = catalog_dir();
        write_file(dir.path(), "run.yaml", RUN_FILE);
        let result = Runfig::builder()
            .base_dir(dir.path().join("bases"))
            .run_file(dir.path().join("run.yaml"))
            .cli_args(["--epochs:5"])
            .load_with(&mut PickSecond);
        assert!(matches!(
            result.unwrap_err(),
            RunfigError::InvalidOverride { .. }
        ));
    }

    #[test]
    fn missing_run_name_with_required_strategy() {
        let dir = catalog_dir();
        write_file(dir.path(), "run.yaml", "epochs: 3\n");
        let result = Runfig::builder()
            .base_dir(dir.path().join("bases"))
            .run_file(dir.path().join("run.yaml"))
            .run_name_strategy(RunNameStrategy::Required)
            .load_with(&mut PickSecond);
        assert!(matches!(result.unwrap_err(), RunfigError::RunNameRequired));
    }

    #[test]
    fn out_dir_created_and_reused() {
        let dir = catalog_dir();
        write_file(dir.path(), "run.yaml", RUN_FILE);
        let settings = settings_in(&dir);

        let first = Runfig::builder()
            .base_dir(dir.path().join("bases"))
            .run_file(dir.path().join("run.yaml"))
            .settings(settings.clone())
            .create_out_dir(true)
            .load_with(&mut PickSecond)
            .unwrap();
        let out_dir = first.out_dir().unwrap().to_path_buf();
        assert_eq!(out_dir, dir.path().join("logs/exp1"));
        let saved = out_dir.join("run.yaml");
        assert!(saved.is_file());

        let again = Runfig::builder()
            .base_dir(dir.path().join("bases"))
            .run_file(&saved)
            .settings(settings)
            .create_out_dir(true)
            .load_with(&mut PickSecond)
            .unwrap();
        assert_eq!(again.out_dir(), Some(out_dir.as_path()));
        assert!(again.get(run::OUT_DIR_KEY).is_err());
        assert_eq!(again.tree(), first.tree());
        let runs = std::fs::read_dir(dir.path().join("logs")).unwrap().count();
        assert_eq!(runs, 1);
    }

    #[test]
    fn template_is_materialized() {
        let dir = catalog_dir();
        write_file(
            dir.path(),
            "template.yaml",
            "epochs: 10\nuse_bn: \"@BOOL(true)\"\nparams: \"@BASE(params)\"\nopt:\n  name: \"@OPTIONS(sgd; adam)\"\n",
        );
        let run = Runfig::builder()
            .base_dir(dir.path().join("bases"))
            .template_file(dir.path().join("template.yaml"))
            .load_with(&mut PickSecond)
            .unwrap();

        assert_eq!(run.run_name(), "picked");
        assert_eq!(run.get_as::<i64>("epochs").unwrap(), 10);
        assert!(!run.get_as::<bool>("use_bn").unwrap());
        assert_eq!(run.get_as::<String>("opt.name").unwrap(), "adam");
        // params: default, test, train
        assert!(!run.get_as::<bool>("params.use_augmentation").unwrap());
        assert!(run.get_as::<bool>("params.use_bn").unwrap());
        assert_eq!(table_get(run.tree(), "params.base"), None);
    }

    #[test]
    fn custom_base_key_from_settings() {
        let dir = catalog_dir();
        write_file(dir.path(), "run.yaml", "run_name: x\nnet:\n  inherit: net.efficientnet\n");
        let mut settings = Settings::defaults().unwrap();
        settings.base_key = "inherit".into();
        let run = Runfig::builder()
            .base_dir(dir.path().join("bases"))
            .run_file(dir.path().join("run.yaml"))
            .settings(settings)
            .load_with(&mut PickSecond)
            .unwrap();
        assert_eq!(run.get_as::<i64>("net.num_layers").unwrap(), 20);
    }

    #[test]
    fn resolve_tree_in_memory() {
        let dir = catalog_dir();
        let catalog = BaseCatalog::load(&dir.path().join("bases")).unwrap();
        let mut tree = Table::new();
        tree.insert("base".into(), Value::from("params.train"));
        let resolved = resolve_tree(&tree, &catalog, &Settings::defaults().unwrap()).unwrap();
        assert_eq!(resolved["use_augmentation"], Value::from(true));
    }
}
