//! Interactive materialization of a template.
//!
//! An [`InteractiveSession`] owns a [`Form`] and drives a [`FormRenderer`]
//! through two phases:
//!
//! ```text
//!            Proceed                Save (run name set)
//!   Edit ───────────────▶ Recap ─────────────────────▶ done
//!     ▲                     │
//!     └──────── Back ───────┘         Abort anywhere ─▶ Err(Aborted)
//! ```
//!
//! Each phase is one blocking [`FormRenderer::show`] call. The renderer edits
//! answers (in Edit) or the run name (in Recap) through the form and returns
//! the operator's action. Recoverable problems such as an empty run name are
//! handed back through [`FormRenderer::report`] and the phase is shown
//! again with all input kept.

use tracing::{debug, info};

use crate::catalog::BaseCatalog;
use crate::error::RunfigError;
use crate::prompt::{Answer, Prompt, PromptOptions, build_prompts};
use crate::resolve::Resolver;
use crate::run::RUN_NAME_KEY;
use crate::value::{Table, Value, table_get, table_set};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Edit,
    Recap,
}

/// What the operator asked for when a phase was shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormAction {
    /// Edit → Recap.
    Proceed,
    /// Recap → Edit.
    Back,
    /// Recap → done.
    Save,
    Abort,
}

/// Result of applying an action to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Show the (possibly new) phase again.
    Continue,
    Finished,
}

/// The prompts of a session together with the operator's answers.
#[derive(Debug, Clone)]
pub struct Form {
    prompts: Vec<Prompt>,
    answers: Vec<Option<Answer>>,
    run_name: String,
    phase: Phase,
}

impl Form {
    pub fn new(prompts: Vec<Prompt>) -> Self {
        let answers = prompts.iter().map(Prompt::initial_answer).collect();
        Self {
            prompts,
            answers,
            run_name: String::new(),
            phase: Phase::Edit,
        }
    }

    pub fn prompts(&self) -> &[Prompt] {
        &self.prompts
    }

    pub fn answer(&self, index: usize) -> Option<&Answer> {
        self.answers.get(index)?.as_ref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    /// Whether the prompt at `index` accepts input in the current phase.
    pub fn is_editable(&self, index: usize) -> bool {
        self.phase == Phase::Edit && self.prompts.get(index).is_some_and(|p| !p.is_group())
    }

    /// Record an answer. Only allowed in the Edit phase, and only with an
    /// answer that fits the prompt.
    pub fn set_answer(&mut self, index: usize, answer: Answer) -> Result<(), RunfigError> {
        let prompt = self
            .prompts
            .get(index)
            .ok_or_else(|| RunfigError::InvalidAnswer {
                key: format!("#{index}"),
                reason: format!("there are only {} prompts", self.prompts.len()),
            })?;
        if self.phase != Phase::Edit {
            return Err(RunfigError::InvalidAnswer {
                key: prompt.key.clone(),
                reason: "answers are read-only in the recap".into(),
            });
        }
        prompt.validate(&answer)?;
        self.answers[index] = Some(answer);
        Ok(())
    }

    /// Set the run name. Only allowed in the Recap phase.
    pub fn set_run_name(&mut self, name: impl Into<String>) -> Result<(), RunfigError> {
        if self.phase != Phase::Recap {
            return Err(RunfigError::InvalidAnswer {
                key: RUN_NAME_KEY.into(),
                reason: "the run name is set in the recap".into(),
            });
        }
        self.run_name = name.into();
        Ok(())
    }

    pub fn display_answer(&self, index: usize) -> String {
        match self.prompts.get(index) {
            Some(prompt) => prompt.display_answer(self.answer(index)),
            None => String::new(),
        }
    }

    /// First prompt still lacking an answer.
    fn first_missing(&self) -> Option<&Prompt> {
        self.prompts
            .iter()
            .zip(&self.answers)
            .find(|(prompt, answer)| !prompt.is_group() && answer.is_none())
            .map(|(prompt, _)| prompt)
    }
}

/// Paints a [`Form`] and collects the operator's input.
pub trait FormRenderer {
    /// Show the form in its current phase and block until the operator
    /// picks an action.
    fn show(&mut self, form: &mut Form) -> Result<FormAction, RunfigError>;

    /// Surface a recoverable error. The form is shown again afterwards.
    fn report(&mut self, _error: &RunfigError) {}
}

pub struct InteractiveSession<'a> {
    form: Form,
    catalog: &'a BaseCatalog,
    options: PromptOptions,
}

impl<'a> InteractiveSession<'a> {
    /// Build the prompts for `template`. A top-level `run_name` is not
    /// prompted for; it pre-fills the run name instead.
    pub fn new(
        template: &Table,
        catalog: &'a BaseCatalog,
        options: PromptOptions,
    ) -> Result<Self, RunfigError> {
        let mut template = template.clone();
        let preset_name = template.remove(RUN_NAME_KEY);
        let prompts = build_prompts(&template, catalog, &options)?;
        debug!(prompts = prompts.len(), "Built prompts");
        let mut form = Form::new(prompts);
        if let Some(name) = preset_name {
            form.run_name = name.to_literal();
        }
        Ok(Self {
            form,
            catalog,
            options,
        })
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut Form {
        &mut self.form
    }

    /// Apply an operator action to the state machine.
    ///
    /// `MissingAnswer` (on Proceed) and `EmptyRunName` (on Save) leave the
    /// phase unchanged, so the caller may report them and continue.
    pub fn apply(&mut self, action: FormAction) -> Result<Transition, RunfigError> {
        match (self.form.phase, action) {
            (_, FormAction::Abort) => {
                info!("Materialization aborted");
                Err(RunfigError::Aborted)
            }
            (Phase::Edit, FormAction::Proceed) => {
                if let Some(prompt) = self.form.first_missing() {
                    return Err(RunfigError::MissingAnswer {
                        key: prompt.key.clone(),
                    });
                }
                debug!("Edit -> Recap");
                self.form.phase = Phase::Recap;
                Ok(Transition::Continue)
            }
            (Phase::Recap, FormAction::Back) => {
                debug!("Recap -> Edit");
                self.form.phase = Phase::Edit;
                Ok(Transition::Continue)
            }
            (Phase::Recap, FormAction::Save) => {
                if self.form.run_name.trim().is_empty() {
                    return Err(RunfigError::EmptyRunName);
                }
                debug!(run_name = %self.form.run_name.trim(), "Recap saved");
                Ok(Transition::Finished)
            }
            (phase, action) => {
                debug!(?phase, ?action, "Ignoring action");
                Ok(Transition::Continue)
            }
        }
    }

    /// Write every answer at its dotted key, plus the run name.
    pub fn assemble(&self) -> Result<Table, RunfigError> {
        let mut tree = Table::new();
        for (index, prompt) in self.form.prompts.iter().enumerate() {
            match prompt.extract(self.form.answer(index), &self.options.base_key)? {
                Some(value) => table_set(&mut tree, &prompt.key, value),
                // Keep empty groups as empty maps.
                None if table_get(&tree, &prompt.key).is_none() => {
                    table_set(&mut tree, &prompt.key, Value::Map(Table::new()))
                }
                None => {}
            }
        }
        let run_name = self.form.run_name.trim();
        if !run_name.is_empty() {
            tree.insert(RUN_NAME_KEY.into(), Value::String(run_name.to_string()));
        }
        Ok(tree)
    }

    /// Assemble the answers and resolve every inheritance reference.
    pub fn finish(&self) -> Result<Table, RunfigError> {
        let raw = self.assemble()?;
        Resolver::new(self.catalog)
            .with_base_key(&self.options.base_key)
            .resolve(&raw)
    }

    /// Drive `renderer` until the operator saves or aborts.
    pub fn run(mut self, renderer: &mut dyn FormRenderer) -> Result<Table, RunfigError> {
        loop {
            let action = renderer.show(&mut self.form)?;
            match self.apply(action) {
                Ok(Transition::Finished) => break,
                Ok(Transition::Continue) => {}
                Err(err @ (RunfigError::EmptyRunName | RunfigError::MissingAnswer { .. })) => {
                    renderer.report(&err);
                }
                Err(err) => return Err(err),
            }
        }
        let tree = self.finish()?;
        info!(run_name = %self.form.run_name.trim(), "Template materialized");
        Ok(tree)
    }
}

/// Turn `template` into a resolved run tree by prompting through `renderer`.
pub fn materialize(
    template: &Table,
    catalog: &BaseCatalog,
    renderer: &mut dyn FormRenderer,
) -> Result<Table, RunfigError> {
    InteractiveSession::new(template, catalog, PromptOptions::default())?.run(renderer)
}
