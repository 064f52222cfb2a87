//! Terminal form renderer.
//!
//! One row per prompt. Groups are bold, non-selectable rows.
//!
//! | Key | Edit phase | Recap phase |
//! |-----|------------|-------------|
//! | Up / Down / Tab | move between editable rows | |
//! | typing, Backspace | edit text, date and file rows | edit the run name |
//! | Left / Right | cycle toggles and choices | |
//! | Ctrl-S | proceed to the recap | save |
//! | Ctrl-B | | back to editing |
//! | Esc / Ctrl-C | abort | abort |
//!
//! Key handling lives in [`FormCursor`], which works on a [`Form`] without a
//! terminal.

use std::io::{self, Stdout, Write};
use std::path::PathBuf;

use chrono::NaiveDate;
use crossterm::{
    cursor::Show,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

use crate::error::RunfigError;
use crate::prompt::{Answer, PromptKind};
use crate::session::{Form, FormAction, FormRenderer, Phase};

const RUN_NAME_LABEL: &str = "RUN NAME";

/// Cursor and edit buffers over a [`Form`] for one phase.
#[derive(Debug, Clone)]
pub struct FormCursor {
    selected: Option<usize>,
    /// Text being typed into text, date and file rows.
    buffers: Vec<Option<String>>,
    run_name: String,
    status: Option<String>,
}

impl FormCursor {
    pub fn new(form: &Form) -> Self {
        let buffers = form
            .prompts()
            .iter()
            .enumerate()
            .map(|(i, prompt)| match prompt.kind {
                PromptKind::Text { .. } | PromptKind::Date { .. } | PromptKind::File { .. } => {
                    Some(form.display_answer(i))
                }
                _ => None,
            })
            .collect();
        let mut cursor = Self {
            selected: None,
            buffers,
            run_name: form.run_name().to_string(),
            status: None,
        };
        cursor.selected = cursor.selectable_rows(form).first().copied();
        cursor
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    fn selectable_rows(&self, form: &Form) -> Vec<usize> {
        match form.phase() {
            Phase::Edit => (0..form.prompts().len())
                .filter(|&i| form.is_editable(i))
                .collect(),
            Phase::Recap => vec![form.prompts().len()],
        }
    }

    /// Text shown in the value column of `row`.
    pub fn row_value(&self, form: &Form, row: usize) -> String {
        if row == form.prompts().len() {
            return self.run_name.clone();
        }
        match self.buffers.get(row) {
            Some(Some(buffer)) => buffer.clone(),
            _ => form.display_answer(row),
        }
    }

    /// Apply one key press. Returns the action that ends the phase, if any.
    pub fn handle_key(&mut self, key: KeyEvent, form: &mut Form) -> Option<FormAction> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => return Some(FormAction::Abort),
            KeyCode::Char('c') if ctrl => return Some(FormAction::Abort),
            KeyCode::Char('s') if ctrl => return self.confirm(form),
            KeyCode::Char('b') if ctrl => {
                return (form.phase() == Phase::Recap).then_some(FormAction::Back);
            }
            KeyCode::Up | KeyCode::BackTab => self.move_by(form, -1),
            KeyCode::Down | KeyCode::Tab => self.move_by(form, 1),
            KeyCode::Left => self.cycle(form, -1),
            KeyCode::Right => self.cycle(form, 1),
            KeyCode::Backspace => {
                if let Some(buffer) = self.active_buffer(form) {
                    buffer.pop();
                }
            }
            KeyCode::Char(c) if !ctrl => {
                if let Some(buffer) = self.active_buffer(form) {
                    buffer.push(c);
                }
            }
            _ => {}
        }
        None
    }

    fn move_by(&mut self, form: &Form, step: isize) {
        let rows = self.selectable_rows(form);
        if rows.is_empty() {
            return;
        }
        let pos = self
            .selected
            .and_then(|sel| rows.iter().position(|&r| r == sel))
            .unwrap_or(0);
        let next = (pos as isize + step).rem_euclid(rows.len() as isize) as usize;
        self.selected = Some(rows[next]);
    }

    fn cycle(&mut self, form: &mut Form, step: isize) {
        let Some(row) = self.selected else {
            return;
        };
        if form.phase() != Phase::Edit {
            return;
        }
        let Some(count) = form.prompts().get(row).and_then(|p| p.choices()).map(|c| c.len()) else {
            return;
        };
        let current = match form.answer(row) {
            Some(Answer::Index(i)) => *i,
            _ => 0,
        };
        let next = (current as isize + step).rem_euclid(count as isize) as usize;
        if let Err(err) = form.set_answer(row, Answer::Index(next)) {
            self.status = Some(err.to_string());
        }
    }

    fn active_buffer(&mut self, form: &Form) -> Option<&mut String> {
        let row = self.selected?;
        match form.phase() {
            Phase::Recap if row == form.prompts().len() => Some(&mut self.run_name),
            Phase::Edit => self.buffers.get_mut(row)?.as_mut(),
            Phase::Recap => None,
        }
    }

    /// Ctrl-S: commit typed text and end the phase.
    fn confirm(&mut self, form: &mut Form) -> Option<FormAction> {
        let result = match form.phase() {
            Phase::Edit => self.commit(form).map(|()| FormAction::Proceed),
            Phase::Recap => form
                .set_run_name(self.run_name.clone())
                .map(|()| FormAction::Save),
        };
        match result {
            Ok(action) => {
                self.status = None;
                Some(action)
            }
            Err(err) => {
                self.status = Some(err.to_string());
                None
            }
        }
    }

    /// Write every edit buffer into the form. An empty date buffer leaves the
    /// answer unset.
    fn commit(&self, form: &mut Form) -> Result<(), RunfigError> {
        for (index, buffer) in self.buffers.iter().enumerate() {
            let Some(buffer) = buffer else {
                continue;
            };
            let answer = match &form.prompts()[index].kind {
                PromptKind::Text { .. } => Answer::Text(buffer.clone()),
                PromptKind::File { .. } => Answer::Path(PathBuf::from(buffer.trim())),
                PromptKind::Date { .. } if buffer.trim().is_empty() => continue,
                PromptKind::Date { .. } => {
                    let date = NaiveDate::parse_from_str(buffer.trim(), "%Y-%m-%d").map_err(
                        |e| RunfigError::InvalidAnswer {
                            key: form.prompts()[index].key.clone(),
                            reason: format!("'{buffer}' is not a YYYY-MM-DD date: {e}"),
                        },
                    )?;
                    Answer::Date(date)
                }
                _ => continue,
            };
            form.set_answer(index, answer)?;
        }
        Ok(())
    }
}

/// [`FormRenderer`] painting the form in the terminal's alternate screen.
#[derive(Debug, Default)]
pub struct TerminalRenderer {
    status: Option<String>,
}

impl TerminalRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FormRenderer for TerminalRenderer {
    fn show(&mut self, form: &mut Form) -> Result<FormAction, RunfigError> {
        let mut guard = TerminalGuard::enter(io::stdout())?;
        let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

        let mut cursor = FormCursor::new(form);
        if let Some(status) = self.status.take() {
            cursor.set_status(status);
        }
        let result = run_form(&mut terminal, form, &mut cursor);

        guard.restore()?;
        result
    }

    fn report(&mut self, error: &RunfigError) {
        self.status = Some(error.to_string());
    }
}

/// Raw mode and the alternate screen, left again on drop so that an early
/// `?` never strands the terminal.
struct TerminalGuard<W: Write> {
    out: W,
    restored: bool,
}

impl<W: Write> TerminalGuard<W> {
    fn enter(out: W) -> io::Result<Self> {
        enable_raw_mode()?;
        let mut guard = Self {
            out,
            restored: false,
        };
        execute!(guard.out, EnterAlternateScreen)?;
        Ok(guard)
    }

    /// Idempotent; both steps run even if the first fails.
    fn restore(&mut self) -> io::Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        let screen = execute!(self.out, LeaveAlternateScreen, Show);
        let raw = disable_raw_mode();
        screen.and(raw)
    }
}

impl<W: Write> Drop for TerminalGuard<W> {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

fn run_form(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    form: &mut Form,
    cursor: &mut FormCursor,
) -> Result<FormAction, RunfigError> {
    loop {
        terminal.draw(|f| draw_form(f, form, cursor))?;
        if let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
            && let Some(action) = cursor.handle_key(key, form)
        {
            return Ok(action);
        }
    }
}

fn draw_form(f: &mut Frame, form: &Form, cursor: &FormCursor) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(f.area());

    let label_width = form
        .prompts()
        .iter()
        .map(|p| p.label.chars().count())
        .chain([RUN_NAME_LABEL.len()])
        .max()
        .unwrap_or(0)
        + 2;

    let mut items: Vec<ListItem> = form
        .prompts()
        .iter()
        .enumerate()
        .map(|(i, prompt)| {
            if prompt.is_group() {
                return ListItem::new(Line::from(Span::styled(
                    format!("{}:", prompt.label),
                    Style::default().add_modifier(Modifier::BOLD),
                )));
            }
            let label = format!("{}:", prompt.label);
            let value_style = if form.is_editable(i) {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default().fg(Color::Gray)
            };
            let hint = match prompt.choices() {
                Some(choices) if form.is_editable(i) => format!("  ◀ {} ▶", choices.len()),
                _ => String::new(),
            };
            ListItem::new(Line::from(vec![
                Span::raw(format!("{label:<label_width$}")),
                Span::styled(cursor.row_value(form, i), value_style),
                Span::styled(hint, Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect();

    if form.phase() == Phase::Recap {
        let label = format!("{RUN_NAME_LABEL}:");
        items.push(ListItem::new(Line::from(vec![
            Span::styled(
                format!("{label:<label_width$}"),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                cursor.row_value(form, form.prompts().len()),
                Style::default().fg(Color::Cyan),
            ),
        ])));
    }

    let title = match form.phase() {
        Phase::Edit => " Edit run ",
        Phase::Recap => " Recap ",
    };
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(
            Style::default()
                .add_modifier(Modifier::BOLD)
                .fg(Color::Black)
                .bg(Color::White),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(cursor.selected());
    f.render_stateful_widget(list, chunks[0], &mut state);

    let footer = match cursor.status() {
        Some(status) => Line::from(Span::styled(status.to_string(), Style::default().fg(Color::Red))),
        None => {
            let bold = Style::default().add_modifier(Modifier::BOLD);
            let mut spans = vec![
                Span::raw("Move: "),
                Span::styled("Up/Down", bold),
                Span::raw(" | "),
            ];
            match form.phase() {
                Phase::Edit => {
                    spans.push(Span::raw("Choose: "));
                    spans.push(Span::styled("Left/Right", bold));
                    spans.push(Span::raw(" | Recap: "));
                    spans.push(Span::styled("Ctrl-S", bold));
                }
                Phase::Recap => {
                    spans.push(Span::raw("Save: "));
                    spans.push(Span::styled("Ctrl-S", bold));
                    spans.push(Span::raw(" | Back: "));
                    spans.push(Span::styled("Ctrl-B", bold));
                }
            }
            spans.push(Span::raw(" | Abort: "));
            spans.push(Span::styled("Esc", bold));
            Line::from(spans)
        }
    };
    let footer = Paragraph::new(footer)
        .block(Block::default().borders(Borders::ALL))
        .alignment(ratatui::layout::Alignment::Center);
    f.render_widget(footer, chunks[1]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BaseCatalog;
    use crate::prompt::{PromptOptions, build_prompts};
    use crate::value::{Table, Value};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_text(cursor: &mut FormCursor, form: &mut Form, text: &str) {
        for c in text.chars() {
            assert_eq!(cursor.handle_key(key(KeyCode::Char(c)), form), None);
        }
    }

    /// Form over `{epochs: 10, opt: {name: @OPTIONS(sgd; adam)}, start: @DATE, use_bn: @BOOL(true)}`.
    fn sample_form() -> Form {
        let mut opt = Table::new();
        opt.insert("name".into(), Value::from("@OPTIONS(sgd; adam)"));
        let mut template = Table::new();
        template.insert("epochs".into(), Value::from(10));
        template.insert("opt".into(), Value::Map(opt));
        template.insert("start".into(), Value::from("@DATE"));
        template.insert("use_bn".into(), Value::from("@BOOL(true)"));
        let prompts =
            build_prompts(&template, &BaseCatalog::empty(), &PromptOptions::default()).unwrap();
        Form::new(prompts)
    }

    // Rows: 0 epochs, 1 opt (group), 2 opt.name, 3 start, 4 use_bn

    #[test]
    fn starts_on_first_editable_row_and_skips_groups() {
        let mut form = sample_form();
        let mut cursor = FormCursor::new(&form);
        assert_eq!(cursor.selected(), Some(0));
        cursor.handle_key(key(KeyCode::Down), &mut form);
        assert_eq!(cursor.selected(), Some(2));
        cursor.handle_key(key(KeyCode::Up), &mut form);
        cursor.handle_key(key(KeyCode::Up), &mut form);
        assert_eq!(cursor.selected(), Some(4));
    }

    #[test]
    fn typing_edits_text_rows() {
        let mut form = sample_form();
        let mut cursor = FormCursor::new(&form);
        cursor.handle_key(key(KeyCode::Backspace), &mut form);
        cursor.handle_key(key(KeyCode::Backspace), &mut form);
        type_text(&mut cursor, &mut form, "25");
        assert_eq!(cursor.row_value(&form, 0), "25");
    }

    #[test]
    fn left_right_cycle_choices() {
        let mut form = sample_form();
        let mut cursor = FormCursor::new(&form);
        cursor.handle_key(key(KeyCode::Down), &mut form);
        cursor.handle_key(key(KeyCode::Right), &mut form);
        assert_eq!(form.answer(2), Some(&Answer::Index(1)));
        cursor.handle_key(key(KeyCode::Right), &mut form);
        assert_eq!(form.answer(2), Some(&Answer::Index(0)));
        cursor.handle_key(key(KeyCode::Left), &mut form);
        assert_eq!(form.display_answer(2), "adam");
    }

    #[test]
    fn ctrl_s_commits_buffers_and_proceeds() {
        let mut form = sample_form();
        let mut cursor = FormCursor::new(&form);
        cursor.handle_key(key(KeyCode::Down), &mut form);
        cursor.handle_key(key(KeyCode::Down), &mut form);
        assert_eq!(cursor.selected(), Some(3));
        type_text(&mut cursor, &mut form, "2023-04-05");
        assert_eq!(cursor.handle_key(ctrl('s'), &mut form), Some(FormAction::Proceed));
        assert_eq!(
            form.answer(3),
            Some(&Answer::Date(NaiveDate::from_ymd_opt(2023, 4, 5).unwrap()))
        );
        assert_eq!(form.answer(0), Some(&Answer::Text("10".into())));
    }

    #[test]
    fn bad_date_sets_status_and_stays() {
        let mut form = sample_form();
        let mut cursor = FormCursor::new(&form);
        cursor.handle_key(key(KeyCode::Down), &mut form);
        cursor.handle_key(key(KeyCode::Down), &mut form);
        type_text(&mut cursor, &mut form, "soon");
        assert_eq!(cursor.handle_key(ctrl('s'), &mut form), None);
        assert!(cursor.status().unwrap().contains("start"));
    }

    #[test]
    fn escape_and_ctrl_c_abort() {
        let mut form = sample_form();
        let mut cursor = FormCursor::new(&form);
        assert_eq!(cursor.handle_key(key(KeyCode::Esc), &mut form), Some(FormAction::Abort));
        assert_eq!(cursor.handle_key(ctrl('c'), &mut form), Some(FormAction::Abort));
    }

    #[test]
    fn ctrl_b_only_in_recap() {
        let mut form = sample_form();
        let mut cursor = FormCursor::new(&form);
        assert_eq!(cursor.handle_key(ctrl('b'), &mut form), None);
    }

    #[test]
    fn terminal_guard_restores_on_drop() {
        let mut out = Vec::new();
        drop(TerminalGuard {
            out: &mut out,
            restored: false,
        });
        let written = String::from_utf8(out).unwrap();
        assert!(written.contains("\x1b[?1049l"));
        assert!(written.contains("\x1b[?25h"));
    }

    #[test]
    fn terminal_guard_restores_once() {
        let mut out = Vec::new();
        {
            let mut guard = TerminalGuard {
                out: &mut out,
                restored: false,
            };
            guard.restore().unwrap();
            guard.restore().unwrap();
        }
        let written = String::from_utf8(out).unwrap();
        assert_eq!(written.matches("\x1b[?1049l").count(), 1);
    }
}
