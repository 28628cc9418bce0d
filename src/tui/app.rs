use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Local;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

use crate::config::{save_config, Config};
use crate::grading::{GroupRecord, ModuleId, ModuleRecord, ResultSet};
use crate::output::{default_file_name, format_score, write_export, ExportFormat};
use crate::session::{EditField, NoticeLevel, Session, SessionEvent};
use crate::tui::theme::ThemeColors;

const FLASH_DURATION: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum View {
    Modules,
    Groups,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputMode {
    Normal,
    Editing(EditField),
    Help,
}

pub struct App {
    pub session: Session,
    pub events: UnboundedReceiver<SessionEvent>,
    pub table_state: ratatui::widgets::TableState,
    pub current_view: View,
    pub input_mode: InputMode,
    pub edit_input: String,
    /// UE picked with `m`, waiting for the second one
    pub marked_group: Option<String>,
    pub flash_message: Option<(String, NoticeLevel, Instant)>,
    pub should_quit: bool,
    pub config: Config,
    pub config_path: PathBuf,
    pub export_dir: PathBuf,
    pub theme: ThemeColors,
}

impl App {
    pub fn new(mut session: Session, config: Config, config_path: PathBuf, export_dir: PathBuf) -> Self {
        let events = session.subscribe();
        let mut table_state = ratatui::widgets::TableState::default();
        if !session.snapshot().modules.is_empty() {
            table_state.select(Some(0));
        }

        Self {
            session,
            events,
            table_state,
            current_view: View::Modules,
            input_mode: InputMode::Normal,
            edit_input: String::new(),
            marked_group: None,
            flash_message: None,
            should_quit: false,
            config,
            config_path,
            export_dir,
            theme: ThemeColors::dark(),
        }
    }

    pub fn result(&self) -> &ResultSet {
        self.session.snapshot()
    }

    pub fn row_count(&self) -> usize {
        match self.current_view {
            View::Modules => self.result().modules.len(),
            View::Groups => self.result().groups.len(),
        }
    }

    pub fn next_row(&mut self) {
        let len = self.row_count();
        if len == 0 {
            return;
        }
        let i = match self.table_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.table_state.select(Some(i));
    }

    pub fn previous_row(&mut self) {
        let len = self.row_count();
        if len == 0 {
            return;
        }
        let i = match self.table_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => (i - 1).min(len - 1),
        };
        self.table_state.select(Some(i));
    }

    /// Keep the selection inside the current table after a rebuild.
    fn clamp_selection(&mut self) {
        let len = self.row_count();
        if len == 0 {
            self.table_state.select(None);
        } else if let Some(selected) = self.table_state.selected() {
            if selected >= len {
                self.table_state.select(Some(len - 1));
            }
        } else {
            self.table_state.select(Some(0));
        }
    }

    /// Toggle between the Modules and UE tables
    pub fn toggle_view(&mut self) {
        self.current_view = match self.current_view {
            View::Modules => View::Groups,
            View::Groups => View::Modules,
        };
        if self.row_count() == 0 {
            self.table_state.select(None);
        } else {
            self.table_state.select(Some(0));
        }
    }

    pub fn selected_module(&self) -> Option<(ModuleId, &ModuleRecord)> {
        if self.current_view != View::Modules {
            return None;
        }
        let i = self.table_state.selected()?;
        self.result().modules.get(i).map(|m| (ModuleId(i), m))
    }

    pub fn selected_group(&self) -> Option<&GroupRecord> {
        if self.current_view != View::Groups {
            return None;
        }
        let i = self.table_state.selected()?;
        self.result().groups.get(i)
    }

    pub fn show_flash(&mut self, msg: impl Into<String>, level: NoticeLevel) {
        self.flash_message = Some((msg.into(), level, Instant::now()));
    }

    pub fn update_flash(&mut self) {
        if let Some((_, _, shown)) = &self.flash_message {
            if shown.elapsed() >= FLASH_DURATION {
                self.flash_message = None;
            }
        }
    }

    /// Periodic work: debounced recalculation, session notices, flash expiry.
    pub fn tick(&mut self, now: Instant) {
        self.session.poll(now);
        self.drain_events();
        self.update_flash();
    }

    pub fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                SessionEvent::Notice { level, message } => self.show_flash(message, level),
                SessionEvent::Recalculated { .. } => self.clamp_selection(),
            }
        }
    }

    /// Open the edit popup for one cell of the selected module, prefilled
    /// with its current value.
    pub fn start_edit(&mut self, field: EditField) {
        let Some((id, module)) = self.selected_module() else {
            return;
        };
        if module.is_aggregate {
            self.show_flash("La moyenne générale n'est pas modifiable", NoticeLevel::Warning);
            return;
        }
        // The record may be ahead of the snapshot while a recalculation is pending
        let record = self.session.records().get(id.0).unwrap_or(module);
        let current = match field {
            EditField::Cc => format_score(record.cc_score),
            EditField::Lab => format_score(record.lab_score),
            EditField::Exam => format_score(record.exam_score),
            EditField::Credits => record.credits.to_string(),
        };
        self.edit_input = current;
        self.input_mode = InputMode::Editing(field);
    }

    pub fn confirm_edit(&mut self, now: Instant) {
        let InputMode::Editing(field) = self.input_mode else {
            return;
        };
        let selected = self.selected_module().map(|(id, _)| id);
        if let Some(id) = selected {
            let raw = std::mem::take(&mut self.edit_input);
            self.session.submit_edit(id, field, &raw, now);
            self.drain_events();
        }
        self.cancel_edit();
    }

    pub fn cancel_edit(&mut self) {
        self.input_mode = InputMode::Normal;
        self.edit_input.clear();
    }

    /// First press marks the selected UE, second press on another UE merges
    /// the two. Pressing again on the marked UE clears the mark.
    pub fn mark_or_merge(&mut self) {
        let Some(group) = self.selected_group() else {
            return;
        };
        if group.is_aggregate {
            self.show_flash("La moyenne générale ne peut pas être fusionnée", NoticeLevel::Warning);
            return;
        }
        let selected = group.name.clone();

        match self.marked_group.take() {
            None => {
                self.show_flash(
                    format!("{} marquée, choisir une autre UE puis m", selected),
                    NoticeLevel::Info,
                );
                self.marked_group = Some(selected);
            }
            Some(marked) if marked == selected => {
                self.show_flash("Sélection annulée", NoticeLevel::Info);
            }
            Some(marked) => {
                let merged = self.session.request_merge(&marked, &selected);
                self.drain_events();
                if let Ok(merged) = merged {
                    let index = self.result().groups.iter().position(|g| g.name == merged.name);
                    self.table_state.select(index);
                }
            }
        }
    }

    pub fn split_selected(&mut self) {
        let Some(group) = self.selected_group() else {
            return;
        };
        let name = group.name.clone();
        if self.marked_group.as_deref() == Some(name.as_str()) {
            self.marked_group = None;
        }
        let split = self.session.request_split(&name);
        self.drain_events();
        match split {
            Ok(landed) => {
                let index = landed
                    .first()
                    .and_then(|first| self.result().groups.iter().position(|g| &g.name == first));
                self.table_state.select(index);
                self.clamp_selection();
            }
            // The refusal is already flashed; the selection stays put
            Err(e) => debug!(group = %name, "Split not applied: {}", e),
        }
    }

    /// Export the current results into `export_dir` under the default file name.
    pub fn export(&mut self, format: ExportFormat) {
        let contents = match self.session.request_export(format) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(error = %e, "Export failed");
                self.drain_events();
                return;
            }
        };
        self.drain_events();

        let path = self.export_dir.join(default_file_name(format, &Local::now()));
        match write_export(&path, &contents) {
            Ok(()) => self.show_flash(
                format!("Export {} écrit: {}", format.label(), path.display()),
                NoticeLevel::Success,
            ),
            Err(e) => {
                warn!("Export failed: {:#}", e);
                self.show_flash(format!("Erreur lors de l'export: {}", e), NoticeLevel::Error);
            }
        }
    }

    /// Write the live UE layout back into the config file.
    pub fn save_catalog(&mut self) {
        self.config.catalog = self.session.catalog().clone();
        match save_config(&self.config_path, &self.config) {
            Ok(()) => self.show_flash(
                format!("UE enregistrées dans {}", self.config_path.display()),
                NoticeLevel::Success,
            ),
            Err(e) => {
                warn!("Saving catalog failed: {:#}", e);
                self.show_flash(format!("Échec de l'enregistrement: {}", e), NoticeLevel::Error);
            }
        }
    }

    pub fn show_help(&mut self) {
        self.input_mode = InputMode::Help;
    }

    pub fn dismiss_help(&mut self) {
        self.input_mode = InputMode::Normal;
    }
}
