pub mod app;
pub mod event;
pub mod theme;
pub mod ui;

pub use app::App;
pub use theme::ThemeColors;

use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use event::{Event, EventHandler};

use crate::output::ExportFormat;
use crate::session::EditField;

/// Tick period; also the latency bound for debounced recalculation.
const TICK_RATE_MS: u64 = 250;

pub async fn run_tui(mut app: App) -> anyhow::Result<()> {
    // Buffer log output while the TUI owns the terminal
    crate::stderr_buffer::activate();

    // Init terminal (sets up panic hooks automatically)
    let mut terminal = ratatui::init();
    let mut events = EventHandler::new(TICK_RATE_MS);

    let outcome = loop {
        if let Err(e) = terminal.draw(|frame| ui::draw(frame, &mut app)) {
            break Err(e.into());
        }

        match events.next().await {
            Event::Key(key) => handle_key_event(&mut app, key),
            Event::Tick => app.tick(Instant::now()),
        }

        if app.should_quit {
            break Ok(());
        }
    };

    ratatui::restore();

    // Flush buffered log lines now that the terminal is restored
    for msg in crate::stderr_buffer::drain() {
        eprintln!("{}", msg);
    }

    outcome
}

fn handle_key_event(app: &mut App, key: KeyEvent) {
    match app.input_mode {
        app::InputMode::Normal => match key.code {
            KeyCode::Char('q') => app.should_quit = true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                app.should_quit = true
            }

            // Navigation
            KeyCode::Char('j') | KeyCode::Down => app.next_row(),
            KeyCode::Char('k') | KeyCode::Up => app.previous_row(),
            KeyCode::Tab => app.toggle_view(),

            // Cell edits
            KeyCode::Char('1') => app.start_edit(EditField::Cc),
            KeyCode::Char('2') => app.start_edit(EditField::Lab),
            KeyCode::Char('3') => app.start_edit(EditField::Exam),
            KeyCode::Char('c') => app.start_edit(EditField::Credits),

            // UE layout
            KeyCode::Char('m') => app.mark_or_merge(),
            KeyCode::Char('s') => app.split_selected(),
            KeyCode::Char('w') => app.save_catalog(),

            // Exports
            KeyCode::Char('e') => app.export(ExportFormat::Csv),
            KeyCode::Char('J') => app.export(ExportFormat::Json),
            KeyCode::Char('p') => app.export(ExportFormat::Report),

            KeyCode::Char('?') => app.show_help(),
            _ => {}
        },
        app::InputMode::Editing(_) => match key.code {
            KeyCode::Enter => app.confirm_edit(Instant::now()),
            KeyCode::Esc => app.cancel_edit(),
            KeyCode::Backspace => {
                app.edit_input.pop();
            }
            KeyCode::Char(c) if c.is_ascii_digit() || matches!(c, ',' | '.' | '-' | '+') => {
                app.edit_input.push(c);
            }
            // Ignore all other keys (don't propagate to Normal mode)
            _ => {}
        },
        app::InputMode::Help => {
            // Any key exits help
            app.dismiss_help();
        }
    }
}
