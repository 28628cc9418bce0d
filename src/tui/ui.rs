use ratatui::prelude::*;
use ratatui::widgets::{Block, Cell, Clear, Paragraph, Row, Table, Tabs};

use crate::grading::{GroupRecord, ModuleId, ModuleRecord};
use crate::output::{format_average, format_decimal, format_score, status_label, truncate_name};
use crate::session::EditField;
use crate::tui::app::{App, InputMode, View};

pub fn draw(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    // Handle very small terminal sizes gracefully
    if area.height < 6 || area.width < 40 {
        let msg = Paragraph::new("Terminal too small").alignment(Alignment::Center);
        frame.render_widget(msg, area);
        return;
    }

    // Layout: Title(1) + Tabs(1) + Table(fill) + Status(1)
    let chunks = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .split(area);

    render_title(frame, chunks[0], app);
    render_tabs(frame, chunks[1], app);
    match app.current_view {
        View::Modules => render_module_table(frame, chunks[2], app),
        View::Groups => render_group_table(frame, chunks[2], app),
    }
    render_status_bar(frame, chunks[3], app);

    match app.input_mode {
        InputMode::Editing(field) => render_edit_popup(frame, app, field),
        InputMode::Help => render_help_popup(frame, app),
        InputMode::Normal => {}
    }
}

fn render_title(frame: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;
    let result = app.result();
    let average = result.general_average();
    let passed = app.session.passing().overall_passes(average);

    let left = "UE Calc";
    let mut right = format!("Moyenne Générale: {} / 20", format_decimal(average));
    if result.overall_group().is_some() {
        right.push_str(&format!("  UE: {} / 20", format_decimal(result.general_ue_average())));
    }
    if app.session.has_pending() {
        right.push_str("  (recalcul...)");
    }
    let padding = (area.width as usize).saturating_sub(left.len() + right.chars().count());

    let title = Line::from(vec![
        Span::styled(left, Style::default().fg(theme.title_color).bold()),
        Span::raw(" ".repeat(padding)),
        Span::styled(right, Style::default().fg(theme.verdict_color(Some(passed)))),
    ]);
    frame.render_widget(Paragraph::new(title), area);
}

fn render_tabs(frame: &mut Frame, area: Rect, app: &App) {
    let result = app.result();
    let titles = vec![
        format!("Modules ({})", result.module_count()),
        format!("UE ({})", result.group_count()),
    ];
    let selected = match app.current_view {
        View::Modules => 0,
        View::Groups => 1,
    };

    let tabs = Tabs::new(titles)
        .select(selected)
        .style(app.theme.tab_inactive_style)
        .highlight_style(app.theme.tab_active_style.reversed())
        .divider(" | ");

    frame.render_widget(tabs, area);
}

/// Score cell for an editable field, showing the rejected raw text when the
/// last edit was refused.
fn score_cell<'a>(app: &App, id: ModuleId, field: EditField, score: Option<f64>) -> Cell<'a> {
    match app.session.invalid_inputs().get(&(id, field)) {
        Some(raw) => Cell::from(format!("{:>6}", raw)).style(app.theme.invalid_cell),
        None => Cell::from(format!("{:>6}", format_score(score))),
    }
}

fn module_row<'a>(app: &App, idx: usize, module: &ModuleRecord) -> Row<'a> {
    let theme = &app.theme;
    let id = ModuleId(idx);
    // Scores come from the live record so edits show before the recalculation
    let record = app.session.records().get(idx).unwrap_or(module);

    let verdict = app.session.passing().module_passes(module);
    let mut average = vec![Span::styled(
        format!("{:>6}", format_average(module.average)),
        Style::default().fg(theme.verdict_color(verdict)),
    )];
    if module.has_retake {
        average.push(Span::styled(" R", Style::default().fg(theme.retake_badge).bold()));
    }

    let row = Row::new(vec![
        Cell::from(format!("{}.", idx + 1)).style(Style::default().fg(theme.index_color)),
        Cell::from(truncate_name(&module.designation, 40)),
        Cell::from(truncate_name(&module.teacher, 24)).style(Style::default().fg(theme.muted)),
        score_cell(app, id, EditField::Cc, record.cc_score),
        score_cell(app, id, EditField::Lab, record.lab_score),
        score_cell(app, id, EditField::Exam, record.exam_score),
        Cell::from(format!("{:>3}", record.credits)),
        Cell::from(Line::from(average)),
    ]);

    if module.is_aggregate {
        row.style(theme.aggregate_row)
    } else if idx % 2 == 1 {
        row.style(Style::default().bg(theme.row_alt_bg))
    } else {
        row
    }
}

fn render_module_table(frame: &mut Frame, area: Rect, app: &mut App) {
    if app.result().modules.is_empty() {
        let empty_msg = Paragraph::new("No modules found")
            .alignment(Alignment::Center)
            .block(Block::default());
        frame.render_widget(empty_msg, area);
        return;
    }

    let rows: Vec<Row> = app
        .result()
        .modules
        .iter()
        .enumerate()
        .map(|(idx, module)| module_row(app, idx, module))
        .collect();

    let widths = [
        Constraint::Length(4),  // Index: "99."
        Constraint::Fill(2),    // Designation
        Constraint::Fill(1),    // Teacher
        Constraint::Length(6),  // CC
        Constraint::Length(6),  // TP
        Constraint::Length(6),  // Examen
        Constraint::Length(3),  // Credits
        Constraint::Length(8),  // Average + retake badge
    ];

    let table = Table::new(rows, widths)
        .header(
            Row::new(vec!["#", "Désignation", "Enseignant", "    CC", "    TP", "Examen", "Cr.", "  Moy."])
                .style(app.theme.header_style)
                .bottom_margin(1),
        )
        .row_highlight_style(app.theme.row_selected);

    frame.render_stateful_widget(table, area, &mut app.table_state);
}

fn group_row<'a>(app: &App, idx: usize, group: &GroupRecord) -> Row<'a> {
    let theme = &app.theme;
    let passing = app.session.passing();
    let marked = app.marked_group.as_deref() == Some(group.name.as_str());

    let (status, color) = if group.is_aggregate {
        (String::new(), theme.muted)
    } else {
        let passed = passing.group_passes(group);
        (status_label(passed).to_string(), theme.verdict_color(Some(passed)))
    };
    let name = if marked {
        format!("* {}", group.name)
    } else {
        group.name.clone()
    };

    let row = Row::new(vec![
        Cell::from(format!("{}.", idx + 1)).style(Style::default().fg(theme.index_color)),
        Cell::from(name),
        Cell::from(group.member_names().join("; ")).style(Style::default().fg(theme.muted)),
        Cell::from(format!("{:>3}", group.total_credits)),
        Cell::from(format!("{:>6}", format_decimal(group.average))).style(Style::default().fg(color)),
        Cell::from(status).style(Style::default().fg(color)),
    ]);

    if marked {
        row.style(theme.marked_row)
    } else if group.is_aggregate {
        row.style(theme.aggregate_row)
    } else if idx % 2 == 1 {
        row.style(Style::default().bg(theme.row_alt_bg))
    } else {
        row
    }
}

fn render_group_table(frame: &mut Frame, area: Rect, app: &mut App) {
    if app.result().groups.is_empty() {
        let empty_msg = Paragraph::new("No UE found")
            .alignment(Alignment::Center)
            .block(Block::default());
        frame.render_widget(empty_msg, area);
        return;
    }

    let rows: Vec<Row> = app
        .result()
        .groups
        .iter()
        .enumerate()
        .map(|(idx, group)| group_row(app, idx, group))
        .collect();

    let widths = [
        Constraint::Length(4),
        Constraint::Fill(1),    // UE name
        Constraint::Fill(2),    // Members
        Constraint::Length(3),  // Credits
        Constraint::Length(6),  // Average
        Constraint::Length(10), // Status
    ];

    let table = Table::new(rows, widths)
        .header(
            Row::new(vec!["#", "UE", "Modules", "Cr.", "  Moy.", "Statut"])
                .style(app.theme.header_style)
                .bottom_margin(1),
        )
        .row_highlight_style(app.theme.row_selected);

    frame.render_stateful_widget(table, area, &mut app.table_state);
}

fn render_status_bar(frame: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;
    let text = if let Some((ref msg, level, _)) = app.flash_message {
        Line::from(Span::styled(msg.clone(), Style::default().fg(theme.flash_color(level))))
    } else {
        let hints: &[(&str, &str)] = match app.current_view {
            View::Modules => &[
                ("j/k", ":nav "),
                ("1/2/3", ":CC/TP/Examen "),
                ("c", ":crédits "),
                ("e/J/p", ":export "),
                ("Tab", ":UE "),
                ("?", ":help "),
                ("q", ":quit"),
            ],
            View::Groups => &[
                ("j/k", ":nav "),
                ("m", ":fusionner "),
                ("s", ":séparer "),
                ("w", ":enregistrer "),
                ("Tab", ":modules "),
                ("?", ":help "),
                ("q", ":quit"),
            ],
        };

        let mut spans = Vec::new();
        for (i, (key, label)) in hints.iter().enumerate() {
            if i > 0 {
                spans.push(Span::raw(" "));
            }
            spans.push(Span::styled(*key, Style::default().fg(theme.status_key_color)));
            spans.push(Span::raw(*label));
        }
        Line::from(spans)
    };

    frame.render_widget(
        Paragraph::new(text).style(Style::default().bg(theme.status_bar_bg)),
        area,
    );
}

/// Render the cell edit popup
fn render_edit_popup(frame: &mut Frame, app: &App, field: EditField) {
    let popup_area = centered_rect_fixed(44, 5, frame.area());
    frame.render_widget(Clear, popup_area);

    let module = app
        .selected_module()
        .map(|(_, m)| truncate_name(&m.designation, 24))
        .unwrap_or_default();
    let block = Block::bordered()
        .title(format!(" {}: {} ", module, field.label()))
        .title_style(app.theme.popup_title)
        .border_style(Style::default().fg(app.theme.popup_border));
    frame.render_widget(block.clone(), popup_area);

    let inner = block.inner(popup_area);
    let chunks = Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).split(inner);

    frame.render_widget(Paragraph::new(format!("{}|", app.edit_input)), chunks[0]);

    let help = match field {
        EditField::Credits => "Enter: confirm | Esc: cancel | 1-20",
        _ => "Enter: confirm | Esc: cancel | empty = no score",
    };
    frame.render_widget(
        Paragraph::new(help).style(Style::default().fg(app.theme.muted)),
        chunks[1],
    );
}

/// Create a centered rectangle with fixed width and height
fn centered_rect_fixed(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect {
        x,
        y,
        width,
        height,
    }
}

/// Render the help overlay popup
fn render_help_popup(frame: &mut Frame, app: &App) {
    let popup_area = centered_rect_fixed(52, 19, frame.area());
    frame.render_widget(Clear, popup_area);

    let block = Block::bordered()
        .title(" Keyboard Shortcuts ")
        .title_style(app.theme.popup_title)
        .border_style(Style::default().fg(app.theme.popup_border));
    frame.render_widget(block.clone(), popup_area);
    let inner = block.inner(popup_area);

    let shortcuts = [
        ("j / Down", "Move down"),
        ("k / Up", "Move up"),
        ("Tab", "Toggle Modules/UE"),
        ("1 / 2 / 3", "Edit CC / TP / Examen"),
        ("c", "Edit credits"),
        ("m", "Mark a UE, then merge with another"),
        ("s", "Split the selected UE"),
        ("w", "Save the UE layout to the config"),
        ("e", "Export CSV"),
        ("J", "Export JSON"),
        ("p", "Export printable report"),
        ("?", "Show/hide this help"),
        ("q / Ctrl-c", "Quit"),
    ];

    let mut help_lines: Vec<Line> = shortcuts
        .iter()
        .map(|(key, action)| {
            Line::from(vec![
                Span::styled(format!("{:<14}", key), Style::default().fg(Color::Cyan).bold()),
                Span::raw(*action),
            ])
        })
        .collect();
    help_lines.push(Line::from(""));
    help_lines.push(Line::from(Span::styled(
        "Press any key to close",
        Style::default().fg(app.theme.muted),
    )));

    frame.render_widget(Paragraph::new(help_lines), inner);
}
