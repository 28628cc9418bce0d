//! Centralized theme module for TUI color constants and styles

use ratatui::prelude::*;

use crate::session::NoticeLevel;

/// Complete color palette for the TUI
#[derive(Debug, Clone)]
pub struct ThemeColors {
    // Pass/fail colors
    pub passed: Color,
    pub failed: Color,
    pub ungraded: Color,

    // Table colors
    pub row_alt_bg: Color,
    pub index_color: Color,
    pub retake_badge: Color,
    pub invalid_cell: Style,
    pub aggregate_row: Style,

    // Styles
    pub header_style: Style,
    pub row_selected: Style,
    pub marked_row: Style,

    // General colors
    pub muted: Color,
    pub title_color: Color,

    // Tab colors
    pub tab_active_style: Style,
    pub tab_inactive_style: Style,

    // Status bar colors
    pub status_bar_bg: Color,
    pub status_key_color: Color,
    pub flash_info: Color,
    pub flash_success: Color,
    pub flash_warning: Color,
    pub flash_error: Color,

    // Popup overlay colors
    pub popup_border: Color,
    pub popup_title: Style,
}

impl Default for ThemeColors {
    fn default() -> Self {
        Self::dark()
    }
}

impl ThemeColors {
    pub fn dark() -> Self {
        Self {
            passed: Color::Green,
            failed: Color::Red,
            ungraded: Color::DarkGray,
            row_alt_bg: Color::Indexed(235),
            index_color: Color::DarkGray,
            retake_badge: Color::Yellow,
            invalid_cell: Style::new().fg(Color::White).bg(Color::Red),
            aggregate_row: Style::new().bold(),
            header_style: Style::new().bold(),
            row_selected: Style::new().reversed(),
            marked_row: Style::new().fg(Color::Magenta).bold(),
            muted: Color::Gray,
            title_color: Color::Cyan,
            tab_active_style: Style::new().fg(Color::Cyan).bold(),
            tab_inactive_style: Style::new().fg(Color::DarkGray),
            status_bar_bg: Color::Indexed(236),
            status_key_color: Color::Cyan,
            flash_info: Color::White,
            flash_success: Color::Green,
            flash_warning: Color::Yellow,
            flash_error: Color::Red,
            popup_border: Color::Cyan,
            popup_title: Style::new().fg(Color::Cyan).bold(),
        }
    }

    /// Traffic light for a verdict; None means there is nothing to judge yet.
    pub fn verdict_color(&self, passed: Option<bool>) -> Color {
        match passed {
            Some(true) => self.passed,
            Some(false) => self.failed,
            None => self.ungraded,
        }
    }

    pub fn flash_color(&self, level: NoticeLevel) -> Color {
        match level {
            NoticeLevel::Info => self.flash_info,
            NoticeLevel::Success => self.flash_success,
            NoticeLevel::Warning => self.flash_warning,
            NoticeLevel::Error => self.flash_error,
        }
    }
}
