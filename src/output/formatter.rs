use std::io::IsTerminal;
use owo_colors::OwoColorize;
use terminal_size::{Width, terminal_size};

use crate::grading::{GroupRecord, ModuleRecord, PassingConfig, ResultSet};

/// Check if stdout is a TTY (for auto-detecting color support)
pub fn should_use_colors() -> bool {
    std::io::stdout().is_terminal()
}

/// Two decimals with a comma separator: 13.6 -> "13,60"
pub fn format_decimal(value: f64) -> String {
    format!("{:.2}", value).replace('.', ",")
}

/// Raw score in its shortest form with a comma separator, empty when absent
pub fn format_score(score: Option<f64>) -> String {
    score
        .map(|s| s.to_string().replace('.', ","))
        .unwrap_or_default()
}

/// Average for display, "-" when absent
pub fn format_average(average: Option<f64>) -> String {
    average.map(format_decimal).unwrap_or_else(|| "-".to_string())
}

pub fn status_label(passed: bool) -> &'static str {
    if passed {
        "Validé"
    } else {
        "Non validé"
    }
}

/// Get terminal width, defaulting to None for pipes (unlimited)
fn get_terminal_width() -> Option<usize> {
    terminal_size().map(|(Width(w), _)| w as usize)
}

/// Truncate a name to fit available width, accounting for Unicode
pub fn truncate_name(name: &str, max_width: usize) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= max_width {
        name.to_string()
    } else if max_width > 3 {
        format!("{}...", chars[..max_width - 3].iter().collect::<String>())
    } else {
        chars[..max_width].iter().collect()
    }
}

/// Left-align `text` in a column of `width` chars
fn pad(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        text.to_string()
    } else {
        format!("{}{}", text, " ".repeat(width - len))
    }
}

fn name_width(names: impl Iterator<Item = usize>, fixed: usize, term_width: Option<usize>) -> usize {
    let longest = names.max().unwrap_or(0).max(11);
    match term_width {
        Some(width) if width > fixed + 12 => longest.min(width - fixed),
        Some(_) => longest.min(20),
        None => longest,
    }
}

/// Modules table: designation, CC, TP, exam, credits, average
pub fn format_module_table(result: &ResultSet, passing: &PassingConfig, use_colors: bool) -> String {
    module_table(result, passing, use_colors, get_terminal_width())
}

/// Modules table sized for `term_width` (None: never truncate)
pub(crate) fn module_table(
    result: &ResultSet,
    passing: &PassingConfig,
    use_colors: bool,
    term_width: Option<usize>,
) -> String {
    if result.is_empty() {
        return "No modules found.".to_string();
    }

    // CC/TP/Exam 6 each, credits 4, average 6, badge 4, separators
    let fixed = 6 * 3 + 4 + 6 + 4 + 2 * 6;
    let width = name_width(
        result.modules.iter().map(|m| m.designation.chars().count()),
        fixed,
        term_width,
    );

    let header = format!(
        "{}  {:>6}  {:>6}  {:>6}  {:>4}  {:>6}",
        pad("Désignation", width),
        "CC",
        "TP",
        "Examen",
        "Cr.",
        "Moy."
    );

    let mut lines = vec![if use_colors {
        header.bold().to_string()
    } else {
        header
    }];

    for module in &result.modules {
        lines.push(format_module_line(module, passing, width, use_colors));
    }
    lines.join("\n")
}

fn format_module_line(module: &ModuleRecord, passing: &PassingConfig, width: usize, use_colors: bool) -> String {
    let name = pad(&truncate_name(&module.designation, width), width);
    let average = format!("{:>6}", format_average(module.average));
    let badge = if module.has_retake { " (R)" } else { "" };
    let line_start = format!(
        "{}  {:>6}  {:>6}  {:>6}  {:>4}  ",
        name,
        format_score(module.cc_score),
        format_score(module.lab_score),
        format_score(module.exam_score),
        module.credits,
    );

    if !use_colors {
        return format!("{}{}{}", line_start, average, badge);
    }

    let average = match passing.module_passes(module) {
        Some(true) => average.green().to_string(),
        Some(false) => average.red().to_string(),
        None => average.dimmed().to_string(),
    };
    let line = format!("{}{}{}", line_start, average, badge.yellow());
    if module.is_aggregate {
        line.bold().to_string()
    } else {
        line
    }
}

/// Groups table: name, members, credits, average, status
pub fn format_group_table(result: &ResultSet, passing: &PassingConfig, use_colors: bool) -> String {
    group_table(result, passing, use_colors, get_terminal_width())
}

pub(crate) fn group_table(
    result: &ResultSet,
    passing: &PassingConfig,
    use_colors: bool,
    term_width: Option<usize>,
) -> String {
    if result.groups.is_empty() {
        return "No UE found.".to_string();
    }

    let fixed = 4 + 6 + 10 + 2 * 3;
    let width = name_width(result.groups.iter().map(|g| g.name.chars().count()), fixed, term_width);

    let header = format!("{}  {:>4}  {:>6}  {}", pad("UE", width), "Cr.", "Moy.", "Statut");
    let mut lines = vec![if use_colors {
        header.bold().to_string()
    } else {
        header
    }];

    for group in &result.groups {
        lines.push(format_group_line(group, passing, width, use_colors));
        if !group.is_aggregate && group.members.len() > 1 {
            let members = format!("  {}", group.member_names().join("; "));
            lines.push(if use_colors {
                members.dimmed().to_string()
            } else {
                members
            });
        }
    }
    lines.join("\n")
}

fn format_group_line(group: &GroupRecord, passing: &PassingConfig, width: usize, use_colors: bool) -> String {
    let name = pad(&truncate_name(&group.name, width), width);
    let status = if group.is_aggregate {
        ""
    } else {
        status_label(passing.group_passes(group))
    };
    let line = format!(
        "{}  {:>4}  {:>6}  ",
        name,
        group.total_credits,
        format_decimal(group.average)
    );

    if !use_colors {
        return format!("{}{}", line, status).trim_end().to_string();
    }
    let status = if passing.group_passes(group) {
        status.green().to_string()
    } else {
        status.red().to_string()
    };
    if group.is_aggregate {
        line.bold().to_string()
    } else {
        format!("{}{}", line, status)
    }
}

/// One-line verdict: overall averages and pass/fail
pub fn format_summary(result: &ResultSet, passing: &PassingConfig, use_colors: bool) -> String {
    let average = result.general_average();
    let passed = passing.overall_passes(average);
    let mut text = format!(
        "Moyenne Générale: {} / 20 ({} modules)",
        format_decimal(average),
        result.module_count()
    );
    if result.overall_group().is_some() {
        text.push_str(&format!(
            ", Moyenne UE: {} / 20",
            format_decimal(result.general_ue_average())
        ));
    }

    if use_colors {
        let verdict = if passed {
            status_label(true).green().bold().to_string()
        } else {
            status_label(false).red().bold().to_string()
        };
        format!("{} - {}", text, verdict)
    } else {
        format!("{} - {}", text, status_label(passed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::average::{compute_module_averages, refresh_overall_module};
    use crate::grading::{GroupAssigner, GroupCatalog};

    fn sample_result() -> ResultSet {
        let mut modules = vec![
            ModuleRecord::new("Algèbre", "M. Dupont", Some(12.0), None, Some(14.0), 3),
            ModuleRecord::new("Réseaux", "Mme Leroy", None, Some(10.5), None, 2),
        ];
        compute_module_averages(&mut modules);
        let groups = GroupAssigner::default().assign(&modules, &GroupCatalog::default());
        refresh_overall_module(&mut modules);
        ResultSet { modules, groups, revision: 1 }
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(13.6), "13,60");
        assert_eq!(format_decimal(0.0), "0,00");
        assert_eq!(format_decimal(9.999), "10,00");
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(Some(14.5)), "14,5");
        assert_eq!(format_score(Some(12.0)), "12");
        assert_eq!(format_score(None), "");
    }

    #[test]
    fn test_format_average() {
        assert_eq!(format_average(Some(13.6)), "13,60");
        assert_eq!(format_average(None), "-");
    }

    #[test]
    fn test_truncate_name_long() {
        assert_eq!(truncate_name("Programmation orientée objet", 15), "Programmatio...");
    }

    #[test]
    fn test_truncate_name_unicode() {
        assert_eq!(truncate_name("Génie logiciel", 14), "Génie logiciel");
        assert_eq!(truncate_name("Génie logiciel", 8), "Génie...");
    }

    #[test]
    fn test_truncate_name_very_narrow() {
        assert_eq!(truncate_name("Réseaux", 3), "Rés");
    }

    #[test]
    fn test_module_table_empty() {
        let result = ResultSet::default();
        assert_eq!(
            format_module_table(&result, &PassingConfig::default(), false),
            "No modules found."
        );
    }

    #[test]
    fn test_module_table_rows() {
        let result = sample_result();
        let table = module_table(&result, &PassingConfig::default(), false, None);
        let lines: Vec<&str> = table.lines().collect();
        // header, two modules, overall
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("Examen"));
        assert!(lines[1].contains("Algèbre"));
        assert!(lines[1].contains("13,60"));
        assert!(lines[2].contains("10,5"));
        assert!(lines[2].trim_end().ends_with('-'));
        assert!(lines[3].contains("Moyenne Générale Individuelle"));
    }

    #[test]
    fn test_group_table_statuses() {
        let result = sample_result();
        let table = format_group_table(&result, &PassingConfig::default(), false);
        assert!(table.contains("Algèbre"));
        assert!(table.contains("Validé"));
        assert!(table.contains("Non validé"));
    }

    #[test]
    fn test_summary() {
        let result = sample_result();
        let summary = format_summary(&result, &PassingConfig::default(), false);
        assert_eq!(summary, "Moyenne Générale: 13,60 / 20 (2 modules) - Validé");
    }
}
