use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use chrono::{DateTime, Local, SecondsFormat};
use clap::ValueEnum;
use csv::{Terminator, Writer, WriterBuilder};
use serde::Serialize;

use super::formatter::{format_average, format_decimal, format_score, group_table, module_table, status_label};
use crate::grading::types::GroupMap;
use crate::grading::{ModuleRecord, PassingConfig, ResultSet};

pub const CSV_HEADER: [&str; 8] = [
    "Type",
    "Designation",
    "Enseignant",
    "CC",
    "TP",
    "Examen",
    "Credits",
    "Moyenne",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// Delimited text, one row per module then one per UE
    Csv,
    /// Structured document with metadata
    Json,
    /// Printable plain-text report
    Report,
}

impl ExportFormat {
    pub fn label(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "CSV",
            ExportFormat::Json => "JSON",
            ExportFormat::Report => "report",
        }
    }
}

/// File name used when the user gives none.
pub fn default_file_name(format: ExportFormat, timestamp: &DateTime<Local>) -> String {
    match format {
        ExportFormat::Csv => "grades.csv".to_string(),
        ExportFormat::Json => "grades.json".to_string(),
        ExportFormat::Report => format!("grades-report-{}.txt", timestamp.format("%Y-%m-%d")),
    }
}

#[derive(Debug, Serialize)]
pub struct ExportMetadata {
    pub total_modules: usize,
    pub total_ues: usize,
    pub general_average: f64,
    pub general_ue_average: f64,
}

/// JSON export layout.
#[derive(Serialize)]
pub struct ExportDocument<'a> {
    pub timestamp: String,
    pub individual_modules: &'a [ModuleRecord],
    pub ue_groups: GroupMap<'a>,
    pub metadata: ExportMetadata,
}

impl<'a> ExportDocument<'a> {
    pub fn new(result: &'a ResultSet, timestamp: &DateTime<Local>) -> Self {
        Self {
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Millis, false),
            individual_modules: &result.modules,
            ue_groups: GroupMap(&result.groups),
            metadata: ExportMetadata {
                total_modules: result.module_count(),
                total_ues: result.group_count(),
                general_average: result.general_average(),
                general_ue_average: result.general_ue_average(),
            },
        }
    }
}

/// Render the result set in the requested format.
pub fn render_export(
    format: ExportFormat,
    result: &ResultSet,
    passing: &PassingConfig,
    timestamp: &DateTime<Local>,
) -> Result<String> {
    match format {
        ExportFormat::Csv => render_csv(result),
        ExportFormat::Json => render_json(result, timestamp),
        ExportFormat::Report => Ok(render_report(result, passing, timestamp)),
    }
}

fn csv_writer(buf: &mut Vec<u8>) -> Writer<&mut Vec<u8>> {
    WriterBuilder::new()
        .has_headers(false)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(buf)
}

pub fn render_csv(result: &ResultSet) -> Result<String> {
    let mut buf: Vec<u8> = Vec::new();

    {
        let mut writer = csv_writer(&mut buf);
        writer.write_record(CSV_HEADER)?;
        for module in &result.modules {
            let credits = module.credits.to_string();
            let average = module.average.map(format_decimal).unwrap_or_default();
            writer.write_record([
                "Individuel",
                module.designation.as_str(),
                module.teacher.as_str(),
                format_score(module.cc_score).as_str(),
                format_score(module.lab_score).as_str(),
                format_score(module.exam_score).as_str(),
                credits.as_str(),
                average.as_str(),
            ])?;
        }
        writer.flush().context("Failed to write module rows")?;
    }

    buf.push(b'\n');

    {
        let mut writer = csv_writer(&mut buf);
        for group in &result.groups {
            let members = group.member_names().join("; ");
            let credits = group.total_credits.to_string();
            let average = format_decimal(group.average);
            writer.write_record([
                "UE",
                group.name.as_str(),
                members.as_str(),
                "",
                "",
                "",
                credits.as_str(),
                average.as_str(),
            ])?;
        }
        writer.flush().context("Failed to write UE rows")?;
    }

    String::from_utf8(buf).context("CSV export is not valid UTF-8")
}

pub fn render_json(result: &ResultSet, timestamp: &DateTime<Local>) -> Result<String> {
    let document = ExportDocument::new(result, timestamp);
    serde_json::to_string_pretty(&document).context("Failed to serialize JSON export")
}

pub fn render_report(result: &ResultSet, passing: &PassingConfig, timestamp: &DateTime<Local>) -> String {
    let average = result.general_average();
    let mut out = String::new();

    out.push_str("Relevé de notes\n");
    out.push_str(&format!("Date d'export: {}\n\n", timestamp.format("%d/%m/%Y %H:%M")));

    out.push_str("Détail des modules individuels\n");
    out.push_str(&module_table(result, passing, false, None));
    out.push_str("\n\n");

    out.push_str("Moyennes par unité d'enseignement\n");
    out.push_str(&group_table(result, passing, false, None));
    out.push_str("\n\n");

    out.push_str("Résumé général\n");
    out.push_str(&format!(
        "Moyenne Générale: {} / 20\n",
        format_average(Some(average))
    ));
    if result.overall_group().is_some() {
        out.push_str(&format!(
            "Moyenne Générale UE: {} / 20\n",
            format_decimal(result.general_ue_average())
        ));
    }
    out.push_str(&format!(
        "Modules: {}  UE: {}\n",
        result.module_count(),
        result.group_count()
    ));
    out.push_str(&format!("Statut: {}\n", status_label(passing.overall_passes(average))));
    out
}

/// Write an export atomically, replacing any previous file.
pub fn write_export(path: &Path, contents: &str) -> Result<()> {
    let mut file = AtomicWriteFile::open(path)
        .with_context(|| format!("Failed to open atomic write file at {}", path.display()))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    file.commit()
        .with_context(|| format!("Failed to save {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::average::{compute_module_averages, refresh_overall_module};
    use crate::grading::{CatalogGroup, CatalogModule, GroupAssigner, GroupCatalog};
    use chrono::TimeZone;
    use std::env;
    use std::fs;

    fn sample_result() -> ResultSet {
        let mut modules = vec![
            ModuleRecord::new("Algèbre", "M. Dupont", Some(12.0), None, Some(14.0), 3),
            ModuleRecord::new("Analyse", "Mme Martin", None, None, Some(10.5), 2),
            ModuleRecord::new("Réseaux", "M. Leroy", None, None, None, 2),
        ];
        compute_module_averages(&mut modules);
        let catalog = GroupCatalog::new(vec![CatalogGroup {
            name: "UE Maths".to_string(),
            modules: vec![CatalogModule::new("Algèbre", 3), CatalogModule::new("Analyse", 2)],
        }]);
        let groups = GroupAssigner::default().assign(&modules, &catalog);
        refresh_overall_module(&mut modules);
        ResultSet { modules, groups, revision: 1 }
    }

    fn timestamp() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_csv_layout() {
        let csv = render_csv(&sample_result()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "Type,Designation,Enseignant,CC,TP,Examen,Credits,Moyenne");
        assert_eq!(lines[1], "Individuel,Algèbre,M. Dupont,12,,14,3,\"13,60\"");
        assert_eq!(lines[2], "Individuel,Analyse,Mme Martin,,,\"10,5\",2,\"10,50\"");
        assert_eq!(lines[3], "Individuel,Réseaux,M. Leroy,,,,2,");
        assert!(lines[4].starts_with("Individuel,Moyenne Générale Individuelle"));
        assert_eq!(lines[5], "");
        assert!(lines[6].starts_with("UE,UE Maths,Algèbre; Analyse,,,,5,"));
        assert!(lines.iter().any(|l| l.starts_with("UE,Réseaux,Réseaux,,,,2,\"0,00\"")));
        assert!(lines.last().unwrap().starts_with("UE,Moyenne Générale UE,,,,,7,"));
    }

    #[test]
    fn test_json_document() {
        let json = render_json(&sample_result(), &timestamp()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert!(value["timestamp"].as_str().unwrap().starts_with("2026-01-15T09:30:00"));
        assert_eq!(value["individual_modules"].as_array().unwrap().len(), 4);
        assert_eq!(value["individual_modules"][0]["designation"], "Algèbre");
        assert!(value["individual_modules"][2]["average"].is_null());
        assert_eq!(value["ue_groups"]["UE Maths"]["total_credits"], 5);
        assert_eq!(value["metadata"]["total_modules"], 3);
        assert_eq!(value["metadata"]["total_ues"], 2);
        let general = value["metadata"]["general_average"].as_f64().unwrap();
        assert!((general - 12.36).abs() < 1e-9);
    }

    #[test]
    fn test_report_contents() {
        let report = render_report(&sample_result(), &PassingConfig::default(), &timestamp());
        assert!(report.contains("Date d'export: 15/01/2026 09:30"));
        assert!(report.contains("Moyenne Générale: 12,36 / 20"));
        assert!(report.contains("Statut: Validé"));
        assert!(report.contains("Non validé"));
    }

    #[test]
    fn test_default_file_names() {
        let ts = timestamp();
        assert_eq!(default_file_name(ExportFormat::Csv, &ts), "grades.csv");
        assert_eq!(default_file_name(ExportFormat::Report, &ts), "grades-report-2026-01-15.txt");
    }

    #[test]
    fn test_write_export() {
        let path = env::temp_dir().join("ue_calc_test_export.csv");
        let _ = fs::remove_file(&path);

        write_export(&path, "a,b\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a,b\n");

        let _ = fs::remove_file(&path);
    }
}
