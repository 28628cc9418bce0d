//! Reading the extracted grades tables from delimited text.
//!
//! The main feed has one module per row: designation, teacher, CC, TP,
//! exam. The retake feed has a designation followed by one or more
//! candidate score cells. Both carry a header row.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, warn};

use crate::grading::groups::unique_name;
pub use crate::grading::{GradeRow, RetakeRow};

const GRADE_COLUMNS: usize = 5;
const RETAKE_COLUMNS: usize = 2;

#[derive(thiserror::Error, Debug)]
pub enum FeedError {
    #[error("Grades table not found at {0}")]
    MissingTable(PathBuf),

    #[error("Grades table at {0} has no data rows")]
    EmptyFeed(PathBuf),

    #[error("Failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed table: {0}")]
    Csv(#[from] csv::Error),
}

/// Guess the field separator from the file extension and header line.
pub fn detect_delimiter(path: Option<&Path>, content: &str) -> u8 {
    let is_tsv = path
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tsv"));
    if is_tsv {
        return b'\t';
    }
    let header = content.lines().next().unwrap_or_default();
    if header.contains('\t') {
        b'\t'
    } else if header.contains(';') {
        b';'
    } else {
        b','
    }
}

fn read_table(path: &Path) -> Result<String, FeedError> {
    fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            FeedError::MissingTable(path.to_path_buf())
        } else {
            FeedError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

fn records<R: Read>(reader: R, delimiter: u8) -> impl Iterator<Item = Result<StringRecord, csv::Error>> {
    ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .delimiter(delimiter)
        .from_reader(reader)
        .into_records()
}

fn cell(record: &StringRecord, idx: usize) -> String {
    record.get(idx).unwrap_or_default().to_string()
}

/// Read the main grades table. Fails when the file is missing or holds no
/// usable row.
pub fn read_grade_feed(path: &Path) -> Result<Vec<GradeRow>, FeedError> {
    let content = read_table(path)?;
    let delimiter = detect_delimiter(Some(path), &content);
    let rows = parse_grade_feed(content.as_bytes(), delimiter)?;
    if rows.is_empty() {
        return Err(FeedError::EmptyFeed(path.to_path_buf()));
    }
    debug!(path = %path.display(), rows = rows.len(), "Read grades table");
    Ok(rows)
}

/// Parse grade rows, skipping rows with fewer than five cells and making
/// designations unique.
pub fn parse_grade_feed<R: Read>(reader: R, delimiter: u8) -> Result<Vec<GradeRow>, FeedError> {
    let mut rows = Vec::new();
    for record in records(reader, delimiter) {
        let record = record?;
        if record.len() < GRADE_COLUMNS {
            debug!(cells = record.len(), "Skipping short grades row");
            continue;
        }
        rows.push(GradeRow {
            designation: cell(&record, 0),
            teacher: cell(&record, 1),
            cc: cell(&record, 2),
            lab: cell(&record, 3),
            exam: cell(&record, 4),
        });
    }
    disambiguate_designations(&mut rows);
    Ok(rows)
}

/// Read the optional retake table. An empty table is not an error.
pub fn read_retake_feed(path: &Path) -> Result<Vec<RetakeRow>, FeedError> {
    let content = read_table(path)?;
    let delimiter = detect_delimiter(Some(path), &content);
    let rows = parse_retake_feed(content.as_bytes(), delimiter)?;
    debug!(path = %path.display(), rows = rows.len(), "Read retake table");
    Ok(rows)
}

pub fn parse_retake_feed<R: Read>(reader: R, delimiter: u8) -> Result<Vec<RetakeRow>, FeedError> {
    let mut rows = Vec::new();
    for record in records(reader, delimiter) {
        let record = record?;
        if record.len() < RETAKE_COLUMNS {
            continue;
        }
        rows.push(RetakeRow {
            designation: cell(&record, 0),
            cells: record.iter().skip(1).map(str::to_string).collect(),
        });
    }
    Ok(rows)
}

/// Suffix repeated designations with ` (2)`, ` (3)`... so every module
/// keeps a unique key.
pub fn disambiguate_designations(rows: &mut [GradeRow]) {
    let mut seen: HashSet<String> = HashSet::new();
    for row in rows.iter_mut() {
        if seen.contains(&row.designation) {
            let renamed = unique_name(&row.designation, |name| seen.contains(name));
            warn!(
                designation = %row.designation,
                renamed = %renamed,
                "Duplicate module designation"
            );
            row.designation = renamed;
        }
        seen.insert(row.designation.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    const TABLE: &str = "\
Désignation,Enseignant,CC,TP,Examen
Algèbre,M. Dupont,12,,\"14,5\"
Analyse,Mme Martin,-,15,10
short,row
Réseaux,M. Leroy,,,8
";

    #[test]
    fn test_parse_grade_feed() {
        let rows = parse_grade_feed(TABLE.as_bytes(), b',').unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], GradeRow::new("Algèbre", "M. Dupont", "12", "", "14,5"));
        assert_eq!(rows[1].cc, "-");
        assert_eq!(rows[2].designation, "Réseaux");
    }

    #[test]
    fn test_semicolon_feed() {
        let table = "Désignation;Enseignant;CC;TP;Examen\nAlgèbre;X;10,5;;12\n";
        let delimiter = detect_delimiter(None, table);
        assert_eq!(delimiter, b';');
        let rows = parse_grade_feed(table.as_bytes(), delimiter).unwrap();
        assert_eq!(rows[0].cc, "10,5");
    }

    #[test]
    fn test_detect_delimiter_by_extension() {
        assert_eq!(detect_delimiter(Some(Path::new("notes.TSV")), "a,b"), b'\t');
        assert_eq!(detect_delimiter(Some(Path::new("notes.csv")), "a,b"), b',');
    }

    #[test]
    fn test_duplicate_designations_are_suffixed() {
        let mut rows = vec![
            GradeRow::new("Sport", "", "", "", "12"),
            GradeRow::new("Sport", "", "", "", "14"),
            GradeRow::new("Sport", "", "", "", "16"),
        ];
        disambiguate_designations(&mut rows);
        let names: Vec<&str> = rows.iter().map(|r| r.designation.as_str()).collect();
        assert_eq!(names, vec!["Sport", "Sport (2)", "Sport (3)"]);
    }

    #[test]
    fn test_parse_retake_feed() {
        let table = "Module,Note 1,Note 2\nAlgèbre,,14\nlonely\n";
        let rows = parse_retake_feed(table.as_bytes(), b',').unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0], RetakeRow::new("Algèbre", &["", "14"]));
    }

    #[test]
    fn test_missing_file() {
        let path = env::temp_dir().join("ue_calc_test_no_such_table.csv");
        let _ = fs::remove_file(&path);
        assert!(matches!(read_grade_feed(&path), Err(FeedError::MissingTable(_))));
    }

    #[test]
    fn test_header_only_file_is_empty_feed() {
        let path = env::temp_dir().join("ue_calc_test_header_only.csv");
        fs::write(&path, "Désignation,Enseignant,CC,TP,Examen\n").unwrap();
        assert!(matches!(read_grade_feed(&path), Err(FeedError::EmptyFeed(_))));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_read_grade_feed_from_file() {
        let path = env::temp_dir().join("ue_calc_test_read_table.csv");
        fs::write(&path, TABLE).unwrap();
        let rows = read_grade_feed(&path).unwrap();
        assert_eq!(rows.len(), 3);
        let _ = fs::remove_file(&path);
    }
}
