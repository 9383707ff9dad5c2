use std::collections::BTreeMap;
use std::error::Error;
use std::io::Read;
use std::path::PathBuf;

use arcs_core::{
    ArcsError, ArcsScores, Dimension, ErrorInfo, LikertAnswer, ProfileStore, StudentId,
};
use clap::Args;
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Deserialize;
use tracing::info;

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// CSV file with either per-dimension means or one Likert answer per row.
    #[arg(long)]
    pub csv: PathBuf,
}

/// Row of the means layout: `student_id,attention,relevance,confidence,satisfaction`.
#[derive(Debug, Deserialize)]
struct MeanRow {
    student_id: String,
    attention: Option<f64>,
    relevance: Option<f64>,
    confidence: Option<f64>,
    satisfaction: Option<f64>,
}

/// Row of the answers layout: `student_id,dimension,value`.
#[derive(Debug, Deserialize)]
struct AnswerRow {
    student_id: String,
    dimension: Dimension,
    value: u8,
}

pub fn run<S: ProfileStore>(args: &ImportArgs, store: &S) -> Result<(), Box<dyn Error>> {
    let file = std::fs::File::open(&args.csv)?;
    let responses = parse_responses(file)?;
    for (student, scores) in &responses {
        store.record_arcs_response(student, *scores)?;
    }
    let complete = responses.values().filter(|scores| scores.is_complete()).count();
    info!(
        students = responses.len(),
        complete,
        path = %args.csv.display(),
        "responses imported"
    );
    println!("imported {} students ({complete} complete)", responses.len());
    Ok(())
}

/// Parses either CSV layout; the presence of a `dimension` column selects
/// the answers layout.
pub fn parse_responses<R: Read>(reader: R) -> Result<BTreeMap<StudentId, ArcsScores>, ArcsError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader);
    let headers = reader
        .headers()
        .map_err(|err| wrap_csv("import-headers", err))?
        .clone();
    if headers.iter().any(|column| column == "dimension") {
        parse_answers(reader, &headers)
    } else {
        parse_means(reader, &headers)
    }
}

fn parse_means<R: Read>(
    mut reader: csv::Reader<R>,
    headers: &StringRecord,
) -> Result<BTreeMap<StudentId, ArcsScores>, ArcsError> {
    let mut responses = BTreeMap::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|err| wrap_csv("import-record", err))?;
        let row: MeanRow = record
            .deserialize(Some(headers))
            .map_err(|err| wrap_csv("import-record", err))?;
        let scores = ArcsScores {
            attention: row.attention,
            relevance: row.relevance,
            confidence: row.confidence,
            satisfaction: row.satisfaction,
        };
        for dimension in Dimension::ALL {
            if let Some(value) = scores.get(dimension) {
                if !(1.0..=5.0).contains(&value) {
                    return Err(ArcsError::InvalidInput(
                        ErrorInfo::new("score-out-of-range", "ARCS means must lie in 1..=5")
                            .with_context("line", (line + 2).to_string())
                            .with_context("dimension", format!("{dimension:?}"))
                            .with_context("value", value.to_string()),
                    ));
                }
            }
        }
        responses.insert(student_id(&row.student_id, line)?, scores);
    }
    Ok(responses)
}

fn parse_answers<R: Read>(
    mut reader: csv::Reader<R>,
    headers: &StringRecord,
) -> Result<BTreeMap<StudentId, ArcsScores>, ArcsError> {
    let mut answers: BTreeMap<StudentId, Vec<LikertAnswer>> = BTreeMap::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|err| wrap_csv("import-record", err))?;
        let row: AnswerRow = record
            .deserialize(Some(headers))
            .map_err(|err| wrap_csv("import-record", err))?;
        answers
            .entry(student_id(&row.student_id, line)?)
            .or_default()
            .push(LikertAnswer {
                dimension: row.dimension,
                value: row.value,
            });
    }
    answers
        .into_iter()
        .map(|(student, answers)| Ok((student, ArcsScores::from_likert(&answers)?)))
        .collect()
}

fn student_id(raw: &str, line: usize) -> Result<StudentId, ArcsError> {
    if raw.is_empty() {
        return Err(ArcsError::InvalidInput(
            ErrorInfo::new("missing-student-id", "every row needs a student_id")
                .with_context("line", (line + 2).to_string()),
        ));
    }
    Ok(StudentId::new(raw))
}

fn wrap_csv(code: &str, err: csv::Error) -> ArcsError {
    ArcsError::InvalidInput(ErrorInfo::new(code, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn means_layout_keeps_missing_cells_absent() {
        let csv = "student_id,attention,relevance,confidence,satisfaction\n\
                   s1,4.2,3.8,4.0,4.5\n\
                   s2,2.0,,2.5,3.0\n";
        let parsed = parse_responses(csv.as_bytes()).unwrap();
        assert!(parsed[&StudentId::new("s1")].is_complete());
        let partial = parsed[&StudentId::new("s2")];
        assert_eq!(partial.relevance, None);
        assert!(!partial.is_complete());
    }

    #[test]
    fn answers_layout_averages_per_dimension() {
        let csv = "student_id,dimension,value\n\
                   s1,attention,4\n\
                   s1,attention,5\n\
                   s1,relevance,3\n\
                   s1,confidence,2\n\
                   s1,satisfaction,4\n";
        let parsed = parse_responses(csv.as_bytes()).unwrap();
        let scores = parsed[&StudentId::new("s1")];
        assert_eq!(scores.attention, Some(4.5));
        assert_eq!(scores.confidence, Some(2.0));
        assert!(scores.is_complete());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let means = "student_id,attention,relevance,confidence,satisfaction\ns1,6,3,3,3\n";
        let err = parse_responses(means.as_bytes()).unwrap_err();
        assert_eq!(err.info().code, "score-out-of-range");

        let answers = "student_id,dimension,value\ns1,attention,0\n";
        let err = parse_responses(answers.as_bytes()).unwrap_err();
        assert_eq!(err.info().code, "likert-out-of-range");
    }
}
