// Review commands: inspect fields, candidates and conflicts; adjudicate.

use serde::Serialize;

use creditmemo_recon::{Candidate, FieldPath, MemoSession, Value};

use crate::exit_codes::EXIT_CONFLICTS;
use crate::CliError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CandidateRow<'a> {
    index: usize,
    selected: bool,
    #[serde(flatten)]
    candidate: &'a Candidate,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConflictRow<'a> {
    path: &'a FieldPath,
    candidates: usize,
    current: Option<&'a Value>,
}

fn one_line(s: &str) -> String {
    s.replace('\n', " / ")
}

pub fn cmd_show(session: &MemoSession, json: bool) -> Result<(), CliError> {
    let state = session.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&*state)?);
        return Ok(());
    }

    if state.tracker.is_empty() {
        println!("no fields extracted yet");
        return Ok(());
    }
    let width = state.tracker.iter().map(|(p, _)| p.as_str().len()).max().unwrap_or(0);
    for (path, source) in state.tracker.iter() {
        let value = session.get_field(path).map(Value::stringify).unwrap_or_default();
        let flag = if source.resolved { " " } else { "!" };
        println!(
            "{} {:width$}  {}  [{} p.{}]",
            flag,
            path.as_str(),
            one_line(&value),
            source.filename,
            source.page_number,
            width = width
        );
    }
    println!(
        "{} field(s) extracted, {} awaiting review",
        state.extracted_field_count(),
        state.active_conflict_count()
    );
    Ok(())
}

pub fn cmd_get(session: &MemoSession, path: &FieldPath) -> Result<(), CliError> {
    match session.get_field(path) {
        Some(value) => {
            println!("{}", value.stringify());
            Ok(())
        }
        None => Err(CliError::field(format!("no value at {}", path))),
    }
}

pub fn cmd_candidates(session: &MemoSession, path: &FieldPath, json: bool) -> Result<(), CliError> {
    let state = session.snapshot();
    let candidates = state.ledger.get(path);
    let selected = state.tracker.get(path).map(|s| s.selected_indices.clone()).unwrap_or_default();

    let rows: Vec<CandidateRow> = candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| CandidateRow {
            index,
            selected: selected.contains(&index),
            candidate,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("no candidates for {}", path);
        return Ok(());
    }
    for row in &rows {
        println!(
            "[{}] {}  {}  ({} p.{})",
            if row.selected { "x" } else { " " },
            row.index,
            one_line(&row.candidate.value.stringify()),
            row.candidate.source_file,
            row.candidate.page_number,
        );
    }
    Ok(())
}

pub fn cmd_conflicts(session: &MemoSession, json: bool, check: bool) -> Result<(), CliError> {
    let state = session.snapshot();
    let conflicts = session.conflicts();

    if json {
        let rows: Vec<ConflictRow> = conflicts
            .iter()
            .map(|path| ConflictRow {
                path,
                candidates: state.ledger.get(path).len(),
                current: session.get_field(path),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else if conflicts.is_empty() {
        println!("no conflicts");
    } else {
        for path in &conflicts {
            println!("{}  ({} candidates)", path, state.ledger.get(path).len());
        }
    }

    if check && !conflicts.is_empty() {
        return Err(CliError::silent(EXIT_CONFLICTS));
    }
    Ok(())
}

pub fn cmd_toggle(session: &mut MemoSession, path: &FieldPath, index: usize) -> Result<(), CliError> {
    let composed = session
        .toggle_candidate(path, index)
        .map_err(|e| CliError::from(e).with_hint(format!("list indices with `cmemo candidates {}`", path)))?;
    println!("{}", composed.stringify());
    Ok(())
}

pub fn cmd_resolve(session: &mut MemoSession, path: &FieldPath) -> Result<(), CliError> {
    if !session.resolve(path) {
        return Err(CliError::field(format!("no extracted field at {}", path)));
    }
    eprintln!("resolved {}", path);
    Ok(())
}

pub fn cmd_set(session: &mut MemoSession, path: &FieldPath, raw: &str) -> Result<(), CliError> {
    let value = parse_value(raw);
    session.set_field(path, value)?;
    eprintln!("set {}", path);
    Ok(())
}

/// JSON when it parses, text otherwise.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str::<serde_json::Value>(raw)
        .map(Value::from)
        .unwrap_or_else(|_| Value::text(raw))
}
