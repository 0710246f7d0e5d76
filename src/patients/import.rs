//! Import of patient records from CSV.
//!
//! Rows are matched to existing patients by `external_id`.  Matched patients
//! are updated, all others are created.

use std::io::Read;
use std::time::Instant;

use clap::Parser;
use indexmap::IndexMap;
use thousands::Separable;

use super::study_arg;
use crate::common::{confirm, expand_path, open_read_maybe_gz};
use crate::err::{ImportWarning, RegistryError};
use crate::registry::{JsonRegistry, PatientRecord, PatientRepository, PatientStore, Properties};

/// Command line arguments for `patients import` sub command.
#[derive(Parser, Debug)]
#[command(about = "Import patient records from CSV", long_about = None)]
pub struct Args {
    /// Path to the registry dump (JSON, optionally gzip-compressed); updated in place.
    #[arg(long)]
    pub path_registry: String,
    /// Path to the CSV file to import.
    #[arg(long)]
    pub path_input: String,
    /// Study to enroll new patients in.
    #[arg(long)]
    pub study: Option<String>,
    /// User or group owning new patients.
    #[arg(long)]
    pub owner: Option<String>,
    /// Do not ask for confirmation.
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Patient records read from a CSV file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedCsv {
    /// One record per data row.
    pub patients: Vec<PatientRecord>,
    /// Problems found along the way, in file order.
    pub warnings: Vec<ImportWarning>,
}

/// Read and normalize the patients of a headed CSV file.
pub fn parse_csv<R: Read>(reader: R, properties: &Properties) -> Result<ParsedCsv, anyhow::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let mut result = ParsedCsv::default();

    // Columns paired with their metadata, `None` for the ones to drop.
    let mut columns = Vec::new();
    for name in reader.headers()?.iter() {
        let meta = if name == "identifier" {
            result.warnings.push(ImportWarning::IdentifierColumn);
            None
        } else if let Some(meta) = properties.get(name) {
            Some(meta)
        } else {
            result
                .warnings
                .push(ImportWarning::UnrecognizedColumn(name.to_string()));
            None
        };
        columns.push((name.to_string(), meta));
    }

    for record in reader.records() {
        let record = record?;
        let mut patient = PatientRecord::default();
        for ((name, meta), value) in columns.iter().zip(record.iter()) {
            let Some(meta) = meta else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            match meta.normalize(value) {
                Some(normalized) => patient.insert(name.as_str(), normalized),
                None => result.warnings.push(ImportWarning::UnrecognizedValue {
                    value: value.to_string(),
                    field: name.clone(),
                }),
            }
        }
        result.patients.push(patient);
    }

    Ok(result)
}

/// Map the external IDs of `patients` to the identifiers of existing patients.
pub fn match_patients<R: PatientRepository>(
    repo: &R,
    patients: &[PatientRecord],
) -> Result<IndexMap<String, String>, RegistryError> {
    let mut result = IndexMap::new();
    for external_id in patients.iter().filter_map(|p| p.get_nonempty("external_id")) {
        if let Some(patient_id) = repo.get_id(external_id)? {
            result.insert(external_id.to_string(), patient_id);
        }
    }
    Ok(result)
}

/// Number of patients touched by [`import_patients`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
}

/// Update the matched patients and create the others.
pub fn import_patients<S: PatientStore>(
    store: &mut S,
    patients: Vec<PatientRecord>,
    matches: &IndexMap<String, String>,
    study: Option<&str>,
    owner: Option<&str>,
) -> Result<ImportSummary, RegistryError> {
    let mut summary = ImportSummary::default();
    for patient in patients {
        let existing = patient
            .get("external_id")
            .and_then(|external_id| matches.get(external_id));
        match existing {
            Some(patient_id) => {
                store.update_patient(patient_id, &patient)?;
                summary.updated += 1;
            }
            None => {
                store.create_patient(patient, study, owner)?;
                summary.created += 1;
            }
        }
    }
    Ok(summary)
}

/// Main entry point for `patients import` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = Instant::now();
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);

    let mut registry = JsonRegistry::from_path(expand_path(&args.path_registry))?;
    let path_input = expand_path(&args.path_input);
    let reader = open_read_maybe_gz(&path_input)
        .map_err(|e| anyhow::anyhow!("could not open {} for reading: {}", &path_input, e))?;
    let parsed = parse_csv(reader, &registry.list_properties()?)?;
    for warning in &parsed.warnings {
        tracing::warn!("{}", warning);
    }

    tracing::info!(
        "checking {} external IDs...",
        parsed.patients.len().separate_with_commas()
    );
    let matches = match_patients(&registry, &parsed.patients)?;
    let n_update = parsed
        .patients
        .iter()
        .filter(|p| p.get("external_id").map_or(false, |id| matches.contains_key(id)))
        .count();
    let n_create = parsed.patients.len() - n_update;

    let action = format!(
        "You are about to import {} new patients and update {} existing patients",
        n_create, n_update
    );
    if !args.yes && !confirm(&action)? {
        tracing::info!("import cancelled, registry left unchanged");
        return Ok(());
    }

    let summary = import_patients(
        &mut registry,
        parsed.patients,
        &matches,
        study_arg(args.study.as_deref()),
        args.owner.as_deref(),
    )?;
    registry.save()?;

    tracing::info!(
        "created {} and updated {} patients",
        summary.created.separate_with_commas(),
        summary.updated.separate_with_commas()
    );
    tracing::info!(
        "All of `patients import` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::registry::Fields;

    fn fields(items: &[(&str, &str)]) -> Fields {
        items.iter().copied().collect()
    }

    fn fixture_properties() -> Result<Properties, anyhow::Error> {
        Ok(JsonRegistry::from_path("tests/data/registry/small.json")?.list_properties()?)
    }

    #[test]
    fn parse_csv_fixture() -> Result<(), anyhow::Error> {
        let reader = open_read_maybe_gz("tests/data/patients/import.csv")?;

        let parsed = parse_csv(reader, &fixture_properties()?)?;

        assert_eq!(
            parsed.patients,
            vec![
                fields(&[
                    ("external_id", "FAM1-2"),
                    ("gender", "M"),
                    ("date_of_birth", "2016-03-07"),
                    ("consanguinity", "1"),
                    ("kindred_id", "FAM1"),
                ]),
                fields(&[
                    ("external_id", "NEW-1"),
                    ("date_of_birth", "2016-01-02"),
                    ("weight", "3.25"),
                ]),
                fields(&[("gender", "F"), ("consanguinity", "0")]),
            ]
        );
        assert_eq!(
            parsed.warnings,
            vec![
                ImportWarning::IdentifierColumn,
                ImportWarning::UnrecognizedColumn("favourite_color".into()),
                ImportWarning::UnrecognizedValue {
                    value: "Unknown".into(),
                    field: "gender".into()
                },
                ImportWarning::UnrecognizedValue {
                    value: "maybe".into(),
                    field: "consanguinity".into()
                },
                ImportWarning::UnrecognizedValue {
                    value: "FAM2x".into(),
                    field: "kindred_id".into()
                },
            ]
        );

        Ok(())
    }

    #[test]
    fn short_rows_are_accepted() -> Result<(), anyhow::Error> {
        let input = "external_id,gender\nA-1\nA-2,F\n";

        let parsed = parse_csv(input.as_bytes(), &fixture_properties()?)?;

        assert_eq!(
            parsed.patients,
            vec![
                fields(&[("external_id", "A-1")]),
                fields(&[("external_id", "A-2"), ("gender", "F")]),
            ]
        );
        assert!(parsed.warnings.is_empty());
        Ok(())
    }

    #[test]
    fn match_and_import() -> Result<(), anyhow::Error> {
        let mut registry = JsonRegistry::from_path("tests/data/registry/small.json")?;
        let patients = vec![
            fields(&[("external_id", "FAM1-2"), ("gender", "F")]),
            fields(&[("external_id", "NEW-1")]),
            fields(&[("gender", "M")]),
        ];

        let matches = match_patients(&registry, &patients)?;
        assert_eq!(
            matches.into_iter().collect::<Vec<_>>(),
            vec![("FAM1-2".to_string(), "P0000002".to_string())]
        );

        let matches = match_patients(&registry, &patients)?;
        let summary = import_patients(&mut registry, patients, &matches, Some("mcad"), None)?;

        assert_eq!(
            summary,
            ImportSummary {
                created: 2,
                updated: 1
            }
        );
        assert_eq!(registry.get_patient("P0000002")?.get("gender"), Some("F"));
        assert_eq!(registry.get_id("NEW-1")?, Some("P0000005".to_string()));
        assert_eq!(registry.get_study("P0000006")?, Some("mcad".to_string()));

        Ok(())
    }

    #[test]
    #[tracing_test::traced_test]
    fn run_imports_and_saves() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let path_registry = tmp_dir.join("registry.json");
        std::fs::copy("tests/data/registry/small.json", &path_registry)?;
        let args = Args {
            path_registry: path_registry.to_string_lossy().into_owned(),
            path_input: String::from("tests/data/patients/import.csv"),
            study: Some(String::from("None")),
            owner: Some(String::from("Groups.Lab")),
            yes: true,
        };

        run(&crate::common::Args::default(), &args)?;

        assert!(logs_contain("Ignoring unrecognized column \"favourite_color\""));
        let registry = JsonRegistry::from_path(&path_registry)?;
        assert_eq!(registry.list_patients(&Default::default())?.len(), 6);
        let updated = registry.get_patient("P0000002")?;
        assert_eq!(updated.get("date_of_birth"), Some("2016-03-07"));
        assert_eq!(updated.get("identifier"), Some("2"));
        assert_eq!(registry.get_study("P0000005")?, None);
        assert_eq!(registry.get_owner("P0000005")?, Some("Groups.Lab".to_string()));

        Ok(())
    }
}
