//! Export of patient records to CSV.

use std::io::Write;
use std::time::Instant;

use clap::Parser;
use thousands::Separable;

use crate::common::{expand_path, open_write_maybe_gz};
use crate::registry::{JsonRegistry, PatientFilter, PatientRecord, PatientRepository};

/// Command line arguments for `patients export` sub command.
#[derive(Parser, Debug)]
#[command(about = "Export patient records to CSV", long_about = None)]
pub struct Args {
    /// Path to the registry dump (JSON, optionally gzip-compressed).
    #[arg(long)]
    pub path_registry: String,
    /// Path to the output CSV file; `.gz` for compressed output.
    #[arg(long)]
    pub path_output: String,
    /// Only export patients of this study; empty for patients without study,
    /// `None` for all patients.
    #[arg(long)]
    pub study: Option<String>,
    /// Only export patients owned by this user or group.
    #[arg(long)]
    pub owner: Option<String>,
}

/// Render the value of property `name` of `record` as a CSV cell.
fn export_value(name: &str, record: &PatientRecord) -> String {
    match (name, record.get(name)) {
        ("identifier", Some(identifier)) => format!("P{:0>7}", identifier),
        (_, value) => value.unwrap_or_default().to_string(),
    }
}

/// Write one row per patient passing `filter`, returning the number of rows.
pub fn export_patients<R, W, F>(
    repo: &R,
    filter: &PatientFilter,
    writer: W,
    mut progress: F,
) -> Result<usize, anyhow::Error>
where
    R: PatientRepository,
    W: Write,
    F: FnMut(usize),
{
    let properties = repo.list_properties()?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::CRLF)
        .from_writer(writer);
    writer.write_record(properties.keys())?;

    let patient_ids = repo.list_patients(filter)?;
    for (i, patient_id) in patient_ids.iter().enumerate() {
        progress(i + 1);
        let record = repo.get_patient(patient_id)?;
        writer.write_record(properties.keys().map(|name| export_value(name, &record)))?;
    }
    writer.flush()?;

    Ok(patient_ids.len())
}

/// Main entry point for `patients export` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = Instant::now();
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);

    let registry = JsonRegistry::from_path(expand_path(&args.path_registry))?;
    let filter = PatientFilter::from_args(args.study.as_deref(), args.owner.as_deref());
    let path_output = expand_path(&args.path_output);
    let writer = open_write_maybe_gz(&path_output)
        .map_err(|e| anyhow::anyhow!("could not open {} for writing: {}", &path_output, e))?;

    let mut prev = Instant::now();
    let count = export_patients(&registry, &filter, writer, |count| {
        if prev.elapsed().as_secs() >= 60 {
            tracing::info!("at patient #{}", count.separate_with_commas());
            prev = Instant::now();
        }
    })?;

    tracing::info!("exported {} patients", count.separate_with_commas());
    tracing::info!(
        "All of `patients export` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("identifier", "12", "P0000012")]
    #[case("identifier", "12345678", "P12345678")]
    #[case("external_id", "FAM1-1", "FAM1-1")]
    #[case("kindred_id", "", "")]
    fn export_value(#[case] name: &str, #[case] value: &str, #[case] expected: &str) {
        let record: PatientRecord = [(name, value)].into_iter().collect();
        assert_eq!(super::export_value(name, &record), expected);
    }

    #[test]
    fn export_value_absent() {
        assert_eq!(super::export_value("identifier", &PatientRecord::default()), "");
    }

    #[test]
    fn export_study() -> Result<(), anyhow::Error> {
        let registry = JsonRegistry::from_path("tests/data/registry/small.json")?;
        let filter = PatientFilter::from_args(Some("mcad"), None);
        let mut buf = Vec::new();

        let count = export_patients(&registry, &filter, &mut buf, |_| ())?;

        assert_eq!(count, 2);
        let output = String::from_utf8(buf)?;
        let lines = output.split("\r\n").collect::<Vec<_>>();
        assert_eq!(
            lines,
            vec![
                "identifier,external_id,gender,date_of_birth,consanguinity,case_or_control,\
                omim_id,phenotype,negative_phenotype,global_mode_of_inheritance,kindred_id,\
                subject_data_relationship,diagnosis_notes,weight",
                "P0000001,FAM1-1,F,2015-11-02,1,case,201450,HP:0001943|HP:0001250,HP:0001263,\
                HP:0000007,FAM1,Proband,identified by newborn screening,",
                "P0000002,FAM1-2,M,,,case,201450,HP:0001250,,,FAM1,father,,",
                "",
            ]
        );

        Ok(())
    }

    #[test]
    fn run_writes_gz() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let path_output = tmp_dir.join("patients.csv.gz");
        let args = Args {
            path_registry: String::from("tests/data/registry/small.json"),
            path_output: path_output.to_string_lossy().into_owned(),
            study: None,
            owner: Some(String::from("groups.lab")),
        };

        run(&crate::common::Args::default(), &args)?;

        let mut output = String::new();
        std::io::Read::read_to_string(
            &mut crate::common::open_read_maybe_gz(&path_output)?,
            &mut output,
        )?;
        let ids = output
            .lines()
            .skip(1)
            .map(|line| line.split(',').next().unwrap_or_default())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["P0000003", "P0000004"]);

        Ok(())
    }
}
