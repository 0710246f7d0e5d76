//! Summary statistics over the registry patients.

use std::collections::BTreeSet;
use std::io::Write;
use std::time::Instant;

use clap::Parser;
use serde::Serialize;
use thousands::Separable;

use crate::common::{expand_path, open_write_maybe_gz};
use crate::err::RegistryError;
use crate::registry::{JsonRegistry, PatientFilter, PatientRepository, StudyFilter};

/// Command line arguments for `stats` sub command.
#[derive(Parser, Debug)]
#[command(about = "Print statistics about the registry patients", long_about = None)]
pub struct Args {
    /// Path to the registry dump (JSON, optionally gzip-compressed).
    #[arg(long)]
    pub path_registry: String,
    /// Only count patients owned by this user or group (empty for patients
    /// without owner); may be given multiple times.
    #[arg(long)]
    pub of_user: Vec<String>,
    /// Only count patients of this study (empty for patients without study);
    /// may be given multiple times.
    #[arg(long)]
    pub of_study: Vec<String>,
    /// Optional path to write the statistics to as JSON.
    #[arg(long)]
    pub path_output: Option<String>,
}

/// Statistics over a set of patients.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub patients: usize,
    /// Mean number of observed phenotype terms per patient.
    pub avg_phenotypes: f64,
    /// Mean number of excluded phenotype terms per patient.
    pub avg_negative_phenotypes: f64,
    /// Owners of the patients, the empty string for "no owner".
    pub owners: BTreeSet<String>,
    /// Studies of the patients, the empty string for "no study".
    pub studies: BTreeSet<String>,
    /// Names of the fields with a non-empty value in at least one patient.
    pub fields_used: BTreeSet<String>,
}

fn count_terms(value: Option<&str>) -> usize {
    value
        .map(|value| value.split('|').filter(|term| !term.is_empty()).count())
        .unwrap_or(0)
}

fn average(total: usize, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}

/// Compute the statistics over the patients matching any of `users` and any
/// of `studies`; an empty list does not restrict, an empty name selects
/// patients without owner or study.
pub fn compute_stats<R: PatientRepository>(
    repo: &R,
    users: &[String],
    studies: &[String],
) -> Result<Stats, RegistryError> {
    let study_filters = studies
        .iter()
        .filter_map(|study| StudyFilter::from_arg(Some(study.as_str())))
        .collect::<Vec<_>>();

    let mut result = Stats::default();
    let (mut n_phenotypes, mut n_negative) = (0, 0);
    for patient_id in repo.list_patients(&PatientFilter::default())? {
        let owner = repo.get_owner(&patient_id)?.unwrap_or_default();
        let study = repo.get_study(&patient_id)?;
        let user_ok = users.is_empty()
            || users.iter().any(|user| user.eq_ignore_ascii_case(&owner));
        let study_ok = study_filters.is_empty()
            || study_filters
                .iter()
                .any(|filter| filter.matches(study.as_deref()));
        if !user_ok || !study_ok {
            continue;
        }

        let patient = repo.get_patient(&patient_id)?;
        result.patients += 1;
        n_phenotypes += count_terms(patient.get("phenotype"));
        n_negative += count_terms(patient.get("negative_phenotype"));
        result.owners.insert(owner);
        result.studies.insert(study.unwrap_or_default());
        result.fields_used.extend(
            patient
                .iter()
                .filter(|(_, value)| !value.is_empty())
                .map(|(name, _)| name.to_string()),
        );
    }
    result.avg_phenotypes = average(n_phenotypes, result.patients);
    result.avg_negative_phenotypes = average(n_negative, result.patients);

    Ok(result)
}

/// Main entry point for `stats` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = Instant::now();
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);

    let registry = JsonRegistry::from_path(expand_path(&args.path_registry))?;
    let stats = compute_stats(&registry, &args.of_user, &args.of_study)?;

    tracing::info!("patients: {}", stats.patients.separate_with_commas());
    tracing::info!("average phenotype terms: {:.2}", stats.avg_phenotypes);
    tracing::info!(
        "average negative phenotype terms: {:.2}",
        stats.avg_negative_phenotypes
    );
    tracing::info!("owners: {:?}", &stats.owners);
    tracing::info!("studies: {:?}", &stats.studies);
    tracing::info!("fields used: {:?}", &stats.fields_used);

    if let Some(path_output) = &args.path_output {
        let path_output = expand_path(path_output);
        let mut writer = open_write_maybe_gz(&path_output)
            .map_err(|e| anyhow::anyhow!("could not open {} for writing: {}", &path_output, e))?;
        serde_json::to_writer_pretty(&mut writer, &stats)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }

    tracing::info!(
        "All of `stats` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::registry::dump::entry;
    use crate::registry::Properties;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn all_patients() -> Result<(), anyhow::Error> {
        let registry = JsonRegistry::from_path("tests/data/registry/small.json")?;

        let stats = compute_stats(&registry, &[], &[])?;

        assert_eq!(stats.patients, 4);
        assert_eq!(stats.avg_phenotypes, 1.5);
        assert_eq!(stats.avg_negative_phenotypes, 0.25);
        assert_eq!(
            stats.owners.iter().collect::<Vec<_>>(),
            vec!["Groups.Lab", "XWiki.Admin"]
        );
        assert_eq!(
            stats.studies.iter().collect::<Vec<_>>(),
            vec!["", "MCAD", "mcad", "other"]
        );
        assert!(stats.fields_used.contains("weight"));
        assert!(stats.fields_used.contains("negative_phenotype"));
        assert!(!stats.fields_used.contains("date_last_evaluated"));

        Ok(())
    }

    #[rstest]
    #[case(&["groups.lab"], &[], 2)]
    #[case(&["xwiki.admin", "groups.lab"], &[], 4)]
    #[case(&[], &["mcad"], 2)]
    #[case(&[], &["", "other"], 2)]
    #[case(&["groups.lab"], &["mcad"], 0)]
    #[case(&["nobody"], &[], 0)]
    fn restricted(
        #[case] users: &[&str],
        #[case] studies: &[&str],
        #[case] expected: usize,
    ) -> Result<(), anyhow::Error> {
        let registry = JsonRegistry::from_path("tests/data/registry/small.json")?;

        let stats = compute_stats(&registry, &strings(users), &strings(studies))?;

        assert_eq!(stats.patients, expected);
        Ok(())
    }

    #[test]
    fn empty_user_selects_unowned_patients() -> Result<(), anyhow::Error> {
        let registry = JsonRegistry::new(
            Properties::default(),
            vec![
                entry("P1", None, Some("alice"), &[("phenotype", "HP:0001250")]),
                entry("P2", None, None, &[]),
            ],
        )?;

        let unowned = compute_stats(&registry, &strings(&[""]), &[])?;
        assert_eq!(unowned.patients, 1);
        assert_eq!(unowned.owners.iter().collect::<Vec<_>>(), vec![""]);

        let all = compute_stats(&registry, &[], &[])?;
        assert_eq!(all.patients, 2);
        assert_eq!(all.owners.iter().collect::<Vec<_>>(), vec!["", "alice"]);

        let alice = compute_stats(&registry, &strings(&["Alice"]), &[])?;
        assert_eq!(alice.patients, 1);
        assert_eq!(alice.avg_phenotypes, 1.0);

        Ok(())
    }

    #[test]
    fn no_patients_average_zero() -> Result<(), anyhow::Error> {
        let registry = JsonRegistry::from_path("tests/data/registry/small.json")?;

        let stats = compute_stats(&registry, &strings(&["nobody"]), &[])?;

        assert_eq!(stats, Stats::default());
        Ok(())
    }

    #[test]
    fn run_writes_json() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let path_output = tmp_dir.join("stats.json");
        let args = Args {
            path_registry: String::from("tests/data/registry/small.json"),
            of_user: vec![],
            of_study: strings(&["other"]),
            path_output: Some(path_output.to_string_lossy().into_owned()),
        };

        run(&crate::common::Args::default(), &args)?;

        let output: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path_output)?)?;
        assert_eq!(output["patients"], 1);
        assert_eq!(output["avg_phenotypes"], 3.0);
        assert_eq!(output["owners"], serde_json::json!(["Groups.Lab"]));

        Ok(())
    }
}
