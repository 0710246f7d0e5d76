//! Export of registry patients to ClinVar submission spreadsheets.

pub mod aggregate;
pub mod inheritance;
pub mod key;
pub mod output;

use std::time::Instant;

use clap::Parser;
use thousands::Separable;

use crate::common::{expand_path, split_list};
use crate::err::RegistryError;
use crate::registry::{JsonRegistry, PatientFilter, PatientRepository, VariantObservation};

use self::aggregate::{AggregateGroup, Aggregator};

/// Command line arguments for `clinvar export` sub command.
#[derive(Parser, Debug)]
#[command(about = "Export variants to ClinVar submission spreadsheets", long_about = None)]
pub struct Args {
    /// Path to the registry dump (JSON, optionally gzip-compressed).
    #[arg(long)]
    pub path_registry: String,
    /// Directory to write `Variant.csv` and `CaseData.csv` to.
    #[arg(long, default_value = ".")]
    pub path_output_dir: String,
    /// Only export variants in this gene (case-insensitive).
    #[arg(long)]
    pub gene: Option<String>,
    /// Only export patients of this study; empty for patients without study,
    /// `None` for all patients.
    #[arg(long)]
    pub study: Option<String>,
    /// Only export patients owned by this user or group.
    #[arg(long)]
    pub owner: Option<String>,
}

/// Whether the observation lists `gene` (already upper-cased) as one of its genes.
fn gene_matches(gene: &str, observation: &VariantObservation) -> bool {
    observation
        .get_nonempty("gene_symbol")
        .map(|symbols| split_list(&symbols.to_uppercase(), ';').any(|symbol| symbol == gene))
        .unwrap_or(false)
}

/// Fold all variant observations of the patients passing `filter` into groups.
///
/// `progress` is called with the running count once per listed patient.  Any
/// registry failure aborts the whole aggregation.
pub fn aggregate<R, F>(
    repo: &R,
    filter: &PatientFilter,
    gene: Option<&str>,
    mut progress: F,
) -> Result<Vec<AggregateGroup>, RegistryError>
where
    R: PatientRepository,
    F: FnMut(usize),
{
    let gene = gene.filter(|gene| !gene.is_empty()).map(str::to_uppercase);
    let patient_ids = repo.list_patients(filter)?;
    tracing::info!(
        "looking through {} patient records...",
        patient_ids.len().separate_with_commas()
    );

    let mut aggregator = Aggregator::new();
    for (i, patient_id) in patient_ids.iter().enumerate() {
        progress(i + 1);

        let numbers = repo.list_variant_observations(patient_id)?;
        if numbers.is_empty() {
            continue;
        }
        let patient = repo.get_patient(patient_id)?;
        for number in numbers {
            let observation = repo.get_variant_observation(patient_id, number)?;
            if let Some(gene) = &gene {
                if !gene_matches(gene, &observation) {
                    continue;
                }
            }
            aggregator.push(&patient, &observation);
        }
    }

    tracing::debug!(
        "aggregated {} observations into {} groups",
        aggregator.observations().separate_with_commas(),
        aggregator.len().separate_with_commas()
    );
    Ok(aggregator.into_groups())
}

/// Main entry point for `clinvar export` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = Instant::now();
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);

    let registry = JsonRegistry::from_path(expand_path(&args.path_registry))?;
    let filter = PatientFilter::from_args(args.study.as_deref(), args.owner.as_deref());

    let mut prev = Instant::now();
    let groups = aggregate(&registry, &filter, args.gene.as_deref(), |count| {
        if prev.elapsed().as_secs() >= 60 {
            tracing::info!("at patient #{}", count.separate_with_commas());
            prev = Instant::now();
        }
    })?;

    tracing::info!(
        "writing {} and {}...",
        output::VARIANT_FILE,
        output::CASE_FILE
    );
    let tables = output::build_tables(&groups);
    output::write_tables(&tables, expand_path(&args.path_output_dir))?;

    tracing::info!(
        "exported {} variants and {} cases",
        tables.variant_count().separate_with_commas(),
        tables.case_count().separate_with_commas()
    );
    tracing::info!(
        "All of `clinvar export` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}
