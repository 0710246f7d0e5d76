//! Export of patients and their parents to a PED file.

use std::io::Write;
use std::time::Instant;

use clap::Parser;
use thousands::Separable;

use super::{ParentRole, PedRecord, Phenotype, Sex, HEADER, UNKNOWN};
use crate::common::{expand_path, open_write_maybe_gz};
use crate::err::PedError;
use crate::registry::{JsonRegistry, PatientFilter, PatientRepository, RelativeType};

/// Command line arguments for `ped export` sub command.
#[derive(Parser, Debug)]
#[command(about = "Export patients to a PED file", long_about = None)]
pub struct Args {
    /// Path to the registry dump (JSON, optionally gzip-compressed).
    #[arg(long)]
    pub path_registry: String,
    /// Path to the output PED file; `.gz` for compressed output.
    #[arg(long)]
    pub path_output: String,
    /// Only export patients of this study, which also becomes the family ID;
    /// empty for patients without study, `None` for all patients.
    #[arg(long)]
    pub study: Option<String>,
    /// Only export patients owned by this user or group.
    #[arg(long)]
    pub owner: Option<String>,
}

/// Build the PED line of one patient from its `child` relative records.
pub fn ped_record<R: PatientRepository>(
    repo: &R,
    patient_id: &str,
    family_id: &str,
) -> Result<PedRecord, anyhow::Error> {
    let patient = repo.get_patient(patient_id)?;
    let individual_id = patient.get("external_id").unwrap_or_default().to_string();
    let mut result = PedRecord {
        family_id: family_id.to_string(),
        individual_id: individual_id.clone(),
        paternal_id: None,
        maternal_id: None,
        sex: Sex::from_gender(patient.get("gender")),
        phenotype: Phenotype::from_case_or_control(patient.get("case_or_control")),
    };

    for number in repo.list_relatives(patient_id)? {
        let relative = repo.get_relative(patient_id, number)?;
        let external_id = relative
            .relative_of
            .filter(|external_id| !external_id.is_empty())
            .ok_or_else(|| PedError::MalformedRelative {
                patient_id: patient_id.to_string(),
                number,
            })?;
        let relative_id = repo
            .get_id(&external_id)?
            .ok_or_else(|| PedError::UnknownRelative {
                patient_id: patient_id.to_string(),
                external_id: external_id.clone(),
            })?;
        if relative.relative_type != RelativeType::Child {
            continue;
        }

        let parent = repo.get_patient(&relative_id)?;
        let (role, slot) = match parent.get("gender") {
            Some("M") => (ParentRole::Father, &mut result.paternal_id),
            Some("F") => (ParentRole::Mother, &mut result.maternal_id),
            _ => return Err(PedError::ParentWithoutSex(external_id).into()),
        };
        if let Some(first) = slot.as_ref() {
            let (iid, first, second) = (individual_id, first.clone(), external_id);
            return Err(match role {
                ParentRole::Father => PedError::TwoFathers { iid, first, second },
                ParentRole::Mother => PedError::TwoMothers { iid, first, second },
            }
            .into());
        }
        *slot = Some(external_id);
    }

    Ok(result)
}

/// Write the PED lines of all patients passing `filter`, returning their number.
pub fn export_ped<R, W, F>(
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
    let family_id = filter
        .study
        .as_ref()
        .map(|study| study.family_id())
        .unwrap_or(UNKNOWN);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(writer);
    writer.write_record(HEADER)?;

    let patient_ids = repo.list_patients(filter)?;
    for (i, patient_id) in patient_ids.iter().enumerate() {
        progress(i + 1);
        writer.write_record(ped_record(repo, patient_id, family_id)?.to_record())?;
    }
    writer.flush()?;

    Ok(patient_ids.len())
}

/// Main entry point for `ped export` sub command.
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
    let count = export_ped(&registry, &filter, writer, |count| {
        if prev.elapsed().as_secs() >= 60 {
            tracing::info!("at patient #{}", count.separate_with_commas());
            prev = Instant::now();
        }
    })?;

    tracing::info!("exported {} pedigree rows", count.separate_with_commas());
    tracing::info!(
        "All of `ped export` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}
