//! Import of parent/child relationships from a PED file.
//!
//! Each PED line yields up to four relative records: one `child` record on the
//! individual per known parent and one `parent` record on each known parent.
//! Individuals are matched to patients by their external ID.

use std::io::Read;
use std::time::Instant;

use clap::Parser;
use indexmap::IndexMap;
use thousands::Separable;

use super::{ParentRole, PedRecord};
use crate::common::{confirm, expand_path, open_read_maybe_gz};
use crate::err::{PedWarning, RegistryError};
use crate::registry::{JsonRegistry, PatientRepository, PatientStore, Relative, RelativeType};

/// Command line arguments for `ped import` sub command.
#[derive(Parser, Debug)]
#[command(about = "Import relationships from a PED file", long_about = None)]
pub struct Args {
    /// Path to the registry dump (JSON, optionally gzip-compressed); updated in place.
    #[arg(long)]
    pub path_registry: String,
    /// Path to the PED file to import.
    #[arg(long)]
    pub path_input: String,
    /// Do not ask for confirmation.
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Read the data lines of a tab-separated PED file.
///
/// Lines starting with `#` are skipped, as are blank lines.
pub fn parse_ped<R: Read>(reader: R) -> Result<Vec<PedRecord>, anyhow::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(reader);

    let mut result = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        result.push(PedRecord::from_record(&record)?);
    }
    Ok(result)
}

/// The relative records to create, together with warnings about individuals
/// that are not in the registry.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RelativePlan {
    /// Pairs of patient identifier and the record to attach to it.
    pub relatives: Vec<(String, Relative)>,
    /// Problems found along the way, in file order.
    pub warnings: Vec<PedWarning>,
}

/// Resolves external IDs, remembering earlier lookups.
struct Resolver<'a, R: PatientRepository> {
    repo: &'a R,
    cache: IndexMap<String, Option<String>>,
}

impl<'a, R: PatientRepository> Resolver<'a, R> {
    fn new(repo: &'a R) -> Self {
        Self {
            repo,
            cache: IndexMap::new(),
        }
    }

    fn resolve(&mut self, external_id: &str) -> Result<Option<String>, RegistryError> {
        if let Some(patient_id) = self.cache.get(external_id) {
            return Ok(patient_id.clone());
        }
        let patient_id = self.repo.get_id(external_id)?;
        self.cache
            .insert(external_id.to_string(), patient_id.clone());
        Ok(patient_id)
    }
}

/// Work out which relative records the lines of a PED file translate to.
pub fn plan_relatives<R: PatientRepository>(
    repo: &R,
    records: &[PedRecord],
) -> Result<RelativePlan, RegistryError> {
    let mut resolver = Resolver::new(repo);
    let mut result = RelativePlan::default();

    for record in records {
        let child_eid = record.individual_id.as_str();
        let child_id = match child_eid {
            super::UNKNOWN => None,
            _ => resolver.resolve(child_eid)?,
        };

        let mut parents = Vec::new();
        for (role, parent_eid) in [
            (ParentRole::Father, &record.paternal_id),
            (ParentRole::Mother, &record.maternal_id),
        ] {
            if let Some(parent_eid) = parent_eid {
                let parent_id = resolver.resolve(parent_eid)?;
                parents.push((role, parent_eid.as_str(), parent_id));
            }
        }

        match &child_id {
            Some(child_id) => {
                for (role, parent_eid, parent_id) in &parents {
                    if parent_id.is_none() {
                        result.warnings.push(PedWarning::AddingUnknownParent {
                            role: *role,
                            external_id: parent_eid.to_string(),
                            child: child_id.clone(),
                        });
                    }
                    result.relatives.push((
                        child_id.clone(),
                        Relative::new(Some(parent_eid.to_string()), RelativeType::Child),
                    ));
                }
            }
            None if !parents.is_empty() => result
                .warnings
                .push(PedWarning::SkippingUnknownChild(child_eid.to_string())),
            None => (),
        }

        for (role, parent_eid, parent_id) in parents {
            match parent_id {
                Some(parent_id) => {
                    if child_id.is_none() {
                        result.warnings.push(PedWarning::AddingUnknownChild {
                            external_id: child_eid.to_string(),
                            parent: parent_id.clone(),
                        });
                    }
                    result.relatives.push((
                        parent_id,
                        Relative::new(Some(child_eid.to_string()), RelativeType::Parent),
                    ));
                }
                None => result.warnings.push(PedWarning::SkippingUnknownParent {
                    role,
                    external_id: parent_eid.to_string(),
                }),
            }
        }
    }

    Ok(result)
}

/// Attach the planned records, returning how many were created.
pub fn import_relatives<S: PatientStore>(
    store: &mut S,
    relatives: Vec<(String, Relative)>,
) -> Result<usize, RegistryError> {
    let count = relatives.len();
    for (patient_id, relative) in relatives {
        tracing::debug!("{} -> {:?}", &patient_id, &relative);
        store.create_relative(&patient_id, relative)?;
    }
    Ok(count)
}

/// Main entry point for `ped import` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = Instant::now();
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);

    let mut registry = JsonRegistry::from_path(expand_path(&args.path_registry))?;
    let path_input = expand_path(&args.path_input);
    let reader = open_read_maybe_gz(&path_input)
        .map_err(|e| anyhow::anyhow!("could not open {} for reading: {}", &path_input, e))?;
    let records = parse_ped(reader)?;
    tracing::info!("read {} PED lines", records.len().separate_with_commas());

    let plan = plan_relatives(&registry, &records)?;
    for warning in &plan.warnings {
        tracing::warn!("{}", warning);
    }

    let action = format!(
        "You are about to import {} relationships",
        plan.relatives.len()
    );
    if !args.yes && !confirm(&action)? {
        tracing::info!("import cancelled, registry left unchanged");
        return Ok(());
    }

    let count = import_relatives(&mut registry, plan.relatives)?;
    registry.save()?;

    tracing::info!("created {} relative records", count.separate_with_commas());
    tracing::info!(
        "All of `ped import` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}
