//! Registry backed by a JSON dump file.

use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{
    PatientFilter, PatientRecord, PatientRepository, PatientStore, Properties, Relative,
    VariantObservation,
};
use crate::common::io::{open_read_maybe_gz, wrap_write_maybe_gz};
use crate::err::RegistryError;

/// One patient entry of the dump.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientEntry {
    /// Registry identifier, e.g., `P0000001`.
    pub id: String,
    /// Study the patient is enrolled in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study: Option<String>,
    /// Owning user or group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// The patient fields.
    #[serde(default)]
    pub fields: PatientRecord,
    /// The ClinVar variant objects.
    #[serde(default)]
    pub clinvar_variants: Vec<VariantObservation>,
    /// The relative objects.
    #[serde(default)]
    pub relatives: Vec<Relative>,
}

/// On-disk representation of the dump.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Dump {
    #[serde(default)]
    properties: Properties,
    #[serde(default)]
    patients: Vec<PatientEntry>,
}

/// Patient registry loaded into memory from a JSON dump.
#[derive(Debug, Default, Clone)]
pub struct JsonRegistry {
    /// Path the registry was loaded from, used by [`JsonRegistry::save`].
    path: Option<PathBuf>,
    /// Patient field schema.
    properties: Properties,
    /// Patients by identifier, in dump order.
    patients: IndexMap<String, PatientEntry>,
}

impl JsonRegistry {
    /// Construct from in-memory data.
    pub fn new(
        properties: Properties,
        patients: Vec<PatientEntry>,
    ) -> Result<Self, RegistryError> {
        let mut result = Self {
            path: None,
            properties,
            patients: IndexMap::with_capacity(patients.len()),
        };
        for entry in patients {
            if result.patients.contains_key(&entry.id) {
                return Err(RegistryError::DuplicatePatient(entry.id));
            }
            result.patients.insert(entry.id.clone(), entry);
        }
        Ok(result)
    }

    /// Load the registry dump at `path` (optionally gzip-compressed).
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let path_str = path.as_ref().display().to_string();
        tracing::debug!("loading registry from {}", &path_str);
        let reader = open_read_maybe_gz(path.as_ref()).map_err(|source| RegistryError::Open {
            path: path_str.clone(),
            source,
        })?;
        let dump: Dump = serde_json::from_reader(reader).map_err(|source| {
            RegistryError::Parse {
                path: path_str.clone(),
                source,
            }
        })?;
        let mut result = Self::new(dump.properties, dump.patients)?;
        result.path = Some(path.as_ref().to_path_buf());
        tracing::debug!(
            "loaded {} patients and {} properties",
            result.patients.len(),
            result.properties.len()
        );
        Ok(result)
    }

    /// Write the registry back to the path it was loaded from.
    pub fn save(&self) -> Result<(), RegistryError> {
        match &self.path {
            Some(path) => self.save_to(path),
            None => Err(RegistryError::Save {
                path: String::from("<memory>"),
                source: anyhow::anyhow!("registry was not loaded from a file"),
            }),
        }
    }

    /// Atomically write the registry to `path`.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), RegistryError> {
        let path = path.as_ref();
        self.write_dump(path).map_err(|source| RegistryError::Save {
            path: path.display().to_string(),
            source,
        })
    }

    fn write_dump(&self, path: &Path) -> Result<(), anyhow::Error> {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let tmp = tempfile::NamedTempFile::new_in(&dir)?;
        {
            let mut writer = wrap_write_maybe_gz(path, tmp.reopen()?)?;
            let dump = DumpRef {
                properties: &self.properties,
                patients: self.patients.values().collect(),
            };
            serde_json::to_writer_pretty(&mut writer, &dump)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        tmp.persist(path)?;
        Ok(())
    }

    fn entry(&self, patient_id: &str) -> Result<&PatientEntry, RegistryError> {
        self.patients
            .get(patient_id)
            .ok_or_else(|| RegistryError::PatientNotFound(patient_id.to_string()))
    }

    fn entry_mut(&mut self, patient_id: &str) -> Result<&mut PatientEntry, RegistryError> {
        self.patients
            .get_mut(patient_id)
            .ok_or_else(|| RegistryError::PatientNotFound(patient_id.to_string()))
    }

    /// Next free numeric identifier.
    fn next_identifier(&self) -> u64 {
        self.patients
            .values()
            .filter_map(|entry| {
                entry
                    .fields
                    .get("identifier")
                    .and_then(|id| id.parse::<u64>().ok())
                    .or_else(|| entry.id.trim_start_matches('P').parse::<u64>().ok())
            })
            .max()
            .unwrap_or(0)
            + 1
    }
}

/// Borrowed counterpart of [`Dump`] for serialization.
#[derive(Serialize)]
struct DumpRef<'a> {
    properties: &'a Properties,
    patients: Vec<&'a PatientEntry>,
}

impl PatientRepository for JsonRegistry {
    fn list_patients(&self, filter: &PatientFilter) -> Result<Vec<String>, RegistryError> {
        Ok(self
            .patients
            .values()
            .filter(|entry| filter.matches(entry.study.as_deref(), entry.owner.as_deref()))
            .map(|entry| entry.id.clone())
            .collect())
    }

    fn get_patient(&self, patient_id: &str) -> Result<PatientRecord, RegistryError> {
        Ok(self.entry(patient_id)?.fields.clone())
    }

    fn list_variant_observations(&self, patient_id: &str) -> Result<Vec<usize>, RegistryError> {
        Ok((0..self.entry(patient_id)?.clinvar_variants.len()).collect())
    }

    fn get_variant_observation(
        &self,
        patient_id: &str,
        number: usize,
    ) -> Result<VariantObservation, RegistryError> {
        self.entry(patient_id)?
            .clinvar_variants
            .get(number)
            .cloned()
            .ok_or_else(|| RegistryError::ObservationNotFound {
                patient_id: patient_id.to_string(),
                number,
            })
    }

    fn get_study(&self, patient_id: &str) -> Result<Option<String>, RegistryError> {
        Ok(self.entry(patient_id)?.study.clone())
    }

    fn get_owner(&self, patient_id: &str) -> Result<Option<String>, RegistryError> {
        Ok(self.entry(patient_id)?.owner.clone())
    }

    fn get_id(&self, external_id: &str) -> Result<Option<String>, RegistryError> {
        Ok(self
            .patients
            .values()
            .find(|entry| entry.fields.get("external_id") == Some(external_id))
            .map(|entry| entry.id.clone()))
    }

    fn list_relatives(&self, patient_id: &str) -> Result<Vec<usize>, RegistryError> {
        Ok((0..self.entry(patient_id)?.relatives.len()).collect())
    }

    fn get_relative(&self, patient_id: &str, number: usize) -> Result<Relative, RegistryError> {
        self.entry(patient_id)?
            .relatives
            .get(number)
            .cloned()
            .ok_or_else(|| RegistryError::RelativeNotFound {
                patient_id: patient_id.to_string(),
                number,
            })
    }

    fn list_properties(&self) -> Result<Properties, RegistryError> {
        Ok(self.properties.clone())
    }
}

impl PatientStore for JsonRegistry {
    fn create_patient(
        &mut self,
        mut record: PatientRecord,
        study: Option<&str>,
        owner: Option<&str>,
    ) -> Result<String, RegistryError> {
        let identifier = self.next_identifier();
        let id = format!("P{:07}", identifier);
        record.insert("identifier", identifier.to_string());
        tracing::debug!("creating patient {}", &id);
        self.patients.insert(
            id.clone(),
            PatientEntry {
                id: id.clone(),
                study: study.filter(|s| !s.is_empty()).map(str::to_string),
                owner: owner.filter(|s| !s.is_empty()).map(str::to_string),
                fields: record,
                clinvar_variants: Vec::new(),
                relatives: Vec::new(),
            },
        );
        Ok(id)
    }

    fn update_patient(
        &mut self,
        patient_id: &str,
        record: &PatientRecord,
    ) -> Result<(), RegistryError> {
        tracing::debug!("updating patient {}", patient_id);
        self.entry_mut(patient_id)?.fields.update(record);
        Ok(())
    }

    fn create_relative(
        &mut self,
        patient_id: &str,
        relative: Relative,
    ) -> Result<(), RegistryError> {
        self.entry_mut(patient_id)?.relatives.push(relative);
        Ok(())
    }
}

/// Construct a [`PatientEntry`] from literal fields; used by tests.
#[cfg(test)]
pub fn entry(
    id: &str,
    study: Option<&str>,
    owner: Option<&str>,
    fields: &[(&str, &str)],
) -> PatientEntry {
    PatientEntry {
        id: id.to_string(),
        study: study.map(str::to_string),
        owner: owner.map(str::to_string),
        fields: fields.iter().copied().collect::<super::Fields>(),
        clinvar_variants: Vec::new(),
        relatives: Vec::new(),
    }
}
