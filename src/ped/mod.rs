//! Pedigree (PED) export and import of relative records.

pub mod export;
pub mod import;

use strum_macros::{Display, EnumString};

/// The external ID written for unknown parents.
pub const UNKNOWN: &str = "0";

/// Header line of written PED files.
pub const HEADER: [&str; 6] = ["#FID", "IID", "PAT", "MAT", "SEX", "PHENOTYPE"];

/// Sex as encoded in PED files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
pub enum Sex {
    #[default]
    #[strum(serialize = "0")]
    Unknown,
    #[strum(serialize = "1")]
    Male,
    #[strum(serialize = "2")]
    Female,
}

impl Sex {
    /// From the `gender` patient field.
    pub fn from_gender(gender: Option<&str>) -> Self {
        match gender {
            Some("M") => Sex::Male,
            Some("F") => Sex::Female,
            _ => Sex::Unknown,
        }
    }
}

/// Affection status as encoded in PED files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
pub enum Phenotype {
    #[default]
    #[strum(serialize = "0")]
    Unknown,
    #[strum(serialize = "1")]
    Unaffected,
    #[strum(serialize = "2")]
    Affected,
}

impl Phenotype {
    /// From the `case_or_control` patient field.
    pub fn from_case_or_control(case_or_control: Option<&str>) -> Self {
        match case_or_control {
            Some("case") => Phenotype::Affected,
            Some("control") => Phenotype::Unaffected,
            _ => Phenotype::Unknown,
        }
    }
}

/// Which parent column a PED entry comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ParentRole {
    Father,
    Mother,
}

/// One line of a PED file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PedRecord {
    pub family_id: String,
    pub individual_id: String,
    /// External ID of the father, if known.
    pub paternal_id: Option<String>,
    /// External ID of the mother, if known.
    pub maternal_id: Option<String>,
    pub sex: Sex,
    pub phenotype: Phenotype,
}

fn parent_id(value: Option<&str>) -> Option<String> {
    value
        .filter(|value| !value.is_empty() && *value != UNKNOWN)
        .map(str::to_string)
}

impl PedRecord {
    /// Parse a data row; sex and phenotype are optional and default to unknown.
    pub fn from_record(record: &csv::StringRecord) -> Result<Self, anyhow::Error> {
        let individual_id = record
            .get(1)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| anyhow::anyhow!("PED row without individual ID: {:?}", record))?;
        Ok(Self {
            family_id: record.get(0).unwrap_or(UNKNOWN).to_string(),
            individual_id: individual_id.to_string(),
            paternal_id: parent_id(record.get(2)),
            maternal_id: parent_id(record.get(3)),
            sex: record
                .get(4)
                .and_then(|value| value.parse().ok())
                .unwrap_or_default(),
            phenotype: record
                .get(5)
                .and_then(|value| value.parse().ok())
                .unwrap_or_default(),
        })
    }

    /// The six PED columns.
    pub fn to_record(&self) -> [String; 6] {
        [
            self.family_id.clone(),
            self.individual_id.clone(),
            self.paternal_id.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            self.maternal_id.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            self.sex.to_string(),
            self.phenotype.to_string(),
        ]
    }
}
