//! Access to the patient registry.
//!
//! The pipelines only talk to the registry through the [`PatientRepository`]
//! and [`PatientStore`] traits.  [`JsonRegistry`] implements both on top of a
//! JSON dump of the registry.

pub mod dump;
pub mod record;
pub mod schema;

pub use dump::JsonRegistry;
pub use record::{Fields, PatientRecord, Relative, RelativeType, VariantObservation};
pub use schema::{Properties, PropertyMeta, PropertyType};

use crate::err::RegistryError;

/// Restriction of patients by the study they are enrolled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudyFilter {
    /// Patients that are not enrolled in any study.
    Default,
    /// Patients in the given study (compared case-insensitively).
    Named(String),
}

impl StudyFilter {
    /// Interpret the value of a `--study` argument.
    ///
    /// `None` and the literal `None` disable filtering, the empty string selects
    /// patients without a study.
    pub fn from_arg(value: Option<&str>) -> Option<Self> {
        match value {
            None | Some("None") => None,
            Some("") => Some(StudyFilter::Default),
            Some(name) => Some(StudyFilter::Named(name.to_string())),
        }
    }

    /// Whether a patient enrolled in `study` passes the filter.
    pub fn matches(&self, study: Option<&str>) -> bool {
        match (self, study) {
            (StudyFilter::Default, None) => true,
            (StudyFilter::Default, Some(study)) => study.is_empty(),
            (StudyFilter::Named(_), None) => false,
            (StudyFilter::Named(name), Some(study)) => name.eq_ignore_ascii_case(study),
        }
    }

    /// Family ID to use in PED output.
    pub fn family_id(&self) -> &str {
        match self {
            StudyFilter::Default => "0",
            StudyFilter::Named(name) => name,
        }
    }
}

/// Restriction of the patients returned by [`PatientRepository::list_patients`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientFilter {
    /// Optional study restriction.
    pub study: Option<StudyFilter>,
    /// Optional owning user or group (compared case-insensitively).
    pub owner: Option<String>,
}

impl PatientFilter {
    /// Build from the `--study` and `--owner` command line values.
    pub fn from_args(study: Option<&str>, owner: Option<&str>) -> Self {
        Self {
            study: StudyFilter::from_arg(study),
            owner: owner.filter(|owner| !owner.is_empty()).map(str::to_string),
        }
    }

    /// Whether a patient with the given study and owner passes the filter.
    pub fn matches(&self, study: Option<&str>, owner: Option<&str>) -> bool {
        let study_ok = self
            .study
            .as_ref()
            .map(|filter| filter.matches(study))
            .unwrap_or(true);
        let owner_ok = match (&self.owner, owner) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(wanted), Some(owner)) => wanted.eq_ignore_ascii_case(owner),
        };
        study_ok && owner_ok
    }
}

/// Read access to the patient registry.
pub trait PatientRepository {
    /// Identifiers of all patients passing `filter`, in registry order.
    fn list_patients(&self, filter: &PatientFilter) -> Result<Vec<String>, RegistryError>;
    /// The fields of one patient.
    fn get_patient(&self, patient_id: &str) -> Result<PatientRecord, RegistryError>;
    /// Object numbers of the variant observations of one patient.
    fn list_variant_observations(&self, patient_id: &str) -> Result<Vec<usize>, RegistryError>;
    /// One variant observation of a patient.
    fn get_variant_observation(
        &self,
        patient_id: &str,
        number: usize,
    ) -> Result<VariantObservation, RegistryError>;

    /// The study a patient is enrolled in, if any.
    fn get_study(&self, patient_id: &str) -> Result<Option<String>, RegistryError>;
    /// The owning user or group of a patient, if any.
    fn get_owner(&self, patient_id: &str) -> Result<Option<String>, RegistryError>;
    /// Resolve an external ID to a patient identifier.
    fn get_id(&self, external_id: &str) -> Result<Option<String>, RegistryError>;
    /// Object numbers of the relative records of a patient.
    fn list_relatives(&self, patient_id: &str) -> Result<Vec<usize>, RegistryError>;
    /// One relative record of a patient.
    fn get_relative(&self, patient_id: &str, number: usize) -> Result<Relative, RegistryError>;
    /// The patient field schema in display order.
    fn list_properties(&self) -> Result<Properties, RegistryError>;
}

/// Write access to the patient registry.
pub trait PatientStore: PatientRepository {
    /// Create a new patient, returning its identifier.
    fn create_patient(
        &mut self,
        record: PatientRecord,
        study: Option<&str>,
        owner: Option<&str>,
    ) -> Result<String, RegistryError>;
    /// Overwrite the given fields of an existing patient.
    fn update_patient(
        &mut self,
        patient_id: &str,
        record: &PatientRecord,
    ) -> Result<(), RegistryError>;
    /// Attach a relative record to a patient.
    fn create_relative(&mut self, patient_id: &str, relative: Relative)
        -> Result<(), RegistryError>;
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(None, None)]
    #[case(Some("None"), None)]
    #[case(Some(""), Some(StudyFilter::Default))]
    #[case(Some("MCAD"), Some(StudyFilter::Named("MCAD".into())))]
    fn study_filter_from_arg(#[case] arg: Option<&str>, #[case] expected: Option<StudyFilter>) {
        assert_eq!(StudyFilter::from_arg(arg), expected);
    }

    #[rstest]
    #[case(StudyFilter::Default, None, true)]
    #[case(StudyFilter::Default, Some(""), true)]
    #[case(StudyFilter::Default, Some("mcad"), false)]
    #[case(StudyFilter::Named("MCAD".into()), Some("mcad"), true)]
    #[case(StudyFilter::Named("MCAD".into()), Some("other"), false)]
    #[case(StudyFilter::Named("MCAD".into()), None, false)]
    fn study_filter_matches(
        #[case] filter: StudyFilter,
        #[case] study: Option<&str>,
        #[case] expected: bool,
    ) {
        assert_eq!(filter.matches(study), expected);
    }

    #[test]
    fn patient_filter_owner() {
        let filter = PatientFilter::from_args(None, Some("Groups.Lab"));
        assert!(filter.matches(Some("x"), Some("groups.lab")));
        assert!(!filter.matches(None, Some("Admin")));
        assert!(!filter.matches(None, None));

        let filter = PatientFilter::from_args(Some("None"), Some(""));
        assert_eq!(filter, PatientFilter::default());
        assert!(filter.matches(None, None));
    }
}
