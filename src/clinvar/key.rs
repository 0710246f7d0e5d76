//! Identity of an aggregate row in the ClinVar submission.

use crate::registry::{PatientRecord, VariantObservation};

/// The fields by which variant observations are collapsed into one row.
///
/// Fields are taken verbatim.  An absent field is a value of its own: two
/// observations lacking the same field still share a key, whereas an absent
/// and an empty field do not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupingKey {
    pub reference_sequence: Option<String>,
    pub hgvs: Option<String>,
    pub cis_or_trans: Option<String>,
    pub location: Option<String>,
    /// From the patient record.
    pub omim_id: Option<String>,
    pub condition_category: Option<String>,
    pub clinical_significance: Option<String>,
    pub collection_method: Option<String>,
    pub allele_origin: Option<String>,
    pub tissue: Option<String>,
    /// From the patient record.
    pub case_or_control: Option<String>,
}

impl GroupingKey {
    /// Derive the key of one observation of `patient`.
    pub fn build(patient: &PatientRecord, observation: &VariantObservation) -> Self {
        Self {
            reference_sequence: observation.get_owned("reference_sequence"),
            hgvs: observation.get_owned("hgvs"),
            cis_or_trans: observation.get_owned("cis_or_trans"),
            location: observation.get_owned("location"),
            omim_id: patient.get_owned("omim_id"),
            condition_category: observation.get_owned("condition_category"),
            clinical_significance: observation.get_owned("clinical_significance"),
            collection_method: observation.get_owned("collection_method"),
            allele_origin: observation.get_owned("allele_origin"),
            tissue: observation.get_owned("tissue"),
            case_or_control: patient.get_owned("case_or_control"),
        }
    }

    /// OMIM IDs as written to the "Condition ID value" column.
    pub fn omim_ids(&self) -> String {
        self.omim_id
            .as_deref()
            .map(|ids| ids.replace('|', ";"))
            .unwrap_or_default()
    }
}
