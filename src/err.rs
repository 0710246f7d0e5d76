//! Error types shared between the sub commands.

/// Failure when fetching from or storing to the patient registry.
///
/// All of these are fatal for the pipeline that triggered them.
#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("could not open registry {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("could not parse registry {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not save registry to {path}: {source}")]
    Save {
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("duplicate patient id {0} in registry")]
    DuplicatePatient(String),
    #[error("patient {0} not found")]
    PatientNotFound(String),
    #[error("variant observation {number} of patient {patient_id} not found")]
    ObservationNotFound { patient_id: String, number: usize },
    #[error("relative {number} of patient {patient_id} not found")]
    RelativeNotFound { patient_id: String, number: usize },
}

/// Inconsistencies in relative records that make a PED export impossible.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PedError {
    #[error("Relative {number} of patient {patient_id} is malformed")]
    MalformedRelative { patient_id: String, number: usize },
    #[error("Relative {external_id} of patient {patient_id} is not in the registry")]
    UnknownRelative {
        patient_id: String,
        external_id: String,
    },
    #[error("Patient {iid} has two fathers: {first} and {second}")]
    TwoFathers {
        iid: String,
        first: String,
        second: String,
    },
    #[error("Patient {iid} has two mothers: {first} and {second}")]
    TwoMothers {
        iid: String,
        first: String,
        second: String,
    },
    #[error("Parent {0} is neither male nor female")]
    ParentWithoutSex(String),
}

/// Recoverable problems found while importing a CSV file.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportWarning {
    #[error("Ignoring unrecognized column {0:?}")]
    UnrecognizedColumn(String),
    #[error("Ignoring unrecognized value {value:?} for {field:?}")]
    UnrecognizedValue { value: String, field: String },
    #[error(
        "Ignoring identifier column; all existing patients must be identified using the \
        external_id column and all new patients must receive new identifiers"
    )]
    IdentifierColumn,
}

/// Recoverable problems found while matching PED rows to the registry.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PedWarning {
    #[error("Adding unknown {role} {external_id} to {child}")]
    AddingUnknownParent {
        role: crate::ped::ParentRole,
        external_id: String,
        child: String,
    },
    #[error("Adding unknown child {external_id} to {parent}")]
    AddingUnknownChild { external_id: String, parent: String },
    #[error("Skipping unknown child {0}")]
    SkippingUnknownChild(String),
    #[error("Skipping unknown {role} {external_id}")]
    SkippingUnknownParent {
        role: crate::ped::ParentRole,
        external_id: String,
    },
}
