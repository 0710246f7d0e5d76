//! Column-for-column CSV export and import of patient records.

pub mod export;
pub mod import;

/// The `--study` value to assign to imported patients; `None` means none.
pub(crate) fn study_arg(study: Option<&str>) -> Option<&str> {
    study.filter(|study| *study != "None" && !study.is_empty())
}
