//! Layout and writing of the `Variant.csv` and `CaseData.csv` tables.

use std::path::Path;

use itertools::Itertools;

use super::aggregate::{AggregateGroup, Mosaicism};
use crate::common::io::wrap_write_maybe_gz;

/// File name of the aggregate table.
pub const VARIANT_FILE: &str = "Variant.csv";
/// File name of the case table.
pub const CASE_FILE: &str = "CaseData.csv";

/// Base header of `Variant.csv` with room for a single method block.
pub const VARIANT_COLUMNS: [&str; 92] = [
    "##Local ID",
    "Linking ID",
    "Gene symbol",
    "Reference sequence",
    "HGVS",
    "Chromosome",
    "Start",
    "Stop",
    "Reference allele",
    "Alternate allele",
    "Variant type",
    "Outer start",
    "Inner start",
    "Inner stop",
    "Outer stop",
    "Variant length",
    "Copy number",
    "Reference copy number",
    "Breakpoint 1",
    "Breakpoint 2",
    "Trace or probe data",
    "",
    "Cis or trans",
    "Variation identifiers",
    "Location",
    "Alternate designations",
    "Official allele name",
    "URL",
    "",
    "Condition ID type",
    "Condition ID value",
    "Preferred condition name",
    "Condition category",
    "Condition uncertainty",
    "Condition comment",
    "Clinical significance",
    "Date last evaluated",
    "Assertion method",
    "Assertion method citation",
    "Mode of inheritance",
    "Clinical significance citations",
    "Citations or URLs for clinical significance without database identifiers",
    "Comment on clinical significance",
    "Explanation if clinical significance is other or drug response",
    "Drug response condition",
    "Functional consequence",
    "Comment on functional consequence",
    "",
    "Collection method",
    "Allele origin",
    "Affected status",
    "Structural variant method/analysis type",
    "Clinical features",
    "Tissue",
    "Sex",
    "Age range",
    "Population Group/Ethnicity",
    "Geographic origin",
    "Family history",
    "Indication",
    "Total number of individuals tested",
    "Number of families tested",
    "",
    "Number of individuals with variant",
    "Number of chromosomes with variant",
    "Number of families with variant",
    "Number of families with segregation observed",
    "Mosaicism",
    "Number of homozygotes",
    "Number of single heterozygotes",
    "Number of compound heterozygotes",
    "Number of hemizygotes",
    "Evidence citations",
    "Citations or URLs that cannot be represented in evidence citations column",
    "Comment on evidence",
    "",
    "Test name or type",
    "Platform type",
    "Platform name",
    "Method",
    "Method purpose",
    "Method citations",
    "Software name and version",
    "Software purpose",
    "Testing laboratory",
    "Date variant was reported to submitter",
    "",
    "Comment",
    "Private comment",
    "ClinVarAccession",
    "Novel or Update",
    "Replaces ClinVarAccessions",
];

/// Index of the first method block in `Variant.csv`.
pub const METHOD_OFFSET: usize = 76;
/// Number of columns of one method block.
pub const METHOD_BLOCK_LEN: usize = 10;

/// Header of `CaseData.csv`.
pub const CASE_COLUMNS: [&str; 36] = [
    "##Linking ID",
    "Individual ID",
    "Collection method",
    "Allele origin",
    "Affected status",
    "Structural variant method/analysis type",
    "Clinical features",
    "Tissue",
    "Sex",
    "Age",
    "Population Group/Ethnicity",
    "Geographic origin",
    "Indication",
    "Family history",
    "Condition comment",
    "",
    "Proband",
    "Family ID",
    "Segregation observed",
    "Secondary finding",
    "Mosaicism",
    "Zygosity",
    "Co-occurrences, same gene",
    "Co-occurrences, other genes",
    "Evidence citations",
    "Citations or URLs that cannot be represented in evidence citations column",
    "Comment on evidence",
    "",
    "Test name or type",
    "Platform type",
    "Platform name",
    "Method",
    "Method purpose",
    "Method citations",
    "Software name and version",
    "Software purpose",
];

/// Positions of the populated `Variant.csv` columns.
mod variant_col {
    pub const LINKING_ID: usize = 1;
    pub const GENE_SYMBOL: usize = 2;
    pub const REFERENCE_SEQUENCE: usize = 3;
    pub const HGVS: usize = 4;
    pub const CIS_OR_TRANS: usize = 22;
    pub const VARIATION_IDENTIFIERS: usize = 23;
    pub const LOCATION: usize = 24;
    pub const ALTERNATE_DESIGNATIONS: usize = 25;
    pub const OFFICIAL_ALLELE_NAME: usize = 26;
    pub const URL: usize = 27;
    pub const CONDITION_ID_TYPE: usize = 29;
    pub const CONDITION_ID_VALUE: usize = 30;
    pub const CONDITION_CATEGORY: usize = 32;
    pub const CLINICAL_SIGNIFICANCE: usize = 35;
    pub const DATE_LAST_EVALUATED: usize = 36;
    pub const MODE_OF_INHERITANCE: usize = 39;
    pub const COLLECTION_METHOD: usize = 48;
    pub const ALLELE_ORIGIN: usize = 49;
    pub const AFFECTED_STATUS: usize = 50;
    pub const CLINICAL_FEATURES: usize = 52;
    pub const INDIVIDUALS_TESTED: usize = 60;
    pub const INDIVIDUALS_WITH_VARIANT: usize = 63;
    pub const CHROMOSOMES_WITH_VARIANT: usize = 64;
    pub const MOSAICISM: usize = 67;
    pub const HOMOZYGOTES: usize = 68;
    pub const SINGLE_HETEROZYGOTES: usize = 69;
    pub const COMPOUND_HETEROZYGOTES: usize = 70;
    pub const HEMIZYGOTES: usize = 71;
}

/// Positions of the populated `CaseData.csv` columns.
mod case_col {
    pub const LINKING_ID: usize = 0;
    pub const INDIVIDUAL_ID: usize = 1;
    pub const COLLECTION_METHOD: usize = 2;
    pub const ALLELE_ORIGIN: usize = 3;
    pub const AFFECTED_STATUS: usize = 4;
    pub const CLINICAL_FEATURES: usize = 6;
    pub const TISSUE: usize = 7;
    pub const SEX: usize = 8;
    /// Consanguinity is reported in the family history column.
    pub const FAMILY_HISTORY: usize = 13;
    pub const CONDITION_COMMENT: usize = 14;
    pub const PROBAND: usize = 16;
    pub const FAMILY_ID: usize = 17;
    pub const MOSAICISM: usize = 20;
    pub const ZYGOSITY: usize = 21;
    pub const TEST_NAME_OR_TYPE: usize = 28;
    pub const PLATFORM_TYPE: usize = 29;
}

/// The largest number of distinct methods of any group.
pub fn max_methods(groups: &[AggregateGroup]) -> usize {
    groups
        .iter()
        .map(|group| group.methods.len())
        .max()
        .unwrap_or(0)
}

/// The `Variant.csv` header with `max_methods` method blocks (at least one).
pub fn variant_header(max_methods: usize) -> Vec<&'static str> {
    let block = &VARIANT_COLUMNS[METHOD_OFFSET..METHOD_OFFSET + METHOD_BLOCK_LEN];
    let mut result = Vec::with_capacity(VARIANT_COLUMNS.len() + max_methods * METHOD_BLOCK_LEN);
    result.extend_from_slice(&VARIANT_COLUMNS[..METHOD_OFFSET]);
    for _ in 0..max_methods.max(1) {
        result.extend_from_slice(block);
    }
    result.extend_from_slice(&VARIANT_COLUMNS[METHOD_OFFSET + METHOD_BLOCK_LEN..]);
    result
}

/// The `Variant.csv` row of the group with 1-based `linking_id`.
pub fn variant_row(linking_id: usize, group: &AggregateGroup, width: usize) -> Vec<String> {
    use variant_col::*;

    let key = &group.key;
    let mut row = vec![String::new(); width];
    let mut set = |col: usize, value: String| row[col] = value;
    let opt = |value: &Option<String>| value.clone().unwrap_or_default();

    set(LINKING_ID, linking_id.to_string());
    set(GENE_SYMBOL, group.gene_symbols.iter().join(";"));
    set(REFERENCE_SEQUENCE, opt(&key.reference_sequence));
    set(HGVS, opt(&key.hgvs));
    set(CIS_OR_TRANS, opt(&key.cis_or_trans));
    set(VARIATION_IDENTIFIERS, group.variation_identifiers.iter().join(";"));
    set(LOCATION, opt(&key.location));
    set(ALTERNATE_DESIGNATIONS, group.alternate_designations.iter().join("|"));
    set(OFFICIAL_ALLELE_NAME, opt(&group.official_allele_name));
    set(URL, opt(&group.url));
    set(CONDITION_ID_TYPE, "OMIM".to_string());
    set(CONDITION_ID_VALUE, key.omim_ids());
    set(CONDITION_CATEGORY, opt(&key.condition_category));
    set(CLINICAL_SIGNIFICANCE, opt(&key.clinical_significance));
    set(
        DATE_LAST_EVALUATED,
        group
            .date_last_evaluated_or_min()
            .format("%Y-%m-%d")
            .to_string(),
    );
    set(MODE_OF_INHERITANCE, group.modes_of_inheritance.iter().join(";"));
    set(COLLECTION_METHOD, opt(&key.collection_method));
    set(ALLELE_ORIGIN, opt(&key.allele_origin));
    set(AFFECTED_STATUS, group.affected_status().to_string());
    set(CLINICAL_FEATURES, group.clinical_features.iter().join(";"));
    set(INDIVIDUALS_TESTED, group.len().to_string());
    set(
        INDIVIDUALS_WITH_VARIANT,
        group.zygosity.individuals_with_variant.to_string(),
    );
    set(
        CHROMOSOMES_WITH_VARIANT,
        group.zygosity.chromosomes_with_variant.to_string(),
    );
    set(MOSAICISM, group.mosaicism.to_string());
    set(HOMOZYGOTES, group.zygosity.homozygotes.to_string());
    set(
        SINGLE_HETEROZYGOTES,
        group.zygosity.single_heterozygotes.to_string(),
    );
    set(
        COMPOUND_HETEROZYGOTES,
        group.zygosity.compound_heterozygotes.to_string(),
    );
    set(HEMIZYGOTES, group.zygosity.hemizygotes.to_string());

    for (i, method) in group.methods.iter().enumerate() {
        let offset = METHOD_OFFSET + i * METHOD_BLOCK_LEN;
        set(offset, method.test_name_or_type.clone());
        set(offset + 1, method.platform_type.clone());
    }

    row
}

/// The `CaseData.csv` rows of the group with 1-based `linking_id`.
pub fn case_rows(linking_id: usize, group: &AggregateGroup) -> Vec<Vec<String>> {
    use case_col::*;

    let key = &group.key;
    group
        .members
        .iter()
        .map(|member| {
            let mut row = vec![String::new(); CASE_COLUMNS.len()];
            row[LINKING_ID] = linking_id.to_string();
            row[INDIVIDUAL_ID] = member.external_id.clone();
            row[COLLECTION_METHOD] = key.collection_method.clone().unwrap_or_default();
            row[ALLELE_ORIGIN] = key.allele_origin.clone().unwrap_or_default();
            row[AFFECTED_STATUS] = group.affected_status().to_string();
            row[CLINICAL_FEATURES] = member.clinical_features.iter().join(";");
            row[TISSUE] = key.tissue.clone().unwrap_or_default();
            row[SEX] = member.sex.clone();
            row[FAMILY_HISTORY] = member.consanguinity.to_string();
            row[CONDITION_COMMENT] = member.condition_comment.clone();
            row[PROBAND] = member.proband.to_string();
            row[FAMILY_ID] = member.kindred_id.clone();
            row[MOSAICISM] = member
                .mosaicism
                .as_ref()
                .map(Mosaicism::as_case_value)
                .unwrap_or_default()
                .to_string();
            row[ZYGOSITY] = member
                .zygosity
                .as_ref()
                .map(|zygosity| zygosity.as_str().to_string())
                .unwrap_or_default();
            if let Some(method) = &member.method {
                row[TEST_NAME_OR_TYPE] = method.test_name_or_type.clone();
                row[PLATFORM_TYPE] = method.platform_type.clone();
            }
            row
        })
        .collect()
}

/// Both submission tables, header rows included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tables {
    pub variants: Vec<Vec<String>>,
    pub cases: Vec<Vec<String>>,
}

impl Tables {
    /// Number of aggregate rows, excluding the header.
    pub fn variant_count(&self) -> usize {
        self.variants.len().saturating_sub(1)
    }

    /// Number of case rows, excluding the header.
    pub fn case_count(&self) -> usize {
        self.cases.len().saturating_sub(1)
    }
}

/// Lay out the finished groups; linking IDs follow the group order.
pub fn build_tables(groups: &[AggregateGroup]) -> Tables {
    let header = variant_header(max_methods(groups));
    let width = header.len();

    let mut variants = Vec::with_capacity(groups.len() + 1);
    variants.push(header.into_iter().map(str::to_string).collect());
    let mut cases = vec![CASE_COLUMNS.iter().map(|s| s.to_string()).collect()];
    for (i, group) in groups.iter().enumerate() {
        let linking_id = i + 1;
        variants.push(variant_row(linking_id, group, width));
        cases.extend(case_rows(linking_id, group));
    }

    Tables { variants, cases }
}

/// Write both tables to `output_dir`.
///
/// Both files are staged in temporary files and only moved into place once
/// both have been written completely.
pub fn write_tables<P: AsRef<Path>>(tables: &Tables, output_dir: P) -> Result<(), anyhow::Error> {
    let output_dir = output_dir.as_ref();
    std::fs::create_dir_all(output_dir).map_err(|e| {
        anyhow::anyhow!("could not create output directory {:?}: {}", output_dir, e)
    })?;

    let mut staged = Vec::new();
    for (name, rows) in [(VARIANT_FILE, &tables.variants), (CASE_FILE, &tables.cases)] {
        let path = output_dir.join(name);
        tracing::debug!("writing {} rows to {:?}", rows.len(), &path);
        let tmp = tempfile::NamedTempFile::new_in(output_dir)?;
        write_csv(&path, tmp.reopen()?, rows)
            .map_err(|e| anyhow::anyhow!("could not write {:?}: {}", &path, e))?;
        staged.push((tmp, path));
    }
    for (tmp, path) in staged {
        tmp.persist(&path)
            .map_err(|e| anyhow::anyhow!("could not move {:?} into place: {}", &path, e))?;
    }

    Ok(())
}

fn write_csv(path: &Path, file: std::fs::File, rows: &[Vec<String>]) -> Result<(), anyhow::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::CRLF)
        .from_writer(wrap_write_maybe_gz(path, file)?);
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}
