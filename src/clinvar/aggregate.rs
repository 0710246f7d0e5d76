//! Folding of per-patient variant observations into aggregate groups.
//!
//! Each observation is consumed exactly once: it contributes to the statistics
//! of the group its [`GroupingKey`] selects and becomes one [`CaseMember`] of
//! that group.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use indexmap::IndexMap;

use super::{inheritance, key::GroupingKey};
use crate::common::{min_date, parse_date, split_list};
use crate::registry::{PatientRecord, VariantObservation};

/// Zygosity of a variant in one individual.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Zygosity {
    SingleHeterozygote,
    CompoundHeterozygote,
    Homozygote,
    Hemizygote,
    /// Any other value, kept verbatim for the case data.
    Unrecognized(String),
}

impl Zygosity {
    /// Parse a stored zygosity, `None` for an empty value.
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "" => return None,
            "single heterozygote" => Zygosity::SingleHeterozygote,
            "compound heterozygote" => Zygosity::CompoundHeterozygote,
            "homozygote" => Zygosity::Homozygote,
            "hemizygote" => Zygosity::Hemizygote,
            other => Zygosity::Unrecognized(other.to_string()),
        })
    }

    pub fn as_str(&self) -> &str {
        match self {
            Zygosity::SingleHeterozygote => "single heterozygote",
            Zygosity::CompoundHeterozygote => "compound heterozygote",
            Zygosity::Homozygote => "homozygote",
            Zygosity::Hemizygote => "hemizygote",
            Zygosity::Unrecognized(value) => value,
        }
    }

    /// Number of chromosomes carrying the variant.
    pub fn chromosomes(&self) -> u32 {
        match self {
            Zygosity::Homozygote => 2,
            Zygosity::SingleHeterozygote
            | Zygosity::CompoundHeterozygote
            | Zygosity::Hemizygote => 1,
            Zygosity::Unrecognized(_) => 0,
        }
    }
}

/// Whether the variant was observed as mosaic in one individual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mosaicism {
    Yes,
    No,
    Unrecognized(String),
}

impl Mosaicism {
    /// Parse a stored mosaicism flag, `None` for an empty value.
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "" => return None,
            "yes" => Mosaicism::Yes,
            "no" => Mosaicism::No,
            other => Mosaicism::Unrecognized(other.to_string()),
        })
    }

    /// Value for the case data column; unrecognized values are left blank.
    pub fn as_case_value(&self) -> &'static str {
        match self {
            Mosaicism::Yes => "yes",
            Mosaicism::No => "no",
            Mosaicism::Unrecognized(_) => "",
        }
    }
}

/// Case/control status of a patient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseOrControl {
    Case,
    Control,
    Unrecognized(String),
}

impl CaseOrControl {
    pub fn parse(value: &str) -> Self {
        match value {
            "case" => CaseOrControl::Case,
            "control" => CaseOrControl::Control,
            other => CaseOrControl::Unrecognized(other.to_string()),
        }
    }

    /// The ClinVar "Affected status" of a group with this status.
    pub fn affected_status(status: Option<&Self>) -> &'static str {
        match status {
            Some(CaseOrControl::Case) => "yes",
            Some(CaseOrControl::Control) => "no",
            Some(CaseOrControl::Unrecognized(_)) | None => "unknown",
        }
    }
}

/// A test method; sorts by test name first, then platform type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Method {
    pub test_name_or_type: String,
    pub platform_type: String,
}

impl Method {
    /// The method of an observation, `None` if neither part is recorded.
    pub fn from_observation(observation: &VariantObservation) -> Option<Self> {
        let test_name_or_type = observation.get("test_name_or_type").unwrap_or_default();
        let platform_type = observation.get("platform_type").unwrap_or_default();
        if test_name_or_type.is_empty() && platform_type.is_empty() {
            None
        } else {
            Some(Self {
                test_name_or_type: test_name_or_type.to_string(),
                platform_type: platform_type.to_string(),
            })
        }
    }
}

/// Zygosity tallies of one group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZygosityCounts {
    pub individuals_with_variant: u32,
    pub chromosomes_with_variant: u32,
    pub single_heterozygotes: u32,
    pub compound_heterozygotes: u32,
    pub homozygotes: u32,
    pub hemizygotes: u32,
}

impl ZygosityCounts {
    /// Count one individual; unrecognized zygosities are not counted.
    pub fn count(&mut self, zygosity: &Zygosity) {
        let counter = match zygosity {
            Zygosity::SingleHeterozygote => &mut self.single_heterozygotes,
            Zygosity::CompoundHeterozygote => &mut self.compound_heterozygotes,
            Zygosity::Homozygote => &mut self.homozygotes,
            Zygosity::Hemizygote => &mut self.hemizygotes,
            Zygosity::Unrecognized(_) => return,
        };
        *counter += 1;
        self.individuals_with_variant += 1;
        self.chromosomes_with_variant += zygosity.chromosomes();
    }
}

/// Per-individual values written to the case data table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseMember {
    pub external_id: String,
    /// The individual's own clinical features.
    pub clinical_features: BTreeSet<String>,
    pub sex: String,
    /// `yes`, `no` or blank.
    pub consanguinity: &'static str,
    pub condition_comment: String,
    /// `yes`, `no` or blank.
    pub proband: &'static str,
    pub kindred_id: String,
    pub mosaicism: Option<Mosaicism>,
    pub zygosity: Option<Zygosity>,
    pub method: Option<Method>,
}

impl CaseMember {
    /// Derive the case values of one observation.
    pub fn new(patient: &PatientRecord, observation: &VariantObservation) -> Self {
        let nonempty = |name: &str| patient.get_nonempty(name).unwrap_or_default().to_string();
        Self {
            external_id: nonempty("external_id"),
            clinical_features: patient
                .get_nonempty("phenotype")
                .map(|value| split_list(value, '|').map(str::to_string).collect())
                .unwrap_or_default(),
            sex: nonempty("gender"),
            consanguinity: match patient.get("consanguinity") {
                Some("0") => "no",
                Some("1") => "yes",
                _ => "",
            },
            condition_comment: nonempty("diagnosis_notes"),
            proband: match patient.get_nonempty("subject_data_relationship") {
                Some(relationship) if relationship.to_lowercase() == "proband" => "yes",
                Some(_) => "no",
                None => "",
            },
            kindred_id: nonempty("kindred_id"),
            mosaicism: observation.get("mosaicism").and_then(Mosaicism::parse),
            zygosity: observation.get("zygosity").and_then(Zygosity::parse),
            method: Method::from_observation(observation),
        }
    }
}

/// All observations sharing one [`GroupingKey`] and their running statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateGroup {
    pub key: GroupingKey,
    /// Case values of the members, in order of arrival.
    pub members: Vec<CaseMember>,
    pub gene_symbols: BTreeSet<String>,
    pub variation_identifiers: BTreeSet<String>,
    pub alternate_designations: BTreeSet<String>,
    /// First non-empty value seen.
    pub official_allele_name: Option<String>,
    /// First non-empty value seen.
    pub url: Option<String>,
    /// Latest parseable evaluation date seen.
    pub date_last_evaluated: Option<NaiveDate>,
    pub modes_of_inheritance: BTreeSet<&'static str>,
    pub clinical_features: BTreeSet<String>,
    pub zygosity: ZygosityCounts,
    /// Number of members with mosaicism `yes`.
    pub mosaicism: u32,
    pub methods: BTreeSet<Method>,
}

impl AggregateGroup {
    /// An empty group for `key`.
    pub fn new(key: GroupingKey) -> Self {
        Self {
            key,
            ..Default::default()
        }
    }

    /// Fold one more observation into the group.
    pub fn fold(mut self, patient: &PatientRecord, observation: &VariantObservation) -> Self {
        self.add(patient, observation);
        self
    }

    /// In-place variant of [`AggregateGroup::fold`].
    pub fn add(&mut self, patient: &PatientRecord, observation: &VariantObservation) {
        let extend = |set: &mut BTreeSet<String>, value: Option<&str>, sep: char| {
            if let Some(value) = value {
                set.extend(split_list(value, sep).map(str::to_string));
            }
        };
        extend(
            &mut self.gene_symbols,
            observation.get_nonempty("gene_symbol"),
            ';',
        );
        extend(
            &mut self.variation_identifiers,
            observation.get_nonempty("variation_identifiers"),
            ';',
        );
        extend(
            &mut self.alternate_designations,
            observation.get_nonempty("alternate_designations"),
            '|',
        );
        if self.official_allele_name.is_none() {
            self.official_allele_name = observation
                .get_nonempty("official_allele_name")
                .map(str::to_string);
        }
        if self.url.is_none() {
            self.url = observation.get_nonempty("url").map(str::to_string);
        }

        // Unparseable dates are ignored.
        if let Some(date) = observation
            .get("date_last_evaluated")
            .and_then(parse_date)
        {
            if self.date_last_evaluated.map_or(true, |latest| date > latest) {
                self.date_last_evaluated = Some(date);
            }
        }

        if let Some(terms) = patient.get_nonempty("global_mode_of_inheritance") {
            self.modes_of_inheritance.extend(
                split_list(terms, '|').filter_map(|term| inheritance::mode_of_inheritance(term.trim())),
            );
        }

        let member = CaseMember::new(patient, observation);
        self.clinical_features
            .extend(member.clinical_features.iter().cloned());
        if member.mosaicism == Some(Mosaicism::Yes) {
            self.mosaicism += 1;
        }
        if let Some(zygosity) = &member.zygosity {
            self.zygosity.count(zygosity);
        }
        if let Some(method) = &member.method {
            self.methods.insert(method.clone());
        }
        self.members.push(member);
    }

    /// Number of observations in the group.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The ClinVar "Affected status" of the group.
    pub fn affected_status(&self) -> &'static str {
        let status = self.key.case_or_control.as_deref().map(CaseOrControl::parse);
        CaseOrControl::affected_status(status.as_ref())
    }

    /// The latest evaluation date, or `0001-01-01` if none could be parsed.
    pub fn date_last_evaluated_or_min(&self) -> NaiveDate {
        self.date_last_evaluated.unwrap_or_else(min_date)
    }
}

/// Buckets observations into groups, keeping groups in first-seen order.
#[derive(Debug, Default)]
pub struct Aggregator {
    groups: IndexMap<GroupingKey, AggregateGroup>,
    observations: usize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one observation of `patient`.
    pub fn push(&mut self, patient: &PatientRecord, observation: &VariantObservation) {
        let key = GroupingKey::build(patient, observation);
        self.groups
            .entry(key.clone())
            .or_insert_with(|| AggregateGroup::new(key))
            .add(patient, observation);
        self.observations += 1;
    }

    /// Number of groups so far.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of observations consumed so far.
    pub fn observations(&self) -> usize {
        self.observations
    }

    /// The finished groups in emission order.
    pub fn into_groups(self) -> Vec<AggregateGroup> {
        self.groups.into_values().collect()
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::registry::Fields;

    fn fields(items: &[(&str, &str)]) -> Fields {
        items.iter().copied().collect()
    }

    fn observation(hgvs: &str, extra: &[(&str, &str)]) -> Fields {
        let mut result = fields(&[("reference_sequence", "NM_000016.5"), ("hgvs", hgvs)]);
        for (name, value) in extra {
            result.insert(*name, *value);
        }
        result
    }

    fn fold_all(items: &[(Fields, Fields)]) -> AggregateGroup {
        let (patient, obs) = &items[0];
        items.iter().fold(
            AggregateGroup::new(GroupingKey::build(patient, obs)),
            |group, (patient, obs)| group.fold(patient, obs),
        )
    }

    #[rstest]
    #[case("single heterozygote", Some(Zygosity::SingleHeterozygote), 1)]
    #[case("compound heterozygote", Some(Zygosity::CompoundHeterozygote), 1)]
    #[case("homozygote", Some(Zygosity::Homozygote), 2)]
    #[case("hemizygote", Some(Zygosity::Hemizygote), 1)]
    #[case("Homozygote", Some(Zygosity::Unrecognized("Homozygote".into())), 0)]
    #[case("", None, 0)]
    fn zygosity_parse(
        #[case] value: &str,
        #[case] expected: Option<Zygosity>,
        #[case] chromosomes: u32,
    ) {
        let parsed = Zygosity::parse(value);
        assert_eq!(parsed, expected);
        assert_eq!(parsed.map(|z| z.chromosomes()).unwrap_or(0), chromosomes);
    }

    #[test]
    fn zygosity_arithmetic() {
        let patient = fields(&[]);
        let group = fold_all(&[
            (patient.clone(), observation("c.1A>G", &[("zygosity", "single heterozygote")])),
            (patient.clone(), observation("c.1A>G", &[("zygosity", "homozygote")])),
            (patient.clone(), observation("c.1A>G", &[("zygosity", "hemizygote")])),
            (patient.clone(), observation("c.1A>G", &[("zygosity", "unknown")])),
            (patient, observation("c.1A>G", &[])),
        ]);

        assert_eq!(
            group.zygosity,
            ZygosityCounts {
                individuals_with_variant: 3,
                chromosomes_with_variant: 4,
                single_heterozygotes: 1,
                compound_heterozygotes: 0,
                homozygotes: 1,
                hemizygotes: 1,
            }
        );
        assert_eq!(group.len(), 5);
        assert_eq!(
            group.members[3].zygosity,
            Some(Zygosity::Unrecognized("unknown".into()))
        );
        assert_eq!(group.members[4].zygosity, None);
    }

    #[test]
    fn set_unions_are_sorted_and_deduplicated() {
        let patient_a = fields(&[("phenotype", "HP:0001943|HP:0001250")]);
        let patient_b = fields(&[("phenotype", "HP:0001250|HP:0002240")]);
        let group = fold_all(&[
            (
                patient_a,
                observation(
                    "c.985A>G",
                    &[
                        ("gene_symbol", "ACADM;BRCA1"),
                        ("variation_identifiers", "rs77931234"),
                        ("alternate_designations", "K329E|p.Lys329Glu"),
                    ],
                ),
            ),
            (
                patient_b,
                observation(
                    "c.985A>G",
                    &[
                        ("gene_symbol", "ACADM"),
                        ("variation_identifiers", "rs77931234;VCV000003586"),
                        ("alternate_designations", "K304E"),
                    ],
                ),
            ),
        ]);

        let join = |set: &BTreeSet<String>| set.iter().cloned().collect::<Vec<_>>().join(",");
        assert_eq!(join(&group.gene_symbols), "ACADM,BRCA1");
        assert_eq!(join(&group.variation_identifiers), "VCV000003586,rs77931234");
        assert_eq!(join(&group.alternate_designations), "K304E,K329E,p.Lys329Glu");
        assert_eq!(join(&group.clinical_features), "HP:0001250,HP:0001943,HP:0002240");
        assert_eq!(
            join(&group.members[1].clinical_features),
            "HP:0001250,HP:0002240"
        );
    }

    #[test]
    fn official_allele_name_and_url_first_wins() {
        let patient = fields(&[]);
        let group = fold_all(&[
            (patient.clone(), observation("c.1A>G", &[("official_allele_name", "")])),
            (
                patient.clone(),
                observation("c.1A>G", &[("official_allele_name", "first"), ("url", "http://a")]),
            ),
            (
                patient,
                observation("c.1A>G", &[("official_allele_name", "second"), ("url", "http://b")]),
            ),
        ]);

        assert_eq!(group.official_allele_name.as_deref(), Some("first"));
        assert_eq!(group.url.as_deref(), Some("http://a"));
    }

    #[test]
    fn date_last_evaluated_takes_latest_parseable() {
        let patient = fields(&[]);
        let group = fold_all(&[
            (patient.clone(), observation("c.1A>G", &[("date_last_evaluated", "2015-06-01")])),
            (patient.clone(), observation("c.1A>G", &[("date_last_evaluated", "last spring")])),
            (patient.clone(), observation("c.1A>G", &[("date_last_evaluated", "03/07/2016")])),
            (patient, observation("c.1A>G", &[("date_last_evaluated", "2014-01-01")])),
        ]);

        assert_eq!(
            group.date_last_evaluated_or_min(),
            NaiveDate::from_ymd_opt(2016, 3, 7).unwrap()
        );
    }

    #[test]
    fn date_last_evaluated_falls_back_to_min_date() {
        let patient = fields(&[]);
        let group = fold_all(&[
            (patient.clone(), observation("c.1A>G", &[("date_last_evaluated", "unknown")])),
            (patient, observation("c.1A>G", &[])),
        ]);

        assert_eq!(group.date_last_evaluated, None);
        assert_eq!(
            group.date_last_evaluated_or_min().to_string(),
            "0001-01-01"
        );
    }

    #[test]
    fn modes_of_inheritance_are_mapped_and_deduplicated() {
        let group = fold_all(&[
            (
                fields(&[("global_mode_of_inheritance", "HP:0000007|HP:0000007|HP:9999999")]),
                observation("c.1A>G", &[]),
            ),
            (
                fields(&[("global_mode_of_inheritance", "HP:0000006")]),
                observation("c.1A>G", &[]),
            ),
        ]);

        assert_eq!(
            group.modes_of_inheritance.iter().copied().collect::<Vec<_>>(),
            vec![
                "Autosomal dominant inheritance",
                "Autosomal recessive inheritance"
            ]
        );
    }

    #[test]
    fn methods_require_one_nonempty_part() {
        let patient = fields(&[]);
        let group = fold_all(&[
            (patient.clone(), observation("c.1A>G", &[("test_name_or_type", "PCR")])),
            (
                patient.clone(),
                observation("c.1A>G", &[("test_name_or_type", ""), ("platform_type", "")]),
            ),
            (
                patient.clone(),
                observation("c.1A>G", &[("test_name_or_type", "NGS"), ("platform_type", "exome")]),
            ),
            (patient, observation("c.1A>G", &[("test_name_or_type", "PCR")])),
        ]);

        assert_eq!(
            group.methods.iter().cloned().collect::<Vec<_>>(),
            vec![
                Method {
                    test_name_or_type: "NGS".into(),
                    platform_type: "exome".into()
                },
                Method {
                    test_name_or_type: "PCR".into(),
                    platform_type: "".into()
                },
            ]
        );
        assert_eq!(group.members[1].method, None);
    }

    #[test]
    fn case_member_values() {
        let patient = fields(&[
            ("external_id", "FAM1-1"),
            ("gender", "F"),
            ("consanguinity", "0"),
            ("diagnosis_notes", "newborn screening"),
            ("subject_data_relationship", "Proband"),
            ("kindred_id", "FAM1"),
        ]);
        let obs = observation("c.1A>G", &[("mosaicism", "yes"), ("zygosity", "homozygote")]);

        let member = CaseMember::new(&patient, &obs);

        assert_eq!(
            member,
            CaseMember {
                external_id: "FAM1-1".into(),
                clinical_features: BTreeSet::new(),
                sex: "F".into(),
                consanguinity: "no",
                condition_comment: "newborn screening".into(),
                proband: "yes",
                kindred_id: "FAM1".into(),
                mosaicism: Some(Mosaicism::Yes),
                zygosity: Some(Zygosity::Homozygote),
                method: None,
            }
        );
    }

    #[rstest]
    #[case(&[("consanguinity", "1")], "yes", "")]
    #[case(&[("consanguinity", "true")], "", "")]
    #[case(&[("subject_data_relationship", "mother")], "", "no")]
    #[case(&[("subject_data_relationship", "")], "", "")]
    fn case_member_flags(
        #[case] patient: &[(&str, &str)],
        #[case] consanguinity: &str,
        #[case] proband: &str,
    ) {
        let member = CaseMember::new(&fields(patient), &fields(&[]));
        assert_eq!(member.consanguinity, consanguinity);
        assert_eq!(member.proband, proband);
    }

    #[test]
    fn mosaicism_count_and_case_value() {
        let patient = fields(&[]);
        let group = fold_all(&[
            (patient.clone(), observation("c.1A>G", &[("mosaicism", "yes")])),
            (patient.clone(), observation("c.1A>G", &[("mosaicism", "no")])),
            (patient.clone(), observation("c.1A>G", &[("mosaicism", "maybe")])),
            (patient, observation("c.1A>G", &[("mosaicism", "yes")])),
        ]);

        assert_eq!(group.mosaicism, 2);
        let values = group
            .members
            .iter()
            .map(|m| m.mosaicism.as_ref().map(Mosaicism::as_case_value).unwrap_or(""))
            .collect::<Vec<_>>();
        assert_eq!(values, vec!["yes", "no", "", "yes"]);
    }

    #[rstest]
    #[case(Some("case"), "yes")]
    #[case(Some("control"), "no")]
    #[case(Some("Case"), "unknown")]
    #[case(None, "unknown")]
    fn affected_status(#[case] case_or_control: Option<&str>, #[case] expected: &str) {
        let group = AggregateGroup::new(GroupingKey {
            case_or_control: case_or_control.map(str::to_string),
            ..Default::default()
        });
        assert_eq!(group.affected_status(), expected);
    }

    #[test]
    fn aggregator_groups_in_first_seen_order() {
        let case = fields(&[("case_or_control", "case"), ("omim_id", "201450")]);
        let control = fields(&[("case_or_control", "control"), ("omim_id", "201450")]);

        let mut aggregator = Aggregator::new();
        aggregator.push(&case, &observation("c.985A>G", &[("zygosity", "homozygote")]));
        aggregator.push(&case, &observation("c.199T>C", &[]));
        aggregator.push(&control, &observation("c.985A>G", &[]));
        aggregator.push(
            &case,
            &observation("c.985A>G", &[("zygosity", "single heterozygote")]),
        );

        assert_eq!(aggregator.len(), 3);
        assert_eq!(aggregator.observations(), 4);

        let groups = aggregator.into_groups();
        let summary = groups
            .iter()
            .map(|g| {
                (
                    g.key.hgvs.clone().unwrap_or_default(),
                    g.key.case_or_control.clone().unwrap_or_default(),
                    g.len(),
                )
            })
            .collect::<Vec<_>>();
        assert_eq!(
            summary,
            vec![
                ("c.985A>G".to_string(), "case".to_string(), 2),
                ("c.199T>C".to_string(), "case".to_string(), 1),
                ("c.985A>G".to_string(), "control".to_string(), 1),
            ]
        );
        assert_eq!(groups[0].zygosity.chromosomes_with_variant, 3);
    }

    #[test]
    fn fold_is_pure_over_inputs() {
        let patient = fields(&[("case_or_control", "case")]);
        let obs = observation("c.1A>G", &[("zygosity", "homozygote")]);
        let empty = AggregateGroup::new(GroupingKey::build(&patient, &obs));

        let once = empty.clone().fold(&patient, &obs);
        let again = empty.fold(&patient, &obs);

        assert_eq!(once, again);
        assert_eq!(once.zygosity.homozygotes, 1);
    }
}
