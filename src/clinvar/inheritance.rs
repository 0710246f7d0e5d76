//! Mapping of HPO mode-of-inheritance terms to ClinVar wording.

/// The HPO terms understood as modes of inheritance.
const MODES_OF_INHERITANCE: &[(&str, &str)] = &[
    ("HP:0003745", "Sporadic"),
    ("HP:0000006", "Autosomal dominant inheritance"),
    ("HP:0001470", "Sex-limited autosomal dominant"),
    ("HP:0001475", "Male-limited autosomal dominant"),
    ("HP:0001444", "Autosomal dominant somatic cell mutation"),
    ("HP:0001452", "Autosomal dominant contiguous gene syndrome"),
    ("HP:0000007", "Autosomal recessive inheritance"),
    ("HP:0010985", "Gonosomal inheritance"),
    ("HP:0001417", "X-linked inheritance"),
    ("HP:0001423", "X-linked dominant inheritance"),
    ("HP:0001419", "X-linked recessive inheritance"),
    ("HP:0001450", "Y-linked inheritance"),
    ("HP:0001426", "Multifactorial inheritance"),
    ("HP:0010984", "Digenic inheritance"),
    ("HP:0010983", "Oligogenic inheritance"),
    ("HP:0010982", "Polygenic inheritance"),
    ("HP:0001427", "Mitochondrial inheritance"),
];

/// Return the ClinVar mode of inheritance for an HPO term, if it is one.
pub fn mode_of_inheritance(term_id: &str) -> Option<&'static str> {
    MODES_OF_INHERITANCE
        .iter()
        .find(|(id, _)| *id == term_id)
        .map(|(_, label)| *label)
}
