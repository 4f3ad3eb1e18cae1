pub const DOMAIN_COMPOUND: &str = "compound";
pub const DOMAIN_SUBSTANCE: &str = "substance";

pub const NAMESPACE_NAME: &str = "name";
pub const NAMESPACE_CID: &str = "cid";

pub const OUTPUT_JSON: &str = "JSON";
pub const RECORD_TYPE_3D: &str = "3d";

pub const PROP_IUPAC_NAME: &str = "IUPACName";
pub const PROP_MOLECULAR_FORMULA: &str = "MolecularFormula";
pub const PROP_MOLECULAR_WEIGHT: &str = "MolecularWeight";
pub const PROP_MONOISOTOPIC_MASS: &str = "MonoisotopicMass";
pub const PROP_CHARGE: &str = "Charge";

pub const RECORD_PROPERTIES: [&str; 5] = [
    PROP_IUPAC_NAME,
    PROP_MOLECULAR_FORMULA,
    PROP_MOLECULAR_WEIGHT,
    PROP_MONOISOTOPIC_MASS,
    PROP_CHARGE,
];

#[must_use]
pub fn property_list() -> String {
    RECORD_PROPERTIES.join(",")
}
