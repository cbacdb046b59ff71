//! IRIs used by stored models and their metadata.

pub const OWL_HAS_VALUE: &str = "http://www.w3.org/2002/07/owl#hasValue";

pub const XSD_HEX_BINARY: &str = "http://www.w3.org/2001/XMLSchema#hexBinary";
pub const XSD_BASE64_BINARY: &str = "http://www.w3.org/2001/XMLSchema#base64Binary";
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";

pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";

pub const DCTERMS_CREATED: &str = "http://purl.org/dc/terms/created";

pub const PALLET_NS: &str = "https://pallet.dev/ns#";
pub const PALLET_ALGORITHM: &str = "https://pallet.dev/ns#algorithm";
pub const PALLET_LABEL_COUNT: &str = "https://pallet.dev/ns#labelCount";
