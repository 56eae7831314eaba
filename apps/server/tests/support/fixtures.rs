use super::builders::PatientBuilder;
use serde_json::{json, Value};

/// Common test constants
pub mod constants {
    pub const MRN_SYSTEM: &str = "MRN";
    pub const SSN_SYSTEM: &str = "urn:oid:2.16.840.1.113883.4.1";
    pub const ACCESSION_SYSTEM: &str = "http://ris.example.org/accession";
}

/// Patient identified only by MRN
pub fn patient_with_mrn(mrn: &str) -> Value {
    PatientBuilder::new()
        .identifier(constants::MRN_SYSTEM, mrn)
        .build()
}

/// Patient without identifiers, matched by demographics only
pub fn patient_with_demographics(family: &str, given: &str, birth_date: &str) -> Value {
    PatientBuilder::new()
        .family(family)
        .given(given)
        .birth_date(birth_date)
        .build()
}

pub fn final_report(service_request_id: &str) -> Value {
    json!({
        "resourceType": "DiagnosticReport",
        "status": "final",
        "code": { "text": "CT head report" },
        "basedOn": [{ "reference": format!("ServiceRequest/{service_request_id}") }],
        "conclusion": "No acute intracranial abnormality."
    })
}
