use crate::support::{
    assert_status, constants, final_report, patient_with_demographics, patient_with_mrn,
    seed_chain, ImagingStudyBuilder, PatientBuilder, ServiceRequestBuilder, TestApp,
};
use axum::http::{Method, StatusCode};
use ris_models::{ResourceKind, StoreId};
use ris_server::db::DocumentStore;
use serde_json::{json, Value};

#[tokio::test]
async fn patient_by_identifier() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let id = app
        .create_ok(ResourceKind::Patient, patient_with_mrn("LOOKUP-1"))
        .await?;

    let (status, body) = app
        .request_json(Method::GET, "/patient?system=MRN&value=LOOKUP-1", None)
        .await?;
    assert_status(status, StatusCode::OK, "known identifier");
    assert_eq!(body["resource"]["id"], id);

    let (status, body) = app
        .request_json(Method::GET, "/patient?system=MRN&value=LOOKUP-2", None)
        .await?;
    assert_status(status, StatusCode::NOT_FOUND, "unknown identifier");
    assert_eq!(body["status"], "notFound");
    Ok(())
}

#[tokio::test]
async fn identifier_query_needs_system_and_value() -> anyhow::Result<()> {
    let app = TestApp::new().await?;

    for (path, tag) in [
        ("/patient", "missingRequiredField:system"),
        ("/patient?value=123", "missingRequiredField:system"),
        ("/servicerequest?system=ACC", "missingRequiredField:value"),
        ("/servicerequest?system=ACC&value=", "missingRequiredField:value"),
    ] {
        let (status, body) = app.request_json(Method::GET, path, None).await?;
        assert_status(status, StatusCode::BAD_REQUEST, path);
        assert_eq!(body["status"], tag, "{path}");
    }
    Ok(())
}

#[tokio::test]
async fn service_request_by_accession_number() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let patient = app
        .create_ok(ResourceKind::Patient, patient_with_mrn("ACC-P"))
        .await?;
    let request = app
        .create_ok(
            ResourceKind::ServiceRequest,
            ServiceRequestBuilder::for_patient(&patient)
                .identifier(constants::ACCESSION_SYSTEM, "A-2024-0042")
                .build(),
        )
        .await?;

    let path = "/servicerequest?system=http%3A%2F%2Fris.example.org%2Faccession&value=A-2024-0042";
    let (status, body) = app.request_json(Method::GET, path, None).await?;
    assert_status(status, StatusCode::OK, "accession lookup");
    assert_eq!(body["resource"]["id"], request);
    Ok(())
}

#[tokio::test]
async fn service_requests_for_patient() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let (patient, first, _) = seed_chain(&app, "LIST-1").await?;
    let second = app
        .create_ok(
            ResourceKind::ServiceRequest,
            ServiceRequestBuilder::for_patient(&patient).build(),
        )
        .await?;
    let (other_patient, _, _) = seed_chain(&app, "LIST-2").await?;

    let (status, body) = app
        .request_json(Method::GET, &format!("/servicerequest/patient/{patient}"), None)
        .await?;
    assert_status(status, StatusCode::OK, "list by patient");
    assert_eq!(body["status"], "success");
    assert_eq!(body["count"], 2);
    let ids: Vec<&str> = body["resources"]
        .as_array()
        .map(|items| items.iter().filter_map(|r| r["id"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(ids, vec![first.as_str(), second.as_str()]);

    // A patient without requests is an empty list, not a miss
    let lonely = app
        .create_ok(
            ResourceKind::Patient,
            patient_with_demographics("Moreau", "Elise", "1959-09-09"),
        )
        .await?;
    let (status, body) = app
        .request_json(Method::GET, &format!("/servicerequest/patient/{lonely}"), None)
        .await?;
    assert_status(status, StatusCode::OK, "empty list");
    assert_eq!(body["count"], 0);
    assert_eq!(body["resources"], json!([]));
    assert_ne!(lonely, other_patient);
    Ok(())
}

#[tokio::test]
async fn service_requests_for_patient_identifier() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let patient = app
        .create_ok(
            ResourceKind::Patient,
            PatientBuilder::new()
                .identifier("http://hospital.example.org/mrn", "H-77")
                .build(),
        )
        .await?;
    let request = app
        .create_ok(
            ResourceKind::ServiceRequest,
            ServiceRequestBuilder::for_patient(&patient).build(),
        )
        .await?;
    seed_chain(&app, "OTHER-PATIENT").await?;

    let path = "/servicerequest/patient/http%3A%2F%2Fhospital.example.org%2Fmrn/H-77";
    let (status, body) = app.request_json(Method::GET, path, None).await?;
    assert_status(status, StatusCode::OK, "requests by identifier");
    assert_eq!(body["count"], 1);
    assert_eq!(body["resources"][0]["id"], request);

    let (status, body) = app
        .request_json(Method::GET, "/servicerequest/patient/MRN/NOBODY", None)
        .await?;
    assert_status(status, StatusCode::NOT_FOUND, "unknown patient");
    assert_eq!(body["status"], "notFound");
    Ok(())
}

#[tokio::test]
async fn study_and_report_by_identifier() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let (_, service_request, appointment) = seed_chain(&app, "IDENT-IS").await?;
    let study = app
        .create_ok(
            ResourceKind::ImagingStudy,
            ImagingStudyBuilder::for_appointment(&appointment)
                .identifier("urn:dicom:uid", "urn:oid:1.2.840.99")
                .build(),
        )
        .await?;
    let mut report = final_report(&service_request);
    report["identifier"] = json!([{"system": "RPT", "value": "R-9"}]);
    let report = app.create_ok(ResourceKind::DiagnosticReport, report).await?;

    for (path, id) in [
        (
            "/imagingstudy?system=urn:dicom:uid&value=urn:oid:1.2.840.99",
            &study,
        ),
        ("/diagnosticreport?system=RPT&value=R-9", &report),
    ] {
        let (status, body) = app.request_json(Method::GET, path, None).await?;
        assert_status(status, StatusCode::OK, path);
        assert_eq!(body["resource"]["id"], id.as_str(), "{path}");
    }

    let (status, body) = app
        .request_json(Method::GET, "/diagnosticreport?system=RPT&value=R-10", None)
        .await?;
    assert_status(status, StatusCode::NOT_FOUND, "unknown report");
    assert_eq!(body["status"], "notFound");

    let (status, body) = app
        .request_json(Method::GET, "/imagingstudy?value=urn:oid:1.2.840.99", None)
        .await?;
    assert_status(status, StatusCode::BAD_REQUEST, "no system");
    assert_eq!(body["status"], "missingRequiredField:system");

    let (status, _, _) = app
        .request(Method::GET, "/appointment?system=MRN&value=IDENT-IS", None)
        .await?;
    assert_status(status, StatusCode::METHOD_NOT_ALLOWED, "appointment identifier");
    Ok(())
}

#[tokio::test]
async fn imaging_study_search_filters() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let (patient, _, appointment) = seed_chain(&app, "SEARCH-IS").await?;
    let study = app
        .create_ok(
            ResourceKind::ImagingStudy,
            ImagingStudyBuilder::for_appointment(&appointment)
                .subject(&patient)
                .modality(json!([{
                    "system": "http://dicom.nema.org/resources/ontology/DCM",
                    "code": "MR"
                }]))
                .build(),
        )
        .await?;
    let (_, _, other_appointment) = seed_chain(&app, "SEARCH-IS-2").await?;
    app.create_ok(
        ResourceKind::ImagingStudy,
        ImagingStudyBuilder::for_appointment(&other_appointment).build(),
    )
    .await?;

    for (query, expected) in [
        (format!("patient={patient}&modality=MR"), 1),
        (format!("appointment={appointment}&status=registered"), 1),
        (format!("patient={patient}&modality=CT"), 0),
        ("modality=OT".to_string(), 1),
        (String::new(), 2),
    ] {
        let path = format!("/imagingstudy/search?{query}");
        let (status, body) = app.request_json(Method::GET, &path, None).await?;
        assert_status(status, StatusCode::OK, &path);
        assert_eq!(body["count"], expected, "{path}");
        if expected == 1 && query.contains("MR") {
            assert_eq!(body["resources"][0]["id"], study);
        }
    }

    let (status, body) = app
        .request_json(Method::GET, "/imagingstudy/search?appointment=undefined", None)
        .await?;
    assert_status(status, StatusCode::BAD_REQUEST, "bad appointment id");
    assert_eq!(body["status"], "invalidReferenceId");
    Ok(())
}

#[tokio::test]
async fn appointments_for_service_request() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let (_, service_request, appointment) = seed_chain(&app, "APPT-LIST").await?;

    let (status, body) = app
        .request_json(
            Method::GET,
            &format!("/appointment/service-request/{service_request}"),
            None,
        )
        .await?;
    assert_status(status, StatusCode::OK, "appointments by request");
    assert_eq!(body["count"], 1);
    assert_eq!(body["resources"][0]["id"], appointment);

    let (status, body) = app
        .request_json(Method::GET, "/appointment/service-request/undefined", None)
        .await?;
    assert_status(status, StatusCode::BAD_REQUEST, "undefined id");
    assert_eq!(body["status"], "invalidReferenceId");
    Ok(())
}

#[tokio::test]
async fn appointment_list_includes_legacy_references() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let request = StoreId::new();
    let Value::Object(legacy) = json!({
        "resourceType": "Appointment",
        "status": "booked",
        "basedOn": [{"reference": request.to_string()}]
    }) else {
        anyhow::bail!("legacy body is not an object");
    };
    app.memory
        .insert_one(ResourceKind::Appointment.collection(), legacy)
        .await?;

    let (status, body) = app
        .request_json(
            Method::GET,
            &format!("/appointment/service-request/{request}"),
            None,
        )
        .await?;
    assert_status(status, StatusCode::OK, "legacy list");
    assert_eq!(body["count"], 1);
    Ok(())
}

#[tokio::test]
async fn check_duplicate_reports_without_writing() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let candidate = patient_with_demographics("Adeyemi", "Tunde", "1982-02-02");

    let (status, body) = app
        .request_json(Method::POST, "/patient/check-duplicate", Some(&candidate))
        .await?;
    assert_status(status, StatusCode::OK, "unique candidate");
    assert_eq!(body, json!({"status": "success", "isDuplicate": false}));
    assert_eq!(app.count(ResourceKind::Patient), 0);

    let id = app.create_ok(ResourceKind::Patient, candidate.clone()).await?;
    let (status, body) = app
        .request_json(Method::POST, "/patient/check-duplicate", Some(&candidate))
        .await?;
    assert_status(status, StatusCode::OK, "duplicate candidate");
    assert_eq!(body["status"], "exists");
    assert_eq!(body["isDuplicate"], true);
    assert_eq!(body["existingId"], id);
    assert_eq!(body["matchType"], "demographics");
    assert_eq!(app.count(ResourceKind::Patient), 1);

    let (status, body) = app
        .request_json(
            Method::POST,
            "/patient/check-duplicate",
            Some(&json!({"resourceType": "ServiceRequest"})),
        )
        .await?;
    assert_status(status, StatusCode::BAD_REQUEST, "wrong resource type");
    assert!(body["status"]
        .as_str()
        .is_some_and(|tag| tag.starts_with("errorValidating:")));
    Ok(())
}
