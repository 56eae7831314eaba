//! Predecessor reference checks through the write path

use crate::support::{
    assert_created, assert_rejected, constants, patient_with_mrn, seed_chain, AppointmentBuilder,
    ImagingStudyBuilder, ServiceRequestBuilder, TestApp,
};
use ris_models::{ResourceKind, StoreId};
use serde_json::json;

#[tokio::test]
async fn appointment_for_missing_service_request_is_rejected() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let outcome = app
        .create(
            ResourceKind::Appointment,
            AppointmentBuilder::for_service_request(&StoreId::new().to_string()).build(),
        )
        .await?;

    assert_rejected(&outcome, "serviceRequestNotFound");
    assert_eq!(app.count(ResourceKind::Appointment), 0);
    Ok(())
}

#[tokio::test]
async fn appointment_requires_active_or_completed_request() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let patient = app
        .create_ok(ResourceKind::Patient, patient_with_mrn("SR-STATE"))
        .await?;

    for (status, accepted) in [
        ("draft", false),
        ("on-hold", false),
        ("revoked", false),
        ("active", true),
        ("completed", true),
    ] {
        let request = app
            .create_ok(
                ResourceKind::ServiceRequest,
                ServiceRequestBuilder::for_patient(&patient)
                    .status(status)
                    .build(),
            )
            .await?;
        let outcome = app
            .create(
                ResourceKind::Appointment,
                AppointmentBuilder::for_service_request(&request).build(),
            )
            .await?;

        if accepted {
            assert_created(&outcome);
        } else {
            assert_rejected(&outcome, "serviceRequestNotActive");
        }
    }
    Ok(())
}

#[tokio::test]
async fn only_hyphenated_ids_resolve() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let patient = app
        .create_ok(ResourceKind::Patient, patient_with_mrn("UUID-FORMS"))
        .await?;
    let request = app
        .create_ok(
            ResourceKind::ServiceRequest,
            ServiceRequestBuilder::for_patient(&patient).build(),
        )
        .await?;
    let uuid = *StoreId::parse(&request)?.as_uuid();

    // The ServiceRequest exists, but these spellings are not store ids
    for spelling in [
        uuid.urn().to_string(),
        uuid.braced().to_string(),
        uuid.simple().to_string(),
    ] {
        let outcome = app
            .create(
                ResourceKind::Appointment,
                AppointmentBuilder::with_reference(format!("ServiceRequest/{spelling}")).build(),
            )
            .await?;
        assert_rejected(&outcome, "invalidReferenceId");
    }
    assert_eq!(app.count(ResourceKind::Appointment), 0);
    Ok(())
}

#[tokio::test]
async fn compatible_statuses_are_configurable() -> anyhow::Result<()> {
    let app = TestApp::new_with_config(|config| {
        config.integrity.compatible_service_request_statuses = vec!["active".to_string()];
    })
    .await?;
    let patient = app
        .create_ok(ResourceKind::Patient, patient_with_mrn("CFG"))
        .await?;
    let completed = app
        .create_ok(
            ResourceKind::ServiceRequest,
            ServiceRequestBuilder::for_patient(&patient)
                .status("completed")
                .build(),
        )
        .await?;

    let outcome = app
        .create(
            ResourceKind::Appointment,
            AppointmentBuilder::for_service_request(&completed).build(),
        )
        .await?;
    assert_rejected(&outcome, "serviceRequestNotActive");
    Ok(())
}

#[tokio::test]
async fn malformed_references_are_distinguished_from_bad_ids() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let id = StoreId::new();

    let cases = [
        (format!("Appointment/{id}"), "invalidServiceRequestReference"),
        (id.to_string(), "invalidServiceRequestReference"),
        ("ServiceRequest/undefined".to_string(), "invalidReferenceId"),
        ("ServiceRequest/".to_string(), "invalidReferenceId"),
    ];
    for (reference, tag) in cases {
        let outcome = app
            .create(
                ResourceKind::Appointment,
                AppointmentBuilder::with_reference(reference.clone()).build(),
            )
            .await?;
        assert_rejected(&outcome, tag);
    }

    let outcome = app
        .create(
            ResourceKind::Appointment,
            json!({"resourceType": "Appointment", "status": "booked"}),
        )
        .await?;
    assert_rejected(&outcome, "invalidServiceRequestReference");

    let outcome = app
        .create(
            ResourceKind::Appointment,
            json!({"basedOn": {"reference": format!("ServiceRequest/{id}")}}),
        )
        .await?;
    assert_rejected(&outcome, "invalidServiceRequestReference");
    Ok(())
}

#[tokio::test]
async fn service_request_subject_must_exist() -> anyhow::Result<()> {
    let app = TestApp::new().await?;

    let outcome = app
        .create(
            ResourceKind::ServiceRequest,
            ServiceRequestBuilder::for_patient(&StoreId::new().to_string()).build(),
        )
        .await?;
    assert_rejected(&outcome, "patientNotFound");

    let outcome = app
        .create(
            ResourceKind::ServiceRequest,
            ServiceRequestBuilder::for_patient_identifier(constants::MRN_SYSTEM, "ghost").build(),
        )
        .await?;
    assert_rejected(&outcome, "patientNotFound");

    let outcome = app
        .create(
            ResourceKind::ServiceRequest,
            json!({"status": "active", "intent": "order", "subject": {"display": "Jane"}}),
        )
        .await?;
    assert_rejected(&outcome, "invalidPatientReference");
    assert_eq!(app.count(ResourceKind::ServiceRequest), 0);
    Ok(())
}

#[tokio::test]
async fn identifier_subject_is_stored_as_canonical_reference() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let patient = app
        .create_ok(ResourceKind::Patient, patient_with_mrn("CANON"))
        .await?;

    let request = app
        .create_ok(
            ResourceKind::ServiceRequest,
            ServiceRequestBuilder::for_patient_identifier(constants::MRN_SYSTEM, "CANON")
                .build(),
        )
        .await?;

    let stored = app
        .state
        .queries
        .get_by_id(ResourceKind::ServiceRequest, &request)
        .await?
        .found()
        .expect("stored request");
    assert_eq!(
        stored["subject"]["reference"],
        json!(format!("Patient/{patient}"))
    );
    Ok(())
}

#[tokio::test]
async fn imaging_study_requires_existing_appointment() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let (_, _, appointment) = seed_chain(&app, "IS-REF").await?;

    let outcome = app
        .create(
            ResourceKind::ImagingStudy,
            ImagingStudyBuilder::for_appointment(&StoreId::new().to_string()).build(),
        )
        .await?;
    assert_rejected(&outcome, "appointmentNotFound");

    let outcome = app
        .create(
            ResourceKind::ImagingStudy,
            json!({
                "started": "2024-05-10T09:05:00Z",
                "basedOn": [{"reference": format!("ServiceRequest/{appointment}")}]
            }),
        )
        .await?;
    assert_rejected(&outcome, "invalidAppointmentReference");

    let id = app
        .create_ok(
            ResourceKind::ImagingStudy,
            ImagingStudyBuilder::for_appointment(&appointment).build(),
        )
        .await?;
    assert!(!id.is_empty());
    Ok(())
}

#[tokio::test]
async fn diagnostic_reports_are_loosely_linked() -> anyhow::Result<()> {
    let app = TestApp::new().await?;

    // No predecessor check: the referenced request does not exist
    let outcome = app
        .create(
            ResourceKind::DiagnosticReport,
            crate::support::final_report(&StoreId::new().to_string()),
        )
        .await?;
    assert_created(&outcome);

    let outcome = app
        .create(
            ResourceKind::DiagnosticReport,
            json!({"status": "final", "code": {}}),
        )
        .await?;
    assert!(outcome.tag().starts_with("errorValidating:"));
    Ok(())
}
