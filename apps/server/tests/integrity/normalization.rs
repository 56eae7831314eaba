//! Defaults and date handling applied before insert

use crate::support::{
    assert_rejected, patient_with_mrn, seed_chain, AppointmentBuilder, ImagingStudyBuilder,
    ServiceRequestBuilder, TestApp,
};
use ris_models::ResourceKind;
use serde_json::{json, Value};

async fn stored(app: &TestApp, kind: ResourceKind, id: &str) -> anyhow::Result<Value> {
    app.state
        .queries
        .get_by_id(kind, id)
        .await?
        .found()
        .ok_or_else(|| anyhow::anyhow!("{kind} {id} was not stored"))
}

/// A fresh active ServiceRequest, ready for an Appointment.
async fn open_request(app: &TestApp, mrn: &str) -> anyhow::Result<String> {
    let patient = app
        .create_ok(ResourceKind::Patient, patient_with_mrn(mrn))
        .await?;
    app.create_ok(
        ResourceKind::ServiceRequest,
        ServiceRequestBuilder::for_patient(&patient).build(),
    )
    .await
}

#[tokio::test]
async fn service_request_gets_occurrence_time() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let request = open_request(&app, "OCC").await?;

    let body = stored(&app, ResourceKind::ServiceRequest, &request).await?;
    let occurrence = body["occurrenceDateTime"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("occurrenceDateTime missing"))?;
    assert!(chrono::DateTime::parse_from_rfc3339(occurrence).is_ok(), "{occurrence}");
    Ok(())
}

#[tokio::test]
async fn appointment_defaults_status_and_participant() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let request = open_request(&app, "APPT-DEF").await?;

    let id = app
        .create_ok(
            ResourceKind::Appointment,
            AppointmentBuilder::for_service_request(&request).build(),
        )
        .await?;

    let body = stored(&app, ResourceKind::Appointment, &id).await?;
    assert_eq!(body["status"], "booked");
    assert_eq!(
        body["participant"],
        json!([{"actor": {"display": "Unassigned"}, "status": "needs-action"}])
    );
    assert_eq!(body["start"], "2024-05-10T09:00:00Z");
    assert_eq!(body["end"], "2024-05-10T09:30:00Z");
    assert_eq!(body["basedOn"][0]["reference"], format!("ServiceRequest/{request}"));
    Ok(())
}

#[tokio::test]
async fn supplied_participants_are_kept() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let (_, _, appointment) = seed_chain(&app, "PART").await?;

    let body = stored(&app, ResourceKind::Appointment, &appointment).await?;
    assert_eq!(body["participant"][0]["actor"]["display"], "Dr. Osei");
    Ok(())
}

#[tokio::test]
async fn date_only_appointment_spans_one_day() -> anyhow::Result<()> {
    let app = TestApp::new().await?;

    let request = open_request(&app, "DAY-1").await?;
    let id = app
        .create_ok(
            ResourceKind::Appointment,
            AppointmentBuilder::for_service_request(&request)
                .without_times()
                .start("2024-05-10")
                .build(),
        )
        .await?;
    let body = stored(&app, ResourceKind::Appointment, &id).await?;
    assert_eq!(body["start"], "2024-05-10");
    assert_eq!(body["end"], "2024-05-10");

    let request = open_request(&app, "DAY-2").await?;
    let outcome = app
        .create(
            ResourceKind::Appointment,
            AppointmentBuilder::for_service_request(&request)
                .start("2024-05-10")
                .end("2024-05-11")
                .build(),
        )
        .await?;
    assert_rejected(&outcome, "invalidAppointmentDuration");
    Ok(())
}

#[tokio::test]
async fn appointment_times_are_checked() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let request = open_request(&app, "TIMES").await?;

    let outcome = app
        .create(
            ResourceKind::Appointment,
            AppointmentBuilder::for_service_request(&request)
                .start("2024-05-10T11:00:00Z")
                .end("2024-05-10T10:59:00Z")
                .build(),
        )
        .await?;
    assert_rejected(&outcome, "invalidAppointmentDuration");

    let outcome = app
        .create(
            ResourceKind::Appointment,
            AppointmentBuilder::for_service_request(&request)
                .start("next tuesday")
                .build(),
        )
        .await?;
    assert_rejected(&outcome, "invalidDateTimeFormat");

    // The slot is still free after both rejections
    let id = app
        .create_ok(
            ResourceKind::Appointment,
            AppointmentBuilder::for_service_request(&request)
                .without_times()
                .end("2024-05-10T08:15:00")
                .build(),
        )
        .await?;
    let body = stored(&app, ResourceKind::Appointment, &id).await?;
    assert_eq!(body["start"], "2024-05-10T08:15:00Z");
    assert_eq!(body["end"], "2024-05-10T08:15:00Z");
    Ok(())
}

#[tokio::test]
async fn imaging_study_defaults() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let (_, _, appointment) = seed_chain(&app, "IS-DEF").await?;

    let id = app
        .create_ok(
            ResourceKind::ImagingStudy,
            ImagingStudyBuilder::for_appointment(&appointment)
                .modality(json!([{"system": "http://dicom.nema.org/resources/ontology/DCM", "code": "CT"}]))
                .build(),
        )
        .await?;

    let body = stored(&app, ResourceKind::ImagingStudy, &id).await?;
    assert_eq!(body["status"], "registered");
    assert_eq!(body["started"], "2024-05-10T09:05:00Z");
    assert_eq!(body["numberOfSeries"], 1);
    assert_eq!(body["numberOfInstances"], 1);
    assert_eq!(body["series"][0]["modality"]["code"], "CT");
    assert_eq!(body["series"][0]["uid"], "1.2.3.4");
    Ok(())
}

#[tokio::test]
async fn imaging_study_without_modality_gets_placeholder_series() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let (_, _, appointment) = seed_chain(&app, "IS-OT").await?;

    let id = app
        .create_ok(
            ResourceKind::ImagingStudy,
            ImagingStudyBuilder::for_appointment(&appointment).build(),
        )
        .await?;

    let body = stored(&app, ResourceKind::ImagingStudy, &id).await?;
    assert_eq!(body["series"][0]["modality"], json!({"code": "OT"}));
    assert!(body.get("modality").is_none());
    Ok(())
}

#[tokio::test]
async fn imaging_study_field_errors() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let (_, _, appointment) = seed_chain(&app, "IS-ERR").await?;

    let outcome = app
        .create(
            ResourceKind::ImagingStudy,
            ImagingStudyBuilder::for_appointment(&appointment)
                .without_started()
                .build(),
        )
        .await?;
    assert_rejected(&outcome, "missingRequiredField:started");

    let mut body = ImagingStudyBuilder::for_appointment(&appointment).build();
    body["started"] = json!("05/10/2024 09:05");
    let outcome = app.create(ResourceKind::ImagingStudy, body).await?;
    assert_rejected(&outcome, "invalidDateTimeFormat");

    for modality in [json!("CT"), json!([{"display": "Computed tomography"}]), json!(["CT"])] {
        let outcome = app
            .create(
                ResourceKind::ImagingStudy,
                ImagingStudyBuilder::for_appointment(&appointment)
                    .modality(modality)
                    .build(),
            )
            .await?;
        assert_rejected(&outcome, "invalidModalityStructure");
    }

    assert_eq!(app.count(ResourceKind::ImagingStudy), 0);
    Ok(())
}
