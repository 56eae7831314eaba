//! Resource routes
//!
//! Each kind gets static routes under its lower-case segment (`/servicerequest`),
//! so the kind is known from the route rather than parsed from the path.

use crate::api::handlers::{lookups, resources};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    routing::{get, post, MethodRouter},
    Router,
};
use ris_models::ResourceKind;

pub fn resource_routes() -> Router<AppState> {
    let mut router = Router::new()
        .route(
            "/patient/check-duplicate",
            post(lookups::check_duplicate_patient),
        )
        .route(
            "/servicerequest/patient/:patient_id",
            get(lookups::service_requests_by_patient),
        )
        .route(
            "/servicerequest/patient/:system/:value",
            get(lookups::service_requests_by_patient_identifier),
        )
        .route(
            "/imagingstudy/search",
            get(lookups::search_imaging_studies),
        )
        .route(
            "/appointment/service-request/:service_request_id",
            get(lookups::appointments_by_service_request),
        );

    for kind in ResourceKind::ALL {
        let segment = kind.route_segment();
        router = router
            .route(&format!("/{segment}"), collection_route(kind))
            .route(
                &format!("/{segment}/:id"),
                get(
                    move |State(state): State<AppState>, Path(id): Path<String>| async move {
                        resources::read(state, kind, id).await
                    },
                ),
            );
    }

    router
}

fn collection_route(kind: ResourceKind) -> MethodRouter<AppState> {
    let create = post(
        move |State(state): State<AppState>, body: Bytes| async move {
            resources::create(state, kind, body).await
        },
    );

    match kind {
        // Appointments have no business identifier of their own
        ResourceKind::Appointment => create,
        _ => create.get(
            move |State(state): State<AppState>,
                  Query(query): Query<lookups::IdentifierQuery>| async move {
                lookups::by_identifier(state, kind, query).await
            },
        ),
    }
}
