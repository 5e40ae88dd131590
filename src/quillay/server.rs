// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use actix_web::{HttpResponse, Responder, get, post, web};
use geojson::FeatureCollection;
use std::sync::Arc;
use surveyroutes::config::ViewState;
use surveyroutes::{EngineEvent, EngineHandle, Facet, ModeId};
use tracing::warn;

pub struct AppState {
    pub engine: EngineHandle,
    pub view: ViewState,
    pub buildings: Option<Arc<FeatureCollection>>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(get_layers)
        .service(get_selection)
        .service(get_view)
        .service(get_buildings)
        .service(toggle_all_modes)
        .service(toggle_mode)
        .service(toggle_all_facet)
        .service(toggle_facet);
}

/// Sends one UI event and answers with the layer set it produced.
async fn dispatch(state: &AppState, event: EngineEvent) -> HttpResponse {
    let reply = match state.engine.request(event) {
        Ok(reply) => reply,
        Err(e) => {
            warn!("{}", e);
            return HttpResponse::ServiceUnavailable().body(e.to_string());
        }
    };

    match reply.await {
        Ok(set) => HttpResponse::Ok()
            .insert_header(("Cache-Control", "no-cache"))
            .json(set.as_ref()),
        Err(_) => HttpResponse::ServiceUnavailable().finish(),
    }
}

#[get("/layers")]
async fn get_layers(state: web::Data<AppState>) -> impl Responder {
    let set = state.engine.layers();
    HttpResponse::Ok()
        .insert_header(("Cache-Control", "no-cache"))
        .json(set.as_ref())
}

#[get("/selection")]
async fn get_selection(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok()
        .insert_header(("Cache-Control", "no-cache"))
        .json(state.engine.selection())
}

#[get("/view")]
async fn get_view(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(&state.view)
}

#[get("/buildings")]
async fn get_buildings(state: web::Data<AppState>) -> impl Responder {
    match &state.buildings {
        Some(collection) => HttpResponse::Ok()
            .insert_header(("Cache-Control", "max-age=3600, public"))
            .json(collection.as_ref()),
        None => HttpResponse::NotFound().finish(),
    }
}

#[post("/modes/toggle_all")]
async fn toggle_all_modes(state: web::Data<AppState>) -> impl Responder {
    dispatch(&state, EngineEvent::ToggleAllModes).await
}

#[post("/modes/{id}/toggle")]
async fn toggle_mode(state: web::Data<AppState>, path: web::Path<u8>) -> impl Responder {
    dispatch(&state, EngineEvent::ToggleMode(ModeId(path.into_inner()))).await
}

#[post("/facets/{facet}/toggle_all")]
async fn toggle_all_facet(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    match path.parse::<Facet>() {
        Ok(facet) => dispatch(&state, EngineEvent::ToggleAllFacet(facet)).await,
        Err(e) => HttpResponse::BadRequest().body(e),
    }
}

#[post("/facets/{facet}/{id}/toggle")]
async fn toggle_facet(
    state: web::Data<AppState>,
    path: web::Path<(String, u8)>,
) -> impl Responder {
    let (facet, id) = path.into_inner();
    match facet.parse::<Facet>() {
        Ok(facet) => dispatch(&state, EngineEvent::ToggleFacet(facet, id)).await,
        Err(e) => HttpResponse::BadRequest().body(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use serde_json::Value;
    use surveyroutes::visual_mapping::DEFAULT_LAYER_ALPHA;
    use surveyroutes::{
        AggregationOptions, FacetSelection, IncomeId, ModeSelection, PeriodId, PurposeId,
        RouteFeature, RouteGeometry, RouteLayerOrchestrator, spawn_engine,
    };

    fn period_one_trip() -> RouteFeature {
        RouteFeature {
            geometry: RouteGeometry::Line(vec![Some(vec![-70.1, -33.1]), Some(vec![-70.2, -33.2])]),
            mode: Some(ModeId(1)),
            period: Some(PeriodId(1)),
            purpose: Some(PurposeId(1)),
            income: Some(IncomeId(1)),
        }
    }

    fn app_state() -> web::Data<AppState> {
        let (engine, _task) = spawn_engine(RouteLayerOrchestrator::new(
            ModeSelection::new([ModeId(1)]),
            FacetSelection::all(),
            AggregationOptions::default(),
            DEFAULT_LAYER_ALPHA,
        ));
        web::Data::new(AppState {
            engine,
            view: ViewState::default(),
            buildings: None,
        })
    }

    #[actix_web::test]
    async fn test_buildings_missing_is_not_found() {
        let app = test::init_service(App::new().app_data(app_state()).configure(config)).await;

        let req = test::TestRequest::get().uri("/buildings").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_unknown_facet_is_bad_request() {
        let app = test::init_service(App::new().app_data(app_state()).configure(config)).await;

        let req = test::TestRequest::post()
            .uri("/facets/mode/toggle_all")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/facets/colour/2/toggle")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_facet_toggle_answers_with_recomputed_layers() {
        let state = app_state();
        let loaded = state
            .engine
            .request(EngineEvent::ModeLoaded {
                mode: ModeId(1),
                features: vec![period_one_trip()],
            })
            .unwrap()
            .await
            .unwrap();
        assert_eq!(loaded.layers[0].edges.len(), 1);

        let app = test::init_service(App::new().app_data(state.clone()).configure(config)).await;

        let req = test::TestRequest::post()
            .uri("/facets/period/1/toggle")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert!(body["generation"].as_u64().unwrap() > loaded.generation);
        assert_eq!(body["layers"][0]["id"], "routes-mode-1");
        assert!(body["layers"][0]["edges"].as_array().unwrap().is_empty());

        let req = test::TestRequest::get().uri("/selection").to_request();
        let selection: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(selection["facets"]["periods"], serde_json::json!([2, 3, 4, 5, 6]));
    }

    #[actix_web::test]
    async fn test_view_defaults() {
        let app = test::init_service(App::new().app_data(app_state()).configure(config)).await;

        let req = test::TestRequest::get().uri("/view").to_request();
        let view: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(view["zoom"], 12.5);
        assert_eq!(view["lighting"]["ambient_intensity"], 0.7);
    }
}
