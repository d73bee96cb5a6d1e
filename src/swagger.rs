use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.as_mut().unwrap();
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        )
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::show::create_show,
        handlers::show::update_show_episode,
        handlers::show::get_all_shows,
        handlers::show::get_show_by_id,
        handlers::show::delete_show,
        handlers::show::delete_episode,
        handlers::plot::get_all_plots,
        handlers::plot::get_plot_by_id,
        handlers::plot::update_plot_status,
        handlers::plot::pause_question,
        handlers::plot::unpause_question,
        handlers::plot::announce_results,
        handlers::plot::get_active_plots,
        handlers::plot::get_plot_details,
        handlers::prediction::create_prediction,
        handlers::prediction::get_my_predictions,
        handlers::prediction::get_my_plots,
    ),
    components(
        schemas(
            handlers::health::HealthResponse,
            ErrorResponse,
            PaginationParams,
            PlotStatus,
            PlotType,
            QuestionType,
            QuestionOptionInput,
            QuestionInput,
            CreateShowEpisodeRequest,
            UpdateShowEpisodeRequest,
            ShowResponse,
            EpisodeSummaryResponse,
            ShowSummaryResponse,
            ShowDetailResponse,
            QuestionOptionResponse,
            QuestionResponse,
            PlotResponse,
            PlotDetailResponse,
            PlotUserDetailResponse,
            UpdatePlotStatusRequest,
            QuestionResultInput,
            AnnounceResultsRequest,
            SelectionInput,
            CreatePredictionRequest,
            SelectionResponse,
            PredictionResponse,
            UserPlotResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness probe"),
        (name = "admin_shows", description = "Show and episode management API"),
        (name = "admin_plots", description = "Plot lifecycle management API"),
        (name = "plot", description = "User plot viewing API"),
        (name = "prediction", description = "User prediction API"),
    ),
    info(
        title = "PlotPicks Backend API",
        version = "1.0.0",
        description = "PlotPicks prediction backend REST API documentation",
    ),
    servers(
        (url = "/", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
