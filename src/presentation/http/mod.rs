use std::sync::Arc;

use poem::Route;
use poem_openapi::OpenApiService;

use crate::presentation::http::endpoints::{
    health::HealthEndpoints, messages::MessagesEndpoints, root::ApiState,
};

pub mod endpoints;
pub mod mappers;
pub mod responses;

/// `/api` carries the OpenAPI service, `/` the Swagger UI.
pub fn build_app(state: Arc<ApiState>, server_url: &str) -> Route {
    let api_service = OpenApiService::new(
        (HealthEndpoints, MessagesEndpoints::new(state)),
        "Messaging API",
        "0.1.0",
    )
    .server(format!("{server_url}/api"));
    let ui = api_service.swagger_ui();
    Route::new().nest("/api", api_service).nest("/", ui)
}
