use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "pricewatch API",
        description = "Control API for the paced marketplace price crawler."
    ),
    paths(
        crate::routes::get_config,
        crate::routes::update_config,
        crate::routes::get_status,
        crate::routes::refresh_targets,
        crate::routes::start_crawl,
        crate::routes::stop_crawl,
        crate::routes::stop_retry,
        crate::routes::skip_item,
        crate::events::stream_events,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::ConfigResponse,
        crate::dto::UpdateConfigRequest,
        crate::dto::StatusResponse,
        crate::dto::EngineStatusResponse,
        crate::dto::TaskDto,
        crate::dto::ResultDto,
        crate::dto::PriceDto,
        crate::dto::TargetsRefreshedResponse,
        crate::dto::CommandResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "crawl", description = "Crawl control and progress"),
        (name = "config", description = "Crawl tuning"),
        (name = "system", description = "Health and system status"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds Bearer token security scheme to the OpenAPI document.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("token")
                        .description(Some(
                            "Admin token. Set via PRICEWATCH_ADMIN_TOKEN environment variable.",
                        ))
                        .build(),
                ),
            );
        }
    }
}
