use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Cube Rooms Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
            crate::dto::room::RoomSummary,
            crate::dto::room::RoomSnapshot,
            crate::dto::room::MemberView,
            crate::dto::room::AttemptView,
            crate::dto::room::ResultPayload,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "WebSocket operations for room clients"),
    )
)]
pub struct ApiDoc;
