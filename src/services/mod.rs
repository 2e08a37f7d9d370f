/// OpenAPI documentation generation.
pub mod documentation;
/// Connection authentication and the password capability.
pub mod gateway;
/// Health check service.
pub mod health_service;
/// Room registry operations.
pub mod room_service;
/// Scramble generation for new attempts.
pub mod scramble;
/// Room session coordination: membership, results, attempt lifecycle.
pub mod session_service;
/// Storage persistence supervisor with reconnect backoff.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;
/// Outbound event construction and scoping.
pub mod ws_events;
