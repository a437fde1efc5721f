use axum::routing::post;
use axum::Router;

use crate::handlers::emergency;
use crate::state::AppState;

/// Mount the trigger and direct-dispatch routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ejecutar_emergencia", post(emergency::trigger))
        .route("/ejecutar", post(emergency::dispatch_direct))
}
