use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Extension, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::Context;

pub mod handlers;

pub fn server(context: Arc<Context>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/jobs/:id", get(handlers::job))
        .route("/json/login", post(handlers::auth::login))
        .route("/json/signin", post(handlers::auth::signup))
        .route("/json/createVirtualMachine", post(handlers::vm::create))
        .route("/json/modifyVM", post(handlers::vm::modify))
        .route("/json/deleteVM", post(handlers::vm::delete))
        .route("/json/startVM", post(handlers::vm::start))
        .route("/json/stopVM", post(handlers::vm::stop))
        .route("/json/createGuestMachine", post(handlers::vm::create_guest))
        .route("/json/consultMachine", post(handlers::info::machines))
        .route("/json/consultHost", post(handlers::info::hosts))
        .route("/json/consultCatalog", get(handlers::info::catalog))
        .route("/json/consultMetrics", get(handlers::info::metrics))
        .route("/json/addHost", post(handlers::info::add_host))
        .route("/json/addDisk", post(handlers::info::add_disk))
        .route("/json/imagenHub", post(handlers::docker::image_from_hub))
        .route("/json/imagenTar", post(handlers::docker::image_from_tar))
        .route("/json/imagenDockerFile", post(handlers::docker::image_from_dockerfile))
        .route("/json/eliminarImagen", post(handlers::docker::remove_image))
        .route("/json/imagenesVM", post(handlers::docker::images))
        .route("/json/crearContenedor", post(handlers::docker::create_container))
        .route("/json/gestionContenedor", post(handlers::docker::manage_container))
        .route("/json/ContenedoresVM", post(handlers::docker::containers))
        .layer(
            CorsLayer::new()
                .allow_headers(Any)
                .allow_methods(Any)
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http())
        .layer(Extension(context))
}
