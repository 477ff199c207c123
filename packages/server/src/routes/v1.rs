use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers::file;
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest("/files", file_routes(config))
}

fn file_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(file::list_files, file::upload_file))
        .routes(routes!(file::file_stats))
        .routes(routes!(file::dedup_check))
        .routes(routes!(file::get_file))
        .routes(routes!(file::download_file))
        .layer(file::upload_body_limit(config.storage.max_blob_size))
}
