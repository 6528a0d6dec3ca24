//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use crate::services;
use imgvault_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "imgvault API",
        version = "0.1.0",
        description = "Image upload lifecycle over a hosted image service: pre-signed upload URLs per session, completion into owned records, cascading deletes and variant lookups with access counting."
    ),
    paths(
        handlers::uploads::create_uploads,
        handlers::uploads::complete_uploads,
        handlers::uploads::clear_uploads,
        handlers::assets::delete_image,
        handlers::assets::batch_delete,
        handlers::assets::redirect_to_variant,
        handlers::assets::variant_uri,
        handlers::assets::check_access,
        handlers::admin::reconcile_counters,
        handlers::admin::sweep_ownership,
    ),
    components(schemas(
        error::ErrorResponse,
        imgvault_core::Violation,
        handlers::MessageResponse,
        handlers::uploads::BatchUploadRequest,
        handlers::uploads::BatchUploadResponse,
        handlers::uploads::CompleteUploadResponse,
        handlers::assets::BatchDeleteRequest,
        handlers::assets::VariantUriResponse,
        handlers::assets::AccessResponse,
        services::ReconcileReport,
        services::SweepReport,
        models::UploadItem,
        models::SignedUpload,
        models::AssetStatus,
        models::AssetMetadata,
    )),
    tags(
        (name = "uploads", description = "Upload sessions"),
        (name = "images", description = "Stored images"),
        (name = "internal", description = "Operator endpoints")
    )
)]
pub struct ApiDoc;
