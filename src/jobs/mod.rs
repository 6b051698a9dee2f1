pub mod api_sync;
pub mod archive_import;
pub mod pipeline;
