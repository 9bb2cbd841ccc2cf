//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI document for the Quillwright API to disk, by default
//! `openapi.json` in the current directory. An optional first argument
//! overrides the output path.

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

fn write_document(
    api_doc: utoipa::openapi::OpenApi,
    path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let path_count = api_doc.paths.paths.len();
    let spec_json = api_doc.to_pretty_json()?;
    std::fs::write(path, spec_json)?;
    println!("OpenAPI document with {path_count} paths written to {path}");
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());
    write_document(ApiDoc::openapi(), &path)?;
    Ok(())
}
