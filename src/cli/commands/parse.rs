//! Field extraction from text.

use std::path::Path;

use tokio::io::AsyncReadExt;

use crate::cli::helpers::print_json;
use crate::services::extraction;

/// Parse recognized text from a file or stdin and print the fields.
pub async fn cmd_parse(file: Option<&Path>) -> anyhow::Result<()> {
    let text = match file {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => {
            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await?;
            text
        }
    };

    print_json(&extraction::parse(&text))
}
