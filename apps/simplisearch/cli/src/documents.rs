//! Line-oriented document files.

use domain_search::Document;
use serde_json::json;
use std::path::Path;

/// Metadata `source` tag for records written by this tool.
pub const SOURCE_TAG: &str = "cli_index";

/// One document per non-blank line, keyed `doc_<line index>`.
///
/// The index counts every line, blank ones included, so keys stay stable
/// when blank lines are added or removed elsewhere in the file.
pub fn parse(contents: &str) -> Vec<Document> {
    contents
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let text = line.trim();
            if text.is_empty() {
                return None;
            }
            Some(Document {
                key: format!("doc_{index}"),
                text: text.to_string(),
                metadata: json!({ "source": SOURCE_TAG, "text_content": text }),
            })
        })
        .collect()
}

pub async fn load(path: &Path) -> eyre::Result<Vec<Document>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| eyre::eyre!("Failed to read {}: {}", path.display(), e))?;
    Ok(parse(&contents))
}
