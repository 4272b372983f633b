//! Boot order input forms: comma lists and files with one reference per line.

use std::path::Path;

use crate::error::{BmcError, Result};

/// Split `Boot0003,Boot0001, Boot0002` into references.
///
/// # Errors
/// Returns [`BmcError::InvalidArgument`] if the list is empty.
pub fn parse_comma_list(list: &str) -> Result<Vec<String>> {
    let order: Vec<String> = list
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect();

    if order.is_empty() {
        return Err(BmcError::InvalidArgument("boot order is empty".to_string()));
    }
    Ok(order)
}

/// Parse file content: one reference per line, blank lines ignored.
#[must_use]
pub fn parse_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read a boot order file.
///
/// # Errors
/// Returns [`BmcError::FileNotFound`] if the file does not exist and
/// [`BmcError::InvalidArgument`] if it lists no references.
pub async fn read_boot_order_file(path: &Path) -> Result<Vec<String>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(BmcError::FileNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let order = parse_lines(&content);
    if order.is_empty() {
        return Err(BmcError::InvalidArgument(format!(
            "boot order file {} lists no boot options",
            path.display()
        )));
    }
    Ok(order)
}

/// Write `order` in the one-reference-per-line form.
///
/// # Errors
/// Returns an I/O error if the file cannot be written.
pub async fn write_boot_order_file(path: &Path, order: &[String]) -> Result<()> {
    let mut content = order.join("\n");
    content.push('\n');
    tokio::fs::write(path, content).await?;
    Ok(())
}
