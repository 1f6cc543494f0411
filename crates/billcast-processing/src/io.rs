//! CSV loading and writing.

use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{debug, error};

use crate::error::{PreprocessingError, Result, ResultExt};

const INFER_SCHEMA_ROWS: usize = 100;

/// Load a CSV file, trying progressively more forgiving strategies.
///
/// 1. Standard loading with `"` as the quote character.
/// 2. Default options.
/// 3. Loading pre-cleaned content with stray quote runs collapsed and blank
///    lines removed.
pub fn load_csv_with_fallbacks(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(PreprocessingError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Input file not found: {}", path.display()),
        )));
    }

    match CsvReadOptions::default()
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => debug!("Standard loading failed: {}", e),
    }

    match CsvReadOptions::default()
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => debug!("Loading with default options failed: {}", e),
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        error!("Could not read file: {}", e);
        PreprocessingError::Io(e)
    })?;

    read_csv_str(&clean_csv_content(&content)).context("Loading pre-cleaned CSV content")
}

/// Parse CSV text with a header row.
pub fn read_csv_str(content: &str) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .with_has_header(true)
        .into_reader_with_file_handle(Cursor::new(content.to_owned()))
        .finish()
}

/// Write a batch as CSV with a header row, creating parent directories.
pub fn write_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .context(format!("Writing {}", path.display()))?;

    debug!(path = %path.display(), rows = df.height(), "Wrote CSV");
    Ok(())
}

fn clean_csv_content(content: &str) -> String {
    content
        .replace("\"\"\"", "\"")
        .replace("\"\"", "\"")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
