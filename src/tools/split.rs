use super::{file_stem, read_input, require_str, write_output};
use crate::engine::{Operation, OutputSpec, ResolvedArgs};
use crate::error::{Error, Result};
use crate::pdf::{parse_page_selection, QpdfWrapper};
use std::path::Path;

/// Extract the pages selected by `pages` from `file` into
/// `<output_dir>/<stem>_split.pdf`
pub struct Split;

impl Operation for Split {
    fn name(&self) -> &'static str {
        "split"
    }

    fn output(&self) -> OutputSpec {
        OutputSpec::Directory
    }

    fn run(&self, args: &ResolvedArgs) -> Result<String> {
        let file = require_str(args, "file")?;
        let pages = require_str(args, "pages")?;
        let output_dir = require_str(args, "output_dir")?;
        if pages.trim().is_empty() {
            return Err(Error::invalid_argument("pages", "page selection is empty"));
        }

        let data = read_input(file)?;
        let total = QpdfWrapper::page_count(&data)?;
        let selection = parse_page_selection(pages, total)?;
        let indices: Vec<u32> = selection.iter().map(|page| page - 1).collect();

        let extracted = QpdfWrapper::extract_pages(&data, &indices)?;
        tracing::info!(selected = indices.len(), total, "split document");

        let output = Path::new(output_dir).join(format!("{}_split.pdf", file_stem(file)));
        write_output(&output.to_string_lossy(), &extracted)
    }
}
