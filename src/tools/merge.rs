use super::{read_input, require_str, require_str_list, write_output};
use crate::engine::{Operation, OutputSpec, ResolvedArgs};
use crate::error::Result;
use crate::pdf::QpdfWrapper;

/// Concatenate `files` in order into `output`
pub struct Merge;

impl Operation for Merge {
    fn name(&self) -> &'static str {
        "merge"
    }

    fn output(&self) -> OutputSpec {
        OutputSpec::File {
            suffix: "merged",
            extension: "pdf",
        }
    }

    fn run(&self, args: &ResolvedArgs) -> Result<String> {
        let files = require_str_list(args, "files")?;
        let output = require_str(args, "output")?;

        let inputs = files
            .iter()
            .map(|path| read_input(path))
            .collect::<Result<Vec<_>>>()?;
        let slices: Vec<&[u8]> = inputs.iter().map(Vec::as_slice).collect();

        let merged = QpdfWrapper::merge(&slices)?;
        tracing::info!(inputs = files.len(), "merged documents");
        write_output(output, &merged)
    }
}
