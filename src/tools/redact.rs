use super::{read_input, require_str, require_str_list, write_output};
use crate::engine::{Operation, OutputSpec, ResolvedArgs};
use crate::error::Result;
use crate::pdf::{compile_patterns, extract_page_texts, redact_pages};

/// Write the text of `file` as markdown with every match of `patterns`
/// replaced by a marker
pub struct Redact;

impl Operation for Redact {
    fn name(&self) -> &'static str {
        "redact"
    }

    fn output(&self) -> OutputSpec {
        OutputSpec::File {
            suffix: "redacted",
            extension: "md",
        }
    }

    fn run(&self, args: &ResolvedArgs) -> Result<String> {
        let file = require_str(args, "file")?;
        let output = require_str(args, "output")?;
        let patterns: Vec<String> = require_str_list(args, "patterns")?
            .into_iter()
            .map(str::to_string)
            .collect();
        let patterns = compile_patterns(&patterns)?;

        let data = read_input(file)?;
        let texts = extract_page_texts(&data)?;
        let markdown = redact_pages(&texts, &patterns);
        write_output(output, markdown.as_bytes())
    }
}
