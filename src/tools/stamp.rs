use super::{optional_f64, optional_str, read_input, require_i64, require_str, write_output};
use crate::engine::{Operation, OutputSpec, ResolvedArgs};
use crate::error::{Error, Result};
use crate::pdf::{stamp_pages, StampOptions, StampPosition};

/// Place the image at `stamp_path` on one page (or every page) of `file`
pub struct AddStamp;

impl AddStamp {
    fn options(args: &ResolvedArgs) -> Result<StampOptions> {
        let page = require_i64(args, "page")?;
        let position = match optional_str(args, "pos")? {
            Some(pos) => pos.parse()?,
            None => StampPosition::default(),
        };
        let scale = optional_f64(args, "scale")?.unwrap_or(1.0);
        if !(scale.is_finite() && scale > 0.0) {
            return Err(Error::invalid_argument("scale", "must be a positive number"));
        }

        Ok(StampOptions {
            page,
            position,
            scale: scale as f32,
        })
    }
}

impl Operation for AddStamp {
    fn name(&self) -> &'static str {
        "add_stamp"
    }

    fn output(&self) -> OutputSpec {
        OutputSpec::File {
            suffix: "stamped",
            extension: "pdf",
        }
    }

    fn run(&self, args: &ResolvedArgs) -> Result<String> {
        let file = require_str(args, "file")?;
        let stamp_path = require_str(args, "stamp_path")?;
        let output = require_str(args, "output")?;
        let options = Self::options(args)?;

        let image = image::open(stamp_path)?;
        let data = read_input(file)?;
        let stamped = stamp_pages(&data, &image, &options)?;
        tracing::info!(page = options.page, position = ?options.position, scale = options.scale, "stamped document");
        write_output(output, &stamped)
    }
}
