//! Image stamping via PDFium

use crate::error::{Error, Result};
use crate::pdf::pdfium::{create_pdfium, map_pdfium_error};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::str::FromStr;

/// Stamp size at scale 1.0, in points
pub const STAMP_WIDTH: f32 = 150.0;
pub const STAMP_HEIGHT: f32 = 75.0;
/// Distance from the page edges, in points
pub const STAMP_MARGIN: f32 = 20.0;

/// Page corner the stamp is anchored to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StampPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

impl FromStr for StampPosition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tl" => Ok(StampPosition::TopLeft),
            "tr" => Ok(StampPosition::TopRight),
            "bl" => Ok(StampPosition::BottomLeft),
            "br" => Ok(StampPosition::BottomRight),
            other => Err(Error::invalid_argument(
                "pos",
                format!("'{}' is not one of tl, tr, bl, br", other),
            )),
        }
    }
}

impl StampPosition {
    /// Lower-left corner of a `width` x `height` stamp on a page, in PDF
    /// coordinates (origin bottom-left).
    pub fn origin(&self, page_width: f32, page_height: f32, width: f32, height: f32) -> (f32, f32) {
        let left = STAMP_MARGIN;
        let right = page_width - width - STAMP_MARGIN;
        let bottom = STAMP_MARGIN;
        let top = page_height - height - STAMP_MARGIN;
        match self {
            StampPosition::TopLeft => (left, top),
            StampPosition::TopRight => (right, top),
            StampPosition::BottomLeft => (left, bottom),
            StampPosition::BottomRight => (right, bottom),
        }
    }
}

/// Options for [`stamp_pages`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StampOptions {
    /// 1-indexed page, negative counts from the end, 0 stamps every page
    pub page: i64,
    pub position: StampPosition,
    pub scale: f32,
}

/// 0-indexed pages addressed by `page` in a document of `total` pages.
pub fn target_pages(page: i64, total: u32) -> Result<Vec<usize>> {
    let out_of_bounds = || Error::PageOutOfBounds { page, total };
    let total_i = i64::from(total);

    if page == 0 {
        if total == 0 {
            return Err(out_of_bounds());
        }
        return Ok((0..total as usize).collect());
    }

    let index = if page > 0 { page - 1 } else { total_i + page };
    if (0..total_i).contains(&index) {
        Ok(vec![index as usize])
    } else {
        Err(out_of_bounds())
    }
}

/// Place `image` on the selected pages and return the new document.
pub fn stamp_pages(data: &[u8], image: &DynamicImage, options: &StampOptions) -> Result<Vec<u8>> {
    let pdfium = create_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(data, None)
        .map_err(map_pdfium_error)?;

    let total = document.pages().len() as u32;
    let targets = target_pages(options.page, total)?;

    let width = STAMP_WIDTH * options.scale;
    let height = STAMP_HEIGHT * options.scale;

    for (index, mut page) in document.pages().iter().enumerate() {
        if !targets.contains(&index) {
            continue;
        }
        let (x, y) = options.position.origin(
            page.width().value,
            page.height().value,
            width,
            height,
        );
        page.objects_mut()
            .create_image_object(
                PdfPoints::new(x),
                PdfPoints::new(y),
                image,
                Some(PdfPoints::new(width)),
                Some(PdfPoints::new(height)),
            )
            .map_err(map_pdfium_error)?;
        tracing::debug!(page = index + 1, x, y, width, height, "placed stamp");
    }

    document.save_to_bytes().map_err(map_pdfium_error)
}
