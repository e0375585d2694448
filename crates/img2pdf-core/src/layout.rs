//! Page geometry: usable area, scale-to-fit and centering.
//!
//! All values are layout units with a top-left origin; y grows downwards.
//! Writers convert to their own coordinate space.

use crate::options::PageFormat;

/// Symmetric inset applied on both sides of each axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inset {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Where things go on one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Full-page fill, painted first.
    pub background: Rect,
    pub image: Rect,
}

/// Page size minus the inset on both edges of each axis.
pub fn usable_area(page: &PageFormat, inset: Inset) -> (f32, f32) {
    let w = (page.width() - 2.0 * inset.x).max(0.0);
    let h = (page.height() - 2.0 * inset.y).max(0.0);
    (w, h)
}

/// Shrink `(width, height)` to fit `max_w` x `max_h` without distortion.
///
/// Width is clamped first; the height clamp then runs on the possibly
/// already-reduced height. Images that already fit are never enlarged.
pub fn fit_to_area(width: f32, height: f32, max_w: f32, max_h: f32) -> (f32, f32) {
    let mut target_w = width;
    let mut target_h = height;

    if target_w > max_w {
        target_w = max_w;
        target_h = height * target_w / width;
    }

    if target_h > max_h {
        target_h = max_h;
        target_w = width * target_h / height;
    }

    (target_w, target_h)
}

/// Lay out one image of intrinsic size `width` x `height` on a page.
pub fn place_image(page: &PageFormat, inset: Inset, width: f32, height: f32) -> Placement {
    let (max_w, max_h) = usable_area(page, inset);
    let (target_w, target_h) = fit_to_area(width, height, max_w, max_h);

    let offset_x = inset.x + (max_w - target_w) / 2.0;
    let offset_y = inset.y + (max_h - target_h) / 2.0;

    Placement {
        background: Rect::new(0.0, 0.0, page.width(), page.height()),
        image: Rect::new(offset_x, offset_y, target_w, target_h),
    }
}
