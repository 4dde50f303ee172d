//! Clip sanitization: detected bounds are heuristic and may stick out of the
//! rendered surface, so every rectangle is clamped before it reaches the
//! screenshot backend.

use cdp_page::ScreenshotClip;
use perceiver_section::{RegionBounds, Viewport};

/// Body captures are height-capped so a very long page cannot balloon one
/// artifact. Policy constant, not derived from content.
pub const MAX_BODY_HEIGHT: i32 = 3000;

/// Clamp bounds into a valid capture rectangle: `x` floored at 0, `width`
/// capped at the viewport, `height` floored at 1 px so degenerate geometry
/// still yields a capture instead of an error. `y` passes through as-is.
pub fn sanitize_clip(bounds: &RegionBounds, viewport: Viewport) -> ScreenshotClip {
    ScreenshotClip {
        x: bounds.x.max(0) as f64,
        y: bounds.y as f64,
        width: bounds.width.min(viewport.width as i32) as f64,
        height: bounds.height.max(1) as f64,
        scale: 1.0,
    }
}

/// Apply the body height cap, keeping the derived `top`/`bottom` consistent.
pub fn cap_body_height(bounds: &RegionBounds, max_height: i32) -> RegionBounds {
    RegionBounds::from_parts(
        bounds.x,
        bounds.y,
        bounds.width,
        bounds.height.min(max_height),
    )
}
