//! Block tree to visible output. The terminal target draws the live deck; the
//! scene target produces the SVG that the export stages and rasterizes.

pub mod scene;
pub mod terminal;

use std::time::Duration;

/// How many animated elements of an active unit are visible `elapsed` after
/// activation. Element `i` appears once `i * step` has passed.
pub fn revealed_count(elapsed: Duration, step: Duration, total: usize) -> usize {
    if step.is_zero() {
        return total;
    }
    let steps = elapsed.as_millis() / step.as_millis();
    let shown = usize::try_from(steps).unwrap_or(usize::MAX).saturating_add(1);
    shown.min(total)
}

/// Whether the reveal has finished and no further frames are needed for it.
pub fn reveal_complete(elapsed: Duration, step: Duration, total: usize) -> bool {
    revealed_count(elapsed, step, total) >= total
}
