//! Small shared helpers over the action port, used by both engines.

use marionette_core::action::PointRef;
use marionette_core::error::{EngineError, Result};
use marionette_core::traits::{ActionPort, MappingRegistry};
use marionette_core::types::{MouseButton, Point};

/// Resolve a named mapping point or literal coordinates.
pub(crate) fn resolve_point(registry: &dyn MappingRegistry, target: &PointRef) -> Result<Point> {
    match target {
        PointRef::Named(name) => registry
            .get_point_by_name(name)
            .ok_or_else(|| EngineError::PointNotFound(name.clone())),
        PointRef::At { x, y } => Ok(Point::new(*x, *y)),
    }
}

/// Issue `clicks` clicks at a position.
pub(crate) async fn click_times(
    port: &dyn ActionPort,
    button: MouseButton,
    at: Point,
    clicks: u32,
) -> Result<()> {
    for _ in 0..clicks.max(1) {
        port.click(button, Some(at)).await?;
    }
    Ok(())
}

/// Press a key combo: every entry but the last is a modifier held for the
/// main key's press-and-release.
pub(crate) async fn press_combo(port: &dyn ActionPort, combo: &[String]) -> Result<()> {
    let (key, modifiers) = combo.split_last().ok_or_else(|| EngineError::Action {
        action: "pressKey".into(),
        message: "empty key combo".into(),
    })?;
    port.press_key(key, modifiers).await
}
