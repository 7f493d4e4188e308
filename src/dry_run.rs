use futures::future::BoxFuture;
use tracing::info;

use marionette_core::error::Result;
use marionette_core::traits::ActionPort;
use marionette_core::types::{Capture, MouseButton, Point, Region};

/// Action port that logs every synthesized event instead of touching the
/// OS, and serves blank captures. Real input/capture backends live outside
/// this repository; the CLI replays workflows against this port.
pub struct DryRunPort {
    width: u32,
    height: u32,
}

impl DryRunPort {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for DryRunPort {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

impl ActionPort for DryRunPort {
    fn move_mouse(&self, x: i32, y: i32) -> BoxFuture<'_, Result<()>> {
        info!(x, y, "dry-run: move mouse");
        Box::pin(async { Ok(()) })
    }

    fn click(&self, button: MouseButton, at: Option<Point>) -> BoxFuture<'_, Result<()>> {
        match at {
            Some(p) => info!(%button, x = p.x, y = p.y, "dry-run: click"),
            None => info!(%button, "dry-run: click at cursor"),
        }
        Box::pin(async { Ok(()) })
    }

    fn type_text(&self, text: &str) -> BoxFuture<'_, Result<()>> {
        info!(chars = text.chars().count(), "dry-run: type text");
        Box::pin(async { Ok(()) })
    }

    fn press_key(&self, key: &str, modifiers: &[String]) -> BoxFuture<'_, Result<()>> {
        info!(key, modifiers = ?modifiers, "dry-run: press key");
        Box::pin(async { Ok(()) })
    }

    fn drag(&self, from: Point, to: Point, button: MouseButton) -> BoxFuture<'_, Result<()>> {
        info!(
            %button,
            from_x = from.x,
            from_y = from.y,
            to_x = to.x,
            to_y = to.y,
            "dry-run: drag"
        );
        Box::pin(async { Ok(()) })
    }

    fn screenshot(&self, region: Option<Region>) -> BoxFuture<'_, Result<Capture>> {
        let (w, h) = match region {
            Some(r) => (r.width, r.height),
            None => (self.width, self.height),
        };
        info!(width = w, height = h, "dry-run: screenshot");
        Box::pin(async move { Ok(Capture::new(vec![0; (w * h * 4) as usize], w, h, 4)) })
    }

    fn screen_size(&self) -> BoxFuture<'_, Result<(u32, u32)>> {
        let size = (self.width, self.height);
        Box::pin(async move { Ok(size) })
    }
}
