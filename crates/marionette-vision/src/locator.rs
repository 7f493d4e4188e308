use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tracing::{debug, trace};

use marionette_core::error::{EngineError, Result};
use marionette_core::traits::{ActionPort, MappingRegistry, Template};
use marionette_core::types::{Capture, Point, Region};

use crate::matcher::match_template;

/// Delay between screen re-captures while waiting for a template.
const RECAPTURE_INTERVAL: Duration = Duration::from_millis(200);

/// Named-point and named-template registry backed by an [`ActionPort`].
///
/// `find_template_on_screen` captures the screen, runs the matcher, and
/// re-captures every 200ms until the template appears or the timeout
/// elapses. Matches come back in logical coordinates: the physical match
/// region is divided by the port's per-axis scale factor.
pub struct TemplateLocator {
    port: Arc<dyn ActionPort>,
    points: HashMap<String, Point>,
    templates: HashMap<String, Template>,
}

impl TemplateLocator {
    pub fn new(port: Arc<dyn ActionPort>) -> Self {
        Self {
            port,
            points: HashMap::new(),
            templates: HashMap::new(),
        }
    }

    pub fn with_points(mut self, points: HashMap<String, Point>) -> Self {
        self.points = points;
        self
    }

    pub fn with_templates(mut self, templates: Vec<Template>) -> Self {
        self.templates = templates.into_iter().map(|t| (t.name.clone(), t)).collect();
        self
    }

    pub fn add_point(&mut self, name: impl Into<String>, point: Point) {
        self.points.insert(name.into(), point);
    }

    pub fn add_template(&mut self, template: Template) {
        self.templates.insert(template.name.clone(), template);
    }

    fn to_logical(&self, x: u32, y: u32, template: &Template) -> Region {
        let scale = self.port.scale_factor();
        Region {
            x: (x as f64 / scale).round() as i32,
            y: (y as f64 / scale).round() as i32,
            width: (template.width as f64 / scale).round() as u32,
            height: (template.height as f64 / scale).round() as u32,
        }
    }
}

impl MappingRegistry for TemplateLocator {
    fn get_point_by_name(&self, name: &str) -> Option<Point> {
        self.points.get(name).copied()
    }

    fn get_template_by_name(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    fn find_template_on_screen(
        &self,
        name: &str,
        confidence: f32,
        timeout_ms: u64,
    ) -> BoxFuture<'_, Result<Option<Region>>> {
        let name = name.to_string();
        Box::pin(async move {
            let template = self
                .templates
                .get(&name)
                .ok_or_else(|| EngineError::TemplateNotFound(name.clone()))?;
            let needle = Capture::new(
                template.pixels.clone(),
                template.width,
                template.height,
                template.channels,
            );

            let deadline = Instant::now() + Duration::from_millis(timeout_ms);
            loop {
                let screen = self.port.screenshot(None).await?;
                if let Some(m) = match_template(&screen, &needle, confidence) {
                    let region = self.to_logical(m.x, m.y, template);
                    debug!(
                        template = %name,
                        x = region.x,
                        y = region.y,
                        score = m.score,
                        "template found on screen"
                    );
                    return Ok(Some(region));
                }

                if Instant::now() + RECAPTURE_INTERVAL > deadline {
                    trace!(template = %name, timeout_ms, "template not found before timeout");
                    return Ok(None);
                }
                tokio::time::sleep(RECAPTURE_INTERVAL).await;
            }
        })
    }
}
