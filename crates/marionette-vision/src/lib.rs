//! On-screen template matching for marionette.
//!
//! [`matcher`] is the pure search algorithm; [`locator`] wraps it with
//! named-point/template lookup and re-capture-until-timeout over an
//! [`ActionPort`](marionette_core::traits::ActionPort).

pub mod locator;
pub mod matcher;

pub use locator::TemplateLocator;
pub use matcher::{match_template, scan_step, Match};
