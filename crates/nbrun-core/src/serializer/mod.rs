//! Notebook serialization module
//!
//! This module provides serializers for rendering executed notebooks to
//! viewable formats.

pub mod html;

pub use html::{HtmlOptions, HtmlSerializer};
