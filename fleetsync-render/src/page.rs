//! The status page template and its context.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tera::Tera;

use fleetsync_core::{StatusRecord, FIELD_NAMES};

use crate::error::RenderError;

pub const PAGE_TITLE: &str = "MLab Scraper Status";

/// Registered with an `.html` suffix so Tera autoescapes it.
const TEMPLATE_NAME: &str = "status.html";
const TEMPLATE: &str = include_str!("templates/status.html.tera");

#[derive(Debug, Serialize)]
struct PageContext<'a> {
    title: &'static str,
    columns: &'static [&'static str],
    rows: Vec<[&'a str; 6]>,
    error: Option<&'a str>,
    generated_at: String,
}

/// Compiled status page.
#[derive(Debug)]
pub struct StatusPage {
    tera: Tera,
}

impl StatusPage {
    pub fn new() -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, TEMPLATE)?;
        Ok(Self { tera })
    }

    /// Table of `records`, or the `NO DATA` notice when there are none.
    pub fn render_records(
        &self,
        records: &[StatusRecord],
        generated_at: DateTime<Utc>,
    ) -> Result<String, RenderError> {
        let mut rows: Vec<[&str; 6]> = records.iter().map(StatusRecord::values).collect();
        rows.sort_unstable();
        self.render(PageContext {
            title: PAGE_TITLE,
            columns: &FIELD_NAMES,
            rows,
            error: None,
            generated_at: generated_at.format("%a %b %e %H:%M:%S %Y").to_string(),
        })
    }

    /// The error page shown when records could not be fetched.
    pub fn render_error(&self, error: &str) -> Result<String, RenderError> {
        self.render(PageContext {
            title: PAGE_TITLE,
            columns: &FIELD_NAMES,
            rows: Vec::new(),
            error: Some(error),
            generated_at: String::new(),
        })
    }

    fn render(&self, page: PageContext<'_>) -> Result<String, RenderError> {
        let context = tera::Context::from_serialize(&page)?;
        Ok(self.tera.render(TEMPLATE_NAME, &context)?)
    }
}
