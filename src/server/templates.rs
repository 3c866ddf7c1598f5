//! HTML pages rendered with tera.
//!
//! Templates are compiled into the binary; `.html` templates are autoescaped,
//! which also escapes `/`, so links are built from the filename in the template.

use axum::response::Html;
use imagebed_store::StoredImage;
use serde::Serialize;
use tera::{Context, Tera};

const BASE: &str = include_str!("../../templates/base.html");
const INDEX: &str = include_str!("../../templates/index.html");
const LOGIN: &str = include_str!("../../templates/login.html");

#[derive(Serialize)]
struct ImageRow<'a> {
    filename: &'a str,
    size: u64,
    created: String,
}

impl<'a> From<&'a StoredImage> for ImageRow<'a> {
    fn from(image: &'a StoredImage) -> Self {
        Self {
            filename: &image.filename,
            size: image.size,
            created: image.created.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

pub struct Templates {
    tera: Tera,
}

impl Templates {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("base.html", BASE),
            ("index.html", INDEX),
            ("login.html", LOGIN),
        ])?;
        Ok(Self { tera })
    }

    /// The image listing with upload form.
    pub fn render_index(
        &self,
        images: &[StoredImage],
        flash: Option<&str>,
        accept: &str,
        max_file_size: u64,
    ) -> Result<Html<String>, tera::Error> {
        let rows: Vec<ImageRow<'_>> = images.iter().map(ImageRow::from).collect();

        let mut ctx = Context::new();
        ctx.insert("images", &rows);
        ctx.insert("flash", &flash);
        ctx.insert("accept", accept);
        ctx.insert("max_file_size", &max_file_size);
        self.tera.render("index.html", &ctx).map(Html)
    }

    /// The login form; `next` is posted back as a hidden field.
    pub fn render_login(&self, next: &str, message: Option<&str>) -> Result<Html<String>, tera::Error> {
        let mut ctx = Context::new();
        ctx.insert("next", next);
        ctx.insert("message", &message);
        self.tera.render("login.html", &ctx).map(Html)
    }
}
