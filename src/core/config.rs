use config::{Config, Environment, File};
use serde::Deserialize;

/// Paper sizes, measured in PostScript points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageSize {
    A4,
    Letter,
    Custom(f32, f32), // width, height in pt
}

impl PageSize {
    pub fn dimensions(&self) -> (f32, f32) {
        match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Custom(w, h) => (*w, *h),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margin {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl Default for Margin {
    fn default() -> Self {
        Margin::uniform(50.0)
    }
}

impl Margin {
    pub fn new(top: f32, bottom: f32, left: f32, right: f32) -> Self {
        Margin { top, bottom, left, right }
    }

    pub fn uniform(size: f32) -> Self {
        Margin {
            top: size,
            bottom: size,
            left: size,
            right: size,
        }
    }
}

/// Page geometry and typography shared by every invoice page.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfConfig {
    pub page_size: PageSize,
    pub margin: Margin,
    pub font_family: String,
    pub font_size: f32,
    pub line_height: f32,
}

impl Default for PdfConfig {
    fn default() -> Self {
        PdfConfig {
            page_size: PageSize::A4,
            margin: Margin::default(),
            font_family: "DejaVu Sans".to_string(),
            font_size: 9.0,
            line_height: 11.0,
        }
    }
}

impl PdfConfig {
    pub fn builder() -> PdfConfigBuilder {
        PdfConfigBuilder::default()
    }

    pub fn page_width(&self) -> f32 {
        self.page_size.dimensions().0
    }

    pub fn page_height(&self) -> f32 {
        self.page_size.dimensions().1
    }

    /// Lowest y coordinate content may reach.
    pub fn content_bottom(&self) -> f32 {
        self.page_height() - self.margin.bottom
    }

    pub fn content_width(&self) -> f32 {
        self.page_width() - self.margin.left - self.margin.right
    }

    /// Typst preamble. Pages carry no margin because every element is placed
    /// absolutely; the document date is cleared so output never depends on
    /// the wall clock.
    pub fn to_typst_header(&self, title: &str) -> String {
        format!(
            r#"#set document(title: {}, date: none)
#set page(width: {}pt, height: {}pt, margin: 0pt)
#set text(font: {}, size: {}pt)"#,
            typst_string(title),
            self.page_width(),
            self.page_height(),
            typst_string(&self.font_family),
            self.font_size
        )
    }
}

/// Quotes `text` as a Typst string literal.
pub fn typst_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            '\t' => out.push(' '),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

#[derive(Default)]
pub struct PdfConfigBuilder {
    page_size: Option<PageSize>,
    margin: Option<Margin>,
    font_family: Option<String>,
    font_size: Option<f32>,
    line_height: Option<f32>,
}

impl PdfConfigBuilder {
    pub fn page_size(mut self, size: PageSize) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn margin(mut self, margin: Margin) -> Self {
        self.margin = Some(margin);
        self
    }

    pub fn font_family(mut self, font: impl Into<String>) -> Self {
        self.font_family = Some(font.into());
        self
    }

    pub fn font_size(mut self, size: f32) -> Self {
        self.font_size = Some(size);
        self
    }

    pub fn line_height(mut self, height: f32) -> Self {
        self.line_height = Some(height);
        self
    }

    pub fn build(self) -> PdfConfig {
        let default = PdfConfig::default();
        PdfConfig {
            page_size: self.page_size.unwrap_or(default.page_size),
            margin: self.margin.unwrap_or(default.margin),
            font_family: self.font_family.unwrap_or(default.font_family),
            font_size: self.font_size.unwrap_or(default.font_size),
            line_height: self.line_height.unwrap_or(default.line_height),
        }
    }
}

/// Service settings: optional `configuration.*` file, then `APP__*` env vars.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Upper bound on optimistic numbering attempts per invoice.
    #[serde(default = "default_allocation_attempts")]
    pub allocation_attempts: u32,
    #[serde(default = "default_typst_binary")]
    pub typst_binary: String,
    pub scratch_dir: Option<String>,
    #[serde(default = "default_font_family")]
    pub font_family: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_database_url() -> String {
    "sqlite://invoices.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_allocation_attempts() -> u32 {
    5
}

fn default_typst_binary() -> String {
    "typst".to_string()
}

fn default_font_family() -> String {
    "DejaVu Sans".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            host: default_host(),
            port: default_port(),
            database_url: default_database_url(),
            max_connections: default_max_connections(),
            allocation_attempts: default_allocation_attempts(),
            typst_binary: default_typst_binary(),
            scratch_dir: None,
            font_family: default_font_family(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();

        Config::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn pdf_config(&self) -> PdfConfig {
        PdfConfig::builder()
            .font_family(self.font_family.clone())
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_free_of_timestamps() {
        let header = PdfConfig::default().to_typst_header("Invoice 0001/03/2024");
        assert!(header.contains("date: none"));
        assert!(header.contains("width: 595.28pt"));
        assert!(header.contains("margin: 0pt"));
    }

    #[test]
    fn strings_are_quoted_for_typst() {
        assert_eq!(typst_string(r#"a "b" \ c"#), r#""a \"b\" \\ c""#);
        assert_eq!(typst_string("#hash $x"), "\"#hash $x\"");
    }

    #[test]
    fn builder_keeps_defaults_for_unset_fields() {
        let config = PdfConfig::builder().font_size(10.0).build();
        assert_eq!(config.font_size, 10.0);
        assert_eq!(config.page_size, PageSize::A4);
        assert_eq!(config.content_bottom(), 841.89 - 50.0);
    }

    #[test]
    fn settings_default_to_five_attempts() {
        assert_eq!(Settings::default().allocation_attempts, 5);
    }
}
