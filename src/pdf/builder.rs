use std::io::{self, Write};

use crate::core::{typst_string, ColumnAlign, PdfConfig};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    pub bold: bool,
}

impl TextStyle {
    pub fn regular(size: f32) -> Self {
        TextStyle { size, bold: false }
    }

    pub fn bold(size: f32) -> Self {
        TextStyle { size, bold: true }
    }

    fn to_typst(&self) -> String {
        if self.bold {
            format!("size: {:.2}pt, weight: \"bold\"", self.size)
        } else {
            format!("size: {:.2}pt", self.size)
        }
    }
}

/// Forward-only writer of Typst markup with absolutely placed elements.
///
/// Pages are opened in order and every element is written as soon as it is
/// produced; nothing is buffered beyond what the underlying sink does.
/// Coordinates are points from the top-left corner of the page.
pub struct TypstWriter<W: Write> {
    out: W,
    pages: usize,
}

impl<W: Write> TypstWriter<W> {
    pub fn open(mut out: W, config: &PdfConfig, title: &str) -> io::Result<Self> {
        writeln!(out, "{}", config.to_typst_header(title))?;
        Ok(TypstWriter { out, pages: 0 })
    }

    /// Starts the next page. The first call reuses the page Typst opens
    /// implicitly.
    pub fn begin_page(&mut self) -> io::Result<()> {
        if self.pages > 0 {
            writeln!(self.out, "#pagebreak()")?;
        }
        self.pages += 1;
        writeln!(self.out, "// page {}", self.pages)
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn text(&mut self, x: f32, y: f32, text: &str, style: TextStyle) -> io::Result<()> {
        writeln!(
            self.out,
            "#place(top + left, dx: {:.2}pt, dy: {:.2}pt, text({}, {}))",
            x,
            y,
            style.to_typst(),
            typst_string(text)
        )
    }

    /// Text aligned inside a box of `width` points starting at `x`.
    pub fn text_in_box(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        align: ColumnAlign,
        text: &str,
        style: TextStyle,
    ) -> io::Result<()> {
        writeln!(
            self.out,
            "#place(top + left, dx: {:.2}pt, dy: {:.2}pt, box(width: {:.2}pt, align({}, text({}, {}))))",
            x,
            y,
            width,
            align.to_typst(),
            style.to_typst(),
            typst_string(text)
        )
    }

    pub fn hline(&mut self, x: f32, y: f32, length: f32, stroke: f32) -> io::Result<()> {
        writeln!(
            self.out,
            "#place(top + left, dx: {:.2}pt, dy: {:.2}pt, line(length: {:.2}pt, stroke: {:.2}pt))",
            x, y, length, stroke
        )
    }

    /// Filled rectangle, `gray` from 0 (black) to 255 (white).
    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, gray: u8) -> io::Result<()> {
        writeln!(
            self.out,
            "#place(top + left, dx: {:.2}pt, dy: {:.2}pt, rect(width: {:.2}pt, height: {:.2}pt, fill: luma({}), stroke: none))",
            x, y, width, height, gray
        )
    }

    /// Flushes and hands the sink back.
    pub fn finish(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}
