//! Turns an [`InvoiceDocument`] into paginated Typst markup.
//!
//! Everything that can reject a document (missing profiles, no items, totals
//! that do not add up, an amount the speller refuses) is checked before the
//! first byte reaches the sink. After that only the sink itself can fail.

use std::io::Write;

use rust_decimal::Decimal;

use super::builder::{TextStyle, TypstWriter};
use super::layout::{
    clip_lines, wrap_lines, PageLayout, TableGeometry, TableLayoutEngine, TablePlan, Trailer,
};
use crate::core::{
    format_amount, format_date, format_quantity, ColumnAlign, DocumentError, DocumentResult,
    Money,
};
use crate::models::{items_total, InvoiceDocument, IssuerProfile, LineItem, RecipientProfile};
use crate::words::amount_to_words;

const ISSUER_LINES: usize = 9;
const RECIPIENT_LINES: usize = 5;
const TITLE_MAX_LINES: usize = 2;
const SUMMARY_GAP: f32 = 20.0;
const SIGNATURE_GAP: f32 = 45.0;
const SIGNATURE_WIDTH: f32 = 180.0;

/// Output of a successful composition.
#[derive(Debug)]
pub struct ComposedDocument<W> {
    pub sink: W,
    pub pages: usize,
}

/// Validated figures printed in the summary block.
struct Summary<'a> {
    issuer: &'a IssuerProfile,
    recipient: &'a RecipientProfile,
    total: Decimal,
    paid: Decimal,
    currency: &'static str,
    words: Vec<String>,
}

/// Digit amounts carry the currency code of the document's locale, the same
/// one the amount in words ends with.
#[derive(Debug, Clone)]
pub struct DocumentComposer {
    layout: PageLayout,
}

impl Default for DocumentComposer {
    fn default() -> Self {
        DocumentComposer::new(PageLayout::default())
    }
}

impl DocumentComposer {
    pub fn new(layout: PageLayout) -> Self {
        DocumentComposer { layout }
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    /// Writes `doc` to `sink` as a complete Typst document.
    ///
    /// `paid` is the amount already settled; it defaults to zero and may not
    /// be negative. Identical inputs always produce identical bytes.
    pub fn compose<W: Write>(
        &self,
        doc: &InvoiceDocument,
        paid: Option<Decimal>,
        sink: W,
    ) -> DocumentResult<ComposedDocument<W>> {
        let summary = self.validate(doc, paid)?;
        let plan = self.plan(doc, &summary)?;
        let page_count = plan.page_count();

        let pdf = &self.layout.pdf;
        let title = format!("Invoice {}", doc.number);
        let mut out = TypstWriter::open(sink, pdf, &title)?;

        for page in 0..page_count {
            out.begin_page()?;
            if page == 0 {
                self.write_parties(&mut out, doc, &summary)?;
            }

            if let Some(table_page) = plan.pages.get(page) {
                self.write_table_header(&mut out, table_page.header_y)?;
                let rows = plan.rows_on(page, &doc.items);
                for (offset, item) in rows.iter().enumerate() {
                    let y = table_page.row_y(table_page.rows.start + offset, self.layout.row_height);
                    self.write_row(&mut out, item, y)?;
                }
            }

            if let Some(totals) = plan.totals.filter(|t| t.page == page) {
                self.write_totals(&mut out, totals.y, summary.total)?;
            }
            if plan.summary.page == page {
                self.write_summary(&mut out, plan.summary.y, &summary)?;
            }

            self.write_footer(&mut out, page + 1, page_count)?;
        }

        let pages = out.pages();
        let sink = out.finish()?;
        tracing::debug!(number = %doc.number, pages, "composed invoice");

        Ok(ComposedDocument { sink, pages })
    }

    fn validate<'a>(
        &self,
        doc: &'a InvoiceDocument,
        paid: Option<Decimal>,
    ) -> DocumentResult<Summary<'a>> {
        let issuer = doc
            .issuer
            .as_ref()
            .ok_or_else(|| DocumentError::missing("issuer profile"))?;
        let recipient = doc
            .recipient
            .as_ref()
            .ok_or_else(|| DocumentError::missing("recipient profile"))?;
        if doc.items.is_empty() {
            return Err(DocumentError::missing("invoice has no line items"));
        }

        let sum = items_total(&doc.items)?;
        if sum != doc.total_amount {
            return Err(DocumentError::Consistency(format!(
                "items of {} add up to {}, invoice total is {}",
                doc.number, sum, doc.total_amount
            )));
        }

        let paid = paid.unwrap_or(Decimal::ZERO);
        if paid < Decimal::ZERO {
            return Err(DocumentError::invalid_amount(format!(
                "paid amount cannot be negative: {}",
                paid
            )));
        }

        let words = amount_to_words(doc.total_amount, doc.locale)?;
        let chars = (self.layout.pdf.content_width() / (self.layout.pdf.font_size * 0.55)).floor();
        let words = wrap_lines(&format!("In words: {}", words), chars as usize);

        Ok(Summary {
            issuer,
            recipient,
            total: doc.total_amount,
            paid,
            currency: doc.locale.lexicon().currency_code,
            words,
        })
    }

    fn step(&self) -> f32 {
        self.layout.pdf.line_height + 3.0
    }

    fn plan(&self, doc: &InvoiceDocument, summary: &Summary<'_>) -> DocumentResult<TablePlan> {
        let pdf = &self.layout.pdf;
        let step = self.step();
        let parties_bottom =
            pdf.margin.top + (ISSUER_LINES + 1 + RECIPIENT_LINES) as f32 * step;

        let engine = TableLayoutEngine::new(TableGeometry {
            row_height: self.layout.row_height,
            first_page_top: parties_bottom + step,
            page_top: pdf.margin.top,
            content_bottom: pdf.content_bottom(),
        });

        engine.paginate(
            &doc.items,
            Trailer {
                totals_row: true,
                gap: SUMMARY_GAP,
                summary_height: self.summary_height(summary),
            },
        )
    }

    fn summary_height(&self, summary: &Summary<'_>) -> f32 {
        let lines = 3 + summary.words.len();
        lines as f32 * self.step() + SIGNATURE_GAP + self.step()
    }

    fn write_parties<W: Write>(
        &self,
        out: &mut TypstWriter<W>,
        doc: &InvoiceDocument,
        summary: &Summary<'_>,
    ) -> DocumentResult<()> {
        let pdf = &self.layout.pdf;
        let size = pdf.font_size;
        let step = self.step();
        let left = pdf.margin.left;
        let top = pdf.margin.top;

        let issuer = summary.issuer;
        let issuer_lines = [
            issuer.full_name.clone(),
            issuer.company_name.clone(),
            format!("NIP: {}", issuer.nip),
            issuer.address.one_line(),
            format!("Bank: {}", or_dash(issuer.bank.as_deref())),
            format!("Account: {}", or_dash(issuer.account.as_deref())),
            format!("Phone: {}", or_dash(issuer.phone.as_deref())),
            format!("Email: {}", issuer.email),
        ];
        out.text(left, top, "Seller", TextStyle::bold(size))?;
        for (i, line) in issuer_lines.iter().enumerate() {
            out.text(left, top + (i + 1) as f32 * step, line, TextStyle::regular(size))?;
        }

        let recipient = summary.recipient;
        let recipient_top = top + (ISSUER_LINES + 1) as f32 * step;
        let recipient_lines = [
            recipient.name.clone(),
            recipient.address.one_line(),
            format!("PESEL: {}", or_dash(recipient.pesel.as_deref())),
            format!("Email: {}", or_dash(recipient.email.as_deref())),
        ];
        out.text(left, recipient_top, "Buyer", TextStyle::bold(size))?;
        for (i, line) in recipient_lines.iter().enumerate() {
            out.text(
                left,
                recipient_top + (i + 1) as f32 * step,
                line,
                TextStyle::regular(size),
            )?;
        }

        let meta_x = left + pdf.content_width() * 0.55;
        let meta_width = self.layout.table_right() - meta_x;
        let mut meta_lines = vec![
            format!("Issue date: {}", format_date(doc.issue_date)),
            format!("Due date: {}", format_date(doc.due_date)),
            format!(
                "Payment method: {}",
                or_dash(doc.payment_method.map(|m| m.label()))
            ),
            format!("Status: {}", doc.status.as_str()),
        ];
        if let Some(title) = &doc.title {
            let chars = (meta_width / (size * 0.55)).floor() as usize;
            let lines = wrap_lines(&format!("Title: {}", title), chars);
            if lines.len() > TITLE_MAX_LINES {
                tracing::warn!(number = %doc.number, lines = lines.len(), "title cut to fit the header");
            }
            meta_lines.extend(clip_lines(lines, chars, TITLE_MAX_LINES));
        }

        out.text(
            meta_x,
            top,
            &format!("Invoice {}", doc.number),
            TextStyle::bold(size + 3.0),
        )?;
        for (i, line) in meta_lines.iter().enumerate() {
            out.text(meta_x, top + (i + 1) as f32 * step + 3.0, line, TextStyle::regular(size))?;
        }
        Ok(())
    }

    fn write_table_header<W: Write>(&self, out: &mut TypstWriter<W>, y: f32) -> DocumentResult<()> {
        let layout = &self.layout;
        let left = layout.pdf.margin.left;
        let width = layout.table_right() - left;
        let pad = layout.cell_padding;

        out.fill_rect(left, y, width, layout.row_height, 230)?;
        for column in &layout.columns {
            out.text_in_box(
                column.x + pad,
                y + pad,
                column.width - 2.0 * pad,
                column.align,
                &column.label,
                TextStyle::bold(layout.pdf.font_size),
            )?;
        }
        out.hline(left, y + layout.row_height, width, 0.8)?;
        Ok(())
    }

    fn write_row<W: Write>(
        &self,
        out: &mut TypstWriter<W>,
        item: &LineItem,
        y: f32,
    ) -> DocumentResult<()> {
        let layout = &self.layout;
        let pad = layout.cell_padding;
        let cells = [
            item.position.to_string(),
            item.name.clone(),
            format_quantity(item.quantity),
            item.unit.clone(),
            format_amount(item.unit_price),
            format_amount(item.line_total()),
        ];

        for (column, value) in layout.columns.iter().zip(cells.iter()) {
            let lines = if column.wraps {
                let chars = layout.chars_per_line(column);
                let max_lines = layout.lines_per_row();
                let lines = wrap_lines(value, chars);
                if lines.len() > max_lines {
                    tracing::warn!(
                        position = item.position,
                        column = %column.label,
                        lines = lines.len(),
                        max_lines,
                        "item text cut to fit its row"
                    );
                }
                clip_lines(lines, chars, max_lines)
            } else {
                vec![value.clone()]
            };
            for (i, line) in lines.iter().enumerate() {
                out.text_in_box(
                    column.x + pad,
                    y + pad + i as f32 * layout.pdf.line_height,
                    column.width - 2.0 * pad,
                    column.align,
                    line,
                    TextStyle::regular(layout.pdf.font_size),
                )?;
            }
        }

        let left = layout.pdf.margin.left;
        out.hline(left, y + layout.row_height, layout.table_right() - left, 0.3)?;
        Ok(())
    }

    fn write_totals<W: Write>(
        &self,
        out: &mut TypstWriter<W>,
        y: f32,
        total: Decimal,
    ) -> DocumentResult<()> {
        let layout = &self.layout;
        let pad = layout.cell_padding;
        let style = TextStyle::bold(layout.pdf.font_size);

        if let [.., label_column, amount_column] = layout.columns.as_slice() {
            out.text_in_box(
                label_column.x + pad,
                y + pad,
                label_column.width - 2.0 * pad,
                ColumnAlign::Right,
                "Total",
                style,
            )?;
            out.text_in_box(
                amount_column.x + pad,
                y + pad,
                amount_column.width - 2.0 * pad,
                amount_column.align,
                &format_amount(total),
                style,
            )?;
            out.hline(
                label_column.x,
                y + layout.row_height,
                layout.table_right() - label_column.x,
                0.8,
            )?;
        }
        Ok(())
    }

    fn write_summary<W: Write>(
        &self,
        out: &mut TypstWriter<W>,
        y: f32,
        summary: &Summary<'_>,
    ) -> DocumentResult<()> {
        let pdf = &self.layout.pdf;
        let size = pdf.font_size;
        let step = self.step();
        let left = pdf.margin.left;
        let mut y = y;

        out.text(
            left,
            y,
            &format!("Total due: {}", money(summary.total, summary.currency)),
            TextStyle::bold(size),
        )?;
        y += step;
        for line in &summary.words {
            out.text(left, y, line, TextStyle::regular(size))?;
            y += step;
        }
        out.text(
            left,
            y,
            &format!("Paid: {}", money(summary.paid, summary.currency)),
            TextStyle::regular(size),
        )?;
        y += step;
        out.text(
            left,
            y,
            &format!("Outstanding: {}", money(summary.total - summary.paid, summary.currency)),
            TextStyle::bold(size),
        )?;
        y += SIGNATURE_GAP;

        let right = self.layout.table_right() - SIGNATURE_WIDTH;
        for (x, caption) in [(left, "Authorized to issue"), (right, "Authorized to receive")] {
            out.hline(x, y, SIGNATURE_WIDTH, 0.5)?;
            out.text_in_box(
                x,
                y + 3.0,
                SIGNATURE_WIDTH,
                ColumnAlign::Center,
                caption,
                TextStyle::regular(size - 1.0),
            )?;
        }
        Ok(())
    }

    fn write_footer<W: Write>(
        &self,
        out: &mut TypstWriter<W>,
        page: usize,
        page_count: usize,
    ) -> DocumentResult<()> {
        let pdf = &self.layout.pdf;
        out.text_in_box(
            pdf.margin.left,
            pdf.content_bottom() + self.step(),
            pdf.content_width(),
            ColumnAlign::Center,
            &format!("Page {} of {}", page, page_count),
            TextStyle::regular(pdf.font_size - 1.0),
        )?;
        Ok(())
    }
}

fn money(amount: Decimal, currency: &str) -> String {
    Money::new(amount, currency).format()
}

fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("-")
}
