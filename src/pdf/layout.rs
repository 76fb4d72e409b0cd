//! Pagination of the item table.
//!
//! Rows have a fixed height. A page holds a header row followed by as many
//! item rows as fit above the content bottom; the header is repeated at the
//! top of every table page. The last item row is kept together with the
//! totals row, and once all rows are placed a single check decides whether
//! the summary block still fits on the last page or opens a fresh one.

use std::ops::Range;

use crate::core::{ColumnAlign, DocumentError, DocumentResult, PdfConfig};

/// One table column: header label, left edge and width, all in points.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub label: String,
    pub x: f32,
    pub width: f32,
    pub align: ColumnAlign,
    /// Text columns wrap; numeric columns are printed on one line.
    pub wraps: bool,
}

impl ColumnDef {
    pub fn text(label: &str, x: f32, width: f32) -> Self {
        ColumnDef {
            label: label.to_string(),
            x,
            width,
            align: ColumnAlign::Left,
            wraps: true,
        }
    }

    pub fn numeric(label: &str, x: f32, width: f32) -> Self {
        ColumnDef {
            label: label.to_string(),
            x,
            width,
            align: ColumnAlign::Right,
            wraps: false,
        }
    }
}

/// Static style of an invoice: page geometry, columns and row metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    pub pdf: PdfConfig,
    pub columns: Vec<ColumnDef>,
    pub row_height: f32,
    pub cell_padding: f32,
}

impl Default for PageLayout {
    fn default() -> Self {
        PageLayout::for_config(PdfConfig::default())
    }
}

impl PageLayout {
    /// Six-column invoice table spanning the content width of `pdf`.
    pub fn for_config(pdf: PdfConfig) -> Self {
        let left = pdf.margin.left;
        let widths = [30.0, 185.0, 50.0, 45.0, 85.0];
        let used: f32 = widths.iter().sum();
        let amount_width = (pdf.content_width() - used).max(60.0);

        let mut x = left;
        let mut next = |width: f32| {
            let start = x;
            x += width;
            start
        };

        let columns = vec![
            ColumnDef::numeric("Lp.", next(widths[0]), widths[0]),
            ColumnDef::text("Item", next(widths[1]), widths[1]),
            ColumnDef::numeric("Qty", next(widths[2]), widths[2]),
            ColumnDef::text("Unit", next(widths[3]), widths[3]),
            ColumnDef::numeric("Price", next(widths[4]), widths[4]),
            ColumnDef::numeric("Amount", next(amount_width), amount_width),
        ];

        let cell_padding = 3.0;
        PageLayout {
            row_height: pdf.line_height * 2.0 + 2.0 * cell_padding,
            cell_padding,
            pdf,
            columns,
        }
    }

    pub fn header_labels(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.label.as_str()).collect()
    }

    /// Right edge of the table.
    pub fn table_right(&self) -> f32 {
        self.columns
            .last()
            .map(|c| c.x + c.width)
            .unwrap_or(self.pdf.page_width() - self.pdf.margin.right)
    }

    /// Text lines that fit in one row.
    pub fn lines_per_row(&self) -> usize {
        (((self.row_height - 2.0 * self.cell_padding) / self.pdf.line_height).floor() as usize)
            .max(1)
    }

    /// Rough glyph budget for a column, from an average glyph width of
    /// 0.55 em.
    pub fn chars_per_line(&self, column: &ColumnDef) -> usize {
        let usable = column.width - 2.0 * self.cell_padding;
        ((usable / (self.pdf.font_size * 0.55)).floor() as usize).max(1)
    }
}

/// Vertical extents of the table on first and continuation pages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableGeometry {
    pub row_height: f32,
    /// y of the header row on the first page.
    pub first_page_top: f32,
    /// y of the header row on continuation pages.
    pub page_top: f32,
    /// Row bottoms may reach this y but never pass it.
    pub content_bottom: f32,
}

/// What follows the last item row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trailer {
    pub totals_row: bool,
    /// Space between the table and the summary block.
    pub gap: f32,
    pub summary_height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TablePage {
    pub header_y: f32,
    /// Indices into the row sequence.
    pub rows: Range<usize>,
}

impl TablePage {
    /// Top of the row at `index`, which must fall in `self.rows`.
    pub fn row_y(&self, index: usize, row_height: f32) -> f32 {
        self.header_y + row_height * (index - self.rows.start + 1) as f32
    }

    /// Bottom of the last row on the page, or of the header when empty.
    pub fn bottom(&self, row_height: f32) -> f32 {
        self.header_y + row_height * (self.rows.len() + 1) as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub page: usize,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TablePlan {
    pub pages: Vec<TablePage>,
    pub totals: Option<Placement>,
    pub summary: Placement,
}

impl TablePlan {
    /// Pages in the document, counting a summary-only page.
    pub fn page_count(&self) -> usize {
        self.pages.len().max(self.summary.page + 1)
    }

    pub fn rows_on<'a, T>(&self, page: usize, rows: &'a [T]) -> &'a [T] {
        self.pages
            .get(page)
            .map(|p| &rows[p.rows.clone()])
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone)]
pub struct TableLayoutEngine {
    geometry: TableGeometry,
}

impl TableLayoutEngine {
    pub fn new(geometry: TableGeometry) -> Self {
        TableLayoutEngine { geometry }
    }

    pub fn paginate<T>(&self, rows: &[T], trailer: Trailer) -> DocumentResult<TablePlan> {
        let g = self.geometry;
        if g.row_height <= 0.0 {
            return Err(DocumentError::Layout(format!(
                "row height must be positive, got {}",
                g.row_height
            )));
        }

        let mut pages = Vec::new();
        let mut header_y = g.first_page_top;
        let mut start = 0;
        // Bottom edge of the last thing placed on the current page.
        let mut cursor = header_y + g.row_height;

        for i in 0..rows.len() {
            let is_last = i + 1 == rows.len();
            let needed = if is_last && trailer.totals_row {
                2.0 * g.row_height
            } else {
                g.row_height
            };

            if cursor + needed > g.content_bottom {
                if i == start {
                    return Err(DocumentError::Layout(format!(
                        "page cannot hold a single row (header at {}, bottom {})",
                        header_y, g.content_bottom
                    )));
                }
                pages.push(TablePage {
                    header_y,
                    rows: start..i,
                });
                header_y = g.page_top;
                start = i;
                cursor = header_y + g.row_height;

                if cursor + needed > g.content_bottom {
                    return Err(DocumentError::Layout(format!(
                        "continuation page cannot hold a single row (header at {}, bottom {})",
                        header_y, g.content_bottom
                    )));
                }
            }
            cursor += g.row_height;
        }
        pages.push(TablePage {
            header_y,
            rows: start..rows.len(),
        });

        let last_page = pages.len() - 1;
        let totals = if trailer.totals_row {
            let placement = Placement {
                page: last_page,
                y: cursor,
            };
            cursor += g.row_height;
            Some(placement)
        } else {
            None
        };

        let summary_y = cursor + trailer.gap;
        let summary = if summary_y + trailer.summary_height <= g.content_bottom {
            Placement {
                page: last_page,
                y: summary_y,
            }
        } else {
            if g.page_top + trailer.summary_height > g.content_bottom {
                return Err(DocumentError::Layout(format!(
                    "summary block of {}pt does not fit on a page",
                    trailer.summary_height
                )));
            }
            Placement {
                page: last_page + 1,
                y: g.page_top,
            }
        };

        Ok(TablePlan {
            pages,
            totals,
            summary,
        })
    }
}

/// Greedy word wrap into lines of at most `max_chars` characters. Words
/// longer than a line are split.
pub fn wrap_lines(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        loop {
            let current_len = current.chars().count();
            let needed = if current.is_empty() { word.len() } else { current_len + 1 + word.len() };
            if needed <= max_chars {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.extend(word.iter());
                break;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                continue;
            }
            // Word longer than a whole line.
            let rest = word.split_off(max_chars);
            lines.push(word.iter().collect());
            word = rest;
            if word.is_empty() {
                break;
            }
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Keeps the first `max_lines` of wrapped lines. A cut ends the last kept
/// line with `…`.
pub fn clip_lines(mut lines: Vec<String>, max_chars: usize, max_lines: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if lines.len() > max_lines {
        lines.truncate(max_lines.max(1));
        if let Some(last) = lines.last_mut() {
            let mut chars: Vec<char> = last.chars().collect();
            chars.truncate(max_chars.saturating_sub(1));
            chars.push('…');
            *last = chars.into_iter().collect();
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn wrap_text(text: &str, max_chars: usize, max_lines: usize) -> Vec<String> {
        clip_lines(wrap_lines(text, max_chars), max_chars, max_lines)
    }

    fn thirty_row_pages() -> TableLayoutEngine {
        TableLayoutEngine::new(TableGeometry {
            row_height: 10.0,
            first_page_top: 0.0,
            page_top: 0.0,
            content_bottom: 310.0,
        })
    }

    fn trailer(summary_height: f32) -> Trailer {
        Trailer {
            totals_row: true,
            gap: 0.0,
            summary_height,
        }
    }

    #[test]
    fn forty_seven_items_take_two_pages() {
        let rows: Vec<u32> = (1..=47).collect();
        let plan = thirty_row_pages().paginate(&rows, trailer(40.0)).unwrap();

        assert_eq!(plan.pages.len(), 2);
        assert_eq!(plan.pages[0].rows, 0..30);
        assert_eq!(plan.pages[1].rows, 30..47);
        assert_eq!(plan.pages[1].header_y, 0.0);
        assert_eq!(plan.totals, Some(Placement { page: 1, y: 180.0 }));
        assert_eq!(plan.summary, Placement { page: 1, y: 190.0 });
        assert_eq!(plan.page_count(), 2);
    }

    #[test]
    fn full_page_fits_exactly_without_totals() {
        let rows: Vec<u32> = (0..30).collect();
        let plan = thirty_row_pages()
            .paginate(
                &rows,
                Trailer {
                    totals_row: false,
                    gap: 0.0,
                    summary_height: 0.0,
                },
            )
            .unwrap();
        assert_eq!(plan.pages.len(), 1);
        assert_eq!(plan.pages[0].bottom(10.0), 310.0);
    }

    #[test]
    fn last_row_moves_with_totals_row() {
        let rows: Vec<u32> = (0..30).collect();
        let plan = thirty_row_pages().paginate(&rows, trailer(0.0)).unwrap();

        assert_eq!(plan.pages[0].rows, 0..29);
        assert_eq!(plan.pages[1].rows, 29..30);
        assert_eq!(plan.totals, Some(Placement { page: 1, y: 20.0 }));
    }

    #[test]
    fn summary_is_pushed_to_a_fresh_page() {
        let rows: Vec<u32> = (0..29).collect();
        let plan = thirty_row_pages().paginate(&rows, trailer(50.0)).unwrap();

        assert_eq!(plan.pages.len(), 1);
        assert_eq!(plan.totals, Some(Placement { page: 0, y: 300.0 }));
        assert_eq!(plan.summary, Placement { page: 1, y: 0.0 });
        assert_eq!(plan.page_count(), 2);
    }

    #[test]
    fn first_page_can_start_lower() {
        let engine = TableLayoutEngine::new(TableGeometry {
            row_height: 10.0,
            first_page_top: 200.0,
            page_top: 0.0,
            content_bottom: 310.0,
        });
        let rows: Vec<u32> = (0..20).collect();
        let plan = engine.paginate(&rows, trailer(0.0)).unwrap();

        assert_eq!(plan.pages[0].rows, 0..10);
        assert_eq!(plan.pages[0].row_y(0, 10.0), 210.0);
        assert_eq!(plan.pages[1].rows, 10..20);
        assert_eq!(plan.rows_on(1, &rows), &rows[10..20]);
        assert!(plan.rows_on(5, &rows).is_empty());
    }

    #[test]
    fn impossible_geometry_is_an_error() {
        let engine = TableLayoutEngine::new(TableGeometry {
            row_height: 10.0,
            first_page_top: 0.0,
            page_top: 0.0,
            content_bottom: 15.0,
        });
        let err = engine.paginate(&[1], trailer(0.0)).unwrap_err();
        assert!(matches!(err, DocumentError::Layout(_)));

        let err = thirty_row_pages().paginate(&[1], trailer(400.0)).unwrap_err();
        assert!(matches!(err, DocumentError::Layout(_)));
    }

    #[test]
    fn default_layout_has_invoice_columns() {
        let layout = PageLayout::default();
        assert_eq!(
            layout.header_labels(),
            vec!["Lp.", "Item", "Qty", "Unit", "Price", "Amount"]
        );
        assert!((layout.table_right() - (595.28 - 50.0)).abs() < 0.01);
        assert_eq!(layout.lines_per_row(), 2);
    }

    #[test]
    fn wraps_on_word_boundaries() {
        assert_eq!(
            wrap_text("usługa programistyczna marzec", 12, 3),
            vec!["usługa", "programistyc", "zna marzec"]
        );
        assert_eq!(wrap_text("ab cd ef", 5, 3), vec!["ab cd", "ef"]);
        assert_eq!(wrap_text("", 5, 2), vec![""]);
    }

    #[test]
    fn truncates_with_ellipsis() {
        let lines = wrap_text("one two three four five six", 9, 2);
        assert_eq!(lines, vec!["one two", "three…"]);
    }

    #[test]
    fn unbounded_wrap_keeps_every_word() {
        let lines = wrap_lines("one two three four five six", 9);
        assert_eq!(lines, vec!["one two", "three", "four five", "six"]);
        assert_eq!(clip_lines(lines.clone(), 9, 4), lines);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Every row lands on exactly one page, in order, and nothing crosses
        /// the content bottom.
        #[test]
        fn rows_are_conserved_and_stay_on_the_page(
            totals in prop::collection::vec(0i64..1_000_000, 0..200),
            rows_per_page in 5u32..40,
            first_offset in 0u32..3,
            summary_rows in 0u32..3,
        ) {
            let row_height = 12.0f32;
            let content_bottom = row_height * rows_per_page as f32;
            let engine = TableLayoutEngine::new(TableGeometry {
                row_height,
                first_page_top: row_height * first_offset as f32,
                page_top: 0.0,
                content_bottom,
            });
            let plan = engine
                .paginate(&totals, Trailer {
                    totals_row: true,
                    gap: 0.0,
                    summary_height: row_height * summary_rows as f32,
                })
                .unwrap();

            let mut next = 0;
            let mut sum = 0i64;
            for (i, page) in plan.pages.iter().enumerate() {
                prop_assert_eq!(page.rows.start, next);
                next = page.rows.end;
                sum += plan.rows_on(i, &totals).iter().sum::<i64>();
                prop_assert!(page.bottom(row_height) <= content_bottom);
            }
            prop_assert_eq!(next, totals.len());
            prop_assert_eq!(sum, totals.iter().sum::<i64>());

            let t = plan.totals.unwrap();
            prop_assert_eq!(t.page, plan.pages.len() - 1);
            prop_assert!(t.y + row_height <= content_bottom);
            prop_assert!(plan.summary.y + row_height * summary_rows as f32 <= content_bottom);
        }

        #[test]
        fn wrapped_lines_respect_width(text in "[a-z ]{0,80}", max_chars in 1usize..20, max_lines in 1usize..4) {
            let lines = wrap_text(&text, max_chars, max_lines);
            prop_assert!(!lines.is_empty());
            prop_assert!(lines.len() <= max_lines);
            for line in lines {
                prop_assert!(line.chars().count() <= max_chars);
            }
        }
    }
}
