pub mod builder;
pub mod composer;
pub mod generator;
pub mod layout;

pub use builder::{TextStyle, TypstWriter};
pub use composer::{ComposedDocument, DocumentComposer};
pub use generator::{PdfGenerator, RenderedDocument, PDF_CONTENT_TYPE};
pub use layout::{
    clip_lines, wrap_lines, ColumnDef, PageLayout, Placement, TableGeometry,
    TableLayoutEngine, TablePage, TablePlan, Trailer,
};
