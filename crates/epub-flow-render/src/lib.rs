//! Flow engine, display list and pagination for `epub-flow`.

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

mod display_list;
mod flow;
mod font;
mod mode;
mod page_index;
mod paginate;

pub use display_list::{DisplayDriver, DisplayList, DisplayListEntry, Dim, PaintOptions, Point};
pub use epub_flow::{FlowItem, Format};
pub use flow::{distribute_slack, FlowEngine, FlowImage, FlowState, PageConfig};
pub use font::{FontEngine, GlyphBitmap, GlyphMetrics, MonospaceFontEngine};
pub use mode::{Capabilities, ComputeMode};
pub use page_index::{FilePageIndexStore, PageIndex, PageIndexStore, PaginationProfileId};
pub use paginate::{
    CancelToken, NeverCancel, PagePosition, PageStart, PaginateError, Paginator,
    PaginatorOptions, RenderedPage, ResumeState,
};
