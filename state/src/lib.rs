pub mod errors;
pub mod safe_view;
pub mod staged_view;

pub use errors::{StateError, StateResult};
pub use safe_view::SafeView;
pub use staged_view::StagedView;
