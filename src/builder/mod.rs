pub mod controls;
pub mod selection;
pub mod session;
pub mod state;

pub use controls::{ControlInput, FilterControl, RenderedFilter, ALL_OPTION};
pub use selection::{ColumnSelection, NO_GROUPING};
pub use session::{GeneratedCallback, ReportBuilder};
pub use state::BuilderState;
