pub mod footer;
pub mod header;
pub mod utils;

pub use footer::draw_footer;
pub use header::draw_header;
pub use utils::{
  amount_color, dispatch_status_color, overlay_area, return_status_color, snapshot_title,
  truncate,
};
