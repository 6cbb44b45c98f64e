pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{dim, error, header, identity_line, info, muted, section, status, success, summary_row, warn};
pub use table::{fields_table, stats_table, TableBuilder};
pub use theme::{theme, Theme, Tone};
