pub mod export;
pub mod formatter;

pub use export::{default_file_name, render_export, write_export, ExportDocument, ExportFormat};
pub use formatter::{
    format_average, format_decimal, format_group_table, format_module_table, format_score,
    format_summary, should_use_colors, status_label, truncate_name,
};
