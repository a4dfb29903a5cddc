pub mod density_plot;
pub mod kde;
pub mod pdf_backend;
pub mod report;
