pub mod plot_service;
pub mod prediction_service;
pub mod show_service;

pub use plot_service::*;
pub use prediction_service::*;
pub use show_service::*;
