pub mod plot_predictions;
pub mod plots;
pub mod question_options;
pub mod question_predictions;
pub mod questions;
pub mod shows;

pub use plot_predictions as plot_prediction_entity;
pub use plots as plot_entity;
pub use question_options as question_option_entity;
pub use question_predictions as question_prediction_entity;
pub use questions as question_entity;
pub use shows as show_entity;
