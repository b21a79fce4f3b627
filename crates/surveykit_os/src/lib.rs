#![forbid(unsafe_code)]

pub mod demo_seed;
pub mod survey_manager;
pub mod survey_viewer;

pub use survey_manager::{ManagerError, RevealMode, SurveyManager, SurveyManagerConfig};
pub use survey_viewer::{SurveyView, SurveyViewer, SurveyViewerConfig, ViewerError};
