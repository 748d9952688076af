//! Data root layout and recorded session reading

pub mod layout;
pub mod reader;

pub use layout::DataLayout;
pub use reader::{is_valid_data_root, BundleError, CalibrationStill, DepthFrameFile, ImuRow, RecordedSession};
