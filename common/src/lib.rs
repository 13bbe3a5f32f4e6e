pub mod convert;
pub mod files;
pub mod status;

pub use convert::{
    ConversionResultResponse, ErrorDetail, HealthResponse, OutputFormat, SheetResult,
    TaskCreatedResponse,
};
pub use files::{extension_of, is_allowed_file_name, ALLOWED_EXTENSIONS};
pub use status::{TaskId, TaskState, TaskStatusResponse};
