pub mod crawler;
pub mod export_sink;
pub mod job_controller;
pub mod reference_data;
pub mod serper_client;

pub use crawler::*;
pub use export_sink::*;
pub use job_controller::*;
pub use reference_data::*;
pub use serper_client::*;
