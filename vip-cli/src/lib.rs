// 私有模块声明
mod app;
mod cli;
mod commands;
pub mod health_server;
pub mod project_info;
mod utils;

// 通过 pub use 精确控制对外暴露的接口
pub use app::CliApp;
pub use cli::{Cli, Commands};
pub use health_server::HealthState;
pub use utils::{LOG_DIR_ENV, setup_logging};
