pub mod limiter;
pub mod utils;

pub use limiter::run_limiter_command;
