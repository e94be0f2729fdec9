pub mod build;
pub mod serve;
pub mod stage;
pub mod watch;
