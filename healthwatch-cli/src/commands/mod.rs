pub mod check;
pub mod demo;
pub mod ping;
pub mod serve;
pub mod watch;
