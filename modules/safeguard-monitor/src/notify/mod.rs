pub mod backend;
pub mod dispatcher;
pub mod log;
pub mod noop;
pub mod slack;
pub mod webhook;
