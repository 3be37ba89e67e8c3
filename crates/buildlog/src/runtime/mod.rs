//! Runtime module — process lifecycle: boot, replay one delivery, shutdown.

pub mod boot;
pub mod replay;
pub mod stop;
