pub mod locks;
pub mod retry;
pub mod warmup;
