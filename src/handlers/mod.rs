pub mod code_handlers;
pub mod health_handlers;
pub mod timeout;
