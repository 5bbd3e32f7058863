pub mod common;

mod auth_handler_flow;
