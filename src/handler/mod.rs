pub mod bootstrap;
pub mod context;
pub mod publish;
pub mod registry;
pub mod script_action;
