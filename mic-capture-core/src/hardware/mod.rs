pub mod bus;
pub mod channel_map;
pub mod registry;
pub mod validator;
