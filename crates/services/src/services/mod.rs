pub mod catalog;
pub mod query;
pub mod registry;
pub mod resource;
pub mod schema;
pub mod validator;
