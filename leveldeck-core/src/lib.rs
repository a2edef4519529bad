pub mod bag;
pub mod deck;
pub mod dictionary;
pub mod errors;
pub mod models;
pub mod present;
pub mod service;
pub mod store;

pub use bag::*;
pub use deck::*;
pub use dictionary::*;
pub use errors::*;
pub use models::*;
pub use present::*;
pub use service::*;
pub use store::*;
