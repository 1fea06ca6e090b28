pub mod probe;
pub mod token;
pub mod user;

pub use probe::StorageProbe;
pub use token::{InMemoryTokenRepository, TokenRepository};
pub use user::{InMemoryUserRepository, UserRepository};
