pub mod config;
pub mod error;
pub mod manifest;
pub mod traits;

pub mod prelude {
    pub use super::config::*;
    pub use super::error::*;
    pub use super::manifest::*;
    pub use super::traits::*;
}
