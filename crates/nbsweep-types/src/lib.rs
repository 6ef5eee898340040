pub mod execution;
pub mod policy;
pub mod repository;
pub mod resource;

pub use execution::*;
pub use policy::*;
pub use repository::*;
pub use resource::*;
