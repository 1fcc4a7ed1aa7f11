pub mod instance;
pub mod system;
