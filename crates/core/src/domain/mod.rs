pub mod result;
pub mod session;
