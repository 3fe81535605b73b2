pub mod deploy;
pub mod restore;
