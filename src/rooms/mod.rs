pub mod crud;
pub mod files;
