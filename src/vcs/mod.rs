pub mod github;
pub mod routes;
