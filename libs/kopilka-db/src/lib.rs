pub mod db;
pub mod models;
pub mod repositories;

pub use sqlx;

pub use db::init_db;
