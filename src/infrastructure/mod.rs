pub mod container;
pub mod database;
pub mod external_services;
pub mod logging;
