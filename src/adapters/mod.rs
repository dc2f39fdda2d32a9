// Concrete implementations of the domain ports: HTTP APIs, local files and SQLite.

pub mod http;
pub mod isu;
pub mod open_meteo;
pub mod speed_skating;
pub mod sqlite;
pub mod storage;
pub mod tables;
