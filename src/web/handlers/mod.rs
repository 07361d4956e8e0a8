pub mod accounts;
pub mod catalog;
pub mod rentals;
pub mod reports;
pub mod services;
pub mod system;
pub mod wallet;
