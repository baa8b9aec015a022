pub mod audit_logs;
pub mod certificates;
pub mod events;
pub mod registrations;
pub mod users;
