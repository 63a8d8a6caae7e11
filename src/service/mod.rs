pub mod calendar_service;
pub mod vehicle_service;
