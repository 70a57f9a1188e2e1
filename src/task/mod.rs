pub mod camera;
pub mod coordinate;
pub mod http_server;
pub mod indicate;
pub mod network;
pub mod resources;
pub mod servo;
pub mod ultrasonic;
