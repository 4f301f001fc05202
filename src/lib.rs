pub mod board;
pub mod moves;
pub mod legality;
pub mod game;
pub mod clock;
pub mod chat;
pub mod communication_protocol;
pub mod network;
pub mod session;
pub mod config;
pub mod error;
