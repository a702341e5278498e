//! Domain model: sponsorships, explorers, gateway failures and the ports the
//! reconciler depends on.

pub mod gateway;
pub mod notification;
pub mod ports;
pub mod sponsorship;
pub mod user;
