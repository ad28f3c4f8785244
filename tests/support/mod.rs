#![allow(dead_code)]

pub mod site;
pub mod socket_guard;
