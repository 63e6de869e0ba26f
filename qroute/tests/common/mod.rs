#![allow(dead_code)]

pub mod fakes;
pub mod graphs;
pub mod virtual_network;
