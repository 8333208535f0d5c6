#![doc = include_str!("../README.md")]

pub mod blob;
pub mod download;
pub mod models;
pub mod share;
