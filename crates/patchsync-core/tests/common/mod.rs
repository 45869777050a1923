#![allow(dead_code)]

pub mod patch_server;
