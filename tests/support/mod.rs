#![allow(dead_code)]

pub mod fixtures;
pub mod flaky_repo;
pub mod scripted_model;
pub mod worker_env;
