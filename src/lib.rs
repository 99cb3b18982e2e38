pub mod autosave;
pub mod config;
pub mod context;
pub mod draft;
pub mod gate;
pub mod humanize;
pub mod ledger;
pub mod photos;
pub mod remote;
pub mod storage;
pub mod workflow;
