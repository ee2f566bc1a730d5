mod billing;
mod common;
mod maintenance;
