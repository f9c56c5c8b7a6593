mod common;
mod simulator;
