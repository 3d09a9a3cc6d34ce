mod app;
mod catalog;
mod cli;
mod config;
mod game;
mod manifest;
mod ui;
mod view;

use anyhow::Result;

fn main() -> Result<()> {
    cli::run()
}
