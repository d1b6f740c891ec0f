mod animation;
mod app;
mod body;
mod canvas;
mod color;
mod config;
mod logging;
mod render;
mod term;

use anyhow::Result;

fn main() -> Result<()> {
    app::run()
}
