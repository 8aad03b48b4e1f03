mod cli;
mod commands;
mod infra;
mod render;

use applytrack::error::AppError;

pub fn run() -> Result<(), AppError> {
    cli::run()
}
