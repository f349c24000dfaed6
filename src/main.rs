//! roll's main application entry point.

use roll::{
    cli::{get_args, run},
    error::default_error_handler,
    logger::init_logger,
};

/// Main application entry point.
fn main() {
    let args = get_args();
    init_logger(args.verbose);

    match run(args) {
        Ok(code) => std::process::exit(code),
        Err(err) => default_error_handler(err),
    }
}
