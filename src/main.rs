//! # mmake CLI
//!
//! Builds a tree of interdependent modules in dependency order, rebuilding
//! only the modules whose sources changed.
//!
//! ## Commands
//!
//! - **build**: Builds every stale module
//! - **pull**: Checks out every module's git submodule
//! - **clean**: Removes untracked and ignored files
//! - **order**: Prints the resolved build order
//! - **format**: Reformats `manifest.json`
//!
//! ## Quick Start
//!
//! ```bash
//! mmake pull
//! mmake build
//! # after editing a module, only that module's recipe runs
//! mmake build -v
//! ```
//!
//! ## Environment Variables
//!
//! - `MMAKE_BASE_DIR`: Directory holding the manifest (default: .)
//! - `MMAKE_MANIFEST`: Custom manifest location
//! - `MMAKE_VERBOSE`: Enable verbose output
//! - `MMAKE_QUIET`: Silence all output except errors
//! - `MMAKE_STAMP_POLICY`: `always` or `on-success`

use std::io::IsTerminal;

use mmake::cli::Cli;

fn main() -> miette::Result<()> {
    miette::set_panic_hook();

    if std::io::stderr().is_terminal() {
        miette::set_hook(Box::new(|_| {
            Box::new(
                miette::GraphicalReportHandler::new()
                    .with_theme(miette::GraphicalTheme::unicode_nocolor())
                    .with_context_lines(3),
            )
        }))?;
    } else {
        // CI logs and pipes get plain output
        miette::set_hook(Box::new(|_| {
            Box::new(
                miette::GraphicalReportHandler::new()
                    .with_theme(miette::GraphicalTheme::none())
                    .with_context_lines(0),
            )
        }))?;
    }

    let cli = Cli::parse_args();

    mmake::commands::execute(&cli).map_err(Into::into)
}
