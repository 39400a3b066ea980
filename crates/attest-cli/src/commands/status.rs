//! Status command implementation.

use crate::cli::StatusArgs;
use crate::error::Result;
use crate::output::Formatter;
use attest_domain::traits::SessionStore;
use attest_store::FsSessionStore;
use std::path::Path;

/// Execute the status command.
pub fn execute_status(args: StatusArgs, sessions_dir: &Path, formatter: &Formatter) -> Result<()> {
    let store = FsSessionStore::open(sessions_dir, &args.session)?;
    let state = store.state()?;

    println!("{}", formatter.format_session(&state)?);
    Ok(())
}
