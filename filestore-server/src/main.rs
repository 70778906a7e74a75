//! The filestore server binary.

use anyhow::Result;

fn main() -> Result<()> {
    filestore_server::cli::execute()
}
