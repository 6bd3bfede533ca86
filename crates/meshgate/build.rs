//! Renders man pages for `meshgate` and its subcommands into `$OUT_DIR/man`.

use std::fs;
use std::path::{Path, PathBuf};

use clap::CommandFactory;

// The CLI definition needs nothing beyond clap, which is also a
// build-dependency.
#[path = "src/cli.rs"]
mod cli;

fn main() {
    println!("cargo::rerun-if-changed=src/cli.rs");

    let Some(out_dir) = std::env::var_os("OUT_DIR").map(PathBuf::from) else {
        panic!("cargo did not set OUT_DIR");
    };
    let man_dir = out_dir.join("man");
    if let Err(e) = fs::create_dir_all(&man_dir) {
        panic!("cannot create {}: {e}", man_dir.display());
    }

    // One page per command; hidden subcommands are skipped.
    let mut pending = vec![cli::Cli::command()];
    while let Some(cmd) = pending.pop() {
        write_page(&cmd, &man_dir);
        let parent = cmd.get_name().to_owned();
        pending.extend(
            cmd.get_subcommands()
                .filter(|sub| !sub.is_hide_set())
                .map(|sub| sub.clone().name(format!("{parent}-{}", sub.get_name()))),
        );
    }
}

fn write_page(cmd: &clap::Command, dir: &Path) {
    let page = dir.join(format!("{}.1", cmd.get_name()));
    let mut rendered = Vec::new();
    if let Err(e) = clap_mangen::Man::new(cmd.clone()).render(&mut rendered) {
        panic!("rendering {}: {e}", page.display());
    }
    if let Err(e) = fs::write(&page, rendered) {
        panic!("writing {}: {e}", page.display());
    }
}
